//! Lifecycle policy model: archive after N days, expire after M days.
//!
//! Serialises to the provider's document shape:
//!
//! ```text
//! {"Rules": [
//!   {"ID": .., "Status": "Enabled", "Filter": {}, "Transitions": [{"Days": N, "StorageClass": ..}]},
//!   {"ID": .., "Status": "Enabled", "Filter": {}, "Expiration": {"Days": M}}
//! ]}
//! ```

use serde::{Deserialize, Serialize};

use crate::bundle::{keys, SecretBundle};
use crate::error::{PolicyValidationError, RetentionError};

/// Validated retention window; `delete_after_days > archive_after_days` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetentionWindow {
    archive_after_days: u32,
    delete_after_days: u32,
}

impl RetentionWindow {
    pub fn new(archive_after_days: u32, delete_after_days: u32) -> Result<Self, PolicyValidationError> {
        let max = i32::MAX as u32;
        for (key, days) in [
            (keys::ARCHIVE_AFTER_DAYS, archive_after_days),
            (keys::DELETE_AFTER_DAYS, delete_after_days),
        ] {
            if days > max {
                return Err(PolicyValidationError::InvalidDays {
                    key: key.to_owned(),
                    value: days.to_string(),
                    max: i32::MAX,
                });
            }
        }
        if delete_after_days <= archive_after_days {
            return Err(PolicyValidationError::ExpiresBeforeArchive {
                archive_after_days,
                delete_after_days,
            });
        }
        Ok(Self {
            archive_after_days,
            delete_after_days,
        })
    }

    pub fn archive_after_days(&self) -> u32 {
        self.archive_after_days
    }

    pub fn delete_after_days(&self) -> u32 {
        self.delete_after_days
    }
}

/// Reads the two retention keys from `bundle`.
///
/// Absent keys are [`RetentionError::Missing`]; unparseable or inverted
/// values are [`RetentionError::Invalid`].
pub fn retention_from_bundle(bundle: &SecretBundle) -> Result<RetentionWindow, RetentionError> {
    let raw = bundle.require_all(&[keys::ARCHIVE_AFTER_DAYS, keys::DELETE_AFTER_DAYS])?;
    let archive = parse_days(keys::ARCHIVE_AFTER_DAYS, raw[0])?;
    let delete = parse_days(keys::DELETE_AFTER_DAYS, raw[1])?;
    Ok(RetentionWindow::new(archive, delete)?)
}

fn parse_days(key: &str, value: &str) -> Result<u32, PolicyValidationError> {
    value
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|d| *d <= i32::MAX as u32)
        .ok_or_else(|| PolicyValidationError::InvalidDays {
            key: key.to_owned(),
            value: value.to_owned(),
            max: i32::MAX,
        })
}

/// Rule ids and storage class used when building a policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyNames {
    pub archive_rule_id: String,
    pub expire_rule_id: String,
    pub storage_class: String,
}

impl Default for PolicyNames {
    fn default() -> Self {
        Self {
            archive_rule_id: "ArchiveAllObjects".to_owned(),
            expire_rule_id: "DeleteAllObjects".to_owned(),
            storage_class: "GLACIER".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleStatus {
    Enabled,
    Disabled,
}

/// Empty filter: the rule applies to every object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFilter {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Transition {
    pub days: u32,
    pub storage_class: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Expiration {
    pub days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LifecycleRule {
    #[serde(rename = "ID")]
    pub id: String,
    pub status: RuleStatus,
    pub filter: RuleFilter,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transitions: Vec<Transition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<Expiration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LifecyclePolicy {
    pub rules: Vec<LifecycleRule>,
}

impl LifecyclePolicy {
    /// Exactly two unfiltered rules: a storage-class transition and an expiration.
    pub fn archive_then_expire(
        window: RetentionWindow,
        names: &PolicyNames,
    ) -> Result<Self, PolicyValidationError> {
        for (field, value) in [
            ("archive_rule_id", &names.archive_rule_id),
            ("expire_rule_id", &names.expire_rule_id),
            ("storage_class", &names.storage_class),
        ] {
            if value.trim().is_empty() {
                return Err(PolicyValidationError::EmptyField { field });
            }
        }

        Ok(Self {
            rules: vec![
                LifecycleRule {
                    id: names.archive_rule_id.clone(),
                    status: RuleStatus::Enabled,
                    filter: RuleFilter::default(),
                    transitions: vec![Transition {
                        days: window.archive_after_days(),
                        storage_class: names.storage_class.clone(),
                    }],
                    expiration: None,
                },
                LifecycleRule {
                    id: names.expire_rule_id.clone(),
                    status: RuleStatus::Enabled,
                    filter: RuleFilter::default(),
                    transitions: vec![],
                    expiration: Some(Expiration {
                        days: window.delete_after_days(),
                    }),
                },
            ],
        })
    }

    /// Re-check the retention invariant on a document that may have been
    /// assembled by hand.
    pub fn validate(&self) -> Result<RetentionWindow, PolicyValidationError> {
        match (self.transition_days(), self.expiration_days()) {
            (Some(archive), Some(delete)) => RetentionWindow::new(archive, delete),
            (None, _) => Err(PolicyValidationError::EmptyField { field: "Transitions" }),
            (_, None) => Err(PolicyValidationError::EmptyField { field: "Expiration" }),
        }
    }

    /// Days of the first transition, if any.
    pub fn transition_days(&self) -> Option<u32> {
        self.rules
            .iter()
            .flat_map(|r| r.transitions.iter())
            .map(|t| t.days)
            .next()
    }

    /// Days of the first expiration, if any.
    pub fn expiration_days(&self) -> Option<u32> {
        self.rules
            .iter()
            .filter_map(|r| r.expiration.as_ref())
            .map(|e| e.days)
            .next()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn window_rejects_delete_not_after_archive() {
        assert!(matches!(
            RetentionWindow::new(30, 30),
            Err(PolicyValidationError::ExpiresBeforeArchive { .. })
        ));
        assert!(RetentionWindow::new(90, 30).is_err());
        assert!(RetentionWindow::new(0, 1).is_ok());
    }

    #[test]
    fn window_rejects_days_beyond_i32() {
        let too_big = i32::MAX as u32 + 1;
        assert!(matches!(
            RetentionWindow::new(1, too_big),
            Err(PolicyValidationError::InvalidDays { .. })
        ));
    }

    #[test]
    fn bundle_days_must_be_whole_numbers() {
        let bundle = SecretBundle::from_iter([
            (keys::ARCHIVE_AFTER_DAYS, "thirty"),
            (keys::DELETE_AFTER_DAYS, "90"),
        ]);
        assert!(matches!(
            retention_from_bundle(&bundle),
            Err(RetentionError::Invalid(PolicyValidationError::InvalidDays { .. }))
        ));

        let bundle = SecretBundle::from_iter([
            (keys::ARCHIVE_AFTER_DAYS, "-1"),
            (keys::DELETE_AFTER_DAYS, "90"),
        ]);
        assert!(matches!(
            retention_from_bundle(&bundle),
            Err(RetentionError::Invalid(_))
        ));
    }

    #[test]
    fn bundle_without_days_is_a_bundle_error() {
        let bundle = SecretBundle::from_iter([(keys::ARCHIVE_AFTER_DAYS, "30")]);
        assert!(matches!(
            retention_from_bundle(&bundle),
            Err(RetentionError::Missing(_))
        ));
    }

    #[test]
    fn policy_document_shape() {
        let window = RetentionWindow::new(30, 90).unwrap();
        let policy = LifecyclePolicy::archive_then_expire(window, &PolicyNames::default()).unwrap();
        let value = serde_json::to_value(&policy).unwrap();
        assert_eq!(
            value,
            json!({
                "Rules": [
                    {
                        "ID": "ArchiveAllObjects",
                        "Status": "Enabled",
                        "Filter": {},
                        "Transitions": [{"Days": 30, "StorageClass": "GLACIER"}]
                    },
                    {
                        "ID": "DeleteAllObjects",
                        "Status": "Enabled",
                        "Filter": {},
                        "Expiration": {"Days": 90}
                    }
                ]
            })
        );
        assert_eq!(policy.transition_days(), Some(30));
        assert_eq!(policy.expiration_days(), Some(90));
    }

    #[test]
    fn hand_built_inverted_policy_fails_validation() {
        let window = RetentionWindow::new(30, 90).unwrap();
        let mut policy =
            LifecyclePolicy::archive_then_expire(window, &PolicyNames::default()).unwrap();
        policy.rules[1].expiration = Some(Expiration { days: 10 });
        assert!(matches!(
            policy.validate(),
            Err(PolicyValidationError::ExpiresBeforeArchive { .. })
        ));

        policy.rules[1].expiration = None;
        assert!(policy.validate().is_err());
    }

    #[test]
    fn empty_storage_class_is_rejected() {
        let window = RetentionWindow::new(1, 2).unwrap();
        let names = PolicyNames {
            storage_class: " ".into(),
            ..PolicyNames::default()
        };
        assert_eq!(
            LifecyclePolicy::archive_then_expire(window, &names),
            Err(PolicyValidationError::EmptyField {
                field: "storage_class"
            })
        );
    }
}
