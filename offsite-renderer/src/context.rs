//! Template context — serializable rendering payload built from connection profiles.

use serde::{Deserialize, Serialize};

use offsite_core::{settings::SyncToolSettings, ConnectionProfile, Remote};

use crate::error::RenderError;

/// One `[section]` of the sync tool config.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProfileCtx {
    pub name: String,
    pub provider: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint: String,
}

impl std::fmt::Debug for ProfileCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileCtx")
            .field("name", &self.name)
            .field("provider", &self.provider)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

/// Rendering payload: source profile first, destination second.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigContext {
    pub profiles: Vec<ProfileCtx>,
}

impl ConfigContext {
    pub fn new(
        source: &ConnectionProfile,
        destination: &ConnectionProfile,
        settings: &SyncToolSettings,
    ) -> Result<Self, RenderError> {
        let profiles = [source, destination]
            .into_iter()
            .map(|p| profile_ctx(p, settings))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { profiles })
    }

    /// Convert to a [`tera::Context`].
    pub fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        Ok(tera::Context::from_serialize(self)?)
    }
}

fn profile_ctx(
    profile: &ConnectionProfile,
    settings: &SyncToolSettings,
) -> Result<ProfileCtx, RenderError> {
    let name = match profile.remote {
        Remote::Source => settings.source_profile.clone(),
        Remote::Destination => settings.destination_profile.clone(),
    };
    for (field, value) in [
        ("provider", settings.provider.as_str()),
        ("access_key_id", profile.access_key_id.as_str()),
        ("secret_access_key", profile.secret_access_key.as_str()),
        ("endpoint", profile.endpoint.as_str()),
    ] {
        if value.contains(['\n', '\r']) {
            return Err(RenderError::LineBreak {
                profile: name,
                field,
            });
        }
    }
    Ok(ProfileCtx {
        name,
        provider: settings.provider.clone(),
        access_key_id: profile.access_key_id.clone(),
        secret_access_key: profile.secret_access_key.clone(),
        endpoint: profile.endpoint.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(remote: Remote, secret: &str) -> ConnectionProfile {
        ConnectionProfile {
            remote,
            access_key_id: "id".into(),
            secret_access_key: secret.into(),
            endpoint: "s3.example".into(),
        }
    }

    #[test]
    fn profile_names_come_from_settings() {
        let settings = SyncToolSettings {
            source_profile: "COS_SOURCE".into(),
            destination_profile: "COS_DESTINATION".into(),
            ..SyncToolSettings::default()
        };
        let ctx = ConfigContext::new(
            &profile(Remote::Source, "s"),
            &profile(Remote::Destination, "d"),
            &settings,
        )
        .unwrap();
        assert_eq!(ctx.profiles[0].name, "COS_SOURCE");
        assert_eq!(ctx.profiles[1].name, "COS_DESTINATION");
        assert_eq!(ctx.profiles[1].secret_access_key, "d");
    }

    #[test]
    fn line_break_in_secret_is_rejected() {
        let err = ConfigContext::new(
            &profile(Remote::Source, "s"),
            &profile(Remote::Destination, "d\n[INJECTED]"),
            &SyncToolSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RenderError::LineBreak { field: "secret_access_key", .. }
        ));
    }

    #[test]
    fn debug_omits_credentials() {
        let ctx = ConfigContext::new(
            &profile(Remote::Source, "topsecret"),
            &profile(Remote::Destination, "d"),
            &SyncToolSettings::default(),
        )
        .unwrap();
        assert!(!format!("{ctx:?}").contains("topsecret"));
    }
}
