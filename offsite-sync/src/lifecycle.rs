//! Lifecycle policy application on the destination bucket.
//!
//! [`LifecycleApi`] is the seam; [`S3LifecycleApi`] sends
//! `PutBucketLifecycleConfiguration` with path-style addressing to the
//! object-storage management endpoint.
//!
//! Every request carries `Content-MD5`. When the bundle holds
//! `IBM_COS_API_KEY` the key is exchanged for an IAM token and the request is
//! sent with `Authorization: Bearer <token>` (plus `ibm-service-instance-id`
//! when known); otherwise the destination's HMAC keys sign it.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::config::interceptors::BeforeTransmitInterceptorContextMut;
use aws_sdk_s3::config::{
    BehaviorVersion, ConfigBag, Credentials, Intercept, Region, RuntimeComponents,
};
use aws_sdk_s3::error::{BoxError, DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_s3::types::{
    BucketLifecycleConfiguration, ExpirationStatus, LifecycleExpiration, LifecycleRule,
    LifecycleRuleFilter, Transition, TransitionStorageClass,
};
use aws_sdk_s3::Client as S3Client;
use base64::prelude::{Engine as _, BASE64_STANDARD};
use md5::{Digest, Md5};
use tracing::{debug, info};

use offsite_core::settings::{SecretsSettings, DEFAULT_IAM_URL};
use offsite_core::{keys, BucketName, BundleError, LifecyclePolicy, SecretBundle};
use offsite_core::policy::RuleStatus;
use offsite_secrets::request_iam_token;

use crate::error::PolicyApplicationError;

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// IAM API key login for the lifecycle call.
#[derive(Clone, PartialEq, Eq)]
pub struct IamLogin {
    pub api_key: String,
    pub service_instance_id: Option<String>,
}

/// Endpoint, region and credentials for lifecycle calls.
#[derive(Clone, PartialEq, Eq)]
pub struct LifecycleTarget {
    pub endpoint: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Set when the bundle carries `IBM_COS_API_KEY`; wins over HMAC.
    pub iam: Option<IamLogin>,
}

impl LifecycleTarget {
    /// Destination keys plus `IBM_COS_ENDPOINT`, falling back to
    /// `DESTINATION_ENDPOINT`. A bare host gets an `https://` scheme.
    pub fn from_bundle(bundle: &SecretBundle, region: &str) -> Result<Self, BundleError> {
        let creds = bundle.require_all(&[
            keys::DESTINATION_ACCESS_KEY_ID,
            keys::DESTINATION_SECRET_ACCESS_KEY,
        ])?;
        let endpoint = match bundle.get(keys::COS_ENDPOINT) {
            Some(e) => e,
            None => bundle.require(keys::DESTINATION_ENDPOINT)?,
        };
        let present = |key| bundle.get(key).map(str::trim).filter(|v| !v.is_empty());
        let iam = present(keys::COS_API_KEY).map(|api_key| IamLogin {
            api_key: api_key.to_owned(),
            service_instance_id: present(keys::SERVICE_INSTANCE_ID).map(str::to_owned),
        });
        Ok(Self {
            endpoint: with_scheme(endpoint.trim()),
            region: region.to_owned(),
            access_key_id: creds[0].to_owned(),
            secret_access_key: creds[1].to_owned(),
            iam,
        })
    }
}

impl fmt::Debug for IamLogin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IamLogin")
            .field("service_instance_id", &self.service_instance_id)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for LifecycleTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleTarget")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("auth", &if self.iam.is_some() { "iam" } else { "hmac" })
            .finish_non_exhaustive()
    }
}

fn with_scheme(endpoint: &str) -> String {
    if endpoint.starts_with("https://") || endpoint.starts_with("http://") {
        endpoint.trim_end_matches('/').to_owned()
    } else {
        format!("https://{}", endpoint.trim_end_matches('/'))
    }
}

// ---------------------------------------------------------------------------
// LifecycleApi
// ---------------------------------------------------------------------------

#[async_trait]
pub trait LifecycleApi: Send + Sync {
    /// Replace the bucket's lifecycle configuration with `policy`.
    async fn put_policy(
        &self,
        target: &LifecycleTarget,
        bucket: &BucketName,
        policy: &LifecyclePolicy,
    ) -> Result<(), PolicyApplicationError>;
}

/// `aws-sdk-s3` implementation.
#[derive(Debug, Clone)]
pub struct S3LifecycleApi {
    iam_url: String,
    timeout: Duration,
}

impl Default for S3LifecycleApi {
    fn default() -> Self {
        Self::new(DEFAULT_IAM_URL, Duration::from_secs(30))
    }
}

impl S3LifecycleApi {
    pub fn new(iam_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            iam_url: iam_url.into(),
            timeout,
        }
    }

    /// Token exchange goes to the same IAM endpoint as the secret fetch.
    pub fn from_settings(settings: &SecretsSettings) -> Self {
        Self::new(&settings.iam_url, Duration::from_secs(settings.timeout_secs))
    }

    async fn bearer(&self, target: &LifecycleTarget) -> Result<Option<Bearer>, PolicyApplicationError> {
        let Some(iam) = &target.iam else {
            return Ok(None);
        };
        debug!("exchanging IBM_COS_API_KEY for an IAM token");
        let (url, key, timeout) = (self.iam_url.clone(), iam.api_key.clone(), self.timeout);
        let token = tokio::task::spawn_blocking(move || request_iam_token(&url, &key, timeout))
            .await
            .map_err(|e| PolicyApplicationError::Token(e.to_string()))?
            .map_err(|e| PolicyApplicationError::Token(e.to_string()))?;
        Ok(Some(Bearer {
            token,
            service_instance_id: iam.service_instance_id.clone(),
        }))
    }

    fn client(target: &LifecycleTarget, bearer: Option<Bearer>) -> S3Client {
        let credentials = Credentials::new(
            &target.access_key_id,
            &target.secret_access_key,
            None,
            None,
            "offsite",
        );
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(target.region.clone()))
            .endpoint_url(&target.endpoint)
            .credentials_provider(credentials)
            .force_path_style(true)
            .interceptor(CosRequestHeaders { bearer })
            .build();
        S3Client::from_conf(config)
    }
}

#[async_trait]
impl LifecycleApi for S3LifecycleApi {
    async fn put_policy(
        &self,
        target: &LifecycleTarget,
        bucket: &BucketName,
        policy: &LifecyclePolicy,
    ) -> Result<(), PolicyApplicationError> {
        let configuration = to_sdk(policy)?;
        let bearer = self.bearer(target).await?;
        debug!("PUT lifecycle on {bucket} via {target:?}");
        Self::client(target, bearer)
            .put_bucket_lifecycle_configuration()
            .bucket(bucket.as_str())
            .lifecycle_configuration(configuration)
            .send()
            .await
            .map_err(|err| PolicyApplicationError::Rejected {
                bucket: bucket.to_string(),
                code: err.code().map(str::to_owned),
                message: DisplayErrorContext(&err).to_string(),
            })?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Request headers
// ---------------------------------------------------------------------------

struct Bearer {
    token: String,
    service_instance_id: Option<String>,
}

/// Adds `Content-MD5` before signing; with a [`Bearer`] it replaces the
/// signature with the IAM token once signing is done.
struct CosRequestHeaders {
    bearer: Option<Bearer>,
}

impl fmt::Debug for CosRequestHeaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CosRequestHeaders")
            .field("bearer", &self.bearer.is_some())
            .finish()
    }
}

impl Intercept for CosRequestHeaders {
    fn name(&self) -> &'static str {
        "CosRequestHeaders"
    }

    fn modify_before_signing(
        &self,
        context: &mut BeforeTransmitInterceptorContextMut<'_>,
        _runtime_components: &RuntimeComponents,
        _cfg: &mut ConfigBag,
    ) -> Result<(), BoxError> {
        let body = context
            .request()
            .body()
            .bytes()
            .ok_or("lifecycle request body is not buffered")?;
        let digest = content_md5(body);
        context
            .request_mut()
            .headers_mut()
            .try_insert("content-md5", digest)?;
        Ok(())
    }

    fn modify_before_transmit(
        &self,
        context: &mut BeforeTransmitInterceptorContextMut<'_>,
        _runtime_components: &RuntimeComponents,
        _cfg: &mut ConfigBag,
    ) -> Result<(), BoxError> {
        let Some(bearer) = &self.bearer else {
            return Ok(());
        };
        let headers = context.request_mut().headers_mut();
        headers.try_insert("authorization", format!("Bearer {}", bearer.token))?;
        if let Some(id) = &bearer.service_instance_id {
            headers.try_insert("ibm-service-instance-id", id.clone())?;
        }
        Ok(())
    }
}

/// Base64 of the body's MD5 digest.
fn content_md5(body: &[u8]) -> String {
    BASE64_STANDARD.encode(Md5::digest(body))
}

fn days(value: u32) -> Result<i32, PolicyApplicationError> {
    i32::try_from(value)
        .map_err(|_| PolicyApplicationError::Encoding(format!("{value} days exceeds i32::MAX")))
}

/// Convert the domain document into the SDK's request type.
pub fn to_sdk(policy: &LifecyclePolicy) -> Result<BucketLifecycleConfiguration, PolicyApplicationError> {
    let encoding = |e: aws_sdk_s3::error::BuildError| PolicyApplicationError::Encoding(e.to_string());

    let mut rules = Vec::with_capacity(policy.rules.len());
    for rule in &policy.rules {
        let status = match rule.status {
            RuleStatus::Enabled => ExpirationStatus::Enabled,
            RuleStatus::Disabled => ExpirationStatus::Disabled,
        };
        let mut builder = LifecycleRule::builder()
            .id(&rule.id)
            .status(status)
            .filter(LifecycleRuleFilter::builder().build());
        for t in &rule.transitions {
            builder = builder.transitions(
                Transition::builder()
                    .days(days(t.days)?)
                    .storage_class(TransitionStorageClass::from(t.storage_class.as_str()))
                    .build(),
            );
        }
        if let Some(exp) = &rule.expiration {
            builder = builder.expiration(LifecycleExpiration::builder().days(days(exp.days)?).build());
        }
        rules.push(builder.build().map_err(encoding)?);
    }

    BucketLifecycleConfiguration::builder()
        .set_rules(Some(rules))
        .build()
        .map_err(encoding)
}

/// Apply `policy` to `bucket`, logging the outcome.
pub async fn apply_policy(
    api: &dyn LifecycleApi,
    target: &LifecycleTarget,
    bucket: &BucketName,
    policy: &LifecyclePolicy,
) -> Result<(), PolicyApplicationError> {
    api.put_policy(target, bucket, policy).await?;
    info!(
        "lifecycle policy applied to {bucket}: archive after {} days, delete after {} days",
        policy.transition_days().unwrap_or_default(),
        policy.expiration_days().unwrap_or_default()
    );
    Ok(())
}
