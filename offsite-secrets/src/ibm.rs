//! IBM Cloud Secrets Manager client.
//!
//! Two requests per fetch:
//!
//! 1. `POST <iam_url>` (form: `grant_type=urn:ibm:params:oauth:grant-type:apikey`,
//!    `apikey=<key>`) → `{"access_token": …}`
//! 2. `GET <service_url>/api/v2/secrets/<id>` with `Authorization: Bearer <token>`
//!
//! The token is not cached: a run fetches exactly one secret.
//! [`request_iam_token`] runs step 1 alone for other IBM Cloud APIs.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use offsite_core::{SecretBundle, SecretId};

use crate::error::SecretError;
use crate::payload::bundle_from_response;
use crate::provider::SecretProvider;

const APIKEY_GRANT: &str = "urn:ibm:params:oauth:grant-type:apikey";
/// Longest response body quoted back in an error.
const MAX_BODY_IN_ERROR: usize = 512;

/// Connection details for [`IbmSecretsManager`].
#[derive(Clone)]
pub struct IbmSecretsManagerConfig {
    pub service_url: String,
    pub iam_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl fmt::Debug for IbmSecretsManagerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IbmSecretsManagerConfig")
            .field("service_url", &self.service_url)
            .field("iam_url", &self.iam_url)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Blocking Secrets Manager client.
pub struct IbmSecretsManager {
    config: IbmSecretsManagerConfig,
    agent: ureq::Agent,
}

impl IbmSecretsManager {
    pub fn new(config: IbmSecretsManagerConfig) -> Result<Self, SecretError> {
        if config.service_url.trim().is_empty() {
            return Err(SecretError::NotConfigured(
                "Secrets Manager service URL is empty".to_owned(),
            ));
        }
        if config.api_key.trim().is_empty() {
            return Err(SecretError::NotConfigured("IAM API key is empty".to_owned()));
        }
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Ok(Self { config, agent })
    }

    fn secret_url(&self, id: &SecretId) -> String {
        format!(
            "{}/api/v2/secrets/{}",
            self.config.service_url.trim_end_matches('/'),
            id.0
        )
    }

    fn iam_token(&self) -> Result<String, SecretError> {
        exchange_api_key(&self.agent, &self.config.iam_url, &self.config.api_key)
    }
}

/// Exchange an IAM API key for a bearer token at `iam_url`.
pub fn request_iam_token(
    iam_url: &str,
    api_key: &str,
    timeout: Duration,
) -> Result<String, SecretError> {
    if api_key.trim().is_empty() {
        return Err(SecretError::NotConfigured("IAM API key is empty".to_owned()));
    }
    let agent = ureq::AgentBuilder::new().timeout(timeout).build();
    exchange_api_key(&agent, iam_url, api_key)
}

fn exchange_api_key(agent: &ureq::Agent, url: &str, api_key: &str) -> Result<String, SecretError> {
    debug!("requesting IAM token from {url}");
    let response = agent
        .post(url)
        .set("Accept", "application/json")
        .send_form(&[("grant_type", APIKEY_GRANT), ("apikey", api_key)]);

    match response {
        Ok(resp) => {
            let token: TokenResponse = resp
                .into_json()
                .map_err(|e| SecretError::MalformedPayload(format!("IAM token response: {e}")))?;
            Ok(token.access_token)
        }
        Err(ureq::Error::Status(status, resp)) => Err(SecretError::Authentication {
            url: url.to_owned(),
            status,
            body: body_excerpt(resp),
        }),
        Err(ureq::Error::Transport(t)) => Err(SecretError::Unreachable {
            url: url.to_owned(),
            reason: t.to_string(),
        }),
    }
}

impl SecretProvider for IbmSecretsManager {
    fn fetch(&self, id: &SecretId) -> Result<SecretBundle, SecretError> {
        let token = self.iam_token()?;
        let url = self.secret_url(id);
        info!("fetching secret '{id}' from Secrets Manager");

        let response = self
            .agent
            .get(&url)
            .set("Accept", "application/json")
            .set("Authorization", &format!("Bearer {token}"))
            .call();

        let body: Value = match response {
            Ok(resp) => resp
                .into_json()
                .map_err(|e| SecretError::MalformedPayload(format!("secret response: {e}")))?,
            Err(ureq::Error::Status(404, _)) => {
                return Err(SecretError::UnknownSecret { id: id.0.clone() })
            }
            Err(ureq::Error::Status(status @ (401 | 403), resp)) => {
                return Err(SecretError::Authentication {
                    url,
                    status,
                    body: body_excerpt(resp),
                })
            }
            Err(ureq::Error::Status(status, resp)) => {
                return Err(SecretError::Http {
                    url,
                    status,
                    body: body_excerpt(resp),
                })
            }
            Err(ureq::Error::Transport(t)) => {
                return Err(SecretError::Unreachable {
                    url,
                    reason: t.to_string(),
                })
            }
        };

        let bundle = bundle_from_response(&body)?;
        debug!("secret '{id}' carries {} keys", bundle.len());
        Ok(bundle)
    }

    fn describe(&self) -> String {
        format!("Secrets Manager at {}", self.config.service_url)
    }
}

fn body_excerpt(resp: ureq::Response) -> String {
    let mut body = resp.into_string().unwrap_or_default();
    if body.len() > MAX_BODY_IN_ERROR {
        let mut cut = MAX_BODY_IN_ERROR;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push('…');
    }
    body
}
