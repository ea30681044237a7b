//! Bearer-token resolution for Google Cloud calls.
//!
//! Providers are tried in order and the first one that yields a token wins:
//! an access token in the environment, the `gcloud` CLI, then a
//! service-account key file.

use std::path::PathBuf;

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::config::Config;

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("{0}")]
    Unavailable(String),
    #[error("no Google Cloud credentials available (tried: {})", .0.join("; "))]
    Exhausted(Vec<String>),
}

#[async_trait]
pub trait TokenProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn token(&self) -> Result<String, CredentialError>;
}

pub struct CredentialChain {
    providers: Vec<Box<dyn TokenProvider>>,
}

impl CredentialChain {
    pub fn new(providers: Vec<Box<dyn TokenProvider>>) -> Self {
        Self { providers }
    }

    pub fn google(config: &Config, http: reqwest::Client) -> Self {
        Self::new(vec![
            Box::new(EnvTokenProvider::new(&[
                "GOOGLE_CLOUD_ACCESS_TOKEN",
                "GOOGLE_ACCESS_TOKEN",
            ])),
            Box::new(GcloudCliProvider::new(config.gcloud_path.clone())),
            Box::new(ServiceAccountProvider::new(
                std::env::var_os("GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from),
                http,
            )),
        ])
    }

    pub async fn resolve(&self) -> Result<String, CredentialError> {
        let mut attempts = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            match provider.token().await {
                Ok(token) => {
                    tracing::debug!(provider = provider.name(), "Resolved access token");
                    return Ok(token);
                }
                Err(e) => {
                    tracing::debug!(provider = provider.name(), reason = %e, "Credential source unavailable");
                    attempts.push(format!("{}: {}", provider.name(), e));
                }
            }
        }
        Err(CredentialError::Exhausted(attempts))
    }
}

pub struct EnvTokenProvider {
    vars: Vec<String>,
}

impl EnvTokenProvider {
    pub fn new(vars: &[&str]) -> Self {
        Self {
            vars: vars.iter().map(|v| v.to_string()).collect(),
        }
    }
}

#[async_trait]
impl TokenProvider for EnvTokenProvider {
    fn name(&self) -> &str {
        "environment"
    }

    async fn token(&self) -> Result<String, CredentialError> {
        self.vars
            .iter()
            .filter_map(|v| std::env::var(v).ok())
            .map(|t| t.trim().to_string())
            .find(|t| !t.is_empty())
            .ok_or_else(|| {
                CredentialError::Unavailable(format!("{} not set", self.vars.join(" / ")))
            })
    }
}

pub struct GcloudCliProvider {
    program: String,
}

impl GcloudCliProvider {
    pub fn new(program: String) -> Self {
        Self { program }
    }
}

#[async_trait]
impl TokenProvider for GcloudCliProvider {
    fn name(&self) -> &str {
        "gcloud CLI"
    }

    async fn token(&self) -> Result<String, CredentialError> {
        let output = Command::new(&self.program)
            .args(["auth", "print-access-token"])
            .output()
            .await
            .map_err(|e| CredentialError::Unavailable(format!("failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CredentialError::Unavailable(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(CredentialError::Unavailable(
                "gcloud printed an empty token".to_string(),
            ));
        }
        Ok(token)
    }
}

#[derive(Debug, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    token_uri: Option<String>,
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Exchanges a signed JWT assertion for an access token using a
/// service-account JSON key.
pub struct ServiceAccountProvider {
    key_path: Option<PathBuf>,
    http: reqwest::Client,
}

impl ServiceAccountProvider {
    pub fn new(key_path: Option<PathBuf>, http: reqwest::Client) -> Self {
        Self { key_path, http }
    }

    fn unavailable(reason: impl std::fmt::Display) -> CredentialError {
        CredentialError::Unavailable(reason.to_string())
    }
}

#[async_trait]
impl TokenProvider for ServiceAccountProvider {
    fn name(&self) -> &str {
        "service account key"
    }

    async fn token(&self) -> Result<String, CredentialError> {
        let path = self
            .key_path
            .as_ref()
            .ok_or_else(|| Self::unavailable("GOOGLE_APPLICATION_CREDENTIALS not set"))?;

        let raw = tokio::fs::read(path)
            .await
            .map_err(|e| Self::unavailable(format!("cannot read {}: {}", path.display(), e)))?;
        let key: ServiceAccountKey = serde_json::from_slice(&raw)
            .map_err(|e| Self::unavailable(format!("invalid key file {}: {}", path.display(), e)))?;

        let token_uri = key.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI);
        let now = chrono::Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &key.client_email,
            scope: CLOUD_PLATFORM_SCOPE,
            aud: token_uri,
            iat: now,
            exp: now + 3600,
        };
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| Self::unavailable(format!("invalid private key: {}", e)))?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &signing_key)
            .map_err(|e| Self::unavailable(format!("failed to sign assertion: {}", e)))?;

        let response = self
            .http
            .post(token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Self::unavailable(format!("token exchange failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::unavailable(format!(
                "token exchange returned {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| Self::unavailable(format!("unexpected token response: {}", e)))?;
        Ok(token.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    struct Fixed(Result<&'static str, &'static str>);

    #[async_trait]
    impl TokenProvider for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn token(&self) -> Result<String, CredentialError> {
            self.0
                .map(str::to_string)
                .map_err(|e| CredentialError::Unavailable(e.to_string()))
        }
    }

    #[tokio::test]
    async fn first_available_provider_wins() {
        let chain = CredentialChain::new(vec![
            Box::new(Fixed(Err("nope"))),
            Box::new(Fixed(Ok("second"))),
            Box::new(Fixed(Ok("third"))),
        ]);
        assert_eq!(chain.resolve().await.unwrap(), "second");
    }

    #[tokio::test]
    async fn exhaustion_lists_every_source() {
        let chain = CredentialChain::new(vec![
            Box::new(EnvTokenProvider::new(&["DAYSONG_TEST_UNSET_TOKEN"])),
            Box::new(GcloudCliProvider::new("no-such-gcloud-binary".to_string())),
            Box::new(ServiceAccountProvider::new(None, reqwest::Client::new())),
        ]);

        let err = chain.resolve().await.unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, CredentialError::Exhausted(ref tried) if tried.len() == 3));
        assert!(message.contains("environment: DAYSONG_TEST_UNSET_TOKEN not set"));
        assert!(message.contains("gcloud CLI"));
        assert!(message.contains("GOOGLE_APPLICATION_CREDENTIALS not set"));
    }

    #[tokio::test]
    async fn env_provider_reads_first_non_empty_variable() {
        std::env::set_var("DAYSONG_TEST_TOKEN_B", " tok-b ");
        let provider = EnvTokenProvider::new(&["DAYSONG_TEST_TOKEN_A", "DAYSONG_TEST_TOKEN_B"]);
        assert_eq!(provider.token().await.unwrap(), "tok-b");
        std::env::remove_var("DAYSONG_TEST_TOKEN_B");
    }

    #[tokio::test]
    async fn service_account_exchanges_signed_assertion() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded(
                    "grant_type".into(),
                    "urn:ietf:params:oauth:grant-type:jwt-bearer".into(),
                ),
                Matcher::Regex("assertion=[A-Za-z0-9_-]+\\.[A-Za-z0-9_-]+\\.[A-Za-z0-9_-]+".into()),
            ]))
            .with_status(200)
            .with_body(json!({"access_token": "sa-token", "expires_in": 3599, "token_type": "Bearer"}).to_string())
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("key.json");
        let key = json!({
            "type": "service_account",
            "client_email": "songs@test-project.iam.gserviceaccount.com",
            "private_key": include_str!("../../testdata/service_account_test_key.pem"),
            "token_uri": format!("{}/token", server.url()),
        });
        std::fs::write(&key_path, key.to_string()).unwrap();

        let provider = ServiceAccountProvider::new(Some(key_path), reqwest::Client::new());
        assert_eq!(provider.token().await.unwrap(), "sa-token");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unreadable_key_file_is_unavailable() {
        let provider = ServiceAccountProvider::new(
            Some(PathBuf::from("/no/such/key.json")),
            reqwest::Client::new(),
        );
        let err = provider.token().await.unwrap_err();
        assert!(err.to_string().contains("cannot read /no/such/key.json"));
    }
}
