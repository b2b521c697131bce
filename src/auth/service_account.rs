use super::{TokenProvider, ANDROID_PUBLISHER_SCOPE};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::Mutex;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const EXPIRY_MARGIN_SECS: i64 = 60;

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The subset of a downloaded service account JSON key the uploader needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type")]
    pub key_type: String,
    pub client_email: String,
    pub private_key: String,
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Could not read service account file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let key: Self = serde_json::from_str(json)?;
        if key.key_type != "service_account" {
            return Err(Error::Config(format!(
                "Expected a service_account key, got '{}'",
                key.key_type
            )));
        }
        Ok(key)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
}

struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(EXPIRY_MARGIN_SECS) > now
    }
}

/// Two-legged OAuth flow for a service account, with an in-memory token cache.
pub struct ServiceAccountAuthenticator {
    client: Client,
    client_email: String,
    key_id: Option<String>,
    encoding_key: EncodingKey,
    token_uri: String,
    cache: Mutex<Option<CachedToken>>,
}

impl ServiceAccountAuthenticator {
    pub fn new(key: ServiceAccountKey, client: Client) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
            Error::Auth(format!("Invalid private key in service account file: {}", e))
        })?;

        Ok(Self {
            client,
            client_email: key.client_email,
            key_id: key.private_key_id,
            encoding_key,
            token_uri: key.token_uri,
            cache: Mutex::new(None),
        })
    }

    pub fn with_token_uri(mut self, token_uri: String) -> Self {
        self.token_uri = token_uri;
        self
    }

    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    /// Sign the RS256 JWT assertion presented to the token endpoint.
    pub fn sign_assertion(&self, now: DateTime<Utc>) -> Result<String> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key_id.clone();

        let claims = AssertionClaims {
            iss: self.client_email.clone(),
            scope: ANDROID_PUBLISHER_SCOPE.to_string(),
            aud: self.token_uri.clone(),
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };

        Ok(jsonwebtoken::encode(&header, &claims, &self.encoding_key)?)
    }

    async fn fetch_token(&self) -> Result<CachedToken> {
        let now = Utc::now();
        let assertion = self.sign_assertion(now)?;

        tracing::debug!("Requesting access token for {}", self.client_email);

        let response = self
            .client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to reach token endpoint: {}", e);
                e
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            tracing::error!("Token exchange failed (status {}): {}", status, error_text);
            return Err(Error::Auth(format!(
                "Token exchange failed (status {}): {}",
                status, error_text
            )));
        }

        let token: TokenResponse = response.json().await?;
        let value = token
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Auth("No access token in token response".to_string()))?;

        Ok(CachedToken {
            value,
            expires_at: now + Duration::seconds(token.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS)),
        })
    }
}

#[async_trait]
impl TokenProvider for ServiceAccountAuthenticator {
    async fn access_token(&self) -> Result<String> {
        let mut cache = self.cache.lock().await;

        if let Some(token) = cache.as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.value.clone());
            }
        }

        let token = self.fetch_token().await?;
        tracing::info!("Obtained access token for {}", self.client_email);
        let value = token.value.clone();
        *cache = Some(token);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const KEY_JSON: &str = include_str!("../../tests/fixtures/service_account.json");
    const PUBLIC_KEY: &str = include_str!("../../tests/fixtures/service_account_public.pem");

    fn make_authenticator(server: &MockServer) -> ServiceAccountAuthenticator {
        let key = ServiceAccountKey::from_json(KEY_JSON).unwrap();
        ServiceAccountAuthenticator::new(key, Client::new())
            .unwrap()
            .with_token_uri(format!("{}/token", server.uri()))
    }

    #[test]
    fn test_key_rejects_non_service_account_type() {
        let json = KEY_JSON.replace("\"service_account\"", "\"authorized_user\"");
        let err = ServiceAccountKey::from_json(&json).unwrap_err();
        assert!(err.to_string().contains("authorized_user"));
    }

    #[test]
    fn test_invalid_private_key_is_auth_error() {
        let mut key = ServiceAccountKey::from_json(KEY_JSON).unwrap();
        key.private_key = "not a pem".to_string();
        let err = ServiceAccountAuthenticator::new(key, Client::new())
            .err()
            .unwrap();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[test]
    fn test_assertion_is_signed_with_expected_claims() {
        let key = ServiceAccountKey::from_json(KEY_JSON).unwrap();
        let auth = ServiceAccountAuthenticator::new(key, Client::new()).unwrap();

        let now = Utc::now();
        let jwt = auth.sign_assertion(now).unwrap();

        let header = jsonwebtoken::decode_header(&jwt).unwrap();
        assert_eq!(header.alg, Algorithm::RS256);
        assert_eq!(header.kid.as_deref(), Some("test-key-id"));

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[DEFAULT_TOKEN_URI]);
        let decoded = jsonwebtoken::decode::<AssertionClaims>(
            &jwt,
            &DecodingKey::from_rsa_pem(PUBLIC_KEY.as_bytes()).unwrap(),
            &validation,
        )
        .unwrap();

        assert_eq!(
            decoded.claims.iss,
            "uploader@uploader-test.iam.gserviceaccount.com"
        );
        assert_eq!(decoded.claims.scope, ANDROID_PUBLISHER_SCOPE);
        assert_eq!(decoded.claims.iat, now.timestamp());
        assert_eq!(decoded.claims.exp - decoded.claims.iat, 3600);
    }

    #[tokio::test]
    async fn test_access_token_is_exchanged_once_and_cached() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains(
                "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer",
            ))
            .and(body_string_contains("assertion="))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.test-token",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let auth = make_authenticator(&server);

        assert_eq!(auth.access_token().await.unwrap(), "ya29.test-token");
        assert_eq!(auth.access_token().await.unwrap(), "ya29.test-token");
    }

    #[tokio::test]
    async fn test_token_near_expiry_is_refreshed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "short-lived",
                "expires_in": 30
            })))
            .expect(2)
            .mount(&server)
            .await;

        let auth = make_authenticator(&server);

        auth.access_token().await.unwrap();
        auth.access_token().await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_exchange_returns_auth_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Invalid JWT Signature."
            })))
            .mount(&server)
            .await;

        let auth = make_authenticator(&server);
        let err = auth.access_token().await.unwrap_err();

        assert!(matches!(err, Error::Auth(_)));
        assert!(err.to_string().contains("invalid_grant"));
    }

    #[tokio::test]
    async fn test_missing_access_token_returns_auth_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "expires_in": 3599
            })))
            .mount(&server)
            .await;

        let auth = make_authenticator(&server);
        let err = auth.access_token().await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }
}
