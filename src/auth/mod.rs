//! Google service account authentication
//!
//! Exchanges a signed service-account assertion for an OAuth2 access token
//! scoped to the Play Developer API.

pub mod mock;
pub mod service_account;

pub use mock::StaticTokenProvider;
pub use service_account::{ServiceAccountAuthenticator, ServiceAccountKey};

use crate::Result;
use async_trait::async_trait;

pub const ANDROID_PUBLISHER_SCOPE: &str = "https://www.googleapis.com/auth/androidpublisher";

#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns a bearer token valid for at least the next request.
    async fn access_token(&self) -> Result<String>;
}
