use super::types::{ApiErrorEnvelope, AppEdit, Bundle, TrackResource};
use super::PublisherService;
use crate::auth::TokenProvider;
use crate::models::validate_track_name;
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://androidpublisher.googleapis.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// REST client for the edits endpoints, authorized with a bearer token.
pub struct PublisherClient {
    client: Client,
    tokens: Arc<dyn TokenProvider>,
    base_url: String,
}

fn api_error(status: StatusCode, body: &str) -> Error {
    let message = serde_json::from_str::<ApiErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| match (envelope.error.status, envelope.error.message) {
            (Some(code), Some(message)) => Some(format!("{}: {}", code, message)),
            (None, Some(message)) => Some(message),
            _ => None,
        })
        .unwrap_or_else(|| body.to_string());

    Error::Api {
        status: status.as_u16(),
        message,
    }
}

impl PublisherClient {
    pub fn new(client: Client, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            client,
            tokens,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn edit_url(&self, package_name: &str, suffix: &str) -> String {
        format!(
            "{}/androidpublisher/v3/applications/{}/edits{}",
            self.base_url, package_name, suffix
        )
    }

    async fn execute(&self, request: RequestBuilder, action: &str) -> Result<Response> {
        let token = self.tokens.access_token().await?;

        let response = request.bearer_auth(token).send().await.map_err(|e| {
            tracing::error!("Failed to send {} request: {}", action, e);
            e
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            tracing::error!("{} failed (status {}): {}", action, status, error_text);
            return Err(api_error(status, &error_text));
        }

        Ok(response)
    }

    async fn execute_json<Resp: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        action: &str,
    ) -> Result<Resp> {
        let body = self.execute(request, action).await?.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Failed to parse {} response: {}\nBody: {}", action, e, body);
            Error::Serialization(e)
        })
    }

    fn empty_post(&self, url: String) -> RequestBuilder {
        // Google front ends reject body-less POSTs without a length (411).
        self.client
            .post(url)
            .timeout(REQUEST_TIMEOUT)
            .header(CONTENT_LENGTH, "0")
    }
}

#[async_trait]
impl PublisherService for PublisherClient {
    async fn insert_edit(&self, package_name: &str) -> Result<AppEdit> {
        tracing::debug!("Inserting edit for {}", package_name);

        let request = self
            .client
            .post(self.edit_url(package_name, ""))
            .timeout(REQUEST_TIMEOUT)
            .json(&serde_json::json!({}));

        self.execute_json(request, "edits.insert").await
    }

    async fn upload_bundle(
        &self,
        package_name: &str,
        edit_id: &str,
        data: Bytes,
    ) -> Result<Bundle> {
        tracing::debug!("Uploading {} byte bundle to edit {}", data.len(), edit_id);

        let url = format!(
            "{}/upload/androidpublisher/v3/applications/{}/edits/{}/bundles",
            self.base_url, package_name, edit_id
        );
        let request = self
            .client
            .post(url)
            .query(&[("uploadType", "media")])
            .timeout(UPLOAD_TIMEOUT)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(data);

        self.execute_json(request, "edits.bundles.upload").await
    }

    async fn update_track(
        &self,
        package_name: &str,
        edit_id: &str,
        track: &TrackResource,
    ) -> Result<TrackResource> {
        tracing::debug!("Updating track {} in edit {}", track.track, edit_id);
        validate_track_name(&track.track)?;

        let url = self.edit_url(package_name, &format!("/{}/tracks/{}", edit_id, track.track));
        let request = self.client.put(url).timeout(REQUEST_TIMEOUT).json(track);

        self.execute_json(request, "edits.tracks.update").await
    }

    async fn validate_edit(&self, package_name: &str, edit_id: &str) -> Result<AppEdit> {
        let url = self.edit_url(package_name, &format!("/{}:validate", edit_id));
        self.execute_json(self.empty_post(url), "edits.validate")
            .await
    }

    async fn commit_edit(
        &self,
        package_name: &str,
        edit_id: &str,
        changes_not_sent_for_review: bool,
    ) -> Result<AppEdit> {
        let url = self.edit_url(package_name, &format!("/{}:commit", edit_id));
        let mut request = self.empty_post(url);
        if changes_not_sent_for_review {
            request = request.query(&[("changesNotSentForReview", "true")]);
        }

        self.execute_json(request, "edits.commit").await
    }

    async fn delete_edit(&self, package_name: &str, edit_id: &str) -> Result<()> {
        let url = self.edit_url(package_name, &format!("/{}", edit_id));
        let request = self.client.delete(url).timeout(REQUEST_TIMEOUT);

        self.execute(request, "edits.delete").await?;
        Ok(())
    }
}
