//! Application orchestration for publishing a bundle through a Play edit.

use crate::auth::{ServiceAccountAuthenticator, ServiceAccountKey};
use crate::models::{Config, Track};
use crate::publisher::{Bundle, PublisherClient, PublisherService, TrackRelease, TrackResource};
use crate::{Error, Result};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::{strategy::FixedInterval, RetryIf};
use tracing::{error, info, warn};

const MAX_UPLOAD_RETRIES: usize = 3;
const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(2000);

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadReport {
    pub edit_id: String,
    pub version_code: i64,
    pub track: Track,
    /// False when the edit was only validated and then discarded.
    pub committed: bool,
}

/// Drives one edit from creation to commit.
pub struct App {
    publisher: Box<dyn PublisherService>,
    config: Config,
    retry_interval: Duration,
}

impl App {
    /// Build an app around an existing publisher, e.g. a mock in tests.
    pub fn with_services(publisher: Box<dyn PublisherService>, config: Config) -> Self {
        Self {
            publisher,
            config,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }

    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    /// Load the service account credentials and wire up the REST publisher.
    pub fn new(config: Config) -> Result<Self> {
        info!(
            "Authenticating with service account from {}",
            config.service_account_file.display()
        );
        let key = ServiceAccountKey::from_file(&config.service_account_file)?;

        let http_client = reqwest::Client::new();
        let authenticator = ServiceAccountAuthenticator::new(key, http_client.clone())?;
        info!("Using service account {}", authenticator.client_email());

        let publisher = PublisherClient::new(http_client, Arc::new(authenticator));
        Ok(Self::with_services(Box::new(publisher), config))
    }

    pub async fn run(&self) -> Result<UploadReport> {
        let bundle = self.read_bundle().await?;
        let package_name = &self.config.package_name;

        info!("Creating edit for package: {}", package_name);
        let edit = self.publisher.insert_edit(package_name).await?;
        info!("Edit ID: {}", edit.id);

        match self.publish(&edit.id, &bundle).await {
            Ok(report) => Ok(report),
            Err(e) => {
                error!("Publishing failed: {}", e);
                self.abort_edit(&edit.id).await;
                Err(e)
            }
        }
    }

    async fn read_bundle(&self) -> Result<Bytes> {
        let path = &self.config.bundle_file;

        if path.extension().and_then(|ext| ext.to_str()) != Some("aab") {
            warn!("Bundle file {} does not have an .aab extension", path.display());
        }

        let data = tokio::fs::read(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Config(format!("Bundle file not found: {}", path.display()))
            } else {
                Error::Io(e)
            }
        })?;

        if data.is_empty() {
            return Err(Error::Config(format!(
                "Bundle file is empty: {}",
                path.display()
            )));
        }

        info!("Read bundle {} ({} bytes)", path.display(), data.len());
        Ok(Bytes::from(data))
    }

    async fn publish(&self, edit_id: &str, bundle: &Bytes) -> Result<UploadReport> {
        let package_name = &self.config.package_name;
        let release = &self.config.release;

        info!("Uploading bundle: {}", self.config.bundle_file.display());
        let uploaded = self.upload_with_retry(edit_id, bundle).await?;
        info!(
            "Bundle uploaded successfully. Version code: {}",
            uploaded.version_code
        );

        info!("Assigning to {} track ({:?})...", release.track, release.status);
        let track = TrackResource {
            track: release.track.to_string(),
            releases: vec![TrackRelease::new(release, uploaded.version_code)],
        };
        self.publisher
            .update_track(package_name, edit_id, &track)
            .await?;
        info!("Bundle assigned to {} track", release.track);

        let committed = if self.config.validate_only {
            info!("Validating the edit...");
            self.publisher.validate_edit(package_name, edit_id).await?;
            info!("Edit is valid; discarding it without committing");
            self.abort_edit(edit_id).await;
            false
        } else {
            info!("Committing the edit...");
            let edit = self
                .publisher
                .commit_edit(
                    package_name,
                    edit_id,
                    self.config.changes_not_sent_for_review,
                )
                .await?;
            // The edit is already committed at this point.
            if edit.id != edit_id {
                warn!(
                    "Commit response names edit {} but edit {} was committed",
                    edit.id, edit_id
                );
            }
            true
        };

        Ok(UploadReport {
            edit_id: edit_id.to_string(),
            version_code: uploaded.version_code,
            track: release.track.clone(),
            committed,
        })
    }

    async fn upload_with_retry(&self, edit_id: &str, bundle: &Bytes) -> Result<Bundle> {
        let retry_strategy = FixedInterval::new(self.retry_interval).take(MAX_UPLOAD_RETRIES);
        let package_name = self.config.package_name.as_str();

        RetryIf::spawn(
            retry_strategy,
            move || {
                self.publisher
                    .upload_bundle(package_name, edit_id, bundle.clone())
            },
            |e: &Error| {
                let transient = e.is_transient();
                if transient {
                    warn!("Bundle upload attempt failed: {}", e);
                }
                transient
            },
        )
        .await
    }

    /// Best effort: a leftover edit expires on its own.
    async fn abort_edit(&self, edit_id: &str) {
        match self
            .publisher
            .delete_edit(&self.config.package_name, edit_id)
            .await
        {
            Ok(()) => info!("Deleted edit {}", edit_id),
            Err(e) => warn!("Could not delete edit {}: {}", edit_id, e),
        }
    }
}
