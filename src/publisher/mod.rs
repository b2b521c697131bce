//! Google Play Developer API (androidpublisher v3) integration
//!
//! Covers the edit workflow: open an edit, upload a bundle into it, point a
//! track at the new version code, then commit (or validate and discard).

pub mod client;
pub mod mock;
pub mod types;

pub use client::PublisherClient;
pub use mock::MockPublisherClient;
pub use types::{AppEdit, Bundle, TrackRelease, TrackResource};

use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;

#[async_trait]
pub trait PublisherService: Send + Sync {
    async fn insert_edit(&self, package_name: &str) -> Result<AppEdit>;
    /// `data` is reference-counted so retries share one buffer.
    async fn upload_bundle(&self, package_name: &str, edit_id: &str, data: Bytes)
        -> Result<Bundle>;
    async fn update_track(
        &self,
        package_name: &str,
        edit_id: &str,
        track: &TrackResource,
    ) -> Result<TrackResource>;
    async fn validate_edit(&self, package_name: &str, edit_id: &str) -> Result<AppEdit>;
    async fn commit_edit(
        &self,
        package_name: &str,
        edit_id: &str,
        changes_not_sent_for_review: bool,
    ) -> Result<AppEdit>;
    async fn delete_edit(&self, package_name: &str, edit_id: &str) -> Result<()>;
}
