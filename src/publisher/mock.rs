use super::types::{AppEdit, Bundle, TrackResource};
use super::PublisherService;
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::{Arc, Mutex};

/// In-memory publisher that records every call in order.
#[derive(Clone)]
pub struct MockPublisherClient {
    calls: Arc<Mutex<Vec<String>>>,
    version_code: i64,
    upload_failures: Arc<Mutex<Vec<u16>>>,
    track_failure: Option<u16>,
    commit_failure: Option<u16>,
    committed_edit_id: Option<String>,
    delete_failure: Option<u16>,
    uploaded: Arc<Mutex<Vec<Vec<u8>>>>,
    tracks: Arc<Mutex<Vec<TrackResource>>>,
}

fn injected(status: u16, operation: &str) -> Error {
    Error::Api {
        status,
        message: format!("injected {} failure", operation),
    }
}

impl MockPublisherClient {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            version_code: 1,
            upload_failures: Arc::new(Mutex::new(Vec::new())),
            track_failure: None,
            commit_failure: None,
            committed_edit_id: None,
            delete_failure: None,
            uploaded: Arc::new(Mutex::new(Vec::new())),
            tracks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_version_code(mut self, version_code: i64) -> Self {
        self.version_code = version_code;
        self
    }

    /// Queue a failing status for the next upload; queued failures are consumed in order.
    pub fn with_upload_failure(self, status: u16) -> Self {
        self.upload_failures.lock().unwrap().push(status);
        self
    }

    pub fn with_track_failure(mut self, status: u16) -> Self {
        self.track_failure = Some(status);
        self
    }

    pub fn with_commit_failure(mut self, status: u16) -> Self {
        self.commit_failure = Some(status);
        self
    }

    /// Answer commits with this edit id instead of echoing the request's.
    pub fn with_committed_edit_id(mut self, edit_id: &str) -> Self {
        self.committed_edit_id = Some(edit_id.to_string());
        self
    }

    pub fn with_delete_failure(mut self, status: u16) -> Self {
        self.delete_failure = Some(status);
        self
    }

    pub fn get_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn get_uploaded(&self) -> Vec<Vec<u8>> {
        self.uploaded.lock().unwrap().clone()
    }

    pub fn get_tracks(&self) -> Vec<TrackResource> {
        self.tracks.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Default for MockPublisherClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PublisherService for MockPublisherClient {
    async fn insert_edit(&self, package_name: &str) -> Result<AppEdit> {
        self.record(format!("insert:{}", package_name));
        Ok(AppEdit {
            id: "mock-edit".to_string(),
            expiry_time_seconds: None,
        })
    }

    async fn upload_bundle(
        &self,
        _package_name: &str,
        edit_id: &str,
        data: Bytes,
    ) -> Result<Bundle> {
        self.record(format!("upload:{}", edit_id));

        let failure = {
            let mut failures = self.upload_failures.lock().unwrap();
            if failures.is_empty() {
                None
            } else {
                Some(failures.remove(0))
            }
        };
        if let Some(status) = failure {
            return Err(injected(status, "upload"));
        }

        self.uploaded.lock().unwrap().push(data.to_vec());
        Ok(Bundle {
            version_code: self.version_code,
            sha1: None,
            sha256: None,
        })
    }

    async fn update_track(
        &self,
        _package_name: &str,
        edit_id: &str,
        track: &TrackResource,
    ) -> Result<TrackResource> {
        self.record(format!("track:{}:{}", edit_id, track.track));
        if let Some(status) = self.track_failure {
            return Err(injected(status, "track"));
        }

        self.tracks.lock().unwrap().push(track.clone());
        Ok(track.clone())
    }

    async fn validate_edit(&self, _package_name: &str, edit_id: &str) -> Result<AppEdit> {
        self.record(format!("validate:{}", edit_id));
        Ok(AppEdit {
            id: edit_id.to_string(),
            expiry_time_seconds: None,
        })
    }

    async fn commit_edit(
        &self,
        _package_name: &str,
        edit_id: &str,
        changes_not_sent_for_review: bool,
    ) -> Result<AppEdit> {
        self.record(format!("commit:{}:{}", edit_id, changes_not_sent_for_review));
        if let Some(status) = self.commit_failure {
            return Err(injected(status, "commit"));
        }

        Ok(AppEdit {
            id: self
                .committed_edit_id
                .clone()
                .unwrap_or_else(|| edit_id.to_string()),
            expiry_time_seconds: None,
        })
    }

    async fn delete_edit(&self, _package_name: &str, edit_id: &str) -> Result<()> {
        self.record(format!("delete:{}", edit_id));
        match self.delete_failure {
            Some(status) => Err(injected(status, "delete")),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_records_calls_in_order() {
        let publisher = MockPublisherClient::new().with_version_code(9);

        let edit = publisher.insert_edit("com.example.app").await.unwrap();
        let bundle = publisher
            .upload_bundle("com.example.app", &edit.id, Bytes::from_static(b"aab"))
            .await
            .unwrap();
        publisher
            .commit_edit("com.example.app", &edit.id, false)
            .await
            .unwrap();

        assert_eq!(bundle.version_code, 9);
        assert_eq!(
            publisher.get_calls(),
            vec![
                "insert:com.example.app",
                "upload:mock-edit",
                "commit:mock-edit:false"
            ]
        );
        assert_eq!(publisher.get_uploaded(), vec![b"aab".to_vec()]);
    }

    #[tokio::test]
    async fn test_mock_upload_failures_are_consumed() {
        let publisher = MockPublisherClient::new().with_upload_failure(503);

        let err = publisher
            .upload_bundle("com.example.app", "e", Bytes::from_static(b"aab"))
            .await
            .unwrap_err();
        assert!(err.is_transient());

        assert!(publisher
            .upload_bundle("com.example.app", "e", Bytes::from_static(b"aab"))
            .await
            .is_ok());
    }
}
