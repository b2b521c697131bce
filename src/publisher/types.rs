//! androidpublisher v3 payload types used by the edit workflow.

use crate::models::{ReleaseNote, ReleaseOptions, ReleaseStatus};
use serde::{Deserialize, Serialize};

/// An open transaction on an app's Play Console state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppEdit {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_time_seconds: Option<String>,
}

/// Result of a bundle upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    pub version_code: i64,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRelease {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// int64 values, encoded as strings on the wire.
    #[serde(default)]
    pub version_codes: Vec<String>,
    pub status: ReleaseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_fraction: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub release_notes: Vec<ReleaseNote>,
}

impl TrackRelease {
    pub fn new(options: &ReleaseOptions, version_code: i64) -> Self {
        Self {
            name: options.name.clone(),
            version_codes: vec![version_code.to_string()],
            status: options.status,
            user_fraction: options.user_fraction,
            release_notes: options.release_notes.clone(),
        }
    }
}

/// Track resource, used as both the update body and its response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackResource {
    pub track: String,
    #[serde(default)]
    pub releases: Vec<TrackRelease>,
}

/// Google's standard JSON error envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorEnvelope {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub message: Option<String>,
    pub status: Option<String>,
}
