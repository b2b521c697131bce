//! Configuration and release data models
//!
//! Defines the release track and rollout options assigned to an uploaded
//! bundle, and the configuration resolved from the environment and CLI.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_BUNDLE_FILE: &str = "build/app/outputs/bundle/release/app-release.aab";

/// Release track a bundle is assigned to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Track {
    Internal,
    Alpha,
    Beta,
    Production,
    /// Closed testing tracks and form-factor tracks such as `wear:beta`.
    Custom(String),
}

impl Track {
    pub fn as_str(&self) -> &str {
        match self {
            Track::Internal => "internal",
            Track::Alpha => "alpha",
            Track::Beta => "beta",
            Track::Production => "production",
            Track::Custom(name) => name,
        }
    }
}

/// Track names reach the request path, so only the API's own alphabet is
/// accepted: ASCII letters, digits, `-`, `_` and a `:` form-factor prefix.
pub fn validate_track_name(name: &str) -> Result<()> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':'));
    let valid_parts = name.split(':').all(|part| !part.is_empty());

    if name.is_empty() || !valid_chars || !valid_parts || name.matches(':').count() > 1 {
        return Err(Error::Config(format!("Invalid track name '{}'", name)));
    }
    Ok(())
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Track {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim();
        match name.to_ascii_lowercase().as_str() {
            "" => Err(Error::Config("Track name must not be empty".to_string())),
            "internal" => Ok(Track::Internal),
            "alpha" => Ok(Track::Alpha),
            "beta" => Ok(Track::Beta),
            "production" => Ok(Track::Production),
            _ => {
                validate_track_name(name)?;
                Ok(Track::Custom(name.to_string()))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReleaseStatus {
    /// Released to every user of the track.
    #[default]
    Completed,
    Draft,
    Halted,
    /// Staged rollout to `user_fraction` of users.
    InProgress,
}

impl FromStr for ReleaseStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "completed" => Ok(ReleaseStatus::Completed),
            "draft" => Ok(ReleaseStatus::Draft),
            "halted" => Ok(ReleaseStatus::Halted),
            "inprogress" => Ok(ReleaseStatus::InProgress),
            _ => Err(Error::Config(format!(
                "Unknown release status '{}'. Expected completed, draft, halted or inProgress",
                s
            ))),
        }
    }
}

/// Localized "what's new" text attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseNote {
    pub language: String,
    pub text: String,
}

impl FromStr for ReleaseNote {
    type Err = Error;

    /// Parses `LANG=TEXT`, e.g. `en-US=Bug fixes`.
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('=') {
            Some((language, text)) if !language.trim().is_empty() && !text.is_empty() => {
                Ok(Self {
                    language: language.trim().to_string(),
                    text: text.to_string(),
                })
            }
            _ => Err(Error::Config(format!(
                "Invalid release note '{}'. Expected format: LANG=TEXT",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseOptions {
    pub track: Track,
    pub status: ReleaseStatus,
    pub user_fraction: Option<f64>,
    pub name: Option<String>,
    pub release_notes: Vec<ReleaseNote>,
}

impl Default for ReleaseOptions {
    fn default() -> Self {
        Self {
            track: Track::Internal,
            status: ReleaseStatus::Completed,
            user_fraction: None,
            name: None,
            release_notes: Vec::new(),
        }
    }
}

impl ReleaseOptions {
    pub fn validate(&self) -> Result<()> {
        match (self.status, self.user_fraction) {
            (ReleaseStatus::InProgress, None) => Err(Error::Config(
                "An inProgress release requires a user fraction".to_string(),
            )),
            (ReleaseStatus::InProgress | ReleaseStatus::Halted, Some(f))
                if !(f > 0.0 && f < 1.0) =>
            {
                Err(Error::Config(format!(
                    "User fraction must be between 0 and 1 (exclusive), got {}",
                    f
                )))
            }
            (ReleaseStatus::Completed | ReleaseStatus::Draft, Some(_)) => Err(Error::Config(
                "A user fraction is only allowed for inProgress or halted releases".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Values supplied on the command line; each one wins over its env counterpart.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub service_account_file: Option<PathBuf>,
    pub package_name: Option<String>,
    pub bundle_file: Option<PathBuf>,
    pub track: Option<Track>,
    pub status: Option<ReleaseStatus>,
    pub user_fraction: Option<f64>,
    pub release_name: Option<String>,
    pub release_notes: Vec<ReleaseNote>,
    pub validate_only: bool,
    pub changes_not_sent_for_review: bool,
}

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub service_account_file: PathBuf,
    pub package_name: String,
    pub bundle_file: PathBuf,
    pub release: ReleaseOptions,
    pub validate_only: bool,
    pub changes_not_sent_for_review: bool,
}

impl Config {
    /// Load `.env`, then resolve against the process environment.
    pub fn from_env(overrides: ConfigOverrides) -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::load(|key| std::env::var(key).ok(), overrides)
    }

    pub fn load<F>(lookup: F, overrides: ConfigOverrides) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let service_account_file = overrides
            .service_account_file
            .or_else(|| lookup("PLAY_SERVICE_ACCOUNT_FILE").map(PathBuf::from))
            .ok_or_else(|| {
                Error::Config(
                    "Service account file not set (--service-account or PLAY_SERVICE_ACCOUNT_FILE)"
                        .to_string(),
                )
            })?;

        let package_name = overrides
            .package_name
            .or_else(|| lookup("PLAY_PACKAGE_NAME"))
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| {
                Error::Config(
                    "Package name not set (--package-name or PLAY_PACKAGE_NAME)".to_string(),
                )
            })?;

        let bundle_file = overrides
            .bundle_file
            .or_else(|| lookup("PLAY_BUNDLE_FILE").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BUNDLE_FILE));

        let track = match overrides.track {
            Some(track) => track,
            None => lookup("PLAY_TRACK")
                .map(|t| t.parse::<Track>())
                .transpose()?
                .unwrap_or(Track::Internal),
        };

        let status = match overrides.status {
            Some(status) => status,
            None => lookup("PLAY_RELEASE_STATUS")
                .map(|s| s.parse::<ReleaseStatus>())
                .transpose()?
                .unwrap_or_default(),
        };

        let user_fraction = match overrides.user_fraction {
            Some(f) => Some(f),
            None => lookup("PLAY_USER_FRACTION")
                .map(|f| {
                    f.trim().parse::<f64>().map_err(|_| {
                        Error::Config(format!("Invalid PLAY_USER_FRACTION '{}'", f))
                    })
                })
                .transpose()?,
        };

        let release = ReleaseOptions {
            track,
            status,
            user_fraction,
            name: overrides
                .release_name
                .or_else(|| lookup("PLAY_RELEASE_NAME")),
            release_notes: overrides.release_notes,
        };
        release.validate()?;

        Ok(Self {
            service_account_file,
            package_name,
            bundle_file,
            release,
            validate_only: overrides.validate_only,
            changes_not_sent_for_review: overrides.changes_not_sent_for_review,
        })
    }
}
