use anyhow::Result;
use clap::Parser;
use playstore_uploader::app::App;
use playstore_uploader::models::{Config, ConfigOverrides, ReleaseNote, ReleaseStatus, Track};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "playstore-uploader")]
#[command(about = "Upload an Android App Bundle to a Google Play release track")]
struct CliArgs {
    /// Service account JSON key [env: PLAY_SERVICE_ACCOUNT_FILE]
    #[arg(long = "service-account", value_name = "PATH")]
    service_account_file: Option<PathBuf>,

    /// Application ID, e.g. com.example.app [env: PLAY_PACKAGE_NAME]
    #[arg(long)]
    package_name: Option<String>,

    /// Bundle to upload [env: PLAY_BUNDLE_FILE]
    #[arg(long = "bundle", value_name = "PATH")]
    bundle_file: Option<PathBuf>,

    /// internal, alpha, beta, production or a custom track name [env: PLAY_TRACK]
    #[arg(long, value_parser = parse_track)]
    track: Option<Track>,

    /// completed, draft, halted or inProgress [env: PLAY_RELEASE_STATUS]
    #[arg(long, value_parser = parse_status)]
    status: Option<ReleaseStatus>,

    /// Rollout fraction for inProgress/halted releases [env: PLAY_USER_FRACTION]
    #[arg(long)]
    user_fraction: Option<f64>,

    /// Release name shown in Play Console [env: PLAY_RELEASE_NAME]
    #[arg(long)]
    release_name: Option<String>,

    /// Release notes as LANG=TEXT; may be repeated.
    #[arg(long = "release-note", value_name = "LANG=TEXT", value_parser = parse_release_note)]
    release_notes: Vec<ReleaseNote>,

    /// Validate the edit and discard it instead of committing.
    #[arg(long)]
    validate_only: bool,

    /// Commit without sending the changes for review.
    #[arg(long)]
    changes_not_sent_for_review: bool,
}

impl From<CliArgs> for ConfigOverrides {
    fn from(args: CliArgs) -> Self {
        Self {
            service_account_file: args.service_account_file,
            package_name: args.package_name,
            bundle_file: args.bundle_file,
            track: args.track,
            status: args.status,
            user_fraction: args.user_fraction,
            release_name: args.release_name,
            release_notes: args.release_notes,
            validate_only: args.validate_only,
            changes_not_sent_for_review: args.changes_not_sent_for_review,
        }
    }
}

fn parse_track(input: &str) -> std::result::Result<Track, String> {
    input.parse().map_err(|e: playstore_uploader::Error| e.to_string())
}

fn parse_status(input: &str) -> std::result::Result<ReleaseStatus, String> {
    input.parse().map_err(|e: playstore_uploader::Error| e.to_string())
}

fn parse_release_note(input: &str) -> std::result::Result<ReleaseNote, String> {
    input.parse().map_err(|e: playstore_uploader::Error| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "playstore_uploader=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();

    let config = match Config::from_env(args.into()) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    match App::new(config) {
        Ok(app) => match app.run().await {
            Ok(report) if report.committed => {
                info!(
                    "Successfully uploaded to Google Play {} track! Edit ID: {}",
                    report.track.as_str().to_uppercase(),
                    report.edit_id
                );
                Ok(())
            }
            Ok(report) => {
                info!(
                    "Validation passed for version code {} on {} track; nothing was committed",
                    report.version_code, report.track
                );
                Ok(())
            }
            Err(e) => {
                error!("Upload failed: {}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            error!("Failed to initialize uploader: {}", e);
            std::process::exit(1);
        }
    }
}
