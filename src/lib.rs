//! Publishes Android App Bundles to Google Play
//!
//! Authenticates as a service account, uploads a bundle into a Play Developer
//! API edit, assigns its version code to a release track and commits the edit.

pub mod app;
pub mod auth;
pub mod error;
pub mod models;
pub mod publisher;

pub use error::{Error, Result};
