//! Application data embedded from TOML at compile time.
//!
//! These constants define *how the application works* (API endpoint, page
//! cap, file naming, alert copy) and are not user-configurable. User choices
//! live in `config.rs`.
//!
//! The data file is `embedded/app.toml`, parsed lazily on first access.

use serde::Deserialize;
use std::sync::OnceLock;

const APP_TOML: &str = include_str!("../embedded/app.toml");

/// All embedded application constants
#[derive(Debug, Deserialize)]
pub struct AppData {
    pub api: ApiData,
    pub feed: FeedData,
    pub download: DownloadData,
    pub platform: PlatformData,
    pub alerts: AlertsData,
}

#[derive(Debug, Deserialize)]
pub struct ApiData {
    pub base_url: String,
    pub list_path: String,
}

#[derive(Debug, Deserialize)]
pub struct FeedData {
    pub first_page: u32,
    pub page_size: u32,
    /// Pages at or above this number are never requested
    pub max_page_exclusive: u32,
    /// Fraction of the visible length from the end at which more is loaded
    pub end_reached_threshold: f32,
}

#[derive(Debug, Deserialize)]
pub struct DownloadData {
    pub file_prefix: String,
    pub file_extension: String,
    pub temp_extension: String,
    pub progress_interval_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct PlatformData {
    pub legacy_storage_max_version: u32,
}

#[derive(Debug, Deserialize)]
pub struct AlertsData {
    pub feature_unavailable: AlertText,
    pub storage_blocked: AlertText,
    pub download_complete: AlertText,
}

/// Title and body of a user-facing message
#[derive(Debug, Clone, Deserialize)]
pub struct AlertText {
    pub title: String,
    pub message: String,
}

/// Get application data (lazy-loaded)
pub fn app_data() -> &'static AppData {
    static DATA: OnceLock<AppData> = OnceLock::new();
    DATA.get_or_init(|| {
        toml::from_str(APP_TOML).unwrap_or_else(|e| {
            panic!("Failed to parse app.toml: {}", e);
        })
    })
}
