use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::app_data::app_data;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub downloads: DownloadsConfig,
    #[serde(default)]
    pub platform: PlatformConfig,
}

/// Listing endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Override for the listing API base URL
    #[serde(default)]
    pub base_url: Option<String>,
    /// Items requested per page
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            page_size: default_page_size(),
        }
    }
}

fn default_page_size() -> u32 {
    app_data().feed.page_size
}

impl FeedConfig {
    /// Base URL to use, falling back to the embedded endpoint
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or(&app_data().api.base_url)
    }
}

/// Download behavior settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadsConfig {
    /// Override for the download directory
    #[serde(default)]
    pub directory: Option<String>,
    /// Post a notification when a download completes
    #[serde(default = "default_true")]
    pub notification: bool,
    /// Mark downloaded files for the media index
    #[serde(default = "default_true")]
    pub media_scannable: bool,
    /// Hand transfers to the platform download manager where one exists
    #[serde(default = "default_true")]
    pub use_download_manager: bool,
    /// Open a preview after the download (iOS variant only)
    #[serde(default = "default_true")]
    pub preview: bool,
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            directory: None,
            notification: true,
            media_scannable: true,
            use_download_manager: true,
            preview: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Platform overrides, mainly for emulating the mobile variants
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// "android", "ios" or "desktop"; detected when unset
    #[serde(default)]
    pub os: Option<String>,
    /// OS version (API level on Android)
    #[serde(default)]
    pub version: Option<u32>,
}

impl Config {
    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("com", "photofeed", "Photofeed")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        let config_dir = dirs.config_dir();
        std::fs::create_dir_all(config_dir)?;

        Ok(config_dir.join("config.toml"))
    }

    /// Load configuration from file
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config = Self::from_toml(&content)
                .with_context(|| format!("Invalid configuration in {:?}", path))?;
            tracing::info!("Loaded configuration from {:?}", path);
            Ok(config)
        } else {
            tracing::info!("No configuration file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Parse configuration text, filling in defaults for missing keys
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.feed.page_size, 10);
        assert!(config.feed.base_url.is_none());
        assert_eq!(config.feed.base_url(), "https://picsum.photos/v2");
        assert!(config.downloads.notification);
        assert!(config.downloads.media_scannable);
        assert!(config.platform.os.is_none());
    }

    #[test]
    fn test_partial_config() {
        let config = Config::from_toml(
            r#"
            [feed]
            base_url = "http://localhost:9000/v2"

            [platform]
            os = "android"
            version = 28
            "#,
        )
        .unwrap();

        assert_eq!(config.feed.base_url(), "http://localhost:9000/v2");
        assert_eq!(config.feed.page_size, 10);
        assert_eq!(config.platform.os.as_deref(), Some("android"));
        assert_eq!(config.platform.version, Some(28));
        assert!(config.downloads.preview);
    }

    #[test]
    fn test_round_trip_keeps_overrides() {
        let mut config = Config::default();
        config.downloads.directory = Some("/tmp/photos".to_string());
        config.downloads.notification = false;

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed = Config::from_toml(&text).unwrap();
        assert_eq!(parsed.downloads.directory.as_deref(), Some("/tmp/photos"));
        assert!(!parsed.downloads.notification);
    }
}
