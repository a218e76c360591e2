//! Platform detection and the capabilities derived from it.
//!
//! OS family and version are looked up once at start-up and turned into a
//! [`StorageCapabilities`] value. Everything downstream asks that value
//! instead of branching on the platform itself.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::app_data::app_data;
use crate::config::{DownloadsConfig, PlatformConfig};
use crate::permission::Permission;

/// Operating system family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Android,
    Ios,
    Desktop,
}

impl Os {
    /// OS family of the running binary
    pub fn current() -> Self {
        if cfg!(target_os = "android") {
            Os::Android
        } else if cfg!(target_os = "ios") {
            Os::Ios
        } else {
            Os::Desktop
        }
    }
}

impl FromStr for Os {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "android" => Ok(Os::Android),
            "ios" => Ok(Os::Ios),
            "desktop" => Ok(Os::Desktop),
            other => anyhow::bail!("Unknown OS '{}': expected android, ios or desktop", other),
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Os::Android => "android",
            Os::Ios => "ios",
            Os::Desktop => "desktop",
        };
        f.write_str(name)
    }
}

/// OS family plus version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlatformProfile {
    pub os: Os,
    pub version: u32,
}

impl PlatformProfile {
    /// Resolve the profile from config overrides, falling back to the host
    pub fn detect(config: &PlatformConfig) -> Result<Self> {
        let os = match &config.os {
            Some(name) => name.parse()?,
            None => Os::current(),
        };
        Ok(Self {
            os,
            version: config.version.unwrap_or(0),
        })
    }

    /// Android releases past the legacy threshold dropped the storage permission
    pub fn uses_scoped_storage(&self) -> bool {
        self.os == Os::Android && self.version > app_data().platform.legacy_storage_max_version
    }
}

/// Well-known directories downloads are written to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformDirs {
    pub downloads: PathBuf,
    pub documents: PathBuf,
}

impl PlatformDirs {
    /// Discover the user's download and document directories.
    ///
    /// A configured download directory wins. Missing user directories fall
    /// back to folders under the application data directory.
    pub fn discover(config: &DownloadsConfig) -> Result<Self> {
        let user = directories::UserDirs::new();
        let project = directories::ProjectDirs::from("com", "photofeed", "Photofeed")
            .context("Could not determine data directory")?;
        let data_dir = project.data_dir();

        let downloads = match &config.directory {
            Some(dir) => PathBuf::from(dir),
            None => user
                .as_ref()
                .and_then(|u| u.download_dir())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| data_dir.join("downloads")),
        };
        let documents = user
            .as_ref()
            .and_then(|u| u.document_dir())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| data_dir.join("documents"));

        Ok(Self {
            downloads,
            documents,
        })
    }
}

/// Storage behavior for one platform, resolved once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageCapabilities {
    pub profile: PlatformProfile,
    /// Permission guarding writes; `None` means no check applies
    pub storage_permission: Option<Permission>,
    pub camera_permission: Permission,
    pub download_dir: PathBuf,
    /// Directory that receives a duplicate of each download
    pub mirror_dir: Option<PathBuf>,
    /// Open the saved file after a download
    pub preview: bool,
    pub use_download_manager: bool,
    pub media_scannable: bool,
    pub notification: bool,
}

impl StorageCapabilities {
    pub fn resolve(profile: PlatformProfile, dirs: &PlatformDirs, downloads: &DownloadsConfig) -> Self {
        let storage_permission = match profile.os {
            Os::Android if profile.uses_scoped_storage() => None,
            Os::Android => Some(Permission::WriteExternalStorage),
            Os::Ios => Some(Permission::PhotoLibraryAddOnly),
            Os::Desktop => Some(Permission::WriteExternalStorage),
        };
        let is_ios = profile.os == Os::Ios;

        let capabilities = Self {
            profile,
            storage_permission,
            camera_permission: Permission::Camera,
            download_dir: dirs.downloads.clone(),
            mirror_dir: is_ios.then(|| dirs.documents.clone()),
            preview: is_ios && downloads.preview,
            use_download_manager: downloads.use_download_manager,
            media_scannable: downloads.media_scannable,
            notification: downloads.notification,
        };

        tracing::debug!(
            "Resolved storage for {} {}: permission {:?}, downloads in {:?}",
            profile.os,
            profile.version,
            capabilities.storage_permission,
            capabilities.download_dir
        );
        capabilities
    }
}
