//! Diagnostic and debugging commands

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;

use crate::cli::output::{print_formatted, OutputFormat};
use crate::config::Config;
use crate::permission::Permission;
use crate::platform::{PlatformDirs, PlatformProfile, StorageCapabilities};

#[derive(Subcommand, Debug)]
pub enum DiagCommands {
    /// Show all data paths (config, history, downloads)
    Paths,

    /// Show the detected platform and the storage rules derived from it
    Platform,
}

#[derive(Serialize)]
struct PathsResult {
    config_file: String,
    shell_history: Option<String>,
    downloads_dir: String,
    documents_dir: String,
}

#[derive(Serialize)]
struct PlatformResult {
    profile: PlatformProfile,
    scoped_storage: bool,
    storage_permission: Option<Permission>,
    camera_permission: Permission,
    download_dir: String,
    mirror_dir: Option<String>,
    preview: bool,
    notification: bool,
}

pub async fn run(command: DiagCommands, format: OutputFormat, _quiet: bool) -> Result<()> {
    match command {
        DiagCommands::Paths => paths(format),
        DiagCommands::Platform => platform(format),
    }
}

fn paths(format: OutputFormat) -> Result<()> {
    let config = Config::load()?;
    let dirs = PlatformDirs::discover(&config.downloads)?;

    let result = PathsResult {
        config_file: Config::config_path()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| "<error>".to_string()),
        shell_history: crate::cli::shell::history_path().map(|p| p.to_string_lossy().to_string()),
        downloads_dir: dirs.downloads.to_string_lossy().to_string(),
        documents_dir: dirs.documents.to_string_lossy().to_string(),
    };

    print_formatted(&result, format, |r| {
        [
            format!("Config file:    {}", r.config_file),
            format!(
                "Shell history:  {}",
                r.shell_history.as_deref().unwrap_or("<unavailable>")
            ),
            format!("Downloads dir:  {}", r.downloads_dir),
            format!("Documents dir:  {}", r.documents_dir),
        ]
        .join("\n")
    });

    Ok(())
}

fn platform(format: OutputFormat) -> Result<()> {
    let config = Config::load()?;
    let profile = PlatformProfile::detect(&config.platform)?;
    let dirs = PlatformDirs::discover(&config.downloads)?;
    let caps = StorageCapabilities::resolve(profile, &dirs, &config.downloads);

    let result = PlatformResult {
        profile,
        scoped_storage: profile.uses_scoped_storage(),
        storage_permission: caps.storage_permission,
        camera_permission: caps.camera_permission,
        download_dir: caps.download_dir.to_string_lossy().to_string(),
        mirror_dir: caps.mirror_dir.map(|p| p.to_string_lossy().to_string()),
        preview: caps.preview,
        notification: caps.notification,
    };

    print_formatted(&result, format, |r| {
        let permission = match r.storage_permission {
            Some(p) => format!("{:?}", p),
            None => "none (scoped storage)".to_string(),
        };
        let mut lines = vec![
            format!("Platform:           {} {}", r.profile.os, r.profile.version),
            format!("Storage permission: {}", permission),
            format!("Camera permission:  {:?}", r.camera_permission),
            format!("Download dir:       {}", r.download_dir),
        ];
        if let Some(mirror) = &r.mirror_dir {
            lines.push(format!("Mirror dir:         {}", mirror));
        }
        lines.push(format!("Preview:            {}", r.preview));
        lines.push(format!("Notification:       {}", r.notification));
        lines.join("\n")
    });

    Ok(())
}
