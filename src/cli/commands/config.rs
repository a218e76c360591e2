//! Configuration management commands

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;

use crate::cli::output::{print_formatted, print_success, OutputFormat};
use crate::config::Config;
use crate::platform::Os;

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Get a specific config value
    Get {
        /// Config key (e.g., "feed.page_size", "platform.os")
        key: String,
    },

    /// Set a config value
    Set {
        /// Config key (e.g., "feed.page_size", "platform.os")
        key: String,

        /// Value to set ("none" clears optional values)
        value: String,
    },

    /// Show config file path
    Path,
}

#[derive(Serialize)]
struct ConfigPathResult {
    path: String,
    exists: bool,
}

pub async fn run(command: ConfigCommands, format: OutputFormat, quiet: bool) -> Result<()> {
    match command {
        ConfigCommands::Show => show(format),
        ConfigCommands::Get { key } => get(&key, format),
        ConfigCommands::Set { key, value } => set(&key, &value, quiet),
        ConfigCommands::Path => path(format),
    }
}

fn show(format: OutputFormat) -> Result<()> {
    let config = Config::load()?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
        OutputFormat::Text => println!("{}", toml::to_string_pretty(&config)?),
    }

    Ok(())
}

fn get(key: &str, format: OutputFormat) -> Result<()> {
    let config = Config::load()?;
    let value = get_config_value(&config, key)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&value)?),
        OutputFormat::Text => println!("{}", value),
    }

    Ok(())
}

fn optional(value: &Option<impl ToString>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "<not set>".to_string())
}

fn get_config_value(config: &Config, key: &str) -> Result<String> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["feed", "base_url"] => Ok(config.feed.base_url().to_string()),
        ["feed", "page_size"] => Ok(config.feed.page_size.to_string()),
        ["downloads", "directory"] => Ok(optional(&config.downloads.directory)),
        ["downloads", "notification"] => Ok(config.downloads.notification.to_string()),
        ["downloads", "media_scannable"] => Ok(config.downloads.media_scannable.to_string()),
        ["downloads", "use_download_manager"] => {
            Ok(config.downloads.use_download_manager.to_string())
        }
        ["downloads", "preview"] => Ok(config.downloads.preview.to_string()),
        ["platform", "os"] => Ok(optional(&config.platform.os)),
        ["platform", "version"] => Ok(optional(&config.platform.version)),
        _ => anyhow::bail!("Unknown config key: {}", key),
    }
}

fn set(key: &str, value: &str, quiet: bool) -> Result<()> {
    let mut config = Config::load()?;

    set_config_value(&mut config, key, value)?;
    config.save()?;

    print_success(&format!("Set {} = {}", key, value), quiet);
    Ok(())
}

/// `None` for the literal "none", otherwise the value itself
fn clearable(value: &str) -> Option<&str> {
    if value.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(value)
    }
}

fn set_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["feed", "base_url"] => {
            config.feed.base_url = clearable(value).map(str::to_string);
        }
        ["feed", "page_size"] => {
            let size: u32 = value.parse()?;
            if size == 0 {
                anyhow::bail!("feed.page_size must be at least 1");
            }
            config.feed.page_size = size;
        }
        ["downloads", "directory"] => {
            config.downloads.directory = clearable(value).map(str::to_string);
        }
        ["downloads", "notification"] => {
            config.downloads.notification = value.parse()?;
        }
        ["downloads", "media_scannable"] => {
            config.downloads.media_scannable = value.parse()?;
        }
        ["downloads", "use_download_manager"] => {
            config.downloads.use_download_manager = value.parse()?;
        }
        ["downloads", "preview"] => {
            config.downloads.preview = value.parse()?;
        }
        ["platform", "os"] => {
            config.platform.os = match clearable(value) {
                Some(os) => Some(os.parse::<Os>()?.to_string()),
                None => None,
            };
        }
        ["platform", "version"] => {
            config.platform.version = clearable(value).map(str::parse::<u32>).transpose()?;
        }
        _ => anyhow::bail!("Unknown or read-only config key: {}", key),
    }

    Ok(())
}

fn path(format: OutputFormat) -> Result<()> {
    let path = Config::config_path()?;
    let exists = path.exists();

    let result = ConfigPathResult {
        path: path.to_string_lossy().to_string(),
        exists,
    };

    print_formatted(&result, format, |r| {
        format!("{}{}", r.path, if r.exists { "" } else { " (not found)" })
    });

    Ok(())
}
