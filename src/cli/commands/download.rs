//! One-shot image download

use anyhow::{Context, Result};
use std::io::Write;
use std::time::Duration;

use crate::app::Services;
use crate::cli::output::{
    format_progress, format_size, print_formatted, print_success, should_show_progress,
    OutputFormat,
};
use crate::config::Config;
use crate::download::{DownloadPhase, TransferProgress};
use crate::permission::PermissionGate;
use crate::picsum::PicsumClient;
use crate::state::{DownloadGate, FetchStatus};

/// How often the progress line is redrawn
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub async fn run(url: &str, id: &str, format: OutputFormat, quiet: bool) -> Result<()> {
    let config = Config::load()?;
    let services = Services::detect(&config)?;
    let client =
        PicsumClient::new(config.feed.base_url()).context("Failed to create HTTP client")?;

    let mut gate = DownloadGate::new(
        client.client().clone(),
        PermissionGate::new(services.permissions, services.alerts),
        services.capabilities,
        services.notifier,
    );

    let show_progress = should_show_progress(quiet, format);
    if let Some(event) = gate.start(url, id) {
        tracing::debug!("{:?}", event);
    }

    while gate.is_downloading() {
        tokio::time::sleep(POLL_INTERVAL).await;
        for event in gate.poll() {
            tracing::debug!("{:?}", event);
        }
        if !show_progress {
            continue;
        }
        if let Some(line) = progress_line(&gate.progress) {
            eprint!("\r{:<60}", line);
            let _ = std::io::stderr().flush();
        }
    }
    if show_progress {
        eprintln!();
    }

    let status = gate.status();
    match status.status {
        FetchStatus::Success => {
            print_formatted(status, format, |s| match &s.data {
                Some(file) => {
                    let mut line =
                        format!("Saved {} ({})", file.path.display(), format_size(file.bytes));
                    if let Some(mirror) = &file.mirror {
                        line.push_str(&format!("\nCopied to {}", mirror.display()));
                    }
                    line
                }
                None => "Saved".to_string(),
            });
            Ok(())
        }
        FetchStatus::Fail => anyhow::bail!("{}", status.error_message),
        FetchStatus::Initial | FetchStatus::Loading => {
            print_success("Download cancelled", quiet);
            Ok(())
        }
    }
}

/// Redrawn progress text, or None while the permission check may be prompting
fn progress_line(progress: &TransferProgress) -> Option<String> {
    match progress.phase {
        DownloadPhase::Checking => None,
        _ => Some(format_progress(progress)),
    }
}
