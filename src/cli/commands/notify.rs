//! Notification screen command

use anyhow::Result;

use crate::cli::output::{print_formatted, OutputFormat};
use crate::notification::{NotificationScreen, TerminalNotifier};
use std::sync::Arc;

pub async fn run(title: &str, message: &str, format: OutputFormat, quiet: bool) -> Result<()> {
    let screen = NotificationScreen::new(Arc::new(TerminalNotifier));
    let notification = screen.show(title, message);

    // The terminal notifier already printed it
    if format == OutputFormat::Json || !quiet {
        print_formatted(&notification, format, |n| {
            format!("Received at {}", n.received_at.format("%Y-%m-%d %H:%M:%S"))
        });
    }
    Ok(())
}
