//! Output formatting utilities for CLI

use serde::Serialize;
use std::io::IsTerminal;

use crate::download::TransferProgress;
use crate::media::PickedAsset;
use crate::picsum::Product;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Print a serializable value as JSON or use custom text formatter
pub fn print_formatted<T, F>(value: &T, format: OutputFormat, text_formatter: F)
where
    T: Serialize + ?Sized,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Text => println!("{}", text_formatter(value)),
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(value) {
                println!("{}", json);
            }
        }
    }
}

/// Print a success message (suppressed in quiet mode)
pub fn print_success(message: &str, quiet: bool) {
    if !quiet {
        println!("{}", message);
    }
}

/// Print an error message (never suppressed)
pub fn print_error(message: &str) {
    eprintln!("Error: {}", message);
}

/// Progress lines only make sense for a person watching a terminal
pub fn should_show_progress(quiet: bool, format: OutputFormat) -> bool {
    !quiet && format == OutputFormat::Text && std::io::stderr().is_terminal()
}

/// Format bytes as human-readable size
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// One feed row: id, author and dimensions
pub fn format_product(product: &Product) -> String {
    format!(
        "ID: {}\nAuthor: {}\ndn: {} X {}",
        product.id, product.author, product.width, product.height
    )
}

/// Feed rows separated by blank lines
pub fn format_products(products: &[Product]) -> String {
    if products.is_empty() {
        return "No products".to_string();
    }
    products
        .iter()
        .map(format_product)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// A picked image: URI, then whatever metadata could be read
pub fn format_asset(asset: &PickedAsset) -> String {
    let mut lines = vec![asset.uri.clone()];
    if let (Some(width), Some(height)) = (asset.width, asset.height) {
        lines.push(format!("Dimensions: {} X {}", width, height));
    }
    if let Some(size) = asset.file_size {
        lines.push(format!("Size: {}", format_size(size)));
    }
    lines.join("\n")
}

/// Single-line progress for a running transfer
pub fn format_progress(progress: &TransferProgress) -> String {
    if progress.total_bytes > 0 {
        format!(
            "{} {} / {} ({:.0}%) {}/s",
            progress.phase.description(),
            format_size(progress.bytes_downloaded),
            format_size(progress.total_bytes),
            progress.fraction() * 100.0,
            format_size(progress.speed)
        )
    } else {
        format!(
            "{} {}",
            progress.phase.description(),
            format_size(progress.bytes_downloaded)
        )
    }
}
