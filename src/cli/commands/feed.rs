//! Feed browsing commands

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::cli::output::{format_products, print_error, print_formatted, print_success, OutputFormat};
use crate::config::Config;
use crate::picsum::PicsumClient;
use crate::state::{FeedController, FeedSettings, FetchStatus, StateEvent, Viewport};

#[derive(Subcommand, Debug)]
pub enum FeedCommands {
    /// Fetch pages of the feed and print them
    List {
        /// Number of pages to load (stops at the page cap)
        #[arg(long, default_value = "1")]
        pages: u32,
    },

    /// Scroll through the feed, loading a page each time the end is reached
    Browse,
}

pub async fn run(command: FeedCommands, format: OutputFormat, quiet: bool) -> Result<()> {
    match command {
        FeedCommands::List { pages } => list(pages, format, quiet).await,
        FeedCommands::Browse => browse(format, quiet).await,
    }
}

fn controller() -> Result<FeedController> {
    let config = Config::load()?;
    let client =
        PicsumClient::new(config.feed.base_url()).context("Failed to create HTTP client")?;
    Ok(FeedController::new(client, FeedSettings::from_config(&config.feed)))
}

fn log_events(events: impl IntoIterator<Item = StateEvent>) {
    for event in events {
        tracing::debug!("{:?}", event);
    }
}

/// Fail the command when the last request failed
fn check_response(feed: &FeedController) -> Result<()> {
    if feed.response().status == FetchStatus::Fail {
        anyhow::bail!("{}", feed.response().error_message);
    }
    Ok(())
}

async fn list(pages: u32, format: OutputFormat, quiet: bool) -> Result<()> {
    let mut feed = controller()?;

    log_events(feed.get_products());
    log_events(feed.settle().await);

    for _ in 1..pages {
        if feed.response().status == FetchStatus::Fail {
            break;
        }
        match feed.load_more() {
            Some(event) => log_events([event]),
            None => {
                if !quiet {
                    eprintln!("Page cap reached after page {}", feed.page());
                }
                break;
            }
        }
        log_events(feed.settle().await);
    }

    check_response(&feed)?;

    print_formatted(feed.response(), format, |r| format_products(&r.data));
    Ok(())
}

async fn browse(format: OutputFormat, quiet: bool) -> Result<()> {
    let mut feed = controller()?;
    let visible = feed.settings().page_size as f32;
    let mut shown = 0;

    log_events(feed.get_products());
    loop {
        log_events(feed.settle().await);
        if let Err(e) = check_response(&feed) {
            print_error(&e.to_string());
            break;
        }

        let new_rows = &feed.products()[shown..];
        if format == OutputFormat::Text && !new_rows.is_empty() {
            print_success(&format!("-- page {} --", feed.page()), quiet);
            println!("{}\n", format_products(new_rows));
        }
        shown = feed.products().len();

        // Scroll to the bottom of what is displayed
        let content = shown as f32;
        let viewport = Viewport {
            offset: (content - visible).max(0.0),
            visible_length: visible,
            content_length: content,
        };
        match feed.on_end_reached(viewport) {
            Some(event) => log_events([event]),
            None => break,
        }
    }

    if format == OutputFormat::Json {
        print_formatted(feed.response(), format, |_| String::new());
    } else {
        print_success(&format!("End of feed: {} products", shown), quiet);
    }
    Ok(())
}
