//! Interactive shell mode for photofeed
//!
//! The shell keeps one [`App`] alive, so the feed, the picked image and the
//! latest notification persist between commands.

use anyhow::Result;
use clap::Parser;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Config, Editor, Helper};

use super::commands;
use super::output::{format_asset, format_products, format_size, print_error};
use super::{Cli, Commands};
use crate::app::App;
use crate::state::{DownloadOutcome, PickOutcome, Viewport};

/// Command completer for the shell
#[derive(Default)]
struct ShellCompleter {
    commands: Vec<(&'static str, Vec<&'static str>)>,
}

impl ShellCompleter {
    fn new() -> Self {
        Self {
            commands: vec![
                ("products", vec![]),
                ("more", vec![]),
                ("refresh", vec![]),
                ("list", vec![]),
                ("scroll", vec![]),
                ("download", vec![]),
                ("permission", vec![]),
                ("pick", vec!["gallery", "camera"]),
                ("notify", vec![]),
                ("status", vec![]),
                ("config", vec!["show", "get", "set", "path"]),
                ("diag", vec!["paths", "platform"]),
                ("help", vec![]),
                ("exit", vec![]),
                ("quit", vec![]),
            ],
        }
    }

    fn candidates<'a>(names: impl Iterator<Item = &'a str>, prefix: &str) -> Vec<Pair> {
        names
            .filter(|name| name.starts_with(prefix))
            .map(|name| Pair {
                display: name.to_string(),
                replacement: name.to_string(),
            })
            .collect()
    }
}

impl Completer for ShellCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];
        let words: Vec<&str> = line.split_whitespace().collect();
        let start = line.rfind(' ').map(|i| i + 1).unwrap_or(0);

        match (words.as_slice(), line.ends_with(' ')) {
            ([], _) => Ok((0, Self::candidates(self.commands.iter().map(|(c, _)| *c), ""))),
            ([prefix], false) => Ok((
                start,
                Self::candidates(self.commands.iter().map(|(c, _)| *c), prefix),
            )),
            ([cmd], true) | ([cmd, _], false) => {
                let prefix = if line.ends_with(' ') { "" } else { words[1] };
                match self.commands.iter().find(|(c, _)| c == cmd) {
                    Some((_, subs)) => Ok((start, Self::candidates(subs.iter().copied(), prefix))),
                    None => Ok((pos, vec![])),
                }
            }
            _ => Ok((pos, vec![])),
        }
    }
}

impl Hinter for ShellCompleter {
    type Hint = String;

    fn hint(&self, _line: &str, _pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        None
    }
}

impl Highlighter for ShellCompleter {}
impl Validator for ShellCompleter {}
impl Helper for ShellCompleter {}

/// Parse a command line into arguments, handling quotes
fn parse_args(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut quote_char = ' ';

    for c in line.chars() {
        match c {
            '"' | '\'' if !in_quotes => {
                in_quotes = true;
                quote_char = c;
            }
            c if c == quote_char && in_quotes => {
                in_quotes = false;
            }
            ' ' if !in_quotes => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }

    if !current.is_empty() {
        args.push(current);
    }

    args
}

/// State that lives for the whole shell session
struct Session {
    app: App,
    /// Scroll offset into the feed, in rows
    offset: f32,
    /// Number of products already printed
    printed: usize,
}

impl Session {
    fn viewport(&self) -> Viewport {
        let visible = self.app.feed.settings().page_size as f32;
        let content = self.app.feed.products().len() as f32;
        Viewport {
            offset: self.offset.min((content - visible).max(0.0)),
            visible_length: visible,
            content_length: content,
        }
    }

    /// Wait for the feed, then print the status line and any new rows
    async fn settle_feed(&mut self) {
        self.app.settle().await;

        let products = self.app.feed.products();
        if products.len() < self.printed {
            // The list was replaced by a refresh
            self.printed = 0;
            self.offset = 0.0;
        }
        if products.len() > self.printed {
            println!("{}\n", format_products(&products[self.printed..]));
            self.printed = products.len();
        }
        self.print_status();
    }

    fn print_status(&self) {
        let response = self.app.feed.response();
        let mut line = format!(
            "[{}] {} | page {} | {} products",
            response.status.label(),
            self.app.status_message(),
            self.app.feed.page(),
            self.app.feed.products().len()
        );
        if !response.error_message.is_empty() {
            line.push_str(&format!(" | {}", response.error_message));
        }
        if self.app.feed.is_refreshing() {
            line.push_str(" | refreshing");
        } else if self.app.feed.is_loading() {
            line.push_str(&format!(" | {} requests in flight", self.app.feed.in_flight()));
        }
        println!("{}", line);
    }

    fn print_details(&self) {
        self.print_status();

        let download = self.app.download.status();
        println!(
            "Download: {} ({})",
            download.status.label(),
            self.app.download.progress.phase.description()
        );
        if let Some(file) = &download.data {
            println!("  last file: {}", file.path.display());
        }
        println!("  saving to: {}", self.app.download.capabilities().download_dir.display());
        match self.app.picker.picked() {
            Some(asset) => println!("Picked image: {}", format_asset(asset).replace('\n', "\n  ")),
            None => println!("Picked image: <none>"),
        }
        if let Some(n) = self.app.notifications.latest() {
            println!(
                "Latest notification: [{}] {}: {}",
                n.received_at.format("%H:%M:%S"),
                n.title,
                n.body
            );
        }
    }
}

/// Run a single command in the shell.
/// Returns Ok(true) to continue, Ok(false) to exit gracefully.
async fn run_command(session: &mut Session, args: Vec<String>) -> Result<bool> {
    let Some(cmd) = args.first().map(String::as_str) else {
        return Ok(true);
    };

    match cmd {
        "help" => print_help(),
        "exit" | "quit" => return Ok(false),
        "products" => {
            let event = session.app.feed.get_products();
            if event.is_none() {
                println!("No more pages");
            }
            session.app.handle_events(event);
            session.settle_feed().await;
        }
        "more" => match session.app.feed.load_more() {
            Some(event) => {
                session.app.handle_events([event]);
                session.settle_feed().await;
            }
            None => println!("No more pages"),
        },
        "refresh" => {
            let event = session.app.feed.refresh();
            session.app.handle_events([event]);
            session.settle_feed().await;
        }
        "list" => {
            println!("{}", format_products(session.app.feed.products()));
            session.printed = session.app.feed.products().len();
        }
        "scroll" => {
            let rows: f32 = match args.get(1) {
                Some(n) => n.parse()?,
                None => session.app.feed.settings().page_size as f32,
            };
            session.offset = (session.offset + rows).max(0.0);
            let viewport = session.viewport();
            session.offset = viewport.offset;
            match session.app.feed.on_end_reached(viewport) {
                Some(event) => {
                    session.app.handle_events([event]);
                    session.settle_feed().await;
                }
                None => println!(
                    "Row {:.0} of {:.0}",
                    viewport.offset + viewport.visible_length.min(viewport.content_length),
                    viewport.content_length
                ),
            }
        }
        "download" => {
            let Some(id) = args.get(1) else {
                anyhow::bail!("Usage: download <id>");
            };
            match session.app.download_product(id).await? {
                DownloadOutcome::Done(file) => {
                    println!("Saved {} ({})", file.path.display(), format_size(file.bytes));
                    if let Some(mirror) = file.mirror {
                        println!("Copied to {}", mirror.display());
                    }
                }
                DownloadOutcome::Failed(msg) => print_error(&msg),
                DownloadOutcome::Aborted(_) => println!("{}", session.app.status_message()),
            }
        }
        "permission" => {
            if session.app.download.check_permission().await {
                println!("Storage writes allowed");
            } else {
                println!("Storage writes not allowed");
            }
        }
        "pick" => {
            let outcome = match args.get(1).map(String::as_str) {
                Some("gallery") => session.app.picker.pick_from_gallery().await,
                Some("camera") => session.app.picker.capture_from_camera().await,
                _ => anyhow::bail!("Usage: pick gallery|camera"),
            };
            session.app.handle_events([outcome.to_event()]);
            match &outcome {
                PickOutcome::Picked(asset) => println!("{}", format_asset(asset)),
                _ => println!("{}", session.app.status_message()),
            }
        }
        "notify" => {
            if args.len() < 2 {
                anyhow::bail!("Usage: notify <message>");
            }
            session.app.notifications.show("Notification", &args[1..].join(" "));
        }
        "status" => {
            session.app.poll();
            session.print_details();
        }
        "config" | "diag" => run_cli_command(args).await?,
        other => println!("Unknown command '{}'. Type 'help' for available commands.", other),
    }

    Ok(true)
}

/// Commands that don't touch the session go through clap
async fn run_cli_command(args: Vec<String>) -> Result<()> {
    // Build a fake argv for clap: ["photofeed", ...args]
    let argv = std::iter::once("photofeed".to_string()).chain(args);

    let cli = match Cli::try_parse_from(argv) {
        Ok(cli) => cli,
        Err(e) => {
            // Print clap's error message (includes usage hints)
            println!("{}", e);
            return Ok(());
        }
    };

    let format = cli.output.format();
    let quiet = cli.output.quiet;

    match cli.command {
        Some(Commands::Config { command }) => commands::config::run(command, format, quiet).await,
        Some(Commands::Diag { command }) => commands::diag::run(command, format, quiet).await,
        _ => Ok(()),
    }
}

fn print_help() {
    println!(
        r#"Photofeed Interactive Shell

Feed:
  products                 Get products (first page, or the next one)
  more                     Load the next page
  refresh                  Reload from page 1
  list                     Print every displayed product
  scroll [rows]            Scroll down; loads more near the end

Screens:
  download <id>            Download a displayed product
  permission               Check (and request) storage permission
  pick gallery|camera      Pick an image
  notify <message>         Show a notification
  status                   Show feed, download, picker and notification state

Other:
  config show|get|set|path Configuration (accepts --json)
  diag paths|platform      Diagnostics (accepts --json)
  help                     Show this help
  exit, quit               Exit the shell
"#
    );
}

/// Get the history file path
pub fn history_path() -> Option<std::path::PathBuf> {
    directories::ProjectDirs::from("com", "photofeed", "Photofeed")
        .map(|dirs| dirs.data_dir().join("shell_history"))
}

/// Run the interactive shell
pub async fn run() -> Result<()> {
    let mut app = App::load()?;
    if let Some(banner) = app.dismiss_splash() {
        println!("{}\n", banner);
    }
    let mut session = Session {
        app,
        offset: 0.0,
        printed: 0,
    };

    let config = Config::builder()
        .history_ignore_space(true)
        .completion_type(rustyline::CompletionType::List)
        .build();

    let mut rl = Editor::with_config(config)?;
    rl.set_helper(Some(ShellCompleter::new()));

    // Load history
    if let Some(path) = history_path() {
        let _ = rl.load_history(&path);
    }

    loop {
        match rl.readline("photofeed> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                rl.add_history_entry(line)?;

                let args = parse_args(line);
                match run_command(&mut session, args).await {
                    Ok(true) => continue,
                    Ok(false) => break,
                    Err(e) => print_error(&e.to_string()),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("exit");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    // Save history
    if let Some(path) = history_path() {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = rl.save_history(&path);
    }

    Ok(())
}
