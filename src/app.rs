use anyhow::{Context, Result};
use std::sync::Arc;

use crate::config::Config;
use crate::media::{DialogMediaSource, MediaSource};
use crate::notification::{NotificationScreen, Notifier, TerminalNotifier};
use crate::permission::{
    Alerts, FilesystemPermissions, PermissionGate, PermissionProvider, TerminalAlerts,
};
use crate::picsum::PicsumClient;
use crate::platform::{PlatformDirs, PlatformProfile, StorageCapabilities};
use crate::state::{
    DownloadGate, DownloadOutcome, FeedController, FeedSettings, ImagePicker, StateEvent,
};

/// Platform-facing services the screens are built on
pub struct Services {
    pub capabilities: StorageCapabilities,
    pub permissions: Arc<dyn PermissionProvider>,
    pub alerts: Arc<dyn Alerts>,
    pub notifier: Arc<dyn Notifier>,
    pub media: Arc<dyn MediaSource>,
}

impl Services {
    /// Resolve the platform once and build the terminal implementations
    pub fn detect(config: &Config) -> Result<Self> {
        let profile = PlatformProfile::detect(&config.platform)?;
        let dirs = PlatformDirs::discover(&config.downloads)?;
        let capabilities = StorageCapabilities::resolve(profile, &dirs, &config.downloads);
        tracing::info!(
            "Platform {} {}, downloads in {:?}",
            profile.os,
            profile.version,
            capabilities.download_dir
        );

        Ok(Self {
            permissions: Arc::new(FilesystemPermissions::new(&capabilities.download_dir)),
            capabilities,
            alerts: Arc::new(TerminalAlerts),
            notifier: Arc::new(TerminalNotifier),
            media: Arc::new(DialogMediaSource),
        })
    }
}

/// Main application state
pub struct App {
    pub feed: FeedController,
    pub download: DownloadGate,
    pub picker: ImagePicker,
    pub notifications: NotificationScreen,
    /// Status message for the status line
    status_message: String,
    /// Whether the start-up banner was already shown
    splash_dismissed: bool,
}

impl App {
    /// Load configuration and detect the platform
    pub fn load() -> Result<Self> {
        let config = Config::load().context("Failed to load configuration")?;
        let services = Services::detect(&config)?;
        Self::new(&config, services)
    }

    pub fn new(config: &Config, services: Services) -> Result<Self> {
        let client = PicsumClient::new(config.feed.base_url())
            .context("Failed to create HTTP client")?;
        let gate = PermissionGate::new(services.permissions, services.alerts);
        let notifications = NotificationScreen::new(services.notifier);

        let picker = ImagePicker::new(
            services.media,
            gate.clone(),
            services.capabilities.camera_permission,
        );
        let download = DownloadGate::new(
            client.client().clone(),
            gate,
            services.capabilities,
            Arc::new(notifications.clone()),
        );
        let feed = FeedController::new(client, FeedSettings::from_config(&config.feed));

        Ok(Self {
            feed,
            download,
            picker,
            notifications,
            status_message: "Ready".to_string(),
            splash_dismissed: false,
        })
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    /// Start-up banner. Returned on the first call only.
    pub fn dismiss_splash(&mut self) -> Option<String> {
        if self.splash_dismissed {
            return None;
        }
        self.splash_dismissed = true;
        Some(format!(
            "Photofeed v{}\nType 'help' for available commands, 'exit' to quit.",
            env!("CARGO_PKG_VERSION")
        ))
    }

    /// Apply events returned by the screens
    pub fn handle_events(&mut self, events: impl IntoIterator<Item = StateEvent>) {
        for event in events {
            match event {
                StateEvent::StatusMessage(msg) => self.status_message = msg,
                StateEvent::LogError(msg) => tracing::error!("{}", msg),
                StateEvent::LogInfo(msg) => tracing::info!("{}", msg),
                StateEvent::ProductsChanged { count } => {
                    tracing::debug!("Displaying {} products", count)
                }
            }
        }
    }

    /// Collect finished background work without waiting
    pub fn poll(&mut self) {
        let mut events = self.feed.poll();
        events.extend(self.download.poll());
        self.handle_events(events);
    }

    /// Wait for every outstanding listing request
    pub async fn settle(&mut self) {
        let events = self.feed.settle().await;
        self.handle_events(events);
    }

    /// Download a displayed product by id and wait for the outcome
    pub async fn download_product(&mut self, id: &str) -> Result<DownloadOutcome> {
        let product = self
            .feed
            .find(id)
            .with_context(|| format!("No product with id {} is displayed", id))?;
        let url = product.download_url.clone();

        let outcome = self.download.download(&url, id).await;
        let event = match &outcome {
            DownloadOutcome::Done(file) => {
                StateEvent::StatusMessage(format!("Saved {}", file.path.display()))
            }
            DownloadOutcome::Failed(msg) => {
                StateEvent::StatusMessage(format!("Download failed: {}", msg))
            }
            DownloadOutcome::Aborted(e) => {
                StateEvent::StatusMessage(format!("Download cancelled: {}", e))
            }
        };
        self.handle_events([event]);
        Ok(outcome)
    }
}
