//! Download-related application state

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::app_data::app_data;
use crate::download::{
    self, DownloadPhase, DownloadedFile, FetchOptions, TransferProgress,
};
use crate::notification::{Notification, Notifier};
use crate::permission::{GatePrompts, PermissionError, PermissionGate};
use crate::platform::StorageCapabilities;
use crate::state::{ApiResponse, StateEvent};
use crate::task::{PollResult, poll_task};

/// How one gated download ended
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadOutcome {
    Done(DownloadedFile),
    Failed(String),
    /// The permission gate stopped the download; alerts were already shown
    Aborted(PermissionError),
}

/// Everything a download needs, cheap to clone into a spawned task
#[derive(Clone)]
struct DownloadJob {
    client: reqwest::Client,
    gate: PermissionGate,
    capabilities: Arc<StorageCapabilities>,
    notifier: Arc<dyn Notifier>,
}

impl DownloadJob {
    async fn check_permission(&self) -> Result<(), PermissionError> {
        match self.capabilities.storage_permission {
            None => {
                tracing::debug!(
                    "Storage permission not required on {} {}",
                    self.capabilities.profile.os,
                    self.capabilities.profile.version
                );
                Ok(())
            }
            Some(permission) => self.gate.check(permission, &GatePrompts::storage()).await,
        }
    }

    async fn run(
        self,
        url: String,
        identifier: String,
        progress_tx: watch::Sender<TransferProgress>,
    ) -> DownloadOutcome {
        let _ = progress_tx.send(TransferProgress {
            phase: DownloadPhase::Checking,
            ..Default::default()
        });

        if let Err(e) = self.check_permission().await {
            tracing::info!("Download of {} aborted: {}", identifier, e);
            let _ = progress_tx.send(TransferProgress {
                phase: DownloadPhase::Aborted,
                ..Default::default()
            });
            return DownloadOutcome::Aborted(e);
        }

        let options = FetchOptions::for_image(&identifier, &self.capabilities);
        tracing::info!("Starting download: {} from {}", options.title, url);

        let mut file = match download::transfer(&self.client, &url, &options, &progress_tx).await {
            Ok(file) => file,
            Err(e) => {
                tracing::error!("Download of {} failed: {}", url, e);
                let _ = progress_tx.send(TransferProgress {
                    phase: DownloadPhase::Failed,
                    ..Default::default()
                });
                return DownloadOutcome::Failed(e.to_string());
            }
        };

        if let Some(dir) = &self.capabilities.mirror_dir {
            match download::mirror_into(&file.path, dir).await {
                Ok(copy) => file.mirror = Some(copy),
                Err(e) => tracing::warn!("Failed to copy {:?} into {:?}: {}", file.path, dir, e),
            }
        }

        if self.capabilities.preview {
            let target = file.mirror.as_ref().unwrap_or(&file.path);
            if let Err(e) = open::that(target) {
                tracing::warn!("Failed to open preview for {:?}: {}", target, e);
            }
        }

        if options.notification {
            let text = &app_data().alerts.download_complete;
            self.notifier.notify(&Notification::new(
                &text.title,
                text.message.replace("{file}", &options.title),
            ));
        }

        let _ = progress_tx.send(TransferProgress {
            phase: DownloadPhase::Done,
            bytes_downloaded: file.bytes,
            total_bytes: file.bytes,
            speed: 0,
        });
        DownloadOutcome::Done(file)
    }
}

/// Download-related state
pub struct DownloadGate {
    job: DownloadJob,
    /// Async task for a download started with `start`
    task: Option<JoinHandle<DownloadOutcome>>,
    /// Channel receiver for transfer progress
    progress_rx: Option<watch::Receiver<TransferProgress>>,
    /// Current transfer progress
    pub progress: TransferProgress,
    /// Result of the most recent download
    status: ApiResponse<Option<DownloadedFile>>,
}

impl DownloadGate {
    pub fn new(
        client: reqwest::Client,
        gate: PermissionGate,
        capabilities: StorageCapabilities,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            job: DownloadJob {
                client,
                gate,
                capabilities: Arc::new(capabilities),
                notifier,
            },
            task: None,
            progress_rx: None,
            progress: TransferProgress::default(),
            status: ApiResponse::default(),
        }
    }

    pub fn capabilities(&self) -> &StorageCapabilities {
        &self.job.capabilities
    }

    pub fn status(&self) -> &ApiResponse<Option<DownloadedFile>> {
        &self.status
    }

    /// Check if a download started with `start` is still running
    pub fn is_downloading(&self) -> bool {
        self.task.is_some()
    }

    /// Whether storage writes may proceed right now. Runs the full gate,
    /// including alerts and a permission request when the status is denied.
    pub async fn check_permission(&self) -> bool {
        self.job.check_permission().await.is_ok()
    }

    /// Download `url` as image `identifier` and wait for the outcome
    pub async fn download(&mut self, url: &str, identifier: &str) -> DownloadOutcome {
        let (progress_tx, progress_rx) = watch::channel(TransferProgress::default());
        self.status.begin();

        let outcome = self
            .job
            .clone()
            .run(url.to_string(), identifier.to_string(), progress_tx)
            .await;

        self.progress = progress_rx.borrow().clone();
        self.record(&outcome);
        outcome
    }

    /// Start a download in the background.
    /// Returns a status message event if started.
    pub fn start(&mut self, url: &str, identifier: &str) -> Option<StateEvent> {
        // Don't start if already downloading
        if self.task.is_some() {
            return None;
        }

        let (progress_tx, progress_rx) = watch::channel(TransferProgress::default());
        self.progress_rx = Some(progress_rx);
        self.progress = TransferProgress {
            phase: DownloadPhase::Checking,
            ..Default::default()
        };
        self.status.begin();

        let job = self.job.clone();
        let url = url.to_string();
        let identifier = identifier.to_string();
        let message = format!("Downloading image {}...", identifier);
        self.task = Some(tokio::spawn(job.run(url, identifier, progress_tx)));

        Some(StateEvent::StatusMessage(message))
    }

    /// Poll the download task for progress and completion
    pub fn poll(&mut self) -> Vec<StateEvent> {
        let mut events = Vec::new();

        if let Some(rx) = &mut self.progress_rx {
            if rx.has_changed().unwrap_or(false) {
                self.progress = rx.borrow_and_update().clone();
            }
        }

        match poll_task(&mut self.task) {
            PollResult::Complete(Ok(outcome)) => {
                if let Some(rx) = self.progress_rx.take() {
                    self.progress = rx.borrow().clone();
                }
                events.extend(self.record(&outcome));
            }
            PollResult::Complete(Err(e)) => {
                self.progress_rx = None;
                self.progress.phase = DownloadPhase::Failed;
                let msg = format!("Download task panicked: {}", e);
                events.push(StateEvent::LogError(msg.clone()));
                self.status.fail(msg);
            }
            PollResult::Pending | PollResult::NoTask => {}
        }

        events
    }

    fn record(&mut self, outcome: &DownloadOutcome) -> Vec<StateEvent> {
        let mut events = Vec::new();
        match outcome {
            DownloadOutcome::Done(file) => {
                events.push(StateEvent::StatusMessage(format!("Saved {}", file.path.display())));
                events.push(StateEvent::LogInfo(format!(
                    "Downloaded {} bytes to {}",
                    file.bytes,
                    file.path.display()
                )));
                self.status.succeed(Some(file.clone()));
            }
            DownloadOutcome::Failed(msg) => {
                events.push(StateEvent::LogError(format!("Download failed: {}", msg)));
                events.push(StateEvent::StatusMessage(format!("Download failed: {}", msg)));
                self.status.fail(msg.clone());
            }
            DownloadOutcome::Aborted(e) => {
                events.push(StateEvent::LogInfo(format!("Download aborted: {}", e)));
                self.status.reset();
            }
        }
        events
    }
}
