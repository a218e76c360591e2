//! Permission gate for protected platform capabilities.
//!
//! A gated action checks the current status, then:
//! - `unavailable` shows an informational alert and stops
//! - `blocked` shows an alert (optionally offering system settings) and stops
//! - `denied` requests the permission once and proceeds only if granted
//! - anything else proceeds
//!
//! Statuses are never cached; every gated action asks the provider again.

use async_trait::async_trait;
use serde::Serialize;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::app_data::{AlertText, app_data};

/// A protected capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Permission {
    Camera,
    PhotoLibraryAddOnly,
    WriteExternalStorage,
}

/// Result of checking or requesting a permission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    Unavailable,
    Blocked,
    Denied,
    Granted,
    Limited,
}

/// Why a gated action did not proceed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PermissionError {
    #[error("{0:?} is not available on this device")]
    Unavailable(Permission),

    #[error("{0:?} was blocked; it can be re-enabled in system settings")]
    Blocked(Permission),

    #[error("{0:?} was denied")]
    Denied(Permission),
}

/// Platform permission system
#[async_trait]
pub trait PermissionProvider: Send + Sync {
    async fn check(&self, permission: Permission) -> PermissionStatus;

    /// Ask the user; returns the status after the prompt
    async fn request(&self, permission: Permission) -> PermissionStatus;

    fn open_settings(&self) -> anyhow::Result<()>;
}

/// Button on an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertAction {
    Dismiss,
    OpenSettings,
}

/// A user-facing alert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub message: String,
    pub actions: Vec<AlertAction>,
}

impl Alert {
    pub fn info(text: &AlertText) -> Self {
        Self {
            title: text.title.clone(),
            message: text.message.clone(),
            actions: vec![AlertAction::Dismiss],
        }
    }

    pub fn with_settings(text: &AlertText) -> Self {
        Self {
            title: text.title.clone(),
            message: text.message.clone(),
            actions: vec![AlertAction::Dismiss, AlertAction::OpenSettings],
        }
    }
}

/// Presents alerts and reports which action was chosen
pub trait Alerts: Send + Sync {
    fn show(&self, alert: &Alert) -> AlertAction;
}

/// Alert copy used by one kind of gated action
#[derive(Debug, Clone)]
pub struct GatePrompts {
    pub unavailable: Alert,
    pub blocked: Alert,
}

impl GatePrompts {
    /// Storage writes: blocked offers a shortcut to settings
    pub fn storage() -> Self {
        let alerts = &app_data().alerts;
        Self {
            unavailable: Alert::info(&alerts.feature_unavailable),
            blocked: Alert::with_settings(&alerts.storage_blocked),
        }
    }

    /// Camera: unavailable and blocked read the same
    pub fn camera() -> Self {
        let alerts = &app_data().alerts;
        Self {
            unavailable: Alert::info(&alerts.feature_unavailable),
            blocked: Alert::info(&alerts.feature_unavailable),
        }
    }
}

/// Check-then-request sequence in front of a protected capability
#[derive(Clone)]
pub struct PermissionGate {
    provider: Arc<dyn PermissionProvider>,
    alerts: Arc<dyn Alerts>,
}

impl PermissionGate {
    pub fn new(provider: Arc<dyn PermissionProvider>, alerts: Arc<dyn Alerts>) -> Self {
        Self { provider, alerts }
    }

    /// Run the gate for `permission`. Alerts are shown here; callers only
    /// need to stop on `Err`.
    pub async fn check(
        &self,
        permission: Permission,
        prompts: &GatePrompts,
    ) -> Result<(), PermissionError> {
        let status = self.provider.check(permission).await;
        tracing::debug!("Permission {:?} status: {:?}", permission, status);

        match status {
            PermissionStatus::Unavailable => {
                self.present(&prompts.unavailable).await;
                Err(PermissionError::Unavailable(permission))
            }
            PermissionStatus::Blocked => {
                if self.present(&prompts.blocked).await == AlertAction::OpenSettings {
                    if let Err(e) = self.provider.open_settings() {
                        tracing::warn!("Failed to open settings: {}", e);
                    }
                }
                Err(PermissionError::Blocked(permission))
            }
            PermissionStatus::Denied => {
                let result = self.provider.request(permission).await;
                tracing::debug!("Permission {:?} request result: {:?}", permission, result);
                if result == PermissionStatus::Granted {
                    Ok(())
                } else {
                    Err(PermissionError::Denied(permission))
                }
            }
            PermissionStatus::Granted | PermissionStatus::Limited => Ok(()),
        }
    }

    /// Show an alert on the blocking pool; terminal alerts wait on stdin
    async fn present(&self, alert: &Alert) -> AlertAction {
        let alerts = Arc::clone(&self.alerts);
        let alert = alert.clone();
        match tokio::task::spawn_blocking(move || alerts.show(&alert)).await {
            Ok(action) => action,
            Err(e) => {
                tracing::warn!("Alert task failed: {}", e);
                AlertAction::Dismiss
            }
        }
    }
}

/// Desktop permissions, derived from what the filesystem allows.
///
/// Storage is granted when the download directory is writable, denied when
/// it does not exist yet (a request creates it) and blocked when it exists
/// but cannot be written. There is no camera.
pub struct FilesystemPermissions {
    dir: PathBuf,
}

impl FilesystemPermissions {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn storage_status(&self) -> PermissionStatus {
        if !self.dir.exists() {
            return PermissionStatus::Denied;
        }
        if !self.dir.is_dir() {
            return PermissionStatus::Unavailable;
        }

        // Quick check that we can write to the directory
        let test_file = self.dir.join(".photofeed_write_test");
        match tokio::fs::write(&test_file, b"test").await {
            Ok(_) => {
                let _ = tokio::fs::remove_file(&test_file).await;
                PermissionStatus::Granted
            }
            Err(e) => {
                tracing::debug!("Write test in {:?} failed: {}", self.dir, e);
                PermissionStatus::Blocked
            }
        }
    }
}

#[async_trait]
impl PermissionProvider for FilesystemPermissions {
    async fn check(&self, permission: Permission) -> PermissionStatus {
        match permission {
            Permission::Camera => PermissionStatus::Unavailable,
            Permission::PhotoLibraryAddOnly | Permission::WriteExternalStorage => {
                self.storage_status().await
            }
        }
    }

    async fn request(&self, permission: Permission) -> PermissionStatus {
        if permission == Permission::Camera {
            return PermissionStatus::Unavailable;
        }
        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            tracing::warn!("Failed to create {:?}: {}", self.dir, e);
            return PermissionStatus::Denied;
        }
        self.storage_status().await
    }

    fn open_settings(&self) -> anyhow::Result<()> {
        open::that(&self.dir)?;
        Ok(())
    }
}

/// Alerts printed to the terminal. The settings action is offered as a y/N
/// question when stdin is interactive.
#[derive(Default)]
pub struct TerminalAlerts;

impl Alerts for TerminalAlerts {
    fn show(&self, alert: &Alert) -> AlertAction {
        eprintln!("{}: {}", alert.title, alert.message);

        if !alert.actions.contains(&AlertAction::OpenSettings) || !std::io::stdin().is_terminal() {
            return AlertAction::Dismiss;
        }

        eprint!("Open settings? [y/N] ");
        let _ = std::io::stderr().flush();
        let mut answer = String::new();
        if std::io::stdin().read_line(&mut answer).is_err() {
            return AlertAction::Dismiss;
        }
        if answer.trim().eq_ignore_ascii_case("y") {
            AlertAction::OpenSettings
        } else {
            AlertAction::Dismiss
        }
    }
}
