//! Image picker screen state

use std::sync::Arc;
use thiserror::Error;

use crate::media::{MediaSource, PickedAsset, PickerOptions, PickerResponse};
use crate::permission::{GatePrompts, Permission, PermissionError, PermissionGate};
use crate::state::StateEvent;

/// Errors reported by a picker launch
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PickError {
    #[error("User cancelled image picker")]
    UserCancelled,

    #[error("Image picker failed ({code}): {message}")]
    Picker { code: String, message: String },

    #[error("Image picker returned no assets")]
    NoAsset,
}

/// How a pick attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickOutcome {
    Picked(PickedAsset),
    Cancelled,
    Failed(PickError),
    NotPermitted(PermissionError),
}

/// Holds the most recently picked image
pub struct ImagePicker {
    source: Arc<dyn MediaSource>,
    gate: PermissionGate,
    camera_permission: Permission,
    options: PickerOptions,
    picked: Option<PickedAsset>,
}

impl ImagePicker {
    pub fn new(source: Arc<dyn MediaSource>, gate: PermissionGate, camera_permission: Permission) -> Self {
        Self {
            source,
            gate,
            camera_permission,
            options: PickerOptions::default(),
            picked: None,
        }
    }

    /// The last picked image
    pub fn picked(&self) -> Option<&PickedAsset> {
        self.picked.as_ref()
    }

    /// Launch the photo library
    pub async fn pick_from_gallery(&mut self) -> PickOutcome {
        let response = self.source.launch_library(&self.options).await;
        self.accept(response)
    }

    /// Pass the camera gate, then launch the camera
    pub async fn capture_from_camera(&mut self) -> PickOutcome {
        if let Err(e) = self
            .gate
            .check(self.camera_permission, &GatePrompts::camera())
            .await
        {
            tracing::info!("Camera not opened: {}", e);
            return PickOutcome::NotPermitted(e);
        }

        let response = self.source.launch_camera(&self.options).await;
        self.accept(response)
    }

    fn accept(&mut self, response: PickerResponse) -> PickOutcome {
        match read_response(response) {
            Ok(asset) => {
                tracing::info!(
                    "Picked image {} ({:?} bytes, {:?}x{:?})",
                    asset.uri,
                    asset.file_size,
                    asset.width,
                    asset.height
                );
                self.picked = Some(asset.clone());
                PickOutcome::Picked(asset)
            }
            Err(PickError::UserCancelled) => {
                tracing::debug!("{}", PickError::UserCancelled);
                PickOutcome::Cancelled
            }
            Err(e) => {
                tracing::error!("{}", e);
                PickOutcome::Failed(e)
            }
        }
    }
}

impl PickOutcome {
    /// Status line for the shell
    pub fn to_event(&self) -> StateEvent {
        match self {
            PickOutcome::Picked(asset) => StateEvent::StatusMessage(format!("Picked {}", asset.uri)),
            PickOutcome::Cancelled => StateEvent::StatusMessage("Picker cancelled".to_string()),
            PickOutcome::Failed(e) => StateEvent::LogError(e.to_string()),
            PickOutcome::NotPermitted(e) => StateEvent::LogInfo(e.to_string()),
        }
    }
}

fn read_response(response: PickerResponse) -> Result<PickedAsset, PickError> {
    if response.did_cancel {
        return Err(PickError::UserCancelled);
    }
    if let Some(code) = response.error_code {
        return Err(PickError::Picker {
            code,
            message: response.error_message.unwrap_or_default(),
        });
    }
    response
        .assets
        .into_iter()
        .next()
        .ok_or(PickError::NoAsset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::test_support::{RecordingAlerts, ScriptedPermissions};
    use crate::permission::{AlertAction, PermissionStatus};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays one canned response per launch
    struct FakeSource {
        library: PickerResponse,
        camera: PickerResponse,
        launches: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl MediaSource for FakeSource {
        async fn launch_library(&self, options: &PickerOptions) -> PickerResponse {
            assert_eq!(options.selection_limit, 1);
            self.launches.lock().unwrap().push("library");
            self.library.clone()
        }

        async fn launch_camera(&self, _options: &PickerOptions) -> PickerResponse {
            self.launches.lock().unwrap().push("camera");
            self.camera.clone()
        }
    }

    fn asset(uri: &str) -> PickedAsset {
        PickedAsset {
            uri: uri.to_string(),
            file_name: uri.rsplit('/').next().map(str::to_string),
            width: Some(640),
            height: Some(480),
            file_size: Some(2048),
        }
    }

    fn picked(uris: &[&str]) -> PickerResponse {
        PickerResponse {
            assets: uris.iter().map(|u| asset(u)).collect(),
            ..Default::default()
        }
    }

    fn make_picker(
        library: PickerResponse,
        camera: PickerResponse,
        camera_status: PermissionStatus,
    ) -> (ImagePicker, Arc<FakeSource>, Arc<RecordingAlerts>) {
        let source = Arc::new(FakeSource {
            library,
            camera,
            launches: Mutex::new(Vec::new()),
        });
        let alerts = Arc::new(RecordingAlerts::answering(AlertAction::Dismiss));
        let provider = Arc::new(ScriptedPermissions::new(camera_status, PermissionStatus::Denied));
        let gate = PermissionGate::new(provider, alerts.clone());
        (ImagePicker::new(source.clone(), gate, Permission::Camera), source, alerts)
    }

    #[tokio::test]
    async fn test_gallery_keeps_first_asset() {
        let (mut picker, _, _) = make_picker(
            picked(&["file:///a.jpg", "file:///b.jpg"]),
            PickerResponse::default(),
            PermissionStatus::Granted,
        );

        assert_eq!(
            picker.pick_from_gallery().await,
            PickOutcome::Picked(asset("file:///a.jpg"))
        );
        let kept = picker.picked().unwrap();
        assert_eq!(kept.uri, "file:///a.jpg");
        assert_eq!(kept.file_name.as_deref(), Some("a.jpg"));
        assert_eq!((kept.width, kept.height), (Some(640), Some(480)));
        assert_eq!(kept.file_size, Some(2048));
    }

    #[tokio::test]
    async fn test_cancel_keeps_previous_pick() {
        let (mut picker, _, _) = make_picker(
            PickerResponse::cancelled(),
            picked(&["file:///cam.jpg"]),
            PermissionStatus::Granted,
        );

        assert_eq!(
            picker.capture_from_camera().await,
            PickOutcome::Picked(asset("file:///cam.jpg"))
        );
        assert_eq!(picker.pick_from_gallery().await, PickOutcome::Cancelled);
        assert_eq!(picker.picked(), Some(&asset("file:///cam.jpg")));
    }

    #[tokio::test]
    async fn test_error_code_is_a_failure() {
        let (mut picker, _, _) = make_picker(
            PickerResponse::error("permission", "no access"),
            PickerResponse::default(),
            PermissionStatus::Granted,
        );

        let outcome = picker.pick_from_gallery().await;
        assert_eq!(
            outcome,
            PickOutcome::Failed(PickError::Picker {
                code: "permission".to_string(),
                message: "no access".to_string(),
            })
        );
        assert!(matches!(outcome.to_event(), StateEvent::LogError(_)));
        assert_eq!(picker.picked(), None);
    }

    #[tokio::test]
    async fn test_camera_unavailable_never_launches() {
        let (mut picker, source, alerts) = make_picker(
            PickerResponse::default(),
            picked(&["file:///cam.jpg"]),
            PermissionStatus::Unavailable,
        );

        assert_eq!(
            picker.capture_from_camera().await,
            PickOutcome::NotPermitted(PermissionError::Unavailable(Permission::Camera))
        );
        assert!(source.launches.lock().unwrap().is_empty());
        assert_eq!(alerts.shown()[0].message, "This feature is not available");
    }

    #[tokio::test]
    async fn test_camera_denied_request_refused() {
        let (mut picker, source, _) = make_picker(
            PickerResponse::default(),
            picked(&["file:///cam.jpg"]),
            PermissionStatus::Denied,
        );

        assert_eq!(
            picker.capture_from_camera().await,
            PickOutcome::NotPermitted(PermissionError::Denied(Permission::Camera))
        );
        assert!(source.launches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_assets() {
        let (mut picker, _, _) =
            make_picker(PickerResponse::default(), PickerResponse::default(), PermissionStatus::Granted);
        assert_eq!(
            picker.pick_from_gallery().await,
            PickOutcome::Failed(PickError::NoAsset)
        );
    }
}
