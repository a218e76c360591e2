//! Media sources for the image picker.

use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Kind of media a picker may return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaType {
    #[default]
    Photo,
}

impl MediaType {
    /// File extensions a file dialog should offer
    fn extensions(&self) -> &'static [&'static str] {
        match self {
            MediaType::Photo => &["png", "jpg", "jpeg"],
        }
    }
}

/// Options passed to a picker launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerOptions {
    pub selection_limit: usize,
    pub media_type: MediaType,
}

impl Default for PickerOptions {
    fn default() -> Self {
        Self {
            selection_limit: 1,
            media_type: MediaType::Photo,
        }
    }
}

/// One picked or captured file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PickedAsset {
    pub uri: String,
    pub file_name: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub file_size: Option<u64>,
}

/// What a picker reports back
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PickerResponse {
    pub did_cancel: bool,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub assets: Vec<PickedAsset>,
}

impl PickerResponse {
    pub fn cancelled() -> Self {
        Self {
            did_cancel: true,
            ..Default::default()
        }
    }

    pub fn error(code: &str, message: &str) -> Self {
        Self {
            error_code: Some(code.to_string()),
            error_message: Some(message.to_string()),
            ..Default::default()
        }
    }
}

/// Something that can hand back an image: a photo library or a camera
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn launch_library(&self, options: &PickerOptions) -> PickerResponse;

    async fn launch_camera(&self, options: &PickerOptions) -> PickerResponse;
}

/// Desktop media source: a native file dialog stands in for the library
#[derive(Default)]
pub struct DialogMediaSource;

#[async_trait]
impl MediaSource for DialogMediaSource {
    async fn launch_library(&self, options: &PickerOptions) -> PickerResponse {
        let dialog = rfd::AsyncFileDialog::new()
            .add_filter("Images", options.media_type.extensions())
            .set_title("Select Image");

        let handles = if options.selection_limit == 1 {
            dialog.pick_file().await.into_iter().collect::<Vec<_>>()
        } else {
            dialog.pick_files().await.unwrap_or_default()
        };

        if handles.is_empty() {
            return PickerResponse::cancelled();
        }

        let limit = options.selection_limit.max(1);
        let mut assets = Vec::with_capacity(limit);
        for handle in handles.iter().take(limit) {
            assets.push(describe_file(handle.path().to_path_buf()).await);
        }

        PickerResponse {
            assets,
            ..Default::default()
        }
    }

    async fn launch_camera(&self, _options: &PickerOptions) -> PickerResponse {
        PickerResponse::error("camera_unavailable", "No camera on this device")
    }
}

/// Build an asset from a file on disk; unreadable metadata leaves fields empty
pub async fn describe_file(path: PathBuf) -> PickedAsset {
    let file_size = match tokio::fs::metadata(&path).await {
        Ok(meta) => Some(meta.len()),
        Err(e) => {
            tracing::debug!("Could not stat {:?}: {}", path, e);
            None
        }
    };

    // Header decoding is blocking file IO
    let header_path = path.clone();
    let dimensions = match tokio::task::spawn_blocking(move || image::image_dimensions(&header_path)).await {
        Ok(Ok(dims)) => Some(dims),
        Ok(Err(e)) => {
            tracing::debug!("Could not read dimensions of {:?}: {}", path, e);
            None
        }
        Err(e) => {
            tracing::warn!("Reading dimensions of {:?} failed: {}", path, e);
            None
        }
    };

    PickedAsset {
        uri: file_uri(&path),
        file_name: path.file_name().map(|n| n.to_string_lossy().to_string()),
        width: dimensions.map(|(w, _)| w),
        height: dimensions.map(|(_, h)| h),
        file_size,
    }
}

/// `file://` URI for an absolute path; relative paths are kept as they are
fn file_uri(path: &Path) -> String {
    match url::Url::from_file_path(path) {
        Ok(url) => url.to_string(),
        Err(()) => {
            tracing::debug!("No file URI for relative path {:?}", path);
            path.display().to_string()
        }
    }
}
