//! File transfer for downloaded images.

use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;

use crate::app_data::app_data;
use crate::platform::StorageCapabilities;

/// Current phase of a gated download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownloadPhase {
    #[default]
    Idle,
    Checking,
    Transferring,
    Done,
    Failed,
    Aborted,
}

impl DownloadPhase {
    /// Get a human-readable description of the current phase
    pub fn description(&self) -> &'static str {
        match self {
            DownloadPhase::Idle => "Ready",
            DownloadPhase::Checking => "Checking storage permission...",
            DownloadPhase::Transferring => "Downloading...",
            DownloadPhase::Done => "Download complete!",
            DownloadPhase::Failed => "Download failed",
            DownloadPhase::Aborted => "Download cancelled",
        }
    }
}

/// Progress information for a transfer
#[derive(Debug, Clone, Default)]
pub struct TransferProgress {
    pub phase: DownloadPhase,
    pub bytes_downloaded: u64,
    pub total_bytes: u64,
    pub speed: u64, // bytes/sec
}

impl TransferProgress {
    /// Download progress as a fraction (0.0 - 1.0)
    pub fn fraction(&self) -> f32 {
        if self.total_bytes == 0 {
            0.0
        } else {
            self.bytes_downloaded as f32 / self.total_bytes as f32
        }
    }
}

/// How a single transfer is carried out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    pub use_download_manager: bool,
    pub notification: bool,
    pub media_scannable: bool,
    pub title: String,
    pub path: PathBuf,
}

impl FetchOptions {
    /// Options for saving image `identifier` under the platform download dir
    pub fn for_image(identifier: &str, capabilities: &StorageCapabilities) -> Self {
        let title = image_file_name(identifier);
        Self {
            use_download_manager: capabilities.use_download_manager,
            notification: capabilities.notification,
            media_scannable: capabilities.media_scannable,
            path: capabilities.download_dir.join(&title),
            title,
        }
    }
}

/// `image-{identifier}.jpg`, with anything that could leave the directory
/// replaced by `_`
pub fn image_file_name(identifier: &str) -> String {
    let download = &app_data().download;
    let safe: String = identifier
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}{}.{}", download.file_prefix, safe, download.file_extension)
}

/// A file saved by a completed transfer
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DownloadedFile {
    pub path: PathBuf,
    pub bytes: u64,
    /// Duplicate written to the document directory, if any
    pub mirror: Option<PathBuf>,
}

/// Errors that can occur while transferring a file
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Failed to connect to download server: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Download failed with status: {0}")]
    Status(reqwest::StatusCode),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Download `url` to `options.path` with progress tracking.
///
/// Writes to a temporary file next to the destination, then renames on
/// success. The temporary file is removed on failure.
pub async fn transfer(
    client: &reqwest::Client,
    url: &str,
    options: &FetchOptions,
    progress_tx: &watch::Sender<TransferProgress>,
) -> Result<DownloadedFile, TransferError> {
    let download_start = Instant::now();
    let temp_path = temp_path_for(&options.path);

    let _ = progress_tx.send(TransferProgress {
        phase: DownloadPhase::Transferring,
        ..Default::default()
    });

    let result = stream_to_file(client, url, &temp_path, progress_tx).await;
    let bytes = match result {
        Ok(bytes) => bytes,
        Err(e) => {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e);
        }
    };

    tokio::fs::rename(&temp_path, &options.path).await?;

    if options.use_download_manager {
        tracing::debug!("{} registered with the download manager", options.title);
    }
    if options.media_scannable {
        tracing::debug!("{} marked for media scanning", options.title);
    }

    let elapsed = download_start.elapsed().as_secs_f32();
    tracing::info!(
        "Download complete: {} ({:.1} KB in {:.1}s)",
        options.title,
        bytes as f32 / 1024.0,
        elapsed
    );

    Ok(DownloadedFile {
        path: options.path.clone(),
        bytes,
        mirror: None,
    })
}

async fn stream_to_file(
    client: &reqwest::Client,
    url: &str,
    temp_path: &Path,
    progress_tx: &watch::Sender<TransferProgress>,
) -> Result<u64, TransferError> {
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        return Err(TransferError::Status(response.status()));
    }

    let total_size = response.content_length().unwrap_or(0);

    if let Some(parent) = temp_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::File::create(temp_path).await?;

    // Stream the response body to disk
    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;
    let mut last_progress_time = Instant::now();
    let mut last_downloaded: u64 = 0;
    let interval = Duration::from_millis(app_data().download.progress_interval_ms);

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;

        let now = Instant::now();
        let elapsed = now.duration_since(last_progress_time);
        if elapsed >= interval {
            let bytes_since_last = downloaded - last_downloaded;
            let current_speed = (bytes_since_last as f64 / elapsed.as_secs_f64()) as u64;

            let _ = progress_tx.send(TransferProgress {
                phase: DownloadPhase::Transferring,
                bytes_downloaded: downloaded,
                total_bytes: total_size,
                speed: current_speed,
            });

            last_downloaded = downloaded;
            last_progress_time = now;
        }
    }

    file.sync_all().await?;
    Ok(downloaded)
}

/// Copy a finished download into `dir`, returning the copy's path
pub async fn mirror_into(file: &Path, dir: &Path) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let name = file.file_name().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "download has no file name")
    })?;
    let target = dir.join(name);
    if target != file {
        tokio::fs::copy(file, &target).await?;
    }
    Ok(target)
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(&app_data().download.temp_extension);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn options(dir: &Path, identifier: &str) -> FetchOptions {
        let title = image_file_name(identifier);
        FetchOptions {
            use_download_manager: true,
            notification: false,
            media_scannable: true,
            path: dir.join(&title),
            title,
        }
    }

    #[test]
    fn test_image_file_name() {
        assert_eq!(image_file_name("42"), "image-42.jpg");
        assert_eq!(image_file_name("../../etc/passwd"), "image-______etc_passwd.jpg");
    }

    #[test]
    fn test_temp_path_sits_next_to_destination() {
        let temp = temp_path_for(Path::new("/downloads/image-1.jpg"));
        assert_eq!(temp, PathBuf::from("/downloads/image-1.jpg.part"));
    }

    #[test]
    fn test_phase_description() {
        assert_eq!(DownloadPhase::Idle.description(), "Ready");
        assert_eq!(DownloadPhase::Transferring.description(), "Downloading...");
        assert_eq!(DownloadPhase::Failed.description(), "Download failed");
    }

    #[test]
    fn test_progress_fraction() {
        let mut progress = TransferProgress::default();
        assert_eq!(progress.fraction(), 0.0);
        progress.bytes_downloaded = 25;
        progress.total_bytes = 100;
        assert_eq!(progress.fraction(), 0.25);
    }

    #[tokio::test]
    async fn test_transfer_writes_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/id/7/100/100"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpegbytes".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let opts = options(dir.path(), "7");
        let (tx, rx) = watch::channel(TransferProgress::default());
        let client = reqwest::Client::new();

        let file = transfer(&client, &format!("{}/id/7/100/100", server.uri()), &opts, &tx)
            .await
            .unwrap();

        assert_eq!(file.path, dir.path().join("image-7.jpg"));
        assert_eq!(file.bytes, 9);
        assert_eq!(std::fs::read(&file.path).unwrap(), b"jpegbytes");
        assert!(!dir.path().join("image-7.jpg.part").exists());
        assert_eq!(rx.borrow().phase, DownloadPhase::Transferring);
    }

    #[tokio::test]
    async fn test_transfer_not_found_leaves_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let opts = options(dir.path(), "9");
        let (tx, _rx) = watch::channel(TransferProgress::default());
        let client = reqwest::Client::new();

        let err = transfer(&client, &format!("{}/missing", server.uri()), &opts, &tx)
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::Status(s) if s.as_u16() == 404));
        assert!(!opts.path.exists());
        assert!(!dir.path().join("image-9.jpg.part").exists());
    }

    #[tokio::test]
    async fn test_mirror_into_copies_file() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("image-1.jpg");
        std::fs::write(&source, b"data").unwrap();

        let documents = dir.path().join("Documents");
        let copy = mirror_into(&source, &documents).await.unwrap();

        assert_eq!(copy, documents.join("image-1.jpg"));
        assert_eq!(std::fs::read(&copy).unwrap(), b"data");
        assert!(source.exists());
    }
}
