//! Application state modules
//!
//! Each state struct owns the fields of one screen and exposes action and
//! poll methods. Results travel back to the shell as [`StateEvent`]s rather
//! than through direct mutation of another screen.

mod download;
mod feed;
mod picker;
mod response;

pub use download::{DownloadGate, DownloadOutcome};
pub use feed::{FeedController, FeedSettings, Viewport};
pub use picker::{ImagePicker, PickError, PickOutcome};
pub use response::{ApiResponse, FetchStatus};

/// Events that state methods can return.
#[derive(Debug, Clone, PartialEq)]
pub enum StateEvent {
    /// Update the status message
    StatusMessage(String),

    /// Log an error message
    LogError(String),

    /// Log an info message
    LogInfo(String),

    /// The displayed product list changed
    ProductsChanged { count: usize },
}
