//! Status wrapper for one asynchronous operation.

use serde::Serialize;

/// Lifecycle of a fetch or transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FetchStatus {
    #[default]
    Initial,
    Loading,
    Success,
    Fail,
}

impl FetchStatus {
    pub fn label(&self) -> &'static str {
        match self {
            FetchStatus::Initial => "INITIAL",
            FetchStatus::Loading => "LOADING",
            FetchStatus::Success => "SUCCESS",
            FetchStatus::Fail => "FAIL",
        }
    }
}

/// Data plus status of the most recent attempt.
///
/// There is one wrapper per operation kind; every new attempt overwrites it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
    pub status: FetchStatus,
    #[serde(rename = "errorMessage")]
    pub error_message: String,
}

impl<T: Default> ApiResponse<T> {
    /// Mark a new attempt as started, keeping the current data
    pub fn begin(&mut self) {
        self.status = FetchStatus::Loading;
    }

    pub fn succeed(&mut self, data: T) {
        self.data = data;
        self.status = FetchStatus::Success;
        self.error_message.clear();
    }

    /// Record a failure; the data is reset
    pub fn fail(&mut self, message: impl Into<String>) {
        self.data = T::default();
        self.status = FetchStatus::Fail;
        self.error_message = message.into();
    }

    /// Return to the initial state
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_loading(&self) -> bool {
        self.status == FetchStatus::Loading
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let mut response: ApiResponse<Vec<u32>> = ApiResponse::default();
        assert_eq!(response.status, FetchStatus::Initial);

        response.begin();
        assert!(response.is_loading());

        response.succeed(vec![1, 2]);
        assert_eq!(response.status, FetchStatus::Success);
        assert_eq!(response.data, vec![1, 2]);

        response.begin();
        assert_eq!(response.data, vec![1, 2], "data survives a new attempt");

        response.fail("boom");
        assert_eq!(response.status, FetchStatus::Fail);
        assert!(response.data.is_empty());
        assert_eq!(response.error_message, "boom");

        response.succeed(vec![3]);
        assert!(response.error_message.is_empty());
    }

    #[test]
    fn test_serialized_field_names() {
        let mut response: ApiResponse<Vec<u32>> = ApiResponse::default();
        response.fail("offline");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "FAIL");
        assert_eq!(json["errorMessage"], "offline");
        assert_eq!(json["data"], serde_json::json!([]));
    }
}
