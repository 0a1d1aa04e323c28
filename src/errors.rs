// SPDX-License-Identifier: MPL-2.0

//! Error types for the streaming application
//!
//! Session-level failures never cross the [`SessionController`] boundary as
//! `Err` values: they are folded into `SessionState::last_error` as text.
//! The types here cover everything below (backends) and around (config, CLI)
//! that boundary.
//!
//! [`SessionController`]: crate::session::SessionController

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Capture/encode/connection backend errors
    Backend(BackendError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

/// Errors reported by a streaming backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Failed to initialize backend
    InitializationFailed(String),
    /// Camera device not found
    DeviceNotFound(String),
    /// Pipeline construction or state change failed
    Pipeline(String),
    /// Other errors
    Other(String),
}

/// Reasons `request_start` refuses to issue a connect command
///
/// The `Display` text is the user-facing message placed in
/// `SessionState::last_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartRejection {
    /// Camera/encoder resource or preview surface not attached
    PreviewNotInitialized,
    /// Target URL is blank after trimming
    UrlRequired,
    /// Preview surface exists but cannot receive frames right now
    PreviewNotReady,
    /// Audio or video encoder preparation failed
    EncoderInitFailed,
}

impl StartRejection {
    /// User-facing message for this rejection
    pub fn message(&self) -> &'static str {
        match self {
            StartRejection::PreviewNotInitialized => "preview not initialized",
            StartRejection::UrlRequired => "URL required",
            StartRejection::PreviewNotReady => "preview not ready",
            StartRejection::EncoderInitFailed => "encoder initialization failed",
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Backend(e) => write!(f, "Backend error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::Pipeline(msg) => write!(f, "Pipeline error: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl fmt::Display for StartRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for BackendError {}
impl std::error::Error for StartRejection {}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        AppError::Backend(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_messages() {
        assert_eq!(
            StartRejection::PreviewNotInitialized.to_string(),
            "preview not initialized"
        );
        assert_eq!(StartRejection::UrlRequired.to_string(), "URL required");
        assert_eq!(StartRejection::PreviewNotReady.to_string(), "preview not ready");
        assert_eq!(
            StartRejection::EncoderInitFailed.to_string(),
            "encoder initialization failed"
        );
    }

    #[test]
    fn test_backend_error_wraps_into_app_error() {
        let err: AppError = BackendError::DeviceNotFound("/dev/video2".into()).into();
        assert_eq!(
            err.to_string(),
            "Backend error: Device not found: /dev/video2"
        );
    }
}
