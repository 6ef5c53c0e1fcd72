use thiserror::Error;

/// A specialized `Result` type for screen operations.
pub type ScreenResult<T> = Result<T, ScreenError>;

/// The error type for capture and pointer operations.
///
/// These are runtime conditions, not programming errors: the automation loop
/// logs them and retries the tick after the state's normal delay.
#[derive(Debug, Error)]
pub enum ScreenError {
    #[error("failed to capture display {display}: {reason}")]
    CaptureFailed { display: usize, reason: String },

    #[error("pointer action at ({x}, {y}) failed: {reason}")]
    ClickFailed { x: i32, y: i32, reason: String },
}
