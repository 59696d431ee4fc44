use thiserror::Error;

/// Failures raised by the remote prediction service boundary.
///
/// `Timeout` and `Unreachable` indicate the service could not be reached at all;
/// `Status` and `MalformedResponse` indicate it answered but the exchange failed.
/// Callers use [`NetworkError::is_unreachable`] to decide whether to flip the
/// connectivity indicator.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("request timed out after {0}ms")]
    Timeout(u64),
    #[error("prediction service unreachable: {0}")]
    Unreachable(String),
    #[error("prediction service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response from prediction service: {0}")]
    MalformedResponse(String),
}

impl NetworkError {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Unreachable(_))
    }
}

/// Everything that can end a capture cycle early.
///
/// Each variant is contained to the cycle it occurred in: the controller records
/// it in shared error state and returns to idle, it never stops the scheduler.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("camera permission not granted")]
    Permission,
    #[error("frame capture failed: {0}")]
    Capture(String),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl PipelineError {
    pub fn persistence(err: anyhow::Error) -> Self {
        Self::Persistence(format!("{err:#}"))
    }
}
