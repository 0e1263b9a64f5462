use infrascore_core::EvaluationError;
use thiserror::Error;

/// Errors from the model-backed evaluator.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("no API key configured for the chat backend")]
    MissingApiKey,

    #[error("no rubric for metric key {0}")]
    UnknownRubric(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("chat backend returned an empty reply")]
    EmptyReply,

    #[error("could not extract JSON from reply: {0}")]
    Parse(String),
}

impl LlmError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Status { status, .. } => *status == 429 || *status >= 500,
            LlmError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }
}

impl From<LlmError> for EvaluationError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Parse(msg) => EvaluationError::MalformedResponse(msg),
            other => EvaluationError::Backend(other.to_string()),
        }
    }
}

/// Convenience result alias for chat operations.
pub type LlmResult<T> = std::result::Result<T, LlmError>;
