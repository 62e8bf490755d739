use thiserror::Error;

#[derive(Debug, Error)]
pub enum LLMError {
    #[error("{provider} returned status {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("failed to decode {provider} response: {message}")]
    Decode {
        provider: &'static str,
        message: String,
    },

    #[error("{0} returned no text content")]
    EmptyResponse(&'static str),
}

impl LLMError {
    /// HTTP status of the failed reply, when the provider answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            LLMError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, LLMError::Timeout)
    }
}

impl From<reqwest::Error> for LLMError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return LLMError::Timeout;
        }
        if let Some(status) = err.status() {
            return LLMError::Status {
                provider: "http",
                status: status.as_u16(),
                body: err.to_string(),
            };
        }
        LLMError::Network(err.to_string())
    }
}
