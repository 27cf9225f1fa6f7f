use thiserror::Error;

/// Errors the API boundary can produce. Transport and decode failures
/// collapse into `Network`; the two auth statuses stay distinct because
/// the view reports them differently (forbidden on the primary task
/// fetch gets its own user-facing message).
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("access forbidden")]
    Forbidden,

    #[error("invalid credentials or expired session")]
    Unauthorized,

    #[error("unexpected status {status} from {endpoint}")]
    UnexpectedStatus { status: u16, endpoint: String },
}

impl ApiError {
    pub fn is_forbidden(&self) -> bool {
        matches!(self, ApiError::Forbidden)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
