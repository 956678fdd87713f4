use shared::{error::DeviceRejected, protocol::ReplyError};
use thiserror::Error;

/// Rejections raised before any request leaves the panel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("minimum 2 divisions")]
    TooFewDivisions,
    #[error("too many divisions")]
    TooManyDivisions,
    #[error("enter a valid angle")]
    InvalidAngle,
    #[error("divide the circle first")]
    NotDivided,
}

#[derive(Debug, Error)]
pub enum ApiCallError {
    #[error(transparent)]
    Rejected(#[from] DeviceRejected),
    #[error("HTTP {0}")]
    Http(u16),
    #[error("connection error: {0}")]
    Transport(String),
    #[error("malformed reply: {0}")]
    Malformed(String),
}

impl From<ReplyError> for ApiCallError {
    fn from(value: ReplyError) -> Self {
        match value {
            ReplyError::Rejected(rejected) => ApiCallError::Rejected(rejected),
            ReplyError::Malformed(err) => ApiCallError::Malformed(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for ApiCallError {
    fn from(value: reqwest::Error) -> Self {
        if let Some(status) = value.status() {
            return ApiCallError::Http(status.as_u16());
        }
        ApiCallError::Transport(value.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Api(#[from] ApiCallError),
}

impl ControlError {
    pub fn is_local(&self) -> bool {
        matches!(self, ControlError::Input(_))
    }
}
