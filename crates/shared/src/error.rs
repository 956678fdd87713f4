use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    Ok,
    Error,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ReplyStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, ReplyStatus::Ok)
    }
}

/// Body of a device reply whose `status` is not `"ok"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceFault {
    #[serde(default)]
    pub status: ReplyStatus,
    #[serde(default)]
    pub message: Option<String>,
}

impl DeviceFault {
    pub fn new(status: ReplyStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct DeviceRejected {
    pub status: ReplyStatus,
    pub message: String,
}

impl From<DeviceFault> for DeviceRejected {
    fn from(value: DeviceFault) -> Self {
        let message = value
            .message
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| "device rejected the request".to_string());
        Self {
            status: value.status,
            message,
        }
    }
}
