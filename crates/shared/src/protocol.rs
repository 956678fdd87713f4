use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::{
    domain::DeviceStatus,
    error::{DeviceFault, DeviceRejected},
};

pub const API_PREFIX: &str = "/api";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Move,
    Divide,
    Reset,
    EmergencyStop,
    EnableMotor,
    Status,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Move => "/move",
            Endpoint::Divide => "/divide",
            Endpoint::Reset => "/reset",
            Endpoint::EmergencyStop => "/emergency_stop",
            Endpoint::EnableMotor => "/enable_motor",
            Endpoint::Status => "/status",
        }
    }

    pub fn route(self) -> String {
        format!("{API_PREFIX}{}", self.path())
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// Query for `/move`. An angle of zero only changes the speed setpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveQuery {
    pub angle: f64,
    pub rpm: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DivideQuery {
    pub divisions: u32,
    pub rpm: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveReply {
    pub actual_angle: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_rpm: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DivideReply {
    pub angle_per_division: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub divisions: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_angle: Option<f64>,
}

/// Reply to reset, emergency stop and enable. Only `status` matters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AckReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReply {
    pub data: DeviceStatus,
}

#[derive(Debug, Error)]
pub enum ReplyError {
    #[error(transparent)]
    Rejected(#[from] DeviceRejected),
    #[error("malformed reply: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Decodes a device reply, treating anything but `"status": "ok"` as a
/// rejection.
pub fn decode_reply<T: DeserializeOwned>(body: &[u8]) -> Result<T, ReplyError> {
    let header: DeviceFault = serde_json::from_slice(body)?;
    if !header.status.is_ok() {
        return Err(ReplyError::Rejected(header.into()));
    }
    Ok(serde_json::from_slice(body)?)
}
