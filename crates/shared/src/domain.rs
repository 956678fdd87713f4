use serde::{Deserialize, Deserializer, Serialize};

pub const FULL_TURN_DEGREES: f64 = 360.0;

/// Fixed limits the panel works within for the whole session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PanelConfig {
    pub max_rpm: u32,
    pub min_rpm: u32,
    /// Degrees per microstep. Shown to the operator, never used for math.
    pub resolution: f64,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            max_rpm: 300,
            min_rpm: 1,
            resolution: FULL_TURN_DEGREES / (200.0 * 16.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub current_angle: f64,
    #[serde(deserialize_with = "rpm_from_number")]
    pub rpm: u32,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rpm: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps_per_rev: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub microsteps: Option<u32>,
}

/// The device echoes back whatever rpm it was last given, which may arrive as
/// `60.0` rather than `60`.
fn rpm_from_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    if !raw.is_finite() || raw < 0.0 {
        return Err(serde::de::Error::custom(format!("invalid rpm value {raw}")));
    }
    Ok(raw.round() as u32)
}

impl DeviceStatus {
    /// Fraction of a full turn covered by `current_angle`, clamped to `[0, 1]`.
    pub fn turn_fraction(&self) -> f64 {
        if !self.current_angle.is_finite() {
            return 0.0;
        }
        (self.current_angle / FULL_TURN_DEGREES).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Unknown,
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    #[default]
    Info,
    Success,
    Error,
    Alert,
}

impl FeedbackKind {
    pub fn style_class(self) -> &'static str {
        match self {
            FeedbackKind::Info => "result info",
            FeedbackKind::Success => "result success",
            FeedbackKind::Error => "result error",
            FeedbackKind::Alert => "result error alert",
        }
    }
}
