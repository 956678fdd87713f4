//! Everything the operator sees, as plain values a front-end can draw.

use shared::domain::{ConnectionState, DeviceStatus, FeedbackKind, PanelConfig};

use crate::session::SessionState;

const INITIAL_RPM: u32 = 60;

pub fn format_degrees(value: f64) -> String {
    format!("{value:.4}")
}

/// The single message slot. Each outcome replaces the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Feedback {
    pub kind: FeedbackKind,
    pub text: String,
}

impl Feedback {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            kind: FeedbackKind::Success,
            text: text.into(),
        }
    }

    pub fn error(cause: impl std::fmt::Display) -> Self {
        Self {
            kind: FeedbackKind::Error,
            text: format!("Error: {cause}"),
        }
    }

    pub fn alert(text: impl Into<String>) -> Self {
        Self {
            kind: FeedbackKind::Alert,
            text: text.into(),
        }
    }
}

/// Hardware details the device reports alongside its status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceDetails {
    pub max_rpm: Option<u32>,
    pub steps_per_rev: Option<u32>,
    pub microsteps: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelView {
    pub max_rpm_text: String,
    pub resolution_text: String,
    pub rpm_field: u32,
    pub rpm_slider: u32,
    pub current_rpm_text: String,
    pub current_angle_text: String,
    /// Share of the dial to fill, `current_angle / 360`.
    pub dial_fraction: f64,
    pub connection: ConnectionState,
    pub enable_available: bool,
    pub emergency_available: bool,
    pub current_division_text: String,
    pub total_divisions_text: String,
    pub angle_per_division_text: String,
    pub precise_angle_field: String,
    pub device: DeviceDetails,
    pub feedback: Feedback,
}

impl PanelView {
    pub fn new(config: &PanelConfig) -> Self {
        let rpm = INITIAL_RPM.max(config.min_rpm).min(config.max_rpm);
        let mut view = Self {
            max_rpm_text: config.max_rpm.to_string(),
            resolution_text: config.resolution.to_string(),
            rpm_field: rpm,
            rpm_slider: rpm,
            current_rpm_text: rpm.to_string(),
            current_angle_text: format_degrees(0.0),
            dial_fraction: 0.0,
            connection: ConnectionState::Unknown,
            enable_available: true,
            emergency_available: true,
            current_division_text: String::new(),
            total_divisions_text: String::new(),
            angle_per_division_text: String::new(),
            precise_angle_field: String::new(),
            device: DeviceDetails::default(),
            feedback: Feedback::default(),
        };
        view.show_session(&SessionState::default());
        view
    }

    pub fn set_rpm_inputs(&mut self, rpm: u32) {
        self.rpm_field = rpm;
        self.rpm_slider = rpm;
    }

    pub fn show_session(&mut self, session: &SessionState) {
        self.current_division_text = session.current_division().to_string();
        self.total_divisions_text = session.total_divisions().to_string();
        self.angle_per_division_text = format_degrees(session.angle_per_division());
    }

    pub fn show_status(&mut self, status: &DeviceStatus) {
        self.current_angle_text = format_degrees(status.current_angle);
        self.set_rpm_inputs(status.rpm);
        self.current_rpm_text = status.rpm.to_string();
        self.dial_fraction = status.turn_fraction();
        self.connection = ConnectionState::Connected;
        self.enable_available = !status.enabled;
        self.emergency_available = status.enabled;
        self.device = DeviceDetails {
            max_rpm: status.max_rpm,
            steps_per_rev: status.steps_per_rev,
            microsteps: status.microsteps,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(angle: f64, rpm: u32, enabled: bool) -> DeviceStatus {
        DeviceStatus {
            current_angle: angle,
            rpm,
            enabled,
            max_rpm: Some(300),
            resolution: Some(0.1125),
            steps_per_rev: Some(200),
            microsteps: Some(16),
        }
    }

    #[test]
    fn fresh_view_shows_config_and_empty_sequence() {
        let view = PanelView::new(&PanelConfig::default());
        assert_eq!(view.max_rpm_text, "300");
        assert_eq!(view.resolution_text, "0.1125");
        assert_eq!(view.current_division_text, "0");
        assert_eq!(view.total_divisions_text, "0");
        assert_eq!(view.angle_per_division_text, "0.0000");
        assert_eq!(view.rpm_field, view.rpm_slider);
        assert_eq!(view.connection, ConnectionState::Unknown);
    }

    #[test]
    fn status_sets_buttons_from_enabled_flag() {
        let mut view = PanelView::new(&PanelConfig::default());

        view.show_status(&status(45.0, 90, true));
        assert!(!view.enable_available);
        assert!(view.emergency_available);

        view.show_status(&status(45.0, 90, false));
        assert!(view.enable_available);
        assert!(!view.emergency_available);
    }

    #[test]
    fn status_refreshes_angle_rpm_and_dial() {
        let mut view = PanelView::new(&PanelConfig::default());
        view.show_status(&status(123.45678, 150, true));

        assert_eq!(view.current_angle_text, "123.4568");
        assert_eq!(view.rpm_field, 150);
        assert_eq!(view.rpm_slider, 150);
        assert_eq!(view.current_rpm_text, "150");
        assert!((view.dial_fraction - 123.45678 / 360.0).abs() < 1e-12);
        assert_eq!(view.connection, ConnectionState::Connected);
        assert_eq!(view.device.microsteps, Some(16));
    }

    #[test]
    fn error_feedback_prefixes_cause() {
        let feedback = Feedback::error("HTTP 500");
        assert_eq!(feedback.kind, FeedbackKind::Error);
        assert_eq!(feedback.text, "Error: HTTP 500");
    }
}
