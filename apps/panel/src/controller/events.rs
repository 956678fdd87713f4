//! UI/backend events and error modeling for the terminal panel.

use client_core::{ApiCallError, ControlError, PanelView};
use shared::domain::ConnectionState;

pub enum UiEvent {
    Info(String),
    /// Full panel redraw, sent after every command and on request.
    Render(PanelView),
    ConnectionChanged(ConnectionState),
    Error(UiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorCategory {
    Validation,
    Device,
    Transport,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorContext {
    BackendStartup,
    Command,
}

#[derive(Debug, Clone)]
pub struct UiError {
    category: UiErrorCategory,
    context: UiErrorContext,
    message: String,
}

impl UiError {
    pub fn from_control_error(err: &ControlError) -> Self {
        let category = match err {
            ControlError::Input(_) => UiErrorCategory::Validation,
            ControlError::Api(ApiCallError::Rejected(_)) => UiErrorCategory::Device,
            ControlError::Api(ApiCallError::Http(_) | ApiCallError::Transport(_)) => {
                UiErrorCategory::Transport
            }
            ControlError::Api(ApiCallError::Malformed(_)) => UiErrorCategory::Unknown,
        };
        Self {
            category,
            context: UiErrorContext::Command,
            message: err.to_string(),
        }
    }

    pub fn from_message(context: UiErrorContext, message: impl Into<String>) -> Self {
        let message = message.into();
        let message_lower = message.to_ascii_lowercase();
        let category = if message_lower.contains("connection")
            || message_lower.contains("timed out")
            || message_lower.contains("dns")
            || message_lower.contains("unreachable")
        {
            UiErrorCategory::Transport
        } else if message_lower.contains("invalid")
            || message_lower.contains("must")
            || message_lower.contains("malformed")
        {
            UiErrorCategory::Validation
        } else {
            UiErrorCategory::Unknown
        };

        Self {
            category,
            context,
            message,
        }
    }

    /// Operator guidance shown under the message line, if any applies.
    pub fn hint(&self) -> Option<&'static str> {
        match (self.context, self.category) {
            (UiErrorContext::BackendStartup, _) => {
                Some("Backend worker failed to start; check settings and relaunch.")
            }
            (_, UiErrorCategory::Transport) => {
                Some("Device unreachable; check the Wi-Fi link to the divisor head and the base URL.")
            }
            (_, UiErrorCategory::Device) => {
                Some("The device refused the command; if the motor is stopped, run `enable` first.")
            }
            _ => None,
        }
    }

    pub fn category(&self) -> UiErrorCategory {
        self.category
    }

    pub fn context(&self) -> UiErrorContext {
        self.context
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
