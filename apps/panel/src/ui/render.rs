use std::{
    io::{self, Write},
    thread::{self, JoinHandle},
};

use client_core::PanelView;
use crossbeam_channel::Receiver;
use shared::domain::{ConnectionState, FeedbackKind};

use crate::controller::events::{UiErrorCategory, UiEvent};

const DIAL_CELLS: usize = 36;

pub fn render_panel(view: &PanelView) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "=== Divisor Head === max {} RPM | resolution {}°\n",
        view.max_rpm_text, view.resolution_text
    ));
    out.push_str(&format!("link      {}\n", connection_label(view.connection)));
    out.push_str(&format!(
        "angle     {}° {}\n",
        view.current_angle_text,
        dial_bar(view.dial_fraction)
    ));
    out.push_str(&format!(
        "speed     field {} | slider {} | current {} RPM\n",
        view.rpm_field, view.rpm_slider, view.current_rpm_text
    ));
    out.push_str(&format!(
        "division  {}/{} @ {}°\n",
        view.current_division_text, view.total_divisions_text, view.angle_per_division_text
    ));
    out.push_str(&format!(
        "motor     enable {} | stop {}\n",
        availability(view.enable_available),
        availability(view.emergency_available)
    ));
    if let Some(line) = device_line(view) {
        out.push_str(&line);
        out.push('\n');
    }
    out.push_str(&format!(
        "{} {}\n",
        feedback_prefix(view.feedback.kind),
        if view.feedback.text.is_empty() {
            "-"
        } else {
            view.feedback.text.as_str()
        }
    ));
    out
}

fn connection_label(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Unknown => "connecting...",
        ConnectionState::Connected => "connected",
        ConnectionState::Disconnected => "DISCONNECTED",
    }
}

fn dial_bar(fraction: f64) -> String {
    let fraction = if fraction.is_finite() {
        fraction.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled = ((fraction * DIAL_CELLS as f64).round() as usize).min(DIAL_CELLS);
    format!("[{}{}]", "#".repeat(filled), ".".repeat(DIAL_CELLS - filled))
}

fn availability(available: bool) -> &'static str {
    if available {
        "available"
    } else {
        "disabled"
    }
}

fn device_line(view: &PanelView) -> Option<String> {
    let details = view.device;
    let mut parts = Vec::new();
    if let Some(max_rpm) = details.max_rpm {
        parts.push(format!("max {max_rpm} RPM"));
    }
    if let Some(steps) = details.steps_per_rev {
        parts.push(format!("{steps} steps/rev"));
    }
    if let Some(microsteps) = details.microsteps {
        parts.push(format!("1/{microsteps} microstepping"));
    }
    (!parts.is_empty()).then(|| format!("device    {}", parts.join(", ")))
}

fn feedback_prefix(kind: FeedbackKind) -> &'static str {
    match kind {
        FeedbackKind::Info => "[info]",
        FeedbackKind::Success => "[ok]",
        FeedbackKind::Error => "[error]",
        FeedbackKind::Alert => "[ALERT]",
    }
}

fn category_label(category: UiErrorCategory) -> &'static str {
    match category {
        UiErrorCategory::Validation => "input",
        UiErrorCategory::Device => "device",
        UiErrorCategory::Transport => "link",
        UiErrorCategory::Unknown => "error",
    }
}

pub fn write_event(out: &mut impl Write, event: &UiEvent) -> io::Result<()> {
    match event {
        UiEvent::Info(text) => writeln!(out, "{text}"),
        UiEvent::Render(view) => write!(out, "{}", render_panel(view)),
        UiEvent::ConnectionChanged(state) => {
            writeln!(out, "* device link: {}", connection_label(*state))
        }
        UiEvent::Error(err) => {
            writeln!(out, "! {}: {}", category_label(err.category()), err.message())?;
            if let Some(hint) = err.hint() {
                writeln!(out, "  hint: {hint}")?;
            }
            Ok(())
        }
    }
}

/// Prints UI events until every sender is gone.
pub fn spawn_printer(ui_rx: Receiver<UiEvent>) -> JoinHandle<()> {
    thread::spawn(move || {
        let stdout = io::stdout();
        for event in ui_rx.iter() {
            let mut out = stdout.lock();
            if let Err(err) = write_event(&mut out, &event).and_then(|()| out.flush()) {
                tracing::warn!("failed to write panel output: {err}");
                break;
            }
        }
    })
}
