use std::{future::Future, sync::Arc};

use shared::{
    domain::{ConnectionState, DeviceStatus, PanelConfig},
    protocol::{AckReply, DivideQuery, MoveQuery},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

pub mod error;
pub mod input;
pub mod poller;
pub mod session;
pub mod transport;
pub mod view;

pub use error::{ApiCallError, ControlError, InputError};
pub use poller::{StatusPoller, DEFAULT_POLL_INTERVAL};
pub use session::SessionState;
pub use transport::{DivisorApi, HttpDivisorApi};
pub use view::{Feedback, PanelView};

use session::{SequenceGuard, Ticket};
use view::format_degrees;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// A newer reply was already applied; this one was dropped untouched.
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetSpeed,
    Divide,
    NextDivision,
    PreciseMove,
    Reset,
    EmergencyStop,
    EnableMotor,
}

impl Command {
    pub fn name(self) -> &'static str {
        match self {
            Command::SetSpeed => "set_speed",
            Command::Divide => "divide",
            Command::NextDivision => "next_division",
            Command::PreciseMove => "precise_move",
            Command::Reset => "reset",
            Command::EmergencyStop => "emergency_stop",
            Command::EnableMotor => "enable_motor",
        }
    }
}

#[derive(Debug, Clone)]
pub enum PanelEvent {
    InputsChanged { rpm: u32 },
    SessionChanged(SessionState),
    StatusRefreshed(DeviceStatus),
    ConnectionChanged(ConnectionState),
    Feedback(Feedback),
}

struct ControllerState {
    session: SessionState,
    view: PanelView,
    /// Orders divide / reset replies. Advances are checked against the last
    /// admitted one but never recorded, so overlapping advances all count.
    session_seq: SequenceGuard,
    /// Orders writes to the rpm and angle displays.
    telemetry_seq: SequenceGuard,
}

/// View-model of the divisor head panel.
///
/// Holds the operator's inputs, the division sequence and the rendered view.
/// Requests are issued without holding the state lock, so commands and status
/// polls may overlap; replies are applied in ticket order and stale ones are
/// dropped.
pub struct DivisorController {
    api: Arc<dyn DivisorApi>,
    config: PanelConfig,
    inner: Mutex<ControllerState>,
    events: broadcast::Sender<PanelEvent>,
}

impl DivisorController {
    pub fn new(api: Arc<dyn DivisorApi>, config: PanelConfig) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            api,
            config,
            inner: Mutex::new(ControllerState {
                session: SessionState::default(),
                view: PanelView::new(&config),
                session_seq: SequenceGuard::default(),
                telemetry_seq: SequenceGuard::default(),
            }),
            events,
        })
    }

    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PanelEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> PanelView {
        self.inner.lock().await.view.clone()
    }

    pub async fn session(&self) -> SessionState {
        self.inner.lock().await.session
    }

    /// Normalizes an rpm entry (field or slider), syncs both inputs and sends
    /// the new setpoint.
    pub async fn change_rpm(&self, raw: &str) -> Result<Outcome, ControlError> {
        let rpm = input::normalize_rpm(raw, &self.config);
        self.set_speed(rpm).await
    }

    pub async fn set_speed(&self, rpm: u32) -> Result<Outcome, ControlError> {
        let rpm = input::clamp_rpm(i64::from(rpm), &self.config);
        self.inner.lock().await.view.set_rpm_inputs(rpm);
        self.emit(PanelEvent::InputsChanged { rpm });

        info!(rpm, "setting speed");
        if let Err(err) = self.api.move_by(MoveQuery { angle: 0.0, rpm }).await {
            return Err(self.fail(Command::SetSpeed, err.into()).await);
        }

        let feedback = Feedback::success(format!("Speed set to {rpm} RPM"));
        {
            let mut guard = self.inner.lock().await;
            // polls issued before the new setpoint would show the old rpm
            guard.telemetry_seq.supersede_outstanding();
            guard.view.current_rpm_text = rpm.to_string();
            guard.view.feedback = feedback.clone();
        }
        self.emit(PanelEvent::Feedback(feedback));
        Ok(Outcome::Applied)
    }

    pub async fn divide(&self, raw_divisions: &str) -> Result<Outcome, ControlError> {
        let divisions = match input::parse_divisions(raw_divisions) {
            Ok(divisions) => divisions,
            Err(err) => return Err(self.fail(Command::Divide, err.into()).await),
        };

        let (ticket, rpm) = {
            let mut guard = self.inner.lock().await;
            (guard.session_seq.issue(), guard.view.rpm_field)
        };
        info!(divisions, rpm, seq = ticket.value(), "dividing circle");

        let reply = match self.api.divide(DivideQuery { divisions, rpm }).await {
            Ok(reply) => reply,
            Err(err) => return Err(self.fail(Command::Divide, err.into()).await),
        };

        let feedback = Feedback::success(format!(
            "Circle divided into {divisions} parts of {}°",
            format_degrees(reply.angle_per_division)
        ));
        let session = {
            let mut guard = self.inner.lock().await;
            if !guard.session_seq.admit(ticket) {
                return Ok(superseded(Command::Divide, ticket));
            }
            guard.session.start(divisions, reply.angle_per_division);
            let session = guard.session;
            guard.view.show_session(&session);
            guard.view.feedback = feedback.clone();
            session
        };
        self.emit(PanelEvent::SessionChanged(session));
        self.emit(PanelEvent::Feedback(feedback));
        Ok(Outcome::Applied)
    }

    pub async fn next_division(&self) -> Result<Outcome, ControlError> {
        let pending = {
            let mut guard = self.inner.lock().await;
            if guard.session.is_divided() {
                let angle = guard.session.angle_per_division();
                Some((guard.session_seq.issue(), angle, guard.view.rpm_field))
            } else {
                None
            }
        };
        let Some((ticket, angle, rpm)) = pending else {
            return Err(self
                .fail(Command::NextDivision, InputError::NotDivided.into())
                .await);
        };
        debug!(angle, rpm, seq = ticket.value(), "advancing one division");

        if let Err(err) = self.api.move_by(MoveQuery { angle, rpm }).await {
            return Err(self.fail(Command::NextDivision, err.into()).await);
        }

        let (session, feedback) = {
            let mut guard = self.inner.lock().await;
            // The move already happened; only a newer divide or reset voids it.
            if !guard.session_seq.is_current(ticket) {
                return Ok(superseded(Command::NextDivision, ticket));
            }
            guard.session.advance();
            let session = guard.session;
            guard.view.show_session(&session);
            let feedback = Feedback::success(format!(
                "Division {}/{} complete",
                session.current_division(),
                session.total_divisions()
            ));
            guard.view.feedback = feedback.clone();
            (session, feedback)
        };
        info!(
            current = session.current_division(),
            total = session.total_divisions(),
            "division reached"
        );
        self.emit(PanelEvent::SessionChanged(session));
        self.emit(PanelEvent::Feedback(feedback));
        Ok(Outcome::Applied)
    }

    pub async fn precise_move(&self, raw_angle: &str) -> Result<Outcome, ControlError> {
        let rpm = {
            let mut guard = self.inner.lock().await;
            guard.view.precise_angle_field = raw_angle.to_string();
            guard.view.rpm_field
        };
        let angle = match input::parse_angle(raw_angle) {
            Ok(angle) => angle,
            Err(err) => return Err(self.fail(Command::PreciseMove, err.into()).await),
        };

        info!(angle, rpm, "precise move");
        let reply = match self.api.move_by(MoveQuery { angle, rpm }).await {
            Ok(reply) => reply,
            Err(err) => return Err(self.fail(Command::PreciseMove, err.into()).await),
        };

        let feedback = Feedback::success(format!(
            "Moved to {}°",
            format_degrees(reply.actual_angle)
        ));
        {
            let mut guard = self.inner.lock().await;
            guard.view.precise_angle_field.clear();
            guard.view.feedback = feedback.clone();
        }
        self.emit(PanelEvent::Feedback(feedback));
        Ok(Outcome::Applied)
    }

    pub async fn reset(&self) -> Result<Outcome, ControlError> {
        let ticket = self.inner.lock().await.session_seq.issue();
        info!(seq = ticket.value(), "resetting position");

        if let Err(err) = self.api.reset().await {
            return Err(self.fail(Command::Reset, err.into()).await);
        }

        let feedback = Feedback::success("Position reset to 0°");
        let session = {
            let mut guard = self.inner.lock().await;
            if !guard.session_seq.admit(ticket) {
                return Ok(superseded(Command::Reset, ticket));
            }
            guard.session.rewind();
            let session = guard.session;
            guard.view.show_session(&session);
            guard.view.feedback = feedback.clone();
            session
        };
        self.emit(PanelEvent::SessionChanged(session));
        self.emit(PanelEvent::Feedback(feedback));
        Ok(Outcome::Applied)
    }

    pub async fn emergency_stop(&self) -> Result<Outcome, ControlError> {
        warn!("emergency stop requested");
        self.acknowledge(
            Command::EmergencyStop,
            self.api.emergency_stop(),
            Feedback::alert("EMERGENCY STOP ACTIVATED!"),
        )
        .await
    }

    pub async fn enable_motor(&self) -> Result<Outcome, ControlError> {
        info!("enabling motor");
        self.acknowledge(
            Command::EnableMotor,
            self.api.enable_motor(),
            Feedback::success("Motor enabled"),
        )
        .await
    }

    /// One status poll. Failures mark the panel disconnected and leave the
    /// message slot alone.
    pub async fn refresh_status(&self) -> Result<Outcome, ApiCallError> {
        let ticket = self.inner.lock().await.telemetry_seq.issue();
        let result = self.api.status().await;

        let mut guard = self.inner.lock().await;
        if !guard.telemetry_seq.admit(ticket) {
            debug!(seq = ticket.value(), "dropping stale status reply");
            return Ok(Outcome::Superseded);
        }

        match result {
            Ok(status) => {
                let reconnected = guard.view.connection != ConnectionState::Connected;
                guard.view.show_status(&status);
                drop(guard);
                if reconnected {
                    info!("device connected");
                }
                self.emit(PanelEvent::StatusRefreshed(status));
                Ok(Outcome::Applied)
            }
            Err(err) => {
                let was_connected = guard.view.connection == ConnectionState::Connected;
                guard.view.connection = ConnectionState::Disconnected;
                drop(guard);
                if was_connected {
                    warn!("device unreachable: {err}");
                }
                self.emit(PanelEvent::ConnectionChanged(ConnectionState::Disconnected));
                Err(err)
            }
        }
    }

    async fn acknowledge<F>(
        &self,
        command: Command,
        request: F,
        feedback: Feedback,
    ) -> Result<Outcome, ControlError>
    where
        F: Future<Output = Result<AckReply, ApiCallError>>,
    {
        if let Err(err) = request.await {
            return Err(self.fail(command, err.into()).await);
        }
        self.inner.lock().await.view.feedback = feedback.clone();
        self.emit(PanelEvent::Feedback(feedback));
        Ok(Outcome::Applied)
    }

    /// Puts the failure in the message slot and hands it back to the caller.
    async fn fail(&self, command: Command, err: ControlError) -> ControlError {
        if err.is_local() {
            debug!(command = command.name(), "rejected before sending: {err}");
        } else {
            warn!(command = command.name(), "command failed: {err}");
        }
        let feedback = Feedback::error(&err);
        self.inner.lock().await.view.feedback = feedback.clone();
        self.emit(PanelEvent::Feedback(feedback));
        err
    }

    fn emit(&self, event: PanelEvent) {
        let _ = self.events.send(event);
    }
}

fn superseded(command: Command, ticket: Ticket) -> Outcome {
    debug!(
        command = command.name(),
        seq = ticket.value(),
        "dropping reply superseded by a newer one"
    );
    Outcome::Superseded
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
