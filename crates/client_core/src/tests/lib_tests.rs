use super::*;
use std::{
    collections::HashMap,
    sync::Mutex as StdMutex,
    time::Duration,
};

use async_trait::async_trait;
use shared::{
    domain::FeedbackKind,
    error::{DeviceRejected, ReplyStatus},
    protocol::{DivideReply, Endpoint, MoveReply},
};
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Move(MoveQuery),
    Divide(DivideQuery),
    Reset,
    EmergencyStop,
    EnableMotor,
    Status,
}

#[derive(Debug, Clone)]
enum Failure {
    Rejected(String),
    Http(u16),
    Transport,
}

impl Failure {
    fn to_error(&self) -> ApiCallError {
        match self {
            Failure::Rejected(message) => ApiCallError::Rejected(DeviceRejected {
                status: ReplyStatus::Error,
                message: message.clone(),
            }),
            Failure::Http(code) => ApiCallError::Http(*code),
            Failure::Transport => ApiCallError::Transport("connection refused".to_string()),
        }
    }
}

/// Scripted device: records every call, can fail on demand and can hold an
/// endpoint's reply until released.
struct FakeDevice {
    calls: StdMutex<Vec<Call>>,
    failure: StdMutex<Option<Failure>>,
    status: StdMutex<DeviceStatus>,
    angle_per_division: f64,
    actual_angle: Option<f64>,
    holds: StdMutex<HashMap<Endpoint, Arc<Notify>>>,
}

impl FakeDevice {
    fn new() -> Arc<Self> {
        Arc::new(Self::with_angles(None, None))
    }

    fn with_angles(angle_per_division: Option<f64>, actual_angle: Option<f64>) -> Self {
        Self {
            calls: StdMutex::new(Vec::new()),
            failure: StdMutex::new(None),
            status: StdMutex::new(DeviceStatus {
                current_angle: 0.0,
                rpm: 60,
                enabled: true,
                max_rpm: Some(300),
                resolution: Some(0.1125),
                steps_per_rev: Some(200),
                microsteps: Some(16),
            }),
            angle_per_division: angle_per_division.unwrap_or(0.0),
            actual_angle,
            holds: StdMutex::new(HashMap::new()),
        }
    }

    fn fail_with(&self, failure: Failure) {
        *self.failure.lock().expect("failure lock") = Some(failure);
    }

    fn recover(&self) {
        *self.failure.lock().expect("failure lock") = None;
    }

    fn set_status(&self, status: DeviceStatus) {
        *self.status.lock().expect("status lock") = status;
    }

    fn hold(&self, endpoint: Endpoint) -> Arc<Notify> {
        let release = Arc::new(Notify::new());
        self.holds
            .lock()
            .expect("holds lock")
            .insert(endpoint, Arc::clone(&release));
        release
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    async fn intake(&self, endpoint: Endpoint, call: Call) -> Result<(), ApiCallError> {
        self.calls.lock().expect("calls lock").push(call);
        let held = self.holds.lock().expect("holds lock").remove(&endpoint);
        if let Some(release) = held {
            release.notified().await;
        }
        match self.failure.lock().expect("failure lock").as_ref() {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }

    async fn wait_for_calls(&self, count: usize) {
        while self.calls.lock().expect("calls lock").len() < count {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl DivisorApi for FakeDevice {
    async fn move_by(&self, query: MoveQuery) -> Result<MoveReply, ApiCallError> {
        self.intake(Endpoint::Move, Call::Move(query)).await?;
        Ok(MoveReply {
            actual_angle: self.actual_angle.unwrap_or(query.angle),
            current_rpm: Some(f64::from(query.rpm)),
        })
    }

    async fn divide(&self, query: DivideQuery) -> Result<DivideReply, ApiCallError> {
        self.intake(Endpoint::Divide, Call::Divide(query)).await?;
        let angle = if self.angle_per_division > 0.0 {
            self.angle_per_division
        } else {
            360.0 / f64::from(query.divisions)
        };
        Ok(DivideReply {
            angle_per_division: angle,
            divisions: Some(query.divisions),
            current_angle: Some(angle),
        })
    }

    async fn reset(&self) -> Result<AckReply, ApiCallError> {
        self.intake(Endpoint::Reset, Call::Reset).await?;
        Ok(AckReply {
            current_angle: Some(0.0),
            enabled: None,
        })
    }

    async fn emergency_stop(&self) -> Result<AckReply, ApiCallError> {
        self.intake(Endpoint::EmergencyStop, Call::EmergencyStop)
            .await?;
        Ok(AckReply {
            current_angle: None,
            enabled: Some(false),
        })
    }

    async fn enable_motor(&self) -> Result<AckReply, ApiCallError> {
        self.intake(Endpoint::EnableMotor, Call::EnableMotor).await?;
        Ok(AckReply {
            current_angle: None,
            enabled: Some(true),
        })
    }

    async fn status(&self) -> Result<DeviceStatus, ApiCallError> {
        self.intake(Endpoint::Status, Call::Status).await?;
        Ok(self.status.lock().expect("status lock").clone())
    }
}

fn panel_config() -> PanelConfig {
    PanelConfig {
        max_rpm: 300,
        min_rpm: 1,
        resolution: 0.1125,
    }
}

fn controller_for(device: &Arc<FakeDevice>) -> Arc<DivisorController> {
    DivisorController::new(Arc::clone(device) as Arc<dyn DivisorApi>, panel_config())
}

#[tokio::test]
async fn rpm_above_max_is_clamped_before_sending() {
    let device = FakeDevice::new();
    let controller = controller_for(&device);

    controller.change_rpm("500").await.expect("speed");

    assert_eq!(
        device.calls(),
        vec![Call::Move(MoveQuery {
            angle: 0.0,
            rpm: 300
        })]
    );
    let view = controller.snapshot().await;
    assert_eq!(view.rpm_field, 300);
    assert_eq!(view.rpm_slider, 300);
    assert_eq!(view.current_rpm_text, "300");
    assert_eq!(view.feedback, Feedback::success("Speed set to 300 RPM"));
}

#[tokio::test]
async fn divide_below_two_never_reaches_device() {
    let device = FakeDevice::new();
    let controller = controller_for(&device);

    for raw in ["1", "0", "-5", "none"] {
        let err = controller.divide(raw).await.expect_err("must reject");
        assert!(matches!(err, ControlError::Input(InputError::TooFewDivisions)));
    }

    assert!(device.calls().is_empty());
    let view = controller.snapshot().await;
    assert_eq!(view.feedback.kind, FeedbackKind::Error);
    assert_eq!(view.feedback.text, "Error: minimum 2 divisions");
}

#[tokio::test]
async fn divide_then_advance_cycles_through_divisions() {
    let device = Arc::new(FakeDevice::with_angles(Some(90.0), None));
    let controller = controller_for(&device);
    controller.set_speed(50).await.expect("speed");

    controller.divide("4").await.expect("divide");
    let session = controller.session().await;
    assert_eq!(session.total_divisions(), 4);
    assert_eq!(session.current_division(), 1);
    assert_eq!(session.angle_per_division(), 90.0);
    assert_eq!(
        device.calls()[1],
        Call::Divide(DivideQuery {
            divisions: 4,
            rpm: 50
        })
    );

    let mut seen = Vec::new();
    for _ in 0..4 {
        controller.next_division().await.expect("next");
        seen.push(controller.session().await.current_division());
    }
    assert_eq!(seen, vec![2, 3, 4, 1]);
    assert!(device.calls()[2..].iter().all(|call| *call
        == Call::Move(MoveQuery {
            angle: 90.0,
            rpm: 50
        })));

    let view = controller.snapshot().await;
    assert_eq!(view.current_division_text, "1");
    assert_eq!(view.total_divisions_text, "4");
    assert_eq!(view.angle_per_division_text, "90.0000");
    assert_eq!(view.feedback.text, "Division 1/4 complete");
}

#[tokio::test]
async fn divide_uses_server_reported_angle() {
    let device = Arc::new(FakeDevice::with_angles(Some(51.4286), None));
    let controller = controller_for(&device);

    controller.divide("7").await.expect("divide");

    assert_eq!(controller.session().await.angle_per_division(), 51.4286);
    assert_eq!(
        controller.snapshot().await.feedback.text,
        "Circle divided into 7 parts of 51.4286°"
    );
}

#[tokio::test]
async fn advance_before_divide_is_rejected_locally() {
    let device = FakeDevice::new();
    let controller = controller_for(&device);

    let err = controller.next_division().await.expect_err("must reject");

    assert!(matches!(err, ControlError::Input(InputError::NotDivided)));
    assert!(device.calls().is_empty());
    assert_eq!(
        controller.snapshot().await.feedback.text,
        "Error: divide the circle first"
    );
}

#[tokio::test]
async fn failed_commands_leave_session_untouched() {
    let device = FakeDevice::new();
    let controller = controller_for(&device);
    controller.divide("6").await.expect("divide");
    controller.next_division().await.expect("next");
    let before = controller.session().await;

    for failure in [
        Failure::Rejected("Motor disabled".to_string()),
        Failure::Http(503),
        Failure::Transport,
    ] {
        device.fail_with(failure);
        controller.divide("3").await.expect_err("divide fails");
        controller.next_division().await.expect_err("next fails");
        controller.reset().await.expect_err("reset fails");
        assert_eq!(controller.session().await, before);
    }

    let view = controller.snapshot().await;
    assert_eq!(view.feedback.kind, FeedbackKind::Error);
    assert_eq!(view.current_division_text, "2");
}

#[tokio::test]
async fn device_message_is_surfaced_on_failure() {
    let device = FakeDevice::new();
    let controller = controller_for(&device);
    device.fail_with(Failure::Rejected(
        "Motor disabled (emergency stop active)".to_string(),
    ));

    controller.precise_move("10").await.expect_err("must fail");

    assert_eq!(
        controller.snapshot().await.feedback.text,
        "Error: Motor disabled (emergency stop active)"
    );
}

#[tokio::test]
async fn precise_move_with_garbage_angle_sends_nothing() {
    let device = FakeDevice::new();
    let controller = controller_for(&device);

    let err = controller.precise_move("abc").await.expect_err("must reject");

    assert!(matches!(err, ControlError::Input(InputError::InvalidAngle)));
    assert!(device.calls().is_empty());
    let view = controller.snapshot().await;
    assert_eq!(view.feedback.text, "Error: enter a valid angle");
    assert_eq!(view.precise_angle_field, "abc");
}

#[tokio::test]
async fn precise_move_reports_actual_angle_and_clears_field() {
    let device = Arc::new(FakeDevice::with_angles(None, Some(33.3375)));
    let controller = controller_for(&device);

    controller.precise_move("33.33").await.expect("move");

    assert_eq!(
        device.calls(),
        vec![Call::Move(MoveQuery {
            angle: 33.33,
            rpm: 60
        })]
    );
    let view = controller.snapshot().await;
    assert_eq!(view.feedback, Feedback::success("Moved to 33.3375°"));
    assert!(view.precise_angle_field.is_empty());
}

#[tokio::test]
async fn reset_rewinds_current_division_only() {
    let device = FakeDevice::new();
    let controller = controller_for(&device);
    controller.divide("4").await.expect("divide");
    controller.next_division().await.expect("next");

    controller.reset().await.expect("reset");

    let session = controller.session().await;
    assert_eq!(session.current_division(), 0);
    assert_eq!(session.total_divisions(), 4);
    assert_eq!(
        controller.snapshot().await.feedback.text,
        "Position reset to 0°"
    );

    controller.next_division().await.expect("next after reset");
    assert_eq!(controller.session().await.current_division(), 1);
}

#[tokio::test]
async fn emergency_stop_and_enable_report_outcome() {
    let device = FakeDevice::new();
    let controller = controller_for(&device);

    controller.emergency_stop().await.expect("stop");
    assert_eq!(
        controller.snapshot().await.feedback,
        Feedback::alert("EMERGENCY STOP ACTIVATED!")
    );

    controller.enable_motor().await.expect("enable");
    assert_eq!(
        controller.snapshot().await.feedback,
        Feedback::success("Motor enabled")
    );
    assert_eq!(device.calls(), vec![Call::EmergencyStop, Call::EnableMotor]);
}

#[tokio::test]
async fn status_poll_updates_display() {
    let device = FakeDevice::new();
    let controller = controller_for(&device);
    device.set_status(DeviceStatus {
        current_angle: 270.0,
        rpm: 120,
        enabled: false,
        max_rpm: Some(300),
        resolution: Some(0.1125),
        steps_per_rev: Some(200),
        microsteps: Some(16),
    });

    controller.refresh_status().await.expect("poll");

    let view = controller.snapshot().await;
    assert_eq!(view.current_angle_text, "270.0000");
    assert_eq!(view.rpm_field, 120);
    assert_eq!(view.rpm_slider, 120);
    assert_eq!(view.current_rpm_text, "120");
    assert_eq!(view.dial_fraction, 0.75);
    assert_eq!(view.connection, ConnectionState::Connected);
    assert!(view.enable_available);
    assert!(!view.emergency_available);
}

#[tokio::test]
async fn failed_poll_marks_disconnected_and_keeps_message() {
    let device = FakeDevice::new();
    let controller = controller_for(&device);
    controller.enable_motor().await.expect("enable");
    controller.refresh_status().await.expect("poll");

    device.fail_with(Failure::Transport);
    controller.refresh_status().await.expect_err("poll fails");

    let view = controller.snapshot().await;
    assert_eq!(view.connection, ConnectionState::Disconnected);
    assert_eq!(view.feedback, Feedback::success("Motor enabled"));

    device.recover();
    controller.refresh_status().await.expect("poll recovers");
    assert_eq!(
        controller.snapshot().await.connection,
        ConnectionState::Connected
    );
}

#[tokio::test]
async fn overlapping_advances_both_count() {
    let device = FakeDevice::new();
    let controller = controller_for(&device);
    controller.divide("4").await.expect("divide");

    let release = device.hold(Endpoint::Move);
    let first_advance = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.next_division().await })
    };
    device.wait_for_calls(2).await;

    controller.next_division().await.expect("second next");
    assert_eq!(controller.session().await.current_division(), 2);

    release.notify_one();
    let outcome = first_advance.await.expect("join").expect("first next");
    assert_eq!(outcome, Outcome::Applied);

    let moves = device
        .calls()
        .iter()
        .filter(|call| matches!(call, Call::Move(_)))
        .count();
    assert_eq!(moves, 2);
    assert_eq!(controller.session().await.current_division(), 3);
    assert_eq!(
        controller.snapshot().await.feedback.text,
        "Division 3/4 complete"
    );
}

#[tokio::test]
async fn advance_landing_after_newer_reset_is_dropped() {
    let device = FakeDevice::new();
    let controller = controller_for(&device);
    controller.divide("4").await.expect("divide");

    let release = device.hold(Endpoint::Move);
    let pending_advance = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.next_division().await })
    };
    device.wait_for_calls(2).await;

    controller.reset().await.expect("reset");
    release.notify_one();

    let outcome = pending_advance.await.expect("join").expect("next");
    assert_eq!(outcome, Outcome::Superseded);
    assert_eq!(controller.session().await.current_division(), 0);
    assert_eq!(
        controller.snapshot().await.feedback.text,
        "Position reset to 0°"
    );
}

#[tokio::test]
async fn late_reset_reply_still_rewinds() {
    let device = FakeDevice::new();
    let controller = controller_for(&device);
    controller.divide("4").await.expect("divide");

    let release = device.hold(Endpoint::Reset);
    let pending_reset = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.reset().await })
    };
    device.wait_for_calls(2).await;

    controller.next_division().await.expect("next");
    assert_eq!(controller.session().await.current_division(), 2);

    release.notify_one();
    let outcome = pending_reset.await.expect("join").expect("reset");
    assert_eq!(outcome, Outcome::Applied);
    assert_eq!(controller.session().await.current_division(), 0);
}

#[tokio::test]
async fn stale_divide_reply_does_not_replace_newer_layout() {
    let device = FakeDevice::new();
    let controller = controller_for(&device);

    let release = device.hold(Endpoint::Divide);
    let pending_divide = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.divide("4").await })
    };
    device.wait_for_calls(1).await;

    controller.divide("6").await.expect("newer divide");
    release.notify_one();

    let outcome = pending_divide.await.expect("join").expect("divide");
    assert_eq!(outcome, Outcome::Superseded);
    let session = controller.session().await;
    assert_eq!(session.total_divisions(), 6);
    assert_eq!(session.current_division(), 1);
}

#[tokio::test]
async fn poll_issued_before_speed_change_cannot_restore_old_rpm() {
    let device = FakeDevice::new();
    let controller = controller_for(&device);

    let release = device.hold(Endpoint::Status);
    let pending_poll = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.refresh_status().await })
    };
    device.wait_for_calls(1).await;

    controller.set_speed(150).await.expect("speed");
    release.notify_one();

    let outcome = pending_poll.await.expect("join").expect("poll");
    assert_eq!(outcome, Outcome::Superseded);
    let view = controller.snapshot().await;
    assert_eq!(view.rpm_field, 150);
    assert_eq!(view.current_rpm_text, "150");
}

#[tokio::test]
async fn events_are_broadcast_for_session_and_feedback() {
    let device = FakeDevice::new();
    let controller = controller_for(&device);
    let mut events = controller.subscribe_events();

    controller.divide("3").await.expect("divide");

    let first = events.recv().await.expect("event");
    assert!(
        matches!(first, PanelEvent::SessionChanged(session) if session.total_divisions() == 3)
    );
    let second = events.recv().await.expect("event");
    assert!(matches!(second, PanelEvent::Feedback(feedback) if feedback.kind == FeedbackKind::Success));
}

#[tokio::test(start_paused = true)]
async fn poller_runs_immediately_then_every_period_through_failures() {
    let device = FakeDevice::new();
    device.fail_with(Failure::Http(502));
    let controller = controller_for(&device);

    let poller = StatusPoller::spawn(Arc::clone(&controller), Duration::from_secs(1));
    tokio::time::sleep(Duration::from_millis(2_500)).await;

    let polls = device
        .calls()
        .iter()
        .filter(|call| **call == Call::Status)
        .count();
    assert_eq!(polls, 3);
    assert!(poller.is_running());
    assert_eq!(
        controller.snapshot().await.connection,
        ConnectionState::Disconnected
    );
    assert_eq!(controller.snapshot().await.feedback, Feedback::default());

    poller.stop();
}

#[tokio::test(start_paused = true)]
async fn hung_status_request_does_not_stall_polling() {
    let device = FakeDevice::new();
    let controller = controller_for(&device);
    let _never_released = device.hold(Endpoint::Status);

    let poller = StatusPoller::spawn(Arc::clone(&controller), Duration::from_secs(1));
    tokio::time::sleep(Duration::from_millis(2_500)).await;

    let polls = device
        .calls()
        .iter()
        .filter(|call| **call == Call::Status)
        .count();
    assert_eq!(polls, 3);
    assert_eq!(
        controller.snapshot().await.connection,
        ConnectionState::Connected
    );

    poller.stop();
}
