//! Backend worker: owns the tokio runtime, the panel controller and the status
//! poller, and turns queued commands into controller calls.

use std::{
    sync::Arc,
    thread::{self, JoinHandle},
};

use client_core::{DivisorController, HttpDivisorApi, PanelEvent, StatusPoller};
use crossbeam_channel::{Receiver, Sender};
use shared::domain::ConnectionState;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::{
    backend_bridge::commands::BackendCommand,
    config::Settings,
    controller::events::{UiError, UiErrorContext, UiEvent},
};

pub fn launch(
    settings: Settings,
    cmd_rx: Receiver<BackendCommand>,
    ui_tx: Sender<UiEvent>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let _ = ui_tx.try_send(UiEvent::Info("Backend worker starting...".to_string()));
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                    UiErrorContext::BackendStartup,
                    format!("failed to build backend runtime: {err}"),
                )));
                tracing::error!("failed to build backend runtime: {err}");
                return;
            }
        };

        runtime.block_on(run_worker(settings, cmd_rx, ui_tx));
    })
}

async fn run_worker(settings: Settings, cmd_rx: Receiver<BackendCommand>, ui_tx: Sender<UiEvent>) {
    let api = match HttpDivisorApi::new(&settings.base_url, settings.request_timeout()) {
        Ok(api) => api,
        Err(err) => {
            let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                UiErrorContext::BackendStartup,
                format!("{err:#}"),
            )));
            tracing::error!("failed to create device client: {err:#}");
            return;
        }
    };
    let base_url = api.base_url().to_string();
    let controller = DivisorController::new(Arc::new(api), settings.panel_config());

    let forwarder = tokio::spawn(forward_connection_changes(
        controller.subscribe_events(),
        ui_tx.clone(),
    ));
    let poller = StatusPoller::spawn(Arc::clone(&controller), settings.poll_interval());
    tracing::info!(base_url = %base_url, "backend worker ready");
    let _ = ui_tx.try_send(UiEvent::Info(format!("Controlling divisor head at {base_url}")));
    let _ = ui_tx.try_send(UiEvent::Render(controller.snapshot().await));

    // Commands run as their own tasks so a slow request never holds up the
    // next one; replies are ordered inside the controller.
    while let Ok(cmd) = cmd_rx.recv() {
        if cmd == BackendCommand::Shutdown {
            break;
        }
        let controller = Arc::clone(&controller);
        let ui_tx = ui_tx.clone();
        tokio::spawn(async move {
            execute(&controller, cmd, &ui_tx).await;
        });
    }

    poller.stop();
    forwarder.abort();
    tracing::info!("backend worker stopped");
}

async fn execute(controller: &DivisorController, cmd: BackendCommand, ui_tx: &Sender<UiEvent>) {
    let name = cmd.name();
    let result = match cmd {
        BackendCommand::ChangeRpm { raw } => controller.change_rpm(&raw).await,
        BackendCommand::Divide { raw } => controller.divide(&raw).await,
        BackendCommand::NextDivision => controller.next_division().await,
        BackendCommand::PreciseMove { raw } => controller.precise_move(&raw).await,
        BackendCommand::Reset => controller.reset().await,
        BackendCommand::EmergencyStop => controller.emergency_stop().await,
        BackendCommand::EnableMotor => controller.enable_motor().await,
        BackendCommand::Show | BackendCommand::Shutdown => {
            let _ = ui_tx.try_send(UiEvent::Render(controller.snapshot().await));
            return;
        }
    };

    let _ = ui_tx.try_send(UiEvent::Render(controller.snapshot().await));
    match result {
        Ok(outcome) => tracing::debug!(command = name, ?outcome, "command finished"),
        Err(err) => {
            let _ = ui_tx.try_send(UiEvent::Error(UiError::from_control_error(&err)));
        }
    }
}

/// Relays connection flips to the UI. Status refreshes themselves are not
/// redrawn so the terminal is not repainted every second.
async fn forward_connection_changes(
    mut events: broadcast::Receiver<PanelEvent>,
    ui_tx: Sender<UiEvent>,
) {
    let mut last = ConnectionState::Unknown;
    loop {
        let connection = match events.recv().await {
            Ok(PanelEvent::StatusRefreshed(_)) => ConnectionState::Connected,
            Ok(PanelEvent::ConnectionChanged(state)) => state,
            Ok(_) => continue,
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "panel event forwarder lagged");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        if connection != last {
            last = connection;
            if ui_tx.try_send(UiEvent::ConnectionChanged(connection)).is_err() {
                tracing::warn!("ui event queue unavailable; dropping connection update");
            }
        }
    }
}
