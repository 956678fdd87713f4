//! Command orchestration helpers from operator input to backend command queue.

use crossbeam_channel::{Sender, TrySendError};

use crate::backend_bridge::commands::BackendCommand;

/// Queues `cmd` for the backend worker. Returns a status line for the
/// operator when the command could not be queued.
pub fn dispatch_backend_command(
    cmd_tx: &Sender<BackendCommand>,
    cmd: BackendCommand,
) -> Option<String> {
    let cmd_name = cmd.name();

    match cmd_tx.try_send(cmd) {
        Ok(()) => {
            tracing::debug!(command = cmd_name, "queued ui->backend command");
            None
        }
        Err(TrySendError::Full(_)) => Some("Command queue is full; please retry".to_string()),
        Err(TrySendError::Disconnected(_)) => Some(
            "Backend worker disconnected (possible startup/runtime failure); restart the panel"
                .to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn queued_command_reaches_receiver() {
        let (tx, rx) = bounded(1);
        assert_eq!(dispatch_backend_command(&tx, BackendCommand::Reset), None);
        assert_eq!(rx.try_recv().expect("queued"), BackendCommand::Reset);
    }

    #[test]
    fn full_queue_reports_retry() {
        let (tx, _rx) = bounded(1);
        dispatch_backend_command(&tx, BackendCommand::Show);
        let status = dispatch_backend_command(&tx, BackendCommand::Show).expect("status");
        assert!(status.contains("full"));
    }

    #[test]
    fn dropped_worker_reports_disconnect() {
        let (tx, rx) = bounded(1);
        drop(rx);
        let status =
            dispatch_backend_command(&tx, BackendCommand::NextDivision).expect("status");
        assert!(status.contains("disconnected"));
    }
}
