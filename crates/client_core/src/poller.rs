use std::{sync::Arc, time::Duration};

use tokio::{
    task::{JoinHandle, JoinSet},
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, info};

use crate::DivisorController;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Background status refresh: one poll right away, then one per period.
///
/// Failures only flip the connection indicator; the loop runs until
/// [`StatusPoller::stop`] is called or the poller is dropped, which also
/// cancels any poll still waiting on the device.
pub struct StatusPoller {
    task: JoinHandle<()>,
}

impl StatusPoller {
    pub fn spawn(controller: Arc<DivisorController>, period: Duration) -> Self {
        let period = period.max(MIN_POLL_INTERVAL);
        info!(period_ms = period.as_millis() as u64, "status polling started");
        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // Polls run side by side so a hung request never stalls the
            // cadence; the controller drops replies that arrive out of order.
            let mut in_flight = JoinSet::new();
            loop {
                ticker.tick().await;
                while in_flight.try_join_next().is_some() {}
                let controller = Arc::clone(&controller);
                in_flight.spawn(async move {
                    if let Err(err) = controller.refresh_status().await {
                        debug!("status poll failed: {err}");
                    }
                });
            }
        });
        Self { task }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.task.abort();
        debug!("status polling stopped");
    }
}
