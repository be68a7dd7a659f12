// Server-clock calibration: one self-restarting observation loop per
// context, plus an immediate seed when the bridge already knows the time.

use super::*;

impl ContextCore {
    pub(super) fn handle_account_bridge_attached(&mut self) {
        let Some(bridge) = read_slot(&self.slots.account_bridge) else {
            return;
        };
        let server_time = bridge.current_server_time();
        if server_time > 0 {
            self.apply_server_time(server_time);
        }
        self.start_clock_calibration();
    }

    /// Registered under a single key, so re-attaching a bridge replaces the
    /// previous loop instead of stacking a second one.
    fn start_clock_calibration(&mut self) {
        let interval = self.config.clock_sync_interval();
        let handle = CancelHandle::new();
        let alive = handle.alive();
        let token = self.tasks.set(TaskKey::ClockCalibration, handle);

        let bridge_slot = self.slots.account_bridge.clone();
        let tx = self.core_sender.clone();
        let join = self.runtime.spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if !alive.load(Ordering::SeqCst) {
                    return;
                }
                let server_time = read_slot(&bridge_slot)
                    .map(|b| b.current_server_time())
                    .unwrap_or(0);
                if !alive.load(Ordering::SeqCst) {
                    return;
                }
                let _ = tx.send(CoreMsg::Internal(Box::new(
                    InternalEvent::ServerTimeObserved { token, server_time },
                )));
            }
        });
        self.tasks
            .attach_abort(TaskKey::ClockCalibration, token, join.abort_handle());
        tracing::info!(interval_secs = interval.as_secs(), "clock_calibration_started");
    }

    pub(super) fn handle_server_time_observed(&mut self, token: u64, server_time: i64) {
        if !self.tasks.is_current(TaskKey::ClockCalibration, token) {
            return;
        }
        if server_time > 0 {
            self.apply_server_time(server_time);
        } else {
            // Server time unknown this round; the last skew stays valid.
            tracing::debug!("server time unavailable, keeping last skew");
        }
    }

    fn apply_server_time(&mut self, server_time: i64) {
        let time_difference = server_time - now_seconds();
        if time_difference != self.state.time_difference {
            tracing::debug!(time_difference, "time_difference_updated");
            self.state.time_difference = time_difference;
            self.emit_time_difference();
        }
    }
}
