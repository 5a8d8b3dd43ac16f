//! Elapsed-time ticker bound to the Recording phase.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};

use super::controller::SessionEvent;

/// Repeating tick that feeds `SessionEvent::Tick` into the controller.
///
/// The background task is cancelled when the timer is dropped, so leaving
/// the Recording phase (which owns the timer) always stops it.
pub(crate) struct ElapsedTimer {
    generation: u64,
    _guard: DropGuard,
}

impl ElapsedTimer {
    pub(crate) fn start(
        generation: u64,
        period: Duration,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        if events.send(SessionEvent::Tick { generation }).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Self {
            generation,
            _guard: cancel.drop_guard(),
        }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }
}
