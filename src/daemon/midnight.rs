use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::utils::{clock::Clock, time::next_day_start};

use super::engine::TallyEvent;

/// Emits one [TallyEvent::MidnightTick] at each local midnight, indefinitely.
///
/// Every iteration arms a fresh one-shot sleep computed from current wall-clock time, so a clock
/// jump or DST shift corrects itself at the next arming. A deadline slept past during system
/// suspend fires immediately on resume; exactly one tick is delivered no matter how many
/// midnights passed while suspended, and the engine archives only the day it believed was
/// running.
pub struct MidnightScheduler {
    next: mpsc::Sender<TallyEvent>,
    shutdown: CancellationToken,
    clock: Box<dyn Clock>,
}

impl MidnightScheduler {
    pub fn new(
        next: mpsc::Sender<TallyEvent>,
        shutdown: CancellationToken,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            next,
            shutdown,
            clock,
        }
    }

    /// Executes the scheduler event loop.
    pub async fn run(self) -> Result<()> {
        loop {
            let now = self.clock.local_time();
            let deadline = next_day_start(now);
            let wait = (deadline - now).to_std().unwrap_or(Duration::ZERO);
            debug!("Next rollover armed for {deadline} in {wait:?}");

            tokio::select! {
                // Cancelation drops the armed sleep, nothing stays dangling past shutdown.
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                _ = self.clock.sleep(wait) => ()
            }

            if self.next.send(TallyEvent::MidnightTick).await.is_err() {
                // Receiver is gone, the daemon is tearing down.
                return Ok(());
            }
        }
    }
}
