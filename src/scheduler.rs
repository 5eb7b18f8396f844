//! Background ticker driving the leak and refill schedules.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::trace;

/// A fixed-interval background task with deterministic shutdown.
///
/// The first tick fires one full period after spawn. [`stop`](Ticker::stop)
/// lets an in-flight tick finish and prevents any further tick from
/// starting; dropping the ticker has the same effect, so a discarded
/// limiter cannot leak its background task.
pub struct Ticker {
    shutdown: watch::Sender<bool>,
}

impl Ticker {
    /// Spawn a ticker that runs `on_tick` every `period`.
    ///
    /// Must be called within a tokio runtime. Ticks that would pile up
    /// behind a slow `on_tick` are skipped, not replayed in a burst.
    pub fn spawn<F>(label: &'static str, period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let (shutdown, mut stopped) = watch::channel(false);

        tokio::spawn(async move {
            let mut interval = time::interval_at(time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => on_tick(),
                    _ = stopped.changed() => break,
                }
            }

            trace!(label, "Ticker stopped");
        });

        Self { shutdown }
    }

    /// Request shutdown. Returns immediately; the background task exits at
    /// its next scheduling point. Idempotent.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }
}
