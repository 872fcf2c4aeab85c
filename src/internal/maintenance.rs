use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    time::Duration,
};

use tokio::{
    select,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tokio_util::sync::CancellationToken;

/// What a maintenance tick wants the loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tick {
    Continue,
    /// The state the loop maintains is gone.
    Stop,
}

/// Run `tick` every `period` until `cancel_token` fires or `tick` says stop.
///
/// The first tick happens one full period after start. A panicking tick is
/// logged and the loop carries on with the next period.
pub(crate) async fn run_periodic<F>(
    name: &'static str,
    period: Duration,
    cancel_token: CancellationToken,
    mut tick: F,
) where
    F: FnMut(Duration) -> Tick,
{
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last = Instant::now();

    loop {
        select! {
            _ = cancel_token.cancelled() => break,
            at = ticker.tick() => {
                let elapsed = at.saturating_duration_since(last);
                last = at;
                match catch_unwind(AssertUnwindSafe(|| tick(elapsed))) {
                    Ok(Tick::Continue) => {}
                    Ok(Tick::Stop) => break,
                    Err(_) => tracing::error!(task = name, "Maintenance tick panicked"),
                }
            }
        }
    }
    tracing::debug!(task = name, "Maintenance loop stopped");
}
