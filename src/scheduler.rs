use log::{debug, info};
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Fires `job` every `period`, starting one period from now.
///
/// A tick that finds `busy()` true is dropped rather than queued, so a
/// periodic trigger never stacks work on top of an in-flight run.
pub fn spawn_periodic<B, F, Fut>(
    name: &'static str,
    period: Duration,
    busy: B,
    job: F,
) -> JoinHandle<()>
where
    B: Fn() -> bool + Send + 'static,
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    info!("🔁 Scheduling {} every {}s", name, period.as_secs());

    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if busy() {
                debug!("⏭️ Skipping {} tick, previous one still running", name);
                continue;
            }
            tokio::spawn(job());
        }
    })
}
