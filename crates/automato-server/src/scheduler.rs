//! Fixed-period tick loop
//!
//! Each tick runs every action once, in order. The loop sleeps for whatever is
//! left of the period and warns when a tick eats into most of it.

use automato_automation::Action;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default seconds between ticks
pub const DEFAULT_PERIOD_SECS: u64 = 5;

pub struct Scheduler {
    actions: Vec<Action>,
    period: Duration,
    ticks: u64,
}

impl Scheduler {
    pub fn new(actions: Vec<Action>, period: Duration) -> Self {
        Self {
            actions,
            period,
            ticks: 0,
        }
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Run every action once and return how long it took
    pub async fn tick(&mut self) -> Duration {
        let started = Instant::now();
        for action in &mut self.actions {
            action.execute().await;
        }
        self.ticks += 1;

        let elapsed = started.elapsed();
        debug!(tick = self.ticks, elapsed_ms = elapsed.as_millis() as u64, "Tick done");
        if self.is_overloaded(elapsed) {
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                period_ms = self.period.as_millis() as u64,
                "Tick used more than 90% of the period"
            );
        }
        elapsed
    }

    fn is_overloaded(&self, elapsed: Duration) -> bool {
        elapsed * 10 > self.period * 9
    }

    /// Tick until `shutdown` completes
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(
            actions = self.actions.len(),
            period_secs = self.period.as_secs_f64(),
            "Starting scheduler"
        );
        tokio::pin!(shutdown);

        loop {
            let elapsed = self.tick().await;
            let remaining = self.period.saturating_sub(elapsed);

            tokio::select! {
                _ = tokio::time::sleep(remaining) => {}
                _ = &mut shutdown => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        info!(ticks = self.ticks, "Scheduler stopped");
    }
}
