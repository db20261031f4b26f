//! Background timer processing.
//!
//! Queues also apply due timers whenever they are accessed; this task makes
//! sure idle queues still promote delayed messages, return expired in-flight
//! messages, redrive and drop messages past retention.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info};

use crate::sqs::SqsEngine;

/// Periodically applies due timers on every queue.
pub struct VisibilityManager {
    engine: SqsEngine,
    check_interval: Duration,
}

impl VisibilityManager {
    /// Create a visibility manager using the engine's configured tick.
    pub fn new(engine: SqsEngine) -> Self {
        let interval = engine.config().scheduler.tick_interval();
        Self::with_interval(engine, interval)
    }

    /// Create a visibility manager with custom check interval.
    pub fn with_interval(engine: SqsEngine, check_interval: Duration) -> Self {
        Self {
            engine,
            check_interval,
        }
    }

    /// Tick interval.
    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    /// Run until a shutdown notification arrives.
    pub async fn start(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_ms = self.check_interval.as_millis() as u64,
            "Starting visibility timeout manager"
        );

        let mut interval = time::interval(self.check_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.engine.process_due_timers().await {
                        error!(error = %e, "Error processing due timers");
                    }
                }
                _ = shutdown.recv() => {
                    info!("Visibility timeout manager shutting down");
                    break;
                }
            }
        }
    }
}
