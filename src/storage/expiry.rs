//! Background Expiry Driver
//!
//! Lazy expiry only reclaims keys that are touched again; a key that
//! expires and is never accessed would otherwise sit in memory forever.
//! This module runs a background task that periodically samples a bounded
//! slice of the expiry index and evicts entries past due, using the same
//! logical deletion as lazy expiry.
//!
//! The tick adapts within a fixed band: it speeds up while samples keep
//! coming back full of expired keys and backs off toward the 1 s ceiling
//! while nothing is expiring. Each sweep takes the keyspace write lock
//! once, for one bounded batch, so client commands are never starved.

use crate::storage::Keyspace;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace};

/// Configuration for the expiry driver.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Interval the driver starts from (default: 100ms)
    pub base_interval: Duration,

    /// Shortest interval when keys are expiring quickly (default: 10ms)
    pub min_interval: Duration,

    /// Longest interval when nothing is expiring (default: 1s)
    pub max_interval: Duration,

    /// Expiry-index entries sampled per tick (default: 32)
    pub sample_limit: usize,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_millis(100),
            min_interval: Duration::from_millis(10),
            max_interval: Duration::from_secs(1),
            sample_limit: 32,
        }
    }
}

/// Handle to the running expiry driver.
///
/// Dropping the handle stops the background task.
#[derive(Debug)]
pub struct ExpiryDriver {
    shutdown_tx: watch::Sender<bool>,
}

impl ExpiryDriver {
    /// Spawns the expiry driver as a background task.
    ///
    /// Returns a handle that stops the task when dropped.
    pub fn start(keyspace: Arc<Keyspace>, config: ExpiryConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(driver_loop(keyspace, config, shutdown_rx));

        info!("Background expiry driver started");

        Self { shutdown_tx }
    }

    /// Stops the driver. Called automatically on drop.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        info!("Background expiry driver stopped");
    }
}

impl Drop for ExpiryDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn driver_loop(
    keyspace: Arc<Keyspace>,
    config: ExpiryConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut current_interval = config.base_interval;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(current_interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry driver received shutdown signal");
                    return;
                }
            }
        }

        let evicted = keyspace.sweep_expired(config.sample_limit);

        if evicted as usize >= config.sample_limit {
            // A full batch was due; likely more behind it.
            current_interval = (current_interval / 2).max(config.min_interval);
            debug!(
                evicted = evicted,
                next_tick_ms = current_interval.as_millis() as u64,
                "Expiry backlog, speeding up driver"
            );
        } else if evicted == 0 {
            current_interval = (current_interval * 2).min(config.max_interval);
            trace!(
                next_tick_ms = current_interval.as_millis() as u64,
                "Nothing due, backing off driver"
            );
        } else {
            current_interval = config.base_interval;
            debug!(
                evicted = evicted,
                expired_total = keyspace.expired_total(),
                "Evicted expired keys"
            );
        }
    }
}

/// Starts the expiry driver with the default configuration.
pub fn start_expiry_driver(keyspace: Arc<Keyspace>) -> ExpiryDriver {
    ExpiryDriver::start(keyspace, ExpiryConfig::default())
}
