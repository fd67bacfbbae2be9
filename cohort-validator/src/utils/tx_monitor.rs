//! Transaction monitoring
//!
//! Wraps a transaction on the run's connection and logs how long it was held,
//! on commit or on drop (the error path, which rolls back).

use cohort_common::Result;
use sqlx::{Connection, Sqlite, SqliteConnection, Transaction};
use std::time::Instant;

/// Held-time thresholds (ms) for escalating log level
const SLOW_TX_MS: u128 = 1000;
const LONG_TX_MS: u128 = 2000;

/// Transaction wrapper that logs hold timing
pub struct MonitoredTransaction<'c> {
    tx: Transaction<'c, Sqlite>,
    guard: ReleaseLog,
}

/// Logs release timing; reports a drop if commit never ran
struct ReleaseLog {
    caller: &'static str,
    acquired_at: Instant,
    released: bool,
}

impl ReleaseLog {
    fn release(&mut self) {
        self.released = true;
        let held_ms = self.acquired_at.elapsed().as_millis();
        if held_ms > LONG_TX_MS {
            tracing::warn!(
                caller = self.caller,
                held_ms = held_ms as u64,
                "LONG TRANSACTION - held for extended period"
            );
        } else if held_ms > SLOW_TX_MS {
            tracing::info!(
                caller = self.caller,
                held_ms = held_ms as u64,
                "Transaction held longer than expected (>1s)"
            );
        } else {
            tracing::debug!(caller = self.caller, held_ms = held_ms as u64, "Transaction committed");
        }
    }
}

impl Drop for ReleaseLog {
    fn drop(&mut self) {
        if !self.released {
            tracing::debug!(
                caller = self.caller,
                held_ms = self.acquired_at.elapsed().as_millis() as u64,
                "Transaction dropped without commit (rolled back)"
            );
        }
    }
}

impl<'c> MonitoredTransaction<'c> {
    /// Connection to execute statements on
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    /// Commit and log hold time
    pub async fn commit(self) -> Result<()> {
        let Self { tx, mut guard } = self;
        tx.commit().await?;
        guard.release();
        Ok(())
    }
}

/// Begin a monitored transaction on an already-acquired connection
pub async fn begin_monitored<'c>(
    conn: &'c mut SqliteConnection,
    caller: &'static str,
) -> Result<MonitoredTransaction<'c>> {
    let start = Instant::now();
    let tx = conn.begin().await?;

    let wait_ms = start.elapsed().as_millis();
    if wait_ms > SLOW_TX_MS {
        tracing::warn!(caller, wait_ms = wait_ms as u64, "Slow transaction start (lock contention?)");
    }

    Ok(MonitoredTransaction {
        tx,
        guard: ReleaseLog {
            caller,
            acquired_at: Instant::now(),
            released: false,
        },
    })
}
