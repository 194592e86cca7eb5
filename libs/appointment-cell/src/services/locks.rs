// libs/appointment-cell/src/services/locks.rs
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::NaiveDate;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

/// One async lock per calendar date. Every read-modify-write of a day's
/// waiting set runs under that day's guard, so priorities stay dense even
/// with several terminals writing at once.
#[derive(Clone, Default)]
pub struct QueueLocks {
    days: Arc<Mutex<HashMap<NaiveDate, Arc<AsyncMutex<()>>>>>,
}

impl QueueLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, date: NaiveDate) -> OwnedMutexGuard<()> {
        let day_lock = {
            let mut days = self.days.lock().unwrap_or_else(PoisonError::into_inner);
            // Drop entries nobody holds or waits on
            days.retain(|day, lock| *day == date || Arc::strong_count(lock) > 1);
            Arc::clone(
                days.entry(date)
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };

        debug!("Waiting for queue lock on {}", date);
        day_lock.lock_owned().await
    }

    /// Number of dates currently tracked.
    pub fn tracked_days(&self) -> usize {
        self.days.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
