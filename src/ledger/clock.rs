use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Wall-clock nanoseconds that never repeat or go backwards within a process.
#[derive(Debug, Default)]
pub struct LedgerClock {
    last: AtomicU64,
}

impl LedgerClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_nanos(&self) -> u64 {
        let wall = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX).max(0) as u64;
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(wall.max(last.saturating_add(1)))
            })
            .unwrap_or_else(|last| last);
        wall.max(previous.saturating_add(1))
    }
}
