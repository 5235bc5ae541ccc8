//! Insert-time lifecycle hooks.
//!
//! # Responsibility
//! - Stamp `creation_date` on newly materialized records.
//!
//! # Invariants
//! - The hook runs exactly once per insertion, before caller-supplied values
//!   are applied.
//! - Stamps handed out in one process are strictly increasing, so ordering
//!   by `creation_date` is total.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static LAST_CREATION_STAMP: AtomicI64 = AtomicI64::new(0);

/// Hook invoked when a new record is first materialized in a context.
pub(crate) trait AwakeFromInsert {
    fn awake_from_insert(&mut self, creation_date: i64);
}

/// Runs the insert hook on a fresh record and returns it.
pub(crate) fn materialize<T: AwakeFromInsert>(mut record: T) -> T {
    record.awake_from_insert(creation_timestamp());
    record
}

/// Returns the current time in epoch milliseconds, bumped past the last
/// stamp when the clock has not advanced.
pub fn creation_timestamp() -> i64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX));

    let mut last = LAST_CREATION_STAMP.load(Ordering::Relaxed);
    loop {
        let next = now.max(last.saturating_add(1));
        match LAST_CREATION_STAMP.compare_exchange_weak(
            last,
            next,
            Ordering::AcqRel,
            Ordering::Relaxed,
        ) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

/// Ensures later stamps sort after `stamp` (e.g. the newest persisted row).
pub(crate) fn advance_past(stamp: i64) {
    LAST_CREATION_STAMP.fetch_max(stamp, Ordering::AcqRel);
}

#[cfg(test)]
mod tests {
    use super::{advance_past, creation_timestamp};

    #[test]
    fn stamps_are_strictly_increasing() {
        let stamps: Vec<i64> = (0..1000).map(|_| creation_timestamp()).collect();
        assert!(stamps.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn advance_past_moves_future_stamps_forward() {
        let far_future = creation_timestamp() + 1_000_000;
        advance_past(far_future);
        assert!(creation_timestamp() > far_future);
    }
}
