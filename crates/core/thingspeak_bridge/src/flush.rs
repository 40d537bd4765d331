use crate::error::BridgeError;
use clock::Timestamp;
use std::time::Duration;

/// When to send the pending batch to the destination.
///
/// A complete batch, i.e. with a value for each expected field, is sent
/// as soon as `min_interval` has elapsed since the previous flush.
/// Whatever its completeness, a batch is sent once `max_interval` has elapsed.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct FlushPolicy {
    expected_field_count: usize,
    min_interval: Duration,
    max_interval: Duration,
}

impl FlushPolicy {
    pub fn try_new(
        expected_field_count: usize,
        min_interval: Duration,
        max_interval: Duration,
    ) -> Result<FlushPolicy, BridgeError> {
        if min_interval > max_interval || max_interval.is_zero() {
            return Err(BridgeError::InvalidFlushThresholds {
                min_interval,
                max_interval,
            });
        }

        Ok(FlushPolicy {
            expected_field_count,
            min_interval,
            max_interval,
        })
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn max_interval(&self) -> Duration {
        self.max_interval
    }

    pub fn should_flush(&self, field_count: usize, elapsed: Duration) -> bool {
        should_flush(
            field_count,
            self.expected_field_count,
            elapsed,
            self.min_interval,
            self.max_interval,
        )
    }
}

pub fn should_flush(
    field_count: usize,
    expected_field_count: usize,
    elapsed: Duration,
    min_interval: Duration,
    max_interval: Duration,
) -> bool {
    let full = field_count >= expected_field_count;
    let min_elapsed = elapsed >= min_interval;
    let max_elapsed = elapsed >= max_interval;

    (full && min_elapsed) || max_elapsed
}

/// The time of the last flush
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct FlushClock {
    last_flush_time: Timestamp,
}

impl FlushClock {
    pub fn new(start_time: Timestamp) -> Self {
        FlushClock {
            last_flush_time: start_time,
        }
    }

    pub fn last_flush_time(&self) -> Timestamp {
        self.last_flush_time
    }

    /// Time elapsed since the last flush, zero if `now` is before the last flush
    pub fn elapsed(&self, now: Timestamp) -> Duration {
        Duration::try_from(now - self.last_flush_time).unwrap_or(Duration::ZERO)
    }

    /// Record a flush at `now`. The clock never goes backward.
    pub fn advance(&mut self, now: Timestamp) {
        if now > self.last_flush_time {
            self.last_flush_time = now;
        }
    }
}

/// The `delta_t` marker of a batch: elapsed whole seconds, rounded up, at least 1.
pub fn delta_t(elapsed: Duration) -> u64 {
    let seconds = elapsed.as_secs() + u64::from(elapsed.subsec_nanos() > 0);
    seconds.max(1)
}
