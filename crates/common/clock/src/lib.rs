use mockall::automock;
use time::OffsetDateTime;

pub type Timestamp = OffsetDateTime;

/// A source of the current time.
///
/// The bridge never calls `OffsetDateTime::now_utc()` directly, so that
/// flush timings can be driven by a `MockClock` in tests.
#[automock]
pub trait Clock: Sync + Send + 'static {
    fn now(&self) -> Timestamp;
}

#[derive(Clone, Debug)]
pub struct WallClock;

impl Clock for WallClock {
    fn now(&self) -> Timestamp {
        OffsetDateTime::now_utc()
    }
}
