//! Memo table configuration.

use std::time::Duration;

/// When a memoized entry stops being served.
///
/// `sliding` restarts on every read; `absolute` counts from insertion and is
/// never extended. With both set, whichever comes first wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Expiration {
    pub sliding: Option<Duration>,
    pub absolute: Option<Duration>,
}

impl Expiration {
    pub const fn new(sliding: Duration, absolute: Duration) -> Self {
        Self {
            sliding: Some(sliding),
            absolute: Some(absolute),
        }
    }

    /// Lifetime of a freshly inserted entry.
    pub fn initial(&self) -> Option<Duration> {
        min_of(self.sliding, self.absolute)
    }

    /// Remaining lifetime after a read, given the entry's age.
    pub fn after_read(&self, age: Duration) -> Option<Duration> {
        let remaining = self.absolute.map(|abs| abs.saturating_sub(age));
        min_of(self.sliding, remaining)
    }
}

fn min_of(a: Option<Duration>, b: Option<Duration>) -> Option<Duration> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Configuration for a memo table.
#[derive(Debug, Clone)]
pub struct MemoConfig {
    /// Maximum number of entries in the table.
    pub max_capacity: u64,

    /// Expiration for entries inserted without an explicit one.
    pub expiration: Expiration,
}

impl Default for MemoConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            expiration: Expiration::new(Duration::from_secs(300), Duration::from_secs(1800)),
        }
    }
}

impl MemoConfig {
    pub fn with_capacity(max_capacity: u64) -> Self {
        Self {
            max_capacity,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn expiration(mut self, expiration: Expiration) -> Self {
        self.expiration = expiration;
        self
    }
}
