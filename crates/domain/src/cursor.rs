use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Subscribe position: a 17-digit timetoken (10 ns ticks since the Unix
/// epoch) plus the region that issued it.
///
/// The zero cursor asks the server for its current time without messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Cursor {
    pub timetoken: u64,
    pub region: u32,
}

impl Cursor {
    pub const ZERO: Cursor = Cursor {
        timetoken: 0,
        region: 0,
    };

    pub fn new(timetoken: u64, region: u32) -> Self {
        Self { timetoken, region }
    }

    pub fn is_zero(&self) -> bool {
        self.timetoken == 0
    }

    /// Wall-clock instant encoded in the timetoken.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        timetoken_to_datetime(self.timetoken)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.timetoken, self.region)
    }
}

pub fn timetoken_to_datetime(timetoken: u64) -> Option<DateTime<Utc>> {
    let secs = (timetoken / 10_000_000) as i64;
    let nanos = ((timetoken % 10_000_000) * 100) as u32;
    Utc.timestamp_opt(secs, nanos).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_default() {
        assert!(Cursor::default().is_zero());
        assert_eq!(Cursor::default(), Cursor::ZERO);
    }

    #[test]
    fn timetoken_converts_to_utc() {
        let c = Cursor::new(17_000_000_000_000_000, 1);
        let dt = c.to_datetime().unwrap();
        assert_eq!(dt.timestamp(), 1_700_000_000);
    }

    #[test]
    fn display_includes_region() {
        assert_eq!(Cursor::new(42, 7).to_string(), "42@7");
    }
}
