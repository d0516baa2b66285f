//! System clock.

use chrono::{DateTime, Utc};

use crate::ports::Clock;

/// Reads the wall clock; used to stamp failure records.
pub struct LiveClock;

impl Clock for LiveClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
