//! Recording adapter for the `Clock` port.

use chrono::{DateTime, Utc};

use super::record_interaction;
use crate::cassette::session::SharedRecorder;
use crate::ports::Clock;

/// Records every timestamp handed out by the inner clock.
pub struct RecordingClock {
    inner: Box<dyn Clock>,
    recorder: SharedRecorder,
}

impl RecordingClock {
    /// Wraps `inner`, writing into `recorder`.
    pub fn new(inner: Box<dyn Clock>, recorder: SharedRecorder) -> Self {
        Self { inner, recorder }
    }
}

impl Clock for RecordingClock {
    fn now(&self) -> DateTime<Utc> {
        let now = self.inner.now();
        record_interaction(&self.recorder, "clock", "now", &(), &now);
        now
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::adapters::replaying::ReplayingClock;
    use crate::cassette::recorder::CassetteRecorder;
    use crate::cassette::replayer::CassetteReplayer;
    use crate::testing::FixedClock;

    #[test]
    fn recorded_time_replays_identically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clock.cassette.yaml");
        let recorder = Arc::new(Mutex::new(CassetteRecorder::new(&path, "clock")));

        let recorded = RecordingClock::new(Box::new(FixedClock), Arc::clone(&recorder)).now();

        Arc::try_unwrap(recorder).unwrap().into_inner().unwrap().finish().unwrap();
        let replayer = CassetteReplayer::load(&path).unwrap();
        let replayed = ReplayingClock::new(Arc::new(Mutex::new(replayer))).now();
        assert_eq!(replayed, recorded);
        assert_eq!(recorded, FixedClock::instant());
    }
}
