//! Cassettes: recorded port traffic for deterministic replay.
//!
//! Set `TASKGEN_RECORD=<dir>` to capture the LLM, filesystem, and clock
//! interactions of one command into `<dir>/<port>.cassette.yaml`. Tests and
//! `TASKGEN_REPLAY=<dir>` serve them back through the replaying adapters.

pub mod config;
pub mod format;
pub mod recorder;
pub mod replayer;
pub mod session;
