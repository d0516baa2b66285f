//! Port implementations.
//!
//! `live` talks to the real world, `harness` drives the external simulation
//! process, `embedding` and `lexical` are the retrieval backends, and
//! `recording` / `replaying` capture and serve cassettes for deterministic
//! runs.

pub mod embedding;
pub mod harness;
pub mod lexical;
pub mod live;
pub mod recording;
pub mod replaying;
