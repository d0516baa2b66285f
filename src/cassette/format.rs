//! Cassette data structures for recording and replaying port traffic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded call across a port boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Interaction {
    /// Sequence number within the cassette, assigned by the recorder.
    pub seq: u64,
    /// Port name (`llm`, `fs`, or `clock`).
    pub port: String,
    /// Method invoked on the port.
    pub method: String,
    /// Call arguments.
    pub input: serde_json::Value,
    /// Return value. Fallible methods use `{"ok": ..}` / `{"err": ".."}`.
    pub output: serde_json::Value,
}

/// A recorded session for one port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cassette {
    /// Human-readable name, `<timestamp>-<port>` for recorded sessions.
    pub name: String,
    /// When recording finished.
    pub recorded_at: DateTime<Utc>,
    /// Version of the tool that produced the cassette.
    #[serde(default)]
    pub version: String,
    /// Interactions in call order.
    pub interactions: Vec<Interaction>,
}

impl Cassette {
    /// An empty cassette stamped with this build's version.
    #[must_use]
    pub fn new(name: impl Into<String>, recorded_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            recorded_at,
            version: env!("CARGO_PKG_VERSION").to_string(),
            interactions: Vec::new(),
        }
    }

    /// Adds an interaction, numbering it after the existing ones.
    #[must_use]
    pub fn with_interaction(
        mut self,
        port: &str,
        method: &str,
        input: serde_json::Value,
        output: serde_json::Value,
    ) -> Self {
        let seq = self.interactions.len() as u64;
        self.interactions.push(Interaction {
            seq,
            port: port.to_string(),
            method: method.to_string(),
            input,
            output,
        });
        self
    }
}
