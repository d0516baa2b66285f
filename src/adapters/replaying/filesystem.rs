//! Replaying adapter for the `FileSystem` port.

use std::path::Path;

use super::{next_output, replay_result};
use crate::cassette::config::SharedReplayer;
use crate::ports::{BoxError, FileSystem};

/// Serves recorded filesystem results. Paths and contents passed in are
/// ignored; only call order per method matters.
pub struct ReplayingFileSystem {
    replayer: Option<SharedReplayer>,
}

impl ReplayingFileSystem {
    /// Creates a filesystem backed by `replayer`.
    #[must_use]
    pub fn new(replayer: SharedReplayer) -> Self {
        Self {
            replayer: Some(replayer),
        }
    }

    /// Creates a filesystem with no cassette. Panics when called.
    #[must_use]
    pub fn unconfigured() -> Self {
        Self { replayer: None }
    }

    fn next(&self, method: &str) -> serde_json::Value {
        next_output(self.replayer.as_ref(), "fs", method)
    }
}

impl FileSystem for ReplayingFileSystem {
    fn read_to_string(&self, _path: &Path) -> Result<String, BoxError> {
        replay_result(self.next("read_to_string"))
    }

    fn write(&self, _path: &Path, _contents: &str) -> Result<(), BoxError> {
        replay_result(self.next("write"))
    }

    fn exists(&self, _path: &Path) -> bool {
        let output = self.next("exists");
        output
            .as_bool()
            .unwrap_or_else(|| panic!("fs::exists: recorded value is not a boolean: {output}"))
    }

    fn list_dir(&self, _path: &Path) -> Result<Vec<String>, BoxError> {
        replay_result(self.next("list_dir"))
    }
}
