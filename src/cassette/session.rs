//! A recording session: one cassette recorder per replayable port.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::info;

use super::config::cassette_file_name;
use super::recorder::CassetteRecorder;

/// A recorder shared by the adapter writing into it.
pub type SharedRecorder = Arc<Mutex<CassetteRecorder>>;

/// Per-port recorders writing `<port>.cassette.yaml` files into one directory.
pub struct RecordingSession {
    /// Recorder for LLM completions.
    pub llm: SharedRecorder,
    /// Recorder for filesystem calls.
    pub fs: SharedRecorder,
    /// Recorder for clock reads.
    pub clock: SharedRecorder,
    /// Recorder for embedding calls.
    pub embeddings: SharedRecorder,
    output_dir: PathBuf,
}

impl RecordingSession {
    /// Starts a session writing into `output_dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory already holds cassettes or cannot
    /// be created.
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self, String> {
        let output_dir = output_dir.into();
        let ports = ["llm", "fs", "clock", "embeddings"];
        if let Some(existing) =
            ports.iter().map(|p| output_dir.join(cassette_file_name(p))).find(|p| p.exists())
        {
            return Err(format!("Cassette already exists: {}", existing.display()));
        }
        std::fs::create_dir_all(&output_dir)
            .map_err(|e| {
                format!("Failed to create cassette directory {}: {e}", output_dir.display())
            })?;

        let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%S").to_string();
        let make_recorder = |port: &str| -> SharedRecorder {
            let path = output_dir.join(cassette_file_name(port));
            Arc::new(Mutex::new(CassetteRecorder::new(path, format!("{timestamp}-{port}"))))
        };
        info!(dir = %output_dir.display(), "recording port interactions");
        Ok(Self {
            llm: make_recorder("llm"),
            fs: make_recorder("fs"),
            clock: make_recorder("clock"),
            embeddings: make_recorder("embeddings"),
            output_dir,
        })
    }

    /// Directory the cassettes are written to.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Writes every cassette and returns the output directory.
    ///
    /// All adapters holding a recorder must have been dropped first.
    ///
    /// # Errors
    ///
    /// Returns an error if a recorder is still shared or a file cannot be
    /// written.
    pub fn finish(self) -> Result<PathBuf, String> {
        fn finish_one(recorder: SharedRecorder, port: &str) -> Result<(), String> {
            let recorder = Arc::try_unwrap(recorder)
                .map_err(|_| format!("Recording adapter for {port} still has references"))?
                .into_inner()
                .map_err(|e| format!("Recorder lock for {port} poisoned: {e}"))?;
            recorder.finish().map_err(|e| format!("Failed to write {port} cassette: {e}"))?;
            Ok(())
        }

        finish_one(self.llm, "llm")?;
        finish_one(self.fs, "fs")?;
        finish_one(self.clock, "clock")?;
        finish_one(self.embeddings, "embeddings")?;
        Ok(self.output_dir)
    }
}
