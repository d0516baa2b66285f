//! Which cassette file backs each replayable port.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::replayer::CassetteReplayer;

/// A replayer shared by the adapter that consumes it.
pub type SharedReplayer = Arc<Mutex<CassetteReplayer>>;

/// Per-port cassette paths. A port without a path panics when called during
/// replay.
#[derive(Debug, Clone, Default)]
pub struct CassetteConfig {
    /// Cassette for the LLM port.
    pub llm: Option<PathBuf>,
    /// Cassette for the filesystem port.
    pub fs: Option<PathBuf>,
    /// Cassette for the clock port.
    pub clock: Option<PathBuf>,
    /// Cassette for the embeddings port.
    pub embeddings: Option<PathBuf>,
}

/// Loaded replayers, one per configured port.
#[derive(Default)]
pub struct PortReplayers {
    /// Replayer for the LLM port.
    pub llm: Option<SharedReplayer>,
    /// Replayer for the filesystem port.
    pub fs: Option<SharedReplayer>,
    /// Replayer for the clock port.
    pub clock: Option<SharedReplayer>,
    /// Replayer for the embeddings port.
    pub embeddings: Option<SharedReplayer>,
}

/// File name a recording session uses for `port`.
#[must_use]
pub fn cassette_file_name(port: &str) -> String {
    format!("{port}.cassette.yaml")
}

impl CassetteConfig {
    /// A config with no cassettes; every replayed call panics.
    #[must_use]
    pub fn panic_on_unspecified() -> Self {
        Self::default()
    }

    /// Picks up whichever `<port>.cassette.yaml` files exist in `dir`, the
    /// layout a recording session writes.
    #[must_use]
    pub fn from_dir(dir: &Path) -> Self {
        let find = |port: &str| Some(dir.join(cassette_file_name(port))).filter(|p| p.is_file());
        Self {
            llm: find("llm"),
            fs: find("fs"),
            clock: find("clock"),
            embeddings: find("embeddings"),
        }
    }

    /// Loads every configured cassette.
    ///
    /// # Errors
    ///
    /// Returns an error if any configured file cannot be read or parsed.
    pub fn load_all(&self) -> Result<PortReplayers, String> {
        let load = |path: &Option<PathBuf>| -> Result<Option<SharedReplayer>, String> {
            path.as_deref()
                .map(|p| CassetteReplayer::load(p).map(|r| Arc::new(Mutex::new(r))))
                .transpose()
        };
        Ok(PortReplayers {
            llm: load(&self.llm)?,
            fs: load(&self.fs)?,
            clock: load(&self.clock)?,
            embeddings: load(&self.embeddings)?,
        })
    }
}
