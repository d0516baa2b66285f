//! Service context bundling every port trait object.

use std::path::Path;

use crate::adapters::embedding::EmbeddingRetriever;
use crate::adapters::harness::HarnessBridge;
use crate::adapters::lexical::LexicalRetriever;
use crate::adapters::live::{LiveClock, LiveEmbedder, LiveFileSystem, LiveLlmClient};
use crate::adapters::recording::{
    RecordingClock, RecordingEmbedder, RecordingFileSystem, RecordingLlmClient,
};
use crate::adapters::replaying::{
    ReplayingClock, ReplayingEmbedder, ReplayingFileSystem, ReplayingLlmClient,
};
use crate::cassette::config::CassetteConfig;
use crate::cassette::session::RecordingSession;
use crate::config::{RetrievalBackend, RetrievalSettings, Settings};
use crate::ports::{
    Clock, Embedder, FileSystem, LlmClient, Retriever, Simulator, TaskLoader, TaskRegistry,
};

/// Bundles all port trait objects into a single context.
///
/// Constructors wire up live, recording, or replaying adapters. Fields are
/// public so tests can swap individual collaborators.
pub struct ServiceContext {
    /// Clock for stamping failure records.
    pub clock: Box<dyn Clock>,
    /// Filesystem for generated tasks, the failure store, and references.
    pub fs: Box<dyn FileSystem>,
    /// Language model for proposals and code.
    pub llm: Box<dyn LlmClient>,
    /// The benchmark's builtin tasks.
    pub registry: Box<dyn TaskRegistry>,
    /// Sandbox that loads candidate task source.
    pub loader: Box<dyn TaskLoader>,
    /// Builds environments around task instances.
    pub simulator: Box<dyn Simulator>,
    /// Similarity search over the corpus.
    pub retriever: Box<dyn Retriever>,
}

/// The configured retrieval backend. `embedder` is only used by the
/// embeddings backend.
fn retriever_for(settings: &RetrievalSettings, embedder: Box<dyn Embedder>) -> Box<dyn Retriever> {
    match settings.backend {
        RetrievalBackend::Embeddings => {
            Box::new(EmbeddingRetriever::new(embedder, settings.embedding_model.clone()))
        }
        RetrievalBackend::Lexical => Box::new(LexicalRetriever),
    }
}

impl ServiceContext {
    /// Creates a context talking to the real LLM endpoint and the configured
    /// harness.
    #[must_use]
    pub fn live(settings: &Settings) -> Self {
        Self {
            clock: Box::new(LiveClock),
            fs: Box::new(LiveFileSystem),
            llm: Box::new(LiveLlmClient::new(&settings.llm)),
            registry: Box::new(HarnessBridge::default()),
            loader: Box::new(HarnessBridge::default()),
            simulator: Box::new(HarnessBridge::default()),
            retriever: retriever_for(
                &settings.retrieval,
                Box::new(LiveEmbedder::new(&settings.llm)),
            ),
        }
        .with_harness(&settings.harness.command)
    }

    /// Like [`live`](Self::live), but every LLM, embedding, filesystem, and
    /// clock call is also recorded into cassettes under `dir`.
    ///
    /// Drop the context before calling [`RecordingSession::finish`].
    ///
    /// # Errors
    ///
    /// Returns an error if the session directory cannot be prepared.
    pub fn recording_at(
        settings: &Settings,
        dir: &Path,
    ) -> Result<(Self, RecordingSession), String> {
        let session = RecordingSession::new(dir)?;
        let live = Self::live(settings);
        let embedder = RecordingEmbedder::new(
            Box::new(LiveEmbedder::new(&settings.llm)),
            session.embeddings.clone(),
        );
        let ctx = Self {
            clock: Box::new(RecordingClock::new(live.clock, session.clock.clone())),
            fs: Box::new(RecordingFileSystem::new(live.fs, session.fs.clone())),
            llm: Box::new(RecordingLlmClient::new(live.llm, session.llm.clone())),
            retriever: retriever_for(&settings.retrieval, Box::new(embedder)),
            ..live
        };
        Ok((ctx, session))
    }

    /// Replays the cassettes a recording session wrote into `dir`, with the
    /// configured harness still live.
    ///
    /// # Errors
    ///
    /// Returns an error if a cassette in `dir` cannot be read or parsed.
    pub fn replaying(settings: &Settings, dir: &Path) -> Result<Self, String> {
        let config = CassetteConfig::from_dir(dir);
        Ok(Self::replaying_with(&config, &settings.retrieval)?
            .with_harness(&settings.harness.command))
    }

    /// Creates a replaying context from per-port cassettes with the default
    /// retrieval backend. Ports without a cassette panic when called; the
    /// harness-backed ports report that no harness is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured cassette cannot be read or parsed.
    pub fn replaying_from(config: &CassetteConfig) -> Result<Self, String> {
        Self::replaying_with(config, &RetrievalSettings::default())
    }

    fn replaying_with(
        config: &CassetteConfig,
        retrieval: &RetrievalSettings,
    ) -> Result<Self, String> {
        let replayers = config.load_all()?;
        let embedder = replayers
            .embeddings
            .map_or_else(ReplayingEmbedder::unconfigured, ReplayingEmbedder::new);
        Ok(Self {
            clock: Box::new(
                replayers
                    .clock
                    .map_or_else(ReplayingClock::unconfigured, ReplayingClock::new),
            ),
            fs: Box::new(
                replayers
                    .fs
                    .map_or_else(ReplayingFileSystem::unconfigured, ReplayingFileSystem::new),
            ),
            llm: Box::new(
                replayers
                    .llm
                    .map_or_else(ReplayingLlmClient::unconfigured, ReplayingLlmClient::new),
            ),
            registry: Box::new(HarnessBridge::default()),
            loader: Box::new(HarnessBridge::default()),
            simulator: Box::new(HarnessBridge::default()),
            retriever: retriever_for(retrieval, Box::new(embedder)),
        })
    }

    /// Points the registry, loader, and simulator at `command`.
    #[must_use]
    pub fn with_harness(mut self, command: &[String]) -> Self {
        self.registry = Box::new(HarnessBridge::new(command.to_vec()));
        self.loader = Box::new(HarnessBridge::new(command.to_vec()));
        self.simulator = Box::new(HarnessBridge::new(command.to_vec()));
        self
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::cassette::format::Cassette;
    use crate::corpus::{Origin, TaskDocument};

    fn write_cassette(path: &Path, cassette: &Cassette) {
        std::fs::write(path, serde_yaml::to_string(cassette).unwrap()).unwrap();
    }

    #[test]
    fn replaying_serves_each_port_from_its_cassette() {
        let dir = tempfile::tempdir().unwrap();
        write_cassette(
            &dir.path().join("clock.cassette.yaml"),
            &Cassette::new("c", Utc::now()).with_interaction(
                "clock",
                "now",
                json!(null),
                json!("2026-05-01T12:00:00Z"),
            ),
        );
        write_cassette(
            &dir.path().join("fs.cassette.yaml"),
            &Cassette::new("f", Utc::now()).with_interaction(
                "fs",
                "exists",
                json!({"path": "x"}),
                json!(false),
            ),
        );

        let ctx = ServiceContext::replaying(&Settings::default(), dir.path()).unwrap();
        assert_eq!(ctx.clock.now().to_rfc3339(), "2026-05-01T12:00:00+00:00");
        assert!(!ctx.fs.exists(Path::new("x")));
    }

    #[test]
    #[should_panic(expected = "llm port not configured")]
    fn unspecified_port_panics_with_clear_message() {
        let ctx = ServiceContext::replaying_from(&CassetteConfig::panic_on_unspecified()).unwrap();
        let request = crate::ports::CompletionRequest {
            model: "m".to_string(),
            system: None,
            prompt: "p".to_string(),
            max_tokens: 1,
            temperature: None,
        };
        let _ = ctx.llm.complete(&request);
    }

    fn documents(ids: &[&str]) -> Vec<TaskDocument> {
        ids.iter()
            .map(|id| TaskDocument {
                id: (*id).to_string(),
                origin: Origin::Builtin,
                group: "g".to_string(),
                task_name: (*id).to_string(),
                class_name: None,
                module: None,
                text: format!("{id} task"),
            })
            .collect()
    }

    #[tokio::test]
    async fn replayed_embeddings_rank_the_corpus() {
        let dir = tempfile::tempdir().unwrap();
        write_cassette(
            &dir.path().join("embeddings.cassette.yaml"),
            &Cassette::new("e", Utc::now())
                .with_interaction(
                    "embeddings",
                    "embed",
                    json!({"model": "text-embedding-3-small", "input": ["a task", "b task"]}),
                    json!({"ok": {"vectors": [[1.0, 0.0], [0.0, 1.0]]}}),
                )
                .with_interaction(
                    "embeddings",
                    "embed",
                    json!({"model": "text-embedding-3-small", "input": ["like b"]}),
                    json!({"ok": {"vectors": [[0.2, 0.9]]}}),
                ),
        );

        let ctx = ServiceContext::replaying(&Settings::default(), dir.path()).unwrap();
        let docs = documents(&["a", "b"]);
        let index = ctx.retriever.build_index(&docs).await.unwrap();
        let hits = index.retrieve("like b", 2).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn lexical_backend_needs_no_embeddings_cassette() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.retrieval.backend = RetrievalBackend::Lexical;

        let ctx = ServiceContext::replaying(&settings, dir.path()).unwrap();
        let docs = documents(&["stack", "rotate"]);
        let index = ctx.retriever.build_index(&docs).await.unwrap();
        let hits = index.retrieve("rotate", 1).await.unwrap();
        assert_eq!(hits[0].id, "rotate");
    }

    #[test]
    fn harness_ports_report_missing_configuration() {
        let ctx = ServiceContext::replaying_from(&CassetteConfig::panic_on_unspecified()).unwrap();
        let err = ctx.registry.entries().unwrap_err();
        assert!(err.to_string().contains("no simulation harness configured"));
    }

    #[test]
    fn recording_writes_cassettes_after_the_context_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let out: PathBuf = dir.path().join("rec");
        let (ctx, session) =
            ServiceContext::recording_at(&Settings::default(), &out).unwrap();
        let _ = ctx.fs.exists(&out.join("nothing-here"));
        let _ = ctx.clock.now();
        drop(ctx);

        session.finish().unwrap();
        let replayed = ServiceContext::replaying(&Settings::default(), &out).unwrap();
        assert!(!replayed.fs.exists(Path::new("anything")));
        let _ = replayed.clock.now();
    }
}
