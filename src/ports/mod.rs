//! Port traits defining external boundaries.
//!
//! Each trait represents a boundary between the generation loop and an
//! external system (time, filesystem, LLM, task registry, task loader,
//! simulator, embedding model, retrieval backend). Implementations live in
//! `src/adapters/`.

pub mod clock;
pub mod embedder;
pub mod filesystem;
pub mod llm;
pub mod loader;
pub mod registry;
pub mod retriever;
pub mod sim;

/// Error type carried across every port boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub use clock::Clock;
pub use embedder::{Embedder, EmbeddingFuture, EmbeddingRequest, EmbeddingResponse};
pub use filesystem::FileSystem;
pub use llm::{CompletionFuture, CompletionRequest, CompletionResponse, LlmClient};
pub use loader::{LoadedNamespace, TaskClass, TaskLoader};
pub use registry::{RegistryEntry, TaskRegistry};
pub use retriever::{IndexFuture, RetrievalFuture, RetrievalIndex, Retriever};
pub use sim::{
    Action, ActionSpace, BenchmarkTask, EnvConfig, FieldBounds, Goal, Observation, OraclePolicy,
    SimEnv, Simulator, StepOutcome, DEFAULT_ORACLE_MAX_STEPS,
};
