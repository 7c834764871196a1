//! Pattern processing engine for Weft.
//!
//! Applies prompt templates to user text through a language-model backend:
//! chunking large inputs, escalating timeouts across model tiers, combining
//! partial results by category, and driving the per-user interactive flow.

pub mod advisor;
pub mod backend;
pub mod batch;
pub mod chunker;
pub mod combiner;
pub mod controller;
pub mod error;
pub mod executor;
pub mod export;
pub mod flow;
pub mod guard;
pub mod markup;
pub mod navigation;
pub mod retry;
pub mod session;
pub mod store;

pub use advisor::{InteractionType, PatternAdvisor, Suggestion};
pub use backend::{
    BackendError, ChatMessage, FailureReason, Generation, GenerationBackend, GenerationRequest,
    HttpBackend, MockBackend,
};
pub use batch::{BatchMode, BatchOutcome, BatchProcessor};
pub use chunker::Chunker;
pub use controller::{FlowController, FlowReply, Menu, MenuOption, Position};
pub use error::EngineError;
pub use executor::PatternExecutor;
pub use export::{ExportArtifact, Exporter, TextExporter};
pub use flow::{ActionToken, FlowState};
pub use navigation::{Direction, NavigationController};
pub use session::{ChunkSet, PatternResult, SessionState};
pub use store::{KeyValueStore, MemoryStore, SessionStore};
