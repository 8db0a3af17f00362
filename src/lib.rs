//! Windowed ingest → extract → merge pipeline for democracy-relevant events.
//!
//! The pipeline runs in three stages over an inclusive date window:
//!
//! 1. **harvest** — page each source's archive, keep in-window items, and
//!    normalize them into canonical entities.
//! 2. **build** — fetch each entity's article, run the LLM extraction with a
//!    compliance scan and a single schema retry, parse the canonical event
//!    blocks, and write a per-source envelope.
//! 3. **write** — merge every envelope into a sorted master event log, a
//!    master index, and per-week indexes.
//!
//! Each stage reads and writes JSON artifacts under one root, so stages can
//! be re-run independently and audited after the fact.

pub mod attacks;
pub mod entity;
pub mod envelope;
pub mod error;
pub mod extract;
pub mod http;
pub mod llm;
pub mod merge;
pub mod parser;
pub mod pipeline;
pub mod prompts;
pub mod sources;
pub mod window;

pub use entity::{Entity, RawItem, WindowStats};
pub use envelope::{ArtifactPaths, EventsEnvelope, FilteredPack};
pub use error::{FailureReason, PipelineError};
pub use extract::{DebugPolicy, ExtractionOutcome};
pub use llm::{CompletionClient, OllamaClient};
pub use parser::EventRecord;
pub use pipeline::{PipelineConfig, StageReport};
pub use window::Window;
