// pipeline-types-rs/src/lib.rs
// Shared data model for the Meridian assistant response pipeline.
//
// This crate holds the types that every pipeline stage reads and writes:
// the per-turn RequestState, the reasoning trace, the violation taxonomy,
// the audit record shapes, the collaborator trait contracts, and the
// environment-driven configuration. It deliberately contains no stage
// logic so that the engine crates can depend on it without cycles.

pub mod collaborators;
pub mod config;
pub mod state;
pub mod violation;

pub use collaborators::{
    Communication, CollaboratorError, MemoryStore, Nlu, ThreatIntel, ThreatIntelResponse,
};
pub use config::PipelineConfig;
pub use state::{
    Entity, HistoryEntry, Intent, KnowledgeItem, NluResult, QueryComplexity, ReasoningStep,
    RequestState, RetrievedKnowledge, Sentiment, StepOutcome,
};
pub use violation::{
    ContextSummary, CorrectionRecord, Severity, Violation, ViolationRecord, ViolationType,
};
