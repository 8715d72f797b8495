// pipeline-types-rs/src/collaborators.rs
// Trait contracts for the external collaborators the pipeline depends on.
//
// NLU inference, memory search/write, threat-intelligence fetches and
// communication adaptation are all opaque async operations behind these
// traits. The orchestrator crate ships designated in-process
// implementations; production deployments substitute real backends
// without touching the pipeline contract.

use async_trait::async_trait;
use thiserror::Error;

use crate::state::{HistoryEntry, KnowledgeItem, NluResult};
use crate::violation::ViolationRecord;

/// Errors surfaced by collaborator calls.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("collaborator timed out: {0}")]
    Timeout(String),

    #[error("collaborator internal error: {0}")]
    Internal(String),
}

/// Natural-language understanding. Failure of `process` propagates as a
/// reasoning-engine error and triggers the fallback path.
#[async_trait]
pub trait Nlu: Send + Sync {
    async fn process(&self, query: &str, session_id: &str) -> Result<NluResult, CollaboratorError>;

    /// Generate a minimal response when synthesis has nothing to work with
    /// or reasoning has failed outright.
    async fn generate_fallback(
        &self,
        query: &str,
        session_id: &str,
    ) -> Result<String, CollaboratorError>;
}

/// Long-term memory. All calls are best-effort: empty results are valid
/// and must not be treated as errors by callers.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn search_conversations(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, CollaboratorError>;

    async fn search_knowledge(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<KnowledgeItem>, CollaboratorError>;

    async fn search_security_knowledge(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<KnowledgeItem>, CollaboratorError>;

    async fn add_conversation(
        &self,
        user_input: &str,
        response: &str,
        session_id: &str,
    ) -> Result<(), CollaboratorError>;

    async fn add_violation_record(
        &self,
        record: &ViolationRecord,
    ) -> Result<(), CollaboratorError>;
}

/// Response envelope from the threat-intelligence collaborator.
#[derive(Debug, Clone)]
pub struct ThreatIntelResponse {
    pub status: String,
    pub items: Vec<KnowledgeItem>,
}

impl ThreatIntelResponse {
    /// Non-"success" status is treated as zero items by the caller.
    pub fn into_items(self) -> Vec<KnowledgeItem> {
        if self.status == "success" {
            self.items
        } else {
            Vec::new()
        }
    }
}

/// Optional external data source, only consulted when the analyze phase
/// has flagged a security-knowledge requirement.
#[async_trait]
pub trait ThreatIntel: Send + Sync {
    async fn fetch(&self, query: &str) -> Result<ThreatIntelResponse, CollaboratorError>;
}

/// Clarification and communication-style adaptation.
#[async_trait]
pub trait Communication: Send + Sync {
    /// Returns a clarifying question when confidence is too low to answer,
    /// or `None` when the response can go out as-is.
    async fn maybe_clarify(
        &self,
        query: &str,
        confidence: f32,
        session_id: &str,
    ) -> Result<Option<String>, CollaboratorError>;

    /// Adapt the response to the user's communication style.
    async fn adapt(
        &self,
        query: &str,
        response: &str,
        sentiment: crate::state::Sentiment,
    ) -> Result<String, CollaboratorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threat_intel_non_success_yields_no_items() {
        let resp = ThreatIntelResponse {
            status: "error".to_string(),
            items: vec![KnowledgeItem {
                title: "t".to_string(),
                content: "c".to_string(),
                source: "s".to_string(),
            }],
        };
        assert!(resp.into_items().is_empty());
    }
}
