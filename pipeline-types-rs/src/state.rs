// pipeline-types-rs/src/state.rs
// Per-turn request state and the types that feed it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Intent label produced by the NLU collaborator.
///
/// The planning table in the reasoning engine is keyed by this enum;
/// anything the classifier cannot place lands in `Other` and takes the
/// default plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    Gratitude,
    Question,
    Security,
    Technical,
    Other,
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Greeting => write!(f, "greeting"),
            Self::Gratitude => write!(f, "gratitude"),
            Self::Question => write!(f, "question"),
            Self::Security => write!(f, "security"),
            Self::Technical => write!(f, "technical"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl From<&str> for Intent {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "greeting" => Self::Greeting,
            "gratitude" => Self::Gratitude,
            "question" => Self::Question,
            "security" => Self::Security,
            "technical" => Self::Technical,
            _ => Self::Other,
        }
    }
}

/// Sentiment label attached to the user utterance by the NLU collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Default for Sentiment {
    fn default() -> Self {
        Self::Neutral
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Positive => write!(f, "positive"),
            Self::Neutral => write!(f, "neutral"),
            Self::Negative => write!(f, "negative"),
        }
    }
}

/// A named entity extracted from the query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    pub kind: String,
}

/// Output of the NLU collaborator for one utterance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NluResult {
    pub intent: Intent,
    pub entities: Vec<Entity>,
    /// Classifier confidence in [0, 1].
    pub confidence: f32,
    pub sentiment: Sentiment,
}

/// One item retrieved from a knowledge store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub title: String,
    pub content: String,
    pub source: String,
}

/// One past conversation turn, as returned by the memory collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub user_message: String,
    pub assistant_response: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Knowledge snapshot assembled for one turn.
///
/// `external` holds items fetched on demand (threat intelligence) during
/// the reasoning engine's retrieve phase; the other fields are supplied
/// by the controller before reasoning starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievedKnowledge {
    pub conversation_history: Vec<HistoryEntry>,
    pub general: Vec<KnowledgeItem>,
    pub security: Vec<KnowledgeItem>,
    pub external: Vec<KnowledgeItem>,
}

impl RetrievedKnowledge {
    /// Total number of knowledge items, history excluded.
    pub fn total_items(&self) -> usize {
        self.general.len() + self.security.len() + self.external.len()
    }
}

/// Query complexity classification from the analyze phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryComplexity {
    Simple,
    Moderate,
    Complex,
}

impl std::fmt::Display for QueryComplexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simple => write!(f, "simple"),
            Self::Moderate => write!(f, "moderate"),
            Self::Complex => write!(f, "complex"),
        }
    }
}

/// One entry in the explainability trace. Append-only: steps are created
/// once and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningStep {
    pub index: usize,
    pub name: String,
    pub description: String,
    pub detail: serde_json::Value,
}

impl ReasoningStep {
    pub fn new(
        index: usize,
        name: impl Into<String>,
        description: impl Into<String>,
        detail: serde_json::Value,
    ) -> Self {
        Self {
            index,
            name: name.into(),
            description: description.into(),
            detail,
        }
    }
}

/// Result of executing one plan step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step: String,
    pub success: bool,
    pub output: String,
}

/// Mutable per-turn state, owned exclusively by the pipeline controller
/// for the duration of one turn and discarded after the turn is
/// persisted to memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestState {
    pub request_id: Uuid,
    pub session_id: String,
    pub query: String,
    pub nlu: Option<NluResult>,
    pub knowledge: RetrievedKnowledge,
    pub steps: Vec<ReasoningStep>,
    pub plan: Vec<String>,
    pub execution_results: Vec<StepOutcome>,
    pub response: String,
    /// Final pipeline confidence in [0, 1].
    pub confidence: f32,
    pub violations: Vec<crate::violation::Violation>,
    pub is_ethical: bool,
    pub ethical_guardrail_applied: bool,
    pub self_corrected: bool,
    pub clarification_issued: bool,
}

impl RequestState {
    pub fn new(session_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            session_id: session_id.into(),
            query: query.into(),
            nlu: None,
            knowledge: RetrievedKnowledge::default(),
            steps: Vec::new(),
            plan: Vec::new(),
            execution_results: Vec::new(),
            response: String::new(),
            confidence: 0.0,
            violations: Vec::new(),
            is_ethical: true,
            ethical_guardrail_applied: false,
            self_corrected: false,
            clarification_issued: false,
        }
    }

    /// Intent as seen by the planner; `Other` until NLU has run.
    pub fn intent(&self) -> Intent {
        self.nlu.as_ref().map(|n| n.intent).unwrap_or(Intent::Other)
    }

    /// NLU confidence, 0.0 until NLU has run.
    pub fn nlu_confidence(&self) -> f32 {
        self.nlu.as_ref().map(|n| n.confidence).unwrap_or(0.0)
    }

    pub fn sentiment(&self) -> Sentiment {
        self.nlu
            .as_ref()
            .map(|n| n.sentiment)
            .unwrap_or(Sentiment::Neutral)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_parsing_falls_back_to_other() {
        assert_eq!(Intent::from("greeting"), Intent::Greeting);
        assert_eq!(Intent::from("SECURITY"), Intent::Security);
        assert_eq!(Intent::from("weather_query"), Intent::Other);
    }

    #[test]
    fn fresh_state_defaults() {
        let state = RequestState::new("session-1", "hello");
        assert!(state.is_ethical);
        assert!(!state.self_corrected);
        assert_eq!(state.intent(), Intent::Other);
        assert_eq!(state.nlu_confidence(), 0.0);
        assert_eq!(state.knowledge.total_items(), 0);
    }
}
