//! Pipeline controller for the Meridian assistant pipeline.
//!
//! Owns the per-turn `RequestState` and runs the stages in fixed order:
//! NLU, memory recall, reasoning, confidence and inconsistency
//! assessment, self-correction, ethical screening, clarification or
//! adaptation, and finally persistence back to memory. Collaborator
//! failures are recovered locally; a turn always produces a response.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use audit_ledger::{JsonlLedger, LedgerError};
use ethics_engine::{EthicsEngine, EthicsStatsSnapshot};
use pipeline_types::{
    Communication, ContextSummary, CorrectionRecord, Intent, MemoryStore, Nlu, PipelineConfig,
    RequestState, ThreatIntel, ViolationRecord,
};
use reasoning_engine::{ReasoningEngine, ReasoningStatsSnapshot};
use self_correction::{
    detect_inconsistency, ConfidenceAssessor, CorrectionProposer, CorrectionStatsSnapshot,
    ProblemClass,
};

pub mod collaborators;

/// How many knowledge items each memory search may return.
const KNOWLEDGE_SEARCH_LIMIT: usize = 3;

/// Errors raised while constructing a controller. Turn handling itself
/// never fails; every stage degrades to a usable response instead.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("audit ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Controller-level counters, separate from the per-engine stats.
#[derive(Debug, Default)]
struct ControllerStats {
    turns_handled: AtomicU64,
    corrections_triggered: AtomicU64,
    clarifications_issued: AtomicU64,
    timeouts: AtomicU64,
}

/// Aggregated snapshot across the controller and its engines.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatsSnapshot {
    pub turns_handled: u64,
    pub corrections_triggered: u64,
    pub clarifications_issued: u64,
    pub timeouts: u64,
    pub reasoning: ReasoningStatsSnapshot,
    pub ethics: EthicsStatsSnapshot,
    pub corrections: CorrectionStatsSnapshot,
}

/// What one handled turn produced: the final response text plus the full
/// per-turn state for callers that want the trace.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub response: String,
    pub state: RequestState,
}

/// The pipeline controller proper. One instance serves many concurrent
/// sessions; all mutable state is either per-turn or behind atomics.
pub struct PipelineController {
    config: PipelineConfig,
    nlu: Arc<dyn Nlu>,
    memory: Arc<dyn MemoryStore>,
    communication: Arc<dyn Communication>,
    reasoning: ReasoningEngine,
    ethics: Arc<EthicsEngine>,
    assessor: ConfidenceAssessor,
    proposer: CorrectionProposer,
    stats: ControllerStats,
}

impl PipelineController {
    /// Wire up the engines and open both audit ledgers. Ledger paths come
    /// from `config`; parent directories are created as needed.
    pub fn new(
        config: PipelineConfig,
        nlu: Arc<dyn Nlu>,
        memory: Arc<dyn MemoryStore>,
        threat_intel: Option<Arc<dyn ThreatIntel>>,
        communication: Arc<dyn Communication>,
    ) -> Result<Self, PipelineError> {
        let violation_ledger = Arc::new(JsonlLedger::open(&config.violation_ledger_path)?);
        let correction_ledger = Arc::new(JsonlLedger::open(&config.correction_ledger_path)?);

        let ethics = Arc::new(EthicsEngine::new(
            config.ethics_enabled,
            config.overconfidence_threshold,
            Some(violation_ledger),
        ));
        let reasoning = ReasoningEngine::new(
            nlu.clone(),
            threat_intel,
            config.knowledge_saturation,
            config.response_length_saturation,
        );
        let assessor = ConfidenceAssessor::new(config.correction_enabled);
        let proposer = CorrectionProposer::new(ethics.clone(), Some(correction_ledger));

        Ok(Self {
            config,
            nlu,
            memory,
            communication,
            reasoning,
            ethics,
            assessor,
            proposer,
            stats: ControllerStats::default(),
        })
    }

    /// Handle one conversational turn. Never fails: collaborator errors
    /// are logged and recovered stage by stage.
    pub async fn handle_turn(&self, session_id: &str, query: &str) -> TurnOutcome {
        self.stats.turns_handled.fetch_add(1, Ordering::Relaxed);
        let mut state = RequestState::new(session_id, query);

        // Stage 1: understand.
        match self.nlu.process(query, session_id).await {
            Ok(result) => state.nlu = Some(result),
            Err(e) => log::error!("NLU processing failed for session {}: {}", session_id, e),
        }

        if let Some(nlu_result) = state.nlu.clone() {
            // Stage 2: recall. Empty results are valid; errors degrade to
            // empty.
            match self
                .memory
                .search_conversations(query, self.config.history_window)
                .await
            {
                Ok(history) => state.knowledge.conversation_history = history,
                Err(e) => log::warn!("conversation recall failed: {}", e),
            }
            match self
                .memory
                .search_knowledge(query, KNOWLEDGE_SEARCH_LIMIT)
                .await
            {
                Ok(items) => state.knowledge.general = items,
                Err(e) => log::warn!("knowledge recall failed: {}", e),
            }
            if nlu_result.intent == Intent::Security {
                match self
                    .memory
                    .search_security_knowledge(query, KNOWLEDGE_SEARCH_LIMIT)
                    .await
                {
                    Ok(items) => state.knowledge.security = items,
                    Err(e) => log::warn!("security knowledge recall failed: {}", e),
                }
            }

            // Stage 3: reason.
            let outcome = self
                .reasoning
                .reason(query, &nlu_result, &mut state.knowledge, session_id)
                .await;
            state.response = outcome.response;
            state.confidence = outcome.confidence;
            state.steps = outcome.steps;
            state.plan = outcome.plan;
            state.execution_results = outcome.execution_results;

            // Stage 4: assess. Inconsistency outranks low confidence when
            // both hold, since it carries a concrete reason.
            if self.config.correction_enabled {
                state.confidence = self
                    .assessor
                    .assess(state.confidence, nlu_result.confidence);

                let (inconsistent, reason) =
                    detect_inconsistency(&state.response, &state.knowledge.conversation_history);
                let problem = if inconsistent {
                    reason.map(ProblemClass::Inconsistency)
                } else if state.confidence < self.config.correction_confidence_threshold {
                    Some(ProblemClass::LowConfidence)
                } else {
                    None
                };

                // Stage 5: correct. The proposer re-screens the rewrite
                // through ethics exactly once; that screening stands in
                // for stage 6 on corrected turns.
                if let Some(problem) = problem {
                    self.stats
                        .corrections_triggered
                        .fetch_add(1, Ordering::Relaxed);
                    log::info!(
                        "correcting response for session {} ({})",
                        session_id,
                        problem
                    );
                    let summary = context_summary(&state);
                    let corrected =
                        self.proposer
                            .propose(&state.response, &problem, query, &summary);
                    state.response = corrected.response;
                    state.is_ethical = corrected.violations.is_empty();
                    state.ethical_guardrail_applied = corrected.guardrail_applied;
                    state.violations = corrected.violations;
                    state.self_corrected = true;
                }
            }
        } else {
            // NLU gave us nothing to reason over; produce the fallback
            // outcome directly.
            let outcome = self.reasoning.fallback(query, session_id).await;
            state.response = outcome.response;
            state.confidence = outcome.confidence;
            state.steps = outcome.steps;
            state.plan = outcome.plan;
        }

        // Stage 6: screen. Corrected turns were already screened by the
        // proposer's one-shot re-screen.
        if !state.self_corrected {
            let summary = context_summary(&state);
            let screening = self.ethics.screen(query, &state.response, &summary);
            state.is_ethical = screening.is_ethical;
            state.ethical_guardrail_applied = screening.guardrail_applied;
            state.violations = screening.violations;
            state.response = screening.final_response;
        }

        // Violations are mirrored into memory so future retrieval can see
        // them; the authoritative copy is the JSONL ledger.
        if !state.violations.is_empty() {
            let summary = context_summary(&state);
            let now = chrono::Utc::now();
            for violation in &state.violations {
                let record = ViolationRecord {
                    timestamp: now,
                    user_input: query.to_string(),
                    response: state.response.clone(),
                    violation: violation.clone(),
                    context: summary.clone(),
                };
                if let Err(e) = self.memory.add_violation_record(&record).await {
                    log::warn!("failed to mirror violation record into memory: {}", e);
                }
            }
        }

        // Stage 7: clarify or adapt. A guardrail refusal is final and is
        // neither replaced by a clarifying question nor restyled.
        if !state.ethical_guardrail_applied {
            match self
                .communication
                .maybe_clarify(query, state.nlu_confidence(), session_id)
                .await
            {
                Ok(Some(question)) => {
                    state.response = question;
                    state.clarification_issued = true;
                    self.stats
                        .clarifications_issued
                        .fetch_add(1, Ordering::Relaxed);
                }
                Ok(None) => {
                    match self
                        .communication
                        .adapt(query, &state.response, state.sentiment())
                        .await
                    {
                        Ok(adapted) => state.response = adapted,
                        Err(e) => log::warn!("communication adaptation failed: {}", e),
                    }
                }
                Err(e) => log::warn!("clarification check failed: {}", e),
            }
        }

        // Stage 8: persist.
        if let Err(e) = self
            .memory
            .add_conversation(query, &state.response, session_id)
            .await
        {
            log::warn!("failed to persist conversation turn: {}", e);
        }

        TurnOutcome {
            response: state.response.clone(),
            state,
        }
    }

    /// `handle_turn` under a wall-clock limit. A turn that overruns is
    /// abandoned and replaced with the reasoning fallback.
    pub async fn handle_turn_with_timeout(
        &self,
        session_id: &str,
        query: &str,
        limit: Duration,
    ) -> TurnOutcome {
        match tokio::time::timeout(limit, self.handle_turn(session_id, query)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                log::error!(
                    "turn exceeded {:?} for session {}; returning fallback",
                    limit,
                    session_id
                );
                self.stats.timeouts.fetch_add(1, Ordering::Relaxed);
                let outcome = self.reasoning.fallback(query, session_id).await;
                let mut state = RequestState::new(session_id, query);
                state.response = outcome.response;
                state.confidence = outcome.confidence;
                state.steps = outcome.steps;
                state.plan = outcome.plan;

                // The fallback text still goes through ethics; no path
                // hands the user an unscreened response.
                let summary = context_summary(&state);
                let screening = self.ethics.screen(query, &state.response, &summary);
                state.is_ethical = screening.is_ethical;
                state.ethical_guardrail_applied = screening.guardrail_applied;
                state.violations = screening.violations;
                state.response = screening.final_response;

                TurnOutcome {
                    response: state.response.clone(),
                    state,
                }
            }
        }
    }

    /// The last few correction records, newest last.
    pub fn recent_corrections(&self) -> Vec<CorrectionRecord> {
        self.proposer.recent_corrections()
    }

    pub fn stats(&self) -> PipelineStatsSnapshot {
        PipelineStatsSnapshot {
            turns_handled: self.stats.turns_handled.load(Ordering::Relaxed),
            corrections_triggered: self.stats.corrections_triggered.load(Ordering::Relaxed),
            clarifications_issued: self.stats.clarifications_issued.load(Ordering::Relaxed),
            timeouts: self.stats.timeouts.load(Ordering::Relaxed),
            reasoning: self.reasoning.stats(),
            ethics: self.ethics.stats(),
            corrections: self.proposer.stats(),
        }
    }
}

fn context_summary(state: &RequestState) -> ContextSummary {
    ContextSummary {
        intent: state.intent().to_string(),
        sentiment: state.sentiment(),
        confidence: state.confidence,
        session_id: state.session_id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{AdaptiveCommunication, HeuristicNlu, InMemoryMemory};
    use async_trait::async_trait;
    use pipeline_types::{CollaboratorError, NluResult};

    struct BrokenNlu;

    #[async_trait]
    impl Nlu for BrokenNlu {
        async fn process(
            &self,
            _query: &str,
            _session_id: &str,
        ) -> Result<NluResult, CollaboratorError> {
            Err(CollaboratorError::Unavailable("offline".to_string()))
        }

        async fn generate_fallback(
            &self,
            _query: &str,
            _session_id: &str,
        ) -> Result<String, CollaboratorError> {
            Err(CollaboratorError::Unavailable("offline".to_string()))
        }
    }

    fn test_config() -> PipelineConfig {
        let dir = std::env::temp_dir();
        let mut cfg = PipelineConfig::default();
        cfg.violation_ledger_path =
            dir.join(format!("violations-{}.jsonl", uuid::Uuid::new_v4()));
        cfg.correction_ledger_path =
            dir.join(format!("corrections-{}.jsonl", uuid::Uuid::new_v4()));
        cfg
    }

    #[tokio::test]
    async fn broken_nlu_degrades_to_canned_fallback() {
        let cfg = test_config();
        let controller = PipelineController::new(
            cfg.clone(),
            Arc::new(BrokenNlu),
            Arc::new(InMemoryMemory::new()),
            None,
            Arc::new(AdaptiveCommunication::new(cfg.clarification_threshold)),
        )
        .unwrap();

        let outcome = controller.handle_turn("s1", "anything at all").await;
        assert_eq!(outcome.response, reasoning_engine::FALLBACK_RESPONSE);
        assert_eq!(outcome.state.plan, vec!["generate_fallback_response"]);
        assert!(outcome.state.is_ethical);
        assert!(!outcome.state.self_corrected);
    }

    #[tokio::test]
    async fn stats_aggregate_across_engines() {
        let cfg = test_config();
        let controller = PipelineController::new(
            cfg.clone(),
            Arc::new(HeuristicNlu::new()),
            Arc::new(InMemoryMemory::new()),
            None,
            Arc::new(AdaptiveCommunication::new(cfg.clarification_threshold)),
        )
        .unwrap();

        controller.handle_turn("s1", "Hello!").await;
        controller.handle_turn("s1", "What is a linker?").await;

        let stats = controller.stats();
        assert_eq!(stats.turns_handled, 2);
        assert_eq!(stats.reasoning.total_queries, 2);
        assert!(stats.ethics.total_screenings >= 2);
    }
}
