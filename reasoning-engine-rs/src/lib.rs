//! Six-phase reasoning engine for the Meridian assistant pipeline.
//!
//! Runs exactly six phases in fixed order per call (analyze, retrieve,
//! plan, execute, synthesize, assess-confidence), producing a response,
//! a confidence score, and an explainability trace. Any failure inside
//! the phases is absorbed into a fixed fallback response; reasoning never
//! raises to the caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use pipeline_types::{
    Intent, Nlu, NluResult, QueryComplexity, ReasoningStep, RetrievedKnowledge, StepOutcome,
    ThreatIntel,
};

pub mod execute;
pub mod plan;

pub use plan::{build_plan, RequirementFlags};

/// Internal phase errors. Never escape `reason`; they route to the
/// fallback path instead.
#[derive(Debug, thiserror::Error)]
pub enum ReasoningError {
    #[error("collaborator failure: {0}")]
    Collaborator(#[from] pipeline_types::CollaboratorError),
}

/// Canned response used when even the NLU fallback generator fails.
pub const FALLBACK_RESPONSE: &str =
    "I wasn't able to work through that request just now. Could you try rephrasing it?";

/// Fixed greeting used by the synthesize phase for greeting intents.
pub const GREETING_RESPONSE: &str = "Hello! How can I help you today?";

const FALLBACK_CONFIDENCE: f32 = 0.3;

/// Keywords that mark a query as needing security knowledge.
const SECURITY_KEYWORDS: [&str; 6] = [
    "security",
    "vulnerability",
    "threat",
    "exploit",
    "malware",
    "phishing",
];

/// Keywords that mark a query as needing visual processing.
const VISION_KEYWORDS: [&str; 5] = ["vision", "image", "picture", "photo", "video"];

/// Process-wide reasoning counters with running averages.
#[derive(Debug, Default)]
pub struct ReasoningStats {
    total_queries: AtomicU64,
    successful_reasoning: AtomicU64,
    failed_reasoning: AtomicU64,
    plan_steps_sum: AtomicU64,
    /// Confidence accumulated in thousandths to stay in integer atomics.
    confidence_milli_sum: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReasoningStatsSnapshot {
    pub total_queries: u64,
    pub successful_reasoning: u64,
    pub failed_reasoning: u64,
    pub avg_plan_steps: f32,
    pub avg_confidence: f32,
}

impl ReasoningStats {
    fn record(&self, success: bool, plan_steps: usize, confidence: f32) {
        self.total_queries.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_reasoning.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_reasoning.fetch_add(1, Ordering::Relaxed);
        }
        self.plan_steps_sum
            .fetch_add(plan_steps as u64, Ordering::Relaxed);
        self.confidence_milli_sum
            .fetch_add((confidence.clamp(0.0, 1.0) * 1000.0) as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ReasoningStatsSnapshot {
        let total = self.total_queries.load(Ordering::Relaxed);
        let steps = self.plan_steps_sum.load(Ordering::Relaxed);
        let milli = self.confidence_milli_sum.load(Ordering::Relaxed);
        ReasoningStatsSnapshot {
            total_queries: total,
            successful_reasoning: self.successful_reasoning.load(Ordering::Relaxed),
            failed_reasoning: self.failed_reasoning.load(Ordering::Relaxed),
            avg_plan_steps: if total > 0 {
                steps as f32 / total as f32
            } else {
                0.0
            },
            avg_confidence: if total > 0 {
                milli as f32 / 1000.0 / total as f32
            } else {
                0.0
            },
        }
    }
}

/// Output of one reasoning call.
#[derive(Debug, Clone)]
pub struct ReasoningOutcome {
    pub response: String,
    pub confidence: f32,
    pub steps: Vec<ReasoningStep>,
    pub plan: Vec<String>,
    pub execution_results: Vec<StepOutcome>,
    pub complexity: QueryComplexity,
    pub flags: RequirementFlags,
}

/// The reasoning engine proper.
pub struct ReasoningEngine {
    nlu: Arc<dyn Nlu>,
    threat_intel: Option<Arc<dyn ThreatIntel>>,
    knowledge_saturation: usize,
    response_length_saturation: usize,
    stats: ReasoningStats,
}

impl ReasoningEngine {
    pub fn new(
        nlu: Arc<dyn Nlu>,
        threat_intel: Option<Arc<dyn ThreatIntel>>,
        knowledge_saturation: usize,
        response_length_saturation: usize,
    ) -> Self {
        Self {
            nlu,
            threat_intel,
            knowledge_saturation: knowledge_saturation.max(1),
            response_length_saturation: response_length_saturation.max(1),
            stats: ReasoningStats::default(),
        }
    }

    /// Reason over one query. `knowledge` may gain externally fetched
    /// items during the retrieve phase. Never fails: internal errors
    /// collapse into the fallback response.
    pub async fn reason(
        &self,
        query: &str,
        nlu_result: &NluResult,
        knowledge: &mut RetrievedKnowledge,
        session_id: &str,
    ) -> ReasoningOutcome {
        match self.reason_inner(query, nlu_result, knowledge, session_id).await {
            Ok(outcome) => {
                self.stats
                    .record(true, outcome.plan.len(), outcome.confidence);
                outcome
            }
            Err(e) => {
                log::error!("reasoning failed for query '{}': {}", query, e);
                let outcome = self.fallback_outcome(query, session_id).await;
                self.stats
                    .record(false, outcome.plan.len(), outcome.confidence);
                outcome
            }
        }
    }

    async fn reason_inner(
        &self,
        query: &str,
        nlu_result: &NluResult,
        knowledge: &mut RetrievedKnowledge,
        _session_id: &str,
    ) -> Result<ReasoningOutcome, ReasoningError> {
        let mut steps = Vec::new();

        // Phase 1: analyze.
        let (complexity, flags) = analyze(query, nlu_result.intent);
        steps.push(ReasoningStep::new(
            0,
            "analyze",
            format!("classified the query as {} complexity", complexity),
            json!({
                "complexity": complexity.to_string(),
                "requires_security_knowledge": flags.requires_security_knowledge,
                "requires_vision": flags.requires_vision,
            }),
        ));

        // Phase 2: retrieve. Fetch failures are swallowed, not raised.
        if flags.requires_security_knowledge {
            if let Some(intel) = &self.threat_intel {
                match intel.fetch(query).await {
                    Ok(resp) => knowledge.external.extend(resp.into_items()),
                    Err(e) => {
                        log::warn!("threat intelligence fetch failed, continuing without: {}", e)
                    }
                }
            }
        }
        steps.push(ReasoningStep::new(
            1,
            "retrieve",
            format!(
                "assembled {} knowledge items and {} history entries",
                knowledge.total_items(),
                knowledge.conversation_history.len()
            ),
            json!({
                "general": knowledge.general.len(),
                "security": knowledge.security.len(),
                "external": knowledge.external.len(),
                "history": knowledge.conversation_history.len(),
            }),
        ));

        // Phase 3: plan.
        let plan = plan::build_plan(nlu_result.intent, complexity, flags);
        steps.push(ReasoningStep::new(
            2,
            "plan",
            format!("selected a {}-step plan for intent {}", plan.len(), nlu_result.intent),
            json!({ "plan": plan }),
        ));

        // Phase 4: execute. All steps run; failures are recorded, never
        // abort the plan.
        let execution_results: Vec<StepOutcome> = plan
            .iter()
            .map(|name| execute::run_step(name, query, knowledge))
            .collect();
        let succeeded = execution_results.iter().filter(|r| r.success).count();
        steps.push(ReasoningStep::new(
            3,
            "execute",
            format!("ran {} plan steps, {} succeeded", execution_results.len(), succeeded),
            json!({
                "results": execution_results
                    .iter()
                    .map(|r| json!({ "step": r.step, "success": r.success }))
                    .collect::<Vec<_>>(),
            }),
        ));

        // Phase 5: synthesize.
        let response = self
            .synthesize(query, nlu_result.intent, &execution_results)
            .await?;
        steps.push(ReasoningStep::new(
            4,
            "synthesize",
            format!("composed a {}-character response", response.chars().count()),
            json!({ "response_chars": response.chars().count() }),
        ));

        // Phase 6: assess confidence.
        let confidence = self.assess_confidence(
            nlu_result.confidence,
            knowledge.total_items(),
            &execution_results,
            &response,
        );
        steps.push(ReasoningStep::new(
            5,
            "assess_confidence",
            format!("assessed overall confidence at {:.2}", confidence),
            json!({ "confidence": confidence }),
        ));

        Ok(ReasoningOutcome {
            response,
            confidence,
            steps,
            plan,
            execution_results,
            complexity,
            flags,
        })
    }

    async fn synthesize(
        &self,
        query: &str,
        intent: Intent,
        results: &[StepOutcome],
    ) -> Result<String, ReasoningError> {
        if intent == Intent::Greeting {
            return Ok(GREETING_RESPONSE.to_string());
        }

        let components: Vec<&str> = results
            .iter()
            .filter(|r| r.success && !r.output.is_empty())
            .map(|r| r.output.as_str())
            .collect();

        match components.len() {
            0 => {
                // Nothing to say; delegate to the NLU fallback generator.
                let text = self.nlu.generate_fallback(query, "").await?;
                Ok(text)
            }
            1 => Ok(components[0].to_string()),
            _ => {
                let (intro, outro) = match intent {
                    Intent::Security => (
                        "Here's what I found on the security side. ",
                        " Please validate this against your own environment.",
                    ),
                    Intent::Question => (
                        "Good question. Here's what I can tell you. ",
                        " Let me know if you'd like more detail.",
                    ),
                    _ => (
                        "Here's what I put together. ",
                        " Happy to expand on any part of this.",
                    ),
                };
                Ok(format!("{}{}{}", intro, components.join(" "), outro))
            }
        }
    }

    /// Weighted average of the available confidence factors, with weights
    /// renormalized when a factor is absent. The factor list is ephemeral.
    fn assess_confidence(
        &self,
        nlu_confidence: f32,
        knowledge_items: usize,
        results: &[StepOutcome],
        response: &str,
    ) -> f32 {
        let mut factors: Vec<(&str, f32, f32)> = vec![
            ("nlu_confidence", nlu_confidence.clamp(0.0, 1.0), 0.3),
            (
                "knowledge_volume",
                (knowledge_items as f32 / self.knowledge_saturation as f32).min(1.0),
                0.2,
            ),
            (
                "response_length",
                (response.chars().count() as f32 / self.response_length_saturation as f32)
                    .min(1.0),
                0.2,
            ),
        ];

        if !results.is_empty() {
            let rate = results.iter().filter(|r| r.success).count() as f32 / results.len() as f32;
            factors.push(("execution_success", rate, 0.3));
        }

        let weight_sum: f32 = factors.iter().map(|(_, _, w)| w).sum();
        let weighted: f32 = factors.iter().map(|(_, s, w)| s * w).sum();
        (weighted / weight_sum).clamp(0.0, 1.0)
    }

    /// Produce the fallback outcome directly. Used by callers whose
    /// upstream collaborators failed before reasoning could start.
    pub async fn fallback(&self, query: &str, session_id: &str) -> ReasoningOutcome {
        let outcome = self.fallback_outcome(query, session_id).await;
        self.stats
            .record(false, outcome.plan.len(), outcome.confidence);
        outcome
    }

    async fn fallback_outcome(&self, query: &str, session_id: &str) -> ReasoningOutcome {
        let response = match self.nlu.generate_fallback(query, session_id).await {
            Ok(text) => text,
            Err(e) => {
                log::warn!("fallback generation failed as well: {}", e);
                FALLBACK_RESPONSE.to_string()
            }
        };

        ReasoningOutcome {
            response,
            confidence: FALLBACK_CONFIDENCE,
            steps: vec![ReasoningStep::new(
                0,
                "fallback",
                "reasoning failed; produced a minimal fallback response",
                json!({}),
            )],
            plan: vec!["generate_fallback_response".to_string()],
            execution_results: Vec::new(),
            complexity: QueryComplexity::Simple,
            flags: RequirementFlags::default(),
        }
    }

    pub fn stats(&self) -> ReasoningStatsSnapshot {
        self.stats.snapshot()
    }
}

/// Analyze phase: complexity by word count and question marks, plus
/// requirement flags from intent and keyword scanning.
fn analyze(query: &str, intent: Intent) -> (QueryComplexity, RequirementFlags) {
    let word_count = query.split_whitespace().count();
    let question_marks = query.matches('?').count();

    let complexity = if word_count > 20 || question_marks > 1 {
        QueryComplexity::Complex
    } else if word_count > 10 {
        QueryComplexity::Moderate
    } else {
        QueryComplexity::Simple
    };

    let query_lower = query.to_lowercase();
    let flags = RequirementFlags {
        requires_security_knowledge: intent == Intent::Security
            || SECURITY_KEYWORDS.iter().any(|k| query_lower.contains(k)),
        requires_vision: VISION_KEYWORDS.iter().any(|k| query_lower.contains(k)),
    };

    (complexity, flags)
}
