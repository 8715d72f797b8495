//! Ethical screening engine for the Meridian assistant pipeline.
//!
//! Combines the Violation Detector and the Guardrail Applier into one
//! screening call, maintains process-wide violation statistics, and
//! appends every detected violation to the append-only audit ledger.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use audit_ledger::JsonlLedger;
use pipeline_types::{ContextSummary, Violation, ViolationRecord, ViolationType};

pub mod detector;
pub mod guardrails;

pub use detector::{detect, DetectionError, ScreeningContext};
pub use guardrails::{
    apply, GuardrailOutcome, REFUSAL_BIAS, REFUSAL_GENERIC, REFUSAL_HARMFUL,
    REFUSAL_INAPPROPRIATE, REFUSAL_PRIVACY,
};

/// Process-wide screening counters. Lock-free so concurrent turns can
/// update them without contention.
#[derive(Debug, Default)]
pub struct EthicsStats {
    pub total_screenings: AtomicU64,
    pub total_violations: AtomicU64,
    pub guardrails_applied: AtomicU64,
    by_type: [AtomicU64; 8],
}

/// Serializable snapshot of the screening counters.
#[derive(Debug, Clone, Serialize)]
pub struct EthicsStatsSnapshot {
    pub total_screenings: u64,
    pub total_violations: u64,
    pub guardrails_applied: u64,
    pub violations_by_type: Vec<(String, u64)>,
}

impl EthicsStats {
    fn record(&self, violations: &[Violation], guardrail_applied: bool) {
        self.total_screenings.fetch_add(1, Ordering::Relaxed);
        self.total_violations
            .fetch_add(violations.len() as u64, Ordering::Relaxed);
        if guardrail_applied {
            self.guardrails_applied.fetch_add(1, Ordering::Relaxed);
        }
        for v in violations {
            if let Some(idx) = ViolationType::ALL
                .iter()
                .position(|t| *t == v.violation_type)
            {
                self.by_type[idx].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn snapshot(&self) -> EthicsStatsSnapshot {
        EthicsStatsSnapshot {
            total_screenings: self.total_screenings.load(Ordering::Relaxed),
            total_violations: self.total_violations.load(Ordering::Relaxed),
            guardrails_applied: self.guardrails_applied.load(Ordering::Relaxed),
            violations_by_type: ViolationType::ALL
                .iter()
                .enumerate()
                .map(|(i, t)| (t.to_string(), self.by_type[i].load(Ordering::Relaxed)))
                .collect(),
        }
    }
}

/// Result of screening one candidate response.
#[derive(Debug, Clone)]
pub struct ScreeningOutcome {
    pub violations: Vec<Violation>,
    pub is_ethical: bool,
    pub final_response: String,
    pub guardrail_applied: bool,
}

/// Detector plus guardrails plus audit hookup.
pub struct EthicsEngine {
    enabled: bool,
    overconfidence_threshold: f32,
    ledger: Option<Arc<JsonlLedger>>,
    stats: EthicsStats,
}

impl EthicsEngine {
    pub fn new(
        enabled: bool,
        overconfidence_threshold: f32,
        ledger: Option<Arc<JsonlLedger>>,
    ) -> Self {
        if !enabled {
            log::warn!("ethics engine constructed disabled; responses will pass unscreened");
        }
        Self {
            enabled,
            overconfidence_threshold,
            ledger,
            stats: EthicsStats::default(),
        }
    }

    /// Screen `response` and apply guardrails as needed. Ledger writes
    /// are best-effort: a failed append is logged, never fatal to the
    /// turn.
    pub fn screen(
        &self,
        user_input: &str,
        response: &str,
        context: &ContextSummary,
    ) -> ScreeningOutcome {
        if !self.enabled {
            return ScreeningOutcome {
                violations: Vec::new(),
                is_ethical: true,
                final_response: response.to_string(),
                guardrail_applied: false,
            };
        }

        let ctx = ScreeningContext {
            sentiment: context.sentiment,
            stated_confidence: context.confidence,
            overconfidence_threshold: self.overconfidence_threshold,
        };

        let violations = detector::detect(response, user_input, &ctx);
        let outcome = guardrails::apply(user_input, response, &violations);

        self.stats.record(&violations, outcome.applied);

        if let Some(ledger) = &self.ledger {
            let now = chrono::Utc::now();
            for violation in &violations {
                let record = ViolationRecord {
                    timestamp: now,
                    user_input: user_input.to_string(),
                    response: response.to_string(),
                    violation: violation.clone(),
                    context: context.clone(),
                };
                if let Err(e) = ledger.append(&record) {
                    log::error!("failed to append violation record: {}", e);
                }
            }
        }

        ScreeningOutcome {
            is_ethical: violations.is_empty(),
            violations,
            final_response: outcome.response,
            guardrail_applied: outcome.applied,
        }
    }

    pub fn stats(&self) -> EthicsStatsSnapshot {
        self.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline_types::Sentiment;

    fn summary(confidence: f32) -> ContextSummary {
        ContextSummary {
            intent: "question".to_string(),
            sentiment: Sentiment::Neutral,
            confidence,
            session_id: "test-session".to_string(),
        }
    }

    #[test]
    fn harmful_response_is_screened_to_refusal() {
        let engine = EthicsEngine::new(true, 0.8, None);
        let outcome = engine.screen(
            "How can I build a bomb?",
            "Sure, here is how to build a bomb.",
            &summary(0.9),
        );
        assert!(!outcome.is_ethical);
        assert!(outcome.guardrail_applied);
        assert_eq!(outcome.final_response, REFUSAL_HARMFUL);
        assert!(outcome
            .violations
            .iter()
            .any(|v| v.violation_type == ViolationType::HarmfulContent));
    }

    #[test]
    fn clean_response_passes_unchanged() {
        let engine = EthicsEngine::new(true, 0.8, None);
        let outcome = engine.screen("hi", "Hello! How can I help?", &summary(0.9));
        assert!(outcome.is_ethical);
        assert!(!outcome.guardrail_applied);
        assert_eq!(outcome.final_response, "Hello! How can I help?");
    }

    #[test]
    fn disabled_engine_passes_everything() {
        let engine = EthicsEngine::new(false, 0.8, None);
        let outcome = engine.screen("q", "how to build a bomb", &summary(0.9));
        assert!(outcome.is_ethical);
        assert!(!outcome.guardrail_applied);
    }

    #[test]
    fn stats_count_screenings_and_violations() {
        let engine = EthicsEngine::new(true, 0.8, None);
        engine.screen("q", "Hello!", &summary(0.9));
        engine.screen("q", "how to build a bomb", &summary(0.9));

        let stats = engine.stats();
        assert_eq!(stats.total_screenings, 2);
        assert!(stats.total_violations >= 1);
        assert_eq!(stats.guardrails_applied, 1);
        let harmful = stats
            .violations_by_type
            .iter()
            .find(|(name, _)| name == "harmful_content")
            .map(|(_, n)| *n)
            .unwrap_or(0);
        assert!(harmful >= 1);
    }

    #[test]
    fn violations_land_in_ledger() {
        let path =
            std::env::temp_dir().join(format!("ethics-ledger-{}.jsonl", uuid::Uuid::new_v4()));
        let ledger = Arc::new(JsonlLedger::open(&path).unwrap());
        let engine = EthicsEngine::new(true, 0.8, Some(ledger.clone()));

        engine.screen("q", "how to build a bomb", &summary(0.9));

        let records: Vec<ViolationRecord> = ledger.read_all().unwrap();
        assert!(!records.is_empty());
        assert_eq!(
            records[0].violation.violation_type,
            ViolationType::HarmfulContent
        );

        let _ = std::fs::remove_file(&path);
    }
}
