// self-correction-rs/src/correction.rs
// Correction Proposer: rewrites a problematic response and re-screens
// the rewrite through ethics exactly once.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use audit_ledger::JsonlLedger;
use ethics_engine::EthicsEngine;
use pipeline_types::{ContextSummary, CorrectionRecord};

const RECENT_CACHE_LEN: usize = 10;

/// Why a correction was requested.
#[derive(Debug, Clone, PartialEq)]
pub enum ProblemClass {
    LowConfidence,
    Inconsistency(String),
}

impl std::fmt::Display for ProblemClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LowConfidence => write!(f, "low_confidence"),
            Self::Inconsistency(reason) => write!(f, "inconsistency: {}", reason),
        }
    }
}

/// Process-wide correction counters.
#[derive(Debug, Default)]
pub struct CorrectionStats {
    total_corrections: AtomicU64,
    low_confidence_corrections: AtomicU64,
    inconsistency_corrections: AtomicU64,
    rescreen_flagged: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CorrectionStatsSnapshot {
    pub total_corrections: u64,
    pub low_confidence_corrections: u64,
    pub inconsistency_corrections: u64,
    pub rescreen_flagged: u64,
}

impl CorrectionStats {
    fn record(&self, problem: &ProblemClass, rescreen_flagged: bool) {
        self.total_corrections.fetch_add(1, Ordering::Relaxed);
        match problem {
            ProblemClass::LowConfidence => {
                self.low_confidence_corrections.fetch_add(1, Ordering::Relaxed);
            }
            ProblemClass::Inconsistency(_) => {
                self.inconsistency_corrections.fetch_add(1, Ordering::Relaxed);
            }
        }
        if rescreen_flagged {
            self.rescreen_flagged.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> CorrectionStatsSnapshot {
        CorrectionStatsSnapshot {
            total_corrections: self.total_corrections.load(Ordering::Relaxed),
            low_confidence_corrections: self.low_confidence_corrections.load(Ordering::Relaxed),
            inconsistency_corrections: self.inconsistency_corrections.load(Ordering::Relaxed),
            rescreen_flagged: self.rescreen_flagged.load(Ordering::Relaxed),
        }
    }
}

/// Result of one correction.
#[derive(Debug, Clone)]
pub struct CorrectionOutcome {
    /// Final text after the single ethics re-screen.
    pub response: String,
    /// Whether the re-screen still found violations (in which case the
    /// guardrail output above is final; no further correction happens).
    pub rescreen_flagged: bool,
    /// Violations found by the re-screen. The controller adopts these as
    /// the turn's screening result instead of screening a second time.
    pub violations: Vec<pipeline_types::Violation>,
    /// Whether the re-screen replaced or annotated the rewrite.
    pub guardrail_applied: bool,
}

/// Proposes corrected responses and audits every correction event.
pub struct CorrectionProposer {
    ethics: Arc<EthicsEngine>,
    ledger: Option<Arc<JsonlLedger>>,
    stats: CorrectionStats,
    recent: Mutex<VecDeque<CorrectionRecord>>,
}

impl CorrectionProposer {
    pub fn new(ethics: Arc<EthicsEngine>, ledger: Option<Arc<JsonlLedger>>) -> Self {
        Self {
            ethics,
            ledger,
            stats: CorrectionStats::default(),
            recent: Mutex::new(VecDeque::with_capacity(RECENT_CACHE_LEN)),
        }
    }

    /// Rewrite `original_response` for `problem` and re-screen the
    /// rewrite exactly once. If the rewrite still violates ethics, the
    /// guardrail output is the final answer; there is no second
    /// correction attempt. A `CorrectionRecord` is appended regardless
    /// of whether the re-screen altered the text.
    pub fn propose(
        &self,
        original_response: &str,
        problem: &ProblemClass,
        user_input: &str,
        context: &ContextSummary,
    ) -> CorrectionOutcome {
        let rewritten = match problem {
            ProblemClass::LowConfidence => format!(
                "I'm not fully confident in this answer, so please treat it as a starting \
                 point: {}",
                original_response
            ),
            ProblemClass::Inconsistency(reason) => format!(
                "I need to correct myself: an earlier answer of mine conflicts with this one \
                 ({}). Taking that into account: {}",
                reason, original_response
            ),
        };

        // The one and only re-screen of the corrected text.
        let screening = self.ethics.screen(user_input, &rewritten, context);
        let rescreen_flagged = !screening.is_ethical;
        if rescreen_flagged {
            log::warn!(
                "corrected response still violates ethics; accepting guardrail output as final"
            );
        }
        let final_response = screening.final_response;
        let violations = screening.violations;
        let guardrail_applied = screening.guardrail_applied;

        let record = CorrectionRecord {
            timestamp: chrono::Utc::now(),
            user_input: user_input.to_string(),
            original_response: original_response.to_string(),
            corrected_response: final_response.clone(),
            error_explanation: problem.to_string(),
            context: context.clone(),
        };

        if let Some(ledger) = &self.ledger {
            if let Err(e) = ledger.append(&record) {
                log::error!("failed to append correction record: {}", e);
            }
        }

        {
            let mut recent = self
                .recent
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if recent.len() == RECENT_CACHE_LEN {
                recent.pop_front();
            }
            recent.push_back(record);
        }

        self.stats.record(problem, rescreen_flagged);

        CorrectionOutcome {
            response: final_response,
            rescreen_flagged,
            violations,
            guardrail_applied,
        }
    }

    /// The last few correction records, newest last.
    pub fn recent_corrections(&self) -> Vec<CorrectionRecord> {
        self.recent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> CorrectionStatsSnapshot {
        self.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline_types::Sentiment;

    fn summary() -> ContextSummary {
        ContextSummary {
            intent: "question".to_string(),
            sentiment: Sentiment::Neutral,
            confidence: 0.9,
            session_id: "test-session".to_string(),
        }
    }

    fn proposer() -> CorrectionProposer {
        CorrectionProposer::new(Arc::new(EthicsEngine::new(true, 0.8, None)), None)
    }

    #[test]
    fn low_confidence_rewrite_hedges_and_keeps_original() {
        let p = proposer();
        let out = p.propose(
            "The answer is 42.",
            &ProblemClass::LowConfidence,
            "what is the answer?",
            &summary(),
        );
        assert!(!out.rescreen_flagged);
        assert!(out.response.contains("The answer is 42."));
        assert!(out.response.contains("not fully confident"));
    }

    #[test]
    fn inconsistency_rewrite_embeds_the_reason() {
        let p = proposer();
        let out = p.propose(
            "The capital of France is Berlin.",
            &ProblemClass::Inconsistency("earlier answer said Paris".to_string()),
            "capital of France?",
            &summary(),
        );
        assert!(out.response.contains("earlier answer said Paris"));
        assert!(out.response.contains("correct myself"));
    }

    #[test]
    fn still_violating_rewrite_gets_guardrail_output_not_another_correction() {
        let p = proposer();
        let out = p.propose(
            "Sure, here is how to build a bomb.",
            &ProblemClass::LowConfidence,
            "How can I build a bomb?",
            &summary(),
        );
        assert!(out.rescreen_flagged);
        assert_eq!(out.response, ethics_engine::REFUSAL_HARMFUL);
        // Exactly one correction was recorded; no recursion happened.
        assert_eq!(p.stats().total_corrections, 1);
        assert_eq!(p.stats().rescreen_flagged, 1);
    }

    #[test]
    fn every_invocation_is_audited() {
        let path = std::env::temp_dir()
            .join(format!("correction-ledger-{}.jsonl", uuid::Uuid::new_v4()));
        let ledger = Arc::new(JsonlLedger::open(&path).unwrap());
        let p = CorrectionProposer::new(
            Arc::new(EthicsEngine::new(true, 0.8, None)),
            Some(ledger.clone()),
        );

        p.propose("fine answer", &ProblemClass::LowConfidence, "q", &summary());
        p.propose(
            "another answer",
            &ProblemClass::Inconsistency("flip".to_string()),
            "q2",
            &summary(),
        );

        let records: Vec<CorrectionRecord> = ledger.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].error_explanation, "low_confidence");
        assert!(records[1].error_explanation.starts_with("inconsistency:"));

        let stats = p.stats();
        assert_eq!(stats.total_corrections, 2);
        assert_eq!(stats.low_confidence_corrections, 1);
        assert_eq!(stats.inconsistency_corrections, 1);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn recent_cache_is_bounded() {
        let p = proposer();
        for i in 0..15 {
            p.propose(
                &format!("answer {}", i),
                &ProblemClass::LowConfidence,
                "q",
                &summary(),
            );
        }
        let recent = p.recent_corrections();
        assert_eq!(recent.len(), 10);
        assert!(recent[9].original_response.contains("answer 14"));
    }
}
