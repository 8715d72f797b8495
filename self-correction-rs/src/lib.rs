//! Self-correction engine for the Meridian assistant pipeline.
//!
//! Three cooperating pieces: the Confidence Assessor combines the
//! available confidence signals into one scalar, the Inconsistency
//! Detector scans recent history for direct contradictions, and the
//! Correction Proposer rewrites flagged responses and re-screens the
//! rewrite through ethics exactly once.

pub mod confidence;
pub mod correction;
pub mod inconsistency;

pub use confidence::ConfidenceAssessor;
pub use correction::{
    CorrectionOutcome, CorrectionProposer, CorrectionStats, CorrectionStatsSnapshot, ProblemClass,
};
pub use inconsistency::detect as detect_inconsistency;
