// self-correction-rs/src/confidence.rs
// Confidence Assessor: combines the independently available confidence
// signals into one scalar in [0, 1].

/// Combines reasoning confidence and NLU confidence. A disabled assessor
/// reports full confidence so the correction stage never triggers.
#[derive(Debug, Clone)]
pub struct ConfidenceAssessor {
    enabled: bool,
}

impl ConfidenceAssessor {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Mean of the two signals, clamped to [0, 1]. Monotonic in each
    /// signal; 0.0 only when both signals are zero.
    pub fn assess(&self, reasoning_confidence: f32, nlu_confidence: f32) -> f32 {
        if !self.enabled {
            return 1.0;
        }
        ((reasoning_confidence + nlu_confidence) / 2.0).clamp(0.0, 1.0)
    }
}
