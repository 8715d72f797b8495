// pipeline-types-rs/src/violation.rs
// Violation taxonomy and the audit record shapes persisted to the
// append-only ledgers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::Sentiment;

/// Fixed taxonomy of content-safety violation categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    HarmfulContent,
    PrivacyViolation,
    Misinformation,
    InappropriateContent,
    BiasDiscrimination,
    EmotionalEscalation,
    Overconfidence,
    SystemError,
}

impl ViolationType {
    pub const ALL: [ViolationType; 8] = [
        Self::HarmfulContent,
        Self::PrivacyViolation,
        Self::Misinformation,
        Self::InappropriateContent,
        Self::BiasDiscrimination,
        Self::EmotionalEscalation,
        Self::Overconfidence,
        Self::SystemError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HarmfulContent => "harmful_content",
            Self::PrivacyViolation => "privacy_violation",
            Self::Misinformation => "misinformation",
            Self::InappropriateContent => "inappropriate_content",
            Self::BiasDiscrimination => "bias_discrimination",
            Self::EmotionalEscalation => "emotional_escalation",
            Self::Overconfidence => "overconfidence",
            Self::SystemError => "system_error",
        }
    }
}

impl std::fmt::Display for ViolationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Violation severity. Ordering matters: guardrail precedence acts on the
/// highest non-empty bucket only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Parse a severity label from external data. Unknown labels are
    /// anomalies: they are logged and treated as `Low` for precedence.
    pub fn from_label(label: &str) -> Self {
        match label.to_lowercase().as_str() {
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            other => {
                log::warn!("unknown severity label '{}', treating as low", other);
                Self::Low
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detected breach of a content-safety category. Produced fresh per
/// screening call and only ever appended to logs, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    #[serde(rename = "type")]
    pub violation_type: ViolationType,
    pub description: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_pattern: Option<String>,
}

impl Violation {
    pub fn new(
        violation_type: ViolationType,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            violation_type,
            description: description.into(),
            severity,
            matched_pattern: None,
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.matched_pattern = Some(pattern.into());
        self
    }
}

/// Condensed turn context attached to every audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSummary {
    pub intent: String,
    pub sentiment: Sentiment,
    pub confidence: f32,
    pub session_id: String,
}

/// Ledger entry for one detected violation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub timestamp: DateTime<Utc>,
    pub user_input: String,
    pub response: String,
    pub violation: Violation,
    pub context: ContextSummary,
}

/// Ledger entry for one self-correction event. Append-only audit record,
/// one per correction regardless of whether the re-screen altered the text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionRecord {
    pub timestamp: DateTime<Utc>,
    pub user_input: String,
    pub original_response: String,
    pub corrected_response: String,
    pub error_explanation: String,
    pub context: ContextSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_precedence_order() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn unknown_severity_label_maps_to_low() {
        assert_eq!(Severity::from_label("critical"), Severity::Low);
        assert_eq!(Severity::from_label("HIGH"), Severity::High);
    }

    #[test]
    fn violation_serializes_with_type_field() {
        let v = Violation::new(
            ViolationType::HarmfulContent,
            Severity::High,
            "matched harmful keyword",
        )
        .with_pattern("bomb");
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["type"], "harmful_content");
        assert_eq!(json["severity"], "high");
        assert_eq!(json["matched_pattern"], "bomb");
    }
}
