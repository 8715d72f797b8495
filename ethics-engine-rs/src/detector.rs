// ethics-engine-rs/src/detector.rs
// Violation Detector: pattern-matches a candidate response against the
// fixed violation taxonomy. Stateless aside from the counters owned by
// the engine; fails closed on internal error.

use lazy_static::lazy_static;
use regex::Regex;

use pipeline_types::{Sentiment, Severity, Violation, ViolationType};

/// Detection error. Surfacing one of these makes the caller emit a
/// `system_error` violation instead of an empty set.
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("pattern table failed to build: {0}")]
    PatternTable(#[from] regex::Error),
}

/// Caller-supplied signals the context-aware checks need.
#[derive(Debug, Clone, Copy)]
pub struct ScreeningContext {
    /// Sentiment of the triggering user utterance.
    pub sentiment: Sentiment,
    /// Confidence the pipeline currently claims for this response.
    pub stated_confidence: f32,
    /// Below this, high-certainty wording is flagged as overconfidence.
    pub overconfidence_threshold: f32,
}

struct CategoryPatterns {
    violation_type: ViolationType,
    severity: Severity,
    description: &'static str,
    patterns: Vec<Regex>,
}

fn compile(raw: &[&str]) -> Result<Vec<Regex>, regex::Error> {
    raw.iter().map(|p| Regex::new(p)).collect()
}

fn build_keyword_tables() -> Result<Vec<CategoryPatterns>, regex::Error> {
    Ok(vec![
        CategoryPatterns {
            violation_type: ViolationType::HarmfulContent,
            severity: Severity::High,
            description: "response contains potentially harmful or dangerous content",
            patterns: compile(&[
                r"(?i)\b(build|make|construct|assemble)\s+(a\s+)?bomb",
                r"(?i)\bhow\s+to\s+(kill|hurt|poison|attack)\b",
                r"(?i)\b(kill|murder)\s+(someone|a\s+person|people)\b",
                r"(?i)\bmake\s+(a\s+)?(weapon|explosive)",
                r"(?i)\bsynthesi[sz]e\s+(a\s+)?(toxin|nerve\s+agent)",
                r"(?i)\bcause\s+(maximum\s+)?harm\b",
            ])?,
        },
        CategoryPatterns {
            violation_type: ViolationType::PrivacyViolation,
            severity: Severity::High,
            description: "response exposes or solicits sensitive personal information",
            patterns: compile(&[
                r"(?i)\bsocial\s+security\s+number\s+is\b",
                r"(?i)\byour\s+ssn\b",
                r"(?i)\bpassword\s+is\s*[:=]?\s*\S+",
                r"(?i)\bhome\s+address\s+is\b",
                r"(?i)\bcredit\s+card\s+number\s+is\b",
            ])?,
        },
        CategoryPatterns {
            violation_type: ViolationType::Misinformation,
            severity: Severity::Medium,
            description: "response repeats a known misinformation claim",
            patterns: compile(&[
                r"(?i)\bvaccines\s+cause\s+autism\b",
                r"(?i)\bthe\s+earth\s+is\s+flat\b",
                r"(?i)\bmoon\s+landing\s+was\s+(faked|staged)\b",
                r"(?i)\bmiracle\s+cure\b",
                r"(?i)\b5g\s+(causes|spreads)\b",
            ])?,
        },
        CategoryPatterns {
            violation_type: ViolationType::InappropriateContent,
            severity: Severity::High,
            description: "response contains inappropriate or explicit content",
            patterns: compile(&[
                r"(?i)\bexplicit\s+(sexual\s+)?content\b",
                r"(?i)\bgraphic\s+violence\b",
                r"(?i)\bnsfw\b",
            ])?,
        },
        CategoryPatterns {
            violation_type: ViolationType::BiasDiscrimination,
            severity: Severity::High,
            description: "response contains biased or discriminatory generalizations",
            patterns: compile(&[
                r"(?i)\ball\s+(women|men)\s+are\b",
                r"(?i)\bthose\s+people\s+are\s+(all\s+)?(inferior|criminals|lazy)\b",
                r"(?i)\b(women|men)\s+can't\s+(do|be|understand)\b",
                r"(?i)\bpeople\s+of\s+that\s+(race|religion)\s+are\b",
            ])?,
        },
    ])
}

lazy_static! {
    static ref KEYWORD_TABLES: Result<Vec<CategoryPatterns>, regex::Error> =
        build_keyword_tables();

    // High-precision formats layered on top of the keyword patterns.
    static ref EMAIL_PATTERN: Result<Regex, regex::Error> =
        Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}");
    static ref PHONE_PATTERN: Result<Regex, regex::Error> =
        Regex::new(r"\b(\+?\d{1,2}[\s.-]?)?\(?\d{3}\)?[\s.-]?\d{3}[\s.-]?\d{4}\b");
}

/// Escalation markers checked against the response when the user's
/// sentiment was already negative.
const ESCALATION_MARKERS: [&str; 5] = [
    "calm down",
    "you're overreacting",
    "you are overreacting",
    "that's your fault",
    "stop complaining",
];

/// High-certainty wording that is only acceptable when the pipeline's
/// own confidence backs it up.
const CERTAINTY_MARKERS: [&str; 6] = [
    "definitely",
    "100%",
    "absolutely certain",
    "guaranteed",
    "without a doubt",
    "there is no doubt",
];

/// Screen `response` against the violation taxonomy.
///
/// Fails closed: an internal error yields a single `system_error`
/// violation so downstream logic treats uncertainty as a violation.
pub fn detect(response: &str, user_input: &str, ctx: &ScreeningContext) -> Vec<Violation> {
    match detect_inner(response, user_input, ctx) {
        Ok(violations) => violations,
        Err(e) => {
            log::error!("violation detection failed, failing closed: {}", e);
            vec![Violation::new(
                ViolationType::SystemError,
                Severity::High,
                format!("violation detection failed internally: {}", e),
            )]
        }
    }
}

fn detect_inner(
    response: &str,
    _user_input: &str,
    ctx: &ScreeningContext,
) -> Result<Vec<Violation>, DetectionError> {
    let mut violations = Vec::new();

    let tables = KEYWORD_TABLES.as_ref().map_err(|e| e.clone())?;
    for table in tables {
        for pattern in &table.patterns {
            if let Some(m) = pattern.find(response) {
                violations.push(
                    Violation::new(table.violation_type, table.severity, table.description)
                        .with_pattern(m.as_str()),
                );
            }
        }
    }

    // Dedicated formats: a leaked email address or phone number is a
    // privacy violation even without any keyword hit.
    let email = EMAIL_PATTERN.as_ref().map_err(|e| e.clone())?;
    if let Some(m) = email.find(response) {
        violations.push(
            Violation::new(
                ViolationType::PrivacyViolation,
                Severity::Medium,
                "response contains an email address",
            )
            .with_pattern(m.as_str()),
        );
    }
    let phone = PHONE_PATTERN.as_ref().map_err(|e| e.clone())?;
    if let Some(m) = phone.find(response) {
        violations.push(
            Violation::new(
                ViolationType::PrivacyViolation,
                Severity::Medium,
                "response contains a phone number",
            )
            .with_pattern(m.as_str()),
        );
    }

    // Context-aware checks run independently of pattern matching.
    let response_lower = response.to_lowercase();
    if ctx.sentiment == Sentiment::Negative {
        for marker in ESCALATION_MARKERS {
            if response_lower.contains(marker) {
                violations.push(
                    Violation::new(
                        ViolationType::EmotionalEscalation,
                        Severity::Medium,
                        "response risks escalating an already negative exchange",
                    )
                    .with_pattern(marker),
                );
                break;
            }
        }
    }

    if ctx.stated_confidence < ctx.overconfidence_threshold {
        for marker in CERTAINTY_MARKERS {
            if response_lower.contains(marker) {
                violations.push(
                    Violation::new(
                        ViolationType::Overconfidence,
                        Severity::Low,
                        format!(
                            "high-certainty wording at stated confidence {:.2}",
                            ctx.stated_confidence
                        ),
                    )
                    .with_pattern(marker),
                );
                break;
            }
        }
    }

    Ok(violations)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn neutral_ctx() -> ScreeningContext {
        ScreeningContext {
            sentiment: Sentiment::Neutral,
            stated_confidence: 0.9,
            overconfidence_threshold: 0.8,
        }
    }

    #[test]
    fn harmful_content_is_flagged_high() {
        let violations = detect(
            "Here is how to build a bomb at home.",
            "how can I build a bomb?",
            &neutral_ctx(),
        );
        assert!(violations
            .iter()
            .any(|v| v.violation_type == ViolationType::HarmfulContent
                && v.severity == Severity::High));
    }

    #[test]
    fn clean_response_has_no_violations() {
        let violations = detect(
            "The weather today looks pleasant.",
            "how is the weather?",
            &neutral_ctx(),
        );
        assert!(violations.is_empty());
    }

    #[test]
    fn email_and_phone_are_privacy_violations() {
        let violations = detect(
            "You can reach them at jane.doe@example.com or 555-867-5309.",
            "contact info?",
            &neutral_ctx(),
        );
        let privacy: Vec<_> = violations
            .iter()
            .filter(|v| v.violation_type == ViolationType::PrivacyViolation)
            .collect();
        assert_eq!(privacy.len(), 2);
        assert!(privacy.iter().all(|v| v.severity == Severity::Medium));
    }

    #[test]
    fn escalation_requires_negative_sentiment() {
        let response = "You should calm down before we continue.";
        let mut ctx = neutral_ctx();
        assert!(detect(response, "this is broken!", &ctx).is_empty());

        ctx.sentiment = Sentiment::Negative;
        let violations = detect(response, "this is broken!", &ctx);
        assert!(violations
            .iter()
            .any(|v| v.violation_type == ViolationType::EmotionalEscalation
                && v.severity == Severity::Medium));
    }

    #[test]
    fn overconfidence_only_below_threshold() {
        let response = "This is definitely the right answer.";
        let mut ctx = neutral_ctx();
        assert!(detect(response, "q", &ctx).is_empty());

        ctx.stated_confidence = 0.5;
        let violations = detect(response, "q", &ctx);
        assert!(violations
            .iter()
            .any(|v| v.violation_type == ViolationType::Overconfidence
                && v.severity == Severity::Low));
    }

    #[test]
    fn detection_is_idempotent() {
        let ctx = ScreeningContext {
            sentiment: Sentiment::Negative,
            stated_confidence: 0.4,
            overconfidence_threshold: 0.8,
        };
        let response = "This is definitely fine, calm down.";
        let first = detect(response, "ugh", &ctx);
        let second = detect(response, "ugh", &ctx);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.violation_type, b.violation_type);
            assert_eq!(a.severity, b.severity);
            assert_eq!(a.matched_pattern, b.matched_pattern);
        }
    }

    #[test]
    fn same_type_can_accumulate_multiple_hits() {
        let violations = detect(
            "How to kill someone: first build a bomb.",
            "q",
            &neutral_ctx(),
        );
        let harmful = violations
            .iter()
            .filter(|v| v.violation_type == ViolationType::HarmfulContent)
            .count();
        assert!(harmful >= 2);
    }
}
