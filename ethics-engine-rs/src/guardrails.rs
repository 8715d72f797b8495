// ethics-engine-rs/src/guardrails.rs
// Guardrail Applier: maps a set of violations to a replacement or
// annotated response. Deterministic; acts on the highest non-empty
// severity bucket only.

use pipeline_types::{Severity, Violation, ViolationType};

/// Fixed refusal for high-severity harmful content.
pub const REFUSAL_HARMFUL: &str = "I can't help with that. Providing this information could cause \
     serious harm, so I won't include it in my response.";

/// Fixed refusal for high-severity privacy violations.
pub const REFUSAL_PRIVACY: &str = "I can't share that. It would expose sensitive personal \
     information, which I'm not able to reveal or request.";

/// Fixed refusal for high-severity inappropriate content.
pub const REFUSAL_INAPPROPRIATE: &str = "I can't provide that content. It falls outside what I'm \
     able to discuss here.";

/// Fixed refusal for high-severity bias or discrimination.
pub const REFUSAL_BIAS: &str = "I won't make generalizations about groups of people. Let me know \
     if I can help with something else.";

/// Generic refusal for any other high-severity violation, including the
/// fail-closed system_error case.
pub const REFUSAL_GENERIC: &str = "I'm not able to provide that response. Please rephrase your \
     request and I'll try to help within my guidelines.";

const MISINFORMATION_PREFIX: &str =
    "Please note: the following may contain claims I could not verify. ";
const MISINFORMATION_SUFFIX: &str = " I recommend checking this against an authoritative source.";

const PRIVACY_CAUTION: &str = "I noticed my answer would have included personal contact details, \
     so I've withheld it. I can help without sharing that information.";

const EMPATHY_PREFIX: &str = "I understand this is frustrating, and I want to help. ";

const VERIFY_SUFFIX: &str =
    " That said, I'd recommend verifying this independently before relying on it.";

/// Outcome of one guardrail application.
#[derive(Debug, Clone)]
pub struct GuardrailOutcome {
    pub response: String,
    pub applied: bool,
}

/// Apply guardrails for `violations` to `response`. Exactly one output
/// string is produced; high severity takes precedence over medium over
/// low, and lower buckets are ignored once a higher one is non-empty.
pub fn apply(_user_input: &str, response: &str, violations: &[Violation]) -> GuardrailOutcome {
    if violations.is_empty() {
        return GuardrailOutcome {
            response: response.to_string(),
            applied: false,
        };
    }

    let highest = violations
        .iter()
        .map(|v| v.severity)
        .max()
        .unwrap_or(Severity::Low);
    let bucket: Vec<&Violation> = violations
        .iter()
        .filter(|v| v.severity == highest)
        .collect();

    let replacement = match highest {
        Severity::High => apply_high(&bucket),
        Severity::Medium => apply_medium(response, &bucket),
        Severity::Low => apply_low(response, &bucket),
    };

    log::warn!(
        "guardrail applied at severity {} for {} violation(s)",
        highest,
        bucket.len()
    );

    GuardrailOutcome {
        response: replacement,
        applied: true,
    }
}

fn has_type(bucket: &[&Violation], t: ViolationType) -> bool {
    bucket.iter().any(|v| v.violation_type == t)
}

fn apply_high(bucket: &[&Violation]) -> String {
    if has_type(bucket, ViolationType::HarmfulContent) {
        REFUSAL_HARMFUL.to_string()
    } else if has_type(bucket, ViolationType::PrivacyViolation) {
        REFUSAL_PRIVACY.to_string()
    } else if has_type(bucket, ViolationType::InappropriateContent) {
        REFUSAL_INAPPROPRIATE.to_string()
    } else if has_type(bucket, ViolationType::BiasDiscrimination) {
        REFUSAL_BIAS.to_string()
    } else {
        REFUSAL_GENERIC.to_string()
    }
}

fn apply_medium(response: &str, bucket: &[&Violation]) -> String {
    // Privacy drops the original content entirely; the other medium
    // guardrails keep it with an annotation.
    if has_type(bucket, ViolationType::PrivacyViolation) {
        PRIVACY_CAUTION.to_string()
    } else if has_type(bucket, ViolationType::Misinformation) {
        format!("{}{}{}", MISINFORMATION_PREFIX, response, MISINFORMATION_SUFFIX)
    } else if has_type(bucket, ViolationType::EmotionalEscalation) {
        format!("{}{}", EMPATHY_PREFIX, response)
    } else {
        format!("{}{}", MISINFORMATION_PREFIX, response)
    }
}

fn apply_low(response: &str, _bucket: &[&Violation]) -> String {
    format!("{}{}", response, VERIFY_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline_types::{Severity, Violation, ViolationType};

    fn violation(t: ViolationType, s: Severity) -> Violation {
        Violation::new(t, s, "test violation")
    }

    #[test]
    fn no_violations_passes_through() {
        let out = apply("q", "original response", &[]);
        assert!(!out.applied);
        assert_eq!(out.response, "original response");
    }

    #[test]
    fn high_harmful_yields_fixed_refusal() {
        let out = apply(
            "q",
            "dangerous text",
            &[violation(ViolationType::HarmfulContent, Severity::High)],
        );
        assert!(out.applied);
        assert_eq!(out.response, REFUSAL_HARMFUL);
    }

    #[test]
    fn high_takes_precedence_over_medium() {
        let both = [
            violation(ViolationType::Misinformation, Severity::Medium),
            violation(ViolationType::HarmfulContent, Severity::High),
        ];
        let high_only = [violation(ViolationType::HarmfulContent, Severity::High)];

        let out_both = apply("q", "text", &both);
        let out_high = apply("q", "text", &high_only);
        assert_eq!(out_both.response, out_high.response);
    }

    #[test]
    fn medium_misinformation_wraps_original() {
        let out = apply(
            "q",
            "the claim",
            &[violation(ViolationType::Misinformation, Severity::Medium)],
        );
        assert!(out.response.contains("the claim"));
        assert!(out.response.starts_with(MISINFORMATION_PREFIX));
        assert!(out.response.ends_with(MISINFORMATION_SUFFIX));
    }

    #[test]
    fn medium_privacy_drops_original_content() {
        let out = apply(
            "q",
            "call 555-867-5309",
            &[violation(ViolationType::PrivacyViolation, Severity::Medium)],
        );
        assert!(!out.response.contains("555-867-5309"));
        assert_eq!(out.response, PRIVACY_CAUTION);
    }

    #[test]
    fn low_overconfidence_appends_verification_note() {
        let out = apply(
            "q",
            "it is definitely so",
            &[violation(ViolationType::Overconfidence, Severity::Low)],
        );
        assert!(out.response.starts_with("it is definitely so"));
        assert!(out.response.ends_with(VERIFY_SUFFIX));
    }

    #[test]
    fn unknown_high_type_gets_generic_refusal() {
        let out = apply(
            "q",
            "text",
            &[violation(ViolationType::SystemError, Severity::High)],
        );
        assert_eq!(out.response, REFUSAL_GENERIC);
    }

    #[test]
    fn deterministic_given_same_inputs() {
        let vs = [
            violation(ViolationType::EmotionalEscalation, Severity::Medium),
            violation(ViolationType::Overconfidence, Severity::Low),
        ];
        let a = apply("q", "text", &vs);
        let b = apply("q", "text", &vs);
        assert_eq!(a.response, b.response);
        assert!(a.response.starts_with(EMPATHY_PREFIX));
    }
}
