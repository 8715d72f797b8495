// pipeline-types-rs/src/config.rs
// Environment-driven pipeline configuration with safe fallbacks.

use std::env;
use std::path::PathBuf;

/// Tunable knobs for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Run the ethics screening stage.
    pub ethics_enabled: bool,
    /// Run confidence/inconsistency assessment and corrections.
    pub correction_enabled: bool,
    /// Confidence below this triggers a self-correction.
    pub correction_confidence_threshold: f32,
    /// NLU confidence below this triggers a clarification question.
    pub clarification_threshold: f32,
    /// Stated confidence below this makes high-certainty wording an
    /// overconfidence violation.
    pub overconfidence_threshold: f32,
    /// How many past turns the inconsistency detector inspects.
    pub history_window: usize,
    /// Knowledge-item count at which the volume factor saturates.
    pub knowledge_saturation: usize,
    /// Response length (chars) at which the length factor saturates.
    pub response_length_saturation: usize,
    /// JSONL ledger for ethical violations.
    pub violation_ledger_path: PathBuf,
    /// JSONL ledger for self-corrections.
    pub correction_ledger_path: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ethics_enabled: true,
            correction_enabled: true,
            correction_confidence_threshold: 0.6,
            clarification_threshold: 0.4,
            overconfidence_threshold: 0.8,
            history_window: 5,
            knowledge_saturation: 10,
            response_length_saturation: 200,
            violation_ledger_path: PathBuf::from("data/ethics/violations.jsonl"),
            correction_ledger_path: PathBuf::from("data/corrections/corrections.jsonl"),
        }
    }
}

impl PipelineConfig {
    /// Construct configuration from environment variables. Never panics;
    /// malformed values fall back to defaults with a log warning.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ethics_enabled: parse_bool_var("PIPELINE_ETHICS_ENABLED", defaults.ethics_enabled),
            correction_enabled: parse_bool_var(
                "PIPELINE_CORRECTION_ENABLED",
                defaults.correction_enabled,
            ),
            correction_confidence_threshold: parse_f32_var(
                "PIPELINE_CORRECTION_THRESHOLD",
                defaults.correction_confidence_threshold,
            ),
            clarification_threshold: parse_f32_var(
                "PIPELINE_CLARIFICATION_THRESHOLD",
                defaults.clarification_threshold,
            ),
            overconfidence_threshold: parse_f32_var(
                "PIPELINE_OVERCONFIDENCE_THRESHOLD",
                defaults.overconfidence_threshold,
            ),
            history_window: parse_usize_var("PIPELINE_HISTORY_WINDOW", defaults.history_window),
            knowledge_saturation: parse_usize_var(
                "PIPELINE_KNOWLEDGE_SATURATION",
                defaults.knowledge_saturation,
            ),
            response_length_saturation: parse_usize_var(
                "PIPELINE_RESPONSE_LENGTH_SATURATION",
                defaults.response_length_saturation,
            ),
            violation_ledger_path: env::var("PIPELINE_VIOLATION_LEDGER_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.violation_ledger_path),
            correction_ledger_path: env::var("PIPELINE_CORRECTION_LEDGER_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.correction_ledger_path),
        }
    }
}

fn parse_bool_var(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(val) => {
            let v = val.trim().to_ascii_lowercase();
            matches!(v.as_str(), "1" | "true" | "yes" | "on")
        }
        Err(_) => default,
    }
}

fn parse_f32_var(name: &str, default: f32) -> f32 {
    match env::var(name) {
        Ok(val) => val.trim().parse::<f32>().unwrap_or_else(|_| {
            log::warn!("invalid value in {}, using default {}", name, default);
            default
        }),
        Err(_) => default,
    }
}

fn parse_usize_var(name: &str, default: usize) -> usize {
    match env::var(name) {
        Ok(val) => val.trim().parse::<usize>().unwrap_or_else(|_| {
            log::warn!("invalid value in {}, using default {}", name, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = PipelineConfig::default();
        assert!(cfg.ethics_enabled);
        assert!(cfg.correction_confidence_threshold > 0.0);
        assert!(cfg.correction_confidence_threshold < 1.0);
        assert_eq!(cfg.history_window, 5);
    }

    #[test]
    fn env_overrides_threshold() {
        std::env::set_var("PIPELINE_CORRECTION_THRESHOLD", "0.75");
        let cfg = PipelineConfig::from_env();
        assert!((cfg.correction_confidence_threshold - 0.75).abs() < f32::EPSILON);
        std::env::remove_var("PIPELINE_CORRECTION_THRESHOLD");
    }

    #[test]
    fn malformed_env_falls_back() {
        std::env::set_var("PIPELINE_HISTORY_WINDOW", "not-a-number");
        let cfg = PipelineConfig::from_env();
        assert_eq!(cfg.history_window, 5);
        std::env::remove_var("PIPELINE_HISTORY_WINDOW");
    }
}
