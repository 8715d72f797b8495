// reasoning-engine-rs/src/plan.rs
// Plan-generation phase: base step list keyed by intent, plus
// deterministic requirement-driven insertions.

use pipeline_types::{Intent, QueryComplexity};

/// Requirement flags set during the analyze phase.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequirementFlags {
    pub requires_security_knowledge: bool,
    pub requires_vision: bool,
}

fn base_plan(intent: Intent) -> Vec<String> {
    let steps: &[&str] = match intent {
        Intent::Greeting => &["acknowledge_user", "generate_greeting"],
        Intent::Question => &[
            "identify_question_focus",
            "retrieve_knowledge",
            "formulate_answer",
            "verify_answer",
        ],
        Intent::Security => &[
            "assess_security_scope",
            "retrieve_security_knowledge",
            "evaluate_risk",
            "formulate_guidance",
        ],
        Intent::Technical => &[
            "parse_technical_request",
            "retrieve_knowledge",
            "draft_solution",
            "validate_solution",
        ],
        Intent::Gratitude | Intent::Other => {
            &["interpret_request", "retrieve_knowledge", "formulate_answer"]
        }
    };
    steps.iter().map(|s| s.to_string()).collect()
}

/// Build the execution plan for one query.
///
/// Insertion order is fixed (complexity, then vision, then security) so
/// identical inputs always yield an identical plan.
pub fn build_plan(
    intent: Intent,
    complexity: QueryComplexity,
    flags: RequirementFlags,
) -> Vec<String> {
    let mut plan = base_plan(intent);

    if complexity == QueryComplexity::Complex {
        let at = plan.len() - 1;
        plan.insert(at, "break_down_problem".to_string());
        plan.insert(at + 1, "synthesize_information".to_string());
    }

    if flags.requires_vision {
        plan.insert(1, "process_visual_content".to_string());
    }

    if flags.requires_security_knowledge {
        let at = plan.len() - 1;
        plan.insert(at, "apply_security_filters".to_string());
    }

    plan
}
