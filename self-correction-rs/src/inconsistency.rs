// self-correction-rs/src/inconsistency.rs
// Inconsistency Detector: scans a bounded window of prior turns for
// direct lexical contradiction signatures against the new response.
//
// This is deliberately narrow. It recognizes three signatures (a
// "capital of X is Y" fact template, a copular assertion negated
// verbatim, and an affirmative/negative answer flip) and nothing else.
// General contradiction detection is out of scope.

use lazy_static::lazy_static;
use regex::Regex;

use pipeline_types::HistoryEntry;

lazy_static! {
    static ref CAPITAL_FACT: Regex =
        Regex::new(r"(?i)\bcapital of ([a-z][a-z ]*?) is ([a-z]+)").expect("static pattern");
    static ref COPULAR_ASSERTION: Regex =
        Regex::new(r"(?i)\b([a-z][a-z0-9 ]{2,40}?) is (?:a |an |the )?([a-z][a-z0-9 ]{2,40})\b")
            .expect("static pattern");
}

/// Scan `history` for a direct contradiction with `response`. Returns on
/// the first match found; `(false, None)` when nothing matches.
pub fn detect(response: &str, history: &[HistoryEntry]) -> (bool, Option<String>) {
    let response_lower = response.to_lowercase();

    for entry in history {
        let prior = entry.assistant_response.to_lowercase();

        // Signature 1: same "capital of X" subject, different object.
        if let Some(new_fact) = CAPITAL_FACT.captures(&response_lower) {
            if let Some(old_fact) = CAPITAL_FACT.captures(&prior) {
                let same_subject = new_fact[1].trim() == old_fact[1].trim();
                let different_object = new_fact[2] != old_fact[2];
                if same_subject && different_object {
                    return (
                        true,
                        Some(format!(
                            "statement 'capital of {} is {}' contradicts the earlier answer '{}'",
                            new_fact[1].trim(),
                            &new_fact[2],
                            &old_fact[2],
                        )),
                    );
                }
            }
        }

        // Signature 2: an earlier assertion "A is B" negated verbatim as
        // "A is not B" in the new response.
        for assertion in COPULAR_ASSERTION.captures_iter(&prior) {
            let negated = format!("{} is not {}", assertion[1].trim(), assertion[2].trim());
            if response_lower.contains(&negated) {
                return (
                    true,
                    Some(format!(
                        "response negates the earlier statement '{} is {}'",
                        assertion[1].trim(),
                        assertion[2].trim(),
                    )),
                );
            }
        }

        // Signature 3: affirmative answer flipped to negative (or the
        // reverse) against the same exchange.
        let prior_yes = starts_with_word(prior.trim_start(), "yes");
        let prior_no = starts_with_word(prior.trim_start(), "no");
        let new_yes = starts_with_word(response_lower.trim_start(), "yes");
        let new_no = starts_with_word(response_lower.trim_start(), "no");
        if (prior_yes && new_no) || (prior_no && new_yes) {
            return (
                true,
                Some(format!(
                    "answer flips the earlier reply '{}'",
                    entry.assistant_response.trim()
                )),
            );
        }
    }

    (false, None)
}

/// True when `s` begins with `word` as a whole word ("no, ..." but not
/// "note that ...").
fn starts_with_word(s: &str, word: &str) -> bool {
    s.starts_with(word)
        && s[word.len()..]
            .chars()
            .next()
            .map(|c| !c.is_alphanumeric())
            .unwrap_or(true)
}
