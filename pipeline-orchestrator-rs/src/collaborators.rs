// pipeline-orchestrator-rs/src/collaborators.rs
// In-process collaborator implementations: a keyword NLU, an in-memory
// store, a fixed threat-intelligence feed, and a sentiment-aware
// communication layer. Production deployments substitute real backends
// behind the same traits.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use pipeline_types::{
    CollaboratorError, Communication, Entity, HistoryEntry, Intent, KnowledgeItem, MemoryStore,
    Nlu, NluResult, Sentiment, ThreatIntel, ThreatIntelResponse, ViolationRecord,
};

const GREETING_WORDS: [&str; 4] = ["hello", "hi", "hey", "greetings"];
const SECURITY_WORDS: [&str; 8] = [
    "security",
    "vulnerability",
    "threat",
    "hack",
    "exploit",
    "malware",
    "phishing",
    "breach",
];
const TECHNICAL_WORDS: [&str; 8] = [
    "code", "install", "configure", "deploy", "debug", "compile", "server", "api",
];
const QUESTION_WORDS: [&str; 10] = [
    "what", "how", "why", "when", "where", "who", "which", "can", "could", "does",
];
const NEGATIVE_WORDS: [&str; 8] = [
    "hate",
    "angry",
    "terrible",
    "awful",
    "frustrated",
    "broken",
    "annoyed",
    "useless",
];
const POSITIVE_WORDS: [&str; 7] = [
    "great", "love", "awesome", "excellent", "amazing", "happy", "thanks",
];

/// Max stored conversation turns before the oldest are dropped.
const CONVERSATION_CAP: usize = 1000;

/// Keyword-table NLU. Deterministic and cheap; confidence reflects how
/// specific the matched table is.
#[derive(Debug, Default)]
pub struct HeuristicNlu;

impl HeuristicNlu {
    pub fn new() -> Self {
        Self
    }

    fn classify(query: &str) -> (Intent, f32) {
        let lower = query.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        let first = words.first().copied().unwrap_or("");
        if GREETING_WORDS.contains(&first) || lower.contains("good morning") {
            return (Intent::Greeting, 0.9);
        }
        if words.iter().any(|w| w.starts_with("thank")) {
            return (Intent::Gratitude, 0.9);
        }
        if SECURITY_WORDS.iter().any(|k| words.contains(k)) {
            return (Intent::Security, 0.8);
        }
        if TECHNICAL_WORDS.iter().any(|k| words.contains(k)) {
            return (Intent::Technical, 0.8);
        }
        if QUESTION_WORDS.contains(&first) || query.contains('?') {
            return (Intent::Question, 0.7);
        }
        (Intent::Other, 0.5)
    }

    fn sentiment(query: &str) -> Sentiment {
        let lower = query.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        if NEGATIVE_WORDS.iter().any(|k| words.contains(k)) {
            Sentiment::Negative
        } else if POSITIVE_WORDS.iter().any(|k| words.contains(k)) {
            Sentiment::Positive
        } else {
            Sentiment::Neutral
        }
    }

    /// Capitalized words past the first token are taken as proper nouns.
    fn entities(query: &str) -> Vec<Entity> {
        query
            .split_whitespace()
            .skip(1)
            .filter(|w| w.chars().next().map(|c| c.is_uppercase()).unwrap_or(false))
            .map(|w| Entity {
                text: w.trim_matches(|c: char| !c.is_alphanumeric()).to_string(),
                kind: "proper_noun".to_string(),
            })
            .filter(|e| !e.text.is_empty())
            .collect()
    }
}

#[async_trait]
impl Nlu for HeuristicNlu {
    async fn process(&self, query: &str, _session_id: &str) -> Result<NluResult, CollaboratorError> {
        let (intent, confidence) = Self::classify(query);
        Ok(NluResult {
            intent,
            entities: Self::entities(query),
            confidence,
            sentiment: Self::sentiment(query),
        })
    }

    async fn generate_fallback(
        &self,
        query: &str,
        _session_id: &str,
    ) -> Result<String, CollaboratorError> {
        let lower = query.to_lowercase();
        let text = if GREETING_WORDS.iter().any(|g| lower.contains(g)) {
            "Hello! What can I do for you?".to_string()
        } else if lower.contains("help") {
            "I can answer questions, talk through technical problems, and give security \
             guidance. What would you like to look at?"
                .to_string()
        } else {
            format!(
                "I understood your message as: '{}'. Could you give me a bit more detail?",
                query.trim()
            )
        };
        Ok(text)
    }
}

/// In-memory backing store with word-overlap search. Not persistent;
/// suitable for a single chat process and for tests.
#[derive(Debug, Default)]
pub struct InMemoryMemory {
    conversations: Mutex<Vec<HistoryEntry>>,
    knowledge: Mutex<Vec<KnowledgeItem>>,
    security_knowledge: Mutex<Vec<KnowledgeItem>>,
    violations: Mutex<Vec<ViolationRecord>>,
}

impl InMemoryMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_knowledge(&self, item: KnowledgeItem) {
        lock(&self.knowledge).push(item);
    }

    pub fn add_security_knowledge(&self, item: KnowledgeItem) {
        lock(&self.security_knowledge).push(item);
    }

    pub fn violation_count(&self) -> usize {
        lock(&self.violations).len()
    }
}

/// Words of four or more characters shared between query and text.
fn overlaps(query: &str, text: &str) -> bool {
    let text_lower = text.to_lowercase();
    query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 4)
        .any(|w| text_lower.contains(w))
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl MemoryStore for InMemoryMemory {
    async fn search_conversations(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, CollaboratorError> {
        let conversations = lock(&self.conversations);
        let matched: Vec<HistoryEntry> = conversations
            .iter()
            .filter(|e| overlaps(query, &e.user_message) || overlaps(query, &e.assistant_response))
            .cloned()
            .collect();
        let skip = matched.len().saturating_sub(limit);
        Ok(matched.into_iter().skip(skip).collect())
    }

    async fn search_knowledge(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<KnowledgeItem>, CollaboratorError> {
        Ok(lock(&self.knowledge)
            .iter()
            .filter(|i| overlaps(query, &i.title) || overlaps(query, &i.content))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn search_security_knowledge(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<KnowledgeItem>, CollaboratorError> {
        Ok(lock(&self.security_knowledge)
            .iter()
            .filter(|i| overlaps(query, &i.title) || overlaps(query, &i.content))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn add_conversation(
        &self,
        user_input: &str,
        response: &str,
        _session_id: &str,
    ) -> Result<(), CollaboratorError> {
        let mut conversations = lock(&self.conversations);
        if conversations.len() == CONVERSATION_CAP {
            conversations.remove(0);
        }
        conversations.push(HistoryEntry {
            user_message: user_input.to_string(),
            assistant_response: response.to_string(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    async fn add_violation_record(
        &self,
        record: &ViolationRecord,
    ) -> Result<(), CollaboratorError> {
        lock(&self.violations).push(record.clone());
        Ok(())
    }
}

/// Threat intelligence backed by a fixed advisory list.
#[derive(Debug, Default)]
pub struct StaticThreatIntel {
    items: Vec<KnowledgeItem>,
}

impl StaticThreatIntel {
    pub fn new(items: Vec<KnowledgeItem>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl ThreatIntel for StaticThreatIntel {
    async fn fetch(&self, _query: &str) -> Result<ThreatIntelResponse, CollaboratorError> {
        Ok(ThreatIntelResponse {
            status: "success".to_string(),
            items: self.items.clone(),
        })
    }
}

/// Clarification questions below a confidence threshold, plus light
/// sentiment-driven restyling of the outgoing response.
#[derive(Debug)]
pub struct AdaptiveCommunication {
    clarification_threshold: f32,
    clarifications_sent: AtomicU64,
    adaptations_made: AtomicU64,
}

impl AdaptiveCommunication {
    pub fn new(clarification_threshold: f32) -> Self {
        Self {
            clarification_threshold,
            clarifications_sent: AtomicU64::new(0),
            adaptations_made: AtomicU64::new(0),
        }
    }

    pub fn clarifications_sent(&self) -> u64 {
        self.clarifications_sent.load(Ordering::Relaxed)
    }

    pub fn adaptations_made(&self) -> u64 {
        self.adaptations_made.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Communication for AdaptiveCommunication {
    /// Zero confidence means the classifier produced no signal at all;
    /// that case gets the fallback response, not a clarifying question.
    async fn maybe_clarify(
        &self,
        query: &str,
        confidence: f32,
        _session_id: &str,
    ) -> Result<Option<String>, CollaboratorError> {
        if confidence <= 0.0 || confidence >= self.clarification_threshold {
            return Ok(None);
        }
        self.clarifications_sent.fetch_add(1, Ordering::Relaxed);
        let lower = query.to_lowercase();
        let question = if SECURITY_WORDS.iter().any(|k| lower.contains(k)) {
            "I want to make sure I help with the right thing: are you asking about securing \
             a system you manage, or about a specific alert you have seen?"
        } else {
            "I want to make sure I understand. Could you rephrase that or add a little more \
             detail about what you are looking for?"
        };
        Ok(Some(question.to_string()))
    }

    async fn adapt(
        &self,
        _query: &str,
        response: &str,
        sentiment: Sentiment,
    ) -> Result<String, CollaboratorError> {
        match sentiment {
            Sentiment::Negative => {
                self.adaptations_made.fetch_add(1, Ordering::Relaxed);
                Ok(format!("I understand this may be frustrating. {}", response))
            }
            Sentiment::Positive | Sentiment::Neutral => Ok(response.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn greeting_and_question_classification() {
        let nlu = HeuristicNlu::new();
        let greeting = nlu.process("Hello, how are you?", "s").await.unwrap();
        assert_eq!(greeting.intent, Intent::Greeting);
        assert!(greeting.confidence > 0.8);

        let question = nlu.process("What is a buffer?", "s").await.unwrap();
        assert_eq!(question.intent, Intent::Question);

        let security = nlu.process("Is this a phishing email?", "s").await.unwrap();
        assert_eq!(security.intent, Intent::Security);

        let other = nlu.process("blue skies today", "s").await.unwrap();
        assert_eq!(other.intent, Intent::Other);
    }

    #[tokio::test]
    async fn sentiment_and_entities_are_extracted() {
        let nlu = HeuristicNlu::new();
        let result = nlu
            .process("What is the capital of France?", "s")
            .await
            .unwrap();
        assert_eq!(result.sentiment, Sentiment::Neutral);
        assert!(result.entities.iter().any(|e| e.text == "France"));

        let angry = nlu.process("this broken thing again", "s").await.unwrap();
        assert_eq!(angry.sentiment, Sentiment::Negative);
    }

    #[tokio::test]
    async fn memory_search_matches_on_word_overlap() {
        let memory = InMemoryMemory::new();
        memory
            .add_conversation("What is the capital of France?", "Paris.", "s")
            .await
            .unwrap();
        memory
            .add_conversation("weather tomorrow", "Sunny.", "s")
            .await
            .unwrap();

        let hits = memory
            .search_conversations("capital of France", 5)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].user_message.contains("capital"));
    }

    #[tokio::test]
    async fn memory_search_respects_limit_and_recency() {
        let memory = InMemoryMemory::new();
        for i in 0..8 {
            memory
                .add_conversation(&format!("question about linkers {}", i), "answer", "s")
                .await
                .unwrap();
        }
        let hits = memory.search_conversations("linkers", 3).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits[2].user_message.ends_with('7'));
    }

    #[tokio::test]
    async fn clarification_respects_threshold_and_zero_signal() {
        let comms = AdaptiveCommunication::new(0.4);
        assert!(comms.maybe_clarify("q", 0.3, "s").await.unwrap().is_some());
        assert!(comms.maybe_clarify("q", 0.5, "s").await.unwrap().is_none());
        assert!(comms.maybe_clarify("q", 0.0, "s").await.unwrap().is_none());
        assert_eq!(comms.clarifications_sent(), 1);
    }

    #[tokio::test]
    async fn negative_sentiment_prefixes_the_response() {
        let comms = AdaptiveCommunication::new(0.4);
        let adapted = comms
            .adapt("q", "Try reinstalling it.", Sentiment::Negative)
            .await
            .unwrap();
        assert!(adapted.starts_with("I understand this may be frustrating."));

        let unchanged = comms
            .adapt("q", "Try reinstalling it.", Sentiment::Neutral)
            .await
            .unwrap();
        assert_eq!(unchanged, "Try reinstalling it.");
    }
}
