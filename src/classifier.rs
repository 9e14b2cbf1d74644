//! Request classifier - decides which agents handle a request
//!
//! Classification is a pure function of the request text and declared
//! priority. The keyword heuristic lives behind [`ScoringStrategy`] so a
//! real model can replace it without touching the pipeline.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{AgentId, AgentRole, CollaborationMode, Priority, Request};

/// Signals a scoring strategy can extract from request text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tag {
    Emotional,
    Security,
    Technical,
    Complex,
    Creative,
    Collaboration,
}

/// Turns request text into tags and an optional priority hint
pub trait ScoringStrategy: Send + Sync {
    fn score(&self, text: &str) -> BTreeSet<Tag>;

    /// Priority implied by the wording, `None` when nothing matches
    fn priority_hint(&self, text: &str) -> Option<Priority>;
}

pub(crate) const EMOTIONAL_KEYWORDS: &[&str] = &[
    "feel", "emotion", "sad", "happy", "angry", "love", "hate", "fear", "joy", "scared",
    "afraid", "worried", "anxious", "upset", "lonely",
];

pub(crate) const SECURITY_KEYWORDS: &[&str] = &[
    "secur", "protect", "hack", "virus", "malware", "safe", "threat", "attack", "breach",
    "encrypt", "password", "vulnerab", "firewall", "exploit",
];

pub(crate) const TECHNICAL_KEYWORDS: &[&str] = &[
    "code", "program", "develop", "build", "technical", "system", "algorithm", "data",
];

pub(crate) const CREATIVE_KEYWORDS: &[&str] = &[
    "design", "create", "visual", "artistic", "beautiful", "aesthetic", "ui", "interface",
    "theme", "color", "style", "creative",
];

const COLLABORATION_KEYWORDS: &[&str] = &[
    "collaborate", "both", "considering", "and also", "design secure", "creative security",
];

const CRITICAL_KEYWORDS: &[&str] = &["urgent", "emergency"];
const HIGH_KEYWORDS: &[&str] = &["important", "asap"];
const LOW_KEYWORDS: &[&str] = &["when you can", "later"];

/// Words above which a request counts as complex
const COMPLEX_WORD_COUNT: usize = 10;

/// Lower-cased request text split into word tokens
pub(crate) struct Text {
    lowered: String,
    words: Vec<String>,
}

impl Text {
    pub(crate) fn new(raw: &str) -> Self {
        let lowered = raw.to_lowercase();
        let words = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();
        Self { lowered, words }
    }

    /// Single-word keywords match any word they prefix ("hack" matches
    /// "hacked"); phrases match as substrings.
    pub(crate) fn mentions(&self, keyword: &str) -> bool {
        if keyword.contains(' ') {
            self.lowered.contains(keyword)
        } else {
            self.words.iter().any(|w| w.starts_with(keyword))
        }
    }

    pub(crate) fn mentions_any(&self, keywords: &[&str]) -> bool {
        keywords.iter().any(|k| self.mentions(k))
    }

    pub(crate) fn has_word(&self, word: &str) -> bool {
        self.words.iter().any(|w| w == word)
    }

    pub(crate) fn word_count(&self) -> usize {
        self.lowered.split_whitespace().count()
    }

    pub(crate) fn contains(&self, needle: &str) -> bool {
        self.lowered.contains(needle)
    }
}

/// Fixed keyword-list heuristic
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordScorer;

impl KeywordScorer {
    fn is_complex(text: &Text) -> bool {
        text.word_count() > COMPLEX_WORD_COUNT || (text.contains("?") && text.has_word("and"))
    }
}

impl ScoringStrategy for KeywordScorer {
    fn score(&self, raw: &str) -> BTreeSet<Tag> {
        let text = Text::new(raw);
        let mut tags = BTreeSet::new();

        if text.mentions_any(EMOTIONAL_KEYWORDS) {
            tags.insert(Tag::Emotional);
        }
        if text.mentions_any(SECURITY_KEYWORDS) {
            tags.insert(Tag::Security);
        }
        if text.mentions_any(TECHNICAL_KEYWORDS) {
            tags.insert(Tag::Technical);
        }
        if Self::is_complex(&text) {
            tags.insert(Tag::Complex);
        }
        if text.mentions_any(CREATIVE_KEYWORDS) {
            tags.insert(Tag::Creative);
        }
        if text.mentions_any(COLLABORATION_KEYWORDS) {
            tags.insert(Tag::Collaboration);
        }
        tags
    }

    fn priority_hint(&self, raw: &str) -> Option<Priority> {
        let text = Text::new(raw);
        if text.mentions_any(CRITICAL_KEYWORDS) {
            Some(Priority::Critical)
        } else if text.mentions_any(HIGH_KEYWORDS) {
            Some(Priority::High)
        } else if text.mentions_any(LOW_KEYWORDS) {
            Some(Priority::Low)
        } else {
            None
        }
    }
}

/// High-level request category, used for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestCategory {
    EmotionalPersonal,
    SecurityRelated,
    TechnicalDevelopment,
    ComplexAnalysis,
    GeneralInquiry,
}

impl RequestCategory {
    pub fn from_tags(tags: &BTreeSet<Tag>) -> Self {
        if tags.contains(&Tag::Emotional) {
            Self::EmotionalPersonal
        } else if tags.contains(&Tag::Security) {
            Self::SecurityRelated
        } else if tags.contains(&Tag::Technical) {
            Self::TechnicalDevelopment
        } else if tags.contains(&Tag::Complex) {
            Self::ComplexAnalysis
        } else {
            Self::GeneralInquiry
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::EmotionalPersonal => "Emotional/Personal",
            Self::SecurityRelated => "Security-Related",
            Self::TechnicalDevelopment => "Technical/Development",
            Self::ComplexAnalysis => "Complex Analysis",
            Self::GeneralInquiry => "General Inquiry",
        }
    }
}

/// Outcome of classifying a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Unique agents in execution order, orchestrator first
    pub selected_agents: Vec<AgentId>,
    pub priority: Priority,
    pub requires_collaboration: bool,
    pub tags: BTreeSet<Tag>,
    roles: BTreeSet<AgentRole>,
}

impl Classification {
    fn new(
        roles: BTreeSet<AgentRole>,
        priority: Priority,
        requires_collaboration: bool,
        tags: BTreeSet<Tag>,
    ) -> Self {
        Self {
            selected_agents: roles.iter().map(AgentRole::id).collect(),
            priority,
            requires_collaboration,
            tags,
            roles,
        }
    }

    pub fn category(&self) -> RequestCategory {
        RequestCategory::from_tags(&self.tags)
    }

    /// Apply the current collaboration policy to the agent plan.
    ///
    /// Coordinated and unified modes bring in the creative agent for
    /// requests that need collaboration; unified mode always adds the
    /// integration agent.
    pub fn adjusted_for(self, mode: CollaborationMode) -> Self {
        let mut roles = self.roles.clone();
        match mode {
            CollaborationMode::Coordinated if self.requires_collaboration => {
                roles.insert(AgentRole::Creative);
            }
            CollaborationMode::Unified => {
                if self.requires_collaboration {
                    roles.insert(AgentRole::Creative);
                }
                roles.insert(AgentRole::Integration);
            }
            _ => return self,
        }
        Self::new(roles, self.priority, self.requires_collaboration, self.tags)
    }
}

/// Maps requests to an agent plan
pub struct Classifier {
    strategy: Box<dyn ScoringStrategy>,
}

impl Classifier {
    pub fn new() -> Self {
        Self::with_strategy(KeywordScorer)
    }

    pub fn with_strategy(strategy: impl ScoringStrategy + 'static) -> Self {
        Self {
            strategy: Box::new(strategy),
        }
    }

    /// Classify a request. Never fails; empty text selects only the
    /// orchestrator.
    pub fn classify(&self, request: &Request) -> Classification {
        let tags = self.strategy.score(&request.text);

        let mut roles = BTreeSet::new();
        roles.insert(AgentRole::Orchestrator);
        if tags.contains(&Tag::Emotional) {
            roles.insert(AgentRole::Empathy);
        }
        if tags.contains(&Tag::Security) {
            roles.insert(AgentRole::Security);
        }
        if tags.contains(&Tag::Technical) {
            roles.insert(AgentRole::Technical);
        }
        if request.priority == Some(Priority::High) || tags.contains(&Tag::Complex) {
            roles.insert(AgentRole::Integration);
        }

        let requires_collaboration = tags.contains(&Tag::Collaboration)
            || (tags.contains(&Tag::Security) && tags.contains(&Tag::Creative));

        let hinted = self.strategy.priority_hint(&request.text);
        let priority = match (request.priority, hinted) {
            (Some(declared), Some(hint)) => declared.max(hint),
            (Some(declared), None) => declared,
            (None, Some(hint)) => hint,
            (None, None) => Priority::Medium,
        };

        let classification = Classification::new(roles, priority, requires_collaboration, tags);
        debug!(
            agents = ?classification.selected_agents,
            priority = %classification.priority,
            collaboration = classification.requires_collaboration,
            "Classified request"
        );
        classification
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &str) -> Classification {
        Classifier::new().classify(&Request::new(text))
    }

    fn ids(roles: &[AgentRole]) -> Vec<AgentId> {
        roles.iter().map(AgentRole::id).collect()
    }

    // === Selection Tests ===

    #[test]
    fn test_scared_about_breach_selects_empathy_and_security() {
        let c = classify("I feel scared about this security breach, can you help?");
        assert_eq!(
            c.selected_agents,
            ids(&[AgentRole::Orchestrator, AgentRole::Empathy, AgentRole::Security])
        );
        assert!(!c.requires_collaboration);
        assert_eq!(c.priority, Priority::Medium);
        assert_eq!(c.category(), RequestCategory::EmotionalPersonal);
    }

    #[test]
    fn test_empty_text_selects_orchestrator_only() {
        let c = classify("");
        assert_eq!(c.selected_agents, ids(&[AgentRole::Orchestrator]));
        assert_eq!(c.priority, Priority::Medium);
        assert!(!c.requires_collaboration);
        assert_eq!(c.category(), RequestCategory::GeneralInquiry);
    }

    #[test]
    fn test_orchestrator_always_first() {
        for text in ["", "hello", "write code for my data system", "I hate malware", "?? and ??"] {
            let c = classify(text);
            assert_eq!(c.selected_agents[0], AgentRole::Orchestrator.id(), "text: {text}");
        }
    }

    #[test]
    fn test_technical_keywords() {
        let c = classify("Refactor this algorithm");
        assert!(c.selected_agents.contains(&AgentRole::Technical.id()));
    }

    #[test]
    fn test_keyword_prefix_matches_inflections() {
        let c = classify("My account was hacked");
        assert!(c.selected_agents.contains(&AgentRole::Security.id()));
    }

    #[test]
    fn test_long_request_is_complex() {
        let c = classify("one two three four five six seven eight nine ten eleven");
        assert!(c.tags.contains(&Tag::Complex));
        assert!(c.selected_agents.contains(&AgentRole::Integration.id()));
    }

    #[test]
    fn test_question_with_and_is_complex() {
        let c = classify("What and why?");
        assert!(c.tags.contains(&Tag::Complex));
        // "and" inside another word does not count
        assert!(!classify("Can you handle it?").tags.contains(&Tag::Complex));
    }

    #[test]
    fn test_declared_high_priority_adds_integration() {
        let request = Request::new("hi").with_priority(Priority::High);
        let c = Classifier::new().classify(&request);
        assert_eq!(
            c.selected_agents,
            ids(&[AgentRole::Orchestrator, AgentRole::Integration])
        );
        assert_eq!(c.priority, Priority::High);
    }

    #[test]
    fn test_declared_critical_priority_skips_integration() {
        let request = Request::new("hi").with_priority(Priority::Critical);
        let c = Classifier::new().classify(&request);
        assert_eq!(c.selected_agents, ids(&[AgentRole::Orchestrator]));
        assert_eq!(c.priority, Priority::Critical);
    }

    #[test]
    fn test_no_duplicates() {
        let c = classify("security threat attack hack malware breach virus");
        let unique: BTreeSet<_> = c.selected_agents.iter().collect();
        assert_eq!(unique.len(), c.selected_agents.len());
    }

    // === Collaboration Tests ===

    #[test]
    fn test_security_and_creative_requires_collaboration() {
        let c = classify("design a secure login with strong password rules");
        assert!(c.requires_collaboration);
    }

    #[test]
    fn test_explicit_collaboration_keywords() {
        assert!(classify("please collaborate on this").requires_collaboration);
        assert!(classify("look at both options").requires_collaboration);
        assert!(classify("considering the budget").requires_collaboration);
        assert!(!classify("just one option").requires_collaboration);
    }

    // === Priority Tests ===

    #[test]
    fn test_priority_keywords() {
        assert_eq!(classify("this is urgent").priority, Priority::Critical);
        assert_eq!(classify("EMERGENCY!").priority, Priority::Critical);
        assert_eq!(classify("important stuff").priority, Priority::High);
        assert_eq!(classify("reply asap").priority, Priority::High);
        assert_eq!(classify("answer when you can").priority, Priority::Low);
        assert_eq!(classify("do it later").priority, Priority::Low);
        assert_eq!(classify("plain").priority, Priority::Medium);
    }

    #[test]
    fn test_declared_priority_raised_by_wording() {
        let request = Request::new("urgent fix").with_priority(Priority::Low);
        assert_eq!(Classifier::new().classify(&request).priority, Priority::Critical);

        let request = Request::new("fix it later").with_priority(Priority::High);
        assert_eq!(Classifier::new().classify(&request).priority, Priority::High);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let classifier = Classifier::new();
        let request = Request::new("Build a beautiful and safe data dashboard, and also explain why?");
        let first = classifier.classify(&request);
        for _ in 0..10 {
            assert_eq!(classifier.classify(&request), first);
        }
    }

    // === Mode Adjustment Tests ===

    #[test]
    fn test_autonomous_mode_leaves_plan_unchanged() {
        let c = classify("design a secure page");
        let adjusted = c.clone().adjusted_for(CollaborationMode::Autonomous);
        assert_eq!(adjusted, c);
    }

    #[test]
    fn test_coordinated_mode_adds_creative_for_collaboration() {
        let c = classify("design a secure page").adjusted_for(CollaborationMode::Coordinated);
        assert!(c.selected_agents.contains(&AgentRole::Creative.id()));
        assert!(!c.selected_agents.contains(&AgentRole::Integration.id()));

        let plain = classify("hello").adjusted_for(CollaborationMode::Coordinated);
        assert_eq!(plain.selected_agents, ids(&[AgentRole::Orchestrator]));
    }

    #[test]
    fn test_unified_mode_adds_integration() {
        let c = classify("hello").adjusted_for(CollaborationMode::Unified);
        assert_eq!(
            c.selected_agents,
            ids(&[AgentRole::Orchestrator, AgentRole::Integration])
        );
    }

    // === Strategy Tests ===

    struct AlwaysSecurity;

    impl ScoringStrategy for AlwaysSecurity {
        fn score(&self, _text: &str) -> BTreeSet<Tag> {
            [Tag::Security].into()
        }

        fn priority_hint(&self, _text: &str) -> Option<Priority> {
            Some(Priority::Critical)
        }
    }

    #[test]
    fn test_custom_strategy() {
        let classifier = Classifier::with_strategy(AlwaysSecurity);
        let c = classifier.classify(&Request::new("anything"));
        assert_eq!(
            c.selected_agents,
            ids(&[AgentRole::Orchestrator, AgentRole::Security])
        );
        assert_eq!(c.priority, Priority::Critical);
    }
}
