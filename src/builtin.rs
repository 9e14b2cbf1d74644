//! Rule-based agents for every built-in role
//!
//! These make the orchestrator usable without external agents. Their
//! heuristics are intentionally shallow; anything that produces a score
//! goes through a [`ConfidenceStrategy`] so it can be swapped for a model.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::agent::Agent;
use crate::classifier::{Classifier, Text, EMOTIONAL_KEYWORDS, SECURITY_KEYWORDS, TECHNICAL_KEYWORDS};
use crate::registry::AgentRegistry;
use crate::types::{AgentId, AgentRole, CascadeContext, Request, Response};

/// Produces a score for a piece of request text.
///
/// Implementations must return a finite value in `[0, 1]` and should be
/// deterministic for a given text.
pub trait ConfidenceStrategy: Send + Sync {
    fn confidence(&self, text: &str) -> f32;
}

/// Always the same value
#[derive(Debug, Clone, Copy)]
pub struct FixedConfidence(pub f32);

impl ConfidenceStrategy for FixedConfidence {
    fn confidence(&self, _text: &str) -> f32 {
        self.0.clamp(0.0, 1.0)
    }
}

/// Spreads texts over `[lo, hi]` using a stable hash of the text
#[derive(Debug, Clone, Copy)]
pub struct RangeConfidence {
    lo: f32,
    hi: f32,
}

impl RangeConfidence {
    pub fn new(lo: f32, hi: f32) -> Self {
        let lo = lo.clamp(0.0, 1.0);
        let hi = hi.clamp(0.0, 1.0);
        Self {
            lo: lo.min(hi),
            hi: lo.max(hi),
        }
    }
}

impl ConfidenceStrategy for RangeConfidence {
    fn confidence(&self, text: &str) -> f32 {
        // FNV-1a, stable across platforms and releases
        let hash = text
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325u64, |h, b| (h ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3));
        let unit = (hash % 10_001) as f32 / 10_000.0;
        (self.lo + unit * (self.hi - self.lo)).clamp(self.lo, self.hi)
    }
}

fn capabilities(tags: &[&str]) -> BTreeSet<String> {
    tags.iter().map(|t| t.to_string()).collect()
}

fn percent(value: f32) -> String {
    format!("{:.0}%", value * 100.0)
}

// === Orchestrator ===

/// Reports the request category and priority
pub struct OrchestratorAgent {
    classifier: Classifier,
}

impl OrchestratorAgent {
    pub fn new() -> Self {
        Self {
            classifier: Classifier::new(),
        }
    }
}

impl Default for OrchestratorAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for OrchestratorAgent {
    fn id(&self) -> AgentId {
        AgentRole::Orchestrator.id()
    }

    fn capabilities(&self) -> BTreeSet<String> {
        capabilities(&["orchestration", "classification", "synthesis"])
    }

    async fn invoke(&self, request: &Request, context: &CascadeContext) -> anyhow::Result<Response> {
        let category = self.classifier.classify(request).category();
        let content = format!(
            "Orchestrator analysis\n\nRequest category: {}\nProcessing priority: {}\n\nCoordinating the cascade.",
            category.label(),
            context.priority
        );
        Ok(Response::new(self.id(), content, 0.95))
    }
}

// === Empathy ===

/// Emotional tone and an empathy score used as the confidence
#[derive(Debug, Default, Clone, Copy)]
pub struct EmpathyAgent;

impl EmpathyAgent {
    fn tone(text: &Text) -> &'static str {
        if text.mentions_any(&["happy", "joy", "great", "awesome", "love"]) {
            "Positive"
        } else if text.mentions_any(&["sad", "angry", "hate", "terrible", "awful"]) {
            "Negative"
        } else if text.mentions_any(&["question", "help", "please", "confused"]) {
            "Seeking"
        } else {
            "Neutral"
        }
    }

    pub fn empathy_score(raw: &str) -> f32 {
        let text = Text::new(raw);
        let mut score = 0.5;
        if text.mentions_any(&["please", "help", "thank"]) {
            score += 0.2;
        }
        if text.mentions_any(EMOTIONAL_KEYWORDS) {
            score += 0.2;
        }
        if raw.chars().count() > 50 {
            score += 0.1;
        }
        f32::clamp(score, 0.0, 1.0)
    }

    fn recommendation(score: f32) -> &'static str {
        if score > 0.8 {
            "High empathy, compassionate response"
        } else if score > 0.6 {
            "Moderate empathy, supportive tone"
        } else {
            "Standard response, factual focus"
        }
    }
}

#[async_trait]
impl Agent for EmpathyAgent {
    fn id(&self) -> AgentId {
        AgentRole::Empathy.id()
    }

    fn capabilities(&self) -> BTreeSet<String> {
        capabilities(&["empathy", "emotional_tone"])
    }

    async fn invoke(&self, request: &Request, _context: &CascadeContext) -> anyhow::Result<Response> {
        let text = Text::new(&request.text);
        let score = Self::empathy_score(&request.text);
        let content = format!(
            "Empathy analysis\n\nEmotional tone: {}\nEmpathy score: {:.1}%\nRecommended approach: {}",
            Self::tone(&text),
            score * 100.0,
            Self::recommendation(score)
        );
        Ok(Response::new(self.id(), content, score))
    }
}

// === Security ===

/// Risk and protection levels from security wording
#[derive(Debug, Default, Clone, Copy)]
pub struct SecurityAgent;

impl SecurityAgent {
    fn risk(text: &Text) -> &'static str {
        if text.mentions_any(&["hack", "attack", "breach", "exploit"]) {
            "High"
        } else if text.mentions_any(SECURITY_KEYWORDS) {
            "Medium"
        } else {
            "Low"
        }
    }

    fn protection(text: &Text) -> &'static str {
        if text.mentions("critical") {
            "Maximum"
        } else if text.mentions_any(SECURITY_KEYWORDS) {
            "Enhanced"
        } else {
            "Standard"
        }
    }
}

#[async_trait]
impl Agent for SecurityAgent {
    fn id(&self) -> AgentId {
        AgentRole::Security.id()
    }

    fn capabilities(&self) -> BTreeSet<String> {
        capabilities(&["security", "threat_assessment"])
    }

    async fn invoke(&self, request: &Request, _context: &CascadeContext) -> anyhow::Result<Response> {
        let text = Text::new(&request.text);
        let content = format!(
            "Security analysis\n\nRisk level: {}\nProtection level: {}",
            Self::risk(&text),
            Self::protection(&text)
        );
        Ok(Response::new(self.id(), content, 0.88))
    }
}

// === Integration ===

/// Sizes the request and scores how much prior work it can build on
#[derive(Debug, Default, Clone, Copy)]
pub struct IntegrationAgent;

impl IntegrationAgent {
    fn complexity(words: usize) -> &'static str {
        match words {
            w if w > 20 => "High",
            w if w > 10 => "Medium",
            _ => "Low",
        }
    }

    fn layers(words: usize) -> usize {
        (words / 5 + 2).min(6)
    }

    fn integration_score(prior: usize) -> usize {
        (prior * 20 + 60).min(100)
    }
}

#[async_trait]
impl Agent for IntegrationAgent {
    fn id(&self) -> AgentId {
        AgentRole::Integration.id()
    }

    fn capabilities(&self) -> BTreeSet<String> {
        capabilities(&["integration", "multi_layer"])
    }

    async fn invoke(&self, request: &Request, context: &CascadeContext) -> anyhow::Result<Response> {
        let words = Text::new(&request.text).word_count();
        let content = format!(
            "Integration analysis\n\nComplexity level: {}\nProcessing layers: {}\nIntegration score: {}%",
            Self::complexity(words),
            Self::layers(words),
            Self::integration_score(context.prior_result_count)
        );
        Ok(Response::new(self.id(), content, 0.92))
    }
}

// === Pattern analysis ===

/// Surfaces recurring signals in the request
pub struct PatternAnalysisAgent {
    prediction: Arc<dyn ConfidenceStrategy>,
}

impl PatternAnalysisAgent {
    pub fn new() -> Self {
        Self::with_strategy(Arc::new(RangeConfidence::new(0.6, 0.9)))
    }

    pub fn with_strategy(prediction: Arc<dyn ConfidenceStrategy>) -> Self {
        Self { prediction }
    }

    fn patterns(text: &Text) -> Vec<&'static str> {
        let mut found = Vec::new();
        if text.contains("?") {
            found.push("inquiry");
        }
        if text.mentions_any(EMOTIONAL_KEYWORDS) {
            found.push("emotional");
        }
        if text.mentions_any(SECURITY_KEYWORDS) {
            found.push("security");
        }
        if text.mentions_any(TECHNICAL_KEYWORDS) {
            found.push("technical");
        }
        found
    }
}

impl Default for PatternAnalysisAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for PatternAnalysisAgent {
    fn id(&self) -> AgentId {
        AgentRole::PatternAnalysis.id()
    }

    fn capabilities(&self) -> BTreeSet<String> {
        capabilities(&["pattern_detection", "prediction"])
    }

    async fn invoke(&self, request: &Request, context: &CascadeContext) -> anyhow::Result<Response> {
        let text = Text::new(&request.text);
        let patterns = Self::patterns(&text);
        let patterns = if patterns.is_empty() {
            "none".to_string()
        } else {
            patterns.join(", ")
        };
        let insights = match context.prior_result_count {
            0 => "first perspective on this request".to_string(),
            n => format!("builds on {n} earlier perspectives"),
        };
        let content = format!(
            "Pattern analysis\n\nDetected patterns: {patterns}\nInsights: {insights}\nPrediction confidence: {}",
            percent(self.prediction.confidence(&request.text))
        );
        Ok(Response::new(self.id(), content, 0.85))
    }
}

// === Creative ===

/// Creative intent; generation potential is the confidence
pub struct CreativeAgent {
    potential: Arc<dyn ConfidenceStrategy>,
}

impl CreativeAgent {
    pub fn new() -> Self {
        Self::with_strategy(Arc::new(RangeConfidence::new(0.7, 0.95)))
    }

    pub fn with_strategy(potential: Arc<dyn ConfidenceStrategy>) -> Self {
        Self { potential }
    }
}

impl Default for CreativeAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for CreativeAgent {
    fn id(&self) -> AgentId {
        AgentRole::Creative.id()
    }

    fn capabilities(&self) -> BTreeSet<String> {
        capabilities(&["creative", "design", "generation"])
    }

    async fn invoke(&self, request: &Request, _context: &CascadeContext) -> anyhow::Result<Response> {
        let text = Text::new(&request.text);
        let level = if text.mentions_any(&["create", "build", "make", "design"]) {
            "High"
        } else {
            "Medium"
        };
        let potential = self.potential.confidence(&request.text);
        let content = format!(
            "Creative analysis\n\nCreativity level: {level}\nGeneration potential: {}",
            percent(potential)
        );
        Ok(Response::new(self.id(), content, potential))
    }
}

// === Technical ===

/// Technical complexity and an implementation score
pub struct TechnicalAgent {
    implementation: Arc<dyn ConfidenceStrategy>,
}

impl TechnicalAgent {
    pub fn new() -> Self {
        Self::with_strategy(Arc::new(RangeConfidence::new(0.8, 0.98)))
    }

    pub fn with_strategy(implementation: Arc<dyn ConfidenceStrategy>) -> Self {
        Self { implementation }
    }
}

impl Default for TechnicalAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for TechnicalAgent {
    fn id(&self) -> AgentId {
        AgentRole::Technical.id()
    }

    fn capabilities(&self) -> BTreeSet<String> {
        capabilities(&["technical", "implementation"])
    }

    async fn invoke(&self, request: &Request, _context: &CascadeContext) -> anyhow::Result<Response> {
        let text = Text::new(&request.text);
        let complexity = if text.mentions_any(TECHNICAL_KEYWORDS) {
            "Advanced"
        } else {
            "Standard"
        };
        let content = format!(
            "Technical analysis\n\nTechnical complexity: {complexity}\nImplementation score: {}",
            percent(self.implementation.confidence(&request.text))
        );
        Ok(Response::new(self.id(), content, 0.93))
    }
}

// === Default ===

/// Placeholder for the default role; never does any work
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAgent;

#[async_trait]
impl Agent for NoopAgent {
    fn id(&self) -> AgentId {
        AgentRole::Default.id()
    }

    async fn invoke(&self, _request: &Request, _context: &CascadeContext) -> anyhow::Result<Response> {
        Ok(Response::new(self.id(), "Default agent does not process requests.", 1.0))
    }
}

/// Install one agent per built-in role, replacing any already registered
pub fn register_builtin_agents(registry: &AgentRegistry) {
    registry.register(OrchestratorAgent::new());
    registry.register(EmpathyAgent);
    registry.register(SecurityAgent);
    registry.register(IntegrationAgent);
    registry.register(PatternAnalysisAgent::new());
    registry.register(CreativeAgent::new());
    registry.register(TechnicalAgent::new());
    registry.register(NoopAgent);
}
