//! Core data types shared by every component

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a registered agent
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Id used for responses the orchestrator produces itself
    /// (placeholder, synthesis, error and cancellation markers).
    pub fn synthesis() -> Self {
        Self::new("cascade")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<AgentRole> for AgentId {
    fn from(role: AgentRole) -> Self {
        role.id()
    }
}

/// The fixed set of specialised roles known to the classifier.
///
/// Declaration order is the cascade execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Orchestrator,
    Empathy,
    Security,
    Integration,
    Creative,
    PatternAnalysis,
    Technical,
    Default,
}

impl AgentRole {
    pub const ALL: [AgentRole; 8] = [
        AgentRole::Orchestrator,
        AgentRole::Empathy,
        AgentRole::Security,
        AgentRole::Integration,
        AgentRole::Creative,
        AgentRole::PatternAnalysis,
        AgentRole::Technical,
        AgentRole::Default,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Orchestrator => "orchestrator",
            AgentRole::Empathy => "empathy",
            AgentRole::Security => "security",
            AgentRole::Integration => "integration",
            AgentRole::Creative => "creative",
            AgentRole::PatternAnalysis => "pattern_analysis",
            AgentRole::Technical => "technical",
            AgentRole::Default => "default",
        }
    }

    pub fn id(&self) -> AgentId {
        AgentId::new(self.as_str())
    }

    pub fn from_id(id: &AgentId) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.as_str() == id.as_str())
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
            Priority::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// An incoming request. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl Request {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            priority: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Metadata keys the orchestrator sets on the responses it yields
pub mod meta {
    pub const STATUS: &str = "status";
    pub const PROGRESS: &str = "progress";
    pub const ERROR: &str = "error";
    pub const CONSENSUS_WINNER: &str = "consensus_winner";
    pub const REQUEST_ID: &str = "request_id";

    pub const STATUS_PROCESSING: &str = "processing";
    pub const STATUS_PROGRESS: &str = "progress";
    pub const STATUS_FINAL: &str = "final";
    pub const STATUS_ERROR: &str = "error";
    pub const STATUS_CANCELLED: &str = "cancelled";
}

/// A single agent's answer, or a marker produced by the orchestrator.
///
/// `confidence` is nominally in `[0, 1]` but may be absent, NaN or out of
/// range; consumers normalise instead of failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub agent: AgentId,
    pub content: String,
    #[serde(default)]
    pub confidence: Option<f32>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl Response {
    pub fn new(agent: impl Into<AgentId>, content: impl Into<String>, confidence: f32) -> Self {
        Self {
            agent: agent.into(),
            content: content.into(),
            confidence: Some(confidence),
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// A response whose producer did not report a confidence
    pub fn unscored(agent: impl Into<AgentId>, content: impl Into<String>) -> Self {
        Self {
            confidence: None,
            ..Self::new(agent, content, 0.0)
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn status(&self) -> Option<&str> {
        self.metadata.get(meta::STATUS).map(String::as_str)
    }
}

/// Summary of prior results handed to the next agent in a cascade.
///
/// Built fresh from the completed responses before every invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeContext {
    pub original_request: String,
    pub prior_agents: Vec<AgentId>,
    pub prior_result_count: usize,
    pub priority: Priority,
}

impl CascadeContext {
    pub fn from_results(request: &Request, priority: Priority, results: &[Response]) -> Self {
        Self {
            original_request: request.text.clone(),
            prior_agents: results.iter().map(|r| r.agent.clone()).collect(),
            prior_result_count: results.len(),
            priority,
        }
    }

    /// Context for the first agent of a cascade
    pub fn initial(request: &Request, priority: Priority) -> Self {
        Self::from_results(request, priority, &[])
    }
}

/// Unique identifier for an in-flight request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle record of a request that entered the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    pub id: RequestId,
    pub original_text: String,
    pub assigned_agent: AgentId,
    pub start_time: DateTime<Utc>,
    pub priority: Priority,
    pub requires_collaboration: bool,
}

/// How aggressively agents are made to coordinate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollaborationMode {
    /// Agents work independently
    #[default]
    Autonomous,
    /// Agents share context and coordinate responses
    Coordinated,
    /// Agents work as a single unit
    Unified,
    /// Resolving conflicts between agents
    ConflictResolution,
}

/// Append-only log entry describing a cascade or collaboration action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollaborationEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub participants: Vec<AgentId>,
    #[serde(rename = "type")]
    pub kind: String,
    pub outcome: String,
    pub success: bool,
}

impl CollaborationEvent {
    pub const REQUEST_PROCESSING: &'static str = "request_processing";
    pub const COORDINATION: &'static str = "coordination";

    /// Event recorded when a cascade finishes, successfully or not
    pub fn request_processing(participants: Vec<AgentId>, success: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            participants,
            kind: Self::REQUEST_PROCESSING.into(),
            outcome: if success { "success" } else { "failure" }.into(),
            success,
        }
    }

    /// Synthetic event emitted when the controller starts a coordination round
    pub fn coordination(participants: Vec<AgentId>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            participants,
            kind: Self::COORDINATION.into(),
            outcome: "collaboration_initiated".into(),
            success: true,
        }
    }
}
