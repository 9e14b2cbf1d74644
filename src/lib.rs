//! # Chorus
//!
//! Multi-agent request orchestration - one request, many voices.
//!
//! This crate routes a request to a set of specialised agents, runs them as
//! a cascade where each agent sees what the previous ones produced, and
//! streams the intermediate and final answers back to the caller. A
//! background controller watches how recent cascades went and tunes how
//! tightly the agents collaborate.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                            ORCHESTRATOR                              │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐               │
//! │  │  Classifier  │  │   Registry   │  │  Aggregator  │               │
//! │  └──────┬───────┘  └──────┬───────┘  └──────▲───────┘               │
//! │         │                 │                 │                        │
//! │         ▼                 ▼                 │                        │
//! │  ┌──────────────────────────────────────────┴──────┐                 │
//! │  │               Cascade Executor                   │──▶ Response    │
//! │  │   placeholder → agent 1 → agent 2 → … → synth   │    Stream      │
//! │  └──────────────┬───────────────────────▲──────────┘                 │
//! │                 │ begin/end/record      │ mode                       │
//! │                 ▼                       │                            │
//! │  ┌──────────────────────┐     ┌─────────┴────────────┐               │
//! │  │  Lifecycle Tracker   │◀────│ Collaboration        │◀── load       │
//! │  │  (active + history)  │     │ Controller (tick)    │    probe      │
//! │  └──────────┬───────────┘     └──────────────────────┘               │
//! └─────────────┼───────────────────────────────────────────────────────┘
//!               ▼
//!        Persistence sink          Event channel (telemetry)
//! ```
//!
//! ## Key Concepts
//!
//! - **Agent**: An asynchronous black box that answers a request given the
//!   cascade context so far
//! - **Cascade**: Sequential invocation of the selected agents for one request
//! - **Collaboration mode**: Global policy that widens or narrows the agent plan
//! - **Consensus**: Merge of several answers per agent, highest confidence wins

pub mod agent;
pub mod aggregate;
pub mod builtin;
pub mod channel;
pub mod classifier;
pub mod collaboration;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod orchestrator;
pub mod persistence;
pub mod pipeline;
pub mod registry;
pub mod types;

pub use agent::{Agent, AgentHandle};
pub use aggregate::{consensus, synthesize, ResponseMap};
pub use builtin::{register_builtin_agents, ConfidenceStrategy, FixedConfidence, RangeConfidence};
pub use channel::{EventChannel, OrchestratorEvent};
pub use classifier::{Classification, Classifier, KeywordScorer, ScoringStrategy, Tag};
pub use collaboration::{CollaborationController, ControllerHandle, LoadProbe};
pub use config::OrchestratorConfig;
pub use error::{OrchestratorError, Result};
pub use lifecycle::LifecycleTracker;
pub use orchestrator::{ConversationMode, Orchestrator, OrchestratorBuilder, StatusSnapshot};
pub use persistence::{JsonLinesSink, NullSink, PersistenceSink};
pub use pipeline::{CascadeExecutor, ResponseStream};
pub use registry::AgentRegistry;
pub use types::{
    AgentId, AgentRole, CascadeContext, CollaborationEvent, CollaborationMode, Priority, Request,
    RequestContext, RequestId, Response,
};
