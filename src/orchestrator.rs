//! Main orchestrator - wires the registry, classifier, tracker, controller
//! and executor around shared state

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::aggregate::{self, ResponseMap};
use crate::channel::{EventChannel, OrchestratorEvent};
use crate::classifier::Classifier;
use crate::collaboration::{CollaborationController, ControllerHandle, LoadProbe};
use crate::config::OrchestratorConfig;
use crate::error::Result;
use crate::lifecycle::LifecycleTracker;
use crate::persistence::{NullSink, PersistenceSink};
use crate::pipeline::{CascadeExecutor, ResponseStream};
use crate::registry::AgentRegistry;
use crate::types::{meta, AgentId, CascadeContext, CollaborationEvent, CollaborationMode, Request, Response};

/// Point-in-time view of the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Whether the collaboration controller loop is running
    pub active: bool,
    pub mode: CollaborationMode,
    pub active_requests: usize,
    pub history_len: usize,
    pub registered_agents: usize,
    pub last_collaboration: Option<DateTime<Utc>>,
}

/// How agents take turns in a participation round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationMode {
    /// One after another, each seeing the answers given so far
    #[default]
    TurnOrder,
    /// All at once on the same context
    FreeForm,
}

/// Builder for an [`Orchestrator`] with non-default collaborators
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    sink: Arc<dyn PersistenceSink>,
    load_probe: Option<Arc<dyn LoadProbe>>,
    event_tx: Option<mpsc::UnboundedSender<OrchestratorEvent>>,
    classifier: Classifier,
}

impl OrchestratorBuilder {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            sink: Arc::new(NullSink),
            load_probe: None,
            event_tx: None,
            classifier: Classifier::new(),
        }
    }

    pub fn sink(mut self, sink: Arc<dyn PersistenceSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn load_probe(mut self, probe: Arc<dyn LoadProbe>) -> Self {
        self.load_probe = Some(probe);
        self
    }

    pub fn events(mut self, event_tx: mpsc::UnboundedSender<OrchestratorEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    pub fn classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn build(self) -> Result<Orchestrator> {
        self.config.validate()?;
        let config = self.config;

        let registry = Arc::new(AgentRegistry::new());
        let classifier = Arc::new(self.classifier);

        let mut tracker = LifecycleTracker::new(config.history_capacity, config.stale_after())
            .with_sink(Arc::clone(&self.sink));
        if let Some(tx) = &self.event_tx {
            tracker = tracker.with_events(tx.clone());
        }
        let tracker = Arc::new(tracker);

        let mut controller = CollaborationController::new(&config, Arc::clone(&tracker), Arc::clone(&registry))
            .with_sink(self.sink);
        if let Some(probe) = self.load_probe {
            controller = controller.with_load_probe(probe);
        }
        if let Some(tx) = &self.event_tx {
            controller = controller.with_events(tx.clone());
        }
        let controller = Arc::new(controller);

        let mut executor = CascadeExecutor::new(
            Arc::clone(&registry),
            Arc::clone(&classifier),
            Arc::clone(&tracker),
            Arc::clone(&controller),
            config.placeholder_confidence,
        );
        if let Some(tx) = self.event_tx {
            executor = executor.with_events(tx);
        }

        info!(tick_interval_ms = config.tick_interval_ms, "Orchestrator configured");
        Ok(Orchestrator {
            config,
            registry,
            classifier,
            tracker,
            controller,
            executor,
        })
    }
}

/// The orchestrator
///
/// Routes requests through agent cascades and keeps the collaboration
/// policy tuned. All components share state through `Arc`s; several
/// orchestrators can live in one process.
pub struct Orchestrator {
    config: OrchestratorConfig,
    registry: Arc<AgentRegistry>,
    classifier: Arc<Classifier>,
    tracker: Arc<LifecycleTracker>,
    controller: Arc<CollaborationController>,
    executor: CascadeExecutor,
}

impl Orchestrator {
    /// Create an orchestrator with no persistence, load probe or telemetry
    pub fn new(config: OrchestratorConfig) -> Result<Self> {
        OrchestratorBuilder::new(config).build()
    }

    /// Create an orchestrator and return a channel for its events
    pub fn with_channel(config: OrchestratorConfig) -> Result<(Self, EventChannel)> {
        let (channel, event_tx) = EventChannel::new();
        let orchestrator = OrchestratorBuilder::new(config).events(event_tx).build()?;
        Ok((orchestrator, channel))
    }

    pub fn builder(config: OrchestratorConfig) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config)
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn mode(&self) -> CollaborationMode {
        self.controller.mode()
    }

    pub fn set_mode(&self, mode: CollaborationMode) {
        self.controller.set_mode(mode);
    }

    /// Route a request through its agent cascade.
    ///
    /// The returned stream is lazy: nothing runs until it is polled.
    pub fn process(&self, request: Request) -> ResponseStream {
        self.executor.execute(request)
    }

    /// Start the collaboration controller loop on the current runtime
    pub fn start(&self) -> ControllerHandle {
        self.controller.spawn()
    }

    /// Run one controller evaluation now
    pub fn tick(&self) -> CollaborationMode {
        self.controller.tick()
    }

    /// Ask several agents for an answer to the same request.
    ///
    /// A failing or unknown agent never aborts the round; its entry is an
    /// error response with confidence 0.0.
    pub async fn participate(&self, request: &Request, agents: &[AgentId], mode: ConversationMode) -> ResponseMap {
        let priority = self.classifier.classify(request).priority;
        debug!(agents = ?agents, mode = ?mode, "Starting participation round");

        let responses = match mode {
            ConversationMode::TurnOrder => {
                let mut answered: Vec<Response> = Vec::with_capacity(agents.len());
                for agent in agents {
                    let context = CascadeContext::from_results(request, priority, &answered);
                    answered.push(self.ask(agent, request, &context).await);
                }
                answered
            }
            ConversationMode::FreeForm => {
                let context = CascadeContext::initial(request, priority);
                join_all(agents.iter().map(|agent| self.ask(agent, request, &context))).await
            }
        };

        let failures = responses.iter().filter(|r| r.metadata.contains_key(meta::ERROR)).count();
        self.tracker.record(CollaborationEvent::request_processing(agents.to_vec(), failures == 0));
        info!(agents = agents.len(), failures, "Participation round finished");

        agents.iter().cloned().zip(responses).collect()
    }

    async fn ask(&self, agent: &AgentId, request: &Request, context: &CascadeContext) -> Response {
        let result = match self.registry.get(agent) {
            Ok(handle) => handle.invoke_caught(request, context).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(response) => response,
            Err(e) => {
                let message = e.to_string();
                warn!(agent = %agent, error = %message, "Agent failed during participation");
                Response::new(agent.clone(), format!("Error: {message}"), 0.0).with_metadata(meta::ERROR, message)
            }
        }
    }

    /// Let the selected agents answer side by side and merge the answers
    pub async fn collaborate(&self, request: &Request) -> Response {
        let classification = self.classifier.classify(request).adjusted_for(self.mode());
        let round = self
            .participate(request, &classification.selected_agents, ConversationMode::FreeForm)
            .await;

        let responses: Vec<Response> = classification
            .selected_agents
            .iter()
            .filter_map(|agent| round.get(agent).cloned())
            .collect();
        aggregate::synthesize_collaborative(&classification, &responses)
    }

    pub fn status(&self) -> StatusSnapshot {
        self.controller.snapshot()
    }

    /// The last `n` collaboration events, oldest first
    pub fn recent_history(&self, n: usize) -> Vec<CollaborationEvent> {
        self.tracker.recent_history(n)
    }

    /// Drop in-flight records older than the staleness threshold
    pub fn sweep(&self) -> usize {
        self.tracker.sweep()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::test_agents::*;
    use crate::builtin::register_builtin_agents;
    use crate::persistence::JsonLinesSink;
    use crate::types::AgentRole;
    use futures::StreamExt;
    use std::time::Duration;

    fn orchestrator() -> Orchestrator {
        let orchestrator = Orchestrator::new(OrchestratorConfig::default()).unwrap();
        register_builtin_agents(orchestrator.registry());
        orchestrator
    }

    fn ids(names: &[&str]) -> Vec<AgentId> {
        names.iter().map(|n| AgentId::new(*n)).collect()
    }

    // === Construction Tests ===

    #[test]
    fn test_invalid_config_rejected() {
        let config = OrchestratorConfig {
            low_load_threshold: 0.9,
            high_load_threshold: 0.5,
            ..Default::default()
        };
        assert!(Orchestrator::new(config).is_err());
    }

    #[test]
    fn test_initial_status() {
        let orchestrator = orchestrator();
        let status = orchestrator.status();

        assert!(!status.active);
        assert_eq!(status.mode, CollaborationMode::Autonomous);
        assert_eq!(status.active_requests, 0);
        assert_eq!(status.history_len, 0);
        assert_eq!(status.registered_agents, 8);
        assert!(status.last_collaboration.is_none());
    }

    // === Process Tests ===

    #[tokio::test]
    async fn test_process_scared_about_breach() {
        let orchestrator = orchestrator();
        let responses: Vec<_> = orchestrator
            .process(Request::new("I feel scared about this security breach, can you help?"))
            .collect()
            .await;

        assert_eq!(responses.len(), 5);
        assert_eq!(responses[0].status(), Some(meta::STATUS_PROCESSING));
        let agents: Vec<_> = responses[1..4].iter().map(|r| r.agent.clone()).collect();
        assert_eq!(
            agents,
            vec![AgentRole::Orchestrator.id(), AgentRole::Empathy.id(), AgentRole::Security.id()]
        );
        assert!(responses[1].content.contains("Emotional/Personal"));
        assert!(responses[1].content.contains("MEDIUM"));
        assert!(responses[3].content.contains("Risk level: High"));

        let last = &responses[4];
        assert_eq!(last.status(), Some(meta::STATUS_FINAL));
        assert!(last.content.contains("Agents consulted: 3"));

        let status = orchestrator.status();
        assert_eq!(status.history_len, 1);
        assert_eq!(status.active_requests, 0);
        assert!(orchestrator.recent_history(20)[0].success);
    }

    #[tokio::test]
    async fn test_process_emits_events() {
        let (orchestrator, channel) = Orchestrator::with_channel(OrchestratorConfig::default()).unwrap();
        register_builtin_agents(orchestrator.registry());

        let _: Vec<_> = orchestrator.process(Request::new("hello")).collect().await;

        let events = channel.drain();
        assert!(matches!(events.first(), Some(OrchestratorEvent::AgentsSelected { .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, OrchestratorEvent::CollaborationRecorded { success: true, .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, OrchestratorEvent::CascadeFinished { .. })));
    }

    #[tokio::test]
    async fn test_persistence_sink_receives_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let sink = Arc::new(JsonLinesSink::open(&path).unwrap());
        let orchestrator = Orchestrator::builder(OrchestratorConfig::default())
            .sink(sink)
            .build()
            .unwrap();
        register_builtin_agents(orchestrator.registry());

        let _: Vec<_> = orchestrator.process(Request::new("hello")).collect().await;
        orchestrator.set_mode(CollaborationMode::ConflictResolution);

        let raw = std::fs::read_to_string(&path).unwrap();
        let records: Vec<serde_json::Value> = raw.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["record"], "event");
        assert_eq!(records[1]["record"], "snapshot");
        assert_eq!(records[1]["mode"], "CONFLICT_RESOLUTION");
    }

    // === Participation Tests ===

    #[tokio::test]
    async fn test_turn_order_shares_prior_answers() {
        let orchestrator = Orchestrator::new(OrchestratorConfig::default()).unwrap();
        let first = FixedAgent::new("a", "x", 0.6);
        let second = FixedAgent::new("b", "y", 0.7);
        let (first_seen, second_seen) = (Arc::clone(&first.last_context), Arc::clone(&second.last_context));
        orchestrator.registry().register(first);
        orchestrator.registry().register(second);

        let round = orchestrator
            .participate(&Request::new("go"), &ids(&["a", "b"]), ConversationMode::TurnOrder)
            .await;

        assert_eq!(round.len(), 2);
        assert_eq!(first_seen.lock().as_ref().unwrap().prior_result_count, 0);
        assert_eq!(second_seen.lock().as_ref().unwrap().prior_agents, ids(&["a"]));
    }

    #[tokio::test]
    async fn test_free_form_isolates_failures() {
        let orchestrator = Orchestrator::new(OrchestratorConfig::default()).unwrap();
        let second = FixedAgent::new("b", "y", 0.7);
        let second_seen = Arc::clone(&second.last_context);
        orchestrator.registry().register(FailingAgent::new("a"));
        orchestrator.registry().register(second);

        let round = orchestrator
            .participate(&Request::new("go"), &ids(&["a", "b", "ghost"]), ConversationMode::FreeForm)
            .await;

        let failed = &round[&AgentId::new("a")];
        assert_eq!(failed.confidence, Some(0.0));
        assert_eq!(failed.content, "Error: Agent a failed: a exploded");
        assert!(failed.metadata.contains_key(meta::ERROR));

        assert_eq!(round[&AgentId::new("b")].content, "y");
        assert_eq!(second_seen.lock().as_ref().unwrap().prior_result_count, 0);

        assert!(round[&AgentId::new("ghost")].content.contains("Agent not found"));
        assert!(!orchestrator.recent_history(1)[0].success);
    }

    #[tokio::test]
    async fn test_panicking_agent_isolated_in_round() {
        let orchestrator = Orchestrator::new(OrchestratorConfig::default()).unwrap();
        orchestrator.registry().register(PanickingAgent { id: AgentId::new("boom") });
        orchestrator.registry().register(FixedAgent::new("b", "y", 0.7));

        for mode in [ConversationMode::TurnOrder, ConversationMode::FreeForm] {
            let round = orchestrator
                .participate(&Request::new("go"), &ids(&["boom", "b"]), mode)
                .await;

            let failed = &round[&AgentId::new("boom")];
            assert_eq!(failed.confidence, Some(0.0));
            assert!(failed.content.starts_with("Error: Agent boom failed: panicked"), "{}", failed.content);
            assert_eq!(round[&AgentId::new("b")].content, "y");
            assert!(!orchestrator.recent_history(1)[0].success);
        }
    }

    #[tokio::test]
    async fn test_rounds_feed_consensus() {
        let orchestrator = Orchestrator::new(OrchestratorConfig::default()).unwrap();
        orchestrator.registry().register(FixedAgent::new("a", "low", 0.3));
        let request = Request::new("go");
        let first = orchestrator.participate(&request, &ids(&["a"]), ConversationMode::FreeForm).await;

        orchestrator.registry().register(FixedAgent::new("a", "high", 0.9));
        let second = orchestrator.participate(&request, &ids(&["a"]), ConversationMode::FreeForm).await;

        let merged = aggregate::consensus(&[first, second]);
        assert_eq!(merged[&AgentId::new("a")].content, "high");
    }

    #[tokio::test]
    async fn test_collaborate_security_and_creative() {
        let orchestrator = orchestrator();
        let response = orchestrator.collaborate(&Request::new("design a secure login page")).await;

        assert_eq!(response.agent, AgentId::synthesis());
        assert!(response
            .content
            .starts_with("Based on both security and creative considerations: Collaborative response:"));
    }

    // === Controller Tests ===

    #[tokio::test(start_paused = true)]
    async fn test_start_and_stop_controller() {
        let config = OrchestratorConfig {
            tick_interval_ms: 50,
            ..Default::default()
        };
        let orchestrator = Orchestrator::with_channel(config).unwrap().0;
        register_builtin_agents(orchestrator.registry());

        let handle = orchestrator.start();
        assert!(orchestrator.status().active);

        // cascades keep working while the loop runs
        let responses: Vec<_> = orchestrator.process(Request::new("hello")).collect().await;
        assert_eq!(responses.last().unwrap().status(), Some(meta::STATUS_FINAL));

        tokio::time::sleep(Duration::from_millis(120)).await;
        handle.stop().await;
        assert!(!orchestrator.status().active);
    }

    #[test]
    fn test_manual_tick_demotes() {
        let orchestrator = orchestrator();
        orchestrator.set_mode(CollaborationMode::Unified);
        for success in [true, true, true, false, false, false, false, false, false, false] {
            orchestrator
                .tracker
                .record(CollaborationEvent::request_processing(vec![], success));
        }
        assert_eq!(orchestrator.tick(), CollaborationMode::Autonomous);
    }

    #[test]
    fn test_status_serializes() {
        let json = serde_json::to_value(orchestrator().status()).unwrap();
        assert_eq!(json["mode"], "AUTONOMOUS");
        assert_eq!(json["registered_agents"], 8);
    }
}
