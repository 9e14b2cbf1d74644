//! Cascade pipeline executor
//!
//! Runs the selected agents one after another and streams a placeholder,
//! one progress response per agent, and a terminal synthesis (or error /
//! cancellation marker). Nothing runs until the stream is polled.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::{self, BoxStream, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::aggregate;
use crate::channel::OrchestratorEvent;
use crate::classifier::Classifier;
use crate::collaboration::CollaborationController;
use crate::error::OrchestratorError;
use crate::lifecycle::LifecycleTracker;
use crate::registry::AgentRegistry;
use crate::types::{
    meta, AgentId, CascadeContext, CollaborationEvent, CollaborationMode, Priority, Request, RequestId,
    Response,
};

/// Builds cascades over shared orchestrator state
#[derive(Clone)]
pub struct CascadeExecutor {
    registry: Arc<AgentRegistry>,
    classifier: Arc<Classifier>,
    tracker: Arc<LifecycleTracker>,
    controller: Arc<CollaborationController>,
    event_tx: Option<mpsc::UnboundedSender<OrchestratorEvent>>,
    placeholder_confidence: f32,
}

impl CascadeExecutor {
    pub fn new(
        registry: Arc<AgentRegistry>,
        classifier: Arc<Classifier>,
        tracker: Arc<LifecycleTracker>,
        controller: Arc<CollaborationController>,
        placeholder_confidence: f32,
    ) -> Self {
        Self {
            registry,
            classifier,
            tracker,
            controller,
            event_tx: None,
            placeholder_confidence,
        }
    }

    pub fn with_events(mut self, event_tx: mpsc::UnboundedSender<OrchestratorEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Classify the request under the current mode and cascade through the
    /// selected agents
    pub fn execute(&self, request: Request) -> ResponseStream {
        self.stream(request, Plan::Classify)
    }

    /// Cascade through an explicit agent list, skipping classification of
    /// the agent set
    pub fn execute_with(&self, request: Request, agents: Vec<AgentId>) -> ResponseStream {
        self.stream(request, Plan::Fixed(agents))
    }

    fn stream(&self, request: Request, plan: Plan) -> ResponseStream {
        let token = CancellationToken::new();
        let cascade = Cascade {
            executor: self.clone(),
            request,
            plan: Some(plan),
            token: token.clone(),
            stage: Stage::Placeholder,
            run: None,
        };

        let inner = stream::unfold(cascade, |mut cascade| async move {
            let response = cascade.next().await?;
            Some((response, cascade))
        })
        .boxed();

        ResponseStream { inner, token }
    }

    fn emit(&self, event: OrchestratorEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }
}

/// Lazy, ordered, single-use sequence of responses for one request
pub struct ResponseStream {
    inner: BoxStream<'static, Response>,
    token: CancellationToken,
}

impl ResponseStream {
    /// Stop scheduling agents; the next item is a terminal "cancelled"
    /// response
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Token that cancels this cascade from elsewhere
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Stream for ResponseStream {
    type Item = Response;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Response>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl std::fmt::Debug for ResponseStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseStream")
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

enum Plan {
    Classify,
    Fixed(Vec<AgentId>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Placeholder,
    Select,
    Running,
    Finished,
}

/// Per-request state once agents have been selected
struct Run {
    request_id: RequestId,
    agents: Vec<AgentId>,
    priority: Priority,
    mode: CollaborationMode,
    results: Vec<Response>,
}

struct Cascade {
    executor: CascadeExecutor,
    request: Request,
    plan: Option<Plan>,
    token: CancellationToken,
    stage: Stage,
    run: Option<Run>,
}

impl Cascade {
    async fn next(&mut self) -> Option<Response> {
        loop {
            if self.stage == Stage::Finished {
                return None;
            }
            if self.token.is_cancelled() {
                return Some(self.cancelled());
            }

            match self.stage {
                Stage::Placeholder => {
                    self.stage = Stage::Select;
                    return Some(
                        Response::new(
                            AgentId::synthesis(),
                            "Processing request...",
                            self.executor.placeholder_confidence,
                        )
                        .with_metadata(meta::STATUS, meta::STATUS_PROCESSING),
                    );
                }
                Stage::Select => {
                    self.select();
                    self.stage = Stage::Running;
                }
                Stage::Running => return Some(self.step().await),
                Stage::Finished => return None,
            }
        }
    }

    fn select(&mut self) {
        let executor = &self.executor;
        let mode = executor.controller.mode();
        let classification = match self.plan.take().unwrap_or(Plan::Classify) {
            Plan::Classify => executor.classifier.classify(&self.request).adjusted_for(mode),
            Plan::Fixed(agents) => {
                let mut classification = executor.classifier.classify(&self.request);
                classification.selected_agents = agents;
                classification
            }
        };

        let request_id = executor.tracker.begin(&self.request, &classification);
        info!(
            request_id = %request_id,
            agents = ?classification.selected_agents,
            requires_collaboration = classification.requires_collaboration,
            mode = ?mode,
            "Agents selected"
        );
        executor.emit(OrchestratorEvent::AgentsSelected {
            request_id,
            agents: classification.selected_agents.clone(),
            requires_collaboration: classification.requires_collaboration,
        });

        self.run = Some(Run {
            request_id,
            agents: classification.selected_agents,
            priority: classification.priority,
            mode,
            results: Vec::new(),
        });
    }

    /// Invoke the next agent, or synthesize once every agent has answered
    async fn step(&mut self) -> Response {
        let request = &self.request;
        let next = self.run.as_ref().and_then(|run| {
            let index = run.results.len();
            let agent_id = run.agents.get(index).cloned()?;
            let context = CascadeContext::from_results(request, run.priority, &run.results);
            Some((run.request_id, agent_id, context, index, run.agents.len()))
        });
        let Some((request_id, agent_id, context, index, total)) = next else {
            return self.finish();
        };

        let handle = match self.executor.registry.get(&agent_id) {
            Ok(handle) => handle,
            Err(e) => return self.fail(agent_id, e.to_string()),
        };

        debug!(request_id = %request_id, agent = %agent_id, step = index + 1, total, "Invoking agent");
        let outcome = tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            result = handle.invoke_caught(&self.request, &context) => Some(result),
        };

        match outcome {
            None => self.cancelled(),
            Some(Err(e)) => self.fail(agent_id, e.to_string()),
            Some(Ok(response)) => {
                self.executor.emit(OrchestratorEvent::AgentCompleted {
                    request_id,
                    agent: agent_id.clone(),
                    confidence: response.confidence,
                });
                let progress = response
                    .clone()
                    .with_metadata(meta::STATUS, meta::STATUS_PROGRESS)
                    .with_metadata(
                        meta::PROGRESS,
                        format!("Agent {agent_id} processing... ({}/{total})", index + 1),
                    )
                    .with_metadata(meta::REQUEST_ID, request_id.to_string());
                if let Some(run) = self.run.as_mut() {
                    run.results.push(response);
                }
                progress
            }
        }
    }

    fn finish(&mut self) -> Response {
        self.stage = Stage::Finished;
        let Some(run) = self.run.take() else {
            return aggregate::synthesize(&self.request, &[]);
        };

        let mut synthesis = aggregate::synthesize(&self.request, &run.results)
            .with_metadata(meta::REQUEST_ID, run.request_id.to_string());
        if run.mode == CollaborationMode::ConflictResolution {
            if let Some(winner) = aggregate::best_of(&run.results) {
                synthesis = synthesis.with_metadata(meta::CONSENSUS_WINNER, winner.agent.as_str());
            }
        }

        let tracker = &self.executor.tracker;
        tracker.end(&run.request_id);
        tracker.record(CollaborationEvent::request_processing(run.agents, true));
        self.executor.emit(OrchestratorEvent::CascadeFinished {
            request_id: run.request_id,
            confidence: synthesis.confidence,
        });
        info!(request_id = %run.request_id, agents = run.results.len(), "Cascade finished");
        synthesis
    }

    fn fail(&mut self, agent: AgentId, message: String) -> Response {
        self.stage = Stage::Finished;
        error!(agent = %agent, error = %message, "Cascade aborted");

        let mut response = Response::new(
            AgentId::synthesis(),
            format!("Error processing request: {message}"),
            0.0,
        )
        .with_metadata(meta::STATUS, meta::STATUS_ERROR)
        .with_metadata(meta::ERROR, message.clone());

        if let Some(run) = self.run.take() {
            let tracker = &self.executor.tracker;
            tracker.end(&run.request_id);
            tracker.record(CollaborationEvent::request_processing(run.agents, false));
            self.executor.emit(OrchestratorEvent::CascadeFailed {
                request_id: run.request_id,
                agent,
                error: message,
            });
            response = response.with_metadata(meta::REQUEST_ID, run.request_id.to_string());
        }
        response
    }

    fn cancelled(&mut self) -> Response {
        self.stage = Stage::Finished;
        let mut response = Response::new(AgentId::synthesis(), OrchestratorError::Cancelled.to_string(), 0.0)
            .with_metadata(meta::STATUS, meta::STATUS_CANCELLED);

        if let Some(run) = self.run.take() {
            self.executor.tracker.end(&run.request_id);
            self.executor.emit(OrchestratorEvent::CascadeCancelled {
                request_id: run.request_id,
            });
            info!(request_id = %run.request_id, completed = run.results.len(), "Cascade cancelled");
            response = response.with_metadata(meta::REQUEST_ID, run.request_id.to_string());
        }
        response
    }
}

impl Drop for Cascade {
    fn drop(&mut self) {
        // Abandoned mid-run: release the lifecycle record now instead of
        // waiting for the sweep.
        if let Some(run) = self.run.take() {
            self.executor.tracker.end(&run.request_id);
            debug!(request_id = %run.request_id, "Cascade dropped before completion");
        }
    }
}
