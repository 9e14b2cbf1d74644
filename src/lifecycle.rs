//! Request lifecycle tracking and collaboration history

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::channel::OrchestratorEvent;
use crate::classifier::Classification;
use crate::persistence::{NullSink, PersistenceSink};
use crate::types::{AgentId, CollaborationEvent, Request, RequestContext, RequestId};

/// Tracks in-flight requests and the bounded collaboration event log.
///
/// Each structure has its own lock; `end` and `sweep` both remove under the
/// same mutex, so a record is removed exactly once.
pub struct LifecycleTracker {
    active: Mutex<HashMap<RequestId, RequestContext>>,
    history: RwLock<VecDeque<CollaborationEvent>>,
    capacity: usize,
    stale_after: chrono::Duration,
    sink: Arc<dyn PersistenceSink>,
    event_tx: Option<mpsc::UnboundedSender<OrchestratorEvent>>,
}

impl LifecycleTracker {
    pub fn new(capacity: usize, stale_after: chrono::Duration) -> Self {
        Self {
            active: Mutex::new(HashMap::new()),
            history: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
            stale_after,
            sink: Arc::new(NullSink),
            event_tx: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn PersistenceSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_events(mut self, event_tx: mpsc::UnboundedSender<OrchestratorEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Start tracking a request
    pub fn begin(&self, request: &Request, classification: &Classification) -> RequestId {
        self.begin_at(request, classification, Utc::now())
    }

    pub(crate) fn begin_at(
        &self,
        request: &Request,
        classification: &Classification,
        start_time: DateTime<Utc>,
    ) -> RequestId {
        let id = RequestId::new();
        // The first specialist is the one the request is "about"; a plan
        // with only the orchestrator stays with the orchestrator.
        let assigned_agent = classification
            .selected_agents
            .get(1)
            .or_else(|| classification.selected_agents.first())
            .cloned()
            .unwrap_or_else(AgentId::synthesis);

        let context = RequestContext {
            id,
            original_text: request.text.clone(),
            assigned_agent,
            start_time,
            priority: classification.priority,
            requires_collaboration: classification.requires_collaboration,
        };
        self.active.lock().insert(id, context);
        debug!(request_id = %id, "Request started");
        id
    }

    /// Stop tracking a request; `None` if it already ended or was swept
    pub fn end(&self, id: &RequestId) -> Option<RequestContext> {
        let removed = self.active.lock().remove(id);
        debug!(request_id = %id, found = removed.is_some(), "Request ended");
        removed
    }

    /// Drop every record older than the staleness threshold
    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    pub(crate) fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let swept = {
            let mut active = self.active.lock();
            let before = active.len();
            active.retain(|_, ctx| now - ctx.start_time <= self.stale_after);
            before - active.len()
        };

        if swept > 0 {
            warn!(count = swept, "Swept stale requests");
            if let Some(tx) = &self.event_tx {
                let _ = tx.send(OrchestratorEvent::StaleRequestsSwept { count: swept });
            }
        }
        swept
    }

    pub fn get(&self, id: &RequestId) -> Option<RequestContext> {
        self.active.lock().get(id).cloned()
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    /// Append to the event log, evicting the oldest entries over capacity
    pub fn record(&self, event: CollaborationEvent) {
        if let Err(e) = self.sink.archive_event(&event) {
            warn!(error = %e, event_id = %event.id, "Failed to archive collaboration event");
        }
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(OrchestratorEvent::CollaborationRecorded {
                kind: event.kind.clone(),
                success: event.success,
            });
        }

        let mut history = self.history.write();
        history.push_back(event);
        let overflow = history.len().saturating_sub(self.capacity);
        if overflow > 0 {
            history.drain(..overflow);
            info!(dropped = overflow, "Trimmed collaboration history");
        }
    }

    /// The last `n` events, oldest first
    pub fn recent_history(&self, n: usize) -> Vec<CollaborationEvent> {
        let history = self.history.read();
        let skip = history.len().saturating_sub(n);
        history.iter().skip(skip).cloned().collect()
    }

    /// Success rate over the last `n` events, `None` when the log is empty
    pub fn success_rate(&self, n: usize) -> Option<f32> {
        let recent = self.recent_history(n);
        if recent.is_empty() {
            return None;
        }
        let successes = recent.iter().filter(|e| e.success).count();
        Some(successes as f32 / recent.len() as f32)
    }

    pub fn history_len(&self) -> usize {
        self.history.read().len()
    }

    pub fn last_event_time(&self) -> Option<DateTime<Utc>> {
        self.history.read().back().map(|e| e.timestamp)
    }
}
