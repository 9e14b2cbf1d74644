//! Collaboration controller - self-tuning coordination policy
//!
//! Holds the process-wide [`CollaborationMode`]. The mode is written only by
//! the controller (explicit `set_mode` or its periodic tick) and read by the
//! executor on every request.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::channel::OrchestratorEvent;
use crate::config::OrchestratorConfig;
use crate::lifecycle::LifecycleTracker;
use crate::orchestrator::StatusSnapshot;
use crate::persistence::{NullSink, PersistenceSink};
use crate::registry::AgentRegistry;
use crate::types::{AgentId, AgentRole, CollaborationEvent, CollaborationMode};

/// External system-load signal in `[0, 1]`
pub trait LoadProbe: Send + Sync {
    /// Current load, `None` when unavailable
    fn load(&self) -> Option<f32>;
}

impl<F> LoadProbe for F
where
    F: Fn() -> Option<f32> + Send + Sync,
{
    fn load(&self) -> Option<f32> {
        self()
    }
}

/// Owns the collaboration mode and adjusts it from recent outcomes
pub struct CollaborationController {
    mode: RwLock<CollaborationMode>,
    tracker: Arc<LifecycleTracker>,
    registry: Arc<AgentRegistry>,
    load_probe: Option<Arc<dyn LoadProbe>>,
    sink: Arc<dyn PersistenceSink>,
    event_tx: Option<mpsc::UnboundedSender<OrchestratorEvent>>,
    running: AtomicBool,
    tick_interval: Duration,
    success_window: usize,
    success_threshold: f32,
    high_load: f32,
    low_load: f32,
}

impl CollaborationController {
    pub fn new(
        config: &OrchestratorConfig,
        tracker: Arc<LifecycleTracker>,
        registry: Arc<AgentRegistry>,
    ) -> Self {
        Self {
            mode: RwLock::new(CollaborationMode::Autonomous),
            tracker,
            registry,
            load_probe: None,
            sink: Arc::new(NullSink),
            event_tx: None,
            running: AtomicBool::new(false),
            tick_interval: config.tick_interval(),
            success_window: config.success_window,
            success_threshold: config.success_threshold,
            high_load: config.high_load_threshold,
            low_load: config.low_load_threshold,
        }
    }

    pub fn with_load_probe(mut self, probe: Arc<dyn LoadProbe>) -> Self {
        self.load_probe = Some(probe);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn PersistenceSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_events(mut self, event_tx: mpsc::UnboundedSender<OrchestratorEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    pub fn mode(&self) -> CollaborationMode {
        *self.mode.read()
    }

    /// Whether the periodic loop is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Explicitly switch mode and apply its side effects
    pub fn set_mode(&self, mode: CollaborationMode) {
        self.replace_mode(mode);
        self.apply_mode(mode);
    }

    /// Switch mode from the tick; side effects only run on a real change
    fn transition(&self, mode: CollaborationMode, reason: &str) {
        let previous = self.replace_mode(mode);
        if previous != mode {
            debug!(reason, "Mode adjusted by controller");
            self.apply_mode(mode);
        }
    }

    fn replace_mode(&self, mode: CollaborationMode) -> CollaborationMode {
        let previous = std::mem::replace(&mut *self.mode.write(), mode);
        if previous != mode {
            info!(from = ?previous, to = ?mode, "Collaboration mode changed");
            if let Some(tx) = &self.event_tx {
                let _ = tx.send(OrchestratorEvent::ModeChanged { from: previous, to: mode });
            }
            if let Err(e) = self.sink.archive_snapshot(&self.snapshot()) {
                warn!(error = %e, "Failed to archive status snapshot");
            }
        }
        previous
    }

    fn apply_mode(&self, mode: CollaborationMode) {
        match mode {
            CollaborationMode::Autonomous => {
                debug!("Autonomous mode: minimal agent coordination");
            }
            CollaborationMode::Coordinated => {
                self.initiate_collaboration();
                debug!("Coordinated mode: active agent coordination");
            }
            CollaborationMode::Unified => {
                self.initiate_collaboration();
                debug!("Unified mode: maximum agent integration");
            }
            CollaborationMode::ConflictResolution => {
                self.resolve_conflicts();
            }
        }
    }

    fn initiate_collaboration(&self) {
        let participants: Vec<AgentId> = [AgentRole::Orchestrator, AgentRole::Creative, AgentRole::Security]
            .iter()
            .map(AgentRole::id)
            .collect();
        self.tracker.record(CollaborationEvent::coordination(participants));
    }

    fn resolve_conflicts(&self) {
        // Per-request conflicts are settled by the consensus winner the
        // executor attaches to its synthesis; nothing to do globally yet.
        debug!("Conflict resolution mode: resolving agent conflicts");
    }

    /// One controller evaluation: sweep stale requests, demote on a poor
    /// success rate, otherwise follow the load signal if there is one.
    pub fn tick(&self) -> CollaborationMode {
        self.tracker.sweep();

        if let Some(rate) = self.tracker.success_rate(self.success_window) {
            if rate < self.success_threshold {
                warn!(rate, threshold = self.success_threshold, "Low collaboration success rate");
                self.transition(CollaborationMode::Autonomous, "low success rate");
                return self.mode();
            }
        }

        let load = self
            .load_probe
            .as_ref()
            .and_then(|probe| probe.load())
            .filter(|l| l.is_finite());
        if let Some(load) = load {
            if load > self.high_load {
                self.transition(CollaborationMode::Autonomous, "high system load");
            } else if load < self.low_load {
                self.transition(CollaborationMode::Unified, "low system load");
            }
        }

        self.mode()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            active: self.is_running(),
            mode: self.mode(),
            active_requests: self.tracker.active_count(),
            history_len: self.tracker.history_len(),
            registered_agents: self.registry.len(),
            last_collaboration: self.tracker.last_event_time(),
        }
    }

    /// Start the periodic tick on the current runtime
    pub fn spawn(self: &Arc<Self>) -> ControllerHandle {
        let token = CancellationToken::new();
        let controller = Arc::clone(self);
        let child = token.clone();
        // Set before spawning so callers observe it immediately
        self.running.store(true, Ordering::SeqCst);
        let handle = tokio::spawn(async move { controller.run(child).await });
        ControllerHandle {
            token,
            handle: Some(handle),
        }
    }

    #[instrument(skip(self, token))]
    async fn run(self: Arc<Self>, token: CancellationToken) {
        info!(interval_ms = self.tick_interval.as_millis() as u64, "Starting collaboration controller");

        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => {
                    let mode = self.tick();
                    debug!(mode = ?mode, "Controller tick");
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("Collaboration controller stopped");
    }
}

/// Handle to the running controller loop. Dropping it stops the loop.
pub struct ControllerHandle {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ControllerHandle {
    /// Stop the loop and wait for it to exit
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Collaboration controller task failed");
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for ControllerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
