//! Telemetry channel for orchestrator events
//!
//! Components hold an `UnboundedSender` and fire-and-forget; a dropped or
//! slow receiver never affects request processing.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::types::{AgentId, CollaborationMode, RequestId};

/// Operational events emitted by the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub enum OrchestratorEvent {
    AgentsSelected {
        request_id: RequestId,
        agents: Vec<AgentId>,
        requires_collaboration: bool,
    },
    AgentCompleted {
        request_id: RequestId,
        agent: AgentId,
        confidence: Option<f32>,
    },
    CascadeFinished {
        request_id: RequestId,
        confidence: Option<f32>,
    },
    CascadeFailed {
        request_id: RequestId,
        agent: AgentId,
        error: String,
    },
    CascadeCancelled {
        request_id: RequestId,
    },
    ModeChanged {
        from: CollaborationMode,
        to: CollaborationMode,
    },
    CollaborationRecorded {
        kind: String,
        success: bool,
    },
    StaleRequestsSwept {
        count: usize,
    },
}

/// Client-side receiver for orchestrator events
#[derive(Clone)]
pub struct EventChannel {
    event_rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<OrchestratorEvent>>>,
}

impl EventChannel {
    /// Create a channel, returning the client side and the sender the
    /// orchestrator components share.
    pub fn new() -> (Self, mpsc::UnboundedSender<OrchestratorEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let channel = Self {
            event_rx: Arc::new(tokio::sync::Mutex::new(event_rx)),
        };
        (channel, event_tx)
    }

    /// Try to receive an event (non-blocking)
    pub fn try_recv(&self) -> Option<OrchestratorEvent> {
        self.event_rx.try_lock().ok()?.try_recv().ok()
    }

    /// Wait for the next event; `None` once every sender is gone
    pub async fn recv(&self) -> Option<OrchestratorEvent> {
        self.event_rx.lock().await.recv().await
    }

    /// Everything currently buffered
    pub fn drain(&self) -> Vec<OrchestratorEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_creation() {
        let (channel, _tx) = EventChannel::new();
        assert!(channel.try_recv().is_none());
    }

    #[test]
    fn test_send_and_try_recv() {
        let (channel, tx) = EventChannel::new();
        tx.send(OrchestratorEvent::StaleRequestsSwept { count: 2 }).unwrap();

        assert_eq!(
            channel.try_recv(),
            Some(OrchestratorEvent::StaleRequestsSwept { count: 2 })
        );
        assert!(channel.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_recv_ends_when_senders_dropped() {
        let (channel, tx) = EventChannel::new();
        tx.send(OrchestratorEvent::ModeChanged {
            from: CollaborationMode::Autonomous,
            to: CollaborationMode::Unified,
        })
        .unwrap();
        drop(tx);

        assert!(matches!(channel.recv().await, Some(OrchestratorEvent::ModeChanged { .. })));
        assert!(channel.recv().await.is_none());
    }

    #[test]
    fn test_send_after_receiver_dropped_is_harmless() {
        let (channel, tx) = EventChannel::new();
        drop(channel);
        assert!(tx.send(OrchestratorEvent::StaleRequestsSwept { count: 1 }).is_err());
    }

    #[test]
    fn test_drain() {
        let (channel, tx) = EventChannel::new();
        for count in 0..3 {
            tx.send(OrchestratorEvent::StaleRequestsSwept { count }).unwrap();
        }
        assert_eq!(channel.drain().len(), 3);
    }
}
