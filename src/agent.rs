//! Agent abstraction - an opaque request → response worker

use std::any::Any;
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;

use crate::error::{OrchestratorError, Result};
use crate::types::{AgentId, CascadeContext, Request, Response};

/// A specialised processing unit.
///
/// Agents are stateless with respect to the orchestrator; any internal state
/// is their own concern. `invoke` may take arbitrarily long and may fail with
/// any error, which the caller converts into an error response.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Unique identifier used for routing and registry lookups
    fn id(&self) -> AgentId;

    /// Declared capability tags
    fn capabilities(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    /// Produce a response for `request`, given what earlier agents did
    async fn invoke(&self, request: &Request, context: &CascadeContext) -> anyhow::Result<Response>;
}

/// Cheaply cloneable handle to a registered agent
#[derive(Clone)]
pub struct AgentHandle {
    inner: Arc<dyn Agent>,
}

impl AgentHandle {
    pub fn new(agent: impl Agent + 'static) -> Self {
        Self {
            inner: Arc::new(agent),
        }
    }

    /// Invoke the agent with errors and panics both reported as
    /// [`OrchestratorError::AgentInvocation`]
    pub async fn invoke_caught(&self, request: &Request, context: &CascadeContext) -> Result<Response> {
        let message = match AssertUnwindSafe(self.inner.invoke(request, context)).catch_unwind().await {
            Ok(Ok(response)) => return Ok(response),
            Ok(Err(e)) => format!("{e:#}"),
            Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
        };
        Err(OrchestratorError::AgentInvocation {
            agent: self.inner.id(),
            message,
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

impl std::ops::Deref for AgentHandle {
    type Target = dyn Agent;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl std::fmt::Debug for AgentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentHandle").field("id", &self.inner.id()).finish()
    }
}

/// Small agents used by tests across the crate
#[cfg(test)]
pub(crate) mod test_agents {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::types::CascadeContext;

    /// Always answers with fixed content and confidence; counts invocations
    /// and remembers the last context it saw.
    pub struct FixedAgent {
        pub id: AgentId,
        pub content: String,
        pub confidence: Option<f32>,
        pub calls: Arc<AtomicUsize>,
        pub last_context: Arc<parking_lot::Mutex<Option<CascadeContext>>>,
    }

    impl FixedAgent {
        pub fn new(id: impl Into<AgentId>, content: &str, confidence: f32) -> Self {
            Self {
                id: id.into(),
                content: content.into(),
                confidence: Some(confidence),
                calls: Arc::new(AtomicUsize::new(0)),
                last_context: Arc::new(parking_lot::Mutex::new(None)),
            }
        }
    }

    #[async_trait]
    impl Agent for FixedAgent {
        fn id(&self) -> AgentId {
            self.id.clone()
        }

        fn capabilities(&self) -> BTreeSet<String> {
            ["fixed".to_string()].into()
        }

        async fn invoke(&self, _request: &Request, context: &CascadeContext) -> anyhow::Result<Response> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_context.lock() = Some(context.clone());
            let mut response = Response::unscored(self.id.clone(), self.content.clone());
            response.confidence = self.confidence;
            Ok(response)
        }
    }

    /// Always fails
    pub struct FailingAgent {
        pub id: AgentId,
        pub calls: Arc<AtomicUsize>,
    }

    impl FailingAgent {
        pub fn new(id: impl Into<AgentId>) -> Self {
            Self {
                id: id.into(),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl Agent for FailingAgent {
        fn id(&self) -> AgentId {
            self.id.clone()
        }

        async fn invoke(&self, _request: &Request, _context: &CascadeContext) -> anyhow::Result<Response> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("{} exploded", self.id)
        }
    }

    /// Sleeps before answering
    pub struct SlowAgent {
        pub id: AgentId,
        pub delay: Duration,
    }

    #[async_trait]
    impl Agent for SlowAgent {
        fn id(&self) -> AgentId {
            self.id.clone()
        }

        async fn invoke(&self, _request: &Request, _context: &CascadeContext) -> anyhow::Result<Response> {
            tokio::time::sleep(self.delay).await;
            Ok(Response::new(self.id.clone(), "slow", 0.5))
        }
    }

    /// Panics while answering
    pub struct PanickingAgent {
        pub id: AgentId,
    }

    #[async_trait]
    impl Agent for PanickingAgent {
        fn id(&self) -> AgentId {
            self.id.clone()
        }

        async fn invoke(&self, _request: &Request, _context: &CascadeContext) -> anyhow::Result<Response> {
            let answers: Vec<Response> = Vec::new();
            Ok(answers[3].clone())
        }
    }
}
