//! Engine context for GG-DISPATCH.
//!
//! Owns the queue registry, the filter chain and the transport dispatcher.
//! All submissions go through [`Engine::submit`]: the filter chain may
//! rewrite or reroute the settings, then the request is either admitted to
//! its queue or dispatched immediately.

pub mod error;
pub mod filter;
mod registry;
pub mod transport;

use std::sync::Arc;

use tokio::runtime::Handle;

pub use error::EngineError;
pub use filter::{Condition, FilterHandle, FilterPredicate, PostFilter, PreFilter};
pub use transport::{ReplyStatus, SimulatedTransport, Transport, TransportCall, TransportReply};

use crate::config::EngineConfig;
use crate::scheduler::{Dispatcher, QueueHandle, QueueRef, QueueSettings, RequestHandle, RequestSettings};
use filter::{Filter, FilterChain};
use registry::QueueRegistry;

/// The admission and ordering engine.
pub struct Engine {
    dispatcher: Dispatcher,
    queues: QueueRegistry,
    filters: Arc<FilterChain>,
}

impl Engine {
    /// Create an engine that spawns transport calls on the current tokio
    /// runtime.
    pub fn new(transport: Arc<dyn Transport>) -> Result<Self, EngineError> {
        let runtime = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        Ok(Self::with_runtime(transport, runtime))
    }

    pub fn with_runtime(transport: Arc<dyn Transport>, runtime: Handle) -> Self {
        Self {
            dispatcher: Dispatcher::new(transport, runtime),
            queues: QueueRegistry::new(),
            filters: Arc::new(FilterChain::default()),
        }
    }

    /// Create an engine and register every queue the config declares.
    pub fn from_config(config: &EngineConfig, transport: Arc<dyn Transport>) -> Result<Self, EngineError> {
        let engine = Self::new(transport)?;
        for queue in &config.queues {
            engine.create_queue(queue.clone().into())?;
        }
        Ok(engine)
    }

    /// Register a new queue. Fails on a missing or already registered id.
    pub fn create_queue(&self, settings: QueueSettings) -> Result<QueueHandle, EngineError> {
        let QueueSettings { config, listeners, initializer } = settings;
        if config.id.is_empty() {
            return Err(EngineError::MissingQueueId);
        }
        if self.queues.contains(&config.id) {
            return Err(EngineError::DuplicateQueue(config.id));
        }
        let queue = QueueHandle::create(config, listeners, self.dispatcher.clone());
        self.queues.insert(queue.clone())?;
        tracing::info!(
            queue_id = queue.id(),
            mode = %queue.mode(),
            order = %queue.settings().order,
            priority = %queue.settings().priority,
            "queue created"
        );
        if let Some(initializer) = initializer {
            initializer(&queue);
        }
        Ok(queue)
    }

    /// Look up a registered queue.
    pub fn queue(&self, id: &str) -> Result<QueueHandle, EngineError> {
        self.queues.get(id)
    }

    /// Unregister a queue. Requests it already admitted keep running
    /// against it; the id becomes available again.
    pub fn remove_queue(&self, id: &str) -> Option<QueueHandle> {
        let removed = self.queues.remove(id);
        if removed.is_some() {
            tracing::info!(queue_id = id, "queue removed");
        }
        removed
    }

    pub fn queue_ids(&self) -> Vec<String> {
        self.queues.ids()
    }

    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }

    /// Register an admission filter. At least one of `pre`/`post` is
    /// required.
    pub fn register_filter(
        &self,
        condition: Condition,
        pre: Option<PreFilter>,
        post: Option<PostFilter>,
    ) -> Result<FilterHandle, EngineError> {
        let filter = Filter::new(condition, pre, post)?;
        Ok(self.filters.register(filter))
    }

    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    /// Submit work. With a queue reference the request is admitted to that
    /// queue; without one it is dispatched immediately.
    pub fn submit(&self, settings: RequestSettings) -> Result<RequestHandle, EngineError> {
        let active = self.filters.active_for(&settings);
        let mut settings = active.iter().fold(settings, |s, filter| filter.rewrite(s));

        let request = match settings.queue.take() {
            None => self.dispatch_unqueued(settings),
            Some(target) => {
                let queue = self.resolve(target)?;
                queue.admit(settings)
            }
        };

        for filter in &active {
            filter.observe(&request);
        }
        Ok(request)
    }

    fn resolve(&self, target: QueueRef) -> Result<QueueHandle, EngineError> {
        match target {
            QueueRef::Id(id) => self.queues.get(&id),
            QueueRef::Handle(handle) => Ok(handle),
        }
    }

    fn dispatch_unqueued(&self, settings: RequestSettings) -> RequestHandle {
        let (request, initializer) = RequestHandle::create(settings, None);
        if let Some(initializer) = initializer {
            initializer(&request);
        }
        self.dispatcher.send_unqueued(&request);
        request
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("queues", &self.queues.ids())
            .field("filters", &self.filters.len())
            .finish()
    }
}
