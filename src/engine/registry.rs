//! Registry of named queues.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::engine::EngineError;
use crate::scheduler::QueueHandle;

/// Thread-safe id -> queue map. Ids are unique while registered.
#[derive(Default)]
pub(crate) struct QueueRegistry {
    queues: DashMap<String, QueueHandle>,
}

impl QueueRegistry {
    pub(crate) fn new() -> Self {
        Self { queues: DashMap::new() }
    }

    /// Register a queue. Fails if the id is taken.
    pub(crate) fn insert(&self, queue: QueueHandle) -> Result<(), EngineError> {
        match self.queues.entry(queue.id().to_string()) {
            Entry::Occupied(entry) => Err(EngineError::DuplicateQueue(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(queue);
                Ok(())
            }
        }
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.queues.contains_key(id)
    }

    pub(crate) fn get(&self, id: &str) -> Result<QueueHandle, EngineError> {
        if id.is_empty() {
            return Err(EngineError::MissingQueueId);
        }
        self.queues
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| EngineError::UnknownQueue(id.to_string()))
    }

    pub(crate) fn remove(&self, id: &str) -> Option<QueueHandle> {
        self.queues.remove(id).map(|(_, queue)| queue)
    }

    /// Registered ids, sorted.
    pub(crate) fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.queues.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub(crate) fn len(&self) -> usize {
        self.queues.len()
    }
}
