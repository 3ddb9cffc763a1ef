//! Where events are persisted.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{AstroCronError, AstroCronResult};
use crate::event::Event;

/// Persistence for event records, keyed by event id.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn get(&self, id: &str) -> AstroCronResult<Option<Event>>;

    /// Insert or replace.
    async fn save(&self, id: &str, event: &Event) -> AstroCronResult<()>;

    /// Fails with [`AstroCronError::EventNotFound`] when nothing is stored under `id`.
    async fn delete(&self, id: &str) -> AstroCronResult<()>;
}

/// Store that keeps events in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    events: RwLock<BTreeMap<String, Event>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: impl IntoIterator<Item = Event>) -> Self {
        MemoryStore {
            events: RwLock::new(events.into_iter().map(|e| (e.id.clone(), e)).collect()),
        }
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn get(&self, id: &str) -> AstroCronResult<Option<Event>> {
        Ok(self.events.read().await.get(id).cloned())
    }

    async fn save(&self, id: &str, event: &Event) -> AstroCronResult<()> {
        self.events
            .write()
            .await
            .insert(id.to_string(), event.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> AstroCronResult<()> {
        self.events
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| AstroCronError::EventNotFound(id.to_string()))
    }
}
