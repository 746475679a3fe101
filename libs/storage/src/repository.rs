//! Event and signal persistence boundary
//!
//! Stands in for the relational store. Inserts are unique per [`RuleKey`]:
//! a second insert for the same key fails with `Duplicate` instead of adding
//! a row.

use crate::error::PersistenceError;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use types::{Event, PartitionKey, RuleKey, Signal};

#[async_trait]
pub trait SignalRepository: Send + Sync {
    async fn has_event(&self, key: &RuleKey) -> Result<bool, PersistenceError>;

    async fn insert_event(&self, event: Event) -> Result<(), PersistenceError>;

    async fn insert_signal(&self, signal: Signal) -> Result<(), PersistenceError>;

    async fn events(&self, partition: &PartitionKey) -> Result<Vec<Event>, PersistenceError>;

    async fn signals(&self, partition: &PartitionKey) -> Result<Vec<Signal>, PersistenceError>;
}

#[derive(Default)]
pub struct MemorySignalRepository {
    events: DashMap<RuleKey, Event>,
    signals: DashMap<RuleKey, Signal>,
    offline: AtomicBool,
    /// Rule names whose writes fail, for fault injection
    failing_rules: Mutex<HashSet<String>>,
}

impl MemorySignalRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.offline.store(!available, Ordering::SeqCst);
    }

    pub fn fail_rule(&self, name: impl Into<String>) {
        self.failing_rules.lock().insert(name.into());
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn signal_count(&self) -> usize {
        self.signals.len()
    }

    fn check(&self, key: &RuleKey) -> Result<(), PersistenceError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable {
                key: key.clone(),
                reason: "repository offline".to_string(),
            });
        }
        if self.failing_rules.lock().contains(&key.name) {
            return Err(PersistenceError::Unavailable {
                key: key.clone(),
                reason: "injected write failure".to_string(),
            });
        }
        Ok(())
    }
}

fn sorted<T>(mut rows: Vec<(RuleKey, T)>) -> Vec<T> {
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    rows.into_iter().map(|(_, row)| row).collect()
}

#[async_trait]
impl SignalRepository for MemorySignalRepository {
    async fn has_event(&self, key: &RuleKey) -> Result<bool, PersistenceError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable {
                key: key.clone(),
                reason: "repository offline".to_string(),
            });
        }
        Ok(self.events.contains_key(key))
    }

    async fn insert_event(&self, event: Event) -> Result<(), PersistenceError> {
        let key = event.key();
        self.check(&key)?;
        match self.events.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(PersistenceError::Duplicate(key)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(event);
                Ok(())
            }
        }
    }

    async fn insert_signal(&self, signal: Signal) -> Result<(), PersistenceError> {
        let key = signal.key();
        self.check(&key)?;
        match self.signals.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(PersistenceError::Duplicate(key)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(signal);
                Ok(())
            }
        }
    }

    async fn events(&self, partition: &PartitionKey) -> Result<Vec<Event>, PersistenceError> {
        let rows = self
            .events
            .iter()
            .filter(|row| &row.key().partition == partition)
            .map(|row| (row.key().clone(), row.value().clone()))
            .collect();
        Ok(sorted(rows))
    }

    async fn signals(&self, partition: &PartitionKey) -> Result<Vec<Signal>, PersistenceError> {
        let rows = self
            .signals
            .iter()
            .filter(|row| &row.key().partition == partition)
            .map(|row| (row.key().clone(), row.value().clone()))
            .collect();
        Ok(sorted(rows))
    }
}
