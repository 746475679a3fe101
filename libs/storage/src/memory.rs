//! In-process ordered store

use crate::backend::{Order, OrderedStore, ScoreRange, WriteOp};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

type OrderedSet = BTreeMap<i64, String>;

/// `BTreeMap` per key behind one lock. Pipelines run under the write lock,
/// which makes them atomic.
///
/// Availability can be toggled to exercise outage handling.
pub struct MemoryStore {
    sets: RwLock<HashMap<String, OrderedSet>>,
    available: AtomicBool,
    read_only: AtomicBool,
    /// Calls still to fail before the store recovers on its own
    failures_left: AtomicU32,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            sets: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            read_only: AtomicBool::new(false),
            failures_left: AtomicU32::new(0),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Reject writes while reads keep working.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Fail the next `calls` operations with `Unavailable`.
    pub fn fail_next(&self, calls: u32) {
        self.failures_left.store(calls, Ordering::SeqCst);
    }

    pub fn len(&self, key: &str) -> usize {
        self.sets.read().get(key).map(|set| set.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, key: &str) -> bool {
        self.len(key) == 0
    }

    fn check(&self) -> StoreResult<()> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".to_string()));
        }
        let transient = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if transient {
            return Err(StoreError::Unavailable("injected transient failure".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> StoreResult<()> {
        self.check()?;
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is read-only".to_string()));
        }
        Ok(())
    }

    fn apply(sets: &mut HashMap<String, OrderedSet>, op: WriteOp) {
        match op {
            WriteOp::Upsert { key, score, member } => {
                sets.entry(key).or_default().insert(score, member);
            }
            WriteOp::DeleteRange { key, range } => {
                delete_in(sets, &key, range);
            }
        }
    }
}

fn delete_in(sets: &mut HashMap<String, OrderedSet>, key: &str, range: ScoreRange) -> usize {
    if range.is_empty() {
        return 0;
    }
    let Some(set) = sets.get_mut(key) else {
        return 0;
    };
    let doomed: Vec<i64> = set.range(range.min..=range.max).map(|(score, _)| *score).collect();
    for score in &doomed {
        set.remove(score);
    }
    if set.is_empty() {
        sets.remove(key);
    }
    doomed.len()
}

#[async_trait]
impl OrderedStore for MemoryStore {
    async fn upsert(&self, key: &str, score: i64, member: String) -> StoreResult<()> {
        self.check_write()?;
        self.sets
            .write()
            .entry(key.to_string())
            .or_default()
            .insert(score, member);
        Ok(())
    }

    async fn range(
        &self,
        key: &str,
        range: ScoreRange,
        order: Order,
        limit: Option<usize>,
    ) -> StoreResult<Vec<(i64, String)>> {
        self.check()?;
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let sets = self.sets.read();
        let Some(set) = sets.get(key) else {
            return Ok(Vec::new());
        };

        let limit = limit.unwrap_or(usize::MAX);
        let entries = set.range(range.min..=range.max);
        let collected = match order {
            Order::Ascending => entries.take(limit).map(|(s, m)| (*s, m.clone())).collect(),
            Order::Descending => entries.rev().take(limit).map(|(s, m)| (*s, m.clone())).collect(),
        };
        Ok(collected)
    }

    async fn delete_range(&self, key: &str, range: ScoreRange) -> StoreResult<usize> {
        self.check_write()?;
        Ok(delete_in(&mut self.sets.write(), key, range))
    }

    async fn execute(&self, ops: Vec<WriteOp>) -> StoreResult<()> {
        self.check_write()?;
        let mut sets = self.sets.write();
        for op in ops {
            Self::apply(&mut sets, op);
        }
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.check()?;
        let mut keys: Vec<String> = self
            .sets
            .read()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}
