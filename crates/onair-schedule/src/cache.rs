use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use onair_core::SlotId;
use tracing::debug;

use crate::error::Result;
use crate::store::SlotStore;
use crate::types::{ScheduleSlot, ScopeFilter, SlotFilter, SlotPatch, SlotScope};

/// Cache key: one entry per scope bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Bucket {
    Templates,
    Week(crate::week::WeekAnchor),
}

impl Bucket {
    fn of(scope: &SlotScope) -> Self {
        match scope {
            SlotScope::Template => Bucket::Templates,
            SlotScope::Instance { week } => Bucket::Week(*week),
        }
    }
}

/// Rows of each scope bucket, deleted ones included, as last read from
/// storage.
///
/// There is no expiry. Entries only leave through [`SlotCache::invalidate`]
/// or [`SlotCache::clear`], which every mutating adapter call triggers, so a
/// read after a committed write always sees that write.
#[derive(Debug, Default)]
pub struct SlotCache {
    entries: Mutex<HashMap<Bucket, Vec<ScheduleSlot>>>,
}

impl SlotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the bucket holding slots of `scope`.
    pub fn invalidate(&self, scope: &SlotScope) {
        self.entries().remove(&Bucket::of(scope));
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A panic while the lock was held leaves at worst a stale bucket; the
    /// map is cleared and rebuilt from storage instead of propagating.
    fn entries(&self) -> MutexGuard<'_, HashMap<Bucket, Vec<ScheduleSlot>>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            self.entries.clear_poison();
            let mut entries = poisoned.into_inner();
            entries.clear();
            entries
        })
    }

    fn get(&self, bucket: Bucket) -> Option<Vec<ScheduleSlot>> {
        self.entries().get(&bucket).cloned()
    }

    fn put(&self, bucket: Bucket, rows: Vec<ScheduleSlot>) {
        self.entries().insert(bucket, rows);
    }
}

/// [`SlotStore`] wrapper that serves bucket reads from a [`SlotCache`] and
/// invalidates the touched bucket on every write.
pub struct CachedSlotStore<'a, S> {
    inner: S,
    cache: &'a SlotCache,
}

impl<'a, S: SlotStore> CachedSlotStore<'a, S> {
    pub fn new(inner: S, cache: &'a SlotCache) -> Self {
        Self { inner, cache }
    }

    fn bucket_rows(&self, bucket: Bucket) -> Result<Vec<ScheduleSlot>> {
        if let Some(rows) = self.cache.get(bucket) {
            debug!(?bucket, "slot cache hit");
            return Ok(rows);
        }
        let filter = match bucket {
            Bucket::Templates => SlotFilter::templates(),
            Bucket::Week(week) => SlotFilter::week(week),
        }
        .with_deleted();
        let rows = self.inner.fetch_slots(&filter)?;
        self.cache.put(bucket, rows.clone());
        Ok(rows)
    }

    /// Invalidate the bucket of `id`, or everything when the row is unknown.
    fn invalidate_id(&self, id: &SlotId) -> Result<()> {
        match self.inner.get_slot(id)? {
            Some(slot) => self.cache.invalidate(&slot.scope),
            None => self.cache.clear(),
        }
        Ok(())
    }
}

impl<S: SlotStore> SlotStore for CachedSlotStore<'_, S> {
    fn fetch_slots(&self, filter: &SlotFilter) -> Result<Vec<ScheduleSlot>> {
        let bucket = match filter.scope {
            ScopeFilter::Templates => Bucket::Templates,
            ScopeFilter::Week(week) => Bucket::Week(week),
            ScopeFilter::WeeksFrom(_) => return self.inner.fetch_slots(filter),
        };
        let rows = self.bucket_rows(bucket)?;
        Ok(rows.into_iter().filter(|s| filter.matches(s)).collect())
    }

    fn get_slot(&self, id: &SlotId) -> Result<Option<ScheduleSlot>> {
        self.inner.get_slot(id)
    }

    fn insert_slot(&self, slot: &ScheduleSlot) -> Result<ScheduleSlot> {
        self.cache.invalidate(&slot.scope);
        self.inner.insert_slot(slot)
    }

    fn update_slot(&self, id: &SlotId, patch: &SlotPatch) -> Result<ScheduleSlot> {
        self.invalidate_id(id)?;
        let slot = self.inner.update_slot(id, patch)?;
        self.cache.invalidate(&slot.scope);
        Ok(slot)
    }

    fn soft_delete_slot(&self, id: &SlotId) -> Result<()> {
        self.invalidate_id(id)?;
        self.inner.soft_delete_slot(id)
    }

    fn remove_slot(&self, id: &SlotId) -> Result<()> {
        self.invalidate_id(id)?;
        self.inner.remove_slot(id)
    }
}
