use std::sync::Mutex;

use chrono::{Local, NaiveDate, Weekday};
use onair_core::{ChangeScope, SlotId};
use rusqlite::Connection;
use tracing::instrument;

use crate::cache::{CachedSlotStore, SlotCache};
use crate::conflict::{self, Conflict};
use crate::db::init_db;
use crate::error::{Result, ScheduleError};
use crate::materialize::{materialize_week, resync_week};
use crate::resolver;
use crate::store::{require_slot, SlotStore};
use crate::time::TimeRange;
use crate::types::{
    DeleteResult, EditResult, ScheduleSlot, SlotDraft, SlotFilter, SlotPatch, SlotScope, SlotWrite,
};
use crate::week::{DayOfWeek, WeekAnchor};

/// Entry point for everything the dashboard does with the broadcast grid.
///
/// Each public call is one SQLite transaction: either every row it touches
/// commits, or none does. Reads go through a [`SlotCache`] that the same
/// calls invalidate synchronously, and which is dropped wholesale when a
/// transaction fails.
pub struct ScheduleEngine {
    db: Mutex<Connection>,
    cache: SlotCache,
    week_start: Weekday,
}

impl ScheduleEngine {
    /// Wrap `conn`, creating the schema if needed.
    pub fn new(conn: Connection, week_start: Weekday) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
            cache: SlotCache::new(),
            week_start,
        })
    }

    pub fn week_start(&self) -> Weekday {
        self.week_start
    }

    pub fn week_of(&self, date: NaiveDate) -> WeekAnchor {
        WeekAnchor::containing(date, self.week_start)
    }

    pub fn current_week(&self) -> WeekAnchor {
        self.week_of(Local::now().date_naive())
    }

    /// Live instances of `week`, materializing templates first.
    #[instrument(skip(self), fields(%week))]
    pub fn week_view(&self, week: WeekAnchor) -> Result<Vec<ScheduleSlot>> {
        self.transact(|store| Ok(materialize_week(store, week)?.slots))
    }

    /// Live master-grid rows.
    pub fn templates(&self) -> Result<Vec<ScheduleSlot>> {
        self.transact(|store| store.fetch_slots(&SlotFilter::templates()))
    }

    pub fn slot(&self, id: &SlotId) -> Result<ScheduleSlot> {
        self.transact(|store| require_slot(store, id))
    }

    /// Conflict check without writing anything.
    pub fn has_conflict(
        &self,
        scope: &SlotScope,
        day: DayOfWeek,
        range: &TimeRange,
        exclude: Option<&SlotId>,
    ) -> Result<Option<Conflict>> {
        self.transact(|store| {
            if let SlotScope::Instance { week } = scope {
                materialize_week(store, *week)?;
            }
            conflict::has_conflict(store, scope, day, range, exclude)
        })
    }

    /// Create `draft` on every day in `days`; all or nothing.
    #[instrument(skip(self, draft), fields(show = %draft.show_name, %target))]
    pub fn create_slots(
        &self,
        draft: &SlotDraft,
        days: &[DayOfWeek],
        target: &SlotScope,
    ) -> Result<SlotWrite<Vec<ScheduleSlot>>> {
        self.transact(|store| resolver::create_slots(store, draft, days, target))
    }

    /// Edit any slot. For templates the current calendar week is left as is.
    #[instrument(skip(self, patch))]
    pub fn edit_slot(
        &self,
        id: &SlotId,
        patch: &SlotPatch,
        scope: ChangeScope,
    ) -> Result<SlotWrite<EditResult>> {
        let today = self.current_week();
        self.transact(|store| {
            let slot = require_slot(store, id)?;
            let as_of = slot.week().unwrap_or(today);
            resolver::apply_edit(store, &slot, patch, scope, as_of)
        })
    }

    /// Edit a template directly. Unmodified instances after `as_of`
    /// regenerate from the new values.
    #[instrument(skip(self, patch), fields(%as_of))]
    pub fn edit_template(
        &self,
        id: &SlotId,
        patch: &SlotPatch,
        as_of: WeekAnchor,
    ) -> Result<SlotWrite<EditResult>> {
        self.transact(|store| {
            let template = require_template(store, id)?;
            resolver::apply_edit(store, &template, patch, ChangeScope::AllFuture, as_of)
        })
    }

    #[instrument(skip(self))]
    pub fn delete_slot(&self, id: &SlotId, scope: ChangeScope) -> Result<DeleteResult> {
        let today = self.current_week();
        self.transact(|store| {
            let slot = require_slot(store, id)?;
            let as_of = slot.week().unwrap_or(today);
            resolver::apply_delete(store, &slot, scope, as_of)
        })
    }

    /// Retire a template from `as_of` on. Earlier weeks keep it.
    #[instrument(skip(self), fields(%as_of))]
    pub fn delete_template(&self, id: &SlotId, as_of: WeekAnchor) -> Result<DeleteResult> {
        self.transact(|store| {
            let template = require_template(store, id)?;
            resolver::apply_delete(store, &template, ChangeScope::AllFuture, as_of)
        })
    }

    #[instrument(skip(self))]
    pub fn restore_slot(&self, id: &SlotId) -> Result<SlotWrite<ScheduleSlot>> {
        self.transact(|store| {
            let slot = require_slot(store, id)?;
            resolver::restore(store, &slot)
        })
    }

    /// Refresh unmodified instances of `week` from the current templates.
    #[instrument(skip(self), fields(%week))]
    pub fn resync_week(&self, week: WeekAnchor) -> Result<usize> {
        self.transact(|store| resync_week(store, week))
    }

    /// Run `f` inside one transaction. Any error rolls back and empties the
    /// cache, which may hold rows read after an uncommitted write.
    fn transact<T>(
        &self,
        f: impl FnOnce(&CachedSlotStore<'_, &Connection>) -> Result<T>,
    ) -> Result<T> {
        let mut conn = self.db.lock().unwrap();
        let tx = conn.transaction()?;
        let outcome = {
            let store = CachedSlotStore::new(&*tx, &self.cache);
            f(&store)
        };
        let committed = outcome.and_then(|value| {
            tx.commit()?;
            Ok(value)
        });
        if committed.is_err() {
            self.cache.clear();
        }
        committed
    }
}

fn require_template<S: SlotStore + ?Sized>(store: &S, id: &SlotId) -> Result<ScheduleSlot> {
    let slot = require_slot(store, id)?;
    if !slot.is_recurring() {
        return Err(ScheduleError::NotATemplate { id: id.to_string() });
    }
    Ok(slot)
}
