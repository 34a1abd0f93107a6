use std::fmt;

use chrono::{NaiveTime, Utc};
use onair_core::{ChangeScope, SlotId};
use serde::{Deserialize, Serialize};

use crate::conflict::Conflict;
use crate::error::Result;
use crate::time::TimeRange;
use crate::week::{DayOfWeek, WeekAnchor};

/// Which grid a slot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlotScope {
    /// Master schedule row, repeated every week.
    Template,
    /// Concrete occurrence in one calendar week.
    Instance { week: WeekAnchor },
}

impl SlotScope {
    pub fn week(&self) -> Option<WeekAnchor> {
        match self {
            SlotScope::Template => None,
            SlotScope::Instance { week } => Some(*week),
        }
    }
}

impl fmt::Display for SlotScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotScope::Template => write!(f, "template"),
            SlotScope::Instance { week } => write!(f, "week {week}"),
        }
    }
}

/// Display category used by the grid to colour a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayCategory {
    Recurring,
    Modified,
    OneOff,
    Prerecorded,
    Collection,
}

impl fmt::Display for DisplayCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recurring => write!(f, "recurring"),
            Self::Modified => write!(f, "modified"),
            Self::OneOff => write!(f, "one_off"),
            Self::Prerecorded => write!(f, "prerecorded"),
            Self::Collection => write!(f, "collection"),
        }
    }
}

impl std::str::FromStr for DisplayCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "recurring" => Ok(Self::Recurring),
            "modified" => Ok(Self::Modified),
            "one_off" => Ok(Self::OneOff),
            "prerecorded" => Ok(Self::Prerecorded),
            "collection" => Ok(Self::Collection),
            other => Err(format!("unknown display category: {other}")),
        }
    }
}

/// Where a slot sits in the template/instance lifecycle. Drives the scope
/// resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotKind {
    Template,
    /// Unmodified copy of a template for one week.
    Materialized { template_id: SlotId },
    /// Week-local override of a template occurrence.
    Modified { template_id: SlotId },
    /// Instance with no template behind it.
    OneOff,
}

/// One broadcast occurrence, either on the master grid or in a week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSlot {
    pub id: SlotId,
    pub scope: SlotScope,
    /// Template this instance was materialized from. `None` for templates
    /// and one-off instances.
    pub origin_id: Option<SlotId>,
    pub day: DayOfWeek,
    pub range: TimeRange,
    pub show_name: String,
    pub host_name: String,
    pub is_prerecorded: bool,
    pub is_collection: bool,
    /// Instance diverges from its template.
    pub is_modified: bool,
    /// Soft-deleted: hidden from views and conflict checks, kept for undo.
    pub is_deleted: bool,
    pub color_override: Option<DisplayCategory>,
    /// Templates only: first week in which this template no longer
    /// materializes.
    pub retired_week: Option<WeekAnchor>,
    pub created_at: String,
    pub updated_at: String,
}

impl ScheduleSlot {
    /// New master-grid row built from `draft` on `day`.
    pub fn template(draft: &SlotDraft, day: DayOfWeek) -> Self {
        Self::from_draft(draft, SlotScope::Template, day)
    }

    /// New one-off instance in `week`.
    pub fn one_off(draft: &SlotDraft, week: WeekAnchor, day: DayOfWeek) -> Self {
        Self::from_draft(draft, SlotScope::Instance { week }, day)
    }

    /// Fresh, unmodified copy of `template` for `week`.
    pub fn materialized(template: &ScheduleSlot, week: WeekAnchor) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: SlotId::new(),
            scope: SlotScope::Instance { week },
            origin_id: Some(template.id.clone()),
            day: template.day,
            range: template.range,
            show_name: template.show_name.clone(),
            host_name: template.host_name.clone(),
            is_prerecorded: template.is_prerecorded,
            is_collection: template.is_collection,
            is_modified: false,
            is_deleted: false,
            color_override: template.color_override,
            retired_week: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    fn from_draft(draft: &SlotDraft, scope: SlotScope, day: DayOfWeek) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: SlotId::new(),
            scope,
            origin_id: None,
            day,
            range: draft.range,
            show_name: draft.show_name.clone(),
            host_name: draft.host_name.clone(),
            is_prerecorded: draft.is_prerecorded,
            is_collection: draft.is_collection,
            is_modified: false,
            is_deleted: false,
            color_override: draft.color_override,
            retired_week: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn week(&self) -> Option<WeekAnchor> {
        self.scope.week()
    }

    /// Templates are the recurring rows; instances never are.
    pub fn is_recurring(&self) -> bool {
        matches!(self.scope, SlotScope::Template)
    }

    pub fn is_live(&self) -> bool {
        !self.is_deleted
    }

    pub fn kind(&self) -> SlotKind {
        match (&self.scope, &self.origin_id) {
            (SlotScope::Template, _) => SlotKind::Template,
            (SlotScope::Instance { .. }, None) => SlotKind::OneOff,
            (SlotScope::Instance { .. }, Some(origin)) if self.is_modified => SlotKind::Modified {
                template_id: origin.clone(),
            },
            (SlotScope::Instance { .. }, Some(origin)) => SlotKind::Materialized {
                template_id: origin.clone(),
            },
        }
    }

    /// Whether a template still materializes into `week`. Always false for
    /// instances.
    pub fn is_active_in(&self, week: WeekAnchor) -> bool {
        if !self.is_recurring() {
            return false;
        }
        match self.retired_week {
            Some(retired) => week < retired,
            None => !self.is_deleted,
        }
    }

    /// Explicit override first, then the most specific flag.
    pub fn display_category(&self) -> DisplayCategory {
        if let Some(category) = self.color_override {
            return category;
        }
        if self.is_prerecorded {
            return DisplayCategory::Prerecorded;
        }
        if self.is_collection {
            return DisplayCategory::Collection;
        }
        match self.kind() {
            SlotKind::Template | SlotKind::Materialized { .. } => DisplayCategory::Recurring,
            SlotKind::Modified { .. } => DisplayCategory::Modified,
            SlotKind::OneOff => DisplayCategory::OneOff,
        }
    }

    /// Human label used in conflict messages, e.g. `'Morning Show' (Sun 09:00-10:00)`.
    pub fn label(&self) -> String {
        format!("'{}' ({} {})", self.show_name, self.day, self.range)
    }
}

/// Fields supplied by an administrator when creating slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotDraft {
    pub range: TimeRange,
    pub show_name: String,
    #[serde(default)]
    pub host_name: String,
    #[serde(default)]
    pub is_prerecorded: bool,
    #[serde(default)]
    pub is_collection: bool,
    #[serde(default)]
    pub color_override: Option<DisplayCategory>,
}

impl SlotDraft {
    pub fn new(show_name: impl Into<String>, range: TimeRange) -> Self {
        Self {
            range,
            show_name: show_name.into(),
            host_name: String::new(),
            is_prerecorded: false,
            is_collection: false,
            color_override: None,
        }
    }

    pub fn hosted_by(mut self, host_name: impl Into<String>) -> Self {
        self.host_name = host_name.into();
        self
    }
}

/// Partial update. `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotPatch {
    pub day: Option<DayOfWeek>,
    pub start: Option<NaiveTime>,
    pub end: Option<NaiveTime>,
    pub show_name: Option<String>,
    pub host_name: Option<String>,
    pub is_prerecorded: Option<bool>,
    pub is_collection: Option<bool>,
    pub color_override: Option<Option<DisplayCategory>>,
    pub is_modified: Option<bool>,
    pub is_deleted: Option<bool>,
    pub retired_week: Option<Option<WeekAnchor>>,
}

impl SlotPatch {
    /// Copy every displayable field from `template`; used to refresh
    /// unmodified instances.
    pub fn from_template(template: &ScheduleSlot) -> Self {
        Self {
            day: Some(template.day),
            start: Some(template.range.start),
            end: Some(template.range.end),
            show_name: Some(template.show_name.clone()),
            host_name: Some(template.host_name.clone()),
            is_prerecorded: Some(template.is_prerecorded),
            is_collection: Some(template.is_collection),
            color_override: Some(template.color_override),
            ..Self::default()
        }
    }

    /// Only the fields an administrator edits (day, times, names, flags,
    /// colour); lifecycle flags are dropped.
    pub fn content(&self) -> Self {
        Self {
            is_modified: None,
            is_deleted: None,
            retired_week: None,
            ..self.clone()
        }
    }

    pub fn with_modified(mut self) -> Self {
        self.is_modified = Some(true);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Return `slot` with this patch applied. Validates the resulting time
    /// range; does not touch storage.
    pub fn apply(&self, slot: &ScheduleSlot) -> Result<ScheduleSlot> {
        let mut out = slot.clone();
        if let Some(day) = self.day {
            out.day = day;
        }
        out.range = TimeRange::new(
            self.start.unwrap_or(slot.range.start),
            self.end.unwrap_or(slot.range.end),
        )?;
        if let Some(ref name) = self.show_name {
            out.show_name = name.clone();
        }
        if let Some(ref host) = self.host_name {
            out.host_name = host.clone();
        }
        if let Some(v) = self.is_prerecorded {
            out.is_prerecorded = v;
        }
        if let Some(v) = self.is_collection {
            out.is_collection = v;
        }
        if let Some(v) = self.color_override {
            out.color_override = v;
        }
        if let Some(v) = self.is_modified {
            out.is_modified = v;
        }
        if let Some(v) = self.is_deleted {
            out.is_deleted = v;
        }
        if let Some(v) = self.retired_week {
            out.retired_week = v;
        }
        out.updated_at = Utc::now().to_rfc3339();
        Ok(out)
    }
}

/// Which rows a fetch covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeFilter {
    Templates,
    Week(WeekAnchor),
    /// Instances of `week` and every later week.
    WeeksFrom(WeekAnchor),
}

/// Query for [`SlotStore::fetch_slots`](crate::store::SlotStore::fetch_slots).
/// Soft-deleted rows are excluded unless `include_deleted` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotFilter {
    pub scope: ScopeFilter,
    pub day: Option<DayOfWeek>,
    pub origin_id: Option<SlotId>,
    pub include_deleted: bool,
}

impl SlotFilter {
    pub fn templates() -> Self {
        Self::new(ScopeFilter::Templates)
    }

    pub fn week(week: WeekAnchor) -> Self {
        Self::new(ScopeFilter::Week(week))
    }

    pub fn weeks_from(week: WeekAnchor) -> Self {
        Self::new(ScopeFilter::WeeksFrom(week))
    }

    /// Bucket that holds slots of `scope`.
    pub fn for_scope(scope: &SlotScope) -> Self {
        match scope {
            SlotScope::Template => Self::templates(),
            SlotScope::Instance { week } => Self::week(*week),
        }
    }

    fn new(scope: ScopeFilter) -> Self {
        Self {
            scope,
            day: None,
            origin_id: None,
            include_deleted: false,
        }
    }

    pub fn on_day(mut self, day: DayOfWeek) -> Self {
        self.day = Some(day);
        self
    }

    pub fn from_origin(mut self, origin_id: &SlotId) -> Self {
        self.origin_id = Some(origin_id.clone());
        self
    }

    pub fn with_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    /// In-memory check, mirrors the SQL the store runs.
    pub fn matches(&self, slot: &ScheduleSlot) -> bool {
        let scope_ok = match (self.scope, slot.scope) {
            (ScopeFilter::Templates, SlotScope::Template) => true,
            (ScopeFilter::Week(w), SlotScope::Instance { week }) => week == w,
            (ScopeFilter::WeeksFrom(w), SlotScope::Instance { week }) => week >= w,
            _ => false,
        };
        scope_ok
            && self.day.map_or(true, |d| slot.day == d)
            && self
                .origin_id
                .as_ref()
                .map_or(true, |o| slot.origin_id.as_ref() == Some(o))
            && (self.include_deleted || !slot.is_deleted)
    }
}

/// Outcome of a write that is gated by conflict detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotWrite<T> {
    /// The write was committed.
    Applied(T),
    /// Nothing was written; the candidate collides with `Conflict::slot`.
    Conflict(Conflict),
}

impl<T> SlotWrite<T> {
    pub fn is_conflict(&self) -> bool {
        matches!(self, SlotWrite::Conflict(_))
    }

    pub fn applied(self) -> Option<T> {
        match self {
            SlotWrite::Applied(v) => Some(v),
            SlotWrite::Conflict(_) => None,
        }
    }

    pub fn conflict(&self) -> Option<&Conflict> {
        match self {
            SlotWrite::Applied(_) => None,
            SlotWrite::Conflict(c) => Some(c),
        }
    }
}

/// Result of an edit, with the scope that was actually applied (may differ
/// from the request when the request degraded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditResult {
    pub slot: ScheduleSlot,
    pub scope: ChangeScope,
}

/// Result of a delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteResult {
    /// The soft-deleted instance, or the retired template when no instance
    /// existed for the week.
    pub slot: ScheduleSlot,
    pub scope: ChangeScope,
    /// Template retired by an all-future delete.
    pub retired_template: Option<SlotId>,
}
