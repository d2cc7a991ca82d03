//! Append-only audit log
//!
//! Every state change to a split rule, split result or adjustment is
//! captured as an immutable [`AuditEvent`] with before/after values. The
//! log is kept in timestamp order and is never edited; corrections are new
//! events that reference the original entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use core_kernel::AuditEventId;
use crate::error::RevenueError;

/// The kind of entity an event documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    SplitRule,
    /// Applied adjustments are recorded here, keyed by the split they amend
    SplitResult,
    /// Adjustment requests handled outside the ledger, such as an approval
    /// workflow that turns one down before it is applied
    Adjustment,
}

/// What happened to the entity
///
/// The engine itself emits `Created`, `Updated`, `Adjusted` and `Approved`.
/// `Corrected` and `Rejected` are recorded by callers that amend or turn
/// down a request through [`AuditRecorder::record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    Updated,
    Adjusted,
    Corrected,
    Approved,
    Rejected,
}

/// A single field's before/after values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    /// None when the field did not exist before (creation)
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

impl FieldChange {
    /// A field that moved from one value to another
    pub fn new(field: impl Into<String>, old_value: Value, new_value: Value) -> Self {
        Self {
            field: field.into(),
            old_value: Some(old_value),
            new_value: Some(new_value),
        }
    }

    /// A field set for the first time
    pub fn set(field: impl Into<String>, new_value: Value) -> Self {
        Self {
            field: field.into(),
            old_value: None,
            new_value: Some(new_value),
        }
    }
}

/// An immutable record of one state-changing operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: AuditEventId,
    /// Position in the log, assigned on record
    pub sequence: u64,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub action: AuditAction,
    pub actor: String,
    pub changes: Vec<FieldChange>,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    /// Creates an event with no changes attached yet
    pub fn new(
        entity_type: EntityType,
        entity_id: impl Into<Uuid>,
        action: AuditAction,
        actor: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AuditEventId::new_v7(),
            sequence: 0,
            entity_type,
            entity_id: entity_id.into(),
            action,
            actor: actor.into(),
            changes: Vec::new(),
            timestamp,
        }
    }

    pub fn with_change(mut self, change: FieldChange) -> Self {
        self.changes.push(change);
        self
    }

    pub fn with_changes(mut self, changes: impl IntoIterator<Item = FieldChange>) -> Self {
        self.changes.extend(changes);
        self
    }

    /// Looks up the change recorded for a field
    pub fn change(&self, field: &str) -> Option<&FieldChange> {
        self.changes.iter().find(|c| c.field == field)
    }
}

/// Filter for reading the audit log
///
/// Unset criteria match everything. The date range is half-open
/// `[from, to)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditQuery {
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<Uuid>,
    pub action: Option<AuditAction>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl AuditQuery {
    /// A query matching every event
    pub fn all() -> Self {
        Self::default()
    }

    pub fn entity_type(mut self, entity_type: EntityType) -> Self {
        self.entity_type = Some(entity_type);
        self
    }

    pub fn entity(mut self, entity_id: impl Into<Uuid>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn action(mut self, action: AuditAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn matches(&self, event: &AuditEvent) -> bool {
        self.entity_type.map_or(true, |t| event.entity_type == t)
            && self.entity_id.map_or(true, |id| event.entity_id == id)
            && self.action.map_or(true, |a| event.action == a)
            && self.from.map_or(true, |from| event.timestamp >= from)
            && self.to.map_or(true, |to| event.timestamp < to)
    }
}

/// The append-only event log
#[derive(Debug, Default)]
pub struct AuditRecorder {
    events: Vec<AuditEvent>,
}

impl AuditRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event to the log
    ///
    /// The event receives the next sequence number. Events may share a
    /// timestamp but never go back in time.
    ///
    /// # Errors
    ///
    /// Returns `AuditOutOfOrder` if the event is older than the last one
    /// recorded. Nothing is appended in that case.
    pub fn record(&mut self, mut event: AuditEvent) -> Result<&AuditEvent, RevenueError> {
        if let Some(last) = self.last_timestamp() {
            if event.timestamp < last {
                return Err(RevenueError::AuditOutOfOrder {
                    last,
                    attempted: event.timestamp,
                });
            }
        }

        event.sequence = self.events.len() as u64 + 1;
        debug!(
            sequence = event.sequence,
            entity_type = ?event.entity_type,
            entity_id = %event.entity_id,
            action = ?event.action,
            actor = %event.actor,
            "Audit event recorded"
        );
        self.events.push(event);

        let index = self.events.len() - 1;
        Ok(&self.events[index])
    }

    /// Returns the matching events in timestamp order
    ///
    /// The iterator is lazy and can be cloned to restart from the beginning.
    pub fn query(&self, query: &AuditQuery) -> impl Iterator<Item = &AuditEvent> + Clone + '_ {
        let lower = query
            .from
            .map_or(0, |from| self.events.partition_point(|e| e.timestamp < from));
        let upper = query
            .to
            .map_or(self.events.len(), |to| self.events.partition_point(|e| e.timestamp < to))
            .max(lower);
        let query = query.clone();

        self.events[lower..upper]
            .iter()
            .filter(move |event| query.matches(event))
    }

    /// All events in the order they were recorded
    pub fn events(&self) -> &[AuditEvent] {
        &self.events
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.events.last().map(|e| e.timestamp)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
