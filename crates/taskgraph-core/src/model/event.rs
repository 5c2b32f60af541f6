//! Event — the append-only audit log (spec.md §5 history layer).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// One field transition captured by an update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Change {
    pub field: String,
    pub before: Value,
    pub after: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    Created,
    Updated,
    Resolved,
    AutoResolved,
    Blocked,
    Unblocked,
    EdgeAdded,
    EdgeRemoved,
    Moved,
    Merged,
    Dropped,
    Deleted,
    Claimed,
    Released,
}

impl EventAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventAction::Created => "created",
            EventAction::Updated => "updated",
            EventAction::Resolved => "resolved",
            EventAction::AutoResolved => "auto_resolved",
            EventAction::Blocked => "blocked",
            EventAction::Unblocked => "unblocked",
            EventAction::EdgeAdded => "edge_added",
            EventAction::EdgeRemoved => "edge_removed",
            EventAction::Moved => "moved",
            EventAction::Merged => "merged",
            EventAction::Dropped => "dropped",
            EventAction::Deleted => "deleted",
            EventAction::Claimed => "claimed",
            EventAction::Released => "released",
        }
    }
}

impl std::str::FromStr for EventAction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "created" => EventAction::Created,
            "updated" => EventAction::Updated,
            "resolved" => EventAction::Resolved,
            "auto_resolved" => EventAction::AutoResolved,
            "blocked" => EventAction::Blocked,
            "unblocked" => EventAction::Unblocked,
            "edge_added" => EventAction::EdgeAdded,
            "edge_removed" => EventAction::EdgeRemoved,
            "moved" => EventAction::Moved,
            "merged" => EventAction::Merged,
            "dropped" => EventAction::Dropped,
            "deleted" => EventAction::Deleted,
            "claimed" => EventAction::Claimed,
            "released" => EventAction::Released,
            _ => return Err(()),
        })
    }
}

/// `node_id`/`project` denormalize the owning node for indexed lookups;
/// `note` carries an optional free-text `decision_context` passed by the
/// caller alongside the structured `changes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub node_id: String,
    pub project: String,
    pub action: EventAction,
    pub changes: Vec<Change>,
    pub agent: String,
    pub note: Option<String>,
    pub timestamp: DateTime<Utc>,
}
