use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::specialist::SpecialistId;

/// Board column of a remote task, as this core understands it.
///
/// Valid moves: Backlog -> Active -> Done, and Active -> Backlog when the
/// caller explicitly asks for a reversion. Nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnState {
    Backlog,
    Active,
    Done,
}

impl ColumnState {
    pub const ALL: &[ColumnState] = &[ColumnState::Backlog, ColumnState::Active, ColumnState::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnState::Backlog => "backlog",
            ColumnState::Active => "active",
            ColumnState::Done => "done",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ColumnState::Backlog => "Backlog",
            ColumnState::Active => "Active",
            ColumnState::Done => "Done",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "backlog" => Some(ColumnState::Backlog),
            "active" => Some(ColumnState::Active),
            "done" => Some(ColumnState::Done),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, target: ColumnState, allow_revert: bool) -> bool {
        match (self, target) {
            (ColumnState::Backlog, ColumnState::Active) => true,
            (ColumnState::Active, ColumnState::Done) => true,
            (ColumnState::Active, ColumnState::Backlog) => allow_revert,
            _ => false,
        }
    }
}

impl fmt::Display for ColumnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Cached projection of a task living in the external backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTaskRef {
    pub external_id: String,
    pub column_state: ColumnState,
    pub owner_specialist_id: Option<SpecialistId>,
    pub synced_at: DateTime<Utc>,
}
