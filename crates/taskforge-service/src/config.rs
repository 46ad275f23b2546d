use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use taskforge_core::remote::ColumnState;
use taskforge_core::specialist::SpecialistId;
use taskforge_core::TaskforgeError;

/// Backend identifiers this deployment maps onto, loaded once at startup.
///
/// ```json
/// {
///   "project_id": "proj-1",
///   "columns": { "backlog": "col-1", "active": "col-2", "done": "col-3" },
///   "owners": { "backend": "sticker-7", "testing": "sticker-9" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub project_id: String,
    pub columns: BTreeMap<ColumnState, String>,
    pub owners: BTreeMap<SpecialistId, String>,
}

impl SyncConfig {
    pub fn from_json(raw: &str) -> Result<Self, TaskforgeError> {
        serde_json::from_str(raw)
            .map_err(|e| TaskforgeError::ConfigurationMissing(format!("parse sync config: {e}")))
    }

    pub fn load(path: &Path) -> Result<Self, TaskforgeError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            TaskforgeError::ConfigurationMissing(format!(
                "read sync config {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&raw)
    }

    /// Every column must be mapped, and every roster specialist must have
    /// an owner marker.
    pub fn validate(&self, roster: &[SpecialistId]) -> Result<(), TaskforgeError> {
        if self.project_id.trim().is_empty() {
            return Err(TaskforgeError::ConfigurationMissing(
                "sync config has no project_id".into(),
            ));
        }
        for state in ColumnState::ALL {
            match self.columns.get(state) {
                Some(id) if !id.trim().is_empty() => {}
                _ => {
                    return Err(TaskforgeError::ConfigurationMissing(format!(
                        "no backend column mapped for '{}'",
                        state.as_str()
                    )))
                }
            }
        }
        let missing: Vec<&str> = roster
            .iter()
            .filter(|id| {
                self.owners
                    .get(*id)
                    .map_or(true, |marker| marker.trim().is_empty())
            })
            .map(|id| id.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(TaskforgeError::ConfigurationMissing(format!(
                "no owner marker for specialist(s): {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }

    pub fn column_id(&self, state: ColumnState) -> Result<&str, TaskforgeError> {
        self.columns.get(&state).map(String::as_str).ok_or_else(|| {
            TaskforgeError::ConfigurationMissing(format!(
                "no backend column mapped for '{}'",
                state.as_str()
            ))
        })
    }

    /// Reverse lookup; unknown backend columns map to `None`.
    pub fn column_state(&self, column_id: &str) -> Option<ColumnState> {
        self.columns
            .iter()
            .find(|(_, id)| id.as_str() == column_id)
            .map(|(state, _)| *state)
    }

    pub fn owner_marker(&self, specialist: SpecialistId) -> Result<&str, TaskforgeError> {
        self.owners.get(&specialist).map(String::as_str).ok_or_else(|| {
            TaskforgeError::ConfigurationMissing(format!(
                "no owner marker for specialist '{specialist}'"
            ))
        })
    }

    pub fn owner_for_marker(&self, marker: &str) -> Option<SpecialistId> {
        self.owners
            .iter()
            .find(|(_, m)| m.as_str() == marker)
            .map(|(id, _)| *id)
    }
}
