use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TaskforgeError;

pub const MAX_TITLE_CHARS: usize = 512;
pub const MAX_DESCRIPTION_CHARS: usize = 65_536;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Urgent => "Urgent",
        }
    }

}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A caller-submitted task: the only free text the engine ever sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl TaskInput {
    /// Validate and normalize caller input. The title is trimmed; the
    /// description is kept as given apart from surrounding whitespace.
    pub fn new(title: &str, description: &str) -> Result<Self, TaskforgeError> {
        let input = Self::for_matching(title, description)?;
        if input.title.is_empty() {
            return Err(TaskforgeError::InvalidArgument(
                "title must not be empty".into(),
            ));
        }
        Ok(input)
    }

    /// Like `new` but accepts a blank title. Suggestions and analysis run
    /// on whatever text there is; only a plan needs a title to persist.
    pub fn for_matching(title: &str, description: &str) -> Result<Self, TaskforgeError> {
        let title = title.trim();
        let description = description.trim();
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(TaskforgeError::InvalidArgument(format!(
                "title exceeds {MAX_TITLE_CHARS} characters"
            )));
        }
        if description.chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(TaskforgeError::InvalidArgument(format!(
                "description exceeds {MAX_DESCRIPTION_CHARS} characters"
            )));
        }
        if title.contains('\0') || description.contains('\0') {
            return Err(TaskforgeError::InvalidArgument(
                "input contains NUL characters".into(),
            ));
        }
        Ok(Self {
            title: title.to_string(),
            description: description.to_string(),
        })
    }

    /// Title and description joined, as fed to the matcher.
    pub fn full_text(&self) -> String {
        match (self.title.is_empty(), self.description.is_empty()) {
            (_, true) => self.title.clone(),
            (true, false) => self.description.clone(),
            (false, false) => format!("{}\n{}", self.title, self.description),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.title.is_empty() && self.description.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::Medium < Priority::High);
        assert!(Priority::High < Priority::Urgent);
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn test_priority_serde_matches_as_str() {
        for p in [Priority::Low, Priority::Medium, Priority::High, Priority::Urgent] {
            let json = serde_json::to_string(&p).unwrap();
            assert_eq!(json, format!("\"{}\"", p.as_str()));
        }
    }

    #[test]
    fn test_task_input_trims_title() {
        let input = TaskInput::new("  Fix login  ", " details ").unwrap();
        assert_eq!(input.title, "Fix login");
        assert_eq!(input.description, "details");
        assert_eq!(input.full_text(), "Fix login\ndetails");
    }

    #[test]
    fn test_task_input_rejects_blank_title() {
        let err = TaskInput::new("   ", "something").unwrap_err();
        assert!(matches!(err, TaskforgeError::InvalidArgument(_)));
    }

    #[test]
    fn test_for_matching_accepts_blank_title() {
        let input = TaskInput::for_matching("  ", " stripe checkout ").unwrap();
        assert_eq!(input.title, "");
        assert_eq!(input.full_text(), "stripe checkout");
        assert!(!input.is_blank());
        assert!(TaskInput::for_matching("", "").unwrap().is_blank());
    }

    #[test]
    fn test_for_matching_still_bounds_input() {
        let long = "x".repeat(MAX_DESCRIPTION_CHARS + 1);
        assert!(matches!(
            TaskInput::for_matching("", &long),
            Err(TaskforgeError::InvalidArgument(_))
        ));
        assert!(TaskInput::for_matching("", "a\0b").is_err());
    }

    #[test]
    fn test_task_input_rejects_oversized_title() {
        let long = "x".repeat(MAX_TITLE_CHARS + 1);
        assert!(TaskInput::new(&long, "").is_err());
    }

    #[test]
    fn test_task_input_rejects_nul() {
        assert!(TaskInput::new("a\0b", "").is_err());
    }

    #[test]
    fn test_full_text_without_description() {
        let input = TaskInput::new("Update README", "").unwrap();
        assert_eq!(input.full_text(), "Update README");
    }
}
