use std::fmt;

use serde::{Deserialize, Serialize};

use crate::assessment::ComplexityAssessment;
use crate::error::TaskforgeError;
use crate::specialist::SpecialistId;
use crate::task::TaskInput;

/// Phase template used to expand a large task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    Build,
    DataPipeline,
    Infrastructure,
}

impl TemplateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateKind::Build => "build",
            TemplateKind::DataPipeline => "data_pipeline",
            TemplateKind::Infrastructure => "infrastructure",
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a plan assigns one specialist directly instead of a subtask graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectReason {
    /// Tier is SIMPLE or MODERATE.
    BelowThreshold,
    /// COMPLEX/EPIC, but fewer than two distinct specializations are needed.
    SingleSpecialization,
    /// Caller named the specialist explicitly.
    SpecialistOverride,
    /// Caller asked to skip decomposition.
    DecompositionSkipped,
}

impl DirectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DirectReason::BelowThreshold => "below_threshold",
            DirectReason::SingleSpecialization => "single_specialization",
            DirectReason::SpecialistOverride => "specialist_override",
            DirectReason::DecompositionSkipped => "decomposition_skipped",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanMode {
    Direct { reason: DirectReason },
    Decomposed { template: TemplateKind },
}

/// One node of a decomposed plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtaskSpec {
    pub phase: String,
    pub title: String,
    pub description: String,
    pub assigned_specialist: SpecialistId,
    pub estimated_hours: f64,
    /// Index of the predecessor within the same plan's `subtasks`.
    pub depends_on: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowPlan {
    pub original_task: TaskInput,
    pub assessment: ComplexityAssessment,
    pub assigned_specialist: SpecialistId,
    pub mode: PlanMode,
    /// Empty for direct assignment.
    pub subtasks: Vec<SubtaskSpec>,
}

impl WorkflowPlan {
    pub fn direct(
        original_task: TaskInput,
        assessment: ComplexityAssessment,
        assigned_specialist: SpecialistId,
        reason: DirectReason,
    ) -> Self {
        Self {
            original_task,
            assessment,
            assigned_specialist,
            mode: PlanMode::Direct { reason },
            subtasks: Vec::new(),
        }
    }

    pub fn is_direct_assignment(&self) -> bool {
        matches!(self.mode, PlanMode::Direct { .. })
    }

    pub fn direct_reason(&self) -> Option<DirectReason> {
        match self.mode {
            PlanMode::Direct { reason } => Some(reason),
            PlanMode::Decomposed { .. } => None,
        }
    }

    /// Indices of subtasks with no predecessor.
    pub fn source_nodes(&self) -> Vec<usize> {
        self.subtasks
            .iter()
            .enumerate()
            .filter(|(_, s)| s.depends_on.is_none())
            .map(|(i, _)| i)
            .collect()
    }

    /// Distinct specialists assigned anywhere in the plan, in first-seen order.
    pub fn specialists(&self) -> Vec<SpecialistId> {
        let mut out = vec![self.assigned_specialist];
        for subtask in &self.subtasks {
            if !out.contains(&subtask.assigned_specialist) {
                out.push(subtask.assigned_specialist);
            }
        }
        out
    }

    /// Check the dependency graph: every link points to an earlier
    /// subtask (which rules out cycles) and exactly one node is a source.
    pub fn validate_graph(&self) -> Result<(), TaskforgeError> {
        if self.subtasks.is_empty() {
            return Ok(());
        }
        for (i, subtask) in self.subtasks.iter().enumerate() {
            if let Some(dep) = subtask.depends_on {
                if dep >= i {
                    return Err(TaskforgeError::InvalidArgument(format!(
                        "subtask {i} ('{}') depends on non-preceding subtask {dep}",
                        subtask.title
                    )));
                }
            }
        }
        let sources = self.source_nodes();
        if sources.len() != 1 {
            return Err(TaskforgeError::InvalidArgument(format!(
                "plan has {} source subtasks, expected exactly one",
                sources.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::ComplexityTier;
    use crate::task::Priority;

    fn assessment() -> ComplexityAssessment {
        ComplexityAssessment {
            tier: ComplexityTier::Complex,
            estimated_hours: 40.0,
            priority: Priority::Medium,
            required_specialist_ids: vec![SpecialistId::Backend, SpecialistId::Testing],
            risk_factors: vec![],
            success_criteria: vec!["Task completed to specification".into()],
        }
    }

    fn subtask(title: &str, depends_on: Option<usize>) -> SubtaskSpec {
        SubtaskSpec {
            phase: title.into(),
            title: title.into(),
            description: String::new(),
            assigned_specialist: SpecialistId::Backend,
            estimated_hours: 1.0,
            depends_on,
        }
    }

    fn plan_with(subtasks: Vec<SubtaskSpec>) -> WorkflowPlan {
        WorkflowPlan {
            original_task: TaskInput::new("Build it", "").unwrap(),
            assessment: assessment(),
            assigned_specialist: SpecialistId::Backend,
            mode: PlanMode::Decomposed {
                template: TemplateKind::Build,
            },
            subtasks,
        }
    }

    #[test]
    fn test_sequential_graph_is_valid() {
        let plan = plan_with(vec![
            subtask("a", None),
            subtask("b", Some(0)),
            subtask("c", Some(1)),
        ]);
        plan.validate_graph().unwrap();
        assert_eq!(plan.source_nodes(), vec![0]);
    }

    #[test]
    fn test_parallel_branches_are_valid() {
        let plan = plan_with(vec![
            subtask("a", None),
            subtask("b", Some(0)),
            subtask("c", Some(0)),
            subtask("d", Some(2)),
        ]);
        plan.validate_graph().unwrap();
    }

    #[test]
    fn test_two_sources_rejected() {
        let plan = plan_with(vec![subtask("a", None), subtask("b", None)]);
        assert!(plan.validate_graph().is_err());
    }

    #[test]
    fn test_forward_reference_rejected() {
        let plan = plan_with(vec![subtask("a", Some(1)), subtask("b", None)]);
        assert!(plan.validate_graph().is_err());
    }

    #[test]
    fn test_direct_plan_has_no_subtasks() {
        let plan = WorkflowPlan::direct(
            TaskInput::new("Fix typo", "").unwrap(),
            assessment(),
            SpecialistId::Documentation,
            DirectReason::BelowThreshold,
        );
        assert!(plan.is_direct_assignment());
        assert_eq!(plan.direct_reason(), Some(DirectReason::BelowThreshold));
        assert!(plan.subtasks.is_empty());
        plan.validate_graph().unwrap();
        assert_eq!(plan.specialists(), vec![SpecialistId::Documentation]);
    }

    #[test]
    fn test_plan_mode_serializes_tagged() {
        let mode = PlanMode::Direct {
            reason: DirectReason::SingleSpecialization,
        };
        let json = serde_json::to_value(mode).unwrap();
        assert_eq!(json["kind"], "direct");
        assert_eq!(json["reason"], "single_specialization");
    }
}
