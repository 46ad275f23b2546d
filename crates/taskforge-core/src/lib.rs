pub mod assessment;
pub mod error;
pub mod plan;
pub mod remote;
pub mod specialist;
pub mod task;

pub use assessment::{ComplexityAssessment, ComplexityTier};
pub use error::TaskforgeError;
pub use plan::{DirectReason, PlanMode, SubtaskSpec, TemplateKind, WorkflowPlan};
pub use remote::{ColumnState, RemoteTaskRef};
pub use specialist::{CostTier, MatchResult, SpecialistId, SpecialistProfile, ToolCapability};
pub use task::{Priority, TaskInput};
