pub mod classifier;
pub mod decomposer;
pub mod matcher;
pub mod registry;
pub mod signals;
pub mod templates;

use std::sync::Arc;

use taskforge_core::assessment::ComplexityAssessment;
use taskforge_core::plan::{DirectReason, WorkflowPlan};
use taskforge_core::specialist::{MatchResult, SpecialistId};
use taskforge_core::task::TaskInput;
use taskforge_core::TaskforgeError;
use tracing::info;

pub use classifier::{Classifier, ClassifierSettings};
pub use decomposer::Decomposer;
pub use matcher::{Matcher, MatcherSettings};
pub use registry::Registry;
pub use signals::SignalTable;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineSettings {
    pub matcher: MatcherSettings,
    pub classifier: ClassifierSettings,
}

/// Caller options for planning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanOptions {
    /// Assign this specialist directly; the matcher is not consulted.
    pub specialist_override: Option<SpecialistId>,
    pub skip_decomposition: bool,
}

/// Read-only decision pipeline: registry, matcher, classifier and
/// decomposer. Build once and share through an `Arc`.
#[derive(Debug, Clone)]
pub struct Engine {
    registry: Arc<Registry>,
    matcher: Matcher,
    classifier: Classifier,
    decomposer: Decomposer,
}

impl Engine {
    pub fn new(registry: Registry, settings: EngineSettings) -> Self {
        let registry = Arc::new(registry);
        let matcher = Matcher::with_settings(registry.clone(), settings.matcher);
        let classifier = Classifier::new(matcher.clone(), SignalTable::builtin(), settings.classifier);
        let decomposer = Decomposer::new(matcher.clone(), SignalTable::builtin());
        Self {
            registry,
            matcher,
            classifier,
            decomposer,
        }
    }

    pub fn builtin() -> Self {
        Self::new(Registry::builtin(), EngineSettings::default())
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Ranked specialists for the task, best first.
    pub fn suggest(&self, input: &TaskInput) -> Vec<MatchResult> {
        self.matcher.rank(&input.full_text())
    }

    pub fn analyze(&self, input: &TaskInput) -> ComplexityAssessment {
        self.classifier.classify(input)
    }

    pub fn decompose(&self, assessment: &ComplexityAssessment, input: &TaskInput) -> WorkflowPlan {
        self.decomposer.decompose(assessment, input)
    }

    pub fn plan(&self, input: &TaskInput, options: &PlanOptions) -> Result<WorkflowPlan, TaskforgeError> {
        if let Some(specialist) = options.specialist_override {
            if !self.registry.contains(specialist) {
                return Err(TaskforgeError::InvalidArgument(format!(
                    "specialist '{specialist}' is not in the roster"
                )));
            }
            let assessment = self.classifier.classify_with(input, &[specialist]);
            info!(%specialist, tier = %assessment.tier, "planned with specialist override");
            return Ok(WorkflowPlan::direct(
                input.clone(),
                assessment,
                specialist,
                DirectReason::SpecialistOverride,
            ));
        }

        let assessment = self.classifier.classify(input);
        let plan = if options.skip_decomposition {
            let owner = assessment
                .primary_specialist()
                .unwrap_or(self.classifier.settings().fallback_specialist);
            WorkflowPlan::direct(
                input.clone(),
                assessment,
                owner,
                DirectReason::DecompositionSkipped,
            )
        } else {
            self.decomposer.decompose(&assessment, input)
        };
        plan.validate_graph()?;

        info!(
            tier = %plan.assessment.tier,
            specialist = %plan.assigned_specialist,
            subtasks = plan.subtasks.len(),
            "planned task"
        );
        Ok(plan)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::builtin()
    }
}
