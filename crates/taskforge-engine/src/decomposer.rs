use taskforge_core::assessment::ComplexityAssessment;
use taskforge_core::plan::{DirectReason, PlanMode, SubtaskSpec, TemplateKind, WorkflowPlan};
use taskforge_core::specialist::SpecialistId;
use taskforge_core::task::TaskInput;
use tracing::{debug, warn};

use crate::matcher::{Matcher, TextIndex};
use crate::signals::SignalTable;
use crate::templates::{self, Phase};

/// Smallest estimate a phase is given, however small its ratio.
pub const MIN_PHASE_HOURS: f64 = 0.5;

/// Expands COMPLEX and EPIC tasks into a phase graph.
#[derive(Debug, Clone)]
pub struct Decomposer {
    matcher: Matcher,
    signals: SignalTable,
}

impl Decomposer {
    pub fn new(matcher: Matcher, signals: SignalTable) -> Self {
        Self { matcher, signals }
    }

    pub fn decompose(&self, assessment: &ComplexityAssessment, input: &TaskInput) -> WorkflowPlan {
        let owner = assessment
            .primary_specialist()
            .unwrap_or(SpecialistId::Backend);

        if !assessment.tier.warrants_decomposition() {
            return WorkflowPlan::direct(
                input.clone(),
                assessment.clone(),
                owner,
                DirectReason::BelowThreshold,
            );
        }

        if assessment.required_specialist_ids.len() < 2 {
            warn!(
                tier = %assessment.tier,
                specialist = %owner,
                "large task needs a single specialization, assigning directly"
            );
            return WorkflowPlan::direct(
                input.clone(),
                assessment.clone(),
                owner,
                DirectReason::SingleSpecialization,
            );
        }

        let index = TextIndex::new(&input.full_text());
        let template = templates::select(&self.signals.detect(&index));
        let subtasks = self.expand(template, assessment, input, owner);

        debug!(
            template = %template,
            subtasks = subtasks.len(),
            "decomposed task"
        );

        WorkflowPlan {
            original_task: input.clone(),
            assessment: assessment.clone(),
            assigned_specialist: owner,
            mode: PlanMode::Decomposed { template },
            subtasks,
        }
    }

    fn expand(
        &self,
        template: TemplateKind,
        assessment: &ComplexityAssessment,
        input: &TaskInput,
        owner: SpecialistId,
    ) -> Vec<SubtaskSpec> {
        let phases = templates::phases(template);
        let full_text = input.full_text();

        // Route every phase before linking anything.
        let assignees: Vec<SpecialistId> = phases
            .iter()
            .map(|phase| self.route(phase, &full_text).unwrap_or(owner))
            .collect();

        let mut subtasks: Vec<SubtaskSpec> = Vec::with_capacity(phases.len());
        for (i, (phase, assignee)) in phases.iter().zip(assignees).enumerate() {
            let depends_on = match i {
                0 => None,
                _ if phase.parallel_with_previous => subtasks[i - 1].depends_on,
                _ => Some(i - 1),
            };
            subtasks.push(SubtaskSpec {
                phase: phase.name.to_string(),
                title: format!("{}: {}", phase.name, input.title),
                description: phase_description(phase, input),
                assigned_specialist: assignee,
                estimated_hours: phase_hours(assessment.estimated_hours, phase.ratio),
                depends_on,
            });
        }
        subtasks
    }

    fn route(&self, phase: &Phase, full_text: &str) -> Option<SpecialistId> {
        let text = format!("{} {}\n{}", phase.name, phase.focus, full_text);
        let best = self.matcher.rank(&text).into_iter().next()?;
        debug!(
            phase = phase.name,
            specialist = %best.specialist_id,
            raw_score = best.raw_score,
            "routed phase"
        );
        Some(best.specialist_id)
    }
}

fn phase_description(phase: &Phase, input: &TaskInput) -> String {
    if input.description.is_empty() {
        phase.summary.to_string()
    } else {
        format!("{}\n\n{}", phase.summary, input.description)
    }
}

fn phase_hours(total: f64, ratio: f64) -> f64 {
    ((total * ratio * 10.0).round() / 10.0).max(MIN_PHASE_HOURS)
}
