use taskforge_core::plan::TemplateKind;

use crate::signals::{DetectedSignals, SignalCategory};

/// One step of a phase template.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Phase {
    pub name: &'static str,
    /// Terms prepended to the task text when routing this phase.
    pub focus: &'static str,
    pub summary: &'static str,
    /// Share of the total estimate given to this phase.
    pub ratio: f64,
    /// Shares the predecessor of the previous phase instead of following it.
    pub parallel_with_previous: bool,
}

const fn phase(name: &'static str, focus: &'static str, summary: &'static str, ratio: f64) -> Phase {
    Phase {
        name,
        focus,
        summary,
        ratio,
        parallel_with_previous: false,
    }
}

const fn parallel(
    name: &'static str,
    focus: &'static str,
    summary: &'static str,
    ratio: f64,
) -> Phase {
    Phase {
        name,
        focus,
        summary,
        ratio,
        parallel_with_previous: true,
    }
}

static BUILD: &[Phase] = &[
    phase(
        "Requirements",
        "requirement scope stakeholder acceptance criteria",
        "Pin down scope, stakeholders and acceptance criteria.",
        0.10,
    ),
    phase(
        "Design",
        "system design architecture scalability tradeoff",
        "Produce the system design and record the main tradeoffs.",
        0.15,
    ),
    phase(
        "Implementation",
        "",
        "Build the agreed design.",
        0.45,
    ),
    phase(
        "Verification",
        "verification testing qa test coverage",
        "Verify behavior against the acceptance criteria.",
        0.20,
    ),
    phase(
        "Release",
        "release rollout deploy deployment",
        "Roll the change out and watch it in production.",
        0.10,
    ),
];

static DATA_PIPELINE: &[Phase] = &[
    phase(
        "Source Analysis",
        "source discovery requirement stakeholder scope",
        "Inventory the sources and agree on what the pipeline must deliver.",
        0.10,
    ),
    phase(
        "Schema Design",
        "system design architecture blueprint scalability",
        "Design target schemas and the flow between stages.",
        0.15,
    ),
    phase(
        "Pipeline Implementation",
        "etl pipeline ingestion",
        "Implement extraction, transformation and loading.",
        0.35,
    ),
    phase(
        "Data Validation",
        "verification validation qa test",
        "Validate loaded data against the sources.",
        0.15,
    ),
    parallel(
        "Dashboards",
        "dashboard reporting analytics metric",
        "Build the reports and dashboards fed by the pipeline.",
        0.15,
    ),
    phase(
        "Rollout",
        "rollout release deployment monitoring",
        "Schedule the pipeline in production with monitoring.",
        0.10,
    ),
];

static INFRASTRUCTURE: &[Phase] = &[
    phase(
        "Assessment",
        "requirement scope stakeholder discovery",
        "Assess the current environment and the constraints of the change.",
        0.10,
    ),
    phase(
        "Architecture",
        "system design architecture blueprint scalability",
        "Design the target topology.",
        0.15,
    ),
    phase(
        "Provisioning",
        "provisioning terraform infrastructure",
        "Provision the target environment from reviewed definitions.",
        0.30,
    ),
    phase(
        "Migration Rehearsal",
        "verification testing qa regression load test",
        "Rehearse the migration and test under load.",
        0.20,
    ),
    parallel(
        "Runbook",
        "runbook documentation docs guide",
        "Write the operational runbook and rollback steps.",
        0.10,
    ),
    phase(
        "Cutover",
        "cutover rollout monitoring",
        "Cut traffic over and monitor the new environment.",
        0.15,
    ),
];

pub fn phases(kind: TemplateKind) -> &'static [Phase] {
    match kind {
        TemplateKind::Build => BUILD,
        TemplateKind::DataPipeline => DATA_PIPELINE,
        TemplateKind::Infrastructure => INFRASTRUCTURE,
    }
}

/// Pick a template from the signals found during classification.
///
/// Scale or payments work is a product build even when it also mentions
/// data or infrastructure.
pub fn select(signals: &DetectedSignals) -> TemplateKind {
    let product_build = signals.has(SignalCategory::Scale) || signals.has(SignalCategory::Payments);
    if product_build {
        TemplateKind::Build
    } else if signals.has(SignalCategory::Infrastructure) {
        TemplateKind::Infrastructure
    } else if signals.has(SignalCategory::Data) {
        TemplateKind::DataPipeline
    } else {
        TemplateKind::Build
    }
}
