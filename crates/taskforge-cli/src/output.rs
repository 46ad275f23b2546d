//! Plain-text rendering for terminal output. `--json` bypasses all of this.

use std::fmt::Write;

use taskforge_core::plan::{PlanMode, WorkflowPlan};
use taskforge_core::remote::RemoteTaskRef;
use taskforge_core::specialist::{MatchResult, SpecialistProfile};
use taskforge_service::SyncReport;

pub fn suggestions(results: &[MatchResult]) -> String {
    if results.is_empty() {
        return "no specialist matched".to_string();
    }
    let mut out = String::new();
    for (rank, m) in results.iter().enumerate() {
        let keywords: Vec<&str> = m.matched_keywords.iter().map(String::as_str).collect();
        let _ = writeln!(
            out,
            "{:>2}. {:<16} {:.2}  [{}]",
            rank + 1,
            m.specialist_id.as_str(),
            m.confidence,
            keywords.join(", ")
        );
    }
    out.trim_end().to_string()
}

pub fn roster(profiles: &[SpecialistProfile]) -> String {
    let mut out = String::new();
    for p in profiles {
        let tools: Vec<&str> = p.tool_capabilities.iter().map(|t| t.as_str()).collect();
        let _ = writeln!(
            out,
            "{:<16} {:<24} {:<8} {:>3} keywords  tools: {}",
            p.id.as_str(),
            p.id.display_name(),
            p.cost_tier.as_str(),
            p.capability_keywords.len(),
            if tools.is_empty() { "-".to_string() } else { tools.join(", ") }
        );
    }
    out.trim_end().to_string()
}

pub fn plan(plan: &WorkflowPlan) -> String {
    let mut out = format!("Task: {}\n{}\n", plan.original_task.title, plan.assessment.summary());
    let _ = writeln!(out, "Assigned: {}", plan.assigned_specialist.as_str());
    match plan.mode {
        PlanMode::Direct { reason } => {
            let _ = writeln!(out, "Mode: direct ({})", reason.as_str());
        }
        PlanMode::Decomposed { template } => {
            let _ = writeln!(
                out,
                "Mode: decomposed ({}, {} subtasks)",
                template.as_str(),
                plan.subtasks.len()
            );
            for (i, sub) in plan.subtasks.iter().enumerate() {
                let after = sub
                    .depends_on
                    .map(|d| format!("  after [{d}]"))
                    .unwrap_or_default();
                let _ = writeln!(
                    out,
                    "  [{i}] {:<40} {:<16} {:>6.1}h{after}",
                    sub.title,
                    sub.assigned_specialist.as_str(),
                    sub.estimated_hours
                );
            }
        }
    }
    out.trim_end().to_string()
}

pub fn remote_ref(r: &RemoteTaskRef) -> String {
    let owner = r
        .owner_specialist_id
        .map(|s| s.as_str())
        .unwrap_or("unowned");
    format!("{} [{}] {}", r.external_id, r.column_state, owner)
}

pub fn report(report: &SyncReport) -> String {
    let mut out = format!("Synced (session {})\n", report.session_id.simple());
    let _ = writeln!(out, "  parent {}", remote_ref(&report.parent));
    for (i, sub) in report.subtasks.iter().enumerate() {
        let _ = writeln!(out, "  [{i}] {}", remote_ref(sub));
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskforge_core::task::TaskInput;
    use taskforge_engine::{Engine, PlanOptions};

    #[test]
    fn test_empty_suggestions() {
        assert_eq!(suggestions(&[]), "no specialist matched");
    }

    #[test]
    fn test_decomposed_plan_lists_dependencies() {
        let engine = Engine::builtin();
        let input = TaskInput::new(
            "Marketplace",
            "Build a marketplace with payments, inventory, and analytics, targeting production in 6 months",
        )
        .unwrap();
        let plan = engine.plan(&input, &PlanOptions::default()).unwrap();
        let text = super::plan(&plan);
        assert!(text.starts_with("Task: Marketplace\nComplexity: EPIC"));
        assert!(text.contains("Mode: decomposed (build, 5 subtasks)"));
        assert!(text.contains("after [3]"));
    }

    #[test]
    fn test_direct_plan_has_no_subtask_lines() {
        let engine = Engine::builtin();
        let input = TaskInput::new("Update the README typo", "").unwrap();
        let plan = engine.plan(&input, &PlanOptions::default()).unwrap();
        let text = super::plan(&plan);
        assert!(text.contains("Mode: direct (below_threshold)"));
        assert!(!text.contains("[0]"));
    }
}
