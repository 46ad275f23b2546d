use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use taskforge_core::task::Priority;

use crate::matcher::TextIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalCategory {
    Incident,
    Urgency,
    Security,
    Scale,
    Timeline,
    Payments,
    Data,
    Infrastructure,
    Maintenance,
}

impl SignalCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalCategory::Incident => "incident",
            SignalCategory::Urgency => "urgency",
            SignalCategory::Security => "security",
            SignalCategory::Scale => "scale",
            SignalCategory::Timeline => "timeline",
            SignalCategory::Payments => "payments",
            SignalCategory::Data => "data",
            SignalCategory::Infrastructure => "infrastructure",
            SignalCategory::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for SignalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityEffect {
    None,
    /// Raise priority to at least this level.
    Escalate(Priority),
    /// Lower priority to Low unless something escalates it.
    Downgrade,
}

/// One row of the rule table: phrases that reveal a category, and what the
/// category contributes to an assessment.
#[derive(Debug, Clone)]
pub struct SignalRule {
    pub category: SignalCategory,
    pub phrases: &'static [&'static str],
    pub hours: f64,
    pub priority: PriorityEffect,
    pub risks: &'static [&'static str],
    pub criteria: &'static [&'static str],
}

/// Categories found in a text, with the phrase that triggered each.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectedSignals {
    pub categories: BTreeSet<SignalCategory>,
    pub hits: Vec<(SignalCategory, &'static str)>,
    pub hours: f64,
    pub risks: Vec<String>,
    pub criteria: Vec<String>,
    escalation: Option<Priority>,
    downgrade: bool,
}

impl DetectedSignals {
    pub fn has(&self, category: SignalCategory) -> bool {
        self.categories.contains(&category)
    }

    /// Medium by default; escalations win over downgrades.
    pub fn priority(&self) -> Priority {
        match (self.escalation, self.downgrade) {
            (Some(p), _) => p.max(Priority::Medium),
            (None, true) => Priority::Low,
            (None, false) => Priority::Medium,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignalTable {
    rules: Vec<SignalRule>,
}

impl SignalTable {
    pub fn new(rules: Vec<SignalRule>) -> Self {
        Self { rules }
    }

    pub fn builtin() -> Self {
        Self::new(builtin_rules())
    }

    pub fn rules(&self) -> &[SignalRule] {
        &self.rules
    }

    pub fn detect(&self, index: &TextIndex) -> DetectedSignals {
        let mut out = DetectedSignals::default();
        for rule in &self.rules {
            let Some(phrase) = rule.phrases.iter().find(|p| index.contains(p)) else {
                continue;
            };
            out.hits.push((rule.category, *phrase));
            if !out.categories.insert(rule.category) {
                continue;
            }
            out.hours += rule.hours;
            match rule.priority {
                PriorityEffect::Escalate(p) => {
                    out.escalation = Some(out.escalation.map_or(p, |cur| cur.max(p)));
                }
                PriorityEffect::Downgrade => out.downgrade = true,
                PriorityEffect::None => {}
            }
            push_unique(&mut out.risks, rule.risks);
            push_unique(&mut out.criteria, rule.criteria);
        }
        out
    }
}

impl Default for SignalTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn push_unique(target: &mut Vec<String>, items: &[&str]) {
    for item in items {
        if !target.iter().any(|t| t == item) {
            target.push((*item).to_string());
        }
    }
}

pub fn builtin_rules() -> Vec<SignalRule> {
    vec![
        SignalRule {
            category: SignalCategory::Incident,
            phrases: &[
                "production outage",
                "outage",
                "incident",
                "sev1",
                "hotfix",
                "cannot log in",
                "can t log in",
                "returning 500",
                "returns 500",
                "500 error",
                "http 500",
                "returning 502",
                "returns 502",
                "bad gateway",
                "http 502",
                "returning 503",
                "service unavailable",
                "http 503",
                "crash",
                "is down",
                "went down",
            ],
            hours: 3.0,
            priority: PriorityEffect::Escalate(Priority::Urgent),
            risks: &["Active production impact on customers"],
            criteria: &[
                "Root cause identified and documented",
                "Monitoring confirms recovery",
            ],
        },
        SignalRule {
            category: SignalCategory::Urgency,
            phrases: &["urgent", "asap", "critical", "blocker", "immediately", "deadline"],
            hours: 0.0,
            priority: PriorityEffect::Escalate(Priority::High),
            risks: &["Compressed timeline limits review depth"],
            criteria: &[],
        },
        SignalRule {
            category: SignalCategory::Security,
            phrases: &[
                "security",
                "authentication",
                "login",
                "log in",
                "oauth",
                "sso",
                "vulnerability",
                "encryption",
                "password",
                "credential",
                "compliance",
                "permission",
            ],
            hours: 4.0,
            priority: PriorityEffect::None,
            risks: &["Compliance exposure: change touches authentication or sensitive data"],
            criteria: &["Security review passed"],
        },
        SignalRule {
            category: SignalCategory::Scale,
            phrases: &[
                "marketplace",
                "platform",
                "migrate",
                "migration",
                "integrate",
                "integration",
                "rewrite",
                "from scratch",
                "end to end",
                "multi tenant",
                "ecosystem",
                "overhaul",
            ],
            hours: 20.0,
            priority: PriorityEffect::None,
            risks: &["Scope spans multiple subsystems"],
            criteria: &["Architecture reviewed before implementation"],
        },
        SignalRule {
            category: SignalCategory::Timeline,
            phrases: &["month", "quarter", "roadmap", "long term", "multi phase"],
            hours: 24.0,
            priority: PriorityEffect::None,
            risks: &["Long delivery horizon; requirements may shift"],
            criteria: &["Milestones tracked against the delivery date"],
        },
        SignalRule {
            category: SignalCategory::Payments,
            phrases: &["payment", "billing", "checkout", "invoice", "refund", "stripe", "payout"],
            hours: 8.0,
            priority: PriorityEffect::None,
            risks: &["Financial transaction integrity"],
            criteria: &["Payment flows verified end to end in a sandbox"],
        },
        SignalRule {
            category: SignalCategory::Data,
            phrases: &[
                "analytics",
                "pipeline",
                "etl",
                "warehouse",
                "dashboard",
                "reporting",
                "ingestion",
                "dataset",
            ],
            hours: 6.0,
            priority: PriorityEffect::None,
            risks: &["Data quality regression"],
            criteria: &["Data validated against source"],
        },
        SignalRule {
            category: SignalCategory::Infrastructure,
            phrases: &[
                "infrastructure",
                "kubernetes",
                "k8s",
                "terraform",
                "cluster",
                "provision",
                "provisioning",
                "datacenter",
                "cloud",
            ],
            hours: 8.0,
            priority: PriorityEffect::None,
            risks: &["Environment drift between stages"],
            criteria: &["Infrastructure changes applied from a reviewed plan"],
        },
        SignalRule {
            category: SignalCategory::Maintenance,
            phrases: &[
                "readme",
                "typo",
                "docs",
                "documentation",
                "spelling",
                "changelog",
                "code comment",
                "doc comment",
                "docstring",
                "rename",
                "cleanup",
                "bump",
                "formatting",
            ],
            hours: 0.0,
            priority: PriorityEffect::Downgrade,
            risks: &[],
            criteria: &["Change reviewed for accuracy"],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(text: &str) -> DetectedSignals {
        SignalTable::builtin().detect(&TextIndex::new(text))
    }

    #[test]
    fn test_no_signals_defaults_to_medium() {
        let signals = detect("make the widget nicer");
        assert!(signals.categories.is_empty());
        assert_eq!(signals.priority(), Priority::Medium);
        assert_eq!(signals.hours, 0.0);
    }

    #[test]
    fn test_incident_escalates_to_urgent() {
        let signals = detect("checkout endpoint returning 500 since the deploy");
        assert!(signals.has(SignalCategory::Incident));
        assert_eq!(signals.priority(), Priority::Urgent);
    }

    #[test]
    fn test_status_code_needs_context() {
        for text in [
            "stripe checkout returns 502 for some users",
            "api gateway throws a 500 error on save",
            "upstream answers http 503 under load",
        ] {
            assert!(detect(text).has(SignalCategory::Incident), "{text}");
        }
        let signals = detect("Support 500 concurrent users on the form page");
        assert!(!signals.has(SignalCategory::Incident));
        assert_eq!(signals.priority(), Priority::Medium);
    }

    #[test]
    fn test_comment_feature_is_not_maintenance() {
        let signals = detect("Add comment support to the blog");
        assert!(!signals.has(SignalCategory::Maintenance));
        assert_eq!(signals.priority(), Priority::Medium);
        assert!(detect("fix the doc comment on parse").has(SignalCategory::Maintenance));
    }

    #[test]
    fn test_urgency_escalates_to_high() {
        let signals = detect("urgent: add export button");
        assert_eq!(signals.priority(), Priority::High);
    }

    #[test]
    fn test_maintenance_downgrades_to_low() {
        let signals = detect("fix typo in the readme");
        assert!(signals.has(SignalCategory::Maintenance));
        assert_eq!(signals.priority(), Priority::Low);
    }

    #[test]
    fn test_escalation_wins_over_downgrade() {
        let signals = detect("urgent typo on the pricing page");
        assert_eq!(signals.priority(), Priority::High);
    }

    #[test]
    fn test_security_adds_risk_and_criterion() {
        let signals = detect("rotate the oauth client secrets");
        assert!(signals
            .risks
            .iter()
            .any(|r| r.starts_with("Compliance exposure")));
        assert!(signals.criteria.iter().any(|c| c == "Security review passed"));
    }

    #[test]
    fn test_category_hours_counted_once() {
        let once = detect("billing");
        let twice = detect("billing checkout invoice refund");
        assert_eq!(once.hours, twice.hours);
        assert_eq!(twice.hits.len(), 1);
    }

    #[test]
    fn test_custom_table() {
        let table = SignalTable::new(vec![SignalRule {
            category: SignalCategory::Urgency,
            phrases: &["fire"],
            hours: 1.5,
            priority: PriorityEffect::Escalate(Priority::Urgent),
            risks: &[],
            criteria: &["Fire extinguished"],
        }]);
        let signals = table.detect(&TextIndex::new("the server room is on fire"));
        assert_eq!(signals.priority(), Priority::Urgent);
        assert_eq!(signals.hours, 1.5);
        assert_eq!(signals.criteria, vec!["Fire extinguished".to_string()]);
    }

    #[test]
    fn test_builtin_rules_unique_categories() {
        let rules = builtin_rules();
        let categories: BTreeSet<SignalCategory> = rules.iter().map(|r| r.category).collect();
        assert_eq!(categories.len(), rules.len());
    }
}
