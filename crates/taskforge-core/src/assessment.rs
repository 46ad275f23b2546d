use std::fmt;

use serde::{Deserialize, Serialize};

use crate::specialist::SpecialistId;
use crate::task::Priority;

/// Complexity tier, ordered by effort.
///
/// The tier is always derived from estimated hours, so the mapping is
/// monotonic: SIMPLE <= 4h < MODERATE <= 16h < COMPLEX <= 60h < EPIC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplexityTier {
    Simple,
    Moderate,
    Complex,
    Epic,
}

impl ComplexityTier {
    pub const SIMPLE_MAX_HOURS: f64 = 4.0;
    pub const MODERATE_MAX_HOURS: f64 = 16.0;
    pub const COMPLEX_MAX_HOURS: f64 = 60.0;

    pub fn from_hours(hours: f64) -> Self {
        if hours <= Self::SIMPLE_MAX_HOURS {
            ComplexityTier::Simple
        } else if hours <= Self::MODERATE_MAX_HOURS {
            ComplexityTier::Moderate
        } else if hours <= Self::COMPLEX_MAX_HOURS {
            ComplexityTier::Complex
        } else {
            ComplexityTier::Epic
        }
    }

    /// Whether tasks of this tier are expanded into a subtask graph.
    pub fn warrants_decomposition(&self) -> bool {
        matches!(self, ComplexityTier::Complex | ComplexityTier::Epic)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityTier::Simple => "SIMPLE",
            ComplexityTier::Moderate => "MODERATE",
            ComplexityTier::Complex => "COMPLEX",
            ComplexityTier::Epic => "EPIC",
        }
    }
}

impl fmt::Display for ComplexityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityAssessment {
    pub tier: ComplexityTier,
    pub estimated_hours: f64,
    pub priority: Priority,
    /// Best match first, no duplicates, never empty.
    pub required_specialist_ids: Vec<SpecialistId>,
    pub risk_factors: Vec<String>,
    pub success_criteria: Vec<String>,
}

impl ComplexityAssessment {
    pub fn primary_specialist(&self) -> Option<SpecialistId> {
        self.required_specialist_ids.first().copied()
    }

    /// One-paragraph summary used for backend comments and CLI output.
    pub fn summary(&self) -> String {
        let specialists: Vec<&str> = self
            .required_specialist_ids
            .iter()
            .map(|s| s.as_str())
            .collect();
        let mut out = format!(
            "Complexity: {} ({:.1}h), priority: {}, specialists: {}",
            self.tier,
            self.estimated_hours,
            self.priority,
            specialists.join(", ")
        );
        if !self.risk_factors.is_empty() {
            out.push_str("\nRisks:");
            for risk in &self.risk_factors {
                out.push_str("\n- ");
                out.push_str(risk);
            }
        }
        out.push_str("\nSuccess criteria:");
        for criterion in &self.success_criteria {
            out.push_str("\n- ");
            out.push_str(criterion);
        }
        out
    }
}
