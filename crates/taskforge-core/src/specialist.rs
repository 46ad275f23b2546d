use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a specialist profile in the roster.
///
/// The roster is closed: every specialist the engine can route work to is
/// a variant here, and its keyword table lives in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialistId {
    Architect,
    Product,
    Backend,
    Frontend,
    Payments,
    Data,
    Infrastructure,
    Security,
    Incident,
    Testing,
    Documentation,
}

impl SpecialistId {
    pub const ALL: &[SpecialistId] = &[
        SpecialistId::Architect,
        SpecialistId::Product,
        SpecialistId::Backend,
        SpecialistId::Frontend,
        SpecialistId::Payments,
        SpecialistId::Data,
        SpecialistId::Infrastructure,
        SpecialistId::Security,
        SpecialistId::Incident,
        SpecialistId::Testing,
        SpecialistId::Documentation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SpecialistId::Architect => "architect",
            SpecialistId::Product => "product",
            SpecialistId::Backend => "backend",
            SpecialistId::Frontend => "frontend",
            SpecialistId::Payments => "payments",
            SpecialistId::Data => "data",
            SpecialistId::Infrastructure => "infrastructure",
            SpecialistId::Security => "security",
            SpecialistId::Incident => "incident",
            SpecialistId::Testing => "testing",
            SpecialistId::Documentation => "documentation",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SpecialistId::Architect => "Solutions Architect",
            SpecialistId::Product => "Product Analyst",
            SpecialistId::Backend => "Backend Engineer",
            SpecialistId::Frontend => "Frontend Engineer",
            SpecialistId::Payments => "Payments Engineer",
            SpecialistId::Data => "Data Engineer",
            SpecialistId::Infrastructure => "Infrastructure Engineer",
            SpecialistId::Security => "Security Engineer",
            SpecialistId::Incident => "Incident Responder",
            SpecialistId::Testing => "QA Engineer",
            SpecialistId::Documentation => "Technical Writer",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "architect" => Some(SpecialistId::Architect),
            "product" => Some(SpecialistId::Product),
            "backend" => Some(SpecialistId::Backend),
            "frontend" => Some(SpecialistId::Frontend),
            "payments" => Some(SpecialistId::Payments),
            "data" => Some(SpecialistId::Data),
            "infrastructure" => Some(SpecialistId::Infrastructure),
            "security" => Some(SpecialistId::Security),
            "incident" => Some(SpecialistId::Incident),
            "testing" => Some(SpecialistId::Testing),
            "documentation" => Some(SpecialistId::Documentation),
            _ => None,
        }
    }

    /// Fixed priority used to break raw-score ties. Lower wins.
    ///
    /// Narrow specialists outrank broad ones; equal ranks fall back to
    /// comparing `as_str()`.
    pub fn tie_break_rank(&self) -> u8 {
        match self {
            SpecialistId::Incident => 0,
            SpecialistId::Security => 1,
            SpecialistId::Payments => 1,
            SpecialistId::Data => 2,
            SpecialistId::Infrastructure => 2,
            SpecialistId::Testing => 3,
            SpecialistId::Frontend => 4,
            SpecialistId::Backend => 4,
            SpecialistId::Documentation => 5,
            SpecialistId::Architect => 6,
            SpecialistId::Product => 6,
        }
    }
}

impl fmt::Display for SpecialistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relative cost of routing work to a specialist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostTier {
    Economy,
    Standard,
    Premium,
}

impl CostTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CostTier::Economy => "economy",
            CostTier::Standard => "standard",
            CostTier::Premium => "premium",
        }
    }
}

impl fmt::Display for CostTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side-effect category a specialist is allowed to perform.
/// Only used to filter eligible specialists, never enforced here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCapability {
    Read,
    Write,
    Execute,
    Network,
}

impl ToolCapability {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolCapability::Read => "read",
            ToolCapability::Write => "write",
            ToolCapability::Execute => "execute",
            ToolCapability::Network => "network",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialistProfile {
    pub id: SpecialistId,
    /// Lowercase keyword or phrase -> weight.
    pub capability_keywords: BTreeMap<String, f64>,
    pub cost_tier: CostTier,
    #[serde(default)]
    pub tool_capabilities: BTreeSet<ToolCapability>,
}

impl SpecialistProfile {
    pub fn new(
        id: SpecialistId,
        cost_tier: CostTier,
        keywords: &[(&str, f64)],
        tools: &[ToolCapability],
    ) -> Self {
        Self {
            id,
            capability_keywords: keywords
                .iter()
                .map(|(k, w)| (k.to_lowercase(), *w))
                .collect(),
            cost_tier,
            tool_capabilities: tools.iter().copied().collect(),
        }
    }

    pub fn allows_all(&self, tools: &[ToolCapability]) -> bool {
        tools.iter().all(|t| self.tool_capabilities.contains(t))
    }
}

/// Score of one specialist against one task description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub specialist_id: SpecialistId,
    /// Sum of the weights of matched keywords, each counted once.
    pub raw_score: f64,
    /// Saturating transform of `raw_score`, in [0, 1].
    pub confidence: f64,
    pub matched_keywords: BTreeSet<String>,
    pub reasoning: String,
}
