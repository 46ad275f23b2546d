use std::collections::BTreeSet;
use std::path::Path;

use taskforge_core::specialist::{CostTier, SpecialistId, SpecialistProfile, ToolCapability};
use taskforge_core::TaskforgeError;

use ToolCapability::{Execute, Network, Read, Write};

/// Immutable catalog of specialist profiles, loaded once per process.
///
/// Profiles are kept sorted by id so iteration order never depends on how
/// the roster was assembled.
#[derive(Debug, Clone)]
pub struct Registry {
    profiles: Vec<SpecialistProfile>,
}

impl Registry {
    pub fn builtin() -> Self {
        let mut profiles = builtin_profiles();
        profiles.sort_by_key(|p| p.id);
        Self { profiles }
    }

    pub fn from_profiles(mut profiles: Vec<SpecialistProfile>) -> Result<Self, TaskforgeError> {
        if profiles.is_empty() {
            return Err(TaskforgeError::ConfigurationMissing(
                "specialist roster is empty".into(),
            ));
        }
        let mut seen = BTreeSet::new();
        for profile in &profiles {
            if !seen.insert(profile.id) {
                return Err(TaskforgeError::ConfigurationMissing(format!(
                    "duplicate specialist '{}' in roster",
                    profile.id
                )));
            }
            if profile.capability_keywords.is_empty() {
                return Err(TaskforgeError::ConfigurationMissing(format!(
                    "specialist '{}' has no capability keywords",
                    profile.id
                )));
            }
            if let Some((keyword, _)) = profile
                .capability_keywords
                .iter()
                .find(|(k, w)| k.trim().is_empty() || !w.is_finite() || **w <= 0.0)
            {
                return Err(TaskforgeError::ConfigurationMissing(format!(
                    "specialist '{}' has invalid keyword '{keyword}'",
                    profile.id
                )));
            }
        }
        profiles.sort_by_key(|p| p.id);
        Ok(Self { profiles })
    }

    /// Load a roster from a JSON array of profiles.
    pub fn from_json_file(path: &Path) -> Result<Self, TaskforgeError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            TaskforgeError::ConfigurationMissing(format!("read roster {}: {e}", path.display()))
        })?;
        let profiles: Vec<SpecialistProfile> = serde_json::from_str(&raw).map_err(|e| {
            TaskforgeError::ConfigurationMissing(format!("parse roster {}: {e}", path.display()))
        })?;
        Self::from_profiles(profiles)
    }

    pub fn get(&self, id: SpecialistId) -> Option<&SpecialistProfile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: SpecialistId) -> bool {
        self.get(id).is_some()
    }

    pub fn profiles(&self) -> &[SpecialistProfile] {
        &self.profiles
    }

    pub fn ids(&self) -> Vec<SpecialistId> {
        self.profiles.iter().map(|p| p.id).collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Profiles permitted to perform every listed side-effect category.
    pub fn eligible<'a>(
        &'a self,
        tools: &'a [ToolCapability],
    ) -> impl Iterator<Item = &'a SpecialistProfile> + 'a {
        self.profiles.iter().filter(move |p| p.allows_all(tools))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

pub fn builtin_profiles() -> Vec<SpecialistProfile> {
    vec![
        SpecialistProfile::new(
            SpecialistId::Architect,
            CostTier::Premium,
            &[
                ("architecture", 3.0),
                ("architect", 3.0),
                ("system design", 3.0),
                ("design", 2.0),
                ("scalability", 2.5),
                ("scalable", 2.0),
                ("microservice", 2.0),
                ("blueprint", 2.0),
                ("diagram", 1.5),
                ("tradeoff", 1.5),
                ("platform", 1.5),
            ],
            &[Read, Write],
        ),
        SpecialistProfile::new(
            SpecialistId::Product,
            CostTier::Standard,
            &[
                ("requirement", 3.0),
                ("acceptance criteria", 3.0),
                ("stakeholder", 2.5),
                ("roadmap", 2.5),
                ("user story", 2.5),
                ("scope", 2.0),
                ("discovery", 2.0),
                ("mvp", 2.0),
                ("specification", 2.0),
                ("prioritize", 1.5),
            ],
            &[Read, Write],
        ),
        SpecialistProfile::new(
            SpecialistId::Backend,
            CostTier::Standard,
            &[
                ("backend", 3.0),
                ("api", 2.0),
                ("endpoint", 2.0),
                ("database", 2.0),
                ("inventory", 2.0),
                ("graphql", 2.0),
                ("crud", 2.0),
                ("server", 1.5),
                ("query", 1.5),
                ("rest", 1.5),
                ("catalog", 1.5),
                ("marketplace", 1.0),
                ("order", 1.0),
                ("schema", 1.0),
                ("service", 0.5),
                ("system", 0.5),
                ("feature", 0.5),
                ("logic", 0.5),
            ],
            &[Read, Write, Execute, Network],
        ),
        SpecialistProfile::new(
            SpecialistId::Frontend,
            CostTier::Standard,
            &[
                ("frontend", 3.0),
                ("ui", 3.0),
                ("css", 3.0),
                ("react", 3.0),
                ("ux", 2.5),
                ("layout", 2.0),
                ("button", 2.0),
                ("responsive", 2.0),
                ("accessibility", 2.0),
                ("component", 1.5),
                ("page", 1.5),
                ("form", 1.5),
                ("screen", 0.5),
                ("style", 0.5),
                ("view", 0.5),
            ],
            &[Read, Write, Execute],
        ),
        SpecialistProfile::new(
            SpecialistId::Payments,
            CostTier::Premium,
            &[
                ("payment", 3.0),
                ("billing", 3.0),
                ("checkout", 3.0),
                ("stripe", 3.0),
                ("pci", 3.0),
                ("invoice", 2.5),
                ("refund", 2.5),
                ("payout", 2.5),
                ("subscription", 2.0),
                ("transaction", 2.0),
                ("wallet", 2.0),
                ("marketplace", 1.5),
                ("pricing", 1.5),
            ],
            &[Read, Write, Network],
        ),
        SpecialistProfile::new(
            SpecialistId::Data,
            CostTier::Standard,
            &[
                ("etl", 3.0),
                ("warehouse", 3.0),
                ("bigquery", 3.0),
                ("analytics", 2.5),
                ("pipeline", 2.5),
                ("ingestion", 2.5),
                ("reporting", 2.0),
                ("dashboard", 2.0),
                ("dataset", 2.0),
                ("sql", 2.0),
                ("kafka", 2.0),
                ("data", 1.5),
                ("report", 1.5),
                ("metric", 1.5),
            ],
            &[Read, Write, Execute],
        ),
        SpecialistProfile::new(
            SpecialistId::Infrastructure,
            CostTier::Standard,
            &[
                ("infrastructure", 3.0),
                ("kubernetes", 3.0),
                ("k8s", 3.0),
                ("terraform", 3.0),
                ("provisioning", 3.0),
                ("provision", 3.0),
                ("deploy", 2.5),
                ("deployment", 2.5),
                ("docker", 2.5),
                ("helm", 2.5),
                ("release", 2.5),
                ("rollout", 2.5),
                ("runbook", 2.5),
                ("cutover", 2.5),
                ("observability", 2.5),
                ("ci", 2.0),
                ("cluster", 2.0),
                ("cloud", 2.0),
                ("aws", 2.0),
                ("gcp", 2.0),
                ("monitoring", 2.0),
                ("migrate", 1.5),
                ("migration", 1.5),
            ],
            &[Read, Write, Execute, Network],
        ),
        SpecialistProfile::new(
            SpecialistId::Security,
            CostTier::Premium,
            &[
                ("security", 3.0),
                ("authentication", 3.0),
                ("oauth", 3.0),
                ("sso", 3.0),
                ("vulnerability", 3.0),
                ("cve", 3.0),
                ("encryption", 3.0),
                ("xss", 3.0),
                ("csrf", 3.0),
                ("auth", 2.5),
                ("authorization", 2.5),
                ("login", 2.5),
                ("log in", 2.5),
                ("password", 2.5),
                ("credential", 2.5),
                ("compliance", 2.5),
                ("secure", 2.0),
                ("permission", 2.0),
                ("token", 1.5),
            ],
            &[Read, Write, Execute],
        ),
        SpecialistProfile::new(
            SpecialistId::Incident,
            CostTier::Premium,
            &[
                ("production outage", 3.5),
                ("incident", 3.0),
                ("outage", 3.0),
                ("hotfix", 3.0),
                ("sev1", 3.0),
                ("crash", 2.5),
                ("returning 500", 2.5),
                ("returns 500", 2.5),
                ("500 error", 2.5),
                ("http 500", 2.5),
                ("returns 502", 2.5),
                ("bad gateway", 2.5),
                ("http 502", 2.5),
                ("http 503", 2.5),
                ("service unavailable", 2.5),
                ("cannot log in", 2.0),
                ("rollback", 2.0),
                ("broken", 1.5),
                ("down", 1.5),
                ("failing", 1.5),
                ("error", 0.5),
                ("issue", 0.5),
                ("production", 0.4),
            ],
            &[Read, Write, Execute, Network],
        ),
        SpecialistProfile::new(
            SpecialistId::Testing,
            CostTier::Economy,
            &[
                ("testing", 3.0),
                ("qa", 3.0),
                ("verification", 3.0),
                ("unit test", 3.0),
                ("integration test", 3.0),
                ("test", 2.5),
                ("verify", 2.5),
                ("coverage", 2.5),
                ("e2e", 2.5),
                ("flaky", 2.5),
                ("load test", 2.5),
                ("regression", 2.0),
                ("validate", 1.5),
                ("validation", 1.5),
                ("acceptance", 1.5),
            ],
            &[Read, Execute],
        ),
        SpecialistProfile::new(
            SpecialistId::Documentation,
            CostTier::Economy,
            &[
                ("documentation", 3.0),
                ("docs", 3.0),
                ("readme", 3.0),
                ("typo", 3.0),
                ("changelog", 3.0),
                ("doc", 2.5),
                ("tutorial", 2.5),
                ("wiki", 2.5),
                ("spelling", 2.5),
                ("guide", 2.0),
                ("onboarding", 1.5),
                ("code comment", 2.0),
                ("doc comment", 2.0),
                ("docstring", 2.0),
                ("note", 0.5),
            ],
            &[Read, Write],
        ),
    ]
}
