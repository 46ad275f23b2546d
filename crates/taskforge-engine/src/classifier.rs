use taskforge_core::assessment::{ComplexityAssessment, ComplexityTier};
use taskforge_core::specialist::{MatchResult, SpecialistId};
use taskforge_core::task::TaskInput;
use tracing::debug;

use crate::matcher::{Matcher, TextIndex};
use crate::signals::{DetectedSignals, SignalTable};

pub const BASELINE_CRITERION: &str = "Task completed to specification";

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierSettings {
    /// Matches below this confidence are not required specialists, except
    /// the single best match.
    pub confidence_floor: f64,
    /// A match is only required when at least one of its matched keywords
    /// weighs this much. Generic vocabulary below it never qualifies alone.
    pub min_anchor_weight: f64,
    pub max_specialists: usize,
    /// Assigned when nothing in the text matches any profile.
    pub fallback_specialist: SpecialistId,
    pub base_hours: f64,
    pub hours_per_extra_specialist: f64,
    pub length_hours_per_word: f64,
    /// Cap on the description-length contribution.
    pub max_length_hours: f64,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            confidence_floor: 0.15,
            min_anchor_weight: 1.0,
            max_specialists: 4,
            fallback_specialist: SpecialistId::Backend,
            base_hours: 1.5,
            hours_per_extra_specialist: 3.0,
            length_hours_per_word: 0.01,
            max_length_hours: 2.0,
        }
    }
}

/// Estimates effort, priority and risk for a task. Pure and deterministic.
#[derive(Debug, Clone)]
pub struct Classifier {
    matcher: Matcher,
    signals: SignalTable,
    settings: ClassifierSettings,
}

impl Classifier {
    pub fn new(matcher: Matcher, signals: SignalTable, settings: ClassifierSettings) -> Self {
        Self {
            matcher,
            signals,
            settings,
        }
    }

    pub fn settings(&self) -> &ClassifierSettings {
        &self.settings
    }

    pub fn detect_signals(&self, input: &TaskInput) -> DetectedSignals {
        self.signals.detect(&TextIndex::new(&input.full_text()))
    }

    pub fn classify(&self, input: &TaskInput) -> ComplexityAssessment {
        let index = TextIndex::new(&input.full_text());
        let matches = self.matcher.rank_index(&index, &[]);
        let required = self.required_specialists(&matches);
        self.assess(&index, required)
    }

    /// Classify with a caller-chosen specialist set; the matcher is skipped.
    pub fn classify_with(
        &self,
        input: &TaskInput,
        specialists: &[SpecialistId],
    ) -> ComplexityAssessment {
        let index = TextIndex::new(&input.full_text());
        let mut required: Vec<SpecialistId> = Vec::with_capacity(specialists.len());
        for id in specialists {
            if !required.contains(id) {
                required.push(*id);
            }
        }
        if required.is_empty() {
            required.push(self.settings.fallback_specialist);
        }
        self.assess(&index, required)
    }

    /// Top anchored matches above the floor, capped; never empty.
    pub fn required_specialists(&self, matches: &[MatchResult]) -> Vec<SpecialistId> {
        let mut required: Vec<SpecialistId> = matches
            .iter()
            .filter(|m| m.confidence >= self.settings.confidence_floor && self.is_anchored(m))
            .take(self.settings.max_specialists)
            .map(|m| m.specialist_id)
            .collect();
        if required.is_empty() {
            required.push(
                matches
                    .first()
                    .map(|m| m.specialist_id)
                    .unwrap_or(self.settings.fallback_specialist),
            );
        }
        required
    }

    fn is_anchored(&self, result: &MatchResult) -> bool {
        let Some(profile) = self.matcher.registry().get(result.specialist_id) else {
            return false;
        };
        result.matched_keywords.iter().any(|keyword| {
            profile
                .capability_keywords
                .get(keyword)
                .is_some_and(|w| *w >= self.settings.min_anchor_weight)
        })
    }

    fn assess(&self, index: &TextIndex, required: Vec<SpecialistId>) -> ComplexityAssessment {
        let signals = self.signals.detect(index);

        let specialist_hours =
            self.settings.hours_per_extra_specialist * (required.len().saturating_sub(1)) as f64;
        let length_hours = (index.word_count() as f64 * self.settings.length_hours_per_word)
            .min(self.settings.max_length_hours);
        let raw_hours = self.settings.base_hours + specialist_hours + signals.hours + length_hours;
        let estimated_hours = round_tenth(raw_hours.max(0.5));
        let tier = ComplexityTier::from_hours(estimated_hours);

        let mut risk_factors = signals.risks.clone();
        if required.len() >= 3 {
            risk_factors.push(format!(
                "Coordination across {} specializations",
                required.len()
            ));
        }

        let mut success_criteria = vec![BASELINE_CRITERION.to_string()];
        for criterion in &signals.criteria {
            if !success_criteria.contains(criterion) {
                success_criteria.push(criterion.clone());
            }
        }

        debug!(
            tier = %tier,
            hours = estimated_hours,
            specialists = required.len(),
            signal_hours = signals.hours,
            length_hours,
            "classified task"
        );

        ComplexityAssessment {
            tier,
            estimated_hours,
            priority: signals.priority(),
            required_specialist_ids: required,
            risk_factors,
            success_criteria,
        }
    }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
