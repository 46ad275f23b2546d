use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use taskforge_core::specialist::{MatchResult, SpecialistProfile, ToolCapability};

use crate::registry::Registry;

/// Tokenized, case-folded view of a piece of free text.
///
/// Single-word keywords are looked up in the token set; multi-word
/// keywords must appear as consecutive whole tokens.
#[derive(Debug, Clone)]
pub struct TextIndex {
    tokens: HashSet<String>,
    joined: String,
    word_count: usize,
}

impl TextIndex {
    pub fn new(text: &str) -> Self {
        let words: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(|w| w.to_lowercase())
            .collect();

        let mut tokens = HashSet::with_capacity(words.len() * 2);
        for word in &words {
            if let Some(singular) = singular_form(word) {
                tokens.insert(singular.to_string());
            }
            tokens.insert(word.clone());
        }

        Self {
            joined: format!(" {} ", words.join(" ")),
            word_count: words.len(),
            tokens,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.word_count == 0
    }

    pub fn word_count(&self) -> usize {
        self.word_count
    }

    /// Whether a lowercase keyword or phrase occurs in the text.
    pub fn contains(&self, keyword: &str) -> bool {
        if keyword.contains(' ') {
            self.joined.contains(&format!(" {keyword} "))
        } else {
            self.tokens.contains(keyword)
        }
    }
}

fn singular_form(word: &str) -> Option<&str> {
    if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") {
        Some(&word[..word.len() - 1])
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatcherSettings {
    /// Raw score at which confidence reaches ~63%. Larger values flatten
    /// the curve.
    pub saturation: f64,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self { saturation: 3.0 }
    }
}

/// Scores free text against every profile in the registry.
#[derive(Debug, Clone)]
pub struct Matcher {
    registry: Arc<Registry>,
    settings: MatcherSettings,
}

impl Matcher {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::with_settings(registry, MatcherSettings::default())
    }

    pub fn with_settings(registry: Arc<Registry>, settings: MatcherSettings) -> Self {
        Self { registry, settings }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Ranked matches, best first. Specialists with no matched keyword are
    /// omitted, so blank text yields an empty result.
    pub fn rank(&self, text: &str) -> Vec<MatchResult> {
        self.rank_eligible(text, &[])
    }

    /// Like `rank`, restricted to specialists allowed every listed tool.
    pub fn rank_eligible(&self, text: &str, tools: &[ToolCapability]) -> Vec<MatchResult> {
        let index = TextIndex::new(text);
        if index.is_empty() {
            return Vec::new();
        }
        self.rank_index(&index, tools)
    }

    pub fn rank_index(&self, index: &TextIndex, tools: &[ToolCapability]) -> Vec<MatchResult> {
        let mut results: Vec<MatchResult> = self
            .registry
            .eligible(tools)
            .filter_map(|profile| self.score(profile, index))
            .collect();
        results.sort_by(compare_results);
        results
    }

    pub fn best(&self, text: &str) -> Option<MatchResult> {
        self.rank(text).into_iter().next()
    }

    /// Saturating confidence: `1 - e^(-raw / k)`. Independent of text
    /// length, so specific short descriptions are never penalized.
    pub fn confidence(&self, raw_score: f64) -> f64 {
        if raw_score <= 0.0 {
            return 0.0;
        }
        (1.0 - (-raw_score / self.settings.saturation).exp()).clamp(0.0, 1.0)
    }

    fn score(&self, profile: &SpecialistProfile, index: &TextIndex) -> Option<MatchResult> {
        let mut raw_score = 0.0;
        let mut matched = BTreeSet::new();
        for (keyword, weight) in &profile.capability_keywords {
            if index.contains(keyword) {
                raw_score += weight;
                matched.insert(keyword.clone());
            }
        }
        if matched.is_empty() {
            return None;
        }

        let confidence = self.confidence(raw_score);
        let keywords: Vec<&str> = matched.iter().map(String::as_str).collect();
        let reasoning = format!(
            "{} matched {} keyword(s) [{}] for a raw score of {:.2} (confidence {:.2})",
            profile.id.display_name(),
            matched.len(),
            keywords.join(", "),
            raw_score,
            confidence
        );

        Some(MatchResult {
            specialist_id: profile.id,
            raw_score,
            confidence,
            matched_keywords: matched,
            reasoning,
        })
    }
}

/// Higher raw score first, then fixed specialist rank, then id.
fn compare_results(a: &MatchResult, b: &MatchResult) -> Ordering {
    b.raw_score
        .partial_cmp(&a.raw_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            a.specialist_id
                .tie_break_rank()
                .cmp(&b.specialist_id.tie_break_rank())
        })
        .then_with(|| a.specialist_id.as_str().cmp(b.specialist_id.as_str()))
}
