//! Weighted re-scoring of merged search results.
//!
//! [`rank`] is the primary pass. The `rerank_*`, [`diversify`] and
//! [`filter_min_score`] helpers post-process an already ranked list and always
//! return a fresh `Vec`.

use crate::data::{Category, EntityRecord};
use crate::error::ConfigError;
use crate::matcher::{MatchKind, MatchedField};
use crate::normalize::{Script, detect_script, dominant_script};
use crate::search::{MatchResult, to_percent};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Fixed popularity nudge per category.
const POPULARITY: [(Category, f64); 3] = [
    (Category::Reciter, 0.03),
    (Category::Chapter, 0.02),
    (Category::Term, 0.01),
];

pub fn popularity(category: Category) -> f64 {
    POPULARITY
        .iter()
        .find(|(c, _)| *c == category)
        .map(|(_, weight)| *weight)
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryWeights {
    pub reciter: f64,
    pub chapter: f64,
    pub term: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            reciter: 0.05,
            chapter: 0.04,
            term: 0.02,
        }
    }
}

impl CategoryWeights {
    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Reciter => self.reciter,
            Category::Chapter => self.chapter,
            Category::Term => self.term,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingWeights {
    pub exact_bonus: f64,
    pub apply_exact_bonus: bool,
    pub category_bonus: CategoryWeights,
    /// Added when the query script matches the majority script of the result's
    /// display text.
    pub language_bonus: f64,
    /// Fraction of the running score removed from fuzzy matches.
    pub fuzzy_penalty: f64,
}

impl RankingWeights {
    /// Rejects weights that could push a score outside `[0, 1]` or make it NaN.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let named = [
            ("exact_bonus", self.exact_bonus),
            ("category_bonus.reciter", self.category_bonus.reciter),
            ("category_bonus.chapter", self.category_bonus.chapter),
            ("category_bonus.term", self.category_bonus.term),
            ("language_bonus", self.language_bonus),
            ("fuzzy_penalty", self.fuzzy_penalty),
        ];
        for (name, value) in named {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight { name, value });
            }
        }
        if self.fuzzy_penalty > 1.0 {
            return Err(ConfigError::PenaltyAboveOne(self.fuzzy_penalty));
        }
        Ok(())
    }
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            exact_bonus: 0.1,
            apply_exact_bonus: true,
            category_bonus: CategoryWeights::default(),
            language_bonus: 0.05,
            fuzzy_penalty: 0.15,
        }
    }
}

/// Every adjustment applied to one result, in application order.
///
/// Penalties are stored as the positive amount that was subtracted, so
/// [`ScoreBreakdown::total`] reproduces the final score exactly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub base: f64,
    pub exact_bonus: f64,
    pub category_bonus: f64,
    pub language_bonus: f64,
    pub fuzzy_penalty: f64,
    pub popularity: f64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub recency: f64,
}

fn is_zero(value: &f64) -> bool {
    *value == 0.0
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        let raw = self.base + self.exact_bonus + self.category_bonus + self.language_bonus
            - self.fuzzy_penalty
            + self.popularity
            + self.recency;
        if raw.is_nan() {
            0.0
        } else {
            raw.clamp(0.0, 1.0)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult {
    pub record: Arc<EntityRecord>,
    pub kind: MatchKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<MatchedField>,
    /// Final score, clamped into `[0, 1]`.
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

impl RankedResult {
    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn category(&self) -> Category {
        self.record.category
    }

    pub fn base_score(&self) -> f64 {
        self.breakdown.base
    }

    pub fn percent(&self) -> u8 {
        to_percent(self.score)
    }
}

fn sort_by_score(results: &mut [RankedResult]) {
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
}

fn rank_one(result: MatchResult, query_script: Script, weights: &RankingWeights) -> RankedResult {
    let mut breakdown = ScoreBreakdown {
        base: result.score,
        ..ScoreBreakdown::default()
    };
    let mut running = result.score;

    if weights.apply_exact_bonus && result.kind == MatchKind::Exact {
        breakdown.exact_bonus = weights.exact_bonus;
        running += weights.exact_bonus;
    }

    breakdown.category_bonus = weights.category_bonus.get(result.record.category);
    running += breakdown.category_bonus;

    if dominant_script(&result.record.display_text()) == query_script {
        breakdown.language_bonus = weights.language_bonus;
        running += weights.language_bonus;
    }

    if result.kind == MatchKind::Fuzzy {
        breakdown.fuzzy_penalty = running * weights.fuzzy_penalty;
    }

    breakdown.popularity = popularity(result.record.category);

    RankedResult {
        record: result.record,
        kind: result.kind,
        matched: result.matched,
        score: breakdown.total(),
        breakdown,
    }
}

/// Re-scores merged results and sorts them, best first. Ties keep input order.
pub fn rank(results: Vec<MatchResult>, query: &str, weights: &RankingWeights) -> Vec<RankedResult> {
    let query_script = detect_script(query);
    let mut ranked: Vec<RankedResult> = results
        .into_iter()
        .map(|result| rank_one(result, query_script, weights))
        .collect();
    sort_by_score(&mut ranked);
    ranked
}

/// Boosts recently opened entities. `recent_ids` is most recent first; the
/// boost decays linearly from `weight` for the newest entry.
pub fn rerank_by_recency<S: AsRef<str>>(
    results: &[RankedResult],
    recent_ids: &[S],
    weight: f64,
) -> Vec<RankedResult> {
    let total = recent_ids.len() as f64;
    let positions: HashMap<&str, usize> = recent_ids
        .iter()
        .enumerate()
        .rev()
        .map(|(position, id)| (id.as_ref(), position))
        .collect();

    let mut reranked: Vec<RankedResult> = results
        .iter()
        .map(|result| {
            let mut result = result.clone();
            if let Some(&position) = positions.get(result.id()) {
                result.breakdown.recency = weight * (total - position as f64) / total;
                result.score = result.breakdown.total();
            }
            result
        })
        .collect();
    sort_by_score(&mut reranked);
    reranked
}

/// Groups results by category popularity, keeping score order inside a group.
pub fn rerank_by_popularity(results: &[RankedResult]) -> Vec<RankedResult> {
    let mut reranked = results.to_vec();
    reranked.sort_by(|a, b| popularity(b.category()).total_cmp(&popularity(a.category())));
    reranked
}

/// Caps how many results any single category may contribute.
pub fn diversify(results: &[RankedResult], max_per_category: usize) -> Vec<RankedResult> {
    let mut seen: HashMap<Category, usize> = HashMap::new();
    results
        .iter()
        .filter(|result| {
            let count = seen.entry(result.category()).or_default();
            *count += 1;
            *count <= max_per_category
        })
        .cloned()
        .collect()
}

pub fn filter_min_score(results: &[RankedResult], min: f64) -> Vec<RankedResult> {
    results.iter().filter(|result| result.score >= min).cloned().collect()
}
