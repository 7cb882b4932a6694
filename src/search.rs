//! Per-collection search and the id-keyed merge across collections.

use crate::catalog::{CatalogSnapshot, Collection, IndexedRecord};
use crate::data::EntityRecord;
use crate::matcher::{MatchKind, MatchStrategies, MatchedField, Matcher, PreparedQuery};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tracing::trace;

pub const DEFAULT_LIMIT: usize = 10;
pub const DEFAULT_MIN_SCORE: f64 = 0.4;
/// Collections at least this large are scored on the rayon pool.
const PARALLEL_THRESHOLD: usize = 2048;
/// Each collection pass fetches `limit * OVERFETCH` rows so re-ranking has room.
const OVERFETCH: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub limit: usize,
    pub min_score: f64,
    pub include_partial: bool,
    pub include_initials: bool,
    pub bilingual: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            min_score: DEFAULT_MIN_SCORE,
            include_partial: true,
            include_initials: true,
            bilingual: true,
        }
    }
}

impl SearchOptions {
    pub fn strategies(&self) -> MatchStrategies {
        MatchStrategies {
            include_partial: self.include_partial,
            include_initials: self.include_initials,
            bilingual: self.bilingual,
            min_score: self.min_score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub record: Arc<EntityRecord>,
    pub score: f64,
    pub kind: MatchKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<MatchedField>,
}

impl MatchResult {
    pub fn id(&self) -> &str {
        &self.record.id
    }

    /// Score on the 0..100 scale used for display.
    pub fn percent(&self) -> u8 {
        to_percent(self.score)
    }
}

pub fn to_percent(score: f64) -> u8 {
    (score.clamp(0.0, 1.0) * 100.0).round() as u8
}

fn sort_by_score(results: &mut [MatchResult]) {
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
}

/// Scores every record of one collection. Ties keep catalog order.
pub fn search_collection(
    query: &PreparedQuery,
    collection: &Collection,
    matcher: &Matcher,
    limit: usize,
    min_score: f64,
) -> Vec<MatchResult> {
    let score = |indexed: &IndexedRecord| {
        matcher
            .match_record(query, indexed)
            .filter(|m| m.score >= min_score)
            .map(|m| MatchResult {
                record: Arc::clone(&indexed.record),
                score: m.score,
                kind: m.kind,
                matched: Some(m.field),
            })
    };

    let records = collection.records();
    let mut results: Vec<MatchResult> = if records.len() >= PARALLEL_THRESHOLD {
        records.par_iter().filter_map(score).collect()
    } else {
        records.iter().filter_map(score).collect()
    };
    sort_by_score(&mut results);
    results.truncate(limit);
    results
}

/// Runs [`search_collection`] over every collection and merges by entity id.
pub fn search_catalog(
    query: &str,
    snapshot: &CatalogSnapshot,
    options: &SearchOptions,
) -> Vec<MatchResult> {
    let Some(prepared) = PreparedQuery::new(query) else {
        return Vec::new();
    };
    if options.limit == 0 {
        return Vec::new();
    }
    let matcher = Matcher::new(options.strategies());
    let per_collection = options.limit.saturating_mul(OVERFETCH);

    let passes = snapshot.collections().iter().map(|collection| {
        search_collection(
            &prepared,
            collection,
            &matcher,
            per_collection,
            options.min_score,
        )
    });
    let mut merged = merge_by_id(passes);
    merged.retain(|result| result.score >= options.min_score);
    sort_by_score(&mut merged);
    merged
}

/// Keeps one result per id: the higher score wins, the first seen wins a tie.
/// Output is in first-seen order.
pub fn merge_by_id<I>(passes: I) -> Vec<MatchResult>
where
    I: IntoIterator<Item = Vec<MatchResult>>,
{
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut merged: Vec<MatchResult> = Vec::new();
    for result in passes.into_iter().flatten() {
        match slots.entry(result.record.id.clone()) {
            Entry::Occupied(slot) => {
                let current = &mut merged[*slot.get()];
                if result.score > current.score {
                    trace!(
                        id = %result.record.id,
                        from = current.score,
                        to = result.score,
                        "Replacing merged result"
                    );
                    *current = result;
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(merged.len());
                merged.push(result);
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Category, EntityRecord, NameSet};
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn snapshot() -> CatalogSnapshot {
        let reciters = vec![
            EntityRecord::new("r-sudais", Category::Reciter)
                .with_latin(NameSet::new("Abdul Rahman Al-Sudais"))
                .with_arabic(NameSet::new("عبد الرحمن السديس")),
            EntityRecord::new("r-shuraim", Category::Reciter)
                .with_latin(NameSet::new("Saud Al-Shuraim"))
                .with_arabic(NameSet::new("سعود الشريم")),
            EntityRecord::new("r-basit", Category::Reciter)
                .with_latin(NameSet::new("Abdul Basit Abdul Samad"))
                .with_arabic(NameSet::new("عبد الباسط عبد الصمد")),
        ];
        let chapters = vec![
            EntityRecord::new("c-1", Category::Chapter)
                .with_latin(NameSet::new("Al-Fatihah"))
                .with_arabic(NameSet::new("الفاتحة"))
                .with_number(1),
            EntityRecord::new("c-18", Category::Chapter)
                .with_latin(NameSet::new("Al-Kahf"))
                .with_arabic(NameSet::new("الكهف"))
                .with_number(18),
            EntityRecord::new("c-36", Category::Chapter)
                .with_latin(NameSet::new("Ya-Sin"))
                .with_arabic(NameSet::new("يس"))
                .with_number(36),
        ];
        let terms = vec![
            EntityRecord::new("t-tajweed", Category::Term)
                .with_latin(NameSet::new("Tajweed"))
                .with_arabic(NameSet::new("تجويد")),
        ];
        CatalogSnapshot::new(reciters, chapters, terms).unwrap()
    }

    fn result(id: &str, score: f64) -> MatchResult {
        MatchResult {
            record: Arc::new(EntityRecord::new(id, Category::Term)),
            score,
            kind: MatchKind::Fuzzy,
            matched: None,
        }
    }

    #[test]
    fn empty_query_returns_nothing() {
        let snapshot = snapshot();
        for query in ["", "   ", "\t\n", "--"] {
            assert!(search_catalog(query, &snapshot, &SearchOptions::default()).is_empty());
        }
    }

    #[test]
    fn empty_catalog_returns_nothing() {
        let snapshot = CatalogSnapshot::default();
        assert!(search_catalog("kahf", &snapshot, &SearchOptions::default()).is_empty());
    }

    #[test]
    fn strict_substring_hits_exactly_one_record() {
        let results = search_catalog("shura", &snapshot(), &SearchOptions::default());
        assert_eq!(results.len(), 1, "{results:?}");
        assert_eq!(results[0].id(), "r-shuraim");
        assert_eq!(results[0].kind, MatchKind::Partial);
        assert!(results[0].score > 0.0 && results[0].score < 1.0);
    }

    #[test]
    fn results_span_collections() {
        let results = search_catalog("abdul", &snapshot(), &SearchOptions::default());
        let ids: Vec<&str> = results.iter().map(MatchResult::id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"r-sudais") && ids.contains(&"r-basit"));

        let results = search_catalog("36", &snapshot(), &SearchOptions::default());
        assert_eq!(results[0].id(), "c-36");
        assert_eq!(results[0].kind, MatchKind::Exact);
    }

    #[test]
    fn collection_ties_keep_catalog_order() {
        let snapshot = snapshot();
        let query = PreparedQuery::new("abdul").unwrap();
        let collection = snapshot.collection(Category::Reciter).unwrap();
        let matcher = Matcher::new(SearchOptions::default().strategies());
        let all = search_collection(&query, collection, &matcher, 10, 0.0);
        assert!(all.len() >= 2);
        let limited = search_collection(&query, collection, &matcher, 1, 0.0);
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id(), all[0].id());
    }

    #[test]
    fn merge_keeps_higher_score_per_id() {
        let merged = merge_by_id(vec![
            vec![result("a", 0.5), result("b", 0.9)],
            vec![result("a", 0.7), result("b", 0.9), result("c", 0.1)],
        ]);
        let summary: Vec<(&str, f64)> = merged.iter().map(|r| (r.id(), r.score)).collect();
        assert_eq!(summary, vec![("a", 0.7), ("b", 0.9), ("c", 0.1)]);
    }

    #[test]
    fn percent_conversion() {
        assert_eq!(to_percent(0.875), 88);
        assert_eq!(to_percent(1.4), 100);
        assert_eq!(result("x", 0.5).percent(), 50);
    }

    proptest! {
        #[test]
        fn results_are_unique_and_sorted(query in "[a-zA-Z ]{1,12}") {
            let options = SearchOptions { min_score: 0.0, ..SearchOptions::default() };
            let results = search_catalog(&query, &snapshot(), &options);
            let unique: HashSet<&str> = results.iter().map(MatchResult::id).collect();
            prop_assert_eq!(unique.len(), results.len());
            prop_assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
        }

        #[test]
        fn raising_the_floor_never_adds_results(query in "[a-zA-Z ]{1,12}", low in 0.0f64..1.0, bump in 0.0f64..0.5) {
            let snapshot = snapshot();
            let loose = SearchOptions { min_score: low, ..SearchOptions::default() };
            let strict = SearchOptions { min_score: low + bump, ..SearchOptions::default() };
            let loose_count = search_catalog(&query, &snapshot, &loose).len();
            let strict_count = search_catalog(&query, &snapshot, &strict).len();
            prop_assert!(strict_count <= loose_count);
        }
    }
}
