//! Multi-strategy scoring of one query against one record.
//!
//! Each field runs a ladder of strategies from most to least specific and stops at
//! the first that fires. A record's score is the best field score. All scores are on
//! the 0..1 scale.

use crate::catalog::{FieldSource, IndexedField, IndexedRecord};
use crate::normalize::{NormalizedString, Script, is_latin_letter, normalize_text};
use crate::similarity::{bigram_similarity, canonical_similarity};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const EXACT_SCORE: f64 = 1.0;
pub const VARIANT_SCORE: f64 = 0.95;
pub const INITIALS_SCORE: f64 = 0.85;
pub const PREFIX_BASE: f64 = 0.8;
pub const PREFIX_RATIO_BONUS: f64 = 0.15;
pub const CONTAINS_SCORE: f64 = 0.7;
pub const ALL_TOKENS_SCORE: f64 = 0.6;
pub const FUZZY_SCALE: f64 = 0.8;
pub const BIGRAM_SCALE: f64 = 0.4;
pub const RELATED_SCALE: f64 = 0.6;

const MAX_ACRONYM_CHARS: usize = 5;
const MIN_ACRONYM_LETTERS: usize = 2;
/// Single-token queries shorter than this are only compared with whole fields.
const TOKEN_FUZZY_MIN_CHARS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Variant,
    Partial,
    Fuzzy,
    Related,
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MatchKind::Exact => "exact",
            MatchKind::Variant => "variant",
            MatchKind::Partial => "partial",
            MatchKind::Fuzzy => "fuzzy",
            MatchKind::Related => "related",
        };
        f.write_str(label)
    }
}

/// Which strategies may fire, and the floor the fuzzy fallback has to clear.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchStrategies {
    pub include_partial: bool,
    pub include_initials: bool,
    pub bilingual: bool,
    pub min_score: f64,
}

impl Default for MatchStrategies {
    fn default() -> Self {
        Self {
            include_partial: true,
            include_initials: true,
            bilingual: true,
            min_score: 0.0,
        }
    }
}

/// A query normalized once and reused against every record.
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    raw: String,
    canonical: NormalizedString,
    tokens: Vec<String>,
    acronym: Option<String>,
    number: Option<u32>,
}

impl PreparedQuery {
    /// Returns `None` when nothing searchable is left after normalization.
    pub fn new(raw: &str) -> Option<Self> {
        let canonical = normalize_text(raw);
        if canonical.is_empty() {
            return None;
        }
        let tokens = canonical
            .as_str()
            .split(' ')
            .map(str::to_string)
            .collect();
        let number = canonical.as_str().parse::<u32>().ok();
        Some(Self {
            raw: raw.to_string(),
            acronym: acronym_of(raw),
            canonical,
            tokens,
            number,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn canonical(&self) -> &str {
        self.canonical.as_str()
    }

    pub fn script(&self) -> Script {
        self.canonical.script()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn number(&self) -> Option<u32> {
        self.number
    }
}

/// Lowercased letters of a short letters-and-spaces Latin query.
fn acronym_of(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.chars().count() > MAX_ACRONYM_CHARS {
        return None;
    }
    if !trimmed
        .chars()
        .all(|c| c.is_whitespace() || is_latin_letter(c))
    {
        return None;
    }
    let letters: String = trimmed
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    (letters.chars().count() >= MIN_ACRONYM_LETTERS).then_some(letters)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldScore {
    pub score: f64,
    pub kind: MatchKind,
}

impl FieldScore {
    fn new(score: f64, kind: MatchKind) -> Self {
        Self { score, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedField {
    pub source: FieldSource,
    pub text: String,
}

/// Best field of one record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordMatch {
    pub score: f64,
    pub kind: MatchKind,
    pub field: MatchedField,
}

/// Scores `query` against a single candidate string, both given as surface text.
pub fn match_field(
    query: &str,
    candidate: &str,
    strategies: &MatchStrategies,
) -> Option<FieldScore> {
    let query = PreparedQuery::new(query)?;
    let candidate = normalize_text(candidate);
    if candidate.is_empty() {
        return None;
    }
    ladder(&query, candidate.as_str(), false, None, strategies)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Matcher {
    strategies: MatchStrategies,
}

impl Matcher {
    pub fn new(strategies: MatchStrategies) -> Self {
        Self { strategies }
    }

    pub fn strategies(&self) -> &MatchStrategies {
        &self.strategies
    }

    /// Scores every eligible field of `record` and keeps the best one. The first
    /// field wins a tie, so primary names beat variants and aliases.
    pub fn match_record(
        &self,
        query: &PreparedQuery,
        record: &IndexedRecord,
    ) -> Option<RecordMatch> {
        let mut best: Option<(FieldScore, &IndexedField)> = None;
        for field in &record.fields {
            if !self.field_is_eligible(query, field) {
                continue;
            }
            let Some(scored) = self.score_field(query, field, record.initials.as_deref()) else {
                continue;
            };
            let improves = best
                .as_ref()
                .is_none_or(|(current, _)| scored.score > current.score);
            if improves {
                best = Some((scored, field));
            }
        }
        best.map(|(scored, field)| RecordMatch {
            score: scored.score,
            kind: scored.kind,
            field: MatchedField {
                source: field.source,
                text: field.text.clone(),
            },
        })
    }

    fn field_is_eligible(&self, query: &PreparedQuery, field: &IndexedField) -> bool {
        if self.strategies.bilingual || query.script() == Script::Mixed {
            return true;
        }
        field
            .source
            .script()
            .is_none_or(|script| script == query.script())
    }

    fn score_field(
        &self,
        query: &PreparedQuery,
        field: &IndexedField,
        initials: Option<&str>,
    ) -> Option<FieldScore> {
        let strategies = &self.strategies;
        match field.source {
            FieldSource::Number => (query.number()?.to_string() == field.canonical)
                .then(|| FieldScore::new(EXACT_SCORE, MatchKind::Exact)),
            FieldSource::Primary(Script::Latin) => {
                ladder(query, &field.canonical, false, initials, strategies)
            }
            FieldSource::Primary(_) => ladder(query, &field.canonical, false, None, strategies),
            FieldSource::Variant(_) | FieldSource::Alias => {
                ladder(query, &field.canonical, true, None, strategies)
            }
            FieldSource::Related => ladder(query, &field.canonical, false, None, strategies).map(
                |scored| FieldScore::new(scored.score * RELATED_SCALE, MatchKind::Related),
            ),
        }
    }
}

/// The strategy ladder over canonical strings. `is_variant` marks variant and alias
/// fields, whose exact hits count as `Variant`. `initials` is only supplied for the
/// Latin primary name.
fn ladder(
    query: &PreparedQuery,
    candidate: &str,
    is_variant: bool,
    initials: Option<&str>,
    strategies: &MatchStrategies,
) -> Option<FieldScore> {
    let q = query.canonical();

    if q == candidate {
        return Some(if is_variant {
            FieldScore::new(VARIANT_SCORE, MatchKind::Variant)
        } else {
            FieldScore::new(EXACT_SCORE, MatchKind::Exact)
        });
    }

    if strategies.include_initials
        && let (Some(acronym), Some(initials)) = (query.acronym.as_deref(), initials)
        && initials.starts_with(acronym)
    {
        return Some(FieldScore::new(INITIALS_SCORE, MatchKind::Variant));
    }

    if strategies.include_partial
        && let Some(scored) = partial(query, candidate)
    {
        return Some(scored);
    }

    fuzzy(query, candidate, strategies.min_score)
}

fn partial(query: &PreparedQuery, candidate: &str) -> Option<FieldScore> {
    let q = query.canonical();

    if candidate.starts_with(q) {
        let ratio = q.chars().count() as f64 / candidate.chars().count() as f64;
        return Some(FieldScore::new(
            PREFIX_BASE + PREFIX_RATIO_BONUS * ratio,
            MatchKind::Partial,
        ));
    }

    if candidate.contains(q) || q.contains(candidate) {
        return Some(FieldScore::new(CONTAINS_SCORE, MatchKind::Partial));
    }

    let tokens = query.tokens();
    if tokens.len() > 1 {
        let matched = tokens
            .iter()
            .filter(|token| candidate.contains(token.as_str()))
            .count();
        if matched == tokens.len() {
            return Some(FieldScore::new(ALL_TOKENS_SCORE, MatchKind::Partial));
        }
        if matched > 0 {
            let fraction = matched as f64 / tokens.len() as f64;
            return Some(FieldScore::new(
                ALL_TOKENS_SCORE * fraction,
                MatchKind::Partial,
            ));
        }
    }
    None
}

fn fuzzy(query: &PreparedQuery, candidate: &str, floor: f64) -> Option<FieldScore> {
    let q = query.canonical();
    let mut edit = canonical_similarity(q, candidate);
    if query.tokens().len() == 1 && q.chars().count() >= TOKEN_FUZZY_MIN_CHARS {
        for token in candidate.split(' ') {
            if token.chars().count() >= TOKEN_FUZZY_MIN_CHARS {
                edit = edit.max(canonical_similarity(q, token));
            }
        }
    }

    let edit = edit * FUZZY_SCALE;
    let score = if edit > 0.0 && edit >= floor {
        edit
    } else {
        bigram_similarity(q, candidate) * BIGRAM_SCALE
    };
    (score > 0.0).then(|| FieldScore::new(score, MatchKind::Fuzzy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Category, EntityRecord, NameSet};

    fn strategies() -> MatchStrategies {
        MatchStrategies {
            min_score: 0.4,
            ..MatchStrategies::default()
        }
    }

    fn best(query: &str, record: EntityRecord, strategies: MatchStrategies) -> Option<RecordMatch> {
        let query = PreparedQuery::new(query)?;
        Matcher::new(strategies).match_record(&query, &IndexedRecord::new(record))
    }

    fn sudais() -> EntityRecord {
        EntityRecord::new("sudais", Category::Reciter)
            .with_latin(
                NameSet::new("Abdul Rahman Al-Sudais").with_variants(["Abdurrahman Sudais"]),
            )
            .with_arabic(NameSet::new("عبد الرحمن السديس"))
            .with_aliases(["Imam of the Haram"])
    }

    fn kahf() -> EntityRecord {
        EntityRecord::new("chapter-18", Category::Chapter)
            .with_latin(NameSet::new("Al-Kahf"))
            .with_arabic(NameSet::new("الكهف"))
            .with_related(["The Cave"])
            .with_number(18)
    }

    #[test]
    fn exact_beats_everything() {
        let m = best("al-kahf", kahf(), strategies()).unwrap();
        assert_eq!(m.kind, MatchKind::Exact);
        assert_eq!(m.score, EXACT_SCORE);
        assert_eq!(m.field.source, FieldSource::Primary(Script::Latin));

        let m = best("الْكَهْف", kahf(), strategies()).unwrap();
        assert_eq!(m.kind, MatchKind::Exact);
        assert_eq!(m.field.source, FieldSource::Primary(Script::Arabic));
    }

    #[test]
    fn variant_and_alias_exact() {
        let m = best("abdurrahman sudais", sudais(), strategies()).unwrap();
        assert_eq!(m.kind, MatchKind::Variant);
        assert_eq!(m.score, VARIANT_SCORE);

        let m = best("imam of the haram", sudais(), strategies()).unwrap();
        assert_eq!(m.kind, MatchKind::Variant);
        assert_eq!(m.field.source, FieldSource::Alias);
    }

    #[test]
    fn prefix_scales_with_coverage() {
        let short = best("abd", sudais(), strategies()).unwrap();
        let long = best("abdul rahman", sudais(), strategies()).unwrap();
        assert_eq!(short.kind, MatchKind::Partial);
        assert!(short.score > PREFIX_BASE && short.score < VARIANT_SCORE);
        assert!(long.score > short.score);
    }

    #[test]
    fn contains_and_token_subsets() {
        let m = best("sudais", sudais(), strategies()).unwrap();
        assert_eq!((m.kind, m.score), (MatchKind::Partial, CONTAINS_SCORE));

        let m = best("sudais abdul", sudais(), strategies()).unwrap();
        assert_eq!((m.kind, m.score), (MatchKind::Partial, ALL_TOKENS_SCORE));

        let m = best("sudais yasser", sudais(), strategies()).unwrap();
        assert_eq!(m.kind, MatchKind::Partial);
        assert!((m.score - ALL_TOKENS_SCORE / 2.0).abs() < 1e-9);
    }

    #[test]
    fn partial_strategies_can_be_disabled() {
        let options = MatchStrategies {
            include_partial: false,
            ..strategies()
        };
        let m = best("sudais", sudais(), options).unwrap();
        assert_eq!(m.kind, MatchKind::Fuzzy);
    }

    #[test]
    fn typos_fall_back_to_fuzzy() {
        let m = best("sudias", sudais(), strategies()).unwrap();
        assert_eq!(m.kind, MatchKind::Fuzzy);
        assert!(m.score >= 0.4 && m.score < CONTAINS_SCORE, "{}", m.score);
    }

    #[test]
    fn initials_match_two_token_names() {
        let record = EntityRecord::new("afasy", Category::Reciter)
            .with_latin(NameSet::new("Mishary Alafasy"));
        let m = best("MA", record.clone(), strategies()).unwrap();
        assert_eq!(m.kind, MatchKind::Variant);
        assert_eq!(m.score, INITIALS_SCORE);

        let without = MatchStrategies {
            include_initials: false,
            ..strategies()
        };
        assert!(best("MA", record, without).is_none_or(|m| m.kind != MatchKind::Variant));
    }

    #[test]
    fn initials_skip_particles_and_long_queries() {
        let record = EntityRecord::new("muaiqly", Category::Reciter)
            .with_latin(NameSet::new("Maher Al-Muaiqly"));
        let m = best("M M", record.clone(), strategies()).unwrap();
        assert_eq!(m.kind, MatchKind::Variant);
        assert!(PreparedQuery::new("maher al").unwrap().acronym.is_none());
        assert!(PreparedQuery::new("m.a").unwrap().acronym.is_none());
    }

    #[test]
    fn numbers_only_match_exactly() {
        let m = best("18", kahf(), strategies()).unwrap();
        assert_eq!((m.kind, m.field.source), (MatchKind::Exact, FieldSource::Number));
        let m = best("١٨", kahf(), strategies()).unwrap();
        assert_eq!(m.field.source, FieldSource::Number);
        assert!(best("1", kahf(), strategies()).is_none());
    }

    #[test]
    fn related_keywords_score_lower() {
        let m = best("the cave", kahf(), strategies()).unwrap();
        assert_eq!(m.kind, MatchKind::Related);
        assert!((m.score - RELATED_SCALE).abs() < 1e-9);
    }

    #[test]
    fn monolingual_mode_skips_other_script_fields() {
        let misfiled = EntityRecord::new("c", Category::Chapter).with_arabic(NameSet::new("Kahf"));
        let bilingual = best("kahf", misfiled.clone(), strategies()).unwrap();
        assert_eq!(bilingual.kind, MatchKind::Exact);

        let monolingual = MatchStrategies {
            bilingual: false,
            ..strategies()
        };
        assert!(best("kahf", misfiled, monolingual).is_none());
    }

    #[test]
    fn transliteration_variants_score_identically() {
        let record = EntityRecord::new("ayyub", Category::Reciter)
            .with_latin(NameSet::new("Muhammad Ayyub"));
        let scores: Vec<(f64, MatchKind)> = ["Mohamed", "Muhammad", "Mohammed"]
            .iter()
            .map(|q| {
                let m = best(q, record.clone(), strategies()).unwrap();
                (m.score, m.kind)
            })
            .collect();
        assert!(scores.windows(2).all(|pair| pair[0] == pair[1]), "{scores:?}");
        assert_eq!(scores[0].1, MatchKind::Partial);
    }

    #[test]
    fn empty_inputs_never_match() {
        assert!(PreparedQuery::new("   ").is_none());
        assert!(PreparedQuery::new("?!").is_none());
        assert!(match_field("kahf", "", &strategies()).is_none());
        assert!(best("kahf", EntityRecord::new("blank", Category::Term), strategies()).is_none());
    }

    #[test]
    fn match_field_uses_the_same_ladder() {
        let scored = match_field("Kahf", "Al-Kahf", &strategies()).unwrap();
        assert_eq!(scored.kind, MatchKind::Exact);
        let scored = match_field("Kah", "Al-Kahf", &strategies()).unwrap();
        assert_eq!(scored.kind, MatchKind::Partial);
    }
}
