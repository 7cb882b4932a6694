//! Immutable catalog snapshots.
//!
//! A snapshot is built once from the records a collaborator hands over, precomputes
//! every canonical field the matcher needs, and is never mutated afterwards. A
//! refresh builds a new snapshot and swaps it in whole.

use crate::data::{CatalogPayload, Category, EntityId, EntityRecord};
use crate::error::CatalogError;
use crate::normalize::{Script, is_particle, normalize_text};
use fst::automaton::Str;
use fst::{Automaton, IntoStreamer, Map, MapBuilder, Streamer};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::sync::Arc;
use tracing::debug;
use zstd::stream::decode_all;

/// Where a matched string came from inside a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    Primary(Script),
    Variant(Script),
    Alias,
    Related,
    Number,
}

impl FieldSource {
    /// Script the field is bound to, if any.
    pub fn script(&self) -> Option<Script> {
        match self {
            FieldSource::Primary(script) | FieldSource::Variant(script) => Some(*script),
            FieldSource::Alias | FieldSource::Related | FieldSource::Number => None,
        }
    }

    /// Fields that can be offered as name completions.
    fn is_name(&self) -> bool {
        matches!(
            self,
            FieldSource::Primary(_) | FieldSource::Variant(_) | FieldSource::Alias
        )
    }
}

#[derive(Debug, Clone)]
pub struct IndexedField {
    pub source: FieldSource,
    pub text: String,
    pub canonical: String,
}

/// A record together with the canonical forms of all of its searchable fields.
#[derive(Debug, Clone)]
pub struct IndexedRecord {
    pub record: Arc<EntityRecord>,
    pub fields: Vec<IndexedField>,
    /// First letters of the Latin primary name's tokens, particles skipped.
    pub initials: Option<String>,
}

impl IndexedRecord {
    pub fn new(record: EntityRecord) -> Self {
        let mut fields = Vec::new();
        let mut push = |source: FieldSource, text: &str| {
            let canonical = normalize_text(text).into_string();
            if !canonical.is_empty() {
                fields.push(IndexedField {
                    source,
                    text: text.to_string(),
                    canonical,
                });
            }
        };

        push(FieldSource::Primary(Script::Arabic), &record.arabic.primary);
        push(FieldSource::Primary(Script::Latin), &record.latin.primary);
        for variant in &record.arabic.variants {
            push(FieldSource::Variant(Script::Arabic), variant);
        }
        for variant in &record.latin.variants {
            push(FieldSource::Variant(Script::Latin), variant);
        }
        for alias in &record.aliases {
            push(FieldSource::Alias, alias);
        }
        for keyword in &record.related {
            push(FieldSource::Related, keyword);
        }
        if let Some(number) = record.number {
            push(FieldSource::Number, &number.to_string());
        }

        let initials = fields
            .iter()
            .find(|field| field.source == FieldSource::Primary(Script::Latin))
            .map(|field| initials_of(&field.canonical))
            .filter(|initials| !initials.is_empty());

        Self {
            record: Arc::new(record),
            fields,
            initials,
        }
    }

    pub fn id(&self) -> &str {
        &self.record.id
    }
}

fn initials_of(canonical: &str) -> String {
    let tokens: Vec<&str> = canonical.split(' ').collect();
    let significant: Vec<&str> = tokens
        .iter()
        .copied()
        .filter(|token| !is_particle(token))
        .collect();
    let tokens = if significant.is_empty() {
        tokens
    } else {
        significant
    };
    tokens
        .iter()
        .filter_map(|token| token.chars().next())
        .collect()
}

/// One homogeneous collection of records, in catalog order.
#[derive(Debug, Clone)]
pub struct Collection {
    category: Category,
    records: Vec<IndexedRecord>,
}

impl Collection {
    pub fn category(&self) -> Category {
        self.category
    }

    pub fn records(&self) -> &[IndexedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A canonical name with the entities that carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Completion {
    pub text: String,
    pub ids: Vec<EntityId>,
}

#[derive(Debug, Clone, Copy)]
struct RecordRef {
    collection: usize,
    position: usize,
}

pub struct CatalogSnapshot {
    collections: Vec<Collection>,
    by_id: HashMap<EntityId, RecordRef>,
    names: Map<Vec<u8>>,
    name_postings: Vec<Vec<RecordRef>>,
}

impl CatalogSnapshot {
    /// Builds a snapshot from one record list per collection.
    pub fn new(
        reciters: Vec<EntityRecord>,
        chapters: Vec<EntityRecord>,
        terms: Vec<EntityRecord>,
    ) -> Result<Self, CatalogError> {
        let supplied = [
            (Category::Reciter, reciters),
            (Category::Chapter, chapters),
            (Category::Term, terms),
        ];

        let mut by_id = HashMap::new();
        let mut collections = Vec::with_capacity(supplied.len());
        for (collection_idx, (category, records)) in supplied.into_iter().enumerate() {
            for (position, record) in records.iter().enumerate() {
                if record.id.trim().is_empty() {
                    return Err(CatalogError::EmptyId { category, position });
                }
                if record.category != category {
                    return Err(CatalogError::CategoryMismatch {
                        id: record.id.clone(),
                        expected: category,
                        found: record.category,
                    });
                }
                let slot = RecordRef {
                    collection: collection_idx,
                    position,
                };
                if by_id.insert(record.id.clone(), slot).is_some() {
                    return Err(CatalogError::DuplicateId(record.id.clone()));
                }
            }
            let records: Vec<IndexedRecord> =
                records.into_par_iter().map(IndexedRecord::new).collect();
            collections.push(Collection { category, records });
        }

        let (names, name_postings) = build_name_index(&collections)?;
        debug!(
            records = by_id.len(),
            names = name_postings.len(),
            "Built catalog snapshot"
        );
        Ok(Self {
            collections,
            by_id,
            names,
            name_postings,
        })
    }

    pub fn from_payload(payload: CatalogPayload) -> Result<Self, CatalogError> {
        Self::new(payload.reciters, payload.chapters, payload.terms)
    }

    /// Parses `{"reciters": [...], "chapters": [...], "terms": [...]}`.
    pub fn from_json(bytes: &[u8]) -> Result<Self, CatalogError> {
        let payload: CatalogPayload = serde_json::from_slice(bytes)?;
        Self::from_payload(payload)
    }

    /// Same as [`CatalogSnapshot::from_json`] for a zstd-compressed document.
    pub fn from_compressed_json(bytes: &[u8]) -> Result<Self, CatalogError> {
        let decompressed = decode_all(Cursor::new(bytes))?;
        Self::from_json(&decompressed)
    }

    pub fn collections(&self) -> &[Collection] {
        &self.collections
    }

    pub fn collection(&self, category: Category) -> Option<&Collection> {
        self.collections
            .iter()
            .find(|collection| collection.category == category)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Arc<EntityRecord>> {
        self.by_id
            .get(id)
            .map(|slot| &self.indexed(*slot).record)
    }

    /// Canonical names that start with the canonical form of `prefix`.
    pub fn complete(&self, prefix: &str, limit: usize) -> Vec<Completion> {
        let prefix = normalize_text(prefix);
        if prefix.is_empty() || limit == 0 {
            return Vec::new();
        }
        let automaton = Str::new(prefix.as_str()).starts_with();
        let mut stream = self.names.search(automaton).into_stream();
        let mut results = Vec::new();
        while let Some((key, value)) = stream.next() {
            let ids = self.name_postings[value as usize]
                .iter()
                .map(|slot| self.indexed(*slot).record.id.clone())
                .collect();
            results.push(Completion {
                text: String::from_utf8_lossy(key).into_owned(),
                ids,
            });
            if results.len() >= limit {
                break;
            }
        }
        results
    }

    fn indexed(&self, slot: RecordRef) -> &IndexedRecord {
        &self.collections[slot.collection].records[slot.position]
    }
}

impl Default for CatalogSnapshot {
    fn default() -> Self {
        Self {
            collections: Category::ALL
                .iter()
                .map(|category| Collection {
                    category: *category,
                    records: Vec::new(),
                })
                .collect(),
            by_id: HashMap::new(),
            names: MapBuilder::memory().into_map(),
            name_postings: Vec::new(),
        }
    }
}

fn build_name_index(
    collections: &[Collection],
) -> Result<(Map<Vec<u8>>, Vec<Vec<RecordRef>>), CatalogError> {
    let mut grouped: BTreeMap<&str, Vec<RecordRef>> = BTreeMap::new();
    for (collection_idx, collection) in collections.iter().enumerate() {
        for (position, indexed) in collection.records.iter().enumerate() {
            for field in indexed.fields.iter().filter(|field| field.source.is_name()) {
                let refs = grouped.entry(field.canonical.as_str()).or_default();
                let already = refs
                    .iter()
                    .any(|r| r.collection == collection_idx && r.position == position);
                if !already {
                    refs.push(RecordRef {
                        collection: collection_idx,
                        position,
                    });
                }
            }
        }
    }

    let mut builder = MapBuilder::memory();
    let mut postings = Vec::with_capacity(grouped.len());
    for (idx, (name, refs)) in grouped.into_iter().enumerate() {
        builder.insert(name, idx as u64)?;
        postings.push(refs);
    }
    Ok((builder.into_map(), postings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::NameSet;

    fn reciter(id: &str, latin: &str) -> EntityRecord {
        EntityRecord::new(id, Category::Reciter).with_latin(NameSet::new(latin))
    }

    #[test]
    fn rejects_duplicate_ids_across_collections() {
        let chapter = EntityRecord::new("dup", Category::Chapter);
        let err = CatalogSnapshot::new(vec![reciter("dup", "A")], vec![chapter], Vec::new())
            .err()
            .expect("duplicate id must fail");
        assert!(matches!(err, CatalogError::DuplicateId(id) if id == "dup"));
    }

    #[test]
    fn rejects_empty_ids_and_wrong_collections() {
        let err = CatalogSnapshot::new(vec![reciter("  ", "A")], Vec::new(), Vec::new())
            .err()
            .expect("empty id must fail");
        assert!(matches!(err, CatalogError::EmptyId { position: 0, .. }));

        let err = CatalogSnapshot::new(Vec::new(), vec![reciter("r1", "A")], Vec::new())
            .err()
            .expect("category mismatch must fail");
        assert!(matches!(
            err,
            CatalogError::CategoryMismatch {
                expected: Category::Chapter,
                found: Category::Reciter,
                ..
            }
        ));
    }

    #[test]
    fn indexes_fields_and_initials() {
        let record = EntityRecord::new("r1", Category::Reciter)
            .with_latin(NameSet::new("Mishary Rashid Al-Afasy").with_variants(["Alafasy"]))
            .with_arabic(NameSet::new("مشاري راشد العفاسي"))
            .with_aliases(["", "!!"]);
        let indexed = IndexedRecord::new(record);
        assert_eq!(indexed.fields.len(), 3, "blank aliases are dropped");
        assert_eq!(indexed.fields[1].canonical, "mishary rashid al afasy");
        assert_eq!(indexed.fields[2].canonical, "afasy");
        assert_eq!(indexed.initials.as_deref(), Some("mra"));
    }

    #[test]
    fn lookup_and_completion() {
        let snapshot = CatalogSnapshot::new(
            vec![reciter("r1", "Abdul Rahman Al-Sudais"), reciter("r2", "Saud Al-Shuraim")],
            vec![
                EntityRecord::new("c18", Category::Chapter)
                    .with_latin(NameSet::new("Al-Kahf"))
                    .with_number(18),
            ],
            Vec::new(),
        )
        .unwrap();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.get("c18").map(|r| r.number), Some(Some(18)));
        assert!(snapshot.get("missing").is_none());

        let completions = snapshot.complete("abdul", 10);
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].text, "abdul rahman al sudais");
        assert_eq!(completions[0].ids, vec!["r1".to_string()]);
        assert!(snapshot.complete("   ", 10).is_empty());
        assert!(snapshot.complete("18", 10).is_empty(), "numbers are not names");
    }

    #[test]
    fn compressed_json_round_trip() {
        let json = br#"{"reciters": [{"id": "r1", "category": "reciter", "latin": {"primary": "Maher Al-Muaiqly"}}]}"#;
        let compressed = zstd::stream::encode_all(Cursor::new(&json[..]), 3).unwrap();
        let snapshot = CatalogSnapshot::from_compressed_json(&compressed).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.collection(Category::Term).is_some_and(Collection::is_empty));
    }

    #[test]
    fn empty_snapshot() {
        let snapshot = CatalogSnapshot::default();
        assert!(snapshot.is_empty());
        assert!(snapshot.complete("a", 5).is_empty());
        assert_eq!(snapshot.collections().len(), 3);
    }
}
