//! Errors raised while ingesting a catalog or configuring the engine. Queries
//! themselves never fail.

use crate::data::Category;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid catalog JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("record #{position} in the {category} collection has an empty id")]
    EmptyId { category: Category, position: usize },

    #[error("duplicate entity id {0:?}")]
    DuplicateId(String),

    #[error("record {id:?} is tagged {found} but was supplied in the {expected} collection")]
    CategoryMismatch {
        id: String,
        expected: Category,
        found: Category,
    },

    #[error("failed to build the name index: {0}")]
    Index(#[from] fst::Error),
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("ranking weight `{name}` must be finite and non-negative, got {value}")]
    InvalidWeight { name: &'static str, value: f64 },

    #[error("ranking weight `fuzzy_penalty` must not exceed 1, got {0}")]
    PenaltyAboveOne(f64),
}
