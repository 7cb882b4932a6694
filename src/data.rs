use serde::{Deserialize, Serialize};
use std::fmt;

pub type EntityId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Person entities: reciters.
    Reciter,
    /// Chapter entities: the surahs.
    Chapter,
    /// Glossary terms.
    Term,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Reciter, Category::Chapter, Category::Term];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Reciter => "reciter",
            Category::Chapter => "chapter",
            Category::Term => "term",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primary spelling of a name in one script plus its accepted variants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameSet {
    #[serde(default)]
    pub primary: String,
    #[serde(default)]
    pub variants: Vec<String>,
}

impl NameSet {
    pub fn new(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            variants: Vec::new(),
        }
    }

    pub fn with_variants<I, S>(mut self, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variants.extend(variants.into_iter().map(Into::into));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: EntityId,
    pub category: Category,
    #[serde(default)]
    pub arabic: NameSet,
    #[serde(default)]
    pub latin: NameSet,
    /// Script-agnostic alternative names.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Keywords that lead to the record without naming it.
    #[serde(default)]
    pub related: Vec<String>,
    /// Identifier-like number, e.g. a chapter's position in the mushaf.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl EntityRecord {
    pub fn new(id: impl Into<EntityId>, category: Category) -> Self {
        Self {
            id: id.into(),
            category,
            arabic: NameSet::default(),
            latin: NameSet::default(),
            aliases: Vec::new(),
            related: Vec::new(),
            number: None,
            description: None,
        }
    }

    pub fn with_arabic(mut self, names: NameSet) -> Self {
        self.arabic = names;
        self
    }

    pub fn with_latin(mut self, names: NameSet) -> Self {
        self.latin = names;
        self
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    pub fn with_related<I, S>(mut self, related: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.related.extend(related.into_iter().map(Into::into));
        self
    }

    pub fn with_number(mut self, number: u32) -> Self {
        self.number = Some(number);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Text a result row shows: Latin title, Arabic title, then the description.
    pub fn display_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(3);
        for part in [
            self.latin.primary.as_str(),
            self.arabic.primary.as_str(),
            self.description.as_deref().unwrap_or_default(),
        ] {
            if !part.trim().is_empty() {
                parts.push(part);
            }
        }
        parts.join(" ")
    }

    /// The best available human label, preferring the Latin primary name.
    pub fn label(&self) -> &str {
        if !self.latin.primary.trim().is_empty() {
            &self.latin.primary
        } else if !self.arabic.primary.trim().is_empty() {
            &self.arabic.primary
        } else {
            &self.id
        }
    }
}

/// Wire shape of a catalog: one list per collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogPayload {
    #[serde(default)]
    pub reciters: Vec<EntityRecord>,
    #[serde(default)]
    pub chapters: Vec<EntityRecord>,
    #[serde(default)]
    pub terms: Vec<EntityRecord>,
}
