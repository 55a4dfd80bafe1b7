//src/types.rs

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One `(name, source)` pair of an attribute mapping.
/// Its position in `AttributeMappingObject::attributes` is the slot index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    #[serde(rename = "attribute")]
    pub name: String,
    pub source: String,
}

impl AttributeDescriptor {
    pub fn new(name: &str, source: &str) -> Self {
        Self {
            name: name.to_string(),
            source: source.to_string(),
        }
    }
}

/// The persisted attribute-mapping shape:
/// ```text
/// { "attributes": [{"attribute": .., "source": ..}, ..],
///   "instances":  {"<row id>": ["<value per slot>", ..], ..} }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeMappingObject {
    #[serde(default)]
    pub attributes: Vec<AttributeDescriptor>,
    #[serde(default)]
    pub instances: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ontology_mapping_method: Option<String>,
    /// Fields we don't interpret but must hand back untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Row/column ids and values of an abundance matrix.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatrixData {
    pub row_ids: Vec<String>,
    #[serde(default)]
    pub col_ids: Vec<String>,
    #[serde(default)]
    pub values: Vec<Vec<Option<f64>>>,
}

/// The persisted amplicon (abundance) matrix shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AmpliconMatrixObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub data: MatrixData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_attributemapping_ref: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One `(taxon, rank, confidence)` triple of a fixRank row.
#[derive(Debug, Clone, PartialEq)]
pub struct RankAssignment {
    pub taxon: String,
    pub rank: String,
    pub conf: f64,
}

/// A fixRank row: the full rank chain with per-rank bootstrap confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct FixRankRecord {
    pub id: String,
    pub assignments: Vec<RankAssignment>,
}

/// Identifier -> taxonomy string, in file order.
///
/// Taxonomy strings look like `Bacteria;Proteobacteria;...;Aquicella;`
/// and all share the same rank depth.
#[derive(Debug, Clone, Default)]
pub struct TaxonomyTable {
    /// Rank names from the header row, if the file had one
    pub ranks: Option<Vec<String>>,
    entries: Vec<(String, String)>,
    index: AHashMap<String, usize>,
}

impl TaxonomyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new identifier. Returns the already stored taxonomy string
    /// instead if the identifier was seen before.
    pub(crate) fn insert_new(&mut self, id: String, tax_str: String) -> Option<&str> {
        if let Some(&i) = self.index.get(&id) {
            return Some(&self.entries[i].1);
        }
        self.index.insert(id.clone(), self.entries.len());
        self.entries.push((id, tax_str));
        None
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.index.get(id).map(|&i| self.entries[i].1.as_str())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of ranks per taxonomy string (0 for an empty table)
    pub fn rank_depth(&self) -> usize {
        self.entries
            .first()
            .map(|(_, s)| s.matches(';').count())
            .unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(id, s)| (id.as_str(), s.as_str()))
    }

    /// Owned `id -> value` lookup, the shape `update_attribute` takes.
    pub fn to_map(&self) -> AHashMap<String, String> {
        self.entries.iter().cloned().collect()
    }
}
