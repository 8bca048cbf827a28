use serde::{Deserialize, Serialize};
use std::fmt;

/// First data row of a CSV file, counting the header as row 1.
pub const FIRST_DATA_ROW: u64 = 2;

/// One entry of a rendered selector level.
///
/// Only meaningful while its parent level is the active render. `opaque_id`
/// is built from site attributes and is used to find the same entry again
/// after the DOM re-renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorNode {
    pub label: String,
    pub level_index: usize,
    pub opaque_id: String,
}

impl SelectorNode {
    pub fn new(label: impl Into<String>, level_index: usize, opaque_id: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            level_index,
            opaque_id: opaque_id.into(),
        }
    }
}

/// Facet levels of the catalog in the order the UI asks for them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facet {
    Year,
    Type,
    Model,
    SubModel,
}

impl Facet {
    pub fn at_level(level: usize) -> Option<Facet> {
        match level {
            0 => Some(Facet::Year),
            1 => Some(Facet::Type),
            2 => Some(Facet::Model),
            3 => Some(Facet::SubModel),
            _ => None,
        }
    }
}

/// Labels selected from the brand root down to the current position.
///
/// The brand is the root and does not count towards the depth, so `len()`
/// always equals the number of breadcrumb levels below the brand page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationPath {
    brand: String,
    selections: Vec<String>,
}

impl NavigationPath {
    pub fn new(brand: impl Into<String>) -> Self {
        Self {
            brand: brand.into(),
            selections: Vec::new(),
        }
    }

    pub fn brand(&self) -> &str {
        &self.brand
    }

    pub fn len(&self) -> usize {
        self.selections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    pub fn push(&mut self, label: impl Into<String>) {
        self.selections.push(label.into());
    }

    pub fn pop(&mut self) -> Option<String> {
        self.selections.pop()
    }

    pub fn truncate(&mut self, depth: usize) {
        self.selections.truncate(depth);
    }

    pub fn selections(&self) -> &[String] {
        &self.selections
    }

    pub fn facet(&self, facet: Facet) -> Option<&str> {
        let index = match facet {
            Facet::Year => 0,
            Facet::Type => 1,
            Facet::Model => 2,
            Facet::SubModel => 3,
        };
        self.selections.get(index).map(String::as_str)
    }

    pub fn year(&self) -> &str {
        self.facet(Facet::Year).unwrap_or_default()
    }

    pub fn kind(&self) -> &str {
        self.facet(Facet::Type).unwrap_or_default()
    }

    /// Model label, with every deeper level appended as ` / sub-model`
    pub fn model(&self) -> String {
        self.selections
            .get(2..)
            .map(|rest| rest.join(" / "))
            .unwrap_or_default()
    }
}

impl fmt::Display for NavigationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.brand)?;
        for label in &self.selections {
            write!(f, " > {}", label)?;
        }
        Ok(())
    }
}

/// A diagram entry harvested from a leaf render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafItem {
    pub label: String,
    pub locator: String,
}

/// One line of the catalog index, written by discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogIndexRow {
    #[serde(rename = "Brand")]
    pub brand: String,
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Year")]
    pub year: String,
    #[serde(rename = "Model")]
    pub model: String,
    #[serde(rename = "DiagramName")]
    pub diagram_label: String,
    #[serde(rename = "DiagramLocator")]
    pub diagram_locator: String,
}

impl CatalogIndexRow {
    pub fn from_path(path: &NavigationPath, item: &LeafItem) -> Self {
        Self {
            brand: path.brand().to_string(),
            kind: path.kind().to_string(),
            year: path.year().to_string(),
            model: path.model(),
            diagram_label: item.label.clone(),
            diagram_locator: item.locator.clone(),
        }
    }
}

/// One line of the part record sink, written by extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartRecord {
    #[serde(rename = "Brand")]
    pub brand: String,
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Year")]
    pub year: String,
    #[serde(rename = "Model")]
    pub model: String,
    #[serde(rename = "DiagramName")]
    pub diagram_label: String,
    #[serde(rename = "Ref#")]
    pub ref_number: String,
    #[serde(rename = "PartDescription")]
    pub description: String,
    #[serde(rename = "PartNumber")]
    pub part_number: String,
    #[serde(rename = "DiagramLocator")]
    pub diagram_locator: String,
    #[serde(rename = "Price")]
    pub price: String,
    #[serde(rename = "AlternatePartNumber")]
    pub alternate_part_number: String,
}

impl PartRecord {
    /// Whether this record was produced from the given index row
    pub fn belongs_to(&self, row: &CatalogIndexRow) -> bool {
        self.brand == row.brand
            && self.kind == row.kind
            && self.year == row.year
            && self.model == row.model
            && self.diagram_label == row.diagram_label
            && self.diagram_locator == row.diagram_locator
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Discovery,
    Extraction,
}

/// Progress marker for a phase, as a 1-based row number that counts the header.
///
/// The cursor only moves forward. It is derived from the files on disk at
/// start-up, never restored from memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResumeCursor {
    pub phase: Phase,
    pub row_offset: u64,
}

impl ResumeCursor {
    pub fn new(phase: Phase, row_offset: u64) -> Self {
        Self { phase, row_offset }
    }

    pub fn start(phase: Phase) -> Self {
        Self::new(phase, FIRST_DATA_ROW)
    }

    /// Whether the data row with this number is still ahead of the cursor
    pub fn admits(&self, row_number: u64) -> bool {
        row_number >= self.row_offset
    }

    pub fn advance_to(&mut self, row_offset: u64) {
        if row_offset > self.row_offset {
            self.row_offset = row_offset;
        }
    }
}
