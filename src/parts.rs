//! Parsing of a rendered `#ariPartList` table into part records.

use crate::error::ExtractionParseError;
use crate::models::{CatalogIndexRow, PartRecord};
use scraper::{ElementRef, Html, Selector};

/// One row of a part table, before it is tied to an index row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartLine {
    pub ref_number: String,
    pub description: String,
    /// Primary identifier first; at most two
    pub identifiers: Vec<String>,
    pub price: String,
}

struct TableSelectors {
    row: Selector,
    reference: Selector,
    description: Selector,
    sku: Selector,
    identifier: Selector,
}

impl TableSelectors {
    fn new() -> Result<Self, ExtractionParseError> {
        Ok(Self {
            row: parse_selector("tbody tr.ariPartInfo")?,
            reference: parse_selector("td.ariPLTag")?,
            description: parse_selector("td.ariPLDesc")?,
            sku: parse_selector("td.ariPLSku")?,
            identifier: parse_selector("span[name]")?,
        })
    }
}

fn parse_selector(css: &str) -> Result<Selector, ExtractionParseError> {
    Selector::parse(css).map_err(|e| ExtractionParseError {
        row: 0,
        reason: format!("invalid selector {:?}: {:?}", css, e),
    })
}

/// Parse every part row of the table, one result per `tr.ariPartInfo`.
///
/// Rows are numbered from 1 in table order. A bad row does not affect its
/// neighbours.
pub fn parse_part_table(html: &str) -> Vec<Result<PartLine, ExtractionParseError>> {
    let selectors = match TableSelectors::new() {
        Ok(selectors) => selectors,
        Err(e) => return vec![Err(e)],
    };

    let document = Html::parse_document(html);
    document
        .select(&selectors.row)
        .enumerate()
        .map(|(i, row)| parse_row(&selectors, row, i + 1))
        .collect()
}

fn parse_row(
    selectors: &TableSelectors,
    row: ElementRef<'_>,
    number: usize,
) -> Result<PartLine, ExtractionParseError> {
    let missing = |what: &str| ExtractionParseError {
        row: number,
        reason: format!("missing {}", what),
    };

    let reference = row
        .select(&selectors.reference)
        .next()
        .ok_or_else(|| missing("reference cell"))?;
    let description = row
        .select(&selectors.description)
        .next()
        .ok_or_else(|| missing("description cell"))?;
    let sku = row
        .select(&selectors.sku)
        .next()
        .ok_or_else(|| missing("part number cell"))?;

    let mut identifiers: Vec<String> = Vec::new();
    for span in sku.select(&selectors.identifier) {
        let id = span.value().attr("name").unwrap_or("").trim();
        if !id.is_empty() && !identifiers.iter().any(|known| known == id) {
            identifiers.push(id.to_string());
        }
    }
    identifiers.truncate(2);
    if identifiers.is_empty() {
        return Err(missing("part number"));
    }

    Ok(PartLine {
        ref_number: element_text(reference),
        description: element_text(description),
        identifiers,
        price: strip_currency(sku.value().attr("adjustedprice").unwrap_or("")),
    })
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drop currency symbols, letters and whitespace from a price
pub fn strip_currency(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect()
}

/// Records for one part line of a leaf.
///
/// Two identifiers give two records, each one promoted to `PartNumber` with
/// the other as `AlternatePartNumber`.
pub fn expand_records(row: &CatalogIndexRow, line: &PartLine) -> Vec<PartRecord> {
    let record = |part_number: &str, alternate: &str| PartRecord {
        brand: row.brand.clone(),
        kind: row.kind.clone(),
        year: row.year.clone(),
        model: row.model.clone(),
        diagram_label: row.diagram_label.clone(),
        ref_number: line.ref_number.clone(),
        description: line.description.clone(),
        part_number: part_number.to_string(),
        diagram_locator: row.diagram_locator.clone(),
        price: line.price.clone(),
        alternate_part_number: alternate.to_string(),
    };

    match line.identifiers.as_slice() {
        [] => Vec::new(),
        [only] => vec![record(only, "")],
        [primary, alternate, ..] => vec![record(primary, alternate), record(alternate, primary)],
    }
}
