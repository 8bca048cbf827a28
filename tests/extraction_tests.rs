// Integration tests for leaf extraction and resume over files on disk
//
// Run with: cargo test --test extraction_tests

use lynx_catalog_scraper::catalog::{CatalogTimings, LynxCatalog};
use lynx_catalog_scraper::discovery::{DiscoveryCrawler, DiscoveryOptions};
use lynx_catalog_scraper::error::{CrawlError, SinkError};
use lynx_catalog_scraper::extraction::ExtractionWorker;
use lynx_catalog_scraper::fixture::{
    part_list_html, FixtureCatalog, FixtureLeafSource, FixtureNode, FixtureTree, LynxDomFixture,
};
use lynx_catalog_scraper::models::{CatalogIndexRow, PartRecord, Phase, ResumeCursor};
use lynx_catalog_scraper::resume;
use lynx_catalog_scraper::retry::RetryPolicy;
use lynx_catalog_scraper::sink::{CsvSink, IndexReader, RowSink};
use std::io;
use std::path::Path;

const BRAND_KEY: &str = "LNX_EN_US";

fn index_row(n: usize) -> CatalogIndexRow {
    CatalogIndexRow {
        brand: "Lynx".to_string(),
        kind: "Snowmobile".to_string(),
        year: "2005".to_string(),
        model: "Adventure".to_string(),
        diagram_label: format!("Diagram {}", n),
        diagram_locator: format!("LNX/{}", n),
    }
}

fn write_index(path: &Path, rows: usize) {
    let mut sink = CsvSink::append(path).unwrap();
    for n in 1..=rows {
        sink.write_row(&index_row(n)).unwrap();
    }
    RowSink::<CatalogIndexRow>::flush(&mut sink).unwrap();
}

/// Every locator LNX/1..=n serves a two-row table, the first row with two identifiers
fn leaf_source(n: usize) -> FixtureLeafSource {
    (1..=n).fold(FixtureLeafSource::new(), |source, i| {
        let primary = format!("A{}", i);
        let alternate = format!("B{}", i);
        let single = format!("C{}", i);
        let html = part_list_html(&[
            ("1", "Gasket", &[primary.as_str(), alternate.as_str()], "$4.20"),
            ("2", "Bolt", &[single.as_str()], "0.35"),
        ]);
        source.with_part_list(&format!("LNX/{}", i), html)
    })
}

fn read_index(path: &Path) -> Vec<CatalogIndexRow> {
    IndexReader::new(path)
        .entries()
        .unwrap()
        .map(|e| e.row.unwrap())
        .collect()
}

fn write_rows(path: &Path, rows: &[CatalogIndexRow]) {
    let mut sink = CsvSink::append(path).unwrap();
    for row in rows {
        sink.write_row(row).unwrap();
    }
    RowSink::<CatalogIndexRow>::flush(&mut sink).unwrap();
}

fn read_parts(path: &Path) -> Vec<PartRecord> {
    csv::Reader::from_path(path)
        .unwrap()
        .deserialize()
        .map(|r| r.unwrap())
        .collect()
}

#[test]
fn test_resume_offset_extracts_the_suffix() {
    let dir = tempfile::tempdir().unwrap();
    let index = dir.path().join("index.csv");
    write_index(&index, 10);

    let mut source = leaf_source(10);
    let mut sink: Vec<PartRecord> = Vec::new();
    let mut cursor = resume::explicit_cursor(Phase::Extraction, 7);
    let entries = IndexReader::new(&index).entries().unwrap();

    let stats = ExtractionWorker::new(&mut source, &mut sink)
        .run(entries, &mut cursor)
        .unwrap();

    // Data rows 7..=11 hold locators LNX/6..=LNX/10
    assert_eq!(source.requests, vec!["LNX/6", "LNX/7", "LNX/8", "LNX/9", "LNX/10"]);
    assert_eq!(stats.rows_before_cursor, 5);
    assert_eq!(sink.len(), 5 * 3);
    assert_eq!(cursor.row_offset, 12);
}

#[test]
fn test_two_identifiers_yield_swapped_pair() {
    let mut source = leaf_source(1);
    let mut sink: Vec<PartRecord> = Vec::new();
    let mut worker = ExtractionWorker::new(&mut source, &mut sink);

    let records = worker.extract(&index_row(1));

    let numbers: Vec<_> = records
        .iter()
        .map(|r| (r.part_number.as_str(), r.alternate_part_number.as_str()))
        .collect();
    assert_eq!(numbers, vec![("A1", "B1"), ("B1", "A1"), ("C1", "")]);
    assert!(records.iter().all(|r| r.belongs_to(&index_row(1))));
    assert_eq!(records[0].price, "4.20");
}

#[test]
fn test_interrupted_run_resumes_without_loss() {
    let dir = tempfile::tempdir().unwrap();
    let index = dir.path().join("index.csv");
    let parts = dir.path().join("parts.csv");
    let reference = dir.path().join("reference.csv");
    write_index(&index, 6);

    // Uninterrupted run for comparison
    {
        let mut source = leaf_source(6);
        let mut sink = CsvSink::append(&reference).unwrap();
        let mut cursor = ResumeCursor::start(Phase::Extraction);
        let entries = IndexReader::new(&index).entries().unwrap();
        ExtractionWorker::new(&mut source, &mut sink)
            .run(entries, &mut cursor)
            .unwrap();
    }

    // First attempt stops after three leaves
    {
        let mut source = leaf_source(6);
        let mut sink = CsvSink::append(&parts).unwrap();
        let mut cursor = ResumeCursor::start(Phase::Extraction);
        let entries = IndexReader::new(&index).entries().unwrap().take(3);
        ExtractionWorker::new(&mut source, &mut sink)
            .run(entries, &mut cursor)
            .unwrap();
        assert_eq!(cursor.row_offset, 5);
    }

    let mut cursor = resume::extraction_cursor(&index, &parts).unwrap();
    assert_eq!(cursor.row_offset, 5);

    let mut source = leaf_source(6);
    {
        let mut sink = CsvSink::append(&parts).unwrap();
        let entries = IndexReader::new(&index).entries().unwrap();
        ExtractionWorker::new(&mut source, &mut sink)
            .run(entries, &mut cursor)
            .unwrap();
    }

    assert_eq!(source.requests, vec!["LNX/4", "LNX/5", "LNX/6"]);
    assert_eq!(read_parts(&parts), read_parts(&reference));
    assert_eq!(
        std::fs::read_to_string(&parts).unwrap(),
        std::fs::read_to_string(&reference).unwrap()
    );
}

#[test]
fn test_unavailable_leaves_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let index = dir.path().join("index.csv");
    write_index(&index, 4);

    // LNX/3 and LNX/4 never load
    let mut source = leaf_source(2);
    let mut sink: Vec<PartRecord> = Vec::new();
    let mut cursor = ResumeCursor::start(Phase::Extraction);
    let entries = IndexReader::new(&index).entries().unwrap();

    let stats = ExtractionWorker::new(&mut source, &mut sink)
        .run(entries, &mut cursor)
        .unwrap();

    assert_eq!(stats.leaves_extracted, 2);
    assert_eq!(stats.leaves_unavailable, 2);
    assert_eq!(sink.len(), 6);
    assert_eq!(cursor.row_offset, 6);
}

#[test]
fn test_discovered_index_feeds_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let index = dir.path().join("csv").join("index.csv");
    let parts = dir.path().join("csv").join("parts.csv");

    let tree = FixtureTree::new(vec![
        FixtureNode::branch("2005", vec![FixtureNode::leaves("Snowmobile", &["Engine", "Track"])]),
        FixtureNode::branch(
            "2006",
            vec![FixtureNode::branch(
                "Snowmobile",
                vec![FixtureNode::leaves("Adventure", &["Hood"])],
            )],
        ),
    ]);
    let page = LynxDomFixture::new(tree.clone(), BRAND_KEY);
    let mut catalog = LynxCatalog::new(page, RetryPolicy::immediate(3), CatalogTimings::immediate());
    {
        let mut sink = CsvSink::append(&index).unwrap();
        DiscoveryCrawler::new(&mut catalog, &mut sink, DiscoveryOptions::new(BRAND_KEY, "Lynx"))
            .run()
            .unwrap();
    }

    let mut source = tree
        .leaves_preorder()
        .into_iter()
        .fold(FixtureLeafSource::new(), |source, (_, item)| {
            let html = part_list_html(&[("1", item.label.as_str(), &["P1"], "1.00")]);
            source.with_part_list(&item.locator, html)
        });
    {
        let mut sink = CsvSink::append(&parts).unwrap();
        let mut cursor = ResumeCursor::start(Phase::Extraction);
        let entries = IndexReader::new(&index).entries().unwrap();
        ExtractionWorker::new(&mut source, &mut sink)
            .run(entries, &mut cursor)
            .unwrap();
    }

    let records = read_parts(&parts);
    let descriptions: Vec<_> = records.iter().map(|r| r.description.as_str()).collect();
    assert_eq!(descriptions, vec!["Engine", "Track", "Hood"]);
    assert_eq!(records[2].model, "Adventure");
    assert_eq!(records[2].diagram_locator, "LNX/2006/Snowmobile/Adventure/Hood");

    // A finished run leaves nothing to resume
    let cursor = resume::extraction_cursor(&index, &parts).unwrap();
    assert_eq!(cursor.row_offset, 5);
}

#[test]
fn test_discovery_resume_continues_the_index_file() {
    let dir = tempfile::tempdir().unwrap();
    let index = dir.path().join("index.csv");
    let tree = FixtureTree::new(vec![
        FixtureNode::branch("2005", vec![FixtureNode::leaves("Snowmobile", &["Engine", "Track"])]),
        FixtureNode::branch("2006", vec![FixtureNode::leaves("Snowmobile", &["Hood", "Seat"])]),
    ]);

    // Complete reference run
    let mut ui = FixtureCatalog::new(tree.clone(), BRAND_KEY);
    let mut reference: Vec<CatalogIndexRow> = Vec::new();
    DiscoveryCrawler::new(&mut ui, &mut reference, DiscoveryOptions::new(BRAND_KEY, "Lynx"))
        .run()
        .unwrap();

    // An earlier run managed three rows
    write_rows(&index, &reference[..3]);

    let mut options = DiscoveryOptions::new(BRAND_KEY, "Lynx");
    options.resume_after = resume::discovery_resume_row(&index).unwrap();
    let mut ui = FixtureCatalog::new(tree, BRAND_KEY);
    {
        let mut sink = CsvSink::append(&index).unwrap();
        let stats = DiscoveryCrawler::new(&mut ui, &mut sink, options).run().unwrap();
        assert_eq!(stats.index_rows_suppressed, 3);
        assert_eq!(stats.index_rows_written, 1);
    }

    assert_eq!(read_index(&index), reference);
}

#[test]
fn test_discovery_resume_after_a_skipped_subtree() {
    let dir = tempfile::tempdir().unwrap();
    let index = dir.path().join("index.csv");
    let tree = FixtureTree::new(vec![
        FixtureNode::branch(
            "2005",
            vec![
                FixtureNode::leaves("Snowmobile", &["E1", "E2"]),
                FixtureNode::leaves("Accessories", &["F1", "F2"]),
            ],
        ),
        FixtureNode::branch("2006", vec![FixtureNode::leaves("Snowmobile", &["G1", "G2"])]),
    ]);

    // The earlier run lost 2005 > Snowmobile and stopped after two rows
    let mut ui = FixtureCatalog::new(tree.clone(), BRAND_KEY).fail_select(&["2005", "Snowmobile"]);
    let mut earlier: Vec<CatalogIndexRow> = Vec::new();
    let stats = DiscoveryCrawler::new(&mut ui, &mut earlier, DiscoveryOptions::new(BRAND_KEY, "Lynx"))
        .run()
        .unwrap();
    assert_eq!(stats.navigation_errors, 1);
    write_rows(&index, &earlier[..2]);

    let mut options = DiscoveryOptions::new(BRAND_KEY, "Lynx");
    options.resume_after = resume::discovery_resume_row(&index).unwrap();
    let mut ui = FixtureCatalog::new(tree, BRAND_KEY);
    {
        let mut sink = CsvSink::append(&index).unwrap();
        let stats = DiscoveryCrawler::new(&mut ui, &mut sink, options).run().unwrap();
        assert_eq!(stats.index_rows_suppressed, 4);
        assert_eq!(stats.index_rows_written, 2);
    }

    let labels: Vec<_> = read_index(&index)
        .into_iter()
        .map(|r| r.diagram_label)
        .collect();
    assert_eq!(labels, vec!["F1", "F2", "G1", "G2"]);
}

/// Accepts `capacity` records, then fails like a full disk
struct FullDiskSink {
    records: Vec<PartRecord>,
    capacity: usize,
}

impl RowSink<PartRecord> for FullDiskSink {
    fn write_row(&mut self, record: &PartRecord) -> Result<(), SinkError> {
        if self.records.len() >= self.capacity {
            return Err(SinkError::Io(io::Error::new(
                io::ErrorKind::Other,
                "No space left on device",
            )));
        }
        self.records.push(record.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

#[test]
fn test_sink_failure_stops_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let index = dir.path().join("index.csv");
    write_index(&index, 4);

    // Each leaf yields three records, so the second leaf overflows
    let mut source = leaf_source(4);
    let mut sink = FullDiskSink {
        records: Vec::new(),
        capacity: 4,
    };
    let mut cursor = ResumeCursor::start(Phase::Extraction);
    let entries = IndexReader::new(&index).entries().unwrap();

    let result = ExtractionWorker::new(&mut source, &mut sink).run(entries, &mut cursor);

    assert!(matches!(result, Err(CrawlError::Sink(SinkError::Io(_)))));
    assert_eq!(source.requests, vec!["LNX/1", "LNX/2"]);
    // The failed leaf is not confirmed, so a resumed run starts with it
    assert_eq!(cursor.row_offset, 3);
}
