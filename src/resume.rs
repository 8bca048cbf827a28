//! Resume cursors derived from the files an earlier run left behind.

use crate::error::SinkError;
use crate::models::{CatalogIndexRow, Phase, ResumeCursor, FIRST_DATA_ROW};
use crate::sink::{last_record, IndexReader};
use std::path::Path;

/// Cursor for an operator-supplied row number; 0 and 1 mean the first data row
pub fn explicit_cursor(phase: Phase, row: u64) -> ResumeCursor {
    ResumeCursor::new(phase, row.max(FIRST_DATA_ROW))
}

/// Last well-formed row of an existing index; discovery continues after it.
///
/// `None` for a missing or empty index, in which case discovery starts over.
pub fn discovery_resume_row(index_path: &Path) -> Result<Option<CatalogIndexRow>, SinkError> {
    if !index_path.exists() {
        return Ok(None);
    }
    let mut rows = 0;
    let mut last = None;
    for entry in IndexReader::new(index_path).entries()? {
        rows += 1;
        if let Ok(row) = entry.row {
            last = Some(row);
        }
    }
    log::info!("{} holds {} index rows", index_path.display(), rows);
    Ok(last)
}

/// Extraction continues after the index row that produced the last part record.
///
/// The first index row with the same key wins, so a repeated key re-extracts
/// rather than skips. A part file that is missing, empty, or whose last record
/// matches no index row gives the start cursor.
pub fn extraction_cursor(index_path: &Path, parts_path: &Path) -> Result<ResumeCursor, SinkError> {
    let start = ResumeCursor::start(Phase::Extraction);

    let Some(last) = last_record(parts_path)? else {
        log::info!("No part records in {}, starting from the first index row", parts_path.display());
        return Ok(start);
    };
    if last.len() < 9 {
        log::warn!(
            "Last part record in {} has {} fields, starting from the first index row",
            parts_path.display(),
            last.len()
        );
        return Ok(start);
    }

    for entry in IndexReader::new(index_path).entries()? {
        let Ok(row) = entry.row else { continue };
        let matches = row.brand == last[0]
            && row.kind == last[1]
            && row.year == last[2]
            && row.model == last[3]
            && row.diagram_label == last[4]
            && row.diagram_locator == last[8];
        if matches {
            log::info!(
                "Last part record came from index row {} ({}), resuming at row {}",
                entry.row_number,
                row.diagram_label,
                entry.row_number + 1
            );
            return Ok(ResumeCursor::new(Phase::Extraction, entry.row_number + 1));
        }
    }

    log::warn!(
        "Last part record in {} matches no row of {}, starting from the first index row",
        parts_path.display(),
        index_path.display()
    );
    Ok(start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(path: &Path, content: &str) {
        let mut file = std::fs::File::create(path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    const INDEX: &str = "Brand,Type,Year,Model,DiagramName,DiagramLocator\n\
                         Lynx,Snowmobile,2005,Adventure,Engine,LNX/1\n\
                         Lynx,Snowmobile,2005,Adventure,Track,LNX/2\n\
                         Lynx,Snowmobile,2006,Adventure,Engine,LNX/3\n";

    #[test]
    fn test_explicit_cursor() {
        assert_eq!(explicit_cursor(Phase::Extraction, 0).row_offset, 2);
        assert_eq!(explicit_cursor(Phase::Extraction, 1).row_offset, 2);
        assert_eq!(explicit_cursor(Phase::Extraction, 7).row_offset, 7);
    }

    #[test]
    fn test_discovery_resume_row() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("index.csv");
        assert_eq!(discovery_resume_row(&index).unwrap(), None);

        write(&index, INDEX);
        let last = discovery_resume_row(&index).unwrap().unwrap();
        assert_eq!(last.year, "2006");
        assert_eq!(last.diagram_locator, "LNX/3");

        // A torn last line does not count
        write(&index, &format!("{}Lynx,Snowmobile\n", INDEX));
        let last = discovery_resume_row(&index).unwrap().unwrap();
        assert_eq!(last.diagram_locator, "LNX/3");
    }

    #[test]
    fn test_extraction_cursor_follows_last_record() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("index.csv");
        let parts = dir.path().join("parts.csv");
        write(&index, INDEX);

        assert_eq!(extraction_cursor(&index, &parts).unwrap().row_offset, 2);

        write(
            &parts,
            "Brand,Type,Year,Model,DiagramName,Ref#,PartDescription,PartNumber,DiagramLocator,Price,AlternatePartNumber\n\
             Lynx,Snowmobile,2005,Adventure,Engine,1,Piston,P1,LNX/1,10.00,\n\
             Lynx,Snowmobile,2005,Adventure,Track,4,Track,T1,LNX/2,99.00,\n",
        );
        assert_eq!(extraction_cursor(&index, &parts).unwrap().row_offset, 4);
    }

    #[test]
    fn test_extraction_cursor_unknown_record_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("index.csv");
        let parts = dir.path().join("parts.csv");
        write(&index, INDEX);
        write(
            &parts,
            "Brand,Type,Year,Model,DiagramName,Ref#,PartDescription,PartNumber,DiagramLocator,Price,AlternatePartNumber\n\
             Lynx,Snowmobile,1999,Other,Hood,1,Hood,H1,LNX/99,5.00,\n",
        );
        assert_eq!(extraction_cursor(&index, &parts).unwrap().row_offset, 2);
    }
}
