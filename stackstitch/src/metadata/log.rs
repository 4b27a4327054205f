//! Acquisition log parsing.
//!
//! Each mosaic prefix has one XML log written by the stage controller,
//! named `{prefix}.log`. The document describes where every tile sits in
//! the scan grid:
//!
//! ```text
//! <XYStage>
//!   <Mosaic>
//!     <ImageInfo>
//!       <Filename>scan_01_07.tif</Filename>
//!       <Xno>2</Xno>
//!       <Yno>1</Yno>
//!     </ImageInfo>
//!     ...
//!   </Mosaic>
//! </XYStage>
//! ```
//!
//! `Xno` is the column, `Yno` the row. An `ImageInfo` element missing any
//! of the three fields is skipped with a warning; the rest of the document
//! still parses.

use crate::tile::{parse_log_filename, GridPos, TileName};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::path::Path;
use tracing::warn;

/// One `ImageInfo` record: which tile, and where it sits in the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Tile identity derived from the `Filename` field.
    pub name: TileName,
    /// Grid position (`row` = `Yno`, `col` = `Xno`).
    pub position: GridPos,
}

/// Error reading or parsing one acquisition log.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// Log file couldn't be read.
    #[error("failed to read log: {0}")]
    Io(#[from] std::io::Error),

    /// Document is not well-formed XML.
    #[error("malformed log XML: {0}")]
    Xml(String),

    /// Document parsed but contained no usable `ImageInfo` entries.
    #[error("log contains no usable ImageInfo entries")]
    Empty,
}

/// Parse an acquisition log file into its tile placement entries.
pub fn parse_log_file(path: &Path) -> Result<Vec<LogEntry>, LogError> {
    let contents = std::fs::read_to_string(path)?;
    parse_log(&contents)
}

/// Parse acquisition log XML into tile placement entries.
pub fn parse_log(xml: &str) -> Result<Vec<LogEntry>, LogError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut entries = Vec::new();
    let mut buf = Vec::new();
    let mut current_tag = String::new();

    // Fields of the ImageInfo element currently open, if any.
    let mut in_image_info = false;
    let mut filename: Option<String> = None;
    let mut xno: Option<u32> = None;
    let mut yno: Option<u32> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                current_tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if current_tag == "ImageInfo" {
                    in_image_info = true;
                    filename = None;
                    xno = None;
                    yno = None;
                }
            }
            Ok(Event::Text(e)) => {
                if !in_image_info {
                    continue;
                }
                let text = e.unescape().unwrap_or_default().to_string();
                match current_tag.as_str() {
                    "Filename" => filename = Some(text),
                    "Xno" => xno = text.trim().parse().ok(),
                    "Yno" => yno = text.trim().parse().ok(),
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"ImageInfo" {
                    in_image_info = false;
                    match (filename.take(), xno.take(), yno.take()) {
                        (Some(file), Some(col), Some(row)) => match parse_log_filename(&file) {
                            Ok(name) => entries.push(LogEntry {
                                name,
                                position: GridPos { row, col },
                            }),
                            Err(e) => {
                                warn!(filename = %file, error = %e, "skipping unparseable log entry");
                            }
                        },
                        _ => {
                            warn!("skipping incomplete ImageInfo entry");
                        }
                    }
                }
                current_tag.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(LogError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if entries.is_empty() {
        return Err(LogError::Empty);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<XYStage>
  <Mosaic>
    <ImageInfo><Filename>scan_01_01.tif</Filename><Xno>0</Xno><Yno>0</Yno></ImageInfo>
    <ImageInfo><Filename>scan_01_02.tif</Filename><Xno>1</Xno><Yno>0</Yno></ImageInfo>
    <ImageInfo><Filename>scan_01_03.tif</Filename><Xno>0</Xno><Yno>1</Yno></ImageInfo>
  </Mosaic>
</XYStage>"#;

    #[test]
    fn test_parse_sample_log() {
        let entries = parse_log(SAMPLE).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].name.prefix, "scan_01");
        assert_eq!(entries[0].name.index, 1);
        assert_eq!(entries[0].position, GridPos { row: 0, col: 0 });
        assert_eq!(entries[1].position, GridPos { row: 0, col: 1 });
        assert_eq!(entries[2].position, GridPos { row: 1, col: 0 });
    }

    #[test]
    fn test_incomplete_entry_is_skipped() {
        let xml = r#"<XYStage><Mosaic>
            <ImageInfo><Filename>scan_01_01.tif</Filename><Xno>0</Xno></ImageInfo>
            <ImageInfo><Filename>scan_01_02.tif</Filename><Xno>1</Xno><Yno>0</Yno></ImageInfo>
        </Mosaic></XYStage>"#;
        let entries = parse_log(xml).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name.index, 2);
    }

    #[test]
    fn test_bad_filename_is_skipped() {
        let xml = r#"<XYStage><Mosaic>
            <ImageInfo><Filename>notatile.tif</Filename><Xno>0</Xno><Yno>0</Yno></ImageInfo>
            <ImageInfo><Filename>scan_01_02.tif</Filename><Xno>1</Xno><Yno>0</Yno></ImageInfo>
        </Mosaic></XYStage>"#;
        let entries = parse_log(xml).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_empty_document_is_an_error() {
        let result = parse_log("<XYStage><Mosaic></Mosaic></XYStage>");
        assert!(matches!(result, Err(LogError::Empty)));
    }

    #[test]
    fn test_malformed_xml_is_an_error() {
        let result = parse_log("<XYStage><Mosaic><ImageInfo></XYStage>");
        assert!(matches!(result, Err(LogError::Xml(_))));
    }
}
