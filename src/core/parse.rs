//! Purpose: Decode a single data file into a flat key/value record.
//! Exports: `ParsedRecord`, `parse_record`.
//! Role: Format Parser core; one decoding strategy per `FileType`.
//! Invariants: Record keys come only from the source file's own structure.
//! Invariants: txt/xml/csv values are strings; yaml/json values pass through as JSON.
//! Invariants: XML flattens to one level; CSV reads only the first data row.

use crate::core::catalog::{Dataset, FileType, record_path};
use crate::core::error::{Error, ErrorKind};
use quick_xml::Reader;
use quick_xml::events::Event;
use serde_json::Value;
use std::path::Path;

pub type ParsedRecord = serde_json::Map<String, Value>;

/// Resolve the data file for `(dataset, file_type)` and decode it.
///
/// The caller is expected to have validated both enumeration members; the only
/// input-dependent failures here are a missing file, an unreadable file, or
/// structurally invalid content.
pub fn parse_record(
    data_dir: &Path,
    dataset: Dataset,
    file_type: FileType,
) -> Result<ParsedRecord, Error> {
    let path = record_path(data_dir, dataset, file_type);
    tracing::debug!(path = %path.display(), "reading data file");

    if !path.exists() {
        return Err(Error::new(ErrorKind::NotFound)
            .with_message(format!("file not found: {}", path.display())));
    }

    let content = std::fs::read_to_string(&path).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read data file")
            .with_path(&path)
            .with_source(err)
    })?;

    let result = match file_type {
        FileType::Txt => Ok(parse_text(&content)),
        FileType::Xml => parse_xml(&content),
        FileType::Yaml => parse_yaml(&content),
        FileType::Json => parse_json(&content),
        FileType::Csv => parse_csv(&content),
    };
    result.map_err(|err| err.with_path(&path))
}

/// Lines shaped `key: value` become entries; anything else is skipped.
/// The silent skip is a documented format policy, not an error.
fn parse_text(content: &str) -> ParsedRecord {
    let mut record = ParsedRecord::new();
    for line in content.lines() {
        if let Some((key, value)) = line.split_once(": ") {
            record.insert(
                key.trim().to_string(),
                Value::String(value.trim().to_string()),
            );
        }
    }
    record
}

/// One-level flatten: every immediate child of the document root becomes an
/// entry mapping its local tag name to its direct text content. Nested
/// structure below that is dropped.
fn parse_xml(content: &str) -> Result<ParsedRecord, Error> {
    let mut reader = Reader::from_str(content);
    let mut record = ParsedRecord::new();
    let mut depth = 0usize;
    let mut saw_root = false;
    let mut key = String::new();
    let mut text = String::new();

    loop {
        let event = reader.read_event().map_err(|err| {
            Error::new(ErrorKind::Malformed)
                .with_message("invalid xml")
                .with_source(err)
        })?;
        match event {
            Event::Start(start) => {
                depth += 1;
                if depth == 1 {
                    saw_root = true;
                } else if depth == 2 {
                    key = String::from_utf8_lossy(start.local_name().as_ref()).to_string();
                    text.clear();
                }
            }
            Event::Empty(start) => {
                if depth == 0 {
                    // self-closing root: a valid, empty document
                    saw_root = true;
                } else if depth == 1 {
                    let name = String::from_utf8_lossy(start.local_name().as_ref()).to_string();
                    record.insert(name, Value::String(String::new()));
                }
            }
            Event::Text(chunk) => {
                if depth == 2 {
                    let value = chunk.unescape().map_err(|err| {
                        Error::new(ErrorKind::Malformed)
                            .with_message("invalid xml text content")
                            .with_source(err)
                    })?;
                    text.push_str(&value);
                }
            }
            Event::CData(chunk) => {
                if depth == 2 {
                    text.push_str(&String::from_utf8_lossy(&chunk.into_inner()));
                }
            }
            Event::End(_) => {
                if depth == 2 {
                    record.insert(
                        std::mem::take(&mut key),
                        Value::String(text.trim().to_string()),
                    );
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(Error::new(ErrorKind::Malformed).with_message("xml has no document root"));
    }
    Ok(record)
}

fn parse_yaml(content: &str) -> Result<ParsedRecord, Error> {
    let value: Value = serde_yaml::from_str(content).map_err(|err| {
        Error::new(ErrorKind::Malformed)
            .with_message("invalid yaml")
            .with_source(err)
    })?;
    match value {
        Value::Object(record) => Ok(record),
        _ => Err(Error::new(ErrorKind::Malformed)
            .with_message("yaml top level must be a mapping")),
    }
}

fn parse_json(content: &str) -> Result<ParsedRecord, Error> {
    let value: Value = serde_json::from_str(content).map_err(|err| {
        Error::new(ErrorKind::Malformed)
            .with_message("invalid json")
            .with_source(err)
    })?;
    match value {
        Value::Object(record) => Ok(record),
        _ => Err(Error::new(ErrorKind::Malformed)
            .with_message("json top level must be an object")),
    }
}

/// Header row zipped with the first data row only; any further rows are
/// ignored by design.
fn parse_csv(content: &str) -> Result<ParsedRecord, Error> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|err| {
            Error::new(ErrorKind::Malformed)
                .with_message("invalid csv header")
                .with_source(err)
        })?
        .clone();

    let first = match reader.records().next() {
        Some(row) => row.map_err(|err| {
            Error::new(ErrorKind::Malformed)
                .with_message("invalid csv row")
                .with_source(err)
        })?,
        None => {
            return Err(Error::new(ErrorKind::Malformed)
                .with_message("csv must have at least one header row and one data row"));
        }
    };

    if first.len() != headers.len() {
        return Err(Error::new(ErrorKind::Malformed)
            .with_message("csv row length does not match header length"));
    }

    let mut record = ParsedRecord::new();
    for (header, value) in headers.iter().zip(first.iter()) {
        record.insert(header.to_string(), Value::String(value.to_string()));
    }
    Ok(record)
}
