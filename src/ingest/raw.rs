//! Raw export loading: bytes → decoded text → header + string records.
//!
//! StatFin exports carry two metadata lines (title, blank or note) before the
//! header row. Sources differ in text encoding, and decoding with the wrong one
//! must fail instead of producing mojibake that later fails to match anything.

use std::borrow::Cow;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use encoding_rs::{UTF_8, mem};

use crate::error::AppError;

/// Lines preceding the header row in every export.
pub const METADATA_LINES: usize = 2;

/// Declared text encoding of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    Utf8,
    /// ISO-8859-1: every byte is the code point of the same value.
    Latin1,
}

impl SourceEncoding {
    pub fn label(self) -> &'static str {
        match self {
            SourceEncoding::Utf8 => "utf-8",
            SourceEncoding::Latin1 => "latin-1",
        }
    }
}

/// How a rule refers to a header name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderMatch {
    /// Compare after [`normalize_header`].
    Normalized,
    /// Compare the header exactly as written (surrounding whitespace aside).
    Exact,
}

/// A decoded export: header names plus data records.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub source_name: String,
    pub headers: Vec<String>,
    normalized: Vec<String>,
    pub records: Vec<StringRecord>,
}

impl RawTable {
    pub fn new(source_name: impl Into<String>, headers: Vec<String>, records: Vec<StringRecord>) -> Self {
        let normalized = headers.iter().map(|h| normalize_header(h)).collect();
        Self {
            source_name: source_name.into(),
            headers,
            normalized,
            records,
        }
    }

    /// Index of the column called `name`.
    pub fn column(&self, name: &str, how: HeaderMatch) -> Option<usize> {
        match how {
            HeaderMatch::Normalized => self.normalized.iter().position(|h| h == name),
            HeaderMatch::Exact => self.headers.iter().position(|h| h == name),
        }
    }

    /// First column whose normalized name satisfies `pred`.
    pub fn find_normalized(&self, pred: impl Fn(&str) -> bool) -> Option<usize> {
        self.normalized.iter().position(|h| pred(h))
    }

    /// Cell text; short records read as empty cells.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.records
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Read `path` in `encoding`, skip `skip_lines` lines and parse the rest as CSV.
pub fn read_export(
    path: &Path,
    source_name: &str,
    encoding: SourceEncoding,
    skip_lines: usize,
) -> Result<RawTable, AppError> {
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => AppError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => AppError::io(format!("Failed to read '{}'", path.display()), e),
    })?;

    let text = decode(&bytes, encoding).ok_or_else(|| AppError::Decode {
        path: path.to_path_buf(),
        encoding: encoding.label(),
    })?;

    let body = skip_leading_lines(&text, skip_lines).ok_or_else(|| {
        AppError::schema(
            source_name,
            format!("expected a header row on line {}.", skip_lines + 1),
        )
    })?;

    parse_body(body, source_name).map_err(|e| match e {
        ParseFailure::Csv(source) => AppError::Csv {
            path: path.to_path_buf(),
            source,
        },
        ParseFailure::NoHeader => AppError::schema(source_name, "header row is empty."),
    })
}

/// Decode without replacement characters; `None` if any byte sequence is invalid.
///
/// Latin-1 maps every byte, so only UTF-8 input can fail.
pub fn decode(bytes: &[u8], encoding: SourceEncoding) -> Option<Cow<'_, str>> {
    match encoding {
        SourceEncoding::Utf8 => UTF_8.decode_without_bom_handling_and_without_replacement(bytes),
        SourceEncoding::Latin1 => Some(mem::decode_latin1(bytes)),
    }
}

/// Collapse whitespace runs, trim, drop a leading BOM and lower-case.
pub fn normalize_header(name: &str) -> String {
    let name = name.trim_start_matches('\u{feff}');
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn skip_leading_lines(text: &str, n: usize) -> Option<&str> {
    let mut rest = text;
    for _ in 0..n {
        let idx = rest.find('\n')?;
        rest = &rest[idx + 1..];
    }
    if rest.trim().is_empty() { None } else { Some(rest) }
}

enum ParseFailure {
    Csv(csv::Error),
    NoHeader,
}

fn parse_body(body: &str, source_name: &str) -> Result<RawTable, ParseFailure> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(body.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(ParseFailure::Csv)?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(ParseFailure::NoHeader);
    }

    let records = reader
        .records()
        .collect::<Result<Vec<_>, _>>()
        .map_err(ParseFailure::Csv)?;

    Ok(RawTable::new(source_name, headers, records))
}
