//! CSV row source with encoding and delimiter auto-detection.
//!
//! Decodes the file, reads the header line, and then yields one
//! [`RawContactRow`] per data line. Headers are available before iteration so
//! the required-columns check can run first. Iterating again re-reads the
//! decoded content from the start.

use std::path::Path;

use crate::error::{CsvError, CsvResult};
use crate::models::RawContactRow;

/// Column names of the contacts CSV.
pub mod columns {
    pub const IDENTIFIER: &str = "id_singular";
    pub const CATEGORY: &str = "tipo";
    pub const SUBCATEGORY: &str = "subtipo";
    pub const VALUE: &str = "valor";
    pub const PRIMARY: &str = "principal";
    pub const LABEL: &str = "label";
}

/// Detect the encoding of raw bytes. Valid UTF-8 is taken as is; anything else
/// goes through chardet.
pub fn detect_encoding(bytes: &[u8]) -> String {
    let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    if std::str::from_utf8(body).is_ok() {
        return "utf-8".to_string();
    }

    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding. A UTF-8 BOM is dropped.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let decoded = match encoding.to_lowercase().as_str() {
        // windows-1252 agrees with Latin-1 on every printable code point
        "iso-8859-1" | "latin-1" | "latin1" | "windows-1252" | "cp1252" => {
            encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned()
        }
        // utf-8 and anything unknown: lossy UTF-8
        _ => String::from_utf8_lossy(bytes).into_owned(),
    };

    match decoded.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => decoded,
    }
}

/// Detect the delimiter by counting occurrences in the header line.
///
/// Ties and headers without any separator fall back to `,`.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Normalize a header cell for column lookup.
fn header_key(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}')
        .trim()
        .trim_matches('"')
        .trim()
        .to_lowercase()
}

/// Positions of the known columns in the header line.
#[derive(Debug, Clone, Default)]
struct ColumnMap {
    identifier: Option<usize>,
    category: Option<usize>,
    subcategory: Option<usize>,
    value: Option<usize>,
    primary: Option<usize>,
    label: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &[String]) -> Self {
        let find = |name: &str| headers.iter().position(|h| h == name);
        Self {
            identifier: find(columns::IDENTIFIER),
            category: find(columns::CATEGORY),
            subcategory: find(columns::SUBCATEGORY),
            value: find(columns::VALUE),
            primary: find(columns::PRIMARY),
            label: find(columns::LABEL),
        }
    }
}

/// A decoded CSV file ready to be iterated.
#[derive(Debug, Clone)]
pub struct CsvSource {
    content: String,
    encoding: String,
    delimiter: char,
    headers: Vec<String>,
    columns: ColumnMap,
}

impl CsvSource {
    /// Read a file with auto-detection of encoding and delimiter.
    pub fn from_path<P: AsRef<Path>>(path: P) -> CsvResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| CsvError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes)
    }

    /// Parse bytes with auto-detection of encoding and delimiter.
    pub fn from_bytes(bytes: &[u8]) -> CsvResult<Self> {
        let encoding = detect_encoding(bytes);
        let content = decode_content(bytes, &encoding);
        let delimiter = detect_delimiter(&content);
        Self::from_string(content, delimiter, encoding)
    }

    /// Parse an already-decoded string with an explicit delimiter.
    pub fn from_string(content: String, delimiter: char, encoding: String) -> CsvResult<Self> {
        if content.trim().is_empty() {
            return Err(CsvError::EmptyFile);
        }

        let mut reader = reader_for(&content, delimiter);
        let header_record = reader.headers().map_err(|e| CsvError::Parse {
            line: 1,
            message: e.to_string(),
        })?;

        let headers: Vec<String> = header_record.iter().map(header_key).collect();
        if headers.iter().all(|h| h.is_empty()) {
            return Err(CsvError::NoHeaders);
        }

        let columns = ColumnMap::from_headers(&headers);
        Ok(Self {
            content,
            encoding,
            delimiter,
            headers,
            columns,
        })
    }

    /// Normalized (trimmed, lowercased) header names, in file order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Iterate data rows from the start of the file.
    pub fn rows(&self) -> ContactRows<'_> {
        // The header line is skipped by the reader.
        ContactRows {
            records: reader_for(&self.content, self.delimiter).into_records(),
            content: &self.content,
            columns: &self.columns,
        }
    }

    /// Collect all rows, stopping at the first structural CSV error.
    pub fn read_all(&self) -> CsvResult<Vec<RawContactRow>> {
        self.rows().collect()
    }
}

fn reader_for(content: &str, delimiter: char) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes())
}

/// 1-based physical line of the record starting at byte `offset`.
///
/// The reader reports a record's offset before the blank lines it skips, and
/// its own line counter ignores them, so both are resolved against `content`.
fn source_line(content: &str, offset: u64) -> usize {
    let bytes = content.as_bytes();
    let mut start = (offset as usize).min(bytes.len());
    while start < bytes.len() && matches!(bytes[start], b'\r' | b'\n') {
        start += 1;
    }
    1 + bytes[..start].iter().filter(|&&b| b == b'\n').count()
}

/// Lazy iterator over the data rows of a [`CsvSource`].
pub struct ContactRows<'a> {
    records: csv::StringRecordsIntoIter<&'a [u8]>,
    content: &'a str,
    columns: &'a ColumnMap,
}

impl Iterator for ContactRows<'_> {
    type Item = CsvResult<RawContactRow>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(e) => {
                    let line = e
                        .position()
                        .map(|p| source_line(self.content, p.byte()))
                        .unwrap_or(0);
                    return Some(Err(CsvError::Parse {
                        line,
                        message: e.to_string(),
                    }));
                }
            };

            if record.iter().all(|field| field.trim().is_empty()) {
                continue;
            }

            let line = record
                .position()
                .map(|p| source_line(self.content, p.byte()))
                .unwrap_or(0);
            let field = |idx: Option<usize>| {
                idx.and_then(|i| record.get(i))
                    .unwrap_or("")
                    .to_string()
            };

            return Some(Ok(RawContactRow {
                line,
                identifier: field(self.columns.identifier),
                category: field(self.columns.category),
                subcategory: field(self.columns.subcategory),
                value: field(self.columns.value),
                is_primary: field(self.columns.primary),
                label: field(self.columns.label),
            }));
        }
    }
}
