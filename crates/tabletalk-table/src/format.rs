//! Source format detection.
//!
//! Priority: explicit hint, then the locator's extension, then magic bytes,
//! then delimited text.

use std::fmt;
use std::str::FromStr;

use crate::error::LoadError;

/// On-disk layout of a dataset payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// CSV, TSV or semicolon-separated text. The delimiter is sniffed.
    Delimited,
    /// Office Open XML workbook (`.xlsx`, `.xlsm`).
    Xlsx,
    /// Legacy BIFF workbook (`.xls`).
    Xls,
    /// OpenDocument spreadsheet (`.ods`).
    Ods,
}

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];
const ODS_MIMETYPE: &[u8] = b"application/vnd.oasis.opendocument.spreadsheet";

/// Extensions that are recognizably not tabular, or tabular formats we do not read.
const REJECTED_EXTENSIONS: &[&str] = &["xlsb", "numbers", "pdf", "docx", "json", "parquet"];

impl SourceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Delimited => "delimited",
            SourceFormat::Xlsx => "xlsx",
            SourceFormat::Xls => "xls",
            SourceFormat::Ods => "ods",
        }
    }

    /// Format implied by the locator's extension.
    ///
    /// Query strings and fragments are ignored so URLs like
    /// `https://host/data.xlsx?raw=true` are recognized.
    pub fn from_locator(locator: &str) -> Result<Option<Self>, LoadError> {
        let path = locator
            .split(['?', '#'])
            .next()
            .unwrap_or(locator);
        let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
        let Some((_, ext)) = file_name.rsplit_once('.') else {
            return Ok(None);
        };
        let ext = ext.to_ascii_lowercase();
        if REJECTED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(LoadError::UnsupportedFormat(ext));
        }
        Ok(ext.parse().ok())
    }

    /// Format implied by the first bytes of the payload.
    pub fn sniff(bytes: &[u8]) -> Result<Option<Self>, LoadError> {
        if bytes.starts_with(ZIP_MAGIC) {
            let head = &bytes[..bytes.len().min(128)];
            if head
                .windows(ODS_MIMETYPE.len())
                .any(|window| window == ODS_MIMETYPE)
            {
                return Ok(Some(SourceFormat::Ods));
            }
            return Ok(Some(SourceFormat::Xlsx));
        }
        if bytes.starts_with(OLE_MAGIC) {
            return Ok(Some(SourceFormat::Xls));
        }
        if bytes.starts_with(b"%PDF-") {
            return Err(LoadError::UnsupportedFormat("pdf".to_string()));
        }
        Ok(None)
    }

    /// Resolve the format of a payload.
    pub fn detect(hint: Option<&str>, locator: &str, bytes: &[u8]) -> Result<Self, LoadError> {
        if let Some(hint) = hint.map(str::trim).filter(|h| !h.is_empty()) {
            return hint.parse();
        }
        if let Some(format) = Self::from_locator(locator)? {
            return Ok(format);
        }
        Ok(Self::sniff(bytes)?.unwrap_or(SourceFormat::Delimited))
    }
}

impl FromStr for SourceFormat {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" | "tsv" | "txt" | "tab" | "delimited" => Ok(SourceFormat::Delimited),
            "xlsx" | "xlsm" => Ok(SourceFormat::Xlsx),
            "xls" => Ok(SourceFormat::Xls),
            "ods" => Ok(SourceFormat::Ods),
            other => Err(LoadError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
