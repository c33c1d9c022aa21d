//! # Workbook decoding
//!
//! Reads Office Open XML (.xlsx, .xlsm), OpenDocument (.ods) and legacy Excel 97-2003
//! (.xls) workbooks from an in-memory byte buffer. Each sheet decodes to a [`Table`]: the first row holding any
//! cell becomes the header row, the rest become positional rows of [`CellValue`]s.

pub(crate) mod cell;
pub(crate) mod excel;
pub mod ods;
pub(crate) mod reference;
pub(crate) mod sheet;
pub mod table;
pub mod xls;
pub(crate) mod xlsx;

pub use cell::CellValue;
pub use table::Table;

use crate::error::BentoError;
use crate::helpers::zip::ZipHelper;
use crate::spreadsheet::ods::OdsSpreadsheet;
use crate::spreadsheet::xls::XlsSpreadsheet;
use crate::spreadsheet::xlsx::XlsxSpreadsheet;
use std::fmt::Display;
use std::io::Cursor;
use thiserror::Error;
use zip::ZipArchive;

/// Reader over the owned workbook bytes
pub(crate) type ByteReader = Cursor<Vec<u8>>;

/// Compound File Binary signature: legacy .xls files and password-encrypted OOXML packages
const CFB_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Empty file")]
    EmptyFileError,

    #[error("Unsupported workbook format: {0}")]
    UnsupportedFormatError(String),

    #[error("Workbook is password protected")]
    SpreadsheetPasswordProtectedError,

    #[error("Workbook contains no sheets")]
    SpreadsheetEmptyError,

    #[error("Missing workbook part '{0}'")]
    MissingPartError(String),

    #[error("Sheet '{0}' not found")]
    SheetNotFoundError(String),

    #[error("Shared string index {0} out of range")]
    SharedStringError(usize),

    #[error("Invalid cell value in sheet '{0}' at {1}: {2}")]
    CellValueError(String, String, String),
}

/// Container format detected by [`open_spreadsheet`]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WorkbookFormat {
    Xlsx,
    Xls,
    Ods,
}

impl Display for WorkbookFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkbookFormat::Xlsx => f.write_str("xlsx"),
            WorkbookFormat::Xls => f.write_str("xls"),
            WorkbookFormat::Ods => f.write_str("ods"),
        }
    }
}

/// Tabular reader over one opened workbook.
pub trait Spreadsheet {
    fn format(&self) -> WorkbookFormat;

    /// Sheet names in file order.
    fn sheet_names(&self) -> Vec<String>;

    /// Decodes a sheet. `rows_limit` caps the data rows below the header and lets the
    /// reader stop early; `Some(0)` reads the header row only.
    fn read_sheet(&mut self, name: &str, rows_limit: Option<usize>) -> Result<Table, BentoError>;
}

/// Sniffs the container and opens the matching reader.
pub fn open_spreadsheet(bytes: &[u8]) -> Result<Box<dyn Spreadsheet + Send>, BentoError> {
    if bytes.is_empty() {
        Err(SpreadsheetError::EmptyFileError)?;
    }
    if bytes.starts_with(&CFB_SIGNATURE) {
        return Ok(Box::new(XlsSpreadsheet::open(bytes.to_vec())?));
    }
    let zip = ZipArchive::new(Cursor::new(bytes.to_vec()))?;
    if zip.contains("xl/workbook.xml") {
        Ok(Box::new(XlsxSpreadsheet::open(zip)?))
    } else if zip.contains("content.xml") {
        Ok(Box::new(OdsSpreadsheet::open(zip)?))
    } else {
        Err(SpreadsheetError::UnsupportedFormatError("zip archive without workbook".to_owned()))?
    }
}
