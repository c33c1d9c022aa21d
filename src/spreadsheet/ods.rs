use crate::error::BentoError;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::table::Table;
use crate::spreadsheet::ByteReader;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use crate::spreadsheet::WorkbookFormat;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::io::Read;
use thiserror::Error;
use zip::ZipArchive;

/// ODS file MIME type identifier
const MIME_TYPE: &[u8] = b"application/vnd.oasis.opendocument.spreadsheet";
const CONTENT: &str = "content.xml";
const TABLE: QName = QName(b"table:table");
const TABLE_ROW: QName = QName(b"table:table-row");
const TABLE_CELL: QName = QName(b"table:table-cell");
/// Covered cells sit under merged ranges
const TABLE_COVERED_CELL: QName = QName(b"table:covered-table-cell");
const ANNOTATION: QName = QName(b"office:annotation");
const PARAGRAPH: QName = QName(b"text:p");
/// Run of spaces, `text:c` gives the count
const SPACE: QName = QName(b"text:s");

#[derive(Error, Debug)]
pub enum OdsError {
    #[error("Invalid ODS MIME type")]
    MimeTypeError,

    #[error("Table without a name in content.xml")]
    MissingTableNameError,
}

/// An OpenDocument spreadsheet (.ods) held in memory
pub(crate) struct OdsSpreadsheet {
    zip: ZipArchive<ByteReader>,
    sheets: Vec<String>,
}

impl OdsSpreadsheet {
    pub(crate) fn open(mut zip: ZipArchive<ByteReader>) -> Result<Self, BentoError> {
        check_mime(&mut zip)?;
        if is_password_protected(&mut zip)? {
            Err(SpreadsheetError::SpreadsheetPasswordProtectedError)?;
        }
        let sheets = load_sheet_names(&mut zip)?;
        if sheets.is_empty() {
            Err(SpreadsheetError::SpreadsheetEmptyError)?;
        }
        Ok(OdsSpreadsheet { zip, sheets })
    }
}

impl Spreadsheet for OdsSpreadsheet {
    fn format(&self) -> WorkbookFormat {
        WorkbookFormat::Ods
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.to_owned()
    }

    fn read_sheet(&mut self, name: &str, rows_limit: Option<usize>) -> Result<Table, BentoError> {
        if !self.sheets.iter().any(|sheet| sheet == name) {
            Err(SpreadsheetError::SheetNotFoundError(name.to_owned()))?;
        }
        let mut reader = self
            .zip
            .xml_reader(CONTENT)?
            .ok_or_else(|| SpreadsheetError::MissingPartError(CONTENT.to_owned()))?;
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TABLE => {
                if event.get_attribute_value("table:name")?.as_deref() == Some(name) {
                    break;
                }
            }
        });

        let mut sheet = Sheet::new(name, rows_limit);
        let mut row = 0usize;
        let mut col = 0usize;
        let mut row_count = 1usize;
        let mut col_count = 1usize;
        let mut kind = CellType::default();
        let mut value = String::new();
        // Reading paragraph text of a string cell
        let mut element_context = false;
        let mut comment_context = false;
        match_xml_events!(reader => {
            Event::End(event) if event.name() == TABLE => break,
            Event::Start(event) if event.name() == TABLE_ROW => {
                row_count = event.parse_attribute_value("table:number-rows-repeated")?.unwrap_or(1);
                col = 0;
            }
            Event::End(event) if event.name() == TABLE_ROW => {
                row += row_count;
                if sheet.after_row_upper_bound(row) {
                    break;
                }
            }
            Event::Start(event) if event.name() == TABLE_CELL || event.name() == TABLE_COVERED_CELL => {
                value.clear();
                col_count = event.parse_attribute_value::<usize>("table:number-columns-repeated")?.unwrap_or(1);
                let value_type = event.get_attribute_value("office:value-type")?;
                kind = match value_type.as_deref() {
                    Some("boolean") => CellType::Boolean,
                    Some("date") => CellType::IsoDateTime,
                    Some("time") => CellType::IsoDuration,
                    Some("string") => {
                        let is_error = event.get_attribute_value("calcext:value-type")?.as_deref() == Some("error");
                        if is_error { CellType::Error } else { CellType::Text }
                    }
                    Some(_) => CellType::Number,
                    None => CellType::Empty,
                };
                match kind {
                    CellType::Text | CellType::Error => element_context = true,
                    CellType::Boolean => {
                        let truth = event.get_attribute_value("office:boolean-value")?
                            .map(|cow| cow != "false" && cow != "0")
                            .unwrap_or(false);
                        value.push_str(if truth { "1" } else { "0" });
                    }
                    CellType::IsoDateTime => if let Some(data) = event.get_attribute_value("office:date-value")? {
                        value.push_str(&data);
                    }
                    CellType::IsoDuration => if let Some(data) = event.get_attribute_value("office:time-value")? {
                        value.push_str(&data);
                    }
                    CellType::Number => if let Some(data) = event.get_attribute_value("office:value")? {
                        value.push_str(&data);
                    }
                    _ => (),
                }
            }
            Event::End(event) if event.name() == TABLE_CELL || event.name() == TABLE_COVERED_CELL => {
                if kind != CellType::Empty && !value.is_empty() {
                    for row_offset in 0..row_count {
                        let row_number = row + row_offset;
                        if sheet.after_row_upper_bound(row_number) {
                            break;
                        }
                        for col_offset in 0..col_count {
                            sheet.push(Cell {
                                row: row_number,
                                col: col + col_offset,
                                kind,
                                value: value.to_owned(),
                            });
                        }
                    }
                }
                col += col_count;
                kind = CellType::Empty;
                element_context = false;
                comment_context = false;
            }
            Event::Start(event) if element_context && event.name() == ANNOTATION => comment_context = true,
            Event::End(event) if element_context && comment_context && event.name() == ANNOTATION => comment_context = false,
            Event::Start(event) if element_context && !comment_context && event.name() == PARAGRAPH => {
                if !value.is_empty() {
                    value.push('\n');
                }
            }
            Event::Start(event) if element_context && !comment_context && event.name() == SPACE => {
                let count = event.parse_attribute_value("text:c")?.unwrap_or(1);
                value.extend(std::iter::repeat(' ').take(count));
            }
            Event::Text(event) if element_context && !comment_context => value.push_bytes_text(&event)?,
            Event::GeneralRef(event) if element_context && !comment_context => value.push_bytes_ref(&event)?,
        });
        sheet.into_table()
    }
}

/// Lists the names of every table in `content.xml`, in document order.
fn load_sheet_names(zip: &mut ZipArchive<ByteReader>) -> Result<Vec<String>, BentoError> {
    let mut reader = zip
        .xml_reader(CONTENT)?
        .ok_or_else(|| SpreadsheetError::MissingPartError(CONTENT.to_owned()))?;
    let mut sheets = Vec::<String>::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TABLE => {
            let name = event
                .get_attribute_value("table:name")?
                .ok_or(OdsError::MissingTableNameError)?;
            sheets.push(name.to_string());
        }
    });
    Ok(sheets)
}

fn check_mime(zip: &mut ZipArchive<ByteReader>) -> Result<(), BentoError> {
    if let Some(file) = &mut zip.file("mimetype")? {
        let mut buffer = Vec::with_capacity(MIME_TYPE.len());
        file.read_to_end(&mut buffer)?;
        if buffer.trim_ascii() != MIME_TYPE {
            Err(OdsError::MimeTypeError)?;
        }
    }
    Ok(())
}

/// A manifest entry carrying encryption data marks a password-protected document.
fn is_password_protected(zip: &mut ZipArchive<ByteReader>) -> Result<bool, BentoError> {
    let mut reader = match zip.xml_reader("META-INF/manifest.xml")? {
        Some(reader) => reader,
        None => return Ok(false),
    };
    let mut in_file_entry = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == QName(b"manifest:file-entry") => in_file_entry = true,
        Event::End(event) if event.name() == QName(b"manifest:file-entry") => in_file_entry = false,
        Event::Start(event) if in_file_entry && event.name() == QName(b"manifest:encryption-data") => {
            return Ok(true);
        }
    });
    Ok(false)
}
