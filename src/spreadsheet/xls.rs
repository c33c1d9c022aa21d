use crate::error::BentoError;
use crate::error::ResultMessage;
use crate::helpers::biff8::Biff8Reader;
use crate::helpers::cfb::Cfb;
use crate::match_biff8_record;
use crate::spreadsheet::cell::to_error_value;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::excel::load_number_formats;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::table::Table;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use crate::spreadsheet::WorkbookFormat;
use std::collections::HashMap;
use thiserror::Error;

// BIFF8 record types
const FORMULA: u16 = 6;
const EOF: u16 = 10;
const DATE1904: u16 = 34;
const FILE_PASS: u16 = 47;
const CODE_PAGE: u16 = 66;
const BOUND_SHEET8: u16 = 133;
const MUL_RK: u16 = 189;
const XF: u16 = 224;
const SST: u16 = 252;
const LABEL_SST: u16 = 253;
const NUMBER: u16 = 515;
const LABEL: u16 = 516;
const BOOL_ERR: u16 = 517;
const STRING: u16 = 519;
const ARRAY: u16 = 545;
const TABLE: u16 = 566;
const RK: u16 = 638;
const FORMAT: u16 = 1054;
const SHARED_FORMULA: u16 = 1212;
const BOF: u16 = 2057;

const BIFF8_VERSION: u16 = 0x0600;
const WORKSHEET: u8 = 0;

#[derive(Error, Debug)]
pub enum XlsError {
    #[error("Invalid Code page '{0}'")]
    CodePageError(u16),

    #[error("Invalid Formula value '{0}'")]
    FormulaValueError(u64),
}

/// A legacy Excel 97-2003 workbook (.xls) held in memory
pub(crate) struct XlsSpreadsheet {
    reader: Biff8Reader,
    shared_strings: Vec<String>,
    /// Cell type of every XF index, for date recognition
    number_formats: Vec<CellType>,
    /// Worksheets as (name, stream offset of their BOF record)
    sheets: Vec<(String, usize)>,
}

impl XlsSpreadsheet {
    /// Reads the workbook globals: date system, code page, formats, shared strings and sheets.
    pub(crate) fn open(bytes: Vec<u8>) -> Result<XlsSpreadsheet, BentoError> {
        let cfb = Cfb::new(bytes)?;
        if cfb.exists("EncryptedPackage") {
            Err(SpreadsheetError::SpreadsheetPasswordProtectedError)?
        }
        let stream = match cfb.read("Workbook")? {
            Some(stream) => Some(stream),
            None => cfb.read("Book")?,
        };
        let mut reader = stream.map(Biff8Reader::new).ok_or_else(|| {
            SpreadsheetError::UnsupportedFormatError("compound document without a workbook stream".to_owned())
        })?;
        if reader.next()? != Some(BOF) {
            Err(SpreadsheetError::UnsupportedFormatError("workbook stream without BOF record".to_owned()))?
        }
        let version = reader.read_u16()?;
        if version != BIFF8_VERSION {
            Err(SpreadsheetError::UnsupportedFormatError(format!("BIFF version {version:#06x}")))?
        }

        let mut is_1904 = false;
        let mut shared_strings = Vec::new();
        let mut custom_formats: Vec<(String, String)> = Vec::new();
        let mut format_indexes: Vec<String> = Vec::new();
        let mut sheets: Vec<(String, usize)> = Vec::new();
        match_biff8_record!(reader => {
            EOF => break,
            FILE_PASS => Err(SpreadsheetError::SpreadsheetPasswordProtectedError)?,
            DATE1904 if reader.read_u16()? == 1 => is_1904 = true,
            CODE_PAGE => {
                let code_page = reader.read_u16()?;
                reader.encoding = codepage::to_encoding(code_page).ok_or(XlsError::CodePageError(code_page))?;
            }
            FORMAT => {
                let id = reader.read_u16()?;
                let format = reader.read_xl_unicode_string()?;
                custom_formats.push((id.to_string(), format));
            }
            XF => {
                reader.skip(2)?;
                let id = reader.read_u16()?;
                format_indexes.push(id.to_string());
            }
            SST => shared_strings = load_shared_strings(&mut reader)?,
            BOUND_SHEET8 => {
                let pointer = reader.read_usize()?;
                reader.skip(1)?;
                let sheet_type = reader.read_u8()?;
                let sheet_name = reader.read_short_xl_unicode_string()?;
                // Chart, macro and dialog sheets carry no cells
                if sheet_type == WORKSHEET {
                    sheets.push((sheet_name, pointer));
                }
            }
        });
        if sheets.is_empty() {
            Err(SpreadsheetError::SpreadsheetEmptyError)?
        }

        let custom_formats: HashMap<String, CellType> = custom_formats
            .into_iter()
            .map(|(id, format)| (id, CellType::parse_custom_number_format(&format, is_1904)))
            .collect();
        let number_formats = load_number_formats(format_indexes, custom_formats, is_1904);

        Ok(XlsSpreadsheet {
            reader,
            shared_strings,
            number_formats,
            sheets,
        })
    }
}

impl Spreadsheet for XlsSpreadsheet {
    fn format(&self) -> WorkbookFormat {
        WorkbookFormat::Xls
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.to_owned()).collect()
    }

    fn read_sheet(&mut self, name: &str, rows_limit: Option<usize>) -> Result<Table, BentoError> {
        let pointer = self
            .sheets
            .iter()
            .find(|(sheet_name, _)| sheet_name == name)
            .map(|(_, pointer)| *pointer)
            .ok_or_else(|| SpreadsheetError::SheetNotFoundError(name.to_owned()))?;

        let reader = &mut self.reader;
        let number_formats = &self.number_formats;
        reader.goto(pointer);
        reader.next()?;
        let mut sheet = Sheet::new(name, rows_limit);
        while let Some(tag) = reader.next()? {
            match tag {
                BOF | EOF => break,
                MUL_RK => {
                    let row = reader.read_u16()? as usize;
                    let col_lower_bound = reader.read_u16()? as usize;
                    let col_upper_bound = reader.get_u16_back(2)? as usize;
                    if sheet.after_row_upper_bound(row) {
                        break;
                    }
                    for col in col_lower_bound..=col_upper_bound {
                        let kind = number_format(number_formats, reader.read_u16()? as usize);
                        let value = reader.read_rk_number()?;
                        sheet.push(Cell { row, col, kind, value });
                    }
                }
                BOOL_ERR | NUMBER | RK | LABEL_SST | LABEL | FORMULA => {
                    let row = reader.read_u16()? as usize;
                    let col = reader.read_u16()? as usize;
                    if sheet.after_row_upper_bound(row) {
                        break;
                    }
                    let (kind, value) = match tag {
                        BOOL_ERR => read_bool_or_error_cell(reader)?,
                        NUMBER => read_number_cell(reader, number_formats)?,
                        RK => read_rk_cell(reader, number_formats)?,
                        LABEL_SST => read_label_sst_cell(reader, &self.shared_strings).with_prefix(name)?,
                        LABEL => read_label_cell(reader)?,
                        _ => read_formula_cell(reader, number_formats)?,
                    };
                    if !value.is_empty() {
                        sheet.push(Cell { row, col, kind, value });
                    }
                }
                _ => (),
            }
        }
        sheet.into_table()
    }
}

fn number_format(number_formats: &[CellType], index: usize) -> CellType {
    number_formats.get(index).copied().unwrap_or(CellType::Number)
}

/// SST record: total and unique counts, then the unique strings.
fn load_shared_strings(reader: &mut Biff8Reader) -> Result<Vec<String>, BentoError> {
    reader.skip(4)?;
    let count = reader.read_usize()?;
    let mut shared_strings: Vec<String> = Vec::with_capacity(count.min(1 << 16));
    for _ in 0..count {
        shared_strings.push(reader.read_xl_unicode_rich_extended_string()?);
    }
    Ok(shared_strings)
}

/// Booleans decode as "1"/"0"; error codes keep their display text.
fn read_bool_or_error_cell(reader: &mut Biff8Reader) -> Result<(CellType, String), BentoError> {
    reader.skip(2)?;
    let value = reader.read_u8()?;
    let flag = reader.read_u8()?;
    Ok(if flag == 0 {
        (CellType::Boolean, value.to_string())
    } else {
        (CellType::Error, to_error_value(value).to_owned())
    })
}

fn read_number_cell(reader: &mut Biff8Reader, number_formats: &[CellType]) -> Result<(CellType, String), BentoError> {
    let index = reader.read_u16()? as usize;
    let value = reader.read_f64()?;
    Ok((number_format(number_formats, index), value.to_string()))
}

fn read_rk_cell(reader: &mut Biff8Reader, number_formats: &[CellType]) -> Result<(CellType, String), BentoError> {
    let index = reader.read_u16()? as usize;
    let value = reader.read_rk_number()?;
    Ok((number_format(number_formats, index), value))
}

fn read_label_sst_cell(reader: &mut Biff8Reader, shared_strings: &[String]) -> Result<(CellType, String), BentoError> {
    reader.skip(2)?;
    let index = reader.read_usize()?;
    let value = shared_strings.get(index).cloned().ok_or(SpreadsheetError::SharedStringError(index))?;
    Ok((CellType::Text, value))
}

fn read_label_cell(reader: &mut Biff8Reader) -> Result<(CellType, String), BentoError> {
    reader.skip(2)?;
    Ok((CellType::Text, reader.read_xl_unicode_string()?))
}

/// Cached formula result. A string result lives in the STRING record that follows,
/// possibly after the shared or array formula definition.
fn read_formula_cell(reader: &mut Biff8Reader, number_formats: &[CellType]) -> Result<(CellType, String), BentoError> {
    let index = reader.read_u16()? as usize;
    let formula = reader.read_u64()?;
    let is_number = (formula & 0xFFFF000000000000) != 0xFFFF000000000000;
    let flag = formula & 0xFF;
    if is_number {
        return Ok((number_format(number_formats, index), f64::from_bits(formula).to_string()));
    }
    match flag {
        0 => loop {
            match reader.next()? {
                Some(STRING) => return Ok((CellType::Text, reader.read_xl_unicode_string()?)),
                Some(SHARED_FORMULA | ARRAY | TABLE) => continue,
                _ => Err(XlsError::FormulaValueError(formula))?,
            }
        },
        1 => {
            let value = if (formula & 0xFF0000) > 0 { "1" } else { "0" };
            Ok((CellType::Boolean, value.to_owned()))
        }
        2 => {
            let code = ((formula >> 16) & 0xFF) as u8;
            Ok((CellType::Error, to_error_value(code).to_owned()))
        }
        3 => Ok((CellType::Text, String::new())),
        _ => Err(XlsError::FormulaValueError(formula))?,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::biff8::tests::record;
    use crate::helpers::biff8::tests::xl_string;
    use crate::helpers::cfb::compound_file;
    use crate::spreadsheet::CellValue;
    use chrono::NaiveDate;

    /// BOF payload: BIFF8 version, substream type, zeroed build fields
    fn bof(substream: u16) -> Vec<u8> {
        let mut payload = [BIFF8_VERSION.to_le_bytes(), substream.to_le_bytes()].concat();
        payload.resize(16, 0);
        record(BOF, &payload)
    }

    fn cell_header(row: u16, col: u16, xf: u16) -> Vec<u8> {
        [row.to_le_bytes(), col.to_le_bytes(), xf.to_le_bytes()].concat()
    }

    fn label_sst(row: u16, col: u16, index: u32) -> Vec<u8> {
        record(LABEL_SST, &[cell_header(row, col, 0), index.to_le_bytes().to_vec()].concat())
    }

    fn label(row: u16, col: u16, value: &str) -> Vec<u8> {
        record(LABEL, &[cell_header(row, col, 0), xl_string(value)].concat())
    }

    fn number(row: u16, col: u16, xf: u16, value: f64) -> Vec<u8> {
        record(NUMBER, &[cell_header(row, col, xf), value.to_le_bytes().to_vec()].concat())
    }

    fn rk_integer(value: i32) -> u32 {
        ((value << 2) as u32) | 0x02
    }

    fn rk(row: u16, col: u16, xf: u16, value: u32) -> Vec<u8> {
        record(RK, &[cell_header(row, col, xf), value.to_le_bytes().to_vec()].concat())
    }

    fn mul_rk(row: u16, col: u16, values: &[(u16, u32)]) -> Vec<u8> {
        let mut payload = [row.to_le_bytes(), col.to_le_bytes()].concat();
        for (xf, value) in values {
            payload.extend_from_slice(&xf.to_le_bytes());
            payload.extend_from_slice(&value.to_le_bytes());
        }
        payload.extend_from_slice(&(col + values.len() as u16 - 1).to_le_bytes());
        record(MUL_RK, &payload)
    }

    fn bool_err(row: u16, col: u16, value: u8, flag: u8) -> Vec<u8> {
        record(BOOL_ERR, &[cell_header(row, col, 0), vec![value, flag]].concat())
    }

    fn formula(row: u16, col: u16, xf: u16, result: [u8; 8]) -> Vec<u8> {
        // result, grbit, chn, empty parsed expression
        record(FORMULA, &[cell_header(row, col, xf), result.to_vec(), vec![0; 8]].concat())
    }

    /// Workbook stream with UTF-16 code page, a custom date format (XF 1) and the
    /// built-in date format 14 (XF 2). Sheets are (name, sheet type, cell records).
    fn workbook_stream(globals: &[Vec<u8>], sheets: &[(&str, u8, Vec<Vec<u8>>)]) -> Vec<u8> {
        let mut stream = bof(0x0005);
        for extra in globals {
            stream.extend_from_slice(extra);
        }
        stream.extend(record(CODE_PAGE, &1200u16.to_le_bytes()));
        stream.extend(record(FORMAT, &[164u16.to_le_bytes().to_vec(), xl_string("yyyy-mm-dd")].concat()));
        for format in [0u16, 164, 14] {
            stream.extend(record(XF, &[vec![0, 0], format.to_le_bytes().to_vec(), vec![0; 16]].concat()));
        }
        let mut sst = [3u32.to_le_bytes(), 3u32.to_le_bytes()].concat();
        for value in ["Nombre", "Email", "Café"] {
            sst.extend(xl_string(value));
        }
        stream.extend(record(SST, &sst));

        let mut pointers = Vec::new();
        for (name, sheet_type, _) in sheets {
            pointers.push(stream.len() + 4);
            let mut payload = vec![0, 0, 0, 0, 0, *sheet_type, name.chars().count() as u8, 0];
            payload.extend(name.chars().map(|character| character as u8));
            stream.extend(record(BOUND_SHEET8, &payload));
        }
        stream.extend(record(EOF, &[]));

        for ((_, _, cells), pointer) in sheets.iter().zip(pointers) {
            let offset = (stream.len() as u32).to_le_bytes();
            stream[pointer..pointer + 4].copy_from_slice(&offset);
            stream.extend(bof(0x0010));
            for cell in cells {
                stream.extend_from_slice(cell);
            }
            stream.extend(record(EOF, &[]));
        }
        stream
    }

    fn open(globals: &[Vec<u8>], sheets: &[(&str, u8, Vec<Vec<u8>>)]) -> Result<XlsSpreadsheet, BentoError> {
        XlsSpreadsheet::open(compound_file(&[("Workbook", workbook_stream(globals, sheets).as_slice())]))
    }

    fn date(y: i32, m: u32, d: u32) -> CellValue {
        CellValue::DateTime(NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap())
    }

    fn datos() -> Vec<Vec<u8>> {
        vec![
            label_sst(0, 0, 0),
            label_sst(0, 1, 1),
            label(0, 2, "Fecha"),
            label(0, 3, "Monto"),
            label(0, 4, "Activo"),
            label(1, 0, "Ana"),
            label(1, 1, "ana@x.com"),
            number(1, 2, 1, 45306.0),
            rk(1, 3, 0, rk_integer(42)),
            bool_err(1, 4, 1, 0),
            label_sst(2, 0, 2),
            formula(2, 1, 0, [0, 0, 0, 0, 0, 0, 0xFF, 0xFF]),
            record(STRING, &xl_string("texto")),
            mul_rk(2, 2, &[(2, rk_integer(45307)), (0, (2.5f64.to_bits() >> 32) as u32)]),
            bool_err(2, 4, 0x07, 1),
            formula(4, 3, 0, 7.0f64.to_le_bytes()),
            formula(4, 4, 0, [1, 0, 1, 0, 0, 0, 0xFF, 0xFF]),
        ]
    }

    #[test]
    fn reads_every_cell_record() {
        let mut spreadsheet = open(&[], &[("Datos", WORKSHEET, datos())]).unwrap();
        assert_eq!(spreadsheet.format(), WorkbookFormat::Xls);
        let table = spreadsheet.read_sheet("Datos", None).unwrap();
        assert_eq!(table.headers, vec!["Nombre", "Email", "Fecha", "Monto", "Activo"]);
        assert_eq!(
            table.rows,
            vec![
                vec![
                    CellValue::from("Ana"),
                    CellValue::from("ana@x.com"),
                    date(2024, 1, 15),
                    CellValue::Integer(42),
                    CellValue::Boolean(true),
                ],
                vec![
                    CellValue::from("Café"),
                    CellValue::from("texto"),
                    date(2024, 1, 16),
                    CellValue::Float(2.5),
                    CellValue::from("#DIV/0!"),
                ],
                vec![CellValue::Null; 5],
                vec![CellValue::Null, CellValue::Null, CellValue::Null, CellValue::Integer(7), CellValue::Boolean(true)],
            ]
        );
    }

    #[test]
    fn sheet_list_skips_charts() {
        let mut spreadsheet = open(
            &[],
            &[("Datos", WORKSHEET, datos()), ("Gráfico", 2, Vec::new()), ("Vacía", WORKSHEET, Vec::new())],
        )
        .unwrap();
        assert_eq!(spreadsheet.sheet_names(), vec!["Datos", "Vacía"]);
        let empty = spreadsheet.read_sheet("Vacía", None).unwrap();
        assert!(empty.headers.is_empty());
        // sheets can be read in any order
        assert_eq!(spreadsheet.read_sheet("Datos", None).unwrap().row_count(), 4);
        assert!(matches!(
            spreadsheet.read_sheet("Gráfico", None),
            Err(BentoError::SpreadsheetError(SpreadsheetError::SheetNotFoundError(_)))
        ));
    }

    #[test]
    fn rows_limit_stops_early() {
        let mut spreadsheet = open(&[], &[("Datos", WORKSHEET, datos())]).unwrap();
        let table = spreadsheet.read_sheet("Datos", Some(1)).unwrap();
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.rows[0][0], CellValue::from("Ana"));
        let table = spreadsheet.read_sheet("Datos", Some(0)).unwrap();
        assert_eq!(table.headers.len(), 5);
        assert!(table.rows.is_empty());
    }

    #[test]
    fn date1904_shifts_dates() {
        let cells = vec![label(0, 0, "Fecha"), number(1, 0, 2, 0.0)];
        let mut spreadsheet = open(&[record(DATE1904, &1u16.to_le_bytes())], &[("Hoja", WORKSHEET, cells)]).unwrap();
        let table = spreadsheet.read_sheet("Hoja", None).unwrap();
        assert_eq!(table.rows[0][0], date(1904, 1, 1));
    }

    #[test]
    fn bad_shared_string_names_the_sheet() {
        let cells = vec![label_sst(0, 0, 9)];
        let mut spreadsheet = open(&[], &[("Hoja", WORKSHEET, cells)]).unwrap();
        let error = spreadsheet.read_sheet("Hoja", None).unwrap_err();
        assert!(error.to_string().starts_with("Hoja: "));
    }

    #[test]
    fn rejects_protected_and_foreign_documents() {
        let protected = open(&[record(FILE_PASS, &[1, 0, 0, 0])], &[("Hoja", WORKSHEET, Vec::new())]);
        assert!(matches!(
            protected,
            Err(BentoError::SpreadsheetError(SpreadsheetError::SpreadsheetPasswordProtectedError))
        ));

        let encrypted = XlsSpreadsheet::open(compound_file(&[("EncryptedPackage", &[0u8; 16][..])]));
        assert!(matches!(
            encrypted,
            Err(BentoError::SpreadsheetError(SpreadsheetError::SpreadsheetPasswordProtectedError))
        ));

        let document = XlsSpreadsheet::open(compound_file(&[("WordDocument", &[0u8; 16][..])]));
        assert!(matches!(
            document,
            Err(BentoError::SpreadsheetError(SpreadsheetError::UnsupportedFormatError(_)))
        ));

        let mut biff5 = workbook_stream(&[], &[("Hoja", WORKSHEET, Vec::new())]);
        biff5[4..6].copy_from_slice(&0x0500u16.to_le_bytes());
        let legacy = XlsSpreadsheet::open(compound_file(&[("Book", biff5.as_slice())]));
        assert!(matches!(
            legacy,
            Err(BentoError::SpreadsheetError(SpreadsheetError::UnsupportedFormatError(_)))
        ));

        assert!(matches!(
            open(&[], &[("Gráfico", 2, Vec::new())]),
            Err(BentoError::SpreadsheetError(SpreadsheetError::SpreadsheetEmptyError))
        ));
    }
}
