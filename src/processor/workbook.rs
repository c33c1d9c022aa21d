use crate::config::Settings;
use crate::error::BentoError;
use crate::error::ResultMessage;
use crate::processor::sheet::process_sheet_sampled;
use crate::processor::sheet::SheetResult;
use crate::schema::detect_column_type;
use crate::schema::generate_table_name_at;
use crate::schema::normalize_rows;
use crate::schema::record::to_json_value;
use crate::schema::unique_column_names;
use crate::schema::ColumnTypes;
use crate::schema::Record;
use crate::schema::SemanticType;
use crate::spreadsheet::open_spreadsheet;
use crate::spreadsheet::CellValue;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use crate::spreadsheet::Table;
use chrono::Local;
use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Instant;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

/// Result of processing every sheet of a workbook.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WorkbookResult {
    pub sheets_processed: usize,
    pub sheets: Vec<SheetResult>,
    #[serde(rename = "tables")]
    pub table_names: Vec<String>,
    #[serde(rename = "processing_time")]
    pub elapsed_seconds: f64,
    #[serde(rename = "widgets_created")]
    pub total_widgets: usize,
    pub message: String,
}

/// Structured outcome of [`Processor::process_all_sheets`]; failures carry the error text.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProcessResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub workbook: Option<WorkbookResult>,
}

impl ProcessResponse {
    pub fn failure(error: &BentoError) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            workbook: None,
        }
    }
}

impl From<Result<WorkbookResult, BentoError>> for ProcessResponse {
    fn from(result: Result<WorkbookResult, BentoError>) -> Self {
        match result {
            Ok(workbook) => Self {
                success: true,
                error: None,
                workbook: Some(workbook),
            },
            Err(error) => Self::failure(&error),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Validation {
    pub valid: bool,
    pub errors: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    /// Header text as it appears in the sheet
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SemanticType,
    pub nullable: bool,
    /// Distinct non-null values
    pub unique_values: usize,
}

/// Structure of a workbook's first sheet.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FileAnalysis {
    pub valid: bool,
    pub sheets: Vec<String>,
    pub rows: usize,
    pub columns: usize,
    pub column_info: Vec<ColumnInfo>,
    pub file_size: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DataPreview {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub total_rows: usize,
    pub sample_size: usize,
}

/// First sheet only, normalized for storage.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SingleSheetResult {
    pub data: Vec<Record>,
    pub table_name: String,
    pub rows_processed: usize,
    pub columns: usize,
    pub column_names: Vec<String>,
    pub column_types: ColumnTypes,
    pub processing_time: f64,
}

/// Entry point for workbook operations. Holds only immutable settings, so one instance
/// can serve concurrent callers.
#[derive(Clone, Debug, Default)]
pub struct Processor {
    settings: Settings,
}

impl Processor {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Decodes the workbook and processes every sheet in file order.
    /// All table names share one timestamp taken at the start.
    pub fn process_workbook(&self, bytes: &[u8]) -> Result<WorkbookResult, BentoError> {
        self.process_workbook_at(bytes, Local::now().naive_local())
    }

    pub fn process_workbook_at(&self, bytes: &[u8], timestamp: NaiveDateTime) -> Result<WorkbookResult, BentoError> {
        let start = Instant::now();
        let mut spreadsheet = open_spreadsheet(bytes)?;
        info!(format = %spreadsheet.format(), size = bytes.len(), "Processing workbook");

        let mut sheets = Vec::<SheetResult>::new();
        for sheet_name in spreadsheet.sheet_names() {
            let table = spreadsheet.read_sheet(&sheet_name, None).with_prefix(&sheet_name)?;
            let result = process_sheet_sampled(&table, timestamp, self.settings.sample_rows);
            debug!(
                sheet = %sheet_name,
                table = %result.table_name,
                rows = result.row_count,
                columns = result.column_count,
                widgets = result.widget_count(),
                "Processed sheet"
            );
            sheets.push(result);
        }

        let table_names: Vec<String> = sheets.iter().map(|sheet| sheet.table_name.to_owned()).collect();
        let total_widgets: usize = sheets.iter().map(SheetResult::widget_count).sum();
        let elapsed_seconds = start.elapsed().as_secs_f64();
        let message = format!(
            "{} hoja(s) procesada(s) exitosamente. {} widget(s) sugerido(s).",
            sheets.len(),
            total_widgets
        );
        info!(sheets = sheets.len(), widgets = total_widgets, elapsed_seconds, "Processed workbook");
        Ok(WorkbookResult {
            sheets_processed: sheets.len(),
            sheets,
            table_names,
            elapsed_seconds,
            total_widgets,
            message,
        })
    }

    /// Like [`Processor::process_workbook`], but never fails: decode errors become
    /// `success = false` with the error text.
    pub fn process_all_sheets(&self, bytes: &[u8]) -> ProcessResponse {
        let result = self.process_workbook(bytes);
        if let Err(error) = &result {
            error!(%error, "Error in process_all_sheets");
        }
        result.into()
    }

    /// Checks extension, emptiness, size and that the header row can be decoded.
    /// Every problem found is reported.
    pub fn validate_file(&self, bytes: &[u8], file_name: &str) -> Validation {
        let mut errors = Vec::<String>::new();
        if !self.settings.accepts_extension(file_name) {
            errors.push(format!(
                "Extensión no soportada. Use: {}",
                self.settings.allowed_extensions.join(", ")
            ));
        }
        if bytes.is_empty() {
            errors.push("El archivo está vacío".to_string());
        } else {
            if bytes.len() > self.settings.max_file_size {
                errors.push(format!(
                    "Archivo demasiado grande ({}). Máximo: {}",
                    format_file_size(bytes.len()),
                    format_file_size(self.settings.max_file_size)
                ));
            }
            if let Err(error) = read_first_sheet(bytes, Some(0)) {
                errors.push(format!("Error al leer el archivo: {error}"));
            }
        }
        if !errors.is_empty() {
            warn!(file = %file_name, ?errors, "Rejected file");
        }
        Validation {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Sheet names plus per-column statistics of the first sheet.
    pub fn analyze_file(&self, bytes: &[u8]) -> FileAnalysis {
        let analyze = || -> Result<FileAnalysis, BentoError> {
            let mut spreadsheet = open_spreadsheet(bytes)?;
            let sheets = spreadsheet.sheet_names();
            let table = read_first(&mut *spreadsheet, None)?;
            let column_info = table
                .headers
                .iter()
                .enumerate()
                .map(|(index, header)| ColumnInfo {
                    name: header.to_owned(),
                    kind: detect_column_type(table.column(index)),
                    nullable: table.column(index).any(CellValue::is_null),
                    unique_values: count_distinct(table.column(index)),
                })
                .collect();
            Ok(FileAnalysis {
                valid: true,
                sheets,
                rows: table.row_count(),
                columns: table.column_count(),
                column_info,
                file_size: bytes.len(),
                errors: Vec::new(),
            })
        };
        analyze().unwrap_or_else(|error| {
            error!(%error, "Error analyzing file");
            FileAnalysis {
                valid: false,
                file_size: bytes.len(),
                errors: vec![error.to_string()],
                ..FileAnalysis::default()
            }
        })
    }

    /// Headers and the first `rows` rows of the first sheet; the reader stops early.
    pub fn get_data_preview(&self, bytes: &[u8], rows: usize) -> Result<DataPreview, BentoError> {
        let table = read_first_sheet(bytes, Some(rows)).map_err(|error| {
            error!(%error, "Error getting preview");
            error
        })?;
        let preview_rows: Vec<Vec<Value>> = table
            .rows
            .iter()
            .map(|row| row.iter().map(to_json_value).collect())
            .collect();
        let total_rows = preview_rows.len();
        Ok(DataPreview {
            headers: table.headers,
            rows: preview_rows,
            total_rows,
            sample_size: rows.min(total_rows),
        })
    }

    /// Preview with the configured default row count.
    pub fn get_default_preview(&self, bytes: &[u8]) -> Result<DataPreview, BentoError> {
        self.get_data_preview(bytes, self.settings.preview_rows)
    }

    /// Single-sheet path: the first sheet, named after `dashboard_name` or the default base.
    pub fn process_excel(&self, bytes: &[u8], dashboard_name: Option<&str>) -> Result<SingleSheetResult, BentoError> {
        let start = Instant::now();
        let table = read_first_sheet(bytes, None)?;
        let column_names = unique_column_names(&table.headers);
        let column_types: ColumnTypes = column_names
            .iter()
            .enumerate()
            .map(|(index, name)| (name.as_str(), detect_column_type(table.column(index))))
            .collect();
        let data = normalize_rows(&table.rows, &column_names);
        let base = dashboard_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.settings.default_table_base);
        let table_name = generate_table_name_at(base, Local::now().naive_local());
        info!(table = %table_name, rows = data.len(), "Processed first sheet");
        Ok(SingleSheetResult {
            rows_processed: data.len(),
            columns: column_names.len(),
            data,
            table_name,
            column_names,
            column_types,
            processing_time: start.elapsed().as_secs_f64(),
        })
    }
}

/// [`Processor::process_workbook`] with default settings.
pub fn process_workbook(bytes: &[u8]) -> Result<WorkbookResult, BentoError> {
    Processor::default().process_workbook(bytes)
}

/// [`Processor::process_all_sheets`] with default settings.
pub fn process_all_sheets(bytes: &[u8]) -> ProcessResponse {
    Processor::default().process_all_sheets(bytes)
}

fn read_first_sheet(bytes: &[u8], rows_limit: Option<usize>) -> Result<Table, BentoError> {
    let mut spreadsheet = open_spreadsheet(bytes)?;
    read_first(&mut *spreadsheet, rows_limit)
}

fn read_first(spreadsheet: &mut dyn Spreadsheet, rows_limit: Option<usize>) -> Result<Table, BentoError> {
    let name = spreadsheet
        .sheet_names()
        .into_iter()
        .next()
        .ok_or(SpreadsheetError::SpreadsheetEmptyError)?;
    spreadsheet.read_sheet(&name, rows_limit).with_prefix(&name)
}

/// Distinct non-null values; integers and floats of equal value count once.
/// Integers compare exactly; a float joins them only when it is whole and fits an `i64`.
fn count_distinct<'a>(values: impl Iterator<Item = &'a CellValue>) -> usize {
    const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;
    values
        .filter(|value| !value.is_null())
        .map(|value| match value {
            CellValue::Integer(number) => format!("i:{number}"),
            CellValue::Float(number) if number.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(number) => {
                format!("i:{}", *number as i64)
            }
            CellValue::Float(number) => format!("f:{number}"),
            CellValue::Boolean(flag) => format!("b:{flag}"),
            CellValue::DateTime(datetime) => format!("d:{datetime}"),
            CellValue::Text(text) => format!("s:{text}"),
            CellValue::Null => String::new(),
        })
        .collect::<HashSet<String>>()
        .len()
}

/// Human readable byte count, e.g. `10.00 MB`.
fn format_file_size(size: usize) -> String {
    let mut size = size as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{size:.2} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.2} TB")
}
