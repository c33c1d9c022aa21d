use crate::dashboard::detect_user_import_keyed;
use crate::dashboard::suggest_widgets;
use crate::dashboard::UserColumns;
use crate::dashboard::WidgetSuggestion;
use crate::schema::detect_column_type;
use crate::schema::generate_table_name_at;
use crate::schema::normalize_rows;
use crate::schema::unique_column_names;
use crate::schema::ColumnTypes;
use crate::schema::Record;
use crate::spreadsheet::Table;
use chrono::NaiveDateTime;
use serde::Serialize;

/// Records kept as a sheet's sample
pub const DEFAULT_SAMPLE_ROWS: usize = 5;

/// Everything derived from one sheet.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SheetResult {
    pub sheet_name: String,
    pub table_name: String,
    #[serde(rename = "rows")]
    pub row_count: usize,
    #[serde(rename = "columns")]
    pub column_count: usize,
    pub column_types: ColumnTypes,
    pub sample_rows: Vec<Record>,
    pub widget_suggestions: Vec<WidgetSuggestion>,
    pub suggests_user_import: bool,
    pub user_columns: Option<UserColumns>,
    /// All normalized rows, for storage
    #[serde(rename = "_data")]
    pub full_row_data: Vec<Record>,
}

impl SheetResult {
    pub fn widget_count(&self) -> usize {
        self.widget_suggestions.len()
    }
}

/// Processes one decoded sheet, naming its table after the sheet and `timestamp`.
pub fn process_sheet(table: &Table, timestamp: NaiveDateTime) -> SheetResult {
    process_sheet_sampled(table, timestamp, DEFAULT_SAMPLE_ROWS)
}

/// [`process_sheet`] with a custom sample size.
pub fn process_sheet_sampled(table: &Table, timestamp: NaiveDateTime, sample_rows: usize) -> SheetResult {
    let column_names = unique_column_names(&table.headers);
    let column_types: ColumnTypes = column_names
        .iter()
        .enumerate()
        .map(|(index, name)| (name.as_str(), detect_column_type(table.column(index))))
        .collect();
    let records = normalize_rows(&table.rows, &column_names);
    let table_name = generate_table_name_at(&table.name, timestamp);
    let widget_suggestions = suggest_widgets(&column_types, &table_name, &table.name);
    let user_import = detect_user_import_keyed(&table.headers, &column_names);

    SheetResult {
        sheet_name: table.name.to_owned(),
        table_name,
        row_count: table.row_count(),
        column_count: column_names.len(),
        column_types,
        sample_rows: records.iter().take(sample_rows).cloned().collect(),
        widget_suggestions,
        suggests_user_import: user_import.suggests,
        user_columns: user_import.mapping,
        full_row_data: records,
    }
}
