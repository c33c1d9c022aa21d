use crate::error::BentoError;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::table::Table;
use crate::spreadsheet::SpreadsheetError;

/// Accumulates the cells of one worksheet while it is being parsed.
/// The first row holding any cell is the header row; `limit` counts data rows below it.
pub(crate) struct Sheet {
    /// Sheet name
    pub(crate) name: String,
    /// All cells in document order
    pub(crate) cells: Vec<Cell>,
    /// Data row limit, the header row excluded
    limit: Option<usize>,
    /// Actual data range (determined from cell data)
    pub(crate) row_lower_bound: Option<usize>,
    pub(crate) row_upper_bound: Option<usize>,
    pub(crate) col_lower_bound: Option<usize>,
    pub(crate) col_upper_bound: Option<usize>,
}

impl Sheet {
    pub(super) fn new(name: &str, limit: Option<usize>) -> Self {
        Self {
            name: name.to_owned(),
            cells: Vec::new(),
            limit,
            row_lower_bound: None,
            row_upper_bound: None,
            col_lower_bound: None,
            col_upper_bound: None,
        }
    }

    /// Checks if a row lies past the header row plus the data row limit.
    pub(super) fn after_row_upper_bound(&self, row: usize) -> bool {
        self.row_lower_bound
            .zip(self.limit)
            .map(|(row_lower_bound, limit)| row_lower_bound + limit < row)
            .unwrap_or(false)
    }

    /// Adds a cell to the sheet, updating the data range.
    pub(super) fn push(&mut self, cell: Cell) {
        self.update_bound(cell.row, cell.col);
        self.cells.push(cell);
    }

    fn update_bound(&mut self, row: usize, col: usize) {
        if self.row_lower_bound.map(|row_lower_bound| row < row_lower_bound).unwrap_or(true) {
            self.row_lower_bound = Some(row);
        }
        if self.row_upper_bound.map(|row_upper_bound| row_upper_bound < row).unwrap_or(true) {
            self.row_upper_bound = Some(row);
        }
        if self.col_lower_bound.map(|col_lower_bound| col < col_lower_bound).unwrap_or(true) {
            self.col_lower_bound = Some(col);
        }
        if self.col_upper_bound.map(|col_upper_bound| col_upper_bound < col).unwrap_or(true) {
            self.col_upper_bound = Some(col);
        }
    }

    /// Lays the accumulated cells out as a header row plus data rows.
    /// Every row between the header and the last populated row is kept, so blank rows
    /// inside the data become all-null rows; missing cells inside a row are nulls.
    pub(super) fn into_table(self) -> Result<Table, BentoError> {
        let (header_row, col_lower, col_upper) = match (self.row_lower_bound, self.col_lower_bound, self.col_upper_bound) {
            (Some(row), Some(col_lower), Some(col_upper)) => (row, col_lower, col_upper),
            _ => return Ok(Table::new(&self.name, Vec::new(), Vec::new())),
        };
        let width = col_upper - col_lower + 1;
        let row_upper = self.row_upper_bound.unwrap_or(header_row);

        let mut headers = vec![String::new(); width];
        let mut rows = vec![vec![CellValue::Null; width]; row_upper - header_row];
        for cell in &self.cells {
            let value = cell.to_value().map_err(|message| {
                SpreadsheetError::CellValueError(self.name.to_owned(), cell.reference(), message)
            })?;
            let col = cell.col - col_lower;
            if cell.row == header_row {
                headers[col] = value.to_string();
            } else {
                rows[cell.row - header_row - 1][col] = value;
            }
        }
        Ok(Table::new(&self.name, headers, rows))
    }
}
