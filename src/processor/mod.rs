//! Per-sheet processing and whole-workbook orchestration.

pub mod sheet;
pub mod workbook;

pub use sheet::process_sheet;
pub use sheet::SheetResult;
pub use workbook::process_all_sheets;
pub use workbook::process_workbook;
pub use workbook::ColumnInfo;
pub use workbook::DataPreview;
pub use workbook::FileAnalysis;
pub use workbook::ProcessResponse;
pub use workbook::Processor;
pub use workbook::SingleSheetResult;
pub use workbook::Validation;
pub use workbook::WorkbookResult;
