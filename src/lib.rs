//! # Bento Excel
//!
//! Turns uploaded spreadsheet workbooks into typed tables and dashboard suggestions.
//!
//! ## Features
//!
//! - **Workbook decoding**: Office Open XML (`.xlsx`, `.xlsm`), OpenDocument (`.ods`) and
//!   Excel 97-2003 (`.xls`) workbooks read from an in-memory buffer, including shared
//!   strings, 1900/1904 date systems and date number formats
//! - **Schema inference**: each column gets a semantic type (`integer`, `number`, `date`,
//!   `boolean`, `string`) and a sanitized SQL-safe name
//! - **Widget suggestions**: a table, KPI cards and bar/line/pie charts derived from the
//!   column mix of every sheet
//! - **User import detection**: sheets with email and name columns are flagged as rosters
//! - **Persistence seam**: [`storage::DataStore`] stores normalized rows in batches and
//!   materializes suggested widgets on a dashboard
//!
//! ## Example
//!
//! ```no_run
//! use bento_excel::processor::Processor;
//! use bento_excel::storage::{persist_workbook, MemoryStore};
//!
//! # fn main() -> Result<(), bento_excel::BentoError> {
//! let bytes = std::fs::read("ventas.xlsx")?;
//! let processor = Processor::default();
//! let workbook = processor.process_workbook(&bytes)?;
//! for sheet in &workbook.sheets {
//!     println!("{} -> {} ({} widgets)", sheet.sheet_name, sheet.table_name, sheet.widget_count());
//! }
//!
//! let mut store = MemoryStore::new();
//! let summary = persist_workbook(&mut store, "workspace-1", "Ventas", &workbook)?;
//! println!("{}", summary.message);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dashboard;
pub mod error;
mod helpers;
pub mod processor;
pub mod schema;
pub mod spreadsheet;
pub mod storage;

pub use config::Settings;
pub use error::BentoError;
pub use processor::process_all_sheets;
pub use processor::process_workbook;
pub use processor::Processor;
pub use spreadsheet::open_spreadsheet;
