//! # Persistence
//!
//! [`DataStore`] is the seam between the processor and whatever keeps dashboards, tables
//! and widgets. Tables are stored generically: one metadata record with the column schema,
//! plus one row record per data row holding the normalized JSON object.
//! [`MemoryStore`] implements it in memory.

mod memory;

pub use memory::MemoryStore;

use crate::error::BentoError;
use crate::processor::WorkbookResult;
use crate::schema::ColumnTypes;
use crate::schema::Record;
use crate::schema::SemanticType;
use anyhow::Context;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use tracing::info;

pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Dashboard fields supplied by the caller; the store assigns id and position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewDashboard {
    pub name: String,
    pub description: String,
    pub icon: String,
    pub color: String,
}

impl NewDashboard {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_owned(),
            description: description.to_owned(),
            icon: "table".to_owned(),
            color: "#228BE6".to_owned(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub id: u64,
    pub workspace_id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub color: String,
    pub position: u32,
    pub grid_w: u32,
    pub grid_h: u32,
    pub is_system: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ColumnMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SemanticType,
    pub nullable: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TableMetadata {
    pub id: u64,
    pub workspace_id: String,
    pub table_name: String,
    pub columns: Vec<ColumnMetadata>,
    pub row_count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TableRow {
    pub table_id: u64,
    pub workspace_id: String,
    pub row_data: Record,
    /// 1-based
    pub row_number: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Widget {
    pub id: u64,
    pub dashboard_id: u64,
    #[serde(rename = "type")]
    pub widget_type: String,
    pub config: Value,
    pub position: u32,
    pub width: u32,
    pub height: u32,
}

/// Backend for dashboards, stored tables and widgets.
///
/// Implementors provide the primitive writes; [`DataStore::store_table`] builds on them.
/// Errors are backend defined.
pub trait DataStore {
    /// Creates a dashboard at the workspace's next free position.
    fn create_dashboard(&mut self, workspace_id: &str, dashboard: NewDashboard) -> anyhow::Result<Dashboard>;

    /// Returns the new table id.
    fn create_table_metadata(
        &mut self,
        workspace_id: &str,
        table_name: &str,
        columns: Vec<ColumnMetadata>,
        row_count: usize,
    ) -> anyhow::Result<u64>;

    /// Inserts one batch; returns how many rows were written.
    fn insert_rows(&mut self, rows: Vec<TableRow>) -> anyhow::Result<usize>;

    fn update_row_count(&mut self, table_id: u64, row_count: usize) -> anyhow::Result<()>;

    /// Row data of a stored table ordered by row number.
    fn get_table_data(&self, table_id: u64, limit: usize, offset: usize) -> anyhow::Result<Vec<Record>>;

    fn create_widget(&mut self, dashboard_id: u64, widget_type: &str, config: Value) -> anyhow::Result<Widget>;

    fn batch_size(&self) -> usize {
        DEFAULT_BATCH_SIZE
    }

    /// Stores `records` under a new table, inserting them in batches of [`DataStore::batch_size`].
    /// Returns the number of rows inserted, which also becomes the table's row count.
    fn store_table(
        &mut self,
        workspace_id: &str,
        table_name: &str,
        records: &[Record],
        column_types: &ColumnTypes,
    ) -> anyhow::Result<usize> {
        let columns = column_types
            .iter()
            .map(|(name, kind)| ColumnMetadata {
                name: name.to_owned(),
                kind,
                nullable: true,
            })
            .collect();
        let table_id = self
            .create_table_metadata(workspace_id, table_name, columns, records.len())
            .with_context(|| format!("Failed to create table metadata for {table_name}"))?;
        debug!(table_id, table = %table_name, "Created table metadata");

        let batch_size = self.batch_size().max(1);
        let mut inserted = 0;
        for (index, batch) in records.chunks(batch_size).enumerate() {
            let first_row = index * batch_size + 1;
            let rows = batch
                .iter()
                .enumerate()
                .map(|(offset, record)| TableRow {
                    table_id,
                    workspace_id: workspace_id.to_owned(),
                    row_data: record.clone(),
                    row_number: first_row + offset,
                })
                .collect();
            inserted += self
                .insert_rows(rows)
                .with_context(|| format!("Failed to insert rows starting at {first_row} into {table_name}"))?;
        }
        info!(table = %table_name, rows = inserted, "Inserted rows");

        self.update_row_count(table_id, inserted)?;
        Ok(inserted)
    }
}

/// Outcome of [`persist_workbook`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PersistSummary {
    pub dashboard_id: u64,
    pub tables: Vec<String>,
    pub rows_stored: usize,
    pub widgets_created: usize,
    pub message: String,
}

/// Stores every sheet's rows and materializes every widget suggestion on one new dashboard.
pub fn persist_workbook<S: DataStore + ?Sized>(
    store: &mut S,
    workspace_id: &str,
    dashboard_name: &str,
    workbook: &WorkbookResult,
) -> Result<PersistSummary, BentoError> {
    let description = format!("Dashboard generado desde {dashboard_name}");
    let dashboard = store.create_dashboard(workspace_id, NewDashboard::new(dashboard_name, &description))?;
    info!(dashboard_id = dashboard.id, workspace = %workspace_id, "Created dashboard");

    let mut rows_stored = 0;
    let mut widgets_created = 0;
    for sheet in &workbook.sheets {
        rows_stored += store.store_table(workspace_id, &sheet.table_name, &sheet.full_row_data, &sheet.column_types)?;
        for suggestion in &sheet.widget_suggestions {
            let mut config = serde_json::Map::new();
            config.insert("title".to_owned(), Value::from(suggestion.title.as_str()));
            config.insert("data_source".to_owned(), Value::from(suggestion.table_name.as_str()));
            if let Value::Object(body) = suggestion.config.to_value() {
                config.extend(body);
            }
            store.create_widget(dashboard.id, suggestion.widget_type(), Value::Object(config))?;
            widgets_created += 1;
        }
    }

    let message = format!(
        "Excel procesado exitosamente. Dashboard '{}' creado con {} filas.",
        dashboard.name, rows_stored
    );
    info!(dashboard_id = dashboard.id, rows_stored, widgets_created, "Persisted workbook");
    Ok(PersistSummary {
        dashboard_id: dashboard.id,
        tables: workbook.table_names.clone(),
        rows_stored,
        widgets_created,
        message,
    })
}
