use crate::config::Settings;
use crate::schema::Record;
use crate::storage::ColumnMetadata;
use crate::storage::Dashboard;
use crate::storage::DataStore;
use crate::storage::NewDashboard;
use crate::storage::TableMetadata;
use crate::storage::TableRow;
use crate::storage::Widget;
use crate::storage::DEFAULT_BATCH_SIZE;
use anyhow::bail;
use anyhow::Context;
use serde_json::Value;

/// In-memory [`DataStore`]; ids are sequential per record kind, starting at 1.
#[derive(Clone, Debug)]
pub struct MemoryStore {
    batch_size: usize,
    dashboards: Vec<Dashboard>,
    tables: Vec<TableMetadata>,
    rows: Vec<TableRow>,
    widgets: Vec<Widget>,
    /// Sizes of the insert calls, in order
    batches: Vec<usize>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_batch_size(DEFAULT_BATCH_SIZE)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            batch_size,
            dashboards: Vec::new(),
            tables: Vec::new(),
            rows: Vec::new(),
            widgets: Vec::new(),
            batches: Vec::new(),
        }
    }

    /// Batches rows by `storage_batch_size`.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::with_batch_size(settings.storage_batch_size)
    }

    pub fn dashboards(&self) -> &[Dashboard] {
        &self.dashboards
    }

    pub fn tables(&self) -> &[TableMetadata] {
        &self.tables
    }

    pub fn table(&self, table_name: &str) -> Option<&TableMetadata> {
        self.tables.iter().find(|table| table.table_name == table_name)
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn widgets(&self) -> &[Widget] {
        &self.widgets
    }

    pub fn batches(&self) -> &[usize] {
        &self.batches
    }
}

impl DataStore for MemoryStore {
    fn create_dashboard(&mut self, workspace_id: &str, dashboard: NewDashboard) -> anyhow::Result<Dashboard> {
        let position = self
            .dashboards
            .iter()
            .filter(|existing| existing.workspace_id == workspace_id)
            .map(|existing| existing.position + 1)
            .max()
            .unwrap_or(0);
        let created = Dashboard {
            id: self.dashboards.len() as u64 + 1,
            workspace_id: workspace_id.to_owned(),
            name: dashboard.name,
            description: dashboard.description,
            icon: dashboard.icon,
            color: dashboard.color,
            position,
            grid_w: 4,
            grid_h: 2,
            is_system: false,
        };
        self.dashboards.push(created.clone());
        Ok(created)
    }

    fn create_table_metadata(
        &mut self,
        workspace_id: &str,
        table_name: &str,
        columns: Vec<ColumnMetadata>,
        row_count: usize,
    ) -> anyhow::Result<u64> {
        let id = self.tables.len() as u64 + 1;
        self.tables.push(TableMetadata {
            id,
            workspace_id: workspace_id.to_owned(),
            table_name: table_name.to_owned(),
            columns,
            row_count,
        });
        Ok(id)
    }

    fn insert_rows(&mut self, rows: Vec<TableRow>) -> anyhow::Result<usize> {
        if let Some(row) = rows.iter().find(|row| row.table_id == 0 || row.table_id > self.tables.len() as u64) {
            bail!("Unknown table id {}", row.table_id);
        }
        let count = rows.len();
        self.rows.extend(rows);
        self.batches.push(count);
        Ok(count)
    }

    fn update_row_count(&mut self, table_id: u64, row_count: usize) -> anyhow::Result<()> {
        let table = self
            .tables
            .iter_mut()
            .find(|table| table.id == table_id)
            .with_context(|| format!("Unknown table id {table_id}"))?;
        table.row_count = row_count;
        Ok(())
    }

    fn get_table_data(&self, table_id: u64, limit: usize, offset: usize) -> anyhow::Result<Vec<Record>> {
        let mut rows: Vec<&TableRow> = self.rows.iter().filter(|row| row.table_id == table_id).collect();
        rows.sort_by_key(|row| row.row_number);
        Ok(rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| row.row_data.clone())
            .collect())
    }

    fn create_widget(&mut self, dashboard_id: u64, widget_type: &str, config: Value) -> anyhow::Result<Widget> {
        if !self.dashboards.iter().any(|dashboard| dashboard.id == dashboard_id) {
            bail!("Unknown dashboard id {dashboard_id}");
        }
        let widget = Widget {
            id: self.widgets.len() as u64 + 1,
            dashboard_id,
            widget_type: widget_type.to_owned(),
            config,
            position: 0,
            width: 6,
            height: 4,
        };
        self.widgets.push(widget.clone());
        Ok(widget)
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }
}
