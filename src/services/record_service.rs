use chrono::NaiveDateTime;
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

use crate::db::query_builder::{quote_ident, quote_table};
use crate::db::schema::SchemaIntrospector;
use crate::db::table::cell_text;
use crate::db::{DataAccess, DataError, Fetched, QueryParams, SqlValue, Table, WriteOutcome};
use crate::forms::{FormField, FormMode, build_form, payload_from_submission, row_map};

/// Column choice meaning "search every column".
pub const ALL_COLUMNS: &str = "All";

/// Case-insensitive substring filter. NULL cells never match; an empty term keeps every row.
pub fn search(table: &Table, column: Option<&str>, term: &str) -> Table {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return table.clone();
    }
    let matches = |value: &Value| cell_text(value).is_some_and(|text| text.to_lowercase().contains(&term));

    match column.filter(|c| *c != ALL_COLUMNS) {
        Some(name) => match table.column_index(name) {
            Some(index) => table.filter_rows(|row| row.get(index).is_some_and(matches)),
            None => Table::new(table.columns.clone(), Vec::new()),
        },
        None => table.filter_rows(|row| row.iter().any(matches)),
    }
}

/// Renders the table as CSV with a header row; NULL cells are left empty.
pub fn to_csv(table: &Table) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(|v| cell_text(v).unwrap_or_default()))?;
    }
    writer.into_inner().map_err(|e| e.into_error().into())
}

/// `<table>_<YYYYmmdd_HHMMSS>.csv`, with the schema prefix dropped.
pub fn export_file_name(table: &str, now: NaiveDateTime) -> String {
    let bare = table.rsplit('.').next().unwrap_or(table);
    format!("{bare}_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

/// Record-level operations on the managed table.
pub struct RecordService<'a> {
    access: &'a DataAccess,
    table: &'a str,
    primary_key: &'a str,
}

impl<'a> RecordService<'a> {
    pub fn new(access: &'a DataAccess, table: &'a str, primary_key: &'a str) -> Self {
        Self {
            access,
            table,
            primary_key,
        }
    }

    pub async fn load_all(&self) -> Fetched {
        let query = format!("SELECT * FROM {}", quote_table(self.table));
        self.access.fetch(&query, &QueryParams::new()).await
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<HashMap<String, Value>>, DataError> {
        let query = format!(
            "SELECT * FROM {} WHERE {} = :id",
            quote_table(self.table),
            quote_ident(self.primary_key)
        );
        let table = self
            .access
            .try_fetch(&query, &QueryParams::new().with("id", id))
            .await?;
        Ok(table.rows.first().map(|row| row_map(&table.columns, row)))
    }

    async fn sample_row(&self) -> Option<HashMap<String, Value>> {
        let query = format!("SELECT * FROM {} LIMIT 1", quote_table(self.table));
        match self.access.try_fetch(&query, &QueryParams::new()).await {
            Ok(table) => table.rows.first().map(|row| row_map(&table.columns, row)),
            Err(e) => {
                warn!(table = %self.table, error = %e, "Could not read a sample row for form defaults.");
                None
            }
        }
    }

    /// Fields for the add form, seeded from the first row of the table.
    pub async fn add_form(&self) -> Result<Vec<FormField>, DataError> {
        let columns = SchemaIntrospector::new(self.access, self.primary_key)
            .require_columns(self.table)
            .await?;
        let sample = self.sample_row().await;
        Ok(build_form(&columns, sample.as_ref(), FormMode::Add))
    }

    /// Fields for the edit form pre-filled from record `id`; `None` when it does not exist.
    pub async fn edit_form(&self, id: i64) -> Result<Option<Vec<FormField>>, DataError> {
        let columns = SchemaIntrospector::new(self.access, self.primary_key)
            .require_columns(self.table)
            .await?;
        let record = self.find_by_id(id).await?;
        Ok(record.map(|row| build_form(&columns, Some(&row), FormMode::Edit)))
    }

    pub async fn add(&self, submitted: &HashMap<String, String>) -> WriteOutcome {
        let fields = match self.add_form().await {
            Ok(fields) => fields,
            Err(e) => return WriteOutcome::failed(&e),
        };
        match payload_from_submission(&fields, submitted) {
            Ok(payload) => self.access.insert_record(self.table, &payload).await,
            Err(e) => WriteOutcome {
                success: false,
                message: e.to_string(),
            },
        }
    }

    pub async fn edit(&self, id: i64, submitted: &HashMap<String, String>) -> WriteOutcome {
        let fields = match self.edit_form(id).await {
            Ok(Some(fields)) => fields,
            Ok(None) => {
                return WriteOutcome {
                    success: false,
                    message: format!("Record {id} not found"),
                };
            }
            Err(e) => return WriteOutcome::failed(&e),
        };
        match payload_from_submission(&fields, submitted) {
            Ok(payload) => {
                self.access
                    .update_record(self.table, self.primary_key, SqlValue::Int(id), &payload)
                    .await
            }
            Err(e) => WriteOutcome {
                success: false,
                message: e.to_string(),
            },
        }
    }

    pub async fn delete(&self, id: i64) -> WriteOutcome {
        self.access
            .delete_record(self.table, self.primary_key, SqlValue::Int(id))
            .await
    }
}
