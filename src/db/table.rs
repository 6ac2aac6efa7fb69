use serde::Serialize;
use serde_json::{Value, json};
use sqlx::postgres::PgRow;
use sqlx::{Column, Row, TypeInfo};

/// A tabular read result. Cells are JSON values so they serialize straight into templates.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// The value of `column` in row `row`, if both exist.
    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index)
    }

    /// The cells of one column, `None` when the column is absent.
    pub fn column_values<'a>(&'a self, column: &str) -> Option<impl Iterator<Item = &'a Value> + use<'a>> {
        let index = self.column_index(column)?;
        Some(self.rows.iter().filter_map(move |row| row.get(index)))
    }

    pub fn head(&self, n: usize) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Keeps the rows for which `keep` returns true.
    pub fn filter_rows(&self, mut keep: impl FnMut(&[Value]) -> bool) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|row| keep(row)).cloned().collect(),
        }
    }

    /// Decodes PostgreSQL rows by declared type name.
    pub fn from_pg_rows(rows: &[PgRow]) -> Table {
        let Some(first) = rows.first() else {
            return Table::empty();
        };
        let columns = first
            .columns()
            .iter()
            .map(|column| column.name().to_string())
            .collect();
        let rows = rows.iter().map(decode_row).collect();
        Table { columns, rows }
    }
}

fn decode_row(row: &PgRow) -> Vec<Value> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, column)| decode_cell(row, i, column.type_info().name()))
        .collect()
}

fn decode_cell(row: &PgRow, i: usize, type_name: &str) -> Value {
    let decoded = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(i).map(|v| json!(v)),
        "INT2" => row.try_get::<Option<i16>, _>(i).map(|v| json!(v)),
        "INT4" => row.try_get::<Option<i32>, _>(i).map(|v| json!(v)),
        "INT8" => row.try_get::<Option<i64>, _>(i).map(|v| json!(v)),
        "FLOAT4" => row.try_get::<Option<f32>, _>(i).map(|v| json!(v)),
        "FLOAT8" => row.try_get::<Option<f64>, _>(i).map(|v| json!(v)),
        // Kept as a string so no precision is lost.
        "NUMERIC" => row
            .try_get::<Option<rust_decimal::Decimal>, _>(i)
            .map(|v| json!(v.map(|d| d.to_string()))),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(i)
            .map(|v| json!(v.map(|d| d.format("%Y-%m-%d").to_string()))),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(i)
            .map(|v| json!(v.map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string()))),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(i)
            .map(|v| json!(v.map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string()))),
        "UUID" => row
            .try_get::<Option<uuid::Uuid>, _>(i)
            .map(|v| json!(v.map(|u| u.to_string()))),
        "JSON" | "JSONB" => row
            .try_get::<Option<Value>, _>(i)
            .map(|v| v.unwrap_or(Value::Null)),
        // Enums and other types sent as text labels fail the checked String decode.
        _ => row
            .try_get::<Option<String>, _>(i)
            .or_else(|_| row.try_get_unchecked::<Option<String>, _>(i))
            .map(|v| json!(v)),
    };
    decoded.unwrap_or(Value::Null)
}

/// Display form of a cell; `None` for SQL NULL.
pub fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
