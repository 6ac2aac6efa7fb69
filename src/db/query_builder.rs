use super::data_access::{DataAccess, WriteOutcome};
use super::error::DataError;
use super::params::{QueryParams, SqlValue};

/// Column name to value mapping for one write, identifier column excluded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPayload {
    entries: Vec<(String, SqlValue)>,
    casts: Vec<(String, String)>,
}

impl RecordPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `column`, replacing an earlier value for the same column.
    pub fn set(&mut self, column: &str, value: SqlValue) {
        match self.entries.iter_mut().find(|(name, _)| name == column) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column.to_string(), value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Wraps the column's bound value in `CAST(... AS sql_type)`. `sql_type` must already be quoted.
    pub fn cast_to(&mut self, column: &str, sql_type: &str) {
        match self.casts.iter_mut().find(|(name, _)| name == column) {
            Some(entry) => entry.1 = sql_type.to_string(),
            None => self.casts.push((column.to_string(), sql_type.to_string())),
        }
    }

    pub fn cast_for(&self, column: &str) -> Option<&str> {
        self.casts
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, sql_type)| sql_type.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }
}

/// SQL text with `:name` placeholders plus the values to bind.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: QueryParams,
}

/// Double-quotes an identifier, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quotes each part of a possibly schema-qualified table name.
///
/// Parts are folded to lower case first, matching how unquoted names resolve and how the
/// catalog lookup in `SchemaIntrospector` reads them.
pub fn quote_table(qualified: &str) -> String {
    match qualified.split_once('.') {
        Some((schema, table)) => format!(
            "{}.{}",
            quote_ident(&schema.to_lowercase()),
            quote_ident(&table.to_lowercase())
        ),
        None => quote_ident(&qualified.to_lowercase()),
    }
}

fn placeholder_name(position: usize) -> String {
    format!("p{position}")
}

// NULL is written inline: a bound NULL carries a text type and is rejected by non-text columns.
fn value_expr(position: usize, value: &SqlValue, cast: Option<&str>, params: &mut QueryParams) -> String {
    if *value == SqlValue::Null {
        return "NULL".to_string();
    }
    let name = placeholder_name(position);
    params.insert(&name, value.clone());
    match cast {
        Some(sql_type) => format!("CAST(:{name} AS {sql_type})"),
        None => format!(":{name}"),
    }
}

pub fn build_insert(table: &str, payload: &RecordPayload) -> Result<Statement, DataError> {
    if payload.is_empty() {
        return Err(DataError::InvalidQuery("nothing to insert".to_string()));
    }
    let mut params = QueryParams::new();
    let mut columns = Vec::with_capacity(payload.len());
    let mut placeholders = Vec::with_capacity(payload.len());
    for (position, (column, value)) in payload.iter().enumerate() {
        columns.push(quote_ident(column));
        placeholders.push(value_expr(position + 1, value, payload.cast_for(column), &mut params));
    }
    Ok(Statement {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_table(table),
            columns.join(", "),
            placeholders.join(", ")
        ),
        params,
    })
}

pub fn build_update(
    table: &str,
    pk_column: &str,
    pk_value: SqlValue,
    payload: &RecordPayload,
) -> Result<Statement, DataError> {
    if payload.is_empty() {
        return Err(DataError::InvalidQuery("nothing to update".to_string()));
    }
    let mut params = QueryParams::new();
    let assignments: Vec<String> = payload
        .iter()
        .enumerate()
        .map(|(position, (column, value))| {
            let expr = value_expr(position + 1, value, payload.cast_for(column), &mut params);
            format!("{} = {}", quote_ident(column), expr)
        })
        .collect();
    params.insert("pk", pk_value);
    Ok(Statement {
        sql: format!(
            "UPDATE {} SET {} WHERE {} = :pk",
            quote_table(table),
            assignments.join(", "),
            quote_ident(pk_column)
        ),
        params,
    })
}

pub fn build_delete(table: &str, pk_column: &str, pk_value: SqlValue) -> Statement {
    Statement {
        sql: format!(
            "DELETE FROM {} WHERE {} = :pk",
            quote_table(table),
            quote_ident(pk_column)
        ),
        params: QueryParams::new().with("pk", pk_value),
    }
}

impl DataAccess {
    pub async fn insert_record(&self, table: &str, payload: &RecordPayload) -> WriteOutcome {
        match build_insert(table, payload) {
            Ok(statement) => self.execute(&statement.sql, &statement.params).await,
            Err(e) => WriteOutcome::failed(&e),
        }
    }

    pub async fn update_record(
        &self,
        table: &str,
        pk_column: &str,
        pk_value: SqlValue,
        payload: &RecordPayload,
    ) -> WriteOutcome {
        match build_update(table, pk_column, pk_value, payload) {
            Ok(statement) => self.execute_keyed(&statement.sql, &statement.params).await,
            Err(e) => WriteOutcome::failed(&e),
        }
    }

    pub async fn delete_record(&self, table: &str, pk_column: &str, pk_value: SqlValue) -> WriteOutcome {
        let statement = build_delete(table, pk_column, pk_value);
        self.execute_keyed(&statement.sql, &statement.params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::params::bind_named;

    fn payload() -> RecordPayload {
        let mut payload = RecordPayload::new();
        payload.set("url", SqlValue::Text("https://a.example".into()));
        payload.set("is_active", SqlValue::Bool(true));
        payload
    }

    #[test]
    fn test_insert_uses_placeholders_only() {
        let statement = build_insert("public.scraper_sources", &payload()).unwrap();
        assert_eq!(
            statement.sql,
            r#"INSERT INTO "public"."scraper_sources" ("url", "is_active") VALUES (:p1, :p2)"#
        );
        let bound = bind_named(&statement.sql, &statement.params).unwrap();
        assert_eq!(
            bound.values,
            vec![SqlValue::Text("https://a.example".into()), SqlValue::Bool(true)]
        );
        assert!(!bound.sql.contains("https://"));
    }

    #[test]
    fn test_update_binds_primary_key_last() {
        let statement = build_update("sources", "id", SqlValue::Int(9), &payload()).unwrap();
        assert_eq!(
            statement.sql,
            r#"UPDATE "sources" SET "url" = :p1, "is_active" = :p2 WHERE "id" = :pk"#
        );
        let bound = bind_named(&statement.sql, &statement.params).unwrap();
        assert_eq!(bound.sql, r#"UPDATE "sources" SET "url" = $1, "is_active" = $2 WHERE "id" = $3"#);
        assert_eq!(bound.values.last(), Some(&SqlValue::Int(9)));
    }

    #[test]
    fn test_delete_is_keyed_by_primary_key() {
        let statement = build_delete("sources", "id", SqlValue::Int(3));
        assert_eq!(statement.sql, r#"DELETE FROM "sources" WHERE "id" = :pk"#);
        assert_eq!(statement.params.get("pk"), Some(&SqlValue::Int(3)));
    }

    #[test]
    fn test_empty_payload_is_rejected() {
        assert!(build_insert("sources", &RecordPayload::new()).is_err());
        assert!(build_update("sources", "id", SqlValue::Int(1), &RecordPayload::new()).is_err());
    }

    #[test]
    fn test_identifiers_are_quoted() {
        assert_eq!(quote_ident(r#"we"ird"#), r#""we""ird""#);
        assert_eq!(quote_table("s.t"), r#""s"."t""#);
    }

    #[test]
    fn test_table_names_fold_to_lower_case() {
        assert_eq!(quote_table("public.Scraper_Sources"), r#""public"."scraper_sources""#);
        assert_eq!(quote_table("Monitoring.Sources"), r#""monitoring"."sources""#);
        assert_eq!(quote_table("Sources"), r#""sources""#);
        // Column identifiers come from the catalog and keep their case.
        assert_eq!(quote_ident("Mixed"), r#""Mixed""#);
    }

    #[test]
    fn test_user_defined_values_are_cast() {
        let mut payload = payload();
        payload.set("failure_code", SqlValue::Text("NO_PORTAL".into()));
        payload.cast_to("failure_code", r#""public"."failure_code""#);
        let statement = build_insert("sources", &payload).unwrap();
        assert_eq!(
            statement.sql,
            r#"INSERT INTO "sources" ("url", "is_active", "failure_code") VALUES (:p1, :p2, CAST(:p3 AS "public"."failure_code"))"#
        );
        let bound = bind_named(&statement.sql, &statement.params).unwrap();
        assert!(bound.sql.ends_with(r#"CAST($3 AS "public"."failure_code"))"#));
        assert_eq!(bound.values[2], SqlValue::Text("NO_PORTAL".into()));
    }

    #[test]
    fn test_cast_does_not_apply_to_null() {
        let mut payload = RecordPayload::new();
        payload.set("failure_code", SqlValue::Null);
        payload.cast_to("failure_code", r#""failure_code""#);
        let statement = build_update("sources", "id", SqlValue::Int(1), &payload).unwrap();
        assert_eq!(statement.sql, r#"UPDATE "sources" SET "failure_code" = NULL WHERE "id" = :pk"#);
    }

    #[test]
    fn test_null_is_written_inline() {
        let mut payload = payload();
        payload.set("priority", SqlValue::Null);
        let statement = build_update("sources", "id", SqlValue::Int(2), &payload).unwrap();
        assert_eq!(
            statement.sql,
            r#"UPDATE "sources" SET "url" = :p1, "is_active" = :p2, "priority" = NULL WHERE "id" = :pk"#
        );
        assert!(statement.params.get("p3").is_none());
    }

    #[test]
    fn test_set_replaces_existing_column() {
        let mut payload = payload();
        payload.set("url", SqlValue::Null);
        assert_eq!(payload.len(), 2);
        assert_eq!(payload.get("url"), Some(&SqlValue::Null));
    }
}
