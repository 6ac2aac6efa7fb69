use serde::Serialize;

use super::data_access::DataAccess;
use super::error::DataError;
use super::params::QueryParams;
use super::query_builder::quote_ident;
use super::table::cell_text;

pub const DEFAULT_SCHEMA: &str = "public";

const COLUMNS_QUERY: &str = r#"
    SELECT column_name::text AS column_name, data_type::text AS data_type,
           udt_schema::text AS udt_schema, udt_name::text AS udt_name
    FROM information_schema.columns
    WHERE table_schema = :schema
      AND table_name = :table
    ORDER BY ordinal_position
"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub declared_type: String,
    /// Quoted type name for `USER-DEFINED` columns (enums, domains), which text values must be cast to.
    pub user_type: Option<String>,
}

impl ColumnDescriptor {
    pub fn new(name: &str, declared_type: &str) -> Self {
        Self {
            name: name.to_string(),
            declared_type: declared_type.to_string(),
            user_type: None,
        }
    }
}

/// `"schema"."type"` for a user-defined column type, `None` for built-in types.
pub fn user_type_name(declared_type: &str, udt_schema: Option<&str>, udt_name: Option<&str>) -> Option<String> {
    if !declared_type.eq_ignore_ascii_case("USER-DEFINED") {
        return None;
    }
    let name = udt_name.filter(|n| !n.is_empty())?;
    Some(match udt_schema.filter(|s| !s.is_empty()) {
        Some(schema) => format!("{}.{}", quote_ident(schema), quote_ident(name)),
        None => quote_ident(name),
    })
}

/// Splits `"schema.table"` on the first dot; unqualified names land in `public`.
pub fn split_qualified_name(qualified: &str) -> (&str, &str) {
    match qualified.split_once('.') {
        Some((schema, table)) => (schema, table),
        None => (DEFAULT_SCHEMA, qualified),
    }
}

/// Catalog lookups for the tables behind one data access handle.
pub struct SchemaIntrospector<'a> {
    access: &'a DataAccess,
    primary_key: &'a str,
}

impl<'a> SchemaIntrospector<'a> {
    pub fn new(access: &'a DataAccess, primary_key: &'a str) -> Self {
        Self { access, primary_key }
    }

    /// Every column except the primary key, in declaration order.
    ///
    /// An unknown table yields an empty list; a failed catalog read is returned as an error.
    pub async fn describe_table(&self, qualified: &str) -> Result<Vec<ColumnDescriptor>, DataError> {
        let (schema, table) = split_qualified_name(qualified);
        let params = QueryParams::new()
            .with("schema", schema.to_lowercase())
            .with("table", table.to_lowercase());

        let catalog = self.access.try_fetch(COLUMNS_QUERY, &params).await?;
        let columns = catalog
            .rows
            .iter()
            .filter_map(|row| {
                let name = row.first().and_then(cell_text)?;
                let declared_type = row.get(1).and_then(cell_text).unwrap_or_default();
                let udt_schema = row.get(2).and_then(cell_text);
                let udt_name = row.get(3).and_then(cell_text);
                let user_type = user_type_name(&declared_type, udt_schema.as_deref(), udt_name.as_deref());
                Some(ColumnDescriptor { name, declared_type, user_type })
            })
            .filter(|column| column.name != self.primary_key)
            .collect();
        Ok(columns)
    }

    /// Like [`describe_table`](Self::describe_table) but treats an empty result as `SchemaNotFound`.
    pub async fn require_columns(&self, qualified: &str) -> Result<Vec<ColumnDescriptor>, DataError> {
        let columns = self.describe_table(qualified).await?;
        if columns.is_empty() {
            return Err(DataError::SchemaNotFound(qualified.to_string()));
        }
        Ok(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_qualified_name() {
        assert_eq!(split_qualified_name("monitoring.sources"), ("monitoring", "sources"));
        assert_eq!(split_qualified_name("sources"), ("public", "sources"));
        assert_eq!(split_qualified_name("a.b.c"), ("a", "b.c"));
    }

    #[test]
    fn test_user_type_name_only_for_user_defined_columns() {
        assert_eq!(
            user_type_name("USER-DEFINED", Some("public"), Some("failure_code")),
            Some(r#""public"."failure_code""#.to_string())
        );
        assert_eq!(user_type_name("USER-DEFINED", None, Some("Mood")), Some(r#""Mood""#.to_string()));
        assert_eq!(user_type_name("text", Some("pg_catalog"), Some("text")), None);
        assert_eq!(user_type_name("USER-DEFINED", Some("public"), None), None);
    }

    #[test]
    fn test_qualified_and_bare_names_resolve_alike() {
        assert_eq!(split_qualified_name("public.widgets"), split_qualified_name("widgets"));
    }
}
