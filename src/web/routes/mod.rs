pub mod auth_routes;
pub mod dashboard_routes;
pub mod manage_routes;

use serde::Serialize;
use tera::Context;

use crate::db::Table;
use crate::db::table::cell_text;
use crate::web::models::AuthenticatedUser;

/// A table flattened to display strings for the templates. NULL renders as an empty cell.
#[derive(Debug, Serialize)]
pub struct TableView {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl From<&Table> for TableView {
    fn from(table: &Table) -> Self {
        Self {
            columns: table.columns.clone(),
            rows: table
                .rows
                .iter()
                .map(|row| row.iter().map(|v| cell_text(v).unwrap_or_default()).collect())
                .collect(),
        }
    }
}

pub(crate) fn page_context(user: &AuthenticatedUser) -> Context {
    let mut context = Context::new();
    context.insert("user", user);
    context
}
