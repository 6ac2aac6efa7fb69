use axum::{
    Router,
    extract::{Extension, Query, State},
    response::{Html, Redirect},
    routing::get,
};
use std::sync::Arc;

use crate::services::monitor_service::{self, HISTOGRAM_BINS};
use crate::services::record_service::RecordService;
use crate::web::{
    AppState,
    error::AppError,
    models::{AuthenticatedUser, DashboardQuery},
    routes::{TableView, page_context},
    templates::render,
};

const PREVIEW_ROWS: usize = 10;

pub fn create_dashboard_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(|| async { Redirect::to("/dashboard") }))
        .route("/dashboard", get(dashboard_page))
}

/// The requested column when it is numeric, otherwise the first numeric column.
fn chart_column(numeric: &[String], requested: Option<&str>) -> Option<String> {
    requested
        .and_then(|wanted| numeric.iter().find(|c| c.as_str() == wanted))
        .or_else(|| numeric.first())
        .cloned()
}

async fn dashboard_page(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<DashboardQuery>,
) -> Result<Html<String>, AppError> {
    let config = &app_state.config;
    let fetched = RecordService::new(&app_state.dashboard_db, &config.dashboard_table, &config.primary_key)
        .load_all()
        .await;

    let summary = monitor_service::summarize(&fetched.table, &config.monitor);
    let numeric_columns = monitor_service::numeric_columns(&fetched.table);
    let histogram_column = chart_column(&numeric_columns, query.column.as_deref());
    let histogram = histogram_column
        .as_deref()
        .map(|column| monitor_service::histogram(&fetched.table, column, HISTOGRAM_BINS))
        .unwrap_or_default();

    let mut context = page_context(&auth_user);
    context.insert("table_name", &config.dashboard_table);
    context.insert("error", &fetched.error);
    context.insert("summary", &summary);
    context.insert("numeric_columns", &numeric_columns);
    context.insert("histogram_column", &histogram_column);
    context.insert("histogram", &histogram);
    context.insert("preview", &TableView::from(&fetched.table.head(PREVIEW_ROWS)));
    render(&app_state.templates, "dashboard.html", &context)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric() -> Vec<String> {
        vec!["priority".into(), "retries".into()]
    }

    #[test]
    fn test_chart_column_honours_numeric_request() {
        assert_eq!(chart_column(&numeric(), Some("retries")), Some("retries".into()));
    }

    #[test]
    fn test_chart_column_falls_back_to_first_numeric() {
        assert_eq!(chart_column(&numeric(), Some("url")), Some("priority".into()));
        assert_eq!(chart_column(&numeric(), None), Some("priority".into()));
        assert_eq!(chart_column(&[], Some("priority")), None);
    }
}
