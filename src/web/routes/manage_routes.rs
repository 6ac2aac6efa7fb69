use axum::{
    Form, Router,
    extract::{Extension, Path, Query, State},
    http::header,
    response::{Html, IntoResponse, Redirect},
    routing::{get, post},
};
use chrono::Local;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::db::table::cell_text;
use crate::db::{Table, WriteOutcome};
use crate::forms::FormField;
use crate::forms::builder::is_truthy_text;
use crate::services::record_service::{self, ALL_COLUMNS, RecordService};
use crate::web::{
    AppState,
    error::AppError,
    models::{AuthenticatedUser, DeleteForm, ManageQuery, ManageTab},
    routes::{TableView, page_context},
    templates::render,
};

pub fn create_manage_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/manage", get(manage_page))
        .route("/manage/export.csv", get(export_csv))
        .route("/manage/add", post(add_record))
        .route("/manage/edit/{id}", post(edit_record))
        .route("/manage/delete/{id}", post(delete_record))
}

fn managed_records(app_state: &AppState) -> RecordService<'_> {
    RecordService::new(
        &app_state.management_db,
        &app_state.config.management_table,
        &app_state.config.primary_key,
    )
}

#[derive(Serialize)]
struct Notice {
    kind: &'static str,
    message: String,
}

fn notice(params: &ManageQuery) -> Option<Notice> {
    let message = params.message.clone().filter(|m| !m.is_empty())?;
    let kind = match params.status.as_deref() {
        Some("ok") => "ok",
        _ => "error",
    };
    Some(Notice { kind, message })
}

fn record_ids(table: &Table, primary_key: &str) -> Vec<i64> {
    table
        .column_values(primary_key)
        .map(|values| values.filter_map(|v| v.as_i64()).collect())
        .unwrap_or_default()
}

/// Column/value pairs of the row whose primary key equals `id`, in column order.
fn record_entries(table: &Table, primary_key: &str, id: i64) -> Vec<(String, String)> {
    let Some(index) = table.column_index(primary_key) else {
        return Vec::new();
    };
    table
        .rows
        .iter()
        .find(|row| row.get(index).and_then(|v| v.as_i64()) == Some(id))
        .map(|row| {
            table
                .columns
                .iter()
                .cloned()
                .zip(row.iter().map(|v| cell_text(v).unwrap_or_default()))
                .collect()
        })
        .unwrap_or_default()
}

async fn manage_page(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<ManageQuery>,
) -> Result<Html<String>, AppError> {
    let config = &app_state.config;
    let service = managed_records(&app_state);

    let mut context = page_context(&auth_user);
    context.insert("tab", params.tab.as_str());
    context.insert("table_name", &config.management_table);
    context.insert("notice", &notice(&params));

    let mut error: Option<String> = None;
    match params.tab {
        ManageTab::View => {
            let fetched = service.load_all().await;
            error = fetched.error.clone();

            let column = params.column.clone().unwrap_or_else(|| ALL_COLUMNS.to_string());
            let term = params.q.clone().unwrap_or_default();
            let filtered = record_service::search(&fetched.table, Some(&column), &term);

            let mut search_columns = vec![ALL_COLUMNS.to_string()];
            search_columns.extend(fetched.table.columns.iter().cloned());

            context.insert("search_columns", &search_columns);
            context.insert("search_column", &column);
            context.insert("q", &term);
            context.insert("records", &TableView::from(&filtered));
            context.insert("total_records", &fetched.table.len());
        }
        ManageTab::Add => {
            let fields = match service.add_form().await {
                Ok(fields) => fields,
                Err(e) => {
                    error = Some(e.to_string());
                    Vec::new()
                }
            };
            context.insert("fields", &fields);
            context.insert("form_action", "/manage/add");
        }
        ManageTab::Edit | ManageTab::Delete => {
            let fetched = service.load_all().await;
            error = fetched.error.clone();
            let ids = record_ids(&fetched.table, &config.primary_key);
            let selected_id = params.id.or_else(|| ids.first().copied());

            if params.tab == ManageTab::Edit {
                let mut fields: Vec<FormField> = Vec::new();
                if let Some(id) = selected_id {
                    match service.edit_form(id).await {
                        Ok(Some(found)) => fields = found,
                        Ok(None) => error = Some(format!("Record {id} not found")),
                        Err(e) => error = Some(e.to_string()),
                    }
                    context.insert("form_action", &format!("/manage/edit/{id}"));
                }
                context.insert("fields", &fields);
            } else {
                let record = selected_id
                    .map(|id| record_entries(&fetched.table, &config.primary_key, id))
                    .unwrap_or_default();
                context.insert("record", &record);
            }

            context.insert("ids", &ids);
            context.insert("selected_id", &selected_id);
        }
    }
    context.insert("error", &error);

    render(&app_state.templates, "manage.html", &context)
}

fn redirect_after_write(tab: ManageTab, id: Option<i64>, outcome: &WriteOutcome) -> Redirect {
    let status = if outcome.success { "ok" } else { "error" };
    let mut location = format!(
        "/manage?tab={}&status={status}&message={}",
        tab.as_str(),
        urlencoding::encode(&outcome.message)
    );
    if let Some(id) = id {
        location.push_str(&format!("&id={id}"));
    }
    Redirect::to(&location)
}

async fn add_record(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Form(submitted): Form<HashMap<String, String>>,
) -> Redirect {
    let outcome = managed_records(&app_state).add(&submitted).await;
    if outcome.success {
        info!(username = %auth_user.username, "Record added.");
    }
    redirect_after_write(ManageTab::Add, None, &outcome)
}

async fn edit_record(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Form(submitted): Form<HashMap<String, String>>,
) -> Redirect {
    let outcome = managed_records(&app_state).edit(id, &submitted).await;
    if outcome.success {
        info!(username = %auth_user.username, record_id = id, "Record updated.");
    }
    redirect_after_write(ManageTab::Edit, Some(id), &outcome)
}

async fn delete_record(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Form(form): Form<DeleteForm>,
) -> Redirect {
    let confirmed = form.confirm.as_deref().is_some_and(is_truthy_text);
    if !confirmed {
        let outcome = WriteOutcome {
            success: false,
            message: "Please confirm the deletion".to_string(),
        };
        return redirect_after_write(ManageTab::Delete, Some(id), &outcome);
    }

    let outcome = managed_records(&app_state).delete(id).await;
    if outcome.success {
        info!(username = %auth_user.username, record_id = id, "Record deleted.");
        return redirect_after_write(ManageTab::Delete, None, &outcome);
    }
    redirect_after_write(ManageTab::Delete, Some(id), &outcome)
}

async fn export_csv(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<ManageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let config = &app_state.config;
    let fetched = managed_records(&app_state).load_all().await;
    if let Some(msg) = fetched.error {
        return Err(AppError::InternalServerError(msg));
    }

    let term = params.q.unwrap_or_default();
    let filtered = record_service::search(&fetched.table, params.column.as_deref(), &term);
    let body = record_service::to_csv(&filtered)?;
    let file_name = record_service::export_file_name(&config.management_table, Local::now().naive_local());

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{file_name}\"")),
        ],
        body,
    ))
}
