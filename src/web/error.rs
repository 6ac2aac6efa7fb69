use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use thiserror::Error;
use tracing::error;

use crate::db::DataError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("JWT creation failed: {0}")]
    TokenCreationError(String),
    #[error("Template error: {0}")]
    TemplateError(String),
    #[error("Internal server error: {0}")]
    InternalServerError(String),
    #[error(transparent)]
    Data(#[from] DataError),
}

fn error_page(status: StatusCode, message: &str) -> Response {
    let body = format!(
        "<!doctype html><html><head><title>{code}</title></head>\
         <body><h1>{code}</h1><p>{message}</p><p><a href=\"/dashboard\">Back to dashboard</a></p></body></html>",
        code = status,
        message = tera::escape_html(message),
    );
    (status, Html(body)).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::InvalidCredentials | AppError::Unauthorized(_) => {
                Redirect::to("/login").into_response()
            }
            AppError::InvalidInput(msg) => error_page(StatusCode::BAD_REQUEST, &msg),
            AppError::NotFound(msg) => error_page(StatusCode::NOT_FOUND, &msg),
            AppError::TokenCreationError(msg) => error_page(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Token creation error: {msg}"),
            ),
            AppError::TemplateError(msg) => {
                error!(error = %msg, "Template rendering failed.");
                error_page(StatusCode::INTERNAL_SERVER_ERROR, "Page rendering failed")
            }
            AppError::InternalServerError(msg) => error_page(StatusCode::INTERNAL_SERVER_ERROR, &msg),
            AppError::Data(e) => error_page(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
        }
    }
}

impl From<tera::Error> for AppError {
    fn from(err: tera::Error) -> Self {
        // The top-level message rarely names the failing filter or variable; keep the chain.
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        AppError::TemplateError(message)
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::InternalServerError(format!("CSV export failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    #[test]
    fn test_unauthorized_redirects_to_login() {
        let response = AppError::Unauthorized("no session".into()).into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }

    #[test]
    fn test_data_errors_render_server_error_page() {
        let response = AppError::from(DataError::SchemaNotFound("public.x".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_not_found_status() {
        let response = AppError::NotFound("record 3".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
