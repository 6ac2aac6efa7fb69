use axum::{
    body::Body as AxumBody,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

use crate::services::auth_service;
use crate::web::{AppState, error::AppError};

pub async fn auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut req: Request<AxumBody>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_config = &state.config.auth;

    let token = jar
        .get(&auth_config.cookie_name)
        .map(|c| c.value().to_string())
        .ok_or_else(|| AppError::Unauthorized("no session cookie".to_string()))?;

    let authenticated_user = auth_service::verify_token(&token, auth_config)?;
    req.extensions_mut().insert(authenticated_user);
    Ok(next.run(req).await)
}
