use axum::{
    Form, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;
use tera::Context;
use tracing::info;

use crate::services::auth_service;
use crate::web::{AppState, error::AppError, models::{AuthenticatedUser, LoginRequest}, templates::render};

pub fn create_auth_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", get(login_page).post(login_handler))
        .route("/logout", get(logout_handler).post(logout_handler))
}

fn login_form(
    app_state: &AppState,
    status: StatusCode,
    username: &str,
    error: Option<&str>,
) -> Result<Response, AppError> {
    let mut context = Context::new();
    context.insert("user", &None::<AuthenticatedUser>);
    context.insert("username", username);
    context.insert("error", &error);
    let page = render(&app_state.templates, "login.html", &context)?;
    Ok((status, page).into_response())
}

async fn login_page(
    State(app_state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let auth = &app_state.config.auth;
    let has_session = jar
        .get(&auth.cookie_name)
        .is_some_and(|c| auth_service::verify_token(c.value(), auth).is_ok());
    if has_session {
        return Ok(Redirect::to("/dashboard").into_response());
    }
    login_form(&app_state, StatusCode::OK, "", None)
}

async fn login_handler(
    State(app_state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(payload): Form<LoginRequest>,
) -> Result<Response, AppError> {
    let auth = &app_state.config.auth;

    let token = match auth_service::login_user(auth, &payload) {
        Ok(token) => token,
        Err(AppError::InvalidCredentials) => {
            return login_form(
                &app_state,
                StatusCode::UNAUTHORIZED,
                &payload.username,
                Some("Username/password is incorrect"),
            );
        }
        Err(AppError::InvalidInput(msg)) => {
            return login_form(&app_state, StatusCode::BAD_REQUEST, &payload.username, Some(&msg));
        }
        Err(e) => return Err(e),
    };

    let auth_cookie = Cookie::build((auth.cookie_name.clone(), token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(auth.secure_cookie)
        .max_age(time::Duration::days(auth.cookie_expiry_days))
        .build();

    Ok((jar.add(auth_cookie), Redirect::to("/dashboard")).into_response())
}

async fn logout_handler(State(app_state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let auth = &app_state.config.auth;
    if jar.get(&auth.cookie_name).is_some() {
        info!("User logged out.");
    }
    let jar = jar.remove(Cookie::build((auth.cookie_name.clone(), "")).path("/"));
    (jar, Redirect::to("/login"))
}
