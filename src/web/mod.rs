use axum::{
    Router,
    http::header,
    middleware as axum_middleware,
    response::IntoResponse,
    routing::get,
};
use std::sync::Arc;
use std::time::Duration;
use tera::Tera;
use tower_http::trace::TraceLayer;

use crate::db::DataAccess;
use crate::db::cache::ReadCache;
use crate::db::connection::ConnectionProvider;
use crate::server::config::ServerConfig;
use crate::version::banner;
use crate::web::{middleware::auth, routes::*};

pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod templates;

pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub connections: Arc<ConnectionProvider>,
    pub dashboard_db: DataAccess,
    pub management_db: DataAccess,
    pub templates: Arc<Tera>,
}

impl AppState {
    /// Wires the connection provider, the shared read cache and both data-access targets.
    /// Pools are created on first use, so this never touches the network.
    pub fn new(config: ServerConfig) -> Result<Self, tera::Error> {
        let connections = Arc::new(ConnectionProvider::new(config.connections.clone()));
        let cache = Arc::new(ReadCache::new(Duration::from_secs(config.read_cache_ttl_secs)));

        Ok(Self {
            dashboard_db: DataAccess::new(&config.dashboard_target, connections.clone(), cache.clone()),
            management_db: DataAccess::new(&config.management_target, connections.clone(), cache),
            connections,
            templates: Arc::new(templates::load_templates()?),
            config: Arc::new(config),
        })
    }
}

async fn health_check_handler() -> impl IntoResponse {
    ([(header::SERVER, banner())], "OK")
}

pub fn create_axum_router(app_state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .merge(dashboard_routes::create_dashboard_router())
        .merge(manage_routes::create_manage_router())
        .route_layer(axum_middleware::from_fn_with_state(app_state.clone(), auth::auth));

    Router::new()
        .route("/api/health", get(health_check_handler))
        .merge(auth_routes::create_auth_router())
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::auth_service;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_config() -> ServerConfig {
        let hash = bcrypt::hash("adminalpha", 4).unwrap();
        let toml = format!(
            r#"
            dashboard_target = "dashboard_db"
            management_target = "management_db"

            [auth]
            cookie_name = "scrapewatch_auth"
            cookie_key = "router-test-key"

            [auth.users.admin]
            name = "Administrator"
            password_hash = "{hash}"

            # Unsupported dialect: every data call fails fast without a server.
            [connections.dashboard_db]
            dialect = "mysql"
            host = "127.0.0.1"
            username = "reader"
            database = "scraper"
            "#
        );
        ServerConfig::from_toml_str(&toml).unwrap()
    }

    fn app() -> (Router, Arc<AppState>) {
        let state = Arc::new(AppState::new(test_config()).unwrap());
        (create_axum_router(state.clone()), state)
    }

    fn session_cookie(state: &AppState) -> String {
        let token = auth_service::create_jwt_for_user("admin", "Administrator", &state.config.auth).unwrap();
        format!("scrapewatch_auth={token}")
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::SERVER], banner().as_str());
        assert_eq!(body_text(response).await, "OK");
    }

    #[tokio::test]
    async fn test_protected_pages_redirect_to_login() {
        for path in ["/", "/dashboard", "/manage", "/manage/export.csv"] {
            let (app, _) = app();
            let response = app
                .oneshot(Request::get(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::SEE_OTHER, "{path}");
            assert_eq!(response.headers()[header::LOCATION], "/login");
        }
    }

    #[tokio::test]
    async fn test_tampered_cookie_redirects_to_login() {
        let (app, _) = app();
        let response = app
            .oneshot(
                Request::get("/dashboard")
                    .header(header::COOKIE, "scrapewatch_auth=not-a-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }

    #[tokio::test]
    async fn test_login_page_renders() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::get("/login").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("name=\"password\""));
    }

    #[tokio::test]
    async fn test_login_with_wrong_password() {
        let (app, _) = app();
        let response = app
            .oneshot(
                Request::post("/login")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("username=admin&password=wrong"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        assert!(body_text(response).await.contains("Username&#x2F;password is incorrect"));
    }

    #[tokio::test]
    async fn test_login_sets_session_cookie() {
        let (app, _) = app();
        let response = app
            .oneshot(
                Request::post("/login")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("username=admin&password=adminalpha"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/dashboard");
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("scrapewatch_auth="));
        assert!(cookie.contains("HttpOnly"));
    }

    #[tokio::test]
    async fn test_dashboard_shows_data_error_instead_of_failing() {
        let (app, state) = app();
        let response = app
            .oneshot(
                Request::get("/dashboard")
                    .header(header::COOKIE, session_cookie(&state))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("No database connection for &#x27;dashboard_db&#x27;"));
        assert!(html.contains("Administrator"));
    }

    #[tokio::test]
    async fn test_dashboard_accepts_chart_column() {
        let (app, state) = app();
        let response = app
            .oneshot(
                Request::get("/dashboard?column=priority")
                    .header(header::COOKIE, session_cookie(&state))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("No numeric columns available"));
    }

    #[tokio::test]
    async fn test_delete_requires_confirmation() {
        let (app, state) = app();
        let response = app
            .oneshot(
                Request::post("/manage/delete/5")
                    .header(header::COOKIE, session_cookie(&state))
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers()[header::LOCATION].to_str().unwrap();
        assert!(location.starts_with("/manage?tab=delete&status=error"));
        assert!(location.ends_with("&id=5"));
    }

    #[tokio::test]
    async fn test_logout_clears_cookie() {
        let (app, state) = app();
        let response = app
            .oneshot(
                Request::post("/logout")
                    .header(header::COOKIE, session_cookie(&state))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/login");
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("scrapewatch_auth="));
    }
}
