use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub log_dir: String,
    pub dashboard_target: String,
    pub management_target: String,
    pub dashboard_table: String,
    pub management_table: String,
    pub primary_key: String,
    pub read_cache_ttl_secs: u64,
    pub auth: AuthConfig,
    pub connections: HashMap<String, ConnectionConfig>,
    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub cookie_name: String,
    /// Secret used to sign session tokens.
    pub cookie_key: String,
    pub cookie_expiry_days: i64,
    pub secure_cookie: bool,
    pub users: HashMap<String, UserCredential>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct UserCredential {
    #[serde(default)]
    pub name: Option<String>,
    /// bcrypt hash, see `scrapewatch hash-password`.
    pub password_hash: String,
}

/// Credentials for one logical database target.
#[derive(Deserialize, Debug, Clone)]
pub struct ConnectionConfig {
    #[serde(default = "default_dialect")]
    pub dialect: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub database: String,
}

/// Which columns of the monitored table drive the dashboard counters.
#[derive(Deserialize, Debug, Clone)]
pub struct MonitorConfig {
    #[serde(default = "default_active_column")]
    pub active_column: String,
    #[serde(default = "default_status_column")]
    pub status_column: String,
    #[serde(default = "default_failure_values")]
    pub failure_values: BTreeSet<String>,
    #[serde(default = "default_timestamp_column")]
    pub timestamp_column: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            active_column: default_active_column(),
            status_column: default_status_column(),
            failure_values: default_failure_values(),
            timestamp_column: default_timestamp_column(),
        }
    }
}

// Scalar keys that may be overridden from SCRAPEWATCH_* environment variables.
#[derive(Deserialize, Default, Debug)]
struct EnvOverrides {
    listen_addr: Option<String>,
    log_dir: Option<String>,
    dashboard_target: Option<String>,
    management_target: Option<String>,
    dashboard_table: Option<String>,
    management_table: Option<String>,
    primary_key: Option<String>,
    read_cache_ttl_secs: Option<u64>,
    cookie_name: Option<String>,
    cookie_key: Option<String>,
    cookie_expiry_days: Option<i64>,
    secure_cookie: Option<bool>,
}

// Partial file config so that a missing `auth.cookie_key` can still be supplied by the environment.
#[derive(Deserialize, Default, Debug)]
struct PartialServerConfig {
    listen_addr: Option<String>,
    log_dir: Option<String>,
    dashboard_target: Option<String>,
    management_target: Option<String>,
    dashboard_table: Option<String>,
    management_table: Option<String>,
    primary_key: Option<String>,
    read_cache_ttl_secs: Option<u64>,
    #[serde(default)]
    auth: PartialAuthConfig,
    #[serde(default)]
    connections: HashMap<String, ConnectionConfig>,
    monitor: Option<MonitorConfig>,
}

#[derive(Deserialize, Default, Debug)]
struct PartialAuthConfig {
    cookie_name: Option<String>,
    cookie_key: Option<String>,
    cookie_expiry_days: Option<i64>,
    secure_cookie: Option<bool>,
    #[serde(default)]
    users: HashMap<String, UserCredential>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8501".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_dashboard_target() -> String {
    "dashboard_db".to_string()
}

fn default_management_target() -> String {
    "management_db".to_string()
}

fn default_table() -> String {
    "public.scraper_sources".to_string()
}

fn default_primary_key() -> String {
    "id".to_string()
}

fn default_read_cache_ttl_secs() -> u64 {
    60
}

fn default_cookie_name() -> String {
    "scrapewatch_auth".to_string()
}

fn default_cookie_expiry_days() -> i64 {
    30
}

fn default_dialect() -> String {
    "postgresql".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_active_column() -> String {
    "is_active".to_string()
}

fn default_status_column() -> String {
    "failure_code".to_string()
}

fn default_failure_values() -> BTreeSet<String> {
    ["NO_PORTAL", "NO_ARTICLE", "BAD_SEL"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_timestamp_column() -> String {
    "last_updated".to_string()
}

impl ServerConfig {
    /// Loads `.env`, then the optional TOML file, then `SCRAPEWATCH_*` overrides.
    pub fn load(config_path: Option<&str>) -> Result<Self, String> {
        dotenv::dotenv().ok();

        let file_config: PartialServerConfig = match config_path {
            Some(path_str) if Path::new(path_str).exists() => {
                let contents = fs::read_to_string(path_str)
                    .map_err(|e| format!("Failed to read config file at {path_str:?}: {e}"))?;
                toml::from_str(&contents).map_err(|e| {
                    format!("Failed to parse TOML from config file at {path_str:?}: {e}")
                })?
            }
            _ => PartialServerConfig::default(),
        };

        let env_config: EnvOverrides = envy::prefixed("SCRAPEWATCH_")
            .from_env::<EnvOverrides>()
            .map_err(|e| format!("Failed to load config from environment: {e}"))?;

        Self::merge(file_config, env_config)
    }

    /// Parses a complete TOML document without consulting the environment.
    pub fn from_toml_str(contents: &str) -> Result<Self, String> {
        let file_config: PartialServerConfig =
            toml::from_str(contents).map_err(|e| format!("Failed to parse TOML config: {e}"))?;
        Self::merge(file_config, EnvOverrides::default())
    }

    fn merge(file: PartialServerConfig, env: EnvOverrides) -> Result<Self, String> {
        let auth = AuthConfig {
            cookie_name: env
                .cookie_name
                .or(file.auth.cookie_name)
                .unwrap_or_else(default_cookie_name),
            cookie_key: env
                .cookie_key
                .or(file.auth.cookie_key)
                .filter(|key| !key.is_empty())
                .ok_or("auth.cookie_key (SCRAPEWATCH_COOKIE_KEY) is required")?,
            cookie_expiry_days: env
                .cookie_expiry_days
                .or(file.auth.cookie_expiry_days)
                .unwrap_or_else(default_cookie_expiry_days),
            secure_cookie: env
                .secure_cookie
                .or(file.auth.secure_cookie)
                .unwrap_or(false),
            users: file.auth.users,
        };

        Ok(ServerConfig {
            listen_addr: env
                .listen_addr
                .or(file.listen_addr)
                .unwrap_or_else(default_listen_addr),
            log_dir: env.log_dir.or(file.log_dir).unwrap_or_else(default_log_dir),
            dashboard_target: env
                .dashboard_target
                .or(file.dashboard_target)
                .unwrap_or_else(default_dashboard_target),
            management_target: env
                .management_target
                .or(file.management_target)
                .unwrap_or_else(default_management_target),
            dashboard_table: env
                .dashboard_table
                .or(file.dashboard_table)
                .unwrap_or_else(default_table),
            management_table: env
                .management_table
                .or(file.management_table)
                .unwrap_or_else(default_table),
            primary_key: env
                .primary_key
                .or(file.primary_key)
                .unwrap_or_else(default_primary_key),
            read_cache_ttl_secs: env
                .read_cache_ttl_secs
                .or(file.read_cache_ttl_secs)
                .unwrap_or_else(default_read_cache_ttl_secs),
            auth,
            connections: file.connections,
            monitor: file.monitor.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        dashboard_table = "monitoring.sources"

        [auth]
        cookie_key = "secret"

        [auth.users.admin]
        name = "Admin"
        password_hash = "$2b$04$abcdefghijklmnopqrstuu"

        [connections.dashboard_db]
        host = "db.internal"
        username = "reader"
        database = "scraper"

        [monitor]
        status_column = "remarks"
        failure_values = ["Failed (Page Not Found)", "Failed (Invalid Selector)"]
    "#;

    #[test]
    fn test_parse_full_document() {
        let config = ServerConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.dashboard_table, "monitoring.sources");
        assert_eq!(config.management_table, "public.scraper_sources");
        assert_eq!(config.primary_key, "id");
        assert_eq!(config.auth.cookie_expiry_days, 30);
        assert!(config.auth.users.contains_key("admin"));

        let conn = &config.connections["dashboard_db"];
        assert_eq!(conn.dialect, "postgresql");
        assert_eq!(conn.port, 5432);
        assert_eq!(conn.password, "");

        assert_eq!(config.monitor.status_column, "remarks");
        assert_eq!(config.monitor.active_column, "is_active");
        assert!(config.monitor.failure_values.contains("Failed (Invalid Selector)"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, SAMPLE.as_bytes()).unwrap();
        let config = ServerConfig::load(file.path().to_str()).unwrap();
        assert!(config.connections.contains_key("dashboard_db"));
        assert_eq!(config.monitor.status_column, "remarks");
    }

    #[test]
    fn test_cookie_key_is_required() {
        let result = ServerConfig::from_toml_str("[auth]\ncookie_name = \"x\"\n");
        assert!(result.unwrap_err().contains("cookie_key"));
    }

    #[test]
    fn test_default_monitor_columns() {
        let monitor = MonitorConfig::default();
        assert_eq!(monitor.status_column, "failure_code");
        assert_eq!(monitor.failure_values.len(), 3);
        assert!(monitor.failure_values.contains("BAD_SEL"));
    }
}
