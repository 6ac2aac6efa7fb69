use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use scrapewatch::server::config::ServerConfig;
use scrapewatch::version::{banner, release};
use scrapewatch::web::{AppState, create_axum_router};

const DEFAULT_CONFIG_PATH: &str = "scrapewatch.toml";

#[derive(Parser, Debug)]
#[command(author, version = release(), about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the web server (default)
    Serve,
    /// Print bcrypt hashes for use in `[auth.users.*].password_hash`
    HashPassword {
        #[arg(required = true)]
        passwords: Vec<String>,
    },
}

fn init_logging(log_dir: &str) {
    // Log to a file: JSON format, daily rotation
    let file_appender = rolling::daily(log_dir, "scrapewatch.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    // Default to `info,sqlx::query=warn` if RUST_LOG is not set.
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx::query=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

fn hash_passwords(passwords: &[String]) -> Result<(), bcrypt::BcryptError> {
    for password in passwords {
        println!("{}", bcrypt::hash(password, bcrypt::DEFAULT_COST)?);
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for the shutdown signal.");
    }
    info!("Shutdown signal received.");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    if let Some(Command::HashPassword { passwords }) = &args.command {
        hash_passwords(passwords)?;
        return Ok(());
    }

    let config_path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    let server_config = match ServerConfig::load(Some(config_path)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load server configuration: {e}");
            return Err(e.into());
        }
    };

    init_logging(&server_config.log_dir);
    info!("Starting {}", banner());

    let addr: SocketAddr = server_config.listen_addr.parse()?;
    let app_state = Arc::new(AppState::new(server_config)?);
    let app = create_axum_router(app_state.clone());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Web server listening on http://{}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(Box::new)?;

    app_state.connections.close_all().await;
    info!("Connection pools closed, exiting.");
    Ok(())
}
