//! Carna API server binary.
//!
//! Reads configuration from the environment (and `.env`), migrates the
//! database, optionally seeds an admin account and serves the REST API.

use carna_api::AppState;
use carna_api::config::ApiConfig;
use carna_core::auth::accounts::ensure_admin;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

/// CLI arguments; each falls back to the environment.
#[derive(Parser, Debug)]
#[command(name = "carna_api_server", about = "Carna course API server")]
struct Args {
    /// Address to listen on. Overrides `BIND_ADDR`.
    #[arg(long, env = "BIND_ADDR")]
    bind: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 10)]
    max_connections: u32,

    /// Skip running migrations at startup.
    #[arg(long, default_value_t = false)]
    skip_migrations: bool,

    /// Username of the admin account created when no user by that name exists.
    #[arg(long, env = "ADMIN_USERNAME")]
    admin_username: Option<String>,

    #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
    admin_password: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,carna_api=debug,carna_core=debug".into()),
        )
        .init();

    let args = Args::parse();
    let mut config = ApiConfig::from_env()?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    info!(
        bind = %config.bind_addr,
        env = %config.app_env,
        max_connections = args.max_connections,
        "starting carna_api_server"
    );
    if config.is_production() && !config.cookie_secure {
        warn!("COOKIE_SECURE is off in production; refresh cookies will be sent over plain HTTP");
    }

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&config.pg_connection_url)
        .await?;

    if !args.skip_migrations {
        info!("running database migrations");
        carna_api::migrate(&pool).await?;
    }

    let state = AppState::new(pool, config);
    if let (Some(username), Some(password)) = (&args.admin_username, &args.admin_password)
        && ensure_admin(
            state.users.as_ref(),
            username,
            password,
            state.config.auth.bcrypt_cost,
        )
        .await?
    {
        info!(username = %username, "admin account created");
    }

    let listener = tokio::net::TcpListener::bind(&state.config.bind_addr).await?;
    let local_addr = listener.local_addr()?;
    let app = carna_api::router(state);

    info!(addr = %local_addr, "REST API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
