//! Atrium identity API server binary.

use std::sync::Arc;

use atrium_api::config::ApiConfig;
use atrium_api::services::auth::seed_master_admin;
use atrium_core::sms::{HttpSmsGateway, LogSmsGateway, SmsGateway};
use atrium_core::store::{MemoryPrincipalStore, PgPrincipalStore, PrincipalStore};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "atrium_api_server", about = "Atrium identity API server")]
struct Args {
    /// Port to listen on. Overrides the port in `BIND_ADDR`.
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/atrium"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Keep principals in memory instead of PostgreSQL. Nothing survives a
    /// restart.
    #[arg(long, default_value_t = false)]
    in_memory: bool,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,atrium_api=debug,atrium_core=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env();
    config.pg_connection_url = args.database_url.clone();
    if let Some(port) = args.port {
        let host = config
            .bind_addr
            .rsplit_once(':')
            .map_or("127.0.0.1", |(host, _)| host);
        config.bind_addr = format!("{host}:{port}");
    }

    info!(
        bind_addr = %config.bind_addr,
        production = config.auth.is_production,
        in_memory = args.in_memory,
        "starting atrium_api_server"
    );

    let store: Arc<dyn PrincipalStore> = if args.in_memory {
        warn!("using in-memory principal store");
        Arc::new(MemoryPrincipalStore::new())
    } else {
        info!(max_connections = args.max_connections, "configuring connection pool");
        let pool = PgPoolOptions::new()
            .max_connections(args.max_connections)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect(&config.pg_connection_url)
            .await?;

        info!("running database migrations");
        atrium_api::migrate(&pool).await?;
        Arc::new(PgPrincipalStore::new(pool))
    };

    let sms: Arc<dyn SmsGateway> = match &config.sms.gateway_url {
        Some(url) => {
            info!(gateway = %url, "using HTTP SMS gateway");
            Arc::new(HttpSmsGateway::new(url.clone(), config.sms.api_key.clone()))
        }
        None => {
            if config.auth.is_production {
                warn!("no SMS_GATEWAY_URL in production; OTP requests will fail until one is set");
            }
            Arc::new(LogSmsGateway::new(!config.auth.is_production))
        }
    };

    if let Some(seed) = &config.seed_admin
        && let Some(admin) = seed_master_admin(store.as_ref(), &seed.email, &seed.password).await?
    {
        info!(principal = %admin.id, "master admin created from environment");
    }

    let state = atrium_api::AppState::new(store, sms, config.clone());
    let app = atrium_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
