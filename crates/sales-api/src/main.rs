//! Sales API server entry point.

use ledger::{InMemoryLedgerStore, PostgresLedgerStore};
use reqwest::Url;
use sales::HttpBalanceClient;
use sales_api::config::Config;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.uses_default_jwt_secret() {
        tracing::warn!("JWT_SECRET_KEY is not set, using the development secret");
    }

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Customers service client
    let customers_url =
        Url::parse(&config.customers_service_url).expect("invalid CUSTOMERS_SERVICE_URL");
    let balance = HttpBalanceClient::new(customers_url, config.balance_timeout)
        .expect("failed to build customers service client");

    // 4. Ledger and application
    let app = match config.database_url.as_deref() {
        Some(database_url) => {
            let store = PostgresLedgerStore::connect(database_url, config.database_max_connections)
                .await
                .expect("failed to connect to database");
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL ledger");
            sales_api::create_app(
                sales_api::create_state(store, balance, &config),
                metrics_handle,
            )
        }
        None => {
            tracing::warn!("DATABASE_URL is not set, using an in-memory ledger");
            sales_api::create_app(
                sales_api::create_state(InMemoryLedgerStore::new(), balance, &config),
                metrics_handle,
            )
        }
    };

    // 5. Start server
    let addr = config.addr();
    tracing::info!(
        %addr,
        customers_service = %config.customers_service_url,
        "starting sales API server"
    );

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}
