//! Order payments service
//!
//! HTTP service that creates payment intents for orders and reconciles them
//! with the remote payment gateway.
//!
//! # Usage
//!
//! ```bash
//! GATEWAY_SECRET_KEY=sk_test_... cargo run
//! cargo run -- --gateway sandbox --bind 127.0.0.1:3000
//! cargo run -- --gateway sandbox --smoke-test
//! cargo run -- --mode production --min-charge lkr=200 --worker-threads 8
//! ```
//!
//! Settings can also come from the environment or a `.env` file
//! (`PAYMENTS_BIND`, `PAYMENTS_MODE`, `PAYMENTS_GATEWAY`, `GATEWAY_BASE_URL`,
//! `GATEWAY_SECRET_KEY`, ...). Log filtering follows `RUST_LOG`.
//!
//! # Exit Codes
//!
//! - 0: Clean shutdown (Ctrl-C)
//! - 1: Error (invalid configuration, address in use, etc.)

use order_payments::api::{build_router, AppState};
use order_payments::cli::{self, CliArgs};
use order_payments::core::InMemoryPaymentStore;
use order_payments::gateway;
use std::process;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,order_payments=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = cli::parse_args();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(args.worker_threads())
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to build runtime: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(serve(args)) {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

async fn serve(args: CliArgs) -> Result<(), String> {
    let config = args.to_service_config()?;
    let gateway = gateway::create_gateway(args.gateway, &args.to_gateway_config())?;
    let store = Arc::new(InMemoryPaymentStore::new());

    tracing::info!(
        mode = ?config.mode,
        gateway = ?args.gateway,
        smoke_test = config.smoke_test,
        default_currency = %config.default_currency,
        "Starting order payments service"
    );

    let app = build_router(AppState::new(gateway, store, config));

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .map_err(|e| format!("Failed to bind {}: {}", args.bind, e))?;

    tracing::info!("Server listening on {}", args.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("Server error: {}", e))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
