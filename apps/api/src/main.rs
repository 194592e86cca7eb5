use std::net::SocketAddr;
use std::sync::Arc;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::stores::{
    ClinicStores, InMemoryAppointmentStore, InMemoryPatientDirectory, InMemoryPaymentLedger,
};
use appointment_cell::AppointmentCellState;
use shared_config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic day API server");

    // Load configuration
    let config = Arc::new(AppConfig::from_env());
    let port = config.port;

    let state = if config.is_configured() {
        info!("Using Supabase stores at {}", config.supabase_url);
        AppointmentCellState::supabase(config)
    } else {
        warn!("Supabase is not configured, appointments are kept in memory only");
        let stores = ClinicStores::in_memory(
            &InMemoryAppointmentStore::new(),
            &InMemoryPatientDirectory::new(),
            &InMemoryPaymentLedger::new(),
        );
        AppointmentCellState::with_stores(config, stores)
    };

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
