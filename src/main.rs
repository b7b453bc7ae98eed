use agrimarket_gate::{
    AppState,
    config::{AppConfig, Env},
    create_router,
};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Entry point: configuration, logging, gate compilation, then the HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast on missing production secrets).
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise sensible local defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "agrimarket_gate=debug,tower_http=info,axum=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // JSON lines for the log aggregator.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Gate starting in {:?} mode", config.env);

    // 3. Compile locales and route tables once. A bad table must stop startup.
    let bind_addr = config.bind_addr.clone();
    let app_state = AppState::new(config).expect("FATAL: invalid gate configuration");

    tracing::info!(
        locales = ?app_state.gate.locales().supported(),
        default_locale = app_state.gate.locales().default_locale(),
        "Route tables compiled"
    );

    // 4. Router and server.
    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: failed to bind listener. Check BIND_ADDR.");

    tracing::info!("Listening on {bind_addr}");

    axum::serve(listener, app)
        .await
        .expect("FATAL: server terminated unexpectedly");
}
