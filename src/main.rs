use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use ward_core::{CoreConfig, StoreBackend};

/// Main entry point for the ward service
///
/// Resolves configuration, opens the configured store and serves the REST API with
/// Swagger UI at `/swagger-ui`.
///
/// # Environment Variables
/// - `WARD_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `WARD_DATA_DIR`: Directory for the file-backed store (default: "ward_data")
/// - `WARD_STORE`: `file` or `memory` (default: "file")
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - any configuration value is invalid,
/// - the store cannot be opened, or
/// - the server address cannot be bound.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ward_run=info".parse()?)
                .add_directive("ward_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = CoreConfig::from_env()?;
    let rest_addr = cfg.rest_addr();

    match cfg.store_backend() {
        StoreBackend::File => {
            tracing::info!("++ Using file store at {}", cfg.data_dir().display())
        }
        StoreBackend::Memory => tracing::info!("++ Using in-memory store"),
    }
    let store = cfg.open_store().await?;

    tracing::info!("++ Starting ward REST on {}", rest_addr);

    let app = api_rest::app(AppState::new(store));
    let listener = tokio::net::TcpListener::bind(rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
