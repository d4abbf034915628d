use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use epi_core::PreprocessConfig;
use epi_core::constants::{
    DEFAULT_REST_ADDR, ENABLE_HTML_OPTIMIZATION_ENV, ENABLE_LINK_CLEANUP_ENV,
    ENABLE_STYLE_CLEANUP_ENV,
};

/// Main entry point for the ePI preprocessing service
///
/// Serves the REST API (with OpenAPI/Swagger UI) on `EPI_REST_ADDR`.
///
/// # Environment Variables
/// - `EPI_REST_ADDR`: REST server address (default: "0.0.0.0:8080")
/// - `ENABLE_HTML_OPTIMIZATION`: prune and collapse narrative markup (default: enabled)
/// - `ENABLE_LINK_CLEANUP`: remove HtmlElementLinks whose class is unused (default: enabled)
/// - `ENABLE_STYLE_CLEANUP`: strip inline styles and unannotated classes (default: enabled)
///
/// Feature flags are enabled by `true`, `1`, `yes` or `on` (case-insensitive).
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If server startup or runtime fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("epi_run=info".parse()?)
                .add_directive("epi_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("EPI_REST_ADDR").unwrap_or_else(|_| DEFAULT_REST_ADDR.into());

    let config = PreprocessConfig::from_env_values(
        std::env::var(ENABLE_HTML_OPTIMIZATION_ENV).ok(),
        std::env::var(ENABLE_LINK_CLEANUP_ENV).ok(),
        std::env::var(ENABLE_STYLE_CLEANUP_ENV).ok(),
    );

    tracing::info!(
        html_optimization = config.html_optimization,
        link_cleanup = config.link_cleanup,
        style_cleanup = config.style_cleanup,
        "++ Feature flags resolved"
    );
    tracing::info!("++ Starting ePI preprocessor REST on {}", rest_addr);

    let app = api_rest::router(Arc::new(config));

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
