use progress_billing::{api, build_service, AppConfig};
use tower::ServiceBuilder;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load()?;
    info!("Starting server with config: {:?}", config);

    let service = build_service(&config).await?;

    let app = api::router(service).layer(ServiceBuilder::new());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  GET|POST /api/sites/:code/statements                       - client track");
    info!("  POST     /api/sites/:code/anchor                           - ensure client anchor");
    info!("  GET|POST /api/sites/:code/subcontractors/:sub/statements   - subcontractor track");
    info!("  GET|PATCH|DELETE /api/statements/:id                       - statement");
    info!("  POST     /api/statements/:id/finalize | /reopen            - lock state");
    info!("  PATCH|DELETE /api/statements/:id/lines/:line_id            - lines");
    info!("  POST|PATCH|DELETE /api/statements/:id/amendments[/:id]     - amendments");
    info!("  GET      /api/statements/:id/export.csv                    - CSV export");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
