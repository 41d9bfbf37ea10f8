use crate::cli::ServeArgs;
use crate::infra::{memory_directory, seed_directory, AppState};
use crate::routes::with_directory_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use laburar::config::AppConfig;
use laburar::directory::DirectoryApi;
use laburar::error::AppError;
use laburar::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let directory = memory_directory();
    let seeded = seed_directory(&directory, &config.directory).await?;
    if seeded > 0 {
        info!(seeded, "directory seeded with sample listings");
    }

    let api = Arc::new(DirectoryApi::new(Arc::clone(&directory)));
    let app = with_directory_routes(Arc::clone(&api))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "laburar directory ready");

    let served = axum::serve(listener, app).await;
    api.sessions().close();
    directory.session().close();
    served?;
    Ok(())
}
