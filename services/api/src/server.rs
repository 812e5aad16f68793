use crate::cli::ServeArgs;
use crate::infra::{AppState, RateLimiter};
use crate::routes::build_router;
use axum_prometheus::PrometheusMetricLayer;
use skrubb_waitlist::config::AppConfig;
use skrubb_waitlist::error::AppError;
use skrubb_waitlist::telemetry;
use skrubb_waitlist::waitlist::{HttpRelay, SubmissionService};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let relay = Arc::new(HttpRelay::new(&config.relay)?);
    if !relay.is_configured() {
        warn!("RELAY_DESTINATION_URL is not set; submissions will be answered with a configuration error");
    }
    let service = Arc::new(SubmissionService::new(relay, config.relay.timeout));

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let app = build_router(
        service,
        app_state,
        config.cors.clone(),
        RateLimiter::new(config.rate_limit),
    )
    .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        relay = ?config.relay,
        "waiting-list relay ready"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
