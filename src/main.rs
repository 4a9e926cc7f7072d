use std::{net::SocketAddr, sync::Arc};
use tower::ServiceBuilder;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;
use yfinance_proxy::{
    api,
    config::AppConfig,
    data_structures::{AppState, SharedProvider},
    yahoo::YahooClient,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_config = AppConfig::load()?;

    // Initialize tracing with node_name in all logs
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("yfinance_proxy=info,tower_http=info")),
        )
        .with_target(false)
        .init();

    // Set a global span with node_name for all subsequent logs
    let _span = tracing::info_span!("node", name = %app_config.node_name).entered();

    tracing::info!("Starting yfinance-proxy");
    tracing::info!(
        environment = %app_config.environment,
        port = app_config.port,
        upstream = %app_config.yahoo.query_url,
        "Loaded configuration"
    );

    if app_config.api_key.is_none() {
        tracing::warn!("API_KEY not set, data and status endpoints will reject every request");
    }

    let provider: SharedProvider = Arc::new(YahooClient::new(
        app_config.yahoo.clone(),
        app_config.request_timeout,
    )?);

    let app_state = AppState::new(provider, app_config.api_key.as_deref(), &app_config.node_name);

    let app = api::router(app_state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let app = if app_config.rate_limit_enabled() {
        match GovernorConfigBuilder::default()
            .per_millisecond(app_config.rate_limit_period.as_millis() as u64)
            .burst_size(app_config.rate_limit_burst)
            .finish()
        {
            Some(governor_conf) => {
                tracing::info!(
                    period_ms = app_config.rate_limit_period.as_millis() as u64,
                    burst = app_config.rate_limit_burst,
                    "Per-IP rate limiting enabled"
                );
                app.layer(GovernorLayer::new(Arc::new(governor_conf)))
            }
            None => {
                tracing::warn!("Invalid rate limit settings, serving without rate limiting");
                app
            }
        }
    } else {
        app
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], app_config.port));
    tracing::info!(%addr, "Server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
