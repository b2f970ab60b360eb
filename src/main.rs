use eyre::WrapErr;
use labelsort::{
    idempotency::IdempotencyCache,
    metrics,
    pipeline::Pipeline,
    security::AuthState,
    server::{self, AppState, ServerConfig},
    store::BatchStore,
    telemetry,
};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(target = "labelsort.api", "server crashed: {err:#}");
    }
}

async fn run() -> eyre::Result<()> {
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let config = ServerConfig::from_env();
    let prometheus_handle = metrics::install_recorder().wrap_err("install prometheus recorder")?;
    let state = AppState::new(
        Pipeline::from_env(),
        BatchStore::from_env(),
        IdempotencyCache::from_env(),
        prometheus_handle,
    );
    let app = server::router(state, AuthState::from_env(), config.body_limit);

    let addr = config.socket_addr();
    info!(
        target = "labelsort.api",
        body_limit = config.body_limit,
        "listening on {addr}"
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("bind {addr}"))?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
