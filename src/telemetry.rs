use tracing_subscriber::{EnvFilter, fmt};

/// `RUST_LOG` wins; otherwise info everywhere and request spans from tower-http.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let _ = fmt().with_env_filter(filter).try_init();
}
