//! Render Lens - Binary Entry Point
//!
//! Serves the dashboard event stream over HTTP, fed by an in-process
//! session store.

use std::sync::Arc;

use render_lens::api::{create_router, ApiState};
use render_lens::stream::{ChangeDetector, StoreSource, StreamHub};
use render_lens::{LensConfig, LensResult, SessionStore};
use tracing::info;

#[tokio::main]
async fn main() -> LensResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = LensConfig::from_env()?;
    let store = Arc::new(SessionStore::with_config(&config));

    let hub = StreamHub::with_config(&config);
    hub.start_keepalive();

    let detector =
        ChangeDetector::with_config(hub.clone(), StoreSource::new(store.clone()), &config);
    detector.start(config.poll_interval);

    let state = Arc::new(ApiState::new(hub.clone(), &config));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, version = render_lens::VERSION, "lens server listening");

    let shutdown_hub = hub.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
            // open streams only end once the hub closes them
            shutdown_hub.shutdown();
        })
        .await?;

    detector.stop();
    hub.shutdown();
    Ok(())
}
