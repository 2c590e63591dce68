use std::sync::Arc;

use anyhow::{Context, Result};
use exoviz::api::AppState;
use exoviz::config::ServerConfig;
use exoviz::predict::XgbFileClassifier;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::load().context("loading configuration")?;
    let classifier = Arc::new(XgbFileClassifier::new(&config.model_path));
    let state = Arc::new(AppState::new(config, classifier));

    if state.load_startup_dataset() {
        info!("default dataset loaded from {}", state.config.default_dataset_file.display());
    }

    let addr = state.config.bind_addr.clone();
    let app = exoviz::server::router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("exoviz listening on http://{addr}");
    axum::serve(listener, app).await.context("serving HTTP")?;
    Ok(())
}
