use anyhow::{Context, Result};
use axum::Router;
use std::{fs, io::ErrorKind};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use crate::services::{
    graph_client::GraphClient, identity::TokenProvider, intake_service::IntakeService,
    payment::PaymentClient,
};

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;
#[cfg(test)]
mod testing;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting intake-portal with config: {:?}", cfg);

    // --- Ensure spool directory exists ---
    if !cfg.spool_dir.exists() {
        fs::create_dir_all(&cfg.spool_dir)
            .with_context(|| format!("creating spool directory {}", cfg.spool_dir.display()))?;
        tracing::info!("Created spool directory at {}", cfg.spool_dir.display());
    }

    // --- Upstream clients ---
    let http = reqwest::Client::builder()
        .user_agent(concat!("intake-portal/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let tokens = TokenProvider::new(http.clone(), &cfg.login_base_url, cfg.credentials.clone());
    let graph = GraphClient::new(http.clone(), &cfg.graph_base_url, &cfg.drive_id, tokens);
    let payments = match &cfg.stripe_secret_key {
        Some(key) => Some(PaymentClient::new(http.clone(), &cfg.stripe_base_url, key)),
        None => {
            tracing::warn!("STRIPE_SECRET_KEY is not set; payment endpoints are disabled");
            None
        }
    };

    // --- Initialize core service ---
    let intake = IntakeService::new(graph, cfg.root_folder.clone());
    let app_state = state::AppState::new(intake, payments, cfg.spool_dir.clone());

    // --- Build router ---
    let app: Router = routes::routes::routes(cfg.max_upload_bytes()).with_state(app_state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
