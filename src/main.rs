// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! SmartKindy Messaging API Server
//!
//! Receives guardian WhatsApp messages, sends dashboard messages and
//! delivers marketing campaigns through tenant webhooks.

use anyhow::Context;
use smartkindy_messaging::{
    config::Config,
    db::FirestoreDb,
    services::{MessageClient, TasksService, TenantCache},
    AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(port = config.port, "Starting SmartKindy messaging API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .context("Failed to connect to Firestore")?;

    // Initialize Cloud Tasks service
    let tasks_service = TasksService::new(
        &config.gcp_project_id,
        &config.gcp_region,
        &config.tasks_auth_token,
    );
    tracing::info!(
        project = %config.gcp_project_id,
        queue = smartkindy_messaging::config::CAMPAIGN_QUEUE_NAME,
        "Cloud Tasks service initialized"
    );

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        tasks_service,
        message_client: MessageClient::new(),
        tenant_cache: TenantCache::new(Duration::from_secs(config.tenant_cache_ttl_secs)),
    });

    // Build router
    let app = smartkindy_messaging::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> anyhow::Result<()> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("smartkindy_messaging=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
