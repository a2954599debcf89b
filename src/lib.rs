// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! SmartKindy messaging: WhatsApp glue for a multi-tenant kindergarten SaaS
//!
//! This crate provides the backend for inbound guardian messages
//! (dismissal requests), outbound WhatsApp sends and paced marketing
//! campaigns delivered through tenant webhooks.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::{MessageClient, TasksService, TenantCache};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub tasks_service: TasksService,
    pub message_client: MessageClient,
    pub tenant_cache: TenantCache,
}
