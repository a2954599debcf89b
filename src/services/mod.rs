// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod campaign;
pub mod dismissal;
pub mod dismissal_parser;
pub mod inbound;
pub mod message_split;
pub mod phone;
pub mod signature;
pub mod tasks;
pub mod template;
pub mod tenant;
pub mod webhook;

pub use campaign::{BatchReport, CampaignSender, SenderSettings};
pub use inbound::InboundProcessor;
pub use tasks::TasksService;
pub use template::{TemplateContext, TemplateSet};
pub use tenant::TenantCache;
pub use webhook::MessageClient;
