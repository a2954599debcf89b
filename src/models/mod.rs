// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod campaign;
pub mod dismissal;
pub mod message;
pub mod tenant;

pub use campaign::{Campaign, CampaignStatus, LogStatus, MessageLog};
pub use dismissal::{DismissalRequest, DismissalStatus, DismissalToken};
pub use message::{MessageDirection, WaMessage};
pub use tenant::{Guardian, Student, TenantSettings, WhatsAppProvider};
