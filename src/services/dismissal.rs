// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Dismissal requests and their pickup confirmation tokens.
//!
//! Every request gets a 4-digit PIN for the gate staff and a random QR
//! token for the guardian's phone. Either confirms the pickup until two
//! hours after the requested time.

use crate::error::AppError;
use crate::models::{DismissalRequest, DismissalStatus, DismissalToken, Student};
use crate::services::signature::constant_time_eq;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, NaiveDateTime};
use rand::{Rng, RngCore};
use serde::Deserialize;
use thiserror::Error;

/// Tokens stay valid this long after the pickup time.
pub const TOKEN_VALIDITY_HOURS: i64 = 2;
const QR_TOKEN_BYTES: usize = 32;
/// Server-local timestamps (pickup and expiry) are stored without offset.
pub const LOCAL_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub const SOURCE_WHATSAPP: &str = "whatsapp";

pub fn generate_pin<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{:04}", rng.gen_range(0..10_000))
}

pub fn generate_qr_token<R: RngCore + ?Sized>(rng: &mut R) -> String {
    let mut bytes = [0u8; QR_TOKEN_BYTES];
    rng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Details of a new request, as parsed from a guardian's message.
#[derive(Debug, Clone)]
pub struct NewDismissal<'a> {
    pub tenant_id: &'a str,
    pub guardian_id: &'a str,
    pub student: &'a Student,
    pub pickup: NaiveDateTime,
    pub reason: Option<String>,
    pub source: &'a str,
}

/// Build a pending request and its confirmation token.
pub fn create_request<R: Rng + ?Sized>(
    new: &NewDismissal<'_>,
    created_at: &str,
    rng: &mut R,
) -> (DismissalRequest, DismissalToken) {
    let id = uuid::Uuid::new_v4().to_string();

    let request = DismissalRequest {
        id: id.clone(),
        tenant_id: new.tenant_id.to_string(),
        student_id: new.student.id.clone(),
        student_name: new.student.name.clone(),
        guardian_id: new.guardian_id.to_string(),
        pickup_time: new.pickup.format(LOCAL_TIME_FORMAT).to_string(),
        reason: new.reason.clone(),
        status: DismissalStatus::Pending,
        source: new.source.to_string(),
        created_at: created_at.to_string(),
        confirmed_at: None,
    };

    let expires = new.pickup + Duration::hours(TOKEN_VALIDITY_HOURS);
    let token = DismissalToken {
        request_id: id,
        tenant_id: new.tenant_id.to_string(),
        pin: generate_pin(rng),
        qr_token: generate_qr_token(rng),
        expires_at: expires.format(LOCAL_TIME_FORMAT).to_string(),
        used_at: None,
    };

    (request, token)
}

/// Credential presented at pickup. Exactly one of the two is expected;
/// the PIN is checked first when both are sent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfirmRequest {
    #[serde(default)]
    pub pin: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfirmError {
    #[error("PIN or token required")]
    MissingCredential,
    #[error("Invalid PIN or token")]
    InvalidCredential,
    #[error("Confirmation token expired")]
    Expired,
    #[error("Confirmation token already used")]
    AlreadyUsed,
    #[error("Request is not pending")]
    NotPending,
}

impl From<ConfirmError> for AppError {
    fn from(err: ConfirmError) -> Self {
        match err {
            ConfirmError::InvalidCredential => AppError::Forbidden(err.to_string()),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

/// Check the presented credential and mark the request confirmed.
///
/// On success the request and token are updated in place; the caller
/// persists both.
pub fn confirm(
    request: &mut DismissalRequest,
    token: &mut DismissalToken,
    presented: &ConfirmRequest,
    now: NaiveDateTime,
    confirmed_at: &str,
) -> Result<(), ConfirmError> {
    let pin = presented.pin.as_deref().filter(|p| !p.is_empty());
    let qr = presented.token.as_deref().filter(|t| !t.is_empty());

    let valid = match (pin, qr) {
        (None, None) => return Err(ConfirmError::MissingCredential),
        (Some(pin), _) => constant_time_eq(pin, &token.pin),
        (None, Some(qr)) => constant_time_eq(qr, &token.qr_token),
    };
    if !valid {
        return Err(ConfirmError::InvalidCredential);
    }

    if token.used_at.is_some() {
        return Err(ConfirmError::AlreadyUsed);
    }
    if request.status != DismissalStatus::Pending {
        return Err(ConfirmError::NotPending);
    }

    // An unparseable expiry is treated as expired.
    let expired = NaiveDateTime::parse_from_str(&token.expires_at, LOCAL_TIME_FORMAT)
        .map(|expires| now > expires)
        .unwrap_or(true);
    if expired {
        return Err(ConfirmError::Expired);
    }

    request.status = DismissalStatus::Confirmed;
    request.confirmed_at = Some(confirmed_at.to_string());
    token.used_at = Some(confirmed_at.to_string());
    Ok(())
}
