// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Inbound webhook signature checks.
//!
//! The automation platform in front of WhatsApp either echoes the shared
//! secret verbatim or signs the raw body as `sha256=<hex HMAC-SHA256>`.
//! Both forms are accepted; comparisons are constant-time.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature or shared secret.
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

const HMAC_PREFIX: &str = "sha256=";

/// Compute the `sha256=<hex>` signature for a body.
pub fn sign_body(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(format!(
        "{}{}",
        HMAC_PREFIX,
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Check a presented signature against the tenant secret.
pub fn verify_signature(secret: &str, presented: Option<&str>, body: &[u8]) -> bool {
    let Some(presented) = presented.map(str::trim).filter(|p| !p.is_empty()) else {
        return false;
    };

    if let Some(hex_sig) = presented.strip_prefix(HMAC_PREFIX) {
        let Ok(sig) = hex::decode(hex_sig) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(body);
        return mac.verify_slice(&sig).is_ok();
    }

    constant_time_eq(presented, secret)
}

/// Constant-time string equality.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
