// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Phone number normalization to E.164.
//!
//! Dashboard users paste numbers in whatever shape their spreadsheet had;
//! Saudi local mobile formats are the common case.

use regex::Regex;
use std::sync::OnceLock;

const SAUDI_COUNTRY_CODE: &str = "966";

static E164_RE: OnceLock<Regex> = OnceLock::new();

fn e164_re() -> &'static Regex {
    E164_RE.get_or_init(|| Regex::new(r"^\+[1-9]\d{7,14}$").unwrap())
}

/// A number that could not be brought into E.164 form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid phone format: {0}")]
pub struct InvalidPhone(pub String);

/// Normalize a phone number to E.164.
///
/// - strips whitespace and dashes
/// - `05XXXXXXXX` and `5XXXXXXXX` become `+9665XXXXXXXX`
/// - `00` international prefix becomes `+`
/// - `966XXXXXXXXX` without `+` gets one
/// - anything else must already be `+<country><digits>` (8 to 15 digits)
pub fn normalize_phone(raw: &str) -> Result<String, InvalidPhone> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();

    let all_digits = !cleaned.is_empty() && cleaned.bytes().all(|b| b.is_ascii_digit());

    let candidate = if all_digits && cleaned.len() == 10 && cleaned.starts_with("05") {
        format!("+{}{}", SAUDI_COUNTRY_CODE, &cleaned[1..])
    } else if all_digits && cleaned.len() == 9 && cleaned.starts_with('5') {
        format!("+{}{}", SAUDI_COUNTRY_CODE, cleaned)
    } else if all_digits && cleaned.starts_with("00") {
        format!("+{}", &cleaned[2..])
    } else if all_digits && cleaned.len() == 12 && cleaned.starts_with(SAUDI_COUNTRY_CODE) {
        format!("+{}", cleaned)
    } else {
        cleaned
    };

    if e164_re().is_match(&candidate) {
        Ok(candidate)
    } else {
        Err(InvalidPhone(raw.to_string()))
    }
}
