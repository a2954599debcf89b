// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Splitting long messages into provider-sized parts.

/// A whitespace boundary is only used when it keeps at least this share
/// of the limit in the current part; otherwise the part is hard-cut.
const MIN_BOUNDARY_PERCENT: usize = 60;

/// Split `text` into parts of at most `limit` characters.
///
/// Cuts at the last whitespace at or before the limit, falling back to a
/// hard cut when that whitespace lies before 60% of the limit. Whitespace
/// at the cut points is trimmed; order is preserved. Lengths count Unicode
/// scalar values, so Arabic text is measured the way users see it.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let min_boundary = limit * MIN_BOUNDARY_PERCENT / 100;

    let mut parts = Vec::new();
    let mut remaining = text.trim();

    while !remaining.is_empty() {
        // Byte offset of the character at index `limit`, if there is one.
        let Some((hard_cut, next_char)) = remaining.char_indices().nth(limit) else {
            parts.push(remaining.to_string());
            break;
        };

        let cut = if next_char.is_whitespace() {
            hard_cut
        } else {
            let head = &remaining[..hard_cut];
            match head.rfind(char::is_whitespace) {
                Some(pos) if head[..pos].chars().count() >= min_boundary => pos,
                _ => hard_cut,
            }
        };

        let part = remaining[..cut].trim_end();
        if !part.is_empty() {
            parts.push(part.to_string());
        }
        remaining = remaining[cut..].trim_start();
    }

    parts
}
