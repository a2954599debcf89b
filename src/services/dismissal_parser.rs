// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Free-text dismissal (early pickup) request parsing.
//!
//! Guardians write things like `استئذان سارة 12:30 موعد طبيب`. Parsing runs
//! on a letter-normalized copy of the message; the name and reason are cut
//! from the original text so they keep their spelling.

use crate::models::Student;
use regex::Regex;
use std::sync::OnceLock;

/// Intent keywords, already in normalized form (see [`normalize_char`]).
const KEYWORDS: &[&str] = &[
    "استيذان",
    "استاذان",
    "اذن خروج",
    "خروج مبكر",
    "انصراف",
    "خروج",
    "اذن",
];

/// Words guardians put in front of the child's name.
const NAME_FILLERS: &[&str] = &[
    "للطالب",
    "للطالبه",
    "الطالب",
    "الطالبه",
    "لابني",
    "لابنتي",
    "ابني",
    "ابنتي",
    "بنتي",
    "ولدي",
];

/// Clitics that may be attached in front of a keyword (`واستئذان`, `للانصراف`).
const KEYWORD_PREFIXES: &[&str] = &["", "و", "ف", "ب", "ل", "ال", "وال", "بال", "فال", "لل"];

/// Words guardians put between the child's name and the time.
const TIME_WORDS: &[&str] = &["الساعه", "ساعه", "الوقت", "وقت", "في", "عند"];

static TIME_RE: OnceLock<Regex> = OnceLock::new();

/// `H:MM` not embedded in a longer run of digits.
fn time_re() -> &'static Regex {
    TIME_RE.get_or_init(|| Regex::new(r"(?:^|\D)(\d{1,2})[:.,\-](\d{2})(?:\D|$)").unwrap())
}

/// A recognized dismissal request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DismissalIntent {
    /// Student name as written, if one could be extracted
    pub student_name: Option<String>,
    pub hour: u32,
    pub minute: u32,
    pub reason: Option<String>,
}

impl DismissalIntent {
    /// `HH:MM`
    pub fn time_text(&self) -> String {
        format!("{:02}:{:02}", self.hour, self.minute)
    }
}

/// Map Arabic letter variants and Arabic-Indic digits onto one form.
///
/// Always maps one char to one char, so char indices line up between the
/// original and the normalized text.
pub fn normalize_char(c: char) -> char {
    match c {
        'أ' | 'إ' | 'آ' | 'ٱ' => 'ا',
        'ى' | 'ئ' => 'ي',
        'ؤ' => 'و',
        'ة' => 'ه',
        '٠'..='٩' => char::from(b'0' + (c as u32 - '٠' as u32) as u8),
        '۰'..='۹' => char::from(b'0' + (c as u32 - '۰' as u32) as u8),
        _ => c.to_lowercase().next().unwrap_or(c),
    }
}

/// Normalize a whole string for comparisons (also collapses whitespace).
pub fn normalize_text(s: &str) -> String {
    s.split_whitespace()
        .map(|w| w.chars().map(normalize_char).collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a message as a dismissal request.
///
/// Returns `None` when no keyword is present or no valid `H:MM` time
/// follows anywhere in the message.
pub fn parse_dismissal(message: &str) -> Option<DismissalIntent> {
    let original: Vec<char> = message.chars().collect();
    let normalized: String = original.iter().copied().map(normalize_char).collect();

    let (kw_start, kw_end) = find_keyword(&normalized)?;

    let caps = time_re().captures(&normalized)?;
    let (hour_match, minute_match) = (caps.get(1)?, caps.get(2)?);
    let hour: u32 = hour_match.as_str().parse().ok()?;
    let minute: u32 = minute_match.as_str().parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    let time_start = char_index(&normalized, hour_match.start());
    let time_end = char_index(&normalized, minute_match.end());

    let between = if time_start > kw_end {
        clean_name(&slice(&original, kw_end, time_start))
    } else {
        None
    };
    let student_name = between.or_else(|| {
        let after: String = original[kw_end..]
            .iter()
            .take_while(|c| !normalize_char(**c).is_ascii_digit())
            .collect();
        clean_name(&after)
    });

    let reason = clean_fragment(&slice(&original, time_end, original.len()));

    tracing::debug!(
        keyword_at = kw_start,
        student_name = ?student_name,
        hour,
        minute,
        "Parsed dismissal request"
    );

    Some(DismissalIntent {
        student_name,
        hour,
        minute,
        reason,
    })
}

/// Earliest keyword occurrence standing as its own word, as `(start, end)`
/// char indices; the longest keyword wins at the same position.
fn find_keyword(normalized: &str) -> Option<(usize, usize)> {
    KEYWORDS
        .iter()
        .filter_map(|kw| {
            normalized
                .match_indices(kw)
                .map(|(b, _)| b)
                .find(|&b| is_whole_word(normalized, b, b + kw.len()))
                .map(|b| (b, kw))
        })
        .min_by(|(a_pos, a_kw), (b_pos, b_kw)| {
            a_pos.cmp(b_pos).then(b_kw.len().cmp(&a_kw.len()))
        })
        .map(|(b, kw)| {
            let start = char_index(normalized, b);
            (start, start + kw.chars().count())
        })
}

/// Whether `text[start..end]` is a word of its own, allowing a leading
/// clitic such as `و` or `ال`.
fn is_whole_word(text: &str, start: usize, end: usize) -> bool {
    let ends_word = text[end..].chars().next().map_or(true, |c| !c.is_alphabetic());
    let starts_word = KEYWORD_PREFIXES.iter().any(|prefix| {
        text[..start]
            .strip_suffix(prefix)
            .is_some_and(|rest| rest.chars().next_back().map_or(true, |c| !c.is_alphabetic()))
    });
    starts_word && ends_word
}

fn char_index(s: &str, byte_offset: usize) -> usize {
    s[..byte_offset].chars().count()
}

fn slice(chars: &[char], start: usize, end: usize) -> String {
    chars[start.min(end)..end].iter().collect()
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, ':' | '-' | ',' | '،' | '.' | '؛' | ';')
}

fn clean_fragment(s: &str) -> Option<String> {
    let trimmed = s.trim_matches(is_separator);
    let collapsed = trimmed.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}

/// Trim separators, drop leading filler words and trailing time words.
fn clean_name(s: &str) -> Option<String> {
    let fragment = clean_fragment(s)?;
    let words: Vec<&str> = fragment.split(' ').collect();
    let is_in = |list: &[&str], w: &str| list.contains(&normalize_text(w).as_str());

    let skip = words.iter().take_while(|w| is_in(NAME_FILLERS, w)).count();
    let trailing = words[skip..]
        .iter()
        .rev()
        .take_while(|w| is_in(TIME_WORDS, w))
        .count();
    let name = words[skip..words.len() - trailing].join(" ");
    (!name.is_empty()).then_some(name)
}

/// Outcome of resolving an extracted name against a guardian's students.
#[derive(Debug, PartialEq, Eq)]
pub enum StudentMatch<'a> {
    Found(&'a Student),
    NotFound,
    Ambiguous(Vec<&'a Student>),
}

/// Resolve an extracted name to one of the guardian's students.
///
/// Matching is case-insensitive substring containment on normalized names,
/// either way round. Several candidates are only resolved by an exact
/// match; otherwise the caller must ask which child was meant. Without a
/// name, a guardian with exactly one child resolves to that child.
pub fn match_student<'a>(name: Option<&str>, students: &'a [Student]) -> StudentMatch<'a> {
    let Some(name) = name.map(normalize_text).filter(|n| !n.is_empty()) else {
        return match students {
            [only] => StudentMatch::Found(only),
            [] => StudentMatch::NotFound,
            many => StudentMatch::Ambiguous(many.iter().collect()),
        };
    };

    let candidates: Vec<(&Student, String)> = students
        .iter()
        .map(|s| (s, normalize_text(&s.name)))
        .filter(|(_, full)| !full.is_empty() && (full.contains(&name) || name.contains(full.as_str())))
        .collect();

    match candidates.as_slice() {
        [] => StudentMatch::NotFound,
        [(only, _)] => StudentMatch::Found(*only),
        many => {
            let exact: Vec<&Student> = many
                .iter()
                .filter(|(_, full)| *full == name)
                .map(|(s, _)| *s)
                .collect();
            match exact.as_slice() {
                [one] => StudentMatch::Found(*one),
                _ => StudentMatch::Ambiguous(many.iter().map(|(s, _)| *s).collect()),
            }
        }
    }
}
