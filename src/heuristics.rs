//! Shape-based classifiers over scraped strings.
//!
//! The dashboard markup does not tell a serial number apart from a slot label
//! by tag or class, only by what the text looks like. Everything in here works
//! on plain strings so it can be tested without a document.

use crate::model::{SubSlotState, AVAILABLE, EMPTY};
use regex::Regex;
use std::sync::LazyLock;

/// Class names that carry a slot state, highest priority first.
pub const STATUS_CLASSES: [&str; 6] = ["testing", "failing", "aborted", "failed", "passed", "default"];

static SLOT_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^slot-(\d+)").unwrap());

/// Number following `slot-`; trailing characters are tolerated.
pub fn slot_number(id: &str) -> Option<&str> {
    SLOT_ID.captures(id).and_then(|c| c.get(1)).map(|m| m.as_str())
}

pub fn is_slot_id(id: &str) -> bool {
    SLOT_ID.is_match(id)
}

/// `slot-3` -> `SLOT03`. Empty when the id carries no number.
pub fn synthesized_name(id: &str) -> String {
    match slot_number(id) {
        Some(n) => format!("SLOT{:0>2}", n),
        None => String::new(),
    }
}

/// Accepts a primary serial number candidate.
///
/// Long enough (>= 7 chars, or >= 6 with a digit) and not a `SLOT...` label.
pub fn is_serial_number(candidate: &str) -> bool {
    if candidate.starts_with("SLOT") {
        return false;
    }
    let len = candidate.chars().count();
    len >= 7 || (len >= 6 && candidate.chars().any(|c| c.is_ascii_digit()))
}

/// Sub-component labels are compound (`X_Y`) or `SLOT`-prefixed.
pub fn is_sub_slot_label(name: &str) -> bool {
    name.contains('_') || name.starts_with("SLOT")
}

/// Grey link text (`#AAA` / `rgb(170,170,170)`) marks an idle sub-slot.
pub fn sub_slot_state(style: &str) -> SubSlotState {
    let compact: String = style
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if compact.contains("#aaa") || compact.contains("rgb(170,170,170)") {
        SubSlotState::Inactive
    } else {
        SubSlotState::Active
    }
}

pub fn is_active_status(status: &str) -> bool {
    !matches!(status, AVAILABLE | EMPTY | "")
}

/// First class from [`STATUS_CLASSES`] present on the container.
pub fn status_from_classes<'a, I>(classes: I) -> Option<&'static str>
where
    I: IntoIterator<Item = &'a str>,
{
    let present: Vec<&str> = classes.into_iter().collect();
    STATUS_CLASSES.iter().copied().find(|s| present.contains(s))
}

/// Inline status text, normalised. `None` when blank.
pub fn status_from_text(text: &str) -> Option<String> {
    let t = text.trim().to_lowercase();
    if t.is_empty() { None } else { Some(t) }
}

/// Later resolvers override earlier ones; unresolved falls back to `available`.
pub fn resolve_status<I>(resolvers: I) -> String
where
    I: IntoIterator<Item = Option<String>>,
{
    resolvers
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .last()
        .unwrap_or_else(|| AVAILABLE.to_string())
}

/// Leading integer of a counter badge; 0 if none.
pub fn counter_value(text: &str) -> u32 {
    let t = text.trim();
    let digits: String = t.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}
