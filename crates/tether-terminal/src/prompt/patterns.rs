//! Compiled regular expressions, in priority order.

use regex::Regex;
use std::sync::LazyLock;

/// `(y/n/a)`, `[y/n/a]` at the end of the text.
pub(super) static YES_NO_ALWAYS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[\(\[]\s*y\s*/\s*n\s*/\s*a\s*[\)\]]\s*[:?]?\s*$").unwrap()
});

/// `(y)es ... (n)o ... (a)lways` anywhere in the text.
pub(super) static YES_NO_ALWAYS_PHRASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\(y\)es.*\(n\)o.*\(a\)lways").unwrap());

/// `[y/n]`, `[yes/no]`, `(y/n)` or `yes/no?` at the end of the text.
pub(super) static YES_NO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\[\s*y\s*/\s*n\s*\]|\[\s*yes\s*/\s*no\s*\]|\(\s*y\s*/\s*n\s*\)|yes/no\?)\s*[:?]?\s*$")
        .unwrap()
});

/// `1. label` or `1) label`, optionally behind a selection marker.
pub(super) static NUMBERED_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[>❯›▶]\s*)?([1-9])[.)]\s+(.+?)\s*$").unwrap());

/// `[k] label`
pub(super) static BRACKET_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([A-Za-z0-9])\]\s*([A-Za-z][\w-]*)").unwrap());

/// `(k)label`
pub(super) static PAREN_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([A-Za-z])\)([A-Za-z][\w-]*)").unwrap());
