//! Shell prompt recognition used to flip a session back to idle.

use regex::Regex;
use std::sync::LazyLock;

/// CSI, OSC and two-byte escape sequences.
static ANSI_ESCAPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-Z\\-_]").unwrap()
});

/// Prompt endings, checked in order against the last non-empty line.
static SHELL_PROMPT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^PS [A-Za-z]:\\.*>\s*$",
        r"\$\s*$",
        r">\s*$",
        r"%\s*$",
        r"❯\s*$",
        r"➜\s*$",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

pub fn strip_ansi(text: &str) -> String {
    ANSI_ESCAPE_RE.replace_all(text, "").into_owned()
}

/// Whether `chunk` ends with something that looks like a shell prompt.
pub fn looks_like_shell_prompt(chunk: &str) -> bool {
    let plain = strip_ansi(chunk);
    let Some(last) = plain
        .split(['\n', '\r'])
        .rev()
        .find(|line| !line.trim().is_empty())
    else {
        return false;
    };
    SHELL_PROMPT_PATTERNS.iter().any(|re| re.is_match(last))
}
