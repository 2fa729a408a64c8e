//! The detector: ordered pattern checks over a window of recent text.

use std::collections::BTreeMap;

use crate::ansi::OutputLine;

use super::patterns::{
    BRACKET_KEY_RE, NUMBERED_ITEM_RE, PAREN_KEY_RE, YES_NO_ALWAYS_PHRASE_RE, YES_NO_ALWAYS_RE,
    YES_NO_RE,
};
use super::types::{InteractivePrompt, PromptKind, PromptOption};
use super::PROMPT_LOOKBACK;

const MAX_OPTIONS: usize = 10;
const MAX_LABEL_CHARS: usize = 50;

/// One line of the detection window.
struct Entry<'a> {
    line_id: Option<u64>,
    text: &'a str,
}

/// Detect an interactive prompt in the last [`PROMPT_LOOKBACK`] completed
/// lines plus the pending partial line.
pub fn detect_prompt(lines: &[OutputLine], pending: &str) -> Option<InteractivePrompt> {
    let start = lines.len().saturating_sub(PROMPT_LOOKBACK);
    let texts: Vec<String> = lines[start..].iter().map(OutputLine::text).collect();
    let mut window: Vec<Entry<'_>> = lines[start..]
        .iter()
        .zip(&texts)
        .map(|(line, text)| Entry {
            line_id: Some(line.id),
            text,
        })
        .collect();
    push_pending(&mut window, pending);
    detect_in_window(&window)
}

/// Same as [`detect_prompt`] for plain-text lines without ids.
pub fn detect_prompt_in(lines: &[&str], pending: &str) -> Option<InteractivePrompt> {
    let start = lines.len().saturating_sub(PROMPT_LOOKBACK);
    let mut window: Vec<Entry<'_>> = lines[start..]
        .iter()
        .map(|text| Entry {
            line_id: None,
            text,
        })
        .collect();
    push_pending(&mut window, pending);
    detect_in_window(&window)
}

fn push_pending<'a>(window: &mut Vec<Entry<'a>>, pending: &'a str) {
    if !pending.is_empty() {
        window.push(Entry {
            line_id: None,
            text: pending,
        });
    }
}

fn detect_in_window(window: &[Entry<'_>]) -> Option<InteractivePrompt> {
    let tail = window.iter().rev().find(|e| !e.text.trim().is_empty())?;

    yes_no_always(tail, window)
        .or_else(|| yes_no(tail))
        .or_else(|| numbered_list(window))
        .or_else(|| single_key(tail, window))
}

fn yes_no_always(tail: &Entry<'_>, window: &[Entry<'_>]) -> Option<InteractivePrompt> {
    let (raw, line_id) = if YES_NO_ALWAYS_RE.is_match(tail.text) {
        (tail.text.trim().to_string(), tail.line_id)
    } else {
        let hit = window
            .iter()
            .rev()
            .find(|e| YES_NO_ALWAYS_PHRASE_RE.is_match(e.text))?;
        (hit.text.trim().to_string(), hit.line_id)
    };

    Some(InteractivePrompt {
        kind: PromptKind::YesNoAlways,
        options: vec![
            PromptOption::new("Yes", "y").with_shortcut('y'),
            PromptOption::new("No", "n").with_shortcut('n'),
            PromptOption::new("Always", "a").with_shortcut('a'),
        ],
        raw_text: raw,
        line_id,
    })
}

fn yes_no(tail: &Entry<'_>) -> Option<InteractivePrompt> {
    let m = YES_NO_RE.find(tail.text)?;
    // Prompts spelling out yes/no usually refuse a bare "y".
    let (yes, no) = if m.as_str().to_ascii_lowercase().contains("yes") {
        ("yes", "no")
    } else {
        ("y", "n")
    };

    Some(InteractivePrompt {
        kind: PromptKind::YesNo,
        options: vec![
            PromptOption::new("Yes", yes).with_shortcut('y'),
            PromptOption::new("No", no).with_shortcut('n'),
        ],
        raw_text: tail.text.trim().to_string(),
        line_id: tail.line_id,
    })
}

fn numbered_list(window: &[Entry<'_>]) -> Option<InteractivePrompt> {
    // number -> (label, position in window); later occurrences overwrite.
    let mut items: BTreeMap<u8, (String, usize)> = BTreeMap::new();

    for (pos, entry) in window.iter().enumerate() {
        let Some(caps) = NUMBERED_ITEM_RE.captures(entry.text) else {
            continue;
        };
        let label = caps[2].trim();
        if label.chars().count() <= 1 {
            continue;
        }
        let number = caps[1].parse::<u8>().ok()?;
        items.insert(number, (label.to_string(), pos));
    }

    if !(items.contains_key(&1) && items.contains_key(&2)) {
        return None;
    }

    let last_pos = items.values().map(|(_, pos)| *pos).max()?;
    let raw_text = items
        .values()
        .map(|(_, pos)| window[*pos].text.trim())
        .collect::<Vec<_>>()
        .join("\n");
    let options = items
        .into_iter()
        .take(MAX_OPTIONS)
        .map(|(number, (label, _))| {
            PromptOption::new(truncate_chars(&label, MAX_LABEL_CHARS), number.to_string())
        })
        .collect();

    Some(InteractivePrompt {
        kind: PromptKind::NumberedList,
        options,
        raw_text,
        line_id: window[last_pos].line_id,
    })
}

fn single_key(tail: &Entry<'_>, window: &[Entry<'_>]) -> Option<InteractivePrompt> {
    let text = window
        .iter()
        .map(|e| e.text)
        .collect::<Vec<_>>()
        .join("\n");

    let bracketed: Vec<(char, String, String)> = BRACKET_KEY_RE
        .captures_iter(&text)
        .filter_map(|caps| {
            let key = caps[1].chars().next()?;
            Some((key, caps[2].to_string(), caps[0].to_string()))
        })
        .collect();

    let matches = if bracketed.len() >= 2 {
        bracketed
    } else {
        let parenthesized: Vec<(char, String, String)> = PAREN_KEY_RE
            .captures_iter(&text)
            .filter_map(|caps| {
                let key = caps[1].chars().next()?;
                Some((key, format!("{key}{}", &caps[2]), caps[0].to_string()))
            })
            .collect();
        if parenthesized.len() < 2 {
            return None;
        }
        parenthesized
    };

    let raw_text = matches
        .iter()
        .map(|(_, _, raw)| raw.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let options = matches
        .into_iter()
        .take(MAX_OPTIONS)
        .map(|(key, label, _)| {
            PromptOption::new(truncate_chars(&label, MAX_LABEL_CHARS), key.to_string())
                .with_shortcut(key)
        })
        .collect();

    Some(InteractivePrompt {
        kind: PromptKind::SingleKey,
        options,
        raw_text,
        line_id: tail.line_id,
    })
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
