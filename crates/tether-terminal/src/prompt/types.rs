use serde::Serialize;

/// The shape of a detected prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromptKind {
    YesNoAlways,
    YesNo,
    NumberedList,
    SingleKey,
}

/// One answer the user can pick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptOption {
    pub label: String,
    /// Text to send to the PTY when this option is picked.
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shortcut: Option<char>,
}

impl PromptOption {
    pub(crate) fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            shortcut: None,
        }
    }

    pub(crate) fn with_shortcut(mut self, key: char) -> Self {
        self.shortcut = Some(key);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractivePrompt {
    #[serde(rename = "type")]
    pub kind: PromptKind,
    pub options: Vec<PromptOption>,
    /// The text the pattern matched; a prompt is only replaced when this changes.
    pub raw_text: String,
    /// Line holding the end of the match, `None` when it is still in the pending text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_id: Option<u64>,
}
