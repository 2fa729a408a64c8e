//! `vte::Perform` implementation that accumulates styled spans per line.

use tracing::trace;
use vte::{Params, Perform};

use super::types::{SpanStyle, StyledSpan};

/// Receives parser callbacks and builds lines.
///
/// Only printable text, tabs, line feeds and SGR sequences affect output.
/// Cursor movement, erase, cursor visibility, save/restore and every other
/// CSI/ESC/OSC/DCS sequence is dropped, as are carriage returns.
#[derive(Debug, Default)]
pub(crate) struct LineBuilder {
    pub(crate) style: SpanStyle,
    pub(crate) spans: Vec<StyledSpan>,
    pub(crate) completed: Vec<Vec<StyledSpan>>,
}

impl LineBuilder {
    fn push_char(&mut self, c: char) {
        match self.spans.last_mut() {
            Some(last) if last.style == self.style => last.text.push(c),
            _ => self.spans.push(StyledSpan {
                text: c.to_string(),
                style: self.style,
            }),
        }
    }

    fn end_line(&mut self) {
        let spans = std::mem::take(&mut self.spans);
        self.completed.push(spans);
    }
}

impl Perform for LineBuilder {
    fn print(&mut self, c: char) {
        self.push_char(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            0x0A => self.end_line(),
            0x09 => self.push_char('\t'),
            0x0D => {}
            _ => trace!("dropped control byte: 0x{byte:02X}"),
        }
    }

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], _ignore: bool, action: char) {
        if action == 'm' && intermediates.is_empty() {
            self.style.apply_sgr(params);
        }
    }
}
