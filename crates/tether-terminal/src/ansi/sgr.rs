//! SGR (Select Graphic Rendition) parsing helper.

use tracing::trace;
use vte::Params;

use super::types::{SpanColor, SpanStyle};

impl SpanStyle {
    /// Apply SGR parameters to this style.
    pub(crate) fn apply_sgr(&mut self, params: &Params) {
        let groups: Vec<&[u16]> = params.iter().collect();

        // No params at all is SGR 0.
        if groups.is_empty() {
            *self = SpanStyle::default();
            return;
        }

        let mut i = 0;
        while i < groups.len() {
            let sub = groups[i];
            let code = sub[0];
            match code {
                0 => *self = SpanStyle::default(),
                1 => self.bold = true,
                2 => self.dim = true,
                3 => self.italic = true,
                4 => self.underline = true,
                22 => {
                    self.bold = false;
                    self.dim = false;
                }
                23 => self.italic = false,
                24 => self.underline = false,
                30..=37 => self.fg = Some(SpanColor::indexed((code - 30) as u8)),
                38 | 48 => {
                    let color = if sub.len() > 1 {
                        // Colon form: 38:5:n / 38:2:r:g:b in a single group.
                        i += 1;
                        extended_color(&sub[1..])
                    } else {
                        let flat: Vec<u16> = groups[i + 1..].iter().map(|g| g[0]).collect();
                        let (color, used) = extended_color_flat(&flat);
                        i += 1 + used;
                        color
                    };
                    if let Some(color) = color {
                        if code == 38 {
                            self.fg = Some(color);
                        } else {
                            self.bg = Some(color);
                        }
                    }
                    continue;
                }
                39 => self.fg = None,
                40..=47 => self.bg = Some(SpanColor::indexed((code - 40) as u8)),
                49 => self.bg = None,
                90..=97 => self.fg = Some(SpanColor::indexed((code - 90 + 8) as u8)),
                100..=107 => self.bg = Some(SpanColor::indexed((code - 100 + 8) as u8)),
                _ => trace!("unhandled SGR code: {code}"),
            }
            i += 1;
        }
    }
}

/// Parse `5;n` or `2;r;g;b` from subparameters of one colon-separated group.
fn extended_color(sub: &[u16]) -> Option<SpanColor> {
    match sub {
        [5, idx, ..] => Some(SpanColor::indexed(*idx as u8)),
        // Some emitters include an empty color-space id: 38:2::r:g:b
        [2, _, r, g, b, ..] => Some(SpanColor::rgb(*r as u8, *g as u8, *b as u8)),
        [2, r, g, b] => Some(SpanColor::rgb(*r as u8, *g as u8, *b as u8)),
        _ => None,
    }
}

/// Parse `5;n` or `2;r;g;b` from the semicolon-separated params that follow
/// a 38/48. Returns the color and how many params were consumed.
fn extended_color_flat(rest: &[u16]) -> (Option<SpanColor>, usize) {
    match rest {
        [5, idx, ..] => (Some(SpanColor::indexed(*idx as u8)), 2),
        [2, r, g, b, ..] => (Some(SpanColor::rgb(*r as u8, *g as u8, *b as u8)), 4),
        [5] | [2, ..] => (None, rest.len()),
        [] => (None, 0),
        _ => (None, 1),
    }
}
