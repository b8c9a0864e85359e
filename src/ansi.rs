//! One-shot decoder for ANSI escape sequences in log lines.
//!
//! Turns a raw line into styled segments for rendering, or strips all
//! sequences for search filtering. Log content is untrusted: malformed
//! sequences fall back to literal text and never abort the decode.

const ESC: char = '\u{1b}';

/// One of the 16 base terminal colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnsiColor {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    BrightBlack,
    BrightRed,
    BrightGreen,
    BrightYellow,
    BrightBlue,
    BrightMagenta,
    BrightCyan,
    BrightWhite,
}

impl AnsiColor {
    fn base(idx: u16) -> Option<Self> {
        match idx {
            0 => Some(Self::Black),
            1 => Some(Self::Red),
            2 => Some(Self::Green),
            3 => Some(Self::Yellow),
            4 => Some(Self::Blue),
            5 => Some(Self::Magenta),
            6 => Some(Self::Cyan),
            7 => Some(Self::White),
            _ => None,
        }
    }

    fn bright(idx: u16) -> Option<Self> {
        match idx {
            0 => Some(Self::BrightBlack),
            1 => Some(Self::BrightRed),
            2 => Some(Self::BrightGreen),
            3 => Some(Self::BrightYellow),
            4 => Some(Self::BrightBlue),
            5 => Some(Self::BrightMagenta),
            6 => Some(Self::BrightCyan),
            7 => Some(Self::BrightWhite),
            _ => None,
        }
    }
}

/// Running graphics state. `fg`/`bg` of `None` mean the default color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StyleState {
    pub fg: Option<AnsiColor>,
    pub bg: Option<AnsiColor>,
    pub bold: bool,
    pub dim: bool,
    pub italic: bool,
    pub underline: bool,
    pub inverse: bool,
}

impl StyleState {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Apply a single SGR parameter. Unknown parameters are ignored.
    fn apply(&mut self, param: u16) {
        match param {
            0 => *self = Self::default(),
            1 => self.bold = true,
            2 => self.dim = true,
            3 => self.italic = true,
            4 => self.underline = true,
            7 => self.inverse = true,
            22 => {
                self.bold = false;
                self.dim = false;
            }
            23 => self.italic = false,
            24 => self.underline = false,
            27 => self.inverse = false,
            30..=37 => self.fg = AnsiColor::base(param - 30),
            39 => self.fg = None,
            40..=47 => self.bg = AnsiColor::base(param - 40),
            49 => self.bg = None,
            90..=97 => self.fg = AnsiColor::bright(param - 90),
            100..=107 => self.bg = AnsiColor::bright(param - 100),
            _ => {}
        }
    }
}

/// A contiguous run of text sharing one style state. Segments partition
/// the input line; concatenating their text reproduces the stripped line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnsiSegment {
    pub text: String,
    pub styles: StyleState,
}

/// Decode a raw line into styled segments.
///
/// A line with no control sequences yields exactly one segment with the
/// default style. Non-graphics CSI commands (cursor movement, clear) are
/// stripped; malformed sequences are kept as literal text.
pub fn decode(line: &str) -> Vec<AnsiSegment> {
    let chars: Vec<char> = line.chars().collect();
    let mut segments = Vec::new();
    let mut style = StyleState::default();
    let mut text = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c != ESC || chars.get(i + 1) != Some(&'[') {
            text.push(c);
            i += 1;
            continue;
        }

        // CSI sequence: digits separated by ';', one command letter.
        let mut j = i + 2;
        let mut params: Vec<u16> = Vec::new();
        let mut current: Option<u16> = None;
        let mut terminator: Option<char> = None;
        while j < chars.len() {
            let p = chars[j];
            if let Some(d) = p.to_digit(10) {
                current = Some(
                    current
                        .unwrap_or(0)
                        .saturating_mul(10)
                        .saturating_add(d as u16),
                );
                j += 1;
            } else if p == ';' {
                params.push(current.take().unwrap_or(0));
                j += 1;
            } else if p.is_ascii_alphabetic() {
                terminator = Some(p);
                break;
            } else {
                break;
            }
        }
        if let Some(v) = current.take() {
            params.push(v);
        }

        match terminator {
            // Set-graphics with at least one parameter.
            Some('m') if !params.is_empty() => {
                let mut next = style;
                for p in &params {
                    next.apply(*p);
                }
                if next != style {
                    if !text.is_empty() {
                        segments.push(AnsiSegment {
                            text: std::mem::take(&mut text),
                            styles: style,
                        });
                    }
                    style = next;
                }
                i = j + 1;
            }
            // Empty parameter list: malformed, keep literal.
            Some('m') => {
                text.push(c);
                i += 1;
            }
            // Recognized non-graphics command: strip, no visible effect.
            Some(_) => {
                i = j + 1;
            }
            // Missing terminator: literal from the introducer onward.
            None => {
                text.push(c);
                i += 1;
            }
        }
    }

    if !text.is_empty() || segments.is_empty() {
        segments.push(AnsiSegment {
            text,
            styles: style,
        });
    }
    segments
}

/// Strip all escape sequences. Defined as decode-concat so search results
/// always line up with what `decode` renders.
pub fn strip(line: &str) -> String {
    decode(line).into_iter().map(|s| s.text).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn red() -> StyleState {
        StyleState {
            fg: Some(AnsiColor::Red),
            ..StyleState::default()
        }
    }

    #[test]
    fn test_plain_line_single_segment() {
        let segments = decode("hello world");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "hello world");
        assert!(segments[0].styles.is_default());
    }

    #[test]
    fn test_empty_line_single_segment() {
        let segments = decode("");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "");
    }

    #[test]
    fn test_red_error_two_segments() {
        let segments = decode("\x1b[31mERROR\x1b[0m ok");
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "ERROR");
        assert_eq!(segments[0].styles, red());
        assert_eq!(segments[1].text, " ok");
        assert!(segments[1].styles.is_default());
    }

    #[test]
    fn test_attributes_accumulate_and_clear() {
        let segments = decode("\x1b[1;4;31mbold\x1b[22;24mstill red\x1b[39m plain");
        assert_eq!(segments.len(), 3);
        assert!(segments[0].styles.bold && segments[0].styles.underline);
        assert_eq!(segments[0].styles.fg, Some(AnsiColor::Red));
        assert!(!segments[1].styles.bold && !segments[1].styles.underline);
        assert_eq!(segments[1].styles.fg, Some(AnsiColor::Red));
        assert!(segments[2].styles.is_default());
    }

    #[test]
    fn test_bright_and_background_colors() {
        let segments = decode("\x1b[97;100mx");
        assert_eq!(segments[0].styles.fg, Some(AnsiColor::BrightWhite));
        assert_eq!(segments[0].styles.bg, Some(AnsiColor::BrightBlack));
    }

    #[test]
    fn test_unknown_parameters_ignored() {
        let segments = decode("\x1b[38;5;208mtext");
        // 38 and 208 are unknown to the 16-color model, 5 is unknown too.
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "text");
        assert!(segments[0].styles.is_default());
    }

    #[test]
    fn test_cursor_and_clear_sequences_stripped() {
        assert_eq!(strip("\x1b[2Ja\x1b[1Ab\x1b[Hc"), "abc");
    }

    #[test]
    fn test_no_style_change_no_extra_segment() {
        // Same color set twice: a no-op, so no segment boundary.
        let segments = decode("\x1b[31mab\x1b[31mcd");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "abcd");
    }

    #[test]
    fn test_truncated_sequence_is_literal() {
        let segments = decode("tail\x1b[31");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "tail\x1b[31");
    }

    #[test]
    fn test_empty_sgr_is_literal() {
        let stripped = strip("a\x1b[mb");
        assert_eq!(stripped, "a\x1b[mb");
    }

    #[test]
    fn test_bare_escape_is_literal() {
        assert_eq!(strip("a\x1bb"), "a\x1bb");
    }

    #[test]
    fn test_strip_matches_decode_concat() {
        let inputs = [
            "plain",
            "\x1b[31mERROR\x1b[0m ok",
            "\x1b[1;32mgreen bold\x1b[0m and \x1b[44mblue bg\x1b[49m",
            "\x1b[2Jgarbage\x1b[31",
            "",
        ];
        for input in inputs {
            let concat: String = decode(input).into_iter().map(|s| s.text).collect();
            assert_eq!(concat, strip(input));
        }
    }

    #[test]
    fn test_transition_count() {
        // Three effective transitions -> four segments.
        let line = "a\x1b[31mb\x1b[32mc\x1b[0md";
        assert_eq!(decode(line).len(), 4);
    }

    #[test]
    fn test_arbitrary_bytes_never_panic() {
        let nasty = [
            "\x1b[",
            "\x1b[;",
            "\x1b[;;;",
            "\x1b[999999999999999m",
            "\x1b[31;m",
            "\x1b]0;title\x07",
            "\u{1b}\u{1b}\u{1b}",
            "日本語\x1b[31m色\x1b[0m",
        ];
        for input in nasty {
            let _ = decode(input);
            let _ = strip(input);
        }
    }

    #[test]
    fn test_inverse_flag() {
        let segments = decode("\x1b[7minv\x1b[27mout");
        assert!(segments[0].styles.inverse);
        assert!(!segments[1].styles.inverse);
    }
}
