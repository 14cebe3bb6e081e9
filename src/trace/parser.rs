//! Hop report line parser.
//!
//! Lines starting with an integer hop index followed by a space (or nothing)
//! are hop reports in the mtr split format:
//!
//! ```text
//! <hop> <host> <address> <loss> <rcvd> <sent> <best> <avg> <worst>
//! <-hop>              hide hop, keep its data
//! <hop> ???           hop explicitly unknown
//! ```
//!
//! Anything else that is not blank is plain diagnostic text. Malformed numeric
//! fields never fail a line; they are shown as-is.

use crate::config::LossScale;
use crate::state::HopData;

/// Host token the backend uses for a hop that did not answer
pub const UNKNOWN_HOP_TOKEN: &str = "???";

/// What a single line means
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedEvent {
    /// Negative index: mark the hop stale
    HopDirective { index: usize, hidden: bool },
    HopUnknown { index: usize },
    HopData(HopData),
    PlainText(String),
}

/// Parser for one session's hop report stream
#[derive(Debug, Clone, Copy, Default)]
pub struct HopParser {
    loss_scale: LossScale,
}

impl HopParser {
    pub fn new(loss_scale: LossScale) -> Self {
        Self { loss_scale }
    }

    /// Classify a line. Blank lines yield `None`.
    pub fn parse(&self, line: &str) -> Option<ParsedEvent> {
        let Some(index) = hop_index(line) else {
            if line.trim().is_empty() {
                return None;
            }
            return Some(ParsedEvent::PlainText(line.to_string()));
        };

        if index < 0 {
            return Some(ParsedEvent::HopDirective {
                index: index.unsigned_abs() as usize,
                hidden: true,
            });
        }
        let index = index as usize;

        let mut fields = line.split_whitespace().skip(1);
        let host = match fields.next() {
            None | Some(UNKNOWN_HOP_TOKEN) => return Some(ParsedEvent::HopUnknown { index }),
            Some(host) => host.to_string(),
        };
        let mut next = || fields.next().unwrap_or_default().to_string();
        let address = next();
        let loss = self.loss_scale.format(&next());
        Some(ParsedEvent::HopData(HopData {
            index,
            host,
            address,
            loss,
            received: next(),
            sent: next(),
            best: next(),
            avg: next(),
            worst: next(),
        }))
    }
}

/// Parse a line with the default loss scale
pub fn parse_line(line: &str) -> Option<ParsedEvent> {
    HopParser::default().parse(line)
}

/// Leading `-?\d+` terminated by a space or end of line
fn hop_index(line: &str) -> Option<i64> {
    let token = match line.split_once(' ') {
        Some((token, _)) => token,
        None => line,
    };
    let digits = token.strip_prefix('-').unwrap_or(token);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hop(line: &str) -> HopData {
        match parse_line(line) {
            Some(ParsedEvent::HopData(data)) => data,
            other => panic!("expected hop data for {:?}, got {:?}", line, other),
        }
    }

    #[test]
    fn test_data_line_fields() {
        let data = hop("3 core1.example.net 192.0.2.33 50000 5 10 1.2 3.4 9.9");
        assert_eq!(data.index, 3);
        assert_eq!(data.host, "core1.example.net");
        assert_eq!(data.address, "192.0.2.33");
        assert_eq!(data.loss, "50%");
        assert_eq!(data.received, "5");
        assert_eq!(data.sent, "10");
        assert_eq!(data.best, "1.2");
        assert_eq!(data.avg, "3.4");
        assert_eq!(data.worst, "9.9");
    }

    #[test]
    fn test_tenths_scale() {
        let parser = HopParser::new(LossScale::Tenths);
        match parser.parse("1 a 10.0.0.1 12345 1 1 1 1 1") {
            Some(ParsedEvent::HopData(data)) => assert_eq!(data.loss, "12.3%"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_negative_index_is_directive() {
        assert_eq!(
            parse_line("-3"),
            Some(ParsedEvent::HopDirective { index: 3, hidden: true })
        );
        assert_eq!(
            parse_line("-12 trailing"),
            Some(ParsedEvent::HopDirective { index: 12, hidden: true })
        );
    }

    #[test]
    fn test_unknown_hop() {
        assert_eq!(parse_line("4 ???"), Some(ParsedEvent::HopUnknown { index: 4 }));
        assert_eq!(parse_line("4 ??? "), Some(ParsedEvent::HopUnknown { index: 4 }));
        assert_eq!(parse_line("7"), Some(ParsedEvent::HopUnknown { index: 7 }));
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(
            parse_line("HOST: probe Loss% Snt"),
            Some(ParsedEvent::PlainText("HOST: probe Loss% Snt".into()))
        );
        assert_eq!(
            parse_line("ERROR: mtr exited with code 1"),
            Some(ParsedEvent::PlainText("ERROR: mtr exited with code 1".into()))
        );
        // Index must be followed by a space
        assert!(matches!(parse_line("3.5 ms"), Some(ParsedEvent::PlainText(_))));
        assert!(matches!(parse_line("12abc x"), Some(ParsedEvent::PlainText(_))));
        assert!(matches!(parse_line("- 3"), Some(ParsedEvent::PlainText(_))));
        assert!(matches!(parse_line(" 3 leading"), Some(ParsedEvent::PlainText(_))));
    }

    #[test]
    fn test_blank_lines_ignored() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("   "), None);
    }

    #[test]
    fn test_malformed_fields_pass_through() {
        let data = hop("2 gw 10.0.0.1 lossy 5 x");
        assert_eq!(data.loss, "lossy");
        assert_eq!(data.sent, "x");
        assert_eq!(data.best, "");
        assert_eq!(data.worst, "");
    }

    #[test]
    fn test_overflowing_index_is_text() {
        let line = "99999999999999999999999 x";
        assert_eq!(parse_line(line), Some(ParsedEvent::PlainText(line.into())));
    }
}
