use crate::vte_actions::ControlAction::{
    CarriageReturn, CursorDown, CursorUp, EraseInLine, LineFeed, Style, Text,
};
use vte::{Params, Parser, Perform};

/// What a terminal would do with the bytes the console emitted. Only the
/// subset the console produces is distinguished; colours collapse to `Style`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlAction {
    Text(String),
    LineFeed,
    CarriageReturn,
    CursorUp(u16),
    CursorDown(u16),
    EraseInLine(u16),
    Style,
}

impl ControlAction {
    pub fn is_movement(&self) -> bool {
        matches!(self, CursorUp(_) | CursorDown(_))
    }
}

/// A wrapper over [Parser] and [Perform] which takes bytes in and hands back
/// the semantic actions, with consecutive printable characters merged.
pub struct ControlActionParser {
    parser: Parser,
}

impl ControlActionParser {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
        }
    }

    pub fn parse_bytes(&mut self, bytes: &[u8]) -> Vec<ControlAction> {
        let mut performer = Performer::default();
        for byte in bytes {
            self.parser.advance(&mut performer, *byte)
        }
        performer.actions
    }
}

pub fn decode(bytes: &[u8]) -> Vec<ControlAction> {
    ControlActionParser::new().parse_bytes(bytes)
}

/// Only the relative cursor moves contained in `bytes`.
pub fn movements(bytes: &[u8]) -> Vec<ControlAction> {
    decode(bytes)
        .into_iter()
        .filter(ControlAction::is_movement)
        .collect()
}

#[derive(Default)]
struct Performer {
    actions: Vec<ControlAction>,
}

impl Perform for Performer {
    fn print(&mut self, c: char) {
        match self.actions.last_mut() {
            Some(Text(text)) => text.push(c),
            _ => self.actions.push(Text(c.to_string())),
        }
    }

    fn execute(&mut self, byte: u8) {
        let action = match byte {
            b'\n' => LineFeed,
            b'\r' => CarriageReturn,
            _ => return,
        };
        self.actions.push(action);
    }

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], _ignore: bool, c: char) {
        if intermediates.is_empty() {
            let action = match c {
                'A' => CursorUp(params.canonicalize_1(1)),
                'B' => CursorDown(params.canonicalize_1(1)),
                'K' => EraseInLine(params.first_or(0)),
                'm' => Style,
                _ => return,
            };
            self.actions.push(action);
        }
    }
}

trait ParamsCanonicalize {
    /// First parameter, with a missing or zero value meaning `default`.
    fn canonicalize_1(&self, default: u16) -> u16;
    /// First parameter, with only a missing value meaning `default`.
    fn first_or(&self, default: u16) -> u16;
}

impl ParamsCanonicalize for Params {
    fn canonicalize_1(&self, default: u16) -> u16 {
        Some(self.first_or(default))
            .filter(|x| *x != 0)
            .unwrap_or(default)
    }

    fn first_or(&self, default: u16) -> u16 {
        self.iter()
            .next()
            .and_then(|x| x.first().copied())
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod test {
    use crate::vte_actions::{decode, movements, ControlAction::*};

    #[test]
    fn merges_text_and_splits_controls() {
        assert_eq!(
            decode(b"ab\r\ncd\x1b[3A\x1b[2K"),
            vec![
                Text("ab".to_string()),
                CarriageReturn,
                LineFeed,
                Text("cd".to_string()),
                CursorUp(3),
                EraseInLine(2),
            ]
        );
    }

    #[test]
    fn keeps_only_movements() {
        assert_eq!(
            movements(b"\x1b[31mx\x1b[B\x1b[0m\x1b[12A"),
            vec![CursorDown(1), CursorUp(12)]
        );
    }
}
