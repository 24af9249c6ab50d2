//! Turns terminal key presses into engine responses for interactive play.

use std::collections::BTreeSet;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::games::GameKind;
use crate::trial::Response;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    Quit,
    Respond(Response),
    /// The typed answer changed; redraw the prompt
    Edited,
    Ignored,
}

/// Per-game key bindings plus the line buffer for typed answers
#[derive(Debug, Clone)]
pub struct KeyMap {
    game: GameKind,
    buffer: String,
}

impl KeyMap {
    pub fn new(game: GameKind) -> Self {
        Self {
            game,
            buffer: String::new(),
        }
    }

    pub fn game(&self) -> GameKind {
        self.game
    }

    /// Games answered by typing a line and pressing Enter
    pub fn is_typed(&self) -> bool {
        matches!(
            self.game,
            GameKind::Stroop | GameKind::DigitSpan | GameKind::VisualSearch | GameKind::MemoryMatrix
        )
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Drop any half-typed answer, e.g. when the next trial starts
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// One-line reminder of the bindings for the current game
    pub fn help(&self) -> &'static str {
        match self.game {
            GameKind::NBack => "j / → match   f / ← no match",
            GameKind::FocusSwitch => "f / ← odd or low   j / → even or high",
            GameKind::ReactionTime => "space as soon as the signal shows",
            GameKind::Rsvp => "1-9 picks the word that was in the stream",
            GameKind::Stroop => "type the ink color, enter to submit",
            GameKind::DigitSpan => "type the digits, enter to submit",
            GameKind::VisualSearch | GameKind::MemoryMatrix => {
                "type cell numbers separated by spaces, enter to submit"
            }
        }
    }

    pub fn interpret(&mut self, key: KeyEvent) -> KeyAction {
        if key.code == KeyCode::Esc
            || (key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c'))
        {
            return KeyAction::Quit;
        }
        if self.is_typed() {
            return self.edit(key.code);
        }
        let response = match (self.game, key.code) {
            (GameKind::NBack, KeyCode::Char('j') | KeyCode::Right) => Response::Match(true),
            (GameKind::NBack, KeyCode::Char('f') | KeyCode::Left) => Response::Match(false),
            (GameKind::FocusSwitch, KeyCode::Char('f') | KeyCode::Left) => Response::Choice(0),
            (GameKind::FocusSwitch, KeyCode::Char('j') | KeyCode::Right) => Response::Choice(1),
            (GameKind::ReactionTime, KeyCode::Char(_) | KeyCode::Enter) => Response::Press,
            (GameKind::Rsvp, KeyCode::Char(c)) => match c.to_digit(10) {
                Some(d) if d > 0 => Response::Choice(d as usize - 1),
                _ => return KeyAction::Ignored,
            },
            _ => return KeyAction::Ignored,
        };
        KeyAction::Respond(response)
    }

    fn edit(&mut self, code: KeyCode) -> KeyAction {
        match code {
            KeyCode::Backspace => {
                if self.buffer.pop().is_some() {
                    KeyAction::Edited
                } else {
                    KeyAction::Ignored
                }
            }
            KeyCode::Enter => match self.parse() {
                Some(response) => {
                    self.buffer.clear();
                    KeyAction::Respond(response)
                }
                None => KeyAction::Ignored,
            },
            KeyCode::Char(c) if self.accepts(c) => {
                self.buffer.push(c);
                KeyAction::Edited
            }
            _ => KeyAction::Ignored,
        }
    }

    fn accepts(&self, c: char) -> bool {
        match self.game {
            GameKind::DigitSpan => c.is_ascii_digit(),
            GameKind::VisualSearch | GameKind::MemoryMatrix => {
                c.is_ascii_digit() || c == ' ' || c == ','
            }
            _ => !c.is_control(),
        }
    }

    fn parse(&self) -> Option<Response> {
        let text = self.buffer.trim();
        if text.is_empty() {
            return None;
        }
        match self.game {
            GameKind::DigitSpan => Some(Response::Sequence(
                text.bytes().map(|b| b - b'0').collect(),
            )),
            GameKind::VisualSearch | GameKind::MemoryMatrix => {
                // cells are shown numbered from 1
                let cells: BTreeSet<usize> = text
                    .split([' ', ','])
                    .filter_map(|part| part.parse::<usize>().ok())
                    .filter_map(|n| n.checked_sub(1))
                    .collect();
                Some(Response::Cells(cells))
            }
            _ => Some(Response::Text(text.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_line(map: &mut KeyMap, text: &str) -> KeyAction {
        for c in text.chars() {
            map.interpret(press(KeyCode::Char(c)));
        }
        map.interpret(press(KeyCode::Enter))
    }

    #[test]
    fn test_quit_keys() {
        let mut map = KeyMap::new(GameKind::Stroop);
        assert_eq!(map.interpret(press(KeyCode::Esc)), KeyAction::Quit);
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(map.interpret(ctrl_c), KeyAction::Quit);
        assert_eq!(map.buffer(), "");
    }

    #[test]
    fn test_single_key_games() {
        let mut nback = KeyMap::new(GameKind::NBack);
        assert_eq!(
            nback.interpret(press(KeyCode::Char('j'))),
            KeyAction::Respond(Response::Match(true))
        );
        assert_eq!(
            nback.interpret(press(KeyCode::Left)),
            KeyAction::Respond(Response::Match(false))
        );
        assert_eq!(nback.interpret(press(KeyCode::Char('x'))), KeyAction::Ignored);

        let mut switch = KeyMap::new(GameKind::FocusSwitch);
        assert_eq!(
            switch.interpret(press(KeyCode::Right)),
            KeyAction::Respond(Response::Choice(1))
        );

        let mut reaction = KeyMap::new(GameKind::ReactionTime);
        assert_eq!(
            reaction.interpret(press(KeyCode::Char(' '))),
            KeyAction::Respond(Response::Press)
        );
    }

    #[test]
    fn test_rsvp_choices_are_one_based() {
        let mut map = KeyMap::new(GameKind::Rsvp);
        assert_eq!(
            map.interpret(press(KeyCode::Char('3'))),
            KeyAction::Respond(Response::Choice(2))
        );
        assert_eq!(map.interpret(press(KeyCode::Char('0'))), KeyAction::Ignored);
    }

    #[test]
    fn test_typed_color() {
        let mut map = KeyMap::new(GameKind::Stroop);
        map.interpret(press(KeyCode::Char('a')));
        map.interpret(press(KeyCode::Char('x')));
        assert_eq!(map.interpret(press(KeyCode::Backspace)), KeyAction::Edited);
        assert_eq!(map.buffer(), "a");
        assert_eq!(
            type_line(&mut map, "zul"),
            KeyAction::Respond(Response::Text("azul".into()))
        );
        assert_eq!(map.buffer(), "");
    }

    #[test]
    fn test_empty_line_is_not_submitted() {
        let mut map = KeyMap::new(GameKind::DigitSpan);
        assert_eq!(map.interpret(press(KeyCode::Enter)), KeyAction::Ignored);
        assert_eq!(map.interpret(press(KeyCode::Backspace)), KeyAction::Ignored);
    }

    #[test]
    fn test_digit_span_ignores_letters() {
        let mut map = KeyMap::new(GameKind::DigitSpan);
        assert_eq!(map.interpret(press(KeyCode::Char('a'))), KeyAction::Ignored);
        assert_eq!(
            type_line(&mut map, "4071"),
            KeyAction::Respond(Response::Sequence(vec![4, 0, 7, 1]))
        );
    }

    #[test]
    fn test_cells_parse_from_one() {
        let mut map = KeyMap::new(GameKind::MemoryMatrix);
        assert_eq!(
            type_line(&mut map, "1, 5 16 0"),
            KeyAction::Respond(Response::Cells(BTreeSet::from([0, 4, 15])))
        );
    }
}
