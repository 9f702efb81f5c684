//! Key mapping for terminal input
//!
//! Converts crossterm key events into application actions or console keys.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::console::{ConsoleKey, Key, Modifiers};

impl From<KeyModifiers> for Modifiers {
    fn from(mods: KeyModifiers) -> Self {
        let mut result = Modifiers::empty();
        if mods.contains(KeyModifiers::SHIFT) {
            result |= Modifiers::SHIFT;
        }
        if mods.contains(KeyModifiers::CONTROL) {
            result |= Modifiers::CTRL;
        }
        if mods.contains(KeyModifiers::ALT) {
            result |= Modifiers::ALT;
        }
        result
    }
}

/// Application-level commands bound to keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAction {
    StartShell,
    NewProcess,
    StopProcess,
    ClearOutput,
    ScrollUp,
    ScrollDown,
    Quit,
}

/// Result of mapping one key event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    App(AppAction),
    Console(ConsoleKey),
    Unmapped,
}

/// Key mapper for converting key events to console input
pub struct KeyMapper;

impl KeyMapper {
    /// Map a crossterm KeyEvent
    pub fn map(event: &KeyEvent) -> KeyInput {
        if let Some(action) = Self::map_action(event) {
            return KeyInput::App(action);
        }
        match Self::map_console(event) {
            Some(key) => KeyInput::Console(key),
            None => KeyInput::Unmapped,
        }
    }

    fn map_action(event: &KeyEvent) -> Option<AppAction> {
        let mods = Modifiers::from(event.modifiers);
        match event.code {
            KeyCode::F(2) => Some(AppAction::StartShell),
            KeyCode::F(3) => Some(AppAction::NewProcess),
            KeyCode::F(4) => Some(AppAction::StopProcess),
            KeyCode::F(5) => Some(AppAction::ClearOutput),
            KeyCode::F(10) => Some(AppAction::Quit),
            KeyCode::PageUp => Some(AppAction::ScrollUp),
            KeyCode::PageDown => Some(AppAction::ScrollDown),
            KeyCode::Char('q') | KeyCode::Char('Q') if mods == Modifiers::CTRL => {
                Some(AppAction::Quit)
            }
            _ => None,
        }
    }

    /// Map a crossterm KeyEvent to a console key
    pub fn map_console(event: &KeyEvent) -> Option<ConsoleKey> {
        let mut mods = Modifiers::from(event.modifiers);
        let key = match event.code {
            KeyCode::Char(ch) => {
                // Shift is already folded into the character
                mods.remove(Modifiers::SHIFT);
                Key::Char(ch)
            }
            KeyCode::Enter => Key::Enter,
            KeyCode::Backspace => Key::Backspace,
            KeyCode::Delete => Key::Delete,
            KeyCode::Tab => Key::Tab,
            KeyCode::Esc => Key::Esc,
            KeyCode::Left => Key::Left,
            KeyCode::Right => Key::Right,
            KeyCode::Up => Key::Up,
            KeyCode::Down => Key::Down,
            KeyCode::Home => Key::Home,
            KeyCode::End => Key::End,
            _ => return None,
        };
        Some(ConsoleKey::new(key, mods))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventKind, KeyEventState};

    fn key_event(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::empty(),
        }
    }

    #[test]
    fn test_function_keys_are_actions() {
        let event = key_event(KeyCode::F(2), KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), KeyInput::App(AppAction::StartShell));

        let event = key_event(KeyCode::F(10), KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), KeyInput::App(AppAction::Quit));

        let event = key_event(KeyCode::F(7), KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), KeyInput::Unmapped);
    }

    #[test]
    fn test_ctrl_q_quits() {
        let event = key_event(KeyCode::Char('q'), KeyModifiers::CONTROL);
        assert_eq!(KeyMapper::map(&event), KeyInput::App(AppAction::Quit));

        let event = key_event(KeyCode::Char('q'), KeyModifiers::NONE);
        assert_eq!(
            KeyMapper::map(&event),
            KeyInput::Console(ConsoleKey::plain(Key::Char('q')))
        );
    }

    #[test]
    fn test_shifted_char_drops_shift() {
        let event = key_event(KeyCode::Char('A'), KeyModifiers::SHIFT);
        assert_eq!(
            KeyMapper::map_console(&event),
            Some(ConsoleKey::plain(Key::Char('A')))
        );
    }

    #[test]
    fn test_shift_arrow_keeps_shift() {
        let event = key_event(KeyCode::Left, KeyModifiers::SHIFT);
        let key = KeyMapper::map_console(&event).unwrap();
        assert!(key.shift());
        assert!(key.is_arrow());
    }

    #[test]
    fn test_ctrl_c_is_copy() {
        let event = key_event(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(KeyMapper::map_console(&event).unwrap().is_copy());
    }
}
