//! Toolkit-neutral key input for the console control.

use bitflags::bitflags;

bitflags! {
    /// Modifier keys
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const CTRL  = 0b0010;
        const ALT   = 0b0100;
    }
}

/// Keys the console control understands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Backspace,
    Delete,
    Tab,
    Esc,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
}

/// A key press with its modifiers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConsoleKey {
    pub key: Key,
    pub mods: Modifiers,
}

impl ConsoleKey {
    pub fn new(key: Key, mods: Modifiers) -> Self {
        Self { key, mods }
    }

    pub fn plain(key: Key) -> Self {
        Self::new(key, Modifiers::empty())
    }

    /// Arrow keys, the only keys allowed while the caret is in history
    pub fn is_arrow(&self) -> bool {
        matches!(self.key, Key::Left | Key::Right | Key::Up | Key::Down)
    }

    /// Ctrl+C
    pub fn is_copy(&self) -> bool {
        self.mods.contains(Modifiers::CTRL) && matches!(self.key, Key::Char('c') | Key::Char('C'))
    }

    pub fn shift(&self) -> bool {
        self.mods.contains(Modifiers::SHIFT)
    }
}

impl From<Key> for ConsoleKey {
    fn from(key: Key) -> Self {
        Self::plain(key)
    }
}

/// What the control did with a key
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Not a console key; the embedding application may use it
    Ignored,
    /// Blocked to protect history or because the console is read-only
    Swallowed,
    /// Caret or selection moved
    Moved,
    /// Pending input changed
    Edited,
    /// A line was sent to the process
    Submitted(String),
    /// The selection should go to the clipboard
    Copy(String),
}
