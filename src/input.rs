use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tracing::trace;

use crate::engine::TypingEngine;

/// What a key press asks the engine to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    TypeCharacter(char),
    /// Space
    Advance,
    Backspace,
    /// Alt+Backspace, Ctrl+Backspace or Ctrl+W
    DeleteWord,
}

impl Command {
    /// Maps a key to a typing command. Keys that are not typing input map to
    /// `None` and are left to the caller.
    pub fn from_key(key: &KeyEvent) -> Option<Self> {
        if key.kind == KeyEventKind::Release {
            return None;
        }
        let word_modifier = key
            .modifiers
            .intersects(KeyModifiers::ALT | KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Backspace if word_modifier => Some(Command::DeleteWord),
            KeyCode::Backspace => Some(Command::Backspace),
            KeyCode::Char('w') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Command::DeleteWord)
            }
            KeyCode::Char(_) if word_modifier => None,
            KeyCode::Char(' ') => Some(Command::Advance),
            KeyCode::Char(c) => Some(Command::TypeCharacter(c)),
            _ => None,
        }
    }

    pub fn execute(self, engine: &mut TypingEngine) {
        match self {
            Command::TypeCharacter(c) => engine.type_character(c),
            Command::Advance => engine.advance_word(),
            Command::Backspace => {
                engine.backspace();
            }
            Command::DeleteWord => {
                engine.delete_word();
            }
        }
    }
}

/// Gate in front of the engine; disabled while a modal screen is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSystem {
    enabled: bool,
}

impl Default for InputSystem {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl InputSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Runs the command for `key`, if any. Returns what was executed.
    pub fn handle_key(&self, key: &KeyEvent, engine: &mut TypingEngine) -> Option<Command> {
        if !self.enabled {
            return None;
        }
        let command = Command::from_key(key)?;
        trace!(?command, "input");
        command.execute(engine);
        Some(command)
    }
}
