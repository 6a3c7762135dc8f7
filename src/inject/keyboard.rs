//! Keystroke simulation backed by the `enigo` crate.
//!
//! | Action          | macOS      | Windows / Linux |
//! |-----------------|------------|-----------------|
//! | paste           | ⌘V         | Ctrl+V          |
//! | focus extension | ⌘Escape    | Ctrl+Escape     |
//! | focus cli       | Ctrl+`     | Ctrl+`          |
//! | submit          | Return     | Return          |

use enigo::{Direction, Enigo, Key, Keyboard, Settings};

use super::resolver::Strategy;
use super::InjectError;

#[cfg(target_os = "macos")]
const COMMAND: Key = Key::Meta;
#[cfg(not(target_os = "macos"))]
const COMMAND: Key = Key::Control;

/// A modifier chord or a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortcut {
    pub modifier: Option<Key>,
    pub key: Key,
}

impl Shortcut {
    pub const PASTE: Shortcut = Shortcut {
        modifier: Some(COMMAND),
        key: Key::Unicode('v'),
    };

    pub const SUBMIT: Shortcut = Shortcut {
        modifier: None,
        key: Key::Return,
    };

    /// Shortcut that moves keyboard focus to the assistant's input inside the
    /// target application.  Terminals need none.
    pub fn focus_for(strategy: Strategy) -> Option<Shortcut> {
        match strategy {
            Strategy::Extension => Some(Shortcut {
                modifier: Some(COMMAND),
                key: Key::Escape,
            }),
            Strategy::Cli => Some(Shortcut {
                modifier: Some(Key::Control),
                key: Key::Unicode('`'),
            }),
            Strategy::Terminal => None,
        }
    }
}

/// Sends shortcuts to the focused window.  Not `Send`; create one per
/// injection on the thread that uses it.
pub struct KeySender {
    enigo: Enigo,
}

impl KeySender {
    pub fn new() -> Result<Self, InjectError> {
        let enigo = Enigo::new(&Settings::default()).map_err(|e| InjectError::KeySimulation(e.to_string()))?;
        Ok(Self { enigo })
    }

    pub fn send(&mut self, shortcut: Shortcut) -> Result<(), InjectError> {
        if let Some(modifier) = shortcut.modifier {
            self.key(modifier, Direction::Press)?;
            let clicked = self.key(shortcut.key, Direction::Click);
            // Release even when the click failed so the modifier is not stuck.
            self.key(modifier, Direction::Release)?;
            clicked
        } else {
            self.key(shortcut.key, Direction::Click)
        }
    }

    fn key(&mut self, key: Key, direction: Direction) -> Result<(), InjectError> {
        self.enigo
            .key(key, direction)
            .map_err(|e| InjectError::KeySimulation(e.to_string()))
    }
}
