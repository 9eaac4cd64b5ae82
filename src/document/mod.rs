//! The editable rendering of the label under review.
//!
//! Edits stay inside the surface. Nothing is pushed back to session state per
//! keystroke; callers pull a [`DocumentSnapshot`] when they need the content
//! (export, save, validate again).

pub mod markup;
pub mod selector;
pub mod surface;

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

pub use markup::{MarkupTree, NodeId};
pub use selector::Selector;
pub use surface::{Caret, MarkupSurface};

/// Point-in-time serialization of the surface content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSnapshot {
    content: String,
    revision: u64,
}

impl DocumentSnapshot {
    pub fn new(content: String, revision: u64) -> Self {
        Self { content, revision }
    }

    pub fn as_str(&self) -> &str {
        &self.content
    }

    pub fn into_string(self) -> String {
        self.content
    }

    /// Edit revision of the surface when the snapshot was taken.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

/// Keyboard chord delivered to the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyChord {
    pub key: char,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
}

impl KeyChord {
    pub fn ctrl(key: char) -> Self {
        Self {
            key,
            ctrl: true,
            meta: false,
            shift: false,
        }
    }

    pub fn meta(key: char) -> Self {
        Self {
            key,
            ctrl: false,
            meta: true,
            shift: false,
        }
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditShortcut {
    Undo,
    Redo,
}

impl EditShortcut {
    pub fn from_chord(chord: KeyChord) -> Option<Self> {
        if !(chord.ctrl || chord.meta) {
            return None;
        }
        match (chord.key.to_ascii_lowercase(), chord.shift) {
            ('z', false) => Some(EditShortcut::Undo),
            ('z', true) | ('y', false) => Some(EditShortcut::Redo),
            _ => None,
        }
    }
}

/// Capability the review engine needs from an editable document view.
pub trait DocumentSurface: Send {
    /// Replace the whole content. Malformed markup degrades the rendering but
    /// never fails.
    fn load(&mut self, markup: &str);

    /// Current live content. Does not reset or reload anything.
    fn capture_snapshot(&self) -> DocumentSnapshot;

    /// Mark every node matching `selector` with `class`. Returns the number of
    /// nodes marked; zero is a normal outcome.
    fn highlight(&mut self, selector: &str, class: &str) -> usize;

    fn clear_highlights(&mut self);

    /// Step back through the surface's own edit history.
    fn undo(&mut self) -> bool;

    fn redo(&mut self) -> bool;

    /// Route undo/redo shortcuts to the surface history. Returns whether the
    /// chord was consumed.
    fn handle_shortcut(&mut self, chord: KeyChord) -> bool {
        match EditShortcut::from_chord(chord) {
            Some(EditShortcut::Undo) => self.undo(),
            Some(EditShortcut::Redo) => self.redo(),
            None => false,
        }
    }
}

/// A surface shared between the session (edits, snapshots) and the highlight
/// coordinator (markers).
pub type SharedSurface<S> = Arc<Mutex<S>>;

pub fn shared<S: DocumentSurface>(surface: S) -> SharedSurface<S> {
    Arc::new(Mutex::new(surface))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortcut_mapping() {
        assert_eq!(
            EditShortcut::from_chord(KeyChord::ctrl('z')),
            Some(EditShortcut::Undo)
        );
        assert_eq!(
            EditShortcut::from_chord(KeyChord::meta('Z').with_shift()),
            Some(EditShortcut::Redo)
        );
        assert_eq!(
            EditShortcut::from_chord(KeyChord::ctrl('y')),
            Some(EditShortcut::Redo)
        );
        assert_eq!(EditShortcut::from_chord(KeyChord::ctrl('s')), None);

        let plain = KeyChord {
            key: 'z',
            ctrl: false,
            meta: false,
            shift: false,
        };
        assert_eq!(EditShortcut::from_chord(plain), None);
    }
}
