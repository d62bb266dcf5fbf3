//! Classified gesture records and their key-style host representation

use evdev::Key;
use std::fmt;

/// The gestures the classifier can recognise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GestureKind {
    /// Button press and release, confirmed once the double-click window expires
    Click,
    /// A press-and-hold that ended without the pen touching the surface
    LongClick,
    /// Button held past the click window
    HoldStart,
    /// End of a press-and-hold
    HoldStop,
    /// Pen tip left the surface
    Lift,
}

impl GestureKind {
    /// Key the gesture is delivered as
    pub fn key(&self) -> Key {
        match self {
            GestureKind::Click => Key::KEY_C,
            GestureKind::LongClick => Key::KEY_L,
            GestureKind::HoldStart => Key::KEY_N,
            GestureKind::HoldStop => Key::KEY_X,
            GestureKind::Lift => Key::KEY_P,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            GestureKind::Click => "click",
            GestureKind::LongClick => "long click",
            GestureKind::HoldStart => "hold start",
            GestureKind::HoldStop => "hold stop",
            GestureKind::Lift => "lift",
        }
    }
}

/// A classified gesture.
///
/// `repeat_count` is the number of clicks in the sequence for button
/// gestures, and the number of pressure segments for [`GestureKind::Lift`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GestureEvent {
    pub kind: GestureKind,
    pub repeat_count: u32,
}

impl GestureEvent {
    pub fn new(kind: GestureKind, repeat_count: u32) -> Self {
        Self { kind, repeat_count }
    }

    pub fn to_key_stroke(&self) -> KeyStroke {
        KeyStroke {
            key: self.kind.key(),
            modifier: Modifier::Control,
            repeat: self.repeat_count,
        }
    }
}

impl fmt::Display for GestureEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind.name(), self.repeat_count)
    }
}

/// Modifier held while a gesture key is injected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Control,
}

impl Modifier {
    pub fn key(&self) -> Key {
        match self {
            Modifier::Control => Key::KEY_LEFTCTRL,
        }
    }
}

/// Key-style event handed to the host input system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyStroke {
    pub key: Key,
    pub modifier: Modifier,
    pub repeat: u32,
}
