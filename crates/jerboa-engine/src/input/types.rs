use std::fmt;

/// Keyboard key identifier.
///
/// The window backend maps platform key codes into these variants. Keys
/// without a variant are reported as `Key::Unknown(code)` with the platform
/// code when one exists.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Key {
    Escape,
    Enter,
    Tab,
    Backspace,
    Space,

    Insert,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,

    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,

    LeftShift,
    RightShift,
    LeftControl,
    RightControl,
    LeftAlt,
    RightAlt,
    LeftSuper,
    RightSuper,

    A, B, C, D, E, F, G, H, I, J, K, L, M,
    N, O, P, Q, R, S, T, U, V, W, X, Y, Z,

    Digit0, Digit1, Digit2, Digit3, Digit4,
    Digit5, Digit6, Digit7, Digit8, Digit9,

    F1, F2, F3, F4, F5, F6,
    F7, F8, F9, F10, F11, F12,

    Unknown(u32),
}

impl Key {
    /// Human-readable name used in trace logs.
    pub fn name(self) -> String {
        match self {
            Key::Digit0 => "0".into(),
            Key::Digit1 => "1".into(),
            Key::Digit2 => "2".into(),
            Key::Digit3 => "3".into(),
            Key::Digit4 => "4".into(),
            Key::Digit5 => "5".into(),
            Key::Digit6 => "6".into(),
            Key::Digit7 => "7".into(),
            Key::Digit8 => "8".into(),
            Key::Digit9 => "9".into(),
            Key::Unknown(code) => format!("unknown({code})"),
            other => format!("{other:?}"),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Mouse button identifier.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Back,
    Forward,
    Other(u16),
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Modifier keys held when a key or button event fired.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub fn any(&self) -> bool {
        self.shift || self.ctrl || self.alt || self.meta
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (self.shift, "shift"),
            (self.ctrl, "ctrl"),
            (self.alt, "alt"),
            (self.meta, "meta"),
        ];
        let mut first = true;
        for (held, name) in names {
            if !held {
                continue;
            }
            if !first {
                f.write_str("+")?;
            }
            f.write_str(name)?;
            first = false;
        }
        if first {
            f.write_str("none")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digit_keys_have_short_names() {
        assert_eq!(Key::Digit1.name(), "1");
        assert_eq!(Key::W.to_string(), "W");
        assert_eq!(Key::Unknown(42).to_string(), "unknown(42)");
    }

    #[test]
    fn modifiers_display_joins_held_keys() {
        assert_eq!(Modifiers::NONE.to_string(), "none");
        let m = Modifiers { shift: true, alt: true, ..Modifiers::NONE };
        assert_eq!(m.to_string(), "shift+alt");
        assert!(m.any());
    }
}
