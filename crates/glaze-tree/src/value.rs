//! Property values exchanged across the host boundary.

use std::fmt;
use std::rc::Rc;

use crate::host::CompositionBrush;

/// ARGB color, one byte per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub a: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color { a: 0, r: 0, g: 0, b: 0 };

    pub const fn argb(a: u8, r: u8, g: u8, b: u8) -> Self {
        Color { a, r, g, b }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color { a: 0xFF, r, g, b }
    }

    /// Parses `#RRGGBB` or `#AARRGGBB` hex notation.
    pub fn parse_hex(s: &str) -> Option<Color> {
        let hex = s.strip_prefix('#')?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        match hex.len() {
            6 => {
                let v = u32::from_str_radix(hex, 16).ok()?;
                Some(Color::rgb((v >> 16) as u8, (v >> 8) as u8, v as u8))
            }
            8 => {
                let v = u32::from_str_radix(hex, 16).ok()?;
                Some(Color::argb(
                    (v >> 24) as u8,
                    (v >> 16) as u8,
                    (v >> 8) as u8,
                    v as u8,
                ))
            }
            _ => None,
        }
    }

    /// Parses hex notation or one of the common named colors.
    pub fn parse(s: &str) -> Option<Color> {
        if s.starts_with('#') {
            return Color::parse_hex(s);
        }
        let named = match s.to_ascii_lowercase().as_str() {
            "transparent" => Color::TRANSPARENT,
            "black" => Color::rgb(0x00, 0x00, 0x00),
            "white" => Color::rgb(0xFF, 0xFF, 0xFF),
            "red" => Color::rgb(0xFF, 0x00, 0x00),
            "green" => Color::rgb(0x00, 0x80, 0x00),
            "lime" => Color::rgb(0x00, 0xFF, 0x00),
            "blue" => Color::rgb(0x00, 0x00, 0xFF),
            "yellow" => Color::rgb(0xFF, 0xFF, 0x00),
            "orange" => Color::rgb(0xFF, 0xA5, 0x00),
            "gray" => Color::rgb(0x80, 0x80, 0x80),
            "silver" => Color::rgb(0xC0, 0xC0, 0xC0),
            "purple" => Color::rgb(0x80, 0x00, 0x80),
            _ => return None,
        };
        Some(named)
    }

    /// Returns the same color with the alpha channel replaced.
    pub fn with_alpha(self, a: u8) -> Color {
        Color { a, ..self }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}{:02X}", self.a, self.r, self.g, self.b)
    }
}

/// Per-edge length, e.g. for margins and padding.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Thickness {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Thickness {
    pub const fn uniform(v: f64) -> Self {
        Thickness { left: v, top: v, right: v, bottom: v }
    }

    /// Parses `"l,t,r,b"` or the uniform shorthand `"v"`.
    pub fn parse(s: &str) -> Option<Thickness> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .ok()?;
        match parts.as_slice() {
            [v] => Some(Thickness::uniform(*v)),
            [l, t, r, b] => Some(Thickness { left: *l, top: *t, right: *r, bottom: *b }),
            _ => None,
        }
    }
}

/// A typed property value.
///
/// `Unset` is the sentinel that erases a local value and lets the
/// element fall back to whatever the host's style system provides.
/// `Brush` carries a live composition resource; the host connects it
/// when the value lands on a rendered property and disconnects it when
/// the value is replaced or cleared.
#[derive(Clone)]
pub enum Value {
    Unset,
    Bool(bool),
    Double(f64),
    Str(String),
    Color(Color),
    Thickness(Thickness),
    /// Member of a host enum type, e.g. `Visibility=Collapsed`.
    Keyword(String),
    Brush(Rc<dyn CompositionBrush>),
}

impl Value {
    pub fn is_unset(&self) -> bool {
        matches!(self, Value::Unset)
    }

    /// Best-effort typed parse of a literal setter value.
    ///
    /// Keeps the same order the host toolkit uses: booleans, numbers,
    /// colors, thickness tuples, known keywords, and finally plain text.
    pub fn parse_literal(raw: &str) -> Value {
        let raw = raw.trim();
        match raw {
            "True" | "true" => return Value::Bool(true),
            "False" | "false" => return Value::Bool(false),
            _ => {}
        }
        if let Ok(d) = raw.parse::<f64>() {
            return Value::Double(d);
        }
        if let Some(c) = Color::parse(raw) {
            return Value::Color(c);
        }
        if raw.contains(',') {
            if let Some(t) = Thickness::parse(raw) {
                return Value::Thickness(t);
            }
        }
        if is_known_keyword(raw) {
            return Value::Keyword(raw.to_string());
        }
        Value::Str(raw.to_string())
    }
}

fn is_known_keyword(raw: &str) -> bool {
    matches!(
        raw,
        "Visible"
            | "Collapsed"
            | "Stretch"
            | "Center"
            | "Left"
            | "Right"
            | "Top"
            | "Bottom"
            | "Horizontal"
            | "Vertical"
            | "Normal"
            | "Bold"
            | "SemiBold"
            | "Italic"
    )
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Unset, Value::Unset) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Color(a), Value::Color(b)) => a == b,
            (Value::Thickness(a), Value::Thickness(b)) => a == b,
            (Value::Keyword(a), Value::Keyword(b)) => a == b,
            // Brushes are live resources; identity is the only sane equality.
            (Value::Brush(a), Value::Brush(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unset => write!(f, "Unset"),
            Value::Bool(v) => write!(f, "Bool({v})"),
            Value::Double(v) => write!(f, "Double({v})"),
            Value::Str(v) => write!(f, "Str({v:?})"),
            Value::Color(v) => write!(f, "Color({v})"),
            Value::Thickness(v) => write!(f, "Thickness({v:?})"),
            Value::Keyword(v) => write!(f, "Keyword({v})"),
            Value::Brush(_) => write!(f, "Brush(..)"),
        }
    }
}
