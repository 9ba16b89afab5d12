use crate::render::Artifact;
use crate::trigger::{GenerateError, GenerateRequest};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

pub const DEFAULT_SIZE: u32 = 200;
pub const MIN_SIZE: u32 = 32;
pub const MAX_SIZE: u32 = 4096;

/// Sizes offered by the interactive size selector, in pixels.
#[cfg(any(test, feature = "tui"))]
pub const SIZE_OPTIONS: [u32; 5] = [128, 200, 256, 300, 400];

/// 24-bit colour, written as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(0xff, 0xff, 0xff);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_rgba(self) -> image::Rgba<u8> {
        image::Rgba([self.r, self.g, self.b, 0xff])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid colour '{0}': expected #rrggbb or #rgb")]
pub struct ColorParseError(String);

impl FromStr for Rgb {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ColorParseError(s.to_string()));
        }
        let channel = |i: usize, len: usize| u8::from_str_radix(&hex[i..i + len], 16);
        let parsed = match hex.len() {
            6 => (channel(0, 2), channel(2, 2), channel(4, 2)),
            // #rgb expands each nibble: #f0a == #ff00aa
            3 => (
                channel(0, 1).map(|v| v * 17),
                channel(1, 1).map(|v| v * 17),
                channel(2, 1).map(|v| v * 17),
            ),
            _ => return Err(ColorParseError(s.to_string())),
        };
        match parsed {
            (Ok(r), Ok(g), Ok(b)) => Ok(Rgb::new(r, g, b)),
            _ => Err(ColorParseError(s.to_string())),
        }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl TryFrom<String> for Rgb {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_string()
    }
}

/// Appearance settings applied to a generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrSettings {
    pub size: u32,
    pub foreground: Rgb,
    pub background: Rgb,
}

impl Default for QrSettings {
    fn default() -> Self {
        Self {
            size: DEFAULT_SIZE,
            foreground: Rgb::BLACK,
            background: Rgb::WHITE,
        }
    }
}

/// One persisted history record.
///
/// Records written by older builds may lack the appearance fields; they load
/// with those fields unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub text: String,
    /// `data:image/png;base64,...` snapshot taken when the entry was created.
    pub image: String,
    #[serde(rename = "timestamp", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(
        rename = "color",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub foreground: Option<Rgb>,
    #[serde(
        rename = "bgColor",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub background: Option<Rgb>,
}

impl HistoryEntry {
    pub fn new(text: String, image: String, created_at: OffsetDateTime, settings: QrSettings) -> Self {
        Self {
            text,
            image,
            created_at,
            size: Some(settings.size),
            foreground: Some(settings.foreground),
            background: Some(settings.background),
        }
    }
}

/// Events emitted by the generation controller and consumed by UI/CLI layers.
#[derive(Debug, Clone)]
pub enum GenerateEvent {
    Started {
        id: u64,
        text: String,
    },
    /// A render is already running; this request waits for it and is dropped
    /// if a newer one arrives first.
    Queued {
        id: u64,
    },
    Completed {
        id: u64,
        request: GenerateRequest,
        // Box to keep GenerateEvent small; the bitmap dominates its size.
        artifact: Box<Artifact>,
    },
    Failed {
        id: u64,
        error: GenerateError,
    },
    Info(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn parses_long_and_short_hex() {
        assert_eq!("#1a2B3c".parse::<Rgb>().unwrap(), Rgb::new(0x1a, 0x2b, 0x3c));
        assert_eq!("f0a".parse::<Rgb>().unwrap(), Rgb::new(0xff, 0x00, 0xaa));
        assert_eq!(Rgb::new(0, 0x80, 0xff).to_string(), "#0080ff");
    }

    #[test]
    fn rejects_malformed_colours() {
        for bad in ["", "#12", "#12345", "#gg0000", "red", "#ffééff"] {
            assert!(bad.parse::<Rgb>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn entry_uses_camel_case_keys() {
        let entry = HistoryEntry::new(
            "https://example.com".into(),
            "data:image/png;base64,AAAA".into(),
            datetime!(2024-01-15 14:30:45 UTC),
            QrSettings::default(),
        );
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["text"], "https://example.com");
        assert_eq!(json["timestamp"], "2024-01-15T14:30:45Z");
        assert_eq!(json["size"], 200);
        assert_eq!(json["color"], "#000000");
        assert_eq!(json["bgColor"], "#ffffff");
    }

    #[test]
    fn minimal_record_loads_without_settings() {
        let raw = r#"{"text":"hello","image":"data:image/png;base64,AAAA","timestamp":"2024-01-15T14:30:45.123Z"}"#;
        let entry: HistoryEntry = serde_json::from_str(raw).unwrap();
        assert_eq!(entry.text, "hello");
        assert_eq!(entry.size, None);
        assert_eq!(entry.foreground, None);
        assert_eq!(entry.background, None);
    }
}
