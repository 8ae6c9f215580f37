//! Chart color themes.
//!
//! Themes are immutable and come from a small built-in catalog; callers pick
//! one by [`ThemeKey`] before rendering or exporting.

use std::str::FromStr;

use crate::foundation::error::{GitlapseError, GitlapseResult};

/// Straight-alpha RGBA8 color, serialized as `#RRGGBB` / `#RRGGBBAA` hex.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel (straight, not premultiplied).
    pub a: u8,
}

impl Color {
    /// Opaque color from RGB channels.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse `#RRGGBB` or `#RRGGBBAA` (leading `#` optional, case-insensitive).
    pub fn from_hex(s: &str) -> GitlapseResult<Self> {
        let s = s.trim();
        let s = s.strip_prefix('#').unwrap_or(s);

        fn hex_byte(pair: &str) -> GitlapseResult<u8> {
            u8::from_str_radix(pair, 16)
                .map_err(|_| GitlapseError::validation(format!("invalid hex byte \"{pair}\"")))
        }

        match s.len() {
            6 => Ok(Self {
                r: hex_byte(&s[0..2])?,
                g: hex_byte(&s[2..4])?,
                b: hex_byte(&s[4..6])?,
                a: 255,
            }),
            8 => Ok(Self {
                r: hex_byte(&s[0..2])?,
                g: hex_byte(&s[2..4])?,
                b: hex_byte(&s[4..6])?,
                a: hex_byte(&s[6..8])?,
            }),
            _ => Err(GitlapseError::validation(
                "hex color must be #RRGGBB or #RRGGBBAA (case-insensitive)",
            )),
        }
    }

    /// Channels as an `[r, g, b, a]` array (straight alpha).
    pub fn as_rgba8(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl serde::Serialize for Color {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        if self.a == 255 {
            serializer.serialize_str(&format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b))
        } else {
            serializer.serialize_str(&format!(
                "#{:02x}{:02x}{:02x}{:02x}",
                self.r, self.g, self.b, self.a
            ))
        }
    }
}

impl<'de> serde::Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Color::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A complete chart palette.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    /// Human-readable theme name.
    pub name: String,
    /// Surface background.
    pub background: Color,
    /// Primary text (header count line).
    pub text: Color,
    /// Secondary text (labels, legend, username).
    pub text_muted: Color,
    /// Border/keyline color.
    pub border: Color,
    /// Cell colors indexed by intensity level 0..=4.
    pub levels: [Color; 5],
}

/// Key into the built-in theme catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeKey {
    /// GitHub dark palette.
    Dark,
    /// GitHub light palette.
    Light,
    /// GitHub dimmed palette.
    Dimmed,
}

impl ThemeKey {
    /// All catalog keys, in display order.
    pub const ALL: [ThemeKey; 3] = [ThemeKey::Dark, ThemeKey::Light, ThemeKey::Dimmed];

    /// Resolve the key to its catalog theme.
    pub fn theme(self) -> Theme {
        match self {
            ThemeKey::Dark => Theme {
                name: "Dark GitHub".to_owned(),
                background: Color::rgb(0x0d, 0x11, 0x17),
                text: Color::rgb(0xc9, 0xd1, 0xd9),
                text_muted: Color::rgb(0x8b, 0x94, 0x9e),
                border: Color::rgb(0x30, 0x36, 0x3d),
                levels: [
                    Color::rgb(0x16, 0x1b, 0x22),
                    Color::rgb(0x0e, 0x44, 0x29),
                    Color::rgb(0x00, 0x6d, 0x32),
                    Color::rgb(0x26, 0xa6, 0x41),
                    Color::rgb(0x39, 0xd3, 0x53),
                ],
            },
            ThemeKey::Light => Theme {
                name: "Light GitHub".to_owned(),
                background: Color::rgb(0xff, 0xff, 0xff),
                text: Color::rgb(0x24, 0x29, 0x2f),
                text_muted: Color::rgb(0x57, 0x60, 0x6a),
                border: Color::rgb(0xd0, 0xd7, 0xde),
                levels: [
                    Color::rgb(0xeb, 0xed, 0xf0),
                    Color::rgb(0x9b, 0xe9, 0xa8),
                    Color::rgb(0x40, 0xc4, 0x63),
                    Color::rgb(0x30, 0xa1, 0x4e),
                    Color::rgb(0x21, 0x6e, 0x39),
                ],
            },
            ThemeKey::Dimmed => Theme {
                name: "Dimmed".to_owned(),
                background: Color::rgb(0x22, 0x27, 0x2e),
                text: Color::rgb(0xad, 0xba, 0xc7),
                text_muted: Color::rgb(0x76, 0x83, 0x90),
                border: Color::rgb(0x44, 0x4c, 0x56),
                levels: [
                    Color::rgb(0x2d, 0x33, 0x3b),
                    Color::rgb(0x26, 0x53, 0x2b),
                    Color::rgb(0x3b, 0x6f, 0x42),
                    Color::rgb(0x57, 0xab, 0x5a),
                    Color::rgb(0x6b, 0xc4, 0x6d),
                ],
            },
        }
    }
}

impl std::fmt::Display for ThemeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ThemeKey::Dark => "dark",
            ThemeKey::Light => "light",
            ThemeKey::Dimmed => "dimmed",
        };
        f.write_str(s)
    }
}

impl FromStr for ThemeKey {
    type Err = GitlapseError;

    fn from_str(s: &str) -> GitlapseResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "dark" => Ok(ThemeKey::Dark),
            "light" => Ok(ThemeKey::Light),
            "dimmed" => Ok(ThemeKey::Dimmed),
            other => Err(GitlapseError::validation(format!(
                "unknown theme \"{other}\" (expected dark, light, or dimmed)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_rgb_and_rgba() {
        assert_eq!(Color::from_hex("#ff0000").unwrap(), Color::rgb(255, 0, 0));
        let c = Color::from_hex("0000ff80").unwrap();
        assert_eq!(c.b, 255);
        assert_eq!(c.a, 0x80);
        assert!(Color::from_hex("#123").is_err());
        assert!(Color::from_hex("#zzzzzz").is_err());
    }

    #[test]
    fn color_serde_round_trips_as_hex() {
        let json = serde_json::to_string(&Color::rgb(0x0d, 0x11, 0x17)).unwrap();
        assert_eq!(json, "\"#0d1117\"");
        let back: Color = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Color::rgb(0x0d, 0x11, 0x17));
    }

    #[test]
    fn catalog_themes_have_distinct_level_ramps() {
        for key in ThemeKey::ALL {
            let theme = key.theme();
            for pair in theme.levels.windows(2) {
                assert_ne!(pair[0], pair[1], "{key}: adjacent levels must differ");
            }
        }
    }

    #[test]
    fn theme_key_round_trips_from_str() {
        for key in ThemeKey::ALL {
            assert_eq!(key.to_string().parse::<ThemeKey>().unwrap(), key);
        }
        assert!("solarized".parse::<ThemeKey>().is_err());
    }
}
