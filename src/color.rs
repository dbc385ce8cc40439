//! CSS color parsing and RGB distance.

use std::str::FromStr;

use palette::Srgb;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorParseError {
    #[error("empty color value")]
    Empty,
    #[error("invalid hex color '{0}'")]
    InvalidHex(String),
    #[error("invalid rgb() color '{0}'")]
    InvalidFunction(String),
    #[error("unsupported color '{0}'")]
    Unsupported(String),
}

/// An sRGB color with alpha in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CssColor {
    pub rgb: Srgb<u8>,
    pub alpha: f32,
}

impl CssColor {
    pub fn opaque(red: u8, green: u8, blue: u8) -> Self {
        Self {
            rgb: Srgb::new(red, green, blue),
            alpha: 1.0,
        }
    }

    pub fn is_transparent(&self) -> bool {
        self.alpha <= f32::EPSILON
    }

    pub fn to_hex(&self) -> String {
        format!(
            "#{:02X}{:02X}{:02X}",
            self.rgb.red, self.rgb.green, self.rgb.blue
        )
    }
}

impl FromStr for CssColor {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_color(s)
    }
}

/// Parse `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`, `rgb()`/`rgba()` (comma or
/// space separated), `transparent`, or a CSS named color.
pub fn parse_color(input: &str) -> Result<CssColor, ColorParseError> {
    let value = input.trim();
    if value.is_empty() {
        return Err(ColorParseError::Empty);
    }
    let lower = value.to_ascii_lowercase();

    if let Some(hex) = lower.strip_prefix('#') {
        return parse_hex(hex).ok_or_else(|| ColorParseError::InvalidHex(value.to_string()));
    }
    if lower.starts_with("rgb") {
        return parse_rgb_function(&lower)
            .ok_or_else(|| ColorParseError::InvalidFunction(value.to_string()));
    }
    if lower == "transparent" {
        return Ok(CssColor {
            rgb: Srgb::new(0, 0, 0),
            alpha: 0.0,
        });
    }
    palette::named::from_str(&lower)
        .map(|rgb| CssColor { rgb, alpha: 1.0 })
        .ok_or_else(|| ColorParseError::Unsupported(value.to_string()))
}

fn parse_hex(hex: &str) -> Option<CssColor> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let (rgb_part, alpha_part) = match hex.len() {
        3 | 6 => (hex, None),
        4 => (&hex[..3], Some(hex[3..].repeat(2))),
        8 => (&hex[..6], Some(hex[6..].to_string())),
        _ => return None,
    };
    let rgb = Srgb::<u8>::from_str(rgb_part).ok()?;
    let alpha = match alpha_part {
        Some(a) => u8::from_str_radix(&a, 16).ok()? as f32 / 255.0,
        None => 1.0,
    };
    Some(CssColor { rgb, alpha })
}

fn parse_rgb_function(value: &str) -> Option<CssColor> {
    let open = value.find('(')?;
    let name = value[..open].trim();
    if name != "rgb" && name != "rgba" {
        return None;
    }
    let inner = value[open + 1..].strip_suffix(')')?;

    let (channels, slash_alpha) = match inner.split_once('/') {
        Some((c, a)) => (c, Some(a.trim())),
        None => (inner, None),
    };
    let parts: Vec<&str> = channels
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .collect();

    let (rgb_parts, alpha_str) = match (parts.len(), slash_alpha) {
        (3, alpha) => (&parts[..], alpha),
        (4, None) => (&parts[..3], Some(parts[3])),
        _ => return None,
    };

    let red = parse_channel(rgb_parts[0])?;
    let green = parse_channel(rgb_parts[1])?;
    let blue = parse_channel(rgb_parts[2])?;
    let alpha = match alpha_str {
        Some(a) => parse_alpha(a)?,
        None => 1.0,
    };
    Some(CssColor {
        rgb: Srgb::new(red, green, blue),
        alpha,
    })
}

fn parse_channel(raw: &str) -> Option<u8> {
    let v = match raw.strip_suffix('%') {
        Some(pct) => pct.trim().parse::<f32>().ok()? * 2.55,
        None => raw.trim().parse::<f32>().ok()?,
    };
    if !v.is_finite() {
        return None;
    }
    Some(v.round().clamp(0.0, 255.0) as u8)
}

fn parse_alpha(raw: &str) -> Option<f32> {
    let v = match raw.strip_suffix('%') {
        Some(pct) => pct.trim().parse::<f32>().ok()? / 100.0,
        None => raw.trim().parse::<f32>().ok()?,
    };
    v.is_finite().then(|| v.clamp(0.0, 1.0))
}

/// Euclidean distance in 0-255 RGB space; `0.0..=441.67`.
pub fn rgb_distance(a: &CssColor, b: &CssColor) -> f64 {
    let dr = a.rgb.red as f64 - b.rgb.red as f64;
    let dg = a.rgb.green as f64 - b.rgb.green as f64;
    let db = a.rgb.blue as f64 - b.rgb.blue as f64;
    (dr * dr + dg * dg + db * db).sqrt()
}

/// `max(0, 1 - distance / 255)`.
pub fn color_similarity(a: &CssColor, b: &CssColor) -> f64 {
    (1.0 - rgb_distance(a, b) / 255.0).max(0.0)
}
