// ── LED color and brightness ──
//
// The hub stores color as a hue (full saturation) plus a 0-100 LED
// brightness that carries the color's value. These helpers translate between that and
// the RGB / 0-255 forms callers usually hold.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An RGB triple.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// HSV hue in whole degrees, `0..360`. Greys map to 0.
    pub fn hue(self) -> u16 {
        let r = f64::from(self.r) / 255.0;
        let g = f64::from(self.g) / 255.0;
        let b = f64::from(self.b) / 255.0;
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;

        if delta <= f64::EPSILON {
            return 0;
        }

        #[allow(clippy::float_cmp)]
        let degrees = if max == r {
            60.0 * ((g - b) / delta).rem_euclid(6.0)
        } else if max == g {
            60.0 * ((b - r) / delta + 2.0)
        } else {
            60.0 * ((r - g) / delta + 4.0)
        };

        whole_degrees(degrees)
    }

    /// HSV value as a 0-100 percentage.
    pub fn value_percent(self) -> u8 {
        let max = self.r.max(self.g).max(self.b);
        scale(f64::from(max) / 255.0 * 100.0)
    }

    /// The fully saturated, full-value color at `hue` degrees.
    pub fn from_hue(hue: f64) -> Self {
        let h = if hue.is_finite() { hue.rem_euclid(360.0) } else { 0.0 };
        let x = 1.0 - ((h / 60.0).rem_euclid(2.0) - 1.0).abs();
        let (r, g, b) = match h {
            h if h < 60.0 => (1.0, x, 0.0),
            h if h < 120.0 => (x, 1.0, 0.0),
            h if h < 180.0 => (0.0, 1.0, x),
            h if h < 240.0 => (0.0, x, 1.0),
            h if h < 300.0 => (x, 0.0, 1.0),
            _ => (1.0, 0.0, x),
        };
        Self {
            r: unit_to_u8(r),
            g: unit_to_u8(g),
            b: unit_to_u8(b),
        }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Error parsing an `RRGGBB` color.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid color '{0}': expected RRGGBB hex")]
pub struct ParseRgbError(String);

impl FromStr for Rgb {
    type Err = ParseRgbError;

    /// Accepts `RRGGBB` with an optional leading `#`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(ParseRgbError(s.to_owned()));
        }
        let channel = |range: std::ops::Range<usize>| {
            hex.get(range)
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| ParseRgbError(s.to_owned()))
        };
        Ok(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }
}

// ── Brightness scales ──

/// `native = round(external / 255 * 100)`.
pub fn brightness_to_native(external: u8) -> u8 {
    scale(f64::from(external) / 255.0 * 100.0)
}

/// `external = round(native / 100 * 255)`. Inputs above 100 are clamped.
pub fn brightness_to_external(native: u8) -> u8 {
    scale(f64::from(native.min(100)) / 100.0 * 255.0)
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::as_conversions
)]
fn scale(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

fn unit_to_u8(v: f64) -> u8 {
    scale(v * 255.0)
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::as_conversions
)]
fn whole_degrees(v: f64) -> u16 {
    let rounded = v.round().clamp(0.0, 360.0) as u16;
    rounded % 360
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn primary_hues() {
        assert_eq!(Rgb::new(255, 0, 0).hue(), 0);
        assert_eq!(Rgb::new(0, 255, 0).hue(), 120);
        assert_eq!(Rgb::new(0, 0, 255).hue(), 240);
        assert_eq!(Rgb::new(255, 255, 0).hue(), 60);
        assert_eq!(Rgb::new(255, 0, 255).hue(), 300);
    }

    #[test]
    fn grey_has_zero_hue() {
        assert_eq!(Rgb::new(128, 128, 128).hue(), 0);
        assert_eq!(Rgb::new(0, 0, 0).hue(), 0);
    }

    #[test]
    fn near_red_wraps_to_zero() {
        // Hue just below 360 rounds to 360, which wraps.
        assert_eq!(Rgb::new(255, 0, 1).hue(), 0);
    }

    #[test]
    fn from_hue_is_fully_saturated() {
        assert_eq!(Rgb::from_hue(0.0), Rgb::new(255, 0, 0));
        assert_eq!(Rgb::from_hue(120.0), Rgb::new(0, 255, 0));
        assert_eq!(Rgb::from_hue(240.0), Rgb::new(0, 0, 255));
        assert_eq!(Rgb::from_hue(360.0), Rgb::new(255, 0, 0));
        assert_eq!(Rgb::from_hue(-120.0), Rgb::new(0, 0, 255));
    }

    #[test]
    fn hue_round_trips_through_from_hue() {
        for hue in [0_u16, 30, 90, 180, 210, 330] {
            assert_eq!(Rgb::from_hue(f64::from(hue)).hue(), hue);
        }
    }

    #[test]
    fn parses_hex() {
        assert_eq!("ff8000".parse::<Rgb>().unwrap(), Rgb::new(255, 128, 0));
        assert_eq!("#00FF00".parse::<Rgb>().unwrap(), Rgb::new(0, 255, 0));
        assert!("fff".parse::<Rgb>().is_err());
        assert!("gg0000".parse::<Rgb>().is_err());
        assert_eq!(Rgb::new(255, 128, 0).to_string(), "#ff8000");
    }

    #[test]
    fn brightness_scales() {
        assert_eq!(brightness_to_native(255), 100);
        assert_eq!(brightness_to_native(0), 0);
        assert_eq!(brightness_to_native(128), 50);
        assert_eq!(brightness_to_external(100), 255);
        assert_eq!(brightness_to_external(50), 128);
        assert_eq!(brightness_to_external(200), 255);
    }
}
