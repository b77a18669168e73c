// Colormaps and named colours

use num_traits::ToPrimitive;
use plotters::style::RGBColor;
use serde::{Deserialize, Serialize};

/// Palette used to shade contour bands.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ColorMap {
    /// Blue -> cyan -> yellow -> red
    #[default]
    Jet,
    Viridis,
    /// Diverging blue -> grey -> red, for signed quantities such as pressure
    Coolwarm,
    /// Black -> red -> yellow -> white
    Hot,
    Gray,
}

const VIRIDIS_STOPS: [(f64, f64, f64); 5] = [
    (68.0, 1.0, 84.0),    // #440154 (0.00)
    (59.0, 82.0, 139.0),  // #3b528b (0.25)
    (33.0, 145.0, 140.0), // #21918c (0.50)
    (94.0, 201.0, 98.0),  // #5ec962 (0.75)
    (253.0, 231.0, 37.0), // #fde725 (1.00)
];

const COOLWARM_STOPS: [(f64, f64, f64); 5] = [
    (59.0, 76.0, 192.0),   // (0.00)
    (124.0, 159.0, 249.0), // (0.25)
    (221.0, 221.0, 221.0), // (0.50)
    (244.0, 154.0, 123.0), // (0.75)
    (180.0, 4.0, 38.0),    // (1.00)
];

impl ColorMap {
    /// Colour for a value normalised to [0, 1]. Out-of-range input is clamped.
    pub fn color_at(&self, t: f64) -> RGBColor {
        let t = t.clamp(0., 1.);

        let (r, g, b) = match self {
            ColorMap::Jet => (jet(t, 3.), jet(t, 2.), jet(t, 1.)),
            ColorMap::Viridis => interpolate_stops(&VIRIDIS_STOPS, t),
            ColorMap::Coolwarm => interpolate_stops(&COOLWARM_STOPS, t),
            ColorMap::Hot => (3. * t, 3. * t - 1., 3. * t - 2.),
            ColorMap::Gray => (t, t, t),
        };

        RGBColor(channel(r), channel(g), channel(b))
    }
}

/// One jet channel: a tent of width 1.5 around `center / 4`.
fn jet(t: f64, center: f64) -> f64 {
    1.5 - (4. * t - center).abs()
}

fn interpolate_stops(stops: &[(f64, f64, f64)], t: f64) -> (f64, f64, f64) {
    let segments = (stops.len() - 1) as f64;
    let seg = t * segments;
    let i = (seg as usize).min(stops.len() - 2);
    let s = seg - i as f64;

    let (r0, g0, b0) = stops[i];
    let (r1, g1, b1) = stops[i + 1];

    (
        (r0 + s * (r1 - r0)) / 255.,
        (g0 + s * (g1 - g0)) / 255.,
        (b0 + s * (b1 - b0)) / 255.,
    )
}

fn channel(v: f64) -> u8 {
    (v.clamp(0., 1.) * 255.).round().to_u8().unwrap_or(u8::MAX)
}

/// Resolve a colour name (`white`, `black`, ...) or a `#rrggbb` hex string.
pub fn parse_color(name: &str) -> Option<RGBColor> {
    let name = name.trim().to_ascii_lowercase();

    if let Some(hex) = name.strip_prefix('#') {
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        return Some(RGBColor(byte(0)?, byte(2)?, byte(4)?));
    }

    let color = match name.as_str() {
        "white" => RGBColor(255, 255, 255),
        "black" => RGBColor(0, 0, 0),
        "red" => RGBColor(255, 0, 0),
        "green" => RGBColor(0, 128, 0),
        "blue" => RGBColor(0, 0, 255),
        "yellow" => RGBColor(255, 255, 0),
        "cyan" => RGBColor(0, 255, 255),
        "magenta" => RGBColor(255, 0, 255),
        "orange" => RGBColor(255, 165, 0),
        "gray" | "grey" => RGBColor(128, 128, 128),
        _ => return None,
    };

    Some(color)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jet_endpoints() {
        assert_eq!(ColorMap::Jet.color_at(0.), RGBColor(0, 0, 128));
        assert_eq!(ColorMap::Jet.color_at(0.5), RGBColor(128, 255, 128));
        assert_eq!(ColorMap::Jet.color_at(1.), RGBColor(128, 0, 0));
    }

    #[test]
    fn test_stops_hit_exactly() {
        assert_eq!(ColorMap::Viridis.color_at(0.), RGBColor(68, 1, 84));
        assert_eq!(ColorMap::Viridis.color_at(0.5), RGBColor(33, 145, 140));
        assert_eq!(ColorMap::Viridis.color_at(1.), RGBColor(253, 231, 37));
    }

    #[test]
    fn test_color_clamp() {
        for map in [ColorMap::Jet, ColorMap::Hot, ColorMap::Coolwarm] {
            assert_eq!(map.color_at(-1.), map.color_at(0.));
            assert_eq!(map.color_at(2.), map.color_at(1.));
        }
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("white"), Some(RGBColor(255, 255, 255)));
        assert_eq!(parse_color(" Black "), Some(RGBColor(0, 0, 0)));
        assert_eq!(parse_color("#1a1B26"), Some(RGBColor(26, 27, 38)));

        assert_eq!(parse_color("chartreuse"), None);
        assert_eq!(parse_color("#12345"), None);
        assert_eq!(parse_color("#zz0000"), None);
    }
}
