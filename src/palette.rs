//! Logo color extraction.
//!
//! Derives a client's theme (base, header, sidebar) from the raw RGBA
//! pixels of its logo. Pixels are sampled every fourth one; the brightest
//! sufficiently-saturated pixel wins, falling back to the most saturated
//! pixel, then to the plain average. The winner gets a saturation boost
//! and two light variants for the header and sidebar surfaces.

use serde::Serialize;

const SAT_THRESHOLD: f32 = 0.15;
const PIXEL_SAT_THRESHOLD: f32 = 0.2;
const MIN_BRIGHTNESS: f32 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Palette {
    pub base_color: String,
    pub header_color: String,
    pub sidebar_color: String,
}

/// `#RRGGBB` (leading `#` optional, case-insensitive) to RGB.
pub fn hex_to_rgb(hex: &str) -> Option<Rgb> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |range| u8::from_str_radix(&digits[range], 16).ok();
    Some(Rgb {
        r: channel(0..2)?,
        g: channel(2..4)?,
        b: channel(4..6)?,
    })
}

pub fn rgb_to_hex(rgb: Rgb) -> String {
    format!("#{:02x}{:02x}{:02x}", rgb.r, rgb.g, rgb.b)
}

/// Max-channel saturation in `[0, 1]`; zero for pure black.
pub fn saturation(rgb: Rgb) -> f32 {
    let max = rgb.r.max(rgb.g).max(rgb.b) as f32;
    let min = rgb.r.min(rgb.g).min(rgb.b) as f32;
    if max == 0.0 {
        0.0
    } else {
        (max - min) / max
    }
}

/// Push a color further from gray. Near-grayscale inputs are replaced
/// outright with a vivid default keyed off the dominant channel.
pub fn boost_color(hex: &str) -> String {
    let Some(rgb) = hex_to_rgb(hex) else {
        return hex.to_string();
    };

    if saturation(rgb) < SAT_THRESHOLD {
        let max = rgb.r.max(rgb.g).max(rgb.b);
        if rgb.r == max {
            return "#FF5252".to_string();
        }
        if rgb.g == max {
            return "#69F0AE".to_string();
        }
        return "#448AFF".to_string();
    }

    let avg = (rgb.r as f32 + rgb.g as f32 + rgb.b as f32) / 3.0;
    let boost = 1.3;
    let push = |c: u8| {
        let v = c as f32 + (c as f32 - avg) * boost;
        v.round().clamp(0.0, 255.0) as u8
    };
    rgb_to_hex(Rgb {
        r: push(rgb.r),
        g: push(rgb.g),
        b: push(rgb.b),
    })
}

/// A pale tint of the color, suitable as a surface background. Grayish
/// inputs are boosted first so the tint still reads as the brand color.
pub fn light_variant(hex: &str) -> String {
    let Some(rgb) = hex_to_rgb(hex) else {
        return "#ffffff".to_string();
    };

    let source = if saturation(rgb) < SAT_THRESHOLD {
        boost_color(hex)
    } else {
        hex.to_string()
    };
    let Some(rgb) = hex_to_rgb(&source) else {
        return "#ffffff".to_string();
    };

    let lightness = 0.75;
    let sat_keep = 0.85;
    let tint = |c: u8| {
        let v = 255.0 - (255.0 - c as f32) * sat_keep * (1.0 - lightness);
        v.round().clamp(0.0, 255.0) as u8
    };
    rgb_to_hex(Rgb {
        r: tint(rgb.r),
        g: tint(rgb.g),
        b: tint(rgb.b),
    })
}

/// Extract a theme from an RGBA pixel buffer (4 bytes per pixel). Returns
/// `None` for an empty buffer.
pub fn extract_palette(rgba: &[u8]) -> Option<Palette> {
    let mut sum = (0u64, 0u64, 0u64);
    let mut count = 0u64;
    let mut most_saturated: Option<(f32, Rgb)> = None;
    let mut brightest_saturated: Option<(f32, Rgb)> = None;

    // Sample every fourth pixel.
    for px in rgba.chunks_exact(4).step_by(4) {
        let rgb = Rgb {
            r: px[0],
            g: px[1],
            b: px[2],
        };
        let sat = saturation(rgb);
        let brightness = (rgb.r as f32 + rgb.g as f32 + rgb.b as f32) / 3.0;

        if sat > PIXEL_SAT_THRESHOLD
            && brightness > MIN_BRIGHTNESS
            && brightest_saturated.map_or(true, |(best, _)| brightness > best)
        {
            brightest_saturated = Some((brightness, rgb));
        }
        if most_saturated.map_or(true, |(best, _)| sat > best) {
            most_saturated = Some((sat, rgb));
        }

        sum.0 += rgb.r as u64;
        sum.1 += rgb.g as u64;
        sum.2 += rgb.b as u64;
        count += 1;
    }

    if count == 0 {
        return None;
    }

    let base = if let Some((_, rgb)) = brightest_saturated {
        rgb
    } else if let Some((_, rgb)) = most_saturated.filter(|(s, _)| *s > PIXEL_SAT_THRESHOLD) {
        rgb
    } else {
        Rgb {
            r: (sum.0 / count) as u8,
            g: (sum.1 / count) as u8,
            b: (sum.2 / count) as u8,
        }
    };

    let base_color = boost_color(&rgb_to_hex(base));
    Some(Palette {
        header_color: light_variant(&base_color),
        sidebar_color: light_variant(&base_color),
        base_color,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let rgb = hex_to_rgb("#4A5568").unwrap();
        assert_eq!(rgb, Rgb { r: 0x4a, g: 0x55, b: 0x68 });
        assert_eq!(rgb_to_hex(rgb), "#4a5568");
        assert!(hex_to_rgb("4a5568").is_some());
        assert!(hex_to_rgb("#12345").is_none());
        assert!(hex_to_rgb("#zzzzzz").is_none());
    }

    #[test]
    fn saturation_of_gray_and_pure_colors() {
        assert_eq!(saturation(Rgb { r: 0, g: 0, b: 0 }), 0.0);
        assert_eq!(saturation(Rgb { r: 128, g: 128, b: 128 }), 0.0);
        assert_eq!(saturation(Rgb { r: 255, g: 0, b: 0 }), 1.0);
    }

    #[test]
    fn grayscale_boost_picks_a_vivid_default() {
        assert_eq!(boost_color("#808080"), "#FF5252");
        assert_eq!(boost_color("#707880"), "#448AFF");
    }

    #[test]
    fn saturated_colors_get_pushed_not_replaced() {
        let boosted = boost_color("#3060c0");
        assert_ne!(boosted, "#3060c0");
        assert_ne!(boosted, "#448AFF");
        let rgb = hex_to_rgb(&boosted).unwrap();
        assert!(rgb.b > rgb.r);
    }

    #[test]
    fn light_variant_is_lighter_than_source() {
        let src = hex_to_rgb("#3060c0").unwrap();
        let light = hex_to_rgb(&light_variant("#3060c0")).unwrap();
        assert!(light.r > src.r && light.g > src.g && light.b > src.b);
    }

    #[test]
    fn invalid_hex_falls_back() {
        assert_eq!(boost_color("nope"), "nope");
        assert_eq!(light_variant("nope"), "#ffffff");
    }

    #[test]
    fn palette_prefers_bright_saturated_pixels() {
        // Three sampled pixels: dim gray, bright red, dark saturated blue.
        let mut buf = Vec::new();
        for rgb in [[40u8, 40, 40], [220, 30, 30], [10, 10, 90]] {
            buf.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
            // Padding pixels skipped by the sampling stride.
            buf.extend_from_slice(&[0, 0, 0, 255]);
            buf.extend_from_slice(&[0, 0, 0, 255]);
            buf.extend_from_slice(&[0, 0, 0, 255]);
        }
        let palette = extract_palette(&buf).unwrap();
        let base = hex_to_rgb(&palette.base_color).unwrap();
        assert!(base.r > base.g && base.r > base.b);
    }

    #[test]
    fn empty_buffer_yields_none() {
        assert!(extract_palette(&[]).is_none());
    }
}
