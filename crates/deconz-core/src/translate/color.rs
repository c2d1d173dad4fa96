// ── CIE xy to hue/saturation ──
//
// Converts a gateway xy chromaticity to the hub's hue/saturation pair, both
// in 0..=1, assuming full brightness. Uses the wide-gamut RGB D65 matrix
// with sRGB gamma, as Hue-compatible gateways do.

/// Hue and saturation in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HueSat {
    pub hue: f64,
    pub saturation: f64,
}

/// Convert an xy chromaticity at full brightness.
///
/// Returns `None` for `y <= 0`, which has no defined luminance.
pub fn xy_to_hs(x: f64, y: f64) -> Option<HueSat> {
    if !x.is_finite() || !y.is_finite() || y <= 0.0 {
        return None;
    }

    // xyY -> XYZ with Y = 1
    let big_y = 1.0;
    let big_x = (big_y / y) * x;
    let big_z = (big_y / y) * (1.0 - x - y);

    // XYZ -> linear RGB (wide gamut D65)
    let r = big_x * 1.656_492 - big_y * 0.354_851 - big_z * 0.255_038;
    let g = -big_x * 0.707_196 + big_y * 1.655_397 + big_z * 0.036_152;
    let b = big_x * 0.051_713 - big_y * 0.121_364 + big_z * 1.011_530;

    // Bring the brightest channel down to 1 before gamma.
    let max = r.max(g).max(b);
    let (r, g, b) = if max > 1.0 {
        (r / max, g / max, b / max)
    } else {
        (r, g, b)
    };

    let (r, g, b) = (gamma(r), gamma(g), gamma(b));
    Some(rgb_to_hs(r, g, b))
}

fn gamma(channel: f64) -> f64 {
    let c = if channel <= 0.003_130_8 {
        12.92 * channel
    } else {
        1.055 * channel.powf(1.0 / 2.4) - 0.055
    };
    c.clamp(0.0, 1.0)
}

fn rgb_to_hs(r: f64, g: f64, b: f64) -> HueSat {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let saturation = if max > 0.0 { delta / max } else { 0.0 };

    let sector = if delta <= f64::EPSILON {
        0.0
    } else if (max - r).abs() <= f64::EPSILON {
        ((g - b) / delta).rem_euclid(6.0)
    } else if (max - g).abs() <= f64::EPSILON {
        (b - r) / delta + 2.0
    } else {
        (r - g) / delta + 4.0
    };

    HueSat {
        hue: sector / 6.0,
        saturation,
    }
}

/// Round to two decimals, the precision the hub stores color at.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn d65_white_point_is_unsaturated() {
        let hs = xy_to_hs(0.3127, 0.3290).unwrap();
        assert!(hs.saturation < 0.05, "saturation was {}", hs.saturation);
        assert!(round2(hs.saturation) < 0.05);
    }

    #[test]
    fn red_corner_is_red_and_saturated() {
        let hs = xy_to_hs(0.700_607, 0.299_301).unwrap();
        assert!(hs.saturation > 0.9, "saturation was {}", hs.saturation);
        assert!(hs.hue < 0.05 || hs.hue > 0.95, "hue was {}", hs.hue);
    }

    #[test]
    fn blue_corner_hue() {
        let hs = xy_to_hs(0.1355, 0.0399).unwrap();
        assert!(hs.saturation > 0.9);
        assert!((0.55..0.8).contains(&hs.hue), "hue was {}", hs.hue);
    }

    #[test]
    fn degenerate_input() {
        assert!(xy_to_hs(0.3, 0.0).is_none());
        assert!(xy_to_hs(f64::NAN, 0.3).is_none());
    }

    #[test]
    fn rounds_to_two_decimals() {
        assert!((round2(0.498_039) - 0.5).abs() < 1e-12);
        assert!((round2(0.123_4) - 0.12).abs() < 1e-12);
    }
}
