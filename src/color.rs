use palette::Srgb;

/// Temperature assumed for stars without a recorded `stellar_temp` (K).
pub const SUN_TEMPERATURE: f64 = 5778.0;

// ---------------------------------------------------------------------------
// Star temperature → display colour
// ---------------------------------------------------------------------------

/// Upper bounds (exclusive) of each temperature bucket and its colour.
const TEMPERATURE_BUCKETS: [(f64, Srgb<u8>); 6] = [
    (3500.0, Srgb::new(0xff, 0x66, 0x44)),
    (5000.0, Srgb::new(0xff, 0xaa, 0x44)),
    (6000.0, Srgb::new(0xff, 0xff, 0x88)),
    (7500.0, Srgb::new(0xff, 0xff, 0xcc)),
    (10000.0, Srgb::new(0xff, 0xff, 0xff)),
    (30000.0, Srgb::new(0xcc, 0xcc, 0xff)),
];

/// Colour for stars at or above the hottest bucket bound.
const HOTTEST: Srgb<u8> = Srgb::new(0xaa, 0xaa, 0xff);

/// Display colour for a star of the given effective temperature.
pub fn star_color(temperature: f64) -> Srgb<u8> {
    TEMPERATURE_BUCKETS
        .iter()
        .find(|(bound, _)| temperature < *bound)
        .map(|(_, color)| *color)
        .unwrap_or(HOTTEST)
}

/// `#rrggbb` form used by the viewer.
pub fn to_hex(color: Srgb<u8>) -> String {
    format!("#{:02x}{:02x}{:02x}", color.red, color.green, color.blue)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(t: f64) -> String {
        to_hex(star_color(t))
    }

    #[test]
    fn bucket_bounds_are_exclusive() {
        assert_eq!(hex(3499.9), "#ff6644");
        assert_eq!(hex(3500.0), "#ffaa44");
        assert_eq!(hex(4999.0), "#ffaa44");
        assert_eq!(hex(5000.0), "#ffff88");
        assert_eq!(hex(SUN_TEMPERATURE), "#ffff88");
        assert_eq!(hex(6000.0), "#ffffcc");
        assert_eq!(hex(7500.0), "#ffffff");
        assert_eq!(hex(10000.0), "#ccccff");
        assert_eq!(hex(30000.0), "#aaaaff");
    }

    #[test]
    fn nan_temperature_falls_through_to_hottest() {
        assert_eq!(hex(f64::NAN), "#aaaaff");
    }
}
