use serde::Serialize;

/// Earth-centred Cartesian position in parsecs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CartesianPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Convert equatorial coordinates (RA/Dec in degrees, distance in parsecs)
/// to Cartesian. Angles outside the usual ranges are not rejected.
pub fn equatorial_to_cartesian(ra_deg: f64, dec_deg: f64, distance_pc: f64) -> CartesianPosition {
    let ra_rad = ra_deg.to_radians();
    let dec_rad = dec_deg.to_radians();

    let cos_dec = dec_rad.cos();
    CartesianPosition {
        x: distance_pc * cos_dec * ra_rad.cos(),
        y: distance_pc * cos_dec * ra_rad.sin(),
        z: distance_pc * dec_rad.sin(),
    }
}
