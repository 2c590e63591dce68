//! Per-star-system reduction of filtered planet rows.

use std::collections::BTreeMap;

use log::debug;
use serde::Serialize;

use super::coords::equatorial_to_cartesian;
use super::model::{CellValue, PlanetRow, PlanetTable};
use super::normalize::{
    DECLINATION, DISTANCE_PC, PLANET_NAME, PREDICTION, RIGHT_ASCENSION, STAR_NAME,
    STELLAR_MASS, STELLAR_RADIUS, STELLAR_TEMP,
};
use super::sample::sample_indices;

/// Default number of star systems returned per data query.
pub const MAX_STARS_DEFAULT: usize = 1000;

/// Scale applied to the planet-count brightness.
pub const STAR_BRIGHTNESS_MULTIPLIER: f64 = 2.0;

/// One star system as sent to the viewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StarSystemSummary {
    pub star_name: String,
    pub num_planets: usize,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub distance_pc: f64,
    pub right_ascens: f64,
    pub declination: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stellar_temp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stellar_mass: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stellar_radius: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planet_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction: Option<f64>,
    pub brightness: f64,
}

/// Running reduction of one star's rows.
#[derive(Debug, Default)]
struct StarGroup {
    right_ascens: Option<f64>,
    declination: Option<f64>,
    distance_pc: Option<f64>,
    stellar_temp: Option<f64>,
    stellar_mass: Option<f64>,
    stellar_radius: Option<f64>,
    planet_name: Option<String>,
    num_planets: usize,
    prediction: Option<f64>,
}

fn first_f64(slot: &mut Option<f64>, row: &PlanetRow, column: &str) {
    if slot.is_none() {
        *slot = row.get_f64(column);
    }
}

impl StarGroup {
    fn absorb(&mut self, row: &PlanetRow, with_prediction: bool) {
        first_f64(&mut self.right_ascens, row, RIGHT_ASCENSION);
        first_f64(&mut self.declination, row, DECLINATION);
        first_f64(&mut self.distance_pc, row, DISTANCE_PC);
        first_f64(&mut self.stellar_temp, row, STELLAR_TEMP);
        first_f64(&mut self.stellar_mass, row, STELLAR_MASS);
        first_f64(&mut self.stellar_radius, row, STELLAR_RADIUS);
        if self.planet_name.is_none() {
            self.planet_name = row.get(PLANET_NAME).map(ToString::to_string);
        }
        self.num_planets += 1;
        if with_prediction {
            if let Some(p) = row.get_f64(PREDICTION) {
                self.prediction = Some(self.prediction.map_or(p, |cur| cur.max(p)));
            }
        }
    }

    fn into_summary(self, star_name: String) -> Option<StarSystemSummary> {
        let (ra, dec, dist) = (self.right_ascens?, self.declination?, self.distance_pc?);
        let position = equatorial_to_cartesian(ra, dec, dist);
        Some(StarSystemSummary {
            star_name,
            num_planets: self.num_planets,
            x: position.x,
            y: position.y,
            z: position.z,
            distance_pc: dist,
            right_ascens: ra,
            declination: dec,
            stellar_temp: self.stellar_temp,
            stellar_mass: self.stellar_mass,
            stellar_radius: self.stellar_radius,
            planet_name: self.planet_name,
            prediction: self.prediction,
            brightness: brightness(self.num_planets),
        })
    }
}

/// 0.5 for a single planet, +0.1 per extra planet, capped at 1.0 before
/// the multiplier is applied.
pub fn brightness(num_planets: usize) -> f64 {
    let base = if num_planets > 1 {
        (0.5 + (num_planets - 1) as f64 * 0.1).min(1.0)
    } else {
        0.5
    };
    base * STAR_BRIGHTNESS_MULTIPLIER
}

/// Group the rows at `indices` by star identity and reduce each group to a
/// [`StarSystemSummary`].
///
/// Groups come out in ascending star order; when there are more than
/// `max_stars` of them, a seeded sample of exactly `max_stars` is kept in draw
/// order. Systems without RA, Dec and distance are dropped afterwards.
pub fn aggregate_star_systems(
    table: &PlanetTable,
    indices: &[usize],
    max_stars: usize,
) -> Vec<StarSystemSummary> {
    let with_prediction = table.has_column(PREDICTION);

    let mut groups: BTreeMap<&CellValue, StarGroup> = BTreeMap::new();
    for &idx in indices {
        let row = &table.rows[idx];
        let Some(star) = row.get(STAR_NAME) else {
            continue;
        };
        groups.entry(star).or_default().absorb(row, with_prediction);
    }

    let mut groups: Vec<(String, StarGroup)> = groups
        .into_iter()
        .map(|(star, group)| (star.to_string(), group))
        .collect();

    if groups.len() > max_stars {
        debug!("sampling {max_stars} of {} star systems", groups.len());
        let keep = sample_indices(groups.len(), max_stars);
        let mut slots: Vec<Option<(String, StarGroup)>> = groups.into_iter().map(Some).collect();
        groups = keep.into_iter().filter_map(|i| slots[i].take()).collect();
    }

    groups
        .into_iter()
        .filter_map(|(star, group)| group.into_summary(star))
        .collect()
}
