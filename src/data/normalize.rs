//! Canonical column names and alias resolution for uploaded catalogs.

use log::debug;

use super::model::PlanetTable;

pub const STAR_NAME: &str = "star_name";
pub const PLANET_NAME: &str = "planet_name";
pub const DISTANCE_PC: &str = "distance_pc";
pub const RIGHT_ASCENSION: &str = "right_ascens";
pub const DECLINATION: &str = "declination";

pub const STELLAR_TEMP: &str = "stellar_temp";
pub const STELLAR_MASS: &str = "stellar_mass";
pub const STELLAR_RADIUS: &str = "stellar_radius";
pub const PREDICTION: &str = "prediction";

/// Columns every dataset must expose after normalisation.
pub const REQUIRED_COLUMNS: [&str; 5] = [
    STAR_NAME,
    PLANET_NAME,
    DISTANCE_PC,
    RIGHT_ASCENSION,
    DECLINATION,
];

/// Accepted source names for each canonical column.
const ALIASES: &[(&str, &[&str])] = &[
    (STAR_NAME, &["hostname", "star", "host"]),
    (PLANET_NAME, &["pl_name", "planet", "name"]),
    (DISTANCE_PC, &["dist", "distance", "st_dist"]),
    (RIGHT_ASCENSION, &["ra", "RA", "right_ascens"]),
    (DECLINATION, &["dec", "DEC", "declination"]),
];

fn aliases_for(canonical: &str) -> &'static [&'static str] {
    ALIASES
        .iter()
        .find(|(name, _)| *name == canonical)
        .map(|(_, aliases)| *aliases)
        .unwrap_or(&[])
}

/// Resolve every missing canonical column from the first existing column
/// (in table order) that is one of its aliases, copying its values under the
/// canonical name.
///
/// Returns the canonical columns that could not be resolved. A non-empty
/// result means the table must be rejected.
pub fn normalize_columns(table: &mut PlanetTable) -> Vec<&'static str> {
    let mut unresolved = Vec::new();
    for canonical in REQUIRED_COLUMNS {
        if table.has_column(canonical) {
            continue;
        }
        let aliases = aliases_for(canonical);
        let source = table
            .columns
            .iter()
            .find(|col| aliases.contains(&col.as_str()))
            .cloned();
        match source {
            Some(source) => {
                debug!("column '{canonical}' resolved from alias '{source}'");
                table.copy_column(&source, canonical);
            }
            None => unresolved.push(canonical),
        }
    }
    unresolved
}
