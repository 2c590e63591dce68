use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::model::{ColumnKind, PlanetTable};

/// Query parameter carrying the display cap; never treated as a column filter.
pub const MAX_STARS_PARAM: &str = "max_stars";

// ---------------------------------------------------------------------------
// Constraint: one column's predicate, decided once per request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Inclusive numeric range.
    Range { min: f64, max: f64 },
    /// Exact match against the cell's trimmed canonical text.
    Exact(String),
}

impl Constraint {
    /// Parse `"<min>,<max>"` as a range; anything else is an exact match on
    /// the raw value.
    pub fn parse(raw: &str) -> Self {
        let mut parts = raw.split(',');
        if let (Some(lo), Some(hi), None) = (parts.next(), parts.next(), parts.next()) {
            if let (Ok(min), Ok(max)) = (lo.trim().parse::<f64>(), hi.trim().parse::<f64>()) {
                return Constraint::Range { min, max };
            }
        }
        Constraint::Exact(raw.to_string())
    }
}

/// A single column predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnFilter {
    pub column: String,
    pub constraint: Constraint,
}

// ---------------------------------------------------------------------------
// FilterSpec: conjunction of column predicates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    pub filters: Vec<ColumnFilter>,
}

impl FilterSpec {
    /// Build the filters for `table` from raw query parameters.
    ///
    /// Unknown columns and the display-cap key are ignored; a repeated key
    /// keeps its first value. A range on a text column degrades to an exact
    /// match on the raw value.
    pub fn from_params(params: &[(String, String)], table: &PlanetTable) -> Self {
        let mut seen = BTreeSet::new();
        let mut filters = Vec::new();
        for (key, raw) in params {
            if key == MAX_STARS_PARAM || !seen.insert(key.as_str()) {
                continue;
            }
            let Some(kind) = table.column_kind(key) else {
                continue;
            };
            let constraint = match Constraint::parse(raw) {
                Constraint::Range { .. } if !kind.is_numeric() => Constraint::Exact(raw.clone()),
                parsed => parsed,
            };
            filters.push(ColumnFilter {
                column: key.clone(),
                constraint,
            });
        }
        FilterSpec { filters }
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

/// Return indices of rows that pass every filter, in table order.
///
/// A row passes a column filter only when its cell is present and
/// * lies within `[min, max]` for a range, or
/// * has trimmed canonical text equal to the raw value for an exact match.
pub fn filtered_indices(table: &PlanetTable, spec: &FilterSpec) -> Vec<usize> {
    table
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| {
            spec.filters.iter().all(|f| {
                let Some(value) = row.get(&f.column) else {
                    return false;
                };
                match &f.constraint {
                    Constraint::Range { min, max } => value
                        .as_f64()
                        .is_some_and(|v| v >= *min && v <= *max),
                    Constraint::Exact(expected) => value.to_string().trim() == expected,
                }
            })
        })
        .map(|(i, _)| i)
        .collect()
}

// ---------------------------------------------------------------------------
// Filter metadata for the client's slider widgets
// ---------------------------------------------------------------------------

/// Display configuration of one filterable column.
struct FilterConfig {
    column: &'static str,
    label: &'static str,
    unit: &'static str,
    step: f64,
}

const FILTER_CONFIGS: &[FilterConfig] = &[
    FilterConfig { column: "stellar_temp", label: "Star Temperature", unit: "K", step: 100.0 },
    FilterConfig { column: "period", label: "Orbital Period", unit: "days", step: 1.0 },
    FilterConfig { column: "planet_radius", label: "Planet Radius", unit: "R⊕", step: 0.5 },
    FilterConfig { column: "planet_temp", label: "Planet Temperature", unit: "K", step: 50.0 },
    FilterConfig { column: "distance_pc", label: "Distance", unit: "pc", step: 5.0 },
    FilterConfig { column: "stellar_mass", label: "Stellar Mass", unit: "M☉", step: 0.1 },
    FilterConfig { column: "trans_depth", label: "Transit Depth", unit: "ppm", step: 100.0 },
];

/// Observed bounds and display hints for one filterable column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterMeta {
    pub min: f64,
    pub max: f64,
    pub active: bool,
    pub step: f64,
    pub label: String,
    pub unit: String,
}

/// Filter metadata for every known filterable column present in `table`
/// with at least one numeric value.
pub fn dynamic_filters(table: &PlanetTable) -> BTreeMap<String, FilterMeta> {
    FILTER_CONFIGS
        .iter()
        .filter(|cfg| table.column_kind(cfg.column).is_some_and(ColumnKind::is_numeric))
        .filter_map(|cfg| {
            let (min, max) = table.numeric_range(cfg.column)?;
            Some((
                cfg.column.to_string(),
                FilterMeta {
                    min,
                    max,
                    active: true,
                    step: cfg.step,
                    label: cfg.label.to_string(),
                    unit: cfg.unit.to_string(),
                },
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::read_csv;

    fn table() -> PlanetTable {
        read_csv(
            "star_name,planet_name,stellar_temp,disc_method,empty\n\
             A,A b,5000,Transit,\n\
             A,A c,5000,Radial Velocity,\n\
             B,B b,3200,Transit,\n\
             C,C b,,Imaging,\n\
             D,D b,7000.5,Transit,\n"
                .as_bytes(),
        )
        .unwrap()
    }

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parse_range_and_fallbacks() {
        assert_eq!(Constraint::parse("1,2.5"), Constraint::Range { min: 1.0, max: 2.5 });
        assert_eq!(Constraint::parse(" 1 , 2 "), Constraint::Range { min: 1.0, max: 2.0 });
        assert_eq!(Constraint::parse("1,2,3"), Constraint::Exact("1,2,3".into()));
        assert_eq!(Constraint::parse("abc,2"), Constraint::Exact("abc,2".into()));
        assert_eq!(Constraint::parse("5"), Constraint::Exact("5".into()));
    }

    #[test]
    fn range_is_inclusive_and_skips_missing() {
        let t = table();
        let spec = FilterSpec::from_params(&params(&[("stellar_temp", "3200,5000")]), &t);
        assert_eq!(filtered_indices(&t, &spec), vec![0, 1, 2]);
    }

    #[test]
    fn malformed_range_falls_back_to_exact_match() {
        let t = table();
        let spec = FilterSpec::from_params(&params(&[("disc_method", "Transit")]), &t);
        assert_eq!(filtered_indices(&t, &spec), vec![0, 2, 4]);

        let spec = FilterSpec::from_params(&params(&[("stellar_temp", "5000.0")]), &t);
        assert_eq!(filtered_indices(&t, &spec), vec![0, 1]);

        // integral float cells render with a trailing `.0`
        let spec = FilterSpec::from_params(&params(&[("stellar_temp", "5000")]), &t);
        assert!(filtered_indices(&t, &spec).is_empty());
    }

    #[test]
    fn range_on_text_column_is_exact_match() {
        let t = read_csv("star_name,note\nA,\"1,2\"\nB,x\n".as_bytes()).unwrap();
        let spec = FilterSpec::from_params(&params(&[("note", "1,2")]), &t);
        assert_eq!(spec.filters[0].constraint, Constraint::Exact("1,2".into()));
        assert_eq!(filtered_indices(&t, &spec), vec![0]);
    }

    #[test]
    fn unknown_keys_and_cap_are_ignored() {
        let t = table();
        let spec = FilterSpec::from_params(
            &params(&[("nope", "1,2"), (MAX_STARS_PARAM, "10")]),
            &t,
        );
        assert!(spec.is_empty());
        assert_eq!(filtered_indices(&t, &spec), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn filters_compose_by_conjunction() {
        let t = table();
        let spec = FilterSpec::from_params(
            &params(&[("disc_method", "Transit"), ("stellar_temp", "4000,8000")]),
            &t,
        );
        assert_eq!(filtered_indices(&t, &spec), vec![0, 4]);
    }

    #[test]
    fn first_value_of_repeated_key_wins() {
        let t = table();
        let spec = FilterSpec::from_params(
            &params(&[("star_name", "B"), ("star_name", "A")]),
            &t,
        );
        assert_eq!(filtered_indices(&t, &spec), vec![2]);
    }

    #[test]
    fn all_missing_column_matches_nothing() {
        let t = table();
        let spec = FilterSpec::from_params(&params(&[("empty", "0,100")]), &t);
        assert!(filtered_indices(&t, &spec).is_empty());
    }

    #[test]
    fn applying_twice_is_idempotent() {
        let t = table();
        let spec = FilterSpec::from_params(&params(&[("stellar_temp", "3000,6000")]), &t);
        let once = filtered_indices(&t, &spec);

        let subset = PlanetTable::from_rows(
            t.columns.clone(),
            once.iter().map(|&i| t.rows[i].clone()).collect(),
        );
        let twice: Vec<usize> = filtered_indices(&subset, &spec)
            .into_iter()
            .map(|i| once[i])
            .collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn dynamic_filters_report_observed_bounds() {
        let t = table();
        let meta = dynamic_filters(&t);
        assert_eq!(meta.len(), 1);
        let temp = &meta["stellar_temp"];
        assert_eq!((temp.min, temp.max), (3200.0, 7000.5));
        assert_eq!(temp.unit, "K");
        assert_eq!(temp.step, 100.0);
        assert!(temp.active);
    }
}
