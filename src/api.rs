//! Request-level operations behind every HTTP endpoint.
//!
//! Each function takes the shared [`AppState`] and plain inputs and returns
//! a serialisable response or an [`AppError`]; the HTTP layer only extracts
//! inputs and maps errors to status codes.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use unicode_normalization::UnicodeNormalization;

use crate::color::{SUN_TEMPERATURE, star_color, to_hex};
use crate::config::ServerConfig;
use crate::data::aggregate::{StarSystemSummary, aggregate_star_systems};
use crate::data::filter::{FilterMeta, FilterSpec, MAX_STARS_PARAM, dynamic_filters, filtered_indices};
use crate::data::loader::{load_file, read_csv};
use crate::data::model::{CellValue, PlanetTable};
use crate::data::normalize::{STAR_NAME, STELLAR_TEMP, normalize_columns};
use crate::error::AppError;
use crate::predict::{
    CLASSIFICATION_FEATURES, Classifier, PredictionReport, annotate_predictions,
};
use crate::registry::DatasetRegistry;

/// Registry name of the dataset loaded from the on-disk default file.
pub const DEFAULT_DATASET: &str = "default";

/// Values filled into gaps of the on-disk default dataset.
const DEFAULT_FILLS: [(&str, CellValue); 3] = [
    ("planet_radius", CellValue::Float(1.0)),
    ("planet_temp", CellValue::Integer(300)),
    ("period", CellValue::Integer(365)),
];

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Everything a request handler needs, shared across requests.
pub struct AppState {
    pub registry: DatasetRegistry,
    pub config: ServerConfig,
    pub classifier: Arc<dyn Classifier>,
}

impl AppState {
    pub fn new(config: ServerConfig, classifier: Arc<dyn Classifier>) -> Self {
        AppState {
            registry: DatasetRegistry::new(),
            config,
            classifier,
        }
    }

    /// Register the on-disk default dataset, if present and valid, and make
    /// it active. Returns whether it was registered.
    pub fn load_startup_dataset(&self) -> bool {
        match load_default_table(&self.config.default_dataset_file) {
            Some(table) => {
                self.registry.register(DEFAULT_DATASET, table);
                true
            }
            None => false,
        }
    }
}

/// Load and normalise the default dataset file. Problems are logged and
/// yield `None`.
pub fn load_default_table(path: &Path) -> Option<PlanetTable> {
    if !path.exists() {
        return None;
    }
    let mut table = match load_file(path) {
        Ok(table) => table,
        Err(e) => {
            warn!("error loading default dataset {}: {e:#}", path.display());
            return None;
        }
    };
    let missing = normalize_columns(&mut table);
    if !missing.is_empty() {
        warn!("default dataset {} missing columns: {missing:?}", path.display());
        return None;
    }
    for (column, fill) in DEFAULT_FILLS {
        table.fill_missing(column, fill);
    }
    Some(table)
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub dataset_name: String,
    pub columns: Vec<String>,
    pub filters: BTreeMap<String, FilterMeta>,
}

/// Basenames Windows reserves for devices, whatever the extension.
const WINDOWS_DEVICE_NAMES: [&str; 24] = [
    "CON", "PRN", "AUX", "NUL", "COM0", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7",
    "COM8", "COM9", "LPT0", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Reduce an uploaded filename to a safe ASCII basename.
///
/// Accented letters are transliterated through NFKD (`café` → `cafe`) and
/// any other non-ASCII character is dropped. Device names such as `CON.csv`
/// get a leading `_`.
pub fn secure_filename(name: &str) -> String {
    let ascii: String = name.nfkd().filter(char::is_ascii).collect();
    let spaced = ascii.replace(['/', '\\'], " ");
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect::<String>()
        .trim_matches(|c| c == '.' || c == '_')
        .to_string();

    let stem = cleaned.split('.').next().unwrap_or_default().to_ascii_uppercase();
    if WINDOWS_DEVICE_NAMES.contains(&stem.as_str()) {
        format!("_{cleaned}")
    } else {
        cleaned
    }
}

/// Save, parse, normalise and register an uploaded CSV file.
pub fn upload_dataset(
    state: &AppState,
    filename: Option<&str>,
    contents: &[u8],
) -> Result<UploadResponse, AppError> {
    let filename = filename.ok_or_else(|| AppError::Validation("No file part".to_string()))?;
    if filename.is_empty() {
        return Err(AppError::Validation("No selected file".to_string()));
    }
    if !filename.ends_with(".csv") {
        return Err(AppError::Validation("Invalid file format".to_string()));
    }
    let filename = secure_filename(filename);
    if filename.is_empty() {
        return Err(AppError::Validation("Invalid file format".to_string()));
    }

    std::fs::create_dir_all(&state.config.upload_dir)?;
    std::fs::write(state.config.upload_dir.join(&filename), contents)?;

    let mut table = read_csv(contents).map_err(|e| AppError::Validation(format!("{e:#}")))?;
    let missing = normalize_columns(&mut table);
    if !missing.is_empty() {
        return Err(AppError::MissingColumns(
            missing.into_iter().map(str::to_string).collect(),
        ));
    }

    let dataset_name = filename.replace(".csv", "");
    let columns = table.columns.clone();
    let filters = dynamic_filters(&table);
    state.registry.register(&dataset_name, table);

    Ok(UploadResponse {
        success: true,
        dataset_name,
        columns,
        filters,
    })
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub filters: BTreeMap<String, FilterMeta>,
    pub current_dataset: Option<String>,
    pub available_datasets: Vec<String>,
    pub max_stars_default: usize,
}

/// Filter metadata of the active dataset plus the known dataset names.
pub fn client_config(state: &AppState) -> ConfigResponse {
    let current = state.registry.active();
    let filters = current
        .as_deref()
        .and_then(|name| state.registry.get(name).ok())
        .map(|table| dynamic_filters(&table))
        .unwrap_or_default();

    ConfigResponse {
        filters,
        current_dataset: current,
        available_datasets: state.registry.names(),
        max_stars_default: state.config.max_stars_default,
    }
}

// ---------------------------------------------------------------------------
// Data query
// ---------------------------------------------------------------------------

/// Display cap from the query, falling back to the configured default when
/// absent, unparsable or negative.
fn display_cap(params: &[(String, String)], default: usize) -> usize {
    params
        .iter()
        .find(|(k, _)| k == MAX_STARS_PARAM)
        .and_then(|(_, v)| v.trim().parse::<i64>().ok())
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(default)
}

/// Filter dataset `name` by the query parameters and aggregate it into star
/// systems.
pub fn star_systems(
    state: &AppState,
    name: &str,
    params: &[(String, String)],
) -> Result<Vec<StarSystemSummary>, AppError> {
    if name == DEFAULT_DATASET && !state.registry.contains(DEFAULT_DATASET) {
        let table = load_default_table(&state.config.default_dataset_file)
            .ok_or_else(|| AppError::NotFound("No default dataset available".to_string()))?;
        state.registry.insert(DEFAULT_DATASET, table);
    }
    let table = state.registry.get(name)?;

    let spec = FilterSpec::from_params(params, &table);
    let indices = filtered_indices(&table, &spec);
    let max_stars = display_cap(params, state.config.max_stars_default);
    let systems = aggregate_star_systems(&table, &indices, max_stars);
    info!(
        "'{name}': {} filters, {} of {} rows matched, {} star systems",
        spec.filters.len(),
        indices.len(),
        table.len(),
        systems.len()
    );
    Ok(systems)
}

// ---------------------------------------------------------------------------
// Predict
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: PredictionReport,
}

/// Classify every planet of `dataset` (or of the active dataset when absent
/// or `default`) and store the probabilities.
pub fn predict(state: &AppState, dataset: Option<&str>) -> Result<PredictResponse, AppError> {
    let name = match dataset {
        Some(name) if name != DEFAULT_DATASET => Some(name.to_string()),
        _ => state.registry.active(),
    }
    .ok_or_else(|| AppError::NotFound("Dataset not found".to_string()))?;

    let report = annotate_predictions(
        &state.registry,
        &name,
        &CLASSIFICATION_FEATURES,
        state.classifier.as_ref(),
    )?;
    Ok(PredictResponse {
        success: true,
        report,
    })
}

// ---------------------------------------------------------------------------
// Star detail
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct StarSystemDetail {
    pub star_name: String,
    pub star_color: String,
    pub star_temp: f64,
    pub planets: Vec<Map<String, JsonValue>>,
    pub num_planets: usize,
}

fn cell_to_json(value: &CellValue) -> JsonValue {
    match value {
        CellValue::Text(s) => JsonValue::String(s.clone()),
        other => other.as_f64().map(JsonValue::from).unwrap_or(JsonValue::Null),
    }
}

/// All planets of `star` from the first registered dataset that has any.
pub fn star_system_detail(state: &AppState, star: &str) -> Result<StarSystemDetail, AppError> {
    for (_, table) in state.registry.snapshots() {
        if !table.has_column(STAR_NAME) {
            continue;
        }
        let rows: Vec<_> = table
            .rows
            .iter()
            .filter(|row| row.get(STAR_NAME).is_some_and(|v| v.to_string() == star))
            .collect();
        let Some(first) = rows.first() else {
            continue;
        };

        let star_temp = first.get_f64(STELLAR_TEMP).unwrap_or(SUN_TEMPERATURE);
        let planets: Vec<Map<String, JsonValue>> = rows
            .iter()
            .map(|row| {
                table
                    .columns
                    .iter()
                    .filter_map(|col| Some((col.clone(), cell_to_json(row.get(col)?))))
                    .collect()
            })
            .collect();

        return Ok(StarSystemDetail {
            star_name: star.to_string(),
            star_color: to_hex(star_color(star_temp)),
            star_temp,
            num_planets: planets.len(),
            planets,
        });
    }
    Err(AppError::NotFound("Star not found".to_string()))
}
