//! Prediction annotation: run a classifier over a dataset and store one
//! probability per planet in the `prediction` column.
//!
//! ```text
//!   registry snapshot ──► FeatureMatrix ──► Classifier ──► Vec<f64>
//!                                                            │
//!                           registry  ◄── table + prediction ┘
//! ```

pub mod xgboost;

use log::info;
use serde::Serialize;
use thiserror::Error;

use crate::data::model::{CellValue, ColumnKind, PlanetTable};
use crate::data::normalize::PREDICTION;
use crate::error::AppError;
use crate::registry::DatasetRegistry;

pub use xgboost::{XgbFileClassifier, XgbModel};

/// Feature columns fed to the classifier, in model order.
pub const CLASSIFICATION_FEATURES: [&str; 12] = [
    "right_ascens",
    "declination",
    "period",
    "trans_duration",
    "trans_depth",
    "planet_radius",
    "planet_insolation",
    "planet_temp",
    "stellar_temp",
    "stellar_logg",
    "stellar_radius",
    "stellar_mass",
];

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("missing feature columns: {}", .0.join(", "))]
    MissingFeatures(Vec<String>),

    #[error("feature column '{0}' is not numeric")]
    NonNumericFeature(String),

    #[error("model format error: {0}")]
    Model(String),

    #[error("classifier returned {got} probabilities for {expected} rows")]
    LengthMismatch { expected: usize, got: usize },

    #[error("no rows to predict")]
    EmptyInput,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ClassifierError> for AppError {
    fn from(err: ClassifierError) -> Self {
        AppError::Classifier(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Classifier seam
// ---------------------------------------------------------------------------

/// Row-major numeric features; missing cells are `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub names: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    /// Project `table` onto `features`, in that order.
    pub fn project(table: &PlanetTable, features: &[&str]) -> Result<Self, ClassifierError> {
        let missing: Vec<String> = features
            .iter()
            .filter(|f| !table.has_column(f))
            .map(|f| f.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ClassifierError::MissingFeatures(missing));
        }
        if let Some(text) = features
            .iter()
            .find(|f| table.column_kind(f) == Some(ColumnKind::Text))
        {
            return Err(ClassifierError::NonNumericFeature(text.to_string()));
        }

        let rows = table
            .rows
            .iter()
            .map(|row| {
                features
                    .iter()
                    .map(|f| row.get_f64(f).unwrap_or(f64::NAN))
                    .collect()
            })
            .collect();
        Ok(FeatureMatrix {
            names: features.iter().map(|f| f.to_string()).collect(),
            rows,
        })
    }
}

/// A binary classifier producing the positive-class probability per row.
pub trait Classifier: Send + Sync {
    fn predict_proba(&self, features: &FeatureMatrix) -> Result<Vec<f64>, ClassifierError>;
}

// ---------------------------------------------------------------------------
// Annotation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionStats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl PredictionStats {
    /// Mean, population standard deviation, min and max.
    pub fn from_probabilities(probs: &[f64]) -> Result<Self, ClassifierError> {
        if probs.is_empty() {
            return Err(ClassifierError::EmptyInput);
        }
        let n = probs.len() as f64;
        let mean = probs.iter().sum::<f64>() / n;
        let var = probs.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
        Ok(PredictionStats {
            mean,
            std: var.sqrt(),
            min: probs.iter().copied().fold(f64::INFINITY, f64::min),
            max: probs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionReport {
    pub predictions: Vec<f64>,
    pub stats: PredictionStats,
}

/// Classify every planet of dataset `name` and store the probabilities in
/// its `prediction` column.
///
/// The column is written only when the classifier succeeds for every row;
/// on any failure the stored table is left as it was.
pub fn annotate_predictions(
    registry: &DatasetRegistry,
    name: &str,
    features: &[&str],
    classifier: &dyn Classifier,
) -> Result<PredictionReport, AppError> {
    registry.update(name, |table| {
        let matrix = FeatureMatrix::project(table, features)?;
        let predictions = classifier.predict_proba(&matrix)?;
        if predictions.len() != table.len() {
            return Err(ClassifierError::LengthMismatch {
                expected: table.len(),
                got: predictions.len(),
            }
            .into());
        }
        let stats = PredictionStats::from_probabilities(&predictions)?;

        let mut annotated = table.clone();
        annotated.set_column(
            PREDICTION,
            predictions.iter().copied().map(CellValue::Float).collect(),
        );
        info!(
            "annotated '{name}': {} predictions, mean {:.4}, max {:.4}",
            predictions.len(),
            stats.mean,
            stats.max
        );
        Ok((annotated, PredictionReport { predictions, stats }))
    })
}
