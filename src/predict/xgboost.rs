//! Evaluator for gradient-boosted tree models saved in XGBoost's JSON format.
//!
//! Supported: `gbtree` boosters with numerical splits and a logistic
//! objective (`binary:logistic`, `reg:logistic`). Evaluation is done in
//! single precision.

use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;

use super::{Classifier, ClassifierError, FeatureMatrix};

// ---------------------------------------------------------------------------
// On-disk schema (only the fields the evaluator needs)
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ModelFile {
    learner: Learner,
}

#[derive(Deserialize)]
struct Learner {
    #[serde(default)]
    feature_names: Vec<String>,
    gradient_booster: GradientBooster,
    learner_model_param: LearnerModelParam,
    objective: Objective,
}

#[derive(Deserialize)]
struct GradientBooster {
    name: String,
    model: Option<TreeEnsemble>,
}

#[derive(Deserialize)]
struct TreeEnsemble {
    trees: Vec<RawTree>,
}

#[derive(Deserialize)]
struct RawTree {
    left_children: Vec<i32>,
    right_children: Vec<i32>,
    split_indices: Vec<i64>,
    split_conditions: Vec<f32>,
    default_left: Vec<Flag>,
    #[serde(default)]
    split_type: Vec<u8>,
}

/// Older models store `default_left` as booleans, newer ones as 0/1.
#[derive(Deserialize, Clone, Copy)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
}

impl Flag {
    fn is_set(self) -> bool {
        match self {
            Flag::Bool(b) => b,
            Flag::Int(i) => i != 0,
        }
    }
}

#[derive(Deserialize)]
struct LearnerModelParam {
    base_score: String,
    #[serde(default)]
    num_class: Option<String>,
}

#[derive(Deserialize)]
struct Objective {
    name: String,
}

// ---------------------------------------------------------------------------
// Evaluated model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Node {
    /// `-1` marks a leaf.
    left: i32,
    right: i32,
    feature: usize,
    /// Split threshold, or the leaf value for leaves.
    value: f32,
    default_left: bool,
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn from_raw(raw: RawTree, index: usize) -> Result<Self, ClassifierError> {
        let n = raw.left_children.len();
        if [
            raw.right_children.len(),
            raw.split_indices.len(),
            raw.split_conditions.len(),
            raw.default_left.len(),
        ]
        .iter()
        .any(|&len| len != n)
            || n == 0
        {
            return Err(ClassifierError::Model(format!("tree {index}: inconsistent node arrays")));
        }
        if raw.split_type.iter().any(|&t| t != 0) {
            return Err(ClassifierError::Model(format!(
                "tree {index}: categorical splits are not supported"
            )));
        }

        let mut nodes = Vec::with_capacity(n);
        for i in 0..n {
            let (left, right) = (raw.left_children[i], raw.right_children[i]);
            if left >= 0 {
                let in_range = |c: i32| (c as usize) > i && (c as usize) < n;
                if right < 0 || !in_range(left) || !in_range(right) {
                    return Err(ClassifierError::Model(format!(
                        "tree {index}: node {i} has invalid children"
                    )));
                }
            }
            let feature = usize::try_from(raw.split_indices[i]).map_err(|_| {
                ClassifierError::Model(format!("tree {index}: node {i} has a negative feature index"))
            })?;
            nodes.push(Node {
                left,
                right,
                feature,
                value: raw.split_conditions[i],
                default_left: raw.default_left[i].is_set(),
            });
        }
        Ok(Tree { nodes })
    }

    fn leaf_value(&self, row: &[f64]) -> Result<f32, ClassifierError> {
        let mut idx = 0usize;
        loop {
            let node = &self.nodes[idx];
            if node.left < 0 {
                return Ok(node.value);
            }
            let x = *row.get(node.feature).ok_or_else(|| {
                ClassifierError::Model(format!(
                    "model uses feature {} but only {} were supplied",
                    node.feature,
                    row.len()
                ))
            })?;
            let go_left = if x.is_nan() {
                node.default_left
            } else {
                (x as f32) < node.value
            };
            let next = if go_left { node.left } else { node.right };
            idx = next as usize;
        }
    }
}

/// A loaded tree ensemble with a logistic link.
#[derive(Debug, Clone)]
pub struct XgbModel {
    trees: Vec<Tree>,
    base_margin: f32,
    feature_names: Vec<String>,
}

impl XgbModel {
    pub fn from_json_str(text: &str) -> Result<Self, ClassifierError> {
        let file: ModelFile = serde_json::from_str(text)?;
        let learner = file.learner;

        match learner.objective.name.as_str() {
            "binary:logistic" | "reg:logistic" => {}
            other => {
                return Err(ClassifierError::Model(format!("unsupported objective '{other}'")));
            }
        }
        if learner.gradient_booster.name != "gbtree" {
            return Err(ClassifierError::Model(format!(
                "unsupported booster '{}'",
                learner.gradient_booster.name
            )));
        }
        if let Some(num_class) = &learner.learner_model_param.num_class {
            if num_class.trim().parse::<f64>().map_or(true, |n| n > 1.0) {
                return Err(ClassifierError::Model("multi-class models are not supported".into()));
            }
        }

        let base_score = parse_base_score(&learner.learner_model_param.base_score)?;
        if !(base_score > 0.0 && base_score < 1.0) {
            return Err(ClassifierError::Model(format!("base_score {base_score} outside (0, 1)")));
        }
        let base_margin = -(1.0 / base_score - 1.0).ln();

        let trees = learner
            .gradient_booster
            .model
            .ok_or_else(|| ClassifierError::Model("booster has no trees".into()))?
            .trees
            .into_iter()
            .enumerate()
            .map(|(i, raw)| Tree::from_raw(raw, i))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(XgbModel {
            trees,
            base_margin,
            feature_names: learner.feature_names,
        })
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ClassifierError> {
        let text = std::fs::read_to_string(path)?;
        let model = Self::from_json_str(&text)?;
        debug!("loaded {} trees from {}", model.trees.len(), path.display());
        Ok(model)
    }

    fn probability(&self, row: &[f64]) -> Result<f64, ClassifierError> {
        let mut margin = self.base_margin;
        for tree in &self.trees {
            margin += tree.leaf_value(row)?;
        }
        Ok(f64::from(1.0 / (1.0 + (-margin).exp())))
    }
}

/// `"5E-1"` or, from newer writers, `"[5E-1]"`.
fn parse_base_score(raw: &str) -> Result<f32, ClassifierError> {
    raw.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim()
        .parse::<f32>()
        .map_err(|_| ClassifierError::Model(format!("invalid base_score '{raw}'")))
}

impl Classifier for XgbModel {
    fn predict_proba(&self, features: &FeatureMatrix) -> Result<Vec<f64>, ClassifierError> {
        if !self.feature_names.is_empty() && self.feature_names != features.names {
            return Err(ClassifierError::Model(format!(
                "feature_names mismatch: model expects [{}], got [{}]",
                self.feature_names.join(", "),
                features.names.join(", ")
            )));
        }
        features.rows.iter().map(|row| self.probability(row)).collect()
    }
}

/// Loads the model file on every call so a replaced model is picked up
/// without a restart.
#[derive(Debug, Clone)]
pub struct XgbFileClassifier {
    path: PathBuf,
}

impl XgbFileClassifier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        XgbFileClassifier { path: path.into() }
    }
}

impl Classifier for XgbFileClassifier {
    fn predict_proba(&self, features: &FeatureMatrix) -> Result<Vec<f64>, ClassifierError> {
        XgbModel::from_json_file(&self.path)?.predict_proba(features)
    }
}
