//! Server configuration: built-in defaults, an optional JSON file named by
//! `EXOVIZ_CONFIG`, then `EXOVIZ_*` environment overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::data::aggregate::MAX_STARS_DEFAULT;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    /// Where uploaded CSV files are saved.
    pub upload_dir: PathBuf,
    /// Dataset registered as `default` at startup (CSV or Parquet).
    pub default_dataset_file: PathBuf,
    /// XGBoost JSON model used by the predict endpoint.
    pub model_path: PathBuf,
    /// Browser client assets.
    pub static_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub max_stars_default: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5000".to_string(),
            upload_dir: PathBuf::from("uploads"),
            default_dataset_file: PathBuf::from("uploads/default.csv"),
            model_path: PathBuf::from("xgb_fullds.json"),
            static_dir: PathBuf::from("static"),
            max_upload_bytes: 16 * 1024 * 1024,
            max_stars_default: MAX_STARS_DEFAULT,
        }
    }
}

impl ServerConfig {
    /// Resolve the configuration from the process environment.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve the configuration with `lookup` standing in for the environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match lookup("EXOVIZ_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };

        if let Some(v) = lookup("EXOVIZ_BIND") {
            config.bind_addr = v;
        }
        if let Some(v) = lookup("EXOVIZ_UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("EXOVIZ_DEFAULT_DATASET") {
            config.default_dataset_file = PathBuf::from(v);
        }
        if let Some(v) = lookup("EXOVIZ_MODEL") {
            config.model_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("EXOVIZ_STATIC_DIR") {
            config.static_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("EXOVIZ_MAX_STARS") {
            config.max_stars_default = v
                .trim()
                .parse()
                .with_context(|| format!("EXOVIZ_MAX_STARS: '{v}' is not a count"))?;
        }
        Ok(config)
    }

    /// Read a JSON config file; absent keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.max_stars_default, 1000);
        assert_eq!(config.max_upload_bytes, 16 * 1024 * 1024);
    }

    #[test]
    fn environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exoviz.json");
        std::fs::write(&path, r#"{ "bind_addr": "0.0.0.0:8080", "max_stars_default": 50 }"#)
            .unwrap();

        let config = ServerConfig::from_lookup(lookup(&[
            ("EXOVIZ_CONFIG", path.to_str().unwrap()),
            ("EXOVIZ_MAX_STARS", "75"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.max_stars_default, 75);
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
    }

    #[test]
    fn invalid_values_are_startup_errors() {
        assert!(ServerConfig::from_lookup(lookup(&[("EXOVIZ_MAX_STARS", "lots")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("EXOVIZ_CONFIG", "/no/such/file.json")])).is_err());
    }
}
