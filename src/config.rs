// ⚙️ Configuration - paths, server address, extra vocabulary
// Loaded from TOML; every field has a default so an empty file is valid.

use crate::vocabulary::MetricVocabulary;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Env var the server binary reads the config path from
pub const CONFIG_ENV_VAR: &str = "RATIO_DESK_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Raw financial table (CSV)
    pub input_path: PathBuf,

    /// Ratio-augmented export (CSV)
    pub output_csv: PathBuf,

    /// SQLite export
    pub database_path: PathBuf,

    pub server_addr: String,

    /// Company names the recognizer should know beyond those in the data
    pub extra_companies: Vec<String>,

    /// Additional phrase → canonical metric synonyms
    pub synonyms: BTreeMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            input_path: PathBuf::from("financial_data.csv"),
            output_csv: PathBuf::from("financials_with_ratios.csv"),
            database_path: PathBuf::from("financials.db"),
            server_addr: "0.0.0.0:3000".to_string(),
            extra_companies: Vec::new(),
            synonyms: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        toml::from_str(&content).context("Failed to parse config TOML")
    }

    /// Config file if given, defaults otherwise
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    /// Default vocabulary plus configured synonyms
    pub fn vocabulary(&self) -> MetricVocabulary {
        self.synonyms
            .iter()
            .fold(MetricVocabulary::new(), |v, (phrase, canonical)| {
                v.with_synonym(phrase, canonical.clone())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_file_gives_defaults() {
        let cfg: AppConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_from_file_with_synonyms() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
input_path = "data/fy.csv"
extra_companies = ["Google"]

[synonyms]
"Margin" = "Net Profit Margin (%)"
"#
        )
        .unwrap();

        let cfg = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(cfg.input_path, PathBuf::from("data/fy.csv"));
        assert_eq!(cfg.output_csv, PathBuf::from("financials_with_ratios.csv"));
        assert_eq!(cfg.extra_companies, vec!["Google".to_string()]);

        let vocab = cfg.vocabulary();
        assert_eq!(vocab.canonical("margin"), Some("Net Profit Margin (%)"));
        assert_eq!(vocab.canonical("profit"), Some("Net Income"));
    }

    #[test]
    fn test_missing_file_is_error() {
        let err = AppConfig::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
