use std::path::PathBuf;

use crate::trainer::SplitConfig;

pub const DEFAULT_MODEL_PATH: &str = "modelo_rendimiento.json";
pub const DEFAULT_DATA_PATH: &str = "estudiantes.csv";

/// Where the artifact and training data live, and how training splits.
#[derive(Debug, Clone)]
pub struct Settings {
    pub model_path: PathBuf,
    pub data_path: PathBuf,
    pub split: SplitConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            split: SplitConfig::default(),
        }
    }
}
