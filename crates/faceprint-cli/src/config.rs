use faceprint_core::{DetectionAttributes, QualityFilter, RecognitionParams};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_TABLE_ID: &str = "facialrecognition";
const MAX_FACES_LIMIT: u32 = 4096;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid {key} = {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Process configuration: optional TOML file named by `FACEPRINT_CONFIG`,
/// then `FACEPRINT_*` environment variables, then defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    /// Region override; the SDK provider chain decides when unset.
    pub aws_region: Option<String>,
    /// DynamoDB table holding face records.
    pub table_id: String,
    /// Rekognition collection faces are enrolled into.
    pub collection_id: String,
    pub max_faces: u32,
    /// Minimum similarity (percent) for a search match.
    pub similarity_threshold: f32,
    pub detection_attributes: DetectionAttributes,
    pub quality_filter: QualityFilter,
    /// Default the log filter to `debug` when `RUST_LOG` is unset.
    pub debug_mode: bool,
}

/// Keys accepted in the TOML file. Enum-valued keys stay strings so both
/// sources share one case-insensitive parser.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    aws_region: Option<String>,
    table_id: Option<String>,
    collection_id: Option<String>,
    max_faces: Option<u32>,
    similarity_threshold: Option<f32>,
    detection_attributes: Option<String>,
    quality_filter: Option<String>,
    debug_mode: Option<bool>,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration with `var` standing in for the environment.
    /// Empty values count as unset.
    pub fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        let file = match var("FACEPRINT_CONFIG") {
            Some(path) => load_file(Path::new(&path))?,
            None => FileConfig::default(),
        };

        let table_id = var("FACEPRINT_TABLE_ID")
            .or(file.table_id)
            .unwrap_or_else(|| DEFAULT_TABLE_ID.to_string());
        let collection_id = var("FACEPRINT_COLLECTION_ID")
            .or(file.collection_id)
            .unwrap_or_else(|| format!("{table_id}-collection"));

        let max_faces = match var("FACEPRINT_MAX_FACES") {
            Some(raw) => parse("max_faces", &raw)?,
            None => file.max_faces.unwrap_or(10),
        };
        let similarity_threshold = match var("FACEPRINT_SIMILARITY_THRESHOLD") {
            Some(raw) => parse("similarity_threshold", &raw)?,
            None => file.similarity_threshold.unwrap_or(10.0),
        };
        let detection_attributes = match var("FACEPRINT_DETECTION_ATTRIBUTES").or(file.detection_attributes) {
            Some(raw) => parse("detection_attributes", &raw)?,
            None => DetectionAttributes::default(),
        };
        let quality_filter = match var("FACEPRINT_QUALITY_FILTER").or(file.quality_filter) {
            Some(raw) => parse("quality_filter", &raw)?,
            None => QualityFilter::default(),
        };
        let debug_mode = match var("FACEPRINT_DEBUG_MODE") {
            Some(raw) => parse_flag(&raw)?,
            None => file.debug_mode.unwrap_or(false),
        };

        let config = Self {
            aws_region: var("FACEPRINT_AWS_REGION").or(file.aws_region),
            table_id,
            collection_id,
            max_faces,
            similarity_threshold,
            detection_attributes,
            quality_filter,
            debug_mode,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_FACES_LIMIT).contains(&self.max_faces) {
            return Err(ConfigError::Invalid {
                key: "max_faces",
                value: self.max_faces.to_string(),
                reason: format!("must be between 1 and {MAX_FACES_LIMIT}"),
            });
        }
        if !(0.0..=100.0).contains(&self.similarity_threshold) {
            return Err(ConfigError::Invalid {
                key: "similarity_threshold",
                value: self.similarity_threshold.to_string(),
                reason: "must be a percentage between 0 and 100".into(),
            });
        }
        Ok(())
    }

    pub fn recognition_params(&self) -> RecognitionParams {
        RecognitionParams {
            collection_id: self.collection_id.clone(),
            max_faces: self.max_faces,
            similarity_threshold: self.similarity_threshold,
            detection_attributes: self.detection_attributes,
            quality_filter: self.quality_filter,
        }
    }
}

fn load_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn parse<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn parse_flag(raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key: "debug_mode",
            value: raw.to_string(),
            reason: "expected true or false".into(),
        }),
    }
}
