//! Pipeline configuration file support.
//!
//! Configuration is an explicit value handed to each component. It is read
//! from a TOML file whose sections mirror the desktop application's settings;
//! every key is optional and falls back to its default.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::{PipelineError, PipelineResult};

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub processing: ProcessingSettings,
    #[serde(default)]
    pub data_validation: DataValidationSettings,
    #[serde(default)]
    pub advanced: AdvancedSettings,
    #[serde(default)]
    pub export: ExportSettings,
}

/// Input handling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingSettings {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// `auto`, `utf-8` or `cp1252`
    #[serde(default = "default_encoding_detection")]
    pub encoding_detection: String,
}

/// Validation and quality-control settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataValidationSettings {
    #[serde(default = "default_true")]
    pub strict_column_checking: bool,
    #[serde(default)]
    pub allow_missing_coordinates: bool,
    #[serde(default = "default_min_pole_number_length")]
    pub min_pole_number_length: usize,
    #[serde(default = "default_true")]
    pub validate_agent_email_format: bool,
    #[serde(default)]
    pub duplicate_detection_method: DuplicatePolicy,
    #[serde(default)]
    pub quality_control_level: QualityControlLevel,
}

/// Execution engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedSettings {
    #[serde(default = "default_true")]
    pub memory_optimization: bool,
    #[serde(default = "default_true")]
    pub parallel_processing: bool,
    #[serde(default = "default_max_worker_threads")]
    pub max_worker_threads: usize,
    #[serde(default = "default_true")]
    pub temp_file_cleanup: bool,
    #[serde(default)]
    pub debug_mode: bool,
}

/// Which optional sheets end up in the sheet mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSettings {
    #[serde(default = "default_true")]
    pub include_summary_sheet: bool,
    #[serde(default = "default_true")]
    pub include_qc_sheets: bool,
}

/// Duplicate resolution policy. Only `EarliestDate` changes behavior today.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    #[default]
    EarliestDate,
    LatestDate,
    ManualReview,
}

impl DuplicatePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicatePolicy::EarliestDate => "earliest_date",
            DuplicatePolicy::LatestDate => "latest_date",
            DuplicatePolicy::ManualReview => "manual_review",
        }
    }

    pub fn is_implemented(&self) -> bool {
        matches!(self, DuplicatePolicy::EarliestDate)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityControlLevel {
    Minimal,
    #[default]
    Standard,
    Strict,
}

impl QualityControlLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityControlLevel::Minimal => "minimal",
            QualityControlLevel::Standard => "standard",
            QualityControlLevel::Strict => "strict",
        }
    }
}

/// Encoding preference parsed from `processing.encoding_detection`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingPreference {
    Auto,
    Utf8,
    Cp1252,
}

impl FromStr for EncodingPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "auto" => Ok(EncodingPreference::Auto),
            "utf-8" | "utf8" => Ok(EncodingPreference::Utf8),
            "cp1252" | "windows-1252" => Ok(EncodingPreference::Cp1252),
            other => Err(format!(
                "Unknown encoding_detection: {}. Use 'auto', 'utf-8' or 'cp1252'",
                other
            )),
        }
    }
}

fn default_chunk_size() -> usize {
    10_000
}

fn default_encoding_detection() -> String {
    "auto".to_string()
}

fn default_min_pole_number_length() -> usize {
    1
}

fn default_max_worker_threads() -> usize {
    4
}

fn default_true() -> bool {
    true
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            encoding_detection: default_encoding_detection(),
        }
    }
}

impl Default for DataValidationSettings {
    fn default() -> Self {
        Self {
            strict_column_checking: true,
            allow_missing_coordinates: false,
            min_pole_number_length: default_min_pole_number_length(),
            validate_agent_email_format: true,
            duplicate_detection_method: DuplicatePolicy::default(),
            quality_control_level: QualityControlLevel::default(),
        }
    }
}

impl Default for AdvancedSettings {
    fn default() -> Self {
        Self {
            memory_optimization: true,
            parallel_processing: true,
            max_worker_threads: default_max_worker_threads(),
            temp_file_cleanup: true,
            debug_mode: false,
        }
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            include_summary_sheet: true,
            include_qc_sheets: true,
        }
    }
}

/// Problems found by [`PipelineConfig::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigIssues {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl PipelineConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> PipelineResult<Self> {
        toml::from_str(content)
            .map_err(|e| PipelineError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn encoding_preference(&self) -> PipelineResult<EncodingPreference> {
        self.processing
            .encoding_detection
            .parse()
            .map_err(PipelineError::Config)
    }

    /// Check the configuration for values the engine cannot run with
    /// (errors) or that will run poorly (warnings).
    pub fn validate(&self) -> ConfigIssues {
        let mut issues = ConfigIssues::default();

        if self.processing.chunk_size == 0 {
            issues
                .errors
                .push("Chunk size must be greater than 0".to_string());
        } else if self.processing.chunk_size < 1000 {
            issues
                .warnings
                .push("Chunk size should be at least 1000 for optimal performance".to_string());
        }

        if self.advanced.max_worker_threads == 0 {
            issues
                .errors
                .push("max_worker_threads must be greater than 0".to_string());
        }

        if let Err(e) = self.encoding_preference() {
            issues.errors.push(e.to_string());
        }

        if !self.data_validation.duplicate_detection_method.is_implemented() {
            issues.warnings.push(format!(
                "Duplicate detection method '{}' is not implemented; 'earliest_date' will be used",
                self.data_validation.duplicate_detection_method.as_str()
            ));
        }

        issues
    }

    /// Fail on configuration errors, log warnings.
    pub fn ensure_valid(&self) -> PipelineResult<()> {
        let issues = self.validate();
        for warning in &issues.warnings {
            log::warn!("Configuration: {}", warning);
        }
        if issues.errors.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::Config(issues.errors.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_desktop_settings() {
        let config = PipelineConfig::default();
        assert_eq!(config.processing.chunk_size, 10_000);
        assert_eq!(config.advanced.max_worker_threads, 4);
        assert!(config.advanced.temp_file_cleanup);
        assert!(config.data_validation.strict_column_checking);
        assert_eq!(
            config.data_validation.duplicate_detection_method,
            DuplicatePolicy::EarliestDate
        );
        assert!(config.validate().errors.is_empty());
        assert!(config.validate().warnings.is_empty());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [processing]
            chunk_size = 2500

            [data_validation]
            duplicate_detection_method = "manual_review"
            quality_control_level = "strict"
            "#,
        )
        .unwrap();

        assert_eq!(config.processing.chunk_size, 2500);
        assert_eq!(config.processing.encoding_detection, "auto");
        assert_eq!(config.advanced.max_worker_threads, 4);
        assert_eq!(
            config.data_validation.duplicate_detection_method,
            DuplicatePolicy::ManualReview
        );
        assert_eq!(
            config.data_validation.quality_control_level,
            QualityControlLevel::Strict
        );
        assert_eq!(config.validate().warnings.len(), 1);
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let mut config = PipelineConfig::default();
        config.processing.chunk_size = 0;
        config.advanced.max_worker_threads = 0;
        config.processing.encoding_detection = "latin-9".to_string();

        let issues = config.validate();
        assert_eq!(issues.errors.len(), 3);
        assert!(config.ensure_valid().is_err());
    }

    #[test]
    fn test_small_chunk_size_is_a_warning() {
        let mut config = PipelineConfig::default();
        config.processing.chunk_size = 500;
        let issues = config.validate();
        assert!(issues.errors.is_empty());
        assert_eq!(issues.warnings.len(), 1);
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = PipelineConfig::from_toml_str("[processing\nchunk_size = ").unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_encoding_preference_parsing() {
        assert_eq!("auto".parse(), Ok(EncodingPreference::Auto));
        assert_eq!("UTF-8".parse(), Ok(EncodingPreference::Utf8));
        assert_eq!("cp1252".parse(), Ok(EncodingPreference::Cp1252));
        assert!("ebcdic".parse::<EncodingPreference>().is_err());
    }
}
