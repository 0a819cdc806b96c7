use crate::datacomp::{
    BASE_PATH, DATASET_NAME, IMAGE_SIZE, N_ROWS_TO_LOAD, PIPELINE_DESCRIPTION, PIPELINE_NAME,
};
use crate::error::{FilterError, FilterResult};
use crate::pipeline::context::DEFAULT_COMPONENT_TAG;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parameters of the Datacomp filtering pipeline
///
/// Every field has a default, so a config file only needs the values it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatacompConfig {
    pub pipeline_name: String,
    pub description: String,

    /// Local directory or object-store URI for artifacts
    pub base_path: String,

    /// Hugging Face hub dataset to load
    pub dataset_name: String,

    /// Row cap for the load stage; `None` loads every row
    pub n_rows_to_load: Option<u64>,

    /// Images are resized to `image_size` x `image_size`
    pub image_size: u32,

    pub download_retries: u32,
    pub min_image_size: u32,

    pub detect_text_batch_size: u32,
    pub embed_batch_size: u32,

    /// GPUs requested by each accelerated stage
    pub gpus_per_stage: u32,

    /// Node label and value pinning accelerated stages to a pool
    pub node_pool_label: Option<String>,
    pub node_pool_name: Option<String>,

    /// Rows with a CLIP score below this are dropped
    pub clip_score_threshold: f64,

    /// Image tag for reusable components
    pub component_tag: String,
}

impl Default for DatacompConfig {
    fn default() -> Self {
        Self {
            pipeline_name: PIPELINE_NAME.to_string(),
            description: PIPELINE_DESCRIPTION.to_string(),
            base_path: BASE_PATH.to_string(),
            dataset_name: DATASET_NAME.to_string(),
            n_rows_to_load: N_ROWS_TO_LOAD,
            image_size: IMAGE_SIZE,
            download_retries: 2,
            min_image_size: 0,
            detect_text_batch_size: 8,
            embed_batch_size: 8,
            gpus_per_stage: 1,
            node_pool_label: None,
            node_pool_name: None,
            clip_score_threshold: 0.19,
            component_tag: DEFAULT_COMPONENT_TAG.to_string(),
        }
    }
}

impl DatacompConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn from_file(path: &Path) -> FilterResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            FilterError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|e| {
            FilterError::ConfigError(format!("invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> FilterResult<()> {
        let fail = |msg: String| Err(FilterError::ConfigError(msg));

        if self.dataset_name.trim().is_empty() {
            return fail("dataset_name cannot be empty".to_string());
        }
        if self.base_path.trim().is_empty() {
            return fail("base_path cannot be empty".to_string());
        }
        if self.n_rows_to_load == Some(0) {
            return fail("n_rows_to_load must be positive; omit it to load all rows".to_string());
        }
        if self.image_size == 0 {
            return fail("image_size must be positive".to_string());
        }
        if self.detect_text_batch_size == 0 || self.embed_batch_size == 0 {
            return fail("batch sizes must be positive".to_string());
        }
        if self.gpus_per_stage == 0 {
            return fail("gpus_per_stage must be at least 1".to_string());
        }
        if self.node_pool_label.is_some() != self.node_pool_name.is_some() {
            return fail("node_pool_label and node_pool_name must be set together".to_string());
        }
        if self.download_retries > 10 {
            return fail(format!(
                "download_retries must be at most 10, got {}",
                self.download_retries
            ));
        }
        if !(-1.0..=1.0).contains(&self.clip_score_threshold) {
            return fail(format!(
                "clip_score_threshold must be within [-1, 1], got {}",
                self.clip_score_threshold
            ));
        }
        if self.component_tag.trim().is_empty() {
            return fail("component_tag cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Command-line values layered over a loaded config
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub base_path: Option<String>,
    pub n_rows_to_load: Option<u64>,
    /// Wins over `n_rows_to_load`
    pub all_rows: bool,
    pub component_tag: Option<String>,
}

impl ConfigOverrides {
    /// Apply the overrides and validate the result
    pub fn apply(&self, mut config: DatacompConfig) -> FilterResult<DatacompConfig> {
        if let Some(base_path) = &self.base_path {
            config.base_path = base_path.clone();
        }
        if let Some(rows) = self.n_rows_to_load {
            config.n_rows_to_load = Some(rows);
        }
        if self.all_rows {
            config.n_rows_to_load = None;
        }
        if let Some(tag) = &self.component_tag {
            config.component_tag = tag.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

/// Builder for constructing validated `DatacompConfig` instances
///
/// # Example
/// ```
/// use datacomp_filter::config::DatacompConfigBuilder;
///
/// let config = DatacompConfigBuilder::new()
///     .base_path("/tmp/artifacts")
///     .all_rows()
///     .build()
///     .unwrap();
/// assert_eq!(config.n_rows_to_load, None);
/// ```
#[derive(Debug, Default)]
pub struct DatacompConfigBuilder {
    config: DatacompConfig,
}

impl DatacompConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: DatacompConfig) -> Self {
        Self { config }
    }

    pub fn pipeline_name(mut self, name: impl Into<String>) -> Self {
        self.config.pipeline_name = name.into();
        self
    }

    pub fn base_path(mut self, base_path: impl Into<String>) -> Self {
        self.config.base_path = base_path.into();
        self
    }

    pub fn dataset_name(mut self, dataset: impl Into<String>) -> Self {
        self.config.dataset_name = dataset.into();
        self
    }

    pub fn n_rows_to_load(mut self, rows: u64) -> Self {
        self.config.n_rows_to_load = Some(rows);
        self
    }

    pub fn all_rows(mut self) -> Self {
        self.config.n_rows_to_load = None;
        self
    }

    pub fn image_size(mut self, size: u32) -> Self {
        self.config.image_size = size;
        self
    }

    pub fn node_pool(mut self, label: impl Into<String>, name: impl Into<String>) -> Self {
        self.config.node_pool_label = Some(label.into());
        self.config.node_pool_name = Some(name.into());
        self
    }

    pub fn clip_score_threshold(mut self, threshold: f64) -> Self {
        self.config.clip_score_threshold = threshold;
        self
    }

    pub fn component_tag(mut self, tag: impl Into<String>) -> Self {
        self.config.component_tag = tag.into();
        self
    }

    /// Build the config
    ///
    /// # Errors
    /// Returns `FilterError::BuilderError` when a value is out of range
    pub fn build(self) -> FilterResult<DatacompConfig> {
        self.config
            .validate()
            .map_err(|e| FilterError::BuilderError(e.to_string()))?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = DatacompConfig::default();
        assert_eq!(config.pipeline_name, "datacomp-filtering-pipeline");
        assert_eq!(config.base_path, "./fondant-artifacts");
        assert_eq!(config.n_rows_to_load, Some(10));
        assert_eq!(config.image_size, 256);
        assert_eq!(config.download_retries, 2);
        assert_eq!(config.embed_batch_size, 8);
        assert_eq!(config.clip_score_threshold, 0.19);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"image_size": 128, "n_rows_to_load": null}}"#).unwrap();

        let config = DatacompConfig::from_file(file.path()).unwrap();
        assert_eq!(config.image_size, 128);
        assert_eq!(config.n_rows_to_load, None);
        assert_eq!(config.embed_batch_size, 8);
    }

    #[test]
    fn test_invalid_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            DatacompConfig::from_file(file.path()),
            Err(FilterError::ConfigError(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = DatacompConfig::from_file(Path::new("/nonexistent/config.json"));
        assert!(matches!(result, Err(FilterError::ConfigError(_))));
    }

    #[test]
    fn test_validate_ranges() {
        let mut config = DatacompConfig::default();
        config.clip_score_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = DatacompConfig::default();
        config.image_size = 0;
        assert!(config.validate().is_err());

        let mut config = DatacompConfig::default();
        config.n_rows_to_load = Some(0);
        assert!(config.validate().is_err());

        let mut config = DatacompConfig::default();
        config.download_retries = 11;
        assert!(config.validate().is_err());

        let mut config = DatacompConfig::default();
        config.node_pool_label = Some("pool".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"base_path": "gs://bucket/from-file", "n_rows_to_load": 50, "image_size": 128}}"#
        )
        .unwrap();
        let config = DatacompConfig::from_file(file.path()).unwrap();

        let overrides = ConfigOverrides {
            base_path: Some("/tmp/from-cli".to_string()),
            n_rows_to_load: Some(5),
            component_tag: Some("0.12.0".to_string()),
            ..ConfigOverrides::default()
        };
        let config = overrides.apply(config).unwrap();

        assert_eq!(config.base_path, "/tmp/from-cli");
        assert_eq!(config.n_rows_to_load, Some(5));
        assert_eq!(config.component_tag, "0.12.0");
        // Untouched fields keep the file's values
        assert_eq!(config.image_size, 128);
    }

    #[test]
    fn test_all_rows_override() {
        let overrides = ConfigOverrides {
            n_rows_to_load: Some(5),
            all_rows: true,
            ..ConfigOverrides::default()
        };
        let config = overrides.apply(DatacompConfig::default()).unwrap();
        assert_eq!(config.n_rows_to_load, None);
    }

    #[test]
    fn test_empty_overrides_keep_config() {
        let config = ConfigOverrides::default()
            .apply(DatacompConfig::default())
            .unwrap();
        assert_eq!(config, DatacompConfig::default());
    }

    #[test]
    fn test_overrides_are_validated() {
        let overrides = ConfigOverrides {
            n_rows_to_load: Some(0),
            ..ConfigOverrides::default()
        };
        assert!(matches!(
            overrides.apply(DatacompConfig::default()),
            Err(FilterError::ConfigError(_))
        ));
    }

    #[test]
    fn test_builder() {
        let config = DatacompConfigBuilder::new()
            .base_path("gs://bucket/datacomp")
            .n_rows_to_load(1000)
            .image_size(224)
            .build()
            .unwrap();

        assert_eq!(config.base_path, "gs://bucket/datacomp");
        assert_eq!(config.n_rows_to_load, Some(1000));
        assert_eq!(config.image_size, 224);
    }

    #[test]
    fn test_builder_rejects_invalid() {
        let result = DatacompConfigBuilder::new()
            .clip_score_threshold(-2.0)
            .build();
        assert!(matches!(result, Err(FilterError::BuilderError(_))));
    }
}
