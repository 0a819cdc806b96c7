use crate::error::{FilterError, FilterResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Accelerator family a stage can request
///
/// Deserialisation accepts any casing (`"gpu"`, `"GPU"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum Accelerator {
    Gpu,
    Tpu,
}

impl FromStr for Accelerator {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GPU" => Ok(Accelerator::Gpu),
            "TPU" => Ok(Accelerator::Tpu),
            _ => Err(FilterError::UnsupportedAccelerator(s.to_string())),
        }
    }
}

impl TryFrom<String> for Accelerator {
    type Error = FilterError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Accelerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Accelerator::Gpu => f.write_str("GPU"),
            Accelerator::Tpu => f.write_str("TPU"),
        }
    }
}

/// Declarative resource request interpreted by the external scheduler
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accelerator_name: Option<Accelerator>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub accelerator_number: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_pool_label: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_pool_name: Option<String>,
}

impl Resources {
    /// Request `count` GPUs
    pub fn gpu(count: u32) -> Self {
        Self {
            accelerator_name: Some(Accelerator::Gpu),
            accelerator_number: Some(count),
            ..Self::default()
        }
    }

    pub fn node_pool(mut self, label: impl Into<String>, name: impl Into<String>) -> Self {
        self.node_pool_label = Some(label.into());
        self.node_pool_name = Some(name.into());
        self
    }

    /// The accelerator and count, when both are set
    pub fn accelerator(&self) -> Option<(Accelerator, u32)> {
        match (self.accelerator_name, self.accelerator_number) {
            (Some(name), Some(count)) => Some((name, count)),
            _ => None,
        }
    }

    pub fn validate(&self, stage: &str) -> FilterResult<()> {
        let invalid = |reason: &str| FilterError::InvalidResources {
            stage: stage.to_string(),
            reason: reason.to_string(),
        };

        match (self.accelerator_name, self.accelerator_number) {
            (Some(_), None) => return Err(invalid("accelerator_number is required with accelerator_name")),
            (None, Some(_)) => return Err(invalid("accelerator_name is required with accelerator_number")),
            (Some(_), Some(0)) => return Err(invalid("accelerator_number must be at least 1")),
            _ => {}
        }

        if self.node_pool_label.is_some() != self.node_pool_name.is_some() {
            return Err(invalid("node_pool_label and node_pool_name must be set together"));
        }

        Ok(())
    }
}
