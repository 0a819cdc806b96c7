//! Output of compilation: one compose service per stage.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::FilterResult;

/// Condition docker compose waits for before starting a dependant service
pub const COMPLETED_SUCCESSFULLY: &str = "service_completed_successfully";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposeSpec {
    pub name: String,
    pub version: String,
    pub services: BTreeMap<String, ComposeService>,
}

impl ComposeSpec {
    /// Write as pretty JSON, creating parent directories
    ///
    /// JSON is a subset of YAML, so the file is accepted by `docker compose -f`.
    pub fn write_to(&self, path: &Path) -> FilterResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> FilterResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposeService {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildContext>,

    pub command: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub depends_on: BTreeMap<String, DependsOn>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy: Option<Deploy>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl ComposeService {
    /// Value following `--<flag>` in the command, if present
    pub fn command_value(&self, flag: &str) -> Option<&str> {
        let flag = format!("--{}", flag);
        self.command
            .iter()
            .position(|c| *c == flag)
            .and_then(|i| self.command.get(i + 1))
            .map(|v| v.as_str())
    }

    pub fn gpu_count(&self) -> Option<u32> {
        self.deploy
            .as_ref()?
            .resources
            .as_ref()?
            .reservations
            .devices
            .iter()
            .find(|d| d.capabilities.iter().any(|c| c == "gpu"))
            .map(|d| d.count)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildContext {
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependsOn {
    pub condition: String,
}

impl DependsOn {
    pub fn completed() -> Self {
        Self {
            condition: COMPLETED_SUCCESSFULLY.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    #[serde(rename = "type")]
    pub kind: String,
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Deploy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<DeployResources>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<Placement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub constraints: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployResources {
    pub reservations: Reservations,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservations {
    pub devices: Vec<Device>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub driver: String,
    pub count: u32,
    pub capabilities: Vec<String>,
}

impl Deploy {
    pub fn nvidia_gpus(count: u32) -> Self {
        Self {
            resources: Some(DeployResources {
                reservations: Reservations {
                    devices: vec![Device {
                        driver: "nvidia".to_string(),
                        count,
                        capabilities: vec!["gpu".to_string()],
                    }],
                },
            }),
            placement: None,
        }
    }

    /// Only schedule on nodes whose `label` is `value`
    pub fn on_node_pool(mut self, label: &str, value: &str) -> Self {
        let constraint = format!("node.labels.{} == {}", label, value);
        self.placement
            .get_or_insert_with(|| Placement {
                constraints: Vec::new(),
            })
            .constraints
            .push(constraint);
        self
    }
}

/// A compiled stage, in execution order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledStage {
    pub name: String,
    pub cache_key: String,
    pub input_manifest_path: Option<String>,
    pub output_manifest_path: String,
    pub service: ComposeService,
}

/// Everything compilation produced for one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledPipeline {
    pub pipeline_name: String,
    pub description: String,
    pub run_id: String,
    pub base_path: String,
    pub linear: bool,
    pub stages: Vec<CompiledStage>,
}

impl CompiledPipeline {
    pub fn stage(&self, name: &str) -> Option<&CompiledStage> {
        self.stages.iter().find(|s| s.name == name)
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn to_compose(&self) -> ComposeSpec {
        let mut services = BTreeMap::new();
        for stage in &self.stages {
            services.insert(stage.name.clone(), stage.service.clone());
        }
        ComposeSpec {
            name: self.pipeline_name.clone(),
            version: "3.8".to_string(),
            services,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn service() -> ComposeService {
        ComposeService {
            image: Some("fndnt/embed_images:latest".to_string()),
            build: None,
            command: vec![
                "--cache".to_string(),
                "true".to_string(),
                "--batch_size".to_string(),
                "8".to_string(),
            ],
            depends_on: BTreeMap::new(),
            volumes: Vec::new(),
            deploy: Some(Deploy::nvidia_gpus(1)),
            labels: BTreeMap::new(),
        }
    }

    #[test]
    fn test_command_value() {
        let service = service();
        assert_eq!(service.command_value("batch_size"), Some("8"));
        assert_eq!(service.command_value("retries"), None);
        assert_eq!(service.gpu_count(), Some(1));
    }

    #[test]
    fn test_compose_serialization_shape() {
        let mut depends_on = BTreeMap::new();
        depends_on.insert("mask_images".to_string(), DependsOn::completed());
        let service = ComposeService {
            depends_on,
            ..service()
        };

        let json = serde_json::to_value(&service).unwrap();
        assert_eq!(
            json["depends_on"]["mask_images"]["condition"],
            "service_completed_successfully"
        );
        assert_eq!(
            json["deploy"]["resources"]["reservations"]["devices"][0]["driver"],
            "nvidia"
        );
        assert!(json.get("build").is_none());
        assert!(json.get("volumes").is_none());
    }

    #[test]
    fn test_node_pool_placement() {
        let deploy = Deploy::default().on_node_pool("pool", "a100");
        let json = serde_json::to_value(&deploy).unwrap();
        assert_eq!(
            json["placement"]["constraints"][0],
            "node.labels.pool == a100"
        );
        assert!(json.get("resources").is_none());

        let service = ComposeService {
            deploy: Some(deploy),
            ..service()
        };
        assert_eq!(service.gpu_count(), None);
    }

    #[test]
    fn test_write_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("compose.json");

        let mut services = BTreeMap::new();
        services.insert("embed_images".to_string(), service());
        let spec = ComposeSpec {
            name: "p".to_string(),
            version: "3.8".to_string(),
            services,
        };

        spec.write_to(&path).unwrap();
        let loaded = ComposeSpec::load(&path).unwrap();
        assert_eq!(loaded, spec);
    }
}
