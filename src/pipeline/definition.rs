use super::component::ComponentOp;
use crate::base_path::BasePath;
use crate::error::{FilterError, FilterResult};
use serde::Serialize;
use tracing::debug;

/// Reference to a declared stage, returned by `read` and `apply`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StageHandle(String);

impl StageHandle {
    pub fn name(&self) -> &str {
        &self.0
    }
}

/// Declared pipeline: identity, artifact location and stages
///
/// # Example
/// ```
/// use datacomp_filter::base_path::BasePath;
/// use datacomp_filter::pipeline::{ComponentOp, DataType, Pipeline};
///
/// let mut pipeline = Pipeline::new(
///     "my-pipeline",
///     "Example",
///     BasePath::parse("gs://bucket/artifacts").unwrap(),
/// )
/// .unwrap();
///
/// let source = pipeline
///     .read(
///         ComponentOp::new("load_from_hf_hub")
///             .unwrap()
///             .argument("dataset_name", "org/dataset")
///             .produce("url", DataType::String),
///     )
///     .unwrap();
/// let images = pipeline
///     .apply(&source, ComponentOp::new("download_images").unwrap().consume("image_url", "url"))
///     .unwrap();
///
/// assert_eq!(images.name(), "download_images");
/// assert_eq!(pipeline.stage_names(), vec!["load_from_hf_hub", "download_images"]);
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Pipeline {
    name: String,
    description: String,
    base_path: BasePath,
    ops: Vec<ComponentOp>,
}

impl Pipeline {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        base_path: BasePath,
    ) -> FilterResult<Self> {
        let name = name.into();
        validate_name(&name)?;

        Ok(Self {
            name,
            description: description.into(),
            base_path,
            ops: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn base_path(&self) -> &BasePath {
        &self.base_path
    }

    pub fn ops(&self) -> &[ComponentOp] {
        &self.ops
    }

    pub fn op(&self, name: &str) -> Option<&ComponentOp> {
        self.ops.iter().find(|op| op.name() == name)
    }

    pub fn stage_count(&self) -> usize {
        self.ops.len()
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.ops.iter().map(|op| op.name()).collect()
    }

    /// Register a source stage that creates the dataset
    pub fn read(&mut self, op: ComponentOp) -> FilterResult<StageHandle> {
        if !op.dependencies.is_empty() {
            return Err(FilterError::InvalidOperation {
                stage: op.name().to_string(),
                reason: "a read stage cannot have dependencies".to_string(),
            });
        }
        if op.produces.is_empty() {
            return Err(FilterError::InvalidOperation {
                stage: op.name().to_string(),
                reason: "a read stage must declare the columns it produces".to_string(),
            });
        }
        self.push(op)
    }

    /// Register a stage that runs on the output of `input`
    pub fn apply(&mut self, input: &StageHandle, op: ComponentOp) -> FilterResult<StageHandle> {
        if self.op(input.name()).is_none() {
            return Err(FilterError::StageNotFound(input.name().to_string()));
        }
        self.push(op.depends_on(input.name()))
    }

    /// Register a stage with whatever dependencies it already declares
    pub fn add_op(&mut self, op: ComponentOp) -> FilterResult<StageHandle> {
        self.push(op)
    }

    fn push(&mut self, op: ComponentOp) -> FilterResult<StageHandle> {
        if self.op(op.name()).is_some() {
            return Err(FilterError::DuplicateStage(op.name().to_string()));
        }

        debug!(
            target: "pipeline",
            "Declared stage '{}' ({}) after {:?}",
            op.name(),
            op.reference(),
            op.dependencies
        );

        let handle = StageHandle(op.name().to_string());
        self.ops.push(op);
        Ok(handle)
    }
}

fn validate_name(name: &str) -> FilterResult<()> {
    if name.is_empty() {
        return Err(FilterError::InvalidPipelineName(
            "name cannot be empty".to_string(),
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err(FilterError::InvalidPipelineName(format!(
            "'{}' may only contain lowercase letters, digits, '-' and '_'",
            name
        )));
    }
    Ok(())
}
