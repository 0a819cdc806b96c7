use super::resources::Resources;
use super::schema::{DataType, Schema};
use crate::error::{FilterError, FilterResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// How a stage refers to its component
///
/// A bare name (`download_images`) is a reusable component published as an
/// image; anything containing `/` (`components/resize_images`) is a local
/// component directory built from source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentRef {
    Reusable(String),
    Local(PathBuf),
}

impl ComponentRef {
    pub fn parse(reference: &str) -> FilterResult<Self> {
        let trimmed = reference.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(FilterError::InvalidReference(
                "component reference is empty".to_string(),
            ));
        }

        // `.` and `..` would leave the stage without a name
        let valid = |segment: &str| {
            !segment.is_empty()
                && !segment.chars().all(|c| c == '.')
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
        };

        if trimmed.contains('/') {
            if !trimmed.split('/').all(valid) {
                return Err(FilterError::InvalidReference(reference.to_string()));
            }
            Ok(ComponentRef::Local(PathBuf::from(trimmed)))
        } else if valid(trimmed) {
            Ok(ComponentRef::Reusable(trimmed.to_string()))
        } else {
            Err(FilterError::InvalidReference(reference.to_string()))
        }
    }

    /// Stage name derived from the reference (last path segment)
    pub fn name(&self) -> String {
        match self {
            ComponentRef::Reusable(name) => name.clone(),
            ComponentRef::Local(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, ComponentRef::Local(_))
    }
}

impl fmt::Display for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentRef::Reusable(name) => f.write_str(name),
            ComponentRef::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Declaration of a single stage: which component, with which parameters
///
/// # Example
/// ```
/// use datacomp_filter::pipeline::{ComponentOp, Resources};
///
/// let op = ComponentOp::new("embed_images")
///     .unwrap()
///     .argument("batch_size", 8)
///     .resources(Resources::gpu(1));
/// assert_eq!(op.name(), "embed_images");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentOp {
    reference: ComponentRef,
    name: String,

    /// Component arguments keyed by name
    pub arguments: BTreeMap<String, Value>,

    /// Component field name → dataset column name
    pub consumes: BTreeMap<String, String>,

    /// Columns declared by the caller (source stages)
    pub produces: Schema,

    pub resources: Option<Resources>,

    /// Whether the orchestrator may reuse cached output for this stage
    pub cache: bool,

    pub dependencies: Vec<String>,
}

impl ComponentOp {
    pub fn new(reference: &str) -> FilterResult<Self> {
        let reference = ComponentRef::parse(reference)?;
        let name = reference.name();
        Ok(Self {
            reference,
            name,
            arguments: BTreeMap::new(),
            consumes: BTreeMap::new(),
            produces: Schema::new(),
            resources: None,
            cache: true,
            dependencies: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reference(&self) -> &ComponentRef {
        &self.reference
    }

    pub fn argument(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    /// Read field `field` of the component from dataset column `column`
    pub fn consume(mut self, field: impl Into<String>, column: impl Into<String>) -> Self {
        self.consumes.insert(field.into(), column.into());
        self
    }

    pub fn produce(mut self, column: impl Into<String>, data_type: DataType) -> Self {
        self.produces.insert(column, data_type);
        self
    }

    pub fn produces(mut self, schema: Schema) -> Self {
        self.produces = schema;
        self
    }

    pub fn resources(mut self, resources: Resources) -> Self {
        self.resources = Some(resources);
        self
    }

    pub fn cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    pub fn depends_on(mut self, stage: impl Into<String>) -> Self {
        let stage = stage.into();
        if !self.dependencies.contains(&stage) {
            self.dependencies.push(stage);
        }
        self
    }

    /// Dataset column a component field reads from
    pub fn column_for<'a>(&'a self, field: &'a str) -> &'a str {
        self.consumes.get(field).map(|c| c.as_str()).unwrap_or(field)
    }

    pub fn requires_accelerator(&self) -> bool {
        self.resources
            .as_ref()
            .and_then(|r| r.accelerator())
            .is_some()
    }
}
