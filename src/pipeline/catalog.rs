//! Interface contracts of the components the pipeline references.
//!
//! The components themselves are container images maintained elsewhere. The
//! catalog only records what each one reads, writes and accepts, so a
//! pipeline can be checked before anything is scheduled.

use super::schema::{DataType, Schema};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Role of a component in the dataflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    /// Creates the dataset; consumes nothing
    Read,
    /// Adds or rewrites columns
    Transform,
    /// Drops rows; the schema passes through unchanged
    Filter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgumentType {
    Str,
    Int,
    Float,
    Bool,
    List,
    Dict,
}

impl ArgumentType {
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ArgumentType::Str => value.is_string(),
            ArgumentType::Int => value.is_i64() || value.is_u64(),
            ArgumentType::Float => value.is_number(),
            ArgumentType::Bool => value.is_boolean(),
            ArgumentType::List => value.is_array(),
            ArgumentType::Dict => value.is_object(),
        }
    }

    /// Name of the JSON kind of `value`, for error messages
    pub fn describe(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(n) if n.is_f64() => "float",
            Value::Number(_) => "int",
            Value::String(_) => "str",
            Value::Array(_) => "list",
            Value::Object(_) => "dict",
        }
    }
}

impl fmt::Display for ArgumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArgumentType::Str => "str",
            ArgumentType::Int => "int",
            ArgumentType::Float => "float",
            ArgumentType::Bool => "bool",
            ArgumentType::List => "list",
            ArgumentType::Dict => "dict",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArgumentSpec {
    pub kind: ArgumentType,
    /// `None` means no default: the caller must supply the argument unless
    /// it is optional
    pub default: Option<Value>,
    pub optional: bool,
    pub description: &'static str,
}

impl ArgumentSpec {
    pub fn required(kind: ArgumentType, description: &'static str) -> Self {
        Self {
            kind,
            default: None,
            optional: false,
            description,
        }
    }

    pub fn with_default(kind: ArgumentType, default: Value, description: &'static str) -> Self {
        Self {
            kind,
            default: Some(default),
            optional: false,
            description,
        }
    }

    pub fn optional(kind: ArgumentType, description: &'static str) -> Self {
        Self {
            kind,
            default: None,
            optional: true,
            description,
        }
    }
}

/// What a component writes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Produces {
    Fixed(Schema),
    /// Columns are declared by the stage (`ComponentOp::produces`)
    Declared,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentSpec {
    pub name: String,
    pub description: &'static str,
    pub kind: ComponentKind,
    /// Image name without tag
    pub image: String,
    pub consumes: Schema,
    pub produces: Produces,
    pub arguments: BTreeMap<String, ArgumentSpec>,
}

impl ComponentSpec {
    pub fn new(name: impl Into<String>, kind: ComponentKind, description: &'static str) -> Self {
        let name = name.into();
        Self {
            image: format!("fndnt/{}", name),
            name,
            description,
            kind,
            consumes: Schema::new(),
            produces: Produces::Fixed(Schema::new()),
            arguments: BTreeMap::new(),
        }
    }

    pub fn consumes(mut self, field: &str, data_type: DataType) -> Self {
        self.consumes.insert(field, data_type);
        self
    }

    pub fn produces(mut self, field: &str, data_type: DataType) -> Self {
        match &mut self.produces {
            Produces::Fixed(schema) => {
                schema.insert(field, data_type);
            }
            Produces::Declared => {
                self.produces = Produces::Fixed(Schema::new().field(field, data_type));
            }
        }
        self
    }

    pub fn declared_produces(mut self) -> Self {
        self.produces = Produces::Declared;
        self
    }

    pub fn argument(mut self, name: &str, spec: ArgumentSpec) -> Self {
        self.arguments.insert(name.to_string(), spec);
        self
    }
}

/// Lookup table of component contracts keyed by stage name
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    specs: BTreeMap<String, ComponentSpec>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: ComponentSpec) {
        self.specs.insert(spec.name.clone(), spec);
    }

    pub fn get(&self, name: &str) -> Option<&ComponentSpec> {
        self.specs.get(name)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentSpec> {
        self.specs.values()
    }

    /// Contracts for every component of the Datacomp filtering pipeline
    pub fn datacomp() -> Self {
        use ArgumentType::*;

        let image = DataType::Binary;
        let boxes = DataType::list(DataType::list(DataType::Float32));
        let mut catalog = Self::new();

        catalog.register(
            ComponentSpec::new(
                "load_from_hf_hub",
                ComponentKind::Read,
                "Load a dataset from the Hugging Face hub",
            )
            .declared_produces()
            .argument("dataset_name", ArgumentSpec::required(Str, "Name of the hub dataset"))
            .argument(
                "column_name_mapping",
                ArgumentSpec::optional(Dict, "Rename dataset columns"),
            )
            .argument(
                "image_column_names",
                ArgumentSpec::optional(List, "Columns holding images"),
            )
            .argument(
                "n_rows_to_load",
                ArgumentSpec::optional(Int, "Row cap; all rows when omitted"),
            )
            .argument(
                "index_column",
                ArgumentSpec::optional(Str, "Column used as the dataset index"),
            ),
        );

        catalog.register(
            ComponentSpec::new(
                "download_images",
                ComponentKind::Transform,
                "Download images from their URLs",
            )
            .consumes("image_url", DataType::String)
            .produces("image", image.clone())
            .produces("image_width", DataType::Int32)
            .produces("image_height", DataType::Int32)
            .argument(
                "timeout",
                ArgumentSpec::with_default(Int, json!(10), "Request timeout in seconds"),
            )
            .argument(
                "retries",
                ArgumentSpec::with_default(Int, json!(0), "Retries per failed download"),
            )
            .argument(
                "n_connections",
                ArgumentSpec::with_default(Int, json!(100), "Concurrent connections"),
            )
            .argument(
                "image_size",
                ArgumentSpec::with_default(Int, json!(256), "Target image size"),
            )
            .argument(
                "resize_mode",
                ArgumentSpec::with_default(Str, json!("border"), "Resize strategy"),
            )
            .argument(
                "resize_only_if_bigger",
                ArgumentSpec::with_default(Bool, json!(false), "Never upscale"),
            )
            .argument(
                "min_image_size",
                ArgumentSpec::with_default(Int, json!(0), "Drop images below this size"),
            )
            .argument(
                "max_aspect_ratio",
                ArgumentSpec::optional(Float, "Drop images above this aspect ratio"),
            ),
        );

        catalog.register(
            ComponentSpec::new(
                "resize_images",
                ComponentKind::Transform,
                "Resize images to a fixed size",
            )
            .consumes("image", image.clone())
            .produces("image", image.clone())
            .argument("resize_width", ArgumentSpec::required(Int, "Target width"))
            .argument("resize_height", ArgumentSpec::required(Int, "Target height")),
        );

        catalog.register(
            ComponentSpec::new(
                "detect_text",
                ComponentKind::Transform,
                "Detect text regions in images",
            )
            .consumes("image", image.clone())
            .produces("boxes", boxes.clone())
            .argument(
                "batch_size",
                ArgumentSpec::required(Int, "Images per inference batch"),
            )
            .argument("image_size", ArgumentSpec::required(Int, "Model input size")),
        );

        catalog.register(
            ComponentSpec::new(
                "mask_images",
                ComponentKind::Transform,
                "Mask detected text regions",
            )
            .consumes("image", image.clone())
            .consumes("boxes", boxes)
            .produces("image", image.clone()),
        );

        catalog.register(
            ComponentSpec::new(
                "embed_images",
                ComponentKind::Transform,
                "Embed images with a CLIP model",
            )
            .consumes("image", image)
            .produces("embedding", DataType::list(DataType::Float32))
            .argument(
                "model_id",
                ArgumentSpec::with_default(
                    Str,
                    json!("openai/clip-vit-large-patch14"),
                    "CLIP checkpoint",
                ),
            )
            .argument(
                "batch_size",
                ArgumentSpec::with_default(Int, json!(8), "Images per inference batch"),
            ),
        );

        catalog.register(
            ComponentSpec::new(
                "add_clip_score",
                ComponentKind::Transform,
                "Cosine similarity between image and text embeddings",
            )
            .consumes("embedding", DataType::list(DataType::Float32))
            .consumes("text_embedding", DataType::list(DataType::Float64))
            .produces("clip_score", DataType::Float32),
        );

        catalog.register(
            ComponentSpec::new(
                "filter_clip_score",
                ComponentKind::Filter,
                "Drop rows whose CLIP score is below a threshold",
            )
            .consumes("clip_score", DataType::Float32)
            .argument(
                "threshold_score",
                ArgumentSpec::required(Float, "Minimum CLIP score to keep"),
            ),
        );

        catalog
    }
}
