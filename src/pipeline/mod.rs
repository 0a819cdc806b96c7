//! Pipeline declaration and compilation
//!
//! A pipeline is declared as a chain of component stages (`read` a source,
//! then `apply` components to the dataset each stage hands on). Compilation
//! runs a sequence of passes over a shared context that check the graph,
//! arguments, columns and resources, and then emit one compose service per
//! stage for an external orchestrator to run.
//!
//! # Example
//! ```
//! use datacomp_filter::base_path::BasePath;
//! use datacomp_filter::pipeline::{compile, Catalog, CompileOptions, ComponentOp, DataType, Pipeline};
//!
//! let mut pipeline = Pipeline::new(
//!     "my-pipeline",
//!     "Download images",
//!     BasePath::parse("gs://bucket/artifacts").unwrap(),
//! )
//! .unwrap();
//! let source = pipeline
//!     .read(
//!         ComponentOp::new("load_from_hf_hub")
//!             .unwrap()
//!             .argument("dataset_name", "org/dataset")
//!             .produce("url", DataType::String),
//!     )
//!     .unwrap();
//! pipeline
//!     .apply(&source, ComponentOp::new("download_images").unwrap().consume("image_url", "url"))
//!     .unwrap();
//!
//! let compiled = compile(pipeline, Catalog::datacomp(), CompileOptions::dry_run()).unwrap();
//! assert_eq!(compiled.stage_names(), vec!["load_from_hf_hub", "download_images"]);
//! ```

pub mod catalog;
pub mod component;
pub mod context;
pub mod core;
pub mod definition;
pub mod executor;
pub mod graph;
pub mod manifest;
pub mod passes;
pub mod resources;
pub mod schema;

// Re-export main types
pub use catalog::{Catalog, ComponentKind, ComponentSpec};
pub use component::{ComponentOp, ComponentRef};
pub use context::{CompileContext, CompileOptions};
pub use self::core::{CompileReport, CompilerPass, PassResult};
pub use definition::{Pipeline, StageHandle};
pub use executor::{compile, Compiler, CompilerBuilder};
pub use graph::StageGraph;
pub use manifest::{CompiledPipeline, CompiledStage, ComposeSpec};
pub use resources::{Accelerator, Resources};
pub use schema::{DataType, Schema};
