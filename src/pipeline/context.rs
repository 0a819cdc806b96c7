use super::catalog::{Catalog, ComponentSpec};
use super::definition::Pipeline;
use super::graph::StageGraph;
use super::manifest::{CompiledPipeline, CompiledStage};
use super::schema::Schema;
use crate::base_path::BasePath;
use crate::error::{FilterError, FilterResult};
use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

pub const DEFAULT_COMPONENT_TAG: &str = "latest";

/// Knobs for a compilation run
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Defaults to `<pipeline>-<UTC timestamp>`
    pub run_id: Option<String>,
    /// Where the compose spec is written
    pub output_path: Option<PathBuf>,
    /// Validate and build the manifest without writing anything
    pub dry_run: bool,
    /// Image tag for reusable components
    pub component_tag: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            run_id: None,
            output_path: None,
            dry_run: false,
            component_tag: DEFAULT_COMPONENT_TAG.to_string(),
        }
    }
}

impl CompileOptions {
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }
}

/// State shared by compiler passes
///
/// Holds the pipeline under compilation and everything passes derive from it.
/// Getters for derived state fail with a compile error when the pass that
/// produces it has not run.
#[derive(Debug, Clone)]
pub struct CompileContext {
    pipeline: Pipeline,
    catalog: Catalog,
    options: CompileOptions,
    run_id: String,

    graph: Option<StageGraph>,

    /// Arguments after defaults were applied, per stage
    arguments: BTreeMap<String, BTreeMap<String, Value>>,

    /// Dataset schema after each stage ran
    schemas: BTreeMap<String, Schema>,

    /// Columns each stage writes
    produced: BTreeMap<String, Schema>,

    cache_keys: BTreeMap<String, String>,

    compiled: Vec<CompiledStage>,

    written_to: Option<PathBuf>,

    metadata: HashMap<String, String>,
}

impl CompileContext {
    pub fn new(pipeline: Pipeline, catalog: Catalog, options: CompileOptions) -> Self {
        let run_id = options.run_id.clone().unwrap_or_else(|| {
            format!("{}-{}", pipeline.name(), Utc::now().format("%Y%m%d%H%M%S"))
        });

        Self {
            pipeline,
            catalog,
            options,
            run_id,
            graph: None,
            arguments: BTreeMap::new(),
            schemas: BTreeMap::new(),
            produced: BTreeMap::new(),
            cache_keys: BTreeMap::new(),
            compiled: Vec::new(),
            written_to: None,
            metadata: HashMap::new(),
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn is_dry_run(&self) -> bool {
        self.options.dry_run
    }

    /// Catalog entry for a declared stage
    pub fn spec_for(&self, stage: &str) -> FilterResult<&ComponentSpec> {
        self.catalog
            .get(stage)
            .ok_or_else(|| FilterError::UnknownComponent(stage.to_string()))
    }

    pub fn set_graph(&mut self, graph: StageGraph) {
        self.graph = Some(graph);
    }

    pub fn graph(&self) -> FilterResult<&StageGraph> {
        self.graph
            .as_ref()
            .ok_or_else(|| missing("stage graph"))
    }

    /// Stage names in execution order
    pub fn order(&self) -> FilterResult<Vec<String>> {
        Ok(self.graph()?.order().to_vec())
    }

    pub fn set_arguments(&mut self, stage: impl Into<String>, arguments: BTreeMap<String, Value>) {
        self.arguments.insert(stage.into(), arguments);
    }

    pub fn arguments(&self, stage: &str) -> FilterResult<&BTreeMap<String, Value>> {
        self.arguments
            .get(stage)
            .ok_or_else(|| missing(&format!("arguments for '{}'", stage)))
    }

    pub fn set_schema(&mut self, stage: impl Into<String>, schema: Schema) {
        self.schemas.insert(stage.into(), schema);
    }

    pub fn schema_after(&self, stage: &str) -> FilterResult<&Schema> {
        self.schemas
            .get(stage)
            .ok_or_else(|| missing(&format!("schema after '{}'", stage)))
    }

    pub fn set_produced(&mut self, stage: impl Into<String>, schema: Schema) {
        self.produced.insert(stage.into(), schema);
    }

    pub fn produced(&self, stage: &str) -> FilterResult<&Schema> {
        self.produced
            .get(stage)
            .ok_or_else(|| missing(&format!("produced columns of '{}'", stage)))
    }

    pub fn set_cache_key(&mut self, stage: impl Into<String>, key: impl Into<String>) {
        self.cache_keys.insert(stage.into(), key.into());
    }

    pub fn cache_key(&self, stage: &str) -> FilterResult<&str> {
        self.cache_keys
            .get(stage)
            .map(|k| k.as_str())
            .ok_or_else(|| missing(&format!("cache key of '{}'", stage)))
    }

    pub fn push_compiled(&mut self, stage: CompiledStage) {
        self.compiled.push(stage);
    }

    pub fn compiled_stages(&self) -> &[CompiledStage] {
        &self.compiled
    }

    pub fn set_written_to(&mut self, path: PathBuf) {
        self.written_to = Some(path);
    }

    pub fn written_to(&self) -> Option<&PathBuf> {
        self.written_to.as_ref()
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn get_metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(|s| s.as_str())
    }

    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    /// Manifest path a stage writes, below the run directory
    pub fn manifest_path(&self, stage: &str) -> String {
        self.pipeline_base().join(&[
            self.pipeline.name(),
            self.run_id.as_str(),
            stage,
            "manifest.json",
        ])
    }

    /// Base path as seen from inside the stage containers
    pub fn pipeline_base(&self) -> BasePath {
        match self.pipeline.base_path() {
            BasePath::Local(_) => BasePath::Local(PathBuf::from(CONTAINER_ARTIFACT_DIR)),
            remote => remote.clone(),
        }
    }

    /// Collect the compiled stages into the final manifest
    pub fn compiled_pipeline(&self) -> FilterResult<CompiledPipeline> {
        let graph = self.graph()?;
        if self.compiled.len() != graph.len() {
            return Err(missing("compiled services"));
        }

        Ok(CompiledPipeline {
            pipeline_name: self.pipeline.name().to_string(),
            description: self.pipeline.description().to_string(),
            run_id: self.run_id.clone(),
            base_path: self.pipeline.base_path().to_string(),
            linear: graph.is_linear_chain(),
            stages: self.compiled.clone(),
        })
    }
}

/// Mount point of a local base path inside stage containers
pub const CONTAINER_ARTIFACT_DIR: &str = "/artifacts";

fn missing(what: &str) -> FilterError {
    FilterError::CompileError(format!("{} not available; did an earlier pass run?", what))
}
