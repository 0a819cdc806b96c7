use super::{image_reference, op_for};
use crate::base_path::BasePath;
use crate::error::FilterResult;
use crate::pipeline::component::ComponentRef;
use crate::pipeline::context::CONTAINER_ARTIFACT_DIR;
use crate::pipeline::manifest::{
    BuildContext, CompiledStage, ComposeService, Deploy, DependsOn, Volume,
};
use crate::pipeline::resources::{Accelerator, Resources};
use crate::pipeline::{CompileContext, CompilerPass};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Pass that turns every stage into a compose service
///
/// # Context Requirements
/// - stage graph, resolved arguments, produced columns and cache keys
///
/// # Context Outputs
/// - compiled stages in execution order (`CompileContext::compiled_stages`)
pub struct ComposePass;

impl ComposePass {
    pub fn new() -> Self {
        Self
    }

    fn service(&self, context: &CompileContext, stage: &str) -> FilterResult<CompiledStage> {
        let op = op_for(context, stage)?;
        let spec = context.spec_for(stage)?;
        let dependencies = context.graph()?.dependencies(stage);
        let cache_key = context.cache_key(stage)?.to_string();

        let input_manifest_path = dependencies.first().map(|d| context.manifest_path(d));
        let output_manifest_path = context.manifest_path(stage);

        let metadata = json!({
            "base_path": context.pipeline_base().to_string(),
            "pipeline_name": context.pipeline().name(),
            "run_id": context.run_id(),
            "component_id": stage,
            "cache_key": cache_key,
        });

        let consumes: BTreeMap<&str, &str> = spec
            .consumes
            .iter()
            .map(|(field, _)| (field.as_str(), op.column_for(field)))
            .collect();
        let operation_spec = json!({
            "consumes": consumes,
            "produces": context.produced(stage)?,
        });

        let mut command = vec![
            "--metadata".to_string(),
            serde_json::to_string(&metadata)?,
            "--operation_spec".to_string(),
            serde_json::to_string(&operation_spec)?,
            "--cache".to_string(),
            op.cache.to_string(),
        ];
        if let Some(input) = &input_manifest_path {
            command.push("--input_manifest_path".to_string());
            command.push(input.clone());
        }
        command.push("--output_manifest_path".to_string());
        command.push(output_manifest_path.clone());

        for (key, value) in context.arguments(stage)? {
            command.push(format!("--{}", key));
            command.push(render_argument(value));
        }

        let (image, build) = match op.reference() {
            ComponentRef::Reusable(_) => (
                image_reference(op, spec, &context.options().component_tag),
                None,
            ),
            // Compose resolves relative contexts against the compose file,
            // not the working directory
            ComponentRef::Local(path) => (
                None,
                Some(BuildContext {
                    context: absolute(path)?.display().to_string(),
                }),
            ),
        };

        let depends_on = dependencies
            .iter()
            .map(|d| (d.clone(), DependsOn::completed()))
            .collect();

        let volumes = match context.pipeline().base_path() {
            BasePath::Local(path) => vec![Volume {
                kind: "bind".to_string(),
                source: absolute(path)?.display().to_string(),
                target: CONTAINER_ARTIFACT_DIR.to_string(),
            }],
            BasePath::Remote(_) => Vec::new(),
        };

        let deploy = op.resources.as_ref().and_then(deploy_for);

        let mut labels = BTreeMap::new();
        labels.insert("pipeline".to_string(), context.pipeline().name().to_string());
        labels.insert("run_id".to_string(), context.run_id().to_string());

        Ok(CompiledStage {
            name: stage.to_string(),
            cache_key,
            input_manifest_path,
            output_manifest_path,
            service: ComposeService {
                image,
                build,
                command,
                depends_on,
                volumes,
                deploy,
                labels,
            },
        })
    }
}

impl Default for ComposePass {
    fn default() -> Self {
        Self::new()
    }
}

impl CompilerPass for ComposePass {
    fn execute(&self, context: &mut CompileContext) -> FilterResult<()> {
        for stage in context.order()? {
            let compiled = self.service(context, &stage)?;
            debug!(
                target: "pipeline::compose",
                "Stage '{}' -> {}",
                stage,
                compiled
                    .service
                    .image
                    .clone()
                    .or_else(|| compiled.service.build.as_ref().map(|b| b.context.clone()))
                    .unwrap_or_default()
            );
            context.push_compiled(compiled);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "Build Services"
    }
}

/// GPU reservations and node pool placement; `None` when neither applies
fn deploy_for(resources: &Resources) -> Option<Deploy> {
    let mut deploy = match resources.accelerator() {
        Some((Accelerator::Gpu, count)) => Deploy::nvidia_gpus(count),
        _ => Deploy::default(),
    };
    if let (Some(label), Some(name)) = (&resources.node_pool_label, &resources.node_pool_name) {
        deploy = deploy.on_node_pool(label, name);
    }

    if deploy.resources.is_none() && deploy.placement.is_none() {
        None
    } else {
        Some(deploy)
    }
}

/// Command-line rendering of an argument: strings verbatim, everything else
/// as JSON
pub fn render_argument(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn absolute(path: &Path) -> FilterResult<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        let joined = std::env::current_dir()?.join(path);
        Ok(joined.canonicalize().unwrap_or(joined))
    }
}
