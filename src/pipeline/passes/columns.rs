use super::op_for;
use crate::error::{FilterError, FilterResult};
use crate::pipeline::catalog::{ComponentKind, Produces};
use crate::pipeline::{CompileContext, CompilerPass, Schema};
use tracing::debug;

/// Pass that negotiates the dataset schema stage by stage
///
/// A read stage starts the dataset with the columns it declares. Every
/// other stage runs on exactly one upstream dataset: each field it consumes
/// resolves (through the stage's `consumes` mapping) to an existing column
/// of the same type, and the columns it produces are merged into the
/// dataset it hands downstream. Filters only drop rows.
///
/// # Context Requirements
/// - stage graph (OrderPass)
///
/// # Context Outputs
/// - dataset schema after each stage (`CompileContext::schema_after`)
/// - produced columns per stage (`CompileContext::produced`)
pub struct ColumnsPass;

impl ColumnsPass {
    pub fn new() -> Self {
        Self
    }

    fn negotiate(&self, context: &CompileContext, stage: &str) -> FilterResult<(Schema, Schema)> {
        let op = op_for(context, stage)?;
        let spec = context.spec_for(stage)?;
        let dependencies = context.graph()?.dependencies(stage);
        let invalid = |reason: String| FilterError::InvalidOperation {
            stage: stage.to_string(),
            reason,
        };

        let mut schema = match spec.kind {
            ComponentKind::Read => {
                if !dependencies.is_empty() {
                    return Err(invalid("a read component cannot run on an input dataset".to_string()));
                }
                Schema::new()
            }
            ComponentKind::Transform | ComponentKind::Filter => {
                if dependencies.len() != 1 {
                    return Err(invalid(format!(
                        "must run on exactly one input dataset, found {}",
                        dependencies.len()
                    )));
                }
                context.schema_after(&dependencies[0])?.clone()
            }
        };

        for field in op.consumes.keys() {
            if !spec.consumes.contains(field) {
                return Err(invalid(format!(
                    "component does not consume a field named '{}'",
                    field
                )));
            }
        }

        for (field, expected) in spec.consumes.iter() {
            let column = op.column_for(field);
            let actual = schema.get(column).ok_or_else(|| FilterError::MissingColumn {
                stage: stage.to_string(),
                column: column.to_string(),
            })?;
            if actual != expected {
                return Err(FilterError::SchemaMismatch {
                    stage: stage.to_string(),
                    column: column.to_string(),
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                });
            }
        }

        let produced = match &spec.produces {
            Produces::Fixed(fixed) => {
                if !op.produces.is_empty() {
                    return Err(invalid(
                        "component has a fixed output schema; remove `produces`".to_string(),
                    ));
                }
                fixed.clone()
            }
            Produces::Declared => {
                if op.produces.is_empty() {
                    return Err(invalid("component requires declared `produces`".to_string()));
                }
                op.produces.clone()
            }
        };

        schema.merge(&produced);
        Ok((schema, produced))
    }
}

impl Default for ColumnsPass {
    fn default() -> Self {
        Self::new()
    }
}

impl CompilerPass for ColumnsPass {
    fn execute(&self, context: &mut CompileContext) -> FilterResult<()> {
        for stage in context.order()? {
            let (schema, produced) = self.negotiate(context, &stage)?;
            debug!(
                target: "pipeline::columns",
                "Stage '{}' writes [{}]; dataset now has {} columns",
                stage,
                produced.names().join(", "),
                schema.len()
            );
            context.set_produced(stage.clone(), produced);
            context.set_schema(stage, schema);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "Negotiate Columns"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base_path::BasePath;
    use crate::pipeline::passes::test_support::{context, small_pipeline, source_schema};
    use crate::pipeline::passes::OrderPass;
    use crate::pipeline::{ComponentOp, DataType, Pipeline};

    fn run(pipeline: Pipeline) -> FilterResult<CompileContext> {
        let mut ctx = context(pipeline);
        OrderPass::new().execute(&mut ctx)?;
        ColumnsPass::new().execute(&mut ctx)?;
        Ok(ctx)
    }

    fn loaded(pipeline: &mut Pipeline) -> crate::pipeline::StageHandle {
        pipeline
            .read(
                ComponentOp::new("load_from_hf_hub")
                    .unwrap()
                    .argument("dataset_name", "org/data")
                    .produces(source_schema()),
            )
            .unwrap()
    }

    fn empty() -> Pipeline {
        Pipeline::new("columns", "", BasePath::parse("gs://b/p").unwrap()).unwrap()
    }

    #[test]
    fn test_schema_evolves() {
        let ctx = run(small_pipeline("gs://bucket/base")).unwrap();

        let after_load = ctx.schema_after("load_from_hf_hub").unwrap();
        assert_eq!(after_load, &source_schema());

        let after_download = ctx.schema_after("download_images").unwrap();
        assert_eq!(after_download.get("image"), Some(&DataType::Binary));
        assert_eq!(after_download.get("image_width"), Some(&DataType::Int32));
        assert!(after_download.contains("url"));

        let after_embed = ctx.schema_after("embed_images").unwrap();
        assert_eq!(
            after_embed.get("embedding"),
            Some(&DataType::list(DataType::Float32))
        );
        assert_eq!(
            ctx.produced("embed_images").unwrap().names(),
            vec!["embedding"]
        );
    }

    #[test]
    fn test_missing_column_without_mapping() {
        let mut pipeline = empty();
        let source = loaded(&mut pipeline);
        // No `image_url` column; the mapping to `url` is required
        pipeline
            .apply(&source, ComponentOp::new("download_images").unwrap())
            .unwrap();

        match run(pipeline) {
            Err(FilterError::MissingColumn { stage, column }) => {
                assert_eq!(stage, "download_images");
                assert_eq!(column, "image_url");
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_type_mismatch() {
        let mut pipeline = empty();
        let source = loaded(&mut pipeline);
        pipeline
            .apply(
                &source,
                ComponentOp::new("components/filter_clip_score")
                    .unwrap()
                    .consume("clip_score", "text"),
            )
            .unwrap();

        assert!(matches!(
            run(pipeline),
            Err(FilterError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_unknown_consume_field() {
        let mut pipeline = empty();
        let source = loaded(&mut pipeline);
        pipeline
            .apply(
                &source,
                ComponentOp::new("download_images")
                    .unwrap()
                    .consume("image_url", "url")
                    .consume("caption", "text"),
            )
            .unwrap();

        assert!(matches!(
            run(pipeline),
            Err(FilterError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn test_fixed_produces_rejects_override() {
        let mut pipeline = empty();
        let source = loaded(&mut pipeline);
        pipeline
            .apply(
                &source,
                ComponentOp::new("download_images")
                    .unwrap()
                    .consume("image_url", "url")
                    .produce("thumbnail", DataType::Binary),
            )
            .unwrap();

        assert!(matches!(
            run(pipeline),
            Err(FilterError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn test_filter_keeps_schema() {
        let mut pipeline = empty();
        let source = pipeline
            .read(
                ComponentOp::new("load_from_hf_hub")
                    .unwrap()
                    .argument("dataset_name", "org/data")
                    .produces(source_schema().field("score", DataType::Float32)),
            )
            .unwrap();
        pipeline
            .apply(
                &source,
                ComponentOp::new("components/filter_clip_score")
                    .unwrap()
                    .consume("clip_score", "score"),
            )
            .unwrap();

        let ctx = run(pipeline).unwrap();
        assert!(ctx.produced("filter_clip_score").unwrap().is_empty());
        assert_eq!(
            ctx.schema_after("filter_clip_score").unwrap(),
            ctx.schema_after("load_from_hf_hub").unwrap()
        );
    }

    #[test]
    fn test_stage_with_two_inputs_rejected() {
        let mut pipeline = empty();
        let source = loaded(&mut pipeline);
        let images = pipeline
            .apply(
                &source,
                ComponentOp::new("download_images")
                    .unwrap()
                    .consume("image_url", "url"),
            )
            .unwrap();
        pipeline
            .add_op(
                ComponentOp::new("embed_images")
                    .unwrap()
                    .depends_on(source.name())
                    .depends_on(images.name()),
            )
            .unwrap();

        assert!(matches!(
            run(pipeline),
            Err(FilterError::InvalidOperation { .. })
        ));
    }
}
