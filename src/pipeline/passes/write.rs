use crate::error::{FilterError, FilterResult};
use crate::pipeline::{CompileContext, CompilerPass};
use std::path::PathBuf;
use tracing::info;

/// Default location of the compose spec, relative to the working directory
pub const DEFAULT_OUTPUT_PATH: &str = ".datacomp/compose.json";

/// Pass that writes the compose spec to disk
///
/// Skipped on dry runs.
pub struct WritePass;

impl WritePass {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WritePass {
    fn default() -> Self {
        Self::new()
    }
}

impl CompilerPass for WritePass {
    fn execute(&self, context: &mut CompileContext) -> FilterResult<()> {
        let path = context
            .options()
            .output_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH));

        let compose = context.compiled_pipeline()?.to_compose();
        compose.write_to(&path)?;

        info!(
            target: "pipeline::write",
            "Wrote {} services to {}",
            compose.services.len(),
            path.display()
        );
        context.set_written_to(path);
        Ok(())
    }

    fn name(&self) -> &str {
        "Write Manifest"
    }

    fn should_skip(&self, context: &CompileContext) -> bool {
        context.is_dry_run()
    }

    fn pre_execute(&self, context: &CompileContext) -> FilterResult<()> {
        if context.compiled_stages().is_empty() {
            return Err(FilterError::CompileError(
                "no compiled services to write".to_string(),
            ));
        }
        context.pipeline().base_path().ensure_exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::manifest::ComposeSpec;
    use crate::pipeline::passes::test_support::small_pipeline;
    use crate::pipeline::passes::{
        ArgumentsPass, ColumnsPass, ComposePass, FingerprintPass, OrderPass,
    };
    use crate::pipeline::{Catalog, CompileOptions};
    use tempfile::TempDir;

    #[test]
    fn test_write_pass_writes_compose() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("out").join("compose.json");
        let options = CompileOptions {
            run_id: Some("run-1".to_string()),
            output_path: Some(output.clone()),
            ..CompileOptions::default()
        };
        let mut ctx = CompileContext::new(
            small_pipeline("gs://bucket/base"),
            Catalog::datacomp(),
            options,
        );
        OrderPass::new().execute(&mut ctx).unwrap();
        ArgumentsPass::new().execute(&mut ctx).unwrap();
        ColumnsPass::new().execute(&mut ctx).unwrap();
        FingerprintPass::new().execute(&mut ctx).unwrap();
        ComposePass::new().execute(&mut ctx).unwrap();

        let pass = WritePass::new();
        assert!(!pass.should_skip(&ctx));
        pass.pre_execute(&ctx).unwrap();
        pass.execute(&mut ctx).unwrap();

        assert_eq!(ctx.written_to(), Some(&output));
        let spec = ComposeSpec::load(&output).unwrap();
        assert_eq!(spec.name, "small");
        assert_eq!(spec.services.len(), 4);
    }

    #[test]
    fn test_write_pass_skipped_on_dry_run() {
        let ctx = CompileContext::new(
            small_pipeline("gs://bucket/base"),
            Catalog::datacomp(),
            CompileOptions::dry_run(),
        );
        assert!(WritePass::new().should_skip(&ctx));
    }

    #[test]
    fn test_write_pass_requires_services() {
        let ctx = CompileContext::new(
            small_pipeline("gs://bucket/base"),
            Catalog::datacomp(),
            CompileOptions::default(),
        );
        assert!(WritePass::new().pre_execute(&ctx).is_err());
    }
}
