use super::catalog::Catalog;
use super::context::{CompileContext, CompileOptions};
use super::core::{CompileReport, CompilerPass, PassResult};
use super::definition::Pipeline;
use super::manifest::CompiledPipeline;
use super::passes::{
    ArgumentsPass, ColumnsPass, ComposePass, FingerprintPass, OrderPass, ResourcesPass,
    WritePass,
};
use crate::error::FilterResult;
use std::time::Instant;
use tracing::{error, info};

/// Runs compiler passes sequentially over a shared context
///
/// # Example
/// ```
/// use datacomp_filter::pipeline::Compiler;
///
/// let compiler = Compiler::standard();
/// assert_eq!(compiler.pass_count(), 7);
/// ```
pub struct Compiler {
    name: String,
    passes: Vec<Box<dyn CompilerPass>>,
}

impl Compiler {
    pub fn builder(name: impl Into<String>) -> CompilerBuilder {
        CompilerBuilder::new(name)
    }

    /// Order, arguments, columns, resources, fingerprint, compose, write
    pub fn standard() -> Self {
        Self::builder("standard")
            .add_pass(OrderPass::new())
            .add_pass(ArgumentsPass::new())
            .add_pass(ColumnsPass::new())
            .add_pass(ResourcesPass::new())
            .add_pass(FingerprintPass::new())
            .add_pass(ComposePass::new())
            .add_pass(WritePass::new())
            .build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Run every pass against `context`
    ///
    /// Passes run in order. The first failing pass (in its pre-execute,
    /// execute or post-execute step) stops compilation and yields a failure
    /// report; passes whose `should_skip()` is true are recorded as skipped.
    pub fn run(&self, context: &mut CompileContext) -> FilterResult<CompileReport> {
        let pipeline_name = context.pipeline().name().to_string();
        info!(
            target: "pipeline",
            "Compiling pipeline '{}' with {} passes (run: {})",
            pipeline_name,
            self.passes.len(),
            context.run_id()
        );

        let compile_start = Instant::now();
        let mut pass_results = Vec::new();

        context.set_metadata("compiler", &self.name);

        for (index, pass) in self.passes.iter().enumerate() {
            let pass_name = pass.name();

            if pass.should_skip(context) {
                info!(
                    target: "pipeline",
                    "Skipping pass {}/{}: {}",
                    index + 1,
                    self.passes.len(),
                    pass_name
                );
                pass_results.push(PassResult::skipped(pass_name));
                continue;
            }

            info!(
                target: "pipeline",
                "Running pass {}/{}: {}",
                index + 1,
                self.passes.len(),
                pass_name
            );

            let pass_start = Instant::now();

            if let Err(e) = pass.pre_execute(context) {
                let error_msg = format!("Pre-execute failed: {}", e);
                error!(target: "pipeline", "Pass '{}' pre-execute failed: {}", pass_name, e);
                pass_results.push(PassResult::failure(
                    pass_name,
                    error_msg.clone(),
                    pass_start.elapsed(),
                ));
                return Ok(CompileReport::failure(
                    &pipeline_name,
                    pass_results,
                    error_msg,
                    compile_start.elapsed(),
                ));
            }

            let execute_result = pass.execute(context);
            let duration = pass_start.elapsed();

            match execute_result {
                Ok(()) => {
                    info!(
                        target: "pipeline",
                        "Pass '{}' completed in {:.2}ms",
                        pass_name,
                        duration.as_secs_f64() * 1000.0
                    );

                    if let Err(e) = pass.post_execute(context) {
                        let error_msg = format!("Post-execute failed: {}", e);
                        error!(target: "pipeline", "Pass '{}' post-execute failed: {}", pass_name, e);
                        pass_results.push(PassResult::failure(
                            pass_name,
                            error_msg.clone(),
                            duration,
                        ));
                        return Ok(CompileReport::failure(
                            &pipeline_name,
                            pass_results,
                            error_msg,
                            compile_start.elapsed(),
                        ));
                    }

                    pass_results.push(PassResult::success(pass_name, duration));
                }
                Err(e) => {
                    let error_msg = e.to_string();
                    error!(target: "pipeline", "Pass '{}' failed: {}", pass_name, error_msg);
                    pass_results.push(PassResult::failure(
                        pass_name,
                        error_msg.clone(),
                        duration,
                    ));
                    return Ok(CompileReport::failure(
                        &pipeline_name,
                        pass_results,
                        error_msg,
                        compile_start.elapsed(),
                    ));
                }
            }
        }

        let total_duration = compile_start.elapsed();
        info!(
            target: "pipeline",
            "Pipeline '{}' compiled in {:.2}ms",
            pipeline_name,
            total_duration.as_secs_f64() * 1000.0
        );

        Ok(CompileReport::success(
            &pipeline_name,
            pass_results,
            total_duration,
        ))
    }
}

/// Builder for constructing compilers
pub struct CompilerBuilder {
    name: String,
    passes: Vec<Box<dyn CompilerPass>>,
}

impl CompilerBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passes: Vec::new(),
        }
    }

    pub fn add_pass<P: CompilerPass + 'static>(mut self, pass: P) -> Self {
        self.passes.push(Box::new(pass));
        self
    }

    pub fn add_boxed_pass(mut self, pass: Box<dyn CompilerPass>) -> Self {
        self.passes.push(pass);
        self
    }

    pub fn build(self) -> Compiler {
        Compiler {
            name: self.name,
            passes: self.passes,
        }
    }
}

/// Compile `pipeline` with the standard passes
///
/// Returns the compiled manifest, or `FilterError::CompileFailed` naming the
/// pass that rejected the pipeline.
pub fn compile(
    pipeline: Pipeline,
    catalog: Catalog,
    options: CompileOptions,
) -> FilterResult<CompiledPipeline> {
    let mut context = CompileContext::new(pipeline, catalog, options);
    Compiler::standard().run(&mut context)?.ensure_success()?;
    context.compiled_pipeline()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FilterError;
    use crate::base_path::BasePath;
    use crate::pipeline::{ComponentOp, DataType};

    struct RecordStage {
        name: String,
    }

    impl RecordStage {
        fn new(name: impl Into<String>) -> Self {
            Self { name: name.into() }
        }
    }

    impl CompilerPass for RecordStage {
        fn execute(&self, context: &mut CompileContext) -> FilterResult<()> {
            context.set_metadata(self.name.clone(), "executed");
            Ok(())
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    struct FailPass;

    impl CompilerPass for FailPass {
        fn execute(&self, _context: &mut CompileContext) -> FilterResult<()> {
            Err(FilterError::CompileError("pass failed".to_string()))
        }

        fn name(&self) -> &str {
            "fail"
        }
    }

    struct DryRunOnly;

    impl CompilerPass for DryRunOnly {
        fn execute(&self, context: &mut CompileContext) -> FilterResult<()> {
            context.set_metadata("dry_run_only", "executed");
            Ok(())
        }

        fn name(&self) -> &str {
            "dry_run_only"
        }

        fn should_skip(&self, context: &CompileContext) -> bool {
            !context.is_dry_run()
        }
    }

    fn context(options: CompileOptions) -> CompileContext {
        let mut pipeline = Pipeline::new(
            "executor-test",
            "",
            BasePath::parse("gs://bucket/base").unwrap(),
        )
        .unwrap();
        pipeline
            .read(
                ComponentOp::new("load_from_hf_hub")
                    .unwrap()
                    .argument("dataset_name", "org/data")
                    .produce("url", DataType::String),
            )
            .unwrap();
        CompileContext::new(pipeline, Catalog::datacomp(), options)
    }

    #[test]
    fn test_compiler_success() {
        let compiler = Compiler::builder("test")
            .add_pass(RecordStage::new("one"))
            .add_pass(RecordStage::new("two"))
            .build();

        let mut ctx = context(CompileOptions::default());
        let report = compiler.run(&mut ctx).unwrap();

        assert!(report.success);
        assert_eq!(report.executed_passes(), 2);
        assert_eq!(ctx.get_metadata("one"), Some("executed"));
        assert_eq!(ctx.get_metadata("compiler"), Some("test"));
    }

    #[test]
    fn test_compiler_stops_at_failure() {
        let compiler = Compiler::builder("test")
            .add_pass(RecordStage::new("one"))
            .add_pass(FailPass)
            .add_pass(RecordStage::new("three"))
            .build();

        let mut ctx = context(CompileOptions::default());
        let report = compiler.run(&mut ctx).unwrap();

        assert!(!report.success);
        assert_eq!(report.pass_results.len(), 2);
        assert_eq!(report.failed_pass().unwrap().pass_name, "fail");
        assert!(ctx.get_metadata("three").is_none());
    }

    #[test]
    fn test_compiler_skips_pass() {
        let compiler = Compiler::builder("test")
            .add_pass(DryRunOnly)
            .add_boxed_pass(Box::new(RecordStage::new("after")))
            .build();

        let mut ctx = context(CompileOptions::default());
        let report = compiler.run(&mut ctx).unwrap();

        assert!(report.success);
        assert_eq!(report.skipped_passes(), 1);
        assert!(ctx.get_metadata("dry_run_only").is_none());
        assert_eq!(ctx.get_metadata("after"), Some("executed"));
    }

    #[test]
    fn test_compile_single_stage() {
        let ctx = context(CompileOptions::dry_run());
        let compiled = compile(
            ctx.pipeline().clone(),
            Catalog::datacomp(),
            CompileOptions::dry_run(),
        )
        .unwrap();

        assert_eq!(compiled.stage_names(), vec!["load_from_hf_hub"]);
        assert!(compiled.linear);
    }
}
