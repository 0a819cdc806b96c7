use crate::error::{FilterError, FilterResult};
use crate::pipeline::resources::Accelerator;
use crate::pipeline::{CompileContext, CompilerPass};
use tracing::info;

/// Pass that validates accelerator requests
///
/// Requests must be complete (name and count together). The compose target
/// only knows how to reserve NVIDIA GPUs, so TPU requests are rejected.
///
/// # Context Outputs
/// - metadata `accelerated_stages` (comma separated stage names)
pub struct ResourcesPass;

impl ResourcesPass {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ResourcesPass {
    fn default() -> Self {
        Self::new()
    }
}

impl CompilerPass for ResourcesPass {
    fn execute(&self, context: &mut CompileContext) -> FilterResult<()> {
        let mut accelerated = Vec::new();

        for op in context.pipeline().ops() {
            let Some(resources) = &op.resources else {
                continue;
            };
            resources.validate(op.name())?;

            if let Some((accelerator, count)) = resources.accelerator() {
                if accelerator == Accelerator::Tpu {
                    return Err(FilterError::UnsupportedAccelerator(format!(
                        "stage '{}' requests {} TPU(s); only GPUs can be reserved",
                        op.name(),
                        count
                    )));
                }
                info!(
                    target: "pipeline::resources",
                    "Stage '{}' requests {} {}(s)",
                    op.name(),
                    count,
                    accelerator
                );
                accelerated.push(op.name().to_string());
            }
        }

        context.set_metadata("accelerated_stages", accelerated.join(","));
        Ok(())
    }

    fn name(&self) -> &str {
        "Check Resources"
    }
}
