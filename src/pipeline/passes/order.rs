use crate::error::{FilterError, FilterResult};
use crate::pipeline::graph::StageGraph;
use crate::pipeline::{CompileContext, CompilerPass};
use tracing::{info, warn};

/// Pass that builds the stage graph and fixes the execution order
///
/// # Context Outputs
/// - stage graph (`CompileContext::graph`)
/// - metadata `linear` ("true"/"false") and `stage_order`
pub struct OrderPass;

impl OrderPass {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OrderPass {
    fn default() -> Self {
        Self::new()
    }
}

impl CompilerPass for OrderPass {
    fn execute(&self, context: &mut CompileContext) -> FilterResult<()> {
        let graph = StageGraph::build(context.pipeline().ops())?;
        let linear = graph.is_linear_chain();
        let order = graph.order().join(" -> ");

        info!(target: "pipeline::order", "Execution order: {}", order);
        if !linear {
            warn!(
                target: "pipeline::order",
                "Pipeline '{}' is not a linear chain",
                context.pipeline().name()
            );
        }

        context.set_metadata("linear", linear.to_string());
        context.set_metadata("stage_order", order);
        context.set_graph(graph);
        Ok(())
    }

    fn name(&self) -> &str {
        "Resolve Order"
    }

    fn pre_execute(&self, context: &CompileContext) -> FilterResult<()> {
        if context.pipeline().stage_count() == 0 {
            return Err(FilterError::CompileError(format!(
                "pipeline '{}' has no stages",
                context.pipeline().name()
            )));
        }
        Ok(())
    }
}
