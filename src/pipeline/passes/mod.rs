//! Compiler passes, in the order the standard compiler runs them:
//! 1. OrderPass - Build the stage graph and resolve execution order
//! 2. ArgumentsPass - Check arguments against the catalog and fill defaults
//! 3. ColumnsPass - Negotiate consumed and produced columns stage by stage
//! 4. ResourcesPass - Validate accelerator requests
//! 5. FingerprintPass - Derive a cache key per stage
//! 6. ComposePass - Build one compose service per stage
//! 7. WritePass - Write the compose spec to disk (skipped on dry runs)

pub mod arguments;
pub mod columns;
pub mod compose;
pub mod fingerprint;
pub mod order;
pub mod resources;
pub mod write;

pub use arguments::ArgumentsPass;
pub use columns::ColumnsPass;
pub use compose::ComposePass;
pub use fingerprint::FingerprintPass;
pub use order::OrderPass;
pub use resources::ResourcesPass;
pub use write::WritePass;

use super::catalog::ComponentSpec;
use super::component::{ComponentOp, ComponentRef};
use super::context::CompileContext;
use crate::error::{FilterError, FilterResult};

/// Declared op for a stage in the graph
pub(crate) fn op_for<'a>(context: &'a CompileContext, stage: &str) -> FilterResult<&'a ComponentOp> {
    context
        .pipeline()
        .op(stage)
        .ok_or_else(|| FilterError::StageNotFound(stage.to_string()))
}

/// Tagged image for reusable components; local components are built instead
pub(crate) fn image_reference(op: &ComponentOp, spec: &ComponentSpec, tag: &str) -> Option<String> {
    match op.reference() {
        ComponentRef::Reusable(_) => Some(format!("{}:{}", spec.image, tag)),
        ComponentRef::Local(_) => None,
    }
}
