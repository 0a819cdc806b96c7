use super::{image_reference, op_for};
use crate::error::FilterResult;
use crate::pipeline::{CompileContext, CompilerPass};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Pass that derives a cache key per stage
///
/// The key is the SHA-256 of a canonical JSON document holding the
/// component reference and image, resolved arguments, consumed mapping,
/// produced columns and the upstream keys. Changing anything upstream
/// therefore changes every key downstream of it.
///
/// # Context Requirements
/// - resolved arguments (ArgumentsPass)
/// - produced columns (ColumnsPass)
///
/// # Context Outputs
/// - cache key per stage (`CompileContext::cache_key`)
pub struct FingerprintPass;

impl FingerprintPass {
    pub fn new() -> Self {
        Self
    }

    fn fingerprint(&self, context: &CompileContext, stage: &str) -> FilterResult<String> {
        let op = op_for(context, stage)?;
        let spec = context.spec_for(stage)?;
        let upstream = context
            .graph()?
            .dependencies(stage)
            .iter()
            .map(|d| context.cache_key(d).map(str::to_string))
            .collect::<FilterResult<Vec<_>>>()?;

        let document = json!({
            "reference": op.reference().to_string(),
            "image": image_reference(op, spec, &context.options().component_tag),
            "arguments": context.arguments(stage)?,
            "consumes": op.consumes,
            "produces": context.produced(stage)?,
            "upstream": upstream,
        });

        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(&document)?);
        Ok(hex::encode(hasher.finalize()))
    }
}

impl Default for FingerprintPass {
    fn default() -> Self {
        Self::new()
    }
}

impl CompilerPass for FingerprintPass {
    fn execute(&self, context: &mut CompileContext) -> FilterResult<()> {
        for stage in context.order()? {
            let key = self.fingerprint(context, &stage)?;
            debug!(target: "pipeline::fingerprint", "Stage '{}' cache key {}", stage, key);
            context.set_cache_key(stage, key);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "Fingerprint Stages"
    }
}
