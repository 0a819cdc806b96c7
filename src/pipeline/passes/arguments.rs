use super::op_for;
use crate::error::{FilterError, FilterResult};
use crate::pipeline::catalog::ArgumentType;
use crate::pipeline::{CompileContext, CompilerPass};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Pass that checks stage arguments against the component catalog
///
/// Every supplied argument must be declared by the component and match its
/// type. Declared defaults are filled in, `null` values are dropped, and a
/// required argument without a default must be supplied.
///
/// # Context Requirements
/// - stage graph (OrderPass)
///
/// # Context Outputs
/// - resolved arguments per stage (`CompileContext::arguments`)
pub struct ArgumentsPass;

impl ArgumentsPass {
    pub fn new() -> Self {
        Self
    }

    fn resolve(
        &self,
        context: &CompileContext,
        stage: &str,
    ) -> FilterResult<BTreeMap<String, Value>> {
        let op = op_for(context, stage)?;
        let spec = context.spec_for(stage)?;
        let mut resolved = BTreeMap::new();

        for (key, value) in &op.arguments {
            let declared = spec.arguments.get(key).ok_or_else(|| FilterError::UnknownArgument {
                stage: stage.to_string(),
                argument: key.clone(),
            })?;

            if value.is_null() {
                continue;
            }

            if !declared.kind.accepts(value) {
                return Err(FilterError::ArgumentType {
                    stage: stage.to_string(),
                    argument: key.clone(),
                    expected: declared.kind.to_string(),
                    actual: ArgumentType::describe(value).to_string(),
                });
            }
            resolved.insert(key.clone(), value.clone());
        }

        for (key, declared) in &spec.arguments {
            if resolved.contains_key(key) {
                continue;
            }
            match &declared.default {
                Some(default) => {
                    resolved.insert(key.clone(), default.clone());
                }
                None if declared.optional => {}
                None => {
                    return Err(FilterError::MissingArgument {
                        stage: stage.to_string(),
                        argument: key.clone(),
                    })
                }
            }
        }

        Ok(resolved)
    }
}

impl Default for ArgumentsPass {
    fn default() -> Self {
        Self::new()
    }
}

impl CompilerPass for ArgumentsPass {
    fn execute(&self, context: &mut CompileContext) -> FilterResult<()> {
        for stage in context.order()? {
            let resolved = self.resolve(context, &stage)?;
            debug!(
                target: "pipeline::arguments",
                "Stage '{}' arguments: {}",
                stage,
                serde_json::to_string(&resolved)?
            );
            context.set_arguments(stage, resolved);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "Check Arguments"
    }
}
