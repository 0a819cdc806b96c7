use crate::error::{FilterError, FilterResult};
use std::time::Duration;

use super::context::CompileContext;

/// A single step of pipeline compilation
///
/// Each pass reads the declared pipeline and the state left by earlier passes
/// from the context, and records its own findings there. Passes run
/// sequentially in the order they were added to the compiler.
///
/// # Example
/// ```
/// use datacomp_filter::error::FilterResult;
/// use datacomp_filter::pipeline::{CompileContext, CompilerPass};
///
/// struct CountStages;
///
/// impl CompilerPass for CountStages {
///     fn execute(&self, context: &mut CompileContext) -> FilterResult<()> {
///         let count = context.pipeline().stage_count();
///         context.set_metadata("stage_count", count.to_string());
///         Ok(())
///     }
///
///     fn name(&self) -> &str {
///         "Count Stages"
///     }
/// }
/// ```
pub trait CompilerPass: Send + Sync {
    /// Run this pass
    ///
    /// Returning an error stops compilation.
    fn execute(&self, context: &mut CompileContext) -> FilterResult<()>;

    /// Pass name for logging and reports
    fn name(&self) -> &str;

    /// Check if this pass should be skipped based on context
    fn should_skip(&self, _context: &CompileContext) -> bool {
        false
    }

    /// Called before execute() - useful for validation
    fn pre_execute(&self, _context: &CompileContext) -> FilterResult<()> {
        Ok(())
    }

    /// Called after execute()
    fn post_execute(&self, _context: &CompileContext) -> FilterResult<()> {
        Ok(())
    }
}

/// Result of a single compiler pass
#[derive(Debug, Clone)]
pub struct PassResult {
    pub pass_name: String,
    pub success: bool,
    pub error: Option<String>,
    pub duration: Duration,
    pub skipped: bool,
}

impl PassResult {
    pub fn success(pass_name: impl Into<String>, duration: Duration) -> Self {
        Self {
            pass_name: pass_name.into(),
            success: true,
            error: None,
            duration,
            skipped: false,
        }
    }

    pub fn failure(
        pass_name: impl Into<String>,
        error: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            pass_name: pass_name.into(),
            success: false,
            error: Some(error.into()),
            duration,
            skipped: false,
        }
    }

    pub fn skipped(pass_name: impl Into<String>) -> Self {
        Self {
            pass_name: pass_name.into(),
            success: true,
            error: None,
            duration: Duration::from_secs(0),
            skipped: true,
        }
    }
}

/// Result of a complete compilation
#[derive(Debug, Clone)]
pub struct CompileReport {
    pub pipeline_name: String,
    pub success: bool,
    pub pass_results: Vec<PassResult>,
    pub total_duration: Duration,
    pub error: Option<String>,
}

impl CompileReport {
    pub fn success(
        pipeline_name: impl Into<String>,
        pass_results: Vec<PassResult>,
        total_duration: Duration,
    ) -> Self {
        Self {
            pipeline_name: pipeline_name.into(),
            success: true,
            pass_results,
            total_duration,
            error: None,
        }
    }

    pub fn failure(
        pipeline_name: impl Into<String>,
        pass_results: Vec<PassResult>,
        error: impl Into<String>,
        total_duration: Duration,
    ) -> Self {
        Self {
            pipeline_name: pipeline_name.into(),
            success: false,
            pass_results,
            total_duration,
            error: Some(error.into()),
        }
    }

    /// Number of passes that ran (not skipped)
    pub fn executed_passes(&self) -> usize {
        self.pass_results.iter().filter(|r| !r.skipped).count()
    }

    pub fn skipped_passes(&self) -> usize {
        self.pass_results.iter().filter(|r| r.skipped).count()
    }

    pub fn failed_pass(&self) -> Option<&PassResult> {
        self.pass_results.iter().find(|r| !r.success)
    }

    /// `FilterError::CompileFailed` naming the first failed pass, if any
    pub fn ensure_success(&self) -> FilterResult<()> {
        match self.failed_pass() {
            Some(failed) => Err(FilterError::CompileFailed {
                pass: failed.pass_name.clone(),
                error: failed.error.clone().unwrap_or_default(),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_success_names_failed_pass() {
        let report = CompileReport::failure(
            "p",
            vec![
                PassResult::success("Resolve Order", Duration::from_millis(1)),
                PassResult::failure("Check Arguments", "bad argument", Duration::from_millis(2)),
            ],
            "bad argument",
            Duration::from_millis(3),
        );
        match report.ensure_success() {
            Err(FilterError::CompileFailed { pass, error }) => {
                assert_eq!(pass, "Check Arguments");
                assert_eq!(error, "bad argument");
            }
            other => panic!("expected CompileFailed, got {:?}", other),
        }

        let report = CompileReport::success("p", vec![], Duration::from_millis(1));
        assert!(report.ensure_success().is_ok());
    }

    #[test]
    fn test_pass_result_failure() {
        let result = PassResult::failure("Arguments", "bad argument", Duration::from_millis(3));
        assert!(!result.success);
        assert_eq!(result.error, Some("bad argument".to_string()));
        assert!(!result.skipped);
    }

    #[test]
    fn test_pass_result_skipped() {
        let result = PassResult::skipped("Write Manifest");
        assert!(result.success);
        assert!(result.skipped);
        assert_eq!(result.duration, Duration::from_secs(0));
    }

    #[test]
    fn test_report_counts() {
        let results = vec![
            PassResult::success("Order", Duration::from_millis(1)),
            PassResult::skipped("Write Manifest"),
        ];
        let report = CompileReport::success("p", results, Duration::from_millis(1));

        assert!(report.success);
        assert_eq!(report.executed_passes(), 1);
        assert_eq!(report.skipped_passes(), 1);
        assert!(report.failed_pass().is_none());
    }

    #[test]
    fn test_report_failure() {
        let results = vec![
            PassResult::success("Order", Duration::from_millis(1)),
            PassResult::failure("Columns", "missing column", Duration::from_millis(1)),
        ];
        let report =
            CompileReport::failure("p", results, "missing column", Duration::from_millis(2));

        assert!(!report.success);
        assert_eq!(report.failed_pass().unwrap().pass_name, "Columns");
    }
}
