use thiserror::Error;

/// Central error type for pipeline declaration and compilation
#[derive(Error, Debug)]
pub enum FilterError {
    // ============================================================================
    // Definition Errors
    // ============================================================================
    #[error("Invalid pipeline name: {0}")]
    InvalidPipelineName(String),

    #[error("Duplicate stage name: {0}")]
    DuplicateStage(String),

    #[error("Stage not found: {0}")]
    StageNotFound(String),

    #[error("Invalid component reference: {0}")]
    InvalidReference(String),

    #[error("Invalid operation for stage '{stage}': {reason}")]
    InvalidOperation { stage: String, reason: String },

    // ============================================================================
    // Graph Errors
    // ============================================================================
    #[error("Stage '{stage}' depends on unknown stage '{dependency}'")]
    MissingDependency { stage: String, dependency: String },

    #[error("Dependency cycle detected between stages: {0}")]
    CycleDetected(String),

    // ============================================================================
    // Component/Argument Errors
    // ============================================================================
    #[error("Component not found in catalog: {0}")]
    UnknownComponent(String),

    #[error("Stage '{stage}' does not accept argument '{argument}'")]
    UnknownArgument { stage: String, argument: String },

    #[error("Stage '{stage}' is missing required argument '{argument}'")]
    MissingArgument { stage: String, argument: String },

    #[error("Stage '{stage}' argument '{argument}' expects {expected}, got {actual}")]
    ArgumentType {
        stage: String,
        argument: String,
        expected: String,
        actual: String,
    },

    // ============================================================================
    // Schema Errors
    // ============================================================================
    #[error("Stage '{stage}' consumes column '{column}' which is not in the dataset")]
    MissingColumn { stage: String, column: String },

    #[error("Stage '{stage}' column '{column}' expects {expected}, dataset has {actual}")]
    SchemaMismatch {
        stage: String,
        column: String,
        expected: String,
        actual: String,
    },

    // ============================================================================
    // Resource Errors
    // ============================================================================
    #[error("Invalid resources for stage '{stage}': {reason}")]
    InvalidResources { stage: String, reason: String },

    #[error("Unsupported accelerator: {0}")]
    UnsupportedAccelerator(String),

    // ============================================================================
    // Compilation Errors
    // ============================================================================
    #[error("Compilation error: {0}")]
    CompileError(String),

    #[error("Compilation failed at pass '{pass}': {error}")]
    CompileFailed { pass: String, error: String },

    // ============================================================================
    // File System Errors
    // ============================================================================
    #[error("Failed to create directory: {0}")]
    DirectoryCreationFailed(String),

    #[error("Invalid file path: {0}")]
    InvalidPath(String),

    // ============================================================================
    // Generic/System Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("{0}")]
    GenericError(String),

    /// Builder pattern validation error
    #[error("Builder error: {0}")]
    BuilderError(String),
}

// Automatic conversion from String
impl From<String> for FilterError {
    fn from(err: String) -> Self {
        FilterError::GenericError(err)
    }
}

// Automatic conversion from &str
impl From<&str> for FilterError {
    fn from(err: &str) -> Self {
        FilterError::GenericError(err.to_string())
    }
}

// Helper type alias for Results
pub type FilterResult<T> = Result<T, FilterError>;
