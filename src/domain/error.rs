//! Domain error types.

/// A parse error with position information for expression parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }

    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Failure of a single expression evaluation.
///
/// Never crosses the dispatch boundary: callers log it and treat the
/// expression as failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    #[error(transparent)]
    Syntax(#[from] ParseError),

    #[error("{function} out of range: shift {shift}, length {length}")]
    Range {
        function: String,
        shift: usize,
        length: usize,
    },

    #[error("invalid argument for {function}: {reason}")]
    InvalidArgument { function: String, reason: String },

    #[error("type error: {reason}")]
    Type { reason: String },
}

impl ExprError {
    pub fn range(function: &str, shift: usize, length: usize) -> Self {
        ExprError::Range {
            function: function.to_string(),
            shift,
            length,
        }
    }

    pub fn invalid(function: &str, reason: impl Into<String>) -> Self {
        ExprError::InvalidArgument {
            function: function.to_string(),
            reason: reason.into(),
        }
    }
}

/// Top-level error type for ruleflow.
#[derive(Debug, thiserror::Error)]
pub enum RuleflowError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Expr(#[from] ExprError),

    #[error("validation failed for node '{node}': {reason}")]
    Validation { node: String, reason: String },

    #[error("decision graph has no \"start\" node")]
    MissingStart,

    #[error("decision graph has a cycle through node '{node}'")]
    Cycle { node: String },

    #[error("order field '{field}' of node '{node}' did not resolve: {reason}")]
    UnresolvedField {
        node: String,
        field: String,
        reason: String,
    },

    #[error("invalid bot definition {bot}: {reason}")]
    BotConfig { bot: String, reason: String },

    #[error("shard channel closed: {reason}")]
    Channel { reason: String },

    #[error("bar stream {stream} stale for {idle_secs}s")]
    StaleStream { stream: String, idle_secs: u64 },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<ParseError> for RuleflowError {
    fn from(err: ParseError) -> Self {
        RuleflowError::Expr(ExprError::Syntax(err))
    }
}

impl From<&RuleflowError> for std::process::ExitCode {
    fn from(err: &RuleflowError) -> Self {
        let code: u8 = match err {
            RuleflowError::Io(_) | RuleflowError::Json(_) => 1,
            RuleflowError::ConfigParse { .. }
            | RuleflowError::ConfigMissing { .. }
            | RuleflowError::ConfigInvalid { .. } => 2,
            RuleflowError::Database { .. } | RuleflowError::DatabaseQuery { .. } => 3,
            RuleflowError::Expr(_)
            | RuleflowError::Validation { .. }
            | RuleflowError::MissingStart
            | RuleflowError::Cycle { .. }
            | RuleflowError::UnresolvedField { .. }
            | RuleflowError::BotConfig { .. } => 4,
            RuleflowError::StaleStream { .. } => 5,
            RuleflowError::Channel { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
