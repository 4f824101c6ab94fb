//! Error types.
//!
//! Validation problems are reported as [`StatError`] values. Parsing and
//! registry mutations collect every error they find and return them together,
//! so a caller sees all problems in an expression at once.
//!
//! Conditions that can only surface while computing a value (runaway
//! recursion, a missing call argument) are [`EvalError`]s.

use crate::stat_id::{FunctionId, StatId, VariableId};
use thiserror::Error;

/// Format a cycle path as a readable string.
fn format_cycle_path(path: &[StatId]) -> String {
    if path.is_empty() {
        return String::from("(empty cycle)");
    }
    path.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Errors reported while validating expressions or mutating the registries.
///
/// # Examples
///
/// ```rust
/// use statexpr::{StatError, StatId};
///
/// let err = StatError::UndefinedStat(StatId::new("DEX").unwrap());
/// assert_eq!(err.to_string(), "Undefined stat: DEX");
/// ```
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StatError {
    #[error("Empty expression")]
    EmptyExpression,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Expected operand before operator '{operator}' but found {found}")]
    MissingLeftOperand { operator: String, found: String },

    #[error("Expected operand after operator '{operator}' but found {found}")]
    MissingRightOperand { operator: String, found: String },

    /// Two operands (or an operand and a function) follow each other.
    #[error("Missing operator before {0}")]
    MissingOperator(String),

    #[error("Expected expression inside parenthesis")]
    EmptyParenthesis,

    #[error("Missing closing parenthesis")]
    UnclosedParenthesis,

    #[error("Unexpected closing parenthesis")]
    UnexpectedClosingParenthesis,

    #[error("Missing closing bracket for function {0}")]
    UnclosedBracket(FunctionId),

    #[error("Unexpected opening bracket: brackets must follow a function")]
    UnexpectedBracket,

    #[error("Unexpected closing bracket")]
    UnexpectedClosingBracket,

    #[error("Expected argument before ',' but found {0}")]
    ArgumentExpectedBefore(String),

    #[error("Expected argument after ',' but found {0}")]
    ArgumentExpectedAfter(String),

    #[error("Argument separator ',' outside of function arguments")]
    MisplacedSeparator,

    #[error("Function {function} expects {expected} but got {found}")]
    Arity {
        function: FunctionId,
        expected: String,
        found: usize,
    },

    #[error("Undefined stat: {0}")]
    UndefinedStat(StatId),

    #[error("Undefined variable: {0}")]
    UndefinedVariable(VariableId),

    #[error("Undefined function: {0}")]
    UndefinedFunction(FunctionId),

    #[error("Invalid stat id: {0}")]
    InvalidStatId(String),

    #[error("Invalid variable id: {0}")]
    InvalidVariableId(String),

    #[error("Invalid function id: {0}")]
    InvalidFunctionId(String),

    #[error("Stat already exists: {0}")]
    DuplicateStat(StatId),

    #[error("Function already exists: {0}")]
    DuplicateFunction(FunctionId),

    #[error("Stat does not exist: {0}")]
    UnknownStat(StatId),

    /// A dependency cycle was detected.
    ///
    /// Contains the path of stats involved, closing back on the first one:
    /// `[A, D, F, A]`.
    #[error("Circular dependency detected: {}", format_cycle_path(.path))]
    Cycle { path: Vec<StatId> },

    #[error("Cannot remove {stat}: {dependent} depends on it")]
    HasDependents { stat: StatId, dependent: StatId },

    #[error("Cannot remove {stat}: function {function} depends on it")]
    UsedByFunction { stat: StatId, function: FunctionId },

    #[error("Variable {0} cannot reference its own stat")]
    SelfReferencingVariable(VariableId),

    #[error("Variable {0} is reserved")]
    ReservedVariable(VariableId),

    #[error("Variable {variable} does not belong to stat {stat}")]
    ForeignVariable { variable: VariableId, stat: StatId },

    #[error("Expression {name} already exists in stat {stat}")]
    DuplicateExpression { stat: StatId, name: String },

    #[error("Expression {name} does not exist in stat {stat}")]
    UnknownExpression { stat: StatId, name: String },

    /// An error prefixed with its position in a larger document.
    #[error("{line}:{column} {source}")]
    Located {
        line: usize,
        column: usize,
        source: Box<StatError>,
    },
}

impl StatError {
    /// Attach a `line:column` position supplied by the caller.
    pub fn located(self, line: usize, column: usize) -> Self {
        StatError::Located {
            line,
            column,
            source: Box::new(self),
        }
    }
}

/// Errors that stop the evaluation of a value.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("Recursion limit of {limit} exceeded while calling {function}")]
    RecursionLimit { function: FunctionId, limit: usize },

    /// An argument id read past the arguments of the current call.
    #[error("Missing argument ${index}")]
    MissingArgument { index: usize },

    #[error("Function {function} requires {required} arguments but was called with {found}")]
    NotEnoughArguments {
        function: FunctionId,
        required: usize,
        found: usize,
    },

    #[error("Invalid argument for {function}: {reason}")]
    InvalidArgument { function: FunctionId, reason: String },

    #[error("Stat does not exist: {0}")]
    UnknownStat(StatId),

    #[error("Variable does not exist: {0}")]
    UnknownVariable(VariableId),

    #[error("Function does not exist: {0}")]
    UnknownFunction(FunctionId),

    #[error("Not a stat or variable id: {0}")]
    InvalidId(String),

    #[error("Expression could not be reduced to a value: {0}")]
    Unreduced(String),
}

/// Errors loading an [`EngineConfig`](crate::config::EngineConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid engine configuration: {0}")]
    Json(#[from] serde_json::Error),
}
