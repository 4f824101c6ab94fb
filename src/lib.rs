//! # statexpr - Formula Interpreter for Tabletop RPG Stats
//!
//! A small expression language for character sheets:
//! - **Stats** defined by formulas over other stats (`ATK = FOR * 2 + 5`)
//! - **Variables** owned by a stat (`FOR.base`, or `.base` inside `FOR`)
//! - **Functions**, built in (`$MAX`, `$IF`, `$D`...) or user-defined and
//!   recursive, reading their arguments as `$1`..`$99`
//!
//! ## Core Concepts
//!
//! ### Formula Pipeline
//!
//! Every formula goes through the same steps:
//!
//! ```text
//! raw text → [tokenizer] → nodes → [parser] → Expression → [evaluator] → f64
//! ```
//!
//! 1. **Tokenizing** splits the text and classifies each token
//! 2. **Parsing** validates the whole sequence, collecting every error
//! 3. **Evaluation** reduces operators by descending priority
//!
//! ### Stat Pipeline
//!
//! A stat holds an ordered list of named expressions folded into a running
//! value that starts at `0`. An expression that reads `<stat>.value` replaces
//! the running value; any other expression adds to it.
//!
//! ### Key Features
//!
//! - **All-or-nothing mutations**: a change commits only if it has no errors
//! - **Cycle Detection**: circular definitions are rejected with their full path
//! - **Caching**: resolved stats are cached until the next mutation
//! - **Bounded recursion**: runaway user functions fail with an error
//! - **Debug-Friendly**: per-expression breakdown of any stat
//!
//! ## Example
//!
//! ```rust
//! use statexpr::*;
//!
//! let mut stats = StatService::new();
//! stats.add("FOR", Some(".base + .bonus")).unwrap();
//! stats.add_or_update_variable("FOR.base", "12").unwrap();
//! stats.add("ATK", Some("$MAX{FOR - 10, 0} * 2")).unwrap();
//!
//! assert_eq!(stats.get_value("ATK").unwrap(), 4.0);
//!
//! // A stat cannot end up depending on itself
//! let errors = stats.add_or_update_variable("FOR.bonus", "ATK").unwrap_err();
//! assert_eq!(errors.len(), 1);
//! ```
//!
//! ## Modules
//!
//! - [`stat_id`] - Stat, variable and function identifiers
//! - [`tokenizer`] - Raw text to nodes
//! - [`node`] - Syntax nodes, operators and validation rules
//! - [`parser`] - Formula parser
//! - [`expression`] - Parsed expressions and their evaluation
//! - [`eval`] - Evaluation context and argument call stack
//! - [`function`] - Functions, arities and built-ins
//! - [`function_service`] - Function registry
//! - [`stat`] - Stats and their expression pipeline
//! - [`stat_service`] - Stat registry
//! - [`graph`] - Dependency graph management
//! - [`resolved`] - Resolved stat breakdowns
//! - [`context`] - Parsing context
//! - [`config`] - Engine configuration
//! - [`error`] - Error types

pub mod config;
pub mod context;
pub mod error;
pub mod eval;
pub mod expression;
pub mod function;
pub mod function_service;
pub mod graph;
pub mod node;
pub mod numeric;
pub mod parser;
pub mod resolved;
pub mod stat;
pub mod stat_id;
pub mod stat_service;
pub mod tokenizer;

// Re-export main types for convenience
pub use config::EngineConfig;
pub use context::ParsingContext;
pub use error::{ConfigError, EvalError, StatError};
pub use eval::Evaluator;
pub use expression::{Expression, NamedExpression, Position};
pub use resolved::{Contribution, FoldMode, ResolvedStat};
pub use stat::Stat;
pub use stat_id::{FunctionId, StatId, VariableId};
pub use stat_service::StatService;

// Re-export function types
pub use function::{Argument, Arity, Function, ParameterKind};
pub use function_service::FunctionService;

pub use numeric::{FormulaNumber, StatValue};
