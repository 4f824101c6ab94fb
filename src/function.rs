//! Functions.
//!
//! A [`Function`] is either native (a Rust function pointer) or a user
//! function whose body is an [`Expression`] reading its arguments through
//! `$1`..`$99`.
//!
//! Built-in functions:
//!
//! | Function   | Arguments | Result |
//! |------------|-----------|--------|
//! | `$ZERO`    | none | `0` |
//! | `$ABS`     | 1 | absolute value |
//! | `$FLOOR`   | 1 | rounded down |
//! | `$CEILING` | 1 | rounded up |
//! | `$MIN`     | 2 or more | smallest argument |
//! | `$MAX`     | 2 or more | largest argument |
//! | `$IF`      | 2 or more | `$IF{cond, then, cond, then, ..., else}` |
//! | `$D`       | 1 to 3 | dice: `$D 6`, `$D{2, 6}`, `$D{2, 6, reroll}` |

use crate::error::EvalError;
use crate::eval::Evaluator;
use crate::expression::Expression;
use crate::numeric::{FormulaNumber, StatValue};
use crate::stat_id::FunctionId;
use std::fmt;

/// How many arguments a function accepts.
///
/// `required` arguments must always be given. `max` bounds the total
/// (`None` is unbounded). With a `batch` size, arguments beyond the required
/// ones must come in groups of that size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub required: usize,
    pub max: Option<usize>,
    pub batch: Option<usize>,
}

impl Arity {
    pub fn exactly(count: usize) -> Self {
        Self {
            required: count,
            max: Some(count),
            batch: None,
        }
    }

    pub fn between(required: usize, max: usize) -> Self {
        Self {
            required,
            max: Some(max),
            batch: None,
        }
    }

    pub fn at_least(required: usize) -> Self {
        Self {
            required,
            max: None,
            batch: None,
        }
    }

    pub fn in_batches_of(mut self, batch: usize) -> Self {
        self.batch = Some(batch.max(1));
        self
    }

    pub fn accepts(&self, count: usize) -> bool {
        count >= self.required
            && self.max.map_or(true, |max| count <= max)
            && self
                .batch
                .map_or(true, |batch| (count - self.required) % batch == 0)
    }

    /// Human-readable shape, used in arity errors.
    pub fn describe(&self) -> String {
        let shape = match (self.required, self.max) {
            (0, None) => "any number of arguments".to_string(),
            (0, Some(0)) => "no argument".to_string(),
            (0, Some(max)) => format!("up to {}", plural(max)),
            (required, None) => format!("at least {}", plural(required)),
            (required, Some(max)) if required == max => format!("exactly {}", plural(required)),
            (required, Some(max)) => format!("{} to {} arguments", required, max),
        };
        match self.batch {
            Some(batch) => format!("{}, extra arguments in batches of {}", shape, batch),
            None => shape,
        }
    }
}

fn plural(count: usize) -> String {
    if count == 1 {
        "1 argument".to_string()
    } else {
        format!("{} arguments", count)
    }
}

/// Whether a parameter receives its evaluated value or its expression.
///
/// Expression parameters let a function decide if and how often an argument
/// is evaluated (`$IF` branches, the `$D` reroll).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    Value,
    Expression,
}

/// An argument handed to a native function.
#[derive(Debug, Clone, Copy)]
pub enum Argument<'e> {
    Value(StatValue),
    Expression(&'e Expression),
}

impl Argument<'_> {
    /// The argument's value, evaluating it now if it is an expression.
    pub fn value(&self, ev: &mut Evaluator<'_>) -> Result<StatValue, EvalError> {
        match self {
            Argument::Value(value) => Ok(*value),
            Argument::Expression(expression) => expression.resolve(ev),
        }
    }
}

/// Signature of native functions. Receives the called id for error messages.
pub type NativeFn =
    fn(&mut Evaluator<'_>, &FunctionId, &[Argument<'_>]) -> Result<StatValue, EvalError>;

#[derive(Clone)]
pub enum FunctionBody {
    Native(NativeFn),
    User(Expression),
}

impl fmt::Debug for FunctionBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionBody::Native(_) => f.write_str("Native"),
            FunctionBody::User(body) => f.debug_tuple("User").field(body).finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Function {
    pub id: FunctionId,
    pub arity: Arity,
    /// Kinds of the leading parameters; the last kind repeats for the rest.
    pub parameters: Vec<ParameterKind>,
    pub body: FunctionBody,
}

impl Function {
    pub fn native(id: FunctionId, arity: Arity, body: NativeFn) -> Self {
        Self {
            id,
            arity,
            parameters: Vec::new(),
            body: FunctionBody::Native(body),
        }
    }

    /// A user function. It requires exactly as many arguments as the highest
    /// argument id its body reads.
    pub fn user(id: FunctionId, body: Expression) -> Self {
        let required = body.highest_argument();
        Self {
            id,
            arity: Arity::exactly(required),
            parameters: Vec::new(),
            body: FunctionBody::User(body),
        }
    }

    pub fn with_parameters(mut self, parameters: Vec<ParameterKind>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn parameter_kind(&self, index: usize) -> ParameterKind {
        self.parameters
            .get(index)
            .or(self.parameters.last())
            .copied()
            .unwrap_or(ParameterKind::Value)
    }

    pub(crate) fn takes_expression(&self, index: usize) -> bool {
        self.parameter_kind(index) == ParameterKind::Expression
    }

    pub fn user_body(&self) -> Option<&Expression> {
        match &self.body {
            FunctionBody::User(body) => Some(body),
            FunctionBody::Native(_) => None,
        }
    }
}

fn value_at(ev: &mut Evaluator<'_>, args: &[Argument<'_>], index: usize) -> Result<StatValue, EvalError> {
    match args.get(index) {
        Some(argument) => argument.value(ev),
        None => Err(EvalError::MissingArgument { index: index + 1 }),
    }
}

fn zero(_: &mut Evaluator<'_>, _: &FunctionId, _: &[Argument<'_>]) -> Result<StatValue, EvalError> {
    Ok(0.0)
}

fn abs(ev: &mut Evaluator<'_>, _: &FunctionId, args: &[Argument<'_>]) -> Result<StatValue, EvalError> {
    Ok(value_at(ev, args, 0)?.abs())
}

fn floor(ev: &mut Evaluator<'_>, _: &FunctionId, args: &[Argument<'_>]) -> Result<StatValue, EvalError> {
    Ok(value_at(ev, args, 0)?.floor())
}

fn ceiling(ev: &mut Evaluator<'_>, _: &FunctionId, args: &[Argument<'_>]) -> Result<StatValue, EvalError> {
    Ok(value_at(ev, args, 0)?.ceil())
}

fn min(ev: &mut Evaluator<'_>, _: &FunctionId, args: &[Argument<'_>]) -> Result<StatValue, EvalError> {
    let mut result = value_at(ev, args, 0)?;
    for argument in &args[1..] {
        result = result.min(argument.value(ev)?);
    }
    Ok(result)
}

fn max(ev: &mut Evaluator<'_>, _: &FunctionId, args: &[Argument<'_>]) -> Result<StatValue, EvalError> {
    let mut result = value_at(ev, args, 0)?;
    for argument in &args[1..] {
        result = result.max(argument.value(ev)?);
    }
    Ok(result)
}

/// Condition/branch pairs, then an optional trailing else. Only the chosen
/// branch is evaluated; `0` when nothing matches.
fn if_(ev: &mut Evaluator<'_>, _: &FunctionId, args: &[Argument<'_>]) -> Result<StatValue, EvalError> {
    for chunk in args.chunks(2) {
        match chunk {
            [condition, branch] => {
                if condition.value(ev)?.is_truthy() {
                    return branch.value(ev);
                }
            }
            [otherwise] => return otherwise.value(ev),
            _ => {}
        }
    }
    Ok(0.0)
}

/// Most dice a single `$D` call may roll.
pub const MAX_DICE: u64 = 10_000;

/// `$D faces`, `$D{count, faces}` or `$D{count, faces, reroll}`.
///
/// The reroll expression is evaluated with the total as `$1`.
fn dice(ev: &mut Evaluator<'_>, id: &FunctionId, args: &[Argument<'_>]) -> Result<StatValue, EvalError> {
    let (count, faces) = if args.len() == 1 {
        (1.0, value_at(ev, args, 0)?)
    } else {
        (value_at(ev, args, 0)?, value_at(ev, args, 1)?)
    };

    if !(1.0..=u32::MAX as StatValue).contains(&faces) {
        return Err(EvalError::InvalidArgument {
            function: id.clone(),
            reason: format!("a die needs at least one face, got {}", faces),
        });
    }
    if count > MAX_DICE as StatValue {
        return Err(EvalError::InvalidArgument {
            function: id.clone(),
            reason: format!("cannot roll more than {} dice, got {}", MAX_DICE, count),
        });
    }
    let faces = faces as u32;
    let count = if count > 0.0 { count as u64 } else { 0 };

    let mut total = 0.0;
    for _ in 0..count {
        total += StatValue::from(ev.roll(faces));
    }

    match args.get(2) {
        Some(reroll) => {
            let reroll = *reroll;
            ev.with_frame(id, vec![total], 0, |ev| reroll.value(ev))
        }
        None => Ok(total),
    }
}

fn builtin_id(name: &'static str) -> FunctionId {
    FunctionId::builtin(name)
}

/// The functions every [`FunctionService`](crate::FunctionService) starts with.
pub fn builtins() -> Vec<Function> {
    vec![
        Function::native(builtin_id("$ZERO"), Arity::exactly(0), zero),
        Function::native(builtin_id("$ABS"), Arity::exactly(1), abs),
        Function::native(builtin_id("$FLOOR"), Arity::exactly(1), floor),
        Function::native(builtin_id("$CEILING"), Arity::exactly(1), ceiling),
        Function::native(builtin_id("$MIN"), Arity::at_least(2), min),
        Function::native(builtin_id("$MAX"), Arity::at_least(2), max),
        Function::native(builtin_id("$IF"), Arity::at_least(2), if_)
            .with_parameters(vec![ParameterKind::Expression]),
        Function::native(builtin_id("$D"), Arity::between(1, 3), dice).with_parameters(vec![
            ParameterKind::Value,
            ParameterKind::Value,
            ParameterKind::Expression,
        ]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_accepts() {
        assert!(Arity::exactly(1).accepts(1));
        assert!(!Arity::exactly(1).accepts(0));
        assert!(!Arity::exactly(1).accepts(2));
        assert!(Arity::at_least(2).accepts(7));
        assert!(Arity::between(1, 3).accepts(3));
        assert!(!Arity::between(1, 3).accepts(4));

        let batched = Arity::at_least(2).in_batches_of(2);
        assert!(batched.accepts(2));
        assert!(batched.accepts(4));
        assert!(!batched.accepts(3));
    }

    #[test]
    fn test_arity_describe() {
        assert_eq!(Arity::exactly(0).describe(), "no argument");
        assert_eq!(Arity::exactly(1).describe(), "exactly 1 argument");
        assert_eq!(Arity::exactly(3).describe(), "exactly 3 arguments");
        assert_eq!(Arity::at_least(2).describe(), "at least 2 arguments");
        assert_eq!(Arity::between(1, 3).describe(), "1 to 3 arguments");
        assert_eq!(Arity::between(0, 2).describe(), "up to 2 arguments");
        assert_eq!(Arity::at_least(0).describe(), "any number of arguments");
        assert_eq!(
            Arity::at_least(2).in_batches_of(2).describe(),
            "at least 2 arguments, extra arguments in batches of 2"
        );
    }

    #[test]
    fn test_parameter_kinds_repeat() {
        let function = Function::native(builtin_id("$IF"), Arity::at_least(2), if_)
            .with_parameters(vec![ParameterKind::Expression]);
        assert_eq!(function.parameter_kind(5), ParameterKind::Expression);

        let plain = Function::native(builtin_id("$ABS"), Arity::exactly(1), abs);
        assert_eq!(plain.parameter_kind(0), ParameterKind::Value);
    }

    #[test]
    fn test_user_function_arity() {
        use crate::node::{BinaryOperator, FunctionCall, Node};

        let body = Expression::new(vec![
            Node::Function(FunctionCall::new(builtin_id("$1"))),
            Node::Binary(BinaryOperator::Add),
            Node::Function(FunctionCall::new(builtin_id("$3"))),
        ]);
        let function = Function::user(builtin_id("$SUM3"), body);
        assert_eq!(function.arity, Arity::exactly(3));
        assert!(function.user_body().is_some());
    }

    #[test]
    fn test_builtins_unique() {
        let functions = builtins();
        let mut ids: Vec<_> = functions.iter().map(|f| f.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), functions.len());
    }
}
