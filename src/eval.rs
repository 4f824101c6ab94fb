//! Evaluation context.
//!
//! An [`Evaluator`] lives for one top-level resolution. It borrows the stat
//! and function registries, the random source and the value cache, and owns
//! the per-call state:
//!
//! - the argument call stack read by `$1`..`$99`
//! - the running values of the stats currently being folded, read through
//!   `<stat>.value`

use crate::error::EvalError;
use crate::expression::Expression;
use crate::function::{Argument, Function, FunctionBody};
use crate::node::Node;
use crate::numeric::StatValue;
use crate::resolved::ResolvedStat;
use crate::stat::Stat;
use crate::stat_id::{FunctionId, StatId, VariableId};
use rand::{Rng, RngCore};
use std::collections::HashMap;

/// Stack space kept free before growing onto a new segment.
const RED_ZONE: usize = 100 * 1024;

/// Size of each newly allocated stack segment.
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Run `f`, growing the native stack first if it is nearly exhausted.
#[inline]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

/// State of one top-level resolution.
///
/// Created by [`StatService`](crate::StatService) for every value request and
/// handed to native functions, which use it to evaluate their expression
/// arguments, read `$N` or roll dice.
///
/// # Examples
///
/// ```rust
/// use statexpr::{Argument, Arity, EvalError, Evaluator, Function, FunctionId, StatService};
///
/// fn twice(ev: &mut Evaluator<'_>, _: &FunctionId, args: &[Argument<'_>]) -> Result<f64, EvalError> {
///     Ok(args[0].value(ev)? * 2.0)
/// }
///
/// let mut stats = StatService::new();
/// let id = FunctionId::new("$TWICE").unwrap();
/// stats
///     .functions_mut()
///     .add(Function::native(id, Arity::exactly(1), twice))
///     .unwrap();
/// stats.add("A", Some("$TWICE 4")).unwrap();
/// assert_eq!(stats.get_value("A").unwrap(), 8.0);
/// ```
pub struct Evaluator<'a> {
    stats: &'a HashMap<StatId, Stat>,
    functions: &'a HashMap<FunctionId, Function>,
    rng: &'a mut dyn RngCore,
    cache: &'a mut HashMap<StatId, StatValue>,
    max_call_depth: usize,
    frames: Vec<Vec<StatValue>>,
    running: Vec<(StatId, StatValue)>,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(
        stats: &'a HashMap<StatId, Stat>,
        functions: &'a HashMap<FunctionId, Function>,
        rng: &'a mut dyn RngCore,
        cache: &'a mut HashMap<StatId, StatValue>,
        max_call_depth: usize,
    ) -> Self {
        Self {
            stats,
            functions,
            rng,
            cache,
            max_call_depth,
            frames: vec![Vec::new()],
            running: Vec::new(),
        }
    }

    /// Value of a single node.
    pub fn evaluate_node(&mut self, node: &Node) -> Result<StatValue, EvalError> {
        match node {
            Node::Number(value) => Ok(*value),
            Node::Stat(id) => self.stat_value(id),
            Node::Variable(id) => self.variable_value(id),
            Node::Function(call) => self.call(&call.id, &call.arguments),
            Node::Group(inner) => ensure_sufficient_stack(|| inner.resolve(self)),
            Node::Unary(op, Some(operand)) => {
                let operand = ensure_sufficient_stack(|| operand.resolve(self))?;
                Ok(op.apply(operand))
            }
            other => Err(EvalError::Unreduced(other.to_string())),
        }
    }

    /// Resolved value of a stat, computed once per cache lifetime.
    pub fn stat_value(&mut self, id: &StatId) -> Result<StatValue, EvalError> {
        if let Some(&value) = self.cache.get(id) {
            tracing::trace!(stat = %id, value, "cache hit");
            return Ok(value);
        }
        let stats = self.stats;
        let stat = stats
            .get(id)
            .ok_or_else(|| EvalError::UnknownStat(id.clone()))?;
        let value = ensure_sufficient_stack(|| stat.resolve(self))?;
        tracing::trace!(stat = %id, value, "resolved");
        self.cache.insert(id.clone(), value);
        Ok(value)
    }

    /// Resolve a stat with its per-expression breakdown and cache its value.
    pub(crate) fn stat_breakdown(&mut self, id: &StatId) -> Result<ResolvedStat, EvalError> {
        let stats = self.stats;
        let stat = stats
            .get(id)
            .ok_or_else(|| EvalError::UnknownStat(id.clone()))?;
        let resolved = stat.resolve_with_breakdown(self)?;
        self.cache.insert(id.clone(), resolved.value);
        Ok(resolved)
    }

    /// Value of a variable, resolved on every access.
    ///
    /// `<stat>.value` reads the running value while `stat` is being folded
    /// and its resolved value otherwise.
    pub fn variable_value(&mut self, id: &VariableId) -> Result<StatValue, EvalError> {
        if id.is_value() {
            if let Some(&(_, running)) = self.running.iter().rev().find(|(s, _)| s == id.stat()) {
                return Ok(running);
            }
            return self.stat_value(id.stat());
        }

        let stats = self.stats;
        let expression = stats
            .get(id.stat())
            .and_then(|stat| stat.variable(id))
            .ok_or_else(|| EvalError::UnknownVariable(id.clone()))?;
        ensure_sufficient_stack(|| expression.resolve(self))
    }

    pub(crate) fn begin_fold(&mut self, stat: &StatId) {
        self.running.push((stat.clone(), 0.0));
    }

    pub(crate) fn set_running(&mut self, value: StatValue) {
        if let Some(top) = self.running.last_mut() {
            top.1 = value;
        }
    }

    pub(crate) fn end_fold(&mut self) {
        self.running.pop();
    }

    /// Call a function with unevaluated argument expressions.
    pub fn call(&mut self, id: &FunctionId, arguments: &[Expression]) -> Result<StatValue, EvalError> {
        if let Some(index) = id.argument_index() {
            return self.argument(index);
        }

        let functions = self.functions;
        let function = functions
            .get(id)
            .ok_or_else(|| EvalError::UnknownFunction(id.clone()))?;
        match &function.body {
            FunctionBody::Native(native) => {
                if arguments.len() < function.arity.required {
                    return Err(EvalError::NotEnoughArguments {
                        function: id.clone(),
                        required: function.arity.required,
                        found: arguments.len(),
                    });
                }
                let mut values = Vec::with_capacity(arguments.len());
                for (i, argument) in arguments.iter().enumerate() {
                    values.push(if function.takes_expression(i) {
                        Argument::Expression(argument)
                    } else {
                        Argument::Value(argument.resolve(self)?)
                    });
                }
                native(self, id, &values)
            }
            FunctionBody::User(body) => {
                let values = arguments
                    .iter()
                    .map(|argument| argument.resolve(self))
                    .collect::<Result<Vec<_>, _>>()?;
                self.with_frame(id, values, function.arity.required, |ev| body.resolve(ev))
            }
        }
    }

    /// Read argument `$index` of the current call.
    pub fn argument(&self, index: usize) -> Result<StatValue, EvalError> {
        self.frames
            .last()
            .and_then(|frame| frame.get(index - 1))
            .copied()
            .ok_or(EvalError::MissingArgument { index })
    }

    /// Run `body` with a new argument frame.
    ///
    /// Trailing arguments the call does not supply are taken from the
    /// caller's frame, so a function calling itself with fewer arguments
    /// keeps the rest.
    pub fn with_frame(
        &mut self,
        function: &FunctionId,
        arguments: Vec<StatValue>,
        required: usize,
        body: impl FnOnce(&mut Self) -> Result<StatValue, EvalError>,
    ) -> Result<StatValue, EvalError> {
        if self.frames.len() > self.max_call_depth {
            return Err(EvalError::RecursionLimit {
                function: function.clone(),
                limit: self.max_call_depth,
            });
        }

        let mut frame = arguments;
        if let Some(caller) = self.frames.last() {
            if caller.len() > frame.len() {
                frame.extend_from_slice(&caller[frame.len()..]);
            }
        }
        if frame.len() < required {
            return Err(EvalError::NotEnoughArguments {
                function: function.clone(),
                required,
                found: frame.len(),
            });
        }

        tracing::trace!(function = %function, depth = self.frames.len(), "call");
        self.frames.push(frame);
        let result = ensure_sufficient_stack(|| body(self));
        self.frames.pop();
        result
    }

    /// Roll one die with `faces` faces.
    pub fn roll(&mut self, faces: u32) -> u32 {
        self.rng.gen_range(1..=faces)
    }
}
