//! Syntax nodes.
//!
//! A parsed formula is a flat sequence of [`Node`]s. Operators stay in the
//! sequence next to their operands; parent nodes (groups, function calls,
//! unary operators) own their children as nested [`Expression`]s.
//!
//! Each node carries a priority used by the evaluator:
//!
//! ```text
//! 7  ( ) and function calls
//! 6  unary + - ~
//! 5  * / %
//! 4  + -
//! 3  > >= < <= = ~=
//! 2  &
//! 1  | ^
//! 0  numbers, stats, variables
//! ```

use crate::context::{FunctionSignature, ParsingContext};
use crate::error::StatError;
use crate::expression::Expression;
use crate::function::Arity;
use crate::numeric::{FormulaNumber, StatValue};
use crate::stat_id::{FunctionId, StatId, VariableId};
use std::fmt;

/// Groups and function calls: evaluated before anything around them.
pub const PARENT_PRIORITY: i8 = 7;
/// Unary `+`, `-` and `~`.
pub const UNARY_PRIORITY: i8 = 6;
/// `*`, `/` and `%`.
pub const MULTIPLICATIVE_PRIORITY: i8 = 5;
/// Binary `+` and `-`.
pub const ADDITIVE_PRIORITY: i8 = 4;
/// Comparisons, all yielding `0` or `1`.
pub const RELATIONAL_PRIORITY: i8 = 3;
/// Logical `&`.
pub const AND_PRIORITY: i8 = 2;
/// Logical `|` and `^`.
pub const OR_PRIORITY: i8 = 1;
/// Numbers, stats and variables. They are read when an operator next to
/// them is reduced.
pub const ATOM_PRIORITY: i8 = 0;
/// Punctuation, separators and invalid tokens never take part in evaluation.
pub const NO_PRIORITY: i8 = -1;

/// Highest priority in use.
pub const MAX_PRIORITY: i8 = PARENT_PRIORITY;
/// Lowest priority an operator can have.
pub const LOWEST_OPERATOR_PRIORITY: i8 = OR_PRIORITY;

/// An operator between two operands.
///
/// Relational and logical operators return `1` for true and `0` for false.
/// Equality compares within [`EPSILON`](crate::numeric::EPSILON).
///
/// # Examples
///
/// ```rust
/// use statexpr::node::BinaryOperator;
///
/// let op = BinaryOperator::from_symbol("~=").unwrap();
/// assert_eq!(op, BinaryOperator::NotEqual);
/// assert_eq!(op.apply(1.0, 1.0005), 0.0);
/// assert_eq!(BinaryOperator::Modulo.apply(7.0, 3.0), 1.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
    Equal,
    NotEqual,
    And,
    Or,
    Xor,
}

impl BinaryOperator {
    /// Every binary operator, in no particular order.
    pub const ALL: [BinaryOperator; 14] = [
        BinaryOperator::Add,
        BinaryOperator::Subtract,
        BinaryOperator::Multiply,
        BinaryOperator::Divide,
        BinaryOperator::Modulo,
        BinaryOperator::Greater,
        BinaryOperator::GreaterOrEqual,
        BinaryOperator::Less,
        BinaryOperator::LessOrEqual,
        BinaryOperator::Equal,
        BinaryOperator::NotEqual,
        BinaryOperator::And,
        BinaryOperator::Or,
        BinaryOperator::Xor,
    ];

    /// The operator written as `symbol`, if any.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.symbol() == symbol)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterOrEqual => ">=",
            BinaryOperator::Less => "<",
            BinaryOperator::LessOrEqual => "<=",
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "~=",
            BinaryOperator::And => "&",
            BinaryOperator::Or => "|",
            BinaryOperator::Xor => "^",
        }
    }

    pub fn priority(self) -> i8 {
        match self {
            BinaryOperator::Multiply | BinaryOperator::Divide | BinaryOperator::Modulo => {
                MULTIPLICATIVE_PRIORITY
            }
            BinaryOperator::Add | BinaryOperator::Subtract => ADDITIVE_PRIORITY,
            BinaryOperator::Greater
            | BinaryOperator::GreaterOrEqual
            | BinaryOperator::Less
            | BinaryOperator::LessOrEqual
            | BinaryOperator::Equal
            | BinaryOperator::NotEqual => RELATIONAL_PRIORITY,
            BinaryOperator::And => AND_PRIORITY,
            BinaryOperator::Or | BinaryOperator::Xor => OR_PRIORITY,
        }
    }

    /// Apply the operator. Division and modulo by zero follow IEEE-754.
    pub fn apply(self, left: StatValue, right: StatValue) -> StatValue {
        match self {
            BinaryOperator::Add => left + right,
            BinaryOperator::Subtract => left - right,
            BinaryOperator::Multiply => left * right,
            BinaryOperator::Divide => left / right,
            BinaryOperator::Modulo => left % right,
            BinaryOperator::Greater => StatValue::from_bool(left > right),
            BinaryOperator::GreaterOrEqual => StatValue::from_bool(left >= right),
            BinaryOperator::Less => StatValue::from_bool(left < right),
            BinaryOperator::LessOrEqual => StatValue::from_bool(left <= right),
            BinaryOperator::Equal => StatValue::from_bool(left.is_close_to(right)),
            BinaryOperator::NotEqual => StatValue::from_bool(!left.is_close_to(right)),
            BinaryOperator::And => StatValue::from_bool(left.is_truthy() && right.is_truthy()),
            BinaryOperator::Or => StatValue::from_bool(left.is_truthy() || right.is_truthy()),
            BinaryOperator::Xor => StatValue::from_bool(left.is_truthy() ^ right.is_truthy()),
        }
    }
}

/// A prefix operator. `~` is logical not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Plus,
    Minus,
    Not,
}

impl UnaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOperator::Plus => "+",
            UnaryOperator::Minus => "-",
            UnaryOperator::Not => "~",
        }
    }

    pub fn apply(self, operand: StatValue) -> StatValue {
        match self {
            UnaryOperator::Plus => operand,
            UnaryOperator::Minus => -operand,
            UnaryOperator::Not => StatValue::from_bool(!operand.is_truthy()),
        }
    }
}

/// Grouping symbols. Parentheses group a sub-expression; brackets hold the
/// argument list of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punctuation {
    LeftParenthesis,
    RightParenthesis,
    LeftBracket,
    RightBracket,
}

impl Punctuation {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "(" => Some(Punctuation::LeftParenthesis),
            ")" => Some(Punctuation::RightParenthesis),
            "{" => Some(Punctuation::LeftBracket),
            "}" => Some(Punctuation::RightBracket),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Punctuation::LeftParenthesis => "(",
            Punctuation::RightParenthesis => ")",
            Punctuation::LeftBracket => "{",
            Punctuation::RightBracket => "}",
        }
    }
}

/// A call to a function, with its argument expressions.
///
/// Arguments are filled in after validation; before that the call is a bare
/// id followed by its bracket or shorthand argument in the node sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub id: FunctionId,
    pub arguments: Vec<Expression>,
}

impl FunctionCall {
    pub fn new(id: FunctionId) -> Self {
        Self {
            id,
            arguments: Vec::new(),
        }
    }

    /// Whether the call prints without brackets (`$ABS 1`, `$ZERO`).
    fn is_shorthand(&self) -> bool {
        match self.arguments.as_slice() {
            [] => true,
            [argument] => match argument.nodes() {
                [Node::Function(inner)] => inner.arguments.is_empty(),
                [_] => true,
                _ => false,
            },
            _ => false,
        }
    }
}

/// One unit of a formula.
///
/// Right after tokenizing, a formula is a flat list of nodes including its
/// punctuation. Materializing removes the punctuation: parentheses become
/// [`Node::Group`], brackets and separators become the arguments of a
/// [`Node::Function`], and unary operators take their operand.
///
/// # Examples
///
/// ```rust
/// use statexpr::node::{Node, PARENT_PRIORITY};
/// use statexpr::StatService;
///
/// let stats = StatService::new();
/// let expression = stats.parse("-(1 + 2) * $ABS 3", None).unwrap();
/// let nodes = expression.nodes();
///
/// assert_eq!(nodes.len(), 3);
/// assert!(matches!(nodes[0], Node::Unary(_, Some(_))));
/// assert_eq!(nodes[2].priority(), PARENT_PRIORITY);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Number(StatValue),
    Stat(StatId),
    Variable(VariableId),
    Function(FunctionCall),
    Binary(BinaryOperator),
    /// A unary operator; the operand is attached once the sequence is
    /// materialized.
    Unary(UnaryOperator, Option<Box<Expression>>),
    Group(Expression),
    Punctuation(Punctuation),
    ArgumentSeparator,
    Invalid(String),
}

impl Node {
    /// Evaluation priority. See the table in the [module docs](self).
    pub fn priority(&self) -> i8 {
        match self {
            Node::Number(_) | Node::Stat(_) | Node::Variable(_) => ATOM_PRIORITY,
            Node::Function(_) | Node::Group(_) => PARENT_PRIORITY,
            Node::Unary(..) => UNARY_PRIORITY,
            Node::Binary(op) => op.priority(),
            Node::Punctuation(_) | Node::ArgumentSeparator | Node::Invalid(_) => NO_PRIORITY,
        }
    }

    /// Whether the node can stand on the left of a binary operator.
    pub fn is_valid_left_operand(&self) -> bool {
        matches!(
            self,
            Node::Number(_)
                | Node::Stat(_)
                | Node::Variable(_)
                | Node::Function(_)
                | Node::Group(_)
                | Node::Punctuation(Punctuation::RightParenthesis)
                | Node::Punctuation(Punctuation::RightBracket)
        )
    }

    /// Whether the node can start the right operand of an operator.
    pub fn is_valid_right_operand(&self) -> bool {
        matches!(
            self,
            Node::Number(_)
                | Node::Stat(_)
                | Node::Variable(_)
                | Node::Function(_)
                | Node::Group(_)
                | Node::Unary(..)
                | Node::Punctuation(Punctuation::LeftParenthesis)
        )
    }

    pub fn is_punctuation(&self, punctuation: Punctuation) -> bool {
        matches!(self, Node::Punctuation(p) if *p == punctuation)
    }

    /// Nodes that end the current sequence while materializing.
    pub(crate) fn closes_sequence(&self) -> bool {
        matches!(
            self,
            Node::Punctuation(Punctuation::RightParenthesis)
                | Node::Punctuation(Punctuation::RightBracket)
                | Node::ArgumentSeparator
        )
    }

    /// Turn an additive binary operator into a unary one when it cannot be
    /// binary in its position.
    ///
    /// `+`/`-` is unary at the start of an expression, after anything that is
    /// not a valid left operand, and right after a call to a function that
    /// requires arguments (`$ABS -1`). Self calls inside a function body
    /// count as requiring arguments when the body reads any `$N`.
    pub fn disambiguate(self, previous: Option<&Node>, ctx: &ParsingContext<'_>) -> Node {
        let unary = match self {
            Node::Binary(BinaryOperator::Add) => UnaryOperator::Plus,
            Node::Binary(BinaryOperator::Subtract) => UnaryOperator::Minus,
            other => return other,
        };
        let is_unary = match previous {
            None => true,
            Some(Node::Function(call)) => matches!(
                ctx.signature(&call.id),
                FunctionSignature::Known(arity) | FunctionSignature::Recursive(arity)
                    if arity.required > 0
            ),
            Some(node) => !node.is_valid_left_operand(),
        };
        if is_unary {
            Node::Unary(unary, None)
        } else {
            self
        }
    }

    /// Validate the node at `index` against its neighbours.
    ///
    /// Every problem found is returned; an empty vector means the node is
    /// well-formed.
    pub fn validate(nodes: &[Node], index: usize, ctx: &ParsingContext<'_>) -> Vec<StatError> {
        Self::validate_paired(nodes, &pair_punctuation(nodes), index, ctx)
    }

    /// [`Node::validate`] with the punctuation pairs of `nodes` computed once
    /// by the caller.
    pub(crate) fn validate_paired(
        nodes: &[Node],
        pairs: &[Option<usize>],
        index: usize,
        ctx: &ParsingContext<'_>,
    ) -> Vec<StatError> {
        let mut errors = Vec::new();
        let previous = index.checked_sub(1).and_then(|i| nodes.get(i));
        let next = nodes.get(index + 1);

        match &nodes[index] {
            node @ (Node::Number(_) | Node::Stat(_) | Node::Variable(_) | Node::Function(_)) => {
                if previous.is_some_and(|p| p.is_valid_left_operand() && !matches!(p, Node::Function(_))) {
                    errors.push(StatError::MissingOperator(node.to_string()));
                }
                match node {
                    Node::Stat(id) if !ctx.stat_exists(id) => {
                        errors.push(StatError::UndefinedStat(id.clone()));
                    }
                    Node::Variable(id) if !ctx.variable_exists(id) => {
                        errors.push(StatError::UndefinedVariable(id.clone()));
                    }
                    Node::Function(call) => {
                        if let Some(error) = validate_call(nodes, pairs, index, &call.id, ctx) {
                            errors.push(error);
                        }
                    }
                    _ => {}
                }
            }
            Node::Binary(op) => {
                match previous {
                    Some(p) if p.is_valid_left_operand() => {}
                    _ => errors.push(StatError::MissingLeftOperand {
                        operator: op.symbol().to_string(),
                        found: describe(previous),
                    }),
                }
                if !next.is_some_and(Node::is_valid_right_operand) {
                    errors.push(StatError::MissingRightOperand {
                        operator: op.symbol().to_string(),
                        found: describe(next),
                    });
                }
            }
            Node::Unary(op, _) => {
                if previous.is_some_and(|p| p.is_valid_left_operand() && !matches!(p, Node::Function(_))) {
                    errors.push(StatError::MissingOperator(op.symbol().to_string()));
                }
                if !next.is_some_and(Node::is_valid_right_operand) {
                    errors.push(StatError::MissingRightOperand {
                        operator: op.symbol().to_string(),
                        found: describe(next),
                    });
                }
            }
            Node::Punctuation(Punctuation::LeftParenthesis) => {
                if previous.is_some_and(|p| p.is_valid_left_operand() && !matches!(p, Node::Function(_))) {
                    errors.push(StatError::MissingOperator("(".to_string()));
                }
                match next {
                    None | Some(Node::Punctuation(Punctuation::RightParenthesis)) => {
                        errors.push(StatError::EmptyParenthesis);
                    }
                    _ => {}
                }
                if pairs[index].is_none() {
                    errors.push(StatError::UnclosedParenthesis);
                }
            }
            Node::Punctuation(Punctuation::RightParenthesis) => {
                if pairs[index].is_none() {
                    errors.push(StatError::UnexpectedClosingParenthesis);
                }
            }
            Node::Punctuation(Punctuation::LeftBracket) => {
                if !matches!(previous, Some(Node::Function(_))) {
                    errors.push(StatError::UnexpectedBracket);
                }
            }
            Node::Punctuation(Punctuation::RightBracket) => {
                if pairs[index].is_none() {
                    errors.push(StatError::UnexpectedClosingBracket);
                }
            }
            Node::ArgumentSeparator => {
                if !previous.is_some_and(Node::is_valid_left_operand) {
                    errors.push(StatError::ArgumentExpectedBefore(describe(previous)));
                }
                if !next.is_some_and(Node::is_valid_right_operand) {
                    errors.push(StatError::ArgumentExpectedAfter(describe(next)));
                }
                if !inside_brackets(nodes, index) {
                    errors.push(StatError::MisplacedSeparator);
                }
            }
            Node::Invalid(text) => errors.push(StatError::InvalidToken(text.clone())),
            Node::Group(_) => {}
        }

        errors
    }
}

fn describe(node: Option<&Node>) -> String {
    match node {
        Some(node) => format!("'{}'", node),
        None => "nothing".to_string(),
    }
}

fn validate_call(
    nodes: &[Node],
    pairs: &[Option<usize>],
    index: usize,
    id: &FunctionId,
    ctx: &ParsingContext<'_>,
) -> Option<StatError> {
    let bracketed = nodes
        .get(index + 1)
        .is_some_and(|n| n.is_punctuation(Punctuation::LeftBracket));
    if bracketed && pairs[index + 1].is_none() {
        return Some(StatError::UnclosedBracket(id.clone()));
    }

    match ctx.signature(id) {
        FunctionSignature::Missing => Some(StatError::UndefinedFunction(id.clone())),
        // A self call may pass fewer arguments and inherit the rest
        FunctionSignature::Recursive(arity) => {
            let found = count_arguments(nodes, index);
            match arity.max {
                Some(max) if found > max => Some(StatError::Arity {
                    function: id.clone(),
                    expected: Arity::between(0, max).describe(),
                    found,
                }),
                _ => None,
            }
        }
        FunctionSignature::Known(arity) => {
            let found = count_arguments(nodes, index);
            if arity.accepts(found) {
                None
            } else {
                Some(StatError::Arity {
                    function: id.clone(),
                    expected: arity.describe(),
                    found,
                })
            }
        }
    }
}

/// Count the arguments a function call at `index` receives.
///
/// `$F{}` and a bare `$F` have none, `$F x` has one, and `$F{a, b}` has one
/// more than its top-level separators.
pub(crate) fn count_arguments(nodes: &[Node], index: usize) -> usize {
    match nodes.get(index + 1) {
        Some(Node::Punctuation(Punctuation::LeftBracket)) => {}
        Some(next) if next.is_valid_right_operand() => return 1,
        _ => return 0,
    }

    match nodes.get(index + 2) {
        None | Some(Node::Punctuation(Punctuation::RightBracket)) => return 0,
        _ => {}
    }

    let mut depth = 0usize;
    let mut count = 1usize;
    for node in nodes.iter().skip(index + 2) {
        match node {
            Node::Punctuation(Punctuation::LeftBracket | Punctuation::LeftParenthesis) => {
                depth += 1;
            }
            Node::Punctuation(Punctuation::RightBracket | Punctuation::RightParenthesis) => {
                if depth == 0 {
                    return count;
                }
                depth -= 1;
            }
            Node::ArgumentSeparator if depth == 0 => count += 1,
            _ => {}
        }
    }
    count
}

/// Pair every parenthesis and bracket with its partner.
///
/// One stack covers both kinds, so groups must nest: in `{(1})` the `}` does
/// not close the `{` because the `(` is still open. A closer that does not
/// match the innermost opener stays unpaired, and so does every opener left
/// on the stack at the end.
pub(crate) fn pair_punctuation(nodes: &[Node]) -> Vec<Option<usize>> {
    let mut pairs = vec![None; nodes.len()];
    let mut open: Vec<(usize, Punctuation)> = Vec::new();
    for (i, node) in nodes.iter().enumerate() {
        let Node::Punctuation(p) = node else {
            continue;
        };
        match p {
            Punctuation::LeftParenthesis | Punctuation::LeftBracket => open.push((i, *p)),
            Punctuation::RightParenthesis | Punctuation::RightBracket => {
                if let Some(&(opener, kind)) = open.last() {
                    if matching_close(kind) == *p {
                        open.pop();
                        pairs[opener] = Some(i);
                        pairs[i] = Some(opener);
                    }
                }
            }
        }
    }
    pairs
}

fn matching_close(open: Punctuation) -> Punctuation {
    match open {
        Punctuation::LeftParenthesis => Punctuation::RightParenthesis,
        _ => Punctuation::RightBracket,
    }
}

/// Whether the innermost open group around `index` is a `{`.
fn inside_brackets(nodes: &[Node], index: usize) -> bool {
    let mut parentheses = 0usize;
    let mut brackets = 0usize;
    for node in nodes[..index].iter().rev() {
        match node {
            Node::Punctuation(Punctuation::RightParenthesis) => parentheses += 1,
            Node::Punctuation(Punctuation::RightBracket) => brackets += 1,
            Node::Punctuation(Punctuation::LeftParenthesis) => {
                if parentheses == 0 {
                    return false;
                }
                parentheses -= 1;
            }
            Node::Punctuation(Punctuation::LeftBracket) => {
                if brackets == 0 {
                    return true;
                }
                brackets -= 1;
            }
            _ => {}
        }
    }
    false
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Number(n) => write!(f, "{}", n),
            Node::Stat(id) => write!(f, "{}", id),
            Node::Variable(id) => write!(f, "{}", id),
            Node::Function(call) => write!(f, "{}", call),
            Node::Binary(op) => f.write_str(op.symbol()),
            Node::Unary(op, Some(operand)) => write!(f, "{}{}", op.symbol(), operand),
            Node::Unary(op, None) => f.write_str(op.symbol()),
            Node::Group(inner) => write!(f, "({})", inner),
            Node::Punctuation(p) => f.write_str(p.symbol()),
            Node::ArgumentSeparator => f.write_str(","),
            Node::Invalid(text) => f.write_str(text),
        }
    }
}

impl fmt::Display for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_shorthand() {
            return match self.arguments.first() {
                Some(argument) => write!(f, "{} {}", self.id, argument),
                None => write!(f, "{}", self.id),
            };
        }
        write!(f, "{}{{", self.id)?;
        for (i, argument) in self.arguments.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", argument)?;
        }
        f.write_str("}")
    }
}
