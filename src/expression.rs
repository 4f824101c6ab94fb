//! Expressions.
//!
//! An [`Expression`] is a validated, materialized node sequence. It is
//! evaluated by repeatedly reducing the leftmost node of the highest priority
//! still present until one value remains. Operators of equal priority
//! therefore apply left to right.

use crate::error::EvalError;
use crate::eval::Evaluator;
use crate::node::{Node, ATOM_PRIORITY, LOWEST_OPERATOR_PRIORITY, MAX_PRIORITY};
use crate::numeric::StatValue;
use crate::stat_id::{FunctionId, StatId, VariableId};
use std::collections::BTreeSet;
use std::fmt;

/// A node sequence that resolves to a single value.
///
/// # Examples
///
/// ```rust
/// use statexpr::StatService;
///
/// let mut stats = StatService::new();
/// let expression = stats.parse("2 + 3 * 4", None).unwrap();
///
/// assert_eq!(expression.to_string(), "2 + 3 * 4");
/// assert_eq!(stats.evaluate(&expression).unwrap(), 14.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    nodes: Vec<Node>,
}

/// A slot in the working copy used while reducing an expression.
#[derive(Clone, Copy)]
enum Term<'n> {
    Node(&'n Node),
    Value(StatValue),
}

impl Term<'_> {
    fn priority(&self) -> i8 {
        match self {
            Term::Node(node) => node.priority(),
            Term::Value(_) => ATOM_PRIORITY,
        }
    }

    fn value(self, ev: &mut Evaluator<'_>) -> Result<StatValue, EvalError> {
        match self {
            Term::Node(node) => ev.evaluate_node(node),
            Term::Value(value) => Ok(value),
        }
    }
}

impl Expression {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// An expression holding a single number.
    pub fn number(value: StatValue) -> Self {
        Self::new(vec![Node::Number(value)])
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Compute the value of this expression.
    ///
    /// The node sequence itself is never modified; reduction works on a
    /// working copy of borrowed nodes and computed values.
    pub fn resolve(&self, ev: &mut Evaluator<'_>) -> Result<StatValue, EvalError> {
        let mut terms: Vec<Term<'_>> = self.nodes.iter().map(Term::Node).collect();
        let mut priority = MAX_PRIORITY;
        let mut cursor = 0;

        while terms.len() > 1 {
            match terms[cursor..].iter().position(|t| t.priority() == priority) {
                Some(offset) => cursor = reduce(&mut terms, cursor + offset, ev)?,
                None => {
                    priority -= 1;
                    cursor = 0;
                    if priority < LOWEST_OPERATOR_PRIORITY {
                        return Err(EvalError::Unreduced(self.to_string()));
                    }
                }
            }
        }

        match terms.pop() {
            Some(term) => term.value(ev),
            None => Err(EvalError::Unreduced(String::new())),
        }
    }

    /// Visit every node, descending into groups, unary operands and call
    /// arguments.
    pub fn walk<'e>(&'e self, visit: &mut impl FnMut(&'e Node)) {
        for node in &self.nodes {
            visit(node);
            match node {
                Node::Group(inner) => inner.walk(visit),
                Node::Unary(_, Some(operand)) => operand.walk(visit),
                Node::Function(call) => {
                    for argument in &call.arguments {
                        argument.walk(visit);
                    }
                }
                _ => {}
            }
        }
    }

    /// Stats this expression depends on when owned by `owner`.
    ///
    /// Variables of other stats count as a dependency on that stat; the
    /// owner's own variables do not.
    pub fn stat_dependencies(&self, owner: Option<&StatId>) -> BTreeSet<StatId> {
        let mut dependencies = BTreeSet::new();
        self.walk(&mut |node| match node {
            Node::Stat(id) => {
                dependencies.insert(id.clone());
            }
            Node::Variable(id) if Some(id.stat()) != owner => {
                dependencies.insert(id.stat().clone());
            }
            _ => {}
        });
        dependencies
    }

    /// Every function called, argument ids excluded.
    pub fn called_functions(&self) -> BTreeSet<FunctionId> {
        let mut functions = BTreeSet::new();
        self.walk(&mut |node| {
            if let Node::Function(call) = node {
                if !call.id.is_argument() {
                    functions.insert(call.id.clone());
                }
            }
        });
        functions
    }

    /// Every variable read, including `.value`.
    pub fn variables(&self) -> BTreeSet<VariableId> {
        let mut variables = BTreeSet::new();
        self.walk(&mut |node| {
            if let Node::Variable(id) = node {
                variables.insert(id.clone());
            }
        });
        variables
    }

    pub fn references_variable(&self, variable: &VariableId) -> bool {
        let mut found = false;
        self.walk(&mut |node| {
            if matches!(node, Node::Variable(id) if id == variable) {
                found = true;
            }
        });
        found
    }

    /// Whether any stat or variable of `stat` is read.
    pub fn references_stat(&self, stat: &StatId) -> bool {
        let mut found = false;
        self.walk(&mut |node| match node {
            Node::Stat(id) if id == stat => found = true,
            Node::Variable(id) if id.stat() == stat => found = true,
            _ => {}
        });
        found
    }

    /// The highest argument id used (`$3` -> 3), 0 when none is.
    pub fn highest_argument(&self) -> usize {
        let mut highest = 0;
        self.walk(&mut |node| {
            if let Node::Function(call) = node {
                if let Some(index) = call.id.argument_index() {
                    highest = highest.max(index);
                }
            }
        });
        highest
    }
}

/// Reduce the term at `index`, returning where the search resumes.
fn reduce<'n>(
    terms: &mut Vec<Term<'n>>,
    index: usize,
    ev: &mut Evaluator<'_>,
) -> Result<usize, EvalError> {
    match terms[index] {
        Term::Node(Node::Binary(op)) => {
            if index == 0 || index + 1 >= terms.len() {
                return Err(EvalError::Unreduced(op.symbol().to_string()));
            }
            let left = terms[index - 1].value(ev)?;
            let right = terms[index + 1].value(ev)?;
            terms.splice(index - 1..=index + 1, [Term::Value(op.apply(left, right))]);
            Ok(index - 1)
        }
        term => {
            terms[index] = Term::Value(term.value(ev)?);
            Ok(index)
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, node) in self.nodes.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", node)?;
        }
        Ok(())
    }
}

/// Where a named expression is inserted in a stat's pipeline.
///
/// Non-negative positions count from the start, negative ones from the end:
/// `-1` appends, `-2` inserts before the last expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    #[default]
    Last,
    At(isize),
}

impl Position {
    /// The insertion index in a pipeline of `len` expressions.
    pub fn index(self, len: usize) -> usize {
        match self {
            Position::Last => len,
            Position::At(p) if p >= 0 => p.unsigned_abs().min(len),
            Position::At(p) => len.saturating_sub(p.unsigned_abs() - 1),
        }
    }
}

/// An expression with a name, one step of a stat's pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedExpression {
    pub name: String,
    pub expression: Expression,
}

impl NamedExpression {
    pub fn new(name: impl Into<String>, expression: Expression) -> Self {
        Self {
            name: name.into(),
            expression,
        }
    }
}

impl fmt::Display for NamedExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.name, self.expression)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{BinaryOperator, FunctionCall};

    #[test]
    fn test_position_index() {
        assert_eq!(Position::Last.index(3), 3);
        assert_eq!(Position::At(0).index(3), 0);
        assert_eq!(Position::At(10).index(3), 3);
        assert_eq!(Position::At(-1).index(3), 3);
        assert_eq!(Position::At(-2).index(3), 2);
        assert_eq!(Position::At(-10).index(3), 0);
    }

    #[test]
    fn test_dependencies() {
        let owner = StatId::new("A").unwrap();
        let expression = Expression::new(vec![
            Node::Stat(StatId::new("B").unwrap()),
            Node::Binary(BinaryOperator::Add),
            Node::Function(FunctionCall {
                id: FunctionId::new("$ABS").unwrap(),
                arguments: vec![Expression::new(vec![Node::Variable(
                    VariableId::parse("C.x", None).unwrap(),
                )])],
            }),
            Node::Binary(BinaryOperator::Add),
            Node::Variable(VariableId::parse("A.y", None).unwrap()),
        ]);

        let dependencies: Vec<_> = expression
            .stat_dependencies(Some(&owner))
            .into_iter()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(dependencies, vec!["B", "C"]);
        assert!(expression.references_stat(&owner));
        assert_eq!(expression.called_functions().len(), 1);
    }

    #[test]
    fn test_highest_argument() {
        let expression = Expression::new(vec![
            Node::Function(FunctionCall::new(FunctionId::new("$2").unwrap())),
            Node::Binary(BinaryOperator::Add),
            Node::Function(FunctionCall::new(FunctionId::new("$1").unwrap())),
        ]);
        assert_eq!(expression.highest_argument(), 2);
        assert!(expression.called_functions().is_empty());
        assert_eq!(Expression::number(1.0).highest_argument(), 0);
    }
}
