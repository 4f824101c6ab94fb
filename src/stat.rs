//! Stats.
//!
//! A [`Stat`] is an ordered pipeline of named expressions plus a set of
//! variables. Resolving it folds the pipeline into a running value that
//! starts at `0`:
//!
//! - an expression that reads `<stat>.value` replaces the running value
//! - any other expression is added to it

use crate::error::{EvalError, StatError};
use crate::eval::Evaluator;
use crate::expression::{Expression, NamedExpression, Position};
use crate::numeric::StatValue;
use crate::resolved::{Contribution, FoldMode, ResolvedStat};
use crate::stat_id::{StatId, VariableId};
use std::collections::{BTreeMap, BTreeSet};

/// Name given to the expression of stats created from a single formula.
pub const DEFAULT_EXPRESSION: &str = "base";

#[derive(Debug, Clone, PartialEq)]
pub struct Stat {
    id: StatId,
    expressions: Vec<NamedExpression>,
    variables: BTreeMap<VariableId, Expression>,
}

impl Stat {
    /// A stat with an empty pipeline; it resolves to `0`.
    pub fn new(id: StatId) -> Self {
        Self {
            id,
            expressions: Vec::new(),
            variables: BTreeMap::new(),
        }
    }

    /// A stat computed by a single expression.
    pub fn with_expression(id: StatId, expression: Expression) -> Self {
        let mut stat = Self::new(id);
        stat.expressions
            .push(NamedExpression::new(DEFAULT_EXPRESSION, expression));
        stat
    }

    pub fn id(&self) -> &StatId {
        &self.id
    }

    pub fn expressions(&self) -> &[NamedExpression] {
        &self.expressions
    }

    pub fn expression(&self, name: &str) -> Option<&Expression> {
        self.expressions
            .iter()
            .find(|named| named.name == name)
            .map(|named| &named.expression)
    }

    pub fn variables(&self) -> &BTreeMap<VariableId, Expression> {
        &self.variables
    }

    pub fn variable(&self, id: &VariableId) -> Option<&Expression> {
        self.variables.get(id)
    }

    /// Whether `id` names a variable of this stat. `.value` always does.
    pub fn has_variable(&self, id: &VariableId) -> bool {
        id.stat() == &self.id && (id.is_value() || self.variables.contains_key(id))
    }

    /// Insert a named expression into the pipeline.
    pub fn add_expression(
        &mut self,
        named: NamedExpression,
        position: Position,
    ) -> Result<(), StatError> {
        if self.expression(&named.name).is_some() {
            return Err(StatError::DuplicateExpression {
                stat: self.id.clone(),
                name: named.name,
            });
        }
        let index = position.index(self.expressions.len());
        self.expressions.insert(index, named);
        Ok(())
    }

    /// Replace the expression of an existing pipeline step, keeping its place.
    pub fn update_expression(&mut self, name: &str, expression: Expression) -> Result<(), StatError> {
        match self.expressions.iter_mut().find(|named| named.name == name) {
            Some(named) => {
                named.expression = expression;
                Ok(())
            }
            None => Err(StatError::UnknownExpression {
                stat: self.id.clone(),
                name: name.to_string(),
            }),
        }
    }

    pub fn remove_expression(&mut self, name: &str) -> Result<NamedExpression, StatError> {
        match self.expressions.iter().position(|named| named.name == name) {
            Some(index) => Ok(self.expressions.remove(index)),
            None => Err(StatError::UnknownExpression {
                stat: self.id.clone(),
                name: name.to_string(),
            }),
        }
    }

    /// Set a variable of this stat.
    ///
    /// The expression may not read this stat or any of its variables.
    pub fn add_or_update_variable(
        &mut self,
        id: VariableId,
        expression: Expression,
    ) -> Result<(), StatError> {
        if id.stat() != &self.id {
            return Err(StatError::ForeignVariable {
                variable: id,
                stat: self.id.clone(),
            });
        }
        if id.is_value() {
            return Err(StatError::ReservedVariable(id));
        }
        if expression.references_stat(&self.id) {
            return Err(StatError::SelfReferencingVariable(id));
        }
        self.variables.insert(id, expression);
        Ok(())
    }

    /// Create, with value `0`, every variable of this stat that the pipeline
    /// reads but that does not exist yet.
    pub(crate) fn seed_variables(&mut self) {
        let mut missing = Vec::new();
        for named in &self.expressions {
            for variable in named.expression.variables() {
                if variable.stat() == &self.id
                    && !variable.is_value()
                    && !self.variables.contains_key(&variable)
                {
                    missing.push(variable);
                }
            }
        }
        for variable in missing {
            tracing::debug!(variable = %variable, "seeding variable");
            self.variables.insert(variable, Expression::number(0.0));
        }
    }

    /// Move the variables of `previous` over to this stat, keeping the ones
    /// this stat already defines.
    pub(crate) fn inherit_variables(&mut self, previous: &Stat) {
        for (id, expression) in &previous.variables {
            self.variables
                .entry(id.clone())
                .or_insert_with(|| expression.clone());
        }
    }

    /// Stats read by the pipeline and by the variables.
    ///
    /// A stat reading itself is included; reading its own variables is not.
    pub fn dependencies(&self) -> BTreeSet<StatId> {
        let owner = Some(&self.id);
        let mut dependencies = BTreeSet::new();
        for named in &self.expressions {
            dependencies.extend(named.expression.stat_dependencies(owner));
        }
        for expression in self.variables.values() {
            dependencies.extend(expression.stat_dependencies(owner));
        }
        dependencies
    }

    /// Every expression of this stat, pipeline first.
    pub(crate) fn all_expressions(&self) -> impl Iterator<Item = &Expression> {
        self.expressions
            .iter()
            .map(|named| &named.expression)
            .chain(self.variables.values())
    }

    /// Fold the pipeline into a value.
    pub fn resolve(&self, ev: &mut Evaluator<'_>) -> Result<StatValue, EvalError> {
        self.fold(ev, |_| {})
    }

    /// Fold the pipeline, recording each step.
    pub fn resolve_with_breakdown(&self, ev: &mut Evaluator<'_>) -> Result<ResolvedStat, EvalError> {
        let mut contributions = Vec::with_capacity(self.expressions.len());
        let value = self.fold(ev, |contribution| contributions.push(contribution))?;
        Ok(ResolvedStat {
            stat_id: self.id.clone(),
            value,
            contributions,
        })
    }

    fn fold(
        &self,
        ev: &mut Evaluator<'_>,
        mut record: impl FnMut(Contribution),
    ) -> Result<StatValue, EvalError> {
        let value_variable = self.id.value_variable();
        ev.begin_fold(&self.id);

        let mut running = 0.0;
        let mut outcome = Ok(());
        for named in &self.expressions {
            match Self::step(ev, running, named, &value_variable) {
                Ok(contribution) => {
                    running = contribution.value_after;
                    record(contribution);
                }
                Err(err) => {
                    outcome = Err(err);
                    break;
                }
            }
        }

        ev.end_fold();
        outcome.map(|()| running)
    }

    fn step(
        ev: &mut Evaluator<'_>,
        running: StatValue,
        named: &NamedExpression,
        value_variable: &VariableId,
    ) -> Result<Contribution, EvalError> {
        ev.set_running(running);
        let result = named.expression.resolve(ev)?;
        let (mode, value_after) = if named.expression.references_variable(value_variable) {
            (FoldMode::Rewrite, result)
        } else {
            (FoldMode::Accumulate, running + result)
        };
        Ok(Contribution {
            name: named.name.clone(),
            result,
            mode,
            value_after,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{BinaryOperator, Node};

    fn stat_id(s: &str) -> StatId {
        StatId::new(s).unwrap()
    }

    fn named(name: &str, value: f64) -> NamedExpression {
        NamedExpression::new(name, Expression::number(value))
    }

    #[test]
    fn test_expression_positions() {
        let mut stat = Stat::new(stat_id("HP"));
        stat.add_expression(named("a", 1.0), Position::Last).unwrap();
        stat.add_expression(named("c", 3.0), Position::Last).unwrap();
        stat.add_expression(named("b", 2.0), Position::At(-2)).unwrap();
        stat.add_expression(named("first", 0.0), Position::At(0)).unwrap();

        let names: Vec<_> = stat.expressions().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["first", "a", "b", "c"]);
    }

    #[test]
    fn test_duplicate_expression() {
        let mut stat = Stat::new(stat_id("HP"));
        stat.add_expression(named("a", 1.0), Position::Last).unwrap();
        let err = stat.add_expression(named("a", 2.0), Position::Last).unwrap_err();
        assert!(matches!(err, StatError::DuplicateExpression { .. }));
    }

    #[test]
    fn test_update_and_remove_expression() {
        let mut stat = Stat::new(stat_id("HP"));
        stat.add_expression(named("a", 1.0), Position::Last).unwrap();
        stat.update_expression("a", Expression::number(5.0)).unwrap();
        assert_eq!(stat.expression("a"), Some(&Expression::number(5.0)));

        assert!(stat.update_expression("missing", Expression::number(0.0)).is_err());
        assert_eq!(stat.remove_expression("a").unwrap().name, "a");
        assert!(stat.remove_expression("a").is_err());
    }

    #[test]
    fn test_variable_rules() {
        let owner = stat_id("FOR");
        let mut stat = Stat::new(owner.clone());
        let base = VariableId::parse("FOR.base", None).unwrap();

        stat.add_or_update_variable(base.clone(), Expression::number(3.0)).unwrap();
        assert!(stat.has_variable(&base));
        assert!(stat.has_variable(&owner.value_variable()));

        let err = stat
            .add_or_update_variable(owner.value_variable(), Expression::number(1.0))
            .unwrap_err();
        assert!(matches!(err, StatError::ReservedVariable(_)));

        let self_ref = Expression::new(vec![
            Node::Stat(owner.clone()),
            Node::Binary(BinaryOperator::Add),
            Node::Number(1.0),
        ]);
        let err = stat.add_or_update_variable(base.clone(), self_ref).unwrap_err();
        assert!(matches!(err, StatError::SelfReferencingVariable(_)));

        let foreign = VariableId::parse("DEX.base", None).unwrap();
        assert!(stat
            .add_or_update_variable(foreign, Expression::number(1.0))
            .is_err());
    }

    #[test]
    fn test_seed_variables() {
        let owner = stat_id("FOR");
        let base = VariableId::parse("FOR.base", None).unwrap();
        let expression = Expression::new(vec![
            Node::Variable(base.clone()),
            Node::Binary(BinaryOperator::Add),
            Node::Variable(owner.value_variable()),
        ]);
        let mut stat = Stat::with_expression(owner.clone(), expression);
        stat.seed_variables();

        assert_eq!(stat.variable(&base), Some(&Expression::number(0.0)));
        assert_eq!(stat.variables().len(), 1);
    }

    #[test]
    fn test_dependencies_skip_own_variables() {
        let owner = stat_id("A");
        let expression = Expression::new(vec![
            Node::Variable(VariableId::parse("A.x", None).unwrap()),
            Node::Binary(BinaryOperator::Add),
            Node::Variable(VariableId::parse("B.y", None).unwrap()),
            Node::Binary(BinaryOperator::Add),
            Node::Stat(owner.clone()),
        ]);
        let stat = Stat::with_expression(owner.clone(), expression);
        let dependencies: Vec<_> = stat.dependencies().into_iter().collect();
        assert_eq!(dependencies, vec![owner, stat_id("B")]);
    }
}
