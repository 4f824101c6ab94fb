//! Stat registry.
//!
//! Provides the `StatService` type, which owns every stat and the function
//! registry, validates each mutation before committing it and caches
//! resolved values.

use crate::config::EngineConfig;
use crate::context::ParsingContext;
use crate::error::{EvalError, StatError};
use crate::eval::Evaluator;
use crate::expression::{Expression, NamedExpression, Position};
use crate::function::Function;
use crate::function_service::FunctionService;
use crate::graph::StatGraph;
use crate::node::Node;
use crate::numeric::StatValue;
use crate::parser;
use crate::resolved::ResolvedStat;
use crate::stat::Stat;
use crate::stat_id::{FunctionId, StatId, VariableId};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Registry of stats.
///
/// Every mutation is validated as a whole: it either commits or leaves the
/// registry untouched and returns all the errors found. Any successful
/// mutation clears the value cache.
///
/// # Examples
///
/// ```rust
/// use statexpr::StatService;
///
/// let mut stats = StatService::new();
/// stats.add("FOR", Some("10")).unwrap();
/// stats.add("ATK", Some("FOR * 2 + 5")).unwrap();
///
/// assert_eq!(stats.get_value("ATK").unwrap(), 25.0);
///
/// stats.update("FOR", Some("20")).unwrap();
/// assert_eq!(stats.get_value("ATK").unwrap(), 45.0);
/// ```
pub struct StatService {
    stats: HashMap<StatId, Stat>,
    functions: FunctionService,
    cache: HashMap<StatId, StatValue>,
    config: EngineConfig,
}

impl StatService {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create a registry with the given configuration.
    ///
    /// A `dice_seed` makes every `$D` roll reproducible.
    pub fn with_config(config: EngineConfig) -> Self {
        let functions = match config.dice_seed {
            Some(seed) => FunctionService::with_seed(seed),
            None => FunctionService::new(),
        };
        Self {
            stats: HashMap::new(),
            functions,
            cache: HashMap::new(),
            config,
        }
    }

    /// Create a registry around an existing function registry.
    pub fn with_functions(functions: FunctionService, config: EngineConfig) -> Self {
        Self {
            stats: HashMap::new(),
            functions,
            cache: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn functions(&self) -> &FunctionService {
        &self.functions
    }

    /// Mutable access to the function registry, for registering native
    /// functions.
    pub fn functions_mut(&mut self) -> &mut FunctionService {
        &mut self.functions
    }

    pub fn get(&self, id: &StatId) -> Option<&Stat> {
        self.stats.get(id)
    }

    pub fn stats(&self) -> impl Iterator<Item = &Stat> {
        self.stats.values()
    }

    /// Whether `id` names a registered stat or a variable of one.
    pub fn exists(&self, id: &str) -> bool {
        if let Ok(stat_id) = StatId::new(id) {
            return self.stats.contains_key(&stat_id);
        }
        VariableId::parse(id, None).is_some_and(|variable| {
            self.stats
                .get(variable.stat())
                .is_some_and(|stat| stat.has_variable(&variable))
        })
    }

    /// Parse `raw` against the current registries.
    ///
    /// With an owning `stat`, the `.name` shorthand and references to that
    /// stat are accepted.
    pub fn parse(&self, raw: &str, stat: Option<&StatId>) -> Result<Expression, Vec<StatError>> {
        let ctx = match stat {
            Some(stat_id) => ParsingContext::for_stat(self, stat_id),
            None => ParsingContext::new(self),
        };
        parser::parse(raw, &ctx)
    }

    /// Evaluate a free-standing expression.
    pub fn evaluate(&mut self, expression: &Expression) -> Result<StatValue, EvalError> {
        self.with_evaluator(|ev| expression.resolve(ev))
    }

    /// Register a stat computed by `raw` (`0` if `None`).
    ///
    /// Variables of the new stat that its formula reads are created with
    /// value `0`.
    #[tracing::instrument(level = "debug", skip(self, raw))]
    pub fn add(&mut self, id: &str, raw: Option<&str>) -> Result<(), Vec<StatError>> {
        let stat_id = StatId::new(id).map_err(|e| vec![e])?;

        let mut errors = Vec::new();
        if self.stats.contains_key(&stat_id) {
            errors.push(StatError::DuplicateStat(stat_id.clone()));
        }
        let expression = match self.parse(raw.unwrap_or("0"), Some(&stat_id)) {
            Ok(expression) => Some(expression),
            Err(mut parse_errors) => {
                errors.append(&mut parse_errors);
                None
            }
        };
        let Some(expression) = expression.filter(|_| errors.is_empty()) else {
            return Err(errors);
        };

        let mut stat = Stat::with_expression(stat_id, expression);
        stat.seed_variables();
        self.commit(stat)
    }

    /// Register a stat built by the caller.
    pub fn add_stat(&mut self, mut stat: Stat) -> Result<(), Vec<StatError>> {
        let mut errors = Vec::new();
        if self.stats.contains_key(stat.id()) {
            errors.push(StatError::DuplicateStat(stat.id().clone()));
        }
        errors.extend(self.check_references(&stat));
        if !errors.is_empty() {
            return Err(errors);
        }
        stat.seed_variables();
        self.commit(stat)
    }

    /// Replace the pipeline of an existing stat with `raw` (`0` if `None`).
    ///
    /// The stat's variables are kept.
    #[tracing::instrument(level = "debug", skip(self, raw))]
    pub fn update(&mut self, id: &str, raw: Option<&str>) -> Result<(), Vec<StatError>> {
        let stat_id = StatId::new(id).map_err(|e| vec![e])?;
        let existing = self.existing(&stat_id)?;
        let expression = self.parse(raw.unwrap_or("0"), Some(&stat_id))?;

        let mut stat = Stat::with_expression(stat_id, expression);
        stat.inherit_variables(existing);
        stat.seed_variables();
        self.commit(stat)
    }

    /// Replace an existing stat with one built by the caller.
    pub fn update_stat(&mut self, mut stat: Stat) -> Result<(), Vec<StatError>> {
        self.existing(stat.id())?;
        let errors = self.check_references(&stat);
        if !errors.is_empty() {
            return Err(errors);
        }
        stat.seed_variables();
        self.commit(stat)
    }

    /// Remove a stat.
    ///
    /// Without `cascade`, fails if any stat depends on it. With `cascade`,
    /// every dependent is removed first, transitively. Stats read by a user
    /// function are never removed.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn remove(&mut self, id: &str, cascade: bool) -> Result<(), Vec<StatError>> {
        let stat_id = StatId::new(id).map_err(|e| vec![e])?;
        self.existing(&stat_id)?;

        let graph = self.dependency_graph(None);
        let mut errors = Vec::new();
        let order = if cascade {
            graph.removal_order(&stat_id)
        } else {
            for dependent in graph.dependents(&stat_id) {
                errors.push(StatError::HasDependents {
                    stat: stat_id.clone(),
                    dependent,
                });
            }
            vec![stat_id.clone()]
        };

        for removed in &order {
            for function in self.functions.user_functions() {
                if function
                    .user_body()
                    .is_some_and(|body| body.references_stat(removed))
                {
                    errors.push(StatError::UsedByFunction {
                        stat: removed.clone(),
                        function: function.id.clone(),
                    });
                }
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        for removed in order {
            tracing::debug!(stat = %removed, "stat removed");
            self.stats.remove(&removed);
        }
        self.invalidate_all();
        Ok(())
    }

    /// Set a variable (`STAT.name`) of an existing stat.
    #[tracing::instrument(level = "debug", skip(self, raw))]
    pub fn add_or_update_variable(&mut self, variable: &str, raw: &str) -> Result<(), Vec<StatError>> {
        let variable_id = VariableId::parse(variable, None)
            .ok_or_else(|| vec![StatError::InvalidVariableId(variable.to_string())])?;
        let owner = variable_id.stat().clone();
        let existing = self.existing(&owner)?;
        let expression = self.parse(raw, Some(&owner))?;

        let mut stat = existing.clone();
        stat.add_or_update_variable(variable_id, expression)
            .map_err(|e| vec![e])?;
        self.commit(stat)
    }

    /// Insert a named expression into the pipeline of an existing stat.
    #[tracing::instrument(level = "debug", skip(self, raw))]
    pub fn add_expression(
        &mut self,
        stat: &str,
        name: &str,
        raw: &str,
        position: Position,
    ) -> Result<(), Vec<StatError>> {
        let stat_id = StatId::new(stat).map_err(|e| vec![e])?;
        let existing = self.existing(&stat_id)?;
        let expression = self.parse(raw, Some(&stat_id))?;

        let mut candidate = existing.clone();
        candidate
            .add_expression(NamedExpression::new(name, expression), position)
            .map_err(|e| vec![e])?;
        candidate.seed_variables();
        self.commit(candidate)
    }

    /// Replace a named expression of an existing stat.
    #[tracing::instrument(level = "debug", skip(self, raw))]
    pub fn update_expression(&mut self, stat: &str, name: &str, raw: &str) -> Result<(), Vec<StatError>> {
        let stat_id = StatId::new(stat).map_err(|e| vec![e])?;
        let existing = self.existing(&stat_id)?;
        let expression = self.parse(raw, Some(&stat_id))?;

        let mut candidate = existing.clone();
        candidate
            .update_expression(name, expression)
            .map_err(|e| vec![e])?;
        candidate.seed_variables();
        self.commit(candidate)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub fn remove_expression(&mut self, stat: &str, name: &str) -> Result<(), Vec<StatError>> {
        let stat_id = StatId::new(stat).map_err(|e| vec![e])?;
        let mut candidate = self.existing(&stat_id)?.clone();
        candidate.remove_expression(name).map_err(|e| vec![e])?;
        self.commit(candidate)
    }

    /// Define a user function.
    ///
    /// The body may call the function itself; its arity is the highest
    /// argument id (`$1`..`$99`) the body reads.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use statexpr::StatService;
    ///
    /// let mut stats = StatService::new();
    /// stats.define_function("$HALF", "$FLOOR{$1 / 2}").unwrap();
    /// stats.add("SPD", Some("$HALF 7")).unwrap();
    ///
    /// assert_eq!(stats.get_value("SPD").unwrap(), 3.0);
    /// ```
    #[tracing::instrument(level = "debug", skip(self, body))]
    pub fn define_function(&mut self, id: &str, body: &str) -> Result<(), Vec<StatError>> {
        let function_id = FunctionId::new(id).map_err(|e| vec![e])?;
        if function_id.is_argument() {
            return Err(vec![StatError::InvalidFunctionId(id.to_string())]);
        }
        if self.functions.get(&function_id).is_some() {
            return Err(vec![StatError::DuplicateFunction(function_id)]);
        }
        let ctx = ParsingContext::for_function(self, &function_id);
        let body = parser::parse(body, &ctx)?;
        self.functions.add(Function::user(function_id, body))
    }

    /// Value of a stat (`HP`) or variable (`HP.base`).
    pub fn get_value(&mut self, id: &str) -> Result<StatValue, EvalError> {
        if let Ok(stat_id) = StatId::new(id) {
            return self.get_stat_value(&stat_id);
        }
        match VariableId::parse(id, None) {
            Some(variable) => self.get_variable_value(&variable),
            None => Err(EvalError::InvalidId(id.to_string())),
        }
    }

    /// Resolved value of a stat, from the cache when possible.
    pub fn get_stat_value(&mut self, id: &StatId) -> Result<StatValue, EvalError> {
        self.with_evaluator(|ev| ev.stat_value(id))
    }

    pub fn get_variable_value(&mut self, id: &VariableId) -> Result<StatValue, EvalError> {
        self.with_evaluator(|ev| ev.variable_value(id))
    }

    /// Resolve a stat and report how each of its expressions contributed.
    pub fn get_breakdown(&mut self, id: &StatId) -> Result<ResolvedStat, EvalError> {
        self.with_evaluator(|ev| ev.stat_breakdown(id))
    }

    /// Forget every cached value.
    pub fn invalidate_all(&mut self) {
        tracing::trace!(entries = self.cache.len(), "cache cleared");
        self.cache.clear();
    }

    fn with_evaluator<R>(&mut self, f: impl FnOnce(&mut Evaluator<'_>) -> R) -> R {
        let (functions, rng) = self.functions.parts();
        let mut ev = Evaluator::new(
            &self.stats,
            functions,
            rng,
            &mut self.cache,
            self.config.max_call_depth,
        );
        f(&mut ev)
    }

    fn existing(&self, id: &StatId) -> Result<&Stat, Vec<StatError>> {
        self.stats
            .get(id)
            .ok_or_else(|| vec![StatError::UnknownStat(id.clone())])
    }

    /// Check a validated candidate against the rest of the registry and
    /// store it.
    fn commit(&mut self, stat: Stat) -> Result<(), Vec<StatError>> {
        let errors = self.check_variable_readers(&stat);
        if !errors.is_empty() {
            return Err(errors);
        }
        self.check_cycles(&stat)?;

        tracing::debug!(
            stat = %stat.id(),
            expressions = stat.expressions().len(),
            variables = stat.variables().len(),
            "stat committed"
        );
        self.stats.insert(stat.id().clone(), stat);
        self.invalidate_all();
        Ok(())
    }

    fn check_cycles(&self, candidate: &Stat) -> Result<(), Vec<StatError>> {
        self.dependency_graph(Some(candidate))
            .find_cycle_from(candidate.id())
            .map_err(|err| {
                tracing::warn!(stat = %candidate.id(), %err, "circular definition rejected");
                vec![err]
            })
    }

    /// Variables of `candidate` that other stats or user functions read must
    /// survive the replacement.
    fn check_variable_readers(&self, candidate: &Stat) -> Vec<StatError> {
        let other_stats = self
            .stats
            .values()
            .filter(|stat| stat.id() != candidate.id())
            .flat_map(Stat::all_expressions);
        let function_bodies = self
            .functions
            .user_functions()
            .filter_map(Function::user_body);

        let mut missing = BTreeSet::new();
        for expression in other_stats.chain(function_bodies) {
            for variable in expression.variables() {
                if variable.stat() == candidate.id() && !candidate.has_variable(&variable) {
                    missing.insert(variable);
                }
            }
        }
        missing.into_iter().map(StatError::UndefinedVariable).collect()
    }

    /// Validate references of a stat that was not built by the parser.
    fn check_references(&self, stat: &Stat) -> Vec<StatError> {
        let mut errors = Vec::new();
        for (variable, expression) in stat.variables() {
            if variable.stat() != stat.id() {
                errors.push(StatError::ForeignVariable {
                    variable: variable.clone(),
                    stat: stat.id().clone(),
                });
            } else if variable.is_value() {
                errors.push(StatError::ReservedVariable(variable.clone()));
            } else if expression.references_stat(stat.id()) {
                errors.push(StatError::SelfReferencingVariable(variable.clone()));
            }
        }

        let ctx = ParsingContext::for_stat(self, stat.id());
        for expression in stat.all_expressions() {
            expression.walk(&mut |node| match node {
                Node::Stat(id) if !ctx.stat_exists(id) => {
                    errors.push(StatError::UndefinedStat(id.clone()));
                }
                Node::Variable(id) if !ctx.variable_exists(id) => {
                    errors.push(StatError::UndefinedVariable(id.clone()));
                }
                Node::Function(call) if !self.functions.exists(&call.id) => {
                    errors.push(StatError::UndefinedFunction(call.id.clone()));
                }
                _ => {}
            });
        }
        errors
    }

    /// Stats `stat` reads, directly, through its variables, or through the
    /// bodies of the user functions it calls.
    fn dependencies_of(&self, stat: &Stat) -> BTreeSet<StatId> {
        let mut dependencies = stat.dependencies();
        let mut pending: Vec<FunctionId> = stat
            .all_expressions()
            .flat_map(Expression::called_functions)
            .collect();
        let mut visited = HashSet::new();

        while let Some(id) = pending.pop() {
            if !visited.insert(id.clone()) {
                continue;
            }
            if let Some(body) = self.functions.get(&id).and_then(Function::user_body) {
                dependencies.extend(body.stat_dependencies(None));
                pending.extend(body.called_functions());
            }
        }
        dependencies
    }

    /// Build the dependency graph of the registry, with `candidate` in place
    /// of the stored stat of the same id.
    fn dependency_graph(&self, candidate: Option<&Stat>) -> StatGraph {
        let mut graph = StatGraph::new();
        let stored = self
            .stats
            .values()
            .filter(|stat| candidate.map_or(true, |c| c.id() != stat.id()));
        for stat in stored.chain(candidate) {
            graph.add_node(stat.id().clone());
            for dependency in self.dependencies_of(stat) {
                graph.add_edge(stat.id().clone(), dependency);
            }
        }
        graph
    }
}

impl Default for StatService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> StatId {
        StatId::new(s).unwrap()
    }

    #[test]
    fn test_add_and_get_value() {
        let mut stats = StatService::new();
        stats.add("HP", Some("100")).unwrap();
        stats.add("DEF", None).unwrap();

        assert_eq!(stats.get_value("HP").unwrap(), 100.0);
        assert_eq!(stats.get_value("def").unwrap(), 0.0);
        assert!(stats.exists("hp"));
        assert!(!stats.exists("MP"));
    }

    #[test]
    fn test_add_duplicate_and_parse_errors_together() {
        let mut stats = StatService::new();
        stats.add("HP", Some("1")).unwrap();

        let errors = stats.add("HP", Some("1 +")).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0], StatError::DuplicateStat(id("HP")));
    }

    #[test]
    fn test_add_invalid_id() {
        let mut stats = StatService::new();
        let errors = stats.add("HP!", Some("1")).unwrap_err();
        assert!(matches!(errors[..], [StatError::InvalidStatId(_)]));
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let mut stats = StatService::new();
        let errors = stats.add("A", Some("A")).unwrap_err();
        assert_eq!(errors, vec![StatError::Cycle { path: vec![id("A"), id("A")] }]);
        assert!(!stats.exists("A"));
    }

    #[test]
    fn test_variables_are_seeded() {
        let mut stats = StatService::new();
        stats.add("FOR", Some(".base + .bonus")).unwrap();

        assert!(stats.exists("FOR.base"));
        assert!(stats.exists("FOR.bonus"));
        assert_eq!(stats.get_value("FOR").unwrap(), 0.0);

        stats.add_or_update_variable("FOR.base", "12").unwrap();
        assert_eq!(stats.get_value("FOR").unwrap(), 12.0);
        assert_eq!(stats.get_value("FOR.base").unwrap(), 12.0);
    }

    #[test]
    fn test_variable_cannot_read_its_stat() {
        let mut stats = StatService::new();
        stats.add("FOR", Some(".base")).unwrap();

        let errors = stats.add_or_update_variable("FOR.base", "FOR + 1").unwrap_err();
        assert!(matches!(errors[..], [StatError::SelfReferencingVariable(_)]));
        let errors = stats.add_or_update_variable("FOR.value", "1").unwrap_err();
        assert!(matches!(errors[..], [StatError::ReservedVariable(_)]));
    }

    #[test]
    fn test_variable_cycle_through_other_stat() {
        let mut stats = StatService::new();
        stats.add("A", Some(".x")).unwrap();
        stats.add("B", Some("A")).unwrap();

        let errors = stats.add_or_update_variable("A.x", "B").unwrap_err();
        assert_eq!(
            errors,
            vec![StatError::Cycle {
                path: vec![id("A"), id("B"), id("A")]
            }]
        );
    }

    #[test]
    fn test_update_keeps_variables() {
        let mut stats = StatService::new();
        stats.add("FOR", Some(".base")).unwrap();
        stats.add_or_update_variable("FOR.base", "8").unwrap();
        stats.add("CARRY", Some("FOR.base * 10")).unwrap();

        stats.update("FOR", Some(".base + 1")).unwrap();
        assert_eq!(stats.get_value("FOR").unwrap(), 9.0);
        assert_eq!(stats.get_value("CARRY").unwrap(), 80.0);
    }

    #[test]
    fn test_update_unknown_stat() {
        let mut stats = StatService::new();
        let errors = stats.update("A", Some("1")).unwrap_err();
        assert_eq!(errors, vec![StatError::UnknownStat(id("A"))]);
    }

    #[test]
    fn test_update_stat_cannot_drop_read_variable() {
        let mut stats = StatService::new();
        stats.add("FOR", Some(".base")).unwrap();
        stats.add("CARRY", Some("FOR.base")).unwrap();

        let replacement = Stat::with_expression(id("FOR"), Expression::number(3.0));
        let errors = stats.update_stat(replacement).unwrap_err();
        assert!(matches!(errors[..], [StatError::UndefinedVariable(_)]));
    }

    #[test]
    fn test_add_stat_checks_references() {
        let mut stats = StatService::new();
        let stat = Stat::with_expression(
            id("ATK"),
            Expression::new(vec![Node::Stat(id("FOR"))]),
        );
        let errors = stats.add_stat(stat).unwrap_err();
        assert_eq!(errors, vec![StatError::UndefinedStat(id("FOR"))]);
    }

    #[test]
    fn test_cache_invalidation() {
        let mut stats = StatService::new();
        stats.add("A", Some("2")).unwrap();
        assert_eq!(stats.get_value("A").unwrap(), 2.0);
        stats.update("A", Some("5")).unwrap();
        assert_eq!(stats.get_value("A").unwrap(), 5.0);
    }

    #[test]
    fn test_remove_with_dependents() {
        let mut stats = StatService::new();
        stats.add("STR", Some("10")).unwrap();
        stats.add("ATK", Some("STR * 2")).unwrap();

        let errors = stats.remove("STR", false).unwrap_err();
        assert_eq!(
            errors,
            vec![StatError::HasDependents {
                stat: id("STR"),
                dependent: id("ATK")
            }]
        );
        assert!(stats.exists("STR"));
    }

    #[test]
    fn test_remove_cascade() {
        let mut stats = StatService::new();
        stats.add("STR", Some("10")).unwrap();
        stats.add("ATK", Some("STR * 2")).unwrap();
        stats.add("DPS", Some("ATK * 3")).unwrap();
        stats.add("HP", Some("50")).unwrap();

        stats.remove("STR", true).unwrap();
        assert!(!stats.exists("STR"));
        assert!(!stats.exists("ATK"));
        assert!(!stats.exists("DPS"));
        assert!(stats.exists("HP"));
    }

    #[test]
    fn test_remove_stat_used_by_function() {
        let mut stats = StatService::new();
        stats.add("LVL", Some("3")).unwrap();
        stats.define_function("$SCALE", "$1 * LVL").unwrap();

        let errors = stats.remove("LVL", false).unwrap_err();
        assert!(matches!(errors[..], [StatError::UsedByFunction { .. }]));
    }

    #[test]
    fn test_cycle_through_function_body() {
        let mut stats = StatService::new();
        stats.add("LVL", Some("3")).unwrap();
        stats.define_function("$SCALE", "$1 * LVL").unwrap();

        let errors = stats.update("LVL", Some("$SCALE 2")).unwrap_err();
        assert!(matches!(errors[..], [StatError::Cycle { .. }]));
    }

    #[test]
    fn test_expression_pipeline() {
        let mut stats = StatService::new();
        stats.add("HP", Some("2")).unwrap();
        stats
            .add_expression("HP", "double", ".value * 2", Position::Last)
            .unwrap();
        stats
            .add_expression("HP", "bonus", "1", Position::Last)
            .unwrap();
        assert_eq!(stats.get_value("HP").unwrap(), 5.0);

        stats.update_expression("HP", "bonus", "10").unwrap();
        assert_eq!(stats.get_value("HP").unwrap(), 14.0);

        stats.remove_expression("HP", "double").unwrap();
        assert_eq!(stats.get_value("HP").unwrap(), 12.0);

        let errors = stats.remove_expression("HP", "double").unwrap_err();
        assert!(matches!(errors[..], [StatError::UnknownExpression { .. }]));
    }

    #[test]
    fn test_define_function_errors() {
        let mut stats = StatService::new();
        assert_eq!(
            stats.define_function("$MAX", "1").unwrap_err(),
            vec![StatError::DuplicateFunction(FunctionId::new("$MAX").unwrap())]
        );
        assert!(stats.define_function("$3", "1").is_err());
        assert!(stats.define_function("$F", "$G 1").is_err());
    }

    #[test]
    fn test_get_value_invalid_id() {
        let mut stats = StatService::new();
        assert_eq!(
            stats.get_value("1 + 1"),
            Err(EvalError::InvalidId("1 + 1".to_string()))
        );
        assert_eq!(
            stats.get_value("HP"),
            Err(EvalError::UnknownStat(id("HP")))
        );
    }

    #[test]
    fn test_breakdown() {
        let mut stats = StatService::new();
        stats.add("ATK", Some("10")).unwrap();
        stats.add_expression("ATK", "bonus", "5", Position::Last).unwrap();

        let resolved = stats.get_breakdown(&id("ATK")).unwrap();
        assert_eq!(resolved.value, 15.0);
        assert_eq!(resolved.contributions[0].name, "base");
        assert_eq!(resolved.contributions[1].value_after, 15.0);
    }

    #[test]
    fn test_evaluate_free_expression() {
        let mut stats = StatService::new();
        stats.add("A", Some("4")).unwrap();
        let expression = stats.parse("A * A", None).unwrap();
        assert_eq!(stats.evaluate(&expression).unwrap(), 16.0);
    }
}
