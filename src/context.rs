//! Parsing context.
//!
//! A [`ParsingContext`] gives the parser read access to the registries and
//! tells it which stat or function the expression being parsed belongs to.
//! The owning stat expands the `.name` variable shorthand; the function being
//! defined may call itself before it is registered.

use crate::function::Arity;
use crate::stat_id::{FunctionId, StatId, VariableId};
use crate::stat_service::StatService;

/// What the parser knows about a called function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionSignature {
    /// A registered function (or an argument id) with its arity.
    Known(Arity),
    /// The function currently being defined, with the arity its body gives
    /// it. Self calls may pass fewer arguments.
    Recursive(Arity),
    Missing,
}

/// Registries and ownership information used while parsing.
///
/// # Examples
///
/// ```rust
/// use statexpr::{parser, ParsingContext, StatId, StatService};
///
/// let mut stats = StatService::new();
/// stats.add("FOR", Some("10")).unwrap();
///
/// let ctx = ParsingContext::new(&stats);
/// let expression = parser::parse("FOR * 2", &ctx).unwrap();
/// assert_eq!(expression.to_string(), "FOR * 2");
/// ```
#[derive(Clone, Copy)]
pub struct ParsingContext<'a> {
    stats: &'a StatService,
    stat_id: Option<&'a StatId>,
    function_id: Option<&'a FunctionId>,
    own_arity: Arity,
}

impl<'a> ParsingContext<'a> {
    /// A context for free-standing expressions.
    pub fn new(stats: &'a StatService) -> Self {
        Self {
            stats,
            stat_id: None,
            function_id: None,
            own_arity: Arity::exactly(0),
        }
    }

    /// A context for an expression owned by `stat_id`.
    pub fn for_stat(stats: &'a StatService, stat_id: &'a StatId) -> Self {
        Self {
            stat_id: Some(stat_id),
            ..Self::new(stats)
        }
    }

    /// A context for the body of `function_id`.
    pub fn for_function(stats: &'a StatService, function_id: &'a FunctionId) -> Self {
        Self {
            function_id: Some(function_id),
            ..Self::new(stats)
        }
    }

    /// Set the arity of the function being defined from the highest argument
    /// id its body reads.
    pub(crate) fn with_highest_argument(self, highest: usize) -> Self {
        Self {
            own_arity: Arity::exactly(highest),
            ..self
        }
    }

    pub fn stat_id(&self) -> Option<&'a StatId> {
        self.stat_id
    }

    pub fn function_id(&self) -> Option<&'a FunctionId> {
        self.function_id
    }

    /// Registered stats, plus the owning stat so that self references reach
    /// cycle detection.
    pub fn stat_exists(&self, id: &StatId) -> bool {
        self.stat_id == Some(id) || self.stats.get(id).is_some()
    }

    /// Variables of the owning stat always exist: they are created on
    /// registration.
    pub fn variable_exists(&self, id: &VariableId) -> bool {
        if self.stat_id == Some(id.stat()) {
            return true;
        }
        self.stats
            .get(id.stat())
            .is_some_and(|stat| stat.has_variable(id))
    }

    pub fn signature(&self, id: &FunctionId) -> FunctionSignature {
        if self.function_id == Some(id) {
            return FunctionSignature::Recursive(self.own_arity);
        }
        match self.stats.functions().arity(id) {
            Some(arity) => FunctionSignature::Known(arity),
            None => FunctionSignature::Missing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owning_stat_exists() {
        let stats = StatService::new();
        let owner = StatId::new("FOR").unwrap();
        let ctx = ParsingContext::for_stat(&stats, &owner);

        assert!(ctx.stat_exists(&owner));
        assert!(!ctx.stat_exists(&StatId::new("DEX").unwrap()));
        assert!(ctx.variable_exists(&VariableId::parse(".base", Some(&owner)).unwrap()));
    }

    #[test]
    fn test_registered_variable_exists() {
        let mut stats = StatService::new();
        stats.add("FOR", Some(".base")).unwrap();
        let ctx = ParsingContext::new(&stats);

        assert!(ctx.variable_exists(&VariableId::parse("FOR.base", None).unwrap()));
        assert!(ctx.variable_exists(&VariableId::parse("FOR.value", None).unwrap()));
        assert!(!ctx.variable_exists(&VariableId::parse("FOR.other", None).unwrap()));
    }

    #[test]
    fn test_function_signatures() {
        let stats = StatService::new();
        let defining = FunctionId::new("$F").unwrap();
        let ctx = ParsingContext::for_function(&stats, &defining);

        assert_eq!(
            ctx.signature(&defining),
            FunctionSignature::Recursive(Arity::exactly(0))
        );
        assert_eq!(
            ctx.with_highest_argument(2).signature(&defining),
            FunctionSignature::Recursive(Arity::exactly(2))
        );
        assert_eq!(
            ctx.signature(&FunctionId::new("$G").unwrap()),
            FunctionSignature::Missing
        );
        assert!(matches!(
            ctx.signature(&FunctionId::new("$ABS").unwrap()),
            FunctionSignature::Known(arity) if arity.required == 1
        ));
        assert!(matches!(
            ctx.signature(&FunctionId::new("$3").unwrap()),
            FunctionSignature::Known(arity) if arity.required == 0
        ));
    }
}
