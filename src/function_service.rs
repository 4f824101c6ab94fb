//! Function registry.

use crate::error::StatError;
use crate::function::{builtins, Arity, Function};
use crate::stat_id::FunctionId;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::collections::HashMap;

/// Registry of callable functions, and the random source used by `$D`.
///
/// Starts with the built-in functions. Argument ids (`$1`..`$99`) are always
/// known with no arguments of their own and cannot be registered.
///
/// # Examples
///
/// ```rust
/// use statexpr::FunctionService;
/// use statexpr::stat_id::FunctionId;
///
/// let functions = FunctionService::with_seed(42);
/// assert!(functions.exists(&FunctionId::new("$MAX").unwrap()));
/// assert!(functions.exists(&FunctionId::new("$2").unwrap()));
/// assert!(!functions.exists(&FunctionId::new("$NOPE").unwrap()));
/// ```
pub struct FunctionService {
    functions: HashMap<FunctionId, Function>,
    rng: Box<dyn RngCore + Send>,
}

impl FunctionService {
    /// Create a registry seeded from system entropy.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Create a registry whose dice rolls are reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    /// Create a registry drawing dice rolls from `rng`.
    pub fn with_rng(rng: impl RngCore + Send + 'static) -> Self {
        let functions = builtins()
            .into_iter()
            .map(|function| (function.id.clone(), function))
            .collect();
        Self {
            functions,
            rng: Box::new(rng),
        }
    }

    /// Register a function.
    ///
    /// Fails if the id is already taken or is an argument id.
    pub fn add(&mut self, function: Function) -> Result<(), Vec<StatError>> {
        if function.id.is_argument() {
            return Err(vec![StatError::InvalidFunctionId(function.id.to_string())]);
        }
        if self.functions.contains_key(&function.id) {
            return Err(vec![StatError::DuplicateFunction(function.id.clone())]);
        }
        tracing::debug!(function = %function.id, arity = ?function.arity, "function registered");
        self.functions.insert(function.id.clone(), function);
        Ok(())
    }

    pub fn get(&self, id: &FunctionId) -> Option<&Function> {
        self.functions.get(id)
    }

    pub fn exists(&self, id: &FunctionId) -> bool {
        id.is_argument() || self.functions.contains_key(id)
    }

    /// Arity of a callable id, `None` if it is unknown.
    pub fn arity(&self, id: &FunctionId) -> Option<Arity> {
        if id.is_argument() {
            return Some(Arity::exactly(0));
        }
        self.functions.get(id).map(|function| function.arity)
    }

    /// User functions and their bodies.
    pub fn user_functions(&self) -> impl Iterator<Item = &Function> {
        self.functions
            .values()
            .filter(|function| function.user_body().is_some())
    }

    /// Split into the function table and the random source so both can be
    /// lent to an evaluator at once.
    pub(crate) fn parts(&mut self) -> (&HashMap<FunctionId, Function>, &mut dyn RngCore) {
        (&self.functions, &mut *self.rng)
    }
}

impl Default for FunctionService {
    fn default() -> Self {
        Self::new()
    }
}
