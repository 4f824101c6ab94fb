//! Identifier module.
//!
//! Provides the three identifier types used in formulas:
//!
//! - [`StatId`]: a stat name such as `FOR` or `HP_MAX`
//! - [`VariableId`]: a named variable owned by a stat, written `FOR.base`
//!   (or `.base` inside an expression of the owning stat)
//! - [`FunctionId`]: a function name such as `$MAX`, including the positional
//!   argument ids `$1`..`$99`
//!
//! All ids are `Arc<str>`-backed and compare case-insensitively while keeping
//! the text they were written with for display.

use crate::error::StatError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Separator between a stat id and a variable name.
pub const VARIABLE_SEPARATOR: char = '.';

/// Prefix shared by every function id.
pub const FUNCTION_PREFIX: char = '$';

/// Name of the reserved variable holding a stat's running value.
pub const VALUE_VARIABLE: &str = "value";

/// Highest positional argument id (`$99`).
pub const MAX_ARGUMENT_INDEX: usize = 99;

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

fn folded(s: &str) -> impl Iterator<Item = char> + '_ {
    s.chars().flat_map(char::to_uppercase)
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    folded(a).eq(folded(b))
}

fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    folded(a).cmp(folded(b))
}

fn hash_ignore_case<H: Hasher>(s: &str, state: &mut H) {
    for c in folded(s) {
        c.hash(state);
    }
    0xffu8.hash(state);
}

/// Identifier for stats.
///
/// A valid stat id is a non-empty run of letters, digits, `_` and `-`.
/// Comparison, ordering and hashing ignore case, so `for`, `For` and `FOR`
/// name the same stat.
///
/// # Examples
///
/// ```rust
/// use statexpr::StatId;
///
/// let strength = StatId::new("FOR").unwrap();
/// let lower = StatId::new("for").unwrap();
///
/// assert_eq!(strength, lower);
/// assert_eq!(lower.as_str(), "for");
/// assert!(StatId::new("F O R").is_err());
/// ```
#[derive(Debug, Clone)]
pub struct StatId(Arc<str>);

impl StatId {
    /// Create a validated `StatId`.
    pub fn new(s: &str) -> Result<Self, StatError> {
        if Self::is_valid(s) {
            Ok(Self(Arc::from(s)))
        } else {
            Err(StatError::InvalidStatId(s.to_string()))
        }
    }

    /// Whether `s` is a syntactically valid stat id.
    pub fn is_valid(s: &str) -> bool {
        !s.is_empty() && s.chars().all(is_name_char)
    }

    /// Get the string representation of this `StatId`, as written.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The reserved `<id>.value` variable of this stat.
    pub fn value_variable(&self) -> VariableId {
        VariableId {
            stat: self.clone(),
            name: Arc::from(VALUE_VARIABLE),
        }
    }
}

impl PartialEq for StatId {
    fn eq(&self, other: &Self) -> bool {
        eq_ignore_case(&self.0, &other.0)
    }
}

impl Eq for StatId {}

impl Hash for StatId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_ignore_case(&self.0, state);
    }
}

impl PartialOrd for StatId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StatId {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_ignore_case(&self.0, &other.0)
    }
}

impl TryFrom<&str> for StatId {
    type Error = StatError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl fmt::Display for StatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for StatId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.as_ref().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StatId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        StatId::new(&s).map_err(serde::de::Error::custom)
    }
}

/// Identifier for a variable owned by a stat.
///
/// Written `STAT.name`. Inside an expression belonging to a stat, the
/// shorthand `.name` refers to a variable of that stat. Variable names follow
/// the stat id character rules and must not start with a digit, so that
/// `.5` and `3.14` stay numbers.
///
/// # Examples
///
/// ```rust
/// use statexpr::{StatId, VariableId};
///
/// let owner = StatId::new("FOR").unwrap();
/// let full = VariableId::parse("for.base", None).unwrap();
/// let short = VariableId::parse(".BASE", Some(&owner)).unwrap();
///
/// assert_eq!(full, short);
/// assert_eq!(full.stat(), &owner);
/// ```
#[derive(Debug, Clone)]
pub struct VariableId {
    stat: StatId,
    name: Arc<str>,
}

impl VariableId {
    /// Parse a variable id, expanding the `.name` shorthand with `current`.
    ///
    /// Returns `None` when `s` is not a variable id, or when it uses the
    /// shorthand without a current stat.
    pub fn parse(s: &str, current: Option<&StatId>) -> Option<Self> {
        let (stat_part, name) = s.split_once(VARIABLE_SEPARATOR)?;
        if !Self::is_valid_name(name) {
            return None;
        }
        let stat = if stat_part.is_empty() {
            current?.clone()
        } else {
            StatId::new(stat_part).ok()?
        };
        Some(Self {
            stat,
            name: Arc::from(name),
        })
    }

    /// Build a variable id from its parts.
    pub fn new(stat: StatId, name: &str) -> Result<Self, StatError> {
        if Self::is_valid_name(name) {
            Ok(Self {
                stat,
                name: Arc::from(name),
            })
        } else {
            Err(StatError::InvalidVariableId(format!(
                "{}{}{}",
                stat, VARIABLE_SEPARATOR, name
            )))
        }
    }

    fn is_valid_name(name: &str) -> bool {
        StatId::is_valid(name) && !name.starts_with(|c: char| c.is_ascii_digit())
    }

    /// The owning stat.
    pub fn stat(&self) -> &StatId {
        &self.stat
    }

    /// The variable name, without the owner.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this is the reserved running-value variable.
    pub fn is_value(&self) -> bool {
        eq_ignore_case(&self.name, VALUE_VARIABLE)
    }
}

impl PartialEq for VariableId {
    fn eq(&self, other: &Self) -> bool {
        self.stat == other.stat && eq_ignore_case(&self.name, &other.name)
    }
}

impl Eq for VariableId {}

impl Hash for VariableId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.stat.hash(state);
        hash_ignore_case(&self.name, state);
    }
}

impl PartialOrd for VariableId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VariableId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.stat
            .cmp(&other.stat)
            .then_with(|| cmp_ignore_case(&self.name, &other.name))
    }
}

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.stat, VARIABLE_SEPARATOR, self.name)
    }
}

impl Serialize for VariableId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_string().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for VariableId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        VariableId::parse(&s, None)
            .ok_or_else(|| serde::de::Error::custom(StatError::InvalidVariableId(s)))
    }
}

/// Identifier for functions, e.g. `$MAX`.
///
/// `$1`..`$99` are argument ids: inside a user function body they read the
/// positional arguments of the current call.
#[derive(Debug, Clone)]
pub struct FunctionId(Arc<str>);

impl FunctionId {
    /// Create a validated `FunctionId`.
    pub fn new(s: &str) -> Result<Self, StatError> {
        if Self::is_valid(s) {
            Ok(Self(Arc::from(s)))
        } else {
            Err(StatError::InvalidFunctionId(s.to_string()))
        }
    }

    /// Id of a function shipped with the crate.
    pub(crate) fn builtin(name: &'static str) -> Self {
        debug_assert!(Self::is_valid(name));
        Self(Arc::from(name))
    }

    /// Whether `s` is a syntactically valid function id.
    pub fn is_valid(s: &str) -> bool {
        s.strip_prefix(FUNCTION_PREFIX)
            .is_some_and(StatId::is_valid)
    }

    /// Get the string representation of this `FunctionId`, as written.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The 1-based position for argument ids (`$1` -> `Some(1)`).
    pub fn argument_index(&self) -> Option<usize> {
        let digits = &self.0[FUNCTION_PREFIX.len_utf8()..];
        if digits.starts_with('0') || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        digits
            .parse::<usize>()
            .ok()
            .filter(|index| (1..=MAX_ARGUMENT_INDEX).contains(index))
    }

    /// Whether this id reads a positional argument.
    pub fn is_argument(&self) -> bool {
        self.argument_index().is_some()
    }
}

impl PartialEq for FunctionId {
    fn eq(&self, other: &Self) -> bool {
        eq_ignore_case(&self.0, &other.0)
    }
}

impl Eq for FunctionId {}

impl Hash for FunctionId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_ignore_case(&self.0, state);
    }
}

impl PartialOrd for FunctionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FunctionId {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_ignore_case(&self.0, &other.0)
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for FunctionId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.as_ref().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FunctionId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FunctionId::new(&s).map_err(serde::de::Error::custom)
    }
}
