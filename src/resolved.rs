//! Resolved stat breakdowns.
//!
//! Contains the `ResolvedStat` type, which records how each named
//! expression of a stat contributed to its final value.

use crate::numeric::StatValue;
use crate::stat_id::StatId;
use serde::{Deserialize, Serialize};

/// How a pipeline step combined with the running value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FoldMode {
    /// The step read `.value` and its result replaced the running value.
    Rewrite,
    /// The step's result was added to the running value.
    Accumulate,
}

/// One step of a stat's pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    /// Name of the expression.
    pub name: String,

    /// What the expression evaluated to.
    pub result: StatValue,

    pub mode: FoldMode,

    /// The running value after this step.
    pub value_after: StatValue,
}

/// A resolved stat value with its full breakdown.
///
/// Serializable, so a breakdown can be shipped to a client or logged as-is.
///
/// # Examples
///
/// ```rust
/// use statexpr::{FoldMode, Position, StatId, StatService};
///
/// let mut stats = StatService::new();
/// stats.add("FOR", Some("10")).unwrap();
/// stats.add_expression("FOR", "double", ".value * 2", Position::Last).unwrap();
///
/// let resolved = stats.get_breakdown(&StatId::new("FOR").unwrap()).unwrap();
/// assert_eq!(resolved.value, 20.0);
/// assert_eq!(resolved.contributions.len(), 2);
/// assert_eq!(resolved.contributions[1].mode, FoldMode::Rewrite);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedStat {
    /// The stat identifier.
    pub stat_id: StatId,

    /// The final resolved value.
    pub value: StatValue,

    /// Pipeline steps in evaluation order.
    pub contributions: Vec<Contribution>,
}

impl ResolvedStat {
    /// Names of the steps that replaced the running value.
    pub fn rewrites(&self) -> impl Iterator<Item = &str> {
        self.contributions
            .iter()
            .filter(|c| c.mode == FoldMode::Rewrite)
            .map(|c| c.name.as_str())
    }
}
