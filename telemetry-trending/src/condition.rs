//! Compound conditions over asynchronous telemetry streams
//!
//! A [`Condition`] answers "was the instrument in this state at time `t`?" by
//! looking up each reference stream's latest value at or before `t` and
//! combining the individual checks with logical AND.
//!
//! ```
//! use telemetry_trending::{Condition, SampleStream, SubCondition};
//!
//! let exp_stat = SampleStream::from_pairs("INRSD_EXP_STAT", vec![(0.0, "STARTED"), (5.0, "COMPLETE")]).unwrap();
//! let condition = Condition::new(vec![SubCondition::unequal(&exp_stat, "STARTED")]);
//!
//! assert!(!condition.state(1.0));
//! assert!(condition.state(6.0));
//! ```

use crate::types::{Result, SampleStream, SampleValue, TrendingError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison applied between the resolved reference value and the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    Equal,
    Unequal,
    /// Numeric `value > target`
    Greater,
    /// Numeric `value < target`
    Smaller,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::Equal => write!(f, "=="),
            Relation::Unequal => write!(f, "!="),
            Relation::Greater => write!(f, ">"),
            Relation::Smaller => write!(f, "<"),
        }
    }
}

/// A single point-in-time predicate over one reference stream
#[derive(Debug, Clone)]
pub struct SubCondition<'a> {
    reference: &'a SampleStream,
    relation: Relation,
    target: SampleValue,
    compare_as_string: bool,
}

impl<'a> SubCondition<'a> {
    /// Reference value equals `target`, compared as strings
    pub fn equal(reference: &'a SampleStream, target: impl Into<SampleValue>) -> Self {
        Self::new(reference, Relation::Equal, target.into(), true)
    }

    /// Reference value differs from `target`, compared as strings
    pub fn unequal(reference: &'a SampleStream, target: impl Into<SampleValue>) -> Self {
        Self::new(reference, Relation::Unequal, target.into(), true)
    }

    /// Reference value is numerically greater than `target`
    pub fn greater(reference: &'a SampleStream, target: f64) -> Self {
        Self::new(reference, Relation::Greater, SampleValue::Number(target), false)
    }

    /// Reference value is numerically smaller than `target`
    pub fn smaller(reference: &'a SampleStream, target: f64) -> Self {
        Self::new(reference, Relation::Smaller, SampleValue::Number(target), false)
    }

    /// Build a predicate from its parts
    ///
    /// `Greater`/`Smaller` are always numeric, whatever `compare_as_string` says.
    pub fn new(
        reference: &'a SampleStream,
        relation: Relation,
        target: SampleValue,
        compare_as_string: bool,
    ) -> Self {
        let compare_as_string = compare_as_string
            && matches!(relation, Relation::Equal | Relation::Unequal);
        Self {
            reference,
            relation,
            target,
            compare_as_string,
        }
    }

    /// Builder method: switch between string and exact numeric comparison
    pub fn with_string_compare(self, enabled: bool) -> Self {
        Self::new(self.reference, self.relation, self.target, enabled)
    }

    pub fn mnemonic(&self) -> &str {
        self.reference.mnemonic()
    }

    pub fn relation(&self) -> Relation {
        self.relation
    }

    pub fn target(&self) -> &SampleValue {
        &self.target
    }

    pub fn compares_as_string(&self) -> bool {
        self.compare_as_string
    }

    /// Evaluate this predicate at time `t`
    ///
    /// With no reference sample at or before `t` the predicate is false.
    pub fn check(&self, t: f64) -> Result<bool> {
        let Some(sample) = self.reference.as_of(t) else {
            return Ok(false);
        };

        if self.compare_as_string {
            let equal = sample.value.to_string() == self.target.to_string();
            return Ok(match self.relation {
                Relation::Unequal => !equal,
                _ => equal,
            });
        }

        let value = self.reference.numeric_value(sample)?;
        let target = self.target.as_f64().ok_or_else(|| TrendingError::UnparseableValue {
            mnemonic: self.reference.mnemonic().to_string(),
            time: t,
            value: self.target.to_string(),
        })?;

        Ok(match self.relation {
            Relation::Equal => value == target,
            Relation::Unequal => value != target,
            Relation::Greater => value > target,
            Relation::Smaller => value < target,
        })
    }
}

impl fmt::Display for SubCondition<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.compare_as_string {
            write!(f, "{} {} {:?}", self.mnemonic(), self.relation, self.target.to_string())
        } else {
            write!(f, "{} {} {}", self.mnemonic(), self.relation, self.target)
        }
    }
}

/// AND-combination of sub-conditions, evaluated per query time
///
/// Holds no mutable state: evaluating the same time twice always gives the
/// same answer. An empty condition is true everywhere.
#[derive(Debug, Clone, Default)]
pub struct Condition<'a> {
    subconditions: Vec<SubCondition<'a>>,
}

impl<'a> Condition<'a> {
    pub fn new(subconditions: Vec<SubCondition<'a>>) -> Self {
        Self { subconditions }
    }

    /// Builder method: add another sub-condition
    pub fn and(mut self, subcondition: SubCondition<'a>) -> Self {
        self.subconditions.push(subcondition);
        self
    }

    pub fn subconditions(&self) -> &[SubCondition<'a>] {
        &self.subconditions
    }

    pub fn len(&self) -> usize {
        self.subconditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subconditions.is_empty()
    }

    /// Whether the condition holds at time `t`
    ///
    /// A reference value that cannot be compared numerically counts as
    /// not satisfied; use [`Condition::try_state`] to see that failure.
    pub fn state(&self, t: f64) -> bool {
        self.try_state(t).unwrap_or_else(|e| {
            log::debug!("Condition {} not satisfied at {}: {}", self, t, e);
            false
        })
    }

    /// Fallible form of [`Condition::state`]
    ///
    /// Short-circuits on the first unsatisfied sub-condition.
    pub fn try_state(&self, t: f64) -> Result<bool> {
        for subcondition in &self.subconditions {
            if !subcondition.check(t)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// End of the stretch during which the condition keeps holding from `t`
    ///
    /// `Ok(None)` if the condition does not hold at `t`. Otherwise the first
    /// reference sample time in `(t, limit)` at which it stops holding, or
    /// `limit` if it holds throughout. Only reference sample times can change
    /// the state, so those are the only times checked.
    pub fn holds_until(&self, t: f64, limit: f64) -> Result<Option<f64>> {
        if !self.try_state(t)? {
            return Ok(None);
        }

        let mut changes: Vec<f64> = self
            .subconditions
            .iter()
            .flat_map(|subcondition| {
                let samples = subcondition.reference.samples();
                let from = samples.partition_point(|s| s.time <= t);
                samples[from..].iter().take_while(move |s| s.time < limit)
            })
            .map(|s| s.time)
            .collect();
        changes.sort_by(f64::total_cmp);
        changes.dedup();

        for time in changes {
            if !self.try_state(time)? {
                return Ok(Some(time));
            }
        }
        Ok(Some(limit))
    }
}

impl fmt::Display for Condition<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.subconditions.is_empty() {
            return write!(f, "always");
        }
        let parts: Vec<String> = self.subconditions.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", parts.join(" AND "))
    }
}
