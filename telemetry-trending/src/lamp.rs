//! Calibration lamp interval aggregation
//!
//! Detects ON/OFF intervals in the lamp power flag, attributes each interval to
//! the lamp selected at switch-on, and summarizes the lamp current and voltage
//! sampled inside the interval.
//!
//! Intervals are half-open: a sample at exactly the OFF time belongs to the
//! next state, not to the interval.

use crate::stats::SampleStats;
use crate::types::{Result, SampleStream};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Flag token that opens an interval
pub const FLAG_ON: &str = "ON";

/// Flag token that closes an interval
pub const FLAG_OFF: &str = "OFF";

/// Lamp id used when no selector sample precedes the flag
pub const DEFAULT_LAMP: &str = "default";

/// Interval records keyed by lamp id
pub type LampGroups = BTreeMap<String, Vec<LampIntervalRecord>>;

/// One detected lamp ON interval with its current/voltage statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LampIntervalRecord {
    pub start_time: f64,
    pub end_time: f64,
    pub current: SampleStats,
    pub voltage: SampleStats,
}

/// What to do with an ON flag that is followed by another ON before any OFF
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsecutiveOnPolicy {
    /// Later ON flags are absorbed into the interval opened by the first one
    #[default]
    Merge,
    /// The open interval is abandoned and the later ON opens its own
    Restart,
}

/// Settings for lamp interval aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LampSettings {
    /// Selector values that never start an interval (no lamp, dummy lamps)
    #[serde(default = "default_noop_lamps")]
    pub noop_lamps: Vec<String>,

    /// Handling of repeated ON flags
    #[serde(default)]
    pub consecutive_on: ConsecutiveOnPolicy,
}

fn default_noop_lamps() -> Vec<String> {
    vec!["NO_LAMP".to_string(), "DUMMY".to_string()]
}

impl Default for LampSettings {
    fn default() -> Self {
        Self {
            noop_lamps: default_noop_lamps(),
            consecutive_on: ConsecutiveOnPolicy::default(),
        }
    }
}

impl LampSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: replace the no-op lamp tokens
    pub fn with_noop_lamps<I, S>(mut self, lamps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.noop_lamps = lamps.into_iter().map(Into::into).collect();
        self
    }

    /// Builder method: set the consecutive ON policy
    pub fn with_consecutive_on(mut self, policy: ConsecutiveOnPolicy) -> Self {
        self.consecutive_on = policy;
        self
    }

    /// Check if a selector value is a no-op lamp
    pub fn is_noop(&self, lamp: &str) -> bool {
        self.noop_lamps.iter().any(|l| l == lamp)
    }
}

/// Aggregate lamp intervals with the default settings
///
/// # Arguments
/// * `flags` - lamp power flag (`ON`/`OFF`)
/// * `selector` - selected lamp id
/// * `current` - lamp current
/// * `voltage` - lamp voltage
pub fn aggregate(
    flags: &SampleStream,
    selector: &SampleStream,
    current: &SampleStream,
    voltage: &SampleStream,
) -> Result<LampGroups> {
    aggregate_with(flags, selector, current, voltage, &LampSettings::default())
}

/// Aggregate lamp intervals with explicit settings
///
/// An ON flag with no closing OFF before the end of the flag stream is a
/// truncated interval: it is dropped (logged at warn) and the scan stops.
pub fn aggregate_with(
    flags: &SampleStream,
    selector: &SampleStream,
    current: &SampleStream,
    voltage: &SampleStream,
    settings: &LampSettings,
) -> Result<LampGroups> {
    flags.require_non_empty()?;

    let samples = flags.samples();
    let mut groups = LampGroups::new();
    let mut index = 0;

    while index < samples.len() {
        let flag = &samples[index];
        if !flag.value.is_token(FLAG_ON) {
            index += 1;
            continue;
        }

        let lamp = selector
            .as_of(flag.time)
            .map(|s| s.value.to_string())
            .unwrap_or_else(|| DEFAULT_LAMP.to_string());

        if settings.is_noop(&lamp) {
            log::trace!("Skipping {} flag at {}: lamp {} is a no-op selection", flags.mnemonic(), flag.time, lamp);
            index += 1;
            continue;
        }

        let close = match find_interval_end(flags, index, settings.consecutive_on) {
            IntervalEnd::Closed(close) => close,
            IntervalEnd::Superseded(next_on) => {
                log::debug!(
                    "{} interval of {} at {} superseded by ON at {}",
                    flags.mnemonic(),
                    lamp,
                    flag.time,
                    samples[next_on].time
                );
                index = next_on;
                continue;
            }
            IntervalEnd::Truncated => {
                log::warn!(
                    "{} interval of {} starting at {} has no OFF before end of stream, dropped",
                    flags.mnemonic(),
                    lamp,
                    flag.time
                );
                break;
            }
        };

        let start_time = flag.time;
        let end_time = samples[close].time;

        let record = LampIntervalRecord {
            start_time,
            end_time,
            current: SampleStats::from_values(&collect_window(current, start_time, end_time)?),
            voltage: SampleStats::from_values(&collect_window(voltage, start_time, end_time)?),
        };

        log::debug!(
            "Lamp {} on [{}, {}): {} current, {} voltage samples",
            lamp,
            start_time,
            end_time,
            record.current.count,
            record.voltage.count
        );

        groups.entry(lamp).or_default().push(record);
        index = close + 1;
    }

    Ok(groups)
}

/// Outcome of looking for the OFF flag that closes an interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IntervalEnd {
    /// Index of the closing OFF flag
    Closed(usize),
    /// Index of a later ON flag that replaces the open interval
    Superseded(usize),
    /// No OFF flag before the end of the stream
    Truncated,
}

fn find_interval_end(flags: &SampleStream, start: usize, policy: ConsecutiveOnPolicy) -> IntervalEnd {
    let samples = flags.samples();

    for (index, sample) in samples.iter().enumerate().skip(start + 1) {
        if sample.value.is_token(FLAG_OFF) {
            return IntervalEnd::Closed(index);
        }
        if policy == ConsecutiveOnPolicy::Restart && sample.value.is_token(FLAG_ON) {
            return IntervalEnd::Superseded(index);
        }
    }

    IntervalEnd::Truncated
}

/// Numeric values of `stream` sampled in `[start, end)`
fn collect_window(stream: &SampleStream, start: f64, end: f64) -> Result<Vec<f64>> {
    let first = stream.samples().partition_point(|s| s.time < start);
    let mut values = Vec::new();

    for sample in &stream.samples()[first..] {
        if sample.time >= end {
            break;
        }
        values.push(stream.numeric_value(sample)?);
    }

    Ok(values)
}
