//! Mechanism position/value correlation
//!
//! Two ways of attributing position sensor readings to a mechanism's position
//! labels, both grouping the readings by label:
//! - [`correlate`]: for every successful move (filter wheel, grating wheel),
//!   the label and reading current at the time of the move
//! - [`match_nominals`]: for every reported position, the first reading that
//!   lies close to the position's nominal value while the sensor is powered

use crate::condition::Condition;
use crate::types::{Result, Sample, SampleStream};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Move status token that marks a completed move
pub const MOVE_SUCCESS: &str = "SUCCESS";

/// Label used when no position sample precedes the move
pub const DEFAULT_LABEL: &str = "default";

/// Position token that carries no usable label
pub const UNKNOWN_POSITION: &str = "UNKNOWN";

/// Half-widths tried in turn around a nominal value, narrowest first
pub const NOMINAL_WINDOWS: [f64; 5] = [1.0, 3.0, 5.0, 7.0, 9.0];

/// Nominal sensor reading per position label
pub type Nominals = BTreeMap<String, f64>;

/// Position records keyed by position label
pub type PositionGroups = BTreeMap<String, Vec<PositionRecord>>;

/// Sensor reading attributed to a position label
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub time: f64,
    pub value: f64,
}

/// Correlate successful moves with the concurrent label and sensor value
///
/// # Arguments
/// * `move_status` - mechanism move status; only exact `SUCCESS` counts
/// * `labels` - commanded/measured position label
/// * `values` - position sensor reading
///
/// Moves before the first label sample resolve to [`DEFAULT_LABEL`] and are
/// skipped. A move with a label but no earlier sensor reading records `(0, 0)`.
pub fn correlate(
    move_status: &SampleStream,
    labels: &SampleStream,
    values: &SampleStream,
) -> Result<PositionGroups> {
    move_status.require_non_empty()?;

    let mut groups = PositionGroups::new();

    for event in move_status.iter().filter(|s| s.value.is_token(MOVE_SUCCESS)) {
        let label = latest_before(labels, event.time)
            .map(|s| s.value.to_string())
            .unwrap_or_else(|| DEFAULT_LABEL.to_string());

        let record = match latest_before(values, event.time) {
            Some(sample) => PositionRecord {
                time: sample.time,
                value: values.numeric_value(sample)?,
            },
            None => PositionRecord { time: 0.0, value: 0.0 },
        };

        log::trace!(
            "{} move at {}: {} = {} (t={})",
            move_status.mnemonic(),
            event.time,
            label,
            record.value,
            record.time
        );

        if label != DEFAULT_LABEL {
            groups.entry(label).or_default().push(record);
        }
    }

    log::debug!(
        "{}: {} position labels from {} status samples",
        move_status.mnemonic(),
        groups.len(),
        move_status.len()
    );

    Ok(groups)
}

/// Attribute sensor readings to reported positions by their nominal values
///
/// # Arguments
/// * `condition` - when the position sensor can be trusted (e.g. supply voltage up)
/// * `nominals` - expected reading per position label
/// * `positions` - reported position label
/// * `readings` - position sensor reading (ratio)
///
/// Each position sample opens a window that lasts until the next position
/// sample or until `condition` stops holding, whichever comes first. A position
/// for which the condition does not hold is skipped. Within the window the first
/// reading closer than 1 to the nominal value is recorded; failing that the
/// half-width widens through [`NOMINAL_WINDOWS`]. If none matches, the window
/// yields no record. `UNKNOWN` positions and labels without a nominal are
/// logged at `warn` and skipped. An empty position stream is `EmptyStream`.
pub fn match_nominals(
    condition: &Condition<'_>,
    nominals: &Nominals,
    positions: &SampleStream,
    readings: &SampleStream,
) -> Result<PositionGroups> {
    positions.require_non_empty()?;

    let samples = positions.samples();
    let mut groups = PositionGroups::new();

    for (index, position) in samples.iter().enumerate() {
        let label = position.value.to_string();
        if label == UNKNOWN_POSITION {
            log::warn!("{}: UNKNOWN position at {}", positions.mnemonic(), position.time);
            continue;
        }

        let next = samples.get(index + 1).map_or(f64::INFINITY, |s| s.time);
        let Some(end) = condition.holds_until(position.time, next)? else {
            log::trace!("{} at {}: condition {} not met", label, position.time, condition);
            continue;
        };

        let Some(&nominal) = nominals.get(&label) else {
            log::warn!("{}: no nominal value for position {}", positions.mnemonic(), label);
            continue;
        };

        let window = readings_between(readings, position.time, end)?;
        let matched = NOMINAL_WINDOWS.iter().find_map(|half_width| {
            window
                .iter()
                .find(|record| (record.value - nominal).abs() < *half_width)
        });

        match matched {
            Some(record) => groups.entry(label).or_default().push(*record),
            None => log::debug!(
                "{} at {}: none of {} readings within {} of nominal {}",
                label,
                position.time,
                window.len(),
                NOMINAL_WINDOWS[NOMINAL_WINDOWS.len() - 1],
                nominal
            ),
        }
    }

    log::debug!(
        "{}: {} position labels from {} position samples",
        positions.mnemonic(),
        groups.len(),
        positions.len()
    );

    Ok(groups)
}

/// Numeric readings with `start <= time < end`
fn readings_between(stream: &SampleStream, start: f64, end: f64) -> Result<Vec<PositionRecord>> {
    let samples = stream.samples();
    let from = samples.partition_point(|s| s.time < start);

    samples[from..]
        .iter()
        .take_while(|s| s.time < end)
        .map(|s| {
            stream
                .numeric_value(s)
                .map(|value| PositionRecord { time: s.time, value })
        })
        .collect()
}

/// Linear scan for the last sample at or before `t`, stopping at the first later one
fn latest_before(stream: &SampleStream, t: f64) -> Option<&Sample> {
    stream.iter().take_while(|s| s.time <= t).last()
}
