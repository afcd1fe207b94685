//! Daily trending routines
//!
//! Builds conditions from the configured recipes, runs the engine over the
//! loaded streams and collects the results into a [`DayReport`]. A problem with
//! one mnemonic (absent from the export, unparseable value) is logged and that
//! mnemonic skipped; the rest of the day is still processed.

use crate::config::{
    AppConfig, ConditionGroupConfig, ConditionRecipe, LampConfig, NominalWheelConfig, WheelConfig,
};
use crate::loader::MnemonicData;
use crate::report::{ConditionedSeries, DayReport, MnemonicSummary};
use anyhow::Result;
use std::path::Path;
use telemetry_trending::{extract_data, lamp, position, Condition, LampGroups, PositionGroups};

/// Run every configured routine over one export
pub fn process_day(config: &AppConfig, source: &Path, data: &MnemonicData) -> DayReport {
    let mut report = DayReport::new(source);
    let min_points = config.output.min_data_points;

    for group in &config.condition_groups {
        run_condition_group(group, data, min_points, &mut report);
    }

    for mnemonic in &config.passthrough {
        if let Some(summary) = summarize_passthrough(mnemonic, data, min_points) {
            report.passthrough.insert(mnemonic.clone(), summary);
        }
    }

    if let Some(lamp_config) = &config.lamp {
        report.lamps = lamp_routine(lamp_config, data);
    }

    for wheel in &config.wheels {
        if let Some(groups) = wheel_routine(wheel, data) {
            report.wheels.insert(wheel.name.clone(), groups);
        }
    }

    for wheel in &config.nominal_wheels {
        if let Some(groups) = nominal_wheel_routine(wheel, data) {
            report.wheels.insert(wheel.name.clone(), groups);
        }
    }

    log::info!(
        "{:?}: {} conditioned, {} passthrough, {} lamp intervals, {} wheels",
        source,
        report.conditioned.len(),
        report.passthrough.len(),
        report.lamp_interval_count(),
        report.wheels.len()
    );

    report
}

/// Build a condition from its recipes
pub fn build_condition<'a>(
    recipes: &[ConditionRecipe],
    data: &'a MnemonicData,
) -> Result<Condition<'a>> {
    let subconditions = recipes
        .iter()
        .map(|recipe| recipe.build(data))
        .collect::<Result<Vec<_>>>()?;
    Ok(Condition::new(subconditions))
}

fn run_condition_group(
    group: &ConditionGroupConfig,
    data: &MnemonicData,
    min_points: usize,
    report: &mut DayReport,
) {
    let condition = match build_condition(&group.conditions, data) {
        Ok(condition) => condition,
        Err(e) => {
            log::warn!("Skipping condition group {}: {:#}", group.name, e);
            return;
        }
    };

    log::debug!("Condition group {}: {}", group.name, condition);

    for mnemonic in &group.mnemonics {
        let Some(target) = data.get(mnemonic) else {
            log::warn!("{}: mnemonic {} not present in input", group.name, mnemonic);
            continue;
        };

        match extract_data(&condition, target) {
            Ok(Some(values)) => {
                let summary = MnemonicSummary::from_values(target, &values, min_points);
                report.conditioned.insert(
                    mnemonic.clone(),
                    ConditionedSeries {
                        group: group.name.clone(),
                        values,
                        summary,
                    },
                );
            }
            Ok(None) => log::info!("No data for {}", mnemonic),
            Err(e) => log::warn!("{}: extraction of {} failed: {}", group.name, mnemonic, e),
        }
    }
}

fn summarize_passthrough(
    mnemonic: &str,
    data: &MnemonicData,
    min_points: usize,
) -> Option<MnemonicSummary> {
    let Some(stream) = data.get(mnemonic) else {
        log::info!("No data for {}", mnemonic);
        return None;
    };

    let values = match stream.iter().map(|s| stream.numeric_value(s)).collect::<Result<Vec<_>, _>>() {
        Ok(values) => values,
        Err(e) => {
            log::warn!("Passthrough {} failed: {}", mnemonic, e);
            return None;
        }
    };

    let summary = MnemonicSummary::from_values(stream, &values, min_points);
    if summary.is_none() {
        log::info!("Not enough data for {} ({} samples)", mnemonic, values.len());
    }
    summary
}

/// Aggregate calibration lamp intervals, `None` if the lamp channels are unusable
pub fn lamp_routine(config: &LampConfig, data: &MnemonicData) -> Option<LampGroups> {
    let streams = [&config.flag, &config.selector, &config.current, &config.voltage]
        .map(|name| data.require(name));

    let [flag, selector, current, voltage] = match streams {
        [Ok(flag), Ok(selector), Ok(current), Ok(voltage)] => [flag, selector, current, voltage],
        _ => {
            log::warn!("Skipping lamp routine: lamp channels missing from input");
            return None;
        }
    };

    match lamp::aggregate_with(flag, selector, current, voltage, &config.settings) {
        Ok(groups) => Some(groups),
        Err(e) => {
            log::warn!("Lamp routine failed: {}", e);
            None
        }
    }
}

/// Correlate one mechanism's moves with its position readings
pub fn wheel_routine(config: &WheelConfig, data: &MnemonicData) -> Option<PositionGroups> {
    let streams = (
        data.require(&config.move_status),
        data.require(&config.position),
        data.require(&config.value),
    );

    let (Ok(moves), Ok(labels), Ok(values)) = streams else {
        log::warn!("Skipping wheel {}: channels missing from input", config.name);
        return None;
    };

    match position::correlate(moves, labels, values) {
        Ok(groups) => Some(groups),
        Err(e) => {
            log::warn!("Wheel {} failed: {}", config.name, e);
            None
        }
    }
}

/// Match one mechanism's sensor readings against its nominal values
pub fn nominal_wheel_routine(
    config: &NominalWheelConfig,
    data: &MnemonicData,
) -> Option<PositionGroups> {
    let (Ok(positions), Ok(ratios)) = (data.require(&config.position), data.require(&config.ratio))
    else {
        log::warn!("Skipping wheel {}: channels missing from input", config.name);
        return None;
    };

    let condition = match build_condition(&config.conditions, data) {
        Ok(condition) => condition,
        Err(e) => {
            log::warn!("Skipping wheel {}: {:#}", config.name, e);
            return None;
        }
    };

    log::debug!("Wheel {} valid while: {}", config.name, condition);

    match position::match_nominals(&condition, &config.nominals, positions, ratios) {
        Ok(groups) => Some(groups),
        Err(e) => {
            log::warn!("Wheel {} failed: {}", config.name, e);
            None
        }
    }
}
