//! Condition-filtered data extraction
//!
//! Filters a target stream down to the values sampled while a [`Condition`]
//! held. "No data" is `None`, never an empty list, so callers can log and
//! skip the mnemonic instead of storing an empty series.

use crate::condition::Condition;
use crate::types::{Result, SampleStream};
use std::collections::BTreeMap;

/// Extracted values keyed by mnemonic; mnemonics without data are absent
pub type ExtractionResult = BTreeMap<String, Vec<f64>>;

/// Extract every target value whose timestamp satisfies `condition`
///
/// # Returns
/// * `Ok(Some(values))` - matching values in stream order (never empty)
/// * `Ok(None)` - no sample satisfied the condition
/// * `Err(UnparseableValue)` - a matching sample (or a numeric reference) did not parse
pub fn extract_data(condition: &Condition<'_>, target: &SampleStream) -> Result<Option<Vec<f64>>> {
    let mut values = Vec::new();

    for sample in target {
        if condition.try_state(sample.time)? {
            values.push(target.numeric_value(sample)?);
        }
    }

    log::trace!(
        "{}: {} of {} samples match [{}]",
        target.mnemonic(),
        values.len(),
        target.len(),
        condition
    );

    if values.is_empty() {
        Ok(None)
    } else {
        Ok(Some(values))
    }
}

/// Run [`extract_data`] for several targets under the same condition
///
/// Targets without data are left out of the result and logged.
pub fn extract_many<'s>(
    condition: &Condition<'_>,
    targets: impl IntoIterator<Item = &'s SampleStream>,
) -> Result<ExtractionResult> {
    let mut result = ExtractionResult::new();

    for target in targets {
        match extract_data(condition, target)? {
            Some(values) => {
                result.insert(target.mnemonic().to_string(), values);
            }
            None => log::info!("No data for {}", target.mnemonic()),
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::SubCondition;
    use crate::types::TrendingError;

    #[test]
    fn test_extract_subset_in_order() {
        let caa = SampleStream::from_pairs(
            "INRSH_CAA_PWRF_ST",
            vec![(0.0, "OFF"), (2.0, "ON"), (5.0, "OFF"), (8.0, "ON")],
        )
        .unwrap();
        let target = SampleStream::from_pairs(
            "INRSH_CAA_VREFOFF",
            vec![(1.0, 1.0), (2.0, 2.0), (3.0, 3.0), (6.0, 6.0), (9.0, 9.0)],
        )
        .unwrap();

        let condition = Condition::new(vec![SubCondition::equal(&caa, "ON")]);
        let values = extract_data(&condition, &target).unwrap();

        assert_eq!(values, Some(vec![2.0, 3.0, 9.0]));
    }

    #[test]
    fn test_extract_no_data_is_none() {
        let caa = SampleStream::from_pairs("CAA", vec![(0.0, "OFF")]).unwrap();
        let target = SampleStream::from_pairs("T", vec![(1.0, 1.0), (2.0, 2.0)]).unwrap();

        let condition = Condition::new(vec![SubCondition::equal(&caa, "ON")]);
        assert_eq!(extract_data(&condition, &target).unwrap(), None);
    }

    #[test]
    fn test_extract_empty_target_is_none() {
        let target = SampleStream::new("T", Vec::new()).unwrap();
        assert_eq!(extract_data(&Condition::default(), &target).unwrap(), None);
    }

    #[test]
    fn test_extract_unparseable_target_fails() {
        let target = SampleStream::from_pairs("T", vec![(1.0, "1.5"), (2.0, "n/a")]).unwrap();
        let err = extract_data(&Condition::default(), &target).unwrap_err();

        assert_eq!(
            err,
            TrendingError::UnparseableValue {
                mnemonic: "T".to_string(),
                time: 2.0,
                value: "n/a".to_string(),
            }
        );
    }

    #[test]
    fn test_unparseable_outside_condition_is_ignored() {
        let gate = SampleStream::from_pairs("G", vec![(0.0, "ON"), (2.0, "OFF")]).unwrap();
        let target = SampleStream::from_pairs("T", vec![(1.0, "1.5"), (3.0, "n/a")]).unwrap();

        let condition = Condition::new(vec![SubCondition::equal(&gate, "ON")]);
        assert_eq!(extract_data(&condition, &target).unwrap(), Some(vec![1.5]));
    }

    #[test]
    fn test_extract_many_omits_empty() {
        let gate = SampleStream::from_pairs("G", vec![(0.0, "ON"), (2.0, "OFF")]).unwrap();
        let inside = SampleStream::from_pairs("IN", vec![(1.0, 4.0)]).unwrap();
        let outside = SampleStream::from_pairs("OUT", vec![(3.0, 5.0)]).unwrap();

        let condition = Condition::new(vec![SubCondition::equal(&gate, "ON")]);
        let result = extract_many(&condition, [&inside, &outside]).unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result["IN"], vec![4.0]);
        assert!(!result.contains_key("OUT"));
    }
}
