//! Property tests for engine invariants.
//!
//! Uses proptest to verify:
//! 1. Condition determinism - `state(t)` never changes between calls
//! 2. Default-false - no reference sample at or before `t` means false
//! 3. AND semantics - combined state equals the conjunction of the parts
//! 4. Extraction completeness - exactly the matching values, in order, or None
//! 5. Idempotence - all three algorithms serialize identically on re-run
//! 6. Condition stretches - `holds_until` ends exactly where the state turns false

use proptest::prelude::*;
use telemetry_trending::lamp::{self, ConsecutiveOnPolicy, LampSettings};
use telemetry_trending::position;
use telemetry_trending::{extract_data, Condition, SampleStream, SampleValue, SubCondition};

// ── Strategies (proptest) ────────────────────────────────────────────

/// Sorted timestamps on a coarse grid so streams share exact times
fn arb_times(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0u32..200, 0..max_len).prop_map(|mut ticks| {
        ticks.sort_unstable();
        ticks.into_iter().map(|t| t as f64 * 0.5).collect()
    })
}

fn arb_token_stream(name: &'static str, tokens: &'static [&'static str]) -> impl Strategy<Value = SampleStream> {
    arb_times(40).prop_flat_map(move |times| {
        let n = times.len();
        prop::collection::vec(prop::sample::select(tokens), n).prop_map(move |values| {
            SampleStream::from_pairs(name, times.iter().copied().zip(values)).unwrap()
        })
    })
}

fn arb_number_stream(name: &'static str) -> impl Strategy<Value = SampleStream> {
    arb_times(60).prop_flat_map(move |times| {
        let n = times.len();
        prop::collection::vec(-100.0..100.0_f64, n).prop_map(move |values| {
            SampleStream::from_pairs(name, times.iter().copied().zip(values)).unwrap()
        })
    })
}

fn query_times() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-1.0..101.0_f64, 1..30)
}

const FLAG_TOKENS: &[&str] = &["ON", "OFF", "ON", "OFF", "UNKNOWN"];
const LAMP_TOKENS: &[&str] = &["LINE1", "LINE2", "FLAT1", "NO_LAMP", "DUMMY"];
const STATUS_TOKENS: &[&str] = &["SUCCESS", "STARTED", "FAILURE"];
const POSITION_TOKENS: &[&str] = &["CLEAR", "F110W", "F290LP", "OPAQUE"];

// ── 1-3. Condition semantics ─────────────────────────────────────────

proptest! {
    #[test]
    fn condition_state_is_deterministic(
        flags in arb_token_stream("FLAG", FLAG_TOKENS),
        times in query_times(),
    ) {
        let condition = Condition::new(vec![SubCondition::equal(&flags, "ON")]);
        for t in times {
            prop_assert_eq!(condition.state(t), condition.state(t));
        }
    }

    #[test]
    fn condition_false_before_first_reference_sample(
        flags in arb_token_stream("FLAG", FLAG_TOKENS),
        times in query_times(),
    ) {
        let equal = Condition::new(vec![SubCondition::equal(&flags, "ON")]);
        let unequal = Condition::new(vec![SubCondition::unequal(&flags, "ON")]);
        let first = flags.samples().first().map(|s| s.time);

        for t in times {
            if first.map_or(true, |first| t < first) {
                prop_assert!(!equal.state(t));
                prop_assert!(!unequal.state(t));
            }
        }
    }

    #[test]
    fn condition_is_conjunction_of_parts(
        flags in arb_token_stream("FLAG", FLAG_TOKENS),
        lamps in arb_token_stream("SEL", LAMP_TOKENS),
        volts in arb_number_stream("VOLT"),
        times in query_times(),
    ) {
        let parts = vec![
            SubCondition::equal(&flags, "ON"),
            SubCondition::unequal(&lamps, "NO_LAMP"),
            SubCondition::greater(&volts, 0.0),
        ];
        let combined = Condition::new(parts.clone());

        for t in times {
            let expected = parts
                .iter()
                .all(|p| Condition::new(vec![p.clone()]).state(t));
            prop_assert_eq!(combined.state(t), expected);
        }
    }
}

// ── 4. Extraction completeness ───────────────────────────────────────

proptest! {
    #[test]
    fn extraction_returns_exact_matching_subset(
        flags in arb_token_stream("FLAG", FLAG_TOKENS),
        target in arb_number_stream("TARGET"),
    ) {
        let condition = Condition::new(vec![SubCondition::equal(&flags, "ON")]);
        let expected: Vec<f64> = target
            .iter()
            .filter(|s| condition.state(s.time))
            .filter_map(|s| s.value.as_f64())
            .collect();

        let extracted = extract_data(&condition, &target).unwrap();
        if expected.is_empty() {
            prop_assert_eq!(extracted, None);
        } else {
            prop_assert_eq!(extracted, Some(expected));
        }
    }
}

// ── 5. Idempotence ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn lamp_aggregation_is_idempotent(
        flags in arb_token_stream("FLAG", FLAG_TOKENS),
        lamps in arb_token_stream("SEL", LAMP_TOKENS),
        current in arb_number_stream("CUR"),
        voltage in arb_number_stream("VOLT"),
        restart in any::<bool>(),
    ) {
        prop_assume!(!flags.is_empty());
        let policy = if restart { ConsecutiveOnPolicy::Restart } else { ConsecutiveOnPolicy::Merge };
        let settings = LampSettings::new().with_consecutive_on(policy);

        let first = lamp::aggregate_with(&flags, &lamps, &current, &voltage, &settings).unwrap();
        let second = lamp::aggregate_with(&flags, &lamps, &current, &voltage, &settings).unwrap();

        prop_assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );

        // No interval ever ends before it starts, and no-op lamps never appear
        for (lamp_id, records) in &first {
            prop_assert!(!settings.is_noop(lamp_id));
            for record in records {
                prop_assert!(record.start_time <= record.end_time);
            }
        }
    }

    #[test]
    fn position_correlation_is_idempotent(
        moves in arb_token_stream("MOVE", STATUS_TOKENS),
        labels in arb_token_stream("POS", POSITION_TOKENS),
        values in arb_number_stream("VAL"),
    ) {
        prop_assume!(!moves.is_empty());

        let first = position::correlate(&moves, &labels, &values).unwrap();
        let second = position::correlate(&moves, &labels, &values).unwrap();

        prop_assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        prop_assert!(!first.contains_key(position::DEFAULT_LABEL));
    }

    #[test]
    fn extraction_is_idempotent(
        flags in arb_token_stream("FLAG", FLAG_TOKENS),
        target in arb_number_stream("TARGET"),
    ) {
        let condition = Condition::new(vec![SubCondition::unequal(&flags, "OFF")]);
        prop_assert_eq!(
            extract_data(&condition, &target).unwrap(),
            extract_data(&condition, &target).unwrap()
        );
    }

    #[test]
    fn holds_until_bounds_a_true_stretch(
        flags in arb_token_stream("FLAG", FLAG_TOKENS),
        start in -1.0..101.0_f64,
        times in query_times(),
    ) {
        let condition = Condition::new(vec![SubCondition::equal(&flags, "ON")]);
        let limit = 101.0;

        match condition.holds_until(start, limit).unwrap() {
            None => prop_assert!(!condition.state(start)),
            Some(end) => {
                prop_assert!(end > start);
                for t in times.into_iter().filter(|&t| t >= start && t < end) {
                    prop_assert!(condition.state(t), "state false at {} inside [{}, {})", t, start, end);
                }
                if end < limit {
                    prop_assert!(!condition.state(end));
                }
            }
        }
    }
}

// ── Worked examples ──────────────────────────────────────────────────

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_lamp_interval_boundary() {
    init_logging();

    let flags = SampleStream::from_pairs("INRSI_CAA_ON_FLAG", vec![(0.0, "ON"), (10.0, "OFF")]).unwrap();
    let selector = SampleStream::from_pairs("INRSH_LAMP_SEL", vec![(0.0, "LAMP_A")]).unwrap();
    let current = SampleStream::from_pairs(
        "INRSI_C_CAA_CURRENT",
        vec![(1.0, 1.0), (5.0, 2.0), (9.0, 3.0), (11.0, 4.0)],
    )
    .unwrap();
    let voltage = SampleStream::from_pairs("INRSI_C_CAA_VOLTAGE", vec![(2.0, 5.0), (12.0, 6.0)]).unwrap();

    let groups = lamp::aggregate(&flags, &selector, &current, &voltage).unwrap();
    let record = &groups["LAMP_A"][0];

    assert_eq!(record.current.count, 3);
    assert_eq!(record.current.mean, Some(2.0));
    assert_eq!(record.voltage.count, 1);
    assert_eq!(record.voltage.mean, Some(5.0));
}

#[test]
fn test_dummy_lamp_produces_no_records() {
    init_logging();

    let flags = SampleStream::from_pairs("INRSI_CAA_ON_FLAG", vec![(0.0, "ON"), (10.0, "OFF")]).unwrap();
    let selector = SampleStream::from_pairs("INRSH_LAMP_SEL", vec![(0.0, "DUMMY")]).unwrap();
    let current = SampleStream::from_pairs("INRSI_C_CAA_CURRENT", vec![(1.0, 1.0)]).unwrap();

    let groups = lamp::aggregate(&flags, &selector, &current, &current).unwrap();
    assert!(groups.values().all(|records| records.is_empty()));
}

#[test]
fn test_truncated_interval_produces_no_record() {
    init_logging();

    let flags = SampleStream::from_pairs("INRSI_CAA_ON_FLAG", vec![(0.0, "ON")]).unwrap();
    let selector = SampleStream::from_pairs("INRSH_LAMP_SEL", vec![(0.0, "LAMP_A")]).unwrap();
    let current = SampleStream::from_pairs("INRSI_C_CAA_CURRENT", vec![(1.0, 1.0)]).unwrap();

    let groups = lamp::aggregate(&flags, &selector, &current, &current).unwrap();
    assert!(groups.is_empty());
}

#[test]
fn test_success_before_first_label_is_not_grouped() {
    init_logging();

    let moves = SampleStream::from_pairs("INRSI_GWA_MOVE_ST", vec![(1.0, "SUCCESS")]).unwrap();
    let labels = SampleStream::from_pairs("INRSI_GWA_MECH_POS", vec![(2.0, "MIRROR")]).unwrap();
    let values = SampleStream::from_pairs("INRSI_C_GWA_X_POSITION", vec![(0.5, 3.3)]).unwrap();

    let groups = position::correlate(&moves, &labels, &values).unwrap();
    assert!(groups.is_empty());
}

#[test]
fn test_disjoint_predicates_never_true() {
    let a = SampleStream::from_pairs("A", vec![(0.0, 1.0), (10.0, 0.0)]).unwrap();
    let b = SampleStream::from_pairs("B", vec![(0.0, 0.0), (10.0, 1.0)]).unwrap();
    let condition = Condition::new(vec![
        SubCondition::equal(&a, SampleValue::Number(1.0)).with_string_compare(false),
        SubCondition::equal(&b, SampleValue::Number(1.0)).with_string_compare(false),
    ]);

    for i in 0..40 {
        assert!(!condition.state(i as f64 * 0.5));
    }
}
