//! Merging of temporally close motion intervals.

use curator_models::MotionTrace;

/// Default maximum gap (seconds) bridged between two intervals.
pub const DEFAULT_MERGE_GAP_SECS: f64 = 1.5;

/// Collapse intervals separated by at most `gap` seconds.
///
/// Single greedy pass over a start-ordered trace. A gap exactly equal to
/// `gap` merges. The merged end is the larger of the two ends, so applying
/// the merge twice changes nothing.
pub fn merge_intervals(trace: &MotionTrace, gap: f64) -> MotionTrace {
    let mut merged = Vec::with_capacity(trace.len());
    let mut intervals = trace.iter().copied();

    let Some(mut current) = intervals.next() else {
        return MotionTrace::new();
    };

    for next in intervals {
        if current.gap_to(&next) <= gap {
            current = current.extended_to(&next);
        } else {
            merged.push(current);
            current = next;
        }
    }
    merged.push(current);

    // Starts come from an ordered trace and are never moved.
    merged.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use curator_models::MotionInterval;
    use proptest::prelude::*;

    fn trace(pairs: &[(f64, f64)]) -> MotionTrace {
        MotionTrace::from_ordered(
            pairs
                .iter()
                .map(|(s, e)| MotionInterval::new(*s, *e).unwrap())
                .collect(),
        )
        .unwrap()
    }

    fn bounds(trace: &MotionTrace) -> Vec<(f64, f64)> {
        trace.iter().map(|i| (i.start(), i.end())).collect()
    }

    #[test]
    fn test_empty_and_single() {
        assert!(merge_intervals(&MotionTrace::new(), 1.5).is_empty());

        let single = trace(&[(2.0, 3.0)]);
        assert_eq!(merge_intervals(&single, 1.5), single);
    }

    #[test]
    fn test_gap_boundary() {
        let input = trace(&[(0.0, 10.0), (11.5, 20.0)]);

        assert_eq!(bounds(&merge_intervals(&input, 1.5)), vec![(0.0, 20.0)]);
        assert_eq!(
            bounds(&merge_intervals(&input, 1.0)),
            vec![(0.0, 10.0), (11.5, 20.0)]
        );
    }

    #[test]
    fn test_scenario_gaps() {
        let input = trace(&[(0.0, 59.0 / 30.0), (4.0, 179.0 / 30.0)]);

        assert_eq!(merge_intervals(&input, 1.5).len(), 2);

        let merged = merge_intervals(&input, 2.5);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.as_slice()[0].start(), 0.0);
        assert!((merged.as_slice()[0].end() - 179.0 / 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_contained_interval_keeps_outer_end() {
        let input = trace(&[(0.0, 10.0), (2.0, 3.0)]);
        assert_eq!(bounds(&merge_intervals(&input, 0.0)), vec![(0.0, 10.0)]);
    }

    #[test]
    fn test_chain_merges() {
        let input = trace(&[(0.0, 1.0), (2.0, 3.0), (4.0, 5.0), (9.0, 10.0)]);
        assert_eq!(
            bounds(&merge_intervals(&input, 1.0)),
            vec![(0.0, 5.0), (9.0, 10.0)]
        );
    }

    fn arb_trace() -> impl Strategy<Value = MotionTrace> {
        proptest::collection::vec((0.0f64..100.0, 0.0f64..10.0), 0..30).prop_map(|pairs| {
            pairs
                .into_iter()
                .map(|(start, len)| MotionInterval::new(start, start + len).unwrap())
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_merge_is_idempotent(input in arb_trace(), gap in 0.0f64..5.0) {
            let once = merge_intervals(&input, gap);
            let twice = merge_intervals(&once, gap);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_merged_gaps_exceed_threshold(input in arb_trace(), gap in 0.0f64..5.0) {
            let merged = merge_intervals(&input, gap);
            prop_assert!(merged.len() <= input.len());
            for pair in merged.as_slice().windows(2) {
                prop_assert!(pair[0].gap_to(&pair[1]) > gap);
            }
        }
    }
}
