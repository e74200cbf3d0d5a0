//! Audio tempo decomposition.
//!
//! FFmpeg's `atempo` only accepts factors in `[0.5, 2.0]`, so larger speed
//! changes are expressed as a chain of in-range steps.

/// Smallest factor a single `atempo` accepts.
pub const ATEMPO_MIN: f64 = 0.5;
/// Largest factor a single `atempo` accepts.
pub const ATEMPO_MAX: f64 = 2.0;

/// Split a playback rate into `atempo` factors whose product is `rate`.
///
/// A rate of exactly `1.0` yields no steps. `rate` must be finite and
/// positive; callers validate segments before they get here.
pub fn decompose_tempo(rate: f64) -> Vec<f64> {
    let mut steps = Vec::new();
    if rate == 1.0 {
        return steps;
    }

    let mut remaining = rate;
    while remaining > ATEMPO_MAX {
        steps.push(ATEMPO_MAX);
        remaining /= ATEMPO_MAX;
    }
    while remaining < ATEMPO_MIN {
        steps.push(ATEMPO_MIN);
        remaining *= 2.0;
    }
    if remaining != 1.0 {
        steps.push(remaining);
    }
    steps
}

/// Render the steps as comma-joined `atempo=` filters (empty for no steps).
pub fn atempo_chain(rate: f64) -> Vec<String> {
    decompose_tempo(rate)
        .into_iter()
        .map(|step| format!("atempo={}", step))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_unity_rate_has_no_steps() {
        assert!(decompose_tempo(1.0).is_empty());
        assert!(atempo_chain(1.0).is_empty());
    }

    #[test]
    fn test_in_range_rate_is_single_step() {
        assert_eq!(decompose_tempo(0.5), vec![0.5]);
        assert_eq!(decompose_tempo(1.5), vec![1.5]);
        assert_eq!(decompose_tempo(2.0), vec![2.0]);
    }

    #[test]
    fn test_fast_rate_chains_doublings() {
        assert_eq!(decompose_tempo(4.0), vec![2.0, 2.0]);
        assert_eq!(decompose_tempo(5.0), vec![2.0, 2.0, 1.25]);
        assert_eq!(decompose_tempo(8.0), vec![2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_slow_rate_chains_halvings() {
        assert_eq!(decompose_tempo(0.25), vec![0.5, 0.5]);
        assert_eq!(decompose_tempo(0.2), vec![0.5, 0.5, 0.8]);
    }

    #[test]
    fn test_atempo_chain_format() {
        assert_eq!(atempo_chain(0.5), vec!["atempo=0.5"]);
        assert_eq!(atempo_chain(3.0), vec!["atempo=2", "atempo=1.5"]);
    }

    proptest! {
        #[test]
        fn steps_stay_in_range_and_multiply_to_rate(rate in 0.01f64..64.0) {
            let steps = decompose_tempo(rate);
            for step in &steps {
                prop_assert!((ATEMPO_MIN..=ATEMPO_MAX).contains(step));
            }
            let product: f64 = steps.iter().product();
            let product = if steps.is_empty() { 1.0 } else { product };
            prop_assert!((product - rate).abs() < 1e-9 * rate.max(1.0));
        }

        #[test]
        fn out_of_range_rates_need_multiple_steps(rate in prop_oneof![0.01f64..0.49, 2.01f64..64.0]) {
            prop_assert!(decompose_tempo(rate).len() >= 2);
        }
    }
}
