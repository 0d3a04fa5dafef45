//! Descriptive statistics over ordered value sequences.

use serde::Serialize;

// ---

/// Summary of a non-empty, ascending-sorted value sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub p25: f64,
    pub p75: f64,
    #[serde(rename = "stdDev")]
    pub std_dev: f64,
    pub count: usize,
}

/// Describe a sequence of finite numbers, already sorted ascending.
///
/// Percentiles use the nearest-rank, round-down policy: the value at index
/// `floor(n * fraction)`, no interpolation. Standard deviation is the
/// population form (divide by `n`). Empty input yields `None`.
pub fn describe(sorted: &[f64]) -> Option<Summary> {
    // ---
    if sorted.is_empty() {
        return None;
    }

    let n = sorted.len();
    let nf = n as f64;
    let mean = sorted.iter().sum::<f64>() / nf;
    let variance = sorted.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / nf;

    Some(Summary {
        mean,
        min: sorted[0],
        max: sorted[n - 1],
        median: sorted[(nf * 0.5) as usize],
        p25: sorted[(nf * 0.25) as usize],
        p75: sorted[(nf * 0.75) as usize],
        std_dev: variance.sqrt(),
        count: n,
    })
}

/// Sort a value sequence ascending, for feeding into [`describe`].
pub fn sorted(mut values: Vec<f64>) -> Vec<f64> {
    // ---
    values.sort_by(f64::total_cmp);
    values
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_empty_input_is_none() {
        assert!(describe(&[]).is_none());
    }

    #[test]
    fn test_three_value_series() {
        // ---
        // Scenario from the frontend contract: sensor A at [10, 12, 14]
        let s = describe(&[10.0, 12.0, 14.0]).unwrap();
        assert_eq!(s.mean, 12.0);
        assert_eq!(s.min, 10.0);
        assert_eq!(s.max, 14.0);
        assert_eq!(s.median, 12.0);
        assert_eq!(s.count, 3);
    }

    #[test]
    fn test_percentile_indexing_rounds_down() {
        // ---
        let values = [1.0, 2.0, 3.0, 4.0];
        let s = describe(&values).unwrap();
        // floor(4 * 0.25) = 1, floor(4 * 0.5) = 2, floor(4 * 0.75) = 3
        assert_eq!(s.p25, 2.0);
        assert_eq!(s.median, 3.0);
        assert_eq!(s.p75, 4.0);
    }

    #[test]
    fn test_population_std_dev() {
        // ---
        // Mean 4, squared deviations [4, 0, 4], population variance 8/3
        let s = describe(&[2.0, 4.0, 6.0]).unwrap();
        assert!((s.std_dev - (8.0_f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_quantiles_are_ordered() {
        // ---
        let cases: [&[f64]; 4] = [
            &[5.0],
            &[3.0, 3.0, 3.0],
            &[-2.5, 0.0, 1.5, 9.0, 12.25],
            &[0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0],
        ];
        for values in cases {
            let s = describe(values).unwrap();
            assert!(s.min <= s.p25, "{values:?}");
            assert!(s.p25 <= s.median, "{values:?}");
            assert!(s.median <= s.p75, "{values:?}");
            assert!(s.p75 <= s.max, "{values:?}");
            assert!(s.min <= s.mean && s.mean <= s.max, "{values:?}");
        }
    }

    #[test]
    fn test_sorted_helper() {
        // ---
        assert_eq!(sorted(vec![3.0, 1.0, 2.0]), vec![1.0, 2.0, 3.0]);
        assert_eq!(sorted(vec![]), Vec::<f64>::new());
    }
}
