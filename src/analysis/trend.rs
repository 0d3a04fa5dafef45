//! Trend analysis over a single sensor/metric time series: least-squares
//! trend line, trailing moving average, coefficient-of-variation seasonal
//! cycle detection, and segment-mean change-point detection.
//!
//! The seasonality and change-point numbers below are tuned thresholds the
//! dashboard was calibrated against, not derived quantities. Treat them as
//! knobs when revisiting the heuristics.

use serde::Serialize;

use crate::models::Aggregation;

// ---

/// Slopes inside this dead zone are reported as `stable` to suppress
/// noise-level drift.
const SLOPE_DEAD_ZONE: f64 = 0.01;

/// R² levels for the trend `significance` label.
const STRONG_R_SQUARED: f64 = 0.5;
const MODERATE_R_SQUARED: f64 = 0.2;

/// Minimum series length before any seasonal cycle is considered.
const MIN_SEASONAL_POINTS: usize = 14;

/// Cycle-mean coefficient of variation above which a cycle is reported.
const SEASONALITY_CV_THRESHOLD: f64 = 0.1;

/// A change point fires when adjacent segment means differ by more than
/// this fraction of the overall series mean.
const CHANGE_THRESHOLD_FRACTION: f64 = 0.2;

/// Minimum change-point segment size in buckets.
const MIN_SEGMENT_SIZE: usize = 5;

// ---

/// One aggregated observation of a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendPoint {
    pub timestamp: i64,
    pub value: f64,
}

/// Ordinary least-squares fit of value against series index.
#[derive(Debug, Clone, Serialize)]
pub struct LinearTrend {
    pub slope: f64,
    pub intercept: f64,
    #[serde(rename = "rSquared")]
    pub r_squared: f64,
    pub direction: &'static str,
    pub significance: &'static str,
}

/// A detected cyclical pattern.
#[derive(Debug, Clone, Serialize)]
pub struct SeasonalPattern {
    #[serde(rename = "cycleLength")]
    pub cycle_length: usize,
    #[serde(rename = "cycleLengthLabel")]
    pub cycle_length_label: &'static str,
    pub strength: f64,
    pub averages: Vec<f64>,
}

/// A shift in the local mean of the series.
#[derive(Debug, Clone, Serialize)]
pub struct ChangePoint {
    pub timestamp: i64,
    #[serde(rename = "beforeValue")]
    pub before_value: f64,
    #[serde(rename = "afterValue")]
    pub after_value: f64,
    #[serde(rename = "changePercent")]
    pub change_percent: f64,
}

/// Full trend analysis of one sensor/metric series.
///
/// A series with fewer than 2 points produces the degenerate form: `trend`
/// and `seasonalPattern` null, empty `movingAverage` and `changePoints`,
/// and no `rawData` key at all.
#[derive(Debug, Clone, Serialize)]
pub struct MetricTrendAnalysis {
    pub trend: Option<LinearTrend>,
    #[serde(rename = "movingAverage")]
    pub moving_average: Vec<TrendPoint>,
    #[serde(rename = "seasonalPattern")]
    pub seasonal_pattern: Option<SeasonalPattern>,
    #[serde(rename = "changePoints")]
    pub change_points: Vec<ChangePoint>,
    #[serde(rename = "rawData", skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<Vec<TrendPoint>>,
}

// ---

/// Analyze one series at the given aggregation level.
pub fn analyze(points: &[TrendPoint], level: Aggregation) -> MetricTrendAnalysis {
    // ---
    if points.len() < 2 {
        return MetricTrendAnalysis {
            trend: None,
            moving_average: Vec::new(),
            seasonal_pattern: None,
            change_points: Vec::new(),
            raw_data: None,
        };
    }

    let mut data = points.to_vec();
    data.sort_by_key(|p| p.timestamp);

    let overall_mean = data.iter().map(|p| p.value).sum::<f64>() / data.len() as f64;

    MetricTrendAnalysis {
        trend: Some(linear_trend(&data)),
        moving_average: moving_average(&data, level.moving_average_window()),
        seasonal_pattern: seasonal_pattern(&data, level),
        change_points: change_points(&data, overall_mean),
        raw_data: Some(data),
    }
}

/// Least-squares regression of value against 0-based index.
///
/// Regressing against the index rather than the raw timestamp keeps the
/// slope in value-per-bucket units regardless of aggregation level.
pub fn linear_trend(data: &[TrendPoint]) -> LinearTrend {
    // ---
    let n = data.len() as f64;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xy = 0.0;
    let mut sum_xx = 0.0;

    for (index, point) in data.iter().enumerate() {
        let x = index as f64;
        sum_x += x;
        sum_y += point.value;
        sum_xy += x * point.value;
        sum_xx += x * x;
    }

    let slope = (n * sum_xy - sum_x * sum_y) / (n * sum_xx - sum_x * sum_x);
    let intercept = (sum_y - slope * sum_x) / n;

    let mean_y = sum_y / n;
    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for (index, point) in data.iter().enumerate() {
        let predicted = slope * index as f64 + intercept;
        ss_res += (point.value - predicted) * (point.value - predicted);
        ss_tot += (point.value - mean_y) * (point.value - mean_y);
    }
    let r_squared = if ss_tot != 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

    LinearTrend {
        slope,
        intercept,
        r_squared,
        direction: if slope > SLOPE_DEAD_ZONE {
            "increasing"
        } else if slope < -SLOPE_DEAD_ZONE {
            "decreasing"
        } else {
            "stable"
        },
        significance: if r_squared > STRONG_R_SQUARED {
            "strong"
        } else if r_squared > MODERATE_R_SQUARED {
            "moderate"
        } else {
            "weak"
        },
    }
}

/// Trailing (non-centered) moving average with a fixed window.
///
/// The output starts at index `window - 1` of the input, so a series
/// shorter than the window yields an empty result.
pub fn moving_average(data: &[TrendPoint], window: usize) -> Vec<TrendPoint> {
    // ---
    if data.len() < window || window == 0 {
        return Vec::new();
    }

    (window - 1..data.len())
        .map(|i| {
            let slice = &data[i + 1 - window..=i];
            let avg = slice.iter().map(|p| p.value).sum::<f64>() / window as f64;
            TrendPoint {
                timestamp: data[i].timestamp,
                value: avg,
            }
        })
        .collect()
}

/// Scan candidate cycle lengths for a seasonal pattern.
///
/// Candidates are tried shortest first and the first qualifying one wins.
/// Each candidate needs at least two full cycles of data; a cycle qualifies
/// when the coefficient of variation across its cycle means exceeds the
/// threshold.
fn seasonal_pattern(data: &[TrendPoint], level: Aggregation) -> Option<SeasonalPattern> {
    // ---
    if data.len() < MIN_SEASONAL_POINTS {
        return None;
    }

    for cycle_length in level.seasonal_cycles() {
        if data.len() < cycle_length * 2 {
            continue;
        }

        let cycles = data.len() / cycle_length;
        let cycle_averages: Vec<f64> = (0..cycles)
            .map(|cycle| {
                let slice = &data[cycle * cycle_length..(cycle + 1) * cycle_length];
                slice.iter().map(|p| p.value).sum::<f64>() / cycle_length as f64
            })
            .collect();

        let cycle_mean = cycle_averages.iter().sum::<f64>() / cycle_averages.len() as f64;
        let cycle_variance = cycle_averages
            .iter()
            .map(|avg| (avg - cycle_mean) * (avg - cycle_mean))
            .sum::<f64>()
            / cycle_averages.len() as f64;
        let coefficient_of_variation = cycle_variance.sqrt() / cycle_mean;

        if coefficient_of_variation > SEASONALITY_CV_THRESHOLD {
            return Some(SeasonalPattern {
                cycle_length,
                cycle_length_label: cycle_label(cycle_length),
                strength: coefficient_of_variation,
                averages: cycle_averages,
            });
        }
    }

    None
}

fn cycle_label(cycle_length: usize) -> &'static str {
    // ---
    match cycle_length {
        7 | 168 => "weekly",
        24 => "daily",
        30 => "monthly",
        _ => "custom",
    }
}

/// Heuristic change-point detection over non-overlapping segment pairs.
///
/// Not a statistical changepoint test: a boundary is flagged whenever the
/// segment means on either side differ by more than a fixed fraction of
/// the overall mean.
fn change_points(data: &[TrendPoint], overall_mean: f64) -> Vec<ChangePoint> {
    // ---
    let n = data.len();
    let segment_size = (n / 10).max(MIN_SEGMENT_SIZE);
    let threshold = overall_mean * CHANGE_THRESHOLD_FRACTION;

    let mut points = Vec::new();
    let mut i = segment_size;
    while i + segment_size < n {
        let before = &data[i - segment_size..i];
        let after = &data[i..i + segment_size];

        let before_mean = before.iter().map(|p| p.value).sum::<f64>() / before.len() as f64;
        let after_mean = after.iter().map(|p| p.value).sum::<f64>() / after.len() as f64;

        if (after_mean - before_mean).abs() > threshold {
            points.push(ChangePoint {
                timestamp: data[i].timestamp,
                before_value: before_mean,
                after_value: after_mean,
                change_percent: (after_mean - before_mean) / before_mean * 100.0,
            });
        }

        i += segment_size;
    }

    points
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn series(values: &[f64]) -> Vec<TrendPoint> {
        // ---
        values
            .iter()
            .enumerate()
            .map(|(i, &value)| TrendPoint {
                timestamp: i as i64 * 86_400_000,
                value,
            })
            .collect()
    }

    #[test]
    fn test_short_series_is_degenerate() {
        // ---
        for points in [vec![], series(&[42.0])] {
            let result = analyze(&points, Aggregation::Daily);
            assert!(result.trend.is_none());
            assert!(result.moving_average.is_empty());
            assert!(result.seasonal_pattern.is_none());
            assert!(result.change_points.is_empty());
            assert!(result.raw_data.is_none());
        }
    }

    #[test]
    fn test_degenerate_series_omits_raw_data_key() {
        // ---
        let result = analyze(&series(&[42.0]), Aggregation::Daily);
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("rawData").is_none());
        assert_eq!(json["trend"], serde_json::Value::Null);
        assert_eq!(json["movingAverage"], serde_json::json!([]));
    }

    #[test]
    fn test_linear_trend_exact_fit() {
        // ---
        // value = 2x + 5, a perfect fit
        let data = series(&[5.0, 7.0, 9.0, 11.0, 13.0]);
        let trend = linear_trend(&data);
        assert!((trend.slope - 2.0).abs() < 1e-12);
        assert!((trend.intercept - 5.0).abs() < 1e-12);
        assert!((trend.r_squared - 1.0).abs() < 1e-12);
        assert_eq!(trend.direction, "increasing");
        assert_eq!(trend.significance, "strong");
    }

    #[test]
    fn test_constant_series_is_stable_and_weak() {
        // ---
        let trend = linear_trend(&series(&[3.0, 3.0, 3.0, 3.0]));
        assert_eq!(trend.slope, 0.0);
        assert_eq!(trend.r_squared, 0.0);
        assert_eq!(trend.direction, "stable");
        assert_eq!(trend.significance, "weak");
    }

    #[test]
    fn test_slope_dead_zone() {
        // ---
        // Slope 0.005 sits inside the ±0.01 dead zone
        let data = series(&[1.000, 1.005, 1.010, 1.015]);
        assert_eq!(linear_trend(&data).direction, "stable");

        let falling = series(&[10.0, 9.0, 8.0, 7.0]);
        assert_eq!(linear_trend(&falling).direction, "decreasing");
    }

    #[test]
    fn test_moving_average_length_and_values() {
        // ---
        let data = series(&[1.0, 2.0, 3.0, 4.0, 5.0]);

        let ma = moving_average(&data, 3);
        assert_eq!(ma.len(), 3);
        assert_eq!(ma[0].value, 2.0);
        assert_eq!(ma[2].value, 4.0);
        // Each output point carries the timestamp of the window's last input
        assert_eq!(ma[0].timestamp, data[2].timestamp);

        // Output length is max(0, n - window + 1)
        for n in 0..10usize {
            let data = series(&vec![1.0; n]);
            let expected = n.saturating_sub(7 - 1).min(n);
            assert_eq!(moving_average(&data, 7).len(), expected, "n = {n}");
        }
    }

    #[test]
    fn test_seasonal_pattern_weekly_cycle() {
        // ---
        // Two full weekly cycles with clearly different levels
        let mut values = vec![10.0; 7];
        values.extend(vec![20.0; 7]);
        let result = analyze(&series(&values), Aggregation::Daily);

        let pattern = result.seasonal_pattern.expect("pattern expected");
        assert_eq!(pattern.cycle_length, 7);
        assert_eq!(pattern.cycle_length_label, "weekly");
        assert_eq!(pattern.averages, vec![10.0, 20.0]);
        // mean 15, stddev 5 -> CoV 1/3
        assert!((pattern.strength - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_seasonal_pattern_in_flat_series() {
        // ---
        let result = analyze(&series(&vec![10.0; 28]), Aggregation::Daily);
        assert!(result.seasonal_pattern.is_none());
    }

    #[test]
    fn test_seasonal_pattern_needs_two_cycles() {
        // ---
        // 20 hourly points clear the 14-point gate but not 2 * 24
        let mut values = vec![10.0; 10];
        values.extend(vec![30.0; 10]);
        let result = analyze(&series(&values), Aggregation::Hourly);
        assert!(result.seasonal_pattern.is_none());
    }

    #[test]
    fn test_change_point_at_level_shift() {
        // ---
        // 10 quiet buckets then 10 elevated ones; segment size max(2, 5) = 5
        let mut values = vec![10.0; 10];
        values.extend(vec![100.0; 10]);
        let data = series(&values);
        let result = analyze(&data, Aggregation::Daily);

        assert_eq!(result.change_points.len(), 1);
        let cp = &result.change_points[0];
        assert_eq!(cp.timestamp, data[10].timestamp);
        assert_eq!(cp.before_value, 10.0);
        assert_eq!(cp.after_value, 100.0);
        assert!((cp.change_percent - 900.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_change_points_in_steady_series() {
        // ---
        let result = analyze(&series(&vec![50.0; 30]), Aggregation::Daily);
        assert!(result.change_points.is_empty());
    }

    #[test]
    fn test_analyze_sorts_by_timestamp() {
        // ---
        let mut data = series(&[1.0, 2.0, 3.0, 4.0]);
        data.reverse();
        let result = analyze(&data, Aggregation::Daily);
        let raw = result.raw_data.unwrap();
        assert!(raw.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(result.trend.unwrap().direction, "increasing");
    }
}
