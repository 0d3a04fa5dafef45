//! Pearson correlation over aligned pairs, plus the distance-vs-difference
//! classification used for spatial autocorrelation detection.

use serde::Serialize;

// ---

/// Correlation above which a distance/value-difference relation is reported
/// as spatial autocorrelation.
const AUTOCORRELATION_THRESHOLD: f64 = 0.3;

/// Pearson product-moment correlation of `(x, y)` pairs.
///
/// Fewer than 2 pairs carry no correlation and yield `None`. A degenerate
/// (constant) series makes the denominator exactly zero; that case is
/// defined as `0.0` rather than propagating a NaN.
pub fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    // ---
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xx = 0.0;
    let mut sum_yy = 0.0;
    let mut sum_xy = 0.0;

    for (x, y) in pairs {
        sum_x += x;
        sum_y += y;
        sum_xx += x * x;
        sum_yy += y * y;
        sum_xy += x * y;
    }

    let num = sum_xy - sum_x * sum_y / n;
    let den = ((sum_xx - sum_x * sum_x / n) * (sum_yy - sum_y * sum_y / n)).sqrt();

    if den == 0.0 {
        Some(0.0)
    } else {
        Some(num / den)
    }
}

// ---

/// Correlation between sensor separation and absolute value difference.
#[derive(Debug, Clone, Serialize)]
pub struct DistanceCorrelation {
    pub correlation: f64,
    #[serde(rename = "sampleSize")]
    pub sample_size: usize,
    pub interpretation: &'static str,
}

/// Classify the relation between pairwise distance (meters) and absolute
/// value difference for one metric.
///
/// A positive correlation above the threshold means values drift apart with
/// distance, i.e. nearby sensors agree: spatial autocorrelation.
pub fn distance_correlation(pairs: &[(f64, f64)]) -> Option<DistanceCorrelation> {
    // ---
    let correlation = pearson(pairs)?;

    Some(DistanceCorrelation {
        correlation,
        sample_size: pairs.len(),
        interpretation: if correlation > AUTOCORRELATION_THRESHOLD {
            "spatial_autocorrelation"
        } else {
            "no_clear_pattern"
        },
    })
}
