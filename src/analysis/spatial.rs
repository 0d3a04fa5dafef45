//! Spatial interpolation over located sensors: padded bounding box, inverse
//! distance weighted value grid, and hotspot/coldspot extraction.
//!
//! Distances use a planar small-angle approximation (radian deltas, scaled
//! by the Earth radius where meters are needed) rather than a great-circle
//! formula. Fine for sensor networks spanning a city or region; do not feed
//! it continental separations.

use serde::Serialize;

// ---

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Fractional padding applied to each side of the bounding box.
const BOUNDS_PADDING: f64 = 0.1;

/// Substitute weight for a grid point coinciding with a sensor, large
/// enough to dominate every realistic finite weight.
const COINCIDENT_WEIGHT: f64 = 1e10;

/// Fraction of sensors reported as hotspots and as coldspots.
const SPOT_FRACTION: f64 = 0.2;

// ---

/// Geographic bounding box of the analyzed sensors, padded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bounds {
    #[serde(rename = "minLat")]
    pub min_lat: f64,
    #[serde(rename = "maxLat")]
    pub max_lat: f64,
    #[serde(rename = "minLong")]
    pub min_long: f64,
    #[serde(rename = "maxLong")]
    pub max_long: f64,
}

/// A located sensor observation feeding the interpolation.
#[derive(Debug, Clone, Copy)]
pub struct SamplePoint {
    pub lat: f64,
    pub long: f64,
    pub value: f64,
}

/// One interpolated grid cell corner.
#[derive(Debug, Clone, Serialize)]
pub struct GridPoint {
    pub lat: f64,
    pub long: f64,
    pub value: Option<f64>,
}

/// A located sensor carrying one metric value, for spot ranking.
#[derive(Debug, Clone, Serialize)]
pub struct SpotSensor {
    pub device_id: String,
    pub name: String,
    pub lat: f64,
    pub long: f64,
    pub value: f64,
}

/// Extreme-value sensor sets for one metric.
#[derive(Debug, Clone, Serialize)]
pub struct Spots {
    pub hotspots: Vec<SpotSensor>,
    pub coldspots: Vec<SpotSensor>,
}

// ---

/// Planar small-angle distance between two WGS84 coordinates, in radians.
pub fn planar_distance_radians(lat1: f64, long1: f64, lat2: f64, long2: f64) -> f64 {
    // ---
    let lat_diff = (lat1 - lat2).to_radians();
    let long_diff = (long1 - long2).to_radians();
    (lat_diff * lat_diff + long_diff * long_diff).sqrt()
}

/// Planar small-angle distance in meters.
pub fn planar_distance_meters(lat1: f64, long1: f64, lat2: f64, long2: f64) -> f64 {
    planar_distance_radians(lat1, long1, lat2, long2) * EARTH_RADIUS_M
}

/// Bounding box of the given coordinates, expanded by 10% of each span.
///
/// A zero-width span stays zero-width (10% of nothing is nothing); callers
/// get a degenerate but well-formed box for a single sensor. Empty input
/// yields `None`.
pub fn padded_bounds(coords: &[(f64, f64)]) -> Option<Bounds> {
    // ---
    let (first_lat, first_long) = *coords.first()?;
    let mut bounds = Bounds {
        min_lat: first_lat,
        max_lat: first_lat,
        min_long: first_long,
        max_long: first_long,
    };

    for &(lat, long) in &coords[1..] {
        bounds.min_lat = bounds.min_lat.min(lat);
        bounds.max_lat = bounds.max_lat.max(lat);
        bounds.min_long = bounds.min_long.min(long);
        bounds.max_long = bounds.max_long.max(long);
    }

    let lat_padding = (bounds.max_lat - bounds.min_lat) * BOUNDS_PADDING;
    let long_padding = (bounds.max_long - bounds.min_long) * BOUNDS_PADDING;
    bounds.min_lat -= lat_padding;
    bounds.max_lat += lat_padding;
    bounds.min_long -= long_padding;
    bounds.max_long += long_padding;

    Some(bounds)
}

/// Inverse-distance-weighted value grid over the padded bounds.
///
/// Produces `(grid_size + 1)²` points in row-major order (latitude outer,
/// longitude inner). Weights are `1/d²` of the planar radian distance; a
/// sensor coinciding with a grid point contributes the fixed dominant
/// weight instead of dividing by zero. With no samples every grid value
/// is `None`.
pub fn idw_grid(bounds: &Bounds, grid_size: usize, samples: &[SamplePoint]) -> Vec<GridPoint> {
    // ---
    let lat_step = (bounds.max_lat - bounds.min_lat) / grid_size as f64;
    let long_step = (bounds.max_long - bounds.min_long) / grid_size as f64;

    let mut grid = Vec::with_capacity((grid_size + 1) * (grid_size + 1));
    for i in 0..=grid_size {
        for j in 0..=grid_size {
            let lat = bounds.min_lat + i as f64 * lat_step;
            let long = bounds.min_long + j as f64 * long_step;

            let mut weighted_sum = 0.0;
            let mut weight_sum = 0.0;
            for sample in samples {
                let distance = planar_distance_radians(sample.lat, sample.long, lat, long);
                let weight = if distance == 0.0 {
                    COINCIDENT_WEIGHT
                } else {
                    1.0 / (distance * distance)
                };
                weighted_sum += sample.value * weight;
                weight_sum += weight;
            }

            grid.push(GridPoint {
                lat,
                long,
                value: if weight_sum > 0.0 {
                    Some(weighted_sum / weight_sum)
                } else {
                    None
                },
            });
        }
    }

    grid
}

/// Rank sensors by value and slice off the top and bottom 20% (rounded up).
///
/// Both sets come from the same descending ordering; for small sensor
/// counts they can overlap, which is left as is.
pub fn find_spots(mut sensors: Vec<SpotSensor>) -> Spots {
    // ---
    if sensors.is_empty() {
        return Spots {
            hotspots: Vec::new(),
            coldspots: Vec::new(),
        };
    }

    sensors.sort_by(|a, b| b.value.total_cmp(&a.value));
    let threshold = (sensors.len() as f64 * SPOT_FRACTION).ceil() as usize;

    Spots {
        hotspots: sensors[..threshold].to_vec(),
        coldspots: sensors[sensors.len() - threshold..].to_vec(),
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn spot(device_id: &str, value: f64) -> SpotSensor {
        // ---
        SpotSensor {
            device_id: device_id.to_string(),
            name: device_id.to_string(),
            lat: 51.5,
            long: -0.1,
            value,
        }
    }

    #[test]
    fn test_padded_bounds() {
        // ---
        let coords = [(10.0, 20.0), (12.0, 26.0)];
        let bounds = padded_bounds(&coords).unwrap();
        // Spans 2 and 6, padded by 10% on each side
        assert!((bounds.min_lat - 9.8).abs() < 1e-12);
        assert!((bounds.max_lat - 12.2).abs() < 1e-12);
        assert!((bounds.min_long - 19.4).abs() < 1e-12);
        assert!((bounds.max_long - 26.6).abs() < 1e-12);

        assert!(padded_bounds(&[]).is_none());
    }

    #[test]
    fn test_zero_span_bounds_stay_degenerate() {
        // ---
        let bounds = padded_bounds(&[(51.5, -0.1)]).unwrap();
        assert_eq!(bounds.min_lat, bounds.max_lat);
        assert_eq!(bounds.min_long, bounds.max_long);
    }

    #[test]
    fn test_planar_distance() {
        // ---
        assert_eq!(planar_distance_radians(10.0, 20.0, 10.0, 20.0), 0.0);

        // One degree of latitude under the small-angle planar model
        let d = planar_distance_meters(10.0, 20.0, 11.0, 20.0);
        let expected = 1.0_f64.to_radians() * EARTH_RADIUS_M;
        assert!((d - expected).abs() < 1e-6);
    }

    #[test]
    fn test_idw_grid_dimensions() {
        // ---
        let bounds = Bounds {
            min_lat: 0.0,
            max_lat: 1.0,
            min_long: 0.0,
            max_long: 1.0,
        };
        let samples = [SamplePoint {
            lat: 0.5,
            long: 0.5,
            value: 7.0,
        }];
        let grid = idw_grid(&bounds, 10, &samples);
        assert_eq!(grid.len(), 121);
        assert_eq!(grid[0].lat, 0.0);
        assert_eq!(grid[0].long, 0.0);
        assert_eq!(grid[120].lat, 1.0);
        assert_eq!(grid[120].long, 1.0);
    }

    #[test]
    fn test_idw_snaps_to_coincident_sensor() {
        // ---
        let bounds = Bounds {
            min_lat: 0.0,
            max_lat: 1.0,
            min_long: 0.0,
            max_long: 1.0,
        };
        let samples = [
            SamplePoint {
                lat: 0.0,
                long: 0.0,
                value: 42.0,
            },
            SamplePoint {
                lat: 1.0,
                long: 1.0,
                value: 10.0,
            },
        ];
        let grid = idw_grid(&bounds, 1, &samples);

        // Corner (0, 0) coincides with the first sensor and takes its value
        assert!((grid[0].value.unwrap() - 42.0).abs() < 1e-4);
        // Corner (1, 1) coincides with the second
        assert!((grid[3].value.unwrap() - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_idw_without_samples_is_null() {
        // ---
        let bounds = Bounds {
            min_lat: 0.0,
            max_lat: 1.0,
            min_long: 0.0,
            max_long: 1.0,
        };
        let grid = idw_grid(&bounds, 2, &[]);
        assert_eq!(grid.len(), 9);
        assert!(grid.iter().all(|p| p.value.is_none()));
    }

    #[test]
    fn test_spot_slicing() {
        // ---
        let sensors = vec![
            spot("a", 1.0),
            spot("b", 5.0),
            spot("c", 3.0),
            spot("d", 9.0),
            spot("e", 7.0),
        ];
        let spots = find_spots(sensors);

        // ceil(5 * 0.2) = 1 on each end of the descending order
        assert_eq!(spots.hotspots.len(), 1);
        assert_eq!(spots.hotspots[0].device_id, "d");
        assert_eq!(spots.coldspots.len(), 1);
        assert_eq!(spots.coldspots[0].device_id, "a");
    }

    #[test]
    fn test_spots_may_overlap_for_tiny_counts() {
        // ---
        let spots = find_spots(vec![spot("a", 1.0), spot("b", 2.0)]);
        // ceil(2 * 0.2) = 1; with two sensors the sets are disjoint,
        // but a single sensor lands in both
        assert_eq!(spots.hotspots.len(), 1);
        assert_eq!(spots.coldspots.len(), 1);

        let single = find_spots(vec![spot("only", 4.0)]);
        assert_eq!(single.hotspots[0].device_id, "only");
        assert_eq!(single.coldspots[0].device_id, "only");

        assert!(find_spots(Vec::new()).hotspots.is_empty());
    }
}
