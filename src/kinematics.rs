//! Distance and series statistics shared by every calculator
//!
//! All functions are total: degenerate inputs (too short, zero mean)
//! resolve to 0 or `false` instead of producing NaN or an error.

use statrs::statistics::Statistics;

/// Mean Earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two coordinates in meters
///
/// Applied pairwise between consecutive samples, so GPS jitter adds to the
/// integrated distance.
pub fn haversine_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c * 1000.0
}

/// Arithmetic mean, 0 for an empty series
pub fn mean(series: &[f64]) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    series.mean()
}

/// Population standard deviation, 0 for an empty series
pub fn population_std_dev(series: &[f64]) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    series.population_std_dev()
}

/// Ordinary least-squares slope of value against index
///
/// Returns 0 for fewer than two points.
pub fn linear_trend_slope(series: &[f64]) -> f64 {
    let n = series.len();
    if n < 2 {
        return 0.0;
    }

    let n_f = n as f64;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_x2) = (0.0, 0.0, 0.0, 0.0);
    for (i, y) in series.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_x2 += x * x;
    }

    let denominator = n_f * sum_x2 - sum_x * sum_x;
    if denominator == 0.0 {
        return 0.0;
    }

    (n_f * sum_xy - sum_x * sum_y) / denominator
}

/// Population standard deviation divided by the mean
///
/// Returns 0 for an empty series or a zero mean.
pub fn coefficient_of_variation(series: &[f64]) -> f64 {
    let m = mean(series);
    if m == 0.0 {
        return 0.0;
    }
    population_std_dev(series) / m
}

/// True when any value lies more than two standard deviations from the mean
///
/// Needs at least three points.
pub fn has_spike(series: &[f64]) -> bool {
    if series.len() < 3 {
        return false;
    }

    let m = mean(series);
    let std_dev = population_std_dev(series);
    series.iter().any(|v| (v - m).abs() > 2.0 * std_dev)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_known_distance() {
        // 0.0001° of latitude is about 11.1 m anywhere on the globe
        let d = haversine_meters(53.0, -2.0, 53.0001, -2.0);
        assert!((d - 11.119).abs() < 0.01, "got {}", d);

        assert_eq!(haversine_meters(10.0, 10.0, 10.0, 10.0), 0.0);
    }

    #[test]
    fn test_linear_trend_slope() {
        assert_eq!(linear_trend_slope(&[]), 0.0);
        assert_eq!(linear_trend_slope(&[4.0]), 0.0);
        assert!((linear_trend_slope(&[1.0, 3.0, 5.0, 7.0]) - 2.0).abs() < 1e-12);
        assert!((linear_trend_slope(&[9.0, 6.0, 3.0]) + 3.0).abs() < 1e-12);
        assert_eq!(linear_trend_slope(&[2.0, 2.0, 2.0]), 0.0);
    }

    #[test]
    fn test_coefficient_of_variation_guards() {
        assert_eq!(coefficient_of_variation(&[]), 0.0);
        assert_eq!(coefficient_of_variation(&[-1.0, 1.0]), 0.0);
        assert_eq!(coefficient_of_variation(&[5.0, 5.0, 5.0]), 0.0);

        let cov = coefficient_of_variation(&[2.0, 4.0]);
        assert!((cov - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_has_spike() {
        assert!(!has_spike(&[1.0, 100.0]));
        assert!(!has_spike(&[1.0, 1.0, 1.0, 1.0]));
        assert!(has_spike(&[1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 20.0]));
    }

    #[test]
    fn test_mean_and_std_of_empty_series() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(population_std_dev(&[]), 0.0);
        assert!((population_std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]) - 2.0).abs() < 1e-12);
    }
}
