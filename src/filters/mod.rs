/// Filters that include or exclude traces of a survey record
use ndarray::Array1;

pub mod prune;

/// Sorted unique values of a station coordinate
///
/// Values are compared exactly, so stations that differ by a rounding error are distinct. Negative
/// zero is the same station as zero.
pub fn unique_sorted(values: &Array1<f64>) -> Vec<f64> {
    let mut unique = values.iter().map(|v| v + 0.).collect::<Vec<f64>>();
    unique.sort_by(|a, b| a.total_cmp(b));
    unique.dedup();
    unique
}

/// Index of the unique station that each trace belongs to
///
/// # Arguments
/// - `values`: The station coordinate of every trace
/// - `unique`: The output of `unique_sorted` for the same values
pub fn station_indices(values: &Array1<f64>, unique: &[f64]) -> Vec<usize> {
    values
        .iter()
        .map(|value| unique.partition_point(|station| station.total_cmp(&(value + 0.)).is_lt()))
        .collect()
}

/// Closed-interval membership. An empty interval (max < min) contains nothing.
pub fn in_band(value: f64, min: f64, max: f64) -> bool {
    (value >= min) & (value <= max)
}

/// Mask of the stations kept when skipping `skip` stations between each kept one
pub fn skip_mask(n_stations: usize, skip: usize) -> Vec<bool> {
    (0..n_stations).map(|i| i % (skip + 1) == 0).collect()
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    #[test]
    fn test_unique_stations() {
        let values = array![3., 1., 2., 3., 1., -0.5, -0., 0.];
        let unique = super::unique_sorted(&values);

        assert_eq!(unique, vec![-0.5, 0., 1., 2., 3.]);
        assert_eq!(super::station_indices(&values, &unique), vec![4, 2, 3, 4, 2, 0, 1, 1]);
    }

    #[test]
    fn test_in_band() {
        assert!(super::in_band(0., 0., 10.));
        assert!(super::in_band(10., 0., 10.));
        assert!(!super::in_band(10.1, 0., 10.));
        assert!(!super::in_band(5., 10., 0.));
        assert!(!super::in_band(f64::NAN, 0., 10.));
    }

    #[test]
    fn test_skip_mask() {
        assert_eq!(super::skip_mask(5, 0), vec![true; 5]);
        assert_eq!(super::skip_mask(5, 1), vec![true, false, true, false, true]);
        assert_eq!(super::skip_mask(5, 3), vec![true, false, false, false, true]);
        assert!(super::skip_mask(0, 2).is_empty());
    }
}
