/// Miscellaneous functions that are used in other parts of the program
use core::ops::{Add, Div, Mul, Sub};
use std::cmp::Ordering;

/// Interpolate linearly between two known points
///
/// https://en.wikipedia.org/wiki/Linear_interpolation#Linear_interpolation_between_two_known_points
///
/// # Arguments
/// - `known_xy0`: The first known point as (explanatory, independent)
/// - `known_xy1`: The second known point as (explanatory, independent)
/// - `x`: The explanatory point at which to interpolate the independent variables
///
/// # Returns
/// The interpolated independent (y) value.
pub fn interpolate_between_known<
    T: Add<Output = T> + Sub<Output = T> + Mul<Output = T> + Div<Output = T> + Copy,
>(
    known_xy0: (T, T),
    known_xy1: (T, T),
    x: T,
) -> T {
    (known_xy0.1 * (known_xy1.0 - x) + known_xy1.1 * (x - known_xy0.0)) / (known_xy1.0 - known_xy0.0)
}

/// Derive the quantiles of an iterator of values
///
/// Values that cannot be ordered (NaN) are treated as equal to their neighbours, so they should be
/// filtered out beforehand if they matter.
///
/// # Arguments
/// - `values`: An iterator of values
/// - `quantiles`: The quantiles to derive
/// - `downsample`: Downsample the data to increase performance.
///
/// # Returns
/// The quantiles, or None if there were no values.
pub fn quantiles<'a, T: 'a + PartialOrd + Copy, I, const L: usize>(
    values: I,
    quantiles: &[f32; L],
    downsample: Option<usize>,
) -> Option<[T; L]>
where
    I: IntoIterator<Item = &'a T>,
{
    let mut vals: Vec<&T> = values.into_iter().step_by(downsample.unwrap_or(1)).collect();
    vals.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let mut output = [**vals.first()?; L];

    for (i, quantile) in quantiles.iter().enumerate() {
        let index = ((vals.len() as f32 * quantile) as usize).min(vals.len() - 1);
        output[i] = *vals[index];
    }

    Some(output)
}
