/// Pruning of survey traces on elevation, station skipping, ray angle and signal quality
use std::time::SystemTime;

use ndarray::{Array1, Zip};
use ndarray_stats::QuantileExt;
use rayon::prelude::*;

use super::{in_band, skip_mask, station_indices, unique_sorted};
use crate::error::{MogError, Result};
use crate::mog::{Mog, PruneParams};
use crate::project::Project;

/// Widening of the upper Rx elevation bound, so that floating point neighbours of the bound pass
const RX_ELEVATION_EPSILON: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq)]
pub struct PruneMasks {
    pub in_tx_vect: Array1<bool>,
    pub in_rx_vect: Array1<bool>,
    pub in_vect: Array1<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PruneSummary {
    pub n_tx_stations: usize,
    pub n_rx_stations: usize,
    /// Share of Tx and Rx exclusions relative to the trace count (%)
    pub removed_tx_rx_pct: f64,
    /// Share of the half-circle of ray angles that is excluded (%)
    pub removed_angle_pct: f64,
    pub kept_traces_pct: f64,
}

/// Per-trace mask of the stations that pass the elevation band and the skip
fn station_mask(z: &Array1<f64>, elev_min: f64, elev_max: f64, skip: usize) -> Array1<bool> {
    let stations = unique_sorted(z);
    let skipped = skip_mask(stations.len(), skip);

    let kept = stations
        .iter()
        .zip(skipped)
        .map(|(station, not_skipped)| not_skipped & in_band(-station, elev_min, elev_max))
        .collect::<Vec<bool>>();

    station_indices(z, &stations).into_iter().map(|i| kept[i]).collect()
}

/// Ray angle of every trace in degrees from the horizontal
pub fn ray_angles(mog: &Mog) -> Array1<f64> {
    let dr = ((&mog.tx_x - &mog.rx_x).mapv(|v| v.powi(2)) + (&mog.tx_y - &mog.rx_y).mapv(|v| v.powi(2))).mapv(f64::sqrt);

    Zip::from(&mog.tx_z)
        .and(&mog.rx_z)
        .and(&dr)
        .map_collect(|tx_z, rx_z, dr| (tx_z - rx_z).atan2(*dr).to_degrees())
}

/// Compute the inclusion vectors of a record
///
/// # Arguments
/// - `mog`: The record to prune. Only its geometry (and SNR, if used) is read.
/// - `params`: The pruning criteria
/// - `snr`: Signal-to-noise estimate per trace. Required if `params.snr_threshold` is set.
///
/// # Returns
/// The Tx, Rx and combined inclusion vectors. An empty elevation band excludes everything and is
/// not an error.
pub fn compute_masks(mog: &Mog, params: &PruneParams, snr: Option<&Array1<f64>>) -> Result<PruneMasks> {
    let in_tx_vect = station_mask(&mog.tx_z, params.elev_min, params.elev_max, params.skip_tx);
    let mut in_rx_vect = station_mask(
        &mog.rx_z,
        params.elev_min,
        params.elev_max + RX_ELEVATION_EPSILON,
        params.skip_rx,
    );

    let theta = ray_angles(mog);
    Zip::from(&mut in_rx_vect)
        .and(&theta)
        .for_each(|included, theta| *included &= in_band(*theta, params.ang_min, params.ang_max));

    if let Some(threshold) = params.snr_threshold {
        let snr = snr.ok_or_else(|| MogError::MissingSnr { mog: mog.name.clone() })?;
        assert_eq!(snr.len(), mog.ntrace(), "SNR length does not match the trace count of {}", mog.name);

        Zip::from(&mut in_rx_vect)
            .and(snr)
            .for_each(|included, snr| *included &= *snr >= threshold);
    };

    let in_vect = Zip::from(&in_tx_vect)
        .and(&in_rx_vect)
        .map_collect(|tx, rx| *tx & *rx);

    Ok(PruneMasks {
        in_tx_vect,
        in_rx_vect,
        in_vect,
    })
}

pub fn summarize(mog: &Mog, params: &PruneParams) -> PruneSummary {
    let ntrace = mog.ntrace();
    let percent = |count: usize| match ntrace {
        0 => 0.,
        n => 100. * count as f64 / n as f64,
    };
    let count = |mask: &Array1<bool>| mask.iter().filter(|v| **v).count();

    let removed = (ntrace - count(&mog.in_tx_vect)) + (ntrace - count(&mog.in_rx_vect));

    PruneSummary {
        n_tx_stations: unique_sorted(&mog.tx_z).len(),
        n_rx_stations: unique_sorted(&mog.rx_z).len(),
        removed_tx_rx_pct: percent(removed),
        removed_angle_pct: (180. - (params.ang_max - params.ang_min)) / 180. * 100.,
        kept_traces_pct: percent(count(&mog.in_vect)),
    }
}

/// Prune a record with its own parameters and store the inclusion vectors on it
pub fn apply_prune(mog: &mut Mog) -> Result<PruneSummary> {
    let start_time = SystemTime::now();
    let params = mog.prune_params.clone();

    let masks = compute_masks(mog, &params, mog.snr.as_ref())?;
    mog.in_tx_vect = masks.in_tx_vect;
    mog.in_rx_vect = masks.in_rx_vect;
    mog.in_vect = masks.in_vect;

    let summary = summarize(mog, &params);
    mog.log_event(
        "prune",
        &format!(
            "Pruned with elevation {}-{}, skip Tx/Rx {}/{}, angle {}-{}, SNR threshold {:?}: {:.2}% of traces kept",
            params.elev_min,
            params.elev_max,
            params.skip_tx,
            params.skip_rx,
            params.ang_min,
            params.ang_max,
            params.snr_threshold,
            summary.kept_traces_pct
        ),
        start_time,
    );

    Ok(summary)
}

/// Prune every live record of a project, in parallel
pub fn prune_all(project: &mut Project) -> Result<Vec<(String, PruneSummary)>> {
    let (_, _, mogs) = project.split_mut();

    mogs.into_par_iter()
        .map(|mog| apply_prune(mog).map(|summary| (mog.name.clone(), summary)))
        .collect()
}

/// Elevation bounds that include every station of a record
///
/// # Returns
/// (elev_min, elev_max), or None if the record has no traces.
pub fn elevation_defaults(mog: &Mog) -> Option<(f64, f64)> {
    let tx_min = mog.tx_z.min().ok()?;
    let tx_max = mog.tx_z.max().ok()?;
    let rx_min = mog.rx_z.min().ok()?;
    let rx_max = mog.rx_z.max().ok()?;

    Some((-(*tx_max).max(*rx_max), -(*tx_min).min(*rx_min)))
}
