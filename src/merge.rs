/// Combination of survey records: compatibility checks, merging and delta-t records
use ndarray::{concatenate, Array1, Array2, Axis};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::error::{MogError, Result};
use crate::mog::{Mog, Pick};

/// A reason why two records cannot be combined
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Incompatibility {
    TxBorehole,
    RxBorehole,
    AirShotBefore,
    AirShotAfter,
    Offsets,
    SurveyType,
}

/// List every reason why two records cannot be combined. An empty list means they are compatible.
pub fn incompatibilities(a: &Mog, b: &Mog) -> Vec<Incompatibility> {
    [
        (a.tx != b.tx, Incompatibility::TxBorehole),
        (a.rx != b.rx, Incompatibility::RxBorehole),
        (a.av != b.av, Incompatibility::AirShotBefore),
        (a.ap != b.ap, Incompatibility::AirShotAfter),
        (
            (a.tx_offset != b.tx_offset) | (a.rx_offset != b.rx_offset),
            Incompatibility::Offsets,
        ),
        (a.survey_type != b.survey_type, Incompatibility::SurveyType),
    ]
    .into_iter()
    .filter_map(|(failed, reason)| failed.then_some(reason))
    .collect()
}

pub fn compatible(a: &Mog, b: &Mog) -> bool {
    incompatibilities(a, b).is_empty()
}

fn check_compatible(reference: &Mog, other: &Mog) -> Result<()> {
    let reasons = incompatibilities(reference, other);
    if !reasons.is_empty() {
        warn!("{} and {} are incompatible: {:?}", reference.name, other.name, reasons);
        return Err(MogError::Incompatible {
            reference: reference.name.clone(),
            other: other.name.clone(),
            reasons,
        });
    };
    Ok(())
}

fn concat<T: Clone>(a: &Array1<T>, b: &Array1<T>) -> Array1<T> {
    a.iter().chain(b.iter()).cloned().collect()
}

fn concat_rows(a: &Array2<f64>, b: &Array2<f64>) -> Result<Array2<f64>> {
    concatenate(Axis(0), &[a.view(), b.view()])
        .map_err(|e| MogError::Geometry(format!("Could not stack direction cosines: {}", e)))
}

/// Merge two compatible records into a new one
///
/// Every per-trace array of `other` is appended to that of `reference`, so the merged record has
/// the trace count of both. The boreholes, air shots and settings are those of `reference`. The
/// processing log of the new record starts empty.
pub fn merge(reference: &Mog, other: &Mog, new_name: &str) -> Result<Mog> {
    check_compatible(reference, other)?;

    let snr = match (&reference.snr, &other.snr) {
        (Some(a), Some(b)) => Some(concat(a, b)),
        _ => None,
    };

    let merged = Mog {
        name: new_name.to_string(),
        tx: reference.tx,
        rx: reference.rx,
        survey_type: reference.survey_type,
        csurvmod: reference.csurvmod.clone(),
        tx_offset: reference.tx_offset,
        rx_offset: reference.rx_offset,
        tx_z_orig: concat(&reference.tx_z_orig, &other.tx_z_orig),
        rx_z_orig: concat(&reference.rx_z_orig, &other.rx_z_orig),
        tx_x: concat(&reference.tx_x, &other.tx_x),
        tx_y: concat(&reference.tx_y, &other.tx_y),
        tx_z: concat(&reference.tx_z, &other.tx_z),
        rx_x: concat(&reference.rx_x, &other.rx_x),
        rx_y: concat(&reference.rx_y, &other.rx_y),
        rx_z: concat(&reference.rx_z, &other.rx_z),
        tx_cos_dir: concat_rows(&reference.tx_cos_dir, &other.tx_cos_dir)?,
        rx_cos_dir: concat_rows(&reference.rx_cos_dir, &other.rx_cos_dir)?,
        picks: concat(&reference.picks, &other.picks),
        amp_tmin: concat(&reference.amp_tmin, &other.amp_tmin),
        amp_tmax: concat(&reference.amp_tmax, &other.amp_tmax),
        amp_done: concat(&reference.amp_done, &other.amp_done),
        in_tx_vect: concat(&reference.in_tx_vect, &other.in_tx_vect),
        in_rx_vect: concat(&reference.in_rx_vect, &other.in_rx_vect),
        in_vect: concat(&reference.in_vect, &other.in_vect),
        fac_dt: concat(&reference.fac_dt, &other.fac_dt),
        user_fac_dt: concat(&reference.user_fac_dt, &other.user_fac_dt),
        av: reference.av,
        ap: reference.ap,
        use_air_shots: reference.use_air_shots,
        prune_params: reference.prune_params.clone(),
        snr,
        log: Vec::new(),
    };
    merged.assert_shape();

    Ok(merged)
}

fn distance(a: (f64, f64, f64), b: (f64, f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2) + (a.2 - b.2).powi(2)).sqrt()
}

/// Pair the included traces of two records by station proximity
///
/// A pair only matches if both its Tx and its Rx stations are within `tolerance` of each other.
/// Pairs are taken closest first and every trace is used at most once, so a subtrahend pick is
/// never subtracted twice.
///
/// # Returns
/// (minuend trace, subtrahend trace) pairs in ascending minuend trace order.
pub fn match_traces(minuend: &Mog, subtrahend: &Mog, tolerance: f64) -> Vec<(usize, usize)> {
    let tx = |mog: &Mog, i: usize| (mog.tx_x[i], mog.tx_y[i], mog.tx_z[i]);
    let rx = |mog: &Mog, i: usize| (mog.rx_x[i], mog.rx_y[i], mog.rx_z[i]);
    let candidates = (0..subtrahend.ntrace())
        .filter(|j| subtrahend.in_vect[*j])
        .collect::<Vec<usize>>();

    let mut within = (0..minuend.ntrace())
        .into_par_iter()
        .filter(|i| minuend.in_vect[*i])
        .flat_map_iter(|i| {
            candidates.iter().filter_map(move |j| {
                let tx_distance = distance(tx(minuend, i), tx(subtrahend, *j));
                let rx_distance = distance(rx(minuend, i), rx(subtrahend, *j));
                ((tx_distance <= tolerance) & (rx_distance <= tolerance)).then_some((i, *j, tx_distance + rx_distance))
            })
        })
        .collect::<Vec<(usize, usize, f64)>>();
    within.sort_by(|a, b| a.2.total_cmp(&b.2).then(a.0.cmp(&b.0)).then(a.1.cmp(&b.1)));

    let mut minuend_used = vec![false; minuend.ntrace()];
    let mut subtrahend_used = vec![false; subtrahend.ntrace()];
    let mut pairs = Vec::new();
    for (i, j, _) in within {
        if !minuend_used[i] & !subtrahend_used[j] {
            minuend_used[i] = true;
            subtrahend_used[j] = true;
            pairs.push((i, j));
        };
    }
    pairs.sort_unstable();

    pairs
}

/// Compute the travel time difference between two compatible records
///
/// Both records must be picked on all of their included traces. Included traces of the two
/// records are paired one-to-one, closest first (see `match_traces`). Minuend traces without a
/// match are left out. The result keeps the geometry of the minuend, and
/// its uncertainties are those of the two picks combined in quadrature.
///
/// # Arguments
/// - `minuend`: The record to subtract from
/// - `subtrahend`: The record to subtract
/// - `tolerance`: The maximum Tx and Rx station distance for two traces to match
/// - `new_name`: The name of the delta-t record
pub fn difference(minuend: &Mog, subtrahend: &Mog, tolerance: f64, new_name: &str) -> Result<Mog> {
    check_compatible(minuend, subtrahend)?;

    for mog in [minuend, subtrahend] {
        let traces = mog.unpicked_traces();
        if !traces.is_empty() {
            return Err(MogError::IncompleteData {
                mog: mog.name.clone(),
                traces,
            });
        };
    }

    let pairs = match_traces(minuend, subtrahend, tolerance);
    let n_included = minuend.in_vect.iter().filter(|v| **v).count();
    if pairs.len() < n_included {
        debug!(
            "{} of {} traces of {} have no match in {}",
            n_included - pairs.len(),
            n_included,
            minuend.name,
            subtrahend.name
        );
    };

    let indices = pairs.iter().map(|(i, _)| *i).collect::<Vec<usize>>();
    let picks = pairs
        .iter()
        .map(|(i, j)| match (minuend.picks[*i], subtrahend.picks[*j]) {
            (Some(m), Some(s)) => Some(Pick::new(
                m.time - s.time,
                (m.uncertainty.powi(2) + s.uncertainty.powi(2)).sqrt(),
            )),
            _ => None,
        })
        .collect::<Array1<Option<Pick>>>();

    let ntrace = indices.len();
    let select = |values: &Array1<f64>| values.select(Axis(0), &indices);

    let delta = Mog {
        name: new_name.to_string(),
        tx: minuend.tx,
        rx: minuend.rx,
        survey_type: minuend.survey_type,
        csurvmod: minuend.csurvmod.clone(),
        tx_offset: minuend.tx_offset,
        rx_offset: minuend.rx_offset,
        tx_z_orig: select(&minuend.tx_z_orig),
        rx_z_orig: select(&minuend.rx_z_orig),
        tx_x: select(&minuend.tx_x),
        tx_y: select(&minuend.tx_y),
        tx_z: select(&minuend.tx_z),
        rx_x: select(&minuend.rx_x),
        rx_y: select(&minuend.rx_y),
        rx_z: select(&minuend.rx_z),
        tx_cos_dir: minuend.tx_cos_dir.select(Axis(0), &indices),
        rx_cos_dir: minuend.rx_cos_dir.select(Axis(0), &indices),
        picks,
        amp_tmin: select(&minuend.amp_tmin),
        amp_tmax: select(&minuend.amp_tmax),
        amp_done: minuend.amp_done.select(Axis(0), &indices),
        in_tx_vect: Array1::from_elem(ntrace, true),
        in_rx_vect: Array1::from_elem(ntrace, true),
        in_vect: Array1::from_elem(ntrace, true),
        fac_dt: select(&minuend.fac_dt),
        user_fac_dt: select(&minuend.user_fac_dt),
        av: minuend.av,
        ap: minuend.ap,
        use_air_shots: minuend.use_air_shots,
        prune_params: minuend.prune_params.clone(),
        snr: None,
        log: Vec::new(),
    };
    delta.assert_shape();

    Ok(delta)
}
