/// Air shot calibration of travel times, and the velocities derived from them
///
/// The air shot reference time (t0) is subtracted from the scaled raw travel times:
/// `corrected = fac_dt * user_fac_dt * tt - t0`.
use ndarray::Array1;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::linear_regression::{LinearRegression, LinearRegressionParameters, LinearRegressionSolverName};
use tracing::{debug, warn};

use crate::error::{MogError, Result};
use crate::mog::{AirShot, AirShotMethod, Mog};
use crate::tools;

/// Propagation velocity of electromagnetic waves in air (m/ns)
pub const AIR_VELOCITY: f64 = 0.2998;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationConfig {
    /// Velocity used to convert the antenna separation of a fixed antenna air shot to a time
    pub air_velocity: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        CalibrationConfig {
            air_velocity: AIR_VELOCITY,
        }
    }
}

type T0Estimator = fn(&AirShot, &CalibrationConfig) -> Result<f64>;

/// The reference time estimator of each air shot method, with a description
const T0_ESTIMATORS: [(AirShotMethod, T0Estimator, &str); 2] = [
    (
        AirShotMethod::FixedAntenna,
        fixed_antenna_t0,
        "Mean picked time minus the time of flight over the antenna separation",
    ),
    (
        AirShotMethod::Walkaway,
        walkaway_t0,
        "Intercept of a straight line fitted to the picked times against the antenna separation",
    ),
];

/// Descriptions of the available air shot methods
pub fn all_methods() -> Vec<(AirShotMethod, &'static str)> {
    T0_ESTIMATORS.iter().map(|(method, _, description)| (*method, *description)).collect()
}

/// The picked traces of an air shot as (index, time)
fn picked_times(air: &AirShot) -> Vec<(usize, f64)> {
    air.picks
        .iter()
        .enumerate()
        .filter_map(|(i, pick)| pick.map(|p| (i, p.time)))
        .collect()
}

fn fixed_antenna_t0(air: &AirShot, config: &CalibrationConfig) -> Result<f64> {
    let times = picked_times(air);
    if times.is_empty() {
        return Err(MogError::Calibration(format!("Air shot {} has no picked traces", air.name)));
    };
    let distance = air.d_tx_rx.first().copied().ok_or_else(|| {
        MogError::Calibration(format!("Air shot {} has no antenna separation", air.name))
    })?;

    let mean_time = times.iter().map(|(_, time)| time).sum::<f64>() / times.len() as f64;

    Ok(air.fac_dt * mean_time - distance / config.air_velocity)
}

fn walkaway_t0(air: &AirShot, _config: &CalibrationConfig) -> Result<f64> {
    let times = picked_times(air);
    if times.len() < 2 {
        return Err(MogError::Calibration(format!(
            "Walk-away air shot {} needs at least two picked traces (found {})",
            air.name,
            times.len()
        )));
    };

    let distances = times
        .iter()
        .map(|(i, _)| {
            air.d_tx_rx
                .get(*i)
                .map(|d| vec![*d])
                .ok_or_else(|| MogError::Calibration(format!("Air shot {} has no antenna separation for trace {}", air.name, i)))
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;
    let picked = times.iter().map(|(_, time)| air.fac_dt * time).collect::<Vec<f64>>();

    // A line through a single separation has no defined intercept
    let first = distances[0][0];
    if distances.iter().all(|d| d[0] == first) {
        return Err(MogError::Calibration(format!(
            "Walk-away air shot {} needs picked traces at two or more antenna separations (all at {} m)",
            air.name, first
        )));
    };

    let xs = DenseMatrix::from_2d_vec(&distances);
    let lr: LinearRegression<f64, f64, DenseMatrix<f64>, Vec<f64>> = LinearRegression::fit(
        &xs,
        &picked,
        LinearRegressionParameters::default().with_solver(LinearRegressionSolverName::QR),
    )
    .map_err(|e| MogError::Calibration(format!("Could not fit walk-away air shot {}: {}", air.name, e)))?;

    let t0 = *lr.intercept();
    if !t0.is_finite() {
        return Err(MogError::Calibration(format!(
            "Walk-away air shot {} gave a non-finite reference time",
            air.name
        )));
    };
    Ok(t0)
}

/// Estimate the reference time of an air shot with the estimator of its method
pub fn reference_t0(air: &AirShot, config: &CalibrationConfig) -> Result<f64> {
    let estimator = T0_ESTIMATORS
        .iter()
        .find(|(method, _, _)| *method == air.method)
        .map(|(_, estimator, _)| *estimator)
        .ok_or_else(|| MogError::Calibration(format!("No estimator for air shot method {:?}", air.method)))?;

    let t0 = estimator(air, config)?;
    debug!("Air shot {} ({:?}): t0 = {}", air.name, air.method, t0);
    Ok(t0)
}

/// Travel times after air shot correction
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectedTravelTimes {
    /// Corrected travel time of every trace, None where unpicked
    pub tt: Array1<Option<f64>>,
    /// Reference time of every trace. Empty if no correction was made.
    pub t0: Array1<f64>,
}

impl CorrectedTravelTimes {
    /// The reference time of a trace, zero if no correction was made
    pub fn t0_at(&self, trace: usize) -> f64 {
        self.t0.get(trace).copied().unwrap_or(0.)
    }
}

/// Correct the travel times of a record with its air shots
///
/// With no air shot (or if the record does not use them), the travel times are returned as is.
/// One air shot gives one reference time for all traces. Two air shots (before and after the
/// survey) give a reference time that drifts linearly with the trace number.
///
/// # Arguments
/// - `mog`: The record to correct
/// - `air_shots`: The air shots of the project, indexed by the air shot ids of the record
/// - `config`: The calibration configuration
pub fn correct(mog: &Mog, air_shots: &[AirShot], config: &CalibrationConfig) -> Result<CorrectedTravelTimes> {
    let raw_tt = mog.picks.mapv(|pick| pick.map(|p| p.time));

    let referenced = [mog.av, mog.ap]
        .into_iter()
        .flatten()
        .map(|id| {
            air_shots
                .get(id.0)
                .ok_or_else(|| MogError::UnknownEntity(format!("{:?}", id)))
        })
        .collect::<Result<Vec<&AirShot>>>()?;

    if !mog.use_air_shots | referenced.is_empty() {
        return Ok(CorrectedTravelTimes {
            tt: raw_tt,
            t0: Array1::zeros(0),
        });
    };

    let ntrace = mog.ntrace();
    let t0 = match referenced.as_slice() {
        [air] => Array1::from_elem(ntrace, reference_t0(air, config)?),
        [before, after] => {
            let (t0_before, t0_after) = (reference_t0(before, config)?, reference_t0(after, config)?);
            match ntrace {
                1 => Array1::from_elem(1, t0_before),
                n => Array1::from_iter((0..n).map(|i| {
                    tools::interpolate_between_known((0., t0_before), ((n - 1) as f64, t0_after), i as f64)
                })),
            }
        }
        _ => Array1::zeros(ntrace),
    };

    let tt = Array1::from_iter((0..ntrace).map(|i| {
        raw_tt[i].map(|time| mog.fac_dt[i] * mog.user_fac_dt[i] * time - t0[i])
    }));

    Ok(CorrectedTravelTimes { tt, t0 })
}

/// Apparent velocities along the straight Tx-Rx rays
#[derive(Debug, Clone, PartialEq)]
pub struct ApparentVelocity {
    pub ray_length: Array1<f64>,
    pub vapp: Array1<f64>,
    /// Velocity at the late end of the pick uncertainty
    pub v_plus: Array1<f64>,
    /// Velocity at the early end of the pick uncertainty
    pub v_minus: Array1<f64>,
}

/// Compute the apparent velocity of every trace
///
/// Unpicked traces get NaN. A zero travel time gives an infinite velocity. Neither is an error:
/// the caller filters with `in_vect` and `tt_done`.
pub fn apparent_velocity(mog: &Mog, corrected: &CorrectedTravelTimes) -> ApparentVelocity {
    let ray_length = mog.ray_lengths();
    let ntrace = mog.ntrace();

    let velocity = |trace: usize, delta: f64| match corrected.tt[trace] {
        Some(tt) => ray_length[trace] / (tt + delta),
        None => f64::NAN,
    };
    let uncertainty = |trace: usize| mog.picks[trace].map(|p| p.uncertainty).unwrap_or(f64::NAN);

    let vapp = Array1::from_iter((0..ntrace).map(|i| velocity(i, 0.)));
    let v_plus = Array1::from_iter((0..ntrace).map(|i| velocity(i, uncertainty(i))));
    let v_minus = Array1::from_iter((0..ntrace).map(|i| velocity(i, -uncertainty(i))));

    ApparentVelocity {
        ray_length,
        vapp,
        v_plus,
        v_minus,
    }
}

/// Picked traces of the zero-offset profile: Tx and Rx at (nearly) the same elevation
pub fn zop_traces(mog: &Mog, tolerance: f64) -> Vec<usize> {
    (0..mog.ntrace())
        .filter(|i| mog.picks[*i].is_some() & ((mog.tx_z[*i] - mog.rx_z[*i]).abs() <= tolerance))
        .collect()
}

/// Travel time statistics of the picked and included traces
#[derive(Debug, Clone, PartialEq)]
pub struct TravelTimeStats {
    pub traces: Vec<usize>,
    /// Straight-ray length
    pub hyp: Array1<f64>,
    /// Ray angle in degrees, positive when Rx is above Tx
    pub theta: Array1<f64>,
    pub tt: Array1<f64>,
    pub et: Array1<f64>,
    pub vapp: Array1<f64>,
    /// Apparent velocity with the air shot correction undone
    pub vapp_uncorrected: Array1<f64>,
    pub t0: Array1<f64>,
}

impl TravelTimeStats {
    /// The median apparent velocity, ignoring non-finite values
    pub fn median_vapp(&self) -> Option<f64> {
        let finite = self.vapp.iter().filter(|v| v.is_finite()).copied().collect::<Vec<f64>>();
        tools::quantiles(&finite, &[0.5], None).map(|[median]| median)
    }

    /// Traces with a negative apparent velocity, which hint at a wrong pick or t0
    pub fn negative_vapp_traces(&self) -> Vec<usize> {
        self.traces
            .iter()
            .zip(self.vapp.iter())
            .filter(|(_, vapp)| **vapp < 0.)
            .map(|(trace, _)| *trace)
            .collect()
    }
}

pub fn traveltime_stats(mog: &Mog, corrected: &CorrectedTravelTimes) -> TravelTimeStats {
    let traces = (0..mog.ntrace())
        .filter(|i| mog.in_vect[*i] & corrected.tt[*i].is_some())
        .collect::<Vec<usize>>();
    let ray_length = mog.ray_lengths();

    let hyp = Array1::from_iter(traces.iter().map(|i| ray_length[*i]));
    let theta = Array1::from_iter(
        traces
            .iter()
            .map(|i| ((mog.rx_z[*i] - mog.tx_z[*i]) / ray_length[*i]).asin().to_degrees()),
    );
    let tt = Array1::from_iter(traces.iter().map(|i| corrected.tt[*i].unwrap_or(f64::NAN)));
    let et = Array1::from_iter(
        traces
            .iter()
            .map(|i| mog.picks[*i].map(|p| p.uncertainty).unwrap_or(f64::NAN)),
    );
    let vapp = &hyp / &tt;
    let vapp_uncorrected = Array1::from_iter(
        traces
            .iter()
            .enumerate()
            .map(|(j, i)| hyp[j] / (tt[j] + corrected.t0_at(*i))),
    );

    let stats = TravelTimeStats {
        traces,
        hyp,
        theta,
        tt,
        et,
        vapp,
        vapp_uncorrected,
        t0: corrected.t0.clone(),
    };
    let negative = stats.negative_vapp_traces();
    if !negative.is_empty() {
        warn!("{}: negative apparent velocity at traces {:?}", mog.name, negative);
    };
    stats
}

#[cfg(test)]
mod tests {
    use super::{apparent_velocity, correct, reference_t0, traveltime_stats, zop_traces, CalibrationConfig};
    use crate::error::MogError;
    use crate::mog::{AirShot, AirShotId, BoreholeId, Mog, Pick};
    use ndarray::{array, Array1};

    fn picked_mog() -> Mog {
        let mut mog = Mog::new("MOG1", BoreholeId(0), BoreholeId(1), array![0., 0., 0., 0., 0.], array![0., 1., 2., 3., 4.]);
        mog.rx_x.fill(3.);
        mog.rx_z = array![0., -4., -2., 0., 0.];
        mog.set_picks(array![
            Some(Pick::new(30., 1.)),
            Some(Pick::new(50., 2.)),
            None,
            Some(Pick::new(30., 1.)),
            Some(Pick::new(0., 1.))
        ]);
        mog
    }

    fn fixed_air(name: &str, time: f64) -> AirShot {
        AirShot::new(name, Array1::from_elem(4, Some(Pick::new(time, 0.1))), vec![2.998]).unwrap()
    }

    #[test]
    fn test_identity() {
        let mut mog = picked_mog();
        mog.set_fac_dt(2.);
        let config = CalibrationConfig::default();

        let corrected = correct(&mog, &[], &config).unwrap();
        assert_eq!(corrected.tt, mog.picks.mapv(|pick| pick.map(|p| p.time)));
        assert!(corrected.t0.is_empty());

        // Air shots are ignored unless the record uses them
        mog.av = Some(AirShotId(0));
        let corrected = correct(&mog, &[fixed_air("air", 20.)], &config).unwrap();
        assert_eq!(corrected.tt[0], Some(30.));
    }

    #[test]
    fn test_fixed_antenna() {
        let air = fixed_air("air", 20.);
        // 20 ns minus the 10 ns of flight over 2.998 m
        assert!((reference_t0(&air, &CalibrationConfig::default()).unwrap() - 10.).abs() < 1e-9);

        let mut mog = picked_mog();
        mog.av = Some(AirShotId(0));
        mog.use_air_shots = true;
        mog.set_user_fac_dt(2.);

        let corrected = correct(&mog, &[air], &CalibrationConfig::default()).unwrap();
        assert_eq!(corrected.t0.len(), 5);
        assert!((corrected.tt[0].unwrap() - 50.).abs() < 1e-9);
        assert_eq!(corrected.tt[2], None);
    }

    #[test]
    fn test_walkaway() {
        let distances = vec![1., 2., 3., 4.];
        let picks = Array1::from_iter(distances.iter().map(|d| Some(Pick::new(5. + d / 0.3, 0.1))));
        let air = AirShot::new("walk", picks, distances).unwrap();

        let t0 = reference_t0(&air, &CalibrationConfig::default()).unwrap();
        assert!((t0 - 5.).abs() < 1e-6);

        let single = AirShot::new("walk1", array![Some(Pick::new(10., 0.1)), None], vec![1., 2.]).unwrap();
        assert!(matches!(
            reference_t0(&single, &CalibrationConfig::default()),
            Err(MogError::Calibration(_))
        ));
    }

    #[test]
    fn test_drift() {
        let mut mog = picked_mog();
        mog.av = Some(AirShotId(0));
        mog.ap = Some(AirShotId(1));
        mog.use_air_shots = true;
        let config = CalibrationConfig::default();

        let corrected = correct(&mog, &[fixed_air("before", 12.), fixed_air("after", 16.)], &config).unwrap();

        let expected = [2., 3., 4., 5., 6.];
        for (t0, expected) in corrected.t0.iter().zip(expected) {
            assert!((t0 - expected).abs() < 1e-9);
        }
        assert!((corrected.tt[3].unwrap() - 25.).abs() < 1e-9);
        assert!((corrected.t0_at(4) - 6.).abs() < 1e-9);

        // A single trace takes the time of the air shot before the survey
        let mut single = Mog::new("MOG2", BoreholeId(0), BoreholeId(1), array![1.], array![1.]);
        single.set_picks(array![Some(Pick::new(30., 1.))]);
        single.av = Some(AirShotId(0));
        single.ap = Some(AirShotId(1));
        single.use_air_shots = true;

        let corrected = correct(&single, &[fixed_air("before", 12.), fixed_air("after", 16.)], &config).unwrap();
        assert_eq!(corrected.t0.len(), 1);
        assert!((corrected.t0[0] - 2.).abs() < 1e-9);
        assert!((corrected.tt[0].unwrap() - 28.).abs() < 1e-9);
    }

    #[test]
    fn test_walkaway_single_separation() {
        let air = AirShot::new("walk", Array1::from_elem(3, Some(Pick::new(10., 0.1))), vec![2., 2., 2.]).unwrap();

        assert!(matches!(
            reference_t0(&air, &CalibrationConfig::default()),
            Err(MogError::Calibration(_))
        ));

        // Only the separations of picked traces count
        let picks = array![Some(Pick::new(10., 0.1)), Some(Pick::new(10., 0.1)), None];
        let air = AirShot::new("walk", picks, vec![2., 2., 4.]).unwrap();
        assert!(matches!(
            reference_t0(&air, &CalibrationConfig::default()),
            Err(MogError::Calibration(_))
        ));
    }

    #[test]
    fn test_unusable_air_shot() {
        let mut mog = picked_mog();
        mog.av = Some(AirShotId(0));
        mog.use_air_shots = true;
        let air = AirShot::new("air", Array1::from_elem(3, None), vec![1.]).unwrap();

        assert!(matches!(
            correct(&mog, &[air], &CalibrationConfig::default()),
            Err(MogError::Calibration(_))
        ));

        mog.av = Some(AirShotId(3));
        assert!(matches!(
            correct(&mog, &[], &CalibrationConfig::default()),
            Err(MogError::UnknownEntity(_))
        ));
    }

    #[test]
    fn test_apparent_velocity() {
        let mog = picked_mog();
        let corrected = correct(&mog, &[], &CalibrationConfig::default()).unwrap();
        let velocity = apparent_velocity(&mog, &corrected);

        assert_eq!(velocity.vapp[0], 0.1);
        assert_eq!(velocity.vapp[1], 0.1);
        assert_eq!(velocity.v_plus[1], 5. / 52.);
        assert_eq!(velocity.v_minus[1], 5. / 48.);
        assert!(velocity.vapp[2].is_nan());
        assert!(velocity.vapp[4].is_infinite());
    }

    #[test]
    fn test_zop_traces() {
        let mog = picked_mog();

        assert_eq!(zop_traces(&mog, 0.5), vec![0, 3, 4]);
        assert_eq!(zop_traces(&mog, 10.), vec![0, 1, 3, 4]);
    }

    #[test]
    fn test_traveltime_stats() {
        let mut mog = picked_mog();
        mog.in_vect[3] = false;
        let corrected = correct(&mog, &[], &CalibrationConfig::default()).unwrap();

        let stats = traveltime_stats(&mog, &corrected);

        assert_eq!(stats.traces, vec![0, 1, 4]);
        assert_eq!(stats.hyp, array![3., 5., 3.]);
        assert!((stats.theta[1] + 53.13010235415598).abs() < 1e-9);
        assert_eq!(stats.vapp_uncorrected, stats.vapp);
        assert_eq!(stats.median_vapp(), Some(0.1));
        assert!(stats.negative_vapp_traces().is_empty());
    }
}
