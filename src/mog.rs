/// Survey records (multi-offset gathers) and air shot calibration surveys
use std::time::SystemTime;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{MogError, Result};

const DEFAULT_ANGLE_LIMIT: f64 = 90.;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoreholeId(pub usize);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AirShotId(pub usize);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MogId(pub usize);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurveyType {
    #[serde(rename = "Crosshole")]
    Crosshole,
    #[serde(rename = "VSP/VRP")]
    Vrp,
}

impl SurveyType {
    /// The survey mode label of the instrument header
    pub fn survey_mode(&self) -> &'static str {
        match self {
            SurveyType::Crosshole => "SURVEY MODE       = Trans. -MOG",
            SurveyType::Vrp => "SURVEY MODE       = Trans. -VRP",
        }
    }
}

/// A picked travel time and its uncertainty
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Pick {
    pub time: f64,
    pub uncertainty: f64,
}

impl Pick {
    pub fn new(time: f64, uncertainty: f64) -> Pick {
        Pick { time, uncertainty }
    }
}

/// The criteria used to prune the traces of a MOG
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PruneParams {
    /// Minimum elevation (inclusive)
    pub elev_min: f64,
    /// Maximum elevation (inclusive)
    pub elev_max: f64,
    /// Number of Tx stations to skip between each kept station
    pub skip_tx: usize,
    pub skip_rx: usize,
    /// Minimum ray angle in degrees from the horizontal
    pub ang_min: f64,
    pub ang_max: f64,
    pub snr_threshold: Option<f64>,
}

impl Default for PruneParams {
    fn default() -> Self {
        PruneParams {
            elev_min: f64::NEG_INFINITY,
            elev_max: f64::INFINITY,
            skip_tx: 0,
            skip_rx: 0,
            ang_min: -DEFAULT_ANGLE_LIMIT,
            ang_max: DEFAULT_ANGLE_LIMIT,
            snr_threshold: None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AirShotMethod {
    /// All traces were shot with the same antenna separation
    FixedAntenna,
    /// The antenna separation changed from trace to trace
    Walkaway,
}

/// A calibration survey shot in air to measure the drift of time zero
#[derive(Debug, Clone)]
pub struct AirShot {
    pub name: String,
    pub picks: Array1<Option<Pick>>,
    /// Tx-Rx distance: one value for a fixed antenna shot, one per trace for a walk-away
    pub d_tx_rx: Vec<f64>,
    pub method: AirShotMethod,
    pub fac_dt: f64,
}

impl AirShot {
    /// Create an air shot from its picks and Tx-Rx distances
    ///
    /// The method is derived from the number of distances: one distance means a fixed antenna, one
    /// distance per trace means a walk-away.
    pub fn new(name: &str, picks: Array1<Option<Pick>>, d_tx_rx: Vec<f64>) -> Result<AirShot> {
        let method = match d_tx_rx.len() {
            1 => AirShotMethod::FixedAntenna,
            n if (n == picks.len()) & (n > 1) => AirShotMethod::Walkaway,
            n => {
                return Err(MogError::Calibration(format!(
                    "Number of positions ({}) inconsistent with number of traces ({}) in air shot {}",
                    n,
                    picks.len(),
                    name
                )))
            }
        };

        Ok(AirShot {
            name: name.to_string(),
            picks,
            d_tx_rx,
            method,
            fac_dt: 1.,
        })
    }

    pub fn ntrace(&self) -> usize {
        self.picks.len()
    }

    pub fn tt_done(&self) -> Array1<bool> {
        self.picks.mapv(|pick| pick.is_some())
    }
}

/// A multi-offset gather: every Tx-Rx trace pair recorded between two boreholes
#[derive(Debug, Clone)]
pub struct Mog {
    pub name: String,
    pub tx: BoreholeId,
    pub rx: BoreholeId,
    pub survey_type: SurveyType,
    pub csurvmod: String,
    /// Instrument offsets of the Tx and Rx depths
    pub tx_offset: f64,
    pub rx_offset: f64,
    /// Station depths as logged by the instrument
    pub tx_z_orig: Array1<f64>,
    pub rx_z_orig: Array1<f64>,
    pub tx_x: Array1<f64>,
    pub tx_y: Array1<f64>,
    pub tx_z: Array1<f64>,
    pub rx_x: Array1<f64>,
    pub rx_y: Array1<f64>,
    pub rx_z: Array1<f64>,
    pub tx_cos_dir: Array2<f64>,
    pub rx_cos_dir: Array2<f64>,
    pub picks: Array1<Option<Pick>>,
    pub amp_tmin: Array1<f64>,
    pub amp_tmax: Array1<f64>,
    pub amp_done: Array1<bool>,
    pub in_tx_vect: Array1<bool>,
    pub in_rx_vect: Array1<bool>,
    pub in_vect: Array1<bool>,
    /// Timing correction factors, per trace so that merged records keep those of their sources
    pub fac_dt: Array1<f64>,
    pub user_fac_dt: Array1<f64>,
    /// Air shot before the survey
    pub av: Option<AirShotId>,
    /// Air shot after the survey
    pub ap: Option<AirShotId>,
    pub use_air_shots: bool,
    pub prune_params: PruneParams,
    /// Signal-to-noise estimate per trace, from the spectral analysis
    pub snr: Option<Array1<f64>>,
    pub log: Vec<String>,
}

impl Mog {
    /// Create an unpicked record from the logged station depths
    ///
    /// Until coordinates are assigned, the stations are placed at x = y = 0 and z = -depth.
    ///
    /// # Panics
    /// If the Tx and Rx depth arrays differ in length.
    pub fn new(name: &str, tx: BoreholeId, rx: BoreholeId, tx_z_orig: Array1<f64>, rx_z_orig: Array1<f64>) -> Mog {
        assert_eq!(
            tx_z_orig.len(),
            rx_z_orig.len(),
            "Tx and Rx depth arrays of {} differ in length",
            name
        );
        let ntrace = tx_z_orig.len();

        Mog {
            name: name.to_string(),
            tx,
            rx,
            survey_type: SurveyType::Crosshole,
            csurvmod: SurveyType::Crosshole.survey_mode().to_string(),
            tx_offset: 0.,
            rx_offset: 0.,
            tx_x: Array1::zeros(ntrace),
            tx_y: Array1::zeros(ntrace),
            tx_z: tx_z_orig.mapv(|z| -z),
            rx_x: Array1::zeros(ntrace),
            rx_y: Array1::zeros(ntrace),
            rx_z: rx_z_orig.mapv(|z| -z),
            tx_z_orig,
            rx_z_orig,
            tx_cos_dir: Array2::zeros((ntrace, 3)),
            rx_cos_dir: Array2::zeros((ntrace, 3)),
            picks: Array1::from_elem(ntrace, None),
            amp_tmin: Array1::zeros(ntrace),
            amp_tmax: Array1::zeros(ntrace),
            amp_done: Array1::from_elem(ntrace, false),
            in_tx_vect: Array1::from_elem(ntrace, true),
            in_rx_vect: Array1::from_elem(ntrace, true),
            in_vect: Array1::from_elem(ntrace, true),
            fac_dt: Array1::ones(ntrace),
            user_fac_dt: Array1::ones(ntrace),
            av: None,
            ap: None,
            use_air_shots: false,
            prune_params: PruneParams::default(),
            snr: None,
            log: Vec::new(),
        }
    }

    pub fn ntrace(&self) -> usize {
        self.picks.len()
    }

    pub fn tt_done(&self) -> Array1<bool> {
        self.picks.mapv(|pick| pick.is_some())
    }

    /// Indices of the traces that are included but have no travel time
    pub fn unpicked_traces(&self) -> Vec<usize> {
        (0..self.ntrace())
            .filter(|i| self.in_vect[*i] & self.picks[*i].is_none())
            .collect()
    }

    pub fn set_picks(&mut self, picks: Array1<Option<Pick>>) {
        assert_eq!(picks.len(), self.ntrace(), "Pick count of {} does not match its trace count", self.name);
        self.picks = picks;
    }

    pub fn set_fac_dt(&mut self, fac_dt: f64) {
        self.fac_dt.fill(fac_dt);
    }

    pub fn set_user_fac_dt(&mut self, user_fac_dt: f64) {
        self.user_fac_dt.fill(user_fac_dt);
    }

    /// Straight-ray Tx-Rx distance of every trace
    pub fn ray_lengths(&self) -> Array1<f64> {
        ((&self.tx_x - &self.rx_x).mapv(|v| v.powi(2))
            + (&self.tx_y - &self.rx_y).mapv(|v| v.powi(2))
            + (&self.tx_z - &self.rx_z).mapv(|v| v.powi(2)))
        .mapv(f64::sqrt)
    }

    /// Check that all per-trace arrays have the same length
    ///
    /// # Panics
    /// If any array differs from the trace count. A mismatch is a programming error.
    pub fn assert_shape(&self) {
        let ntrace = self.ntrace();
        for (label, len) in [
            ("tx_z_orig", self.tx_z_orig.len()),
            ("rx_z_orig", self.rx_z_orig.len()),
            ("tx_x", self.tx_x.len()),
            ("tx_y", self.tx_y.len()),
            ("tx_z", self.tx_z.len()),
            ("rx_x", self.rx_x.len()),
            ("rx_y", self.rx_y.len()),
            ("rx_z", self.rx_z.len()),
            ("tx_cos_dir", self.tx_cos_dir.nrows()),
            ("rx_cos_dir", self.rx_cos_dir.nrows()),
            ("amp_tmin", self.amp_tmin.len()),
            ("amp_tmax", self.amp_tmax.len()),
            ("amp_done", self.amp_done.len()),
            ("in_tx_vect", self.in_tx_vect.len()),
            ("in_rx_vect", self.in_rx_vect.len()),
            ("in_vect", self.in_vect.len()),
            ("fac_dt", self.fac_dt.len()),
            ("user_fac_dt", self.user_fac_dt.len()),
        ] {
            assert_eq!(len, ntrace, "{}: length of {} ({}) != trace count ({})", self.name, label, len, ntrace);
        }
        if let Some(snr) = &self.snr {
            assert_eq!(snr.len(), ntrace, "{}: length of snr ({}) != trace count ({})", self.name, snr.len(), ntrace);
        };
    }

    pub fn log_event(&mut self, step_name: &str, event: &str, start_time: SystemTime) {
        let duration = SystemTime::now()
            .duration_since(start_time)
            .map(|d| d.as_secs_f32())
            .unwrap_or(0.);
        self.log.push(format!(
            "{} (duration: {:.2}s) [{}]:\t{}",
            step_name,
            duration,
            chrono::Local::now().to_rfc3339(),
            event
        ));
    }
}
