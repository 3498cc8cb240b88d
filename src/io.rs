/// Loading of projects and export of travel time tables and processing logs
use std::path::Path;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Deserializer, Serialize};

use crate::airshot::CorrectedTravelTimes;
use crate::borehole::Borehole;
use crate::error::{MogError, Result};
use crate::mog::{AirShot, Mog, Pick, PruneParams, SurveyType};
use crate::project::Project;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoreholeFile {
    pub name: String,
    /// Trajectory points from the top to the bottom of the hole
    pub trajectory: Vec<[f64; 3]>,
    pub z_surf: Option<f64>,
    pub z_water: Option<f64>,
    #[serde(default)]
    pub diam: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirShotFile {
    pub name: String,
    #[serde(deserialize_with = "picked_times")]
    pub tt: Vec<Option<f64>>,
    #[serde(default)]
    pub et: Vec<f64>,
    pub d_tx_rx: Vec<f64>,
    #[serde(default = "unit_factor")]
    pub fac_dt: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MogFile {
    pub name: String,
    /// Name of the Tx borehole
    pub tx: String,
    /// Name of the Rx borehole
    pub rx: String,
    #[serde(default = "crosshole")]
    pub survey_type: SurveyType,
    #[serde(default)]
    pub tx_offset: f64,
    #[serde(default)]
    pub rx_offset: f64,
    pub tx_z_orig: Vec<f64>,
    pub rx_z_orig: Vec<f64>,
    /// Travel times. Unpicked traces are null or -1.
    #[serde(default, deserialize_with = "picked_times")]
    pub tt: Vec<Option<f64>>,
    #[serde(default)]
    pub et: Vec<f64>,
    #[serde(default = "unit_factor")]
    pub fac_dt: f64,
    #[serde(default = "unit_factor")]
    pub user_fac_dt: f64,
    /// Name of the air shot before the survey
    pub av: Option<String>,
    /// Name of the air shot after the survey
    pub ap: Option<String>,
    #[serde(default)]
    pub use_air_shots: bool,
    #[serde(default)]
    pub prune: PruneParams,
    pub snr: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectFile {
    pub name: String,
    #[serde(default)]
    pub boreholes: Vec<BoreholeFile>,
    #[serde(default)]
    pub air_shots: Vec<AirShotFile>,
    #[serde(default)]
    pub mogs: Vec<MogFile>,
}

fn unit_factor() -> f64 {
    1.
}

fn crosshole() -> SurveyType {
    SurveyType::Crosshole
}

/// Read travel times where null or a negative value means "not picked"
fn picked_times<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<Option<f64>>, D::Error> {
    let values: Vec<Option<f64>> = Deserialize::deserialize(deserializer)?;
    Ok(values
        .into_iter()
        .map(|value| value.filter(|time| *time >= 0.))
        .collect())
}

/// Combine travel times and uncertainties into picks. Missing uncertainties are zero.
fn to_picks(tt: &[Option<f64>], et: &[f64], ntrace: usize, name: &str) -> Result<Array1<Option<Pick>>> {
    if tt.is_empty() {
        return Ok(Array1::from_elem(ntrace, None));
    };
    if tt.len() != ntrace {
        return Err(MogError::Format(format!(
            "{}: {} travel times given for {} traces",
            name,
            tt.len(),
            ntrace
        )));
    };

    Ok(tt
        .iter()
        .enumerate()
        .map(|(i, time)| time.map(|t| Pick::new(t, et.get(i).copied().unwrap_or(0.))))
        .collect())
}

impl BoreholeFile {
    fn into_borehole(self) -> Result<Borehole> {
        let mut borehole = Borehole::new(&self.name, Array2::from(self.trajectory))?;
        if let Some(z_surf) = self.z_surf {
            borehole.z_surf = z_surf;
        };
        if let Some(z_water) = self.z_water {
            borehole.z_water = z_water;
        };
        borehole.diam = self.diam;
        Ok(borehole)
    }
}

impl AirShotFile {
    fn into_air_shot(self) -> Result<AirShot> {
        let picks = to_picks(&self.tt, &self.et, self.tt.len(), &self.name)?;
        let mut air = AirShot::new(&self.name, picks, self.d_tx_rx)?;
        air.fac_dt = self.fac_dt;
        Ok(air)
    }
}

impl MogFile {
    fn into_mog(self, project: &Project) -> Result<Mog> {
        if self.tx_z_orig.len() != self.rx_z_orig.len() {
            return Err(MogError::Format(format!(
                "{}: {} Tx depths but {} Rx depths",
                self.name,
                self.tx_z_orig.len(),
                self.rx_z_orig.len()
            )));
        };
        let ntrace = self.tx_z_orig.len();

        let mut mog = Mog::new(
            &self.name,
            project.borehole_id(&self.tx)?,
            project.borehole_id(&self.rx)?,
            Array1::from(self.tx_z_orig),
            Array1::from(self.rx_z_orig),
        );
        mog.survey_type = self.survey_type;
        mog.csurvmod = self.survey_type.survey_mode().to_string();
        mog.tx_offset = self.tx_offset;
        mog.rx_offset = self.rx_offset;
        mog.set_picks(to_picks(&self.tt, &self.et, ntrace, &self.name)?);
        mog.set_fac_dt(self.fac_dt);
        mog.set_user_fac_dt(self.user_fac_dt);
        mog.av = self.av.as_deref().map(|name| project.air_shot_id(name)).transpose()?;
        mog.ap = self.ap.as_deref().map(|name| project.air_shot_id(name)).transpose()?;
        mog.use_air_shots = self.use_air_shots;
        mog.prune_params = self.prune;

        if let Some(snr) = self.snr {
            if snr.len() != ntrace {
                return Err(MogError::Format(format!(
                    "{}: {} SNR values given for {} traces",
                    self.name,
                    snr.len(),
                    ntrace
                )));
            };
            mog.snr = Some(Array1::from(snr));
        };

        Ok(mog)
    }
}

/// Load a project from a JSON file
///
/// Boreholes and air shots are referenced by name in the survey records, so they are added to the
/// project first.
pub fn load_project(filepath: &Path) -> Result<Project> {
    let content = std::fs::read_to_string(filepath)?;
    let file: ProjectFile = serde_json::from_str(&content)?;

    let mut project = Project::open(&file.name);
    for borehole in file.boreholes {
        project.add_borehole(borehole.into_borehole()?);
    }
    for air in file.air_shots {
        project.add_air_shot(air.into_air_shot()?);
    }
    for mog_file in file.mogs {
        let mog = mog_file.into_mog(&project)?;
        project.add_mog(mog)?;
    }

    Ok(project)
}

/// Export the corrected travel times of a record as a text table
///
/// One row of "trace_index travel_time uncertainty" is written for every picked and included trace,
/// in ascending trace order. The trace index starts at zero.
pub fn export_tt(mog: &Mog, corrected: &CorrectedTravelTimes, filepath: &Path) -> Result<usize> {
    let rows = (0..mog.ntrace())
        .filter(|i| mog.in_vect[*i])
        .filter_map(|i| {
            let pick = mog.picks[i]?;
            let tt = corrected.tt[i]?;
            Some(format!("{} {} {}", i, tt, pick.uncertainty))
        })
        .collect::<Vec<String>>();

    let mut content = rows.join("\n");
    if !rows.is_empty() {
        content.push('\n');
    };
    std::fs::write(filepath, content)?;

    Ok(rows.len())
}

/// Write the processing log of a record, one event per line
pub fn export_log(mog: &Mog, filepath: &Path) -> Result<()> {
    let mut content = mog.log.join("\n");
    content.push('\n');
    std::fs::write(filepath, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{export_log, export_tt, load_project};
    use crate::airshot::{correct, CalibrationConfig};
    use crate::error::MogError;
    use crate::mog::{AirShotMethod, SurveyType};

    const PROJECT: &str = r#"{
        "name": "site",
        "boreholes": [
            {"name": "BH1", "trajectory": [[0, 0, 100], [0, 0, 60]], "z_water": 95},
            {"name": "BH2", "trajectory": [[5, 0, 100], [5, 0, 60]]}
        ],
        "air_shots": [
            {"name": "air1", "tt": [20, null, 20.5], "d_tx_rx": [2.998]}
        ],
        "mogs": [
            {
                "name": "MOG1",
                "tx": "BH1",
                "rx": "BH2",
                "survey_type": "VSP/VRP",
                "tx_z_orig": [1, 2, 3],
                "rx_z_orig": [1, 1, 1],
                "tt": [30, -1, 32],
                "et": [0.5, 0.5, 0.7],
                "av": "air1",
                "use_air_shots": true,
                "prune": {"skip_tx": 1}
            }
        ]
    }"#;

    #[test]
    fn test_load_project() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("project.json");
        std::fs::write(&path, PROJECT).unwrap();

        let project = load_project(&path).unwrap();

        assert_eq!(project.name, "site");
        assert_eq!(project.boreholes()[0].z_water, 95.);
        assert_eq!(project.boreholes()[1].z_water, 100.);
        assert_eq!(project.air_shots()[0].method, AirShotMethod::FixedAntenna);
        assert_eq!(project.air_shots()[0].tt_done().to_vec(), vec![true, false, true]);

        let mog = project.mog(project.mog_id("MOG1").unwrap()).unwrap();
        assert_eq!(mog.survey_type, SurveyType::Vrp);
        assert_eq!(mog.tt_done().to_vec(), vec![true, false, true]);
        assert_eq!(mog.picks[2].unwrap().uncertainty, 0.7);
        assert_eq!(mog.prune_params.skip_tx, 1);
        assert_eq!(mog.prune_params.ang_max, 90.);
        assert!(mog.av.is_some() & mog.ap.is_none());
    }

    #[test]
    fn test_load_unknown_borehole() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("project.json");
        std::fs::write(&path, PROJECT.replace("\"rx\": \"BH2\"", "\"rx\": \"BH3\"")).unwrap();

        assert!(matches!(load_project(&path), Err(MogError::UnknownEntity(_))));
        assert!(matches!(
            load_project(&tempdir.path().join("missing.json")),
            Err(MogError::Io(_))
        ));
    }

    #[test]
    fn test_export_tt() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("project.json");
        std::fs::write(&path, PROJECT).unwrap();
        let mut project = load_project(&path).unwrap();
        let id = project.mog_id("MOG1").unwrap();
        project.mog_mut(id).unwrap().use_air_shots = false;

        let mog = project.mog(id).unwrap();
        let corrected = correct(mog, project.air_shots(), &CalibrationConfig::default()).unwrap();
        let tt_path = tempdir.path().join("MOG1.tt");
        let n_rows = export_tt(mog, &corrected, &tt_path).unwrap();

        assert_eq!(n_rows, 2);
        assert_eq!(std::fs::read_to_string(&tt_path).unwrap(), "0 30 0.5\n2 32 0.7\n");

        let log_path = tempdir.path().join("MOG1.log");
        export_log(mog, &log_path).unwrap();
        assert!(log_path.is_file());
    }

    #[test]
    fn test_export_tt_excluded() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("project.json");
        std::fs::write(&path, PROJECT).unwrap();
        let mut project = load_project(&path).unwrap();
        let id = project.mog_id("MOG1").unwrap();
        {
            let mog = project.mog_mut(id).unwrap();
            mog.use_air_shots = false;
            // Picked, but pruned away
            mog.in_vect[0] = false;
        }

        let mog = project.mog(id).unwrap();
        let corrected = correct(mog, project.air_shots(), &CalibrationConfig::default()).unwrap();
        let tt_path = tempdir.path().join("MOG1.tt");

        assert_eq!(export_tt(mog, &corrected, &tt_path).unwrap(), 1);
        assert_eq!(std::fs::read_to_string(&tt_path).unwrap(), "2 32 0.7\n");
    }
}
