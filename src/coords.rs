/// Assignment of absolute Tx/Rx coordinates to the traces of a survey record
use std::time::SystemTime;

use ndarray::{Array1, Array2};
use rayon::prelude::*;
use tracing::warn;

use crate::borehole::Borehole;
use crate::error::{MogError, Result};
use crate::mog::{Mog, SurveyType};
use crate::project::Project;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinateWarning {
    /// Both Tx and Rx are in the same well
    SameBorehole { mog: String, borehole: String },
}

/// Station positions along one borehole
#[derive(Debug, Clone)]
struct Stations {
    x: Array1<f64>,
    y: Array1<f64>,
    z: Array1<f64>,
    cos_dir: Array2<f64>,
}

/// Locate the stations of one side (Tx or Rx) of a survey
///
/// Vertical holes are handled directly: the stations hang below the top of the hole at the logged
/// depth plus the instrument offset. Any other hole is handled by projecting the along-hole depths
/// on its trajectory.
///
/// # Arguments
/// - `borehole`: The borehole of the stations
/// - `offset`: Instrument offset of the logged depths
/// - `z_orig`: The logged station depths
fn locate_stations(borehole: &Borehole, offset: f64, z_orig: &Array1<f64>) -> Result<Stations> {
    let ntrace = z_orig.len();

    if borehole.is_vertical() {
        let head = borehole.trajectory().row(0);
        let mut cos_dir = Array2::<f64>::zeros((ntrace, 3));
        cos_dir.column_mut(2).fill(1.);

        return Ok(Stations {
            x: Array1::from_elem(ntrace, head[0]),
            y: Array1::from_elem(ntrace, head[1]),
            z: z_orig.mapv(|depth| borehole.z - offset - depth),
            cos_dir,
        });
    };

    let depths = z_orig.iter().map(|depth| depth + offset).collect::<Vec<f64>>();
    let projection = borehole.project(&depths).map_err(|e| {
        if let MogError::OutOfRange { depth, length } = &e {
            warn!("Station at {} m is outside of borehole {} ({} m long)", depth, borehole.name, length);
        };
        e
    })?;

    Ok(Stations {
        x: projection.x,
        y: projection.y,
        z: projection.z,
        cos_dir: projection.cosines,
    })
}

/// Assign Tx and Rx coordinates to every trace of a record
///
/// # Arguments
/// - `mog`: The record to update. Its offsets and logged depths are used.
/// - `tx`: The Tx borehole of the record
/// - `rx`: The Rx borehole of the record
/// - `survey_type`: The survey type, which also sets the survey mode label
///
/// # Returns
/// Warnings to show the user, e.g. if Tx and Rx are in the same well.
pub fn assign_coordinates(mog: &mut Mog, tx: &Borehole, rx: &Borehole, survey_type: SurveyType) -> Result<Vec<CoordinateWarning>> {
    let start_time = SystemTime::now();
    let tx_stations = locate_stations(tx, mog.tx_offset, &mog.tx_z_orig)?;
    let rx_stations = locate_stations(rx, mog.rx_offset, &mog.rx_z_orig)?;

    mog.survey_type = survey_type;
    mog.csurvmod = survey_type.survey_mode().to_string();

    mog.tx_x = tx_stations.x;
    mog.tx_y = tx_stations.y;
    mog.tx_z = tx_stations.z;
    mog.tx_cos_dir = tx_stations.cos_dir;
    mog.rx_x = rx_stations.x;
    mog.rx_y = rx_stations.y;
    mog.rx_z = rx_stations.z;
    mog.rx_cos_dir = rx_stations.cos_dir;

    let mut warnings = Vec::new();
    if mog.tx == mog.rx {
        warn!("Both Tx and Rx of {} are in the same well ({})", mog.name, tx.name);
        warnings.push(CoordinateWarning::SameBorehole {
            mog: mog.name.clone(),
            borehole: tx.name.clone(),
        });
    };

    mog.log_event(
        "coordinates",
        &format!("{}'s Tx and Rx are now {} and {} ({})", mog.name, tx.name, rx.name, mog.csurvmod),
        start_time,
    );

    Ok(warnings)
}

/// Assign coordinates to every live record of a project, in parallel
pub fn assign_all(project: &mut Project) -> Result<Vec<CoordinateWarning>> {
    let (boreholes, _, mogs) = project.split_mut();

    let warnings = mogs
        .into_par_iter()
        .map(|mog| {
            let tx = boreholes
                .get(mog.tx.0)
                .ok_or_else(|| MogError::UnknownEntity(format!("{:?}", mog.tx)))?;
            let rx = boreholes
                .get(mog.rx.0)
                .ok_or_else(|| MogError::UnknownEntity(format!("{:?}", mog.rx)))?;
            let survey_type = mog.survey_type;
            assign_coordinates(mog, tx, rx, survey_type)
        })
        .collect::<Result<Vec<Vec<CoordinateWarning>>>>()?;

    Ok(warnings.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::{assign_all, assign_coordinates, CoordinateWarning};
    use crate::borehole::Borehole;
    use crate::error::MogError;
    use crate::mog::{BoreholeId, Mog, SurveyType};
    use crate::project::Project;
    use ndarray::array;

    #[test]
    fn test_vertical_holes() {
        let tx = Borehole::new("BH1", array![[1., 2., 100.], [1., 2., 50.]]).unwrap();
        let rx = Borehole::new("BH2", array![[6., 2., 101.], [6., 2., 51.]]).unwrap();
        let mut mog = Mog::new("MOG1", BoreholeId(0), BoreholeId(1), array![5., 10.], array![7., 7.]);
        mog.tx_offset = 0.5;

        let warnings = assign_coordinates(&mut mog, &tx, &rx, SurveyType::Crosshole).unwrap();

        assert!(warnings.is_empty());
        assert_eq!(mog.tx_x, array![1., 1.]);
        assert_eq!(mog.tx_y, array![2., 2.]);
        assert_eq!(mog.tx_z, array![94.5, 89.5]);
        assert_eq!(mog.rx_x, array![6., 6.]);
        assert_eq!(mog.rx_z, array![94., 94.]);
        assert_eq!(mog.tx_cos_dir.row(1).to_vec(), vec![0., 0., 1.]);
        assert_eq!(mog.csurvmod, "SURVEY MODE       = Trans. -MOG");
        assert_eq!(mog.log.len(), 1);
    }

    #[test]
    fn test_deviated_hole() {
        let tx = Borehole::new("BH1", array![[0., 0., 0.], [3., 0., -4.], [3., 0., -14.]]).unwrap();
        let rx = Borehole::new("BH2", array![[10., 0., 0.], [10., 0., -20.]]).unwrap();
        let mut mog = Mog::new("MOG1", BoreholeId(0), BoreholeId(1), array![2.5, 10.], array![1., 1.]);
        mog.tx_offset = 0.;

        assign_coordinates(&mut mog, &tx, &rx, SurveyType::Vrp).unwrap();

        assert!((mog.tx_x[0] - 1.5).abs() < 1e-12);
        assert!((mog.tx_z[0] + 2.).abs() < 1e-12);
        assert!((mog.tx_x[1] - 3.).abs() < 1e-12);
        assert!((mog.tx_z[1] + 9.).abs() < 1e-12);
        assert_eq!(mog.tx_cos_dir.row(0).to_vec(), vec![1., 1., 1.]);
        assert_eq!(mog.csurvmod, "SURVEY MODE       = Trans. -VRP");
    }

    #[test]
    fn test_station_out_of_range() {
        let tx = Borehole::new("BH1", array![[0., 0., 0.], [3., 0., -4.]]).unwrap();
        let mut mog = Mog::new("MOG1", BoreholeId(0), BoreholeId(0), array![6.], array![1.]);

        let result = assign_coordinates(&mut mog, &tx, &tx, SurveyType::Crosshole);
        assert!(matches!(result, Err(MogError::OutOfRange { .. })));
        // A failed assignment leaves the record untouched
        assert_eq!(mog.tx_z, array![-6.]);
        assert!(mog.log.is_empty());
    }

    #[test]
    fn test_same_borehole() {
        let mut project = Project::open("test");
        let bh = project.add_borehole(Borehole::new("BH1", array![[0., 0., 0.], [0., 0., -20.]]).unwrap());
        project.add_mog(Mog::new("MOG1", bh, bh, array![1., 2.], array![3., 4.])).unwrap();

        let warnings = assign_all(&mut project).unwrap();

        assert_eq!(
            warnings,
            vec![CoordinateWarning::SameBorehole {
                mog: "MOG1".to_string(),
                borehole: "BH1".to_string()
            }]
        );
        let mog = project.mog(project.mog_id("MOG1").unwrap()).unwrap();
        assert_eq!(mog.rx_z, array![-3., -4.]);
    }
}
