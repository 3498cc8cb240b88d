/// The project context: owner of all boreholes, air shots and survey records
///
/// Records only hold identifiers of the boreholes and air shots they use, so an edit to a borehole
/// is seen by every record that references it.
use std::time::SystemTime;

use tracing::info;

use crate::borehole::Borehole;
use crate::error::{MogError, Result};
use crate::merge;
use crate::mog::{AirShot, AirShotId, BoreholeId, Mog, MogId};

#[derive(Debug)]
pub struct Project {
    pub name: String,
    boreholes: Vec<Borehole>,
    air_shots: Vec<AirShot>,
    mogs: Vec<Option<Mog>>,
}

/// What a project held when it was closed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSummary {
    pub name: String,
    pub boreholes: usize,
    pub air_shots: usize,
    pub mogs: usize,
    pub retired_mogs: usize,
}

impl Project {
    pub fn open(name: &str) -> Project {
        info!("Opening project {}", name);
        Project {
            name: name.to_string(),
            boreholes: Vec::new(),
            air_shots: Vec::new(),
            mogs: Vec::new(),
        }
    }

    pub fn close(self) -> ProjectSummary {
        let summary = ProjectSummary {
            name: self.name.clone(),
            boreholes: self.boreholes.len(),
            air_shots: self.air_shots.len(),
            mogs: self.mogs.iter().filter(|mog| mog.is_some()).count(),
            retired_mogs: self.mogs.iter().filter(|mog| mog.is_none()).count(),
        };
        info!("Closing project {} ({} MOGs)", summary.name, summary.mogs);
        summary
    }

    pub fn add_borehole(&mut self, borehole: Borehole) -> BoreholeId {
        self.boreholes.push(borehole);
        BoreholeId(self.boreholes.len() - 1)
    }

    pub fn add_air_shot(&mut self, air_shot: AirShot) -> AirShotId {
        self.air_shots.push(air_shot);
        AirShotId(self.air_shots.len() - 1)
    }

    /// Add a survey record after checking that the entities it references exist
    ///
    /// # Panics
    /// If the per-trace arrays of the record are inconsistent.
    pub fn add_mog(&mut self, mog: Mog) -> Result<MogId> {
        mog.assert_shape();
        self.borehole(mog.tx)?;
        self.borehole(mog.rx)?;
        for air in [mog.av, mog.ap].into_iter().flatten() {
            self.air_shot(air)?;
        }
        self.mogs.push(Some(mog));
        Ok(MogId(self.mogs.len() - 1))
    }

    pub fn borehole(&self, id: BoreholeId) -> Result<&Borehole> {
        self.boreholes
            .get(id.0)
            .ok_or_else(|| MogError::UnknownEntity(format!("{:?}", id)))
    }

    pub fn borehole_mut(&mut self, id: BoreholeId) -> Result<&mut Borehole> {
        self.boreholes
            .get_mut(id.0)
            .ok_or_else(|| MogError::UnknownEntity(format!("{:?}", id)))
    }

    pub fn boreholes(&self) -> &[Borehole] {
        &self.boreholes
    }

    pub fn air_shot(&self, id: AirShotId) -> Result<&AirShot> {
        self.air_shots
            .get(id.0)
            .ok_or_else(|| MogError::UnknownEntity(format!("{:?}", id)))
    }

    pub fn air_shots(&self) -> &[AirShot] {
        &self.air_shots
    }

    pub fn mog(&self, id: MogId) -> Result<&Mog> {
        self.mogs
            .get(id.0)
            .and_then(|mog| mog.as_ref())
            .ok_or_else(|| MogError::UnknownEntity(format!("{:?}", id)))
    }

    pub fn mog_mut(&mut self, id: MogId) -> Result<&mut Mog> {
        self.mogs
            .get_mut(id.0)
            .and_then(|mog| mog.as_mut())
            .ok_or_else(|| MogError::UnknownEntity(format!("{:?}", id)))
    }

    pub fn borehole_id(&self, name: &str) -> Result<BoreholeId> {
        self.boreholes
            .iter()
            .position(|borehole| borehole.name == name)
            .map(BoreholeId)
            .ok_or_else(|| MogError::UnknownEntity(format!("Borehole {}", name)))
    }

    pub fn air_shot_id(&self, name: &str) -> Result<AirShotId> {
        self.air_shots
            .iter()
            .position(|air| air.name == name)
            .map(AirShotId)
            .ok_or_else(|| MogError::UnknownEntity(format!("Air shot {}", name)))
    }

    pub fn mog_id(&self, name: &str) -> Result<MogId> {
        self.mog_ids()
            .into_iter()
            .find(|id| self.mogs[id.0].as_ref().map(|mog| mog.name == name).unwrap_or(false))
            .ok_or_else(|| MogError::UnknownEntity(format!("MOG {}", name)))
    }

    /// Identifiers of all records that have not been retired
    pub fn mog_ids(&self) -> Vec<MogId> {
        (0..self.mogs.len())
            .filter(|i| self.mogs[*i].is_some())
            .map(MogId)
            .collect()
    }

    /// Split the project into the shared entities and the mutable records
    ///
    /// Records can then be processed in parallel while reading the boreholes and air shots.
    pub fn split_mut(&mut self) -> (&[Borehole], &[AirShot], Vec<&mut Mog>) {
        (
            &self.boreholes,
            &self.air_shots,
            self.mogs.iter_mut().flatten().collect(),
        )
    }

    /// Remove a record from the project and hand it back
    pub fn retire_mog(&mut self, id: MogId) -> Result<Mog> {
        self.mogs
            .get_mut(id.0)
            .and_then(|mog| mog.take())
            .ok_or_else(|| MogError::UnknownEntity(format!("{:?}", id)))
    }

    /// All live records that are compatible with a reference record
    pub fn compatible_mogs(&self, reference: MogId) -> Result<Vec<MogId>> {
        let reference_mog = self.mog(reference)?;

        Ok(self
            .mog_ids()
            .into_iter()
            .filter(|id| *id != reference)
            .filter(|id| {
                self.mog(*id)
                    .map(|mog| merge::compatible(reference_mog, mog))
                    .unwrap_or(false)
            })
            .collect())
    }

    /// Merge two records into a new one
    ///
    /// # Arguments
    /// - `reference`: The record whose boreholes and air shots are carried over
    /// - `other`: The record appended to the reference
    /// - `new_name`: Name of the merged record
    /// - `retire`: Remove the two source records from the project
    pub fn merge(&mut self, reference: MogId, other: MogId, new_name: &str, retire: bool) -> Result<MogId> {
        let start_time = SystemTime::now();
        let merged = merge::merge(self.mog(reference)?, self.mog(other)?, new_name)?;
        let id = self.add_mog(merged)?;

        let (reference_name, other_name) = (self.mog(reference)?.name.clone(), self.mog(other)?.name.clone());
        if retire {
            self.retire_mog(reference)?;
            self.retire_mog(other)?;
        };
        let event = match retire {
            true => format!("{} and {} have been merged and erased to create {}", other_name, reference_name, new_name),
            false => format!("MOG {} has been created by the merge of {} and {}", new_name, reference_name, other_name),
        };
        info!("{}", event);
        self.mog_mut(id)?.log_event("merge", &event, start_time);

        Ok(id)
    }

    /// Create a delta-t record from two records and add it to the project
    pub fn difference(&mut self, minuend: MogId, subtrahend: MogId, tolerance: f64, new_name: &str) -> Result<MogId> {
        let start_time = SystemTime::now();
        let delta = merge::difference(self.mog(minuend)?, self.mog(subtrahend)?, tolerance, new_name)?;
        let event = format!(
            "Delta-t MOG {} created from {} - {} ({} matched traces, offset tolerance: {})",
            new_name,
            self.mog(minuend)?.name,
            self.mog(subtrahend)?.name,
            delta.ntrace(),
            tolerance
        );
        let id = self.add_mog(delta)?;
        info!("{}", event);
        self.mog_mut(id)?.log_event("delta_t", &event, start_time);

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::Project;
    use crate::borehole::Borehole;
    use crate::error::MogError;
    use crate::mog::{BoreholeId, Mog, Pick};
    use ndarray::{array, Array1};

    fn project_with_mogs() -> Project {
        let mut project = Project::open("test");
        let bh1 = project.add_borehole(Borehole::new("BH1", array![[0., 0., 0.], [0., 0., -20.]]).unwrap());
        let bh2 = project.add_borehole(Borehole::new("BH2", array![[5., 0., 0.], [5., 0., -20.]]).unwrap());

        for name in ["MOG1", "MOG2"] {
            let mut mog = Mog::new(name, bh1, bh2, array![1., 2.], array![1., 3.]);
            mog.set_picks(Array1::from_elem(2, Some(Pick::new(40., 1.))));
            project.add_mog(mog).unwrap();
        }
        let mog3 = Mog::new("MOG3", bh2, bh1, array![1.], array![1.]);
        project.add_mog(mog3).unwrap();

        project
    }

    #[test]
    fn test_lookup() {
        let project = project_with_mogs();

        assert_eq!(project.borehole_id("BH2").unwrap(), BoreholeId(1));
        assert!(matches!(project.borehole_id("BH9"), Err(MogError::UnknownEntity(_))));
        assert_eq!(project.mog(project.mog_id("MOG3").unwrap()).unwrap().ntrace(), 1);
    }

    #[test]
    fn test_unknown_borehole() {
        let mut project = project_with_mogs();
        let mog = Mog::new("MOG4", BoreholeId(0), BoreholeId(7), array![1.], array![1.]);

        assert!(matches!(project.add_mog(mog), Err(MogError::UnknownEntity(_))));
    }

    #[test]
    fn test_compatible_mogs() {
        let project = project_with_mogs();
        let mog1 = project.mog_id("MOG1").unwrap();
        let mog2 = project.mog_id("MOG2").unwrap();

        assert_eq!(project.compatible_mogs(mog1).unwrap(), vec![mog2]);
    }

    #[test]
    fn test_merge_and_retire() {
        let mut project = project_with_mogs();
        let mog1 = project.mog_id("MOG1").unwrap();
        let mog2 = project.mog_id("MOG2").unwrap();

        let merged = project.merge(mog1, mog2, "MOG12", true).unwrap();

        assert_eq!(project.mog(merged).unwrap().ntrace(), 4);
        assert_eq!(project.mog(merged).unwrap().log.len(), 1);
        assert!(project.mog(mog1).is_err());
        assert!(project.mog_id("MOG2").is_err());

        let summary = project.close();
        assert_eq!(summary.mogs, 2);
        assert_eq!(summary.retired_mogs, 2);
    }

    #[test]
    fn test_difference() {
        let mut project = project_with_mogs();
        let mog1 = project.mog_id("MOG1").unwrap();
        let mog2 = project.mog_id("MOG2").unwrap();

        let delta = project.difference(mog1, mog2, 0.5, "dt").unwrap();
        let delta_mog = project.mog(delta).unwrap();

        assert_eq!(delta_mog.ntrace(), 2);
        assert!(delta_mog.picks.iter().all(|pick| pick.map(|p| p.time) == Some(0.)));
    }

    #[test]
    fn test_borehole_edits_are_shared() {
        let mut project = project_with_mogs();
        project.borehole_mut(BoreholeId(0)).unwrap().z = 12.;

        for id in project.mog_ids() {
            let mog = project.mog(id).unwrap();
            if mog.tx == BoreholeId(0) {
                assert_eq!(project.borehole(mog.tx).unwrap().z, 12.);
            }
        }
    }
}
