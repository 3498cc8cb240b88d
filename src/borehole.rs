/// Borehole geometry and the projection of logged depths onto (possibly deviated) trajectories
use ndarray::{Array1, Array2, ArrayView1, Axis};

use crate::error::{MogError, Result};

/// Horizontal tolerance (m) below which a trajectory is treated as vertical
pub const VERTICAL_TOLERANCE: f64 = 1e-5;

#[derive(Debug, Clone)]
pub struct Borehole {
    pub name: String,
    /// Top coordinate of the hole
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Bottom coordinate of the hole
    pub x_max: f64,
    pub y_max: f64,
    pub z_max: f64,
    pub z_surf: f64,
    /// Elevation of the water table
    pub z_water: f64,
    pub diam: f64,
    trajectory: Array2<f64>,
}

impl Borehole {
    /// Create a borehole from its surveyed trajectory
    ///
    /// The top and bottom coordinates are taken from the first and last trajectory points. The
    /// surface elevation defaults to the top of the hole.
    ///
    /// # Arguments
    /// - `name`: The name of the borehole
    /// - `trajectory`: An (n, 3) array of x, y, z points, ordered from the top to the bottom.
    ///
    /// # Returns
    /// The borehole, or a geometry error if the trajectory is degenerate.
    pub fn new(name: &str, trajectory: Array2<f64>) -> Result<Borehole> {
        validate_trajectory(&trajectory)?;

        let top = trajectory.row(0);
        let bottom = trajectory.row(trajectory.nrows() - 1);

        Ok(Borehole {
            name: name.to_string(),
            x: top[0],
            y: top[1],
            z: top[2],
            x_max: bottom[0],
            y_max: bottom[1],
            z_max: bottom[2],
            z_surf: top[2],
            z_water: top[2],
            diam: 0.,
            trajectory,
        })
    }

    pub fn trajectory(&self) -> &Array2<f64> {
        &self.trajectory
    }

    /// Replace the trajectory after a new deviation survey
    pub fn set_trajectory(&mut self, trajectory: Array2<f64>) -> Result<()> {
        validate_trajectory(&trajectory)?;
        self.trajectory = trajectory;
        Ok(())
    }

    /// Check whether the two extreme points of the trajectory share the same x and y
    pub fn is_vertical(&self) -> bool {
        let top = self.trajectory.row(0);
        let bottom = self.trajectory.row(self.trajectory.nrows() - 1);

        ((top[0] - bottom[0]).abs() < VERTICAL_TOLERANCE) & ((top[1] - bottom[1]).abs() < VERTICAL_TOLERANCE)
    }

    /// The along-hole length of the trajectory
    pub fn length(&self) -> f64 {
        arc_lengths(&self.trajectory)[self.trajectory.nrows() - 1]
    }

    pub fn project(&self, depths: &[f64]) -> Result<Projection> {
        project(&self.trajectory, depths)
    }
}

/// Depths located on a trajectory
#[derive(Debug, Clone)]
pub struct Projection {
    pub x: Array1<f64>,
    pub y: Array1<f64>,
    pub z: Array1<f64>,
    /// Direction cosine flags: 1 on every axis for each projected point
    pub cosines: Array2<f64>,
    /// Unit vector of the trajectory segment that each depth fell on
    pub directions: Array2<f64>,
}

fn segment_length(start: ArrayView1<f64>, end: ArrayView1<f64>) -> f64 {
    (&end - &start).mapv(|v| v.powi(2)).sum().sqrt()
}

fn validate_trajectory(trajectory: &Array2<f64>) -> Result<()> {
    if trajectory.ncols() != 3 {
        return Err(MogError::Geometry(format!(
            "A trajectory must have 3 columns (x, y, z), got {}",
            trajectory.ncols()
        )));
    };
    if trajectory.nrows() < 2 {
        return Err(MogError::Geometry(format!(
            "A trajectory needs at least 2 points, got {}",
            trajectory.nrows()
        )));
    };

    for i in 1..trajectory.nrows() {
        let length = segment_length(trajectory.row(i - 1), trajectory.row(i));
        if !(length > 0.) | !length.is_finite() {
            return Err(MogError::Geometry(format!(
                "Trajectory points {} and {} do not form a valid segment (length: {})",
                i - 1,
                i,
                length
            )));
        };
    }
    Ok(())
}

/// Cumulative along-hole distance at each trajectory point, starting at 0
pub fn arc_lengths(trajectory: &Array2<f64>) -> Array1<f64> {
    let mut lengths = Array1::<f64>::zeros(trajectory.nrows());

    for i in 1..trajectory.nrows() {
        lengths[i] = segment_length(trajectory.row(i - 1), trajectory.row(i));
    }
    lengths.accumulate_axis_inplace(Axis(0), |prev, cur| *cur += prev);

    lengths
}

/// Find the trajectory points that bracket an along-hole depth
///
/// The bottom of the hole belongs to the last segment, so every trajectory point is reachable.
fn bracket(arc: &Array1<f64>, depth: f64) -> Result<(usize, usize)> {
    let length = arc[arc.len() - 1];
    let out_of_range = || MogError::OutOfRange { depth, length };

    let i1 = arc
        .iter()
        .enumerate()
        .filter(|(_, s)| **s <= depth)
        .map(|(i, _)| i)
        .last()
        .ok_or_else(out_of_range)?;

    match arc.iter().position(|s| *s > depth) {
        Some(i2) => Ok((i1, i2)),
        None if depth == length => Ok((arc.len() - 2, arc.len() - 1)),
        None => Err(out_of_range()),
    }
}

/// Project along-hole depths on a borehole trajectory
///
/// # Arguments
/// - `trajectory`: An (n, 3) array of x, y, z points ordered from the top to the bottom of the hole.
/// - `depths`: The along-hole distances of the measurement points.
///
/// # Returns
/// The x, y, z coordinates of every depth together with its direction cosines.
///
/// # Errors
/// - `OutOfRange` if a depth is negative or beyond the length of the trajectory. Depths are never
///   clamped.
/// - `Geometry` if the trajectory is degenerate.
pub fn project(trajectory: &Array2<f64>, depths: &[f64]) -> Result<Projection> {
    validate_trajectory(trajectory)?;

    let arc = arc_lengths(trajectory);
    let length = arc[arc.len() - 1];

    let mut x = Array1::<f64>::zeros(depths.len());
    let mut y = Array1::<f64>::zeros(depths.len());
    let mut z = Array1::<f64>::zeros(depths.len());
    let mut directions = Array2::<f64>::zeros((depths.len(), 3));

    for (n, depth) in depths.iter().enumerate() {
        let (i1, i2) = bracket(&arc, *depth)?;

        let start = trajectory.row(i1);
        let end = trajectory.row(i2);
        let direction = (&end - &start) / segment_length(start, end);

        let point = if *depth == length {
            end.to_owned()
        } else {
            &start + &(&direction * (depth - arc[i1]))
        };

        x[n] = point[0];
        y[n] = point[1];
        z[n] = point[2];
        directions.row_mut(n).assign(&direction);
    }

    Ok(Projection {
        x,
        y,
        z,
        cosines: Array2::ones((depths.len(), 3)),
        directions,
    })
}
