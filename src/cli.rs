/// Functions to handle the command line interface (CLI)
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use clap::Parser;
use tracing::info;

use crate::airshot::{self, CalibrationConfig, AIR_VELOCITY};
use crate::coords;
use crate::filters::prune;
use crate::io;
use crate::project::Project;

#[derive(Debug, Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(group(
        clap::ArgGroup::new("combine_choice")
        .required(false)
        .args(&["merge", "delta_t"]),
    ))
]
pub struct Args {
    /// Filepath of a project file (JSON) or a glob pattern of many files
    #[clap(short, long)]
    filepath: Option<String>,

    /// Only show information about the project
    #[clap(short, long)]
    info: bool,

    /// Prune every MOG with its stored prune parameters
    #[clap(long)]
    prune: bool,

    /// Velocity in air in m/ns, used to calibrate fixed antenna air shots
    #[clap(long, default_value_t = AIR_VELOCITY)]
    air_velocity: f64,

    /// Output directory for travel time tables and logs. Defaults to the directory of the project file
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// Don't export travel time tables and logs
    #[clap(long)]
    no_export: bool,

    /// Merge two compatible MOGs, given as "reference,other"
    #[clap(long)]
    merge: Option<String>,

    /// Create a delta-t MOG from two compatible MOGs, given as "minuend,subtrahend"
    #[clap(long)]
    delta_t: Option<String>,

    /// Name of the merged or delta-t MOG. Defaults to the two names joined by "_" (merge) or "-" (delta-t)
    #[clap(long)]
    name: Option<String>,

    /// Maximum Tx and Rx station distance (m) for two traces to match when creating a delta-t MOG
    #[clap(long, default_value_t = 0.5)]
    tolerance: f64,

    /// Remove the source MOGs after a merge
    #[clap(long)]
    retire: bool,

    /// Suppress progress messages
    #[clap(short, long)]
    quiet: bool,
}

/// How two MOGs should be combined
#[derive(Debug, Clone, PartialEq)]
pub enum Combination {
    Merge { reference: String, other: String, name: String, retire: bool },
    DeltaT { minuend: String, subtrahend: String, name: String, tolerance: f64 },
}

#[derive(Debug, Clone)]
pub struct RunParams {
    pub filepaths: Vec<PathBuf>,
    pub output_path: Option<PathBuf>,
    pub only_info: bool,
    pub prune: bool,
    pub calibration: CalibrationConfig,
    pub combination: Option<Combination>,
    pub no_export: bool,
    pub quiet: bool,
}

enum ParsedArgs {
    Params(Box<RunParams>),
    Error(String),
}

/// Split a "first,second" pair of MOG names
fn parse_pair(pair: &str, flag: &str) -> Result<(String, String), String> {
    match pair.split_once(',') {
        Some((first, second)) if !first.trim().is_empty() & !second.trim().is_empty() => {
            Ok((first.trim().to_string(), second.trim().to_string()))
        }
        _ => Err(format!("Error parsing {}: expected two MOG names separated by a comma, got \"{}\"", flag, pair)),
    }
}

impl Args {
    pub fn quiet(&self) -> bool {
        self.quiet
    }

    fn to_params(&self) -> ParsedArgs {
        let filepaths = match &self.filepath {
            Some(fp) => match glob::glob(fp) {
                Ok(paths) => paths.filter_map(|path| path.ok()).collect::<Vec<PathBuf>>(),
                Err(e) => return ParsedArgs::Error(format!("Error parsing filepath pattern: {}", e)),
            },
            None => {
                return ParsedArgs::Error(
                    "No filepath given.\nUse the help text (\"-h\" or \"--help\") for assistance.".to_string(),
                )
            }
        };
        if filepaths.is_empty() {
            return ParsedArgs::Error(format!("No file found matching {:?}", self.filepath));
        };

        if !(self.air_velocity > 0.) {
            return ParsedArgs::Error(format!("The air velocity must be positive (got {})", self.air_velocity));
        };
        if !(self.tolerance >= 0.) {
            return ParsedArgs::Error(format!("The tolerance must be zero or positive (got {})", self.tolerance));
        };

        let combination = match (&self.merge, &self.delta_t) {
            (Some(pair), _) => match parse_pair(pair, "--merge") {
                Ok((reference, other)) => Some(Combination::Merge {
                    name: self.name.clone().unwrap_or_else(|| format!("{}_{}", reference, other)),
                    reference,
                    other,
                    retire: self.retire,
                }),
                Err(e) => return ParsedArgs::Error(e),
            },
            (None, Some(pair)) => match parse_pair(pair, "--delta-t") {
                Ok((minuend, subtrahend)) => Some(Combination::DeltaT {
                    name: self.name.clone().unwrap_or_else(|| format!("{}-{}", minuend, subtrahend)),
                    minuend,
                    subtrahend,
                    tolerance: self.tolerance,
                }),
                Err(e) => return ParsedArgs::Error(e),
            },
            (None, None) => None,
        };

        ParsedArgs::Params(Box::new(RunParams {
            filepaths,
            output_path: self.output.clone(),
            only_info: self.info,
            prune: self.prune,
            calibration: CalibrationConfig {
                air_velocity: self.air_velocity,
            },
            combination,
            no_export: self.no_export,
            quiet: self.quiet,
        }))
    }
}

/// Print the boreholes, air shots and MOGs of a project
fn print_info(project: &Project) {
    println!("Project: {}", project.name);
    for borehole in project.boreholes() {
        println!(
            "Borehole {}: {:.2} m long, {}, top at ({}, {}, {})",
            borehole.name,
            borehole.length(),
            match borehole.is_vertical() {
                true => "vertical",
                false => "deviated",
            },
            borehole.x,
            borehole.y,
            borehole.z
        );
    }
    for air in project.air_shots() {
        let picked = air.tt_done().iter().filter(|v| **v).count();
        println!("Air shot {}: {:?}, {}/{} traces picked", air.name, air.method, picked, air.ntrace());
    }
    for id in project.mog_ids() {
        if let Ok(mog) = project.mog(id) {
            let picked = mog.tt_done().iter().filter(|v| **v).count();
            let compatible = project
                .compatible_mogs(id)
                .unwrap_or_default()
                .into_iter()
                .filter_map(|other| project.mog(other).ok().map(|m| m.name.clone()))
                .collect::<Vec<String>>();
            println!(
                "MOG {}: {} traces ({} picked), {}, compatible with {:?}",
                mog.name,
                mog.ntrace(),
                picked,
                mog.survey_type.survey_mode(),
                compatible
            );
        };
    }
}

/// Process one project file from loading to export
fn run_project(filepath: &Path, params: &RunParams) -> Result<(), Box<dyn std::error::Error>> {
    let start_time = SystemTime::now();
    let mut project = io::load_project(filepath)?;

    if params.only_info {
        print_info(&project);
        project.close();
        return Ok(());
    };

    coords::assign_all(&mut project)?;

    if params.prune {
        for (name, summary) in prune::prune_all(&mut project)? {
            if !params.quiet {
                println!(
                    "{}: {} Tx and {} Rx stations, {:.1}% of stations and {:.1}% of angles removed, {:.1}% of traces kept",
                    name,
                    summary.n_tx_stations,
                    summary.n_rx_stations,
                    summary.removed_tx_rx_pct,
                    summary.removed_angle_pct,
                    summary.kept_traces_pct
                );
            };
        }
    };

    match &params.combination {
        Some(Combination::Merge { reference, other, name, retire }) => {
            let (reference, other) = (project.mog_id(reference)?, project.mog_id(other)?);
            project.merge(reference, other, name, *retire)?;
        }
        Some(Combination::DeltaT { minuend, subtrahend, name, tolerance }) => {
            let (minuend, subtrahend) = (project.mog_id(minuend)?, project.mog_id(subtrahend)?);
            project.difference(minuend, subtrahend, *tolerance, name)?;
        }
        None => (),
    };

    let output_dir = match &params.output_path {
        Some(path) => path.clone(),
        None => filepath.parent().map(|p| p.to_path_buf()).unwrap_or_default(),
    };
    if !params.no_export & !output_dir.as_os_str().is_empty() & !output_dir.is_dir() {
        std::fs::create_dir_all(&output_dir)?;
    };

    for id in project.mog_ids() {
        let mog = project.mog(id)?;
        let corrected = airshot::correct(mog, project.air_shots(), &params.calibration)?;
        let stats = airshot::traveltime_stats(mog, &corrected);

        if !params.quiet {
            match stats.median_vapp() {
                Some(vapp) => println!("{}: median apparent velocity {:.4} m/ns over {} traces", mog.name, vapp, stats.traces.len()),
                None => println!("{}: no picked traces", mog.name),
            };
        };

        if !params.no_export {
            let stem = format!("{}_{}", project.name, mog.name);
            let tt_path = output_dir.join(format!("{}.tt", stem));
            let n_rows = io::export_tt(mog, &corrected, &tt_path)?;
            io::export_log(mog, &output_dir.join(format!("{}.log", stem)))?;
            info!("Exported {} travel times to {:?}", n_rows, tt_path);
        };
    }

    let summary = project.close();
    if !params.quiet {
        println!(
            "Processed {} ({} MOGs) in {:.2} s",
            summary.name,
            summary.mogs,
            SystemTime::now().duration_since(start_time).map(|d| d.as_secs_f32()).unwrap_or(0.)
        );
    };

    Ok(())
}

/// Run the conditioning of every given project file
pub fn run(params: RunParams) -> Result<(), Box<dyn std::error::Error>> {
    let n_files = params.filepaths.len();
    for (i, filepath) in params.filepaths.iter().enumerate() {
        if !params.quiet & (n_files > 1) {
            println!("{}/{}: {:?}", i + 1, n_files, filepath);
        };
        run_project(filepath, &params)?;
    }
    Ok(())
}

/// Run the main CLI functionality based on the given arguments
///
/// # Arguments
/// - `arguments`: The Args object containing the parsed arguments.
///
/// # Returns
/// The appropriate exit code.
pub fn main(arguments: Args) -> i32 {
    match arguments.to_params() {
        ParsedArgs::Params(params) => match run(*params) {
            Ok(_) => 0,
            Err(e) => error(&format!("{e}"), 1),
        },
        ParsedArgs::Error(message) => error(&message, 1),
    }
}

/// Print an error to /dev/stderr and return an exit code
///
/// # Arguments
/// - `message`: The message to print to /dev/stderr
/// - `code`: The exit code
///
/// # Returns
/// The same exit code that was provided
fn error(message: &str, code: i32) -> i32 {
    eprintln!("{}", message);
    code
}
