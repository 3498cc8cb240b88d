//! Conditioning of cross-borehole multi-offset gathers (MOGs) before tomographic inversion
pub mod airshot;
pub mod borehole;
pub mod cli;
pub mod coords;
pub mod error;
pub mod filters;
pub mod io;
pub mod merge;
pub mod mog;
pub mod project;
pub mod tools;

const PROGRAM_VERSION: &str = env!("CARGO_PKG_VERSION");
const PROGRAM_NAME: &str = env!("CARGO_PKG_NAME");
const PROGRAM_AUTHORS: &str = env!("CARGO_PKG_AUTHORS");

/// The name, version and authors of the program, for log headers and exported files
pub fn program_info() -> String {
    format!("{} v{} by {}", PROGRAM_NAME, PROGRAM_VERSION, PROGRAM_AUTHORS)
}
