use bhmog::cli;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() {
    let args = cli::Args::parse();

    let default_level = match args.quiet() {
        true => "warn",
        false => "info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    std::process::exit(cli::main(args));
}
