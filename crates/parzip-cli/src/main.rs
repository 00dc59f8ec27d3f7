mod args;

use std::process;

use clap::{CommandFactory, FromArgMatches};
use parzip_core::{BuildOptions, ZipPipeline};

use crate::args::{collect_inputs, Cli};

fn main() {
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());

    let (files, lists) = match collect_inputs(&matches) {
        Ok(inputs) => inputs,
        Err(message) => usage_error(&message),
    };

    let options = BuildOptions {
        compression_level: cli.level,
        parallel_jobs: cli.jobs,
        include_directories: cli.directories,
        ..BuildOptions::default()
    };
    let pipeline = ZipPipeline::new(options);

    if let Err(err) = pipeline.build(&cli.output, &lists, &files, cli.manifest.as_deref()) {
        eprintln!("error: {err}");
        process::exit(1);
    }
}

fn usage_error(message: &str) -> ! {
    eprintln!("error: {message}");
    eprintln!("{}", Cli::command().render_usage());
    process::exit(2);
}
