use std::path::PathBuf;

use clap::{ArgAction, ArgMatches, Parser};
use parzip_core::FileArg;

/// Deterministic parallel ZIP builder.
///
/// `-C` sets the relative root for every following `-f` and `-l`; the
/// pairing is positional, so arguments are re-associated by index after
/// parsing (see [`collect_inputs`]).
#[derive(Debug, Parser)]
#[command(
    name = "parzip",
    version,
    about = "Build deterministic ZIP archives with parallel compression",
    override_usage = "parzip -o zipfile [-m manifest] [-d] [-j N] [-L level] -C dir [-f|-l file]..."
)]
pub struct Cli {
    /// File to write the zip archive to.
    #[arg(short = 'o', value_name = "FILE")]
    pub output: PathBuf,

    /// Input jar manifest file, stored at META-INF/MANIFEST.MF.
    #[arg(short = 'm', value_name = "FILE")]
    pub manifest: Option<PathBuf>,

    /// Include directory entries in the archive.
    #[arg(short = 'd')]
    pub directories: bool,

    /// Path to use as the relative root of files in following -f or -l
    /// arguments.
    #[arg(short = 'C', value_name = "DIR", action = ArgAction::Append)]
    pub chdir: Vec<PathBuf>,

    /// File to include in the archive (requires a preceding -C).
    #[arg(short = 'f', value_name = "FILE", action = ArgAction::Append)]
    pub files: Vec<PathBuf>,

    /// File containing one input path per line (requires a preceding -C).
    #[arg(short = 'l', value_name = "FILE", action = ArgAction::Append)]
    pub lists: Vec<PathBuf>,

    /// Number of parallel compression workers.
    #[arg(short = 'j', value_name = "N", default_value_t = num_cpus::get(), value_parser = parse_jobs)]
    pub jobs: usize,

    /// Deflate compression level (0-9).
    #[arg(short = 'L', value_name = "LEVEL", default_value_t = 5, value_parser = parse_level)]
    pub level: u32,
}

fn parse_jobs(value: &str) -> Result<usize, String> {
    let jobs: usize = value
        .parse()
        .map_err(|_| format!("invalid worker count: {value}"))?;
    if jobs == 0 {
        return Err("worker count must be at least 1".to_string());
    }
    Ok(jobs)
}

fn parse_level(value: &str) -> Result<u32, String> {
    let level: u32 = value
        .parse()
        .map_err(|_| format!("invalid compression level: {value}"))?;
    if level > 9 {
        return Err(format!("compression level must be 0-9, got {level}"));
    }
    Ok(level)
}

/// Re-associates `-f`/`-l` values with the `-C` root that preceded them on
/// the command line. Returns `(files, list_files)` in appearance order.
pub fn collect_inputs(matches: &ArgMatches) -> Result<(Vec<FileArg>, Vec<FileArg>), String> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Kind {
        Root,
        File,
        List,
    }

    let mut events: Vec<(usize, Kind, PathBuf)> = Vec::new();
    for (id, kind) in [("chdir", Kind::Root), ("files", Kind::File), ("lists", Kind::List)] {
        let indices = matches.indices_of(id).into_iter().flatten();
        let values = matches.get_many::<PathBuf>(id).into_iter().flatten();
        for (index, value) in indices.zip(values) {
            events.push((index, kind, value.clone()));
        }
    }
    events.sort_by_key(|(index, _, _)| *index);

    let mut current_root: Option<PathBuf> = None;
    let mut files = Vec::new();
    let mut lists = Vec::new();
    for (_, kind, value) in events {
        match kind {
            Kind::Root => current_root = Some(value),
            Kind::File | Kind::List => {
                let root = current_root
                    .clone()
                    .ok_or_else(|| "must pass -C before -f or -l".to_string())?;
                let arg = FileArg::new(root, value);
                if kind == Kind::File {
                    files.push(arg);
                } else {
                    lists.push(arg);
                }
            }
        }
    }
    Ok((files, lists))
}
