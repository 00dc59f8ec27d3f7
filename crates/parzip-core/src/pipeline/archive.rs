use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam_channel::{bounded, unbounded};

use crate::compression::DeflatePool;
use crate::core::RateLimit;
use crate::format::ZipStreamWriter;
use crate::telemetry::{NoopTelemetry, PipelineTelemetry};
use crate::types::{FileArg, Result};
use crate::ZipError;

use super::planner::EntryPlanner;
use super::types::{BuildOptions, BuildStats, PipelineContext};
use super::writer::ArchiveWriter;
use super::WRITE_QUEUE_CAPACITY;

/// Parallel, streaming ZIP builder.
///
/// The planner submits entries in deterministic order on its own thread;
/// compression and CRC tasks fan out behind the rate limiter; the calling
/// thread runs the single writer. Given identical inputs and options the
/// produced archive is byte-identical across runs.
pub struct ZipPipeline {
    options: BuildOptions,
    telemetry: Arc<dyn PipelineTelemetry>,
}

impl ZipPipeline {
    /// Creates a pipeline with the default no-op telemetry.
    pub fn new(options: BuildOptions) -> Self {
        Self::with_telemetry(options, Arc::new(NoopTelemetry))
    }

    /// Creates a pipeline reporting through a custom telemetry backend.
    pub fn with_telemetry(options: BuildOptions, telemetry: Arc<dyn PipelineTelemetry>) -> Self {
        Self { options, telemetry }
    }

    /// Builds the archive at `out_path` from list files, direct file
    /// arguments, and an optional manifest, in that order.
    ///
    /// No partial archive survives a failure: the output file is removed
    /// before the error is returned.
    pub fn build(
        &self,
        out_path: &Path,
        list_files: &[FileArg],
        files: &[FileArg],
        manifest: Option<&Path>,
    ) -> Result<BuildStats> {
        let started = Instant::now();
        let out_file = File::create(out_path).map_err(|err| ZipError::input(out_path, err))?;

        match self.run(out_file, list_files, files, manifest) {
            Ok(mut stats) => {
                stats.archive_bytes = fs::metadata(out_path)?.len();
                stats.elapsed = started.elapsed();
                Ok(stats)
            }
            Err(err) => {
                let _ = fs::remove_file(out_path);
                Err(err)
            }
        }
    }

    fn run(
        &self,
        out_file: File,
        list_files: &[FileArg],
        files: &[FileArg],
        manifest: Option<&Path>,
    ) -> Result<BuildStats> {
        let jobs = if self.options.parallel_jobs == 0 {
            num_cpus::get()
        } else {
            self.options.parallel_jobs
        };
        let limiter = Arc::new(RateLimit::with_telemetry(
            jobs,
            self.options.pending_bytes_budget,
            Arc::clone(&self.telemetry),
        ));
        let (errors_tx, errors_rx) = unbounded();
        let ctx = Arc::new(PipelineContext::new(
            Arc::clone(&limiter),
            DeflatePool::new(self.options.compression_level),
            errors_tx.clone(),
        ));
        let (queue_tx, queue_rx) = bounded(WRITE_QUEUE_CAPACITY);

        let planner = {
            let ctx = Arc::clone(&ctx);
            let include_directories = self.options.include_directories;
            let list_files = list_files.to_vec();
            let files = files.to_vec();
            let manifest = manifest.map(Path::to_path_buf);
            thread::spawn(move || {
                let mut planner =
                    EntryPlanner::new(Arc::clone(&ctx), queue_tx, include_directories);
                if let Err(err) = planner.run(&list_files, &files, manifest.as_deref()) {
                    ctx.send_error(err);
                }
            })
        };

        let writer = ArchiveWriter::new(
            ZipStreamWriter::new(BufWriter::new(out_file)),
            queue_rx,
            errors_rx,
            Arc::clone(&limiter),
        );
        let result = writer.run();
        // Held across the writer's run so the error channel cannot close
        // while producers are still alive.
        drop(errors_tx);

        // Unblock any planner still waiting on admission, then reap it.
        limiter.stop();
        let _ = planner.join();

        let (buffered, stats) = result?;
        drop(buffered);
        Ok(stats)
    }
}
