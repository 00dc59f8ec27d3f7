use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::thread;

use bytes::Bytes;
use crossbeam_channel::{bounded, Sender};

use crate::compression::WINDOW_SIZE;
use crate::core::Execution;
use crate::io::{read_exact_at, FileSection};
use crate::types::{EntryHeader, FileArg, Method, Result};
use crate::ZipError;

use super::directory::DirectoryRecorder;
use super::types::{resolved_promise, BlockRx, EntryPromise, PipelineContext, ResolvedEntry};
use super::{BLOCK_SIZE, MANIFEST_NAME, MIN_PARALLEL_SIZE};

const CRC_READ_BUFFER: usize = 64 * 1024;

/// Sequentially turns input paths into queued entry promises and spawns the
/// CRC and compression tasks that resolve them.
///
/// Submission order is archive order; everything asynchronous about an entry
/// is hidden behind its promise.
pub(crate) struct EntryPlanner {
    ctx: Arc<PipelineContext>,
    queue: Sender<EntryPromise>,
    dirs: DirectoryRecorder,
    include_directories: bool,
}

impl EntryPlanner {
    pub fn new(
        ctx: Arc<PipelineContext>,
        queue: Sender<EntryPromise>,
        include_directories: bool,
    ) -> Self {
        Self {
            ctx,
            queue,
            dirs: DirectoryRecorder::new(),
            include_directories,
        }
    }

    /// Plans every input in deterministic order: list files, then direct
    /// file arguments, then the manifest.
    pub fn run(
        &mut self,
        list_files: &[FileArg],
        files: &[FileArg],
        manifest: Option<&Path>,
    ) -> Result<()> {
        for arg in list_files {
            self.add_list_file(arg)?;
        }
        for arg in files {
            self.add_rel_file(&arg.relative_root, &arg.path)?;
        }
        if let Some(path) = manifest {
            self.add_file(MANIFEST_NAME.to_string(), path)?;
        }
        Ok(())
    }

    fn add_list_file(&mut self, arg: &FileArg) -> Result<()> {
        let list =
            fs::read_to_string(&arg.path).map_err(|err| ZipError::input(&arg.path, err))?;
        for line in list.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            self.add_rel_file(&arg.relative_root, Path::new(line))?;
        }
        Ok(())
    }

    fn add_rel_file(&mut self, root: &Path, path: &Path) -> Result<()> {
        let name = entry_name(root, path)?;
        self.add_file(name, path)
    }

    fn add_file(&mut self, name: String, path: &Path) -> Result<()> {
        let meta = fs::symlink_metadata(path).map_err(|err| ZipError::input(path, err))?;
        let file_type = meta.file_type();

        if file_type.is_dir() {
            if self.include_directories {
                self.dirs.record(&self.queue, &name)?;
            }
            return Ok(());
        }
        if file_type.is_symlink() {
            return self.add_symlink(name, path);
        }
        if !file_type.is_file() {
            return Err(ZipError::InvalidInput(format!(
                "{}: not a file, directory, or symlink",
                path.display()
            )));
        }

        if self.include_directories {
            self.dirs.record_parents(&self.queue, &name)?;
        }

        // Enqueue the promise before any work starts so archive order stays
        // equal to submission order.
        let (entry_tx, entry_rx) = bounded(1);
        self.queue
            .send(entry_rx)
            .map_err(|_| ZipError::ShuttingDown)?;

        let file = Arc::new(File::open(path).map_err(|err| ZipError::input(path, err))?);
        let size = meta.len();
        let exec = self.ctx.limiter.request_execution()?;

        if size >= MIN_PARALLEL_SIZE {
            self.plan_blocks(name, file, size, entry_tx, exec)
        } else {
            let ctx = Arc::clone(&self.ctx);
            thread::spawn(move || compress_whole_task(ctx, name, file, size, exec, entry_tx));
            Ok(())
        }
    }

    /// Large-file path: one CRC task plus one compression task per block,
    /// every block primed with the trailing window of its predecessor.
    fn plan_blocks(
        &self,
        name: String,
        file: Arc<File>,
        size: u64,
        entry_tx: Sender<ResolvedEntry>,
        crc_exec: Execution,
    ) -> Result<()> {
        let block_count = size.div_ceil(BLOCK_SIZE) as usize;
        let (blocks_tx, blocks_rx) = bounded(block_count);

        {
            let ctx = Arc::clone(&self.ctx);
            let file = Arc::clone(&file);
            let header = EntryHeader::file(name, Method::Deflate, size);
            thread::spawn(move || {
                crc_task(ctx, file, size, header, blocks_rx, entry_tx, crc_exec)
            });
        }

        let mut start = 0u64;
        while start < size {
            let len = BLOCK_SIZE.min(size - start);
            let (payload_tx, payload_rx) = bounded(1);
            if blocks_tx.send(payload_rx).is_err() {
                // CRC task already failed and posted its error.
                return Err(ZipError::ShuttingDown);
            }

            let exec = self.ctx.limiter.request_execution()?;
            let last = start + len >= size;
            let dict = if start >= WINDOW_SIZE as u64 {
                let mut window = vec![0u8; WINDOW_SIZE];
                read_exact_at(&file, &mut window, start - WINDOW_SIZE as u64)?;
                Some(window)
            } else {
                None
            };

            let ctx = Arc::clone(&self.ctx);
            let file = Arc::clone(&file);
            thread::spawn(move || {
                compress_block_task(ctx, file, start, len, dict, last, exec, payload_tx)
            });
            start += len;
        }
        Ok(())
    }

    fn add_symlink(&mut self, name: String, path: &Path) -> Result<()> {
        if self.include_directories {
            self.dirs.record_parents(&self.queue, &name)?;
        }

        let target = fs::read_link(path).map_err(|err| ZipError::input(path, err))?;
        let target = target.into_os_string().into_string().map_err(|_| {
            ZipError::InvalidInput(format!(
                "{}: link target is not valid UTF-8",
                path.display()
            ))
        })?;
        let payload = Bytes::from(target.into_bytes());

        let mut header = EntryHeader::symlink(name, payload.len() as u64);
        header.crc32 = crc32fast::hash(&payload);

        // No execution slot for a payload this small, but the writer-side
        // release still expects the length to be pending.
        self.ctx.limiter.release(-(payload.len() as i64));
        self.queue
            .send(resolved_promise(header, Some(payload)))
            .map_err(|_| ZipError::ShuttingDown)
    }
}

fn crc_task(
    ctx: Arc<PipelineContext>,
    file: Arc<File>,
    size: u64,
    mut header: EntryHeader,
    blocks_rx: crossbeam_channel::Receiver<BlockRx>,
    entry_tx: Sender<ResolvedEntry>,
    exec: Execution,
) {
    let mut hasher = crc32fast::Hasher::new();
    let mut section = FileSection::new(file, 0, size);
    let mut buf = vec![0u8; CRC_READ_BUFFER];
    loop {
        match section.read(&mut buf) {
            Ok(0) => break,
            Ok(read) => hasher.update(&buf[..read]),
            Err(err) => {
                ctx.send_error(ZipError::Io(err));
                return;
            }
        }
    }
    header.crc32 = hasher.finalize();
    let _ = entry_tx.send(ResolvedEntry {
        header,
        blocks: Some(blocks_rx),
    });
    exec.finish(0);
}

#[allow(clippy::too_many_arguments)]
fn compress_block_task(
    ctx: Arc<PipelineContext>,
    file: Arc<File>,
    offset: u64,
    len: u64,
    dict: Option<Vec<u8>>,
    last: bool,
    exec: Execution,
    payload_tx: Sender<Bytes>,
) {
    let result = (|| -> Result<Bytes> {
        let mut data = vec![0u8; len as usize];
        read_exact_at(&file, &mut data, offset)?;
        let compressed = ctx.deflate.compress_block(&data, dict.as_deref(), last)?;
        Ok(Bytes::from(compressed))
    })();

    match result {
        Ok(payload) => {
            exec.finish(payload.len() as i64);
            let _ = payload_tx.send(payload);
        }
        // Dropping `exec` frees the worker slot.
        Err(err) => ctx.send_error(err),
    }
}

/// Small-file path: CRC and compression in one task, with the store
/// fallback when deflate does not shrink the payload.
fn compress_whole_task(
    ctx: Arc<PipelineContext>,
    name: String,
    file: Arc<File>,
    size: u64,
    exec: Execution,
    entry_tx: Sender<ResolvedEntry>,
) {
    let outcome = (|| -> Result<(EntryHeader, Bytes)> {
        let mut section = FileSection::new(file, 0, u64::MAX);
        let mut data = Vec::with_capacity(size as usize);
        section.read_to_end(&mut data)?;

        let mut header = EntryHeader::file(name, Method::Deflate, data.len() as u64);
        header.crc32 = crc32fast::hash(&data);

        let compressed = ctx.deflate.compress_block(&data, None, true)?;
        if !data.is_empty() && compressed.len() >= data.len() {
            header.method = Method::Store;
            Ok((header, Bytes::from(data)))
        } else {
            Ok((header, Bytes::from(compressed)))
        }
    })();

    match outcome {
        Ok((header, payload)) => {
            exec.finish(payload.len() as i64);
            let entry = resolved_entry_with_payload(header, payload);
            let _ = entry_tx.send(entry);
        }
        Err(err) => ctx.send_error(err),
    }
}

fn resolved_entry_with_payload(header: EntryHeader, payload: Bytes) -> ResolvedEntry {
    let (payload_tx, payload_rx) = bounded(1);
    let (blocks_tx, blocks_rx) = bounded(1);
    let _ = payload_tx.send(payload);
    let _ = blocks_tx.send(payload_rx);
    ResolvedEntry {
        header,
        blocks: Some(blocks_rx),
    }
}

/// Computes the archive name of `path` relative to `root`: both sides are
/// lexically cleaned, the root prefix is stripped, and the remainder joins
/// with forward slashes.
pub(crate) fn entry_name(root: &Path, path: &Path) -> Result<String> {
    let root = clean_path(root);
    let path = clean_path(path);

    let rel = if root.as_os_str().is_empty() || root == Path::new(".") {
        path.as_path()
    } else {
        path.strip_prefix(&root).map_err(|_| {
            ZipError::InvalidInput(format!(
                "{} is not under relative root {}",
                path.display(),
                root.display()
            ))
        })?
    };

    if rel.as_os_str().is_empty() || rel == Path::new(".") {
        return Err(ZipError::InvalidInput(format!(
            "{}: resolves to an empty entry name",
            path.display()
        )));
    }

    let mut name = String::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_str().ok_or_else(|| {
                    ZipError::InvalidInput(format!(
                        "{}: entry name is not valid UTF-8",
                        path.display()
                    ))
                })?;
                if !name.is_empty() {
                    name.push('/');
                }
                name.push_str(part);
            }
            _ => {
                return Err(ZipError::InvalidInput(format!(
                    "{}: entry name escapes the relative root",
                    path.display()
                )));
            }
        }
    }
    Ok(name)
}

/// Lexical path cleanup: drops `.` components, resolves `..` against
/// preceding components, and collapses separators.
pub(crate) fn clean_path(path: &Path) -> PathBuf {
    let mut rooted = false;
    let mut parts: Vec<&OsStr> = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) => {}
            Component::RootDir => {
                rooted = true;
                parts.clear();
            }
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(last) if *last != OsStr::new("..") => {
                    parts.pop();
                }
                _ if rooted => {}
                _ => parts.push(OsStr::new("..")),
            },
            Component::Normal(part) => parts.push(part),
        }
    }

    let mut cleaned = PathBuf::new();
    if rooted {
        cleaned.push("/");
    }
    for part in parts {
        cleaned.push(part);
    }
    if cleaned.as_os_str().is_empty() {
        cleaned.push(".");
    }
    cleaned
}
