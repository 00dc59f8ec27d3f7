use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parzip_core::{
    BuildOptions, FileArg, PipelineTelemetry, ZipPipeline, MANIFEST_NAME, MIN_PARALLEL_SIZE,
};
use tempfile::TempDir;

fn pseudo_random(len: usize, mut seed: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(len + 8);
    while out.len() < len {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        out.extend_from_slice(&seed.to_le_bytes());
    }
    out.truncate(len);
    out
}

fn write_tree(root: &Path, files: &[(&str, &[u8])]) {
    for (name, contents) in files {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }
}

fn file_args(root: &Path, names: &[&str]) -> Vec<FileArg> {
    names
        .iter()
        .map(|name| FileArg::new(root, root.join(name)))
        .collect()
}

fn build(
    out: &Path,
    root: &Path,
    names: &[&str],
    options: BuildOptions,
) -> parzip_core::Result<parzip_core::BuildStats> {
    ZipPipeline::new(options).build(out, &[], &file_args(root, names), None)
}

fn open_archive(path: &Path) -> zip::ZipArchive<File> {
    zip::ZipArchive::new(File::open(path).unwrap()).expect("archive should parse")
}

fn entry_bytes(archive: &mut zip::ZipArchive<File>, index: usize) -> Vec<u8> {
    let mut entry = archive.by_index(index).unwrap();
    let mut contents = Vec::new();
    entry.read_to_end(&mut contents).unwrap();
    contents
}

#[test]
fn mixed_inputs_round_trip_in_submission_order() {
    let dir = TempDir::new().unwrap();
    let big = pseudo_random(10 * 1024 * 1024, 7);
    assert!(big.len() as u64 > MIN_PARALLEL_SIZE);
    let small = b"one hundred bytes of reasonably compressible text ".repeat(2);
    write_tree(
        dir.path(),
        &[
            ("e.txt", &[][..]),
            ("small.txt", &small[..100]),
            ("big.bin", &big[..]),
        ],
    );

    let out = dir.path().join("out.zip");
    let stats = build(
        &out,
        dir.path(),
        &["e.txt", "small.txt", "big.bin"],
        BuildOptions::default(),
    )
    .unwrap();
    assert_eq!(stats.entries, 3);
    assert_eq!(
        stats.uncompressed_bytes,
        100 + big.len() as u64
    );

    let mut archive = open_archive(&out);
    assert_eq!(archive.len(), 3);
    for (index, name) in ["e.txt", "small.txt", "big.bin"].iter().enumerate() {
        assert_eq!(archive.by_index(index).unwrap().name(), *name);
    }

    // Empty and multi-block files stay Deflate.
    assert_eq!(
        archive.by_index(0).unwrap().compression(),
        zip::CompressionMethod::Deflated
    );
    assert_eq!(
        archive.by_index(2).unwrap().compression(),
        zip::CompressionMethod::Deflated
    );

    assert_eq!(entry_bytes(&mut archive, 0), Vec::<u8>::new());
    assert_eq!(entry_bytes(&mut archive, 1), small[..100].to_vec());
    assert_eq!(entry_bytes(&mut archive, 2), big);
}

#[test]
fn identical_runs_are_byte_identical() {
    let dir = TempDir::new().unwrap();
    let big = pseudo_random(8 * 1024 * 1024, 99);
    write_tree(
        dir.path(),
        &[("a.bin", &big[..]), ("b.txt", &b"deterministic"[..])],
    );

    let first = dir.path().join("first.zip");
    let second = dir.path().join("second.zip");
    build(&first, dir.path(), &["a.bin", "b.txt"], BuildOptions::default()).unwrap();
    build(&second, dir.path(), &["a.bin", "b.txt"], BuildOptions::default()).unwrap();

    assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
}

#[test]
fn single_worker_produces_the_same_bytes() {
    let dir = TempDir::new().unwrap();
    let big = pseudo_random(7 * 1024 * 1024, 3);
    write_tree(dir.path(), &[("big.bin", &big[..]), ("e.txt", &[][..])]);

    let serial = dir.path().join("serial.zip");
    let parallel = dir.path().join("parallel.zip");
    build(
        &serial,
        dir.path(),
        &["big.bin", "e.txt"],
        BuildOptions {
            parallel_jobs: 1,
            ..BuildOptions::default()
        },
    )
    .unwrap();
    build(
        &parallel,
        dir.path(),
        &["big.bin", "e.txt"],
        BuildOptions {
            parallel_jobs: 8,
            ..BuildOptions::default()
        },
    )
    .unwrap();

    // Block boundaries are deterministic in offsets, so worker count cannot
    // change the archive bytes.
    assert_eq!(fs::read(&serial).unwrap(), fs::read(&parallel).unwrap());
}

#[test]
fn incompressible_small_file_falls_back_to_store() {
    let dir = TempDir::new().unwrap();
    let noise = pseudo_random(4096, 42);
    write_tree(dir.path(), &[("noise.bin", &noise[..])]);

    let out = dir.path().join("out.zip");
    build(&out, dir.path(), &["noise.bin"], BuildOptions::default()).unwrap();

    let mut archive = open_archive(&out);
    let entry = archive.by_index(0).unwrap();
    assert_eq!(entry.compression(), zip::CompressionMethod::Stored);
    assert_eq!(entry.size(), noise.len() as u64);
    drop(entry);
    assert_eq!(entry_bytes(&mut archive, 0), noise);
}

#[test]
fn symlink_stores_its_target() {
    let dir = TempDir::new().unwrap();
    write_tree(dir.path(), &[("real.txt", &b"contents"[..])]);
    std::os::unix::fs::symlink("target/path", dir.path().join("link")).unwrap();

    let out = dir.path().join("out.zip");
    build(&out, dir.path(), &["link"], BuildOptions::default()).unwrap();

    let mut archive = open_archive(&out);
    let entry = archive.by_index(0).unwrap();
    assert_eq!(entry.name(), "link");
    assert_eq!(entry.compression(), zip::CompressionMethod::Stored);
    assert_eq!(entry.size(), "target/path".len() as u64);
    let mode = entry.unix_mode().expect("unix mode recorded");
    assert_eq!(mode & 0o170000, 0o120000, "symlink type bit");
    drop(entry);
    assert_eq!(entry_bytes(&mut archive, 0), b"target/path".to_vec());
}

#[test]
fn directory_entries_synthesized_exactly_once() {
    let dir = TempDir::new().unwrap();
    write_tree(
        dir.path(),
        &[("a/b/c.txt", &b"c"[..]), ("a/b/d.txt", &b"d"[..])],
    );

    let out = dir.path().join("out.zip");
    build(
        &out,
        dir.path(),
        &["a/b/c.txt", "a/b/d.txt"],
        BuildOptions {
            include_directories: true,
            ..BuildOptions::default()
        },
    )
    .unwrap();

    let mut archive = open_archive(&out);
    let names: Vec<String> = (0..archive.len())
        .map(|index| archive.by_index(index).unwrap().name().to_string())
        .collect();
    assert_eq!(names.iter().filter(|name| *name == "a/").count(), 1);
    assert_eq!(names.iter().filter(|name| *name == "a/b/").count(), 1);
    assert_eq!(names.len(), 4);

    // Ancestors precede the first file that needs them.
    let first_file = names.iter().position(|name| name == "a/b/c.txt").unwrap();
    assert!(names.iter().position(|name| name == "a/").unwrap() < first_file);
    assert!(names.iter().position(|name| name == "a/b/").unwrap() < first_file);
}

#[test]
fn no_directory_entries_without_the_flag() {
    let dir = TempDir::new().unwrap();
    write_tree(dir.path(), &[("a/b/c.txt", &b"c"[..])]);

    let out = dir.path().join("out.zip");
    build(&out, dir.path(), &["a/b/c.txt"], BuildOptions::default()).unwrap();

    let archive = open_archive(&out);
    assert_eq!(archive.len(), 1);
}

#[test]
fn manifest_is_added_last_under_its_fixed_name() {
    let dir = TempDir::new().unwrap();
    let manifest_body = b"Manifest-Version: 1.0\n";
    write_tree(
        dir.path(),
        &[("x.txt", &b"x"[..]), ("MANIFEST.MF", &manifest_body[..])],
    );

    let out = dir.path().join("out.zip");
    ZipPipeline::new(BuildOptions::default())
        .build(
            &out,
            &[],
            &file_args(dir.path(), &["x.txt"]),
            Some(&dir.path().join("MANIFEST.MF")),
        )
        .unwrap();

    let mut archive = open_archive(&out);
    assert_eq!(archive.len(), 2);
    assert_eq!(archive.by_index(1).unwrap().name(), MANIFEST_NAME);
    assert_eq!(entry_bytes(&mut archive, 1), manifest_body.to_vec());
}

#[test]
fn list_files_expand_before_direct_arguments() {
    let dir = TempDir::new().unwrap();
    write_tree(
        dir.path(),
        &[("one.txt", &b"1"[..]), ("two.txt", &b"2"[..]), ("three.txt", &b"3"[..])],
    );
    let list_path = dir.path().join("inputs.list");
    fs::write(
        &list_path,
        format!(
            "{}\n\n  {}  \n",
            dir.path().join("one.txt").display(),
            dir.path().join("two.txt").display()
        ),
    )
    .unwrap();

    let out = dir.path().join("out.zip");
    ZipPipeline::new(BuildOptions::default())
        .build(
            &out,
            &[FileArg::new(dir.path(), &list_path)],
            &file_args(dir.path(), &["three.txt"]),
            None,
        )
        .unwrap();

    let mut archive = open_archive(&out);
    let names: Vec<String> = (0..archive.len())
        .map(|index| archive.by_index(index).unwrap().name().to_string())
        .collect();
    assert_eq!(names, ["one.txt", "two.txt", "three.txt"]);
}

#[test]
fn missing_input_fails_and_removes_the_output() {
    let dir = TempDir::new().unwrap();
    write_tree(dir.path(), &[("ok.txt", &b"ok"[..])]);

    let out = dir.path().join("out.zip");
    let result = build(
        &out,
        dir.path(),
        &["ok.txt", "missing.txt"],
        BuildOptions::default(),
    );
    assert!(result.is_err());
    assert!(!out.exists(), "no partial archive may survive a failure");
}

#[derive(Default)]
struct MaxActiveTelemetry {
    max_active: AtomicUsize,
}

impl PipelineTelemetry for MaxActiveTelemetry {
    fn on_worker_admitted(&self, active: usize) {
        self.max_active.fetch_max(active, Ordering::SeqCst);
    }
    fn on_worker_released(&self, _active: usize) {}
    fn on_bytes_pending(&self, _pending: i64) {}
}

#[test]
fn worker_cap_holds_across_a_block_split_build() {
    let dir = TempDir::new().unwrap();
    let big = pseudo_random(9 * 1024 * 1024, 11);
    write_tree(dir.path(), &[("big.bin", &big[..])]);

    let telemetry = Arc::new(MaxActiveTelemetry::default());
    let sink: Arc<dyn PipelineTelemetry> = telemetry.clone() as Arc<dyn PipelineTelemetry>;
    let pipeline = ZipPipeline::with_telemetry(
        BuildOptions {
            parallel_jobs: 2,
            ..BuildOptions::default()
        },
        sink,
    );

    let out = dir.path().join("out.zip");
    pipeline
        .build(&out, &[], &file_args(dir.path(), &["big.bin"]), None)
        .unwrap();

    assert!(telemetry.max_active.load(Ordering::SeqCst) <= 2);

    let mut archive = open_archive(&out);
    assert_eq!(entry_bytes(&mut archive, 0), big);
}

#[test]
fn relative_root_shapes_entry_names() {
    let dir = TempDir::new().unwrap();
    write_tree(dir.path(), &[("pkg/inner/file.txt", &b"f"[..])]);

    let out = dir.path().join("out.zip");
    let root: PathBuf = dir.path().join("pkg");
    ZipPipeline::new(BuildOptions::default())
        .build(
            &out,
            &[],
            &[FileArg::new(&root, root.join("inner/file.txt"))],
            None,
        )
        .unwrap();

    let mut archive = open_archive(&out);
    assert_eq!(archive.by_index(0).unwrap().name(), "inner/file.txt");
}
