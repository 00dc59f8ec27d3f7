use std::fs::File;
use std::io::{self, Read};
use std::os::unix::fs::FileExt;
use std::sync::Arc;

/// Reads `buf.len()` bytes at `offset` without touching the file cursor.
pub fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    file.read_exact_at(buf, offset)
}

/// Positional reader over a byte range of a shared file handle.
///
/// Multiple sections of one file can be read concurrently; there is no
/// shared cursor. The handle closes when the last section holding it drops.
#[derive(Debug)]
pub struct FileSection {
    file: Arc<File>,
    position: u64,
    end: u64,
}

impl FileSection {
    pub fn new(file: Arc<File>, offset: u64, len: u64) -> Self {
        Self {
            file,
            position: offset,
            end: offset.saturating_add(len),
        }
    }

    /// Bytes left in the section.
    pub fn remaining(&self) -> u64 {
        self.end - self.position
    }
}

impl Read for FileSection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.remaining();
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = buf.len().min(remaining.min(usize::MAX as u64) as usize);
        let read = self.file.read_at(&mut buf[..want], self.position)?;
        self.position += read as u64;
        Ok(read)
    }
}
