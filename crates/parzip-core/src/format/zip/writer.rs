use std::io::Write;

use crate::types::{EntryHeader, Method, Result};
use crate::ZipError;

use super::consts::{FLAG_DATA_DESCRIPTOR, FLAG_UTF8, MSDOS_DIR_ATTR};
use super::headers::{CentralRecord, DataDescriptor, EndOfCentralDirectory, LocalFileHeader};

/// Streaming PKZIP record emitter over a forward-only sink.
///
/// One entry may be open at a time. The caller declares the CRC-32 and
/// uncompressed size up front; this writer never compresses — it copies
/// payload bytes verbatim, counts the compressed size, and emits the local
/// header, data descriptor, central directory, and end record around them.
#[derive(Debug)]
pub struct ZipStreamWriter<W: Write> {
    inner: W,
    offset: u64,
    central: Vec<CentralRecord>,
    open: Option<OpenEntry>,
}

#[derive(Debug)]
struct OpenEntry {
    record: usize,
    streamed: bool,
    zip64: bool,
    compressed: u64,
}

impl<W: Write> ZipStreamWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            offset: 0,
            central: Vec::new(),
            open: None,
        }
    }

    /// Opens an entry whose payload is copied verbatim (Store method or a
    /// zero-payload directory entry). The local file header is written
    /// immediately.
    pub fn create_header(&mut self, header: &EntryHeader) -> Result<()> {
        if header.method != Method::Store {
            return Err(ZipError::InvalidFormat(
                "create_header expects a stored entry",
            ));
        }
        self.start_entry(header)
    }

    /// Opens an entry declared pre-compressed: the header carries the final
    /// CRC-32 and uncompressed size, payload bytes are raw deflate, and the
    /// compressed size is recorded from the byte count. No re-compression.
    pub fn create_precompressed(&mut self, header: &EntryHeader) -> Result<()> {
        if header.method != Method::Deflate {
            return Err(ZipError::InvalidFormat(
                "create_precompressed expects a deflate entry",
            ));
        }
        self.start_entry(header)
    }

    /// Appends payload bytes to the open entry.
    pub fn write_payload(&mut self, data: &[u8]) -> Result<()> {
        let open = self
            .open
            .as_mut()
            .ok_or(ZipError::InvalidFormat("no entry is open for payload"))?;
        self.inner.write_all(data)?;
        open.compressed += data.len() as u64;
        self.offset += data.len() as u64;
        Ok(())
    }

    /// Seals the open entry: records the compressed size and, for streamed
    /// entries, emits the data descriptor.
    pub fn finish_entry(&mut self) -> Result<()> {
        let open = self
            .open
            .take()
            .ok_or(ZipError::InvalidFormat("no entry is open to finish"))?;
        let record = &mut self.central[open.record];
        record.compressed_size = open.compressed;

        if record.method == Method::Store.code() && open.compressed != record.uncompressed_size {
            return Err(ZipError::InvalidFormat(
                "stored entry payload does not match its declared size",
            ));
        }

        if open.streamed {
            let descriptor = DataDescriptor {
                crc32: record.crc32,
                compressed_size: open.compressed,
                uncompressed_size: record.uncompressed_size,
                zip64: open.zip64,
            };
            let bytes = descriptor.to_bytes();
            self.inner.write_all(&bytes)?;
            self.offset += bytes.len() as u64;
        }
        Ok(())
    }

    /// Writes the central directory and end-of-central-directory records,
    /// flushes, and returns the inner writer.
    pub fn close(mut self) -> Result<W> {
        if self.open.is_some() {
            return Err(ZipError::InvalidFormat(
                "cannot close archive with an open entry",
            ));
        }

        let central_offset = self.offset;
        let mut central_size = 0u64;
        for record in &self.central {
            let bytes = record.to_bytes();
            self.inner.write_all(&bytes)?;
            central_size += bytes.len() as u64;
        }

        let end = EndOfCentralDirectory {
            entry_count: self.central.len() as u64,
            central_size,
            central_offset,
        };
        self.inner.write_all(&end.to_bytes())?;
        self.inner.flush()?;
        Ok(self.inner)
    }

    /// Number of entries recorded so far.
    pub fn entry_count(&self) -> usize {
        self.central.len()
    }

    /// Archive bytes written so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn start_entry(&mut self, header: &EntryHeader) -> Result<()> {
        if self.open.is_some() {
            return Err(ZipError::InvalidFormat(
                "previous entry is still open",
            ));
        }

        let is_dir = header.is_directory();
        let streamed = !is_dir;
        let zip64 = header.uncompressed_size >= u32::MAX as u64;
        let mut flags = 0u16;
        if streamed {
            flags |= FLAG_DATA_DESCRIPTOR;
        }
        if !header.name.is_ascii() {
            flags |= FLAG_UTF8;
        }

        // Streamed headers defer CRC and sizes to the descriptor.
        let local = LocalFileHeader {
            flags,
            method: header.method.code(),
            crc32: if streamed { 0 } else { header.crc32 },
            compressed_size: 0,
            uncompressed_size: 0,
            name: &header.name,
            zip64,
        };
        let local_header_offset = self.offset;
        let bytes = local.to_bytes();
        self.inner.write_all(&bytes)?;
        self.offset += bytes.len() as u64;

        let mut external_attrs = header.mode << 16;
        if is_dir {
            external_attrs |= MSDOS_DIR_ATTR;
        }
        self.central.push(CentralRecord {
            name: header.name.clone(),
            flags,
            method: header.method.code(),
            crc32: header.crc32,
            compressed_size: 0,
            uncompressed_size: header.uncompressed_size,
            local_header_offset,
            external_attrs,
        });
        self.open = Some(OpenEntry {
            record: self.central.len() - 1,
            streamed,
            zip64,
            compressed: 0,
        });
        Ok(())
    }
}
