use crate::types::{BUILD_DOS_DATE, BUILD_DOS_TIME};

use super::consts::{
    CENTRAL_HEADER_SIGNATURE, CENTRAL_HEADER_SIZE, DATA_DESCRIPTOR_SIGNATURE, EOCD_SIGNATURE,
    EOCD_SIZE, LOCAL_HEADER_SIGNATURE, LOCAL_HEADER_SIZE, VERSION_MADE_BY_UNIX,
    VERSION_NEEDED_DEFAULT, VERSION_NEEDED_ZIP64, ZIP64_EOCD_LOCATOR_SIGNATURE,
    ZIP64_EOCD_SIGNATURE, ZIP64_EXTRA_ID,
};

/// Local file header record.
///
/// Streamed entries carry zero CRC and sizes here; the real values follow in
/// the data descriptor and the central directory.
#[derive(Debug, Clone)]
pub struct LocalFileHeader<'a> {
    pub flags: u16,
    pub method: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub name: &'a str,
    pub zip64: bool,
}

impl LocalFileHeader<'_> {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(LOCAL_HEADER_SIZE + self.name.len());
        bytes.extend_from_slice(&LOCAL_HEADER_SIGNATURE.to_le_bytes());
        bytes.extend_from_slice(&self.version_needed().to_le_bytes());
        bytes.extend_from_slice(&self.flags.to_le_bytes());
        bytes.extend_from_slice(&self.method.to_le_bytes());
        bytes.extend_from_slice(&BUILD_DOS_TIME.to_le_bytes());
        bytes.extend_from_slice(&BUILD_DOS_DATE.to_le_bytes());
        bytes.extend_from_slice(&self.crc32.to_le_bytes());
        bytes.extend_from_slice(&self.compressed_size.to_le_bytes());
        bytes.extend_from_slice(&self.uncompressed_size.to_le_bytes());
        bytes.extend_from_slice(&(self.name.len() as u16).to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(self.name.as_bytes());
        bytes
    }

    fn version_needed(&self) -> u16 {
        if self.zip64 {
            VERSION_NEEDED_ZIP64
        } else {
            VERSION_NEEDED_DEFAULT
        }
    }
}

/// Trailing data descriptor for a streamed entry.
///
/// Sizes widen to 64 bits when the entry is ZIP64.
#[derive(Debug, Clone, Copy)]
pub struct DataDescriptor {
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub zip64: bool,
}

impl DataDescriptor {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(24);
        bytes.extend_from_slice(&DATA_DESCRIPTOR_SIGNATURE.to_le_bytes());
        bytes.extend_from_slice(&self.crc32.to_le_bytes());
        if self.zip64 {
            bytes.extend_from_slice(&self.compressed_size.to_le_bytes());
            bytes.extend_from_slice(&self.uncompressed_size.to_le_bytes());
        } else {
            bytes.extend_from_slice(&(self.compressed_size as u32).to_le_bytes());
            bytes.extend_from_slice(&(self.uncompressed_size as u32).to_le_bytes());
        }
        bytes
    }
}

/// Central directory header retained until [`close`](super::ZipStreamWriter::close).
#[derive(Debug, Clone)]
pub struct CentralRecord {
    pub name: String,
    pub flags: u16,
    pub method: u16,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub local_header_offset: u64,
    pub external_attrs: u32,
}

impl CentralRecord {
    pub fn needs_zip64(&self) -> bool {
        self.compressed_size >= u32::MAX as u64
            || self.uncompressed_size >= u32::MAX as u64
            || self.local_header_offset >= u32::MAX as u64
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let zip64 = self.needs_zip64();
        let extra = if zip64 { self.zip64_extra() } else { Vec::new() };
        let version_needed = if zip64 {
            VERSION_NEEDED_ZIP64
        } else {
            VERSION_NEEDED_DEFAULT
        };
        // Every field mirrored into the zip64 extra must read as the
        // sentinel in the fixed record.
        let (compressed, uncompressed, offset) = if zip64 {
            (u32::MAX, u32::MAX, u32::MAX)
        } else {
            (
                self.compressed_size as u32,
                self.uncompressed_size as u32,
                self.local_header_offset as u32,
            )
        };

        let mut bytes = Vec::with_capacity(CENTRAL_HEADER_SIZE + self.name.len() + extra.len());
        bytes.extend_from_slice(&CENTRAL_HEADER_SIGNATURE.to_le_bytes());
        bytes.extend_from_slice(&VERSION_MADE_BY_UNIX.to_le_bytes());
        bytes.extend_from_slice(&version_needed.to_le_bytes());
        bytes.extend_from_slice(&self.flags.to_le_bytes());
        bytes.extend_from_slice(&self.method.to_le_bytes());
        bytes.extend_from_slice(&BUILD_DOS_TIME.to_le_bytes());
        bytes.extend_from_slice(&BUILD_DOS_DATE.to_le_bytes());
        bytes.extend_from_slice(&self.crc32.to_le_bytes());
        bytes.extend_from_slice(&compressed.to_le_bytes());
        bytes.extend_from_slice(&uncompressed.to_le_bytes());
        bytes.extend_from_slice(&(self.name.len() as u16).to_le_bytes());
        bytes.extend_from_slice(&(extra.len() as u16).to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes()); // comment length
        bytes.extend_from_slice(&0u16.to_le_bytes()); // disk number start
        bytes.extend_from_slice(&0u16.to_le_bytes()); // internal attributes
        bytes.extend_from_slice(&self.external_attrs.to_le_bytes());
        bytes.extend_from_slice(&offset.to_le_bytes());
        bytes.extend_from_slice(self.name.as_bytes());
        bytes.extend_from_slice(&extra);
        bytes
    }

    fn zip64_extra(&self) -> Vec<u8> {
        let mut extra = Vec::with_capacity(4 + 24);
        extra.extend_from_slice(&ZIP64_EXTRA_ID.to_le_bytes());
        extra.extend_from_slice(&24u16.to_le_bytes());
        extra.extend_from_slice(&self.uncompressed_size.to_le_bytes());
        extra.extend_from_slice(&self.compressed_size.to_le_bytes());
        extra.extend_from_slice(&self.local_header_offset.to_le_bytes());
        extra
    }
}

/// End-of-central-directory record, with the ZIP64 record and locator
/// prepended when any of its fields overflow the legacy widths.
#[derive(Debug, Clone, Copy)]
pub struct EndOfCentralDirectory {
    pub entry_count: u64,
    pub central_size: u64,
    pub central_offset: u64,
}

impl EndOfCentralDirectory {
    fn needs_zip64(&self) -> bool {
        self.entry_count >= u16::MAX as u64
            || self.central_size >= u32::MAX as u64
            || self.central_offset >= u32::MAX as u64
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(EOCD_SIZE);
        if self.needs_zip64() {
            let zip64_offset = self.central_offset + self.central_size;

            bytes.extend_from_slice(&ZIP64_EOCD_SIGNATURE.to_le_bytes());
            bytes.extend_from_slice(&44u64.to_le_bytes()); // record size after this field
            bytes.extend_from_slice(&VERSION_MADE_BY_UNIX.to_le_bytes());
            bytes.extend_from_slice(&VERSION_NEEDED_ZIP64.to_le_bytes());
            bytes.extend_from_slice(&0u32.to_le_bytes()); // this disk
            bytes.extend_from_slice(&0u32.to_le_bytes()); // central directory disk
            bytes.extend_from_slice(&self.entry_count.to_le_bytes());
            bytes.extend_from_slice(&self.entry_count.to_le_bytes());
            bytes.extend_from_slice(&self.central_size.to_le_bytes());
            bytes.extend_from_slice(&self.central_offset.to_le_bytes());

            bytes.extend_from_slice(&ZIP64_EOCD_LOCATOR_SIGNATURE.to_le_bytes());
            bytes.extend_from_slice(&0u32.to_le_bytes()); // zip64 eocd disk
            bytes.extend_from_slice(&zip64_offset.to_le_bytes());
            bytes.extend_from_slice(&1u32.to_le_bytes()); // total disks
        }

        bytes.extend_from_slice(&EOCD_SIGNATURE.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes()); // this disk
        bytes.extend_from_slice(&0u16.to_le_bytes()); // central directory disk
        bytes.extend_from_slice(&clamp_u16(self.entry_count).to_le_bytes());
        bytes.extend_from_slice(&clamp_u16(self.entry_count).to_le_bytes());
        bytes.extend_from_slice(&clamp_u32(self.central_size).to_le_bytes());
        bytes.extend_from_slice(&clamp_u32(self.central_offset).to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes()); // comment length
        bytes
    }
}

fn clamp_u32(value: u64) -> u32 {
    if value >= u32::MAX as u64 {
        u32::MAX
    } else {
        value as u32
    }
}

fn clamp_u16(value: u64) -> u16 {
    if value >= u16::MAX as u64 {
        u16::MAX
    } else {
        value as u16
    }
}
