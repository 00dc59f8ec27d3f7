//! PKZIP record signatures and fixed sizes.

pub const LOCAL_HEADER_SIGNATURE: u32 = 0x0403_4b50;
pub const CENTRAL_HEADER_SIGNATURE: u32 = 0x0201_4b50;
pub const EOCD_SIGNATURE: u32 = 0x0605_4b50;
pub const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x0807_4b50;
pub const ZIP64_EOCD_SIGNATURE: u32 = 0x0606_4b50;
pub const ZIP64_EOCD_LOCATOR_SIGNATURE: u32 = 0x0706_4b50;

/// Fixed portion of a local file header, signature included.
pub const LOCAL_HEADER_SIZE: usize = 30;
/// Fixed portion of a central directory header, signature included.
pub const CENTRAL_HEADER_SIZE: usize = 46;
/// End-of-central-directory record without the comment.
pub const EOCD_SIZE: usize = 22;

pub const VERSION_NEEDED_DEFAULT: u16 = 20;
pub const VERSION_NEEDED_ZIP64: u16 = 45;
/// Unix host system, PKZIP version 2.0.
pub const VERSION_MADE_BY_UNIX: u16 = (3 << 8) | 20;

/// Sizes and CRC live in a trailing data descriptor.
pub const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
/// Entry name is UTF-8.
pub const FLAG_UTF8: u16 = 1 << 11;

/// Extra-field id for the ZIP64 extended information block.
pub const ZIP64_EXTRA_ID: u16 = 0x0001;
/// MS-DOS directory bit in external attributes.
pub const MSDOS_DIR_ATTR: u32 = 0x10;
