use std::mem::size_of;

pub const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x04034b50;
pub const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x08074b50;
pub const CENTRAL_DIRECTORY_ENTRY_SIGNATURE: u32 = 0x02014b50;
pub const CENTRAL_DIRECTORY_END_SIGNATURE: u32 = 0x06054b50;
pub const ZIP64_CENTRAL_DIRECTORY_END_SIGNATURE: u32 = 0x06064b50;
pub const ZIP64_END_OF_CENTRAL_DIR_LOCATOR_SIGNATURE: u32 = 0x07064b50;

pub const FILE_HEADER_BASE_SIZE: u64 = (7 * size_of::<u16>() + 4 * size_of::<u32>()) as u64;
pub const CENTRAL_DIRECTORY_ENTRY_BASE_SIZE: u64 =
    (11 * size_of::<u16>() + 6 * size_of::<u32>()) as u64;
pub const END_OF_CENTRAL_DIRECTORY_SIZE: u64 = (5 * size_of::<u16>() + 3 * size_of::<u32>()) as u64;
pub const ZIP64_END_OF_CENTRAL_DIRECTORY_SIZE: u64 = 56;
pub const ZIP64_END_OF_CENTRAL_DIR_LOCATOR_SIZE: u64 = 20;
pub const ZIP64_DESCRIPTOR_SIZE: u64 = 24;

/// Sentinel stored in a 32-bit size or offset field whose real value lives
/// in the ZIP64 extended information extra field.
pub const ZIP64_SENTINEL: u32 = 0xFFFF_FFFF;
pub const ZIP64_DISK_SENTINEL: u16 = 0xFFFF;

pub const ZIP64_EXTENDED_INFORMATION_ID: u16 = 0x0001;
pub const INFO_ZIP_UNICODE_PATH_ID: u16 = 0x7075;

pub const SPEC_VERSION: u8 = 63;
pub const UNIX: u8 = 3;
pub const VERSION_MADE_BY: u16 = (UNIX as u16) << 8 | SPEC_VERSION as u16;

pub const VERSION_NEEDED_TO_EXTRACT: u16 = 20;
pub const VERSION_USES_ZIP64_FORMAT_EXTENSIONS: u16 = 45;

/// General purpose bit 0: the entry payload is encrypted.
pub const ENCRYPTED_FLAG: u16 = 1;
/// General purpose bit 3: CRC and sizes follow the payload in a data descriptor.
pub const EXTENDED_LOCAL_HEADER_FLAG: u16 = 1 << 3;
/// General purpose bit 6: strong encryption (unsupported).
pub const STRONG_ENCRYPTION_FLAG: u16 = 1 << 6;
/// General purpose bit 11: file name and comment are UTF-8.
pub const UTF8_NAMES_FLAG: u16 = 1 << 11;

pub const MAX_NAME_OR_COMMENT_LENGTH: usize = u16::MAX as usize;
pub const MAX_BUFFER_LENGTH: usize = 0x3FFF_FFFF;

pub const S_IFDIR: u32 = 0o0040000;
pub const S_IFREG: u32 = 0o0100000;
pub const FILE_DEFAULT: u32 = 0o644;
pub const DIR_DEFAULT: u32 = 0o755;
pub const MS_DIR: u32 = 0x10;
