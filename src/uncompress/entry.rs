use crate::compression::CompressionMethod;
use crate::constants::{ENCRYPTED_FLAG, EXTENDED_LOCAL_HEADER_FLAG};
use crate::types::DateTimeCS;

/// One central-directory entry, sizes and offset already promoted from the
/// ZIP64 extra field where the stored 32-bit values were sentinels.
///
/// Raw name and comment bytes are always retained; the decoded strings are
/// present when the reader was asked to decode (UTF-8 when the entry's
/// UTF-8 bit is set, CP437 otherwise, with the Info-ZIP unicode path field
/// taking precedence when its CRC checks out).
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub version_made_by: u16,
    pub version_needed: u16,
    pub general_purpose_flags: u16,
    pub compression_method: u16,
    pub compressor: CompressionMethod,
    pub last_mod_file_time: u16,
    pub last_mod_file_date: u16,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub disk_number_start: u32,
    pub internal_file_attributes: u16,
    pub external_file_attributes: u32,
    /// Offset of the entry's local file header from the start of the
    /// archive.
    pub offset: u64,
    pub file_name_raw: Vec<u8>,
    pub file_comment_raw: Vec<u8>,
    pub file_name: Option<String>,
    pub file_comment: Option<String>,
}

impl ArchiveEntry {
    pub fn is_encrypted(&self) -> bool {
        self.general_purpose_flags & ENCRYPTED_FLAG != 0
    }

    /// True when the entry was written with a trailing data descriptor.
    pub fn is_streamed(&self) -> bool {
        self.general_purpose_flags & EXTENDED_LOCAL_HEADER_FLAG != 0
    }

    pub fn is_directory(&self) -> bool {
        self.file_name_raw.last() == Some(&b'/')
    }

    /// Whether the payload is compressed: `Some(false)` for stored,
    /// `Some(true)` for deflate, `None` for any other method (no
    /// decompression or validation is offered for those).
    pub fn compressed(&self) -> Option<bool> {
        match self.compressor {
            CompressionMethod::Store() => Some(false),
            CompressionMethod::Deflate() => Some(true),
            CompressionMethod::Unknown(_) => None,
        }
    }

    pub fn last_modified(&self) -> DateTimeCS {
        DateTimeCS::from_msdos(self.last_mod_file_date, self.last_mod_file_time)
    }

    /// The decoded name, or a lossy rendition of the raw bytes when the
    /// reader left strings raw.
    pub fn name(&self) -> String {
        match &self.file_name {
            Some(name) => name.clone(),
            None => String::from_utf8_lossy(&self.file_name_raw).into_owned(),
        }
    }

    pub fn unix_mode(&self) -> u16 {
        (self.external_file_attributes >> 16) as u16
    }
}
