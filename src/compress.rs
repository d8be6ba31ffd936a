//! Streaming archive producers.
//!
//! The writer exists in two mirrored flavors: [`std::archive::ZipArchive`]
//! over [`std::io::Write`](::std::io::Write) sinks and
//! [`tokio::archive::ZipArchive`] over `tokio::io::AsyncWrite` sinks. Both
//! share the record builders and entry bookkeeping in this module.

#[cfg(feature = "std")]
pub mod std;
#[cfg(feature = "tokio")]
pub mod tokio;

mod common;

pub use common::EntryHandle;

use crate::{
    compression::{CompressionMethod, Level},
    types::FileDateTime,
};

/// Metadata for an entry to be archived.
#[derive(Clone)]
pub struct FileOptions<'a> {
    /// The entry's compression method.
    pub compression_method: CompressionMethod,

    /// The compression method's level.
    pub compression_level: Level,

    /// The entry modification time.
    pub last_modified_time: FileDateTime,

    /// Unix permissions, stored in the high half of the external attributes.
    pub unix_permissions: Option<u32>,

    /// Entry comment.
    pub comment: Option<&'a str>,

    /// Write the entry in ZIP64 format regardless of its size.
    pub force_zip64: bool,

    /// CRC-32 declared by the caller; the produced value must match.
    pub known_crc32: Option<u32>,

    /// Uncompressed size declared by the caller; the produced value must match.
    pub known_uncompressed_size: Option<u64>,

    /// Compressed size declared by the caller; the produced value must match.
    pub known_compressed_size: Option<u64>,
}

impl<'a> FileOptions<'a> {
    /// Set the compression method for the new entry.
    ///
    /// The default is `CompressionMethod::Deflate`.
    pub fn compression_method(mut self, method: CompressionMethod) -> FileOptions<'a> {
        self.compression_method = method;
        self
    }

    /// Set the compression level for the new entry.
    pub fn compression_level(mut self, level: Level) -> FileOptions<'a> {
        self.compression_level = level;
        self
    }

    /// Set the last modified time.
    ///
    /// The default is the current timestamp.
    pub fn last_modified_time(mut self, mod_time: FileDateTime) -> FileOptions<'a> {
        self.last_modified_time = mod_time;
        self
    }

    /// Set the permissions for the new entry, unix style.
    ///
    /// Without this, files get `0o644` and directories `0o755`.
    pub fn unix_permissions(mut self, mode: u32) -> FileOptions<'a> {
        self.unix_permissions = Some(mode);
        self
    }

    /// Set the entry comment.
    pub fn comment(mut self, comment: &'a str) -> FileOptions<'a> {
        self.comment = Some(comment);
        self
    }

    /// Write the entry in ZIP64 format even when its sizes and offset would
    /// fit the narrow fields.
    pub fn force_zip64_format(mut self) -> FileOptions<'a> {
        self.force_zip64 = true;
        self
    }

    /// Declare the payload's CRC-32 up front.
    ///
    /// When the CRC and both sizes are declared, the local header carries
    /// them directly and no data descriptor is written; the values produced
    /// by the write are still checked against the declarations.
    pub fn known_crc32(mut self, crc32: u32) -> FileOptions<'a> {
        self.known_crc32 = Some(crc32);
        self
    }

    /// Declare the payload's uncompressed size up front.
    pub fn known_uncompressed_size(mut self, size: u64) -> FileOptions<'a> {
        self.known_uncompressed_size = Some(size);
        self
    }

    /// Declare the payload's compressed size up front.
    pub fn known_compressed_size(mut self, size: u64) -> FileOptions<'a> {
        self.known_compressed_size = Some(size);
        self
    }

    /// True when the header can be written with final CRC and sizes.
    pub(crate) fn sizes_declared(&self) -> bool {
        self.known_crc32.is_some()
            && self.known_uncompressed_size.is_some()
            && self.known_compressed_size.is_some()
    }
}

impl<'a> Default for FileOptions<'a> {
    fn default() -> Self {
        Self {
            compression_method: CompressionMethod::Deflate(),
            compression_level: Level::Default,
            last_modified_time: FileDateTime::Now,
            unix_permissions: None,
            comment: None,
            force_zip64: false,
            known_crc32: None,
            known_uncompressed_size: None,
            known_compressed_size: None,
        }
    }
}
