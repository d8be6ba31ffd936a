//! Read, write and modify ZIP archives (PKWARE APPNOTE 6.3, ZIP64).
//!
//! The write side streams: entries are appended to a plain byte sink, CRC
//! and sizes are accounted as payloads flow, and data descriptors cover the
//! cases where they cannot be known up front. The read side is random
//! access: the central directory is discovered from the end of the source
//! and every entry can open an independent, validated payload stream.
//!
//! * [`compress::std::archive::ZipArchive`] and
//!   [`compress::tokio::archive::ZipArchive`] are the writers
//! * [`uncompress::ArchiveReader`] is the reader

pub mod archive_common;
pub mod compress;
pub mod compression;
pub mod constants;
pub mod cp437;
pub mod error;
pub mod tools;
pub mod types;
pub mod uncompress;
