use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crc32fast::Hasher;
use flate2::write::DeflateEncoder;

use super::compressor::compress;
use super::write_wrapper::WriteWrapper;
use crate::archive_common::ArchiveDescriptor;
use crate::compress::common::{
    build_central_directory_end, build_central_directory_file_header, build_data_descriptor,
    build_entry, build_entry_from_source, build_local_file_header, verify_declared_values,
    EntryHandle, SubZipArchiveData,
};
use crate::compress::FileOptions;
use crate::compression::{CompressionMethod, Level};
use crate::constants::{CENTRAL_DIRECTORY_ENTRY_BASE_SIZE, MAX_BUFFER_LENGTH};
use crate::error::ArchiveError;
use crate::types::{DateTimeCS, FileDateTime};
use crate::uncompress::ArchiveEntry;

/// A zip archive under construction over a [`Write`] sink.
///
/// Entries are appended one by one; `&mut self` exclusivity keeps entry
/// writes strictly ordered, and every byte pushed to the sink advances the
/// archive cursor by exactly that count. [`finalize`](Self::finalize)
/// commits the central directory and consumes the writer, so nothing can be
/// appended to a finished archive.
///
/// # Features
///
/// Requires the `std` feature. A mirrored `tokio` flavor exists for async
/// sinks.
pub struct ZipArchive<W: Write> {
    sink: WriteWrapper<W>,
    data: SubZipArchiveData,
    failed: bool,
}

impl<W: Write> ZipArchive<W> {
    /// Create a new zip archive writing headers and payloads to `sink`.
    pub fn new(sink: W) -> Self {
        Self::with_cursor(sink, 0)
    }

    /// Create a writer whose cursor starts at `cursor` instead of zero.
    ///
    /// For appending to a sink that already holds that many bytes of
    /// archive data, e.g. re-registering the entries of an existing file
    /// and emitting a fresh central directory after them.
    pub fn with_cursor(sink: W, cursor: u64) -> Self {
        Self {
            sink: WriteWrapper::with_count(sink, cursor),
            data: SubZipArchiveData::default(),
            failed: false,
        }
    }

    /// The archive cursor: total bytes of archive this writer accounts for.
    pub fn get_archive_size(&self) -> u64 {
        self.sink.get_written_bytes_count()
    }

    /// Set the archive comment.
    ///
    /// Fails when the comment exceeds 65535 bytes or contains the
    /// end-of-central-directory signature.
    pub fn set_archive_comment(&mut self, comment: &str) -> Result<(), ArchiveError> {
        self.data.set_archive_comment(comment)
    }

    /// Emit ZIP64 trailing records and sentinel fields regardless of size.
    pub fn force_zip64_format(&mut self) {
        self.data.central_directory_end.force_zip64 = true;
    }

    fn ensure_usable(&self) -> Result<(), ArchiveError> {
        if self.failed {
            return Err(ArchiveError::BadArchiveStructure(
                "the writer failed on an earlier entry".to_owned(),
            ));
        }
        Ok(())
    }

    /// Append an entry from an in-memory buffer.
    ///
    /// CRC and sizes are computed (and the payload deflated) before any
    /// header byte goes out, so the entry never needs a data descriptor.
    pub fn append_buffer(
        &mut self,
        file_name: &str,
        payload: &[u8],
        options: &FileOptions,
    ) -> Result<EntryHandle, ArchiveError> {
        self.ensure_usable()?;

        if payload.len() > MAX_BUFFER_LENGTH {
            return Err(ArchiveError::BufferTooLarge(payload.len()));
        }

        let offset = self.sink.get_written_bytes_count();
        let mut entry = build_entry(file_name, options, false, offset, true)?;
        entry.crc32 = crc32fast::hash(payload);
        entry.uncompressed_size = payload.len() as u64;

        let deflated = match entry.compressor {
            CompressionMethod::Deflate() => {
                let mut encoder =
                    DeflateEncoder::new(Vec::new(), options.compression_level.into());
                encoder.write_all(payload)?;
                Some(encoder.finish()?)
            }
            _ => None,
        };
        let body = deflated.as_deref().unwrap_or(payload);
        entry.compressed_size = body.len() as u64;

        verify_declared_values(options, &entry)?;

        let file_header = build_local_file_header(&entry);
        let result = self
            .sink
            .write_all(file_header.buffer())
            .and_then(|_| self.sink.write_all(body))
            .map_err(ArchiveError::from);
        self.poison_on_error(result)?;

        Ok(self.data.add_archive_file_entry(entry))
    }

    /// Append an entry whose payload comes from a [`Read`] stream.
    ///
    /// Unless the caller declared CRC and both sizes up front, the local
    /// header goes out with unknown sizes and a ZIP64 data descriptor
    /// follows the payload. Declared values are checked against what the
    /// stream actually produced.
    pub fn append_stream<R: Read>(
        &mut self,
        file_name: &str,
        payload: &mut R,
        options: &FileOptions,
    ) -> Result<EntryHandle, ArchiveError> {
        self.ensure_usable()?;

        let sizes_known = options.sizes_declared();
        let offset = self.sink.get_written_bytes_count();
        let mut entry = build_entry(file_name, options, false, offset, sizes_known)?;
        if sizes_known {
            entry.crc32 = options.known_crc32.unwrap_or(0);
            entry.uncompressed_size = options.known_uncompressed_size.unwrap_or(0);
            entry.compressed_size = options.known_compressed_size.unwrap_or(0);
        }

        let result = self.write_entry_body(&mut entry, payload, options);
        self.poison_on_error(result)?;

        Ok(self.data.add_archive_file_entry(entry))
    }

    fn write_entry_body<R: Read>(
        &mut self,
        entry: &mut crate::archive_common::ArchiveFileEntry,
        payload: &mut R,
        options: &FileOptions,
    ) -> Result<(), ArchiveError> {
        let file_header = build_local_file_header(entry);
        self.sink.write_all(file_header.buffer())?;

        let payload_begin = self.sink.get_written_bytes_count();
        let mut hasher = Hasher::new();
        let uncompressed_size = compress(
            entry.compressor,
            &mut self.sink,
            payload,
            &mut hasher,
            options.compression_level,
        )?;
        let compressed_size = self.sink.get_written_bytes_count() - payload_begin;

        entry.crc32 = hasher.finalize();
        entry.uncompressed_size = uncompressed_size;
        entry.compressed_size = compressed_size;

        verify_declared_values(options, entry)?;

        if entry.is_streamed() {
            let file_descriptor = build_data_descriptor(entry);
            self.sink.write_all(file_descriptor.buffer())?;
        }
        Ok(())
    }

    /// Open a file on disk and append it as an entry.
    ///
    /// With `FileDateTime::None` the entry timestamp comes from the file's
    /// own modification time; without explicit permissions the file's mode
    /// is carried over where the platform exposes one.
    pub fn append_path<P: AsRef<Path>>(
        &mut self,
        path: P,
        file_name: &str,
        options: &FileOptions,
    ) -> Result<EntryHandle, ArchiveError> {
        let mut file = File::open(path)?;
        let metadata = file.metadata()?;

        let mut options = options.clone();
        if options.last_modified_time == FileDateTime::None {
            if let Ok(modified) = metadata.modified() {
                let utc: chrono::DateTime<chrono::Utc> = modified.into();
                options.last_modified_time =
                    FileDateTime::Custom(DateTimeCS::from_chrono_datetime(utc));
            }
        }
        #[cfg(unix)]
        if options.unix_permissions.is_none() {
            use std::os::unix::fs::PermissionsExt;
            options.unix_permissions = Some(metadata.permissions().mode() & 0xFFFF);
        }

        self.append_stream(file_name, &mut file, &options)
    }

    /// Append a directory entry: stored, no payload, trailing `/` enforced.
    pub fn append_directory(
        &mut self,
        file_name: &str,
        options: &FileOptions,
    ) -> Result<EntryHandle, ArchiveError> {
        self.ensure_usable()?;

        let offset = self.sink.get_written_bytes_count();
        let entry = build_entry(file_name, options, true, offset, true)?;

        let file_header = build_local_file_header(&entry);
        let result = self
            .sink
            .write_all(file_header.buffer())
            .map_err(ArchiveError::from);
        self.poison_on_error(result)?;

        Ok(self.data.add_archive_file_entry(entry))
    }

    /// Re-register an entry of an existing archive without rewriting its
    /// bytes.
    ///
    /// The entry keeps its original local-header offset; combine with
    /// [`with_cursor`](Self::with_cursor) to emit a fresh central directory
    /// after the existing data area.
    pub fn register_entry(&mut self, source: &ArchiveEntry) -> Result<EntryHandle, ArchiveError> {
        self.ensure_usable()?;
        let entry = build_entry_from_source(source, source.offset)?;
        Ok(self.data.add_archive_file_entry(entry))
    }

    /// Append an entry copied from another archive, payload supplied as the
    /// source's raw (compressed) byte stream.
    ///
    /// The payload is not re-encoded. The observed byte count must equal
    /// the source's compressed size, and for stored entries the raw CRC
    /// must match the source's CRC.
    pub fn append_entry<R: Read>(
        &mut self,
        source: &ArchiveEntry,
        payload: &mut R,
    ) -> Result<EntryHandle, ArchiveError> {
        self.ensure_usable()?;

        let offset = self.sink.get_written_bytes_count();
        let mut entry = build_entry_from_source(source, offset)?;

        let result = self.copy_entry_body(&mut entry, payload);
        self.poison_on_error(result)?;

        Ok(self.data.add_archive_file_entry(entry))
    }

    fn copy_entry_body<R: Read>(
        &mut self,
        entry: &mut crate::archive_common::ArchiveFileEntry,
        payload: &mut R,
    ) -> Result<(), ArchiveError> {
        let file_header = build_local_file_header(entry);
        self.sink.write_all(file_header.buffer())?;

        let mut hasher = Hasher::new();
        let copied = compress(
            CompressionMethod::Store(),
            &mut self.sink,
            payload,
            &mut hasher,
            Level::Default,
        )?;

        if copied != entry.compressed_size {
            return Err(ArchiveError::SizeMismatch {
                field: "compressed size",
                expected: entry.compressed_size,
                actual: copied,
            });
        }
        // Stored plaintext is its own uncompressed form, so the CRC can be
        // re-checked against the central directory.
        if entry.compressor == CompressionMethod::Store()
            && entry.general_purpose_flags & crate::constants::ENCRYPTED_FLAG == 0
        {
            let actual = hasher.finalize();
            if actual != entry.crc32 {
                return Err(ArchiveError::CrcMismatch {
                    expected: entry.crc32,
                    actual,
                });
            }
        }

        if entry.is_streamed() {
            let file_descriptor = build_data_descriptor(entry);
            self.sink.write_all(file_descriptor.buffer())?;
        }
        Ok(())
    }

    /// Drop a previously appended entry from the central directory to come.
    ///
    /// The output is not rewound; a removed entry's bytes stay in the data
    /// area as dead weight.
    pub fn remove_entry(&mut self, handle: EntryHandle) {
        self.data.remove_entry(handle);
    }

    fn poison_on_error<T>(&mut self, result: Result<T, ArchiveError>) -> Result<T, ArchiveError> {
        if result.is_err() {
            self.failed = true;
        }
        result
    }

    /// Write the central directory and the trailing records, flush, and
    /// hand the sink back.
    ///
    /// Returns the final archive size alongside the sink. Consuming `self`
    /// is what makes appending to a finished archive impossible.
    pub fn finalize(mut self) -> Result<(u64, W), ArchiveError> {
        self.ensure_usable()?;

        let central_directory_offset = self.sink.get_written_bytes_count();

        let mut central_directory_header =
            ArchiveDescriptor::new(CENTRAL_DIRECTORY_ENTRY_BASE_SIZE + 200);
        for file_info in self.data.iter() {
            build_central_directory_file_header(&mut central_directory_header, file_info);
            self.sink.write_all(central_directory_header.buffer())?;
            central_directory_header.clear();
        }

        let central_directory_size =
            self.sink.get_written_bytes_count() - central_directory_offset;

        let end_of_central_directory = build_central_directory_end(
            &mut self.data,
            central_directory_offset,
            central_directory_size,
        );
        self.sink.write_all(end_of_central_directory.buffer())?;
        self.sink.flush()?;

        Ok((
            self.sink.get_written_bytes_count(),
            self.sink.retrieve_writer(),
        ))
    }
}
