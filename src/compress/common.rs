use crate::{
    archive_common::{ArchiveDescriptor, ArchiveFileEntry, CentralDirectoryEnd},
    compression::CompressionMethod,
    constants::{
        CENTRAL_DIRECTORY_ENTRY_BASE_SIZE, CENTRAL_DIRECTORY_ENTRY_SIGNATURE,
        DATA_DESCRIPTOR_SIGNATURE, DIR_DEFAULT, EXTENDED_LOCAL_HEADER_FLAG, FILE_DEFAULT,
        FILE_HEADER_BASE_SIZE, LOCAL_FILE_HEADER_SIGNATURE, MAX_NAME_OR_COMMENT_LENGTH, MS_DIR,
        S_IFDIR, S_IFREG, UTF8_NAMES_FLAG, VERSION_MADE_BY, ZIP64_DESCRIPTOR_SIZE,
        ZIP64_EXTENDED_INFORMATION_ID, ZIP64_SENTINEL,
    },
    error::ArchiveError,
    tools::normalize_archive_path,
};

use super::FileOptions;

macro_rules! compress_common {
    ( $encoder:expr, $hasher:expr, $reader:ident $($_await:tt)*) => {{
        let mut buf = vec![0; 4096];
        let mut total_read: u64 = 0;

        let mut read = $reader.read(&mut buf)$($_await)*?;
        while read != 0 {
            total_read += read as u64;
            $hasher.update(&buf[..read]);
            $encoder.write_all(&buf[..read])$($_await)*?;
            read = $reader.read(&mut buf)$($_await)*?;
        }
        total_read
    }};
}

macro_rules! compress_common_async {
    ( $encoder:expr, $hasher:expr, $reader:ident) => {{
        let total_read = compress_common!($encoder, $hasher, $reader.await);
        $encoder.flush().await?;
        $encoder.shutdown().await?;
        total_read
    }};
}

macro_rules! compress_common_std {
    ( $encoder:expr, $hasher:expr, $reader:ident) => {{
        let total_read = compress_common!($encoder, $hasher, $reader);
        $encoder.finish()?;
        total_read
    }};
}

macro_rules! write_async {
    ( $encoder:expr, $hasher:expr, $reader:ident) => {{
        let total_read = compress_common!($encoder, $hasher, $reader.await);
        $encoder.flush().await?;
        total_read
    }};
}

macro_rules! write_std {
    ( $encoder:expr, $hasher:expr, $reader:ident) => {{
        let total_read = compress_common!($encoder, $hasher, $reader);
        $encoder.flush()?;
        total_read
    }};
}

pub(crate) use compress_common;
#[cfg(feature = "tokio")]
pub(crate) use compress_common_async;
#[cfg(feature = "std")]
pub(crate) use compress_common_std;
#[cfg(feature = "tokio")]
pub(crate) use write_async;
#[cfg(feature = "std")]
pub(crate) use write_std;

/// Identifies an appended entry so it can later be removed from the
/// central directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHandle(usize);

/// Entry list and trailing-record state shared by both writer flavors.
#[derive(Debug, Default)]
pub struct SubZipArchiveData {
    files_info: Vec<Option<ArchiveFileEntry>>,
    pub central_directory_end: CentralDirectoryEnd,
    is_big_archive: bool,
}

impl SubZipArchiveData {
    pub fn set_archive_comment(&mut self, comment: &str) -> Result<(), ArchiveError> {
        self.central_directory_end
            .set_archive_comment(comment.as_bytes())
    }

    pub fn add_archive_file_entry(&mut self, archive_file_entry: ArchiveFileEntry) -> EntryHandle {
        self.is_big_archive |=
            archive_file_entry.force_zip64 || archive_file_entry.central_header_uses_zip64();
        self.files_info.push(Some(archive_file_entry));
        EntryHandle(self.files_info.len() - 1)
    }

    /// Drop an entry from the central directory to come. The entry's bytes
    /// stay in the data area; nothing is rewound.
    pub fn remove_entry(&mut self, handle: EntryHandle) {
        if let Some(slot) = self.files_info.get_mut(handle.0) {
            *slot = None;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArchiveFileEntry> {
        self.files_info.iter().flatten()
    }

    pub fn entry_count(&self) -> u64 {
        self.files_info.iter().flatten().count() as u64
    }
}

/// Assemble the in-memory record for an entry about to be written.
///
/// Validates the path, mode and comment; sizes and CRC are zero until the
/// payload has flowed (or until the caller's declared values are copied in).
pub(crate) fn build_entry(
    archive_path: &str,
    options: &FileOptions,
    is_dir: bool,
    offset: u64,
    sizes_known: bool,
) -> Result<ArchiveFileEntry, ArchiveError> {
    let file_name = normalize_archive_path(archive_path, is_dir)?;

    if let Some(mode) = options.unix_permissions {
        if mode > u16::MAX as u32 {
            return Err(ArchiveError::InvalidMode(mode));
        }
    }

    let file_comment = match options.comment {
        Some(comment) => {
            let bytes = comment.as_bytes().to_owned();
            if bytes.len() > MAX_NAME_OR_COMMENT_LENGTH {
                return Err(ArchiveError::CommentTooLong(bytes.len()));
            }
            Some(bytes)
        }
        None => None,
    };

    let compressor = if is_dir {
        CompressionMethod::Store()
    } else {
        options.compression_method
    };
    compressor.supported()?;

    let mut general_purpose_flags = UTF8_NAMES_FLAG;
    if !sizes_known {
        general_purpose_flags |= EXTENDED_LOCAL_HEADER_FLAG;
    }

    let (date, time) = options.last_modified_time.ms_dos();

    let (unix_ftype, default_permission, ms_dos_attr) = if is_dir {
        (S_IFDIR, DIR_DEFAULT, MS_DIR)
    } else {
        (S_IFREG, FILE_DEFAULT, 0)
    };
    let unix_permissions = match options.unix_permissions {
        Some(permissions) => permissions | unix_ftype,
        None => unix_ftype | default_permission,
    };
    let external_file_attributes = (unix_permissions << 16) + ms_dos_attr;

    Ok(ArchiveFileEntry {
        general_purpose_flags,
        compressor,
        last_mod_file_time: time,
        last_mod_file_date: date,
        crc32: 0,
        compressed_size: 0,
        uncompressed_size: 0,
        file_name_as_bytes: file_name.into_bytes(),
        file_comment,
        internal_file_attributes: 0,
        external_file_attributes,
        offset,
        sizes_known,
        force_zip64: options.force_zip64,
    })
}

/// Rebuild a writer-side record from an entry read out of another archive.
///
/// Name and comment honor the source's UTF-8 bit (CP437 otherwise) and are
/// re-emitted as UTF-8. The streamed and encrypted bits are preserved: a
/// source entry that carried a data descriptor gets a fresh one from the
/// re-observed sizes.
pub(crate) fn build_entry_from_source(
    source: &crate::uncompress::ArchiveEntry,
    offset: u64,
) -> Result<ArchiveFileEntry, ArchiveError> {
    let file_name_as_bytes = reclaim_text(&source.file_name_raw, source.general_purpose_flags);
    if file_name_as_bytes.len() > MAX_NAME_OR_COMMENT_LENGTH {
        return Err(ArchiveError::NameTooLong(file_name_as_bytes.len()));
    }

    let file_comment = if source.file_comment_raw.is_empty() {
        None
    } else {
        let bytes = reclaim_text(&source.file_comment_raw, source.general_purpose_flags);
        if bytes.len() > MAX_NAME_OR_COMMENT_LENGTH {
            return Err(ArchiveError::CommentTooLong(bytes.len()));
        }
        Some(bytes)
    };

    let preserved =
        source.general_purpose_flags & (EXTENDED_LOCAL_HEADER_FLAG | crate::constants::ENCRYPTED_FLAG);
    let sizes_known = preserved & EXTENDED_LOCAL_HEADER_FLAG == 0;

    Ok(ArchiveFileEntry {
        general_purpose_flags: UTF8_NAMES_FLAG | preserved,
        compressor: source.compressor,
        last_mod_file_time: source.last_mod_file_time,
        last_mod_file_date: source.last_mod_file_date,
        crc32: source.crc32,
        compressed_size: source.compressed_size,
        uncompressed_size: source.uncompressed_size,
        file_name_as_bytes,
        file_comment,
        internal_file_attributes: source.internal_file_attributes,
        external_file_attributes: source.external_file_attributes,
        offset,
        sizes_known,
        force_zip64: false,
    })
}

fn reclaim_text(raw: &[u8], general_purpose_flags: u16) -> Vec<u8> {
    if general_purpose_flags & UTF8_NAMES_FLAG != 0 {
        raw.to_vec()
    } else {
        crate::cp437::decode(raw).into_bytes()
    }
}

pub(crate) fn build_local_file_header(entry: &ArchiveFileEntry) -> ArchiveDescriptor {
    let zip64 = entry.local_header_uses_zip64();

    let (crc32, compressed, uncompressed) = if entry.sizes_known {
        (
            entry.crc32,
            entry.compressed_size,
            entry.uncompressed_size,
        )
    } else {
        (0, 0, 0)
    };

    let (compressed32, uncompressed32, extra_field_length) = if zip64 {
        (ZIP64_SENTINEL, ZIP64_SENTINEL, 20u16)
    } else {
        (compressed as u32, uncompressed as u32, 0)
    };

    let mut file_header =
        ArchiveDescriptor::new(FILE_HEADER_BASE_SIZE + entry.file_name_len() as u64 + 20);
    file_header.write_u32(LOCAL_FILE_HEADER_SIGNATURE);
    file_header.write_u16(entry.version_needed_to_extract(zip64));
    file_header.write_u16(entry.general_purpose_flags);
    file_header.write_u16(entry.compression_method());
    file_header.write_u16(entry.last_mod_file_time);
    file_header.write_u16(entry.last_mod_file_date);
    file_header.write_u32(crc32);
    file_header.write_u32(compressed32);
    file_header.write_u32(uncompressed32);
    file_header.write_u16(entry.file_name_len());
    file_header.write_u16(extra_field_length);
    file_header.write_bytes(&entry.file_name_as_bytes);

    if zip64 {
        file_header.write_u16(ZIP64_EXTENDED_INFORMATION_ID);
        file_header.write_u16(16);
        file_header.write_u64(uncompressed);
        file_header.write_u64(compressed);
    }

    file_header
}

/// A ZIP64 data descriptor; streamed entries are always promoted to ZIP64
/// form, so the narrow variant is never produced.
pub(crate) fn build_data_descriptor(entry: &ArchiveFileEntry) -> ArchiveDescriptor {
    let mut file_descriptor = ArchiveDescriptor::new(ZIP64_DESCRIPTOR_SIZE);
    file_descriptor.write_u32(DATA_DESCRIPTOR_SIGNATURE);
    file_descriptor.write_u32(entry.crc32);
    file_descriptor.write_u64(entry.compressed_size);
    file_descriptor.write_u64(entry.uncompressed_size);
    file_descriptor
}

pub(crate) fn build_central_directory_file_header(
    central_directory_header: &mut ArchiveDescriptor,
    entry: &ArchiveFileEntry,
) {
    let zip64 = entry.central_header_uses_zip64();

    let (compressed32, uncompressed32, offset32, extra_field_length) = if zip64 {
        (ZIP64_SENTINEL, ZIP64_SENTINEL, ZIP64_SENTINEL, 28u16)
    } else {
        (
            entry.compressed_size as u32,
            entry.uncompressed_size as u32,
            entry.offset as u32,
            0,
        )
    };

    central_directory_header.write_u32(CENTRAL_DIRECTORY_ENTRY_SIGNATURE);
    central_directory_header.write_u16(VERSION_MADE_BY);
    central_directory_header.write_u16(entry.version_needed_to_extract(zip64));
    central_directory_header.write_u16(entry.general_purpose_flags);
    central_directory_header.write_u16(entry.compression_method());
    central_directory_header.write_u16(entry.last_mod_file_time);
    central_directory_header.write_u16(entry.last_mod_file_date);
    central_directory_header.write_u32(entry.crc32);
    central_directory_header.write_u32(compressed32);
    central_directory_header.write_u32(uncompressed32);
    central_directory_header.write_u16(entry.file_name_len());
    central_directory_header.write_u16(extra_field_length);
    central_directory_header.write_u16(entry.file_comment_length());
    central_directory_header.write_u16(0); // disk number start
    central_directory_header.write_u16(entry.internal_file_attributes);
    central_directory_header.write_u32(entry.external_file_attributes);
    central_directory_header.write_u32(offset32);
    central_directory_header.write_bytes(&entry.file_name_as_bytes);

    if zip64 {
        central_directory_header.write_u16(ZIP64_EXTENDED_INFORMATION_ID);
        central_directory_header.write_u16(24);
        central_directory_header.write_u64(entry.uncompressed_size);
        central_directory_header.write_u64(entry.compressed_size);
        central_directory_header.write_u64(entry.offset);
    }

    if let Some(comment) = &entry.file_comment {
        central_directory_header.write_bytes(comment);
    }
}

pub(crate) fn build_central_directory_end(
    data: &mut SubZipArchiveData,
    central_directory_offset: u64,
    central_directory_size: u64,
) -> ArchiveDescriptor {
    data.central_directory_end.total_number_of_entries = data.entry_count();
    data.central_directory_end.central_directory_size = central_directory_size;
    data.central_directory_end
        .offset_of_start_of_central_directory = central_directory_offset;

    let mut end_of_central_directory =
        ArchiveDescriptor::new(CENTRAL_DIRECTORY_ENTRY_BASE_SIZE + 100);

    if data.central_directory_end.needs_zip64_format_extensions() || data.is_big_archive {
        // [zip64 end of central directory record]
        // [zip64 end of central directory locator]
        let zip64_record_offset = central_directory_offset + central_directory_size;
        data.central_directory_end
            .create_zip64_end_of_central_directory_record(&mut end_of_central_directory);
        data.central_directory_end
            .create_end_of_central_directory_locator(
                zip64_record_offset,
                &mut end_of_central_directory,
            );
    }

    // 4.4.1.5  The end of central directory record and the Zip64 end
    // of central directory locator record MUST reside on the same
    // disk when splitting or spanning an archive.
    data.central_directory_end
        .create_end_of_central_directory(&mut end_of_central_directory);

    end_of_central_directory
}

/// Compare the values produced by the write against the caller's
/// declarations, when there were any.
pub(crate) fn verify_declared_values(
    options: &FileOptions,
    entry: &ArchiveFileEntry,
) -> Result<(), ArchiveError> {
    if let Some(expected) = options.known_crc32 {
        if expected != entry.crc32 {
            return Err(ArchiveError::CrcMismatch {
                expected,
                actual: entry.crc32,
            });
        }
    }
    if let Some(expected) = options.known_uncompressed_size {
        if expected != entry.uncompressed_size {
            return Err(ArchiveError::SizeMismatch {
                field: "uncompressed size",
                expected,
                actual: entry.uncompressed_size,
            });
        }
    }
    if let Some(expected) = options.known_compressed_size {
        if expected != entry.compressed_size {
            return Err(ArchiveError::SizeMismatch {
                field: "compressed size",
                expected,
                actual: entry.compressed_size,
            });
        }
    }
    Ok(())
}
