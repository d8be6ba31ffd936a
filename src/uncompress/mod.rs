//! Random-access archive reading.
//!
//! A ZIP archive is read from the end: the end-of-central-directory record
//! is found by a bounded backward scan of the file tail, promoted to its
//! ZIP64 twin when its sentinel fields demand it, and the central directory
//! it points at is walked lazily, one entry per step. Each entry can open
//! its payload as a stream: a ranged read over the source, optionally
//! inflated, optionally validated against the recorded CRC and size.

mod entry;
mod entry_reader;
mod source;

pub use entry::ArchiveEntry;
pub use entry_reader::{EntryReadOptions, EntryReader};
pub use source::RandomAccess;

use byteorder::{ByteOrder, LittleEndian};
use flate2::read::DeflateDecoder;

use crate::archive_common::{extra_fields, ArchiveDescriptorReader};
use crate::compression::CompressionMethod;
use crate::constants::{
    CENTRAL_DIRECTORY_ENTRY_BASE_SIZE, CENTRAL_DIRECTORY_ENTRY_SIGNATURE,
    CENTRAL_DIRECTORY_END_SIGNATURE, END_OF_CENTRAL_DIRECTORY_SIZE, FILE_HEADER_BASE_SIZE,
    INFO_ZIP_UNICODE_PATH_ID, LOCAL_FILE_HEADER_SIGNATURE, STRONG_ENCRYPTION_FLAG,
    UTF8_NAMES_FLAG, ZIP64_CENTRAL_DIRECTORY_END_SIGNATURE, ZIP64_DISK_SENTINEL,
    ZIP64_END_OF_CENTRAL_DIRECTORY_SIZE, ZIP64_END_OF_CENTRAL_DIR_LOCATOR_SIGNATURE,
    ZIP64_END_OF_CENTRAL_DIR_LOCATOR_SIZE, ZIP64_EXTENDED_INFORMATION_ID, ZIP64_SENTINEL,
};
use crate::cp437;
use crate::error::ArchiveError;
use entry_reader::{RangeReader, ValidatingReader};
use source::read_fully;

/// Reader-level switches.
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// Decode entry names and comments (UTF-8 or CP437 per the entry's
    /// flags). When off, only the raw bytes are surfaced.
    pub decode_strings: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            decode_strings: true,
        }
    }
}

/// An opened archive over a random-access source.
///
/// Holds the resolved central-directory location and the archive comment;
/// entry metadata is parsed lazily by [`entries`](Self::entries).
#[derive(Debug)]
pub struct ArchiveReader<R: RandomAccess> {
    source: R,
    file_size: u64,
    entry_count: u64,
    central_directory_offset: u64,
    archive_comment: Vec<u8>,
    decode_strings: bool,
}

impl<R: RandomAccess> ArchiveReader<R> {
    /// Open an archive, decoding entry names and comments.
    pub fn new(source: R) -> Result<ArchiveReader<R>, ArchiveError> {
        Self::with_options(source, ReaderOptions::default())
    }

    /// Open an archive.
    ///
    /// Locates the end-of-central-directory record in the trailing
    /// `min(file size, 22 + 65535)` bytes: scanning backwards, a signature
    /// match only counts when its comment-length word accounts for exactly
    /// the bytes that follow it. The format is ambiguous when the comment
    /// itself contains a plausible record, and the last such match in the
    /// file is the one every common decoder picks.
    pub fn with_options(
        source: R,
        options: ReaderOptions,
    ) -> Result<ArchiveReader<R>, ArchiveError> {
        let file_size = source.len()?;
        if file_size < END_OF_CENTRAL_DIRECTORY_SIZE {
            return Err(ArchiveError::BadArchiveStructure(
                "too small to hold an end of central directory record".to_owned(),
            ));
        }

        let window_len = file_size.min(END_OF_CENTRAL_DIRECTORY_SIZE + u16::MAX as u64);
        let window_start = file_size - window_len;
        let window = read_fully(&source, window_start, window_len as usize)?;

        let signature = CENTRAL_DIRECTORY_END_SIGNATURE.to_le_bytes();
        let mut candidate = window.len() - END_OF_CENTRAL_DIRECTORY_SIZE as usize;
        let eocdr_index = loop {
            if window[candidate..candidate + 4] == signature {
                let comment_len = LittleEndian::read_u16(&window[candidate + 20..]) as usize;
                if comment_len
                    == window.len() - END_OF_CENTRAL_DIRECTORY_SIZE as usize - candidate
                {
                    break candidate;
                }
            }
            if candidate == 0 {
                return Err(ArchiveError::BadArchiveStructure(
                    "end of central directory record not found".to_owned(),
                ));
            }
            candidate -= 1;
        };

        let record = &window[eocdr_index..];
        let mut indexer = ArchiveDescriptorReader::new();
        indexer.expect_signature(record, CENTRAL_DIRECTORY_END_SIGNATURE)?;
        let disk_number = indexer.read_u16(record)?;
        let _disk_with_central_directory = indexer.read_u16(record)?;
        let _entries_on_this_disk = indexer.read_u16(record)?;
        let total_number_of_entries = indexer.read_u16(record)?;
        let _central_directory_size = indexer.read_u32(record)?;
        let central_directory_offset = indexer.read_u32(record)?;
        let comment_len = indexer.read_u16(record)?;
        let archive_comment = indexer.read_bytes(record, comment_len as usize)?;

        if disk_number != 0 {
            return Err(ArchiveError::MultiDiskArchive);
        }

        let mut entry_count = total_number_of_entries as u64;
        let mut cd_offset = central_directory_offset as u64;

        if total_number_of_entries == ZIP64_DISK_SENTINEL
            || central_directory_offset == ZIP64_SENTINEL
        {
            let eocdr_position = window_start + eocdr_index as u64;
            let (zip64_entry_count, zip64_cd_offset) =
                Self::read_zip64_end_of_central_directory(&source, eocdr_position)?;
            entry_count = zip64_entry_count;
            cd_offset = zip64_cd_offset;
        }

        Ok(ArchiveReader {
            source,
            file_size,
            entry_count,
            central_directory_offset: cd_offset,
            archive_comment,
            decode_strings: options.decode_strings,
        })
    }

    /// Follow the ZIP64 locator sitting right before the classic record to
    /// the ZIP64 end-of-central-directory record and take the authoritative
    /// 64-bit entry count and central directory offset from it.
    fn read_zip64_end_of_central_directory(
        source: &R,
        eocdr_position: u64,
    ) -> Result<(u64, u64), ArchiveError> {
        if eocdr_position < ZIP64_END_OF_CENTRAL_DIR_LOCATOR_SIZE {
            return Err(ArchiveError::BadArchiveStructure(
                "no room for a zip64 end of central directory locator".to_owned(),
            ));
        }

        let locator = read_fully(
            source,
            eocdr_position - ZIP64_END_OF_CENTRAL_DIR_LOCATOR_SIZE,
            ZIP64_END_OF_CENTRAL_DIR_LOCATOR_SIZE as usize,
        )?;
        let mut indexer = ArchiveDescriptorReader::new();
        indexer.expect_signature(&locator, ZIP64_END_OF_CENTRAL_DIR_LOCATOR_SIGNATURE)?;
        let _disk_with_zip64_eocdr = indexer.read_u32(&locator)?;
        let zip64_eocdr_offset = indexer.read_u64(&locator)?;
        let _total_number_of_disks = indexer.read_u32(&locator)?;

        let record = read_fully(
            source,
            zip64_eocdr_offset,
            ZIP64_END_OF_CENTRAL_DIRECTORY_SIZE as usize,
        )?;
        let mut indexer = ArchiveDescriptorReader::new();
        indexer.expect_signature(&record, ZIP64_CENTRAL_DIRECTORY_END_SIGNATURE)?;
        let _record_size = indexer.read_u64(&record)?;
        let _version_made_by = indexer.read_u16(&record)?;
        let _version_needed = indexer.read_u16(&record)?;
        let _disk_number = indexer.read_u32(&record)?;
        let _disk_with_central_directory = indexer.read_u32(&record)?;
        let _entries_on_this_disk = indexer.read_u64(&record)?;
        let total_number_of_entries = indexer.read_u64(&record)?;
        let _central_directory_size = indexer.read_u64(&record)?;
        let central_directory_offset = indexer.read_u64(&record)?;

        Ok((total_number_of_entries, central_directory_offset))
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn central_directory_offset(&self) -> u64 {
        self.central_directory_offset
    }

    /// The archive comment, raw.
    pub fn comment(&self) -> &[u8] {
        &self.archive_comment
    }

    pub fn source(&self) -> &R {
        &self.source
    }

    pub fn retrieve_source(self) -> R {
        self.source
    }

    /// Walk the central directory lazily, one entry per step.
    ///
    /// The iterator is single-pass and stops after the first error; entry
    /// streams obtained from [`entry_reader`](Self::entry_reader) are
    /// independent of it.
    pub fn entries(&self) -> Entries<'_, R> {
        Entries {
            reader: self,
            cursor: self.central_directory_offset,
            remaining: self.entry_count,
            failed: false,
        }
    }

    fn parse_central_directory_entry(
        &self,
        cursor: u64,
    ) -> Result<(ArchiveEntry, u64), ArchiveError> {
        let fixed = read_fully(
            &self.source,
            cursor,
            CENTRAL_DIRECTORY_ENTRY_BASE_SIZE as usize,
        )?;
        let mut indexer = ArchiveDescriptorReader::new();
        indexer.expect_signature(&fixed, CENTRAL_DIRECTORY_ENTRY_SIGNATURE)?;
        let version_made_by = indexer.read_u16(&fixed)?;
        let version_needed = indexer.read_u16(&fixed)?;
        let general_purpose_flags = indexer.read_u16(&fixed)?;
        let compression_method = indexer.read_u16(&fixed)?;
        let last_mod_file_time = indexer.read_u16(&fixed)?;
        let last_mod_file_date = indexer.read_u16(&fixed)?;
        let crc32 = indexer.read_u32(&fixed)?;
        let compressed_size_32 = indexer.read_u32(&fixed)?;
        let uncompressed_size_32 = indexer.read_u32(&fixed)?;
        let file_name_len = indexer.read_u16(&fixed)?;
        let extra_field_length = indexer.read_u16(&fixed)?;
        let file_comment_length = indexer.read_u16(&fixed)?;
        let disk_number_start_16 = indexer.read_u16(&fixed)?;
        let internal_file_attributes = indexer.read_u16(&fixed)?;
        let external_file_attributes = indexer.read_u32(&fixed)?;
        let offset_32 = indexer.read_u32(&fixed)?;

        if general_purpose_flags & STRONG_ENCRYPTION_FLAG != 0 {
            return Err(ArchiveError::StrongEncryption);
        }

        let tail_len =
            file_name_len as usize + extra_field_length as usize + file_comment_length as usize;
        let tail = read_fully(
            &self.source,
            cursor + CENTRAL_DIRECTORY_ENTRY_BASE_SIZE,
            tail_len,
        )?;
        let file_name_raw = tail[..file_name_len as usize].to_vec();
        let extra =
            &tail[file_name_len as usize..file_name_len as usize + extra_field_length as usize];
        let file_comment_raw =
            tail[file_name_len as usize + extra_field_length as usize..].to_vec();

        let mut compressed_size = compressed_size_32 as u64;
        let mut uncompressed_size = uncompressed_size_32 as u64;
        let mut offset = offset_32 as u64;
        let mut disk_number_start = disk_number_start_16 as u32;

        let wants_zip64 = uncompressed_size_32 == ZIP64_SENTINEL
            || compressed_size_32 == ZIP64_SENTINEL
            || offset_32 == ZIP64_SENTINEL
            || disk_number_start_16 == ZIP64_DISK_SENTINEL;

        let mut unicode_path: Option<(u32, Vec<u8>)> = None;

        for field in extra_fields(extra) {
            let (id, payload) = field?;
            match id {
                // The zip64 payload only holds the fields whose stored
                // value was the sentinel, in a fixed order.
                ZIP64_EXTENDED_INFORMATION_ID if wants_zip64 => {
                    let mut zip64 = ArchiveDescriptorReader::new();
                    if uncompressed_size_32 == ZIP64_SENTINEL {
                        uncompressed_size = zip64.read_u64(payload)?;
                    }
                    if compressed_size_32 == ZIP64_SENTINEL {
                        compressed_size = zip64.read_u64(payload)?;
                    }
                    if offset_32 == ZIP64_SENTINEL {
                        offset = zip64.read_u64(payload)?;
                    }
                    if disk_number_start_16 == ZIP64_DISK_SENTINEL {
                        disk_number_start = zip64.read_u32(payload)?;
                    }
                }
                INFO_ZIP_UNICODE_PATH_ID if self.decode_strings => {
                    // {version: u8, crc32 of the raw name: u32, utf-8 name}
                    if payload.len() >= 5 && payload[0] == 1 {
                        let name_crc = LittleEndian::read_u32(&payload[1..5]);
                        unicode_path = Some((name_crc, payload[5..].to_vec()));
                    }
                }
                _ => {}
            }
        }

        let utf8 = general_purpose_flags & UTF8_NAMES_FLAG != 0;
        let (file_name, file_comment) = if self.decode_strings {
            let mut name = decode_text(&file_name_raw, utf8);
            if let Some((name_crc, utf8_name)) = unicode_path {
                if name_crc == crc32fast::hash(&file_name_raw) {
                    name = String::from_utf8_lossy(&utf8_name).into_owned();
                }
            }
            (
                Some(name),
                Some(decode_text(&file_comment_raw, utf8)),
            )
        } else {
            (None, None)
        };

        let entry = ArchiveEntry {
            version_made_by,
            version_needed,
            general_purpose_flags,
            compression_method,
            compressor: CompressionMethod::from_compression_method(compression_method),
            last_mod_file_time,
            last_mod_file_date,
            crc32,
            compressed_size,
            uncompressed_size,
            disk_number_start,
            internal_file_attributes,
            external_file_attributes,
            offset,
            file_name_raw,
            file_comment_raw,
            file_name,
            file_comment,
        };

        Ok((entry, cursor + CENTRAL_DIRECTORY_ENTRY_BASE_SIZE + tail_len as u64))
    }

    /// Open one entry's payload as a byte stream.
    ///
    /// The local header is re-read to find where the payload actually
    /// starts (its name and extra lengths may differ from the central
    /// directory's).
    pub fn entry_reader(
        &self,
        entry: &ArchiveEntry,
        options: &EntryReadOptions,
    ) -> Result<EntryReader<'_>, ArchiveError> {
        let local = read_fully(&self.source, entry.offset, FILE_HEADER_BASE_SIZE as usize)?;
        let mut indexer = ArchiveDescriptorReader::new();
        indexer.expect_signature(&local, LOCAL_FILE_HEADER_SIGNATURE)?;
        indexer.skip(&local, 22)?;
        let local_file_name_len = indexer.read_u16(&local)? as u64;
        let local_extra_field_length = indexer.read_u16(&local)? as u64;
        let data_start =
            entry.offset + FILE_HEADER_BASE_SIZE + local_file_name_len + local_extra_field_length;

        let start = options.start.unwrap_or(0);
        let end = options.end.unwrap_or(entry.compressed_size);
        if start > end || end > entry.compressed_size {
            return Err(ArchiveError::InvalidRange);
        }
        let whole = start == 0 && end == entry.compressed_size;

        let raw_requested = options.decrypt == Some(false);
        if entry.is_encrypted() && !raw_requested {
            return Err(ArchiveError::Encrypted);
        }

        let decompress = match options.decompress {
            Some(false) => false,
            Some(true) if entry.is_encrypted() => return Err(ArchiveError::Encrypted),
            _ => {
                if entry.is_encrypted() {
                    false
                } else {
                    match entry.compressor {
                        CompressionMethod::Store() => false,
                        CompressionMethod::Deflate() => true,
                        CompressionMethod::Unknown(code) => {
                            return Err(ArchiveError::UnsupportedCompressionMethodCode(code))
                        }
                    }
                }
            }
        };
        if decompress && !whole {
            return Err(ArchiveError::InvalidRange);
        }

        // Validation compares against uncompressed size and CRC, so it only
        // applies when the stream yields the full plaintext.
        let yields_full_plaintext = whole
            && !entry.is_encrypted()
            && (decompress || entry.compressor == CompressionMethod::Store());
        let validate = match options.validate_data {
            Some(true) => {
                if !yields_full_plaintext {
                    return Err(ArchiveError::InvalidRange);
                }
                true
            }
            Some(false) => false,
            None => yields_full_plaintext,
        };

        let range = RangeReader::new(&self.source, data_start + start, end - start);
        let inner: Box<dyn std::io::Read + '_> = match (decompress, validate) {
            (true, true) => Box::new(ValidatingReader::new(
                DeflateDecoder::new(range),
                entry.crc32,
                entry.uncompressed_size,
            )),
            (true, false) => Box::new(DeflateDecoder::new(range)),
            (false, true) => Box::new(ValidatingReader::new(
                range,
                entry.crc32,
                entry.uncompressed_size,
            )),
            (false, false) => Box::new(range),
        };

        Ok(EntryReader::new(inner))
    }
}

fn decode_text(raw: &[u8], utf8: bool) -> String {
    if utf8 {
        String::from_utf8_lossy(raw).into_owned()
    } else {
        cp437::decode(raw)
    }
}

/// Lazy, single-pass central-directory walk.
pub struct Entries<'a, R: RandomAccess> {
    reader: &'a ArchiveReader<R>,
    cursor: u64,
    remaining: u64,
    failed: bool,
}

impl<R: RandomAccess> Iterator for Entries<'_, R> {
    type Item = Result<ArchiveEntry, ArchiveError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining == 0 {
            return None;
        }

        match self.reader.parse_central_directory_entry(self.cursor) {
            Ok((entry, next_cursor)) => {
                self.cursor = next_cursor;
                self.remaining -= 1;
                Some(Ok(entry))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::archive_common::ArchiveDescriptor;

    fn empty_archive_with_comment(comment: &[u8]) -> Vec<u8> {
        let mut desc = ArchiveDescriptor::new(64);
        desc.write_u32(CENTRAL_DIRECTORY_END_SIGNATURE);
        desc.write_u16(0);
        desc.write_u16(0);
        desc.write_u16(0);
        desc.write_u16(0);
        desc.write_u32(0);
        desc.write_u32(0);
        desc.write_u16(comment.len() as u16);
        desc.write_bytes(comment);
        desc.finish()
    }

    #[test]
    fn opens_an_empty_archive() {
        let archive = empty_archive_with_comment(b"");
        let reader = ArchiveReader::new(archive).unwrap();
        assert_eq!(reader.entry_count(), 0);
        assert_eq!(reader.entries().count(), 0);
        assert!(reader.comment().is_empty());
    }

    #[test]
    fn comment_is_surfaced() {
        let archive = empty_archive_with_comment(b"zip of the day");
        let reader = ArchiveReader::new(archive).unwrap();
        assert_eq!(reader.comment(), b"zip of the day");
    }

    #[test]
    fn decoy_record_inside_comment_is_skipped() {
        // The comment embeds a fake record whose comment-length word does
        // not account for the trailing bytes; the scan must pass it over
        // and settle on the real one.
        let mut decoy = Vec::new();
        decoy.extend_from_slice(&CENTRAL_DIRECTORY_END_SIGNATURE.to_le_bytes());
        decoy.extend_from_slice(&[0u8; 16]);
        decoy.extend_from_slice(&99u16.to_le_bytes());
        decoy.extend_from_slice(b" and more text");

        let archive = empty_archive_with_comment(&decoy);
        let reader = ArchiveReader::new(archive).unwrap();
        assert_eq!(reader.comment(), decoy.as_slice());
    }

    #[test]
    fn garbage_fails_to_open() {
        let garbage = vec![0u8; 1000];
        assert!(matches!(
            ArchiveReader::new(garbage),
            Err(ArchiveError::BadArchiveStructure(_))
        ));

        let tiny = vec![0u8; 10];
        assert!(ArchiveReader::new(tiny).is_err());
    }

    #[test]
    fn multi_disk_archives_are_refused() {
        let mut archive = empty_archive_with_comment(b"");
        archive[4] = 2; // number of this disk
        assert!(matches!(
            ArchiveReader::new(archive),
            Err(ArchiveError::MultiDiskArchive)
        ));
    }
}
