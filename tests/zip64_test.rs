use std::io::Read;

use zipflow::archive_common::ArchiveFileEntry;
use zipflow::compress::std::archive::ZipArchive;
use zipflow::compress::FileOptions;
use zipflow::compression::CompressionMethod;
use zipflow::constants::{
    CENTRAL_DIRECTORY_END_SIGNATURE, ZIP64_CENTRAL_DIRECTORY_END_SIGNATURE,
    ZIP64_END_OF_CENTRAL_DIR_LOCATOR_SIGNATURE,
};
use zipflow::error::ArchiveError;
use zipflow::types::FileDateTime;
use zipflow::uncompress::{ArchiveReader, EntryReadOptions};

mod common;

fn contains_signature(haystack: &[u8], signature: u32) -> bool {
    let needle = signature.to_le_bytes();
    haystack.windows(4).any(|window| window == needle)
}

fn test_entry() -> ArchiveFileEntry {
    ArchiveFileEntry {
        general_purpose_flags: 1 << 11,
        compressor: CompressionMethod::Store(),
        last_mod_file_time: 0,
        last_mod_file_date: 0x21,
        crc32: 0,
        compressed_size: 0,
        uncompressed_size: 0,
        file_name_as_bytes: b"big.bin".to_vec(),
        file_comment: None,
        internal_file_attributes: 0,
        external_file_attributes: 0,
        offset: 0,
        sizes_known: true,
        force_zip64: false,
    }
}

#[test]
fn size_thresholds_drive_the_encoding() {
    let mut entry = test_entry();
    assert!(!entry.local_header_uses_zip64());
    assert!(!entry.central_header_uses_zip64());
    assert_eq!(entry.version_needed_to_extract(false), 20);

    // An uncompressed size at the sentinel promotes both records.
    entry.uncompressed_size = u32::MAX as u64;
    assert!(entry.local_header_uses_zip64());
    assert!(entry.central_header_uses_zip64());
    assert_eq!(entry.version_needed_to_extract(true), 45);

    // A large offset only matters to the central directory record.
    let mut entry = test_entry();
    entry.offset = u32::MAX as u64;
    assert!(!entry.local_header_uses_zip64());
    assert!(entry.central_header_uses_zip64());

    // Unknown sizes promote the local header unconditionally.
    let mut entry = test_entry();
    entry.sizes_known = false;
    assert!(entry.local_header_uses_zip64());
    assert_eq!(entry.version_needed_to_extract(false), 45);
}

#[test]
fn forced_entries_produce_zip64_records_end_to_end() -> Result<(), ArchiveError> {
    let payload = b"small but forced".to_vec();

    let mut archive = ZipArchive::new(Vec::new());
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Store())
        .last_modified_time(FileDateTime::Zero)
        .force_zip64_format();
    archive.append_buffer("forced.bin", &payload, &options)?;
    let (_, bytes) = archive.finalize()?;

    // The archive ends with zip64 record + locator + classic record.
    assert!(contains_signature(&bytes, ZIP64_CENTRAL_DIRECTORY_END_SIGNATURE));
    assert!(contains_signature(&bytes, ZIP64_END_OF_CENTRAL_DIR_LOCATOR_SIGNATURE));
    assert!(contains_signature(&bytes, CENTRAL_DIRECTORY_END_SIGNATURE));

    // The local header advertises version 45 and a 16-byte zip64 payload.
    assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), 45);
    let extra_len = u16::from_le_bytes([bytes[28], bytes[29]]);
    assert_eq!(extra_len, 20); // 4-byte tlv header + 16 bytes of sizes

    let reader = ArchiveReader::new(bytes)?;
    let entry = reader.entries().next().unwrap()?;
    assert_eq!(entry.version_needed, 45);
    assert_eq!(entry.uncompressed_size, payload.len() as u64);
    assert_eq!(entry.offset, 0);

    let mut out = Vec::new();
    reader
        .entry_reader(&entry, &EntryReadOptions::default())?
        .read_to_end(&mut out)
        .unwrap();
    assert_eq!(out, payload);
    Ok(())
}

#[test]
fn plain_archives_skip_the_zip64_trailer() -> Result<(), ArchiveError> {
    let mut archive = ZipArchive::new(Vec::new());
    let options = FileOptions::default().compression_method(CompressionMethod::Store());
    archive.append_buffer("plain.bin", b"plain", &options)?;
    let (_, bytes) = archive.finalize()?;

    assert!(!contains_signature(&bytes, ZIP64_CENTRAL_DIRECTORY_END_SIGNATURE));
    assert!(!contains_signature(&bytes, ZIP64_END_OF_CENTRAL_DIR_LOCATOR_SIGNATURE));
    Ok(())
}

#[test]
fn streamed_entries_are_zip64_and_round_trip() -> Result<(), ArchiveError> {
    let payload = common::lorem();

    let mut archive = ZipArchive::new(Vec::new());
    archive.append_stream("dash", &mut payload.as_slice(), &FileOptions::default())?;
    let (_, bytes) = archive.finalize()?;

    // The local header went out before sizes were known: zip64 form,
    // version 45, sentinel size fields. The trailer is not promoted for a
    // small archive.
    assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), 45);
    assert_eq!(&bytes[18..26], &[0xFF; 8]);
    assert!(!contains_signature(&bytes, ZIP64_CENTRAL_DIRECTORY_END_SIGNATURE));

    let reader = ArchiveReader::new(bytes)?;
    let entry = reader.entries().next().unwrap()?;
    assert!(entry.is_streamed());
    assert_eq!(entry.general_purpose_flags & (1 << 3), 1 << 3);
    assert_eq!(entry.compression_method, 8);

    let mut out = Vec::new();
    reader
        .entry_reader(&entry, &EntryReadOptions::default())?
        .read_to_end(&mut out)
        .unwrap();
    assert_eq!(out, payload);
    Ok(())
}

#[test]
fn forced_trailer_sentinels_still_resolve() -> Result<(), ArchiveError> {
    let mut archive = ZipArchive::new(Vec::new());
    archive.force_zip64_format();
    let options = FileOptions::default().compression_method(CompressionMethod::Store());
    archive.append_buffer("one.bin", b"1", &options)?;
    archive.append_buffer("two.bin", b"22", &options)?;
    let (_, bytes) = archive.finalize()?;

    // With the trailer forced, the classic record holds only sentinels and
    // the reader must take the truth from the zip64 record.
    let reader = ArchiveReader::new(bytes)?;
    assert_eq!(reader.entry_count(), 2);
    let entries: Vec<_> = reader.entries().collect::<Result<_, _>>()?;
    assert_eq!(entries[0].name(), "one.bin");
    assert_eq!(entries[1].name(), "two.bin");
    Ok(())
}
