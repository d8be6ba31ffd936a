use std::io::Read;

use zipflow::archive_common::ArchiveDescriptor;
use zipflow::compress::std::archive::ZipArchive;
use zipflow::compress::FileOptions;
use zipflow::compression::CompressionMethod;
use zipflow::constants::{
    CENTRAL_DIRECTORY_END_SIGNATURE, CENTRAL_DIRECTORY_ENTRY_SIGNATURE, ENCRYPTED_FLAG,
    LOCAL_FILE_HEADER_SIGNATURE, STRONG_ENCRYPTION_FLAG, VERSION_MADE_BY,
};
use zipflow::error::ArchiveError;
use zipflow::uncompress::{ArchiveReader, EntryReadOptions, ReaderOptions};

mod common;

/// Hand-assemble a one-entry stored archive so reader behavior can be
/// probed with flag combinations the writer never produces.
fn craft_single_entry_archive(flags: u16, name: &[u8], payload: &[u8], cd_extra: &[u8]) -> Vec<u8> {
    let crc = crc32fast::hash(payload);
    let mut bytes = ArchiveDescriptor::new(256);

    bytes.write_u32(LOCAL_FILE_HEADER_SIGNATURE);
    bytes.write_u16(20);
    bytes.write_u16(flags);
    bytes.write_u16(0); // stored
    bytes.write_u16(0); // time
    bytes.write_u16(0x21); // date
    bytes.write_u32(crc);
    bytes.write_u32(payload.len() as u32);
    bytes.write_u32(payload.len() as u32);
    bytes.write_u16(name.len() as u16);
    bytes.write_u16(0);
    bytes.write_bytes(name);
    bytes.write_bytes(payload);

    let cd_offset = bytes.len() as u32;
    bytes.write_u32(CENTRAL_DIRECTORY_ENTRY_SIGNATURE);
    bytes.write_u16(VERSION_MADE_BY);
    bytes.write_u16(20);
    bytes.write_u16(flags);
    bytes.write_u16(0);
    bytes.write_u16(0);
    bytes.write_u16(0x21);
    bytes.write_u32(crc);
    bytes.write_u32(payload.len() as u32);
    bytes.write_u32(payload.len() as u32);
    bytes.write_u16(name.len() as u16);
    bytes.write_u16(cd_extra.len() as u16);
    bytes.write_u16(0); // comment length
    bytes.write_u16(0); // disk number start
    bytes.write_u16(0); // internal attributes
    bytes.write_u32(0); // external attributes
    bytes.write_u32(0); // local header offset
    bytes.write_bytes(name);
    bytes.write_bytes(cd_extra);

    let cd_size = bytes.len() as u32 - cd_offset;
    bytes.write_u32(CENTRAL_DIRECTORY_END_SIGNATURE);
    bytes.write_u16(0);
    bytes.write_u16(0);
    bytes.write_u16(1);
    bytes.write_u16(1);
    bytes.write_u32(cd_size);
    bytes.write_u32(cd_offset);
    bytes.write_u16(0);

    bytes.finish()
}

#[test]
fn range_reads_address_compressed_bytes() -> Result<(), ArchiveError> {
    let payload = b"0123456789".to_vec();
    let mut archive = ZipArchive::new(Vec::new());
    let options = FileOptions::default().compression_method(CompressionMethod::Store());
    archive.append_buffer("digits.txt", &payload, &options)?;
    let (_, bytes) = archive.finalize()?;

    let reader = ArchiveReader::new(bytes)?;
    let entry = reader.entries().next().unwrap()?;

    let mut out = Vec::new();
    reader
        .entry_reader(
            &entry,
            &EntryReadOptions::default().start(2).end(7).decompress(false),
        )?
        .read_to_end(&mut out)
        .unwrap();
    assert_eq!(out, b"23456");

    // A range makes no sense through the inflater.
    assert!(matches!(
        reader.entry_reader(
            &entry,
            &EntryReadOptions::default().start(2).end(7).decompress(true),
        ),
        Err(ArchiveError::InvalidRange)
    ));

    // Out-of-entry ranges are rejected.
    assert!(matches!(
        reader.entry_reader(&entry, &EntryReadOptions::default().start(5).end(3)),
        Err(ArchiveError::InvalidRange)
    ));
    assert!(matches!(
        reader.entry_reader(&entry, &EntryReadOptions::default().end(11)),
        Err(ArchiveError::InvalidRange)
    ));
    Ok(())
}

#[test]
fn corrupted_payload_fails_validation_at_end_of_stream() -> Result<(), ArchiveError> {
    let payload = b"soon to be corrupted".to_vec();
    let mut archive = ZipArchive::new(Vec::new());
    let options = FileOptions::default().compression_method(CompressionMethod::Store());
    archive.append_buffer("victim.bin", &payload, &options)?;
    let (_, mut bytes) = archive.finalize()?;

    // Flip one byte of file data. The local header of the only entry is at
    // offset 0; its payload starts after the 30-byte header and the name.
    let data_start = 30 + "victim.bin".len();
    bytes[data_start + 3] ^= 0x40;

    let reader = ArchiveReader::new(bytes)?;
    let entry = reader.entries().next().unwrap()?;
    let mut out = Vec::new();
    let err = reader
        .entry_reader(&entry, &EntryReadOptions::default())?
        .read_to_end(&mut out)
        .unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    assert!(err.to_string().contains("crc-32 mismatch"));

    // Validation off reads the corrupted bytes as they are.
    let mut out = Vec::new();
    reader
        .entry_reader(&entry, &EntryReadOptions::default().validate_data(false))?
        .read_to_end(&mut out)
        .unwrap();
    assert_eq!(out.len(), payload.len());
    assert_ne!(out, payload);
    Ok(())
}

#[test]
fn cp437_names_are_decoded_without_the_utf8_bit() -> Result<(), ArchiveError> {
    // 0x82 0x85 0x8A are é à è in code page 437.
    let archive = craft_single_entry_archive(0, &[0x82, 0x85, 0x8A], b"legacy", &[]);

    let reader = ArchiveReader::new(archive.clone())?;
    let entry = reader.entries().next().unwrap()?;
    assert_eq!(entry.name(), "éàè");
    assert_eq!(entry.file_name_raw, vec![0x82, 0x85, 0x8A]);

    // With decoding off the raw bytes pass through unchanged.
    let raw_reader = ArchiveReader::with_options(
        archive,
        ReaderOptions {
            decode_strings: false,
        },
    )?;
    let entry = raw_reader.entries().next().unwrap()?;
    assert_eq!(entry.file_name, None);
    assert_eq!(entry.file_name_raw, vec![0x82, 0x85, 0x8A]);
    Ok(())
}

#[test]
fn unicode_path_field_overrides_when_its_crc_matches() -> Result<(), ArchiveError> {
    let raw_name = b"lgcy.txt";
    let utf8_name = "überschrift.txt";

    let mut extra = ArchiveDescriptor::new(64);
    extra.write_u16(0x7075);
    extra.write_u16(1 + 4 + utf8_name.len() as u16);
    extra.write_u8(1);
    extra.write_u32(crc32fast::hash(raw_name));
    extra.write_bytes(utf8_name.as_bytes());

    let archive = craft_single_entry_archive(0, raw_name, b"x", extra.buffer());
    let reader = ArchiveReader::new(archive)?;
    let entry = reader.entries().next().unwrap()?;
    assert_eq!(entry.name(), utf8_name);

    // A stale CRC means the field describes some other name; ignore it.
    let mut stale = ArchiveDescriptor::new(64);
    stale.write_u16(0x7075);
    stale.write_u16(1 + 4 + utf8_name.len() as u16);
    stale.write_u8(1);
    stale.write_u32(crc32fast::hash(b"some other name"));
    stale.write_bytes(utf8_name.as_bytes());

    let archive = craft_single_entry_archive(0, raw_name, b"x", stale.buffer());
    let reader = ArchiveReader::new(archive)?;
    let entry = reader.entries().next().unwrap()?;
    assert_eq!(entry.name(), "lgcy.txt");
    Ok(())
}

#[test]
fn encrypted_entries_need_an_explicit_raw_read() -> Result<(), ArchiveError> {
    let archive =
        craft_single_entry_archive(ENCRYPTED_FLAG, b"secret.bin", b"ciphertext!", &[]);
    let reader = ArchiveReader::new(archive)?;
    let entry = reader.entries().next().unwrap()?;
    assert!(entry.is_encrypted());

    assert!(matches!(
        reader.entry_reader(&entry, &EntryReadOptions::default()),
        Err(ArchiveError::Encrypted)
    ));

    let mut out = Vec::new();
    reader
        .entry_reader(&entry, &EntryReadOptions::default().decrypt(false))?
        .read_to_end(&mut out)
        .unwrap();
    assert_eq!(out, b"ciphertext!");
    Ok(())
}

#[test]
fn strong_encryption_fails_the_iteration_step() -> Result<(), ArchiveError> {
    let archive =
        craft_single_entry_archive(STRONG_ENCRYPTION_FLAG, b"fort.bin", b"vault", &[]);
    let reader = ArchiveReader::new(archive)?;
    let mut entries = reader.entries();
    assert!(matches!(
        entries.next(),
        Some(Err(ArchiveError::StrongEncryption))
    ));
    // The iterator stops after the failure.
    assert!(entries.next().is_none());
    Ok(())
}

#[test]
fn unknown_methods_surface_metadata_but_not_streams() -> Result<(), ArchiveError> {
    let mut archive = craft_single_entry_archive(0, b"exotic.bin", b"??", &[]);
    // Patch the method word in both records to an unsupported code. The
    // local header keeps it at offset 8; the central record sits right
    // before the 22-byte trailer and keeps it at its offset 10.
    archive[8] = 14;
    let method_in_cd = archive.len() - 22 - (46 + "exotic.bin".len()) + 10;
    archive[method_in_cd] = 14;

    let reader = ArchiveReader::new(archive)?;
    let entry = reader.entries().next().unwrap()?;
    assert_eq!(entry.compressed(), None);
    assert_eq!(entry.compression_method, 14);

    assert!(matches!(
        reader.entry_reader(&entry, &EntryReadOptions::default()),
        Err(ArchiveError::UnsupportedCompressionMethodCode(14))
    ));

    // Raw bytes remain reachable.
    let mut out = Vec::new();
    reader
        .entry_reader(&entry, &EntryReadOptions::default().decompress(false))?
        .read_to_end(&mut out)
        .unwrap();
    assert_eq!(out, b"??");
    Ok(())
}

#[test]
fn local_header_lengths_override_central_ones() -> Result<(), ArchiveError> {
    // The local header may carry extra fields the central directory does
    // not mention; the payload offset must come from the local record.
    let payload = b"true payload";
    let crc = crc32fast::hash(payload);
    let local_extra: &[u8] = &[0x55, 0x54, 0x02, 0x00, 0xAA, 0xBB]; // opaque tlv

    let mut bytes = ArchiveDescriptor::new(256);
    bytes.write_u32(LOCAL_FILE_HEADER_SIGNATURE);
    bytes.write_u16(20);
    bytes.write_u16(0);
    bytes.write_u16(0);
    bytes.write_u16(0);
    bytes.write_u16(0x21);
    bytes.write_u32(crc);
    bytes.write_u32(payload.len() as u32);
    bytes.write_u32(payload.len() as u32);
    bytes.write_u16(4);
    bytes.write_u16(local_extra.len() as u16);
    bytes.write_bytes(b"f.da");
    bytes.write_bytes(local_extra);
    bytes.write_bytes(payload);

    let cd_offset = bytes.len() as u32;
    bytes.write_u32(CENTRAL_DIRECTORY_ENTRY_SIGNATURE);
    bytes.write_u16(VERSION_MADE_BY);
    bytes.write_u16(20);
    bytes.write_u16(0);
    bytes.write_u16(0);
    bytes.write_u16(0);
    bytes.write_u16(0x21);
    bytes.write_u32(crc);
    bytes.write_u32(payload.len() as u32);
    bytes.write_u32(payload.len() as u32);
    bytes.write_u16(4);
    bytes.write_u16(0); // no extra here
    bytes.write_u16(0);
    bytes.write_u16(0);
    bytes.write_u16(0);
    bytes.write_u32(0);
    bytes.write_u32(0);
    bytes.write_bytes(b"f.da");

    let cd_size = bytes.len() as u32 - cd_offset;
    bytes.write_u32(CENTRAL_DIRECTORY_END_SIGNATURE);
    bytes.write_u16(0);
    bytes.write_u16(0);
    bytes.write_u16(1);
    bytes.write_u16(1);
    bytes.write_u32(cd_size);
    bytes.write_u32(cd_offset);
    bytes.write_u16(0);

    let reader = ArchiveReader::new(bytes.finish())?;
    let entry = reader.entries().next().unwrap()?;
    let mut out = Vec::new();
    reader
        .entry_reader(&entry, &EntryReadOptions::default())?
        .read_to_end(&mut out)
        .unwrap();
    assert_eq!(out, payload);
    Ok(())
}

#[test]
fn reader_survives_file_sources() -> Result<(), ArchiveError> {
    let payload = common::lorem();
    let mut archive = ZipArchive::new(Vec::new());
    archive.append_buffer("ondisk.txt", &payload, &FileOptions::default())?;
    let (_, bytes) = archive.finalize()?;

    let path = common::write_fixture_file("reader_file_source.zip", &bytes);
    let file = std::fs::File::open(path)?;
    let reader = ArchiveReader::new(file)?;
    let entry = reader.entries().next().unwrap()?;

    let mut out = Vec::new();
    reader
        .entry_reader(&entry, &EntryReadOptions::default())?
        .read_to_end(&mut out)
        .unwrap();
    assert_eq!(out, payload);
    Ok(())
}
