use crate::compression::CompressionMethod;
use crate::constants::{
    CENTRAL_DIRECTORY_END_SIGNATURE, EXTENDED_LOCAL_HEADER_FLAG, MAX_NAME_OR_COMMENT_LENGTH,
    VERSION_MADE_BY, VERSION_NEEDED_TO_EXTRACT, VERSION_USES_ZIP64_FORMAT_EXTENSIONS,
    ZIP64_CENTRAL_DIRECTORY_END_SIGNATURE, ZIP64_END_OF_CENTRAL_DIR_LOCATOR_SIGNATURE,
    ZIP64_SENTINEL,
};
use crate::error::ArchiveError;

/// A growable little-endian record buffer.
///
/// Every fixed ZIP structure is produced by appending its fields in wire
/// order into one of these and pushing the result to the sink.
#[derive(Debug, Default)]
pub struct ArchiveDescriptor {
    buffer: Vec<u8>,
}

impl ArchiveDescriptor {
    pub fn new(capacity: u64) -> ArchiveDescriptor {
        ArchiveDescriptor {
            buffer: Vec::with_capacity(capacity as usize),
        }
    }

    pub fn write_u8(&mut self, val: u8) {
        self.buffer.extend_from_slice(&val.to_le_bytes());
    }

    pub fn write_u16(&mut self, val: u16) {
        self.buffer.extend_from_slice(&val.to_le_bytes());
    }

    pub fn write_u32(&mut self, val: u32) {
        self.buffer.extend_from_slice(&val.to_le_bytes());
    }

    pub fn write_u64(&mut self, val: u64) {
        self.buffer.extend_from_slice(&val.to_le_bytes());
    }

    pub fn write_bytes(&mut self, val: &[u8]) {
        self.buffer.extend_from_slice(val);
    }

    pub fn write_zeros(&mut self, len: usize) {
        self.buffer.resize(self.len() + len, 0);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn finish(self) -> Vec<u8> {
        self.buffer
    }
}

/// Cursor-based little-endian field reader over a record buffer.
///
/// Reads are bounds-checked: running past the buffer is an
/// `UnexpectedEof`, never a panic, because truncated records are an input
/// condition the caller has to surface.
#[derive(Default)]
pub struct ArchiveDescriptorReader {
    index: usize,
}

macro_rules! read_type {
    ($self:expr, $stream:expr, $typ:ty) => {{
        let upper_bound = $self.index + ::std::mem::size_of::<$typ>();
        if upper_bound > $stream.len() {
            return Err(ArchiveError::UnexpectedEof);
        }

        let read: [u8; ::std::mem::size_of::<$typ>()] =
            $stream[$self.index..upper_bound].try_into().unwrap();
        $self.index = upper_bound;

        <$typ>::from_le_bytes(read)
    }};
}

impl ArchiveDescriptorReader {
    pub fn new() -> ArchiveDescriptorReader {
        ArchiveDescriptorReader { index: 0 }
    }

    pub fn get_index(&self) -> usize {
        self.index
    }

    pub fn read_u8(&mut self, stream: &[u8]) -> Result<u8, ArchiveError> {
        Ok(read_type!(self, stream, u8))
    }

    pub fn read_u16(&mut self, stream: &[u8]) -> Result<u16, ArchiveError> {
        Ok(read_type!(self, stream, u16))
    }

    pub fn read_u32(&mut self, stream: &[u8]) -> Result<u32, ArchiveError> {
        Ok(read_type!(self, stream, u32))
    }

    pub fn read_u64(&mut self, stream: &[u8]) -> Result<u64, ArchiveError> {
        Ok(read_type!(self, stream, u64))
    }

    pub fn read_bytes(&mut self, stream: &[u8], len: usize) -> Result<Vec<u8>, ArchiveError> {
        let upper_bound = self.index + len;
        if upper_bound > stream.len() {
            return Err(ArchiveError::UnexpectedEof);
        }

        let value = stream[self.index..upper_bound].to_owned();
        self.index = upper_bound;

        Ok(value)
    }

    pub fn skip(&mut self, stream: &[u8], len: usize) -> Result<(), ArchiveError> {
        let upper_bound = self.index + len;
        if upper_bound > stream.len() {
            return Err(ArchiveError::UnexpectedEof);
        }
        self.index = upper_bound;
        Ok(())
    }

    /// Read and verify a 4-byte record signature.
    pub fn expect_signature(&mut self, stream: &[u8], expected: u32) -> Result<(), ArchiveError> {
        let found = self.read_u32(stream)?;
        if found != expected {
            return Err(ArchiveError::InvalidSignature { expected, found });
        }
        Ok(())
    }
}

/// Iterate the `{id, size, data}` records of an extra-field block.
///
/// A size word pointing past the end of the block surfaces as
/// `ExtraFieldOverrun` and terminates the iteration.
pub struct ExtraFieldIter<'a> {
    data: &'a [u8],
    index: usize,
}

pub fn extra_fields(data: &[u8]) -> ExtraFieldIter<'_> {
    ExtraFieldIter { data, index: 0 }
}

impl<'a> Iterator for ExtraFieldIter<'a> {
    type Item = Result<(u16, &'a [u8]), ArchiveError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index + 4 > self.data.len() {
            return None;
        }

        let id = u16::from_le_bytes([self.data[self.index], self.data[self.index + 1]]);
        let size =
            u16::from_le_bytes([self.data[self.index + 2], self.data[self.index + 3]]) as usize;
        let start = self.index + 4;

        if start + size > self.data.len() {
            self.index = self.data.len();
            return Some(Err(ArchiveError::ExtraFieldOverrun));
        }

        self.index = start + size;
        Some(Ok((id, &self.data[start..start + size])))
    }
}

/// The record the writer retains for every appended entry, in the shape
/// the central directory will need at finalize time.
///
/// Sizes and CRC are filled in as the payload flows; `sizes_known` records
/// whether they were already correct when the local header went out (false
/// means the entry was streamed and a data descriptor follows its payload).
#[derive(Debug)]
pub struct ArchiveFileEntry {
    pub general_purpose_flags: u16,
    pub compressor: CompressionMethod,
    pub last_mod_file_time: u16,
    pub last_mod_file_date: u16,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub file_name_as_bytes: Vec<u8>,
    pub file_comment: Option<Vec<u8>>,
    pub internal_file_attributes: u16,
    pub external_file_attributes: u32,
    pub offset: u64,
    pub sizes_known: bool,
    pub force_zip64: bool,
}

impl ArchiveFileEntry {
    pub fn file_name_len(&self) -> u16 {
        self.file_name_as_bytes.len() as u16
    }

    pub fn file_comment_length(&self) -> u16 {
        match &self.file_comment {
            Some(comment) => comment.len() as u16,
            None => 0,
        }
    }

    pub fn compression_method(&self) -> u16 {
        self.compressor.zip_code()
    }

    pub fn is_streamed(&self) -> bool {
        self.general_purpose_flags & EXTENDED_LOCAL_HEADER_FLAG != 0
    }

    /// The local header is in ZIP64 form when the caller forced it, when
    /// sizes are still unknown, or when a known size needs 64 bits.
    pub fn local_header_uses_zip64(&self) -> bool {
        self.force_zip64
            || !self.sizes_known
            || self.uncompressed_size >= ZIP64_SENTINEL as u64
            || self.compressed_size >= ZIP64_SENTINEL as u64
    }

    /// The central-directory record is in ZIP64 form when the caller forced
    /// it or any of the three 32-bit fields would need the sentinel.
    pub fn central_header_uses_zip64(&self) -> bool {
        self.force_zip64
            || self.uncompressed_size >= ZIP64_SENTINEL as u64
            || self.compressed_size >= ZIP64_SENTINEL as u64
            || self.offset >= ZIP64_SENTINEL as u64
    }

    pub fn version_needed_to_extract(&self, zip64_record: bool) -> u16 {
        if zip64_record || !self.sizes_known {
            VERSION_USES_ZIP64_FORMAT_EXTENSIONS
        } else {
            VERSION_NEEDED_TO_EXTRACT
        }
    }
}

/// Mutable state behind the archive's trailing records.
#[derive(Debug, Default)]
pub struct CentralDirectoryEnd {
    pub total_number_of_entries: u64,
    pub central_directory_size: u64,
    pub offset_of_start_of_central_directory: u64,
    pub archive_comment: Option<Vec<u8>>,
    pub force_zip64: bool,
}

impl CentralDirectoryEnd {
    /// Set the archive comment from raw bytes.
    ///
    /// The comment must fit the 16-bit length word and must not contain the
    /// end-of-central-directory signature: the trailing-record search is
    /// ambiguous otherwise, so such an archive is never produced.
    pub fn set_archive_comment(&mut self, comment: &[u8]) -> Result<(), ArchiveError> {
        if comment.len() > MAX_NAME_OR_COMMENT_LENGTH {
            return Err(ArchiveError::CommentTooLong(comment.len()));
        }

        let signature = CENTRAL_DIRECTORY_END_SIGNATURE.to_le_bytes();
        if comment.windows(4).any(|window| window == signature) {
            return Err(ArchiveError::CommentContainsSignature);
        }

        self.archive_comment = Some(comment.to_owned());
        Ok(())
    }

    pub fn zip_file_comment_length(&self) -> u16 {
        match &self.archive_comment {
            Some(comment) => comment.len() as u16,
            None => 0,
        }
    }

    // Per spec 4.4.1.4 - when a field of this record cannot hold the required
    // value the archive carries a ZIP64 end-of-central-directory record and
    // the narrow field holds its sentinel.
    pub fn needs_zip64_format_extensions(&self) -> bool {
        self.force_zip64
            || self.total_number_of_entries >= u16::MAX as u64
            || self.central_directory_size >= ZIP64_SENTINEL as u64
            || self.offset_of_start_of_central_directory >= ZIP64_SENTINEL as u64
    }

    pub fn create_zip64_end_of_central_directory_record(
        &self,
        end_of_central_directory: &mut ArchiveDescriptor,
    ) {
        const SIZE_OF_THE_EOCD64_MINUS_12: u64 = 44;

        end_of_central_directory.write_u32(ZIP64_CENTRAL_DIRECTORY_END_SIGNATURE);
        end_of_central_directory.write_u64(SIZE_OF_THE_EOCD64_MINUS_12);
        end_of_central_directory.write_u16(VERSION_MADE_BY);
        end_of_central_directory.write_u16(VERSION_USES_ZIP64_FORMAT_EXTENSIONS);
        end_of_central_directory.write_u32(0); // number of this disk
        end_of_central_directory.write_u32(0); // disk with the central directory
        end_of_central_directory.write_u64(self.total_number_of_entries);
        end_of_central_directory.write_u64(self.total_number_of_entries);
        end_of_central_directory.write_u64(self.central_directory_size);
        end_of_central_directory.write_u64(self.offset_of_start_of_central_directory);
    }

    pub fn create_end_of_central_directory_locator(
        &self,
        zip64_end_of_central_directory_offset: u64,
        end_of_central_directory: &mut ArchiveDescriptor,
    ) {
        end_of_central_directory.write_u32(ZIP64_END_OF_CENTRAL_DIR_LOCATOR_SIGNATURE);
        end_of_central_directory.write_u32(0); // disk with the zip64 end of central directory
        end_of_central_directory.write_u64(zip64_end_of_central_directory_offset);
        end_of_central_directory.write_u32(1); // total number of disks
    }

    pub fn create_end_of_central_directory(
        &self,
        end_of_central_directory: &mut ArchiveDescriptor,
    ) {
        let (entries, cd_size, cd_offset) = if self.force_zip64 {
            (u16::MAX, ZIP64_SENTINEL, ZIP64_SENTINEL)
        } else {
            (
                self.total_number_of_entries.min(u16::MAX as u64) as u16,
                self.central_directory_size.min(ZIP64_SENTINEL as u64) as u32,
                self.offset_of_start_of_central_directory
                    .min(ZIP64_SENTINEL as u64) as u32,
            )
        };

        end_of_central_directory.write_u32(CENTRAL_DIRECTORY_END_SIGNATURE);
        end_of_central_directory.write_u16(0); // number of this disk
        end_of_central_directory.write_u16(0); // disk with the central directory
        end_of_central_directory.write_u16(entries);
        end_of_central_directory.write_u16(entries);
        end_of_central_directory.write_u32(cd_size);
        end_of_central_directory.write_u32(cd_offset);

        if let Some(comment) = &self.archive_comment {
            end_of_central_directory.write_u16(comment.len() as u16);
            end_of_central_directory.write_bytes(comment);
        } else {
            end_of_central_directory.write_u16(0);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::constants::END_OF_CENTRAL_DIRECTORY_SIZE;

    #[test]
    fn reader_is_bounds_checked() {
        let mut indexer = ArchiveDescriptorReader::new();
        let short = [0x50u8, 0x4B];
        assert!(matches!(
            indexer.read_u32(&short),
            Err(ArchiveError::UnexpectedEof)
        ));
    }

    #[test]
    fn descriptor_fields_round_trip() {
        let mut desc = ArchiveDescriptor::new(32);
        desc.write_u16(0x0102);
        desc.write_u32(0x03040506);
        desc.write_u64(0x0708090A0B0C0D0E);
        desc.write_bytes(b"tail");

        let bytes = desc.finish();
        let mut indexer = ArchiveDescriptorReader::new();
        assert_eq!(indexer.read_u16(&bytes).unwrap(), 0x0102);
        assert_eq!(indexer.read_u32(&bytes).unwrap(), 0x03040506);
        assert_eq!(indexer.read_u64(&bytes).unwrap(), 0x0708090A0B0C0D0E);
        assert_eq!(indexer.read_bytes(&bytes, 4).unwrap(), b"tail");
    }

    #[test]
    fn extra_field_walk() {
        let mut desc = ArchiveDescriptor::new(32);
        desc.write_u16(0x0001);
        desc.write_u16(8);
        desc.write_u64(42);
        desc.write_u16(0x7075);
        desc.write_u16(1);
        desc.write_u8(7);

        let bytes = desc.finish();
        let fields: Vec<_> = extra_fields(&bytes).collect::<Result<_, _>>().unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].0, 0x0001);
        assert_eq!(fields[0].1.len(), 8);
        assert_eq!(fields[1].0, 0x7075);
        assert_eq!(fields[1].1, &[7]);
    }

    #[test]
    fn extra_field_overrun_is_detected() {
        // Length word claims 8 data bytes; only 2 are present.
        let bytes = [0x01, 0x00, 0x08, 0x00, 0xAA, 0xBB];
        let result: Result<Vec<_>, _> = extra_fields(&bytes).collect();
        assert!(matches!(result, Err(ArchiveError::ExtraFieldOverrun)));
    }

    #[test]
    fn comment_with_trailing_signature_rejected() {
        let mut end = CentralDirectoryEnd::default();
        let mut comment = b"perfectly fine".to_vec();
        assert!(end.set_archive_comment(&comment).is_ok());

        comment.extend_from_slice(&[0x50, 0x4B, 0x05, 0x06]);
        assert!(matches!(
            end.set_archive_comment(&comment),
            Err(ArchiveError::CommentContainsSignature)
        ));
    }

    #[test]
    fn trailing_records_have_wire_sizes() {
        let end = CentralDirectoryEnd {
            total_number_of_entries: 3,
            central_directory_size: 185,
            offset_of_start_of_central_directory: 2949,
            archive_comment: None,
            force_zip64: false,
        };

        let mut desc = ArchiveDescriptor::new(128);
        end.create_end_of_central_directory(&mut desc);
        assert_eq!(desc.len() as u64, END_OF_CENTRAL_DIRECTORY_SIZE);

        desc.clear();
        end.create_zip64_end_of_central_directory_record(&mut desc);
        assert_eq!(desc.len(), 56);

        desc.clear();
        end.create_end_of_central_directory_locator(0, &mut desc);
        assert_eq!(desc.len(), 20);
    }

    #[test]
    fn forced_end_record_writes_maxima() {
        let end = CentralDirectoryEnd {
            total_number_of_entries: 1,
            central_directory_size: 64,
            offset_of_start_of_central_directory: 100,
            archive_comment: None,
            force_zip64: true,
        };
        assert!(end.needs_zip64_format_extensions());

        let mut desc = ArchiveDescriptor::new(32);
        end.create_end_of_central_directory(&mut desc);

        let bytes = desc.finish();
        let mut indexer = ArchiveDescriptorReader::new();
        indexer
            .expect_signature(&bytes, CENTRAL_DIRECTORY_END_SIGNATURE)
            .unwrap();
        indexer.skip(&bytes, 4).unwrap();
        assert_eq!(indexer.read_u16(&bytes).unwrap(), u16::MAX);
        assert_eq!(indexer.read_u16(&bytes).unwrap(), u16::MAX);
        assert_eq!(indexer.read_u32(&bytes).unwrap(), ZIP64_SENTINEL);
        assert_eq!(indexer.read_u32(&bytes).unwrap(), ZIP64_SENTINEL);
    }
}
