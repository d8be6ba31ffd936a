use std::fmt::{self, Debug, Display};

/// Everything that can go wrong while reading or producing an archive.
///
/// Format and validation errors are fatal for the archive instance that
/// raised them; `Io` wraps the underlying source or sink error unchanged.
pub enum ArchiveError {
    Io(std::io::Error),
    /// A fixed record did not start with the expected 4-byte signature.
    InvalidSignature {
        expected: u32,
        found: u32,
    },
    /// A read ran past the end of the source or of a record buffer.
    UnexpectedEof,
    /// The archive structure is malformed (missing or inconsistent records).
    BadArchiveStructure(String),
    /// An extra-field length word points past the end of the extra data.
    ExtraFieldOverrun,
    MultiDiskArchive,
    /// The strong-encryption general purpose bit is set.
    StrongEncryption,
    /// The entry payload is encrypted and no raw read was requested.
    Encrypted,
    UnsupportedCompressionMethodCode(u16),
    CrcMismatch {
        expected: u32,
        actual: u32,
    },
    SizeMismatch {
        field: &'static str,
        expected: u64,
        actual: u64,
    },
    /// The entry path is empty, absolute, or contains a `..` segment.
    InvalidName(String),
    NameTooLong(usize),
    CommentTooLong(usize),
    /// A unix mode outside `[0, 0xFFFF]`.
    InvalidMode(u32),
    /// A whole-buffer append larger than the supported maximum.
    BufferTooLarge(usize),
    /// A compressed-byte range outside the entry, or combined with decoding.
    InvalidRange,
    /// The archive comment contains the end-of-central-directory signature.
    CommentContainsSignature,
    /// A character with no CP437 representation.
    InvalidCp437(char),
}

impl Display for ArchiveError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ArchiveError::Io(e) => write!(f, "archive i/o error: {}", e),
            ArchiveError::InvalidSignature { expected, found } => write!(
                f,
                "invalid record signature: expected 0x{:08X}, found 0x{:08X}",
                expected, found
            ),
            ArchiveError::UnexpectedEof => write!(f, "unexpected end of file"),
            ArchiveError::BadArchiveStructure(detail) => {
                write!(f, "bad archive structure: {}", detail)
            }
            ArchiveError::ExtraFieldOverrun => {
                write!(f, "extra field length extends past the extra data")
            }
            ArchiveError::MultiDiskArchive => write!(f, "multi-disk archives are not supported"),
            ArchiveError::StrongEncryption => write!(f, "strong encryption is not supported"),
            ArchiveError::Encrypted => {
                write!(f, "entry is encrypted; request a raw read to get its bytes")
            }
            ArchiveError::UnsupportedCompressionMethodCode(code) => {
                write!(f, "the compression method code '{}' is not supported", code)
            }
            ArchiveError::CrcMismatch { expected, actual } => write!(
                f,
                "crc-32 mismatch: expected 0x{:08X}, actual 0x{:08X}",
                expected, actual
            ),
            ArchiveError::SizeMismatch {
                field,
                expected,
                actual,
            } => write!(
                f,
                "{} mismatch: expected {}, actual {}",
                field, expected, actual
            ),
            ArchiveError::InvalidName(name) => write!(f, "invalid entry path {:?}", name),
            ArchiveError::NameTooLong(len) => {
                write!(f, "entry path is {} bytes; the limit is 65535", len)
            }
            ArchiveError::CommentTooLong(len) => {
                write!(f, "comment is {} bytes; the limit is 65535", len)
            }
            ArchiveError::InvalidMode(mode) => write!(f, "invalid unix mode 0o{:o}", mode),
            ArchiveError::BufferTooLarge(len) => {
                write!(f, "buffer of {} bytes exceeds the supported maximum", len)
            }
            ArchiveError::InvalidRange => write!(
                f,
                "byte range is outside the entry or combined with decoding"
            ),
            ArchiveError::CommentContainsSignature => write!(
                f,
                "archive comment contains the end-of-central-directory signature"
            ),
            ArchiveError::InvalidCp437(c) => {
                write!(f, "character {:?} has no cp437 representation", c)
            }
        }
    }
}

impl Debug for ArchiveError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ArchiveError::Io(e) => write!(f, "Io({:?})", e),
            _ => (self as &dyn Display).fmt(f),
        }
    }
}

impl From<std::io::Error> for ArchiveError {
    fn from(value: std::io::Error) -> Self {
        ArchiveError::Io(value)
    }
}

impl std::error::Error for ArchiveError {}
