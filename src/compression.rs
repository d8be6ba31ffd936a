use std::fmt::Display;

use crate::error::ArchiveError;

pub const STORE: u16 = 0;
pub const DEFLATE: u16 = 8;

/// An entry's compression method as stored in its headers.
///
/// Only `Store` and `Deflate` payloads can be produced or decoded; any other
/// method code round-trips as `Unknown` metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Store(),
    Deflate(),
    Unknown(u16),
}

impl CompressionMethod {
    pub fn zip_code(&self) -> u16 {
        match self {
            CompressionMethod::Store() => STORE,
            CompressionMethod::Deflate() => DEFLATE,
            CompressionMethod::Unknown(compression_method) => *compression_method,
        }
    }

    pub fn from_compression_method(compression_method: u16) -> CompressionMethod {
        match compression_method {
            STORE => CompressionMethod::Store(),
            DEFLATE => CompressionMethod::Deflate(),
            _ => CompressionMethod::Unknown(compression_method),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            CompressionMethod::Store() => "store",
            CompressionMethod::Deflate() => "deflate",
            CompressionMethod::Unknown(_) => "unknown",
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, CompressionMethod::Unknown(_))
    }

    /// Fails when the method cannot drive a write or validated-read pipeline.
    pub fn supported(&self) -> Result<(), ArchiveError> {
        match self {
            CompressionMethod::Unknown(code) => {
                Err(ArchiveError::UnsupportedCompressionMethodCode(*code))
            }
            _ => Ok(()),
        }
    }
}

impl Display for CompressionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Deflate effort, mapped onto the backend encoder's own scale.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Fastest,
    Best,
    Default,
    Precise(u32),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn method_codes_round_trip() {
        assert_eq!(CompressionMethod::Store().zip_code(), 0);
        assert_eq!(CompressionMethod::Deflate().zip_code(), 8);
        assert_eq!(
            CompressionMethod::from_compression_method(8),
            CompressionMethod::Deflate()
        );
        assert_eq!(
            CompressionMethod::from_compression_method(14),
            CompressionMethod::Unknown(14)
        );
    }

    #[test]
    fn unknown_method_is_unsupported() {
        assert!(CompressionMethod::Unknown(12).supported().is_err());
        assert!(CompressionMethod::Store().supported().is_ok());
        assert!(CompressionMethod::Deflate().supported().is_ok());
    }
}
