use std::io::{Read, Write};

use crc32fast::Hasher;
use flate2::{write::DeflateEncoder, Compression};

use crate::{
    compress::common::{compress_common, compress_common_std, write_std},
    compression::{CompressionMethod, Level},
    error::ArchiveError,
};

impl From<Level> for Compression {
    fn from(level: Level) -> Self {
        match level {
            Level::Fastest => Compression::fast(),
            Level::Best => Compression::best(),
            Level::Default => Compression::default(),
            Level::Precise(val) => Compression::new(val),
        }
    }
}

/// Pump the whole payload through the CRC tap and the selected encoder into
/// the sink. Returns the number of payload bytes read; the compressed byte
/// count is the sink's cursor delta.
pub fn compress<'a, R, W>(
    compressor: CompressionMethod,
    writer: &'a mut W,
    reader: &'a mut R,
    hasher: &'a mut Hasher,
    compression_level: Level,
) -> Result<u64, ArchiveError>
where
    R: Read,
    W: Write + ?Sized,
{
    match compressor {
        CompressionMethod::Store() => {
            let total_read = write_std!(writer, hasher, reader);
            Ok(total_read)
        }

        CompressionMethod::Deflate() => {
            let mut encoder = DeflateEncoder::new(writer, compression_level.into());
            let total_read = compress_common_std!(encoder, hasher, reader);
            Ok(total_read)
        }

        CompressionMethod::Unknown(code) => {
            Err(ArchiveError::UnsupportedCompressionMethodCode(code))
        }
    }
}
