use async_compression::tokio::write::DeflateEncoder;
use crc32fast::Hasher;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    compress::common::{compress_common, compress_common_async, write_async},
    compression::{CompressionMethod, Level},
    error::ArchiveError,
};

impl From<Level> for async_compression::Level {
    fn from(level: Level) -> Self {
        match level {
            Level::Fastest => async_compression::Level::Fastest,
            Level::Best => async_compression::Level::Best,
            Level::Default => async_compression::Level::Default,
            Level::Precise(val) => async_compression::Level::Precise(val as i32),
        }
    }
}

/// Async twin of the sync compressor: pump the payload through the CRC tap
/// and the selected encoder into the sink, returning the payload byte count.
pub async fn compress<'a, R, W>(
    compressor: CompressionMethod,
    writer: &'a mut W,
    reader: &'a mut R,
    hasher: &'a mut Hasher,
    compression_level: Level,
) -> Result<u64, ArchiveError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    match compressor {
        CompressionMethod::Store() => {
            let total_read = write_async!(writer, hasher, reader);
            Ok(total_read)
        }

        CompressionMethod::Deflate() => {
            let mut encoder = DeflateEncoder::with_quality(writer, compression_level.into());
            let total_read = compress_common_async!(encoder, hasher, reader);
            Ok(total_read)
        }

        CompressionMethod::Unknown(code) => {
            Err(ArchiveError::UnsupportedCompressionMethodCode(code))
        }
    }
}
