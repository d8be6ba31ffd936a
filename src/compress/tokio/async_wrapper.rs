use std::fmt::Debug;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::AsyncWrite;

/// Counts every byte pushed to the async sink.
///
/// The count is the archive cursor, mirroring the sync flavor's wrapper:
/// it only ever advances, by exactly the bytes the sink accepted.
#[derive(Debug)]
pub struct AsyncWriteWrapper<W: AsyncWrite + Unpin> {
    writer: W,
    written_bytes_count: u64,
}

impl<W: AsyncWrite + Unpin> AsyncWriteWrapper<W> {
    pub fn new(writer: W) -> AsyncWriteWrapper<W> {
        Self::with_count(writer, 0)
    }

    /// Start the cursor at `count` instead of zero (append mode).
    pub fn with_count(writer: W, count: u64) -> AsyncWriteWrapper<W> {
        Self {
            writer,
            written_bytes_count: count,
        }
    }

    pub fn get_written_bytes_count(&self) -> u64 {
        self.written_bytes_count
    }

    pub fn retrieve_writer(self) -> W {
        self.writer
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for AsyncWriteWrapper<W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<Result<usize, std::io::Error>> {
        let wrapper = self.get_mut();
        let results = Pin::new(&mut wrapper.writer).poll_write(cx, buf);

        results.map(|poll_result| {
            poll_result.map(|nb_byte_written| {
                wrapper.written_bytes_count += nb_byte_written as u64;
                nb_byte_written
            })
        })
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), std::io::Error>> {
        Pin::new(&mut self.get_mut().writer).poll_flush(cx)
    }

    fn poll_shutdown(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<(), std::io::Error>> {
        Pin::new(&mut self.get_mut().writer).poll_shutdown(cx)
    }
}
