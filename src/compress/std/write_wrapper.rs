use std::io::Write;

/// Counts every byte pushed to the sink.
///
/// The count is the archive cursor: entry offsets and the central
/// directory offset are read off it, so it must only ever advance.
#[derive(Debug)]
pub struct WriteWrapper<W: Write> {
    writer: W,
    written_bytes_count: u64,
}

impl<W: Write> WriteWrapper<W> {
    pub fn new(writer: W) -> WriteWrapper<W> {
        Self::with_count(writer, 0)
    }

    /// Start the cursor at `count` instead of zero, for sinks that already
    /// hold that many archive bytes (append mode).
    pub fn with_count(writer: W, count: u64) -> WriteWrapper<W> {
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

impl<W: Write> Write for WriteWrapper<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let nb_byte_written = self.writer.write(buf)?;
        self.written_bytes_count += nb_byte_written as u64;
        Ok(nb_byte_written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}
