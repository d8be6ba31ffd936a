use std::io::{self, Read};

use crc32fast::Hasher;

use super::source::RandomAccess;
use crate::error::ArchiveError;

/// How to open one entry's payload stream.
///
/// `start`/`end` address the *compressed* byte range and are only usable on
/// raw (non-decoded) reads. `decompress` defaults to whatever the entry's
/// method calls for; `decrypt: false` asks for an encrypted entry's raw
/// bytes instead of an error. `validate_data` defaults to on whenever the
/// stream yields the entry's full uncompressed form.
#[derive(Debug, Default, Clone)]
pub struct EntryReadOptions {
    pub start: Option<u64>,
    pub end: Option<u64>,
    pub decompress: Option<bool>,
    pub decrypt: Option<bool>,
    pub validate_data: Option<bool>,
}

impl EntryReadOptions {
    /// First compressed byte to read (inclusive).
    pub fn start(mut self, start: u64) -> Self {
        self.start = Some(start);
        self
    }

    /// One past the last compressed byte to read.
    pub fn end(mut self, end: u64) -> Self {
        self.end = Some(end);
        self
    }

    pub fn decompress(mut self, decompress: bool) -> Self {
        self.decompress = Some(decompress);
        self
    }

    pub fn decrypt(mut self, decrypt: bool) -> Self {
        self.decrypt = Some(decrypt);
        self
    }

    pub fn validate_data(mut self, validate: bool) -> Self {
        self.validate_data = Some(validate);
        self
    }
}

/// One entry's payload as a lazy byte stream.
///
/// Composed of a ranged read over the source, optionally a raw-deflate
/// decoder, optionally a validating tap; validation errors surface from the
/// `read` call that hits end-of-stream.
pub struct EntryReader<'a> {
    inner: Box<dyn Read + 'a>,
}

impl<'a> EntryReader<'a> {
    pub(crate) fn new(inner: Box<dyn Read + 'a>) -> Self {
        Self { inner }
    }
}

impl Read for EntryReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

/// Reads a fixed byte range of the source through positioned reads.
pub(crate) struct RangeReader<'a, R: RandomAccess + ?Sized> {
    source: &'a R,
    position: u64,
    remaining: u64,
}

impl<'a, R: RandomAccess + ?Sized> RangeReader<'a, R> {
    pub(crate) fn new(source: &'a R, position: u64, length: u64) -> Self {
        Self {
            source,
            position,
            remaining: length,
        }
    }
}

impl<R: RandomAccess + ?Sized> Read for RangeReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let want = buf.len().min(self.remaining.min(usize::MAX as u64) as usize);
        let read = self.source.read_at(self.position, &mut buf[..want])?;
        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "source ended inside the entry's byte range",
            ));
        }

        self.position += read as u64;
        self.remaining -= read as u64;
        Ok(read)
    }
}

/// Accumulates CRC-32 and byte count, checking both against the central
/// directory at end-of-stream and failing early on an over-long stream.
pub(crate) struct ValidatingReader<R: Read> {
    inner: R,
    hasher: Hasher,
    count: u64,
    expected_crc32: u32,
    expected_size: u64,
}

impl<R: Read> ValidatingReader<R> {
    pub(crate) fn new(inner: R, expected_crc32: u32, expected_size: u64) -> Self {
        Self {
            inner,
            hasher: Hasher::new(),
            count: 0,
            expected_crc32,
            expected_size,
        }
    }
}

impl<R: Read> Read for ValidatingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let read = self.inner.read(buf)?;
        if read == 0 {
            if self.count != self.expected_size {
                return Err(invalid_data(ArchiveError::SizeMismatch {
                    field: "uncompressed size",
                    expected: self.expected_size,
                    actual: self.count,
                }));
            }
            let actual = self.hasher.clone().finalize();
            if actual != self.expected_crc32 {
                return Err(invalid_data(ArchiveError::CrcMismatch {
                    expected: self.expected_crc32,
                    actual,
                }));
            }
            return Ok(0);
        }

        self.count += read as u64;
        if self.count > self.expected_size {
            return Err(invalid_data(ArchiveError::SizeMismatch {
                field: "uncompressed size",
                expected: self.expected_size,
                actual: self.count,
            }));
        }
        self.hasher.update(&buf[..read]);
        Ok(read)
    }
}

fn invalid_data(error: ArchiveError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, error)
}
