//! Random-access input for book files.
//!
//! A [`ByteSource`] can be read at arbitrary offsets from several threads at
//! once, which is what lets the package handler decompress content documents
//! concurrently without sharing a cursor.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

/// A thread-safe, random-access source of bytes.
pub trait ByteSource: Send + Sync {
    /// Total length of the source in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill `buf` with bytes starting at `offset`.
    ///
    /// Must not depend on or modify any cursor position.
    fn read_at_into(&self, offset: u64, buf: &mut [u8]) -> io::Result<()>;

    /// Read exactly `len` bytes starting at `offset`.
    fn read_at(&self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_at_into(offset, &mut buf)?;
        Ok(buf)
    }

    /// Read the whole source.
    fn read_all(&self) -> io::Result<Vec<u8>> {
        let len = usize::try_from(self.len())
            .map_err(|_| io::Error::new(io::ErrorKind::OutOfMemory, "source too large"))?;
        self.read_at(0, len)
    }
}

/// A file on disk, read with positional reads.
pub struct FileSource {
    file: File,
    len: u64,
}

impl FileSource {
    pub fn new(file: File) -> io::Result<Self> {
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }
}

impl ByteSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    #[cfg(unix)]
    fn read_at_into(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        use std::os::unix::fs::FileExt;
        self.file.read_exact_at(buf, offset)
    }

    #[cfg(windows)]
    fn read_at_into(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        use std::os::windows::fs::FileExt;
        let mut filled = 0;
        while filled < buf.len() {
            let read = self
                .file
                .seek_read(&mut buf[filled..], offset + filled as u64)?;
            if read == 0 {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "not enough data"));
            }
            filled += read;
        }
        Ok(())
    }

    #[cfg(all(not(unix), not(windows)))]
    fn read_at_into(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let mut file = self.file.try_clone()?;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)
    }
}

/// An in-memory source.
pub struct MemorySource {
    data: Vec<u8>,
}

impl MemorySource {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl ByteSource for MemorySource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at_into(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        let chunk = start
            .checked_add(buf.len())
            .and_then(|end| self.data.get(start..end))
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "not enough data"))?;
        buf.copy_from_slice(chunk);
        Ok(())
    }
}

/// Stateful `Read + Seek` view over a shared [`ByteSource`].
///
/// Used to hand a source to `zip::ZipArchive` for the central directory scan.
pub struct ByteSourceCursor {
    inner: Arc<dyn ByteSource>,
    position: u64,
}

impl ByteSourceCursor {
    pub fn new(inner: Arc<dyn ByteSource>) -> Self {
        Self { inner, position: 0 }
    }
}

impl Read for ByteSourceCursor {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let total = self.inner.len();
        if self.position >= total {
            return Ok(0);
        }

        let n = (total - self.position).min(buf.len() as u64) as usize;
        self.inner.read_at_into(self.position, &mut buf[..n])?;
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for ByteSourceCursor {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::End(delta) => self.inner.len().checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };

        match target {
            Some(p) => {
                self.position = p;
                Ok(p)
            }
            None => Err(io::Error::new(io::ErrorKind::InvalidInput, "seek before 0")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_read_at() {
        let source = MemorySource::new(b"hello world".to_vec());
        assert_eq!(source.read_at(6, 5).unwrap(), b"world");
        assert!(source.read_at(8, 5).is_err());
        assert_eq!(source.read_all().unwrap(), b"hello world");
    }

    #[test]
    fn test_file_source_read_at() {
        use std::io::Write;

        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"abcdef").unwrap();
        let source = FileSource::new(tmp.reopen().unwrap()).unwrap();

        assert_eq!(source.len(), 6);
        assert_eq!(source.read_at(1, 3).unwrap(), b"bcd");
    }

    #[test]
    fn test_cursor_read_and_seek() {
        let source: Arc<dyn ByteSource> = Arc::new(MemorySource::new(b"0123456789".to_vec()));
        let mut cursor = ByteSourceCursor::new(source);

        cursor.seek(SeekFrom::End(-3)).unwrap();
        let mut tail = String::new();
        cursor.read_to_string(&mut tail).unwrap();
        assert_eq!(tail, "789");

        assert!(cursor.seek(SeekFrom::Current(-20)).is_err());
    }
}
