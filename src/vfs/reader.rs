//! Positioned reads over a shared seekable source.

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Random-access reads that do not disturb any cursor the caller can see.
pub trait ReadAt {
    /// Reads up to `buf.len()` bytes starting at `offset`. Returns 0 at end
    /// of data.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;
}

/// Makes any `Read + Seek` source usable through [`ReadAt`] from several
/// threads.
///
/// Each positioned read takes the lock, seeks, reads once and seeks back to
/// where the source was, so sequential users of the inner reader keep their
/// place.
#[derive(Debug)]
pub struct SharedReader<R> {
    inner: Mutex<R>,
}

impl<R: Read + Seek> SharedReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner: Mutex::new(inner) }
    }

    /// Total length of the source in bytes.
    pub fn len(&self) -> io::Result<u64> {
        let mut r = self.lock();
        let old = r.stream_position()?;
        let end = r.seek(SeekFrom::End(0))?;
        r.seek(SeekFrom::Start(old))?;
        Ok(end)
    }

    pub fn into_inner(self) -> R {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    // A panic mid-read leaves the source at some offset, which every read
    // re-establishes anyway.
    fn lock(&self) -> MutexGuard<'_, R> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<R: Read + Seek> ReadAt for SharedReader<R> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let mut r = self.lock();
        let old = r.stream_position()?;
        r.seek(SeekFrom::Start(offset))?;
        let read = r.read(buf);
        let restored = r.seek(SeekFrom::Start(old));
        let n = read?;
        restored?;
        Ok(n)
    }
}

/// A private cursor over a [`ReadAt`] source of known length.
///
/// Gives readers that want `Read + Seek` (an archive parser, say) their own
/// position, while the source itself stays shared.
pub struct ReadAtCursor<'a, R: ?Sized> {
    src: &'a R,
    pos: u64,
    len: u64,
}

impl<'a, R: ReadAt + ?Sized> ReadAtCursor<'a, R> {
    pub fn new(src: &'a R, len: u64) -> Self {
        Self { src, pos: 0, len }
    }
}

impl<R: ReadAt + ?Sized> Read for ReadAtCursor<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.len.saturating_sub(self.pos);
        let want = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        if want == 0 {
            return Ok(0);
        }
        let n = self.src.read_at(&mut buf[..want], self.pos)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<R: ReadAt + ?Sized> Seek for ReadAtCursor<'_, R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(delta) => self.len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        let Some(target) = target else {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "seek before start"));
        };
        self.pos = target;
        Ok(target)
    }
}

/// Reads `len` bytes from offset 0, or fewer if the source ends early.
pub fn read_all_at(r: &impl ReadAt, len: u64) -> io::Result<Vec<u8>> {
    let len = usize::try_from(len)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "file too large"))?;
    let mut buf = vec![0; len];
    let mut filled = 0;
    while filled < len {
        match r.read_at(&mut buf[filled..], filled as u64) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    buf.truncate(filled);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn read_at_restores_the_cursor() {
        let mut cursor = Cursor::new(b"0123456789".to_vec());
        cursor.set_position(3);
        let shared = SharedReader::new(cursor);

        let mut buf = [0; 4];
        assert_eq!(shared.read_at(&mut buf, 5).unwrap(), 4);
        assert_eq!(&buf, b"5678");
        assert_eq!(shared.into_inner().position(), 3);
    }

    #[test]
    fn read_past_the_end_returns_zero() {
        let shared = SharedReader::new(Cursor::new(b"abc".to_vec()));
        let mut buf = [0; 8];
        assert_eq!(shared.read_at(&mut buf, 10).unwrap(), 0);
        assert_eq!(shared.len().unwrap(), 3);
    }

    #[test]
    fn read_all_stops_at_short_source() {
        let shared = SharedReader::new(Cursor::new(b"hello".to_vec()));
        assert_eq!(read_all_at(&shared, 5).unwrap(), b"hello");
        assert_eq!(read_all_at(&shared, 64).unwrap(), b"hello");
    }

    #[test]
    fn cursors_keep_their_own_position() {
        let shared = SharedReader::new(Cursor::new(b"0123456789".to_vec()));
        let mut a = ReadAtCursor::new(&shared, 10);
        let mut b = ReadAtCursor::new(&shared, 10);

        let mut buf = [0; 3];
        a.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"012");
        assert_eq!(b.seek(SeekFrom::End(-2)).unwrap(), 8);
        b.read_exact(&mut buf[..2]).unwrap();
        assert_eq!(&buf[..2], b"89");
        a.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"345");

        assert_eq!(a.seek(SeekFrom::Current(-6)).unwrap(), 0);
        assert!(a.seek(SeekFrom::Current(-1)).is_err());
        let mut rest = Vec::new();
        b.read_to_end(&mut rest).unwrap();
        assert!(rest.is_empty());
    }

    #[test]
    fn concurrent_positioned_reads() {
        let data: Vec<u8> = (0..=255u8).cycle().take(64 * 1024).collect();
        let shared = SharedReader::new(Cursor::new(data.clone()));

        std::thread::scope(|s| {
            for t in 0..8u64 {
                let shared = &shared;
                let data = &data;
                s.spawn(move || {
                    for i in 0..64u64 {
                        let off = (t * 4096 + i * 61) % (data.len() as u64 - 32);
                        let mut buf = [0; 32];
                        let n = shared.read_at(&mut buf, off).unwrap();
                        assert_eq!(&buf[..n], &data[off as usize..off as usize + n]);
                    }
                });
            }
        });
    }
}
