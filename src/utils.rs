use std::io::{self, Read, Write};
use std::time::{SystemTime, UNIX_EPOCH};

/// Binary I/O trait for writing little-endian values.
/// Reduces boilerplate in serialization code (index cache, RMQ tables).
pub trait BinaryWrite: Write {
    /// Write a u64 in little-endian format
    #[inline]
    fn write_u64_le(&mut self, val: u64) -> io::Result<()> {
        self.write_all(&val.to_le_bytes())
    }

    /// Write a u32 in little-endian format
    #[inline]
    fn write_u32_le(&mut self, val: u32) -> io::Result<()> {
        self.write_all(&val.to_le_bytes())
    }

    /// Write a u8 (single byte)
    #[inline]
    fn write_u8_le(&mut self, val: u8) -> io::Result<()> {
        self.write_all(&[val])
    }

    /// Write a `usize` slice as a length-prefixed run of little-endian u64
    fn write_usize_vec_le(&mut self, vals: &[usize]) -> io::Result<()> {
        self.write_u64_le(vals.len() as u64)?;
        for &val in vals {
            self.write_u64_le(val as u64)?;
        }
        Ok(())
    }

    /// Write a byte slice with a u64 length prefix
    fn write_bytes_le(&mut self, vals: &[u8]) -> io::Result<()> {
        self.write_u64_le(vals.len() as u64)?;
        self.write_all(vals)
    }
}

/// Blanket implementation for all types that implement Write
impl<W: Write + ?Sized> BinaryWrite for W {}

/// Read-side counterpart of [`BinaryWrite`].
pub trait BinaryRead: Read {
    /// Read a little-endian u64
    #[inline]
    fn read_u64_le(&mut self) -> io::Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Read a little-endian u32
    #[inline]
    fn read_u32_le(&mut self) -> io::Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Read a single byte
    #[inline]
    fn read_u8_le(&mut self) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    /// Read a length-prefixed run of little-endian u64 into a `usize` vector
    fn read_usize_vec_le(&mut self) -> io::Result<Vec<usize>> {
        let len = self.read_u64_le()? as usize;
        let mut vals = Vec::with_capacity(len.min(MAX_PREALLOC));
        for _ in 0..len {
            vals.push(self.read_u64_le()? as usize);
        }
        Ok(vals)
    }

    /// Read a length-prefixed byte vector
    fn read_bytes_le(&mut self) -> io::Result<Vec<u8>> {
        let len = self.read_u64_le()? as usize;
        // A length prefix from a damaged file must not trigger a huge
        // up-front allocation; grow incrementally past the cap instead.
        let mut vals = vec![0u8; len.min(MAX_PREALLOC)];
        self.read_exact(&mut vals)?;
        if len > MAX_PREALLOC {
            let mut remaining = self.take((len - MAX_PREALLOC) as u64);
            remaining.read_to_end(&mut vals)?;
            if vals.len() != len {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "truncated byte vector",
                ));
            }
        }
        Ok(vals)
    }
}

// Cap for up-front allocations while deserializing untrusted lengths.
const MAX_PREALLOC: usize = 1 << 26;

/// Blanket implementation for all types that implement Read
impl<R: Read + ?Sized> BinaryRead for R {}

pub fn realtime() -> f64 {
    let now = SystemTime::now();
    let since_epoch = now.duration_since(UNIX_EPOCH).expect("Time went backwards");
    since_epoch.as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn scalar_round_trip() {
        let mut buf = Cursor::new(Vec::new());
        buf.write_u64_le(0x0123_4567_89AB_CDEF).unwrap();
        buf.write_u32_le(0xDEAD_BEEF).unwrap();
        buf.write_u8_le(0x7F).unwrap();

        buf.set_position(0);
        assert_eq!(buf.read_u64_le().unwrap(), 0x0123_4567_89AB_CDEF);
        assert_eq!(buf.read_u32_le().unwrap(), 0xDEAD_BEEF);
        assert_eq!(buf.read_u8_le().unwrap(), 0x7F);
    }

    #[test]
    fn vec_round_trip() {
        let vals = vec![0usize, 1, 42, usize::MAX >> 1];
        let bytes = vec![0u8, 255, 3, 9];

        let mut buf = Cursor::new(Vec::new());
        buf.write_usize_vec_le(&vals).unwrap();
        buf.write_bytes_le(&bytes).unwrap();

        buf.set_position(0);
        assert_eq!(buf.read_usize_vec_le().unwrap(), vals);
        assert_eq!(buf.read_bytes_le().unwrap(), bytes);
    }

    #[test]
    fn truncated_vec_is_an_error() {
        let mut buf = Cursor::new(Vec::new());
        buf.write_u64_le(10).unwrap();
        buf.write_u64_le(1).unwrap();

        buf.set_position(0);
        assert!(buf.read_usize_vec_le().is_err());
    }
}
