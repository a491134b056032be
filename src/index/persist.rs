// Index cache serialization.
//
// Single little-endian binary file: a magic number and version word,
// the scalar lengths, then length-prefixed records for the text and each
// array, and finally the RMQ tables. Loading validates the structural
// invariants of every record and that the cache was built for the same
// input pair; any mismatch surfaces as CorruptCache so the caller can
// rebuild instead of aborting.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use super::{validate_index, AnchorIndex, Concatenation};
use crate::error::{AnchorError, Result};
use crate::rmq::Rmq;
use crate::utils::{BinaryRead, BinaryWrite};

/// `b"SQANCHR1"` little-endian.
const INDEX_MAGIC: u64 = u64::from_le_bytes(*b"SQANCHR1");
const INDEX_VERSION: u32 = 1;

impl AnchorIndex {
    /// Serialize the whole index to `path`.
    pub fn dump(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut writer = BufWriter::new(File::create(path)?);
        self.serialize(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub(crate) fn serialize<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_u64_le(INDEX_MAGIC)?;
        writer.write_u32_le(INDEX_VERSION)?;
        writer.write_u64_le(self.concat.total_len() as u64)?;
        writer.write_u64_le(self.concat.first_len as u64)?;
        writer.write_u64_le(self.concat.second_len as u64)?;
        writer.write_bytes_le(&self.concat.text)?;
        writer.write_usize_vec_le(&self.sa)?;
        writer.write_usize_vec_le(&self.lcp)?;
        writer.write_bytes_le(&self.da)?;
        writer.write_usize_vec_le(&self.isa)?;
        self.rmq.serialize(writer)
    }

    /// Load and validate a cache blob, checking it was built for
    /// `expected` (the concatenation of the current input pair).
    pub fn load(path: &Path, expected: &Concatenation) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::deserialize(&mut reader, expected)
    }

    pub(crate) fn deserialize<R: Read>(reader: &mut R, expected: &Concatenation) -> Result<Self> {
        let magic = reader.read_u64_le()?;
        if magic != INDEX_MAGIC {
            return Err(AnchorError::InvalidInput(format!(
                "bad cache magic 0x{:016x}",
                magic
            )));
        }
        let version = reader.read_u32_le()?;
        if version != INDEX_VERSION {
            return Err(AnchorError::CorruptCache(format!(
                "unsupported cache version {}",
                version
            )));
        }

        let total_len = reader.read_u64_le()? as usize;
        let first_len = reader.read_u64_le()? as usize;
        let second_len = reader.read_u64_le()? as usize;
        let text = reader.read_bytes_le()?;
        if text.len() != total_len {
            return Err(AnchorError::CorruptCache(
                "text length does not match its record".into(),
            ));
        }
        if first_len != expected.first_len
            || second_len != expected.second_len
            || text != expected.text
        {
            return Err(AnchorError::CorruptCache(
                "cache was built for a different sequence pair".into(),
            ));
        }

        let sa = reader.read_usize_vec_le()?;
        let lcp = Arc::new(reader.read_usize_vec_le()?);
        let da = reader.read_bytes_le()?;
        let isa = reader.read_usize_vec_le()?;
        let rmq = Rmq::deserialize(reader, Arc::clone(&lcp))?;

        let index = AnchorIndex {
            concat: Concatenation::from_raw(text, first_len, second_len),
            sa,
            lcp,
            da,
            isa,
            rmq,
        };
        validate_index(&index)?;
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_index() -> AnchorIndex {
        let concat = Concatenation::new(b"ACGTACGTGGCA", b"ACGTTCGTGGCA").unwrap();
        AnchorIndex::build(concat, 0)
    }

    #[test]
    fn round_trip_is_structurally_equal() {
        let index = test_index();
        let mut buf = Vec::new();
        index.serialize(&mut buf).unwrap();

        let restored = AnchorIndex::deserialize(&mut buf.as_slice(), &index.concat).unwrap();
        assert_eq!(index, restored);
    }

    #[test]
    fn bad_magic_is_invalid_input() {
        let index = test_index();
        let mut buf = Vec::new();
        index.serialize(&mut buf).unwrap();
        buf[0] ^= 0xFF;

        assert!(matches!(
            AnchorIndex::deserialize(&mut buf.as_slice(), &index.concat),
            Err(AnchorError::InvalidInput(_))
        ));
    }

    #[test]
    fn different_input_pair_is_corrupt_cache() {
        let index = test_index();
        let mut buf = Vec::new();
        index.serialize(&mut buf).unwrap();

        let other = Concatenation::new(b"ACGTACGTGGCA", b"ACGTTCGTGGCC").unwrap();
        assert!(matches!(
            AnchorIndex::deserialize(&mut buf.as_slice(), &other),
            Err(AnchorError::CorruptCache(_))
        ));
    }

    #[test]
    fn damaged_array_is_corrupt_cache() {
        let index = test_index();
        let mut buf = Vec::new();
        index.serialize(&mut buf).unwrap();

        // Flip one byte inside the SA record
        let offset = 8 + 4 + 8 * 3 + 8 + index.concat.total_len() + 8 + 4;
        buf[offset] ^= 0xFF;
        assert!(matches!(
            AnchorIndex::deserialize(&mut buf.as_slice(), &index.concat),
            Err(AnchorError::CorruptCache(_))
        ));
    }
}
