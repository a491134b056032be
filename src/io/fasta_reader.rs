// FASTA reader module using bio::io::fasta
//
// Loads one sequence per input file, with:
// - Automatic gzip detection by file extension
// - Uppercasing and replacement of ambiguous N bases by random letters,
//   so the core only ever sees {A,C,G,T}

use bio::io::fasta;
use flate2::read::GzDecoder;
use rand::Rng;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use crate::error::{AnchorError, Result};

/// A loaded input sequence: header line plus sanitized bases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    pub header: String,
    pub seq: Vec<u8>,
}

impl SequenceRecord {
    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }
}

/// FASTA reader with automatic gzip detection
pub struct FastaReader {
    records: fasta::Records<BufReader<Box<dyn Read>>>,
}

impl FastaReader {
    /// Open a FASTA file (auto-detects gzip by .gz extension)
    pub fn new(path: &Path) -> io::Result<Self> {
        const BUFFER_SIZE: usize = 4 * 1024 * 1024; // 4MB buffer

        let file = File::open(path)?;
        let reader: Box<dyn Read> = if path.extension().and_then(|s| s.to_str()) == Some("gz") {
            Box::new(BufReader::with_capacity(BUFFER_SIZE, GzDecoder::new(file)))
        } else {
            Box::new(BufReader::with_capacity(BUFFER_SIZE, file))
        };

        let fasta_reader = fasta::Reader::new(reader);

        Ok(Self {
            records: fasta_reader.records(),
        })
    }

    /// Read the next FASTA record
    ///
    /// Returns `Ok(Some(record))` if a record is found, `Ok(None)` at EOF,
    /// and `Err(e)` on a parse error.
    pub fn read_record(&mut self) -> io::Result<Option<fasta::Record>> {
        match self.records.next() {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(io::Error::new(io::ErrorKind::Other, e)),
            None => Ok(None),
        }
    }
}

/// Load the first sequence of a FASTA file and sanitize it for the core.
///
/// Every `N`/`n` byte is replaced by a uniformly random letter from
/// {A,C,G,T} and the sequence is uppercased before validation; any other
/// byte outside the alphabet is an input error.
pub fn load_sequence(path: &Path) -> Result<SequenceRecord> {
    let mut reader = FastaReader::new(path).map_err(|e| {
        AnchorError::InvalidInput(format!("cannot open FASTA {}: {}", path.display(), e))
    })?;

    let record = match reader.read_record() {
        Ok(Some(record)) => record,
        Ok(None) => {
            return Err(AnchorError::InvalidInput(format!(
                "no sequence record in {}",
                path.display()
            )))
        }
        Err(e) => {
            return Err(AnchorError::InvalidInput(format!(
                "malformed FASTA {}: {}",
                path.display(),
                e
            )))
        }
    };

    let mut header = record.id().to_string();
    if let Some(desc) = record.desc() {
        header.push(' ');
        header.push_str(desc);
    }

    let mut seq = record.seq().to_vec();
    sanitize_sequence(&mut seq)?;

    log::info!("Loaded {} ({} bp) from {}", header, seq.len(), path.display());

    Ok(SequenceRecord { header, seq })
}

/// Uppercase the sequence, randomize ambiguous bases, and validate the
/// remaining alphabet.
pub fn sanitize_sequence(seq: &mut [u8]) -> Result<()> {
    const BASES: [u8; 4] = *b"ACGT";
    let mut rng = rand::thread_rng();

    for (i, base) in seq.iter_mut().enumerate() {
        *base = base.to_ascii_uppercase();
        if *base == b'N' {
            *base = BASES[rng.gen_range(0..4)];
        } else if !BASES.contains(base) {
            return Err(AnchorError::InvalidInput(format!(
                "illegal byte 0x{:02x} at sequence offset {}",
                *base, i
            )));
        }
    }

    Ok(())
}
