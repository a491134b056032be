// Boundary to the inter-anchor aligner.
//
// The core never aligns gap intervals itself; it hands the two gap
// substrings to a `GapAligner` implementation and stitches the returned
// CIGARs together with a synthetic sequence-match run per anchor. CIGAR
// operations travel as packed u32 words: operation code in the low 4
// bits, run length in the high 28.

use crate::anchor::{chain_to_gap_intervals, Interval, RareMatchPair};
use crate::error::{AnchorError, Result};

/// One packed CIGAR operation.
pub type CigarUnit = u32;
/// A full CIGAR string in packed form.
pub type Cigar = Vec<CigarUnit>;

/// Pack an operation character and its run length.
pub fn cigar_to_int(operation: char, len: u32) -> CigarUnit {
    let op_code: u32 = match operation {
        'M' => 0x0,
        'I' => 0x1,
        'D' => 0x2,
        '=' => 0x7,
        'X' => 0x8,
        _ => 0xF,
    };
    (len << 4) | op_code
}

/// Unpack an operation character and its run length.
pub fn int_to_cigar(unit: CigarUnit) -> (char, u32) {
    let operation = match unit & 0xF {
        0x0 => 'M',
        0x1 => 'I',
        0x2 => 'D',
        0x7 => '=',
        0x8 => 'X',
        _ => '?',
    };
    (operation, unit >> 4)
}

/// Render a packed CIGAR as text.
pub fn cigar_to_string(cigar: &[CigarUnit]) -> String {
    let mut out = String::with_capacity(cigar.len() * 4);
    for &unit in cigar {
        let (operation, len) = int_to_cigar(unit);
        out.push_str(&len.to_string());
        out.push(operation);
    }
    out
}

/// Exact gap-affine aligner over two byte strings. Implementations are
/// external to the core.
pub trait GapAligner {
    fn align(&self, first: &[u8], second: &[u8]) -> Result<Cigar>;
}

/// Drives a `GapAligner` over the gap intervals between anchors and
/// combines the results into one alignment of the full sequence pair.
pub struct PairAligner<A: GapAligner> {
    aligner: A,
}

impl<A: GapAligner> PairAligner<A> {
    pub fn new(aligner: A) -> Self {
        PairAligner { aligner }
    }

    /// Align the two sequences around a post-processed anchor chain
    /// (second positions global, as returned by the anchor search).
    pub fn align_pair(
        &self,
        first: &[u8],
        second: &[u8],
        anchors: &[RareMatchPair],
    ) -> Result<Cigar> {
        let interval = Interval::new(0, first.len(), 0, second.len());
        let gaps = chain_to_gap_intervals(anchors, &interval, first.len())?;

        let mut combined = Cigar::new();
        for (k, gap) in gaps.iter().enumerate() {
            let gap_cigar = self.align_gap(first, second, gap)?;
            for unit in gap_cigar {
                push_merged(&mut combined, unit);
            }
            if k < anchors.len() {
                let len = u32::try_from(anchors[k].match_length).map_err(|_| {
                    AnchorError::Internal("anchor length exceeds the CIGAR range".into())
                })?;
                push_merged(&mut combined, cigar_to_int('=', len));
            }
        }
        Ok(combined)
    }

    /// Empty gap sides reduce to pure insertions or deletions without
    /// consulting the aligner.
    fn align_gap(&self, first: &[u8], second: &[u8], gap: &Interval) -> Result<Cigar> {
        if gap.len1 == 0 && gap.len2 == 0 {
            return Ok(Cigar::new());
        }
        if gap.len1 == 0 {
            return Ok(vec![cigar_to_int('I', gap.len2 as u32)]);
        }
        if gap.len2 == 0 {
            return Ok(vec![cigar_to_int('D', gap.len1 as u32)]);
        }

        let sub_first = &first[gap.pos1..gap.pos1 + gap.len1];
        let sub_second = &second[gap.pos2..gap.pos2 + gap.len2];
        self.aligner.align(sub_first, sub_second)
    }
}

/// Append one unit, fusing it into the tail when the operation matches.
fn push_merged(cigar: &mut Cigar, unit: CigarUnit) {
    let (operation, len) = int_to_cigar(unit);
    if len == 0 {
        return;
    }
    if let Some(last) = cigar.last_mut() {
        let (last_op, last_len) = int_to_cigar(*last);
        if last_op == operation {
            *last = cigar_to_int(operation, last_len + len);
            return;
        }
    }
    cigar.push(unit);
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test double: walks the shorter diagonal byte by byte, then pads
    /// the remainder with an indel run.
    struct DiagonalAligner;

    impl GapAligner for DiagonalAligner {
        fn align(&self, first: &[u8], second: &[u8]) -> Result<Cigar> {
            let mut cigar = Cigar::new();
            let diagonal = first.len().min(second.len());
            for i in 0..diagonal {
                let operation = if first[i] == second[i] { '=' } else { 'X' };
                push_merged(&mut cigar, cigar_to_int(operation, 1));
            }
            if second.len() > diagonal {
                push_merged(&mut cigar, cigar_to_int('I', (second.len() - diagonal) as u32));
            }
            if first.len() > diagonal {
                push_merged(&mut cigar, cigar_to_int('D', (first.len() - diagonal) as u32));
            }
            Ok(cigar)
        }
    }

    fn pair(first_pos: usize, second_pos: usize, match_length: usize) -> RareMatchPair {
        RareMatchPair {
            first_pos,
            second_pos,
            match_length,
            weight: match_length as f64,
        }
    }

    #[test]
    fn pack_round_trip() {
        for &(operation, len) in &[('M', 1u32), ('I', 12), ('D', 3), ('=', 1000), ('X', 7)] {
            let unit = cigar_to_int(operation, len);
            assert_eq!(int_to_cigar(unit), (operation, len));
        }
        assert_eq!(int_to_cigar(cigar_to_int('S', 5)).0, '?');
    }

    #[test]
    fn cigar_rendering() {
        let cigar = vec![cigar_to_int('=', 4), cigar_to_int('X', 1), cigar_to_int('=', 3)];
        assert_eq!(cigar_to_string(&cigar), "4=1X3=");
    }

    #[test]
    fn anchors_become_sequence_match_runs() {
        // first:  ACGTACGT
        // second: ACGTTCGT, anchors (0,0,4) and (5,5,3) in local terms
        let first = b"ACGTACGT";
        let second = b"ACGTTCGT";
        let anchors = vec![pair(0, 9, 4), pair(5, 14, 3)];

        let aligner = PairAligner::new(DiagonalAligner);
        let cigar = aligner.align_pair(first, second, &anchors).unwrap();
        assert_eq!(cigar_to_string(&cigar), "4=1X3=");
    }

    #[test]
    fn empty_sides_become_indels() {
        // second carries an extra base between the anchors
        let first = b"ACGTACGT";
        let second = b"ACGTCACGT";
        let anchors = vec![pair(0, 9, 4), pair(4, 14, 4)];

        let aligner = PairAligner::new(DiagonalAligner);
        let cigar = aligner.align_pair(first, second, &anchors).unwrap();
        assert_eq!(cigar_to_string(&cigar), "4=1I4=");
    }

    #[test]
    fn no_anchors_aligns_the_whole_pair() {
        let aligner = PairAligner::new(DiagonalAligner);
        let cigar = aligner.align_pair(b"ACAC", b"GTGT", &[]).unwrap();
        assert_eq!(cigar_to_string(&cigar), "4X");
    }
}
