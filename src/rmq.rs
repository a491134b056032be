// Constant-time range-minimum queries over the LCP array.
//
// Linear-space block decomposition: the LCP array is cut into blocks of
// ~1.5*log2(N) elements. A sparse table answers queries over whole blocks,
// per-element prefix/suffix minima cover the partial blocks at either end,
// and queries that fall inside a single block resolve through a per-element
// 64-bit bitmask of suffix-minimum positions (one ctz instruction).

use std::io::{Read, Write};
use std::sync::Arc;

use rayon::prelude::*;

use crate::error::{AnchorError, Result};
use crate::utils::{BinaryRead, BinaryWrite};

// Upper bound on sparse-table levels; 2^32 blocks is far beyond any input.
const MAXM: usize = 32;

// The in-block bitmask is a u64, so a block never exceeds 63 elements.
const MAX_BLOCK_SIZE: usize = 63;

/// Range-minimum-query structure over the LCP array.
///
/// O(N) space, O(N) construction, O(1) `query_min`.
#[derive(Debug, Clone, PartialEq)]
pub struct Rmq {
    lcp: Arc<Vec<usize>>,
    n: usize,
    block_size: usize,
    block_count: usize,
    /// pow[k] = 2^k
    pow: Vec<usize>,
    /// log[c] = floor(log2 c), indexed by block count
    log: Vec<usize>,
    /// Minimum from the block start up to each element
    pre: Vec<usize>,
    /// Minimum from each element to the block end
    sub: Vec<usize>,
    /// Block id of each element
    belong: Vec<usize>,
    /// Position of each element within its block
    pos: Vec<usize>,
    /// Bit j of f[i] is set iff the element at block position j is the
    /// minimum of the block slice [j ..= pos[i]]
    f: Vec<u64>,
    /// st[k][b] = minimum over blocks [b, b + 2^k)
    st: Vec<Vec<usize>>,
}

impl Rmq {
    /// Build the structure over `lcp`. Block preprocessing runs in
    /// parallel per block when `parallel` is set; the sparse-table levels
    /// are sequential because each level depends on the previous one.
    pub fn new(lcp: Arc<Vec<usize>>, parallel: bool) -> Self {
        let n = lcp.len();
        let block_size = if n < 2 {
            1
        } else {
            (((n as f64).log2() * 1.5) as usize).clamp(1, MAX_BLOCK_SIZE)
        };
        let block_count = n.div_ceil(block_size);

        let mut pow = vec![0usize; MAXM];
        pow[0] = 1;
        for k in 1..MAXM {
            pow[k] = pow[k - 1] * 2;
        }

        let mut log = vec![0usize; block_count + 1];
        for c in 2..=block_count {
            log[c] = log[c / 2] + 1;
        }

        let mut belong = vec![0usize; n];
        let mut pos = vec![0usize; n];
        for i in 0..n {
            belong[i] = i / block_size;
            pos[i] = i % block_size;
        }

        let mut pre = vec![0usize; n];
        let mut sub = vec![0usize; n];
        let mut f = vec![0u64; n];
        if parallel {
            pre.par_chunks_mut(block_size)
                .zip(sub.par_chunks_mut(block_size))
                .zip(f.par_chunks_mut(block_size))
                .zip(lcp.par_chunks(block_size))
                .for_each(|(((pre_blk, sub_blk), f_blk), lcp_blk)| {
                    build_block(lcp_blk, pre_blk, sub_blk, f_blk);
                });
        } else {
            pre.chunks_mut(block_size)
                .zip(sub.chunks_mut(block_size))
                .zip(f.chunks_mut(block_size))
                .zip(lcp.chunks(block_size))
                .for_each(|(((pre_blk, sub_blk), f_blk), lcp_blk)| {
                    build_block(lcp_blk, pre_blk, sub_blk, f_blk);
                });
        }

        // Level 0 holds the per-block minima; level k doubles the span.
        let levels = log[block_count] + 1;
        let mut st = vec![vec![usize::MAX; block_count]; levels];
        for (b, lcp_blk) in lcp.chunks(block_size).enumerate() {
            st[0][b] = lcp_blk.iter().copied().min().unwrap_or(usize::MAX);
        }
        for k in 1..levels {
            for b in 0..block_count {
                if b + pow[k] <= block_count {
                    st[k][b] = st[k - 1][b].min(st[k - 1][b + pow[k - 1]]);
                }
            }
        }

        Rmq {
            lcp,
            n,
            block_size,
            block_count,
            pow,
            log,
            pre,
            sub,
            belong,
            pos,
            f,
            st,
        }
    }

    /// Minimum of `LCP[l ..= r]`. Querying with `l > r` or `r` out of
    /// range is a contract violation.
    #[inline]
    pub fn query_min(&self, l: usize, r: usize) -> usize {
        assert!(
            l <= r && r < self.n,
            "RMQ queried with an invalid range [{}, {}] (len {})",
            l,
            r,
            self.n
        );

        let bl = self.belong[l];
        let br = self.belong[r];
        if bl == br {
            let mask = self.f[r] >> self.pos[l];
            let idx = l + mask.trailing_zeros() as usize;
            return self.lcp[idx];
        }

        let mut ans = self.sub[l].min(self.pre[r]);
        let between = br - bl - 1;
        if between > 0 {
            let k = self.log[between];
            ans = ans
                .min(self.st[k][bl + 1])
                .min(self.st[k][br - self.pow[k]]);
        }
        ans
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn serialize<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_u64_le(self.n as u64)?;
        writer.write_u64_le(self.block_size as u64)?;
        writer.write_u64_le(self.block_count as u64)?;
        writer.write_usize_vec_le(&self.pow)?;
        writer.write_usize_vec_le(&self.log)?;
        writer.write_usize_vec_le(&self.pre)?;
        writer.write_usize_vec_le(&self.sub)?;
        writer.write_usize_vec_le(&self.belong)?;
        writer.write_usize_vec_le(&self.pos)?;
        writer.write_u64_le(self.f.len() as u64)?;
        for &word in &self.f {
            writer.write_u64_le(word)?;
        }
        writer.write_u64_le(self.st.len() as u64)?;
        for row in &self.st {
            writer.write_usize_vec_le(row)?;
        }
        Ok(())
    }

    /// Rebuild from a serialized record. The LCP array is not part of the
    /// record; the caller attaches the one it deserialized alongside.
    pub fn deserialize<R: Read>(reader: &mut R, lcp: Arc<Vec<usize>>) -> Result<Self> {
        let n = reader.read_u64_le()? as usize;
        let block_size = reader.read_u64_le()? as usize;
        let block_count = reader.read_u64_le()? as usize;
        let pow = reader.read_usize_vec_le()?;
        let log = reader.read_usize_vec_le()?;
        let pre = reader.read_usize_vec_le()?;
        let sub = reader.read_usize_vec_le()?;
        let belong = reader.read_usize_vec_le()?;
        let pos = reader.read_usize_vec_le()?;
        let f_len = reader.read_u64_le()? as usize;
        let mut f = Vec::with_capacity(f_len.min(1 << 26));
        for _ in 0..f_len {
            f.push(reader.read_u64_le()?);
        }
        let st_levels = reader.read_u64_le()? as usize;
        let mut st = Vec::with_capacity(st_levels.min(MAXM));
        for _ in 0..st_levels {
            st.push(reader.read_usize_vec_le()?);
        }

        let rmq = Rmq {
            lcp,
            n,
            block_size,
            block_count,
            pow,
            log,
            pre,
            sub,
            belong,
            pos,
            f,
            st,
        };
        rmq.validate()?;
        Ok(rmq)
    }

    /// Structural sanity of a deserialized record.
    fn validate(&self) -> Result<()> {
        let corrupt = |msg: &str| Err(AnchorError::CorruptCache(format!("RMQ record: {}", msg)));

        if self.n != self.lcp.len() {
            return corrupt("length does not match the LCP array");
        }
        if self.block_size == 0 || self.block_size > MAX_BLOCK_SIZE {
            return corrupt("block size out of range");
        }
        if self.block_count != self.n.div_ceil(self.block_size) {
            return corrupt("block count inconsistent with block size");
        }
        if self.pow.len() != MAXM || self.log.len() != self.block_count + 1 {
            return corrupt("power/log tables malformed");
        }
        if [&self.pre, &self.sub, &self.belong, &self.pos]
            .iter()
            .any(|v| v.len() != self.n)
            || self.f.len() != self.n
        {
            return corrupt("per-element tables malformed");
        }
        let levels = self.log[self.block_count] + 1;
        if self.st.len() != levels || self.st.iter().any(|row| row.len() != self.block_count) {
            return corrupt("sparse table malformed");
        }
        Ok(())
    }
}

/// Prefix minima, suffix minima and the suffix-minimum bitmask for one
/// block. The mask is maintained with a monotone stack: pushing element j
/// clears the bits of stacked elements whose value is not smaller.
fn build_block(lcp_blk: &[usize], pre_blk: &mut [usize], sub_blk: &mut [usize], f_blk: &mut [u64]) {
    let len = lcp_blk.len();
    if len == 0 {
        return;
    }

    pre_blk[0] = lcp_blk[0];
    for j in 1..len {
        pre_blk[j] = pre_blk[j - 1].min(lcp_blk[j]);
    }

    sub_blk[len - 1] = lcp_blk[len - 1];
    for j in (0..len - 1).rev() {
        sub_blk[j] = sub_blk[j + 1].min(lcp_blk[j]);
    }

    let mut stack: Vec<usize> = Vec::with_capacity(len);
    let mut mask = 0u64;
    for j in 0..len {
        while let Some(&top) = stack.last() {
            if lcp_blk[top] >= lcp_blk[j] {
                mask &= !(1u64 << top);
                stack.pop();
            } else {
                break;
            }
        }
        stack.push(j);
        mask |= 1u64 << j;
        f_blk[j] = mask;
    }
}
