// Index management module
//
// Bundles everything the anchor search reads: the joined text, the
// generalized suffix array with its LCP and document arrays, the inverse
// suffix array, and the RMQ structure over LCP. Built once per run and
// immutable afterwards; optionally persisted to a cache blob and restored
// on later runs.

pub mod concat;
mod persist;
pub mod suffix;

use std::sync::Arc;

use rayon::prelude::*;

use crate::error::{AnchorError, Result};
use crate::opts::AnchorOpts;
use crate::rmq::Rmq;
use crate::utils::realtime;

pub use concat::Concatenation;

/// Read-only arrays shared by every anchor-search task.
#[derive(Debug, PartialEq)]
pub struct AnchorIndex {
    pub concat: Concatenation,
    pub sa: Vec<usize>,
    pub lcp: Arc<Vec<usize>>,
    pub da: Vec<u8>,
    pub isa: Vec<usize>,
    pub rmq: Rmq,
}

impl AnchorIndex {
    /// Build all arrays from a concatenation. `thread_num > 0` enables
    /// the parallel ISA and RMQ block preprocessing paths.
    pub fn build(concat: Concatenation, thread_num: usize) -> Self {
        let start_time = realtime();
        log::info!(
            "The concatenated text length is {}",
            concat.total_len()
        );

        log::info!("The suffix array is constructing...");
        let (sa, lcp, da) = suffix::build_arrays(&concat.text, concat.first_len);
        let lcp = Arc::new(lcp);
        log::info!("The suffix array construction is finished");

        log::info!("The sparse table is constructing...");
        let rmq = Rmq::new(Arc::clone(&lcp), thread_num > 0);
        log::info!("The sparse table construction is finished");

        let isa = build_isa(&sa, thread_num > 0);

        log::info!(
            "Index built in {:.3}s (N = {})",
            realtime() - start_time,
            concat.total_len()
        );

        let index = AnchorIndex {
            concat,
            sa,
            lcp,
            da,
            isa,
            rmq,
        };
        index.debug_print();
        index
    }

    /// Cache-aware entry point: try the cache when requested, fall back
    /// to a fresh build on any load failure, then save when requested.
    pub fn obtain(concat: Concatenation, opts: &AnchorOpts) -> Result<Self> {
        if opts.load_cache {
            match Self::load(&opts.cache_path, &concat) {
                Ok(index) => {
                    log::info!("Index loaded from {}", opts.cache_path.display());
                    return Ok(index);
                }
                Err(err) => {
                    log::warn!(
                        "Failed to load {} ({}); rebuilding the index",
                        opts.cache_path.display(),
                        err
                    );
                }
            }
        }

        let index = Self::build(concat, opts.thread_num);

        if opts.save_cache {
            index.dump(&opts.cache_path)?;
            log::info!("Index saved into {}", opts.cache_path.display());
        }

        Ok(index)
    }

    pub fn first_len(&self) -> usize {
        self.concat.first_len
    }

    pub fn second_len(&self) -> usize {
        self.concat.second_len
    }

    pub fn total_len(&self) -> usize {
        self.concat.total_len()
    }

    /// Dump the index tables at debug level; readable only for toy
    /// inputs, so larger texts are skipped.
    fn debug_print(&self) {
        const DEBUG_PRINT_LIMIT: usize = 64;
        if self.total_len() > DEBUG_PRINT_LIMIT || !log::log_enabled!(log::Level::Debug) {
            return;
        }

        let row = |name: &str, values: &mut dyn Iterator<Item = String>| {
            log::debug!("{:>6}: {}", name, values.collect::<Vec<_>>().join(" "));
        };
        row(
            "index",
            &mut (0..self.total_len()).map(|i| format!("{:<4}", i)),
        );
        row("SA", &mut self.sa.iter().map(|v| format!("{:<4}", v)));
        row("LCP", &mut self.lcp.iter().map(|v| format!("{:<4}", v)));
        row("DA", &mut self.da.iter().map(|v| format!("{:<4}", v)));
        row("ISA", &mut self.isa.iter().map(|v| format!("{:<4}", v)));
    }
}

/// Invert the suffix array. The scattered writes of the parallel path are
/// disjoint because SA is a permutation.
fn build_isa(sa: &[usize], parallel: bool) -> Vec<usize> {
    let n = sa.len();
    let mut isa = vec![0usize; n];

    if !parallel || n < 1 << 16 {
        for (rank, &suffix) in sa.iter().enumerate() {
            isa[suffix] = rank;
        }
        return isa;
    }

    struct SharedMutPtr(*mut usize);
    // SAFETY: every chunk writes a distinct set of elements (SA is a
    // permutation), so no two threads ever touch the same slot.
    unsafe impl Send for SharedMutPtr {}
    unsafe impl Sync for SharedMutPtr {}

    let chunk_size = n.div_ceil(rayon::current_num_threads().max(1));
    let isa_ptr = SharedMutPtr(isa.as_mut_ptr());
    let isa_ref = &isa_ptr;
    sa.par_chunks(chunk_size)
        .enumerate()
        .for_each(move |(chunk_index, chunk)| {
            let base = chunk_index * chunk_size;
            for (offset, &suffix) in chunk.iter().enumerate() {
                unsafe {
                    *isa_ref.0.add(suffix) = base + offset;
                }
            }
        });

    isa
}

/// Shared invariant validation for freshly deserialized indexes.
fn validate_index(index: &AnchorIndex) -> Result<()> {
    let corrupt = |msg: String| Err(AnchorError::CorruptCache(msg));
    let n = index.concat.total_len();

    if index.concat.first_len + index.concat.second_len + 3 != n {
        return corrupt("sequence lengths inconsistent with the text".into());
    }
    if index.sa.len() != n || index.lcp.len() != n || index.da.len() != n || index.isa.len() != n {
        return corrupt("array lengths do not match the text".into());
    }

    let mut seen = vec![false; n];
    for (rank, &suffix) in index.sa.iter().enumerate() {
        if suffix >= n || seen[suffix] {
            return corrupt(format!("SA is not a permutation at rank {}", rank));
        }
        seen[suffix] = true;
        if index.isa[suffix] != rank {
            return corrupt(format!("ISA does not invert SA at rank {}", rank));
        }
        if index.da[rank] != u8::from(suffix > index.concat.first_len) {
            return corrupt(format!("DA misclassifies rank {}", rank));
        }
    }

    if index.lcp[0] != 0 {
        return corrupt("LCP[0] is not zero".into());
    }
    for rank in 1..n {
        let a = index.sa[rank - 1];
        let b = index.sa[rank];
        let lcp = index.lcp[rank];
        if lcp > n - a.max(b) {
            return corrupt(format!("LCP[{}] exceeds the suffix length", rank));
        }
        // Common prefix must not end on equal bytes, and its last byte
        // pair (when any) must agree.
        if a + lcp < n && b + lcp < n && index.concat.text[a + lcp] == index.concat.text[b + lcp] {
            return corrupt(format!("LCP[{}] is not maximal", rank));
        }
        if lcp > 0 && index.concat.text[a + lcp - 1] != index.concat.text[b + lcp - 1] {
            return corrupt(format!("LCP[{}] overstates the common prefix", rank));
        }
    }

    Ok(())
}
