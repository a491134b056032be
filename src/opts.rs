// Anchor search options.

use std::path::PathBuf;

/// Default cap on the LCP window width searched for rare matches.
pub const DEFAULT_MAX_MATCH_COUNT: usize = 100;

/// Effective minimum for `max_match_count`; smaller values would never
/// widen the window past a single LCP entry.
pub const MIN_MATCH_COUNT: usize = 2;

/// Parameter bundle for the anchor search.
#[derive(Debug, Clone)]
pub struct AnchorOpts {
    /// Worker count for the anchor search pool; 0 runs everything inline.
    pub thread_num: usize,

    /// Cap on the LCP window width searched (effective minimum 2).
    pub max_match_count: usize,

    /// Attempt to read the index cache before building.
    pub load_cache: bool,

    /// Write the index cache after building.
    pub save_cache: bool,

    /// Filesystem path of the index cache blob.
    pub cache_path: PathBuf,
}

impl Default for AnchorOpts {
    fn default() -> Self {
        AnchorOpts {
            thread_num: 0,
            max_match_count: DEFAULT_MAX_MATCH_COUNT,
            load_cache: false,
            save_cache: false,
            cache_path: PathBuf::from("anchor_index.bin"),
        }
    }
}

impl AnchorOpts {
    /// `max_match_count` with the documented floor applied.
    pub fn effective_max_match_count(&self) -> usize {
        self.max_match_count.max(MIN_MATCH_COUNT)
    }
}
