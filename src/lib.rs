//! Anchor-based pairwise alignment of long DNA sequences.
//!
//! Instead of a full quadratic alignment, the two sequences are
//! partitioned at a chain of rare exact matches found from a generalized
//! suffix array over their concatenation, and only the residual
//! inter-anchor intervals are handed to an exact gap-affine aligner.

pub mod align;
pub mod anchor;
pub mod error;
pub mod index;
pub mod io; // FASTA input with ambiguous-base randomization
pub mod opts;
pub mod rmq;
pub mod threadpool;
pub mod utils;

pub use crate::anchor::{Anchor, AnchorFinder, Interval, RareMatchPair};
pub use crate::error::AnchorError;
pub use crate::index::{AnchorIndex, Concatenation};
pub use crate::opts::AnchorOpts;
