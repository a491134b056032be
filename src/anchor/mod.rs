// Anchor search driver.
//
// The driver recursively restricts the suffix array to the current
// interval pair through the inverse suffix array, finds an optimal chain
// of rare matches there, and recurses into the gaps between chosen
// anchors. The anchor tree is arena-owned: nodes live in one vector and
// refer to their children by index, so tasks on the worker pool only ever
// exchange plain indices. The final anchor list is a single-threaded
// depth-first interleave of each node's chain with its gap subtrees,
// making the output deterministic regardless of task scheduling.

pub mod rare_match;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{AnchorError, Result};
use crate::index::concat::index_global_to_local;
use crate::index::AnchorIndex;
use crate::opts::AnchorOpts;
use crate::threadpool::{PoolHandle, WorkerPool};
use crate::utils::realtime;

pub use rare_match::{RareMatchFinder, RareMatchPair};

/// A pair of half-open windows, one in each sequence. `pos2` is local to
/// the second sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub pos1: usize,
    pub len1: usize,
    pub pos2: usize,
    pub len2: usize,
}

impl Interval {
    pub fn new(pos1: usize, len1: usize, pos2: usize, len2: usize) -> Self {
        Interval {
            pos1,
            len1,
            pos2,
            len2,
        }
    }
}

/// Final anchor triple with both positions local to their sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub first_pos: usize,
    pub second_pos: usize,
    pub match_length: usize,
}

/// One node of the anchor tree: the chain chosen at its interval and the
/// arena indices of the gap subtrees.
#[derive(Debug, Default)]
struct AnchorNode {
    chain: Vec<RareMatchPair>,
    children: Vec<usize>,
}

/// Read-only search state shared by all tasks, plus the node arena.
struct SearchContext {
    index: Arc<AnchorIndex>,
    max_match_count: usize,
    total_sub_suffix: AtomicUsize,
    arena: Mutex<Vec<AnchorNode>>,
}

/// Locates a chain of rare-match anchors between the two indexed
/// sequences.
pub struct AnchorFinder {
    index: Arc<AnchorIndex>,
    opts: AnchorOpts,
}

impl AnchorFinder {
    pub fn new(index: Arc<AnchorIndex>, opts: AnchorOpts) -> Self {
        AnchorFinder { index, opts }
    }

    pub fn index(&self) -> &AnchorIndex {
        &self.index
    }

    /// Run the recursive anchor search over the whole sequence pair.
    ///
    /// Returns the final ordered chain, post-processed (sorted,
    /// non-overlapping, maximally merged). Second positions are global in
    /// the text; use [`RareMatchPair::to_local`] or [`Self::localize`]
    /// for per-sequence coordinates. An empty chain is a valid answer.
    pub fn launch_anchor_searching(&self) -> Result<Vec<RareMatchPair>> {
        log::info!("Begin to search anchors");
        let start_time = realtime();

        let context = Arc::new(SearchContext {
            index: Arc::clone(&self.index),
            max_match_count: self.opts.effective_max_match_count(),
            total_sub_suffix: AtomicUsize::new(0),
            arena: Mutex::new(vec![AnchorNode::default()]),
        });
        let root_interval = Interval::new(
            0,
            self.index.first_len(),
            0,
            self.index.second_len(),
        );

        if self.opts.thread_num > 0 {
            let pool = WorkerPool::new(self.opts.thread_num);
            let task_context = Arc::clone(&context);
            pool.submit(move |handle| {
                locate_anchor(&task_context, 0, 0, root_interval, Some(handle))
            });
            pool.wait_all()?;
        } else {
            locate_anchor(&context, 0, 0, root_interval, None)?;
        }

        let arena = std::mem::take(&mut *context.arena.lock().unwrap());
        let mut merged = Vec::new();
        merge_chain_depth_first(&arena, 0, &mut merged);
        let final_anchors = verify_anchors(merged)?;

        let seq_total = self.index.first_len() + self.index.second_len();
        let sub_total = context.total_sub_suffix.load(Ordering::Relaxed);
        log::info!(
            "Restricted suffix arrays totalled {} entries beyond the root, {:.2}x the input length",
            sub_total.saturating_sub(seq_total),
            sub_total.saturating_sub(seq_total) as f64 / seq_total as f64
        );
        log::info!(
            "Finished searching anchors: {} final anchors in {:.3}s",
            final_anchors.len(),
            realtime() - start_time
        );

        Ok(final_anchors)
    }

    /// The chain selected at the root interval only (no recursion
    /// results); useful for inspecting the first-level partition.
    pub fn first_level_chain(&self) -> Vec<RareMatchPair> {
        let root_interval =
            Interval::new(0, self.index.first_len(), 0, self.index.second_len());
        restricted_chain(
            &self.index,
            self.opts.effective_max_match_count(),
            &root_interval,
        )
    }

    /// Convert a chain to local-coordinate anchor triples.
    pub fn localize(&self, pairs: &[RareMatchPair]) -> Vec<Anchor> {
        let first_len = self.index.first_len();
        pairs
            .iter()
            .map(|pair| {
                let (first_pos, second_pos, match_length) = pair.to_local(first_len);
                Anchor {
                    first_pos,
                    second_pos,
                    match_length,
                }
            })
            .collect()
    }
}

/// One recursion step: project the interval pair into the suffix array,
/// chain rare matches there, then recurse into the gaps.
fn locate_anchor(
    context: &Arc<SearchContext>,
    depth: usize,
    node_id: usize,
    interval: Interval,
    pool: Option<&PoolHandle>,
) -> Result<()> {
    log::debug!(
        "anchor task at depth {} on ({}, {}, {}, {})",
        depth,
        interval.pos1,
        interval.len1,
        interval.pos2,
        interval.len2
    );

    let index = &context.index;
    if interval.len1 == 0 || interval.len2 == 0 {
        return Ok(());
    }

    context
        .total_sub_suffix
        .fetch_add(interval.len1 + interval.len2, Ordering::Relaxed);

    let chain = restricted_chain(index, context.max_match_count, &interval);
    if chain.is_empty() {
        return Ok(());
    }

    let gaps = chain_to_gap_intervals(&chain, &interval, index.first_len())?;

    // The parent creates every child node before any sibling task runs,
    // so child tasks never touch each other's slots.
    let child_ids: Vec<usize> = {
        let mut arena = context.arena.lock().unwrap();
        let first_child = arena.len();
        for _ in &gaps {
            arena.push(AnchorNode::default());
        }
        let node = &mut arena[node_id];
        node.chain = chain;
        node.children = (first_child..first_child + gaps.len()).collect();
        node.children.clone()
    };

    for (child_id, gap) in child_ids.into_iter().zip(gaps) {
        match pool {
            Some(handle) => {
                let task_context = Arc::clone(context);
                handle.submit(move |h| {
                    locate_anchor(&task_context, depth + 1, child_id, gap, Some(h))
                });
            }
            None => locate_anchor(context, depth + 1, child_id, gap, None)?,
        }
    }
    Ok(())
}

/// Project the interval pair into the suffix array and chain the rare
/// matches found there.
fn restricted_chain(
    index: &AnchorIndex,
    max_match_count: usize,
    interval: &Interval,
) -> Vec<RareMatchPair> {
    let first_start = interval.pos1;
    let first_len = interval.len1;
    let second_start = interval.pos2 + index.first_len() + 1;
    let second_len = interval.len2;
    if first_len == 0 || second_len == 0 {
        return Vec::new();
    }

    // Restricted suffix order: the SA ranks of every suffix starting in
    // either window, ascending.
    let mut ranks: Vec<usize> = Vec::with_capacity(first_len + second_len);
    ranks.extend((first_start..first_start + first_len).map(|i| index.isa[i]));
    ranks.extend((second_start..second_start + second_len).map(|i| index.isa[i]));
    ranks.sort_unstable();

    let mut sub_sa = Vec::with_capacity(ranks.len());
    let mut sub_lcp = Vec::with_capacity(ranks.len());
    let mut sub_da = Vec::with_capacity(ranks.len());
    for (k, &rank) in ranks.iter().enumerate() {
        sub_sa.push(index.sa[rank]);
        sub_da.push(index.da[rank]);
        // The minimum LCP over the skipped ranks equals the true LCP of
        // the two retained suffixes.
        sub_lcp.push(if k == 0 {
            0
        } else {
            index.rmq.query_min(ranks[k - 1] + 1, rank)
        });
    }

    let finder = RareMatchFinder::new(
        &index.concat.text,
        &sub_sa,
        &sub_lcp,
        &sub_da,
        first_start,
        first_len,
        second_start,
        second_len,
    );
    finder.find_rare_match(max_match_count)
}

/// Gap intervals between consecutive chain members, plus the pre-first
/// and post-last gaps. The cursor invariant (`u <= first_pos`,
/// `v <= second_pos` for every pair) is fatal when violated.
pub fn chain_to_gap_intervals(
    chain: &[RareMatchPair],
    interval: &Interval,
    first_len: usize,
) -> Result<Vec<Interval>> {
    if chain.is_empty() {
        return Ok(vec![*interval]);
    }

    let mut u = interval.pos1;
    let mut v = interval.pos2 + first_len + 1;
    let first_end = interval.pos1 + interval.len1;
    let second_end = interval.pos2 + first_len + 1 + interval.len2;

    let mut gaps = Vec::with_capacity(chain.len() + 1);
    for pair in chain {
        if u > pair.first_pos || v > pair.second_pos {
            return Err(AnchorError::Internal(format!(
                "overlapping anchors: cursor ({}, {}) passed anchor ({}, {})",
                u, v, pair.first_pos, pair.second_pos
            )));
        }
        gaps.push(Interval::new(
            u,
            pair.first_pos - u,
            index_global_to_local(v, first_len),
            pair.second_pos - v,
        ));
        u = pair.first_pos + pair.match_length;
        v = pair.second_pos + pair.match_length;
    }

    gaps.push(Interval::new(
        u.min(first_end),
        first_end.saturating_sub(u),
        index_global_to_local(v.min(second_end), first_len),
        second_end.saturating_sub(v),
    ));

    Ok(gaps)
}

/// Depth-first emission: the gap subtree before each chain entry, then
/// the entry itself. A node with a chain of k pairs has k+1 children.
fn merge_chain_depth_first(arena: &[AnchorNode], node_id: usize, out: &mut Vec<RareMatchPair>) {
    let node = &arena[node_id];
    for (k, &child) in node.children.iter().enumerate() {
        merge_chain_depth_first(arena, child, out);
        if k < node.chain.len() {
            out.push(node.chain[k]);
        }
    }
    if node.children.is_empty() {
        out.extend(node.chain.iter().copied());
    }
}

/// Final post-processing: sort, reject overlap, merge seamless neighbors.
pub fn verify_anchors(pairs: Vec<RareMatchPair>) -> Result<Vec<RareMatchPair>> {
    if pairs.is_empty() {
        return Ok(pairs);
    }

    let mut sorted = pairs;
    sorted.sort_by(|a, b| (a.first_pos, a.second_pos).cmp(&(b.first_pos, b.second_pos)));

    let mut verified = Vec::with_capacity(sorted.len());
    let mut current = sorted[0];
    for &next in &sorted[1..] {
        if current.overlaps(&next) {
            return Err(AnchorError::Internal(format!(
                "overlapping anchor pairs ({}, {}, {}) and ({}, {}, {})",
                current.first_pos,
                current.second_pos,
                current.match_length,
                next.first_pos,
                next.second_pos,
                next.match_length
            )));
        } else if current.is_adjacent(&next) {
            current.merge_with(&next);
        } else {
            verified.push(current);
            current = next;
        }
    }
    verified.push(current);

    Ok(verified)
}

/// Write a chain to CSV with local second-sequence coordinates.
pub fn save_anchors_to_csv(
    pairs: &[RareMatchPair],
    path: &Path,
    first_len: usize,
) -> std::io::Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file, "Index,FirstPos,SecondPos,MatchLength,Weight")?;
    for (i, pair) in pairs.iter().enumerate() {
        writeln!(
            file,
            "{},{},{},{},{}",
            i + 1,
            pair.first_pos,
            index_global_to_local(pair.second_pos, first_len),
            pair.match_length,
            pair.weight
        )?;
    }
    file.flush()?;
    log::info!("{} has been saved", path.display());
    Ok(())
}

/// Write gap intervals to CSV.
pub fn save_intervals_to_csv(intervals: &[Interval], path: &Path) -> std::io::Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file, "Index,FirstStart,FirstLength,SecondStart,SecondLength")?;
    for (i, interval) in intervals.iter().enumerate() {
        writeln!(
            file,
            "{},{},{},{},{}",
            i + 1,
            interval.pos1,
            interval.len1,
            interval.pos2,
            interval.len2
        )?;
    }
    file.flush()?;
    log::info!("{} has been saved", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(first_pos: usize, second_pos: usize, match_length: usize) -> RareMatchPair {
        RareMatchPair {
            first_pos,
            second_pos,
            match_length,
            weight: match_length as f64,
        }
    }

    #[test]
    fn gap_intervals_surround_the_chain() {
        // first sequence length 10; second window global offset 11
        let interval = Interval::new(0, 10, 0, 12);
        let chain = vec![pair(2, 14, 3), pair(7, 19, 2)];
        let gaps = chain_to_gap_intervals(&chain, &interval, 10).unwrap();

        assert_eq!(gaps.len(), 3);
        assert_eq!(gaps[0], Interval::new(0, 2, 0, 3));
        assert_eq!(gaps[1], Interval::new(5, 2, 6, 2));
        assert_eq!(gaps[2], Interval::new(9, 1, 10, 2));
    }

    #[test]
    fn gap_intervals_clamp_at_the_window_end() {
        let interval = Interval::new(0, 8, 0, 8);
        let chain = vec![pair(4, 13, 4)]; // both cursors land exactly on the end
        let gaps = chain_to_gap_intervals(&chain, &interval, 8).unwrap();
        assert_eq!(gaps.len(), 2);
        assert_eq!(gaps[1].len1, 0);
        assert_eq!(gaps[1].len2, 0);
    }

    #[test]
    fn gap_intervals_keep_offset_windows() {
        // A nested interval that starts deep inside both sequences still
        // gets its trailing gap.
        let interval = Interval::new(10, 5, 20, 6);
        let chain = vec![pair(11, 52, 2)]; // first_len = 30 below
        let gaps = chain_to_gap_intervals(&chain, &interval, 30).unwrap();
        assert_eq!(gaps.len(), 2);
        assert_eq!(gaps[0], Interval::new(10, 1, 20, 1));
        assert_eq!(gaps[1], Interval::new(13, 2, 23, 3));
    }

    #[test]
    fn cursor_overrun_is_fatal() {
        let interval = Interval::new(0, 8, 0, 8);
        let chain = vec![pair(0, 9, 4), pair(2, 13, 2)];
        assert!(chain_to_gap_intervals(&chain, &interval, 8).is_err());
    }

    #[test]
    fn verify_merges_adjacent_pairs() {
        let merged = verify_anchors(vec![pair(4, 13, 4), pair(0, 9, 4)]).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].first_pos, 0);
        assert_eq!(merged[0].match_length, 8);
    }

    #[test]
    fn verify_keeps_separated_pairs() {
        let verified = verify_anchors(vec![pair(0, 9, 3), pair(5, 14, 2)]).unwrap();
        assert_eq!(verified.len(), 2);
    }

    #[test]
    fn verify_rejects_overlap() {
        assert!(verify_anchors(vec![pair(0, 9, 4), pair(2, 15, 4)]).is_err());
    }

    #[test]
    fn depth_first_merge_interleaves_gaps_and_chain() {
        let mut arena = vec![AnchorNode::default()];
        arena[0].chain = vec![pair(4, 20, 2)];
        arena[0].children = vec![1, 2];
        arena.push(AnchorNode::default()); // gap before the anchor
        arena.push(AnchorNode::default()); // gap after the anchor
        arena[1].chain = vec![pair(0, 16, 2)];
        arena[2].chain = vec![pair(8, 24, 2)];

        let mut out = Vec::new();
        merge_chain_depth_first(&arena, 0, &mut out);
        let firsts: Vec<usize> = out.iter().map(|p| p.first_pos).collect();
        assert_eq!(firsts, vec![0, 4, 8]);
    }
}
