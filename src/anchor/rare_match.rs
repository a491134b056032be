// Rare-match discovery inside a restricted suffix sub-array.
//
// A window of fixed width slides over the LCP array; windows that form a
// maximal plateau (both neighbors strictly smaller than the window
// minimum) correspond to repeats with a bounded occurrence count. Repeats
// seen in both sequences become rare matches, are extended leftward as far
// as every occurrence agrees, expanded into position pairs, and chained by
// a weighted longest-increasing-subsequence with a gap penalty.

use std::collections::{BTreeMap, VecDeque};

use crate::index::concat::index_global_to_local;

/// Floor added to a chain extension whose marginal gain is not positive.
/// Keeps a chain with a compatible predecessor strictly preferable to the
/// bare pair.
pub(crate) const CHAIN_SCORE_FLOOR: f64 = 0.1;

/// A repeat of `match_length` bytes occurring at `positions` (global text
/// coordinates), with at least one occurrence expected in each sequence.
#[derive(Debug, Clone)]
pub struct RareMatch {
    pub match_length: usize,
    /// Occurrence positions in the text.
    pub positions: Vec<usize>,
    /// Source of each position: false = first sequence, true = second.
    pub pos_type: Vec<bool>,
    pub first_count: usize,
    pub second_count: usize,
}

impl RareMatch {
    pub fn new(match_length: usize, positions: Vec<usize>, pos_type: Vec<bool>) -> Self {
        debug_assert_eq!(positions.len(), pos_type.len());
        let second_count = pos_type.iter().filter(|&&t| t).count();
        let first_count = pos_type.len() - second_count;
        RareMatch {
            match_length,
            positions,
            pos_type,
            first_count,
            second_count,
        }
    }

    /// Deduplication key: two windows describing the same repeat agree on
    /// the end position of its first occurrence.
    pub fn min_key(&self) -> usize {
        self.positions.iter().min().copied().unwrap_or(usize::MAX) + self.match_length
    }
}

/// One anchor candidate: a position in each sequence sharing
/// `match_length` identical bytes. `second_pos` is global in the text
/// until the final output conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RareMatchPair {
    pub first_pos: usize,
    pub second_pos: usize,
    pub match_length: usize,
    pub weight: f64,
}

impl RareMatchPair {
    /// Seamlessly adjacent on both axes.
    pub fn is_adjacent(&self, next: &RareMatchPair) -> bool {
        self.first_pos + self.match_length == next.first_pos
            && self.second_pos + self.match_length == next.second_pos
    }

    /// Runs past the start of `next` on either axis.
    pub fn overlaps(&self, next: &RareMatchPair) -> bool {
        self.first_pos + self.match_length > next.first_pos
            || self.second_pos + self.match_length > next.second_pos
    }

    pub fn merge_with(&mut self, next: &RareMatchPair) {
        self.match_length += next.match_length;
    }

    /// Output form with the second position local to its sequence.
    pub fn to_local(&self, first_len: usize) -> (usize, usize, usize) {
        (
            self.first_pos,
            index_global_to_local(self.second_pos, first_len),
            self.match_length,
        )
    }
}

/// Sliding window of fixed width over the LCP array, tracking its minimum
/// with a monotone deque (front = current minimum). Width 1 bypasses the
/// deque.
pub struct LcpWindow<'a> {
    lcp: &'a [usize],
    width: usize,
    left: usize,
    right: usize,
    min_deque: VecDeque<usize>,
    min_value: usize,
}

impl<'a> LcpWindow<'a> {
    pub fn new(lcp: &'a [usize], width: usize) -> Self {
        debug_assert!(width >= 1 && width <= lcp.len());
        let mut window = LcpWindow {
            lcp,
            width,
            left: 0,
            right: width - 1,
            min_deque: VecDeque::new(),
            min_value: usize::MAX,
        };
        if width == 1 {
            window.min_value = lcp[0];
        } else {
            for i in 0..width {
                while let Some(&back) = window.min_deque.back() {
                    if lcp[i] < lcp[back] {
                        window.min_deque.pop_back();
                    } else {
                        break;
                    }
                }
                window.min_deque.push_back(i);
            }
            window.min_value = lcp[window.min_deque[0]];
        }
        window
    }

    /// Move the window one position right; no-op at the end of the array.
    pub fn slide_right(&mut self) {
        if self.right + 1 >= self.lcp.len() {
            return;
        }
        self.left += 1;
        self.right += 1;

        if self.width == 1 {
            self.min_value = self.lcp[self.right];
            return;
        }

        while let Some(&front) = self.min_deque.front() {
            if front < self.left {
                self.min_deque.pop_front();
            } else {
                break;
            }
        }
        while let Some(&back) = self.min_deque.back() {
            if self.lcp[self.right] < self.lcp[back] {
                self.min_deque.pop_back();
            } else {
                break;
            }
        }
        self.min_deque.push_back(self.right);
        self.min_value = self.lcp[self.min_deque[0]];
    }

    pub fn min_lcp(&self) -> usize {
        self.min_value
    }

    /// The window is rare iff it is a maximal plateau: the LCP entries on
    /// both sides (where they exist) are strictly below the window
    /// minimum.
    pub fn is_rare(&self) -> bool {
        if self.left > 0 && self.lcp[self.left - 1] >= self.min_value {
            return false;
        }
        if self.right + 1 < self.lcp.len() && self.lcp[self.right + 1] >= self.min_value {
            return false;
        }
        true
    }

    pub fn is_right_at_end(&self) -> bool {
        self.right == self.lcp.len() - 1
    }

    pub fn boundary(&self) -> (usize, usize) {
        (self.left, self.right)
    }
}

/// Finds rare matches in a restricted suffix sub-array covering the two
/// current sub-intervals of the text.
pub struct RareMatchFinder<'a> {
    text: &'a [u8],
    sa: &'a [usize],
    lcp: &'a [usize],
    da: &'a [u8],
    first_start: usize,
    first_len: usize,
    second_start: usize,
    second_len: usize,
    min_seq_len: usize,
}

impl<'a> RareMatchFinder<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        text: &'a [u8],
        sa: &'a [usize],
        lcp: &'a [usize],
        da: &'a [u8],
        first_start: usize,
        first_len: usize,
        second_start: usize,
        second_len: usize,
    ) -> Self {
        debug_assert_eq!(sa.len(), lcp.len());
        debug_assert_eq!(sa.len(), da.len());
        RareMatchFinder {
            text,
            sa,
            lcp,
            da,
            first_start,
            first_len,
            second_start,
            second_len,
            min_seq_len: first_len.min(second_len),
        }
    }

    /// Enumerate rare matches at growing window widths, stopping at the
    /// first width that yields any, then left-expand, pair up and chain.
    /// An empty result is a valid answer.
    pub fn find_rare_match(&self, max_match_count: usize) -> Vec<RareMatchPair> {
        let max_width = max_match_count.min(self.min_seq_len);
        let mut width = 0;
        let mut match_found = false;
        let mut rare_matches: BTreeMap<usize, RareMatch> = BTreeMap::new();

        while !match_found && width < max_width {
            width += 1;
            let mut window = LcpWindow::new(self.lcp, width);
            while !window.is_right_at_end() {
                if window.is_rare() {
                    let (left, right) = window.boundary();
                    let (positions, pos_type) = self.match_positions(left, right);
                    let match_length = window
                        .min_lcp()
                        .min(self.min_distance_to_interval_end(&positions));
                    let rare_match = RareMatch::new(match_length, positions, pos_type);
                    if rare_match.first_count > 0 && rare_match.second_count > 0 {
                        match_found = true;
                        let key = rare_match.min_key();
                        match rare_matches.entry(key) {
                            std::collections::btree_map::Entry::Occupied(mut entry) => {
                                if entry.get().match_length < rare_match.match_length {
                                    entry.insert(rare_match);
                                }
                            }
                            std::collections::btree_map::Entry::Vacant(entry) => {
                                entry.insert(rare_match);
                            }
                        }
                    }
                }
                window.slide_right();
            }
        }

        for rare_match in rare_matches.values_mut() {
            rare_match.match_length += self.left_expand(&mut rare_match.positions);
            debug_assert!(self.occurrences_agree(rare_match));
        }

        let mut pairs = convert_matches_to_pairs(rare_matches.values());
        pairs.sort_by(|a, b| {
            (a.first_pos, a.second_pos).cmp(&(b.first_pos, b.second_pos))
        });
        find_optimal_pairs(&pairs)
    }

    /// Suffix positions and their sequence of origin for an LCP window.
    /// An LCP window of width w spans w+1 adjacent suffixes, hence the
    /// extra entry taken on the left.
    fn match_positions(&self, left: usize, right: usize) -> (Vec<usize>, Vec<bool>) {
        let start = left.saturating_sub(1);
        let mut positions = Vec::with_capacity(right - start + 1);
        let mut pos_type = Vec::with_capacity(right - start + 1);
        for i in start..=right {
            positions.push(self.sa[i]);
            pos_type.push(self.da[i] != 0);
        }
        (positions, pos_type)
    }

    /// Cap on the match length so no occurrence runs past the end of its
    /// sub-interval.
    fn min_distance_to_interval_end(&self, positions: &[usize]) -> usize {
        let mut min_length = usize::MAX;
        for &pos in positions {
            let distance = if pos >= self.second_start {
                assert!(
                    pos < self.second_start + self.second_len,
                    "suffix position {} outside the second sub-interval",
                    pos
                );
                self.second_start + self.second_len - pos
            } else {
                assert!(
                    pos >= self.first_start && pos < self.first_start + self.first_len,
                    "suffix position {} outside the first sub-interval",
                    pos
                );
                self.first_start + self.first_len - pos
            };
            min_length = min_length.min(distance);
        }
        min_length
    }

    /// Extend all occurrences leftward while they agree on the preceding
    /// byte, capped by the distance to each occurrence's sub-interval
    /// start. Positions are shifted in place; returns the expansion.
    fn left_expand(&self, positions: &mut [usize]) -> usize {
        if positions.is_empty() {
            return 0;
        }

        let mut max_expand = usize::MAX;
        for &pos in positions.iter() {
            let room = if pos >= self.second_start {
                pos - self.second_start
            } else {
                pos - self.first_start
            };
            max_expand = max_expand.min(room);
        }

        let mut expand = 0;
        'expanding: while expand < max_expand {
            let step = expand + 1;
            let cur = self.text[positions[0] - step];
            for &pos in positions[1..].iter() {
                if self.text[pos - step] != cur {
                    break 'expanding;
                }
            }
            expand = step;
        }

        for pos in positions.iter_mut() {
            *pos -= expand;
        }
        expand
    }

    /// Every occurrence of a finished rare match must spell the same
    /// bytes; anything else is a construction bug.
    fn occurrences_agree(&self, rare_match: &RareMatch) -> bool {
        let Some((&first, rest)) = rare_match.positions.split_first() else {
            return true;
        };
        let reference = &self.text[first..first + rare_match.match_length];
        rest.iter()
            .all(|&pos| &self.text[pos..pos + rare_match.match_length] == reference)
    }
}

/// Split each match's occurrences by sequence and emit the cartesian
/// product as candidate pairs. A pair's weight is the match length diluted
/// by the smaller occurrence count.
fn convert_matches_to_pairs<'m, I>(matches: I) -> Vec<RareMatchPair>
where
    I: Iterator<Item = &'m RareMatch>,
{
    let mut pairs = Vec::new();
    for rare_match in matches {
        let mut first_positions = Vec::with_capacity(rare_match.first_count);
        let mut second_positions = Vec::with_capacity(rare_match.second_count);
        for (&pos, &is_second) in rare_match.positions.iter().zip(&rare_match.pos_type) {
            if is_second {
                second_positions.push(pos);
            } else {
                first_positions.push(pos);
            }
        }

        let weight = rare_match.match_length as f64
            / rare_match.first_count.min(rare_match.second_count) as f64;
        for &first_pos in &first_positions {
            for &second_pos in &second_positions {
                pairs.push(RareMatchPair {
                    first_pos,
                    second_pos,
                    match_length: rare_match.match_length,
                    weight,
                });
            }
        }
    }
    pairs
}

/// Penalty for chaining across unequal gaps on the two axes.
fn gap_cost(first_gap: usize, second_gap: usize) -> f64 {
    if first_gap == second_gap {
        0.0
    } else {
        let diff = (first_gap as f64 - second_gap as f64).abs();
        2.0 * (diff + 1.0).log2()
    }
}

/// Weighted longest-increasing-subsequence over pairs sorted by
/// `(first_pos, second_pos)`: a pair may follow another only without
/// overlap on either axis. Returns the best-scoring chain in forward
/// order.
fn find_optimal_pairs(pairs: &[RareMatchPair]) -> Vec<RareMatchPair> {
    if pairs.is_empty() {
        return Vec::new();
    }

    let mut scores = vec![0f64; pairs.len()];
    let mut backtrack = vec![usize::MAX; pairs.len()];
    scores[0] = pairs[0].weight;

    for i in 1..pairs.len() {
        scores[i] = pairs[i].weight;
        for j in (0..i).rev() {
            let prev_first_end = pairs[j].first_pos + pairs[j].match_length;
            let prev_second_end = pairs[j].second_pos + pairs[j].match_length;
            if pairs[i].first_pos >= prev_first_end && pairs[i].second_pos >= prev_second_end {
                let first_gap = pairs[i].first_pos - prev_first_end;
                let second_gap = pairs[i].second_pos - prev_second_end;
                let gain = pairs[i].weight - gap_cost(first_gap, second_gap);
                let candidate = scores[j] + if gain > 0.0 { gain } else { CHAIN_SCORE_FLOOR };
                if candidate > scores[i] {
                    scores[i] = candidate;
                    backtrack[i] = j;
                }
            }
        }
    }

    let mut best = 0;
    for i in 1..scores.len() {
        if scores[i] > scores[best] {
            best = i;
        }
    }

    let mut chain = Vec::new();
    let mut i = best;
    loop {
        chain.push(pairs[i]);
        if backtrack[i] == usize::MAX {
            break;
        }
        i = backtrack[i];
    }
    chain.reverse();
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_tracks_minimum() {
        let lcp = vec![5, 2, 4, 1, 3, 6];
        let mut window = LcpWindow::new(&lcp, 3);
        assert_eq!(window.boundary(), (0, 2));
        assert_eq!(window.min_lcp(), 2);

        window.slide_right();
        assert_eq!(window.min_lcp(), 1);
        window.slide_right();
        assert_eq!(window.min_lcp(), 1);
        window.slide_right();
        assert_eq!(window.min_lcp(), 1);
        assert!(window.is_right_at_end());

        // sliding past the end is a no-op
        window.slide_right();
        assert_eq!(window.boundary(), (3, 5));
    }

    #[test]
    fn width_one_window() {
        let lcp = vec![3, 0, 7];
        let mut window = LcpWindow::new(&lcp, 1);
        assert_eq!(window.min_lcp(), 3);
        window.slide_right();
        assert_eq!(window.min_lcp(), 0);
        window.slide_right();
        assert_eq!(window.min_lcp(), 7);
    }

    #[test]
    fn rare_windows_are_maximal_plateaus() {
        //            0  1  2  3  4
        let lcp = vec![0, 4, 1, 3, 0];
        let window = LcpWindow::new(&lcp, 1);
        assert!(!window.is_rare()); // right neighbor 4 >= 0

        let mut window = LcpWindow::new(&lcp, 1);
        window.slide_right();
        assert!(window.is_rare()); // 0 < 4 > 1

        let mut window = LcpWindow::new(&lcp, 3);
        window.slide_right(); // [1..=3], min 1, neighbors 0 and 0
        assert!(window.is_rare());
    }

    #[test]
    fn gap_cost_is_symmetric_and_zero_on_diagonal() {
        assert_eq!(gap_cost(5, 5), 0.0);
        assert!((gap_cost(3, 0) - gap_cost(0, 3)).abs() < 1e-12);
        assert!((gap_cost(1, 0) - 2.0).abs() < 1e-12); // 2*log2(2)
    }

    #[test]
    fn chain_prefers_compatible_pairs() {
        let pairs = vec![
            RareMatchPair {
                first_pos: 0,
                second_pos: 0,
                match_length: 4,
                weight: 4.0,
            },
            RareMatchPair {
                first_pos: 4,
                second_pos: 4,
                match_length: 4,
                weight: 4.0,
            },
        ];
        let chain = find_optimal_pairs(&pairs);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].first_pos, 0);
        assert_eq!(chain[1].first_pos, 4);
    }

    #[test]
    fn chain_skips_overlapping_pairs() {
        let pairs = vec![
            RareMatchPair {
                first_pos: 0,
                second_pos: 0,
                match_length: 6,
                weight: 6.0,
            },
            RareMatchPair {
                first_pos: 3,
                second_pos: 3,
                match_length: 6,
                weight: 5.0,
            },
        ];
        let chain = find_optimal_pairs(&pairs);
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].first_pos, 0);
    }

    #[test]
    fn chain_floor_keeps_negative_gain_extensions() {
        // The second pair's weight cannot pay for the skewed gap, but the
        // floor still makes the two-pair chain win.
        let pairs = vec![
            RareMatchPair {
                first_pos: 0,
                second_pos: 0,
                match_length: 2,
                weight: 2.0,
            },
            RareMatchPair {
                first_pos: 2,
                second_pos: 100,
                match_length: 2,
                weight: 2.0,
            },
        ];
        let chain = find_optimal_pairs(&pairs);
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn adjacency_and_overlap() {
        let a = RareMatchPair {
            first_pos: 0,
            second_pos: 10,
            match_length: 4,
            weight: 1.0,
        };
        let adjacent = RareMatchPair {
            first_pos: 4,
            second_pos: 14,
            match_length: 2,
            weight: 1.0,
        };
        let overlapping = RareMatchPair {
            first_pos: 3,
            second_pos: 20,
            match_length: 2,
            weight: 1.0,
        };
        assert!(a.is_adjacent(&adjacent));
        assert!(!a.overlaps(&adjacent));
        assert!(a.overlaps(&overlapping));

        let mut merged = a;
        merged.merge_with(&adjacent);
        assert_eq!(merged.match_length, 6);
    }
}
