// End-to-end anchor search scenarios over small literal sequences.

use std::sync::Arc;

use seqanchor::anchor::AnchorFinder;
use seqanchor::index::{AnchorIndex, Concatenation};
use seqanchor::opts::AnchorOpts;

fn find_anchors(first: &[u8], second: &[u8], opts: AnchorOpts) -> Vec<(usize, usize, usize)> {
    let concat = Concatenation::new(first, second).expect("valid input");
    let index = Arc::new(AnchorIndex::build(concat, opts.thread_num));
    let finder = AnchorFinder::new(index, opts);
    let chain = finder
        .launch_anchor_searching()
        .expect("anchor search succeeds");
    finder
        .localize(&chain)
        .into_iter()
        .map(|a| (a.first_pos, a.second_pos, a.match_length))
        .collect()
}

fn assert_chain_is_monotone(anchors: &[(usize, usize, usize)]) {
    for window in anchors.windows(2) {
        let (f0, s0, l0) = window[0];
        let (f1, s1, _) = window[1];
        assert!(f1 >= f0 + l0, "first positions overlap: {:?}", window);
        assert!(s1 >= s0 + l0, "second positions overlap: {:?}", window);
    }
}

#[test]
fn identical_short_strings_give_one_full_anchor() {
    let anchors = find_anchors(b"ACGTACGT", b"ACGTACGT", AnchorOpts::default());
    assert_eq!(anchors, vec![(0, 0, 8)]);
}

#[test]
fn single_mismatch_splits_into_two_anchors() {
    let anchors = find_anchors(b"ACGTACGT", b"ACGTTCGT", AnchorOpts::default());
    assert_eq!(anchors, vec![(0, 0, 4), (5, 5, 3)]);
}

#[test]
fn insertion_gives_anchors_around_it() {
    // The inserted base is what an ambiguous N randomizes into at load
    let anchors = find_anchors(b"ACGTACGT", b"ACGTCACGT", AnchorOpts::default());
    assert_eq!(anchors, vec![(0, 0, 4), (4, 5, 4)]);
}

#[test]
fn repeat_rich_input_with_tight_match_cap() {
    let opts = AnchorOpts {
        max_match_count: 2,
        ..AnchorOpts::default()
    };
    let anchors = find_anchors(b"AAAAAAAA", b"AAAAAAAA", opts);
    assert_eq!(anchors, vec![(0, 0, 8)]);
}

#[test]
fn disjoint_alphabets_give_an_empty_chain() {
    let anchors = find_anchors(b"ACAC", b"GTGT", AnchorOpts::default());
    assert!(anchors.is_empty());
}

#[test]
fn single_base_first_sequence() {
    let anchors = find_anchors(b"A", b"ACGT", AnchorOpts::default());
    assert!(anchors.len() <= 1);
    if let Some(&(first_pos, _, match_length)) = anchors.first() {
        assert_eq!(first_pos, 0);
        assert_eq!(match_length, 1);
    }
}

#[test]
fn longer_identical_sequences_stay_on_the_diagonal() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(99);
    let seq: Vec<u8> = (0..200).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect();

    let anchors = find_anchors(&seq, &seq, AnchorOpts::default());
    assert!(!anchors.is_empty());
    assert_chain_is_monotone(&anchors);
    for &(first_pos, second_pos, _) in &anchors {
        assert_eq!(first_pos, second_pos, "identical inputs anchor off-diagonal");
    }
}

#[test]
fn chain_is_monotone_on_mutated_input() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(4242);
    let first: Vec<u8> = (0..500).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect();
    let mut second = first.clone();
    // sprinkle substitutions
    for _ in 0..25 {
        let i = rng.gen_range(0..second.len());
        second[i] = b"ACGT"[rng.gen_range(0..4)];
    }

    let anchors = find_anchors(&first, &second, AnchorOpts::default());
    assert_chain_is_monotone(&anchors);
}

#[test]
fn parallel_search_matches_inline_search() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(7);
    let first: Vec<u8> = (0..600).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect();
    let mut second = first.clone();
    for _ in 0..30 {
        let i = rng.gen_range(0..second.len());
        second[i] = b"ACGT"[rng.gen_range(0..4)];
    }

    let inline = find_anchors(&first, &second, AnchorOpts::default());
    let parallel = find_anchors(
        &first,
        &second,
        AnchorOpts {
            thread_num: 4,
            ..AnchorOpts::default()
        },
    );
    assert_eq!(inline, parallel);
}
