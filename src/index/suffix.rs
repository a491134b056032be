// Generalized suffix array construction over the joined text.
//
// The suffix array itself comes from the bio crate's linear-time builder;
// the text's trailing sentinel is the unique smallest byte it requires.
// The LCP array is derived with Kasai's algorithm and the document array
// classifies each suffix against the first sequence's end.

use bio::data_structures::suffix_array::suffix_array;

/// Build SA, LCP and DA for the concatenation.
///
/// - `SA` orders the suffixes of `text` lexicographically.
/// - `LCP[i]` is the longest common prefix of `text[SA[i-1]..]` and
///   `text[SA[i]..]`, with `LCP[0] = 0`.
/// - `DA[i]` is 0 when `SA[i] <= first_len` (the position belongs to the
///   first sequence or its separator) and 1 otherwise.
pub fn build_arrays(text: &[u8], first_len: usize) -> (Vec<usize>, Vec<usize>, Vec<u8>) {
    let sa = suffix_array(text);
    let lcp = kasai_lcp(text, &sa);
    let da = sa
        .iter()
        .map(|&pos| u8::from(pos > first_len))
        .collect::<Vec<u8>>();
    (sa, lcp, da)
}

/// Kasai's O(n) LCP computation from the suffix array.
fn kasai_lcp(text: &[u8], sa: &[usize]) -> Vec<usize> {
    let n = text.len();
    if n == 0 {
        return Vec::new();
    }

    let mut rank = vec![0usize; n];
    for (r, &pos) in sa.iter().enumerate() {
        rank[pos] = r;
    }

    let mut lcp = vec![0usize; n];
    let mut h = 0usize;
    for i in 0..n {
        let r = rank[i];
        if r > 0 {
            let j = sa[r - 1];
            while i + h < n && j + h < n && text[i + h] == text[j + h] {
                h += 1;
            }
            lcp[r] = h;
            h = h.saturating_sub(1);
        } else {
            h = 0;
        }
    }
    lcp
}
