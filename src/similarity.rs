use crate::frequency::FrequencyTable;
use log::warn;
use std::collections::HashMap;

/// Outcome of comparing two frequency tables.
#[derive(Debug, Clone)]
pub struct SimilarityResult {
    /// Similarity in `[0, 1]`
    pub ratio: f64,
    /// Entries of the second table whose operator also appears in the first
    pub common: FrequencyTable,
}

impl SimilarityResult {
    pub fn percent(&self) -> f64 {
        self.ratio * 100.0
    }
}

/// One minus the share of positions holding different keys.
///
/// Sequences of different length are compared over the longer one: positions
/// past the end of the shorter sequence count as mismatches. Two empty
/// sequences are identical.
pub fn positional_similarity<A, B>(keys_a: &[A], keys_b: &[B]) -> f64
where
    A: AsRef<str>,
    B: AsRef<str>,
{
    let (keys_a, keys_b) = (as_strs(keys_a), as_strs(keys_b));
    let len = keys_a.len().max(keys_b.len());
    if len == 0 {
        return 1.0;
    }
    if keys_a.len() != keys_b.len() {
        warn!(
            "comparing key sequences of different length ({} and {}), missing positions count as mismatches",
            keys_a.len(),
            keys_b.len()
        );
    }
    let matches = keys_a.iter().zip(&keys_b).filter(|(a, b)| a == b).count();
    1.0 - (len - matches) as f64 / len as f64
}

/// Matching-blocks ratio `2 * M / (len_a + len_b)`, where `M` is the total length
/// of the longest common contiguous runs found recursively on either side of
/// each match.
pub fn sequence_match_ratio<A, B>(keys_a: &[A], keys_b: &[B]) -> f64
where
    A: AsRef<str>,
    B: AsRef<str>,
{
    let total = keys_a.len() + keys_b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_len(&as_strs(keys_a), &as_strs(keys_b)) as f64 / total as f64
}

fn as_strs<S: AsRef<str>>(keys: &[S]) -> Vec<&str> {
    keys.iter().map(AsRef::as_ref).collect()
}

fn matching_len(a: &[&str], b: &[&str]) -> usize {
    // positions of every key of `b`, ascending
    let mut b2j: HashMap<&str, Vec<usize>> = HashMap::new();
    for (j, &key) in b.iter().enumerate() {
        b2j.entry(key).or_default().push(j);
    }

    let mut matched = 0;
    let mut queue = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, k) = longest_match(a, &b2j, alo, ahi, blo, bhi);
        if k > 0 {
            matched += k;
            if alo < i && blo < j {
                queue.push((alo, i, blo, j));
            }
            if i + k < ahi && j + k < bhi {
                queue.push((i + k, ahi, j + k, bhi));
            }
        }
    }
    matched
}

/// Longest common run of `a[alo..ahi]` and `b[blo..bhi]` as `(i, j, len)`.
/// Ties go to the run starting earliest in `a`, then earliest in `b`.
fn longest_match(
    a: &[&str],
    b2j: &HashMap<&str, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_len) = (alo, blo, 0);
    // length of the run ending at a[i - 1] and b[j], keyed by j
    let mut run_lengths: HashMap<usize, usize> = HashMap::new();
    for i in alo..ahi {
        let mut next_lengths = HashMap::new();
        if let Some(positions) = b2j.get(a[i]) {
            for &j in positions {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let k = j.checked_sub(1).and_then(|prev| run_lengths.get(&prev)).copied().unwrap_or(0) + 1;
                next_lengths.insert(j, k);
                if k > best_len {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_len = k;
                }
            }
        }
        run_lengths = next_lengths;
    }
    (best_i, best_j, best_len)
}

/// Entries of `b` whose operator also appears in `a`, in `b`'s order and with `b`'s counts.
pub fn intersection_by_key(a: &FrequencyTable, b: &FrequencyTable) -> FrequencyTable {
    b.iter().filter(|(operator, _)| a.contains_key(operator)).collect()
}

/// Entries sitting at the same index under the same operator in both tables,
/// with a positive count in `b`. Indices past the shorter table are ignored.
pub fn positional_overlap(a: &FrequencyTable, b: &FrequencyTable) -> FrequencyTable {
    a.iter()
        .zip(b.iter())
        .filter(|((key_a, _), (key_b, count_b))| key_a == key_b && *count_b > 0)
        .map(|(_, entry_b)| entry_b)
        .collect()
}

/// Sequence match ratio of the two tables' operators plus the operators they share.
pub fn similarity_match(a: &FrequencyTable, b: &FrequencyTable) -> SimilarityResult {
    let keys_a: Vec<&str> = a.keys().collect();
    let keys_b: Vec<&str> = b.keys().collect();
    SimilarityResult {
        ratio: sequence_match_ratio(&keys_a, &keys_b),
        common: intersection_by_key(a, b),
    }
}
