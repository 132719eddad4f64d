//! Traffic split renormalization.

/// Sum every weighted split is scaled to.
pub const TOTAL_WEIGHT: u32 = 100;

/// Scale `weights` so they sum to exactly [`TOTAL_WEIGHT`].
///
/// Uses the largest-remainder method: every entry gets the floor of its
/// exact share, and the units left over go to the largest remainders, ties
/// resolved by input order. Weights that already sum to the total are kept
/// as they are. If every weight is zero the total is split evenly.
///
/// The input order is preserved in the output.
pub fn normalize<K: Clone>(weights: &[(K, u64)]) -> Vec<(K, u32)> {
    if weights.is_empty() {
        return Vec::new();
    }

    let total: u128 = weights.iter().map(|(_, w)| u128::from(*w)).sum();
    let shares: Vec<u128> = if total == 0 {
        vec![1; weights.len()]
    } else {
        weights.iter().map(|(_, w)| u128::from(*w)).collect()
    };
    let total: u128 = shares.iter().sum();
    let target = u128::from(TOTAL_WEIGHT);

    let mut result: Vec<u32> = Vec::with_capacity(shares.len());
    let mut remainders: Vec<(u128, usize)> = Vec::with_capacity(shares.len());
    for (index, share) in shares.iter().enumerate() {
        let exact = share * target;
        // floor(share / total * 100) never exceeds 100
        result.push(u32::try_from(exact / total).unwrap_or(TOTAL_WEIGHT));
        remainders.push((exact % total, index));
    }

    let assigned: u32 = result.iter().sum();
    let leftover = TOTAL_WEIGHT.saturating_sub(assigned) as usize;
    remainders.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    for (_, index) in remainders.into_iter().take(leftover) {
        result[index] += 1;
    }

    weights
        .iter()
        .zip(result)
        .map(|((key, _), weight)| (key.clone(), weight))
        .collect()
}
