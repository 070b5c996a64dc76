use rand::Rng;
use rand::seq::SliceRandom;

/// Uniform sample of `count` distinct values of `0..pool_size`, in random order.
///
/// Returns every index (shuffled) when `count >= pool_size`.
pub(crate) fn distinct_indices<R: Rng + ?Sized>(
    pool_size: usize,
    count: usize,
    rng: &mut R,
) -> Vec<usize> {
    let mut idxs: Vec<usize> = (0..pool_size).collect();
    idxs.shuffle(rng);
    idxs.truncate(count);
    idxs
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_distinct() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut idxs = distinct_indices(10, 3, &mut rng);
        assert_eq!(idxs.len(), 3);
        idxs.sort_unstable();
        idxs.dedup();
        assert_eq!(idxs.len(), 3);
        assert!(idxs.iter().all(|&i| i < 10));
    }

    #[test]
    fn test_count_larger_than_pool() {
        let mut rng = StdRng::seed_from_u64(4);
        assert_eq!(distinct_indices(2, 3, &mut rng).len(), 2);
    }
}
