use crate::kdtree::{squared_distance, DescriptorTree, TopTwo};
use rayon::prelude::*;
use sift_core::{DescriptorSet, KnnMatch, Match};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Lowe's ratio: a best match must be closer than this fraction of the second best
pub const RATIO_THRESHOLD: f32 = 0.7;

/// Nearest-neighbour search strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum MatchStrategy {
    /// Exact linear scan over all train rows
    BruteForce,
    /// Best-bin-first k-d tree; `leaf_checks = 0` is exhaustive
    KdTree { leaf_checks: usize },
}

impl Default for MatchStrategy {
    fn default() -> Self {
        MatchStrategy::KdTree { leaf_checks: 32 }
    }
}

/// Two-nearest-neighbour descriptor matcher using Euclidean distance
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DescriptorMatcher {
    strategy: MatchStrategy,
}

impl DescriptorMatcher {
    pub fn new(strategy: MatchStrategy) -> Self {
        Self { strategy }
    }

    pub fn brute_force() -> Self {
        Self::new(MatchStrategy::BruteForce)
    }

    pub fn strategy(&self) -> MatchStrategy {
        self.strategy
    }

    /// Best and second-best train row for every query row, in query order.
    /// Reported distances are Euclidean (L2), not squared.
    ///
    /// An empty train set yields no matches; a single train row yields
    /// best-only matches. Descriptor sets of different widths cannot be
    /// compared and also yield no matches.
    pub fn knn_match(&self, query: &DescriptorSet, train: &DescriptorSet) -> Vec<KnnMatch> {
        if query.is_empty() || train.is_empty() {
            return Vec::new();
        }
        if query.width() != train.width() {
            log::warn!(
                "descriptor width mismatch: query {} vs train {}",
                query.width(),
                train.width()
            );
            return Vec::new();
        }

        let tops: Vec<TopTwo> = match self.strategy {
            MatchStrategy::BruteForce => (0..query.len())
                .into_par_iter()
                .map(|q| {
                    let mut top = TopTwo::default();
                    let row = query.row(q);
                    for (t, candidate) in train.rows().enumerate() {
                        top.insert(squared_distance(row, candidate), t);
                    }
                    top
                })
                .collect(),
            MatchStrategy::KdTree { leaf_checks } => {
                let tree = DescriptorTree::build(train);
                (0..query.len())
                    .into_par_iter()
                    .map(|q| tree.top_two(query.row(q), leaf_checks))
                    .collect()
            }
        };

        let matches: Vec<KnnMatch> = tops
            .into_iter()
            .enumerate()
            .filter_map(|(q, top)| {
                // reported distances are L2, the squared form is only used for search
                let to_match = |(dist_sq, train): (f32, usize)| Match {
                    query: q,
                    train,
                    distance: dist_sq.sqrt(),
                };
                let second = top.second.map(to_match);
                top.best.map(|best| KnnMatch { best: to_match(best), second })
            })
            .collect();

        log::debug!(
            "knn match: {} query x {} train rows, {} results ({:?})",
            query.len(),
            train.len(),
            matches.len(),
            self.strategy
        );
        matches
    }
}

/// Accept iff `best < RATIO_THRESHOLD * second`. A match without a second
/// neighbour cannot be judged and is rejected.
pub fn passes_ratio_test(m: &KnnMatch) -> bool {
    match m.second {
        Some(second) => m.best.distance < RATIO_THRESHOLD * second.distance,
        None => false,
    }
}

/// Best matches that pass the ratio test, in input order
pub fn ratio_filter(matches: &[KnnMatch]) -> Vec<Match> {
    matches.iter().filter(|m| passes_ratio_test(m)).map(|m| m.best).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn knn(best: f32, second: Option<f32>) -> KnnMatch {
        KnnMatch {
            best: Match { query: 0, train: 0, distance: best },
            second: second.map(|d| Match { query: 0, train: 1, distance: d }),
        }
    }

    fn pseudo_random_set(n: usize, width: usize, seed: usize) -> DescriptorSet {
        DescriptorSet::from_rows(
            width,
            (0..n).map(|i| {
                (0..width)
                    .map(|d| (((i + seed) * 2654435761usize + d * 40503) % 256) as f32)
                    .collect::<Vec<_>>()
            }),
        )
    }

    #[test]
    fn test_ratio_boundary() {
        assert!(!passes_ratio_test(&knn(0.7 * 10.0, Some(10.0))));
        assert!(passes_ratio_test(&knn(0.69 * 10.0, Some(10.0))));
    }

    #[test]
    fn test_best_only_match_is_rejected() {
        assert!(!passes_ratio_test(&knn(0.0, None)));
    }

    #[test]
    fn test_empty_train_set() {
        let query = DescriptorSet::from_rows(2, [[1.0, 2.0]]);
        let train = DescriptorSet::new(2);
        assert!(DescriptorMatcher::brute_force().knn_match(&query, &train).is_empty());
    }

    #[test]
    fn test_single_train_row_has_no_second() {
        let query = DescriptorSet::from_rows(2, [[1.0, 2.0], [3.0, 4.0]]);
        let train = DescriptorSet::from_rows(2, [[0.0, 0.0]]);
        let matches = DescriptorMatcher::brute_force().knn_match(&query, &train);
        assert_eq!(matches.len(), 2);
        assert!(matches.iter().all(|m| m.second.is_none()));
        assert!(ratio_filter(&matches).is_empty());
    }

    #[test]
    fn test_width_mismatch_yields_nothing() {
        let query = DescriptorSet::from_rows(2, [[1.0, 2.0]]);
        let train = DescriptorSet::from_rows(3, [[1.0, 2.0, 3.0], [0.0, 0.0, 0.0]]);
        assert!(DescriptorMatcher::default().knn_match(&query, &train).is_empty());
    }

    #[test]
    fn test_euclidean_distance() {
        let query = DescriptorSet::from_rows(2, [[0.0, 0.0]]);
        let train = DescriptorSet::from_rows(2, [[3.0, 4.0], [6.0, 8.0], [30.0, 40.0]]);
        let m = DescriptorMatcher::brute_force().knn_match(&query, &train)[0];
        assert_eq!(m.best.train, 0);
        assert!((m.best.distance - 5.0).abs() < 1e-6);
        assert_eq!(m.second.map(|s| s.train), Some(1));
        assert!((m.second.unwrap().distance - 10.0).abs() < 1e-6);
        assert!(passes_ratio_test(&m));
    }

    #[test]
    fn test_ratio_uses_l2_not_squared_distance() {
        // 6 / 8 = 0.75 fails the ratio; 36 / 64 = 0.5625 would pass
        let query = DescriptorSet::from_rows(1, [[0.0]]);
        let train = DescriptorSet::from_rows(1, [[6.0], [8.0]]);
        for matcher in [DescriptorMatcher::brute_force(), DescriptorMatcher::default()] {
            let m = matcher.knn_match(&query, &train)[0];
            assert_eq!(m.best.distance, 6.0);
            assert_eq!(m.second.map(|s| s.distance), Some(8.0));
            assert!(!passes_ratio_test(&m));
        }
        let matches = DescriptorMatcher::brute_force().knn_match(&query, &train);
        assert!(ratio_filter(&matches).is_empty());
    }

    #[test]
    fn test_identical_sets_match_themselves() {
        let set = pseudo_random_set(60, 32, 0);
        let matches = DescriptorMatcher::brute_force().knn_match(&set, &set);
        assert_eq!(matches.len(), 60);
        for (i, m) in matches.iter().enumerate() {
            assert_eq!(m.best.query, i);
            assert_eq!(m.best.distance, 0.0);
        }
    }

    #[test]
    fn test_exhaustive_kdtree_agrees_with_brute_force() {
        let train = pseudo_random_set(150, 128, 3);
        let query = pseudo_random_set(40, 128, 1000);
        let a = DescriptorMatcher::brute_force().knn_match(&query, &train);
        let exhaustive = DescriptorMatcher::new(MatchStrategy::KdTree { leaf_checks: 0 });
        let b = exhaustive.knn_match(&query, &train);
        assert_eq!(a, b);
    }

    #[test]
    fn test_matching_is_deterministic() {
        let train = pseudo_random_set(100, 64, 5);
        let query = pseudo_random_set(30, 64, 77);
        let matcher = DescriptorMatcher::default();
        assert_eq!(matcher.knn_match(&query, &train), matcher.knn_match(&query, &train));
    }

    proptest! {
        #[test]
        fn ratio_test_is_strict(second in 0.01f32..1000.0, factor in 0.0f32..2.0) {
            let best = second * factor;
            let m = knn(best, Some(second));
            prop_assert_eq!(passes_ratio_test(&m), best < RATIO_THRESHOLD * second);
        }
    }
}
