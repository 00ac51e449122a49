// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use std::cmp::Ordering;

use ndarray::ArrayView1;

/// A (query, class) pair picked from the flattened fused scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopkCandidate {
    /// fused class-objectness score
    pub score: f32,
    /// query slot the score belongs to
    pub query: usize,
    /// 1-based class label, 0 is never produced
    pub label: usize,
}

/// Returns the `k` largest scores together with their flat indices.
///
/// `k` is clamped to the number of scores. The selection is exact; among
/// equal scores the lower index wins, so the result is deterministic. The
/// returned pairs are ordered by descending score.
pub fn select_topk(scores: ArrayView1<f32>, k: usize) -> Vec<(f32, usize)> {
    let k = k.min(scores.len());
    if k == 0 {
        return Vec::new();
    }

    let by_score = |a: &usize, b: &usize| -> Ordering {
        scores[*b].total_cmp(&scores[*a]).then(a.cmp(b))
    };
    let mut order: Vec<usize> = (0..scores.len()).collect();
    if k < order.len() {
        order.select_nth_unstable_by(k - 1, by_score);
        order.truncate(k);
    }
    order.sort_unstable_by(by_score);
    order.into_iter().map(|i| (scores[i], i)).collect()
}

/// Splits a flat index over a `(num_queries, num_classes)` score surface into
/// `(query, class_index)`.
#[inline(always)]
pub fn decompose_index(flat: usize, num_classes: usize) -> (usize, usize) {
    (flat / num_classes, flat % num_classes)
}

/// Joint top-k over all queries and classes, decomposed into candidates.
pub fn topk_candidates(scores: ArrayView1<f32>, num_classes: usize, k: usize) -> Vec<TopkCandidate> {
    if num_classes == 0 {
        return Vec::new();
    }
    select_topk(scores, k)
        .into_iter()
        .map(|(score, flat)| {
            let (query, class) = decompose_index(flat, num_classes);
            TopkCandidate {
                score,
                query,
                label: class + 1,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use ndarray::arr1;

    use super::*;

    #[test]
    fn test_select_topk_exact_set() {
        let scores = arr1(&[0.1, 0.9, 0.3, 0.7, 0.5, 0.2]);
        let top = select_topk(scores.view(), 3);
        assert_eq!(top, vec![(0.9, 1), (0.7, 3), (0.5, 4)]);
    }

    #[test]
    fn test_select_topk_clamps_k() {
        let scores = arr1(&[0.4, 0.6]);
        let top = select_topk(scores.view(), 100);
        assert_eq!(top, vec![(0.6, 1), (0.4, 0)]);
    }

    #[test]
    fn test_select_topk_zero() {
        let scores = arr1(&[0.4, 0.6]);
        assert!(select_topk(scores.view(), 0).is_empty());
        let empty = arr1::<f32>(&[]);
        assert!(select_topk(empty.view(), 5).is_empty());
    }

    #[test]
    fn test_select_topk_ties_prefer_low_index() {
        let scores = arr1(&[0.5, 0.5, 0.5, 0.5]);
        let top = select_topk(scores.view(), 2);
        assert_eq!(top, vec![(0.5, 0), (0.5, 1)]);
    }

    #[test]
    fn test_decompose_index() {
        assert_eq!(decompose_index(0, 18), (0, 0));
        assert_eq!(decompose_index(17, 18), (0, 17));
        assert_eq!(decompose_index(18, 18), (1, 0));
        assert_eq!(decompose_index(3 * 18 + 5, 18), (3, 5));
    }

    #[test]
    fn test_topk_candidates_labels() {
        // 3 queries x 2 classes
        let scores = arr1(&[0.1, 0.2, 0.8, 0.05, 0.3, 0.6]);
        let candidates = topk_candidates(scores.view(), 2, 2);
        assert_eq!(
            candidates,
            vec![
                TopkCandidate {
                    score: 0.8,
                    query: 1,
                    label: 1
                },
                TopkCandidate {
                    score: 0.6,
                    query: 2,
                    label: 2
                },
            ]
        );
    }

    #[test]
    fn test_topk_candidates_without_classes() {
        let scores = arr1::<f32>(&[]);
        assert!(topk_candidates(scores.view(), 0, 10).is_empty());
    }
}
