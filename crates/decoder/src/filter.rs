// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

//! Score and point-count filtering of candidate proposals. Both stages use
//! strict comparisons and keep the relative order of the survivors.

use ndarray::{
    ArrayView1,
    parallel::prelude::{IntoParallelIterator, ParallelIterator},
};

use crate::{CandidateProposal, mask::expand_to_points};

/// Keeps the candidates whose score is strictly above `score_threshold`.
pub fn filter_by_score(
    candidates: Vec<CandidateProposal>,
    score_threshold: f32,
) -> Vec<CandidateProposal> {
    candidates
        .into_iter()
        .filter(|c| c.score > score_threshold)
        .collect()
}

/// Expands each candidate mask to point resolution and keeps the candidates
/// with strictly more than `npoint_threshold` set points. Survivors are
/// returned together with their point mask.
pub fn filter_by_point_count(
    candidates: Vec<CandidateProposal>,
    superpoints: ArrayView1<usize>,
    npoint_threshold: usize,
) -> Vec<(CandidateProposal, Vec<u8>)> {
    candidates
        .into_par_iter()
        .filter_map(|c| {
            let point_mask = expand_to_points(c.superpoint_mask.view(), superpoints);
            let npoint = point_mask.iter().filter(|&&p| p != 0).count();
            if npoint > npoint_threshold {
                Some((c, point_mask))
            } else {
                None
            }
        })
        .collect()
}
