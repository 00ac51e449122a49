// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use log::trace;
use ndarray::{
    Array1, ArrayView1, ArrayView2,
    parallel::prelude::{IntoParallelRefIterator, ParallelIterator},
};

use crate::{CandidateProposal, topk::TopkCandidate};

/// Guards the mask quality division for empty masks.
pub const MASK_EPSILON: f32 = 1e-6;

#[inline(always)]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Binarizes a row of mask logits. A superpoint is set when its logit is
/// strictly positive, which is the same as a probability above 0.5.
pub fn binarize(logits: ArrayView1<f32>) -> Array1<u8> {
    logits.mapv(|x| u8::from(x > 0.0))
}

/// Mean sigmoid probability over the superpoints of the binarized mask.
///
/// Returns ~0 for an empty mask instead of dividing by zero.
pub fn mask_quality(logits: ArrayView1<f32>) -> f32 {
    let (weighted, count) = logits.fold((0.0f32, 0.0f32), |(weighted, count), &x| {
        if x > 0.0 {
            (weighted + sigmoid(x), count + 1.0)
        } else {
            (weighted, count)
        }
    });
    weighted / (count + MASK_EPSILON)
}

/// Gathers the mask logits of every selected query, binarizes them and
/// re-weights the fused score with the mask quality.
///
/// Candidates are processed independently and the output keeps the input
/// order.
pub fn materialize_masks(
    selected: &[TopkCandidate],
    mask_logits: ArrayView2<f32>,
) -> Vec<CandidateProposal> {
    selected
        .par_iter()
        .map(|c| {
            let logits = mask_logits.row(c.query);
            let quality = mask_quality(logits);
            trace!(
                "query {} label {} fused score {} mask quality {}",
                c.query, c.label, c.score, quality
            );
            CandidateProposal {
                score: c.score * quality,
                label: c.label,
                query: c.query,
                superpoint_mask: binarize(logits),
            }
        })
        .collect()
}

/// Expands a superpoint mask to point resolution. Point `p` takes the value
/// of superpoint `superpoints[p]`.
///
/// Every entry of `superpoints` must be a valid index into `superpoint_mask`.
pub fn expand_to_points(superpoint_mask: ArrayView1<u8>, superpoints: ArrayView1<usize>) -> Vec<u8> {
    superpoints.iter().map(|&sp| superpoint_mask[sp]).collect()
}
