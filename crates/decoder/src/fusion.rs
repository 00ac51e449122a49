// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

//! Score fusion of the per-query class logits and objectness.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Zip, s};

use crate::{DecoderError, DecoderResult};

/// Numerically stable softmax of a single row of logits.
pub fn softmax(logits: ArrayView1<f32>) -> Array1<f32> {
    let max = logits.fold(f32::NEG_INFINITY, |m, &x| m.max(x));
    let mut exp = logits.mapv(|x| (x - max).exp());
    let sum = exp.sum();
    exp.mapv_inplace(|x| x / sum);
    exp
}

/// Fuses the class probabilities of every query with its objectness.
///
/// `logits` has shape `(num_queries, num_classes + 1)`, the last column being
/// the "no instance" logit. The softmax is taken over all `num_classes + 1`
/// columns, the last column is dropped and each row is scaled by the query's
/// objectness. The result is flattened row-major, so the score of query `q`
/// and class index `c` lands at `q * num_classes + c`.
pub fn fuse_scores(
    logits: ArrayView2<f32>,
    objectness: ArrayView1<f32>,
) -> DecoderResult<Array1<f32>> {
    let (num_queries, width) = logits.dim();
    if width == 0 {
        return Err(DecoderError::ShapeMismatch(
            "class logits must contain at least the no-instance column".to_string(),
        ));
    }
    if num_queries != objectness.len() {
        return Err(DecoderError::ShapeMismatch(format!(
            "{} queries in class logits but {} objectness scores",
            num_queries,
            objectness.len()
        )));
    }

    let num_classes = width - 1;
    let mut fused = Array2::<f32>::zeros((num_queries, num_classes));
    Zip::from(fused.rows_mut())
        .and(logits.rows())
        .and(objectness)
        .for_each(|mut out, row, &obj| {
            let probs = softmax(row);
            out.assign(&probs.slice(s![..num_classes]));
            out.mapv_inplace(|p| p * obj);
        });

    Ok(fused.into_shape_with_order(num_queries * num_classes)?)
}
