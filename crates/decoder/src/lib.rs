// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

//! EASE - Instance Decoder
//!
//! Turns the per-query outputs of a query-based 3D instance segmentation
//! model into scored, labelled and run-length encoded instance masks.
//!
//! The pipeline runs in a fixed order:
//! 1. [`fusion`] - softmax over the class logits, the "no instance" column is
//!    dropped and the probabilities are scaled by the query objectness.
//! 2. [`topk`] - joint top-k over all (query, class) pairs.
//! 3. [`mask`] - binarized superpoint masks and mask-quality re-weighting.
//! 4. [`filter`] - score threshold, then point-count threshold.
//! 5. [`rle`] - expansion to point resolution and run-length encoding.
//!
//! [`DecoderBuilder`] configures and builds a [`Decoder`] running all stages.
use ndarray::Array1;
use serde::{Deserialize, Serialize};

pub mod error;
pub mod filter;
pub mod fusion;
pub mod labels;
pub mod mask;
pub mod rle;
pub mod topk;

mod decoder;
pub use decoder::*;

pub use error::{DecoderError, DecoderResult};
pub use rle::PointMaskRle;

/// A (query, class) proposal after mask materialization, before filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateProposal {
    /// fused score re-weighted by the mask quality
    pub score: f32,
    /// 1-based class label
    pub label: usize,
    /// query slot the proposal was gathered from
    pub query: usize,
    /// binarized mask with one entry per superpoint
    pub superpoint_mask: Array1<u8>,
}

/// A single predicted instance of a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstancePrediction {
    pub scan_id: String,
    /// 1-based class label, see [`labels::class_name`]
    pub label_id: usize,
    /// confidence of the instance, higher implies more confidence
    pub conf: f32,
    /// point mask covering every point of the scan
    pub pred_mask: PointMaskRle,
}

impl InstancePrediction {
    /// Number of points assigned to the instance.
    pub fn num_points(&self) -> usize {
        self.pred_mask.area()
    }
}

/// All instances predicted for one scan.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScanPrediction {
    pub scan_id: String,
    pub pred_instances: Vec<InstancePrediction>,
}

impl ScanPrediction {
    pub fn len(&self) -> usize {
        self.pred_instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pred_instances.is_empty()
    }
}
