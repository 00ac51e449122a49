// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use ease_decoder::{
    DecoderBuilder, PointMaskRle, QueryOutputs, ScanPrediction, labels::class_name,
};
use ndarray::{Array1, Array2, arr1, arr2};
use proptest::prelude::*;

#[derive(Debug, Clone)]
struct Scene {
    labels: Array2<f32>,
    masks: Array2<f32>,
    scores: Array1<f32>,
    superpoints: Array1<usize>,
}

impl Scene {
    fn num_classes(&self) -> usize {
        self.labels.ncols() - 1
    }

    fn decode(&self, topk: usize, score_thr: f32, npoint_thr: usize) -> ScanPrediction {
        let decoder = DecoderBuilder::new()
            .with_topk(topk)
            .with_score_threshold(score_thr)
            .with_npoint_threshold(npoint_thr)
            .build()
            .unwrap();
        decoder
            .decode(
                "scene0000_00",
                QueryOutputs {
                    labels: self.labels.view(),
                    masks: self.masks.view(),
                    scores: self.scores.view(),
                },
                self.superpoints.view(),
            )
            .unwrap()
    }
}

fn scene() -> impl Strategy<Value = Scene> {
    (1usize..6, 1usize..5, 1usize..8).prop_flat_map(|(queries, classes, superpoints)| {
        (
            prop::collection::vec(-10.0f32..10.0, queries * (classes + 1)),
            prop::collection::vec(-6.0f32..6.0, queries * superpoints),
            prop::collection::vec(0.0f32..=1.0, queries),
            prop::collection::vec(0..superpoints, 0..24),
        )
            .prop_map(move |(labels, masks, scores, extra)| {
                // every superpoint owns at least one point
                let mut assignment: Vec<usize> = (0..superpoints).collect();
                assignment.extend(extra);
                Scene {
                    labels: Array2::from_shape_vec((queries, classes + 1), labels).unwrap(),
                    masks: Array2::from_shape_vec((queries, superpoints), masks).unwrap(),
                    scores: Array1::from(scores),
                    superpoints: Array1::from(assignment),
                }
            })
    })
}

proptest! {
    #[test]
    fn prop_predictions_are_well_formed(
        scene in scene(),
        topk in 0usize..40,
        score_thr in -0.5f32..1.0,
        npoint_thr in 0usize..12,
    ) {
        let prediction = scene.decode(topk, score_thr, npoint_thr);
        prop_assert!(prediction.len() <= topk);

        let num_points = scene.superpoints.len();
        for instance in &prediction.pred_instances {
            prop_assert_eq!(&instance.scan_id, "scene0000_00");
            prop_assert!(instance.label_id >= 1 && instance.label_id <= scene.num_classes());
            prop_assert!(instance.conf > score_thr);

            let rle = &instance.pred_mask;
            prop_assert_eq!(rle.len(), num_points);
            prop_assert_eq!(rle.runs().iter().map(|&(_, run)| run).sum::<usize>(), num_points);
            let mask = rle.decode();
            prop_assert_eq!(mask.len(), num_points);
            prop_assert!(mask.iter().filter(|&&p| p != 0).count() > npoint_thr);
        }
    }

    #[test]
    fn prop_decode_is_idempotent(scene in scene(), topk in 0usize..40) {
        let first = scene.decode(topk, 0.0, 0);
        let second = scene.decode(topk, 0.0, 0);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_raising_score_threshold_never_adds(
        scene in scene(),
        topk in 0usize..40,
        low in -0.5f32..1.0,
        delta in 0.0f32..1.0,
    ) {
        let loose = scene.decode(topk, low, 0);
        let strict = scene.decode(topk, low + delta, 0);
        prop_assert!(strict.len() <= loose.len());
        // survivors keep their order and scores
        let mut loose_iter = loose.pred_instances.iter();
        for instance in &strict.pred_instances {
            prop_assert!(loose_iter.any(|other| other == instance));
        }
    }

    #[test]
    fn prop_rle_round_trip(mask in prop::collection::vec(0u8..=1, 1..200)) {
        let rle = PointMaskRle::encode(&mask);
        prop_assert_eq!(rle.len(), mask.len());
        prop_assert_eq!(rle.decode(), mask.clone());
        let counts = PointMaskRle::from_counts_string(&rle.to_counts_string(), mask.len()).unwrap();
        prop_assert_eq!(counts, rle);
    }
}

#[test]
fn test_rle_uniform_round_trip() {
    for len in [1, 2, 17] {
        for value in [0u8, 1] {
            let mask = vec![value; len];
            assert_eq!(PointMaskRle::encode(&mask).decode(), mask);
        }
    }
}

#[test]
fn test_objectness_gates_query() {
    // query 0 favours class 2, query 1 has no objectness at all
    let labels = arr2(&[[-4.0, 6.0, -4.0], [6.0, 6.0, -4.0]]);
    let masks = arr2(&[[3.0, -3.0, 3.0], [3.0, 3.0, 3.0]]);
    let scores = arr1(&[1.0, 0.0]);
    let scene = Scene {
        labels,
        masks,
        scores,
        superpoints: arr1(&[0, 1, 2, 2, 0, 1]),
    };
    let prediction = scene.decode(1, 0.1, 0);
    assert_eq!(prediction.len(), 1);
    let instance = &prediction.pred_instances[0];
    assert_eq!(instance.label_id, 2);
    assert_eq!(class_name(instance.label_id), Some("bed"));
    assert_eq!(instance.pred_mask.decode(), vec![1, 0, 1, 1, 1, 0]);
}

#[test]
fn test_empty_mask_dropped_for_any_score_threshold() {
    let labels = arr2(&[[8.0, -8.0]]);
    let masks = arr2(&[[-0.5, -2.0]]);
    let scores = arr1(&[1.0]);
    let scene = Scene {
        labels,
        masks,
        scores,
        superpoints: arr1(&[0, 1, 0]),
    };
    for score_thr in [-10.0, -1.0, 0.0, 0.5] {
        assert!(scene.decode(10, score_thr, 0).is_empty());
    }
}

#[test]
fn test_prediction_serializes() {
    let scene = Scene {
        labels: arr2(&[[8.0, -8.0]]),
        masks: arr2(&[[4.0, -4.0]]),
        scores: arr1(&[1.0]),
        superpoints: arr1(&[0, 1, 1, 0]),
    };
    let prediction = scene.decode(1, 0.0, 0);
    let json = serde_json::to_value(&prediction).unwrap();
    assert_eq!(json["scan_id"], "scene0000_00");
    assert_eq!(json["pred_instances"][0]["label_id"], 1);
    assert_eq!(json["pred_instances"][0]["pred_mask"]["length"], 4);
    let parsed: ScanPrediction = serde_json::from_value(json).unwrap();
    assert_eq!(parsed, prediction);
}
