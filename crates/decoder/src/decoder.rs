// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use log::debug;
use ndarray::{Array, ArrayView, ArrayView1, ArrayView2, ArrayViewD, Axis, Dimension, Ix1, Ix2};
use num_traits::{AsPrimitive, Float, PrimInt};
use serde::{Deserialize, Serialize};

use crate::{
    DecoderError, DecoderResult, InstancePrediction, PointMaskRle, ScanPrediction,
    filter::{filter_by_point_count, filter_by_score},
    fusion::fuse_scores,
    mask::materialize_masks,
    topk::topk_candidates,
};

pub const DEFAULT_TOPK_INSTS: usize = 100;
pub const DEFAULT_SCORE_THR: f32 = 0.0;
pub const DEFAULT_NPOINT_THR: usize = 100;

/// Post-processing settings, the `test_cfg` block of a model configuration.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Copy)]
pub struct PredictConfig {
    /// number of (query, class) pairs kept by the top-k selection
    pub topk_insts: usize,
    /// candidates need a score strictly above this value
    pub score_thr: f32,
    /// candidates need strictly more set points than this value
    pub npoint_thr: usize,
    /// expected number of classes, excluding "no instance"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_classes: Option<usize>,
}

impl Default for PredictConfig {
    fn default() -> Self {
        Self {
            topk_insts: DEFAULT_TOPK_INSTS,
            score_thr: DEFAULT_SCORE_THR,
            npoint_thr: DEFAULT_NPOINT_THR,
            num_classes: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TestConfig {
    test_cfg: PredictConfig,
}

/// The `model` block of a training configuration. Only the class count and
/// the post-processing settings are read.
#[derive(Debug, Deserialize)]
struct ModelConfig {
    #[serde(default)]
    num_class: Option<usize>,
    test_cfg: PredictConfig,
}

/// Accepted layouts of a configuration document: a full model configuration,
/// a document with a top-level `test_cfg` or the bare settings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ConfigDocument {
    Model { model: ModelConfig },
    Test(TestConfig),
    Bare(PredictConfig),
}

impl From<ConfigDocument> for PredictConfig {
    fn from(doc: ConfigDocument) -> Self {
        match doc {
            ConfigDocument::Model { model } => PredictConfig {
                num_classes: model.test_cfg.num_classes.or(model.num_class),
                ..model.test_cfg
            },
            ConfigDocument::Test(test) => test.test_cfg,
            ConfigDocument::Bare(config) => config,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ConfigSource {
    Yaml(String),
    Json(String),
    Config(PredictConfig),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecoderBuilder {
    config_src: Option<ConfigSource>,
    topk_insts: Option<usize>,
    score_threshold: Option<f32>,
    npoint_threshold: Option<usize>,
    num_classes: Option<usize>,
}

impl DecoderBuilder {
    /// Creates a DecoderBuilder without configuration. Building it without
    /// a configuration uses the ScanNet defaults: top 100 instances, 0.0
    /// score threshold and 100 points threshold.
    ///
    /// # Examples
    /// ```rust
    /// # use ease_decoder::{DecoderBuilder, DecoderResult};
    /// # fn main() -> DecoderResult<()> {
    /// let decoder = DecoderBuilder::new().build()?;
    /// assert_eq!(decoder.topk_insts, 100);
    /// assert_eq!(decoder.score_threshold, 0.0);
    /// assert_eq!(decoder.npoint_threshold, 100);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a configuration in YAML format. The string is only deserialized
    /// by `DecoderBuilder.build()`. The settings may be at the top level, in
    /// a `test_cfg` block or in a `model.test_cfg` block.
    ///
    /// # Examples
    /// ```rust
    /// # use ease_decoder::{DecoderBuilder, DecoderResult};
    /// # fn main() -> DecoderResult<()> {
    /// let config_yaml = include_str!("../../../testdata/ease_scannet.yaml").to_string();
    /// let decoder = DecoderBuilder::new()
    ///     .with_config_yaml_str(config_yaml)
    ///     .build()?;
    /// assert_eq!(decoder.num_classes(), Some(18));
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_config_yaml_str(mut self, yaml_str: String) -> Self {
        self.config_src.replace(ConfigSource::Yaml(yaml_str));
        self
    }

    /// Loads a configuration in JSON format. The string is only deserialized
    /// by `DecoderBuilder.build()`.
    ///
    /// # Examples
    /// ```rust
    /// # use ease_decoder::{DecoderBuilder, DecoderResult};
    /// # fn main() -> DecoderResult<()> {
    /// let config_json = include_str!("../../../testdata/ease_test_cfg.json").to_string();
    /// let decoder = DecoderBuilder::new()
    ///     .with_config_json_str(config_json)
    ///     .build()?;
    /// assert_eq!(decoder.topk_insts, 50);
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_config_json_str(mut self, json_str: String) -> Self {
        self.config_src.replace(ConfigSource::Json(json_str));
        self
    }

    /// Loads an already deserialized configuration.
    ///
    /// # Examples
    /// ```rust
    /// # use ease_decoder::{DecoderBuilder, DecoderResult, PredictConfig};
    /// # fn main() -> DecoderResult<()> {
    /// let decoder = DecoderBuilder::new()
    ///     .with_config(PredictConfig {
    ///         topk_insts: 200,
    ///         score_thr: 0.1,
    ///         npoint_thr: 50,
    ///         num_classes: None,
    ///     })
    ///     .build()?;
    /// assert_eq!(decoder.npoint_threshold, 50);
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_config(mut self, config: PredictConfig) -> Self {
        self.config_src.replace(ConfigSource::Config(config));
        self
    }

    /// Sets the number of (query, class) pairs kept by the top-k selection,
    /// overriding the configuration.
    pub fn with_topk(mut self, topk_insts: usize) -> Self {
        self.topk_insts = Some(topk_insts);
        self
    }

    /// Sets the score threshold of the decoder, overriding the configuration.
    ///
    /// # Examples
    /// ```rust
    /// # use ease_decoder::{DecoderBuilder, DecoderResult};
    /// # fn main() -> DecoderResult<()> {
    /// # let config_yaml = include_str!("../../../testdata/ease_test_cfg.yaml").to_string();
    /// let decoder = DecoderBuilder::new()
    ///     .with_config_yaml_str(config_yaml)
    ///     .with_score_threshold(0.654)
    ///     .build()?;
    /// assert_eq!(decoder.score_threshold, 0.654);
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_score_threshold(mut self, score_threshold: f32) -> Self {
        self.score_threshold = Some(score_threshold);
        self
    }

    /// Sets the point-count threshold of the decoder, overriding the
    /// configuration.
    pub fn with_npoint_threshold(mut self, npoint_threshold: usize) -> Self {
        self.npoint_threshold = Some(npoint_threshold);
        self
    }

    /// Sets the expected number of classes (excluding "no instance"). Class
    /// logits of a different width are rejected at decode time.
    pub fn with_num_classes(mut self, num_classes: usize) -> Self {
        self.num_classes = Some(num_classes);
        self
    }

    /// Builds the decoder. A JSON or YAML configuration is deserialized here
    /// and the overrides are applied on top of it.
    pub fn build(self) -> DecoderResult<Decoder> {
        let mut config = match self.config_src {
            Some(ConfigSource::Json(s)) => serde_json::from_str::<ConfigDocument>(&s)?.into(),
            Some(ConfigSource::Yaml(s)) => serde_yaml::from_str::<ConfigDocument>(&s)?.into(),
            Some(ConfigSource::Config(c)) => c,
            None => PredictConfig::default(),
        };
        if let Some(topk_insts) = self.topk_insts {
            config.topk_insts = topk_insts;
        }
        if let Some(score_thr) = self.score_threshold {
            config.score_thr = score_thr;
        }
        if let Some(npoint_thr) = self.npoint_threshold {
            config.npoint_thr = npoint_thr;
        }
        if self.num_classes.is_some() {
            config.num_classes = self.num_classes;
        }

        if config.score_thr.is_nan() {
            return Err(DecoderError::InvalidConfig(
                "score threshold is NaN".to_string(),
            ));
        }
        if config.num_classes == Some(0) {
            return Err(DecoderError::InvalidConfig(
                "num_classes must be at least 1".to_string(),
            ));
        }
        debug!("building decoder with {:?}", config);

        Ok(Decoder {
            topk_insts: config.topk_insts,
            score_threshold: config.score_thr,
            npoint_threshold: config.npoint_thr,
            num_classes: config.num_classes,
        })
    }
}

/// Per-query outputs of the query decoder for a single scan.
#[derive(Debug, Clone, Copy)]
pub struct QueryOutputs<'a> {
    /// class logits, `(num_queries, num_classes + 1)`
    pub labels: ArrayView2<'a, f32>,
    /// superpoint mask logits, `(num_queries, num_superpoints)`
    pub masks: ArrayView2<'a, f32>,
    /// objectness, `(num_queries,)`
    pub scores: ArrayView1<'a, f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decoder {
    pub topk_insts: usize,
    pub score_threshold: f32,
    pub npoint_threshold: usize,
    num_classes: Option<usize>,
}

impl Decoder {
    pub fn num_classes(&self) -> Option<usize> {
        self.num_classes
    }

    pub fn config(&self) -> PredictConfig {
        PredictConfig {
            topk_insts: self.topk_insts,
            score_thr: self.score_threshold,
            npoint_thr: self.npoint_threshold,
            num_classes: self.num_classes,
        }
    }

    /// Decodes the query outputs of one scan into instance predictions.
    ///
    /// `superpoints` maps every point of the scan to its superpoint. Returns
    /// `DecoderError::ShapeMismatch` when the outputs and the superpoint
    /// assignment disagree on their dimensions. An empty prediction list is
    /// a valid result.
    ///
    /// # Examples
    /// ```rust
    /// # use ease_decoder::{DecoderBuilder, DecoderResult, QueryOutputs};
    /// # use ndarray::{arr1, arr2};
    /// # fn main() -> DecoderResult<()> {
    /// let decoder = DecoderBuilder::new()
    ///     .with_topk(1)
    ///     .with_score_threshold(0.1)
    ///     .with_npoint_threshold(0)
    ///     .build()?;
    ///
    /// let labels = arr2(&[[-5.0, 8.0, -5.0], [8.0, -5.0, -5.0]]);
    /// let masks = arr2(&[[6.0, -6.0], [6.0, 6.0]]);
    /// let scores = arr1(&[1.0, 0.0]);
    /// let superpoints = arr1(&[0, 0, 1, 1, 0]);
    /// let outputs = QueryOutputs {
    ///     labels: labels.view(),
    ///     masks: masks.view(),
    ///     scores: scores.view(),
    /// };
    /// let prediction = decoder.decode("scene0000_00", outputs, superpoints.view())?;
    /// assert_eq!(prediction.len(), 1);
    /// assert_eq!(prediction.pred_instances[0].label_id, 2);
    /// assert_eq!(prediction.pred_instances[0].pred_mask.decode(), vec![1, 1, 0, 0, 1]);
    /// # Ok(())
    /// # }
    /// ```
    pub fn decode(
        &self,
        scan_id: &str,
        outputs: QueryOutputs,
        superpoints: ArrayView1<usize>,
    ) -> DecoderResult<ScanPrediction> {
        let (num_queries, width) = outputs.labels.dim();
        if let Some(num_classes) = self.num_classes
            && width != num_classes + 1
        {
            return Err(DecoderError::ShapeMismatch(format!(
                "expected {} class logits per query, got {}",
                num_classes + 1,
                width
            )));
        }
        if outputs.masks.nrows() != num_queries {
            return Err(DecoderError::ShapeMismatch(format!(
                "{} queries in class logits but {} in mask logits",
                num_queries,
                outputs.masks.nrows()
            )));
        }
        Self::verify_superpoints(superpoints, outputs.masks.ncols())?;

        let fused = fuse_scores(outputs.labels, outputs.scores)?;
        let num_classes = width - 1;
        let selected = topk_candidates(fused.view(), num_classes, self.topk_insts);
        let candidates = materialize_masks(&selected, outputs.masks);
        let candidates = filter_by_score(candidates, self.score_threshold);
        let above_score = candidates.len();
        let survivors = filter_by_point_count(candidates, superpoints, self.npoint_threshold);
        debug!(
            "{}: {} selected, {} above score threshold, {} above point threshold",
            scan_id,
            selected.len(),
            above_score,
            survivors.len()
        );

        let pred_instances = survivors
            .into_iter()
            .map(|(candidate, point_mask)| InstancePrediction {
                scan_id: scan_id.to_string(),
                label_id: candidate.label,
                conf: candidate.score,
                pred_mask: PointMaskRle::encode(&point_mask),
            })
            .collect();

        Ok(ScanPrediction {
            scan_id: scan_id.to_string(),
            pred_instances,
        })
    }

    /// Decodes query outputs of any float type with dynamic shapes.
    ///
    /// Every output may carry a leading batch dimension of 1. The objectness
    /// may be given as `(num_queries,)` or as a `(num_queries, 1)` column.
    /// Superpoint indices of any integer type are accepted.
    ///
    /// # Examples
    /// ```rust
    /// # use ease_decoder::{DecoderBuilder, DecoderResult};
    /// # use ndarray::{Array1, Array3};
    /// # fn main() -> DecoderResult<()> {
    /// let decoder = DecoderBuilder::new().with_npoint_threshold(0).build()?;
    /// let labels = Array3::from_shape_vec((1, 2, 3), vec![-5.0_f64, 8.0, -5.0, 8.0, -5.0, -5.0])?;
    /// let masks = Array3::from_shape_vec((1, 2, 2), vec![6.0_f64, -6.0, 6.0, 6.0])?;
    /// let scores = Array3::from_shape_vec((1, 2, 1), vec![1.0_f64, 0.0])?;
    /// let superpoints = Array1::from(vec![0_i64, 0, 1, 1, 0]);
    /// let prediction = decoder.decode_float(
    ///     "scene0000_00",
    ///     labels.view().into_dyn(),
    ///     masks.view().into_dyn(),
    ///     scores.view().into_dyn(),
    ///     superpoints.view().into_dyn(),
    /// )?;
    /// assert_eq!(prediction.pred_instances[0].label_id, 2);
    /// # Ok(())
    /// # }
    /// ```
    pub fn decode_float<T, S>(
        &self,
        scan_id: &str,
        labels: ArrayViewD<T>,
        masks: ArrayViewD<T>,
        scores: ArrayViewD<T>,
        superpoints: ArrayViewD<S>,
    ) -> DecoderResult<ScanPrediction>
    where
        T: Float + AsPrimitive<f32>,
        S: PrimInt + AsPrimitive<usize>,
    {
        let labels = to_f32(strip_batch("labels", labels, 2)?.into_dimensionality::<Ix2>()?);
        let masks = to_f32(strip_batch("masks", masks, 2)?.into_dimensionality::<Ix2>()?);
        let scores = to_f32(objectness_view(scores)?);
        let superpoints = strip_batch("superpoints", superpoints, 1)?
            .into_dimensionality::<Ix1>()?
            .mapv(|sp| sp.as_());

        self.decode(
            scan_id,
            QueryOutputs {
                labels: labels.view(),
                masks: masks.view(),
                scores: scores.view(),
            },
            superpoints.view(),
        )
    }

    fn verify_superpoints(
        superpoints: ArrayView1<usize>,
        num_superpoints: usize,
    ) -> DecoderResult<()> {
        let Some(&max) = superpoints.iter().max() else {
            return Err(DecoderError::ShapeMismatch(
                "superpoint assignment is empty".to_string(),
            ));
        };
        if max >= num_superpoints {
            return Err(DecoderError::ShapeMismatch(format!(
                "superpoint index {} out of range for {} mask logits per query",
                max, num_superpoints
            )));
        }
        if max + 1 != num_superpoints {
            return Err(DecoderError::ShapeMismatch(format!(
                "superpoint assignment uses {} superpoints but mask logits have {}",
                max + 1,
                num_superpoints
            )));
        }
        Ok(())
    }
}

fn to_f32<T: AsPrimitive<f32>, D: Dimension>(view: ArrayView<T, D>) -> Array<f32, D> {
    view.mapv(|x| x.as_())
}

fn strip_batch<'a, T>(
    name: &str,
    view: ArrayViewD<'a, T>,
    ndim: usize,
) -> DecoderResult<ArrayViewD<'a, T>> {
    if view.ndim() == ndim {
        Ok(view)
    } else if view.ndim() == ndim + 1 && view.shape()[0] == 1 {
        Ok(view.index_axis_move(Axis(0), 0))
    } else {
        Err(DecoderError::ShapeMismatch(format!(
            "{} has shape {:?}, expected {} dimensions with an optional batch of 1",
            name,
            view.shape(),
            ndim
        )))
    }
}

fn objectness_view<T>(view: ArrayViewD<T>) -> DecoderResult<ArrayView1<T>> {
    let view = if view.ndim() == 3 {
        strip_batch("scores", view, 2)?
    } else {
        view
    };
    let shape = view.shape().to_vec();
    let view = match shape.as_slice() {
        [_] => view,
        [_, 1] => view.index_axis_move(Axis(1), 0),
        [1, _] => view.index_axis_move(Axis(0), 0),
        _ => {
            return Err(DecoderError::ShapeMismatch(format!(
                "scores has shape {:?}, expected one objectness per query",
                shape
            )));
        }
    };
    Ok(view.into_dimensionality::<Ix1>()?)
}
