// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

pub type DecoderResult<T, E = DecoderError> = std::result::Result<T, E>;

#[derive(Debug)]
pub enum DecoderError {
    /// The query outputs or the superpoint assignment have inconsistent
    /// dimensions. Fatal for the scan being decoded.
    ShapeMismatch(String),
    InvalidConfig(String),
    /// A run-length encoded mask does not describe a valid point mask.
    InvalidRle(String),
    NdArray(ndarray::ShapeError),
    Json(serde_json::Error),
    Yaml(serde_yaml::Error),
}

impl From<ndarray::ShapeError> for DecoderError {
    fn from(err: ndarray::ShapeError) -> Self {
        DecoderError::NdArray(err)
    }
}

impl From<serde_json::Error> for DecoderError {
    fn from(err: serde_json::Error) -> Self {
        DecoderError::Json(err)
    }
}

impl From<serde_yaml::Error> for DecoderError {
    fn from(err: serde_yaml::Error) -> Self {
        DecoderError::Yaml(err)
    }
}

impl std::fmt::Display for DecoderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecoderError::ShapeMismatch(msg) => write!(f, "Shape mismatch: {}", msg),
            DecoderError::InvalidConfig(msg) => write!(f, "Invalid config: {}", msg),
            DecoderError::InvalidRle(msg) => write!(f, "Invalid RLE mask: {}", msg),
            DecoderError::NdArray(e) => write!(f, "ndarray error: {}", e),
            DecoderError::Json(e) => write!(f, "JSON error: {}", e),
            DecoderError::Yaml(e) => write!(f, "YAML error: {}", e),
        }
    }
}

impl std::error::Error for DecoderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecoderError::NdArray(e) => Some(e),
            DecoderError::Json(e) => Some(e),
            DecoderError::Yaml(e) => Some(e),
            _ => None,
        }
    }
}
