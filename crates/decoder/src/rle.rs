// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

//! Run-length encoding of point masks.

use serde::{Deserialize, Serialize};

use crate::{DecoderError, DecoderResult};

/// A point mask stored as `(value, run_length)` pairs in point order.
///
/// Runs do not have to alternate in value, but every run is non-empty and the
/// run lengths always sum to [`PointMaskRle::len`]. Deserialization checks
/// both.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawPointMaskRle")]
pub struct PointMaskRle {
    length: usize,
    runs: Vec<(u8, usize)>,
}

#[derive(Deserialize)]
struct RawPointMaskRle {
    length: usize,
    runs: Vec<(u8, usize)>,
}

impl TryFrom<RawPointMaskRle> for PointMaskRle {
    type Error = DecoderError;

    fn try_from(raw: RawPointMaskRle) -> DecoderResult<Self> {
        let rle = Self::from_runs(raw.runs)?;
        if rle.length != raw.length {
            return Err(DecoderError::InvalidRle(format!(
                "runs cover {} points but length is {}",
                rle.length, raw.length
            )));
        }
        Ok(rle)
    }
}

impl PointMaskRle {
    /// Encodes `mask` with one run per maximal sequence of identical values.
    ///
    /// # Examples
    /// ```rust
    /// # use ease_decoder::PointMaskRle;
    /// let rle = PointMaskRle::encode(&[0, 0, 1, 1, 1, 0]);
    /// assert_eq!(rle.runs(), &[(0, 2), (1, 3), (0, 1)]);
    /// assert_eq!(rle.decode(), vec![0, 0, 1, 1, 1, 0]);
    /// ```
    pub fn encode(mask: &[u8]) -> Self {
        let mut runs: Vec<(u8, usize)> = Vec::new();
        for &v in mask {
            match runs.last_mut() {
                Some((value, run)) if *value == v => *run += 1,
                _ => runs.push((v, 1)),
            }
        }
        Self {
            length: mask.len(),
            runs,
        }
    }

    /// Builds a mask from explicit runs, rejecting empty runs.
    pub fn from_runs(runs: Vec<(u8, usize)>) -> DecoderResult<Self> {
        if let Some(pos) = runs.iter().position(|&(_, run)| run == 0) {
            return Err(DecoderError::InvalidRle(format!(
                "run {} has zero length",
                pos
            )));
        }
        let length = runs.iter().map(|&(_, run)| run).sum();
        Ok(Self { length, runs })
    }

    pub fn decode(&self) -> Vec<u8> {
        let mut mask = Vec::with_capacity(self.length);
        for &(value, run) in &self.runs {
            mask.extend(std::iter::repeat_n(value, run));
        }
        mask
    }

    /// Number of points covered by the mask.
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn runs(&self) -> &[(u8, usize)] {
        &self.runs
    }

    /// Number of set points.
    pub fn area(&self) -> usize {
        self.runs
            .iter()
            .filter(|&&(value, _)| value != 0)
            .map(|&(_, run)| run)
            .sum()
    }

    /// Formats the set points as the ScanNet benchmark counts string:
    /// space separated `start length` pairs where `start` is the 1-based
    /// index of the first point of each foreground run.
    ///
    /// # Examples
    /// ```rust
    /// # use ease_decoder::PointMaskRle;
    /// let rle = PointMaskRle::encode(&[0, 1, 1, 0, 0, 1]);
    /// assert_eq!(rle.to_counts_string(), "2 2 6 1");
    /// ```
    pub fn to_counts_string(&self) -> String {
        let mut counts: Vec<(usize, usize)> = Vec::new();
        let mut pos = 0;
        for &(value, run) in &self.runs {
            if value != 0 {
                match counts.last_mut() {
                    // repeated foreground runs merge into one
                    Some((start, len)) if *start + *len == pos + 1 => *len += run,
                    _ => counts.push((pos + 1, run)),
                }
            }
            pos += run;
        }
        counts
            .iter()
            .map(|(start, len)| format!("{} {}", start, len))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Parses a ScanNet counts string describing a mask of `length` points.
    pub fn from_counts_string(counts: &str, length: usize) -> DecoderResult<Self> {
        let values = counts
            .split_whitespace()
            .map(|s| {
                s.parse::<usize>()
                    .map_err(|e| DecoderError::InvalidRle(format!("invalid count {:?}: {}", s, e)))
            })
            .collect::<DecoderResult<Vec<_>>>()?;
        if values.len() % 2 != 0 {
            return Err(DecoderError::InvalidRle(format!(
                "expected start/length pairs, got {} values",
                values.len()
            )));
        }

        let mut mask = vec![0u8; length];
        let mut end = 0;
        for pair in values.chunks_exact(2) {
            let (start, len) = (pair[0], pair[1]);
            if start == 0 || len == 0 {
                return Err(DecoderError::InvalidRle(format!(
                    "invalid run {} {}",
                    start, len
                )));
            }
            let begin = start - 1;
            if begin < end {
                return Err(DecoderError::InvalidRle(format!(
                    "run starting at {} overlaps the previous run",
                    start
                )));
            }
            end = match begin.checked_add(len) {
                Some(end) if end <= length => end,
                _ => {
                    return Err(DecoderError::InvalidRle(format!(
                        "run {} {} exceeds mask length {}",
                        start, len, length
                    )));
                }
            };
            mask[begin..end].fill(1);
        }
        Ok(Self::encode(&mask))
    }
}
