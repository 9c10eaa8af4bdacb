//! Normalisation, distance and similarity scoring.
//!
//! Vectors are stored as unit vectors and compared by squared Euclidean
//! distance, which lies in `[0, 4]` for two unit vectors. Scores map that
//! distance onto `[0, 1]` as `1 - d / 4`.
//!
//! Note that `1 - d / 2` would equal cosine similarity. The `/ 4` scale is kept
//! because the confidence thresholds below were tuned against it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, IndexResult};

/// Similarity at or above which two faces are treated as the same person.
pub const HIGH_CONFIDENCE_THRESHOLD: f32 = 0.85;

/// Similarity at or above which a match is worth a manual review.
pub const MEDIUM_CONFIDENCE_THRESHOLD: f32 = 0.70;

/// Discrete classification of a similarity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

impl ConfidenceTier {
    /// Classify a similarity against the engine thresholds.
    pub fn classify(similarity: f32) -> Self {
        if similarity >= HIGH_CONFIDENCE_THRESHOLD {
            Self::High
        } else if similarity >= MEDIUM_CONFIDENCE_THRESHOLD {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check that `embedding` can enter the index: right length, finite values.
pub fn validate(embedding: &[f32], dimension: usize) -> IndexResult<()> {
    if embedding.len() != dimension {
        return Err(IndexError::dimension_mismatch(dimension, embedding.len()));
    }
    if let Some(i) = embedding.iter().position(|x| !x.is_finite()) {
        return Err(IndexError::InvalidInput(format!(
            "Embedding component {i} is not a finite number"
        )));
    }
    Ok(())
}

/// Scale `embedding` to unit length.
///
/// A zero vector is returned as-is rather than rejected.
pub fn normalize(embedding: &[f32], dimension: usize) -> IndexResult<Vec<f32>> {
    validate(embedding, dimension)?;

    let norm = l2_norm(embedding);
    if norm > 0.0 {
        Ok(embedding.iter().map(|x| x / norm).collect())
    } else {
        Ok(embedding.to_vec())
    }
}

/// Map a raw squared distance to `(similarity, tier)`.
pub fn score(raw_distance: f32) -> (f32, ConfidenceTier) {
    let similarity = (1.0 - raw_distance / 4.0).max(0.0);
    (similarity, ConfidenceTier::classify(similarity))
}

/// Squared Euclidean distance. Callers guarantee equal lengths.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

pub(crate) fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}
