//! Face embedding vectors.

use serde::{Deserialize, Serialize};

use crate::error::ProfileError;

/// Minimum dimensionality of a usable face embedding.
pub const MIN_EMBEDDING_DIM: usize = 128;

/// A fixed-length numeric vector summarising a detected face.
///
/// Serialised as a plain JSON array of numbers.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Euclidean norm, accumulated in `f64`.
    pub fn norm(&self) -> f64 {
        self.0
            .iter()
            .map(|v| f64::from(*v) * f64::from(*v))
            .sum::<f64>()
            .sqrt()
    }

    /// Dot product over the common prefix of both vectors.
    pub fn dot(&self, other: &Embedding) -> f64 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| f64::from(*a) * f64::from(*b))
            .sum()
    }

    /// Check the vector is long enough and finite.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.0.len() < MIN_EMBEDDING_DIM {
            return Err(ProfileError::EmbeddingTooShort {
                len: self.0.len(),
                min: MIN_EMBEDDING_DIM,
            });
        }
        if self.0.iter().any(|v| !v.is_finite()) {
            return Err(ProfileError::NonFiniteEmbedding);
        }
        Ok(())
    }

    /// Element-wise mean of several equally sized embeddings.
    ///
    /// Returns `None` when the input is empty or the lengths differ.
    pub fn mean<'a>(embeddings: impl IntoIterator<Item = &'a Embedding>) -> Option<Embedding> {
        let mut iter = embeddings.into_iter();
        let first = iter.next()?;
        let mut sum: Vec<f64> = first.0.iter().map(|v| f64::from(*v)).collect();
        let mut count = 1usize;
        for e in iter {
            if e.len() != sum.len() {
                return None;
            }
            for (acc, v) in sum.iter_mut().zip(e.0.iter()) {
                *acc += f64::from(*v);
            }
            count += 1;
        }
        Some(Embedding(
            sum.into_iter().map(|v| (v / count as f64) as f32).collect(),
        ))
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}
