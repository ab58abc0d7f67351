//! Embedding trajectories

use crate::{Error, Result};

/// Ordered sequence of per-frame embedding vectors.
///
/// Rows are expected to share one dimension. The sequence does not enforce
/// this on construction: shards of different widths can be concatenated, and
/// the mismatch is reported by [`EmbeddingSequence::dimension`] when a
/// consumer needs a consistent width.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddingSequence {
    rows: Vec<Vec<f32>>,
}

impl EmbeddingSequence {
    /// Creates a sequence from already separated rows
    pub fn new(rows: Vec<Vec<f32>>) -> Self {
        Self { rows }
    }

    /// Creates a sequence by splitting a row-major buffer into rows of `dimension` values
    pub fn from_flat(data: Vec<f32>, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::InvalidInput(
                "embedding dimension must be non-zero".to_string(),
            ));
        }
        if data.len() % dimension != 0 {
            return Err(Error::InvalidInput(format!(
                "{} values cannot be split into rows of {}",
                data.len(),
                dimension
            )));
        }

        let rows = data.chunks_exact(dimension).map(<[f32]>::to_vec).collect();
        Ok(Self { rows })
    }

    /// Number of embedding vectors
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All rows in order
    pub fn rows(&self) -> &[Vec<f32>] {
        &self.rows
    }

    pub fn get(&self, index: usize) -> Option<&[f32]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    /// Returns the shared dimension of all rows, `None` for an empty sequence.
    ///
    /// Fails with [`Error::DimensionMismatch`] naming the first row whose
    /// length differs from row 0.
    pub fn dimension(&self) -> Result<Option<usize>> {
        let Some(first) = self.rows.first() else {
            return Ok(None);
        };
        let expected = first.len();

        for (index, row) in self.rows.iter().enumerate().skip(1) {
            if row.len() != expected {
                return Err(Error::DimensionMismatch {
                    index,
                    expected,
                    found: row.len(),
                });
            }
        }

        Ok(Some(expected))
    }

    /// Checks that the sequence is a proper numeric array: no empty rows and
    /// no NaN or infinite components.
    pub fn validate_numeric(&self) -> Result<()> {
        for (index, row) in self.rows.iter().enumerate() {
            if row.is_empty() {
                return Err(Error::InvalidInput(format!("embedding {index} is empty")));
            }
            if let Some(position) = row.iter().position(|v| !v.is_finite()) {
                return Err(Error::InvalidInput(format!(
                    "embedding {index} has a non-finite value at component {position}"
                )));
            }
        }
        Ok(())
    }

    /// Returns a new sequence holding the first `count` rows
    pub fn prefix(&self, count: usize) -> Self {
        Self {
            rows: self.rows.iter().take(count).cloned().collect(),
        }
    }

    /// Appends the rows of another sequence
    pub fn extend(&mut self, other: EmbeddingSequence) {
        self.rows.extend(other.rows);
    }
}

impl From<Vec<Vec<f32>>> for EmbeddingSequence {
    fn from(rows: Vec<Vec<f32>>) -> Self {
        Self::new(rows)
    }
}
