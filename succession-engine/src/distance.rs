//! Consecutive embedding distances

use crate::Result;
use succession_core::EmbeddingSequence;

/// Euclidean distance between each embedding and its successor.
///
/// Element `i` is `‖e[i+1] − e[i]‖`, so `n` embeddings yield `n − 1`
/// distances (none for fewer than two). Fails with a dimension mismatch if the
/// rows do not share one width.
pub fn consecutive_distances(embeddings: &EmbeddingSequence) -> Result<Vec<f64>> {
    embeddings.dimension()?;

    let distances = embeddings
        .rows()
        .windows(2)
        .map(|pair| euclidean(&pair[0], &pair[1]))
        .collect();

    Ok(distances)
}

/// Euclidean norm of `b − a`, accumulated in f64
pub fn euclidean(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = y as f64 - x as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}
