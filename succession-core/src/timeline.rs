//! Frame timestamps

use crate::{Error, Result};

/// Non-decreasing frame timestamps in seconds, one per candidate keyframe
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimestampSequence {
    seconds: Vec<f64>,
}

impl TimestampSequence {
    /// Creates a timestamp sequence, rejecting NaN, infinite or decreasing values
    pub fn new(seconds: Vec<f64>) -> Result<Self> {
        for (index, &value) in seconds.iter().enumerate() {
            if !value.is_finite() {
                return Err(Error::InvalidInput(format!(
                    "timestamp {index} is not a finite number"
                )));
            }
            if index > 0 && value < seconds[index - 1] {
                return Err(Error::NonMonotonicTimestamps { index, value });
            }
        }
        Ok(Self { seconds })
    }

    pub fn len(&self) -> usize {
        self.seconds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seconds.is_empty()
    }

    /// Timestamp of frame `index`, if it exists
    pub fn get(&self, index: usize) -> Option<f64> {
        self.seconds.get(index).copied()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.seconds
    }

    /// Timestamp of the last frame
    pub fn last(&self) -> Option<f64> {
        self.seconds.last().copied()
    }

    /// Keeps only the first `len` timestamps
    pub fn truncate(&mut self, len: usize) {
        self.seconds.truncate(len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_equal_neighbours() {
        let ts = TimestampSequence::new(vec![0.0, 0.5, 0.5, 2.0]).unwrap();
        assert_eq!(ts.len(), 4);
        assert_eq!(ts.last(), Some(2.0));
        assert_eq!(ts.get(4), None);
    }

    #[test]
    fn test_rejects_decreasing() {
        match TimestampSequence::new(vec![0.0, 2.0, 1.0]) {
            Err(Error::NonMonotonicTimestamps { index, value }) => {
                assert_eq!(index, 2);
                assert_eq!(value, 1.0);
            }
            other => panic!("expected non-monotonic error, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_nan() {
        assert!(matches!(
            TimestampSequence::new(vec![0.0, f64::NAN]),
            Err(Error::InvalidInput(_))
        ));
    }
}
