//! The forward-pass port: the only contract between the decode loop and the
//! external numeric runtime.

use std::path::Path;

use crate::{EngineError, Result, SessionConfig, TokenId};

/// Per-position logit vectors from one forward pass.
///
/// Stored row-major as `[positions, vocab_size]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Logits {
    data: Vec<f32>,
    positions: usize,
    vocab_size: usize,
}

impl Logits {
    /// Wrap a flat buffer. Fails unless `data.len() == positions * vocab_size`.
    pub fn new(data: Vec<f32>, positions: usize, vocab_size: usize) -> Result<Self> {
        if vocab_size == 0 || data.len() != positions * vocab_size {
            return Err(EngineError::Inference(format!(
                "logits buffer of {} values does not form [{positions}, {vocab_size}]",
                data.len()
            )));
        }
        Ok(Self {
            data,
            positions,
            vocab_size,
        })
    }

    /// Build from one vector per position. All rows must share a width.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self> {
        let positions = rows.len();
        let vocab_size = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().position(|r| r.len() != vocab_size) {
            return Err(EngineError::Inference(format!(
                "ragged logits: row {bad} has {} values, expected {vocab_size}",
                rows[bad].len()
            )));
        }
        Self::new(rows.into_iter().flatten().collect(), positions, vocab_size)
    }

    pub fn positions(&self) -> usize {
        self.positions
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    /// Logits for one position.
    pub fn row(&self, position: usize) -> Option<&[f32]> {
        if position >= self.positions {
            return None;
        }
        let start = position * self.vocab_size;
        Some(&self.data[start..start + self.vocab_size])
    }

    /// Logits for the last position.
    pub fn last(&self) -> Option<&[f32]> {
        self.positions.checked_sub(1).and_then(|p| self.row(p))
    }

    /// Check the shape against what the caller submitted.
    pub fn expect_shape(&self, positions: usize, vocab_size: usize) -> Result<()> {
        if self.positions != positions || self.vocab_size != vocab_size {
            return Err(EngineError::Inference(format!(
                "forward pass returned [{}, {}], expected [{positions}, {vocab_size}]",
                self.positions, self.vocab_size
            )));
        }
        Ok(())
    }
}

/// One opened model, ready to run forward passes.
///
/// Not safe for concurrent invocation: a port is owned by one session.
pub trait ForwardPass: Send {
    /// Run the model over the whole token sequence.
    ///
    /// Returns one logit vector per input position, each `config.vocab_size` wide.
    fn forward(&mut self, tokens: &[TokenId], config: &SessionConfig) -> Result<Logits>;
}

/// Factory for forward-pass ports. Owns runtime-construction concerns
/// (threads, memory budget, precision, acceleration).
pub trait ModelRuntime: Send + Sync {
    /// Open the model at `model_path` with the given configuration.
    fn open(&self, model_path: &Path, config: &SessionConfig) -> Result<Box<dyn ForwardPass>>;

    /// Short name for logs and model info.
    fn name(&self) -> &str;

    /// Whether ports can be constructed on an accelerated execution provider.
    fn supports_acceleration(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_addressable() {
        let rows = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        let logits = Logits::from_rows(rows).unwrap();
        assert_eq!(logits.positions(), 3);
        assert_eq!(logits.vocab_size(), 2);
        assert_eq!(logits.row(1), Some(&[3.0, 4.0][..]));
        assert_eq!(logits.last(), Some(&[5.0, 6.0][..]));
        assert_eq!(logits.row(3), None);
    }

    #[test]
    fn ragged_rows_rejected() {
        let err = Logits::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(err, EngineError::Inference(_)));
    }

    #[test]
    fn flat_buffer_must_be_rectangular() {
        assert!(Logits::new(vec![0.0; 6], 2, 3).is_ok());
        assert!(Logits::new(vec![0.0; 5], 2, 3).is_err());
        assert!(Logits::new(vec![], 0, 0).is_err());
    }

    #[test]
    fn shape_check_reports_mismatch() {
        let logits = Logits::new(vec![0.0; 6], 2, 3).unwrap();
        assert!(logits.expect_shape(2, 3).is_ok());
        let err = logits.expect_shape(3, 3).unwrap_err();
        assert!(err.to_string().contains("expected [3, 3]"));
    }
}
