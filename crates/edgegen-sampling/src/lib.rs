//! # edgegen-sampling
//!
//! Turns one logit vector into one token id.
//!
//! Supports:
//! - Greedy (argmax, first occurrence on ties) when temperature <= 0
//! - Temperature sampling from `exp(logit / T)` normalized over the vocabulary
//! - Deterministic seeded RNG for reproducible generation

/// Sampling error type.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SamplingError {
    #[error("Invalid logits array")]
    InvalidLogits,
}

pub type SamplingResult<T> = std::result::Result<T, SamplingError>;

/// Deterministic RNG for reproducible sampling.
///
/// Uses a simple xorshift64 algorithm for fast, reproducible random numbers.
#[derive(Debug, Clone)]
pub struct SeededRng {
    state: u64,
}

impl SeededRng {
    pub fn new(seed: u64) -> Self {
        // Avoid zero state which would produce all zeros
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    /// Seed from the system clock.
    pub fn from_clock() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x9E37_79B9_7F4A_7C15);
        Self::new(nanos)
    }

    /// Generate next random float in [0, 1).
    pub fn next_f32(&mut self) -> f32 {
        // xorshift64
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        (self.state >> 40) as f32 / (1u64 << 24) as f32
    }
}

/// Index of the maximum value; the first one wins on ties.
pub fn argmax(logits: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in logits.iter().enumerate().skip(1) {
        if v > logits[best] {
            best = i;
        }
    }
    best
}

/// Probability distribution `exp(l / T) / Σ exp(l / T)`.
///
/// The maximum logit is subtracted before exponentiating. This only rescales
/// numerator and denominator, so the normalized result is unchanged.
pub fn probabilities(logits: &[f32], temperature: f32) -> Vec<f32> {
    let max_logit = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits
        .iter()
        .map(|&l| ((l - max_logit) / temperature).exp())
        .collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|&e| e / sum).collect()
}

/// Sampler holding the RNG state. Temperature is supplied per call since each
/// generation request carries its own.
#[derive(Debug, Clone)]
pub struct Sampler {
    /// RNG state for reproducible sampling. Mutated on each temperature draw.
    rng: SeededRng,
}

impl Sampler {
    /// Create a sampler with a fixed seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SeededRng::new(seed),
        }
    }

    /// Create a sampler seeded from the clock.
    pub fn from_clock() -> Self {
        Self {
            rng: SeededRng::from_clock(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = SeededRng::new(seed);
        self
    }

    /// Sample a token index from logits.
    ///
    /// `temperature <= 0` is greedy and does not advance the RNG.
    pub fn sample(&mut self, logits: &[f32], temperature: f32) -> SamplingResult<usize> {
        if logits.is_empty() {
            return Err(SamplingError::InvalidLogits);
        }

        if temperature <= 0.0 {
            return Ok(argmax(logits));
        }

        let probs = probabilities(logits, temperature);
        Ok(Self::sample_from_distribution(&probs, self.rng.next_f32()))
    }

    /// First index whose cumulative probability reaches `r`.
    ///
    /// Rounding can leave the total just under `r`; index 0 is returned then.
    fn sample_from_distribution(probs: &[f32], r: f32) -> usize {
        let mut cumsum = 0.0;
        for (i, &prob) in probs.iter().enumerate() {
            cumsum += prob;
            if cumsum >= r {
                return i;
            }
        }
        0
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new(42)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_rng_reproducible() {
        let mut rng1 = SeededRng::new(42);
        let mut rng2 = SeededRng::new(42);

        for _ in 0..100 {
            let v1 = rng1.next_f32();
            let v2 = rng2.next_f32();
            assert!((v1 - v2).abs() < 1e-6);
            assert!((0.0..1.0).contains(&v1));
        }
    }

    #[test]
    fn zero_seed_is_remapped() {
        let mut rng = SeededRng::new(0);
        assert!(rng.next_f32() > 0.0);
    }

    #[test]
    fn greedy_picks_max() {
        let mut sampler = Sampler::new(1);
        assert_eq!(sampler.sample(&[1.0, 5.0, 2.0], 0.0).unwrap(), 1);
    }

    #[test]
    fn greedy_first_occurrence_on_ties() {
        assert_eq!(argmax(&[3.0, 7.0, 7.0, 1.0]), 1);
        assert_eq!(argmax(&[2.0, 2.0]), 0);
    }

    #[test]
    fn negative_temperature_is_greedy() {
        let mut sampler = Sampler::new(1);
        assert_eq!(sampler.sample(&[0.1, 0.2, 9.0], -1.0).unwrap(), 2);
    }

    #[test]
    fn probabilities_normalized() {
        let probs = probabilities(&[1.0, 2.0, 3.0], 0.7);
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }

    #[test]
    fn distribution_draw_uses_cumulative_threshold() {
        let probs = [0.2, 0.5, 0.3];
        assert_eq!(Sampler::sample_from_distribution(&probs, 0.0), 0);
        assert_eq!(Sampler::sample_from_distribution(&probs, 0.2), 0);
        assert_eq!(Sampler::sample_from_distribution(&probs, 0.21), 1);
        assert_eq!(Sampler::sample_from_distribution(&probs, 0.69), 1);
        assert_eq!(Sampler::sample_from_distribution(&probs, 0.71), 2);
    }

    #[test]
    fn distribution_shortfall_falls_back_to_zero() {
        // Cumulative total 0.9 never reaches the draw.
        let probs = [0.3, 0.3, 0.3];
        assert_eq!(Sampler::sample_from_distribution(&probs, 0.95), 0);
    }

    #[test]
    fn rng_advances_between_calls() {
        let logits = vec![0.0; 4];
        let mut sampler = Sampler::new(42);

        let mut seen = std::collections::HashSet::new();
        for _ in 0..100 {
            seen.insert(sampler.sample(&logits, 1.0).unwrap());
        }
        assert!(seen.len() > 1, "RNG should produce varied results");
    }

    #[test]
    fn empty_logits() {
        let mut sampler = Sampler::default();
        assert_eq!(sampler.sample(&[], 0.7), Err(SamplingError::InvalidLogits));
        assert_eq!(sampler.sample(&[], 0.0), Err(SamplingError::InvalidLogits));
    }
}
