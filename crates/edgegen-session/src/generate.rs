//! Autoregressive decode loop.
//!
//! Every step resubmits the whole sequence (prompt + everything generated so
//! far) to the forward pass and samples from the last row. No state is carried
//! between steps, so total work grows quadratically with the output length.

use edgegen_engine::{EngineError, ForwardPass, Result, SessionConfig, TokenId};
use edgegen_runtime::GenerationTimer;
use edgegen_sampling::Sampler;

/// Result of one decode loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeOutcome {
    /// Tokens appended after the prompt. Never contains the end marker.
    pub tokens: Vec<TokenId>,
    /// Whether the loop stopped on the end-of-sequence token.
    pub stopped_on_eos: bool,
}

/// Per-call decode parameters.
#[derive(Debug, Clone, Copy)]
pub struct DecodeParams {
    pub max_tokens: usize,
    pub temperature: f32,
    pub eos: TokenId,
}

/// Generate up to `params.max_tokens` tokens after `prompt`.
///
/// Stops early only when the end-of-sequence token is sampled. `on_token` sees
/// each appended token in order; an error from it aborts the loop. Any forward
/// pass failure aborts the whole call.
pub fn decode(
    port: &mut dyn ForwardPass,
    sampler: &mut Sampler,
    prompt: &[TokenId],
    params: DecodeParams,
    config: &SessionConfig,
    timer: &mut GenerationTimer,
    mut on_token: impl FnMut(TokenId) -> Result<()>,
) -> Result<DecodeOutcome> {
    let mut sequence = prompt.to_vec();
    let mut stopped_on_eos = false;

    for step in 0..params.max_tokens {
        let logits = port.forward(&sequence, config)?;
        timer.mark_forward_pass();
        logits.expect_shape(sequence.len(), config.vocab_size)?;

        let last = logits
            .last()
            .ok_or_else(|| EngineError::Inference("forward pass returned no rows".into()))?;
        let index = sampler
            .sample(last, params.temperature)
            .map_err(|e| EngineError::Inference(e.to_string()))?;
        let token = TokenId::try_from(index).map_err(|_| {
            EngineError::Inference(format!("sampled index {index} overflows token id"))
        })?;

        if token == params.eos {
            tracing::trace!(step, "end of sequence sampled");
            stopped_on_eos = true;
            break;
        }

        sequence.push(token);
        on_token(token)?;
    }

    Ok(DecodeOutcome {
        tokens: sequence.split_off(prompt.len()),
        stopped_on_eos,
    })
}
