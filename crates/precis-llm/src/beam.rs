//! Beam search over a decoder that yields next-token logits.
//!
//! The decoder is abstracted as a closure so the search can be exercised with
//! hand-written distributions; the ONNX backend supplies one that runs the
//! decoder session.

use std::cmp::Ordering;

use precis_core::GenerationParams;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpecialTokens {
    pub decoder_start: i64,
    pub eos: i64,
}

#[derive(Clone, Debug)]
struct Hypothesis {
    tokens: Vec<i64>,
    score: f32,
}

fn log_softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let sum: f32 = logits.iter().map(|x| (x - max).exp()).sum();
    let log_sum = sum.ln();
    logits.iter().map(|x| x - max - log_sum).collect()
}

/// Indices of the `k` largest finite values, best first.
fn top_k(values: &[f32], k: usize) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..values.len()).filter(|&i| values[i].is_finite()).collect();
    let by_value = |a: &usize, b: &usize| {
        values[*b]
            .partial_cmp(&values[*a])
            .unwrap_or(Ordering::Equal)
    };
    if idx.len() > k {
        idx.select_nth_unstable_by(k, by_value);
        idx.truncate(k);
    }
    idx.sort_by(by_value);
    idx
}

fn length_normalized(logprob: f32, len: usize, penalty: f32) -> f32 {
    logprob / (len.max(1) as f32).powf(penalty)
}

fn by_score_desc(a: &Hypothesis, b: &Hypothesis) -> Ordering {
    b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal)
}

/// Decode up to `params.max_length` tokens and return the best hypothesis,
/// without the decoder start token and without the end-of-sequence token.
///
/// `next_logits` receives the decoder input so far (starting with the
/// decoder start token) and returns unnormalized scores over the vocabulary.
pub fn beam_search<F, E>(
    params: &GenerationParams,
    special: SpecialTokens,
    mut next_logits: F,
) -> Result<Vec<i64>, E>
where
    F: FnMut(&[i64]) -> Result<Vec<f32>, E>,
{
    let width = params.num_beams.max(1);
    let penalty = params.length_penalty;
    let eos = special.eos;

    let mut beams = vec![Hypothesis {
        tokens: vec![special.decoder_start],
        score: 0.0,
    }];
    let mut finished: Vec<Hypothesis> = Vec::new();

    for _ in 0..params.max_length {
        // (beam index, token, cumulative logprob)
        let mut candidates: Vec<(usize, i64, f32)> = Vec::with_capacity(beams.len() * width * 2);
        for (b, beam) in beams.iter().enumerate() {
            let mut logprobs = log_softmax(&next_logits(&beam.tokens)?);
            let generated = beam.tokens.len() - 1;
            if generated < params.min_length {
                if let Some(slot) = usize::try_from(eos).ok().and_then(|i| logprobs.get_mut(i)) {
                    *slot = f32::NEG_INFINITY;
                }
            }
            for token in top_k(&logprobs, 2 * width) {
                candidates.push((b, token as i64, beam.score + logprobs[token]));
            }
        }
        candidates.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(Ordering::Equal));

        let mut next_beams = Vec::with_capacity(width);
        for (rank, (b, token, score)) in candidates.into_iter().enumerate() {
            if token == eos {
                if rank < width {
                    let tokens = beams[b].tokens[1..].to_vec();
                    let len = tokens.len() + 1;
                    finished.push(Hypothesis {
                        tokens,
                        score: length_normalized(score, len, penalty),
                    });
                }
                continue;
            }
            let mut tokens = beams[b].tokens.clone();
            tokens.push(token);
            next_beams.push(Hypothesis { tokens, score });
            if next_beams.len() == width {
                break;
            }
        }

        finished.sort_by(by_score_desc);
        finished.truncate(width);
        beams = next_beams;

        if beams.is_empty() {
            break;
        }
        if finished.len() >= width {
            if params.early_stopping {
                break;
            }
            let worst_finished = finished[finished.len() - 1].score;
            let best_active = &beams[0];
            let best_possible =
                length_normalized(best_active.score, best_active.tokens.len() - 1, penalty);
            if worst_finished >= best_possible {
                break;
            }
        }
    }

    if finished.len() < width {
        for beam in beams {
            let tokens = beam.tokens[1..].to_vec();
            let len = tokens.len();
            finished.push(Hypothesis {
                tokens,
                score: length_normalized(beam.score, len, penalty),
            });
        }
    }

    Ok(finished
        .into_iter()
        .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal))
        .map(|h| h.tokens)
        .unwrap_or_default())
}
