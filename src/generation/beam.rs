// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Beam search decoding
//!
//! Model-agnostic: the caller supplies a step function that maps the current
//! decoder sequences to next-token logits, one row per sequence. Every
//! sequence starts with the decoder start token and all sequences passed to a
//! single step have the same length.

use anyhow::{anyhow, Result};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq)]
pub struct BeamSearchConfig {
    pub num_beams: usize,
    /// Cap on decoder sequence length, start token included
    pub max_length: usize,
    pub early_stopping: bool,
    pub length_penalty: f32,
    pub decoder_start_token_id: u32,
    pub eos_token_id: u32,
}

#[derive(Debug, Clone)]
struct Hypothesis {
    tokens: Vec<u32>,
    score: f32,
}

/// Finished hypotheses, best `num_beams` kept
struct FinishedHypotheses {
    num_beams: usize,
    length_penalty: f32,
    early_stopping: bool,
    hyps: Vec<Hypothesis>,
}

impl FinishedHypotheses {
    fn new(config: &BeamSearchConfig) -> Self {
        Self {
            num_beams: config.num_beams,
            length_penalty: config.length_penalty,
            early_stopping: config.early_stopping,
            hyps: Vec::with_capacity(config.num_beams + 1),
        }
    }

    fn normalized(&self, sum_logprobs: f32, generated_len: usize) -> f32 {
        normalized_score(sum_logprobs, generated_len, self.length_penalty)
    }

    fn worst_score(&self) -> Option<f32> {
        self.hyps.iter().map(|h| h.score).min_by(|a, b| a.total_cmp(b))
    }

    fn add(&mut self, tokens: Vec<u32>, sum_logprobs: f32, generated_len: usize) {
        let score = self.normalized(sum_logprobs, generated_len);
        if self.hyps.len() < self.num_beams {
            self.hyps.push(Hypothesis { tokens, score });
            return;
        }
        if let Some((worst_idx, worst)) = self
            .hyps
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.score.total_cmp(&b.1.score))
        {
            if score > worst.score {
                self.hyps[worst_idx] = Hypothesis { tokens, score };
            }
        }
    }

    /// Whether running beams can no longer beat the finished set
    fn is_done(&self, best_running_logprobs: f32, generated_len: usize) -> bool {
        if self.hyps.len() < self.num_beams {
            return false;
        }
        if self.early_stopping {
            return true;
        }
        match self.worst_score() {
            Some(worst) => self.normalized(best_running_logprobs, generated_len) <= worst,
            None => false,
        }
    }

    fn best(&self) -> Option<&Hypothesis> {
        self.hyps.iter().max_by(|a, b| {
            a.score
                .total_cmp(&b.score)
                // Prefer the shorter, then lexicographically smaller sequence on ties
                .then_with(|| b.tokens.len().cmp(&a.tokens.len()))
                .then_with(|| b.tokens.cmp(&a.tokens))
        })
    }
}

/// Numerically stable log-softmax
pub fn log_softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits
        .iter()
        .copied()
        .filter(|x| x.is_finite())
        .fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return vec![f32::NEG_INFINITY; logits.len()];
    }
    let log_sum = logits
        .iter()
        .map(|&x| (x - max).exp())
        .sum::<f32>()
        .ln();
    logits.iter().map(|&x| x - max - log_sum).collect()
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    score: f32,
    beam: usize,
    token: u32,
}

fn rank(a: &Candidate, b: &Candidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.beam.cmp(&b.beam))
        .then_with(|| a.token.cmp(&b.token))
}

/// Runs beam search and returns the generated tokens of the best hypothesis
///
/// The returned tokens exclude the decoder start token and the final eos.
pub fn beam_search<F>(config: &BeamSearchConfig, mut step: F) -> Result<Vec<u32>>
where
    F: FnMut(&[Vec<u32>]) -> Result<Vec<Vec<f32>>>,
{
    if config.num_beams == 0 {
        return Err(anyhow!("num_beams must be greater than 0"));
    }
    if config.max_length < 2 {
        return Ok(vec![]);
    }

    let mut finished = FinishedHypotheses::new(config);
    let mut beams: Vec<Vec<u32>> = vec![vec![config.decoder_start_token_id]];
    let mut scores: Vec<f32> = vec![0.0];
    let keep = 2 * config.num_beams;

    while beams[0].len() < config.max_length {
        let logits = step(&beams)?;
        if logits.len() != beams.len() {
            return Err(anyhow!(
                "Decoder returned {} logit rows for {} beams",
                logits.len(),
                beams.len()
            ));
        }

        let mut candidates: Vec<Candidate> = Vec::with_capacity(beams.len() * keep);
        for (beam, row) in logits.iter().enumerate() {
            let mut per_beam: Vec<Candidate> = log_softmax(row)
                .into_iter()
                .enumerate()
                .filter(|(_, lp)| lp.is_finite())
                .map(|(token, lp)| Candidate {
                    score: scores[beam] + lp,
                    beam,
                    token: token as u32,
                })
                .collect();
            per_beam.sort_by(rank);
            per_beam.truncate(keep);
            candidates.extend(per_beam);
        }
        if candidates.is_empty() {
            return Err(anyhow!("Decoder produced no finite logits"));
        }
        candidates.sort_by(rank);
        candidates.truncate(keep);

        let mut next_beams = Vec::with_capacity(config.num_beams);
        let mut next_scores = Vec::with_capacity(config.num_beams);
        for (position, cand) in candidates.iter().enumerate() {
            if cand.token == config.eos_token_id {
                // Only eos among the top num_beams counts as a finished hypothesis
                if position < config.num_beams {
                    let generated = beams[cand.beam][1..].to_vec();
                    // Length counts the eos token
                    let len = generated.len() + 1;
                    finished.add(generated, cand.score, len);
                }
                continue;
            }
            let mut seq = beams[cand.beam].clone();
            seq.push(cand.token);
            next_beams.push(seq);
            next_scores.push(cand.score);
            if next_beams.len() == config.num_beams {
                break;
            }
        }

        let generated_len = beams[0].len();
        if next_beams.is_empty() {
            // Every surviving candidate was eos
            return Ok(select(&finished, &[], &[]));
        }
        let best_running = next_scores
            .iter()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max);
        beams = next_beams;
        scores = next_scores;
        if finished.is_done(best_running, generated_len) {
            return Ok(select(&finished, &[], &[]));
        }
    }

    // Hit max_length: running beams compete with the finished ones
    Ok(select(&finished, &beams, &scores))
}

fn normalized_score(sum_logprobs: f32, generated_len: usize, length_penalty: f32) -> f32 {
    sum_logprobs / (generated_len.max(1) as f32).powf(length_penalty)
}

/// Offers every running beam to the finished pool and picks the best
fn select(finished: &FinishedHypotheses, beams: &[Vec<u32>], scores: &[f32]) -> Vec<u32> {
    let mut pool = FinishedHypotheses {
        num_beams: finished.num_beams,
        length_penalty: finished.length_penalty,
        early_stopping: finished.early_stopping,
        hyps: finished.hyps.clone(),
    };
    for (seq, &score) in beams.iter().zip(scores) {
        let generated = seq[1..].to_vec();
        let len = generated.len();
        pool.add(generated, score, len);
    }
    pool.best().map(|h| h.tokens.clone()).unwrap_or_default()
}
