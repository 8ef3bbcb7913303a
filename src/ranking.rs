use std::cmp::Ordering;

use rand::Rng;

use crate::eval::center_score;
use crate::types::{AgentConfig, Coord, ScoredMove};

/// Controls the weighted-random choice among near-best moves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiversityPolicy {
  pub enabled: bool,
  pub top_n: usize,
  pub score_gap: i32,
}

impl DiversityPolicy {
  pub fn from_config(config: &AgentConfig) -> Self {
    Self {
      enabled: config.diversity_enabled && !config.deterministic,
      top_n: config.diversity_top_n.max(1),
      score_gap: config.diversity_score_gap.max(0),
    }
  }

  pub fn deterministic() -> Self {
    Self {
      enabled: false,
      top_n: 1,
      score_gap: 0,
    }
  }
}

/// Center first, then row, then column.
pub fn stable_move_key(coord: Coord) -> (i32, usize, usize) {
  (-center_score(coord), coord.y, coord.x)
}

pub fn pick_stable_move(moves: &[Coord]) -> Option<Coord> {
  moves.iter().copied().min_by_key(|&c| stable_move_key(c))
}

pub fn compare_scored(a: &ScoredMove, b: &ScoredMove) -> Ordering {
  b.0
    .cmp(&a.0)
    .then_with(|| stable_move_key(a.1).cmp(&stable_move_key(b.1)))
}

/// Sorts by score descending, ties broken by [`stable_move_key`].
pub fn rank_scored_moves(scored: &[ScoredMove]) -> Vec<ScoredMove> {
  let mut ranked = scored.to_vec();
  ranked.sort_by(compare_scored);
  ranked
}

pub fn pick_ranked_move<R: Rng + ?Sized>(
  scored: &[ScoredMove],
  policy: &DiversityPolicy,
  rng: &mut R,
) -> Option<Coord> {
  let ranked = rank_scored_moves(scored);
  let &(best_score, best_move) = ranked.first()?;

  if !policy.enabled {
    return Some(best_move);
  }

  let floor = best_score.saturating_sub(policy.score_gap);
  let pool: Vec<ScoredMove> = ranked
    .into_iter()
    .filter(|(score, _)| *score >= floor)
    .take(policy.top_n.max(1))
    .collect();
  if pool.len() == 1 {
    return Some(pool[0].1);
  }

  let low = pool.iter().map(|(score, _)| *score).min().unwrap_or(best_score);
  let weights: Vec<f64> = pool
    .iter()
    .map(|(score, _)| (score.saturating_sub(low).saturating_add(1)).max(1) as f64)
    .collect();
  let total: f64 = weights.iter().sum();
  let ticket = rng.gen::<f64>() * total;

  let mut cumulative = 0.0;
  for (weight, (_, coord)) in weights.iter().zip(pool.iter()) {
    cumulative += weight;
    if ticket <= cumulative {
      return Some(*coord);
    }
  }
  pool.last().map(|(_, coord)| *coord)
}
