//! Opening negotiation: the swap decision after each of the first five
//! stones and the offer10 propose/select exchange at move five.

use std::collections::HashMap;

use lazy_static::lazy_static;
use rand::Rng;
use serde::Serialize;

use crate::ai::{collect_frontier_moves, shortlist_moves};
use crate::engine::{Board, BOARD_SIZE};
use crate::eval::quick_position_score;
use crate::ranking::{pick_ranked_move, pick_stable_move, stable_move_key, DiversityPolicy};
use crate::threats::{count_immediate_wins, find_forcing_threats};
use crate::types::{AgentConfig, Color, Coord, GameView, ScoredMove};

/// Rotations and reflections of a square board.
pub const DIHEDRAL_ORDER: usize = 8;
pub const OFFER10_COUNT: usize = 10;
pub const OPENING_MOVES: u32 = 5;

const FALLBACK_LOGIT_SCALE: f64 = 26_000.0;
const LOGIT_CLAMP: f64 = 60.0;
const OPENING_PROBE_LIMIT: usize = 40;
const OPENING_FORCING_MAX: usize = 20;

lazy_static! {
  /// Canonical representative of each cell's symmetry class, indexed `[y][x]`.
  static ref SYMMETRY_CLASS: [[Coord; BOARD_SIZE]; BOARD_SIZE] = {
    let mut table = [[Coord::new(0, 0); BOARD_SIZE]; BOARD_SIZE];
    for (y, row) in table.iter_mut().enumerate() {
      for (x, cell) in row.iter_mut().enumerate() {
        *cell = dihedral_images(Coord::new(x, y))
          .into_iter()
          .min_by_key(|c| (c.x, c.y))
          .unwrap_or(Coord::new(x, y));
      }
    }
    table
  };
}

/// The images of `coord` under all eight board symmetries (identity first).
pub fn dihedral_images(coord: Coord) -> [Coord; DIHEDRAL_ORDER] {
  let n = BOARD_SIZE - 1;
  let (x, y) = (coord.x, coord.y);
  [
    Coord::new(x, y),
    Coord::new(y, n - x),
    Coord::new(n - x, n - y),
    Coord::new(n - y, x),
    Coord::new(n - x, y),
    Coord::new(n - y, n - x),
    Coord::new(x, n - y),
    Coord::new(y, x),
  ]
}

pub fn symmetry_class(coord: Coord) -> Coord {
  SYMMETRY_CLASS[coord.y][coord.x]
}

/// Logistic squash of an opening score into a win probability.
pub fn score_to_win_prob(score: i32, scale: f64) -> f64 {
  let scale = if scale > 1.0 { scale } else { FALLBACK_LOGIT_SCALE };
  let x = (score as f64 / scale).clamp(-LOGIT_CLAMP, LOGIT_CLAMP);
  1.0 / (1.0 + (-x).exp())
}

/// Side to move once the pending swap decision resolves. The opening
/// stones alternate by parity; after that white moves.
pub fn projected_turn_color(move_number: u32) -> Color {
  let next_move = move_number + 1;
  if next_move <= OPENING_MOVES {
    Color::for_opening_move(next_move)
  } else {
    Color::White
  }
}

/// After an odd stone the white player decides on the swap, after an even
/// stone the black player.
pub fn swap_decider_agent_id(view: &GameView) -> Option<&str> {
  let last_move = view.move_number();
  if !(1..=OPENING_MOVES).contains(&last_move) {
    return None;
  }
  view.agent_for(Color::for_opening_move(last_move).opposite())
}

/// Opening-phase score of `board` for `me` with `next_turn` to move.
pub fn evaluate_opening_position(board: &mut Board, me: Color, next_turn: Color) -> i32 {
  let opponent = me.opposite();
  let mut score = quick_position_score(board, me);

  let my_wins = count_immediate_wins(board, me, 4);
  let opp_wins = count_immediate_wins(board, opponent, 4);
  score += my_wins * 8_000 - opp_wins * 9_000;

  if next_turn == me {
    score += my_wins * 5_000;
    score -= opp_wins * 1_500;
  } else {
    score -= opp_wins * 12_000;
    score += my_wins * 1_200;
  }

  let probe = shortlist_moves(board, collect_frontier_moves(board, 2), opponent, OPENING_PROBE_LIMIT);
  let opp_forcing = find_forcing_threats(board, opponent, &probe, OPENING_FORCING_MAX).len() as i32;
  let my_forcing = find_forcing_threats(board, me, &probe, OPENING_FORCING_MAX).len() as i32;
  score += my_forcing * 1_000 - opp_forcing * 1_600;

  score
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SwapDecision {
  pub swap: bool,
  pub keep: i32,
  pub swap_score: i32,
  pub diff: i32,
}

pub fn decide_swap<R: Rng + ?Sized>(
  view: &GameView,
  agent_id: &str,
  config: &AgentConfig,
  rng: &mut R,
) -> SwapDecision {
  let (mut board, me) = match (view.board.clone(), view.color_of(agent_id)) {
    (Some(board), Some(me)) => (board, me),
    _ => return SwapDecision::default(),
  };

  let turn = projected_turn_color(view.move_number());
  let keep = evaluate_opening_position(&mut board, me, turn);
  let swap_score = evaluate_opening_position(&mut board, me.opposite(), turn);
  let diff = swap_score - keep;
  SwapDecision {
    swap: resolve_swap(diff, config, rng),
    keep,
    swap_score,
    diff,
  }
}

/// Half-width of the score band in which swaps are randomized.
pub fn swap_tie_band(margin: i32) -> i32 {
  (margin / 2).max(180)
}

/// Swap probability for a near-tie, or `None` once `diff` leaves the band.
pub fn swap_probability(diff: i32, margin: i32) -> Option<f64> {
  let band = swap_tie_band(margin);
  if diff.abs() > band {
    return None;
  }
  Some((0.5 + diff as f64 / (2 * band) as f64).clamp(0.12, 0.88))
}

/// Turns a swap-minus-keep score difference into a decision. Near-ties
/// stay stochastic so mirrored games drift apart.
pub fn resolve_swap<R: Rng + ?Sized>(diff: i32, config: &AgentConfig, rng: &mut R) -> bool {
  if config.deterministic {
    return diff > config.swap_margin;
  }
  match swap_probability(diff, config.swap_margin) {
    Some(probability) => rng.gen::<f64>() < probability,
    None => diff > config.swap_margin,
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Offer10Skip {
  Disabled,
  NotAwaiting,
  NotProposer,
  MissingState,
  NotCurrentBlack,
  NoCandidates,
  InsufficientSymmetry,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Offer10Detail {
  pub normal: f64,
  pub offer: f64,
  pub diff: f64,
  pub min_improvement: f64,
  pub skipped: Option<Offer10Skip>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Offer10Proposal {
  pub propose: bool,
  pub candidates: Vec<Coord>,
  pub detail: Offer10Detail,
}

impl Offer10Proposal {
  fn skipped(reason: Offer10Skip) -> Self {
    Self {
      detail: Offer10Detail {
        skipped: Some(reason),
        ..Offer10Detail::default()
      },
      ..Self::default()
    }
  }
}

fn by_prob_then_stable(a: &(f64, Coord), b: &(f64, Coord)) -> std::cmp::Ordering {
  b.0
    .total_cmp(&a.0)
    .then_with(|| stable_move_key(a.1).cmp(&stable_move_key(b.1)))
}

/// Decides whether the tentative black player should offer ten candidate
/// fifth moves instead of playing one.
pub fn decide_offer10_proposal(view: &GameView, agent_id: &str, config: &AgentConfig) -> Offer10Proposal {
  if !config.offer10_enabled {
    return Offer10Proposal::skipped(Offer10Skip::Disabled);
  }
  let opening = view.opening();
  if !opening.awaiting_offer10 {
    return Offer10Proposal::skipped(Offer10Skip::NotAwaiting);
  }
  if opening.tentative_black_agent_id.as_deref() != Some(agent_id) || agent_id.is_empty() {
    return Offer10Proposal::skipped(Offer10Skip::NotProposer);
  }

  let legal = view.legal_moves();
  let (mut board, me) = match (view.board.clone(), view.color_of(agent_id)) {
    (Some(board), Some(me)) if !legal.is_empty() => (board, me),
    _ => return Offer10Proposal::skipped(Offer10Skip::MissingState),
  };
  // After selection the server hands the move to white, which only holds
  // together when the offered fifth stone is black.
  if me != Color::Black {
    return Offer10Proposal::skipped(Offer10Skip::NotCurrentBlack);
  }
  let next_turn = Color::White;

  let mut normal_scored: Vec<(f64, Coord)> = Vec::new();
  let mut offer_scored: Vec<(f64, Coord)> = Vec::new();
  for &mv in legal {
    let Some(mut placed) = board.place(mv, me) else {
      continue;
    };
    let keep_p = score_to_win_prob(
      evaluate_opening_position(&mut placed, me, next_turn),
      config.offer10_logit_scale,
    );
    let swap_p = score_to_win_prob(
      evaluate_opening_position(&mut placed, me.opposite(), next_turn),
      config.offer10_logit_scale,
    );
    drop(placed);

    // A normal fifth move still faces a final swap from the opponent.
    normal_scored.push((keep_p.min(swap_p), mv));
    offer_scored.push((keep_p, mv));
  }

  normal_scored.sort_by(by_prob_then_stable);
  let best_normal = match normal_scored.first() {
    Some(&(p, _)) => p,
    None => return Offer10Proposal::skipped(Offer10Skip::NoCandidates),
  };

  let mut best_by_class: HashMap<Coord, (f64, Coord)> = HashMap::new();
  for (p, mv) in offer_scored {
    let class = symmetry_class(mv);
    let replace = match best_by_class.get(&class) {
      None => true,
      Some(prev) => by_prob_then_stable(&(p, mv), prev).is_lt(),
    };
    if replace {
      best_by_class.insert(class, (p, mv));
    }
  }

  let mut unique: Vec<(f64, Coord)> = best_by_class.into_values().collect();
  unique.sort_by(by_prob_then_stable);
  unique.truncate(OFFER10_COUNT);
  if unique.len() < OFFER10_COUNT {
    return Offer10Proposal {
      propose: false,
      candidates: Vec::new(),
      detail: Offer10Detail {
        normal: best_normal,
        offer: 0.0,
        diff: -1.0,
        min_improvement: 0.0,
        skipped: Some(Offer10Skip::InsufficientSymmetry),
      },
    };
  }

  let floor = unique.iter().map(|(p, _)| *p).fold(f64::INFINITY, f64::min);
  let min_improvement = config.offer10_min_improvement.max(0.0);
  Offer10Proposal {
    propose: floor >= best_normal + min_improvement,
    candidates: unique.into_iter().map(|(_, mv)| mv).collect(),
    detail: Offer10Detail {
      normal: best_normal,
      offer: floor,
      diff: floor - best_normal,
      min_improvement,
      skipped: None,
    },
  }
}

/// Picks one of the offered candidates as the tentative white player.
pub fn choose_offer10_candidate<R: Rng + ?Sized>(
  view: &GameView,
  agent_id: &str,
  config: &AgentConfig,
  rng: &mut R,
) -> Option<Coord> {
  let candidates = view.offer10_candidates();
  if candidates.is_empty() {
    return None;
  }

  let opening = view.opening();
  let mover = opening
    .tentative_black_agent_id
    .as_deref()
    .and_then(|id| view.color_of(id));
  let (mut board, move_color, me) = match (view.board.clone(), mover, view.color_of(agent_id)) {
    (Some(board), Some(move_color), Some(me)) => (board, move_color, me),
    _ => return pick_stable_move(candidates),
  };
  let opponent = me.opposite();
  let next_turn = Color::White;

  let mut scored: Vec<ScoredMove> = Vec::with_capacity(candidates.len());
  for &candidate in candidates {
    let Some(mut placed) = board.place(candidate, move_color) else {
      continue;
    };
    let mut score = evaluate_opening_position(&mut placed, me, next_turn);
    let my_wins = count_immediate_wins(&mut placed, me, 4);
    let opp_wins = count_immediate_wins(&mut placed, opponent, 4);
    score += my_wins * 7_000 - opp_wins * 11_000;

    if next_turn == opponent && opp_wins > 0 {
      score -= 32_000 + opp_wins * 7_000;
    }
    if next_turn == me && my_wins > 0 {
      score += 28_000 + my_wins * 6_000;
    }
    scored.push((score, candidate));
  }

  pick_ranked_move(&scored, &DiversityPolicy::from_config(config), rng).or_else(|| pick_stable_move(candidates))
}
