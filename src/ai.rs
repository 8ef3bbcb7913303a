use std::collections::HashSet;

use rand::Rng;
use tracing::debug;

use crate::engine::{Board, BOARD_SIZE, CENTER};
use crate::eval::{
  blocking_threat_score, center_score, neighborhood_stones, own_shape_score, quick_position_score,
};
use crate::ranking::{pick_ranked_move, pick_stable_move, DiversityPolicy};
use crate::rules::{is_win_after_placing, is_winning_move};
use crate::threats::{count_immediate_wins, find_forcing_threats, find_immediate_wins};
use crate::types::{AgentConfig, Color, Coord, GameView, ScoredMove};

pub const WIN_SCORE: i32 = 1_000_000;
pub const LOSS_SCORE: i32 = -900_000;

const SHORTLIST_NEIGHBOR_WEIGHT: i32 = 16;
const SCORE_MOVE_NEIGHBOR_WEIGHT: i32 = 18;
const NEXT_WIN_BONUS: i32 = 4_200;
const NEXT_LOSS_PENALTY: i32 = 7_800;
const REPLY_MY_WIN: i32 = 9_000;
const REPLY_OPP_WIN: i32 = 12_000;
const REPLIES_PER_EXTRA_DEPTH: usize = 4;
const FORCING_PROBE_LIMIT: usize = 90;
const FORCING_MAX_FOUND: usize = 50;
const EARLY_ROOT_BONUS: usize = 4;

/// Empty cells within `radius` of any stone, row-major. An empty board
/// yields only the center.
pub fn collect_frontier_moves(board: &Board, radius: usize) -> Vec<Coord> {
  if !board.has_stones() {
    return vec![Coord::new(CENTER, CENTER)];
  }

  let mut near = [[false; BOARD_SIZE]; BOARD_SIZE];
  for y in 0..BOARD_SIZE {
    for x in 0..BOARD_SIZE {
      if board.get(x, y).is_none() {
        continue;
      }
      for ny in y.saturating_sub(radius)..(y + radius + 1).min(BOARD_SIZE) {
        for nx in x.saturating_sub(radius)..(x + radius + 1).min(BOARD_SIZE) {
          near[ny][nx] = true;
        }
      }
    }
  }

  let mut frontier = Vec::new();
  for y in 0..BOARD_SIZE {
    for x in 0..BOARD_SIZE {
      if near[y][x] && board.get(x, y).is_none() {
        frontier.push(Coord { x, y });
      }
    }
  }
  frontier
}

/// Keeps at most `limit` moves, preferring cells that block `opponent`,
/// sit among stones and stay central. Ties fall back to tighter local
/// density, then row and column.
pub fn shortlist_moves(board: &Board, moves: Vec<Coord>, opponent: Color, limit: usize) -> Vec<Coord> {
  if moves.len() <= limit {
    return moves;
  }

  let mut scored: Vec<(i32, i32, Coord)> = moves
    .into_iter()
    .map(|coord| {
      let score = blocking_threat_score(board, coord, opponent)
        + neighborhood_stones(board, coord, 2) * SHORTLIST_NEIGHBOR_WEIGHT
        + center_score(coord);
      (score, neighborhood_stones(board, coord, 1), coord)
    })
    .collect();

  scored.sort_by(|a, b| {
    b.0
      .cmp(&a.0)
      .then(b.1.cmp(&a.1))
      .then(a.2.y.cmp(&b.2.y))
      .then(a.2.x.cmp(&b.2.x))
  });
  scored.truncate(limit);
  scored.into_iter().map(|(_, _, coord)| coord).collect()
}

/// One-ply tactical score of playing `coord` as `color`. Occupied cells
/// score [`LOSS_SCORE`].
pub fn score_move(board: &mut Board, coord: Coord, color: Color) -> i32 {
  let opponent = color.opposite();
  let block_score = blocking_threat_score(board, coord, opponent);

  let (own_score, own_next_wins, opp_next_wins) = {
    let Some(mut placed) = board.place(coord, color) else {
      return LOSS_SCORE;
    };
    let own = own_shape_score(&placed, coord, color);
    let mine = count_immediate_wins(&mut placed, color, 3);
    let theirs = count_immediate_wins(&mut placed, opponent, 3);
    (own, mine, theirs)
  };

  own_score + own_next_wins * NEXT_WIN_BONUS - opp_next_wins * NEXT_LOSS_PENALTY
    + block_score
    + neighborhood_stones(board, coord, 2) * SCORE_MOVE_NEIGHBOR_WEIGHT
    + center_score(coord)
}

pub fn best_scored_move<R: Rng + ?Sized>(
  board: &mut Board,
  moves: &[Coord],
  color: Color,
  policy: &DiversityPolicy,
  rng: &mut R,
) -> Option<Coord> {
  let scored: Vec<ScoredMove> = moves
    .iter()
    .map(|&coord| (score_move(board, coord, color), coord))
    .collect();
  pick_ranked_move(&scored, policy, rng)
}

/// Number of opponent replies examined by the lookahead. Depth beyond two
/// widens this set instead of adding plies.
pub fn reply_limit(config: &AgentConfig, depth: u8) -> usize {
  let extra = depth.saturating_sub(2) as usize;
  config.reply_candidates + extra * REPLIES_PER_EXTRA_DEPTH
}

/// Scores `mv` for `me` with one adversarial reply ply: the blend of the
/// resulting position and the worst reply the opponent can find. An
/// occupied `mv` scores [`LOSS_SCORE`].
pub fn eval_candidate_with_lookahead(
  board: &mut Board,
  mv: Coord,
  me: Color,
  depth: u8,
  config: &AgentConfig,
) -> i32 {
  let opponent = me.opposite();

  let Some(mut placed) = board.place(mv, me) else {
    return LOSS_SCORE;
  };
  if is_win_after_placing(&placed, mv, me) {
    return WIN_SCORE;
  }

  let base = quick_position_score(&mut placed, me);
  if depth <= 1 {
    return base;
  }

  let replies = collect_frontier_moves(&placed, 2);
  let replies = shortlist_moves(&placed, replies, me, reply_limit(config, depth));

  let mut worst_case: Option<i32> = None;
  for reply in replies {
    let Some(mut answered) = placed.place(reply, opponent) else {
      continue;
    };
    let value = if is_win_after_placing(&answered, reply, opponent) {
      LOSS_SCORE
    } else {
      let tactical = count_immediate_wins(&mut answered, me, 2) * REPLY_MY_WIN
        - count_immediate_wins(&mut answered, opponent, 2) * REPLY_OPP_WIN;
      tactical + quick_position_score(&mut answered, me)
    };
    drop(answered);

    worst_case = Some(worst_case.map_or(value, |worst| worst.min(value)));
  }

  match worst_case {
    Some(worst) => {
      let blend = config.lookahead_blend;
      (base as f64 * blend + worst as f64 * (1.0 - blend)).round() as i32
    }
    None => base,
  }
}

pub fn best_move_with_lookahead<R: Rng + ?Sized>(
  board: &mut Board,
  moves: &[Coord],
  color: Color,
  config: &AgentConfig,
  rng: &mut R,
) -> Option<Coord> {
  let depth = config.lookahead_depth;
  let scored: Vec<ScoredMove> = moves
    .iter()
    .map(|&mv| (eval_candidate_with_lookahead(board, mv, color, depth, config), mv))
    .collect();
  debug!(candidates = scored.len(), depth, "lookahead scored");
  pick_ranked_move(&scored, &DiversityPolicy::from_config(config), rng)
}

/// Picks a normal move for the side to move in `view`.
///
/// Never returns a coordinate outside the server's legal moves. Missing
/// board or turn color degrades to the stable center-first pick.
pub fn choose_move<R: Rng + ?Sized>(view: &GameView, config: &AgentConfig, rng: &mut R) -> Option<Coord> {
  let legal = view.legal_moves();
  if legal.is_empty() {
    return None;
  }

  let (mut board, color) = match (view.board.clone(), view.turn_color) {
    (Some(board), Some(color)) => (board, color),
    _ => return pick_stable_move(legal),
  };
  let opponent = color.opposite();
  let policy = DiversityPolicy::from_config(config);

  let immediate: Vec<Coord> = legal
    .iter()
    .copied()
    .filter(|&c| is_winning_move(&mut board, c, color))
    .collect();
  if !immediate.is_empty() {
    return best_scored_move(&mut board, &immediate, color, &policy, rng);
  }

  let opponent_wins: HashSet<Coord> = find_immediate_wins(&mut board, opponent, Some(40))
    .into_iter()
    .collect();
  if !opponent_wins.is_empty() {
    let blockers: Vec<Coord> = legal.iter().copied().filter(|c| opponent_wins.contains(c)).collect();
    if !blockers.is_empty() {
      return best_scored_move(&mut board, &blockers, color, &policy, rng);
    }
  }

  let probe = collect_frontier_moves(&board, 2);
  let probe = shortlist_moves(&board, probe, opponent, FORCING_PROBE_LIMIT);
  let forcing = find_forcing_threats(&mut board, opponent, &probe, FORCING_MAX_FOUND);
  if !forcing.is_empty() {
    let blockers: Vec<Coord> = legal.iter().copied().filter(|c| forcing.contains(c)).collect();
    if !blockers.is_empty() {
      return best_scored_move(&mut board, &blockers, color, &policy, rng);
    }
  }

  let early = view.move_number() <= config.early_locality_until;
  let mut pool = legal.to_vec();
  let mut root = config.root_candidates;
  if early {
    let local: HashSet<Coord> = collect_frontier_moves(&board, 2).into_iter().collect();
    let local_pool: Vec<Coord> = legal.iter().copied().filter(|c| local.contains(c)).collect();
    if !local_pool.is_empty() {
      pool = local_pool;
    }
    root += EARLY_ROOT_BONUS;
  }

  // Legal moves come from the server; anything we cannot probe is skipped.
  pool.retain(|&c| board.is_empty(c));
  if pool.is_empty() {
    return pick_stable_move(legal);
  }

  let candidates = shortlist_moves(&board, pool, opponent, root);
  if let Some(best) = best_move_with_lookahead(&mut board, &candidates, color, config, rng) {
    return Some(best);
  }
  best_scored_move(&mut board, &candidates, color, &policy, rng).or_else(|| pick_stable_move(legal))
}
