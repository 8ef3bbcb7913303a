use crate::ai::{collect_frontier_moves, shortlist_moves};
use crate::engine::{Board, BOARD_SIZE, CENTER};
use crate::rules::{count_one_side, line_stats, DIRECTIONS};
use crate::threats::count_immediate_wins;
use crate::types::{Color, Coord};

const SHAPE_FIVE: i32 = 50_000;
const SHAPE_OPEN_FOUR: i32 = 6_000;
const SHAPE_CLOSED_FOUR: i32 = 1_200;
const SHAPE_OPEN_THREE: i32 = 700;
const SHAPE_CLOSED_THREE: i32 = 130;
const SHAPE_OPEN_TWO: i32 = 50;

const BLOCK_FOUR: i32 = 12_000;
const BLOCK_THREE: i32 = 2_500;
const BLOCK_DEAD_THREE: i32 = 500;
const BLOCK_OPEN_TWO: i32 = 300;

const QUICK_MY_WIN: i32 = 12_000;
const QUICK_OPP_WIN: i32 = 14_500;
const QUICK_FRONTIER: usize = 16;

pub fn center_score(coord: Coord) -> i32 {
  let dist = (coord.x as i32 - CENTER as i32).abs() + (coord.y as i32 - CENTER as i32).abs();
  (14 - dist) * 3
}

/// Stones within a square of `radius` around `coord`, not counting the cell itself.
pub fn neighborhood_stones(board: &Board, coord: Coord, radius: usize) -> i32 {
  let mut stones = 0;
  let y_range = coord.y.saturating_sub(radius)..(coord.y + radius + 1).min(BOARD_SIZE);
  for y in y_range {
    let x_range = coord.x.saturating_sub(radius)..(coord.x + radius + 1).min(BOARD_SIZE);
    for x in x_range {
      if x == coord.x && y == coord.y {
        continue;
      }
      if board.get(x, y).is_some() {
        stones += 1;
      }
    }
  }
  stones
}

/// Shape value of the `color` stone sitting on `coord`, summed over the four axes.
pub fn own_shape_score(board: &Board, coord: Coord, color: Color) -> i32 {
  let mut score = 0;
  for (dx, dy) in DIRECTIONS {
    score += match line_stats(board, coord, dx, dy, color) {
      (5.., _) => SHAPE_FIVE,
      (4, 2) => SHAPE_OPEN_FOUR,
      (4, _) => SHAPE_CLOSED_FOUR,
      (3, 2) => SHAPE_OPEN_THREE,
      (3, _) => SHAPE_CLOSED_THREE,
      (2, 2) => SHAPE_OPEN_TWO,
      _ => 0,
    };
  }
  score
}

/// How urgently the empty `coord` cuts an `opponent` line running through it.
pub fn blocking_threat_score(board: &Board, coord: Coord, opponent: Color) -> i32 {
  let mut score = 0;
  for (dx, dy) in DIRECTIONS {
    let (left, left_open) = count_one_side(board, coord, -dx, -dy, opponent);
    let (right, right_open) = count_one_side(board, coord, dx, dy, opponent);
    let span = left + right;
    let open_ends = left_open as u8 + right_open as u8;
    score += match (span, open_ends) {
      (4.., _) => BLOCK_FOUR,
      (3, 1..) => BLOCK_THREE,
      (3, _) => BLOCK_DEAD_THREE,
      (2, 2) => BLOCK_OPEN_TWO,
      _ => 0,
    };
  }
  score
}

/// Static score of `board` for `perspective`: immediate wins on both sides
/// plus a shallow scan over the most relevant frontier cells.
pub fn quick_position_score(board: &mut Board, perspective: Color) -> i32 {
  let opponent = perspective.opposite();
  let my_now = count_immediate_wins(board, perspective, 2);
  let opp_now = count_immediate_wins(board, opponent, 2);
  let mut score = my_now * QUICK_MY_WIN - opp_now * QUICK_OPP_WIN;

  let frontier = collect_frontier_moves(board, 2);
  let frontier = shortlist_moves(board, frontier, opponent, QUICK_FRONTIER);
  for coord in frontier {
    score += blocking_threat_score(board, coord, opponent) / 6;
    if let Some(mine) = board.place(coord, perspective) {
      score += own_shape_score(&mine, coord, perspective) / 6;
    }
    if let Some(theirs) = board.place(coord, opponent) {
      score -= own_shape_score(&theirs, coord, opponent) / 7;
    }
  }
  score
}
