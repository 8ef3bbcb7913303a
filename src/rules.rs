use crate::engine::Board;
use crate::types::{Color, Coord};

pub const DIRECTIONS: [(i32, i32); 4] = [(1, 0), (0, 1), (1, 1), (1, -1)];

/// Walks from `(x, y)` (exclusive) along `(dx, dy)` while stones are
/// `color`. Returns the run length and whether the next cell is empty.
pub fn count_one_side(board: &Board, coord: Coord, dx: i32, dy: i32, color: Color) -> (usize, bool) {
  let mut length = 0;
  let mut cx = coord.x as i32 + dx;
  let mut cy = coord.y as i32 + dy;

  while board.in_bounds(cx, cy) && board.get(cx as usize, cy as usize) == Some(color) {
    length += 1;
    cx += dx;
    cy += dy;
  }

  let open_end = board.in_bounds(cx, cy) && board.get(cx as usize, cy as usize).is_none();
  (length, open_end)
}

/// Line through `coord` along one axis: total length counting `coord`
/// itself, and the number of open ends (0..=2).
pub fn line_stats(board: &Board, coord: Coord, dx: i32, dy: i32, color: Color) -> (usize, u8) {
  let (left, left_open) = count_one_side(board, coord, -dx, -dy, color);
  let (right, right_open) = count_one_side(board, coord, dx, dy, color);
  (left + 1 + right, left_open as u8 + right_open as u8)
}

/// Win check for a stone of `color` already sitting on `coord`.
///
/// Black needs an exact five and loses the win to any overline on another
/// axis; white wins with five or more.
pub fn is_win_after_placing(board: &Board, coord: Coord, color: Color) -> bool {
  let mut lengths = [0usize; 4];
  for (i, (dx, dy)) in DIRECTIONS.iter().enumerate() {
    lengths[i] = line_stats(board, coord, *dx, *dy, color).0;
  }

  match color {
    Color::Black => {
      if lengths.iter().any(|&len| len >= 6) {
        return false;
      }
      lengths.iter().any(|&len| len == 5)
    }
    Color::White => lengths.iter().any(|&len| len >= 5),
  }
}

/// Would placing `color` at the empty `coord` win? Out-of-bounds and
/// occupied cells never win.
pub fn is_winning_move(board: &mut Board, coord: Coord, color: Color) -> bool {
  match board.place(coord, color) {
    Some(placed) => is_win_after_placing(&placed, coord, color),
    None => false,
  }
}
