use std::collections::HashSet;

use crate::engine::{Board, BOARD_SIZE};
use crate::rules::{is_win_after_placing, is_winning_move};
use crate::types::{Color, Coord};

/// Empty cells where `color` wins immediately, in row-major order.
pub fn find_immediate_wins(board: &mut Board, color: Color, limit: Option<usize>) -> Vec<Coord> {
  let mut wins = Vec::new();
  for y in 0..BOARD_SIZE {
    for x in 0..BOARD_SIZE {
      let coord = Coord { x, y };
      if !board.is_empty(coord) {
        continue;
      }
      if is_winning_move(board, coord, color) {
        wins.push(coord);
        if limit.is_some_and(|limit| wins.len() >= limit) {
          return wins;
        }
      }
    }
  }
  wins
}

pub fn count_immediate_wins(board: &mut Board, color: Color, limit: usize) -> i32 {
  find_immediate_wins(board, color, Some(limit)).len() as i32
}

/// Probe cells where `color` either wins outright or sets up a fork of two
/// or more immediate wins. Probes run in the given order and stop once
/// `max_found` threats are collected.
pub fn find_forcing_threats(
  board: &mut Board,
  color: Color,
  probes: &[Coord],
  max_found: usize,
) -> HashSet<Coord> {
  let mut threats = HashSet::new();

  for &coord in probes {
    let Some(mut placed) = board.place(coord, color) else {
      continue;
    };
    if is_win_after_placing(&placed, coord, color) {
      threats.insert(coord);
    } else if find_immediate_wins(&mut placed, color, Some(3)).len() >= 2 {
      threats.insert(coord);
    }
    drop(placed);

    if threats.len() >= max_found {
      break;
    }
  }

  threats
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn open_four_has_two_winning_ends() {
    let mut board = Board::new();
    for x in 3..7 {
      board.set(Coord::new(x, 7), Color::Black);
    }
    let wins = find_immediate_wins(&mut board, Color::Black, None);
    assert_eq!(wins, vec![Coord::new(2, 7), Coord::new(7, 7)]);
    assert!(find_immediate_wins(&mut board, Color::White, None).is_empty());
  }

  #[test]
  fn column_four_wins_reported_in_row_major_order() {
    let mut board = Board::new();
    for y in 3..7 {
      board.set(Coord::new(7, y), Color::Black);
    }
    let wins = find_immediate_wins(&mut board, Color::Black, None);
    assert_eq!(wins, vec![Coord::new(7, 2), Coord::new(7, 7)]);
  }

  #[test]
  fn immediate_wins_respect_limit() {
    let mut board = Board::new();
    for x in 3..7 {
      board.set(Coord::new(x, 7), Color::White);
    }
    let wins = find_immediate_wins(&mut board, Color::White, Some(1));
    assert_eq!(wins, vec![Coord::new(2, 7)]);
  }

  #[test]
  fn open_three_extension_is_a_forcing_fork() {
    let mut board = Board::new();
    for x in 5..8 {
      board.set(Coord::new(x, 7), Color::White);
    }
    let probes = vec![Coord::new(4, 7), Coord::new(8, 7), Coord::new(0, 0)];
    let threats = find_forcing_threats(&mut board, Color::White, &probes, 10);
    assert!(threats.contains(&Coord::new(4, 7)));
    assert!(threats.contains(&Coord::new(8, 7)));
    assert!(!threats.contains(&Coord::new(0, 0)));
    assert_eq!(board.stone_count(), 3);
  }

  #[test]
  fn forcing_threats_stop_at_cap() {
    let mut board = Board::new();
    for x in 5..8 {
      board.set(Coord::new(x, 7), Color::White);
    }
    let probes = vec![Coord::new(4, 7), Coord::new(8, 7)];
    let threats = find_forcing_threats(&mut board, Color::White, &probes, 1);
    assert_eq!(threats.len(), 1);
    assert!(threats.contains(&Coord::new(4, 7)));
  }
}
