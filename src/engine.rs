use std::ops::{Deref, DerefMut};

use crate::types::{Color, Coord};

pub const BOARD_SIZE: usize = 15;
pub const CENTER: usize = 7;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Board {
  cells: [[Option<Color>; BOARD_SIZE]; BOARD_SIZE],
}

impl Default for Board {
  fn default() -> Self {
    Self::new()
  }
}

impl Board {
  pub fn new() -> Self {
    Self {
      cells: [[None; BOARD_SIZE]; BOARD_SIZE],
    }
  }

  /// Builds a board from server rows (`rows[y][x]`); `None` unless 15×15.
  pub fn from_rows(rows: &[Vec<Option<Color>>]) -> Option<Self> {
    if rows.len() != BOARD_SIZE || rows.iter().any(|row| row.len() != BOARD_SIZE) {
      return None;
    }
    let mut board = Board::new();
    for (y, row) in rows.iter().enumerate() {
      for (x, cell) in row.iter().enumerate() {
        board.cells[y][x] = *cell;
      }
    }
    Some(board)
  }

  pub fn in_bounds(&self, x: i32, y: i32) -> bool {
    x >= 0 && y >= 0 && (x as usize) < BOARD_SIZE && (y as usize) < BOARD_SIZE
  }

  pub fn get(&self, x: usize, y: usize) -> Option<Color> {
    if x >= BOARD_SIZE || y >= BOARD_SIZE {
      return None;
    }
    self.cells[y][x]
  }

  pub fn at(&self, coord: Coord) -> Option<Color> {
    self.get(coord.x, coord.y)
  }

  pub fn is_empty(&self, coord: Coord) -> bool {
    coord.x < BOARD_SIZE && coord.y < BOARD_SIZE && self.cells[coord.y][coord.x].is_none()
  }

  pub fn has_stones(&self) -> bool {
    self.cells.iter().flatten().any(|cell| cell.is_some())
  }

  pub fn stone_count(&self) -> usize {
    self.cells.iter().flatten().filter(|cell| cell.is_some()).count()
  }

  pub fn empty_coords(&self) -> Vec<Coord> {
    let mut coords = Vec::with_capacity(BOARD_SIZE * BOARD_SIZE);
    for y in 0..BOARD_SIZE {
      for x in 0..BOARD_SIZE {
        if self.cells[y][x].is_none() {
          coords.push(Coord { x, y });
        }
      }
    }
    coords
  }

  /// Permanently sets a stone. Search code uses [`Board::place`] instead.
  pub fn set(&mut self, coord: Coord, color: Color) {
    self.cells[coord.y][coord.x] = Some(color);
  }

  pub fn clear(&mut self, coord: Coord) {
    self.cells[coord.y][coord.x] = None;
  }

  /// Places `color` at an empty `coord` for the lifetime of the returned
  /// guard. The cell is cleared again when the guard drops, whichever way
  /// the probing scope is left. Occupied or off-board cells yield `None`
  /// and leave the board untouched.
  pub fn place(&mut self, coord: Coord, color: Color) -> Option<Placement<'_>> {
    if !self.is_empty(coord) {
      return None;
    }
    self.cells[coord.y][coord.x] = Some(color);
    Some(Placement { board: self, coord })
  }
}

pub struct Placement<'a> {
  board: &'a mut Board,
  coord: Coord,
}

impl Deref for Placement<'_> {
  type Target = Board;

  fn deref(&self) -> &Board {
    self.board
  }
}

impl DerefMut for Placement<'_> {
  fn deref_mut(&mut self) -> &mut Board {
    self.board
  }
}

impl Drop for Placement<'_> {
  fn drop(&mut self) {
    self.board.clear(self.coord);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn placement_is_reverted_on_drop() {
    let mut board = Board::new();
    let c = Coord::new(3, 4);
    {
      let placed = board.place(c, Color::Black).unwrap();
      assert_eq!(placed.at(c), Some(Color::Black));
    }
    assert_eq!(board.at(c), None);
    assert!(!board.has_stones());
  }

  #[test]
  fn nested_placements_unwind_in_order() {
    let mut board = Board::new();
    let a = Coord::new(7, 7);
    let b = Coord::new(8, 8);
    {
      let mut outer = board.place(a, Color::White).unwrap();
      {
        let inner = outer.place(b, Color::Black).unwrap();
        assert_eq!(inner.stone_count(), 2);
      }
      assert_eq!(outer.stone_count(), 1);
      assert_eq!(outer.at(b), None);
    }
    assert_eq!(board, Board::new());
  }

  #[test]
  fn placement_is_reverted_on_early_return() {
    fn probe(board: &mut Board, c: Coord) -> Option<usize> {
      let placed = board.place(c, Color::White)?;
      if placed.stone_count() == 1 {
        return None;
      }
      Some(placed.stone_count())
    }

    let mut board = Board::new();
    assert_eq!(probe(&mut board, Coord::new(0, 0)), None);
    assert!(!board.has_stones());
  }

  #[test]
  fn occupied_or_off_board_cells_refuse_a_placement() {
    let mut board = Board::new();
    let c = Coord::new(7, 7);
    board.set(c, Color::Black);
    let before = board.clone();

    assert!(board.place(c, Color::White).is_none());
    assert!(board.place(c, Color::Black).is_none());
    assert!(board.place(Coord::new(15, 3), Color::White).is_none());
    assert_eq!(board, before);
    assert_eq!(board.at(c), Some(Color::Black));
  }

  #[test]
  fn from_rows_rejects_wrong_shape() {
    assert!(Board::from_rows(&vec![vec![None; 15]; 14]).is_none());
    assert!(Board::from_rows(&vec![vec![None; 14]; 15]).is_none());
    let mut rows = vec![vec![None; 15]; 15];
    rows[2][5] = Some(Color::White);
    let board = Board::from_rows(&rows).unwrap();
    assert_eq!(board.get(5, 2), Some(Color::White));
    assert_eq!(board.empty_coords().len(), 224);
  }
}
