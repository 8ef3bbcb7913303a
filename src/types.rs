use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::engine::{Board, BOARD_SIZE};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
  Black,
  White,
}

impl Color {
  pub fn opposite(self) -> Self {
    match self {
      Color::Black => Color::White,
      Color::White => Color::Black,
    }
  }

  /// Color that places stone `move_number` during the opening (1-based).
  pub fn for_opening_move(move_number: u32) -> Self {
    if move_number % 2 == 1 {
      Color::Black
    } else {
      Color::White
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      Color::Black => "black",
      Color::White => "white",
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
  pub x: usize,
  pub y: usize,
}

impl Coord {
  pub fn new(x: usize, y: usize) -> Self {
    Self { x, y }
  }
}

pub type ScoredMove = (i32, Coord);

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OpeningState {
  #[serde(default)]
  pub tentative_black_agent_id: Option<String>,
  #[serde(default)]
  pub tentative_white_agent_id: Option<String>,
  #[serde(default)]
  pub awaiting_swap: bool,
  #[serde(default)]
  pub awaiting_offer10: bool,
  #[serde(default)]
  pub awaiting_offer10_selection: bool,
}

/// Full game snapshot as served by `GET /games/{id}`.
///
/// Fields the decision engine depends on are parsed leniently: a board of
/// the wrong shape or an unknown color string becomes `None` rather than
/// rejecting the whole snapshot.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct GameView {
  pub id: String,
  #[serde(default)]
  pub status: String,
  #[serde(default, deserialize_with = "lenient_board")]
  pub board: Option<Board>,
  #[serde(default, deserialize_with = "lenient")]
  pub turn_color: Option<Color>,
  #[serde(default, deserialize_with = "lenient")]
  pub move_number: Option<u32>,
  #[serde(default, deserialize_with = "lenient_coords")]
  pub legal_moves: Option<Vec<Coord>>,
  #[serde(default)]
  pub black_agent_id: Option<String>,
  #[serde(default)]
  pub white_agent_id: Option<String>,
  #[serde(default, deserialize_with = "lenient")]
  pub opening_state: Option<OpeningState>,
  #[serde(default, deserialize_with = "lenient_coords")]
  pub offer10_candidates: Option<Vec<Coord>>,
  #[serde(default)]
  pub winner_color: Option<String>,
  #[serde(default)]
  pub result_reason: Option<String>,
}

impl GameView {
  pub fn move_number(&self) -> u32 {
    self.move_number.unwrap_or(0)
  }

  pub fn legal_moves(&self) -> &[Coord] {
    self.legal_moves.as_deref().unwrap_or(&[])
  }

  pub fn offer10_candidates(&self) -> &[Coord] {
    self.offer10_candidates.as_deref().unwrap_or(&[])
  }

  pub fn opening(&self) -> OpeningState {
    self.opening_state.clone().unwrap_or_default()
  }

  pub fn is_finished(&self) -> bool {
    self.status == "finished"
  }

  pub fn agent_for(&self, color: Color) -> Option<&str> {
    match color {
      Color::Black => self.black_agent_id.as_deref(),
      Color::White => self.white_agent_id.as_deref(),
    }
  }

  /// Resolves which color `agent_id` currently holds on this board.
  pub fn color_of(&self, agent_id: &str) -> Option<Color> {
    if agent_id.is_empty() {
      return None;
    }
    if self.black_agent_id.as_deref() == Some(agent_id) {
      return Some(Color::Black);
    }
    if self.white_agent_id.as_deref() == Some(agent_id) {
      return Some(Color::White);
    }
    None
  }
}

/// Tuning knobs for the decision engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
  #[serde(default = "default_lookahead_depth")]
  pub lookahead_depth: u8,
  #[serde(default = "default_root_candidates")]
  pub root_candidates: usize,
  #[serde(default = "default_reply_candidates")]
  pub reply_candidates: usize,
  #[serde(default = "default_early_locality_until")]
  pub early_locality_until: u32,
  #[serde(default = "default_swap_margin")]
  pub swap_margin: i32,
  #[serde(default = "default_diversity_top_n")]
  pub diversity_top_n: usize,
  #[serde(default = "default_diversity_score_gap")]
  pub diversity_score_gap: i32,
  #[serde(default = "default_true")]
  pub diversity_enabled: bool,
  #[serde(default = "default_true")]
  pub offer10_enabled: bool,
  #[serde(default)]
  pub offer10_min_improvement: f64,
  #[serde(default = "default_offer10_logit_scale")]
  pub offer10_logit_scale: f64,
  #[serde(default)]
  pub deterministic: bool,
  #[serde(default)]
  pub rng_seed: Option<u64>,
  #[serde(default = "default_lookahead_blend")]
  pub lookahead_blend: f64,
}

impl Default for AgentConfig {
  fn default() -> Self {
    Self {
      lookahead_depth: default_lookahead_depth(),
      root_candidates: default_root_candidates(),
      reply_candidates: default_reply_candidates(),
      early_locality_until: default_early_locality_until(),
      swap_margin: default_swap_margin(),
      diversity_top_n: default_diversity_top_n(),
      diversity_score_gap: default_diversity_score_gap(),
      diversity_enabled: true,
      offer10_enabled: true,
      offer10_min_improvement: 0.0,
      offer10_logit_scale: default_offer10_logit_scale(),
      deterministic: false,
      rng_seed: None,
      lookahead_blend: default_lookahead_blend(),
    }
  }
}

impl AgentConfig {
  /// Clamps every knob into the range the engine is tuned for.
  pub fn normalized(mut self) -> Self {
    self.lookahead_depth = self.lookahead_depth.clamp(1, 3);
    self.root_candidates = self.root_candidates.max(8);
    self.reply_candidates = self.reply_candidates.max(6);
    self.early_locality_until = self.early_locality_until.max(8);
    self.diversity_top_n = self.diversity_top_n.clamp(1, 6);
    self.diversity_score_gap = self.diversity_score_gap.max(0);
    self.offer10_min_improvement = self.offer10_min_improvement.max(0.0);
    if !(self.lookahead_blend.is_finite() && (0.0..=1.0).contains(&self.lookahead_blend)) {
      self.lookahead_blend = default_lookahead_blend();
    }
    self
  }
}

fn default_lookahead_depth() -> u8 {
  2
}

fn default_root_candidates() -> usize {
  14
}

fn default_reply_candidates() -> usize {
  10
}

fn default_early_locality_until() -> u32 {
  14
}

fn default_swap_margin() -> i32 {
  450
}

fn default_diversity_top_n() -> usize {
  3
}

fn default_diversity_score_gap() -> i32 {
  900
}

fn default_true() -> bool {
  true
}

fn default_offer10_logit_scale() -> f64 {
  26000.0
}

fn default_lookahead_blend() -> f64 {
  0.35
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
  D: Deserializer<'de>,
  T: DeserializeOwned,
{
  let value = Option::<serde_json::Value>::deserialize(deserializer)?;
  Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

/// Keeps the well-formed, on-board entries of a coordinate list.
fn lenient_coords<'de, D>(deserializer: D) -> Result<Option<Vec<Coord>>, D::Error>
where
  D: Deserializer<'de>,
{
  let items: Option<Vec<serde_json::Value>> = lenient(deserializer)?;
  Ok(items.map(|items| {
    items
      .into_iter()
      .filter_map(|item| serde_json::from_value::<Coord>(item).ok())
      .filter(|c| c.x < BOARD_SIZE && c.y < BOARD_SIZE)
      .collect()
  }))
}

fn lenient_board<'de, D>(deserializer: D) -> Result<Option<Board>, D::Error>
where
  D: Deserializer<'de>,
{
  let rows: Option<Vec<Vec<Option<Color>>>> = lenient(deserializer)?;
  Ok(rows.and_then(|rows| Board::from_rows(&rows)))
}
