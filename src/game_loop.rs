use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::ai;
use crate::arena::{AgentGame, ArenaApi, GameWait, MoveSubmission};
use crate::error::{ActionKind, AgentError};
use crate::opening::{self, Offer10Detail, Offer10Proposal, SwapDecision, OPENING_MOVES};
use crate::types::{AgentConfig, Color, Coord, GameView};

const RETRY_DELAY: Duration = Duration::from_secs(1);
const STALE_MOVE_DELAY: Duration = Duration::from_millis(50);
const UNKNOWN_AGENT_DELAY: Duration = Duration::from_millis(100);

/// Long-poll position within one game.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncMarkers {
  pub since_move: i64,
  pub since_updated_at: String,
  pub since_revision: String,
}

impl Default for SyncMarkers {
  fn default() -> Self {
    Self {
      since_move: -1,
      since_updated_at: String::new(),
      since_revision: String::new(),
    }
  }
}

impl SyncMarkers {
  pub fn advance(&mut self, wait: &GameWait) {
    if let Some(head) = &wait.game {
      if let Some(move_number) = head.move_number {
        self.since_move = move_number;
      }
      if let Some(updated_at) = &head.updated_at {
        self.since_updated_at = updated_at.clone();
      }
    }
    if let Some(revision) = &wait.revision {
      self.since_revision = revision.clone();
    }
  }

  /// Forces the next wait to return the current state immediately.
  pub fn reset(&mut self) {
    *self = Self::default();
  }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Action {
  Swap(SwapDecision),
  Offer10 { candidates: Vec<Coord>, detail: Offer10Detail },
  SelectOffer10(Coord),
  Move(MoveSubmission),
}

impl Action {
  pub fn kind(&self) -> ActionKind {
    match self {
      Action::Swap(_) => ActionKind::Swap,
      Action::Offer10 { .. } => ActionKind::Offer10,
      Action::SelectOffer10(_) => ActionKind::Offer10Select,
      Action::Move(_) => ActionKind::Move,
    }
  }
}

/// Engine policy plus the one RNG every randomized choice draws from.
pub struct DecisionEngine {
  config: AgentConfig,
  rng: StdRng,
}

impl DecisionEngine {
  pub fn new(config: AgentConfig) -> Self {
    let config = config.normalized();
    let rng = match (config.rng_seed, config.deterministic) {
      (Some(seed), _) => StdRng::seed_from_u64(seed),
      (None, true) => StdRng::seed_from_u64(0),
      (None, false) => StdRng::from_entropy(),
    };
    Self { config, rng }
  }

  pub fn decide_swap(&mut self, view: &GameView, agent_id: &str) -> SwapDecision {
    opening::decide_swap(view, agent_id, &self.config, &mut self.rng)
  }

  pub fn decide_offer10(&self, view: &GameView, agent_id: &str) -> Offer10Proposal {
    opening::decide_offer10_proposal(view, agent_id, &self.config)
  }

  pub fn choose_offer10(&mut self, view: &GameView, agent_id: &str) -> Option<Coord> {
    opening::choose_offer10_candidate(view, agent_id, &self.config, &mut self.rng)
  }

  pub fn choose_move(&mut self, view: &GameView) -> Option<Coord> {
    ai::choose_move(view, &self.config, &mut self.rng)
  }
}

/// Agent expected to place the next stone: parity through the opening,
/// the server's turn color afterwards.
pub fn expected_mover_agent_id(view: &GameView) -> Option<&str> {
  let next_move = view.move_number() + 1;
  let color = if next_move <= OPENING_MOVES {
    Color::for_opening_move(next_move)
  } else {
    view.turn_color?
  };
  view.agent_for(color)
}

/// Whether a role held by `owner` rules us out. Unknown on either side
/// never excludes.
fn belongs_to_other(owner: Option<&str>, agent_id: &str) -> bool {
  match owner {
    Some(owner) => !owner.is_empty() && !agent_id.is_empty() && owner != agent_id,
    None => false,
  }
}

/// Decides what, if anything, to submit for this snapshot.
pub fn plan_action(view: &GameView, agent_id: &str, engine: &mut DecisionEngine) -> Option<Action> {
  if view.is_finished() {
    return None;
  }
  let opening_state = view.opening();

  if opening_state.awaiting_swap {
    if belongs_to_other(opening::swap_decider_agent_id(view), agent_id) {
      return None;
    }
    return Some(Action::Swap(engine.decide_swap(view, agent_id)));
  }

  if opening_state.awaiting_offer10_selection {
    if belongs_to_other(opening_state.tentative_white_agent_id.as_deref(), agent_id) {
      return None;
    }
    return engine.choose_offer10(view, agent_id).map(Action::SelectOffer10);
  }

  if view.legal_moves().is_empty() {
    return None;
  }
  if agent_id.is_empty() || belongs_to_other(expected_mover_agent_id(view), agent_id) {
    return None;
  }

  if opening_state.awaiting_offer10
    && opening_state.tentative_black_agent_id.as_deref() == Some(agent_id)
  {
    let proposal = engine.decide_offer10(view, agent_id);
    if proposal.propose && !proposal.candidates.is_empty() {
      return Some(Action::Offer10 {
        candidates: proposal.candidates,
        detail: proposal.detail,
      });
    }
    debug!(
      "[game:{}] offer10 declined normal={:.4} offer={:.4} skipped={:?}",
      view.id, proposal.detail.normal, proposal.detail.offer, proposal.detail.skipped
    );
  }

  let coord = engine.choose_move(view)?;
  Some(Action::Move(MoveSubmission::new(&view.id, coord, view.move_number() + 1)))
}

/// How a game loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameExit {
  Finished,
  Gone,
  Unauthorized,
}

async fn submit<A: ArenaApi>(api: &A, game_id: &str, action: &Action) -> Result<(), AgentError> {
  match action {
    Action::Swap(decision) => api.post_swap(game_id, decision.swap).await,
    Action::Offer10 { candidates, .. } => api.post_offer10(game_id, candidates).await,
    Action::SelectOffer10(coord) => api.post_offer10_select(game_id, *coord).await,
    Action::Move(submission) => api.post_move(game_id, submission).await,
  }
}

fn log_submitted(game_id: &str, action: &Action) {
  match action {
    Action::Swap(d) => info!(
      "[game:{game_id}] swap decision: {} keep={} swap={} diff={}",
      if d.swap { "swap" } else { "no-swap" },
      d.keep,
      d.swap_score,
      d.diff
    ),
    Action::Offer10 { detail, .. } => info!(
      "[game:{game_id}] offer10 proposed normal={:.4} offer={:.4} diff={:.4}",
      detail.normal, detail.offer, detail.diff
    ),
    Action::SelectOffer10(c) => info!("[game:{game_id}] offer10 selected ({},{})", c.x, c.y),
    Action::Move(m) => info!("[game:{game_id}] move {}: ({},{})", m.turn_number, m.x, m.y),
  }
}

/// Plays `game` until it finishes or becomes unreachable.
pub async fn run_game<A: ArenaApi>(
  api: &A,
  game: &AgentGame,
  agent_id: &str,
  engine: &mut DecisionEngine,
) -> GameExit {
  let game_id = game.id.as_str();
  let mut agent_id = agent_id.to_string();
  let mut markers = SyncMarkers::default();

  loop {
    match api.wait_game(game_id, &markers).await {
      Ok(waited) => markers.advance(&waited),
      Err(e) if e.is_not_found() => {
        info!("[game:{game_id}] no longer exists; leaving game loop");
        return GameExit::Gone;
      }
      Err(e) if e.is_unauthorized() => {
        warn!("[game:{game_id}] wait unauthorized: {e}; leaving game loop");
        return GameExit::Unauthorized;
      }
      Err(e) => {
        debug!("[game:{game_id}] wait failed: {e}");
        sleep(RETRY_DELAY).await;
        continue;
      }
    }

    let view = match api.get_game(game_id).await {
      Ok(view) => view,
      Err(e) if e.is_not_found() => {
        info!("[game:{game_id}] state unavailable; leaving game loop");
        return GameExit::Gone;
      }
      Err(e) if e.is_unauthorized() => {
        warn!("[game:{game_id}] game fetch unauthorized: {e}; leaving game loop");
        return GameExit::Unauthorized;
      }
      Err(e) => {
        debug!("[game:{game_id}] fetch failed: {e}");
        sleep(RETRY_DELAY).await;
        continue;
      }
    };

    if agent_id.is_empty() {
      if let Some(inferred) = game.color.and_then(|color| view.agent_for(color)) {
        agent_id = inferred.to_string();
        info!("[game:{game_id}] inferred agent_id={agent_id}");
      }
    }

    if view.is_finished() {
      info!(
        "[game:{game_id}] finished winner={} reason={}",
        view.winner_color.as_deref().unwrap_or("none"),
        view.result_reason.as_deref().unwrap_or("unknown")
      );
      return GameExit::Finished;
    }

    let action = match plan_action(&view, &agent_id, engine) {
      Some(action) => action,
      None => {
        if agent_id.is_empty() && !view.legal_moves().is_empty() {
          sleep(UNKNOWN_AGENT_DELAY).await;
        }
        continue;
      }
    };

    match submit(api, game_id, &action).await {
      Ok(()) => log_submitted(game_id, &action),
      Err(e) if e.is_stale_for(action.kind()) => {
        debug!("[game:{game_id}] stale {:?} submission: {e}", action.kind());
        markers.reset();
        if action.kind() == ActionKind::Move {
          sleep(STALE_MOVE_DELAY).await;
        }
      }
      Err(e) => warn!("[game:{game_id}] {:?} failed: {e}", action.kind()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::arena::{AgentProfile, AgentState, GameHead, QueueJoin, Registration};
  use crate::engine::Board;
  use crate::types::OpeningState;
  use std::cell::RefCell;
  use std::collections::VecDeque;

  fn engine() -> DecisionEngine {
    DecisionEngine::new(AgentConfig {
      deterministic: true,
      ..AgentConfig::default()
    })
  }

  fn opening_view(move_number: u32) -> GameView {
    let mut board = Board::new();
    board.set(Coord::new(7, 7), Color::Black);
    GameView {
      id: "g".to_string(),
      status: "active".to_string(),
      legal_moves: Some(board.empty_coords()),
      board: Some(board),
      turn_color: Some(Color::White),
      move_number: Some(move_number),
      black_agent_id: Some("b".to_string()),
      white_agent_id: Some("w".to_string()),
      ..GameView::default()
    }
  }

  fn swap_view() -> GameView {
    GameView {
      opening_state: Some(OpeningState {
        awaiting_swap: true,
        ..OpeningState::default()
      }),
      ..opening_view(1)
    }
  }

  fn http(status: u16) -> AgentError {
    AgentError::Http {
      status,
      message: "rejected".to_string(),
    }
  }

  #[test]
  fn markers_start_unsynced_and_reset() {
    let mut markers = SyncMarkers::default();
    assert_eq!(markers.since_move, -1);
    markers.advance(&GameWait {
      changed: true,
      revision: Some("r3".to_string()),
      game: Some(GameHead {
        move_number: Some(4),
        updated_at: Some("t".to_string()),
      }),
    });
    assert_eq!(markers.since_move, 4);
    assert_eq!(markers.since_revision, "r3");
    markers.reset();
    assert_eq!(markers, SyncMarkers::default());
  }

  #[test]
  fn expected_mover_follows_parity_then_turn_color() {
    let mut view = opening_view(0);
    assert_eq!(expected_mover_agent_id(&view), Some("b"));
    view.move_number = Some(1);
    assert_eq!(expected_mover_agent_id(&view), Some("w"));
    view.move_number = Some(4);
    assert_eq!(expected_mover_agent_id(&view), Some("b"));
    view.move_number = Some(5);
    view.turn_color = Some(Color::White);
    assert_eq!(expected_mover_agent_id(&view), Some("w"));
    view.turn_color = None;
    assert_eq!(expected_mover_agent_id(&view), None);
  }

  #[test]
  fn only_the_swap_decider_answers_a_swap() {
    let view = swap_view();
    let mut engine = engine();
    assert!(plan_action(&view, "b", &mut engine).is_none());
    match plan_action(&view, "w", &mut engine) {
      Some(Action::Swap(decision)) => assert!(!decision.swap),
      other => panic!("expected swap decision, got {other:?}"),
    }
  }

  #[test]
  fn move_carries_turn_number_and_idempotency_key() {
    let mut view = opening_view(1);
    view.legal_moves = Some(vec![Coord::new(8, 8)]);
    let mut engine = engine();
    assert!(plan_action(&view, "b", &mut engine).is_none());
    match plan_action(&view, "w", &mut engine) {
      Some(Action::Move(m)) => {
        assert_eq!((m.x, m.y, m.turn_number), (8, 8, 2));
        assert_eq!(m.idempotency_key, "g:2:8:8");
      }
      other => panic!("expected move, got {other:?}"),
    }
  }

  #[test]
  fn unknown_agent_never_submits_a_move() {
    let view = opening_view(1);
    assert!(plan_action(&view, "", &mut engine()).is_none());
  }

  #[test]
  fn finished_or_moveless_games_need_no_action() {
    let mut view = opening_view(1);
    view.legal_moves = Some(Vec::new());
    assert!(plan_action(&view, "w", &mut engine()).is_none());
    view.status = "finished".to_string();
    assert!(plan_action(&view, "w", &mut engine()).is_none());
  }

  #[test]
  fn only_tentative_white_selects_an_offer10_candidate() {
    let view = GameView {
      opening_state: Some(OpeningState {
        awaiting_offer10_selection: true,
        tentative_black_agent_id: Some("b".to_string()),
        tentative_white_agent_id: Some("w".to_string()),
        ..OpeningState::default()
      }),
      offer10_candidates: Some(vec![Coord::new(6, 6), Coord::new(0, 0)]),
      ..opening_view(4)
    };
    let mut engine = engine();
    assert!(plan_action(&view, "b", &mut engine).is_none());
    match plan_action(&view, "w", &mut engine) {
      Some(Action::SelectOffer10(c)) => assert!(view.offer10_candidates().contains(&c)),
      other => panic!("expected selection, got {other:?}"),
    }
  }

  #[test]
  fn seeded_engines_agree() {
    let config = AgentConfig {
      rng_seed: Some(11),
      ..AgentConfig::default()
    };
    let view = opening_view(1);
    let mut a = DecisionEngine::new(config.clone());
    let mut b = DecisionEngine::new(config);
    for _ in 0..4 {
      assert_eq!(a.choose_move(&view), b.choose_move(&view));
    }
  }

  /// Scripted arena: each call pops the next canned response.
  #[derive(Default)]
  struct FakeArena {
    waits: RefCell<VecDeque<Result<GameWait, AgentError>>>,
    games: RefCell<VecDeque<Result<GameView, AgentError>>>,
    swap_results: RefCell<VecDeque<Result<(), AgentError>>>,
    seen_markers: RefCell<Vec<SyncMarkers>>,
    swaps: RefCell<Vec<bool>>,
    moves: RefCell<Vec<MoveSubmission>>,
  }

  impl FakeArena {
    fn head(move_number: i64) -> Result<GameWait, AgentError> {
      Ok(GameWait {
        changed: true,
        revision: Some(format!("r{move_number}")),
        game: Some(GameHead {
          move_number: Some(move_number),
          updated_at: Some(format!("t{move_number}")),
        }),
      })
    }

    fn finished() -> Result<GameView, AgentError> {
      Ok(GameView {
        status: "finished".to_string(),
        winner_color: Some("black".to_string()),
        ..opening_view(9)
      })
    }
  }

  impl ArenaApi for FakeArena {
    fn set_token(&mut self, _token: &str) {}

    async fn register(&self, _name: &str) -> Result<Registration, AgentError> {
      Err(http(500))
    }

    async fn me(&self) -> Result<AgentProfile, AgentError> {
      Err(http(500))
    }

    async fn wait_agent(&self, _since_revision: &str) -> Result<AgentState, AgentError> {
      Err(http(500))
    }

    async fn active_game(&self) -> Result<AgentState, AgentError> {
      Err(http(500))
    }

    async fn join_queue(&self) -> Result<QueueJoin, AgentError> {
      Err(http(500))
    }

    async fn wait_game(&self, _game_id: &str, markers: &SyncMarkers) -> Result<GameWait, AgentError> {
      self.seen_markers.borrow_mut().push(markers.clone());
      self.waits.borrow_mut().pop_front().unwrap_or_else(|| Err(http(404)))
    }

    async fn get_game(&self, _game_id: &str) -> Result<GameView, AgentError> {
      self.games.borrow_mut().pop_front().unwrap_or_else(|| Err(http(404)))
    }

    async fn post_swap(&self, _game_id: &str, swap: bool) -> Result<(), AgentError> {
      self.swaps.borrow_mut().push(swap);
      self.swap_results.borrow_mut().pop_front().unwrap_or(Ok(()))
    }

    async fn post_offer10(&self, _game_id: &str, _candidates: &[Coord]) -> Result<(), AgentError> {
      Ok(())
    }

    async fn post_offer10_select(&self, _game_id: &str, _coord: Coord) -> Result<(), AgentError> {
      Ok(())
    }

    async fn post_move(&self, _game_id: &str, submission: &MoveSubmission) -> Result<(), AgentError> {
      self.moves.borrow_mut().push(submission.clone());
      Ok(())
    }
  }

  fn agent_game(color: Option<Color>) -> AgentGame {
    AgentGame {
      id: "g".to_string(),
      color,
      phase: None,
    }
  }

  #[tokio::test]
  async fn stale_swap_resets_markers() {
    let arena = FakeArena::default();
    arena.waits.borrow_mut().extend([FakeArena::head(1), FakeArena::head(1)]);
    arena.games.borrow_mut().extend([Ok(swap_view()), FakeArena::finished()]);
    arena.swap_results.borrow_mut().push_back(Err(http(409)));

    let exit = run_game(&arena, &agent_game(Some(Color::White)), "w", &mut engine()).await;

    assert_eq!(exit, GameExit::Finished);
    assert_eq!(arena.swaps.borrow().len(), 1);
    let seen = arena.seen_markers.borrow();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], SyncMarkers::default());
    assert_eq!(seen[1], SyncMarkers::default());
  }

  #[tokio::test]
  async fn accepted_swap_keeps_markers() {
    let arena = FakeArena::default();
    arena.waits.borrow_mut().extend([FakeArena::head(1), FakeArena::head(2)]);
    arena.games.borrow_mut().extend([Ok(swap_view()), FakeArena::finished()]);

    let exit = run_game(&arena, &agent_game(None), "w", &mut engine()).await;

    assert_eq!(exit, GameExit::Finished);
    let seen = arena.seen_markers.borrow();
    assert_eq!(seen[1].since_move, 1);
    assert_eq!(seen[1].since_updated_at, "t1");
    assert_eq!(seen[1].since_revision, "r1");
  }

  #[tokio::test]
  async fn agent_id_is_inferred_from_color_hint() {
    let mut view = opening_view(1);
    view.legal_moves = Some(vec![Coord::new(6, 7)]);
    let arena = FakeArena::default();
    arena.waits.borrow_mut().extend([FakeArena::head(1), FakeArena::head(2)]);
    arena.games.borrow_mut().extend([Ok(view), FakeArena::finished()]);

    let exit = run_game(&arena, &agent_game(Some(Color::White)), "", &mut engine()).await;

    assert_eq!(exit, GameExit::Finished);
    let moves = arena.moves.borrow();
    assert_eq!(moves.len(), 1);
    assert_eq!(moves[0].idempotency_key, "g:2:6:7");
  }

  #[tokio::test]
  async fn missing_or_forbidden_game_ends_the_loop() {
    let arena = FakeArena::default();
    assert_eq!(run_game(&arena, &agent_game(None), "w", &mut engine()).await, GameExit::Gone);

    let arena = FakeArena::default();
    arena.waits.borrow_mut().push_back(FakeArena::head(0));
    arena.games.borrow_mut().push_back(Err(http(401)));
    assert_eq!(
      run_game(&arena, &agent_game(None), "w", &mut engine()).await,
      GameExit::Unauthorized
    );
  }
}
