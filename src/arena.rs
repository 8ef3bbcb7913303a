use std::time::Duration;

use reqwest::{Client, Method};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Deserializer, Serialize};
use tokio::time::timeout;

use crate::error::AgentError;
use crate::game_loop::SyncMarkers;
use crate::types::{Color, Coord, GameView};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const WAIT_GRACE: Duration = Duration::from_secs(10);

#[derive(Clone, Debug, Deserialize)]
pub struct Registration {
  pub id: String,
  pub api_key: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AgentProfile {
  #[serde(default)]
  pub id: Option<String>,
  #[serde(default)]
  pub name: Option<String>,
}

/// The agent's current game as listed by `/agents/wait`.
#[derive(Clone, Debug, Deserialize)]
pub struct AgentGame {
  pub id: String,
  #[serde(default)]
  pub color: Option<Color>,
  #[serde(default)]
  pub phase: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AgentState {
  #[serde(default)]
  pub changed: bool,
  #[serde(default)]
  pub in_queue: bool,
  #[serde(default)]
  pub game: Option<AgentGame>,
  #[serde(default, deserialize_with = "revision")]
  pub revision: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct QueueJoin {
  #[serde(default)]
  pub game_id: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct GameHead {
  #[serde(default)]
  pub move_number: Option<i64>,
  #[serde(default, deserialize_with = "revision")]
  pub updated_at: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct GameWait {
  #[serde(default)]
  pub changed: bool,
  #[serde(default, deserialize_with = "revision")]
  pub revision: Option<String>,
  #[serde(default)]
  pub game: Option<GameHead>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MoveSubmission {
  pub x: usize,
  pub y: usize,
  pub turn_number: u32,
  pub idempotency_key: String,
}

impl MoveSubmission {
  pub fn new(game_id: &str, coord: Coord, turn_number: u32) -> Self {
    Self {
      x: coord.x,
      y: coord.y,
      turn_number,
      idempotency_key: format!("{}:{}:{}:{}", game_id, turn_number, coord.x, coord.y),
    }
  }
}

#[derive(Deserialize)]
struct ErrorBody {
  error: String,
}

/// The slice of the arena API the agent talks to.
#[allow(async_fn_in_trait)]
pub trait ArenaApi {
  fn set_token(&mut self, token: &str);
  async fn register(&self, name: &str) -> Result<Registration, AgentError>;
  async fn me(&self) -> Result<AgentProfile, AgentError>;
  async fn wait_agent(&self, since_revision: &str) -> Result<AgentState, AgentError>;
  async fn active_game(&self) -> Result<AgentState, AgentError>;
  async fn join_queue(&self) -> Result<QueueJoin, AgentError>;
  async fn wait_game(&self, game_id: &str, markers: &SyncMarkers) -> Result<GameWait, AgentError>;
  async fn get_game(&self, game_id: &str) -> Result<GameView, AgentError>;
  async fn post_swap(&self, game_id: &str, swap: bool) -> Result<(), AgentError>;
  async fn post_offer10(&self, game_id: &str, candidates: &[Coord]) -> Result<(), AgentError>;
  async fn post_offer10_select(&self, game_id: &str, coord: Coord) -> Result<(), AgentError>;
  async fn post_move(&self, game_id: &str, submission: &MoveSubmission) -> Result<(), AgentError>;
}

pub struct ArenaClient {
  http: Client,
  base_url: String,
  token: String,
  wait_timeout: Duration,
}

impl ArenaClient {
  pub fn new(base_url: &str, wait_timeout: Duration) -> Result<Self, AgentError> {
    let http = Client::builder()
      .build()
      .map_err(|e| AgentError::Transport(format!("failed to create HTTP client: {e}")))?;
    Ok(Self {
      http,
      base_url: base_url.trim_end_matches('/').to_string(),
      token: String::new(),
      wait_timeout,
    })
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  fn wait_secs(&self) -> String {
    self.wait_timeout.as_secs().to_string()
  }

  async fn call<T: DeserializeOwned>(
    &self,
    method: Method,
    path: &str,
    query: &[(&str, String)],
    payload: Option<serde_json::Value>,
    limit: Duration,
  ) -> Result<T, AgentError> {
    let url = format!("{}{}", self.base_url, path);
    let mut request = self.http.request(method, &url).query(query);
    if !self.token.is_empty() {
      request = request.bearer_auth(&self.token);
    }
    if let Some(payload) = payload {
      request = request.json(&payload);
    }

    let response = timeout(limit, request.send())
      .await
      .map_err(|_| AgentError::Transport(format!("{path} timed out")))??;

    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
      let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|e| e.error)
        .unwrap_or_else(|_| truncate_for_error(&body));
      return Err(AgentError::Http {
        status: status.as_u16(),
        message,
      });
    }

    let raw = if body.trim().is_empty() { "null" } else { body.as_str() };
    Ok(serde_json::from_str(raw)?)
  }

  async fn post_action(&self, path: String, payload: serde_json::Value) -> Result<(), AgentError> {
    self
      .call::<IgnoredAny>(Method::POST, &path, &[], Some(payload), REQUEST_TIMEOUT)
      .await
      .map(|_| ())
  }
}

impl ArenaApi for ArenaClient {
  fn set_token(&mut self, token: &str) {
    self.token = token.to_string();
  }

  async fn register(&self, name: &str) -> Result<Registration, AgentError> {
    let payload = serde_json::json!({ "name": name });
    self
      .call(Method::POST, "/agents/register", &[], Some(payload), REQUEST_TIMEOUT)
      .await
  }

  async fn me(&self) -> Result<AgentProfile, AgentError> {
    self.call(Method::GET, "/agents/me", &[], None, REQUEST_TIMEOUT).await
  }

  async fn wait_agent(&self, since_revision: &str) -> Result<AgentState, AgentError> {
    let query = [
      ("since_revision", since_revision.to_string()),
      ("timeout_sec", self.wait_secs()),
    ];
    self
      .call(Method::GET, "/agents/wait", &query, None, self.wait_timeout + WAIT_GRACE)
      .await
  }

  async fn active_game(&self) -> Result<AgentState, AgentError> {
    self
      .call(Method::GET, "/agents/active-game", &[], None, REQUEST_TIMEOUT)
      .await
  }

  async fn join_queue(&self) -> Result<QueueJoin, AgentError> {
    self
      .call(Method::POST, "/queue/join", &[], Some(serde_json::json!({})), REQUEST_TIMEOUT)
      .await
  }

  async fn wait_game(&self, game_id: &str, markers: &SyncMarkers) -> Result<GameWait, AgentError> {
    let query = [
      ("since_move", markers.since_move.to_string()),
      ("since_updated_at", markers.since_updated_at.clone()),
      ("since_revision", markers.since_revision.clone()),
      ("timeout_sec", self.wait_secs()),
    ];
    let path = format!("/games/{game_id}/wait");
    self
      .call(Method::GET, &path, &query, None, self.wait_timeout + WAIT_GRACE)
      .await
  }

  async fn get_game(&self, game_id: &str) -> Result<GameView, AgentError> {
    let path = format!("/games/{game_id}");
    self.call(Method::GET, &path, &[], None, REQUEST_TIMEOUT).await
  }

  async fn post_swap(&self, game_id: &str, swap: bool) -> Result<(), AgentError> {
    self
      .post_action(format!("/games/{game_id}/swap"), serde_json::json!({ "swap": swap }))
      .await
  }

  async fn post_offer10(&self, game_id: &str, candidates: &[Coord]) -> Result<(), AgentError> {
    self
      .post_action(
        format!("/games/{game_id}/offer10"),
        serde_json::json!({ "candidates": candidates }),
      )
      .await
  }

  async fn post_offer10_select(&self, game_id: &str, coord: Coord) -> Result<(), AgentError> {
    self
      .post_action(
        format!("/games/{game_id}/offer10/select"),
        serde_json::json!({ "x": coord.x, "y": coord.y }),
      )
      .await
  }

  async fn post_move(&self, game_id: &str, submission: &MoveSubmission) -> Result<(), AgentError> {
    let payload = serde_json::to_value(submission)?;
    self.post_action(format!("/games/{game_id}/move"), payload).await
  }
}

/// Revisions and timestamps arrive as strings or numbers; keep them opaque.
fn revision<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Option::<serde_json::Value>::deserialize(deserializer)?;
  Ok(match value {
    Some(serde_json::Value::String(s)) => Some(s),
    Some(serde_json::Value::Null) | None => None,
    Some(other) => Some(other.to_string()),
  })
}

fn truncate_for_error(s: &str) -> String {
  if s.chars().count() > 100 {
    format!("{}...", s.chars().take(100).collect::<String>())
  } else {
    s.to_string()
  }
}
