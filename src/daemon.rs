use std::path::PathBuf;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::arena::{AgentGame, ArenaApi};
use crate::credentials::Credentials;
use crate::error::AgentError;
use crate::game_loop::{run_game, DecisionEngine};

const REREGISTER_PAUSE: Duration = Duration::from_millis(500);
const QUEUE_PAUSE: Duration = Duration::from_millis(200);

#[derive(Clone, Debug)]
pub struct DaemonConfig {
  pub base_url: String,
  pub agent_name: String,
  pub api_key: Option<String>,
  pub agent_id: Option<String>,
  pub credential_path: PathBuf,
  pub idle_sleep: Duration,
  pub exit_after_game: bool,
}

fn non_empty(value: &Option<String>) -> Option<String> {
  value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

fn persist(config: &DaemonConfig, api_key: &str, agent_id: &str) {
  let credentials = Credentials {
    base_url: config.base_url.clone(),
    agent_name: config.agent_name.clone(),
    agent_id: agent_id.to_string(),
    api_key: api_key.to_string(),
  };
  if let Err(e) = credentials.save(&config.credential_path) {
    warn!("could not save credentials: {e}");
  }
}

/// Registers `agent_name` afresh and switches the client to the new key.
async fn register<A: ArenaApi>(api: &mut A, config: &DaemonConfig) -> Result<String, AgentError> {
  let registration = api.register(&config.agent_name).await.map_err(|e| {
    AgentError::Registration(format!(
      "{e}; name '{}' may already exist, choose another agent name",
      config.agent_name
    ))
  })?;
  api.set_token(&registration.api_key);
  persist(config, &registration.api_key, &registration.id);
  Ok(registration.id)
}

/// Picks the API key (flag, saved file, or a new registration) and
/// resolves the agent id for it.
pub async fn resolve_identity<A: ArenaApi>(api: &mut A, config: &DaemonConfig) -> Result<String, AgentError> {
  let saved = Credentials::load_matching(&config.credential_path, &config.base_url, &config.agent_name);
  let token = non_empty(&config.api_key).or_else(|| saved.as_ref().map(|c| c.api_key.clone()));
  let mut agent_id = non_empty(&config.agent_id)
    .or_else(|| saved.map(|c| c.agent_id).filter(|id| !id.is_empty()))
    .unwrap_or_default();

  let Some(token) = token else {
    let agent_id = register(api, config).await?;
    info!("registered agent={agent_id}");
    return Ok(agent_id);
  };

  api.set_token(&token);
  if agent_id.is_empty() {
    match api.me().await {
      Ok(profile) => {
        if let Some(id) = profile.id.filter(|id| !id.is_empty()) {
          agent_id = id;
          persist(config, &token, &agent_id);
        }
      }
      Err(e) => warn!("could not resolve agent id: {e}"),
    }
  }
  Ok(agent_id)
}

async fn join_queue<A: ArenaApi>(api: &A) {
  match api.join_queue().await {
    Ok(joined) => {
      if let Some(game_id) = joined.game_id {
        info!("matched quickly game={game_id}");
      }
    }
    Err(e) if e.status() == Some(409) => {}
    Err(e) => warn!("queue join failed: {e}"),
  }
}

fn announce(game: &AgentGame) {
  info!(
    "active game={} color={} phase={}",
    game.id,
    game.color.map(|c| c.label()).unwrap_or("unknown"),
    game.phase.as_deref().unwrap_or("unknown")
  );
}

/// Waits for games, queues when idle, and plays every game it is given.
///
/// Returns once a game ends with `exit_after_game` set, or with an error
/// when the agent cannot (re)register.
pub async fn run<A: ArenaApi>(
  api: &mut A,
  config: &DaemonConfig,
  engine: &mut DecisionEngine,
) -> Result<(), AgentError> {
  let mut agent_id = resolve_identity(api, config).await?;
  let mut revision = String::new();

  loop {
    let state = match api.wait_agent(&revision).await {
      Ok(state) => state,
      Err(e) if e.status() == Some(401) => {
        agent_id = register(api, config).await?;
        info!("token refreshed via re-register agent={agent_id}");
        revision.clear();
        sleep(REREGISTER_PAUSE).await;
        continue;
      }
      Err(e) if e.is_not_found() => {
        // Servers without /agents/wait only expose the active game.
        match api.active_game().await {
          Ok(legacy) => match legacy.game {
            Some(game) => {
              announce(&game);
              run_game(&*api, &game, &agent_id, engine).await;
              if config.exit_after_game {
                return Ok(());
              }
            }
            None => {
              join_queue(&*api).await;
              sleep(config.idle_sleep).await;
            }
          },
          Err(e) if e.status() == Some(401) => {
            agent_id = register(api, config).await?;
            info!("token refreshed via re-register agent={agent_id}");
            revision.clear();
          }
          Err(e) => {
            warn!("active-game failed: {e}");
            sleep(config.idle_sleep).await;
          }
        }
        continue;
      }
      Err(e) => {
        warn!("agents-wait failed: {e}");
        sleep(config.idle_sleep).await;
        continue;
      }
    };

    if let Some(next) = state.revision {
      revision = next;
    }

    let Some(game) = state.game else {
      if !state.in_queue {
        join_queue(&*api).await;
        sleep(QUEUE_PAUSE).await;
      }
      continue;
    };

    announce(&game);
    run_game(&*api, &game, &agent_id, engine).await;
    if config.exit_after_game {
      return Ok(());
    }
    revision.clear();
  }
}
