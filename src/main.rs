use std::hash::Hasher;
use std::process::ExitCode;
use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use rustc_hash::FxHasher;
use tracing::error;
use tracing_subscriber::EnvFilter;

use renju_agent::arena::ArenaClient;
use renju_agent::credentials::{expand_home, DEFAULT_CREDENTIAL_PATH};
use renju_agent::daemon::{self, DaemonConfig};
use renju_agent::game_loop::DecisionEngine;
use renju_agent::types::AgentConfig;

/// Autonomous Renju arena agent
#[derive(Parser, Debug)]
#[command(name = "renju-agent")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Arena server root
  #[arg(long, env = "ARENA_BASE_URL", default_value = "http://localhost:4000")]
  base_url: String,

  /// Name to register under
  #[arg(long, env = "AGENT_NAME", default_value = "renju-agent")]
  agent_name: String,

  #[arg(long, env = "AGENT_API_KEY")]
  api_key: Option<String>,

  #[arg(long, env = "AGENT_ID")]
  agent_id: Option<String>,

  #[arg(long, env = "AGENT_CREDENTIAL_PATH", default_value = DEFAULT_CREDENTIAL_PATH)]
  credential_path: String,

  /// Long-poll timeout in seconds
  #[arg(long, env = "WAIT_TIMEOUT", default_value_t = 25)]
  wait_timeout: u64,

  /// Pause between idle polls in seconds
  #[arg(long, env = "IDLE_SLEEP", default_value_t = 2.0, value_parser = parse_seconds)]
  idle_sleep: f64,

  #[arg(long, env = "EXIT_AFTER_GAME", default_value_t = false, action = ArgAction::Set, value_parser = BoolishValueParser::new())]
  exit_after_game: bool,

  #[arg(long, env = "LOOKAHEAD_DEPTH", default_value_t = 2)]
  lookahead_depth: u8,

  #[arg(long, env = "ROOT_CANDIDATES", default_value_t = 14)]
  root_candidates: usize,

  #[arg(long, env = "REPLY_CANDIDATES", default_value_t = 10)]
  reply_candidates: usize,

  #[arg(long, env = "EARLY_LOCALITY_UNTIL", default_value_t = 14)]
  early_locality_until: u32,

  #[arg(long, env = "SWAP_MARGIN", default_value_t = 450)]
  swap_margin: i32,

  #[arg(long, env = "DIVERSITY_TOP_N", default_value_t = 3)]
  diversity_top_n: usize,

  #[arg(long, env = "DIVERSITY_SCORE_GAP", default_value_t = 900)]
  diversity_score_gap: i32,

  #[arg(long, env = "AGENT_DIVERSITY", default_value_t = true, action = ArgAction::Set, value_parser = BoolishValueParser::new())]
  diversity: bool,

  #[arg(long, env = "OFFER10_ENABLED", default_value_t = true, action = ArgAction::Set, value_parser = BoolishValueParser::new())]
  offer10: bool,

  #[arg(long, env = "OFFER10_MIN_IMPROVEMENT", default_value_t = 0.0)]
  offer10_min_improvement: f64,

  #[arg(long, env = "OFFER10_LOGIT_SCALE", default_value_t = 26000.0)]
  offer10_logit_scale: f64,

  /// Disable every random tie-break
  #[arg(long, env = "AGENT_DETERMINISTIC", default_value_t = false, action = ArgAction::Set, value_parser = BoolishValueParser::new())]
  deterministic: bool,

  /// Integer seed, or any text hashed into one
  #[arg(long, env = "AGENT_RNG_SEED", value_parser = parse_seed)]
  rng_seed: Option<u64>,
}

impl Cli {
  fn agent_config(&self) -> AgentConfig {
    AgentConfig {
      lookahead_depth: self.lookahead_depth,
      root_candidates: self.root_candidates,
      reply_candidates: self.reply_candidates,
      early_locality_until: self.early_locality_until,
      swap_margin: self.swap_margin,
      diversity_top_n: self.diversity_top_n,
      diversity_score_gap: self.diversity_score_gap,
      diversity_enabled: self.diversity,
      offer10_enabled: self.offer10,
      offer10_min_improvement: self.offer10_min_improvement,
      offer10_logit_scale: self.offer10_logit_scale,
      deterministic: self.deterministic,
      rng_seed: self.rng_seed,
      ..AgentConfig::default()
    }
  }

  fn daemon_config(&self) -> DaemonConfig {
    DaemonConfig {
      base_url: self.base_url.trim_end_matches('/').to_string(),
      agent_name: self.agent_name.clone(),
      api_key: self.api_key.clone(),
      agent_id: self.agent_id.clone(),
      credential_path: expand_home(&self.credential_path),
      idle_sleep: Duration::try_from_secs_f64(self.idle_sleep).unwrap_or(Duration::ZERO),
      exit_after_game: self.exit_after_game,
    }
  }
}

/// Accepts a finite, non-negative number of seconds.
fn parse_seconds(raw: &str) -> Result<f64, String> {
  let secs: f64 = raw.trim().parse().map_err(|_| format!("'{raw}' is not a number of seconds"))?;
  if !secs.is_finite() || secs < 0.0 || Duration::try_from_secs_f64(secs).is_err() {
    return Err(format!("'{raw}' must be a finite, non-negative number of seconds"));
  }
  Ok(secs)
}

/// Integers seed the RNG directly; other text is hashed into a seed.
fn parse_seed(raw: &str) -> Result<u64, String> {
  let raw = raw.trim();
  if let Ok(seed) = raw.parse::<u64>() {
    return Ok(seed);
  }
  let mut hasher = FxHasher::default();
  hasher.write(raw.as_bytes());
  Ok(hasher.finish())
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let config = cli.daemon_config();
  let mut engine = DecisionEngine::new(cli.agent_config());

  let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
    Ok(rt) => rt,
    Err(e) => {
      error!("failed to create runtime: {e}");
      return ExitCode::FAILURE;
    }
  };

  let result = rt.block_on(async {
    let mut client = ArenaClient::new(&config.base_url, Duration::from_secs(cli.wait_timeout.max(1)))?;
    daemon::run(&mut client, &config, &mut engine).await
  });

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      error!("{e}");
      ExitCode::FAILURE
    }
  }
}
