use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AgentError;

pub const DEFAULT_CREDENTIAL_PATH: &str = "~/.renju-agent/credentials.json";

/// API key and identity issued by one arena for one agent name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
  #[serde(default)]
  pub base_url: String,
  #[serde(default)]
  pub agent_name: String,
  #[serde(default)]
  pub agent_id: String,
  #[serde(default)]
  pub api_key: String,
}

impl Credentials {
  /// Loads the saved credentials only if they were issued for this arena
  /// and agent name. Missing or unreadable files count as no credentials.
  pub fn load_matching(path: &Path, base_url: &str, agent_name: &str) -> Option<Self> {
    let data = fs::read_to_string(path).ok()?;
    let saved = serde_json::from_str::<Credentials>(&data).ok()?;
    if saved.base_url.trim_end_matches('/') != base_url.trim_end_matches('/') || saved.agent_name != agent_name {
      return None;
    }
    if saved.api_key.is_empty() {
      return None;
    }
    Some(saved)
  }

  pub fn save(&self, path: &Path) -> Result<(), AgentError> {
    if let Some(parent) = path.parent() {
      if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent).map_err(|source| AgentError::Io {
          operation: format!("create {}", parent.display()),
          source,
        })?;
      }
    }
    let data = serde_json::to_string_pretty(self)?;
    fs::write(path, data).map_err(|source| AgentError::Io {
      operation: format!("write {}", path.display()),
      source,
    })
  }
}

/// Expands a leading `~/` against `$HOME`.
pub fn expand_home(path: &str) -> PathBuf {
  match path.strip_prefix("~/") {
    Some(rest) => match env::var_os("HOME") {
      Some(home) => PathBuf::from(home).join(rest),
      None => PathBuf::from(path),
    },
    None if path == "~" => env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from(path)),
    None => PathBuf::from(path),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::{SystemTime, UNIX_EPOCH};

  fn temp_path(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .map(|d| d.as_nanos())
      .unwrap_or(0);
    env::temp_dir()
      .join(format!("renju-agent-{tag}-{}-{nanos}", std::process::id()))
      .join("nested")
      .join("credentials.json")
  }

  fn sample() -> Credentials {
    Credentials {
      base_url: "http://localhost:4000".to_string(),
      agent_name: "stone-cold".to_string(),
      agent_id: "a-1".to_string(),
      api_key: "key-123".to_string(),
    }
  }

  #[test]
  fn save_creates_directories_and_round_trips() {
    let path = temp_path("roundtrip");
    sample().save(&path).unwrap();
    let loaded = Credentials::load_matching(&path, "http://localhost:4000/", "stone-cold");
    assert_eq!(loaded, Some(sample()));
    let _ = fs::remove_dir_all(path.parent().unwrap().parent().unwrap());
  }

  #[test]
  fn other_arena_or_name_is_ignored() {
    let path = temp_path("mismatch");
    sample().save(&path).unwrap();
    assert!(Credentials::load_matching(&path, "http://elsewhere", "stone-cold").is_none());
    assert!(Credentials::load_matching(&path, "http://localhost:4000", "someone-else").is_none());
    let _ = fs::remove_dir_all(path.parent().unwrap().parent().unwrap());
  }

  #[test]
  fn missing_or_corrupt_file_yields_nothing() {
    let path = temp_path("corrupt");
    assert!(Credentials::load_matching(&path, "http://localhost:4000", "stone-cold").is_none());
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "{not json").unwrap();
    assert!(Credentials::load_matching(&path, "http://localhost:4000", "stone-cold").is_none());
    let _ = fs::remove_dir_all(path.parent().unwrap().parent().unwrap());
  }

  #[test]
  fn plain_paths_are_not_expanded() {
    assert_eq!(expand_home("/tmp/creds.json"), PathBuf::from("/tmp/creds.json"));
    if let Some(home) = env::var_os("HOME") {
      assert_eq!(expand_home("~/x.json"), PathBuf::from(home).join("x.json"));
    }
  }
}
