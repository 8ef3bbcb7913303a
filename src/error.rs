use thiserror::Error;

/// Which submission a failure came from; staleness is judged per kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionKind {
  Swap,
  Offer10,
  Offer10Select,
  Move,
}

#[derive(Error, Debug)]
pub enum AgentError {
  #[error("arena returned {status}: {message}")]
  Http { status: u16, message: String },

  #[error("request failed: {0}")]
  Transport(String),

  #[error("failed to decode arena response: {0}")]
  Decode(String),

  #[error("failed to {operation}: {source}")]
  Io {
    operation: String,
    #[source]
    source: std::io::Error,
  },

  #[error("registration failed: {0}")]
  Registration(String),
}

impl AgentError {
  pub fn status(&self) -> Option<u16> {
    match self {
      AgentError::Http { status, .. } => Some(*status),
      _ => None,
    }
  }

  pub fn is_unauthorized(&self) -> bool {
    matches!(self.status(), Some(401 | 403))
  }

  pub fn is_not_found(&self) -> bool {
    self.status() == Some(404)
  }

  /// True when the server rejected a submission because our view of the
  /// game is out of date (not our turn, already acted, version conflict).
  pub fn is_stale_for(&self, kind: ActionKind) -> bool {
    match (kind, self.status()) {
      (ActionKind::Swap | ActionKind::Offer10Select, Some(403 | 409)) => true,
      (ActionKind::Offer10 | ActionKind::Move, Some(400 | 403 | 409)) => true,
      _ => false,
    }
  }
}

impl From<reqwest::Error> for AgentError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_decode() {
      AgentError::Decode(err.to_string())
    } else {
      AgentError::Transport(err.to_string())
    }
  }
}

impl From<serde_json::Error> for AgentError {
  fn from(err: serde_json::Error) -> Self {
    AgentError::Decode(err.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn http(status: u16) -> AgentError {
    AgentError::Http {
      status,
      message: "nope".to_string(),
    }
  }

  #[test]
  fn staleness_depends_on_action_kind() {
    assert!(http(409).is_stale_for(ActionKind::Swap));
    assert!(http(403).is_stale_for(ActionKind::Offer10Select));
    assert!(!http(400).is_stale_for(ActionKind::Swap));
    assert!(http(400).is_stale_for(ActionKind::Move));
    assert!(http(400).is_stale_for(ActionKind::Offer10));
    assert!(!http(500).is_stale_for(ActionKind::Move));
    assert!(!AgentError::Transport("down".to_string()).is_stale_for(ActionKind::Move));
  }

  #[test]
  fn status_helpers() {
    assert!(http(401).is_unauthorized());
    assert!(http(403).is_unauthorized());
    assert!(http(404).is_not_found());
    assert_eq!(AgentError::Decode("x".to_string()).status(), None);
    assert_eq!(http(409).to_string(), "arena returned 409: nope");
  }
}
