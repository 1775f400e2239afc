//! Loading quiz configuration (provider endpoint, default options, retry policy, UI texts) from TOML.
//!
//! Every section is optional; missing keys fall back to `Default`.
//!
//! ```toml
//! [api]
//! base_url = "https://opentdb.com"
//! timeout_secs = 10
//!
//! [defaults]
//! category = 9
//! difficulty = "medium"
//! question_count = 5
//!
//! [retry]
//! max_attempts = 3
//!
//! [messages]
//! incorrect = "Nope, it was {answer}."
//!
//! [sessions]
//! idle_timeout_secs = 1800
//! max_sessions = 10000
//! ```

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::domain::{Difficulty, QuizOptions, MAX_QUESTION_COUNT};

pub const DEFAULT_BASE_URL: &str = "https://opentdb.com";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct QuizConfig {
  #[serde(default)]
  pub api: ApiCfg,
  #[serde(default)]
  pub defaults: DefaultsCfg,
  #[serde(default)]
  pub retry: RetryCfg,
  #[serde(default)]
  pub messages: Messages,
  #[serde(default)]
  pub sessions: SessionsCfg,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ApiCfg {
  pub base_url: String,
  pub timeout_secs: u64,
}

impl Default for ApiCfg {
  fn default() -> Self {
    Self { base_url: DEFAULT_BASE_URL.into(), timeout_secs: 10 }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DefaultsCfg {
  pub category: u32,
  pub difficulty: Difficulty,
  pub question_count: u32,
}

impl Default for DefaultsCfg {
  fn default() -> Self {
    let o = QuizOptions::default();
    Self { category: o.category, difficulty: o.difficulty, question_count: o.question_count }
  }
}

impl DefaultsCfg {
  /// Options a fresh controller starts with. Out-of-range counts are clamped.
  pub fn to_options(&self) -> QuizOptions {
    QuizOptions {
      category: self.category,
      difficulty: self.difficulty,
      question_count: self.question_count.clamp(1, MAX_QUESTION_COUNT),
    }
  }
}

/// Bounded retry for transient provider failures.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RetryCfg {
  pub max_attempts: usize,
  pub base_backoff_ms: u64,
  pub max_backoff_ms: u64,
  pub jitter_ms: u64,
}

impl Default for RetryCfg {
  fn default() -> Self {
    Self { max_attempts: 3, base_backoff_ms: 200, max_backoff_ms: 2000, jitter_ms: 100 }
  }
}

impl RetryCfg {
  pub fn base_backoff(&self) -> Duration {
    Duration::from_millis(self.base_backoff_ms)
  }

  pub fn max_backoff(&self) -> Duration {
    Duration::from_millis(self.max_backoff_ms)
  }

  pub fn jitter(&self) -> Option<Duration> {
    if self.jitter_ms == 0 {
      None
    } else {
      Some(Duration::from_millis(self.jitter_ms))
    }
  }
}

/// HTTP session table limits. Idle sessions are swept periodically; when the table is
/// full, the least recently used session makes room for a new one.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SessionsCfg {
  pub idle_timeout_secs: u64,
  pub sweep_interval_secs: u64,
  pub max_sessions: usize,
}

impl Default for SessionsCfg {
  fn default() -> Self {
    Self { idle_timeout_secs: 30 * 60, sweep_interval_secs: 60, max_sessions: 10_000 }
  }
}

impl SessionsCfg {
  pub fn idle_timeout(&self) -> Duration {
    Duration::from_secs(self.idle_timeout_secs)
  }

  pub fn sweep_interval(&self) -> Duration {
    Duration::from_secs(self.sweep_interval_secs.max(1))
  }
}

/// Texts shown to the player. `incorrect` accepts the `{answer}` placeholder.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Messages {
  pub correct: String,
  pub incorrect: String,
  pub token_error: String,
  pub network_error: String,
  pub question_error: String,
  pub exhausted: String,
}

impl Default for Messages {
  fn default() -> Self {
    Self {
      correct: "You got it!".into(),
      incorrect: "Too bad! The correct answer was: {answer}".into(),
      token_error: "There was an error starting a new quiz session.".into(),
      network_error: "Could not reach the trivia service. Please try again.".into(),
      question_error: "There was an error retrieving the next question".into(),
      exhausted: "No more questions at this difficulty. Try another category or difficulty.".into(),
    }
  }
}

/// Build the config from QUIZ_CONFIG_PATH (if set) plus env overrides.
/// Parse or IO errors are logged and the defaults are used instead.
pub fn load_config_from_env() -> QuizConfig {
  let mut cfg = std::env::var("QUIZ_CONFIG_PATH")
    .ok()
    .and_then(|path| read_config(&path))
    .unwrap_or_default();

  if let Ok(url) = std::env::var("TRIVIA_BASE_URL") {
    if !url.trim().is_empty() {
      cfg.api.base_url = url;
    }
  }
  if cfg.defaults.question_count == 0 || cfg.defaults.question_count > MAX_QUESTION_COUNT {
    warn!(
      target: "trivia_quiz",
      question_count = cfg.defaults.question_count,
      "Default question count out of range; clamping"
    );
  }
  cfg
}

fn read_config(path: &str) -> Option<QuizConfig> {
  match std::fs::read_to_string(path) {
    Ok(s) => match parse_config(&s) {
      Ok(cfg) => {
        info!(target: "trivia_quiz", %path, "Loaded quiz config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "trivia_quiz", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "trivia_quiz", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

pub fn parse_config(s: &str) -> Result<QuizConfig, toml::de::Error> {
  toml::from_str::<QuizConfig>(s)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_document_gives_defaults() {
    let cfg = parse_config("").expect("empty toml");
    assert_eq!(cfg.api.base_url, DEFAULT_BASE_URL);
    assert_eq!(cfg.defaults.to_options(), QuizOptions::default());
    assert_eq!(cfg.messages.correct, "You got it!");
  }

  #[test]
  fn partial_sections_keep_other_defaults() {
    let cfg = parse_config(
      r#"
      [defaults]
      difficulty = "hard"
      question_count = 500

      [messages]
      correct = "Yes!"
      "#,
    )
    .expect("toml");
    let opts = cfg.defaults.to_options();
    assert_eq!(opts.difficulty, Difficulty::Hard);
    assert_eq!(opts.question_count, MAX_QUESTION_COUNT);
    assert_eq!(opts.category, 15);
    assert_eq!(cfg.messages.correct, "Yes!");
    assert!(cfg.messages.incorrect.contains("{answer}"));
    assert_eq!(cfg.retry.max_attempts, 3);
    assert_eq!(cfg.sessions.idle_timeout(), Duration::from_secs(1800));
  }

  #[test]
  fn sessions_section_overrides_limits() {
    let cfg = parse_config("[sessions]\nidle_timeout_secs = 5\nsweep_interval_secs = 0\nmax_sessions = 2").expect("toml");
    assert_eq!(cfg.sessions.idle_timeout(), Duration::from_secs(5));
    assert_eq!(cfg.sessions.sweep_interval(), Duration::from_secs(1));
    assert_eq!(cfg.sessions.max_sessions, 2);
  }

  #[test]
  fn bad_difficulty_is_a_parse_error() {
    assert!(parse_config("[defaults]\ndifficulty = \"insane\"").is_err());
  }
}
