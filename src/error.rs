//! Error taxonomy for trivia provider calls and the error record kept by the controller.

use serde::Serialize;
use thiserror::Error;

use crate::config::Messages;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TriviaError {
  /// Token endpoint answered without a usable token.
  #[error("token endpoint returned no usable token: {0}")]
  Token(String),
  /// DNS, timeout, connection or non-2xx failures on any endpoint.
  #[error("network error: {0}")]
  Network(String),
  /// `response_code != 0` or an empty `results` array: pool exhausted for this category/difficulty.
  #[error("no questions available (response_code={response_code})")]
  Exhausted { response_code: i64 },
  #[error("malformed question response: {0}")]
  MalformedQuestion(String),
}

/// The three kinds surfaced to the rendering layer.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  Token,
  Network,
  QuestionFetch,
}

impl TriviaError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      TriviaError::Token(_) => ErrorKind::Token,
      TriviaError::Network(_) => ErrorKind::Network,
      TriviaError::Exhausted { .. } | TriviaError::MalformedQuestion(_) => ErrorKind::QuestionFetch,
    }
  }

  /// Only transport failures are worth retrying; an exhausted pool stays exhausted.
  pub fn is_transient(&self) -> bool {
    matches!(self, TriviaError::Network(_))
  }

  pub fn user_message(&self, messages: &Messages) -> String {
    match self {
      TriviaError::Token(_) => messages.token_error.clone(),
      TriviaError::Network(_) => messages.network_error.clone(),
      TriviaError::Exhausted { .. } => messages.exhausted.clone(),
      TriviaError::MalformedQuestion(_) => messages.question_error.clone(),
    }
  }

  pub fn to_record(&self, messages: &Messages) -> ErrorRecord {
    ErrorRecord {
      kind: self.kind(),
      message: self.user_message(messages),
      detail: self.to_string(),
    }
  }
}

/// What the controller remembers about the last failed fetch.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ErrorRecord {
  pub kind: ErrorKind,
  pub message: String,
  pub detail: String,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn kinds_follow_taxonomy() {
    assert_eq!(TriviaError::Token("x".into()).kind(), ErrorKind::Token);
    assert_eq!(TriviaError::Network("x".into()).kind(), ErrorKind::Network);
    assert_eq!(TriviaError::Exhausted { response_code: 1 }.kind(), ErrorKind::QuestionFetch);
    assert_eq!(TriviaError::MalformedQuestion("x".into()).kind(), ErrorKind::QuestionFetch);
  }

  #[test]
  fn exhausted_is_not_transient() {
    assert!(TriviaError::Network("timeout".into()).is_transient());
    assert!(!TriviaError::Exhausted { response_code: 4 }.is_transient());
    assert!(!TriviaError::Token("missing".into()).is_transient());
  }

  #[test]
  fn exhausted_message_differs_from_network_message() {
    let m = Messages::default();
    let a = TriviaError::Exhausted { response_code: 1 }.to_record(&m);
    let b = TriviaError::Network("dns".into()).to_record(&m);
    assert_ne!(a.message, b.message);
    assert!(b.detail.contains("dns"));
  }
}
