//! Domain models: provider question shape, normalized questions, quiz options and quiz state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Provider-side question as returned by `api.php`. Extra fields are ignored.
#[derive(Clone, Debug, Deserialize)]
pub struct RawQuestion {
  pub question: String,
  pub incorrect_answers: Vec<String>,
  pub correct_answer: String,
}

/// Normalized question owned by the question store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Question {
  pub text: String,
  /// Incorrect answers in provider order, correct answer last. Never shuffled.
  pub answers: Vec<String>,
  pub correct_answer: String,
}

/// Turn a provider question into our `Question`.
/// Text is kept verbatim: HTML entities emitted by the provider are not decoded.
pub fn decorate(raw: RawQuestion) -> Question {
  let mut answers = raw.incorrect_answers;
  answers.push(raw.correct_answer.clone());
  Question {
    text: raw.question,
    answers,
    correct_answer: raw.correct_answer,
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
  pub id: u32,
  pub name: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
  #[default]
  Easy,
  Medium,
  Hard,
}

impl Difficulty {
  pub fn as_str(&self) -> &'static str {
    match self {
      Difficulty::Easy => "easy",
      Difficulty::Medium => "medium",
      Difficulty::Hard => "hard",
    }
  }
}

impl fmt::Display for Difficulty {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Difficulty {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "easy" => Ok(Difficulty::Easy),
      "medium" => Ok(Difficulty::Medium),
      "hard" => Ok(Difficulty::Hard),
      other => Err(format!("unknown difficulty '{}'", other)),
    }
  }
}

/// The provider refuses `amount` above this value.
pub const MAX_QUESTION_COUNT: u32 = 50;

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuizOptions {
  pub category: u32,
  pub difficulty: Difficulty,
  pub question_count: u32,
}

impl Default for QuizOptions {
  fn default() -> Self {
    Self { category: 15, difficulty: Difficulty::Easy, question_count: 10 }
  }
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Page {
  #[default]
  Intro,
  Question,
  Answer,
  Outro,
}

impl fmt::Display for Page {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Page::Intro => "intro",
      Page::Question => "question",
      Page::Answer => "answer",
      Page::Outro => "outro",
    };
    f.write_str(s)
  }
}

/// Where the player is in the quiz.
///
/// `user_answers.len() == index + 1` once the current question is answered,
/// `== index` while awaiting the answer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuizState {
  pub page: Page,
  pub current_question_index: Option<usize>,
  pub user_answers: Vec<String>,
  pub feedback: Option<String>,
  /// Set while a fetch is outstanding; triggering actions are refused meanwhile.
  pub busy: bool,
}

impl QuizState {
  /// Fresh state for a new play-through, positioned on the first question.
  pub fn new_game() -> Self {
    Self {
      page: Page::Question,
      current_question_index: Some(0),
      ..Self::default()
    }
  }
}

/// Append-only during a game; cleared wholesale on reset.
#[derive(Clone, Debug, Default)]
pub struct QuestionStore {
  questions: Vec<Question>,
}

impl QuestionStore {
  pub fn push(&mut self, q: Question) {
    self.questions.push(q);
  }

  pub fn get(&self, index: usize) -> Option<&Question> {
    self.questions.get(index)
  }

  pub fn len(&self) -> usize {
    self.questions.len()
  }

  pub fn clear(&mut self) {
    self.questions.clear();
  }
}

/// 1-based progress through the configured number of questions.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct Progress {
  pub current: usize,
  pub total: usize,
}

/// Final result, captured right before the outro reset wipes the live state.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct QuizSummary {
  pub score: usize,
  pub total: usize,
}

/// Count of answers matching the stored question's correct answer.
pub fn score(state: &QuizState, store: &QuestionStore) -> usize {
  state
    .user_answers
    .iter()
    .enumerate()
    .filter(|(i, answer)| store.get(*i).map(|q| &q.correct_answer == *answer).unwrap_or(false))
    .count()
}

pub fn progress(state: &QuizState, options: &QuizOptions) -> Progress {
  Progress {
    current: state.current_question_index.map(|i| i + 1).unwrap_or(0),
    total: options.question_count as usize,
  }
}
