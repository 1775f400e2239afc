//! Quiz controller: the intro → question → answer → outro state machine.
//!
//! The controller owns the quiz state, the question store and the chosen options,
//! and sequences the provider calls behind them. Rules:
//!   - at most one fetch is in flight; triggering actions arriving meanwhile get `Busy`
//!   - page and question index only move after a fetch succeeded
//!   - every provider error is caught here, logged, and kept as `last_error`
//!
//! The lock is never held across a provider call: a transition marks `busy`,
//! releases the lock, awaits the call, then re-acquires the lock to commit.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

use crate::config::Messages;
use crate::domain::{
  progress, score, Category, Difficulty, Page, Question, QuestionStore, QuizOptions, QuizState,
  QuizSummary, MAX_QUESTION_COUNT,
};
use crate::error::{ErrorRecord, TriviaError};
use crate::protocol::{QuestionOut, QuizView};
use crate::trivia::TriviaApi;
use crate::util::fill_template;

/// Result of feeding one signal into the state machine.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
  Advanced,
  /// Signal not valid in the current page; nothing changed.
  Rejected { reason: String },
  /// A fetch is still outstanding; nothing changed.
  Busy,
  /// The provider call failed; page and index are unchanged.
  Failed { error: ErrorRecord },
}

/// Option-change signal. Absent fields keep their current value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OptionChange {
  pub category: Option<u32>,
  pub difficulty: Option<Difficulty>,
  pub question_count: Option<u32>,
}

/// Signals accepted from the rendering surface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
  SetOptions(OptionChange),
  Start,
  SubmitAnswer(String),
  /// 0-based position in the offered answers.
  SubmitChoice(usize),
  Continue,
}

struct Inner {
  state: QuizState,
  store: QuestionStore,
  options: QuizOptions,
  categories: Vec<Category>,
  last_error: Option<ErrorRecord>,
  summary: Option<QuizSummary>,
}

pub struct QuizController {
  api: Arc<dyn TriviaApi>,
  messages: Messages,
  inner: RwLock<Inner>,
}

fn rejected(reason: impl Into<String>) -> Outcome {
  Outcome::Rejected { reason: reason.into() }
}

impl QuizController {
  pub fn new(api: Arc<dyn TriviaApi>, options: QuizOptions, messages: Messages) -> Self {
    Self {
      api,
      messages,
      inner: RwLock::new(Inner {
        state: QuizState::default(),
        store: QuestionStore::default(),
        options,
        categories: Vec::new(),
        last_error: None,
        summary: None,
      }),
    }
  }

  /// Page-load sequence: session token first, then the category list for the selector.
  /// Failures are recorded; the controller stays usable on the intro page.
  #[instrument(level = "info", skip(self))]
  pub async fn bootstrap(&self) -> Outcome {
    {
      let mut g = self.inner.write().await;
      if g.state.busy {
        return Outcome::Busy;
      }
      g.state.busy = true;
    }

    let token = self.api.request_session_token().await;
    let categories = match &token {
      Ok(_) => Some(self.api.fetch_categories().await),
      Err(_) => None,
    };

    let mut g = self.inner.write().await;
    g.state.busy = false;
    if let Err(e) = token {
      return self.fail(&mut g, e, "bootstrap");
    }
    match categories {
      Some(Ok(list)) => {
        info!(target: "quiz", categories = list.len(), "Quiz bootstrapped");
        g.categories = list;
        g.last_error = None;
        Outcome::Advanced
      }
      Some(Err(e)) => self.fail(&mut g, e, "bootstrap"),
      None => Outcome::Advanced,
    }
  }

  /// Run an action on its own task so a dropped caller cannot leave the controller busy.
  pub async fn dispatch(self: &Arc<Self>, action: Action) -> Outcome {
    let ctl = Arc::clone(self);
    match tokio::spawn(async move { ctl.apply(action).await }).await {
      Ok(outcome) => outcome,
      Err(e) => {
        error!(target: "quiz", error = %e, "Quiz action task failed");
        rejected("internal error while processing the action")
      }
    }
  }

  pub async fn apply(&self, action: Action) -> Outcome {
    match action {
      Action::SetOptions(change) => self.set_options(change).await,
      Action::Start => self.start().await,
      Action::SubmitAnswer(answer) => self.submit_answer(&answer).await,
      Action::SubmitChoice(choice) => self.submit_choice(choice).await,
      Action::Continue => self.continue_quiz().await,
    }
  }

  /// Only honored on the intro page.
  #[instrument(level = "debug", skip(self))]
  pub async fn set_options(&self, change: OptionChange) -> Outcome {
    let mut g = self.inner.write().await;
    if g.state.busy {
      return Outcome::Busy;
    }
    if g.state.page != Page::Intro {
      return rejected(format!("options can only be changed on the intro page (page={})", g.state.page));
    }
    if let Some(n) = change.question_count {
      if n == 0 || n > MAX_QUESTION_COUNT {
        return rejected(format!("question count must be between 1 and {}", MAX_QUESTION_COUNT));
      }
    }
    if let Some(id) = change.category {
      if !g.categories.is_empty() && !g.categories.iter().any(|c| c.id == id) {
        return rejected(format!("unknown category {}", id));
      }
    }

    let mut opts = g.options;
    if let Some(c) = change.category {
      opts.category = c;
    }
    if let Some(d) = change.difficulty {
      opts.difficulty = d;
    }
    if let Some(n) = change.question_count {
      opts.question_count = n;
    }
    g.options = opts;
    debug!(
      target: "quiz",
      category = opts.category,
      difficulty = %opts.difficulty,
      question_count = opts.question_count,
      "Options updated"
    );
    Outcome::Advanced
  }

  /// intro/outro → question. The first question is fetched before the page changes.
  #[instrument(level = "info", skip(self))]
  pub async fn start(&self) -> Outcome {
    let options = {
      let mut g = self.inner.write().await;
      if g.state.busy {
        return Outcome::Busy;
      }
      match g.state.page {
        Page::Intro | Page::Outro => {}
        p => return rejected(format!("start is not valid on the {} page", p)),
      }
      g.state.busy = true;
      g.options
    };

    let fetched = self.api.fetch_question(&options).await;

    let mut g = self.inner.write().await;
    g.state.busy = false;
    match fetched {
      Ok(q) => {
        g.store.clear();
        g.state = QuizState::new_game();
        g.store.push(q);
        g.last_error = None;
        g.summary = None;
        info!(
          target: "quiz",
          total = options.question_count,
          difficulty = %options.difficulty,
          category = options.category,
          "Quiz started"
        );
        Outcome::Advanced
      }
      Err(e) => self.fail(&mut g, e, "start"),
    }
  }

  /// question → answer. No network involved.
  /// The answer must be one of the offered options, byte for byte.
  #[instrument(level = "info", skip(self, answer), fields(answer_len = answer.len()))]
  pub async fn submit_answer(&self, answer: &str) -> Outcome {
    let mut g = self.inner.write().await;
    let (idx, question) = match self.awaiting_answer(&g) {
      Ok(found) => found,
      Err(outcome) => return outcome,
    };
    if answer.trim().is_empty() {
      return rejected("no answer selected");
    }
    if !question.answers.iter().any(|a| a == answer) {
      return rejected("answer is not one of the offered options");
    }
    self.record_answer(&mut g, idx, &question, answer.to_string())
  }

  /// question → answer, picking the offered option at `choice` (0-based, display order).
  /// Lets a client answer without echoing provider text back.
  #[instrument(level = "info", skip(self))]
  pub async fn submit_choice(&self, choice: usize) -> Outcome {
    let mut g = self.inner.write().await;
    let (idx, question) = match self.awaiting_answer(&g) {
      Ok(found) => found,
      Err(outcome) => return outcome,
    };
    let Some(answer) = question.answers.get(choice).cloned() else {
      return rejected(format!("choice {} is out of range (0..{})", choice, question.answers.len()));
    };
    self.record_answer(&mut g, idx, &question, answer)
  }

  /// Index and question of the current, not yet answered, question.
  fn awaiting_answer(&self, g: &Inner) -> Result<(usize, Question), Outcome> {
    if g.state.busy {
      return Err(Outcome::Busy);
    }
    if g.state.page != Page::Question {
      return Err(rejected(format!("submit is not valid on the {} page", g.state.page)));
    }
    let Some(idx) = g.state.current_question_index else {
      return Err(rejected("no current question"));
    };
    if g.state.user_answers.len() != idx {
      return Err(rejected("current question already answered"));
    }
    match g.store.get(idx) {
      Some(question) => Ok((idx, question.clone())),
      None => Err(rejected("no current question")),
    }
  }

  fn record_answer(&self, g: &mut Inner, idx: usize, question: &Question, answer: String) -> Outcome {
    let correct = answer == question.correct_answer;
    let feedback = if correct {
      self.messages.correct.clone()
    } else {
      fill_template(&self.messages.incorrect, &[("answer", question.correct_answer.as_str())])
    };
    g.state.user_answers.push(answer);
    g.state.feedback = Some(feedback);
    g.state.page = Page::Answer;
    info!(
      target: "quiz",
      index = idx,
      %correct,
      score = score(&g.state, &g.store),
      "Answer submitted"
    );
    Outcome::Advanced
  }

  /// answer → question (fetch next) or, after the last question, answer → outro (refresh token).
  #[instrument(level = "info", skip(self))]
  pub async fn continue_quiz(&self) -> Outcome {
    let (idx, options) = {
      let mut g = self.inner.write().await;
      if g.state.busy {
        return Outcome::Busy;
      }
      if g.state.page != Page::Answer {
        return rejected(format!("continue is not valid on the {} page", g.state.page));
      }
      let Some(idx) = g.state.current_question_index else {
        return rejected("no current question");
      };
      g.state.busy = true;
      (idx, g.options)
    };

    if idx + 1 >= options.question_count as usize {
      self.finish(idx).await
    } else {
      self.advance(idx, &options).await
    }
  }

  async fn advance(&self, idx: usize, options: &QuizOptions) -> Outcome {
    let fetched = self.api.fetch_question(options).await;

    let mut g = self.inner.write().await;
    g.state.busy = false;
    match fetched {
      Ok(q) => {
        g.store.push(q);
        g.state.current_question_index = Some(idx + 1);
        g.state.feedback = None;
        g.state.page = Page::Question;
        g.last_error = None;
        debug!(target: "quiz", index = idx + 1, "Next question ready");
        Outcome::Advanced
      }
      Err(e) => self.fail(&mut g, e, "continue"),
    }
  }

  /// The provider's anti-repetition window is tied to the token, so a new one is needed per play-through.
  async fn finish(&self, idx: usize) -> Outcome {
    let refreshed = self.api.request_session_token().await;

    let mut g = self.inner.write().await;
    g.state.busy = false;
    match refreshed {
      Ok(_) => {
        let summary = QuizSummary { score: score(&g.state, &g.store), total: idx + 1 };
        g.store.clear();
        g.state = QuizState { page: Page::Outro, ..QuizState::default() };
        g.summary = Some(summary);
        g.last_error = None;
        info!(target: "quiz", score = summary.score, total = summary.total, "Quiz finished");
        Outcome::Advanced
      }
      Err(e) => self.fail(&mut g, e, "finish"),
    }
  }

  fn fail(&self, g: &mut Inner, e: TriviaError, step: &'static str) -> Outcome {
    let record = e.to_record(&self.messages);
    match &e {
      TriviaError::Exhausted { .. } => {
        warn!(target: "quiz", %step, page = %g.state.page, error = %e, "Question pool exhausted")
      }
      _ => error!(target: "quiz", %step, page = %g.state.page, error = %e, "Provider call failed"),
    }
    g.last_error = Some(record.clone());
    Outcome::Failed { error: record }
  }

  /// Projection for the rendering surface.
  pub async fn view(&self) -> QuizView {
    let g = self.inner.read().await;
    let page = g.state.page;
    let question = match (page, g.state.current_question_index) {
      (Page::Question, Some(i)) => g.store.get(i).map(QuestionOut::from),
      _ => None,
    };
    QuizView {
      page,
      question,
      progress: progress(&g.state, &g.options),
      score: score(&g.state, &g.store),
      feedback: if page == Page::Answer { g.state.feedback.clone() } else { None },
      summary: if page == Page::Outro { g.summary } else { None },
      options: g.options,
      categories: g.categories.clone(),
      busy: g.state.busy,
      last_error: g.last_error.clone(),
    }
  }
}

#[cfg(test)]
impl QuizController {
  pub async fn score(&self) -> usize {
    let g = self.inner.read().await;
    score(&g.state, &g.store)
  }

  pub async fn progress(&self) -> crate::domain::Progress {
    let g = self.inner.read().await;
    progress(&g.state, &g.options)
  }

  pub async fn state(&self) -> QuizState {
    self.inner.read().await.state.clone()
  }

  pub async fn question_count_in_store(&self) -> usize {
    self.inner.read().await.store.len()
  }
}
