//! Open Trivia DB client: session token, category list, and single multiple-choice questions.
//!
//! The client owns the session token. Calls are instrumented and log endpoint,
//! latency and response codes; the token itself is only logged truncated.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::config::RetryCfg;
use crate::domain::{decorate, Category, Question, QuizOptions, RawQuestion};
use crate::error::TriviaError;
use crate::retry::retry_async;
use crate::util::trunc_for_log;

pub type SessionToken = String;

const TOKEN_PATH: &str = "/api_token.php";
const CATEGORY_PATH: &str = "/api_category.php";
const QUESTION_PATH: &str = "/api.php";

/// The three provider calls the quiz controller depends on.
#[async_trait]
pub trait TriviaApi: Send + Sync {
  /// Request a fresh session token and hold on to it. Prior token is kept on failure.
  async fn request_session_token(&self) -> Result<SessionToken, TriviaError>;
  async fn fetch_categories(&self) -> Result<Vec<Category>, TriviaError>;
  /// One multiple-choice question for the given category/difficulty, scoped to the held token.
  async fn fetch_question(&self, options: &QuizOptions) -> Result<Question, TriviaError>;
  async fn session_token(&self) -> Option<SessionToken>;
}

#[derive(Deserialize)]
struct TokenResponse {
  #[serde(default)]
  response_code: Option<i64>,
  #[serde(default)]
  token: Option<String>,
}

#[derive(Deserialize)]
struct CategoryResponse {
  trivia_categories: Vec<Category>,
}

#[derive(Deserialize)]
struct QuestionResponse {
  response_code: i64,
  #[serde(default)]
  results: Vec<RawQuestion>,
}

/// reqwest-backed implementation of `TriviaApi`.
pub struct OpenTrivia {
  client: reqwest::Client,
  base_url: String,
  retry: RetryCfg,
  token: RwLock<Option<SessionToken>>,
}

impl OpenTrivia {
  /// Sessions share one connection pool: the caller builds the reqwest client once.
  pub fn with_client(client: reqwest::Client, base_url: &str, retry: RetryCfg) -> Self {
    Self {
      client,
      base_url: base_url.trim_end_matches('/').to_string(),
      retry,
      token: RwLock::new(None),
    }
  }

  pub fn token_url(&self) -> String {
    format!("{}{}?command=request", self.base_url, TOKEN_PATH)
  }

  pub fn category_url(&self) -> String {
    format!("{}{}", self.base_url, CATEGORY_PATH)
  }

  pub fn question_url(&self) -> String {
    format!("{}{}", self.base_url, QUESTION_PATH)
  }

  /// GET the URL and return the body text; any transport failure or non-2xx status is `Network`.
  async fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<String, TriviaError> {
    retry_async(&self.retry, TriviaError::is_transient, move || async move {
      let res = self
        .client
        .get(url)
        .query(query)
        .header(USER_AGENT, "trivia-quiz/0.1")
        .send()
        .await
        .map_err(|e| TriviaError::Network(e.to_string()))?;

      let status = res.status();
      if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        let detail = trunc_for_log(&body, 200);
        return Err(TriviaError::Network(format!("HTTP {}: {}", status, detail)));
      }
      res.text().await.map_err(|e| TriviaError::Network(e.to_string()))
    })
    .await
  }
}

#[async_trait]
impl TriviaApi for OpenTrivia {
  #[instrument(level = "info", skip(self))]
  async fn request_session_token(&self) -> Result<SessionToken, TriviaError> {
    let t0 = Instant::now();
    let body = self.get_text(&self.token_url(), &[]).await?;
    let token = parse_token_response(&body)?;
    *self.token.write().await = Some(token.clone());
    info!(
      target: "trivia",
      token = %trunc_for_log(&token, 8),
      elapsed_ms = t0.elapsed().as_millis() as u64,
      "Session token refreshed"
    );
    Ok(token)
  }

  #[instrument(level = "info", skip(self))]
  async fn fetch_categories(&self) -> Result<Vec<Category>, TriviaError> {
    let t0 = Instant::now();
    let body = self.get_text(&self.category_url(), &[]).await?;
    let categories = parse_category_response(&body)?;
    info!(
      target: "trivia",
      count = categories.len(),
      elapsed_ms = t0.elapsed().as_millis() as u64,
      "Categories loaded"
    );
    Ok(categories)
  }

  #[instrument(
    level = "info",
    skip(self),
    fields(category = options.category, difficulty = %options.difficulty)
  )]
  async fn fetch_question(&self, options: &QuizOptions) -> Result<Question, TriviaError> {
    let t0 = Instant::now();
    let token = self.token.read().await.clone();
    let query = question_query(options, token.as_deref());
    let body = self.get_text(&self.question_url(), &query).await?;
    match parse_question_response(&body) {
      Ok(q) => {
        debug!(
          target: "trivia",
          answers = q.answers.len(),
          elapsed_ms = t0.elapsed().as_millis() as u64,
          "Question fetched"
        );
        Ok(q)
      }
      Err(e) => {
        warn!(target: "trivia", error = %e, body = %trunc_for_log(&body, 200), "Question response rejected");
        Err(e)
      }
    }
  }

  async fn session_token(&self) -> Option<SessionToken> {
    self.token.read().await.clone()
  }
}

/// Query for exactly one multiple-choice question. `token` is omitted until one is held.
pub fn question_query(options: &QuizOptions, token: Option<&str>) -> Vec<(&'static str, String)> {
  let mut q = vec![
    ("type", "multiple".to_string()),
    ("amount", "1".to_string()),
    ("category", options.category.to_string()),
    ("difficulty", options.difficulty.as_str().to_string()),
  ];
  if let Some(t) = token {
    q.push(("token", t.to_string()));
  }
  q
}

pub fn parse_token_response(body: &str) -> Result<SessionToken, TriviaError> {
  let parsed: TokenResponse =
    serde_json::from_str(body).map_err(|e| TriviaError::Token(format!("invalid JSON: {}", e)))?;
  if let Some(code) = parsed.response_code {
    if code != 0 {
      return Err(TriviaError::Token(format!("response_code={}", code)));
    }
  }
  match parsed.token {
    Some(t) if !t.trim().is_empty() => Ok(t),
    _ => Err(TriviaError::Token("missing token field".into())),
  }
}

pub fn parse_category_response(body: &str) -> Result<Vec<Category>, TriviaError> {
  serde_json::from_str::<CategoryResponse>(body)
    .map(|r| r.trivia_categories)
    .map_err(|e| TriviaError::Network(format!("malformed category list: {}", e)))
}

pub fn parse_question_response(body: &str) -> Result<Question, TriviaError> {
  let parsed: QuestionResponse =
    serde_json::from_str(body).map_err(|e| TriviaError::MalformedQuestion(e.to_string()))?;
  if parsed.response_code != 0 {
    return Err(TriviaError::Exhausted { response_code: parsed.response_code });
  }
  parsed
    .results
    .into_iter()
    .next()
    .map(decorate)
    .ok_or(TriviaError::Exhausted { response_code: parsed.response_code })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::Difficulty;

  #[test]
  fn token_is_read_from_body() {
    let t = parse_token_response(r#"{"response_code":0,"response_message":"Token Generated Successfully!","token":"abc123"}"#);
    assert_eq!(t, Ok("abc123".to_string()));
  }

  #[test]
  fn missing_token_is_token_error() {
    let e = parse_token_response(r#"{"response_code":0}"#).unwrap_err();
    assert!(matches!(e, TriviaError::Token(_)));
    let e = parse_token_response("<html>").unwrap_err();
    assert!(matches!(e, TriviaError::Token(_)));
  }

  #[test]
  fn categories_parse_and_malformed_is_network() {
    let c = parse_category_response(r#"{"trivia_categories":[{"id":9,"name":"General Knowledge"},{"id":15,"name":"Entertainment: Video Games"}]}"#)
      .expect("categories");
    assert_eq!(c.len(), 2);
    assert_eq!(c[1], Category { id: 15, name: "Entertainment: Video Games".into() });
    assert!(matches!(parse_category_response("{}"), Err(TriviaError::Network(_))));
  }

  #[test]
  fn question_is_decorated() {
    let body = r#"{"response_code":0,"results":[{"category":"Geography","type":"multiple","difficulty":"easy",
      "question":"Capital of England?","correct_answer":"London","incorrect_answers":["Paris","Rome","Washington DC"]}]}"#;
    let q = parse_question_response(body).expect("question");
    assert_eq!(q.answers, vec!["Paris", "Rome", "Washington DC", "London"]);
    assert_eq!(q.correct_answer, "London");
  }

  #[test]
  fn empty_results_or_nonzero_code_is_exhausted() {
    assert_eq!(
      parse_question_response(r#"{"response_code":0,"results":[]}"#),
      Err(TriviaError::Exhausted { response_code: 0 })
    );
    assert_eq!(
      parse_question_response(r#"{"response_code":4,"results":[]}"#),
      Err(TriviaError::Exhausted { response_code: 4 })
    );
  }

  #[test]
  fn missing_fields_are_malformed() {
    let body = r#"{"response_code":0,"results":[{"question":"no answers here"}]}"#;
    assert!(matches!(parse_question_response(body), Err(TriviaError::MalformedQuestion(_))));
  }

  #[test]
  fn query_carries_filters_and_token() {
    let opts = QuizOptions { category: 22, difficulty: Difficulty::Hard, question_count: 3 };
    let q = question_query(&opts, Some("tok"));
    assert!(q.contains(&("type", "multiple".to_string())));
    assert!(q.contains(&("amount", "1".to_string())));
    assert!(q.contains(&("category", "22".to_string())));
    assert!(q.contains(&("difficulty", "hard".to_string())));
    assert!(q.contains(&("token", "tok".to_string())));
    assert!(!question_query(&opts, None).iter().any(|(k, _)| *k == "token"));
  }

  #[test]
  fn urls_join_without_double_slash() {
    let c = OpenTrivia::with_client(reqwest::Client::new(), "https://opentdb.com/", RetryCfg::default());
    assert_eq!(c.token_url(), "https://opentdb.com/api_token.php?command=request");
    assert_eq!(c.category_url(), "https://opentdb.com/api_category.php");
    assert_eq!(c.question_url(), "https://opentdb.com/api.php");
  }

  /// Local stand-in for the provider. The first token request succeeds, later ones return
  /// no token; the category endpoint always fails with 500; the question endpoint
  /// records the query it was called with.
  mod local_provider {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use axum::extract::{Query, State};
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    #[derive(Default)]
    pub struct Hits {
      pub token: AtomicUsize,
      pub category: AtomicUsize,
      pub question_query: Mutex<Option<HashMap<String, String>>>,
    }

    async fn token(State(hits): State<Arc<Hits>>) -> Json<Value> {
      if hits.token.fetch_add(1, Ordering::SeqCst) == 0 {
        Json(json!({ "response_code": 0, "token": "T1" }))
      } else {
        Json(json!({ "response_code": 0 }))
      }
    }

    async fn category(State(hits): State<Arc<Hits>>) -> (StatusCode, &'static str) {
      hits.category.fetch_add(1, Ordering::SeqCst);
      (StatusCode::INTERNAL_SERVER_ERROR, "upstream down")
    }

    async fn question(
      State(hits): State<Arc<Hits>>,
      Query(query): Query<HashMap<String, String>>,
    ) -> Json<Value> {
      *hits.question_query.lock().unwrap() = Some(query);
      Json(json!({
        "response_code": 0,
        "results": [{
          "question": "Capital of England?",
          "correct_answer": "London",
          "incorrect_answers": ["Paris", "Rome", "Washington DC"]
        }]
      }))
    }

    /// Serve on an ephemeral port and return the base URL.
    pub async fn spawn() -> (String, Arc<Hits>) {
      let hits = Arc::new(Hits::default());
      let app = Router::new()
        .route("/api_token.php", get(token))
        .route("/api_category.php", get(category))
        .route("/api.php", get(question))
        .with_state(hits.clone());
      let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
      let addr = listener.local_addr().unwrap();
      tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
      });
      (format!("http://{}", addr), hits)
    }
  }

  fn fast_retry() -> RetryCfg {
    RetryCfg { max_attempts: 2, base_backoff_ms: 1, max_backoff_ms: 2, jitter_ms: 0 }
  }

  #[tokio::test]
  async fn failed_token_refresh_keeps_previous_token() {
    let (base, hits) = local_provider::spawn().await;
    let api = OpenTrivia::with_client(reqwest::Client::new(), &base, fast_retry());

    assert_eq!(api.request_session_token().await, Ok("T1".to_string()));
    let e = api.request_session_token().await.unwrap_err();
    assert!(matches!(e, TriviaError::Token(_)));
    assert_eq!(api.session_token().await.as_deref(), Some("T1"));
    // A token error is not a transport error: no retry.
    assert_eq!(hits.token.load(std::sync::atomic::Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn server_error_is_network_and_retry_is_bounded() {
    let (base, hits) = local_provider::spawn().await;
    let api = OpenTrivia::with_client(reqwest::Client::new(), &base, fast_retry());

    match api.fetch_categories().await {
      Err(TriviaError::Network(msg)) => assert!(msg.contains("500"), "{}", msg),
      other => panic!("expected network error, got {:?}", other),
    }
    assert_eq!(hits.category.load(std::sync::atomic::Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn question_request_carries_held_token_and_filters() {
    let (base, hits) = local_provider::spawn().await;
    let api = OpenTrivia::with_client(reqwest::Client::new(), &base, fast_retry());
    let opts = QuizOptions { category: 22, difficulty: Difficulty::Medium, question_count: 5 };

    api.fetch_question(&opts).await.expect("question without token");
    let query = hits.question_query.lock().unwrap().take().unwrap();
    assert!(!query.contains_key("token"));

    api.request_session_token().await.expect("token");
    let q = api.fetch_question(&opts).await.expect("question with token");
    assert_eq!(q.correct_answer, "London");
    let query = hits.question_query.lock().unwrap().take().unwrap();
    assert_eq!(query.get("token").map(String::as_str), Some("T1"));
    assert_eq!(query.get("category").map(String::as_str), Some("22"));
    assert_eq!(query.get("difficulty").map(String::as_str), Some("medium"));
    assert_eq!(query.get("amount").map(String::as_str), Some("1"));
    assert_eq!(query.get("type").map(String::as_str), Some("multiple"));
  }
}
