//! HTTP endpoint handlers. These are thin wrappers that forward to the quiz controller.
//! Each handler is instrumented and logs the session id and the transition outcome.

use std::sync::Arc;

use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument, warn};

use crate::protocol::*;
use crate::quiz::{Action, Outcome, QuizController};
use crate::state::AppState;

/// Handler-level failures; quiz/provider failures travel inside `Outcome` instead.
#[derive(Debug)]
pub enum ApiError {
  UnknownSession(String),
  BadRequest(String),
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match self {
      ApiError::UnknownSession(id) => (StatusCode::NOT_FOUND, format!("Unknown session: {}", id)),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
    };
    (status, Json(ErrorOut { message })).into_response()
  }
}

async fn session(state: &AppState, id: &str) -> Result<Arc<QuizController>, ApiError> {
  state.get_session(id).await.ok_or_else(|| {
    warn!(target: "quiz", session = %id, "Unknown session requested");
    ApiError::UnknownSession(id.to_string())
  })
}

async fn act(state: &AppState, id: &str, action: Action) -> Result<Json<ActionOut>, ApiError> {
  let ctl = session(state, id).await?;
  let outcome = ctl.dispatch(action).await;
  log_outcome(id, &outcome);
  Ok(Json(ActionOut { outcome, view: ctl.view().await }))
}

fn log_outcome(id: &str, outcome: &Outcome) {
  match outcome {
    Outcome::Advanced => info!(target: "quiz", session = %id, "Action applied"),
    Outcome::Rejected { reason } => info!(target: "quiz", session = %id, %reason, "Action rejected"),
    Outcome::Busy => info!(target: "quiz", session = %id, "Action rejected: fetch in flight"),
    Outcome::Failed { error } => warn!(target: "quiz", session = %id, kind = ?error.kind, "Action failed"),
  }
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_create_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let (session_id, ctl, bootstrap) = state.create_session().await;
  let view = ctl.view().await;
  (StatusCode::CREATED, Json(SessionOut { session_id, bootstrap, view }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_view(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<QuizView>, ApiError> {
  let ctl = session(&state, &id).await?;
  Ok(Json(ctl.view().await))
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
  if state.remove_session(&id).await {
    info!(target: "quiz", session = %id, "Session removed");
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(ApiError::UnknownSession(id))
  }
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_set_options(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<OptionsIn>,
) -> Result<Json<ActionOut>, ApiError> {
  let change = body.into_change().map_err(ApiError::BadRequest)?;
  act(&state, &id, Action::SetOptions(change)).await
}

#[instrument(level = "info", skip(state))]
pub async fn http_start(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<ActionOut>, ApiError> {
  act(&state, &id, Action::Start).await
}

#[instrument(level = "info", skip(state, body), fields(choice = ?body.choice))]
pub async fn http_submit_answer(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<AnswerIn>,
) -> Result<Json<ActionOut>, ApiError> {
  let action = body.into_action().map_err(ApiError::BadRequest)?;
  act(&state, &id, action).await
}

#[instrument(level = "info", skip(state))]
pub async fn http_continue(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<ActionOut>, ApiError> {
  act(&state, &id, Action::Continue).await
}
