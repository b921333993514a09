//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented; the `Caller` extractor rejects unauthenticated requests.

use std::sync::Arc;
use axum::{extract::{Path, State}, Json, response::IntoResponse};
use tracing::instrument;

use crate::auth::Caller;
use crate::error::AppResult;
use crate::logic;
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(logic::health(&state))
}

#[instrument(level = "info")]
pub async fn http_banner() -> impl IntoResponse {
  Json(logic::banner())
}

// -------- Accounts --------

#[instrument(level = "info", skip(state, body))]
pub async fn http_register_parent(
  State(state): State<Arc<AppState>>,
  Json(body): Json<RegisterParentIn>,
) -> AppResult<Json<AuthOut>> {
  Ok(Json(logic::register_parent(&state, body).await?))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_login_parent(
  State(state): State<Arc<AppState>>,
  Json(body): Json<LoginParentIn>,
) -> AppResult<Json<AuthOut>> {
  Ok(Json(logic::login_parent(&state, body).await?))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_login_child(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ChildLoginIn>,
) -> AppResult<Json<AuthOut>> {
  Ok(Json(logic::login_child(&state, body).await?))
}

// -------- Child profiles --------

#[instrument(level = "info", skip(state, body), fields(caller_id = %caller.id))]
pub async fn http_create_child(
  State(state): State<Arc<AppState>>,
  caller: Caller,
  Json(body): Json<CreateChildIn>,
) -> AppResult<Json<ChildOut>> {
  Ok(Json(logic::create_child(&state, &caller, body).await?))
}

#[instrument(level = "info", skip(state), fields(caller_id = %caller.id))]
pub async fn http_list_children(
  State(state): State<Arc<AppState>>,
  caller: Caller,
) -> AppResult<Json<Vec<ChildOut>>> {
  Ok(Json(logic::list_children(&state, &caller).await?))
}

#[instrument(level = "info", skip(state), fields(caller_id = %caller.id))]
pub async fn http_get_child(
  State(state): State<Arc<AppState>>,
  caller: Caller,
  Path(child_id): Path<String>,
) -> AppResult<Json<ChildOut>> {
  Ok(Json(logic::get_child(&state, &caller, &child_id).await?))
}

#[instrument(level = "info", skip(state), fields(caller_id = %caller.id))]
pub async fn http_delete_child(
  State(state): State<Arc<AppState>>,
  caller: Caller,
  Path(child_id): Path<String>,
) -> AppResult<Json<DeleteChildOut>> {
  Ok(Json(logic::delete_child(&state, &caller, &child_id).await?))
}

// -------- Activities & sessions --------

#[instrument(level = "info", skip(state, body), fields(caller_id = %caller.id, child_id = %body.child_id))]
pub async fn http_math_activities(
  State(state): State<Arc<AppState>>,
  caller: Caller,
  Json(body): Json<ActivityRequestIn>,
) -> AppResult<Json<ActivitiesOut>> {
  Ok(Json(logic::request_activities(&state, &caller, body).await?))
}

#[instrument(level = "info", skip(state, body), fields(caller_id = %caller.id, child_id = %body.child_id))]
pub async fn http_start_session(
  State(state): State<Arc<AppState>>,
  caller: Caller,
  Json(body): Json<StartSessionIn>,
) -> AppResult<Json<StartSessionOut>> {
  Ok(Json(logic::start_session(&state, &caller, body).await?))
}

#[instrument(level = "info", skip(state, body), fields(caller_id = %caller.id, session_id = %body.session_id))]
pub async fn http_complete_session(
  State(state): State<Arc<AppState>>,
  caller: Caller,
  Json(body): Json<CompleteSessionIn>,
) -> AppResult<Json<CompleteSessionOut>> {
  Ok(Json(logic::complete_session(&state, &caller, body).await?))
}

// -------- Progress & dashboard --------

#[instrument(level = "info", skip(state), fields(caller_id = %caller.id))]
pub async fn http_progress(
  State(state): State<Arc<AppState>>,
  caller: Caller,
  Path(child_id): Path<String>,
) -> AppResult<Json<ProgressOut>> {
  Ok(Json(logic::progress_view(&state, &caller, &child_id).await?))
}

#[instrument(level = "info", skip(state), fields(caller_id = %caller.id))]
pub async fn http_parent_dashboard(
  State(state): State<Arc<AppState>>,
  caller: Caller,
  Path(child_id): Path<String>,
) -> AppResult<Json<DashboardOut>> {
  Ok(Json(logic::parent_dashboard(&state, &caller, &child_id).await?))
}
