//! Request-scoped use cases shared by the HTTP handlers.
//!
//! Each function reads a snapshot from the store, runs the pure engine
//! pieces (difficulty, encouragement, progress, lifecycle) and writes the
//! results back record by record. Validation happens before any write.

use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::auth::{hash_password, verify_password, Caller};
use crate::difficulty::{next_difficulty, success_rate};
use crate::domain::{
  Achievement, AchievementKind, ActivityType, ChildProfile, ParentAccount, Role, Session, SkillProgress,
};
use crate::encouragement::{self, SESSION_START};
use crate::error::{AppError, AppResult};
use crate::generator::GenerationRequest;
use crate::lifecycle::{self, Outcome};
use crate::progress;
use crate::protocol::*;
use crate::state::AppState;
use crate::store::SessionQuery;

pub const MIN_CHILD_AGE: i64 = 3;
pub const MAX_CHILD_AGE: i64 = 12;
pub const MIN_PASSWORD_LEN: usize = 6;
pub const DEFAULT_ACTIVITY_COUNT: i64 = 5;
const RECENT_SESSIONS: usize = 10;

// -------- Accounts --------

#[instrument(level = "info", skip(state, body), fields(email = %body.email))]
pub async fn register_parent(state: &AppState, body: RegisterParentIn) -> AppResult<AuthOut> {
  let email = body.email.trim().to_lowercase();
  let name = body.name.trim().to_string();
  if !email.contains('@') {
    return Err(AppError::Validation("email must contain '@'".into()));
  }
  if body.password.chars().count() < MIN_PASSWORD_LEN {
    return Err(AppError::Validation(format!("password must be at least {MIN_PASSWORD_LEN} characters")));
  }
  if name.is_empty() {
    return Err(AppError::Validation("name must not be empty".into()));
  }
  if state.store.find_parent_by_email(&email).await?.is_some() {
    return Err(AppError::Conflict("Email already registered".into()));
  }

  let parent = ParentAccount {
    id: Uuid::new_v4().to_string(),
    email,
    password_hash: hash_password(&body.password)?,
    name,
    created_at: state.clock.now(),
    is_active: true,
  };
  state.store.insert_parent(parent.clone()).await?;
  info!(target: "auth", parent_id = %parent.id, "Parent registered");

  Ok(AuthOut {
    access_token: state.auth.issue(&parent.id, Role::Parent, state.clock.now())?,
    token_type: "bearer",
    role: Role::Parent,
    parent: Some(ParentOut::from(&parent)),
    child: None,
  })
}

#[instrument(level = "info", skip(state, body), fields(email = %body.email))]
pub async fn login_parent(state: &AppState, body: LoginParentIn) -> AppResult<AuthOut> {
  let invalid = || AppError::Unauthorized("Invalid credentials".into());
  let parent = state.store.find_parent_by_email(body.email.trim()).await?.ok_or_else(invalid)?;
  if !parent.is_active || !verify_password(&body.password, &parent.password_hash) {
    return Err(invalid());
  }
  info!(target: "auth", parent_id = %parent.id, "Parent logged in");

  Ok(AuthOut {
    access_token: state.auth.issue(&parent.id, Role::Parent, state.clock.now())?,
    token_type: "bearer",
    role: Role::Parent,
    parent: Some(ParentOut::from(&parent)),
    child: None,
  })
}

#[instrument(level = "info", skip(state, body), fields(child_id = %body.child_id))]
pub async fn login_child(state: &AppState, body: ChildLoginIn) -> AppResult<AuthOut> {
  let invalid = || AppError::Unauthorized("Invalid credentials".into());
  let child = state.store.get_child(&body.child_id).await?.ok_or_else(invalid)?;
  if !child.is_active || child.picture_password_id != body.picture_password_id {
    return Err(invalid());
  }
  let token = state.auth.issue(&child.id, Role::Child, state.clock.now())?;
  let completed = completed_sessions_of(state, &child.id).await?;
  info!(target: "auth", child_id = %child.id, "Child logged in");

  Ok(AuthOut {
    access_token: token,
    token_type: "bearer",
    role: Role::Child,
    parent: None,
    child: Some(child_out(child, &completed)),
  })
}

// -------- Child profiles --------

fn validate_preferences(prefs: &std::collections::BTreeMap<String, serde_json::Value>) -> AppResult<()> {
  for (key, value) in prefs {
    if key.trim().is_empty() {
      return Err(AppError::Validation("preference keys must not be empty".into()));
    }
    if value.is_object() || value.is_array() {
      return Err(AppError::Validation(format!("preference '{key}' must be a scalar value")));
    }
  }
  Ok(())
}

#[instrument(level = "info", skip(state, body), fields(caller_id = %caller.id))]
pub async fn create_child(state: &AppState, caller: &Caller, body: CreateChildIn) -> AppResult<ChildOut> {
  caller.require_parent()?;
  let name = body.name.trim().to_string();
  if name.is_empty() {
    return Err(AppError::Validation("name must not be empty".into()));
  }
  if !(MIN_CHILD_AGE..=MAX_CHILD_AGE).contains(&body.age) {
    return Err(AppError::Validation(format!("age must be between {MIN_CHILD_AGE} and {MAX_CHILD_AGE}")));
  }
  if body.avatar_id.trim().is_empty() || body.picture_password_id.trim().is_empty() {
    return Err(AppError::Validation("avatar_id and picture_password_id are required".into()));
  }
  validate_preferences(&body.preferences)?;

  let now = state.clock.now();
  let child = ChildProfile {
    id: Uuid::new_v4().to_string(),
    parent_id: caller.id.clone(),
    name,
    age: body.age as u8,
    avatar_id: body.avatar_id,
    picture_password_id: body.picture_password_id,
    preferences: body.preferences,
    created_at: now,
    is_active: true,
  };
  state.store.insert_child(child.clone()).await?;
  for skill in ActivityType::STARTER {
    state.store.insert_skill(SkillProgress::new(&child.id, skill, now)).await?;
  }
  info!(target: "progress", child_id = %child.id, age_group = child.age_group(), "Child profile created");
  Ok(child_out(child, &[]))
}

#[instrument(level = "info", skip(state), fields(caller_id = %caller.id))]
pub async fn list_children(state: &AppState, caller: &Caller) -> AppResult<Vec<ChildOut>> {
  caller.require_parent()?;
  let children = state.store.children_of(&caller.id).await?;
  let mut out = Vec::with_capacity(children.len());
  for child in children {
    let completed = completed_sessions_of(state, &child.id).await?;
    out.push(child_out(child, &completed));
  }
  Ok(out)
}

#[instrument(level = "info", skip(state), fields(caller_id = %caller.id))]
pub async fn get_child(state: &AppState, caller: &Caller, child_id: &str) -> AppResult<ChildOut> {
  let child = load_child_for(state, caller, child_id).await?;
  let completed = completed_sessions_of(state, &child.id).await?;
  Ok(child_out(child, &completed))
}

/// Removes the profile and every record that references it.
#[instrument(level = "info", skip(state), fields(caller_id = %caller.id))]
pub async fn delete_child(state: &AppState, caller: &Caller, child_id: &str) -> AppResult<DeleteChildOut> {
  caller.require_parent()?;
  let child = load_child_for(state, caller, child_id).await?;

  let sessions_removed = state.store.delete_sessions_of(&child.id).await?;
  let skills_removed = state.store.delete_skills_of(&child.id).await?;
  let achievements_removed = state.store.delete_achievements_of(&child.id).await?;
  let deleted = state.store.delete_child(&child.id).await?;
  info!(target: "progress", child_id = %child.id, sessions_removed, skills_removed, achievements_removed, "Child profile deleted");

  Ok(DeleteChildOut { deleted, sessions_removed, skills_removed, achievements_removed })
}

// -------- Activities --------

fn parse_activity_type(raw: &str) -> AppResult<ActivityType> {
  raw.parse::<ActivityType>().map_err(AppError::Validation)
}

#[instrument(level = "info", skip(state, body), fields(caller_id = %caller.id, child_id = %body.child_id))]
pub async fn request_activities(
  state: &AppState,
  caller: &Caller,
  body: ActivityRequestIn,
) -> AppResult<ActivitiesOut> {
  let activity_type = match body.activity_type.as_deref() {
    Some(raw) => parse_activity_type(raw)?,
    None => ActivityType::Counting,
  };
  let count = body.count.unwrap_or(DEFAULT_ACTIVITY_COUNT);
  let max = state.engine.max_activity_count as i64;
  if count < 1 || count > max {
    return Err(AppError::Validation(format!("count must be between 1 and {max}")));
  }
  let child = load_child_for(state, caller, &body.child_id).await?;

  let window = SessionQuery::for_child(&child.id).completed().limit(state.engine.activity_window);
  let history = state.store.find_sessions(&window).await?;
  let difficulty = next_difficulty(&history);
  let recent_success_rate = (!history.is_empty()).then(|| success_rate(&history) * 100.0);

  let req = GenerationRequest {
    activity_type,
    difficulty,
    age_group: child.age_group().to_string(),
    count: count as usize,
    recent_success_rate,
  };
  let mut rng = state.random.rng();
  let activities = state.generator.generate(&req, state.clock.now(), &mut rng).await;
  state.store.insert_activities(&activities).await?;

  let encouragement = match history.first() {
    Some(last) => encouragement::message(last.correct_answers, last.total_questions, difficulty, &mut rng),
    None => SESSION_START.to_string(),
  };
  info!(target: "content", child_id = %child.id, %activity_type, difficulty, count = activities.len(), "Activities served");

  Ok(ActivitiesOut { activities, difficulty_level: difficulty, encouragement })
}

// -------- Sessions --------

#[instrument(level = "info", skip(state, body), fields(caller_id = %caller.id, child_id = %body.child_id))]
pub async fn start_session(state: &AppState, caller: &Caller, body: StartSessionIn) -> AppResult<StartSessionOut> {
  let activity_type = parse_activity_type(&body.activity_type)?;
  let child = load_child_for(state, caller, &body.child_id).await?;

  let difficulty = match body.difficulty_level {
    Some(level) => level,
    None => {
      let window = SessionQuery::for_child(&child.id).completed().limit(state.engine.activity_window);
      next_difficulty(&state.store.find_sessions(&window).await?) as i64
    }
  };
  let session = lifecycle::start(&child.id, activity_type, difficulty, state.clock.now());
  state.store.insert_session(session.clone()).await?;
  info!(target: "progress", session_id = %session.id, %activity_type, difficulty = session.difficulty_level, "Session started");

  Ok(StartSessionOut { session, message: SESSION_START })
}

fn outcome_from(body: &CompleteSessionIn) -> AppResult<Outcome> {
  let field = |name: &str, v: i64| {
    u32::try_from(v).map_err(|_| AppError::Validation(format!("{name} must be a non-negative integer")))
  };
  Ok(Outcome {
    score: field("score", body.score)?,
    correct_answers: field("correct_answers", body.correct_answers)?,
    total_questions: field("total_questions", body.total_questions)?,
  })
}

#[instrument(level = "info", skip(state, body), fields(caller_id = %caller.id, session_id = %body.session_id))]
pub async fn complete_session(
  state: &AppState,
  caller: &Caller,
  body: CompleteSessionIn,
) -> AppResult<CompleteSessionOut> {
  let outcome = outcome_from(&body)?;
  let mut session = state
    .store
    .get_session(&body.session_id)
    .await?
    .ok_or_else(|| AppError::not_found("session", &body.session_id))?;
  let child = load_child_for(state, caller, &session.child_id).await?;

  let now = state.clock.now();
  lifecycle::complete(&mut session, outcome, now)?;
  state.store.update_session(&session).await?;

  let skill = match state.store.find_skill(&child.id, session.activity_type).await? {
    Some(mut skill) => {
      progress::record_attempts(&mut skill, outcome.correct_answers, outcome.total_questions, now);
      state.store.update_skill(&skill).await?;
      skill
    }
    None => {
      let mut skill = SkillProgress::new(&child.id, session.activity_type, now);
      progress::record_attempts(&mut skill, outcome.correct_answers, outcome.total_questions, now);
      state.store.insert_skill(skill.clone()).await?;
      skill
    }
  };

  let history = completed_sessions_of(state, &child.id).await?;
  let reward = lifecycle::reward(
    outcome,
    progress::total_score(&history).saturating_sub(outcome.score as u64),
    progress::total_coins(&history).saturating_sub(progress::coins_for(outcome.score)),
  );
  let completed = state.store.count_sessions(&SessionQuery::for_child(&child.id).completed()).await?;
  let has_first = state.store.count_achievements(&child.id, Some(AchievementKind::FirstActivity)).await? > 0;
  let mut achievements = Vec::new();
  for kind in lifecycle::earned_achievements(outcome, completed, has_first) {
    let award = Achievement::award(&child.id, kind, now);
    state.store.insert_achievement(award.clone()).await?;
    info!(target: "progress", child_id = %child.id, achievement = kind.title(), "Achievement awarded");
    achievements.push(award);
  }

  let window = SessionQuery::for_child(&child.id).completed().limit(state.engine.completion_window);
  let next = next_difficulty(&state.store.find_sessions(&window).await?);
  let mut rng = state.random.rng();
  let encouragement = encouragement::message(
    outcome.correct_answers,
    outcome.total_questions,
    session.difficulty_level,
    &mut rng,
  );
  info!(
    target: "progress",
    session_id = %session.id,
    correct = outcome.correct_answers,
    total = outcome.total_questions,
    next_difficulty = next,
    mastery = skill.mastery_percentage,
    xp = reward.xp_earned,
    coins = reward.coins_earned,
    "Session completed"
  );
  if let Some(level) = reward.new_level {
    info!(target: "progress", child_id = %child.id, level, "Level up");
  }

  Ok(CompleteSessionOut { session, encouragement, achievements, next_difficulty: next, skill, reward })
}

// -------- Progress & dashboard --------

#[instrument(level = "info", skip(state), fields(caller_id = %caller.id))]
pub async fn progress_view(state: &AppState, caller: &Caller, child_id: &str) -> AppResult<ProgressOut> {
  let child = load_child_for(state, caller, child_id).await?;
  let sessions = state.store.find_sessions(&SessionQuery::for_child(&child.id).completed()).await?;
  let skills = state.store.skills_of(&child.id).await?;
  let achievements_count = state.store.count_achievements(&child.id, None).await?;
  let total_score = progress::total_score(&sessions);
  let coins = progress::total_coins(&sessions);

  Ok(ProgressOut {
    child_id: child.id,
    skills,
    overall_level: progress::overall_level(total_score),
    total_score,
    coins,
    achievements_count,
    streak_days: progress::learning_streak(&sessions, state.clock.today()),
  })
}

#[instrument(level = "info", skip(state), fields(caller_id = %caller.id))]
pub async fn parent_dashboard(state: &AppState, caller: &Caller, child_id: &str) -> AppResult<DashboardOut> {
  caller.require_parent()?;
  let child = load_child_for(state, caller, child_id).await?;
  let now = state.clock.now();

  let completed = state.store.find_sessions(&SessionQuery::for_child(&child.id).completed()).await?;
  let recent_sessions =
    state.store.find_sessions(&SessionQuery::for_child(&child.id).limit(RECENT_SESSIONS)).await?;
  let skills = state.store.skills_of(&child.id).await?;
  let achievements = state.store.achievements_of(&child.id).await?;

  let weekly_stats = progress::weekly_stats(&completed, now, state.engine.weekly_minutes_goal);
  let recommendations = progress::recommendations(&child.name, &skills);
  let engagement_insights = progress::engagement_insights(&weekly_stats);
  let focus_areas = progress::focus_areas(&skills);
  debug!(
    target: "progress",
    child_id = %child.id,
    sessions = weekly_stats.sessions_count,
    streak = weekly_stats.streak_days,
    insights = engagement_insights.len(),
    "Dashboard computed"
  );

  Ok(DashboardOut {
    child: child_out(child, &completed),
    recent_sessions,
    skills,
    achievements,
    weekly_stats,
    recommendations,
    engagement_insights,
    focus_areas,
  })
}

// -------- Helpers --------

async fn load_child_for(state: &AppState, caller: &Caller, child_id: &str) -> AppResult<ChildProfile> {
  let child = state
    .store
    .get_child(child_id)
    .await?
    .ok_or_else(|| AppError::not_found("child", child_id))?;
  caller.ensure_access(&child)?;
  Ok(child)
}

async fn completed_sessions_of(state: &AppState, child_id: &str) -> AppResult<Vec<Session>> {
  Ok(state.store.find_sessions(&SessionQuery::for_child(child_id).completed()).await?)
}

pub fn banner() -> BannerOut {
  BannerOut { message: "Adventure Academy Heroes API", version: env!("CARGO_PKG_VERSION") }
}

pub fn health(state: &AppState) -> HealthOut {
  HealthOut {
    status: "healthy",
    timestamp: state.clock.now(),
    content_generator: state.generator.external_name().unwrap_or("templates").to_string(),
  }
}
