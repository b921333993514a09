//! Session state transitions (`created -> completed`) and the achievement and
//! reward rules evaluated when a session completes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{clamp_difficulty, AchievementKind, ActivityType, Session};
use crate::error::AppError;
use crate::progress::{coins_for, overall_level};

/// A perfect session only counts toward "Perfect Hero!" with at least this many questions.
pub const PERFECT_MIN_QUESTIONS: u32 = 5;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransitionError {
  #[error("session {0} is already completed")]
  AlreadyCompleted(String),
  #[error("correct_answers ({correct}) exceeds total_questions ({total})")]
  CorrectExceedsTotal { correct: u32, total: u32 },
}

impl From<TransitionError> for AppError {
  fn from(e: TransitionError) -> Self {
    match e {
      TransitionError::AlreadyCompleted(_) => AppError::Conflict(e.to_string()),
      TransitionError::CorrectExceedsTotal { .. } => AppError::Validation(e.to_string()),
    }
  }
}

/// Final counts reported by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Outcome {
  pub score: u32,
  pub correct_answers: u32,
  pub total_questions: u32,
}

impl Outcome {
  pub fn is_perfect(&self) -> bool {
    self.total_questions > 0 && self.correct_answers == self.total_questions
  }
}

/// A fresh session in the `created` state.
pub fn start(child_id: &str, activity_type: ActivityType, difficulty: i64, now: DateTime<Utc>) -> Session {
  Session {
    id: Uuid::new_v4().to_string(),
    child_id: child_id.to_string(),
    activity_type,
    difficulty_level: clamp_difficulty(difficulty),
    started_at: now,
    completed_at: None,
    duration_seconds: None,
    score: 0,
    correct_answers: 0,
    total_questions: 0,
    is_completed: false,
  }
}

/// Move a session to `completed`. The session is left untouched on error.
pub fn complete(session: &mut Session, outcome: Outcome, now: DateTime<Utc>) -> Result<(), TransitionError> {
  if session.is_completed {
    return Err(TransitionError::AlreadyCompleted(session.id.clone()));
  }
  if outcome.correct_answers > outcome.total_questions {
    return Err(TransitionError::CorrectExceedsTotal {
      correct: outcome.correct_answers,
      total: outcome.total_questions,
    });
  }

  session.score = outcome.score;
  session.correct_answers = outcome.correct_answers;
  session.total_questions = outcome.total_questions;
  session.completed_at = Some(now);
  // clock skew never yields a negative duration
  session.duration_seconds = Some((now - session.started_at).num_seconds().max(0) as u64);
  session.is_completed = true;
  Ok(())
}

/// Achievements earned by a just-completed session.
///
/// `completed_count` includes this session; `has_first_steps` says whether the
/// child already holds the first-activity award.
pub fn earned_achievements(
  outcome: Outcome,
  completed_count: usize,
  has_first_steps: bool,
) -> Vec<AchievementKind> {
  let mut out = Vec::new();
  if completed_count == 1 && !has_first_steps {
    out.push(AchievementKind::FirstActivity);
  }
  if outcome.is_perfect() && outcome.total_questions >= PERFECT_MIN_QUESTIONS {
    out.push(AchievementKind::PerfectScore);
  }
  out
}

/// XP and coins granted by one completed session. XP is the session score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Reward {
  pub xp_earned: u64,
  pub coins_earned: u64,
  /// Set only when this session crossed a level boundary.
  pub new_level: Option<u32>,
  pub total_xp: u64,
  pub total_coins: u64,
}

/// `xp_before` and `coins_before` are the child's totals without this session.
pub fn reward(outcome: Outcome, xp_before: u64, coins_before: u64) -> Reward {
  let xp_earned = outcome.score as u64;
  let coins_earned = coins_for(outcome.score);
  let total_xp = xp_before.saturating_add(xp_earned);
  let level = overall_level(total_xp);
  Reward {
    xp_earned,
    coins_earned,
    new_level: (level > overall_level(xp_before)).then_some(level),
    total_xp,
    total_coins: coins_before.saturating_add(coins_earned),
  }
}
