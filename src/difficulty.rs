//! Next-difficulty recommendation from a window of recent sessions.
//!
//! The window is ordered newest first. Its aggregate success rate moves the
//! most recent session's level by at most one step:
//!   rate >= 0.85  -> one level harder
//!   rate <= 0.50  -> one level easier
//!   otherwise     -> unchanged
//! An empty window starts at level 1.

use crate::domain::{clamp_difficulty, Session, MIN_DIFFICULTY};

pub const RAISE_AT: f64 = 0.85;
pub const LOWER_AT: f64 = 0.50;
/// Rate assumed when the window holds no answered questions.
const NEUTRAL_RATE: f64 = 0.5;

/// Aggregate success rate over the window (Σ correct / Σ total).
pub fn success_rate(history: &[Session]) -> f64 {
  let correct: u64 = history.iter().map(|s| s.correct_answers as u64).sum();
  let total: u64 = history.iter().map(|s| s.total_questions as u64).sum();
  if total == 0 { NEUTRAL_RATE } else { correct as f64 / total as f64 }
}

pub fn next_difficulty(history: &[Session]) -> u8 {
  let Some(latest) = history.first() else {
    return MIN_DIFFICULTY;
  };
  let current = clamp_difficulty(latest.difficulty_level as i64) as i64;
  let rate = success_rate(history);

  if rate >= RAISE_AT {
    clamp_difficulty(current + 1)
  } else if rate <= LOWER_AT {
    clamp_difficulty(current - 1)
  } else {
    clamp_difficulty(current)
  }
}
