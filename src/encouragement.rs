//! Tone-banded feedback messages.
//!
//! Only the score ratio picks the band; difficulty is accepted for call-site
//! symmetry but does not change the pools.

use rand::seq::SliceRandom;
use rand::Rng;

const TOP: &[&str] = &[
  "🌟 WOW! You're a SUPER HERO! Amazing work!",
  "🎉 Incredible! You're absolutely brilliant!",
  "⭐ Outstanding! You're a learning champion!",
  "🏆 Perfect! You're doing AMAZING!",
];

const HIGH: &[&str] = &[
  "🎈 Great job! You're doing so well!",
  "😊 Wonderful! Keep up the great work!",
  "🌈 Fantastic! You're learning so fast!",
  "✨ Excellent! You're a star!",
];

const MID: &[&str] = &[
  "💪 Good try! You're getting better!",
  "🌟 Nice effort! Keep practicing!",
  "🎯 You're doing well! Keep going!",
  "⭐ Good work! You're improving!",
];

const EFFORT: &[&str] = &[
  "🌈 Great effort! Let's try again!",
  "💫 You're learning! That's what matters!",
  "🌟 Keep trying! You're doing great!",
  "✨ Every try makes you stronger!",
];

/// Greeting used when a session is opened.
pub const SESSION_START: &str = "Let's start learning! You've got this! 🌟";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Band {
  Top,
  High,
  Mid,
  Effort,
}

impl Band {
  pub fn for_score(score: u32, total: u32) -> Self {
    let ratio = if total == 0 { 0.0 } else { score as f64 / total as f64 };
    if ratio >= 0.90 {
      Band::Top
    } else if ratio >= 0.70 {
      Band::High
    } else if ratio >= 0.50 {
      Band::Mid
    } else {
      Band::Effort
    }
  }

  pub fn pool(&self) -> &'static [&'static str] {
    match self {
      Band::Top => TOP,
      Band::High => HIGH,
      Band::Mid => MID,
      Band::Effort => EFFORT,
    }
  }
}

pub fn message<R: Rng + ?Sized>(score: u32, total: u32, _difficulty: u8, rng: &mut R) -> String {
  let pool = Band::for_score(score, total).pool();
  pool.choose(rng).copied().unwrap_or(EFFORT[0]).to_string()
}
