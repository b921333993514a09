//! Progress aggregation: levels, mastery, streaks, weekly stats, focus areas and insights.
//!
//! Everything here is a pure function of a snapshot of session and skill
//! records plus the current instant.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::domain::{Session, SkillProgress};
use crate::util::{percent, round1};

pub const MAX_LEVEL: u32 = 10;
pub const POINTS_PER_LEVEL: u64 = 100;
pub const FOCUS_AREA_COUNT: usize = 2;
/// Score points per coin granted on completion.
pub const POINTS_PER_COIN: u64 = 2;

/// `min(total_score / 100 + 1, 10)`.
pub fn overall_level(total_score: u64) -> u32 {
  (total_score / POINTS_PER_LEVEL).saturating_add(1).min(MAX_LEVEL as u64) as u32
}

pub fn total_score(sessions: &[Session]) -> u64 {
  sessions.iter().map(|s| s.score as u64).sum()
}

pub fn coins_for(score: u32) -> u64 {
  score as u64 / POINTS_PER_COIN
}

/// Coins earned so far; each session rounds down on its own.
pub fn total_coins(sessions: &[Session]) -> u64 {
  sessions.iter().map(|s| coins_for(s.score)).sum()
}

/// successful / total × 100, 0 when nothing was attempted.
pub fn mastery_percentage(successful: u64, total: u64) -> f64 {
  percent(successful.min(total), total).clamp(0.0, 100.0)
}

/// Fold one completed session into a skill row.
pub fn record_attempts(skill: &mut SkillProgress, correct: u32, total: u32, now: DateTime<Utc>) {
  let correct = correct.min(total) as u64;
  skill.total_attempts += total as u64;
  skill.successful_attempts += correct;
  skill.mastery_percentage = mastery_percentage(skill.successful_attempts, skill.total_attempts);
  skill.last_practiced = now;
  skill.updated_at = now;
}

/// Calendar day a session counts toward.
fn practice_day(s: &Session) -> NaiveDate {
  s.completed_at.unwrap_or(s.started_at).date_naive()
}

/// Consecutive practice days ending today or yesterday.
pub fn learning_streak(sessions: &[Session], today: NaiveDate) -> u32 {
  let days: BTreeSet<NaiveDate> =
    sessions.iter().filter(|s| s.is_completed).map(practice_day).filter(|d| *d <= today).collect();

  let Some(&latest) = days.iter().next_back() else {
    return 0;
  };
  if today - latest > Duration::days(1) {
    return 0;
  }

  let mut streak = 0;
  let mut expected = latest;
  for day in days.iter().rev() {
    if *day != expected {
      break;
    }
    streak += 1;
    expected = expected - Duration::days(1);
  }
  streak
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct WeeklyStats {
  pub sessions_count: usize,
  pub total_time_minutes: u64,
  pub average_score: u64,
  pub skills_practiced: usize,
  pub accuracy_rate: u32,
  pub average_duration_minutes: f64,
  pub goal_completion_percentage: u32,
  pub minutes_goal: u32,
  pub streak_days: u32,
  pub active_days: usize,
  pub score_trend: f64,
}

fn in_window(s: &Session, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
  let at = s.completed_at.unwrap_or(s.started_at);
  s.is_completed && at >= from && at < to
}

fn average_score(sessions: &[&Session]) -> f64 {
  if sessions.is_empty() {
    0.0
  } else {
    sessions.iter().map(|s| s.score as f64).sum::<f64>() / sessions.len() as f64
  }
}

/// Stats over `[now - 7d, now)` compared with the 7 days before that.
pub fn weekly_stats(sessions: &[Session], now: DateTime<Utc>, minutes_goal: u32) -> WeeklyStats {
  let week_ago = now - Duration::days(7);
  let two_weeks_ago = week_ago - Duration::days(7);
  let this_week: Vec<&Session> = sessions.iter().filter(|s| in_window(s, week_ago, now)).collect();
  let last_week: Vec<&Session> =
    sessions.iter().filter(|s| in_window(s, two_weeks_ago, week_ago)).collect();

  let total_seconds: u64 = this_week.iter().map(|s| s.duration_seconds.unwrap_or(0)).sum();
  let correct: u64 = this_week.iter().map(|s| s.correct_answers as u64).sum();
  let questions: u64 = this_week.iter().map(|s| s.total_questions as u64).sum();
  let total_time_minutes = total_seconds / 60;

  let average_duration_minutes = if this_week.is_empty() {
    0.0
  } else {
    round1(total_seconds as f64 / this_week.len() as f64 / 60.0)
  };
  let goal_completion_percentage = if minutes_goal == 0 {
    0
  } else {
    (percent(total_time_minutes, minutes_goal as u64).round() as u32).min(100)
  };
  let this_avg = average_score(&this_week);

  WeeklyStats {
    sessions_count: this_week.len(),
    total_time_minutes,
    average_score: this_avg as u64,
    skills_practiced: this_week.iter().map(|s| s.activity_type).collect::<HashSet<_>>().len(),
    accuracy_rate: percent(correct, questions).round() as u32,
    average_duration_minutes,
    goal_completion_percentage,
    minutes_goal,
    streak_days: learning_streak(sessions, now.date_naive()),
    active_days: this_week.iter().map(|s| practice_day(s)).collect::<HashSet<_>>().len(),
    score_trend: round1(this_avg - average_score(&last_week)),
  }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct FocusArea {
  pub skill: String,
  pub mastery_percentage: f64,
  pub last_practiced: DateTime<Utc>,
  pub practice_prompt: String,
}

/// The lowest-mastery skills, weakest first.
pub fn focus_areas(skills: &[SkillProgress]) -> Vec<FocusArea> {
  let mut ranked: Vec<&SkillProgress> = skills.iter().collect();
  ranked.sort_by(|a, b| a.mastery_percentage.total_cmp(&b.mastery_percentage));
  ranked
    .into_iter()
    .take(FOCUS_AREA_COUNT)
    .map(|s| FocusArea {
      skill: s.skill_type.as_str().to_string(),
      mastery_percentage: s.mastery_percentage,
      last_practiced: s.last_practiced,
      practice_prompt: format!(
        "Spend a quick session on {} to build confidence.",
        s.skill_type.label()
      ),
    })
    .collect()
}

/// Independent threshold rules; each yields at most one line.
pub fn engagement_insights(stats: &WeeklyStats) -> Vec<String> {
  let mut out = Vec::new();

  if stats.streak_days >= 5 {
    out.push("🔥 Incredible streak! Keep the daily adventures going.");
  } else if stats.streak_days == 0 {
    out.push("Let's kickstart a new learning streak this week!");
  }

  if stats.goal_completion_percentage >= 100 {
    out.push("✅ Weekly learning minutes goal met. Time for a celebration!");
  } else if stats.goal_completion_percentage < 50 {
    out.push("⏱️ A few more short sessions will help reach the weekly minutes goal.");
  }

  if stats.accuracy_rate >= 85 {
    out.push("🎯 Accuracy is soaring. Concepts are sticking nicely.");
  } else if stats.accuracy_rate < 60 && stats.sessions_count > 0 {
    out.push("🧠 Consider a review session to reinforce tricky topics.");
  }

  if stats.score_trend > 0.0 {
    out.push("📈 Scores are rising compared to last week. Great progress!");
  } else if stats.score_trend < 0.0 {
    out.push("🔁 Slight dip in scores. Try revisiting recently learned skills.");
  }

  if stats.skills_practiced >= 3 {
    out.push("🌈 A wide mix of skills practiced. Wonderful variety!");
  }

  out.into_iter().map(String::from).collect()
}

/// Parent-facing suggestions, anchored on the strongest skill.
pub fn recommendations(child_name: &str, skills: &[SkillProgress]) -> Vec<String> {
  let strongest = skills
    .iter()
    .filter(|s| s.total_attempts > 0)
    .max_by(|a, b| a.mastery_percentage.total_cmp(&b.mastery_percentage))
    .map(|s| s.skill_type.label())
    .unwrap_or_else(|| "learning".to_string());
  vec![
    format!("🎯 {} is doing great with {}!", child_name, strongest),
    "⭐ Try practicing during morning hours for better focus".to_string(),
    "📚 Explore new activity types to keep learning fun".to_string(),
  ]
}
