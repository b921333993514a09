//! Domain records: accounts, child profiles, sessions, skill progress, activities, achievements.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MIN_DIFFICULTY: u8 = 1;
pub const MAX_DIFFICULTY: u8 = 5;

/// Clamp any integer into the 1..=5 difficulty range.
pub fn clamp_difficulty(level: i64) -> u8 {
  level.clamp(MIN_DIFFICULTY as i64, MAX_DIFFICULTY as i64) as u8
}

/// The practice families the content generator knows how to build.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
  Counting,
  NumberRecognition,
  Shapes,
  SimpleAddition,
  Patterns,
}

impl ActivityType {
  pub const ALL: [ActivityType; 5] = [
    ActivityType::Counting,
    ActivityType::NumberRecognition,
    ActivityType::Shapes,
    ActivityType::SimpleAddition,
    ActivityType::Patterns,
  ];

  /// Skills every new child profile starts tracking.
  pub const STARTER: [ActivityType; 4] = [
    ActivityType::Counting,
    ActivityType::NumberRecognition,
    ActivityType::Shapes,
    ActivityType::Patterns,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      ActivityType::Counting => "counting",
      ActivityType::NumberRecognition => "number_recognition",
      ActivityType::Shapes => "shapes",
      ActivityType::SimpleAddition => "simple_addition",
      ActivityType::Patterns => "patterns",
    }
  }

  /// Human label, e.g. "number recognition".
  pub fn label(&self) -> String {
    self.as_str().replace('_', " ")
  }
}

impl fmt::Display for ActivityType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ActivityType {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    ActivityType::ALL
      .into_iter()
      .find(|t| t.as_str() == s.trim())
      .ok_or_else(|| format!("unknown activity_type '{}'", s))
  }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  Parent,
  Child,
  Admin,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParentAccount {
  pub id: String,
  pub email: String,
  pub password_hash: String,
  pub name: String,
  pub created_at: DateTime<Utc>,
  pub is_active: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChildProfile {
  pub id: String,
  pub parent_id: String,
  pub name: String,
  pub age: u8,
  pub avatar_id: String,
  pub picture_password_id: String,
  /// Scalar-valued settings (favourite theme, sound on/off, ...).
  #[serde(default)]
  pub preferences: BTreeMap<String, serde_json::Value>,
  pub created_at: DateTime<Utc>,
  pub is_active: bool,
}

impl ChildProfile {
  /// Banded age group used to pitch generated content.
  pub fn age_group(&self) -> &'static str {
    match self.age {
      0..=5 => "preschool_4-5",
      6..=8 => "elementary_6-8",
      _ => "elementary_8-10",
    }
  }
}

/// One practice session. Created at start, completed exactly once.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Session {
  pub id: String,
  pub child_id: String,
  pub activity_type: ActivityType,
  pub difficulty_level: u8,
  pub started_at: DateTime<Utc>,
  pub completed_at: Option<DateTime<Utc>>,
  pub duration_seconds: Option<u64>,
  pub score: u32,
  pub correct_answers: u32,
  pub total_questions: u32,
  pub is_completed: bool,
}

/// Per (child, skill) running tally.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SkillProgress {
  pub id: String,
  pub child_id: String,
  pub skill_type: ActivityType,
  pub total_attempts: u64,
  pub successful_attempts: u64,
  pub mastery_percentage: f64,
  pub last_practiced: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl SkillProgress {
  pub fn new(child_id: &str, skill_type: ActivityType, now: DateTime<Utc>) -> Self {
    Self {
      id: Uuid::new_v4().to_string(),
      child_id: child_id.to_string(),
      skill_type,
      total_attempts: 0,
      successful_attempts: 0,
      mastery_percentage: 0.0,
      last_practiced: now,
      updated_at: now,
    }
  }
}

/// Type-specific payload of a practice activity.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuestionData {
  Counting { count: u32, context: String },
  NumberRecognition { number: u32, options: Vec<u32> },
  Shapes { shape: String, options: Vec<String> },
  Addition { addends: [u32; 2], context: String },
  Pattern { family: String, sequence: Vec<String>, options: Vec<String> },
  /// Payload produced by the external generator; only checked to be an object.
  Generated { fields: serde_json::Map<String, serde_json::Value> },
}

/// Where did the activity come from?
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivitySource {
  Generated,
  Template,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Activity {
  pub id: String,
  pub activity_type: ActivityType,
  pub question_text: String,
  pub question_data: QuestionData,
  pub correct_answer: String,
  pub difficulty_level: u8,
  pub age_group: String,
  pub hints: Vec<String>,
  pub source: ActivitySource,
  pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AchievementKind {
  FirstActivity,
  PerfectScore,
}

impl AchievementKind {
  pub fn title(&self) -> &'static str {
    match self {
      AchievementKind::FirstActivity => "First Steps!",
      AchievementKind::PerfectScore => "Perfect Hero!",
    }
  }

  pub fn description(&self) -> &'static str {
    match self {
      AchievementKind::FirstActivity => "Completed your first learning activity!",
      AchievementKind::PerfectScore => "Got all questions correct!",
    }
  }

  pub fn icon(&self) -> &'static str {
    match self {
      AchievementKind::FirstActivity => "🌟",
      AchievementKind::PerfectScore => "🏆",
    }
  }
}

/// Append-only award record.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Achievement {
  pub id: String,
  pub child_id: String,
  pub achievement_type: AchievementKind,
  pub title: String,
  pub description: String,
  pub icon: String,
  pub earned_at: DateTime<Utc>,
}

impl Achievement {
  pub fn award(child_id: &str, kind: AchievementKind, now: DateTime<Utc>) -> Self {
    Self {
      id: Uuid::new_v4().to_string(),
      child_id: child_id.to_string(),
      achievement_type: kind,
      title: kind.title().into(),
      description: kind.description().into(),
      icon: kind.icon().into(),
      earned_at: now,
    }
  }
}
