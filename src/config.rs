//! Loading service configuration (generation prompts + engine tunables) from TOML.
//!
//! See `AppConfig`, `Prompts` and `EngineConfig` for the expected schema. Every
//! field has a default, so an absent or partial file is fine.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub engine: EngineConfig,
}

/// Prompts for the activity generator. Placeholders: `{activity_type}`,
/// `{difficulty}`, `{age_group}`, `{count}`, `{performance}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub activity_system: String,
  pub activity_user_template: String,
  /// Appended as `{performance}` when a recent success rate is known.
  pub performance_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      activity_system: r#"You are an expert early childhood education specialist creating fun, engaging math activities for young children.

Create activities that are:
- Age-appropriate and fun
- Encouraging and positive
- Aligned with early math standards
- Engaging with relatable contexts (toys, animals, snacks)

Respond ONLY with a JSON array of activities with this structure:
[
  {
    "activity_type": "{activity_type}",
    "question_text": "Fun question text",
    "question_data": {"numbers": [1, 2], "context": "apples"},
    "correct_answer": "3",
    "difficulty_level": {difficulty},
    "age_group": "{age_group}",
    "hints": ["Helpful hint 1", "Helpful hint 2"]
  }
]

Activity types:
- counting: Count objects
- number_recognition: Identify numbers
- shapes: Identify basic shapes
- simple_addition: Add small numbers
- patterns: Complete simple patterns"#.into(),
      activity_user_template: "Generate {count} engaging {activity_type} activities at difficulty level {difficulty} (1-5 scale) for {age_group} children.{performance}\n\nUse contexts like animals, toys, fruits, or everyday objects that children love.\n\nReturn ONLY the JSON array, no other text.".into(),
      performance_template: "\n\nChild's recent performance: {success_rate}% success rate. Adjust difficulty accordingly.".into(),
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Weekly practice target used for goal completion.
  pub weekly_minutes_goal: u32,
  /// Completed sessions considered when picking difficulty for new activities.
  pub activity_window: usize,
  /// Completed sessions considered when recomputing difficulty after a session.
  pub completion_window: usize,
  pub generation_timeout_secs: u64,
  pub token_ttl_hours: i64,
  /// Upper bound on activities per request.
  pub max_activity_count: usize,
  /// `max_tokens` for external generation; 0 sends no cap.
  pub generation_max_tokens: u32,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      weekly_minutes_goal: 120,
      activity_window: 10,
      completion_window: 5,
      generation_timeout_secs: 15,
      token_ttl_hours: 24 * 7,
      max_activity_count: 20,
      generation_max_tokens: 1500,
    }
  }
}

impl EngineConfig {
  pub fn generation_timeout(&self) -> Duration {
    Duration::from_secs(self.generation_timeout_secs.max(1))
  }

  pub fn generation_max_tokens(&self) -> Option<u32> {
    (self.generation_max_tokens > 0).then_some(self.generation_max_tokens)
  }
}

/// Listener and edge settings, read from the environment only.
#[derive(Clone, Debug)]
pub struct HttpSettings {
  pub port: u16,
  pub static_dir: PathBuf,
  /// Empty means any origin.
  pub cors_origins: Vec<String>,
}

impl Default for HttpSettings {
  fn default() -> Self {
    Self { port: 3000, static_dir: PathBuf::from("./static"), cors_origins: Vec::new() }
  }
}

impl HttpSettings {
  /// PORT, STATIC_DIR and CORS_ORIGINS (comma list, `*` for any).
  pub fn from_env() -> Self {
    let defaults = Self::default();
    let port = std::env::var("PORT").ok().and_then(|p| p.parse::<u16>().ok()).unwrap_or(defaults.port);
    let static_dir = std::env::var("STATIC_DIR").map(PathBuf::from).unwrap_or(defaults.static_dir);
    let cors_origins = std::env::var("CORS_ORIGINS").map(|v| parse_origins(&v)).unwrap_or_default();
    Self { port, static_dir, cors_origins }
  }
}

fn parse_origins(raw: &str) -> Vec<String> {
  raw
    .split(',')
    .map(str::trim)
    .filter(|o| !o.is_empty() && *o != "*")
    .map(str::to_string)
    .collect()
}

/// Parse a TOML document into `AppConfig`.
pub fn parse_config(s: &str) -> Result<AppConfig, toml::de::Error> {
  toml::from_str::<AppConfig>(s)
}

/// Attempt to load `AppConfig` from APP_CONFIG_PATH. On any parsing/IO error, returns defaults.
pub fn load_app_config_from_env() -> AppConfig {
  let Ok(path) = std::env::var("APP_CONFIG_PATH") else {
    return AppConfig::default();
  };
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_config(&s) {
      Ok(cfg) => {
        info!(target: "adventure_backend", %path, "Loaded app config (TOML)");
        cfg
      }
      Err(e) => {
        error!(target: "adventure_backend", %path, error = %e, "Failed to parse TOML config; using defaults");
        AppConfig::default()
      }
    },
    Err(e) => {
      error!(target: "adventure_backend", %path, error = %e, "Failed to read TOML config file; using defaults");
      AppConfig::default()
    }
  }
}
