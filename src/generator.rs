//! Practice-activity generation.
//!
//! Flow:
//! 1) Build prompts for the requested type/difficulty/age group.
//! 2) Ask the external `TextGenerator` under a hard timeout.
//! 3) Validate the raw text as a JSON array of activity records.
//! 4) On any failure (disabled, error, timeout, malformed) fall back to the
//!    deterministic templates. Short but valid answers are topped up from
//!    the templates so callers always get exactly `count` activities.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::Prompts;
use crate::domain::{Activity, ActivitySource, ActivityType, QuestionData};
use crate::fallback;
use crate::openai::{GenerationFailure, TextGenerator};
use crate::util::{fill_template, trunc_for_log};

const MAX_HINTS: usize = 2;

#[derive(Clone, Debug)]
pub struct GenerationRequest {
  pub activity_type: ActivityType,
  pub difficulty: u8,
  pub age_group: String,
  pub count: usize,
  /// Recent success rate in percent, if the child has history.
  pub recent_success_rate: Option<f64>,
}

#[derive(Clone)]
pub struct ContentGenerator {
  external: Option<Arc<dyn TextGenerator>>,
  prompts: Prompts,
  timeout: Duration,
}

impl ContentGenerator {
  pub fn new(external: Option<Arc<dyn TextGenerator>>, prompts: Prompts, timeout: Duration) -> Self {
    Self { external, prompts, timeout }
  }

  pub fn external_name(&self) -> Option<&str> {
    self.external.as_deref().map(|g| g.name())
  }

  #[instrument(
    level = "info",
    skip(self, now, rng),
    fields(activity_type = %req.activity_type, difficulty = req.difficulty, count = req.count)
  )]
  pub async fn generate<R: Rng + Send + ?Sized>(
    &self,
    req: &GenerationRequest,
    now: DateTime<Utc>,
    rng: &mut R,
  ) -> Vec<Activity> {
    if req.count == 0 {
      return Vec::new();
    }

    let mut activities = match &self.external {
      Some(gen) => match self.try_external(gen.as_ref(), req, now).await {
        Ok(list) => {
          info!(target: "content", generated = list.len(), "External generation accepted");
          list
        }
        Err(e) => {
          warn!(target: "content", error = %e, "External generation failed; using templates");
          Vec::new()
        }
      },
      None => {
        debug!(target: "content", "External generator disabled; using templates");
        Vec::new()
      }
    };

    activities.truncate(req.count);
    let missing = req.count - activities.len();
    if missing > 0 {
      activities.extend(fallback::generate(
        req.activity_type,
        req.difficulty,
        &req.age_group,
        missing,
        now,
        rng,
      ));
    }
    activities
  }

  async fn try_external(
    &self,
    gen: &dyn TextGenerator,
    req: &GenerationRequest,
    now: DateTime<Utc>,
  ) -> Result<Vec<Activity>, GenerationFailure> {
    let (system, user) = self.build_prompts(req);
    let raw = match tokio::time::timeout(self.timeout, gen.generate_text(&system, &user)).await {
      Ok(res) => res?,
      Err(_) => return Err(GenerationFailure::Timeout(self.timeout)),
    };
    debug!(target: "content", raw = %trunc_for_log(&raw, 200), "External generator raw output");
    parse_activities(&raw, req, now)
  }

  pub fn build_prompts(&self, req: &GenerationRequest) -> (String, String) {
    let difficulty = req.difficulty.to_string();
    let count = req.count.to_string();
    let performance = match req.recent_success_rate {
      Some(rate) => {
        let rate = format!("{:.0}", rate);
        fill_template(&self.prompts.performance_template, &[("success_rate", &rate)])
      }
      None => String::new(),
    };
    let pairs = [
      ("activity_type", req.activity_type.as_str()),
      ("difficulty", difficulty.as_str()),
      ("age_group", req.age_group.as_str()),
      ("count", count.as_str()),
      ("performance", performance.as_str()),
    ];
    (
      fill_template(&self.prompts.activity_system, &pairs),
      fill_template(&self.prompts.activity_user_template, &pairs),
    )
  }
}

/// Shape the model is asked to return, before validation.
#[derive(Deserialize)]
struct RawActivity {
  activity_type: String,
  question_text: String,
  #[serde(default)]
  question_data: serde_json::Value,
  correct_answer: serde_json::Value,
  #[serde(default)]
  hints: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPayload {
  List(Vec<RawActivity>),
  Wrapped { activities: Vec<RawActivity> },
}

/// Validate raw model output. Any malformed record rejects the whole batch.
pub fn parse_activities(
  raw: &str,
  req: &GenerationRequest,
  now: DateTime<Utc>,
) -> Result<Vec<Activity>, GenerationFailure> {
  let body = strip_code_fence(raw);
  let payload: RawPayload = serde_json::from_str(body)
    .map_err(|e| GenerationFailure::Malformed(format!("not an activity array: {}", e)))?;
  let items = match payload {
    RawPayload::List(v) => v,
    RawPayload::Wrapped { activities } => activities,
  };
  if items.is_empty() {
    return Err(GenerationFailure::Malformed("empty activity array".into()));
  }
  items.into_iter().enumerate().map(|(i, item)| validate(i, item, req, now)).collect()
}

fn validate(
  index: usize,
  item: RawActivity,
  req: &GenerationRequest,
  now: DateTime<Utc>,
) -> Result<Activity, GenerationFailure> {
  let bad = |why: &str| GenerationFailure::Malformed(format!("activity #{}: {}", index, why));

  let activity_type: ActivityType = item.activity_type.parse().map_err(|e: String| bad(&e))?;
  if activity_type != req.activity_type {
    return Err(bad(&format!("expected {}, got {}", req.activity_type, activity_type)));
  }
  let question_text = item.question_text.trim().to_string();
  if question_text.is_empty() {
    return Err(bad("empty question_text"));
  }
  let correct_answer = match item.correct_answer {
    serde_json::Value::String(s) => s.trim().to_string(),
    serde_json::Value::Number(n) => n.to_string(),
    _ => return Err(bad("correct_answer must be a string or number")),
  };
  if correct_answer.is_empty() {
    return Err(bad("empty correct_answer"));
  }
  let fields = match item.question_data {
    serde_json::Value::Object(map) => map,
    serde_json::Value::Null => serde_json::Map::new(),
    _ => return Err(bad("question_data must be an object")),
  };
  let hints: Vec<String> = item
    .hints
    .into_iter()
    .map(|h| h.trim().to_string())
    .filter(|h| !h.is_empty())
    .take(MAX_HINTS)
    .collect();
  if hints.is_empty() {
    return Err(bad("no hints"));
  }

  Ok(Activity {
    id: Uuid::new_v4().to_string(),
    activity_type,
    question_text,
    question_data: QuestionData::Generated { fields },
    correct_answer,
    difficulty_level: req.difficulty,
    age_group: req.age_group.clone(),
    hints,
    source: ActivitySource::Generated,
    created_at: now,
  })
}

/// Models like to wrap JSON in ```json fences.
fn strip_code_fence(raw: &str) -> &str {
  let t = raw.trim();
  let Some(rest) = t.strip_prefix("```") else {
    return t;
  };
  let rest = rest.split_once('\n').map_or("", |(_, body)| body);
  rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Scripted generator for tests: replays a fixed outcome, optionally after a delay.
#[cfg(test)]
pub struct ScriptedGenerator {
  pub reply: Result<String, String>,
  pub delay: Option<Duration>,
}

#[cfg(test)]
#[async_trait::async_trait]
impl TextGenerator for ScriptedGenerator {
  fn name(&self) -> &str {
    "scripted"
  }

  async fn generate_text(&self, _system: &str, _user: &str) -> Result<String, GenerationFailure> {
    if let Some(d) = self.delay {
      tokio::time::sleep(d).await;
    }
    self.reply.clone().map_err(GenerationFailure::Transport)
  }
}
