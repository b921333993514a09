//! Public request/response structs for the HTTP API (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Achievement, Activity, ChildProfile, ParentAccount, Role, Session, SkillProgress};
use crate::lifecycle::Reward;
use crate::progress::{overall_level, total_coins, total_score, FocusArea, WeeklyStats};

//
// Accounts
//

#[derive(Deserialize)]
pub struct RegisterParentIn {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Deserialize)]
pub struct LoginParentIn {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ChildLoginIn {
    pub child_id: String,
    pub picture_password_id: String,
}

#[derive(Debug, Serialize)]
pub struct ParentOut {
    pub id: String,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<&ParentAccount> for ParentOut {
    fn from(p: &ParentAccount) -> Self {
        Self { id: p.id.clone(), email: p.email.clone(), name: p.name.clone(), created_at: p.created_at }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthOut {
    pub access_token: String,
    pub token_type: &'static str,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentOut>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child: Option<ChildOut>,
}

//
// Child profiles
//

#[derive(Deserialize)]
pub struct CreateChildIn {
    pub name: String,
    pub age: i64,
    pub avatar_id: String,
    pub picture_password_id: String,
    #[serde(default)]
    pub preferences: BTreeMap<String, serde_json::Value>,
}

/// Profile plus derived level fields.
#[derive(Debug, Serialize)]
pub struct ChildOut {
    #[serde(flatten)]
    pub profile: ChildProfile,
    pub age_group: &'static str,
    pub current_level: u32,
    pub total_score: u64,
    pub coins: u64,
}

pub fn child_out(profile: ChildProfile, completed: &[Session]) -> ChildOut {
    let total_score = total_score(completed);
    ChildOut {
        age_group: profile.age_group(),
        current_level: overall_level(total_score),
        total_score,
        coins: total_coins(completed),
        profile,
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteChildOut {
    pub deleted: bool,
    pub sessions_removed: usize,
    pub skills_removed: usize,
    pub achievements_removed: usize,
}

//
// Activities and sessions
//

#[derive(Deserialize)]
pub struct ActivityRequestIn {
    pub child_id: String,
    pub activity_type: Option<String>,
    pub count: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ActivitiesOut {
    pub activities: Vec<Activity>,
    pub difficulty_level: u8,
    pub encouragement: String,
}

#[derive(Deserialize)]
pub struct StartSessionIn {
    pub child_id: String,
    pub activity_type: String,
    pub difficulty_level: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct StartSessionOut {
    pub session: Session,
    pub message: &'static str,
}

#[derive(Deserialize)]
pub struct CompleteSessionIn {
    pub session_id: String,
    pub score: i64,
    pub correct_answers: i64,
    pub total_questions: i64,
}

#[derive(Debug, Serialize)]
pub struct CompleteSessionOut {
    pub session: Session,
    pub encouragement: String,
    pub achievements: Vec<Achievement>,
    pub next_difficulty: u8,
    pub skill: SkillProgress,
    pub reward: Reward,
}

//
// Progress and dashboard
//

#[derive(Debug, Serialize)]
pub struct ProgressOut {
    pub child_id: String,
    pub skills: Vec<SkillProgress>,
    pub overall_level: u32,
    pub total_score: u64,
    pub coins: u64,
    pub achievements_count: usize,
    pub streak_days: u32,
}

#[derive(Debug, Serialize)]
pub struct DashboardOut {
    pub child: ChildOut,
    pub recent_sessions: Vec<Session>,
    pub skills: Vec<SkillProgress>,
    pub achievements: Vec<Achievement>,
    pub weekly_stats: WeeklyStats,
    pub recommendations: Vec<String>,
    pub engagement_insights: Vec<String>,
    pub focus_areas: Vec<FocusArea>,
}

//
// Plumbing
//

#[derive(Serialize)]
pub struct HealthOut {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub content_generator: String,
}

#[derive(Serialize)]
pub struct BannerOut {
    pub message: &'static str,
    pub version: &'static str,
}
