//! Document-store port and the in-memory implementation used by the server and tests.
//!
//! The port mirrors what the service needs from a document database: insert,
//! find-by-filter (newest-first with an optional limit), update-by-id,
//! count-by-filter and delete-by-filter over the named record sets.
//! Every method touches a single record set and is atomic on its own; the
//! engine composes results in memory after separate fetches.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{
  Achievement, AchievementKind, Activity, ActivityType, ChildProfile, ParentAccount, Session,
  SkillProgress,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("{collection} record {id} not found")]
  NotFound { collection: &'static str, id: String },

  #[error("duplicate key: {0}")]
  Duplicate(String),
}

/// Filter over the sessions record set. Results are sorted by `started_at`, newest first.
#[derive(Clone, Debug, Default)]
pub struct SessionQuery {
  pub child_id: String,
  pub completed_only: bool,
  pub limit: Option<usize>,
}

impl SessionQuery {
  pub fn for_child(child_id: &str) -> Self {
    Self { child_id: child_id.to_string(), ..Default::default() }
  }

  pub fn completed(mut self) -> Self {
    self.completed_only = true;
    self
  }

  pub fn limit(mut self, n: usize) -> Self {
    self.limit = Some(n);
    self
  }

  fn matches(&self, s: &Session) -> bool {
    s.child_id == self.child_id && (!self.completed_only || s.is_completed)
  }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
  // parents
  async fn insert_parent(&self, parent: ParentAccount) -> Result<(), StoreError>;
  async fn find_parent_by_email(&self, email: &str) -> Result<Option<ParentAccount>, StoreError>;

  // children
  async fn insert_child(&self, child: ChildProfile) -> Result<(), StoreError>;
  async fn get_child(&self, id: &str) -> Result<Option<ChildProfile>, StoreError>;
  async fn children_of(&self, parent_id: &str) -> Result<Vec<ChildProfile>, StoreError>;
  async fn delete_child(&self, id: &str) -> Result<bool, StoreError>;

  // sessions
  async fn insert_session(&self, session: Session) -> Result<(), StoreError>;
  async fn get_session(&self, id: &str) -> Result<Option<Session>, StoreError>;
  async fn update_session(&self, session: &Session) -> Result<(), StoreError>;
  async fn find_sessions(&self, query: &SessionQuery) -> Result<Vec<Session>, StoreError>;
  async fn count_sessions(&self, query: &SessionQuery) -> Result<usize, StoreError>;
  async fn delete_sessions_of(&self, child_id: &str) -> Result<usize, StoreError>;

  // skill progress
  async fn insert_skill(&self, skill: SkillProgress) -> Result<(), StoreError>;
  async fn find_skill(
    &self,
    child_id: &str,
    skill_type: ActivityType,
  ) -> Result<Option<SkillProgress>, StoreError>;
  async fn skills_of(&self, child_id: &str) -> Result<Vec<SkillProgress>, StoreError>;
  async fn update_skill(&self, skill: &SkillProgress) -> Result<(), StoreError>;
  async fn delete_skills_of(&self, child_id: &str) -> Result<usize, StoreError>;

  // activities
  async fn insert_activities(&self, activities: &[Activity]) -> Result<(), StoreError>;

  // achievements
  async fn insert_achievement(&self, achievement: Achievement) -> Result<(), StoreError>;
  /// Newest first.
  async fn achievements_of(&self, child_id: &str) -> Result<Vec<Achievement>, StoreError>;
  async fn count_achievements(
    &self,
    child_id: &str,
    kind: Option<AchievementKind>,
  ) -> Result<usize, StoreError>;
  async fn delete_achievements_of(&self, child_id: &str) -> Result<usize, StoreError>;
}

/// Process-local store. Each record set sits behind its own lock, so a single
/// call is atomic but there are no cross-collection transactions.
#[derive(Clone, Default)]
pub struct MemoryStore {
  parents: Arc<RwLock<HashMap<String, ParentAccount>>>,
  children: Arc<RwLock<HashMap<String, ChildProfile>>>,
  sessions: Arc<RwLock<HashMap<String, Session>>>,
  skills: Arc<RwLock<HashMap<String, SkillProgress>>>,
  activities: Arc<RwLock<HashMap<String, Activity>>>,
  achievements: Arc<RwLock<HashMap<String, Achievement>>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  #[cfg(test)]
  pub async fn activity_count(&self) -> usize {
    self.activities.read().await.len()
  }
}

#[async_trait]
impl DocumentStore for MemoryStore {
  async fn insert_parent(&self, parent: ParentAccount) -> Result<(), StoreError> {
    let mut parents = self.parents.write().await;
    let email = parent.email.to_lowercase();
    if parents.values().any(|p| p.email.to_lowercase() == email) {
      return Err(StoreError::Duplicate(format!("parents.email={}", parent.email)));
    }
    parents.insert(parent.id.clone(), parent);
    Ok(())
  }

  async fn find_parent_by_email(&self, email: &str) -> Result<Option<ParentAccount>, StoreError> {
    let email = email.to_lowercase();
    let parents = self.parents.read().await;
    Ok(parents.values().find(|p| p.email.to_lowercase() == email).cloned())
  }

  async fn insert_child(&self, child: ChildProfile) -> Result<(), StoreError> {
    let mut children = self.children.write().await;
    if children.contains_key(&child.id) {
      return Err(StoreError::Duplicate(format!("children.id={}", child.id)));
    }
    children.insert(child.id.clone(), child);
    Ok(())
  }

  async fn get_child(&self, id: &str) -> Result<Option<ChildProfile>, StoreError> {
    Ok(self.children.read().await.get(id).cloned())
  }

  async fn children_of(&self, parent_id: &str) -> Result<Vec<ChildProfile>, StoreError> {
    let children = self.children.read().await;
    let mut out: Vec<ChildProfile> =
      children.values().filter(|c| c.parent_id == parent_id).cloned().collect();
    out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    Ok(out)
  }

  async fn delete_child(&self, id: &str) -> Result<bool, StoreError> {
    Ok(self.children.write().await.remove(id).is_some())
  }

  async fn insert_session(&self, session: Session) -> Result<(), StoreError> {
    let mut sessions = self.sessions.write().await;
    if sessions.contains_key(&session.id) {
      return Err(StoreError::Duplicate(format!("sessions.id={}", session.id)));
    }
    sessions.insert(session.id.clone(), session);
    Ok(())
  }

  async fn get_session(&self, id: &str) -> Result<Option<Session>, StoreError> {
    Ok(self.sessions.read().await.get(id).cloned())
  }

  async fn update_session(&self, session: &Session) -> Result<(), StoreError> {
    let mut sessions = self.sessions.write().await;
    match sessions.get_mut(&session.id) {
      Some(slot) => {
        *slot = session.clone();
        Ok(())
      }
      None => Err(StoreError::NotFound { collection: "sessions", id: session.id.clone() }),
    }
  }

  async fn find_sessions(&self, query: &SessionQuery) -> Result<Vec<Session>, StoreError> {
    let sessions = self.sessions.read().await;
    let mut out: Vec<Session> = sessions.values().filter(|s| query.matches(s)).cloned().collect();
    out.sort_by(|a, b| b.started_at.cmp(&a.started_at).then_with(|| b.id.cmp(&a.id)));
    if let Some(n) = query.limit {
      out.truncate(n);
    }
    Ok(out)
  }

  async fn count_sessions(&self, query: &SessionQuery) -> Result<usize, StoreError> {
    let sessions = self.sessions.read().await;
    let n = sessions.values().filter(|s| query.matches(s)).count();
    Ok(query.limit.map_or(n, |l| n.min(l)))
  }

  async fn delete_sessions_of(&self, child_id: &str) -> Result<usize, StoreError> {
    let mut sessions = self.sessions.write().await;
    let before = sessions.len();
    sessions.retain(|_, s| s.child_id != child_id);
    Ok(before - sessions.len())
  }

  async fn insert_skill(&self, skill: SkillProgress) -> Result<(), StoreError> {
    let mut skills = self.skills.write().await;
    if skills.values().any(|s| s.child_id == skill.child_id && s.skill_type == skill.skill_type) {
      return Err(StoreError::Duplicate(format!(
        "skill_progress.(child_id, skill_type)=({}, {})",
        skill.child_id, skill.skill_type
      )));
    }
    skills.insert(skill.id.clone(), skill);
    Ok(())
  }

  async fn find_skill(
    &self,
    child_id: &str,
    skill_type: ActivityType,
  ) -> Result<Option<SkillProgress>, StoreError> {
    let skills = self.skills.read().await;
    Ok(skills.values().find(|s| s.child_id == child_id && s.skill_type == skill_type).cloned())
  }

  async fn skills_of(&self, child_id: &str) -> Result<Vec<SkillProgress>, StoreError> {
    let skills = self.skills.read().await;
    let mut out: Vec<SkillProgress> =
      skills.values().filter(|s| s.child_id == child_id).cloned().collect();
    out.sort_by_key(|s| s.skill_type);
    Ok(out)
  }

  async fn update_skill(&self, skill: &SkillProgress) -> Result<(), StoreError> {
    let mut skills = self.skills.write().await;
    match skills.get_mut(&skill.id) {
      Some(slot) => {
        *slot = skill.clone();
        Ok(())
      }
      None => Err(StoreError::NotFound { collection: "skill_progress", id: skill.id.clone() }),
    }
  }

  async fn delete_skills_of(&self, child_id: &str) -> Result<usize, StoreError> {
    let mut skills = self.skills.write().await;
    let before = skills.len();
    skills.retain(|_, s| s.child_id != child_id);
    Ok(before - skills.len())
  }

  async fn insert_activities(&self, activities: &[Activity]) -> Result<(), StoreError> {
    let mut store = self.activities.write().await;
    for a in activities {
      store.insert(a.id.clone(), a.clone());
    }
    Ok(())
  }

  async fn insert_achievement(&self, achievement: Achievement) -> Result<(), StoreError> {
    self.achievements.write().await.insert(achievement.id.clone(), achievement);
    Ok(())
  }

  async fn achievements_of(&self, child_id: &str) -> Result<Vec<Achievement>, StoreError> {
    let achievements = self.achievements.read().await;
    let mut out: Vec<Achievement> =
      achievements.values().filter(|a| a.child_id == child_id).cloned().collect();
    out.sort_by(|a, b| b.earned_at.cmp(&a.earned_at).then_with(|| b.id.cmp(&a.id)));
    Ok(out)
  }

  async fn count_achievements(
    &self,
    child_id: &str,
    kind: Option<AchievementKind>,
  ) -> Result<usize, StoreError> {
    let achievements = self.achievements.read().await;
    Ok(
      achievements
        .values()
        .filter(|a| a.child_id == child_id && kind.map_or(true, |k| a.achievement_type == k))
        .count(),
    )
  }

  async fn delete_achievements_of(&self, child_id: &str) -> Result<usize, StoreError> {
    let mut achievements = self.achievements.write().await;
    let before = achievements.len();
    achievements.retain(|_, a| a.child_id != child_id);
    Ok(before - achievements.len())
  }
}
