use async_trait::async_trait;
use chrono::Utc;

use super::ledger::credit_points;
use super::{AchievementStore, SqliteStore, UserAchievementStore};
use crate::error::EngineResult;
use crate::models::{Achievement, EarnedAchievement, NewAchievement, UserAchievement};

const DEFAULT_ICON: &str = "🏆";

const EARNED_SELECT: &str = r#"
  SELECT a.*, ua.earned_date AS ua_earned_date, ua.notified AS ua_notified
  FROM user_achievements ua
  JOIN achievements a ON a.id = ua.achievement_id
  WHERE ua.user_id = ?1 AND ua.earned = 1
"#;

impl SqliteStore {
  async fn upsert_achievement_once(&self, achievement: &NewAchievement) -> EngineResult<Achievement> {
    let (metric, threshold, condition) = achievement.criteria.to_columns();
    let now = Utc::now();

    let stored = sqlx::query_as(
      r#"
      INSERT INTO achievements (
        title, description, category, icon, rarity, points, criteria_type,
        criteria_metric, criteria_threshold, criteria_condition, is_active,
        sort_order, created_at, updated_at
      )
      VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)
      ON CONFLICT(title) DO UPDATE SET
        description = excluded.description,
        category = excluded.category,
        icon = excluded.icon,
        rarity = excluded.rarity,
        points = excluded.points,
        criteria_type = excluded.criteria_type,
        criteria_metric = excluded.criteria_metric,
        criteria_threshold = excluded.criteria_threshold,
        criteria_condition = excluded.criteria_condition,
        is_active = excluded.is_active,
        sort_order = excluded.sort_order,
        updated_at = excluded.updated_at
      RETURNING *
      "#,
    )
    .bind(&achievement.title)
    .bind(&achievement.description)
    .bind(achievement.category.as_str())
    .bind(achievement.icon.as_deref().unwrap_or(DEFAULT_ICON))
    .bind(achievement.rarity.as_str())
    .bind(achievement.points)
    .bind(achievement.criteria.kind())
    .bind(metric)
    .bind(threshold)
    .bind(condition)
    .bind(achievement.is_active)
    .bind(achievement.order)
    .bind(now)
    .fetch_one(&self.pool)
    .await?;

    Ok(stored)
  }

  async fn get_or_create_pairing_once(
    &self,
    user_id: &str,
    achievement_id: i64,
    target: Option<f64>,
  ) -> EngineResult<UserAchievement> {
    let mut tx = self.pool.begin().await?;
    let now = Utc::now();

    sqlx::query(
      r#"
      INSERT INTO user_achievements (
        user_id, achievement_id, progress_target, created_at, updated_at
      )
      VALUES (?1, ?2, ?3, ?4, ?4)
      ON CONFLICT(user_id, achievement_id) DO NOTHING
      "#,
    )
    .bind(user_id)
    .bind(achievement_id)
    .bind(target)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let pairing = sqlx::query_as(
      "SELECT * FROM user_achievements WHERE user_id = ?1 AND achievement_id = ?2",
    )
    .bind(user_id)
    .bind(achievement_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(pairing)
  }

  async fn record_progress_once(
    &self,
    user_id: &str,
    achievement_id: i64,
    current: f64,
    target: Option<f64>,
  ) -> EngineResult<()> {
    sqlx::query(
      r#"
      INSERT INTO user_achievements (
        user_id, achievement_id, progress_current, progress_target, created_at, updated_at
      )
      VALUES (?1, ?2, ?3, ?4, ?5, ?5)
      ON CONFLICT(user_id, achievement_id) DO UPDATE SET
        progress_current = excluded.progress_current,
        progress_target = excluded.progress_target,
        updated_at = excluded.updated_at
      WHERE user_achievements.earned = 0
      "#,
    )
    .bind(user_id)
    .bind(achievement_id)
    .bind(current)
    .bind(target)
    .bind(Utc::now())
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn unlock_once(
    &self,
    user_id: &str,
    achievement_id: i64,
    points: i64,
    current: f64,
    target: Option<f64>,
  ) -> EngineResult<bool> {
    let mut tx = self.pool.begin().await?;
    let now = Utc::now();

    // The conflict branch only fires for a pairing that is still unearned, so
    // exactly one caller ever sees a changed row
    let result = sqlx::query(
      r#"
      INSERT INTO user_achievements (
        user_id, achievement_id, earned, earned_date, progress_current,
        progress_target, created_at, updated_at
      )
      VALUES (?1, ?2, 1, ?3, ?4, ?5, ?3, ?3)
      ON CONFLICT(user_id, achievement_id) DO UPDATE SET
        earned = 1,
        earned_date = excluded.earned_date,
        progress_current = excluded.progress_current,
        progress_target = excluded.progress_target,
        updated_at = excluded.updated_at
      WHERE user_achievements.earned = 0
      "#,
    )
    .bind(user_id)
    .bind(achievement_id)
    .bind(now)
    .bind(current)
    .bind(target)
    .execute(&mut *tx)
    .await?;

    let unlocked = result.rows_affected() == 1;
    if unlocked {
      credit_points(&mut *tx, user_id, points).await?;
    }

    tx.commit().await?;
    Ok(unlocked)
  }
}

#[async_trait]
impl AchievementStore for SqliteStore {
  async fn upsert(&self, achievement: &NewAchievement) -> EngineResult<Achievement> {
    self
      .retry
      .run("achievements.upsert", move || {
        self.upsert_achievement_once(achievement)
      })
      .await
  }

  async fn get(&self, achievement_id: i64) -> EngineResult<Option<Achievement>> {
    let achievement = sqlx::query_as("SELECT * FROM achievements WHERE id = ?1")
      .bind(achievement_id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(achievement)
  }

  async fn list_active(&self) -> EngineResult<Vec<Achievement>> {
    let achievements =
      sqlx::query_as("SELECT * FROM achievements WHERE is_active = 1 ORDER BY sort_order, id")
        .fetch_all(&self.pool)
        .await?;
    Ok(achievements)
  }
}

#[async_trait]
impl UserAchievementStore for SqliteStore {
  async fn get_or_create(
    &self,
    user_id: &str,
    achievement_id: i64,
    target: Option<f64>,
  ) -> EngineResult<UserAchievement> {
    self
      .retry
      .run("user_achievements.get_or_create", move || {
        self.get_or_create_pairing_once(user_id, achievement_id, target)
      })
      .await
  }

  async fn list_for_user(&self, user_id: &str) -> EngineResult<Vec<UserAchievement>> {
    let pairings = sqlx::query_as("SELECT * FROM user_achievements WHERE user_id = ?1 ORDER BY id")
      .bind(user_id)
      .fetch_all(&self.pool)
      .await?;
    Ok(pairings)
  }

  async fn record_progress(
    &self,
    user_id: &str,
    achievement_id: i64,
    current: f64,
    target: Option<f64>,
  ) -> EngineResult<()> {
    self
      .retry
      .run("user_achievements.record_progress", move || {
        self.record_progress_once(user_id, achievement_id, current, target)
      })
      .await
  }

  async fn unlock(
    &self,
    user_id: &str,
    achievement_id: i64,
    points: i64,
    current: f64,
    target: Option<f64>,
  ) -> EngineResult<bool> {
    self
      .retry
      .run("user_achievements.unlock", move || {
        self.unlock_once(user_id, achievement_id, points, current, target)
      })
      .await
  }

  async fn earned(&self, user_id: &str, limit: Option<i64>) -> EngineResult<Vec<EarnedAchievement>> {
    let query = format!("{} ORDER BY ua.earned_date DESC, ua.id DESC LIMIT ?2", EARNED_SELECT);
    let earned = sqlx::query_as(&query)
      .bind(user_id)
      .bind(limit.unwrap_or(-1))
      .fetch_all(&self.pool)
      .await?;
    Ok(earned)
  }

  async fn pending_notifications(&self, user_id: &str) -> EngineResult<Vec<EarnedAchievement>> {
    let query = format!("{} AND ua.notified = 0 ORDER BY ua.earned_date, ua.id", EARNED_SELECT);
    let pending = sqlx::query_as(&query)
      .bind(user_id)
      .fetch_all(&self.pool)
      .await?;
    Ok(pending)
  }

  async fn mark_notified(&self, user_id: &str, achievement_id: i64) -> EngineResult<bool> {
    self
      .retry
      .run("user_achievements.mark_notified", move || async move {
        let result = sqlx::query(
          r#"
          UPDATE user_achievements
          SET notified = 1, updated_at = ?1
          WHERE user_id = ?2 AND achievement_id = ?3 AND earned = 1 AND notified = 0
          "#,
        )
        .bind(Utc::now())
        .bind(user_id)
        .bind(achievement_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
      })
      .await
  }
}
