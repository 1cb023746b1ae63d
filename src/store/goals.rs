use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqliteConnection;

use super::ledger::credit_points;
use super::{GoalMutation, GoalStore, SqliteStore};
use crate::error::{EngineError, EngineResult};
use crate::models::{Goal, GoalFilter};

async fn write_goal(conn: &mut SqliteConnection, goal: &Goal) -> EngineResult<Goal> {
  let milestones_json = serde_json::to_string(&goal.milestones)?;

  let stored = sqlx::query_as(
    r#"
    UPDATE goals
    SET title = ?1,
        description = ?2,
        current_value = ?3,
        target_value = ?4,
        target_date = ?5,
        status = ?6,
        progress = ?7,
        milestones_json = ?8,
        completed_date = ?9,
        category = ?10,
        priority = ?11,
        bonus_awarded = ?12,
        updated_at = ?13
    WHERE id = ?14
    RETURNING *
    "#,
  )
  .bind(&goal.title)
  .bind(goal.description.as_deref())
  .bind(goal.current_value)
  .bind(goal.target_value)
  .bind(goal.target_date)
  .bind(goal.status.as_str())
  .bind(goal.progress)
  .bind(milestones_json)
  .bind(goal.completed_date)
  .bind(goal.category.map(|c| c.as_str()))
  .bind(goal.priority.as_str())
  .bind(goal.bonus_awarded)
  .bind(Utc::now())
  .bind(goal.id)
  .fetch_one(conn)
  .await?;

  Ok(stored)
}

impl SqliteStore {
  async fn insert_goal_once(&self, goal: &Goal) -> EngineResult<Goal> {
    let milestones_json = serde_json::to_string(&goal.milestones)?;
    let now = Utc::now();

    let stored = sqlx::query_as(
      r#"
      INSERT INTO goals (
        user_id, goal_type, title, description, current_value, target_value,
        unit, start_date, target_date, status, progress, milestones_json,
        completed_date, category, priority, bonus_awarded, created_at, updated_at
      )
      VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?17)
      RETURNING *
      "#,
    )
    .bind(&goal.user_id)
    .bind(goal.goal_type.as_str())
    .bind(&goal.title)
    .bind(goal.description.as_deref())
    .bind(goal.current_value)
    .bind(goal.target_value)
    .bind(&goal.unit)
    .bind(goal.start_date)
    .bind(goal.target_date)
    .bind(goal.status.as_str())
    .bind(goal.progress)
    .bind(milestones_json)
    .bind(goal.completed_date)
    .bind(goal.category.map(|c| c.as_str()))
    .bind(goal.priority.as_str())
    .bind(goal.bonus_awarded)
    .bind(now)
    .fetch_one(&self.pool)
    .await?;

    Ok(stored)
  }

  async fn modify_goal_once(&self, goal_id: i64, mutation: GoalMutation<'_>) -> EngineResult<Goal> {
    let mut tx = self.pool.begin().await?;

    // Take the write lock before reading so the load below cannot go stale
    let touched = sqlx::query("UPDATE goals SET updated_at = updated_at WHERE id = ?1")
      .bind(goal_id)
      .execute(&mut *tx)
      .await?;
    if touched.rows_affected() == 0 {
      return Err(EngineError::not_found(format!("Goal {}", goal_id)));
    }

    let mut goal: Goal = sqlx::query_as("SELECT * FROM goals WHERE id = ?1")
      .bind(goal_id)
      .fetch_one(&mut *tx)
      .await?;

    let points = mutation(&mut goal)?;
    let goal = write_goal(&mut *tx, &goal).await?;

    if points != 0 {
      credit_points(&mut *tx, &goal.user_id, points).await?;
    }

    tx.commit().await?;
    Ok(goal)
  }
}

#[async_trait]
impl GoalStore for SqliteStore {
  async fn insert(&self, goal: &Goal) -> EngineResult<Goal> {
    self
      .retry
      .run("goals.insert", move || self.insert_goal_once(goal))
      .await
  }

  async fn get(&self, goal_id: i64) -> EngineResult<Option<Goal>> {
    let goal = sqlx::query_as("SELECT * FROM goals WHERE id = ?1")
      .bind(goal_id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(goal)
  }

  async fn modify(&self, goal_id: i64, mutation: GoalMutation<'_>) -> EngineResult<Goal> {
    self
      .retry
      .run("goals.modify", move || self.modify_goal_once(goal_id, mutation))
      .await
  }

  async fn list(
    &self,
    user_id: &str,
    filter: &GoalFilter,
    limit: Option<i64>,
  ) -> EngineResult<Vec<Goal>> {
    let goals = sqlx::query_as(
      r#"
      SELECT * FROM goals
      WHERE user_id = ?1
        AND (?2 IS NULL OR status = ?2)
        AND (?3 IS NULL OR goal_type = ?3)
      ORDER BY created_at DESC, id DESC
      LIMIT ?4
      "#,
    )
    .bind(user_id)
    .bind(filter.status.map(|s| s.as_str()))
    .bind(filter.goal_type.map(|t| t.as_str()))
    .bind(limit.unwrap_or(-1))
    .fetch_all(&self.pool)
    .await?;
    Ok(goals)
  }

  async fn count(&self, user_id: &str, filter: &GoalFilter) -> EngineResult<i64> {
    let count = sqlx::query_scalar(
      r#"
      SELECT COUNT(*) FROM goals
      WHERE user_id = ?1
        AND (?2 IS NULL OR status = ?2)
        AND (?3 IS NULL OR goal_type = ?3)
      "#,
    )
    .bind(user_id)
    .bind(filter.status.map(|s| s.as_str()))
    .bind(filter.goal_type.map(|t| t.as_str()))
    .fetch_one(&self.pool)
    .await?;
    Ok(count)
  }

  async fn delete(&self, goal_id: i64) -> EngineResult<bool> {
    self
      .retry
      .run("goals.delete", move || async move {
        let result = sqlx::query("DELETE FROM goals WHERE id = ?1")
          .bind(goal_id)
          .execute(&self.pool)
          .await?;
        Ok(result.rows_affected() > 0)
      })
      .await
  }
}
