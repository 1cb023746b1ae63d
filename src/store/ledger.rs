use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::SqliteConnection;

use super::metrics::apply_delta_in;
use super::{ActivityStore, DeriveFn, SqliteStore, UserStore};
use crate::config::DailyTargets;
use crate::error::EngineResult;
use crate::models::{Activity, MetricDelta, MetricRecord, NewActivity, UserLedger};

async fn ensure_user(conn: &mut SqliteConnection, user_id: &str) -> Result<(), sqlx::Error> {
  sqlx::query("INSERT INTO users (id) VALUES (?1) ON CONFLICT(id) DO NOTHING")
    .bind(user_id)
    .execute(conn)
    .await?;
  Ok(())
}

/// Add `points` to the user's running total inside the caller's transaction.
pub(super) async fn credit_points(
  conn: &mut SqliteConnection,
  user_id: &str,
  points: i64,
) -> Result<(), sqlx::Error> {
  ensure_user(&mut *conn, user_id).await?;
  sqlx::query(
    "UPDATE users SET total_points = total_points + ?1, updated_at = ?2 WHERE id = ?3",
  )
  .bind(points)
  .bind(Utc::now())
  .bind(user_id)
  .execute(conn)
  .await?;
  Ok(())
}

async fn insert_activity(
  conn: &mut SqliteConnection,
  user_id: &str,
  activity: &NewActivity,
) -> Result<Activity, sqlx::Error> {
  let now = Utc::now();
  let performed_at = activity.performed_at.unwrap_or(now);

  sqlx::query_as(
    r#"
    INSERT INTO activities (
      user_id, activity_type, name, duration_minutes, distance_km, calories,
      steps, intensity, performed_at, day, notes, created_at
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
    RETURNING *
    "#,
  )
  .bind(user_id)
  .bind(activity.activity_type.as_str())
  .bind(&activity.name)
  .bind(activity.duration_minutes)
  .bind(activity.distance_km)
  .bind(activity.calories)
  .bind(activity.steps.unwrap_or(0))
  .bind(activity.intensity.as_str())
  .bind(performed_at)
  .bind(performed_at.date_naive())
  .bind(activity.notes.as_deref())
  .bind(now)
  .fetch_one(conn)
  .await
}

impl SqliteStore {
  async fn ensure_user_once(&self, user_id: &str) -> EngineResult<UserLedger> {
    let mut tx = self.pool.begin().await?;
    ensure_user(&mut *tx, user_id).await?;
    let ledger = sqlx::query_as(
      "SELECT id, current_streak, total_points FROM users WHERE id = ?1",
    )
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(ledger)
  }

  async fn set_streak_once(&self, user_id: &str, streak: i64) -> EngineResult<UserLedger> {
    let mut tx = self.pool.begin().await?;
    ensure_user(&mut *tx, user_id).await?;
    let ledger = sqlx::query_as(
      r#"
      UPDATE users SET current_streak = ?1, updated_at = ?2
      WHERE id = ?3
      RETURNING id, current_streak, total_points
      "#,
    )
    .bind(streak)
    .bind(Utc::now())
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(ledger)
  }

  async fn insert_activity_once(
    &self,
    user_id: &str,
    activity: &NewActivity,
  ) -> EngineResult<Activity> {
    let mut conn = self.pool.acquire().await?;
    let stored = insert_activity(&mut *conn, user_id, activity).await?;
    Ok(stored)
  }

  async fn insert_and_credit_once(
    &self,
    user_id: &str,
    activity: &NewActivity,
    defaults: &DailyTargets,
    delta: &MetricDelta,
    derive: DeriveFn,
  ) -> EngineResult<(Activity, MetricRecord)> {
    let mut tx = self.pool.begin().await?;
    let stored = insert_activity(&mut *tx, user_id, activity).await?;
    let record = apply_delta_in(&mut *tx, user_id, stored.day, defaults, delta, derive).await?;
    tx.commit().await?;
    Ok((stored, record))
  }
}

#[async_trait]
impl UserStore for SqliteStore {
  async fn ensure(&self, user_id: &str) -> EngineResult<UserLedger> {
    self
      .retry
      .run("users.ensure", move || self.ensure_user_once(user_id))
      .await
  }

  async fn get(&self, user_id: &str) -> EngineResult<Option<UserLedger>> {
    let ledger = sqlx::query_as("SELECT id, current_streak, total_points FROM users WHERE id = ?1")
      .bind(user_id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(ledger)
  }

  async fn set_current_streak(&self, user_id: &str, streak: i64) -> EngineResult<UserLedger> {
    self
      .retry
      .run("users.set_current_streak", move || {
        self.set_streak_once(user_id, streak)
      })
      .await
  }
}

#[async_trait]
impl ActivityStore for SqliteStore {
  async fn insert(&self, user_id: &str, activity: &NewActivity) -> EngineResult<Activity> {
    self
      .retry
      .run("activities.insert", move || {
        self.insert_activity_once(user_id, activity)
      })
      .await
  }

  async fn insert_and_credit(
    &self,
    user_id: &str,
    activity: &NewActivity,
    defaults: &DailyTargets,
    delta: &MetricDelta,
    derive: DeriveFn,
  ) -> EngineResult<(Activity, MetricRecord)> {
    self
      .retry
      .run("activities.insert_and_credit", move || {
        self.insert_and_credit_once(user_id, activity, defaults, delta, derive)
      })
      .await
  }

  async fn count(&self, user_id: &str) -> EngineResult<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM activities WHERE user_id = ?1")
      .bind(user_id)
      .fetch_one(&self.pool)
      .await?;
    Ok(count)
  }

  async fn recent(&self, user_id: &str, limit: i64) -> EngineResult<Vec<Activity>> {
    let activities = sqlx::query_as(
      r#"
      SELECT * FROM activities
      WHERE user_id = ?1
      ORDER BY performed_at DESC, id DESC
      LIMIT ?2
      "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(&self.pool)
    .await?;
    Ok(activities)
  }

  async fn in_range(
    &self,
    user_id: &str,
    from: NaiveDate,
    to: NaiveDate,
  ) -> EngineResult<Vec<Activity>> {
    let activities = sqlx::query_as(
      r#"
      SELECT * FROM activities
      WHERE user_id = ?1 AND day >= ?2 AND day <= ?3
      ORDER BY performed_at DESC, id DESC
      "#,
    )
    .bind(user_id)
    .bind(from)
    .bind(to)
    .fetch_all(&self.pool)
    .await?;
    Ok(activities)
  }
}
