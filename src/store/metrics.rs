use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::SqliteConnection;

use super::{DeriveFn, MetricStore, SqliteStore};
use crate::config::DailyTargets;
use crate::error::{EngineError, EngineResult};
use crate::models::{DerivedFields, MetricDelta, MetricRecord, SleepEntry, Vitals};

/// Insert the zero-valued record for (user, day) unless it already exists.
/// Being the first statement of a transaction, this also takes the write lock.
async fn ensure_day(
  conn: &mut SqliteConnection,
  user_id: &str,
  day: NaiveDate,
  defaults: &DailyTargets,
) -> Result<(), sqlx::Error> {
  let now = Utc::now();
  sqlx::query(
    r#"
    INSERT INTO daily_metrics (
      user_id, day, steps_target, calories_target, calories_remaining,
      water_target, sleep_target, created_at, updated_at
    )
    VALUES (?1, ?2, ?3, ?4, ?4, ?5, ?6, ?7, ?7)
    ON CONFLICT(user_id, day) DO NOTHING
    "#,
  )
  .bind(user_id)
  .bind(day)
  .bind(defaults.steps)
  .bind(defaults.calories)
  .bind(defaults.water_ml)
  .bind(defaults.sleep_hours)
  .bind(now)
  .execute(conn)
  .await?;

  Ok(())
}

async fn write_derived(
  conn: &mut SqliteConnection,
  record_id: i64,
  derived: DerivedFields,
) -> Result<MetricRecord, sqlx::Error> {
  sqlx::query_as(
    r#"
    UPDATE daily_metrics
    SET calories_remaining = ?1,
        water_glasses = ?2,
        water_hydration_level = ?3
    WHERE id = ?4
    RETURNING *
    "#,
  )
  .bind(derived.calories_remaining)
  .bind(derived.water_glasses)
  .bind(derived.hydration_level)
  .bind(record_id)
  .fetch_one(conn)
  .await
}

/// Add `delta` to the (user, day) record inside the caller's transaction,
/// creating the record first if needed. A step total that would leave the
/// i64 range is rejected before anything is written.
pub(super) async fn apply_delta_in(
  conn: &mut SqliteConnection,
  user_id: &str,
  day: NaiveDate,
  defaults: &DailyTargets,
  delta: &MetricDelta,
  derive: DeriveFn,
) -> EngineResult<MetricRecord> {
  ensure_day(&mut *conn, user_id, day, defaults).await?;

  let (steps,): (i64,) =
    sqlx::query_as("SELECT steps_current FROM daily_metrics WHERE user_id = ?1 AND day = ?2")
      .bind(user_id)
      .bind(day)
      .fetch_one(&mut *conn)
      .await?;
  if steps.checked_add(delta.steps).is_none() {
    return Err(EngineError::invalid(format!(
      "adding {} steps to {} overflows the daily total",
      delta.steps, steps
    )));
  }

  let now = Utc::now();
  let last_intake = delta.touches_water().then_some(now);

  // Deltas are added in SQL against the stored values, never assigned
  let record: MetricRecord = sqlx::query_as(
    r#"
    UPDATE daily_metrics
    SET steps_current = steps_current + ?1,
        steps_distance = steps_distance + ?2,
        steps_active_minutes = steps_active_minutes + ?3,
        steps_calories_burned = steps_calories_burned + ?4,
        calories_burned = calories_burned + ?4,
        calories_consumed = calories_consumed + ?5,
        macros_protein = macros_protein + ?6,
        macros_carbs = macros_carbs + ?7,
        macros_fat = macros_fat + ?8,
        macros_fiber = macros_fiber + ?9,
        water_current = water_current + ?10,
        water_last_intake = COALESCE(?11, water_last_intake),
        updated_at = ?12
    WHERE user_id = ?13 AND day = ?14
    RETURNING *
    "#,
  )
  .bind(delta.steps)
  .bind(delta.distance)
  .bind(delta.active_minutes)
  .bind(delta.calories_burned)
  .bind(delta.calories_consumed)
  .bind(delta.macros.protein)
  .bind(delta.macros.carbs)
  .bind(delta.macros.fat)
  .bind(delta.macros.fiber)
  .bind(delta.water_ml)
  .bind(last_intake)
  .bind(now)
  .bind(user_id)
  .bind(day)
  .fetch_one(&mut *conn)
  .await?;

  let record = write_derived(&mut *conn, record.id, derive(&record)).await?;
  Ok(record)
}

impl SqliteStore {
  async fn get_or_create_once(
    &self,
    user_id: &str,
    day: NaiveDate,
    defaults: &DailyTargets,
  ) -> EngineResult<MetricRecord> {
    let mut tx = self.pool.begin().await?;
    ensure_day(&mut *tx, user_id, day, defaults).await?;

    let record: MetricRecord =
      sqlx::query_as("SELECT * FROM daily_metrics WHERE user_id = ?1 AND day = ?2")
        .bind(user_id)
        .bind(day)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(record)
  }

  async fn apply_delta_once(
    &self,
    user_id: &str,
    day: NaiveDate,
    defaults: &DailyTargets,
    delta: &MetricDelta,
    derive: DeriveFn,
  ) -> EngineResult<MetricRecord> {
    let mut tx = self.pool.begin().await?;
    let record = apply_delta_in(&mut *tx, user_id, day, defaults, delta, derive).await?;
    tx.commit().await?;
    Ok(record)
  }

  async fn set_sleep_once(
    &self,
    user_id: &str,
    day: NaiveDate,
    defaults: &DailyTargets,
    entry: &SleepEntry,
    derive: DeriveFn,
  ) -> EngineResult<MetricRecord> {
    let mut tx = self.pool.begin().await?;
    ensure_day(&mut *tx, user_id, day, defaults).await?;

    let record: MetricRecord = sqlx::query_as(
      r#"
      UPDATE daily_metrics
      SET sleep_duration = ?1,
          sleep_quality = ?2,
          sleep_bedtime = ?3,
          sleep_wake_time = ?4,
          sleep_deep = ?5,
          sleep_light = ?6,
          sleep_rem = ?7,
          updated_at = ?8
      WHERE user_id = ?9 AND day = ?10
      RETURNING *
      "#,
    )
    .bind(entry.duration_hours)
    .bind(entry.quality)
    .bind(entry.bedtime.as_deref())
    .bind(entry.wake_time.as_deref())
    .bind(entry.deep_hours.unwrap_or(0.0))
    .bind(entry.light_hours.unwrap_or(0.0))
    .bind(entry.rem_hours.unwrap_or(0.0))
    .bind(Utc::now())
    .bind(user_id)
    .bind(day)
    .fetch_one(&mut *tx)
    .await?;

    let record = write_derived(&mut *tx, record.id, derive(&record)).await?;

    tx.commit().await?;
    Ok(record)
  }

  async fn set_vitals_once(
    &self,
    user_id: &str,
    day: NaiveDate,
    defaults: &DailyTargets,
    vitals: &Vitals,
  ) -> EngineResult<MetricRecord> {
    let mut tx = self.pool.begin().await?;
    ensure_day(&mut *tx, user_id, day, defaults).await?;

    let now = Utc::now();
    let hr = vitals.heart_rate.unwrap_or_default();
    let (systolic, diastolic) = vitals.blood_pressure.unzip();
    let measured_at = vitals.blood_pressure.map(|_| now);
    let weight_value = vitals.weight.and_then(|w| w.value);
    let weight_unit = vitals.weight.map(|w| w.unit.as_str());

    let record: MetricRecord = sqlx::query_as(
      r#"
      UPDATE daily_metrics
      SET hr_resting = COALESCE(?1, hr_resting),
          hr_average = COALESCE(?2, hr_average),
          hr_max = COALESCE(?3, hr_max),
          hr_min = COALESCE(?4, hr_min),
          bp_systolic = COALESCE(?5, bp_systolic),
          bp_diastolic = COALESCE(?6, bp_diastolic),
          bp_measured_at = COALESCE(?7, bp_measured_at),
          weight_value = COALESCE(?8, weight_value),
          weight_unit = COALESCE(?9, weight_unit),
          updated_at = ?10
      WHERE user_id = ?11 AND day = ?12
      RETURNING *
      "#,
    )
    .bind(hr.resting)
    .bind(hr.average)
    .bind(hr.max)
    .bind(hr.min)
    .bind(systolic)
    .bind(diastolic)
    .bind(measured_at)
    .bind(weight_value)
    .bind(weight_unit)
    .bind(now)
    .bind(user_id)
    .bind(day)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(record)
  }
}

#[async_trait]
impl MetricStore for SqliteStore {
  async fn get_or_create(
    &self,
    user_id: &str,
    day: NaiveDate,
    defaults: &DailyTargets,
  ) -> EngineResult<MetricRecord> {
    self
      .retry
      .run("metrics.get_or_create", move || {
        self.get_or_create_once(user_id, day, defaults)
      })
      .await
  }

  async fn get(&self, user_id: &str, day: NaiveDate) -> EngineResult<Option<MetricRecord>> {
    let record = sqlx::query_as("SELECT * FROM daily_metrics WHERE user_id = ?1 AND day = ?2")
      .bind(user_id)
      .bind(day)
      .fetch_optional(&self.pool)
      .await?;
    Ok(record)
  }

  async fn apply_delta(
    &self,
    user_id: &str,
    day: NaiveDate,
    defaults: &DailyTargets,
    delta: &MetricDelta,
    derive: DeriveFn,
  ) -> EngineResult<MetricRecord> {
    self
      .retry
      .run("metrics.apply_delta", move || {
        self.apply_delta_once(user_id, day, defaults, delta, derive)
      })
      .await
  }

  async fn set_sleep(
    &self,
    user_id: &str,
    day: NaiveDate,
    defaults: &DailyTargets,
    entry: &SleepEntry,
    derive: DeriveFn,
  ) -> EngineResult<MetricRecord> {
    self
      .retry
      .run("metrics.set_sleep", move || {
        self.set_sleep_once(user_id, day, defaults, entry, derive)
      })
      .await
  }

  async fn set_vitals(
    &self,
    user_id: &str,
    day: NaiveDate,
    defaults: &DailyTargets,
    vitals: &Vitals,
  ) -> EngineResult<MetricRecord> {
    self
      .retry
      .run("metrics.set_vitals", move || {
        self.set_vitals_once(user_id, day, defaults, vitals)
      })
      .await
  }

  async fn find_range(
    &self,
    user_id: &str,
    from: NaiveDate,
    to: NaiveDate,
    limit: Option<i64>,
  ) -> EngineResult<Vec<MetricRecord>> {
    // SQLite treats a negative LIMIT as unbounded
    let records = sqlx::query_as(
      r#"
      SELECT * FROM daily_metrics
      WHERE user_id = ?1 AND day >= ?2 AND day <= ?3
      ORDER BY day DESC
      LIMIT ?4
      "#,
    )
    .bind(user_id)
    .bind(from)
    .bind(to)
    .bind(limit.unwrap_or(-1))
    .fetch_all(&self.pool)
    .await?;
    Ok(records)
  }
}
