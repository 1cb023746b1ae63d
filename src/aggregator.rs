//! Daily metric aggregation
//!
//! One record per (user, UTC day). Event sources feed it through additive
//! operations; derived fields are recomputed by [`derive_fields`] before every
//! write. The aggregator never triggers achievement evaluation itself.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::debug;

use crate::config::DailyTargets;
use crate::error::{ensure_non_negative, ensure_user_id, EngineError, EngineResult};
use crate::models::{DerivedFields, Macros, MetricDelta, MetricRecord, SleepEntry, Vitals};
use crate::store::MetricStore;

pub const ML_PER_GLASS: f64 = 250.0;

/// Recompute every derived field from a record's raw values.
///
/// - `calories.remaining = target - (consumed - burned)`
/// - `water.glasses = current / 250`
/// - `water.hydrationLevel = round(current / target * 100)`, 0 when target is 0
pub fn derive_fields(record: &MetricRecord) -> DerivedFields {
  let calories = &record.calories;
  let water = &record.water;

  let hydration_level = if water.target > 0.0 {
    (water.current / water.target * 100.0).round() as i64
  } else {
    0
  };

  DerivedFields {
    calories_remaining: calories.target - (calories.consumed - calories.burned),
    water_glasses: water.current / ML_PER_GLASS,
    hydration_level,
  }
}

/// Validated delta for a step entry. Missing optional values count as zero.
pub fn steps_delta(
  steps: i64,
  distance: Option<f64>,
  active_minutes: Option<f64>,
  calories_burned: Option<f64>,
) -> EngineResult<MetricDelta> {
  if steps < 0 {
    return Err(EngineError::invalid("steps cannot be negative"));
  }
  Ok(MetricDelta {
    steps,
    distance: ensure_non_negative("distance", distance.unwrap_or(0.0))?,
    active_minutes: ensure_non_negative("activeMinutes", active_minutes.unwrap_or(0.0))?,
    calories_burned: ensure_non_negative("caloriesBurned", calories_burned.unwrap_or(0.0))?,
    ..MetricDelta::default()
  })
}

/// UTC calendar day used as the record key
pub fn today() -> NaiveDate {
  Utc::now().date_naive()
}

pub struct DailyMetricAggregator {
  store: Arc<dyn MetricStore>,
  targets: DailyTargets,
}

impl DailyMetricAggregator {
  pub fn new(store: Arc<dyn MetricStore>, targets: DailyTargets) -> Self {
    Self { store, targets }
  }

  /// Targets stamped onto records this aggregator creates.
  pub fn targets(&self) -> &DailyTargets {
    &self.targets
  }

  pub async fn get_or_create_today(&self, user_id: &str) -> EngineResult<MetricRecord> {
    self.get_or_create_on(user_id, today()).await
  }

  pub async fn get_or_create_on(&self, user_id: &str, day: NaiveDate) -> EngineResult<MetricRecord> {
    ensure_user_id(user_id)?;
    self.store.get_or_create(user_id, day, &self.targets).await
  }

  /// Read-only lookup; never creates a record.
  pub async fn get(&self, user_id: &str, day: NaiveDate) -> EngineResult<Option<MetricRecord>> {
    ensure_user_id(user_id)?;
    self.store.get(user_id, day).await
  }

  /// ---------------------------------------------------------------------------
  /// Additive Operations
  /// ---------------------------------------------------------------------------

  pub async fn add_steps(
    &self,
    user_id: &str,
    steps: i64,
    distance: Option<f64>,
    active_minutes: Option<f64>,
    calories_burned: Option<f64>,
  ) -> EngineResult<MetricRecord> {
    self
      .add_steps_on(user_id, today(), steps, distance, active_minutes, calories_burned)
      .await
  }

  pub async fn add_steps_on(
    &self,
    user_id: &str,
    day: NaiveDate,
    steps: i64,
    distance: Option<f64>,
    active_minutes: Option<f64>,
    calories_burned: Option<f64>,
  ) -> EngineResult<MetricRecord> {
    let delta = steps_delta(steps, distance, active_minutes, calories_burned)?;

    debug!(user_id, %day, steps, "adding steps");
    self.apply(user_id, day, &delta).await
  }

  pub async fn add_water(&self, user_id: &str, amount_ml: f64) -> EngineResult<MetricRecord> {
    self.add_water_on(user_id, today(), amount_ml).await
  }

  pub async fn add_water_on(
    &self,
    user_id: &str,
    day: NaiveDate,
    amount_ml: f64,
  ) -> EngineResult<MetricRecord> {
    let amount_ml = ensure_non_negative("amount", amount_ml)?;

    debug!(user_id, %day, amount_ml, "adding water");
    self.apply(user_id, day, &MetricDelta::water(amount_ml)).await
  }

  pub async fn add_meal(
    &self,
    user_id: &str,
    calories: f64,
    macros: Macros,
  ) -> EngineResult<MetricRecord> {
    self.add_meal_on(user_id, today(), calories, macros).await
  }

  pub async fn add_meal_on(
    &self,
    user_id: &str,
    day: NaiveDate,
    calories: f64,
    macros: Macros,
  ) -> EngineResult<MetricRecord> {
    let calories = ensure_non_negative("calories", calories)?;
    let macros = Macros {
      protein: ensure_non_negative("protein", macros.protein)?,
      carbs: ensure_non_negative("carbs", macros.carbs)?,
      fat: ensure_non_negative("fat", macros.fat)?,
      fiber: ensure_non_negative("fiber", macros.fiber)?,
    };

    debug!(user_id, %day, calories, "adding meal");
    self.apply(user_id, day, &MetricDelta::meal(calories, macros)).await
  }

  async fn apply(&self, user_id: &str, day: NaiveDate, delta: &MetricDelta) -> EngineResult<MetricRecord> {
    ensure_user_id(user_id)?;
    self
      .store
      .apply_delta(user_id, day, &self.targets, delta, derive_fields)
      .await
  }

  /// ---------------------------------------------------------------------------
  /// Overwrite Operations
  /// ---------------------------------------------------------------------------

  /// One night per day: replaces whatever sleep was recorded for `day`.
  pub async fn record_sleep_on(
    &self,
    user_id: &str,
    day: NaiveDate,
    entry: &SleepEntry,
  ) -> EngineResult<MetricRecord> {
    ensure_user_id(user_id)?;
    ensure_non_negative("duration", entry.duration_hours)?;
    if !(0..=100).contains(&entry.quality) {
      return Err(EngineError::invalid("quality must be between 0 and 100"));
    }
    for (field, hours) in [
      ("deepSleep", entry.deep_hours),
      ("lightSleep", entry.light_hours),
      ("remSleep", entry.rem_hours),
    ] {
      if let Some(hours) = hours {
        ensure_non_negative(field, hours)?;
      }
    }

    debug!(user_id, %day, duration = entry.duration_hours, "recording sleep");
    self
      .store
      .set_sleep(user_id, day, &self.targets, entry, derive_fields)
      .await
  }

  pub async fn record_vitals_on(
    &self,
    user_id: &str,
    day: NaiveDate,
    vitals: &Vitals,
  ) -> EngineResult<MetricRecord> {
    ensure_user_id(user_id)?;
    if let Some(hr) = vitals.heart_rate {
      let readings = [hr.resting, hr.average, hr.max, hr.min];
      if readings.iter().flatten().any(|bpm| *bpm <= 0) {
        return Err(EngineError::invalid("heart rate readings must be positive"));
      }
    }
    if let Some((systolic, diastolic)) = vitals.blood_pressure {
      if systolic <= 0 || diastolic <= 0 {
        return Err(EngineError::invalid("blood pressure readings must be positive"));
      }
    }
    if let Some(value) = vitals.weight.and_then(|w| w.value) {
      ensure_non_negative("weight", value)?;
    }

    debug!(user_id, %day, "recording vitals");
    self.store.set_vitals(user_id, day, &self.targets, vitals).await
  }

  /// History, newest first. `from` must not be after `to`.
  pub async fn metrics_in_range(
    &self,
    user_id: &str,
    from: NaiveDate,
    to: NaiveDate,
    limit: Option<i64>,
  ) -> EngineResult<Vec<MetricRecord>> {
    ensure_user_id(user_id)?;
    if from > to {
      return Err(EngineError::invalid("startDate must not be after endDate"));
    }
    self.store.find_range(user_id, from, to, limit).await
  }
}
