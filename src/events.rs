//! External events into metric updates
//!
//! Each event is applied to the day's metric record first; the achievement
//! scan runs afterwards and is best-effort. A failing scan is logged and never
//! fails the event that triggered it.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::achievements::AchievementEngine;
use crate::aggregator::{derive_fields, steps_delta, today, DailyMetricAggregator};
use crate::error::{ensure_non_negative, ensure_user_id, EngineError, EngineResult};
use crate::models::{Achievement, Activity, Macros, MetricRecord, NewActivity, SleepEntry};
use crate::store::ActivityStore;

/// Result of an event plus whatever it unlocked.
#[derive(Debug, Clone, Serialize)]
pub struct Recorded<T> {
  pub value: T,
  pub unlocked: Vec<Achievement>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoggedActivity {
  pub activity: Activity,
  pub metrics: MetricRecord,
}

fn validate_activity(activity: &NewActivity) -> EngineResult<()> {
  if activity.name.trim().is_empty() {
    return Err(EngineError::invalid("activity name is required"));
  }
  ensure_non_negative("duration", activity.duration_minutes)?;
  ensure_non_negative("calories", activity.calories)?;
  if let Some(distance) = activity.distance_km {
    ensure_non_negative("distance", distance)?;
  }
  if activity.steps.is_some_and(|steps| steps < 0) {
    return Err(EngineError::invalid("steps cannot be negative"));
  }
  Ok(())
}

pub struct EventRecorder {
  metrics: Arc<DailyMetricAggregator>,
  achievements: Arc<AchievementEngine>,
  activities: Arc<dyn ActivityStore>,
}

impl EventRecorder {
  pub fn new(
    metrics: Arc<DailyMetricAggregator>,
    achievements: Arc<AchievementEngine>,
    activities: Arc<dyn ActivityStore>,
  ) -> Self {
    Self {
      metrics,
      achievements,
      activities,
    }
  }

  /// Store the activity and credit its steps, distance, duration and
  /// calories to the metric record of the day it was performed. Both writes
  /// share one transaction, so a rejected credit leaves no activity behind.
  pub async fn log_activity(
    &self,
    user_id: &str,
    activity: NewActivity,
  ) -> EngineResult<Recorded<LoggedActivity>> {
    ensure_user_id(user_id)?;
    validate_activity(&activity)?;

    let delta = steps_delta(
      activity.steps.unwrap_or(0),
      activity.distance_km,
      Some(activity.duration_minutes),
      Some(activity.calories),
    )?;
    let (activity, metrics) = self
      .activities
      .insert_and_credit(user_id, &activity, self.metrics.targets(), &delta, derive_fields)
      .await?;

    info!(user_id, activity_id = activity.id, kind = %activity.activity_type, "activity logged");
    Ok(self.finish(user_id, LoggedActivity { activity, metrics }).await)
  }

  pub async fn log_meal(
    &self,
    user_id: &str,
    day: Option<NaiveDate>,
    calories: f64,
    macros: Macros,
  ) -> EngineResult<Recorded<MetricRecord>> {
    let record = self
      .metrics
      .add_meal_on(user_id, day.unwrap_or_else(today), calories, macros)
      .await?;
    Ok(self.finish(user_id, record).await)
  }

  pub async fn log_sleep(
    &self,
    user_id: &str,
    day: Option<NaiveDate>,
    entry: &SleepEntry,
  ) -> EngineResult<Recorded<MetricRecord>> {
    let record = self
      .metrics
      .record_sleep_on(user_id, day.unwrap_or_else(today), entry)
      .await?;
    Ok(self.finish(user_id, record).await)
  }

  /// Manual step entry for today.
  pub async fn log_steps(
    &self,
    user_id: &str,
    steps: i64,
    distance: Option<f64>,
    active_minutes: Option<f64>,
    calories_burned: Option<f64>,
  ) -> EngineResult<Recorded<MetricRecord>> {
    let record = self
      .metrics
      .add_steps(user_id, steps, distance, active_minutes, calories_burned)
      .await?;
    Ok(self.finish(user_id, record).await)
  }

  pub async fn log_water(&self, user_id: &str, amount_ml: f64) -> EngineResult<Recorded<MetricRecord>> {
    let record = self.metrics.add_water(user_id, amount_ml).await?;
    Ok(self.finish(user_id, record).await)
  }

  async fn finish<T>(&self, user_id: &str, value: T) -> Recorded<T> {
    let unlocked = match self.achievements.check_achievements(user_id).await {
      Ok(report) => report.unlocked,
      Err(e) => {
        warn!(user_id, error = %e, "achievement check failed after event");
        Vec::new()
      }
    };
    Recorded { value, unlocked }
  }
}
