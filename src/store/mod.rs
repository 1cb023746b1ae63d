//! Persistence seams
//!
//! Each entity gets a small async trait describing exactly the operations the
//! engine needs. Every write is atomic at the storage layer: get-or-create is
//! an insert-if-absent on the natural key, increments are applied as deltas
//! against the stored row, and unlocks are conditional on the current state.
//! `SqliteStore` implements all of them over one pool.

mod achievements;
mod goals;
mod ledger;
mod metrics;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::config::DailyTargets;
use crate::error::EngineResult;
use crate::models::{
  Achievement, Activity, DerivedFields, EarnedAchievement, Goal, GoalFilter, MetricDelta,
  MetricRecord, NewAchievement, NewActivity, SleepEntry, UserAchievement, UserLedger, Vitals,
};
use crate::retry::WriteRetry;

/// Recomputes derived fields from a record's raw values. Supplied by the
/// aggregator so the store never owns the arithmetic.
pub type DeriveFn = fn(&MetricRecord) -> DerivedFields;

/// Mutation applied to a loaded goal inside the store's write transaction.
/// Returns the number of points to credit to the goal's owner.
pub type GoalMutation<'a> = &'a (dyn Fn(&mut Goal) -> EngineResult<i64> + Send + Sync);

/// ---------------------------------------------------------------------------
/// Store Traits
/// ---------------------------------------------------------------------------

#[async_trait]
pub trait MetricStore: Send + Sync + 'static {
  /// Insert-if-absent keyed by (user, day); concurrent callers converge on
  /// one record.
  async fn get_or_create(
    &self,
    user_id: &str,
    day: NaiveDate,
    defaults: &DailyTargets,
  ) -> EngineResult<MetricRecord>;

  async fn get(&self, user_id: &str, day: NaiveDate) -> EngineResult<Option<MetricRecord>>;

  /// Add `delta` to the stored record (creating it first if needed), then
  /// write the fields `derive` computes from the result.
  async fn apply_delta(
    &self,
    user_id: &str,
    day: NaiveDate,
    defaults: &DailyTargets,
    delta: &MetricDelta,
    derive: DeriveFn,
  ) -> EngineResult<MetricRecord>;

  /// Overwrite the day's sleep fields.
  async fn set_sleep(
    &self,
    user_id: &str,
    day: NaiveDate,
    defaults: &DailyTargets,
    entry: &SleepEntry,
    derive: DeriveFn,
  ) -> EngineResult<MetricRecord>;

  /// Write whichever readings are present in `vitals`.
  async fn set_vitals(
    &self,
    user_id: &str,
    day: NaiveDate,
    defaults: &DailyTargets,
    vitals: &Vitals,
  ) -> EngineResult<MetricRecord>;

  /// Records with `from <= day <= to`, newest first.
  async fn find_range(
    &self,
    user_id: &str,
    from: NaiveDate,
    to: NaiveDate,
    limit: Option<i64>,
  ) -> EngineResult<Vec<MetricRecord>>;
}

#[async_trait]
pub trait GoalStore: Send + Sync + 'static {
  /// Persist a new goal; id and timestamps are assigned by the store.
  async fn insert(&self, goal: &Goal) -> EngineResult<Goal>;

  async fn get(&self, goal_id: i64) -> EngineResult<Option<Goal>>;

  /// Load, mutate and write one goal atomically, crediting any points the
  /// mutation returns to the goal's owner in the same transaction.
  async fn modify(&self, goal_id: i64, mutation: GoalMutation<'_>) -> EngineResult<Goal>;

  /// Newest first.
  async fn list(
    &self,
    user_id: &str,
    filter: &GoalFilter,
    limit: Option<i64>,
  ) -> EngineResult<Vec<Goal>>;

  async fn count(&self, user_id: &str, filter: &GoalFilter) -> EngineResult<i64>;

  async fn delete(&self, goal_id: i64) -> EngineResult<bool>;
}

#[async_trait]
pub trait AchievementStore: Send + Sync + 'static {
  /// Insert or replace the catalog entry with the same title.
  async fn upsert(&self, achievement: &NewAchievement) -> EngineResult<Achievement>;

  async fn get(&self, achievement_id: i64) -> EngineResult<Option<Achievement>>;

  /// Active entries in display order.
  async fn list_active(&self) -> EngineResult<Vec<Achievement>>;
}

#[async_trait]
pub trait UserAchievementStore: Send + Sync + 'static {
  async fn get_or_create(
    &self,
    user_id: &str,
    achievement_id: i64,
    target: Option<f64>,
  ) -> EngineResult<UserAchievement>;

  async fn list_for_user(&self, user_id: &str) -> EngineResult<Vec<UserAchievement>>;

  /// Refresh the tracked progress of an unearned pairing. Earned pairings are
  /// left untouched.
  async fn record_progress(
    &self,
    user_id: &str,
    achievement_id: i64,
    current: f64,
    target: Option<f64>,
  ) -> EngineResult<()>;

  /// Set earned if not already earned and, only then, add `points` to the
  /// user's total. Returns whether this call performed the unlock.
  async fn unlock(
    &self,
    user_id: &str,
    achievement_id: i64,
    points: i64,
    current: f64,
    target: Option<f64>,
  ) -> EngineResult<bool>;

  /// Earned achievements, newest first.
  async fn earned(&self, user_id: &str, limit: Option<i64>) -> EngineResult<Vec<EarnedAchievement>>;

  async fn pending_notifications(&self, user_id: &str) -> EngineResult<Vec<EarnedAchievement>>;

  async fn mark_notified(&self, user_id: &str, achievement_id: i64) -> EngineResult<bool>;
}

#[async_trait]
pub trait UserStore: Send + Sync + 'static {
  async fn ensure(&self, user_id: &str) -> EngineResult<UserLedger>;

  async fn get(&self, user_id: &str) -> EngineResult<Option<UserLedger>>;

  async fn set_current_streak(&self, user_id: &str, streak: i64) -> EngineResult<UserLedger>;
}

#[async_trait]
pub trait ActivityStore: Send + Sync + 'static {
  async fn insert(&self, user_id: &str, activity: &NewActivity) -> EngineResult<Activity>;

  /// Insert the activity and add `delta` to the metric record of the day it
  /// was performed, in one transaction. Either both land or neither does.
  async fn insert_and_credit(
    &self,
    user_id: &str,
    activity: &NewActivity,
    defaults: &DailyTargets,
    delta: &MetricDelta,
    derive: DeriveFn,
  ) -> EngineResult<(Activity, MetricRecord)>;

  async fn count(&self, user_id: &str) -> EngineResult<i64>;

  /// Newest first.
  async fn recent(&self, user_id: &str, limit: i64) -> EngineResult<Vec<Activity>>;

  /// Activities with `from <= day <= to`, newest first.
  async fn in_range(
    &self,
    user_id: &str,
    from: NaiveDate,
    to: NaiveDate,
  ) -> EngineResult<Vec<Activity>>;
}

/// ---------------------------------------------------------------------------
/// SQLite Implementation
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SqliteStore {
  pool: SqlitePool,
  retry: WriteRetry,
}

impl SqliteStore {
  pub fn new(pool: SqlitePool) -> Self {
    Self {
      pool,
      retry: WriteRetry::default(),
    }
  }

  pub fn with_retry(mut self, retry: WriteRetry) -> Self {
    self.retry = retry;
    self
  }

  pub fn pool(&self) -> &SqlitePool {
    &self.pool
  }
}
