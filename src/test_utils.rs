//! Test utilities and helpers for unit testing
//!
//! This module provides common test infrastructure including:
//! - Database setup/teardown
//! - Seed helpers for the catalog, activities and goals
//! - Mock data factories

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use sqlx::SqlitePool;
use tempfile::TempDir;

use crate::config::{DailyTargets, EngineConfig};
use crate::models::{
  Achievement, AchievementCategory, ActivityType, CalorieMetrics, Criteria, GoalType, Intensity,
  MetricRecord, NewAchievement, NewActivity, NewGoal, Rarity, SleepMetrics, StepsMetrics,
  WaterMetrics,
};
use crate::store::{AchievementStore, ActivityStore, SqliteStore};
use crate::WellnessEngine;

/// ---------------------------------------------------------------------------
/// Database Test Utilities
/// ---------------------------------------------------------------------------

/// Create an in-memory SQLite database for testing
/// Runs all migrations and returns a ready-to-use pool
///
/// Uses max_connections(1) to prevent multiple pool connections from creating
/// isolated in-memory databases, which would cause intermittent test failures
pub async fn setup_test_db() -> SqlitePool {
  let pool = sqlx::sqlite::SqlitePoolOptions::new()
    .max_connections(1)
    .connect("sqlite::memory:")
    .await
    .expect("Failed to create in-memory database");

  crate::db::run_migrations(&pool)
    .await
    .expect("Failed to run migrations");

  pool
}

/// File-backed database with several connections, for tests that need real
/// concurrent writers. Keep the returned `TempDir` alive for the test's duration.
pub async fn setup_file_db(max_connections: u32) -> (TempDir, SqlitePool) {
  let dir = tempfile::tempdir().expect("Failed to create temp dir");
  let url = format!("sqlite://{}", dir.path().join("wellness.db").display());

  let pool = sqlx::sqlite::SqlitePoolOptions::new()
    .max_connections(max_connections)
    .connect_with(crate::db::connect_options(&url).expect("options"))
    .await
    .expect("Failed to create file database");

  crate::db::run_migrations(&pool)
    .await
    .expect("Failed to run migrations");

  (dir, pool)
}

/// Close a test database pool
pub async fn teardown_test_db(pool: SqlitePool) {
  pool.close().await;
}

pub async fn setup_test_store() -> Arc<SqliteStore> {
  Arc::new(SqliteStore::new(setup_test_db().await))
}

/// Fully wired engine over a fresh in-memory database
pub async fn setup_test_engine() -> WellnessEngine {
  WellnessEngine::new(setup_test_db().await, EngineConfig::default())
}

/// Seed a catalog entry and return it
pub async fn seed_test_achievement(
  store: &SqliteStore,
  title: &str,
  criteria: Criteria,
  points: i64,
) -> Achievement {
  AchievementStore::upsert(store, &mock_new_achievement(title, criteria, points))
    .await
    .expect("Failed to seed achievement")
}

/// Seed `count` activities for a user, one per day going back from today
pub async fn seed_test_activities(store: &SqliteStore, user_id: &str, count: usize) -> Vec<i64> {
  let mut ids = Vec::new();

  for i in 0..count {
    let mut activity = mock_new_activity(ActivityType::Walking);
    activity.performed_at = Some(Utc::now() - Duration::days(i as i64));
    let stored = ActivityStore::insert(store, user_id, &activity)
      .await
      .expect("Failed to insert test activity");
    ids.push(stored.id);
  }

  ids
}

/// ---------------------------------------------------------------------------
/// Mock Data Factories
/// ---------------------------------------------------------------------------

/// Zero-valued record with default targets, as created on the first event of a day
pub fn mock_metric_record(user_id: &str) -> MetricRecord {
  let targets = DailyTargets::default();
  let now = Utc::now();

  MetricRecord {
    id: 1,
    user_id: user_id.to_string(),
    day: now.date_naive(),
    steps: StepsMetrics {
      target: targets.steps,
      ..StepsMetrics::default()
    },
    calories: CalorieMetrics {
      target: targets.calories,
      remaining: targets.calories,
      ..CalorieMetrics::default()
    },
    water: WaterMetrics {
      target: targets.water_ml,
      ..WaterMetrics::default()
    },
    sleep: SleepMetrics {
      target: targets.sleep_hours,
      ..SleepMetrics::default()
    },
    heart_rate: Default::default(),
    blood_pressure: Default::default(),
    weight: Default::default(),
    created_at: now,
    updated_at: now,
  }
}

pub fn mock_new_goal(current_value: f64, target_value: f64, milestones: Vec<f64>) -> NewGoal {
  NewGoal {
    goal_type: GoalType::Steps,
    title: "Walk more".to_string(),
    description: None,
    current_value,
    target_value,
    unit: "steps".to_string(),
    start_date: None,
    target_date: Utc::now().date_naive() + Duration::days(30),
    milestones,
    category: None,
    priority: None,
  }
}

pub fn mock_new_achievement(title: &str, criteria: Criteria, points: i64) -> NewAchievement {
  NewAchievement {
    title: title.to_string(),
    description: format!("{} description", title),
    category: AchievementCategory::Milestone,
    icon: None,
    rarity: Rarity::Common,
    points,
    criteria,
    is_active: true,
    order: 0,
  }
}

pub fn mock_new_activity(activity_type: ActivityType) -> NewActivity {
  NewActivity {
    activity_type,
    name: "Evening walk".to_string(),
    duration_minutes: 30.0,
    distance_km: Some(2.5),
    calories: 150.0,
    steps: Some(3_000),
    intensity: Intensity::Moderate,
    performed_at: None,
    notes: None,
  }
}

/// ---------------------------------------------------------------------------
/// Time Helpers
/// ---------------------------------------------------------------------------

pub fn today() -> NaiveDate {
  Utc::now().date_naive()
}

pub fn days_ago(days: i64) -> NaiveDate {
  today() - Duration::days(days)
}

/// ---------------------------------------------------------------------------
/// Test Macros
/// ---------------------------------------------------------------------------

/// Assert two floats are approximately equal within a tolerance
#[macro_export]
macro_rules! assert_approx_eq {
  ($left:expr, $right:expr) => {
    $crate::assert_approx_eq!($left, $right, 1e-6);
  };
  ($left:expr, $right:expr, $tolerance:expr) => {{
    let diff = ($left - $right).abs();
    assert!(
      diff < $tolerance,
      "Values not approximately equal: {} vs {} (diff: {}, tolerance: {})",
      $left,
      $right,
      diff,
      $tolerance
    );
  }};
}

/// ---------------------------------------------------------------------------
/// Tests for Test Utilities
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_setup_db_creates_schema() {
    let pool = setup_test_db().await;

    let tables: Vec<(String,)> = sqlx::query_as(
      "SELECT name FROM sqlite_master WHERE type='table' AND name IN ('daily_metrics', 'goals', 'user_achievements')"
    )
    .fetch_all(&pool)
    .await
    .expect("Failed to query tables");

    assert_eq!(tables.len(), 3, "Expected 3 tables, got {}", tables.len());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_seed_activities_returns_correct_count() {
    let store = setup_test_store().await;

    let ids = seed_test_activities(&store, "user-1", 4).await;
    assert_eq!(ids.len(), 4);

    let count = ActivityStore::count(store.as_ref(), "user-1").await.unwrap();
    assert_eq!(count, 4);
  }

  #[test]
  fn test_mock_record_uses_default_targets() {
    let record = mock_metric_record("user-1");
    assert_eq!(record.steps.target, 10_000);
    assert_eq!(record.calories.remaining, record.calories.target);
    assert_eq!(record.water.current, 0.0);
  }
}
