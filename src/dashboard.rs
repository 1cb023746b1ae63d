//! Dashboard views
//!
//! Read-side composition over the other components. Scores are recomputed
//! from the stored records on every call; nothing here is cached or written,
//! apart from the overview's get-or-create of today's record and ledger row.

use std::sync::Arc;

use chrono::{NaiveDate, TimeDelta};
use serde::Serialize;

use crate::achievements::AchievementEngine;
use crate::aggregator::{today, DailyMetricAggregator};
use crate::config::{DashboardLimits, EngineConfig, InsightThresholds};
use crate::error::{ensure_user_id, EngineError, EngineResult};
use crate::goals::GoalTracker;
use crate::models::{text_enum, Activity, EarnedAchievement, Goal, GoalFilter, MetricRecord, UserLedger};
use crate::scoring::{WellnessScore, WellnessScorer};
use crate::store::{ActivityStore, UserStore};

text_enum! {
  pub enum TrendMetric {
    Steps => "steps",
    Calories => "calories",
    Water => "water",
    Sleep => "sleep",
  }
}

text_enum! {
  pub enum InsightKind {
    Steps => "steps",
    Water => "water",
    Sleep => "sleep",
  }
}

/// ---------------------------------------------------------------------------
/// View Types
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklySummary {
  pub total_activities: usize,
  pub total_calories: f64,
  pub total_distance: f64,
  /// Mean of the per-day scores over days that have a record; 0 if none
  pub avg_wellness_score: i64,
  pub days_recorded: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Overview {
  pub today: MetricRecord,
  pub wellness_score: WellnessScore,
  pub weekly: WeeklySummary,
  pub recent_activities: Vec<Activity>,
  pub active_goals: Vec<Goal>,
  pub active_goal_count: i64,
  pub recent_achievements: Vec<EarnedAchievement>,
  pub user: UserLedger,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityTotals {
  pub count: usize,
  pub total_duration: f64,
  pub total_calories: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailySummary {
  pub day: NaiveDate,
  pub metrics: Option<MetricRecord>,
  pub wellness_score: Option<WellnessScore>,
  pub activities: ActivityTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
  pub kind: InsightKind,
  pub average: f64,
  /// Percentage of recorded days on which the target was reached
  pub goal_met_pct: f64,
  pub message: String,
  pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
  pub date: NaiveDate,
  pub value: f64,
  pub target: f64,
}

/// ---------------------------------------------------------------------------
/// Pure Helpers
/// ---------------------------------------------------------------------------

/// First day of a window of `days` days ending on `end` (inclusive). A window
/// reaching past the representable calendar is InvalidInput.
pub fn window_start(end: NaiveDate, days: i64) -> EngineResult<NaiveDate> {
  TimeDelta::try_days(days.max(1) - 1)
    .and_then(|span| end.checked_sub_signed(span))
    .ok_or_else(|| EngineError::invalid(format!("a window of {} days is out of range", days)))
}

pub fn average_score(scores: &[i64]) -> i64 {
  if scores.is_empty() {
    return 0;
  }
  (scores.iter().sum::<i64>() as f64 / scores.len() as f64).round() as i64
}

pub fn activity_totals(activities: &[Activity]) -> ActivityTotals {
  ActivityTotals {
    count: activities.len(),
    total_duration: activities.iter().map(|a| a.duration_minutes).sum(),
    total_calories: activities.iter().map(|a| a.calories).sum(),
  }
}

fn trend_value(record: &MetricRecord, metric: TrendMetric) -> (f64, f64) {
  match metric {
    TrendMetric::Steps => (record.steps.current as f64, record.steps.target as f64),
    TrendMetric::Calories => (record.calories.consumed, record.calories.target),
    TrendMetric::Water => (record.water.current, record.water.target),
    TrendMetric::Sleep => (record.sleep.duration, record.sleep.target),
  }
}

/// (average, percentage of days with current >= target)
fn summarize(samples: &[(f64, f64)]) -> (f64, f64) {
  if samples.is_empty() {
    return (0.0, 0.0);
  }
  let n = samples.len() as f64;
  let average = samples.iter().map(|(current, _)| current).sum::<f64>() / n;
  let met = samples.iter().filter(|(current, target)| current >= target).count() as f64;
  (average, met / n * 100.0)
}

/// Build the textual insights for a window of records. Empty input yields no
/// insights.
pub fn build_insights(records: &[MetricRecord], thresholds: &InsightThresholds) -> Vec<Insight> {
  if records.is_empty() {
    return Vec::new();
  }

  let samples = |metric: TrendMetric| -> Vec<(f64, f64)> {
    records.iter().map(|r| trend_value(r, metric)).collect()
  };

  let (avg_steps, steps_met) = summarize(&samples(TrendMetric::Steps));
  let (avg_water, water_met) = summarize(&samples(TrendMetric::Water));
  let (avg_sleep, sleep_met) = summarize(&samples(TrendMetric::Sleep));

  vec![
    Insight {
      kind: InsightKind::Steps,
      average: avg_steps,
      goal_met_pct: steps_met,
      message: format!(
        "Your average daily steps are {}. You've met your step goal {:.0}% of the time.",
        avg_steps.round(),
        steps_met
      ),
      recommendation: if avg_steps < thresholds.steps {
        "Try to increase your daily activity by taking short walks throughout the day."
      } else {
        "Great job! Keep maintaining your active lifestyle."
      }
      .to_string(),
    },
    Insight {
      kind: InsightKind::Water,
      average: avg_water,
      goal_met_pct: water_met,
      message: format!("Your average daily water intake is {}ml.", avg_water.round()),
      recommendation: if avg_water < thresholds.water_ml {
        "Consider setting reminders to drink water throughout the day."
      } else {
        "Excellent hydration habits! Keep it up."
      }
      .to_string(),
    },
    Insight {
      kind: InsightKind::Sleep,
      average: avg_sleep,
      goal_met_pct: sleep_met,
      message: format!("Your average sleep duration is {:.1} hours per night.", avg_sleep),
      recommendation: if avg_sleep < thresholds.sleep_hours {
        "Aim for 7-9 hours of sleep per night for optimal health."
      } else {
        "Your sleep schedule looks healthy!"
      }
      .to_string(),
    },
  ]
}

/// ---------------------------------------------------------------------------
/// Dashboard Aggregator
/// ---------------------------------------------------------------------------

pub struct DashboardAggregator {
  metrics: Arc<DailyMetricAggregator>,
  goals: Arc<GoalTracker>,
  achievements: Arc<AchievementEngine>,
  activities: Arc<dyn ActivityStore>,
  users: Arc<dyn UserStore>,
  scorer: WellnessScorer,
  limits: DashboardLimits,
  thresholds: InsightThresholds,
}

impl DashboardAggregator {
  pub fn new(
    metrics: Arc<DailyMetricAggregator>,
    goals: Arc<GoalTracker>,
    achievements: Arc<AchievementEngine>,
    activities: Arc<dyn ActivityStore>,
    users: Arc<dyn UserStore>,
    config: &EngineConfig,
  ) -> Self {
    Self {
      metrics,
      goals,
      achievements,
      activities,
      users,
      scorer: WellnessScorer::new(config.weights),
      limits: config.dashboard,
      thresholds: config.insights,
    }
  }

  pub async fn overview(&self, user_id: &str) -> EngineResult<Overview> {
    ensure_user_id(user_id)?;

    let day = today();
    let record = self.metrics.get_or_create_on(user_id, day).await?;
    let wellness_score = self.scorer.score(&record);
    let weekly = self.weekly_summary(user_id, day).await?;

    let recent_activities = self
      .activities
      .recent(user_id, self.limits.recent_activities)
      .await?;
    let active_goals = self.goals.active(user_id, self.limits.active_goals).await?;
    let active_goal_count = self.goals.count(user_id, &GoalFilter::active()).await?;
    let recent_achievements = self
      .achievements
      .earned(user_id, Some(self.limits.recent_achievements))
      .await?;
    let user = self.users.ensure(user_id).await?;

    Ok(Overview {
      today: record,
      wellness_score,
      weekly,
      recent_activities,
      active_goals,
      active_goal_count,
      recent_achievements,
      user,
    })
  }

  /// Totals over the configured trailing window ending on `end`.
  pub async fn weekly_summary(&self, user_id: &str, end: NaiveDate) -> EngineResult<WeeklySummary> {
    let from = window_start(end, self.limits.weekly_window_days)?;

    let activities = self.activities.in_range(user_id, from, end).await?;
    let records = self.metrics.metrics_in_range(user_id, from, end, None).await?;
    let scores: Vec<i64> = records.iter().map(|r| self.scorer.score(r).score).collect();

    Ok(WeeklySummary {
      total_activities: activities.len(),
      total_calories: activities.iter().map(|a| a.calories).sum(),
      total_distance: activities.iter().filter_map(|a| a.distance_km).sum(),
      avg_wellness_score: average_score(&scores),
      days_recorded: records.len(),
    })
  }

  pub async fn daily_summary(&self, user_id: &str, day: NaiveDate) -> EngineResult<DailySummary> {
    let metrics = self.metrics.get(user_id, day).await?;
    let wellness_score = metrics.as_ref().map(|r| self.scorer.score(r));
    let activities = self.activities.in_range(user_id, day, day).await?;

    Ok(DailySummary {
      day,
      metrics,
      wellness_score,
      activities: activity_totals(&activities),
    })
  }

  /// Steps, water and sleep insights over the insight window. Empty when the
  /// user has no records in the window.
  pub async fn insights(&self, user_id: &str) -> EngineResult<Vec<Insight>> {
    let end = today();
    let from = window_start(end, self.limits.insight_window_days)?;
    let records = self.metrics.metrics_in_range(user_id, from, end, None).await?;

    Ok(build_insights(&records, &self.thresholds))
  }

  /// Per-day values for the last `days` days, oldest first. Days without a
  /// record are absent.
  pub async fn trends(
    &self,
    user_id: &str,
    metric: TrendMetric,
    days: i64,
  ) -> EngineResult<Vec<TrendPoint>> {
    if days < 1 {
      return Err(EngineError::invalid("days must be at least 1"));
    }
    let end = today();
    let from = window_start(end, days)?;
    let mut records = self.metrics.metrics_in_range(user_id, from, end, None).await?;
    records.reverse();

    Ok(
      records
        .iter()
        .map(|record| {
          let (value, target) = trend_value(record, metric);
          TrendPoint {
            date: record.day,
            value,
            target,
          }
        })
        .collect(),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::SleepEntry;
  use crate::test_utils::{
    days_ago, mock_metric_record, mock_new_goal, seed_test_activities, setup_test_engine,
  };
  use crate::{assert_approx_eq, test_utils};

  #[test]
  fn test_window_start_is_inclusive() {
    let end = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();

    assert_eq!(window_start(end, 7).unwrap(), NaiveDate::from_ymd_opt(2026, 3, 4).unwrap());
    assert_eq!(window_start(end, 1).unwrap(), end);
    assert_eq!(window_start(end, 0).unwrap(), end);
  }

  #[test]
  fn test_average_score_of_nothing_is_zero() {
    assert_eq!(average_score(&[]), 0);
    assert_eq!(average_score(&[25, 13]), 19);
  }

  #[test]
  fn test_insights_choose_recommendation_by_threshold() {
    // Arrange
    let mut active = mock_metric_record("user-1");
    active.steps.current = 10_000;
    let mut lazy = mock_metric_record("user-1");
    lazy.steps.current = 4_000;

    // Act
    let insights = build_insights(&[active, lazy], &InsightThresholds::default());

    // Assert
    let steps = &insights[0];
    assert_eq!(steps.kind, InsightKind::Steps);
    assert_approx_eq!(steps.average, 7_000.0);
    assert_approx_eq!(steps.goal_met_pct, 50.0);
    assert_eq!(
      steps.message,
      "Your average daily steps are 7000. You've met your step goal 50% of the time."
    );
    assert!(steps.recommendation.starts_with("Try to increase"));
  }

  #[test]
  fn test_insight_thresholds_are_configurable() {
    let mut record = mock_metric_record("user-1");
    record.steps.current = 4_000;
    let thresholds = InsightThresholds {
      steps: 3_000.0,
      ..InsightThresholds::default()
    };

    let insights = build_insights(&[record], &thresholds);

    assert!(insights[0].recommendation.starts_with("Great job"));
  }

  #[test]
  fn test_no_records_no_insights() {
    assert!(build_insights(&[], &InsightThresholds::default()).is_empty());
  }

  #[tokio::test]
  async fn test_overview_for_new_user() {
    let engine = setup_test_engine().await;

    let overview = engine.dashboard.overview("user-1").await.unwrap();

    assert_eq!(overview.today.day, test_utils::today());
    assert_eq!(overview.wellness_score.score, 0);
    assert_eq!(overview.weekly.avg_wellness_score, 0);
    assert_eq!(overview.weekly.days_recorded, 1);
    assert!(overview.recent_activities.is_empty());
    assert!(overview.active_goals.is_empty());
    assert_eq!(overview.user.total_points, 0);
  }

  #[tokio::test]
  async fn test_weekly_summary_covers_window_only() {
    // Arrange
    let engine = setup_test_engine().await;
    seed_test_activities(&engine.store, "user-1", 10).await;
    engine
      .metrics
      .add_steps_on("user-1", test_utils::today(), 10_000, None, None, None)
      .await
      .unwrap(); // 25
    engine
      .metrics
      .add_steps_on("user-1", days_ago(1), 5_000, None, None, None)
      .await
      .unwrap(); // 12.5 -> 13
    engine
      .metrics
      .add_steps_on("user-1", days_ago(10), 20_000, None, None, None)
      .await
      .unwrap();

    // Act
    let weekly = engine
      .dashboard
      .weekly_summary("user-1", test_utils::today())
      .await
      .unwrap();

    // Assert
    assert_eq!(weekly.total_activities, 7);
    assert_approx_eq!(weekly.total_calories, 1_050.0);
    assert_approx_eq!(weekly.total_distance, 17.5);
    assert_eq!(weekly.days_recorded, 2);
    assert_eq!(weekly.avg_wellness_score, 19);
  }

  #[tokio::test]
  async fn test_overview_limits_lists() {
    let engine = setup_test_engine().await;
    seed_test_activities(&engine.store, "user-1", 8).await;
    for _ in 0..4 {
      engine
        .goals
        .create("user-1", mock_new_goal(0.0, 100.0, vec![]))
        .await
        .unwrap();
    }

    let overview = engine.dashboard.overview("user-1").await.unwrap();

    assert_eq!(overview.recent_activities.len(), 5);
    assert_eq!(overview.active_goals.len(), 3);
    assert_eq!(overview.active_goal_count, 4);
  }

  #[tokio::test]
  async fn test_daily_summary_without_record() {
    let engine = setup_test_engine().await;
    seed_test_activities(&engine.store, "user-1", 1).await;

    let summary = engine
      .dashboard
      .daily_summary("user-1", test_utils::today())
      .await
      .unwrap();

    assert!(summary.metrics.is_none());
    assert!(summary.wellness_score.is_none());
    assert_eq!(summary.activities.count, 1);
    assert_approx_eq!(summary.activities.total_duration, 30.0);
    assert_approx_eq!(summary.activities.total_calories, 150.0);
  }

  #[tokio::test]
  async fn test_trends_are_oldest_first() {
    // Arrange
    let engine = setup_test_engine().await;
    let sleep = |hours: f64| SleepEntry {
      duration_hours: hours,
      quality: 80,
      ..SleepEntry::default()
    };
    for (ago, hours) in [(0, 8.0), (2, 6.5), (9, 9.0)] {
      engine
        .metrics
        .record_sleep_on("user-1", days_ago(ago), &sleep(hours))
        .await
        .unwrap();
    }

    // Act
    let points = engine
      .dashboard
      .trends("user-1", TrendMetric::Sleep, 7)
      .await
      .unwrap();

    // Assert
    assert_eq!(points.len(), 2);
    assert_eq!(points[0].date, days_ago(2));
    assert_approx_eq!(points[0].value, 6.5);
    assert_approx_eq!(points[1].value, 8.0);
    assert_approx_eq!(points[1].target, 8.0);
  }

  #[tokio::test]
  async fn test_trends_reject_empty_window() {
    let engine = setup_test_engine().await;

    let result = engine.dashboard.trends("user-1", TrendMetric::Steps, 0).await;

    assert!(matches!(result, Err(EngineError::InvalidInput(_))));
  }

  #[tokio::test]
  async fn test_trends_reject_window_beyond_calendar() {
    let engine = setup_test_engine().await;

    for days in [1_000_000_000_000, 100_000_000, i64::MAX] {
      let result = engine.dashboard.trends("user-1", TrendMetric::Steps, days).await;
      assert!(matches!(result, Err(EngineError::InvalidInput(_))), "days = {}", days);
    }
  }

  #[test]
  fn test_window_start_out_of_range() {
    let end = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();

    assert!(matches!(window_start(end, i64::MAX), Err(EngineError::InvalidInput(_))));
    assert!(matches!(window_start(end, 100_000_000), Err(EngineError::InvalidInput(_))));
  }

  #[tokio::test]
  async fn test_insights_read_stored_window() {
    let engine = setup_test_engine().await;
    assert!(engine.dashboard.insights("user-1").await.unwrap().is_empty());

    engine.metrics.add_water("user-1", 2_500.0).await.unwrap();
    let insights = engine.dashboard.insights("user-1").await.unwrap();

    assert_eq!(insights.len(), 3);
    assert_eq!(insights[1].kind, InsightKind::Water);
    assert_approx_eq!(insights[1].goal_met_pct, 100.0);
    assert_eq!(insights[1].message, "Your average daily water intake is 2500ml.");
  }
}
