//! Achievement evaluation and unlocking
//!
//! Per (user, achievement) the state machine is `unearned -> earned`, with no
//! reverse edge. A scan evaluates every active, unearned catalog entry against
//! the user's current state; each entry is evaluated in isolation so one
//! failure never stops the rest. Unlocking is conditional at the store level,
//! which makes repeated or concurrent scans award points exactly once.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::aggregator::today;
use crate::error::{ensure_user_id, EngineError, EngineResult};
use crate::models::{
  Achievement, AchievementProgress, CountMetric, Criteria, EarnedAchievement, MetricPath,
  MetricRecord, NewAchievement, UserAchievement,
};
use crate::store::{AchievementStore, ActivityStore, MetricStore, UserAchievementStore, UserStore};

/// ---------------------------------------------------------------------------
/// Criteria Evaluation (pure)
/// ---------------------------------------------------------------------------

/// User state a scan evaluates against, loaded once per scan.
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
  /// Today's record, if one exists yet
  pub today: Option<MetricRecord>,
  pub current_streak: i64,
  pub activity_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Evaluation {
  Met { current: f64, target: f64 },
  NotMet { current: f64, target: f64 },
  /// Not evaluated automatically
  Skipped,
}

pub fn evaluate(criteria: &Criteria, ctx: &EvaluationContext) -> EngineResult<Evaluation> {
  let (current, target) = match criteria {
    Criteria::Value { metric, threshold } => {
      // An unresolvable path is simply not met
      let current = ctx
        .today
        .as_ref()
        .and_then(|record| metric.resolve(record))
        .unwrap_or(0.0);
      (current, *threshold)
    }
    Criteria::Streak { threshold } => (ctx.current_streak as f64, *threshold),
    Criteria::Count { metric, threshold } => match metric {
      CountMetric::Activities => (ctx.activity_count as f64, *threshold),
      CountMetric::Unsupported(_) => (0.0, *threshold),
    },
    Criteria::Custom { .. } => return Ok(Evaluation::Skipped),
    Criteria::Invalid { reason } => return Err(EngineError::invalid(reason.clone())),
  };

  let met = match criteria {
    Criteria::Value { metric, .. } if !metric.is_supported() => false,
    Criteria::Count {
      metric: CountMetric::Unsupported(_),
      ..
    } => false,
    _ => current >= target,
  };

  Ok(if met {
    Evaluation::Met { current, target }
  } else {
    Evaluation::NotMet { current, target }
  })
}

/// ---------------------------------------------------------------------------
/// Scan Report
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ScanFailure {
  pub achievement_id: i64,
  pub title: String,
  pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
  /// Catalog entries evaluated (active and not yet earned)
  pub checked: usize,
  /// Entries this scan unlocked
  pub unlocked: Vec<Achievement>,
  pub skipped: usize,
  pub failures: Vec<ScanFailure>,
}

impl ScanReport {
  pub fn points_awarded(&self) -> i64 {
    self.unlocked.iter().map(|a| a.points).sum()
  }
}

/// ---------------------------------------------------------------------------
/// Engine
/// ---------------------------------------------------------------------------

enum Outcome {
  Unlocked,
  /// Not met, or earned by someone else's concurrent scan
  Pending,
  Skipped,
}

pub struct AchievementEngine {
  catalog: Arc<dyn AchievementStore>,
  user_achievements: Arc<dyn UserAchievementStore>,
  metrics: Arc<dyn MetricStore>,
  activities: Arc<dyn ActivityStore>,
  users: Arc<dyn UserStore>,
}

impl AchievementEngine {
  pub fn new(
    catalog: Arc<dyn AchievementStore>,
    user_achievements: Arc<dyn UserAchievementStore>,
    metrics: Arc<dyn MetricStore>,
    activities: Arc<dyn ActivityStore>,
    users: Arc<dyn UserStore>,
  ) -> Self {
    Self {
      catalog,
      user_achievements,
      metrics,
      activities,
      users,
    }
  }

  async fn load_context(&self, user_id: &str) -> EngineResult<EvaluationContext> {
    let record = self.metrics.get(user_id, today()).await?;
    let current_streak = self
      .users
      .get(user_id)
      .await?
      .map(|u| u.current_streak)
      .unwrap_or(0);
    let activity_count = self.activities.count(user_id).await?;

    Ok(EvaluationContext {
      today: record,
      current_streak,
      activity_count,
    })
  }

  /// Evaluate every active, unearned achievement for the user and unlock the
  /// ones whose criteria pass. Safe to call any number of times.
  pub async fn check_achievements(&self, user_id: &str) -> EngineResult<ScanReport> {
    ensure_user_id(user_id)?;

    let catalog = self.catalog.list_active().await?;
    let earned: HashSet<i64> = self
      .user_achievements
      .list_for_user(user_id)
      .await?
      .into_iter()
      .filter(|ua| ua.earned)
      .map(|ua| ua.achievement_id)
      .collect();
    let ctx = self.load_context(user_id).await?;

    let mut report = ScanReport::default();
    for achievement in catalog.into_iter().filter(|a| !earned.contains(&a.id)) {
      report.checked += 1;

      match self.evaluate_one(user_id, &achievement, &ctx).await {
        Ok(Outcome::Unlocked) => report.unlocked.push(achievement),
        Ok(Outcome::Pending) => {}
        Ok(Outcome::Skipped) => report.skipped += 1,
        Err(e) => {
          warn!(
            user_id,
            achievement_id = achievement.id,
            title = %achievement.title,
            error = %e,
            "achievement evaluation failed"
          );
          report.failures.push(ScanFailure {
            achievement_id: achievement.id,
            title: achievement.title.clone(),
            error: e.to_string(),
          });
        }
      }
    }

    debug!(
      user_id,
      checked = report.checked,
      unlocked = report.unlocked.len(),
      failed = report.failures.len(),
      "achievement scan finished"
    );
    Ok(report)
  }

  async fn evaluate_one(
    &self,
    user_id: &str,
    achievement: &Achievement,
    ctx: &EvaluationContext,
  ) -> EngineResult<Outcome> {
    match evaluate(&achievement.criteria, ctx)? {
      Evaluation::Met { current, target } => {
        let unlocked = self
          .user_achievements
          .unlock(user_id, achievement.id, achievement.points, current, Some(target))
          .await?;
        if !unlocked {
          // A concurrent scan got there first
          return Ok(Outcome::Pending);
        }
        info!(
          user_id,
          achievement_id = achievement.id,
          title = %achievement.title,
          points = achievement.points,
          "achievement unlocked"
        );
        Ok(Outcome::Unlocked)
      }
      Evaluation::NotMet { current, target } => {
        self
          .user_achievements
          .record_progress(user_id, achievement.id, current, Some(target))
          .await?;
        Ok(Outcome::Pending)
      }
      Evaluation::Skipped => Ok(Outcome::Skipped),
    }
  }

  /// ---------------------------------------------------------------------------
  /// Views
  /// ---------------------------------------------------------------------------

  /// Active catalog merged with the user's state, in display order.
  pub async fn list_with_progress(&self, user_id: &str) -> EngineResult<Vec<AchievementProgress>> {
    ensure_user_id(user_id)?;

    let catalog = self.catalog.list_active().await?;
    let pairings: HashMap<i64, UserAchievement> = self
      .user_achievements
      .list_for_user(user_id)
      .await?
      .into_iter()
      .map(|ua| (ua.achievement_id, ua))
      .collect();

    let merged = catalog
      .into_iter()
      .map(|achievement| {
        let pairing = pairings.get(&achievement.id);
        AchievementProgress {
          earned: pairing.is_some_and(|p| p.earned),
          earned_date: pairing.and_then(|p| p.earned_date),
          progress_current: pairing.map(|p| p.progress_current).unwrap_or(0.0),
          progress_target: pairing
            .and_then(|p| p.progress_target)
            .or_else(|| achievement.criteria.threshold()),
          achievement,
        }
      })
      .collect();

    Ok(merged)
  }

  /// Newest first.
  pub async fn earned(&self, user_id: &str, limit: Option<i64>) -> EngineResult<Vec<EarnedAchievement>> {
    ensure_user_id(user_id)?;
    self.user_achievements.earned(user_id, limit).await
  }

  /// The user's pairing record for one achievement, created on first access.
  pub async fn progress(&self, user_id: &str, achievement_id: i64) -> EngineResult<UserAchievement> {
    ensure_user_id(user_id)?;
    let achievement = self
      .catalog
      .get(achievement_id)
      .await?
      .ok_or_else(|| EngineError::not_found(format!("Achievement {}", achievement_id)))?;

    self
      .user_achievements
      .get_or_create(user_id, achievement.id, achievement.criteria.threshold())
      .await
  }

  /// Earned but not yet acknowledged by a notification layer, oldest first.
  pub async fn pending_notifications(&self, user_id: &str) -> EngineResult<Vec<EarnedAchievement>> {
    ensure_user_id(user_id)?;
    self.user_achievements.pending_notifications(user_id).await
  }

  pub async fn mark_notified(&self, user_id: &str, achievement_id: i64) -> EngineResult<()> {
    ensure_user_id(user_id)?;
    if !self.user_achievements.mark_notified(user_id, achievement_id).await? {
      return Err(EngineError::not_found(format!(
        "No pending notification for achievement {}",
        achievement_id
      )));
    }
    Ok(())
  }

  /// ---------------------------------------------------------------------------
  /// Catalog Administration
  /// ---------------------------------------------------------------------------

  /// Insert or update (by title) a catalog entry.
  pub async fn register(&self, achievement: &NewAchievement) -> EngineResult<Achievement> {
    if achievement.title.trim().is_empty() {
      return Err(EngineError::invalid("title is required"));
    }
    if achievement.points < 0 {
      return Err(EngineError::invalid("points cannot be negative"));
    }

    match &achievement.criteria {
      Criteria::Value { metric, .. } if !MetricPath::is_well_formed(metric.as_str()) => {
        return Err(EngineError::invalid(format!("malformed metric path '{}'", metric)));
      }
      Criteria::Invalid { reason } => return Err(EngineError::invalid(reason.clone())),
      _ => {}
    }
    if let Some(threshold) = achievement.criteria.threshold() {
      if !threshold.is_finite() || threshold < 0.0 {
        return Err(EngineError::invalid("threshold must be a non-negative number"));
      }
    }

    let stored = self.catalog.upsert(achievement).await?;
    debug!(achievement_id = stored.id, title = %stored.title, "achievement registered");
    Ok(stored)
  }

  pub async fn catalog(&self) -> EngineResult<Vec<Achievement>> {
    self.catalog.list_active().await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::aggregator::{derive_fields, DailyMetricAggregator};
  use crate::config::DailyTargets;
  use crate::models::MetricDelta;
  use crate::store::SqliteStore;
  use crate::test_utils::{
    mock_metric_record, mock_new_achievement, seed_test_achievement, seed_test_activities,
    setup_file_db, setup_test_store,
  };

  fn engine(store: &Arc<SqliteStore>) -> AchievementEngine {
    AchievementEngine::new(
      store.clone(),
      store.clone(),
      store.clone(),
      store.clone(),
      store.clone(),
    )
  }

  async fn total_points(store: &SqliteStore, user_id: &str) -> i64 {
    UserStore::get(store, user_id)
      .await
      .unwrap()
      .map(|u| u.total_points)
      .unwrap_or(0)
  }

  fn step_counter() -> Criteria {
    Criteria::Value {
      metric: MetricPath::StepsCurrent,
      threshold: 10_000.0,
    }
  }

  #[test]
  fn test_evaluate_value_criteria() {
    let mut record = mock_metric_record("user-1");
    record.steps.current = 10_000;
    let ctx = EvaluationContext {
      today: Some(record),
      ..EvaluationContext::default()
    };

    assert_eq!(
      evaluate(&step_counter(), &ctx).unwrap(),
      Evaluation::Met {
        current: 10_000.0,
        target: 10_000.0
      }
    );
  }

  #[test]
  fn test_evaluate_without_record_or_path_is_not_met() {
    let ctx = EvaluationContext::default();
    assert!(matches!(
      evaluate(&step_counter(), &ctx).unwrap(),
      Evaluation::NotMet { .. }
    ));

    let ctx = EvaluationContext {
      today: Some(mock_metric_record("user-1")),
      ..EvaluationContext::default()
    };
    let unknown = Criteria::Value {
      metric: MetricPath::parse("mood.happiness"),
      threshold: 0.0,
    };
    assert!(matches!(evaluate(&unknown, &ctx).unwrap(), Evaluation::NotMet { .. }));
  }

  #[test]
  fn test_evaluate_streak_count_custom_invalid() {
    let ctx = EvaluationContext {
      today: None,
      current_streak: 7,
      activity_count: 3,
    };

    assert!(matches!(
      evaluate(&Criteria::Streak { threshold: 7.0 }, &ctx).unwrap(),
      Evaluation::Met { .. }
    ));
    assert!(matches!(
      evaluate(
        &Criteria::Count {
          metric: CountMetric::Activities,
          threshold: 5.0
        },
        &ctx
      )
      .unwrap(),
      Evaluation::NotMet { current, .. } if current == 3.0
    ));
    assert!(matches!(
      evaluate(
        &Criteria::Count {
          metric: CountMetric::Unsupported("meals".into()),
          threshold: 0.0
        },
        &ctx
      )
      .unwrap(),
      Evaluation::NotMet { .. }
    ));
    assert_eq!(
      evaluate(&Criteria::Custom { condition: None }, &ctx).unwrap(),
      Evaluation::Skipped
    );
    assert!(evaluate(
      &Criteria::Invalid {
        reason: "broken".into()
      },
      &ctx
    )
    .is_err());
  }

  #[tokio::test]
  async fn test_step_counter_unlocks_once_and_awards_points_once() {
    // Arrange
    let store = setup_test_store().await;
    let engine = engine(&store);
    let achievement = seed_test_achievement(&store, "Step Counter", step_counter(), 15).await;
    let aggregator = DailyMetricAggregator::new(store.clone(), DailyTargets::default());
    aggregator.add_steps("user-1", 10_000, None, None, None).await.unwrap();

    // Act
    let first = engine.check_achievements("user-1").await.unwrap();
    let second = engine.check_achievements("user-1").await.unwrap();
    let third = engine.check_achievements("user-1").await.unwrap();

    // Assert
    assert_eq!(first.unlocked.len(), 1);
    assert_eq!(first.unlocked[0].id, achievement.id);
    assert_eq!(first.points_awarded(), 15);
    assert!(second.unlocked.is_empty());
    assert_eq!(second.checked, 0);
    assert!(third.unlocked.is_empty());
    assert_eq!(total_points(&store, "user-1").await, 15);

    let pairing = engine.progress("user-1", achievement.id).await.unwrap();
    assert!(pairing.earned);
    assert!(pairing.earned_date.is_some());
  }

  #[tokio::test]
  async fn test_unmet_criteria_tracks_progress() {
    let store = setup_test_store().await;
    let engine = engine(&store);
    let achievement = seed_test_achievement(&store, "Step Counter", step_counter(), 15).await;
    let aggregator = DailyMetricAggregator::new(store.clone(), DailyTargets::default());
    aggregator.add_steps("user-1", 4_200, None, None, None).await.unwrap();

    let report = engine.check_achievements("user-1").await.unwrap();

    assert!(report.unlocked.is_empty());
    let pairing = engine.progress("user-1", achievement.id).await.unwrap();
    assert!(!pairing.earned);
    assert_eq!(pairing.progress_current, 4_200.0);
    assert_eq!(pairing.progress_target, Some(10_000.0));
    assert_eq!(total_points(&store, "user-1").await, 0);
  }

  #[tokio::test]
  async fn test_bad_catalog_entry_does_not_stop_the_scan() {
    let store = setup_test_store().await;
    let engine = engine(&store);
    seed_test_achievement(&store, "Custom", Criteria::Custom { condition: None }, 5).await;
    let first_steps = seed_test_achievement(
      &store,
      "First Steps",
      Criteria::Count {
        metric: CountMetric::Activities,
        threshold: 1.0,
      },
      10,
    )
    .await;
    // A row no code path can produce through `register`
    sqlx::query(
      "UPDATE achievements SET criteria_type = 'percentile', sort_order = -1 WHERE title = 'Custom'",
    )
    .execute(store.pool())
    .await
    .unwrap();
    seed_test_activities(&store, "user-1", 1).await;

    let report = engine.check_achievements("user-1").await.unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].title, "Custom");
    assert_eq!(report.unlocked.len(), 1);
    assert_eq!(report.unlocked[0].id, first_steps.id);
    assert_eq!(total_points(&store, "user-1").await, 10);
  }

  #[tokio::test]
  async fn test_custom_criteria_is_skipped() {
    let store = setup_test_store().await;
    let engine = engine(&store);
    seed_test_achievement(&store, "Manual", Criteria::Custom { condition: None }, 5).await;

    let report = engine.check_achievements("user-1").await.unwrap();

    assert_eq!(report.checked, 1);
    assert_eq!(report.skipped, 1);
    assert!(report.unlocked.is_empty());
    assert!(report.failures.is_empty());
  }

  #[tokio::test]
  async fn test_streak_criteria_reads_ledger() {
    let store = setup_test_store().await;
    let engine = engine(&store);
    seed_test_achievement(&store, "Consistency King", Criteria::Streak { threshold: 7.0 }, 50).await;

    UserStore::set_current_streak(store.as_ref(), "user-1", 6).await.unwrap();
    assert!(engine.check_achievements("user-1").await.unwrap().unlocked.is_empty());

    UserStore::set_current_streak(store.as_ref(), "user-1", 7).await.unwrap();
    assert_eq!(engine.check_achievements("user-1").await.unwrap().unlocked.len(), 1);
    assert_eq!(total_points(&store, "user-1").await, 50);
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn test_concurrent_scans_award_points_once() {
    // Arrange
    let (_dir, pool) = setup_file_db(6).await;
    let store = Arc::new(SqliteStore::new(pool));
    seed_test_achievement(&store, "Step Counter", step_counter(), 15).await;
    let aggregator = DailyMetricAggregator::new(store.clone(), DailyTargets::default());
    aggregator.add_steps("user-1", 10_000, None, None, None).await.unwrap();
    let engine = Arc::new(engine(&store));

    // Act
    let handles: Vec<_> = (0..8)
      .map(|_| {
        let engine = engine.clone();
        tokio::spawn(async move { engine.check_achievements("user-1").await })
      })
      .collect();
    let mut unlocked = 0;
    for handle in handles {
      unlocked += handle.await.expect("task panicked").expect("scan failed").unlocked.len();
    }

    // Assert
    assert_eq!(unlocked, 1);
    assert_eq!(total_points(&store, "user-1").await, 15);
  }

  #[tokio::test]
  async fn test_list_with_progress_and_notifications() {
    let store = setup_test_store().await;
    let engine = engine(&store);
    let steps = seed_test_achievement(&store, "Step Counter", step_counter(), 15).await;
    let hydration = seed_test_achievement(
      &store,
      "Hydration Hero",
      Criteria::Value {
        metric: MetricPath::WaterCurrent,
        threshold: 2_500.0,
      },
      20,
    )
    .await;
    MetricStore::apply_delta(
      store.as_ref(),
      "user-1",
      today(),
      &DailyTargets::default(),
      &MetricDelta::steps(12_000),
      derive_fields,
    )
    .await
    .unwrap();
    engine.check_achievements("user-1").await.unwrap();

    let listed = engine.list_with_progress("user-1").await.unwrap();
    assert_eq!(listed.len(), 2);
    let by_id: HashMap<i64, &AchievementProgress> =
      listed.iter().map(|p| (p.achievement.id, p)).collect();
    assert!(by_id[&steps.id].earned);
    assert!(!by_id[&hydration.id].earned);
    assert_eq!(by_id[&hydration.id].progress_target, Some(2_500.0));

    let pending = engine.pending_notifications("user-1").await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].achievement.id, steps.id);

    engine.mark_notified("user-1", steps.id).await.unwrap();
    assert!(engine.pending_notifications("user-1").await.unwrap().is_empty());
    assert!(matches!(
      engine.mark_notified("user-1", steps.id).await,
      Err(EngineError::NotFound(_))
    ));

    let earned = engine.earned("user-1", None).await.unwrap();
    assert_eq!(earned.len(), 1);
    assert!(earned[0].notified);
  }

  #[tokio::test]
  async fn test_register_validates_and_upserts_by_title() {
    let store = setup_test_store().await;
    let engine = engine(&store);

    let malformed = mock_new_achievement(
      "Broken",
      Criteria::Value {
        metric: MetricPath::parse("steps..current"),
        threshold: 1.0,
      },
      5,
    );
    assert!(matches!(
      engine.register(&malformed).await,
      Err(EngineError::InvalidInput(_))
    ));

    let first = engine.register(&mock_new_achievement("Walker", step_counter(), 5)).await.unwrap();
    let second = engine.register(&mock_new_achievement("Walker", step_counter(), 25)).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.points, 25);
    assert_eq!(engine.catalog().await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn test_progress_for_missing_achievement_is_not_found() {
    let store = setup_test_store().await;
    let engine = engine(&store);

    assert!(matches!(
      engine.progress("user-1", 404).await,
      Err(EngineError::NotFound(_))
    ));
  }
}
