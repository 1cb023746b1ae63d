pub mod achievements;
pub mod aggregator;
pub mod catalog;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod events;
pub mod goals;
pub mod models;
pub mod observability;
pub mod retry;
pub mod scoring;
pub mod store;

#[cfg(test)]
mod test_utils;

use std::sync::Arc;

use achievements::AchievementEngine;
use aggregator::DailyMetricAggregator;
use config::{AppConfig, EngineConfig};
use dashboard::DashboardAggregator;
use db::DbPool;
use error::EngineResult;
use events::EventRecorder;
use goals::GoalTracker;
use scoring::WellnessScorer;
use store::SqliteStore;

pub use error::EngineError;

/// ---------------------------------------------------------------------------
/// Engine Wiring
/// ---------------------------------------------------------------------------

/// Every component wired over one SQLite store. Components share the store
/// through `Arc`s; clone the pieces you need into request handlers.
pub struct WellnessEngine {
  pub store: Arc<SqliteStore>,
  pub metrics: Arc<DailyMetricAggregator>,
  pub scorer: WellnessScorer,
  pub goals: Arc<GoalTracker>,
  pub achievements: Arc<AchievementEngine>,
  pub dashboard: DashboardAggregator,
  pub events: EventRecorder,
  pub config: EngineConfig,
}

impl WellnessEngine {
  pub fn new(pool: DbPool, config: EngineConfig) -> Self {
    let store = Arc::new(SqliteStore::new(pool));

    let metrics = Arc::new(DailyMetricAggregator::new(
      store.clone(),
      config.default_targets,
    ));
    let goals = Arc::new(GoalTracker::new(store.clone(), config.goal_completion_bonus));
    let achievements = Arc::new(AchievementEngine::new(
      store.clone(),
      store.clone(),
      store.clone(),
      store.clone(),
      store.clone(),
    ));
    let dashboard = DashboardAggregator::new(
      metrics.clone(),
      goals.clone(),
      achievements.clone(),
      store.clone(),
      store.clone(),
      &config,
    );
    let events = EventRecorder::new(metrics.clone(), achievements.clone(), store.clone());

    Self {
      store,
      metrics,
      scorer: WellnessScorer::new(config.weights),
      goals,
      achievements,
      dashboard,
      events,
      config,
    }
  }
}

/// Load configuration from the environment, install logging and open the
/// database with migrations applied.
pub async fn bootstrap() -> EngineResult<WellnessEngine> {
  let app_config = AppConfig::from_env()?;
  observability::init_tracing(app_config.log_filter.as_deref());

  let pool = db::initialize_db(&app_config).await?;
  Ok(WellnessEngine::new(pool, EngineConfig::default()))
}
