//! Runtime configuration
//!
//! `AppConfig` covers process wiring (database, logging) and is read from the
//! environment. `EngineConfig` carries the scoring weights, default targets and
//! insight thresholds; it is passed into the engine components at construction
//! so tests can vary it freely.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// ---------------------------------------------------------------------------
/// Configuration Constants
/// ---------------------------------------------------------------------------

const DEFAULT_DATABASE_URL: &str = "sqlite://wellness.db?mode=rwc";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const WEIGHT_TOLERANCE: f64 = 1e-6;

/// ---------------------------------------------------------------------------
/// Process Configuration
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub database_url: String,
  pub max_connections: u32,
  pub log_filter: Option<String>,
}

impl AppConfig {
  /// Load `.env` (if present) and read configuration from the environment.
  pub fn from_env() -> EngineResult<Self> {
    dotenvy::dotenv().ok();
    Self::from_env_with(|k| std::env::var(k).ok())
  }

  /// Reads configuration values through the provided getter so tests do not
  /// need to mutate the process environment.
  pub fn from_env_with<F>(mut get: F) -> EngineResult<Self>
  where
    F: FnMut(&str) -> Option<String>,
  {
    let database_url =
      get("WELLNESS_DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

    let max_connections = match get("WELLNESS_DB_MAX_CONNECTIONS") {
      Some(raw) => raw.trim().parse::<u32>().ok().filter(|n| *n > 0).ok_or_else(|| {
        EngineError::Config(format!(
          "WELLNESS_DB_MAX_CONNECTIONS must be a positive integer, got '{}'",
          raw
        ))
      })?,
      None => DEFAULT_MAX_CONNECTIONS,
    };

    let log_filter = get("WELLNESS_LOG_LEVEL").or_else(|| get("RUST_LOG"));

    Ok(Self {
      database_url,
      max_connections,
      log_filter,
    })
  }
}

/// ---------------------------------------------------------------------------
/// Wellness Score Weights
/// ---------------------------------------------------------------------------

/// Deserialized weights go through [`WellnessWeights::new`], so a config file
/// cannot produce a set that does not sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawWeights")]
pub struct WellnessWeights {
  steps: f64,
  calories: f64,
  water: f64,
  sleep: f64,
}

#[derive(Deserialize)]
struct RawWeights {
  steps: f64,
  calories: f64,
  water: f64,
  sleep: f64,
}

impl TryFrom<RawWeights> for WellnessWeights {
  type Error = EngineError;

  fn try_from(raw: RawWeights) -> EngineResult<Self> {
    Self::new(raw.steps, raw.calories, raw.water, raw.sleep)
  }
}

impl WellnessWeights {
  /// Weights must be finite, non-negative and sum to 1.0.
  pub fn new(steps: f64, calories: f64, water: f64, sleep: f64) -> EngineResult<Self> {
    let all = [steps, calories, water, sleep];
    if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
      return Err(EngineError::invalid(
        "wellness weights must be finite and non-negative",
      ));
    }
    let sum: f64 = all.iter().sum();
    if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
      return Err(EngineError::invalid(format!(
        "wellness weights must sum to 1.0, got {}",
        sum
      )));
    }
    Ok(Self {
      steps,
      calories,
      water,
      sleep,
    })
  }

  pub fn steps(&self) -> f64 {
    self.steps
  }

  pub fn calories(&self) -> f64 {
    self.calories
  }

  pub fn water(&self) -> f64 {
    self.water
  }

  pub fn sleep(&self) -> f64 {
    self.sleep
  }
}

impl Default for WellnessWeights {
  fn default() -> Self {
    Self {
      steps: 0.25,
      calories: 0.25,
      water: 0.25,
      sleep: 0.25,
    }
  }
}

/// ---------------------------------------------------------------------------
/// Default Daily Targets (applied when a day's record is first created)
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyTargets {
  pub steps: i64,
  pub calories: f64,
  pub water_ml: f64,
  pub sleep_hours: f64,
}

impl Default for DailyTargets {
  fn default() -> Self {
    Self {
      steps: 10_000,
      calories: 2_000.0,
      water_ml: 2_500.0,
      sleep_hours: 8.0,
    }
  }
}

/// ---------------------------------------------------------------------------
/// Insight Thresholds: average below threshold picks the "improve" message
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InsightThresholds {
  pub steps: f64,
  pub water_ml: f64,
  pub sleep_hours: f64,
}

impl Default for InsightThresholds {
  fn default() -> Self {
    Self {
      steps: 8_000.0,
      water_ml: 2_000.0,
      sleep_hours: 7.0,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DashboardLimits {
  pub recent_activities: i64,
  pub active_goals: i64,
  pub recent_achievements: i64,
  pub weekly_window_days: i64,
  pub insight_window_days: i64,
}

impl Default for DashboardLimits {
  fn default() -> Self {
    Self {
      recent_activities: 5,
      active_goals: 3,
      recent_achievements: 3,
      weekly_window_days: 7,
      insight_window_days: 30,
    }
  }
}

/// ---------------------------------------------------------------------------
/// Engine Configuration
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
  pub weights: WellnessWeights,
  pub default_targets: DailyTargets,
  pub insights: InsightThresholds,
  /// Points credited when a user explicitly completes a goal
  pub goal_completion_bonus: i64,
  pub dashboard: DashboardLimits,
}

impl EngineConfig {
  pub fn with_weights(mut self, weights: WellnessWeights) -> Self {
    self.weights = weights;
    self
  }

  pub fn with_insights(mut self, insights: InsightThresholds) -> Self {
    self.insights = insights;
    self
  }
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      weights: WellnessWeights::default(),
      default_targets: DailyTargets::default(),
      insights: InsightThresholds::default(),
      goal_completion_bonus: 50,
      dashboard: DashboardLimits::default(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;

  #[test]
  fn test_from_env_uses_defaults() {
    let cfg = AppConfig::from_env_with(|_| None).expect("cfg");
    assert_eq!(cfg.database_url, DEFAULT_DATABASE_URL);
    assert_eq!(cfg.max_connections, DEFAULT_MAX_CONNECTIONS);
    assert!(cfg.log_filter.is_none());
  }

  #[test]
  fn test_from_env_reads_values() {
    let get = |k: &str| match k {
      "WELLNESS_DATABASE_URL" => Some("sqlite::memory:".into()),
      "WELLNESS_DB_MAX_CONNECTIONS" => Some("2".into()),
      "RUST_LOG" => Some("debug".into()),
      _ => None,
    };
    let cfg = AppConfig::from_env_with(get).expect("cfg");
    assert_eq!(cfg.database_url, "sqlite::memory:");
    assert_eq!(cfg.max_connections, 2);
    assert_eq!(cfg.log_filter.as_deref(), Some("debug"));
  }

  #[test]
  fn test_from_env_rejects_bad_pool_size() {
    let get = |k: &str| match k {
      "WELLNESS_DB_MAX_CONNECTIONS" => Some("zero".into()),
      _ => None,
    };
    let res = AppConfig::from_env_with(get);
    assert!(matches!(res, Err(EngineError::Config(_))));
  }

  #[test]
  #[serial]
  fn test_from_env_prefers_wellness_log_level() {
    temp_env::with_vars(
      [
        ("WELLNESS_LOG_LEVEL", Some("warn")),
        ("RUST_LOG", Some("trace")),
        ("WELLNESS_DATABASE_URL", Some("sqlite::memory:")),
      ],
      || {
        let cfg = AppConfig::from_env().expect("cfg");
        assert_eq!(cfg.log_filter.as_deref(), Some("warn"));
        assert_eq!(cfg.database_url, "sqlite::memory:");
      },
    );
  }

  #[test]
  fn test_weights_must_sum_to_one() {
    assert!(WellnessWeights::new(0.4, 0.2, 0.2, 0.2).is_ok());
    assert!(WellnessWeights::new(0.5, 0.5, 0.5, 0.5).is_err());
    assert!(WellnessWeights::new(-0.25, 0.75, 0.25, 0.25).is_err());
  }

  #[test]
  fn test_weights_deserialize_through_validation() {
    let defaults = serde_json::to_string(&WellnessWeights::default()).expect("serialize");
    let parsed: WellnessWeights = serde_json::from_str(&defaults).expect("defaults parse");
    assert_eq!(parsed, WellnessWeights::default());

    let oversized = r#"{"steps":0.5,"calories":0.5,"water":0.5,"sleep":0.5}"#;
    let err = serde_json::from_str::<WellnessWeights>(oversized).unwrap_err();
    assert!(err.to_string().contains("sum to 1.0"));

    let negative = r#"{"steps":-0.25,"calories":0.75,"water":0.25,"sleep":0.25}"#;
    assert!(serde_json::from_str::<WellnessWeights>(negative).is_err());
  }

  #[test]
  fn test_engine_defaults_match_documented_values() {
    let cfg = EngineConfig::default();
    assert_eq!(cfg.weights, WellnessWeights::default());
    assert_eq!(cfg.default_targets.steps, 10_000);
    assert_eq!(cfg.insights.steps, 8_000.0);
    assert_eq!(cfg.goal_completion_bonus, 50);
    assert_eq!(cfg.dashboard.insight_window_days, 30);
  }
}
