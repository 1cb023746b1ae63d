//! Composite wellness score
//!
//! Pure function of a single day's record. Each dimension scores
//! `min(current / target * 100, 100)`; a zero target scores 0 for that
//! dimension. The composite is the weighted sum, rounded.

use serde::{Deserialize, Serialize};

use crate::config::WellnessWeights;
use crate::models::MetricRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
  pub steps: i64,
  pub calories: i64,
  pub water: i64,
  pub sleep: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WellnessScore {
  /// 0-100
  pub score: i64,
  pub breakdown: ScoreBreakdown,
}

/// Percentage of target reached, capped at 100.
pub fn subscore(current: f64, target: f64) -> f64 {
  if target > 0.0 && current.is_finite() {
    (current / target * 100.0).clamp(0.0, 100.0)
  } else {
    0.0
  }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WellnessScorer {
  weights: WellnessWeights,
}

impl WellnessScorer {
  pub fn new(weights: WellnessWeights) -> Self {
    Self { weights }
  }

  pub fn score(&self, record: &MetricRecord) -> WellnessScore {
    // calories are scored on intake, not on what remains
    let steps = subscore(record.steps.current as f64, record.steps.target as f64);
    let calories = subscore(record.calories.consumed, record.calories.target);
    let water = subscore(record.water.current, record.water.target);
    let sleep = subscore(record.sleep.duration, record.sleep.target);

    let w = &self.weights;
    let composite =
      steps * w.steps() + calories * w.calories() + water * w.water() + sleep * w.sleep();

    WellnessScore {
      score: composite.round() as i64,
      breakdown: ScoreBreakdown {
        steps: steps.round() as i64,
        calories: calories.round() as i64,
        water: water.round() as i64,
        sleep: sleep.round() as i64,
      },
    }
  }
}
