use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

use super::{decode_text, text_enum};

/// ---------------------------------------------------------------------------
/// Daily Metric Record: one per (user, UTC day)
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRecord {
  pub id: i64,
  pub user_id: String,
  pub day: NaiveDate,
  pub steps: StepsMetrics,
  pub calories: CalorieMetrics,
  pub water: WaterMetrics,
  pub sleep: SleepMetrics,
  pub heart_rate: HeartRate,
  pub blood_pressure: BloodPressure,
  pub weight: Weight,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepsMetrics {
  pub current: i64,
  pub target: i64,
  pub distance: f64, // km
  pub active_minutes: f64,
  pub calories_burned: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalorieMetrics {
  pub consumed: f64,
  pub burned: f64,
  pub target: f64,
  /// Derived: target - (consumed - burned)
  pub remaining: f64,
  pub macros: Macros,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Macros {
  pub protein: f64,
  pub carbs: f64,
  pub fat: f64,
  pub fiber: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaterMetrics {
  pub current: f64, // ml
  pub target: f64,
  /// Derived: current / 250
  pub glasses: f64,
  /// Derived: round(current / target * 100), 0 when target is 0
  pub hydration_level: i64,
  pub last_intake: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SleepMetrics {
  pub duration: f64, // hours
  pub target: f64,
  pub quality: i64, // 0-100
  pub deep_sleep: f64,
  pub light_sleep: f64,
  pub rem_sleep: f64,
  pub bedtime: Option<String>,
  pub wake_time: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HeartRate {
  pub resting: Option<i64>,
  pub average: Option<i64>,
  pub max: Option<i64>,
  pub min: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BloodPressure {
  pub systolic: Option<i64>,
  pub diastolic: Option<i64>,
  pub measured_at: Option<DateTime<Utc>>,
}

text_enum! {
  pub enum WeightUnit {
    Kg => "kg",
    Lbs => "lbs",
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weight {
  pub value: Option<f64>,
  pub unit: WeightUnit,
}

impl Default for Weight {
  fn default() -> Self {
    Self {
      value: None,
      unit: WeightUnit::Kg,
    }
  }
}

impl<'r> FromRow<'r, SqliteRow> for MetricRecord {
  fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
    Ok(Self {
      id: row.try_get("id")?,
      user_id: row.try_get("user_id")?,
      day: row.try_get("day")?,
      steps: StepsMetrics {
        current: row.try_get("steps_current")?,
        target: row.try_get("steps_target")?,
        distance: row.try_get("steps_distance")?,
        active_minutes: row.try_get("steps_active_minutes")?,
        calories_burned: row.try_get("steps_calories_burned")?,
      },
      calories: CalorieMetrics {
        consumed: row.try_get("calories_consumed")?,
        burned: row.try_get("calories_burned")?,
        target: row.try_get("calories_target")?,
        remaining: row.try_get("calories_remaining")?,
        macros: Macros {
          protein: row.try_get("macros_protein")?,
          carbs: row.try_get("macros_carbs")?,
          fat: row.try_get("macros_fat")?,
          fiber: row.try_get("macros_fiber")?,
        },
      },
      water: WaterMetrics {
        current: row.try_get("water_current")?,
        target: row.try_get("water_target")?,
        glasses: row.try_get("water_glasses")?,
        hydration_level: row.try_get("water_hydration_level")?,
        last_intake: row.try_get("water_last_intake")?,
      },
      sleep: SleepMetrics {
        duration: row.try_get("sleep_duration")?,
        target: row.try_get("sleep_target")?,
        quality: row.try_get("sleep_quality")?,
        deep_sleep: row.try_get("sleep_deep")?,
        light_sleep: row.try_get("sleep_light")?,
        rem_sleep: row.try_get("sleep_rem")?,
        bedtime: row.try_get("sleep_bedtime")?,
        wake_time: row.try_get("sleep_wake_time")?,
      },
      heart_rate: HeartRate {
        resting: row.try_get("hr_resting")?,
        average: row.try_get("hr_average")?,
        max: row.try_get("hr_max")?,
        min: row.try_get("hr_min")?,
      },
      blood_pressure: BloodPressure {
        systolic: row.try_get("bp_systolic")?,
        diastolic: row.try_get("bp_diastolic")?,
        measured_at: row.try_get("bp_measured_at")?,
      },
      weight: Weight {
        value: row.try_get("weight_value")?,
        unit: decode_text(row, "weight_unit")?,
      },
      created_at: row.try_get("created_at")?,
      updated_at: row.try_get("updated_at")?,
    })
  }
}

/// ---------------------------------------------------------------------------
/// Mutations
/// ---------------------------------------------------------------------------

/// Additive increment applied atomically against a stored record. Every
/// field is added, never assigned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricDelta {
  pub steps: i64,
  pub distance: f64,
  pub active_minutes: f64,
  /// Credited to both `steps.calories_burned` and `calories.burned`
  pub calories_burned: f64,
  pub calories_consumed: f64,
  pub macros: Macros,
  pub water_ml: f64,
}

impl MetricDelta {
  pub fn steps(steps: i64) -> Self {
    Self {
      steps,
      ..Self::default()
    }
  }

  pub fn water(amount_ml: f64) -> Self {
    Self {
      water_ml: amount_ml,
      ..Self::default()
    }
  }

  pub fn meal(calories: f64, macros: Macros) -> Self {
    Self {
      calories_consumed: calories,
      macros,
      ..Self::default()
    }
  }

  pub fn touches_water(&self) -> bool {
    self.water_ml > 0.0
  }
}

/// One night's sleep; overwrites the day's sleep fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SleepEntry {
  pub duration_hours: f64,
  pub quality: i64,
  pub bedtime: Option<String>,
  pub wake_time: Option<String>,
  pub deep_hours: Option<f64>,
  pub light_hours: Option<f64>,
  pub rem_hours: Option<f64>,
}

/// Point-in-time readings; only supplied fields are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
  pub heart_rate: Option<HeartRate>,
  pub blood_pressure: Option<(i64, i64)>,
  pub weight: Option<Weight>,
}

/// Fields recomputed from a record's raw values before every write.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedFields {
  pub calories_remaining: f64,
  pub water_glasses: f64,
  pub hydration_level: i64,
}
