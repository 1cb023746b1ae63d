use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

use super::{decode_text, text_enum};

text_enum! {
  pub enum ActivityType {
    Running => "running",
    Walking => "walking",
    Cycling => "cycling",
    Swimming => "swimming",
    Gym => "gym",
    Yoga => "yoga",
    Sports => "sports",
    Hiking => "hiking",
    Dancing => "dancing",
    Other => "other",
  }
}

text_enum! {
  pub enum Intensity {
    Low => "low",
    Moderate => "moderate",
    High => "high",
    VeryHigh => "very_high",
  }
}

/// A logged workout or activity session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
  pub id: i64,
  pub user_id: String,
  pub activity_type: ActivityType,
  pub name: String,
  pub duration_minutes: f64,
  pub distance_km: Option<f64>,
  pub calories: f64,
  pub steps: i64,
  pub intensity: Intensity,
  pub performed_at: DateTime<Utc>,
  /// UTC day of `performed_at`, used to credit the day's metric record
  pub day: NaiveDate,
  pub notes: Option<String>,
  pub created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for Activity {
  fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
    Ok(Self {
      id: row.try_get("id")?,
      user_id: row.try_get("user_id")?,
      activity_type: decode_text(row, "activity_type")?,
      name: row.try_get("name")?,
      duration_minutes: row.try_get("duration_minutes")?,
      distance_km: row.try_get("distance_km")?,
      calories: row.try_get("calories")?,
      steps: row.try_get("steps")?,
      intensity: decode_text(row, "intensity")?,
      performed_at: row.try_get("performed_at")?,
      day: row.try_get("day")?,
      notes: row.try_get("notes")?,
      created_at: row.try_get("created_at")?,
    })
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewActivity {
  pub activity_type: ActivityType,
  pub name: String,
  pub duration_minutes: f64,
  pub distance_km: Option<f64>,
  pub calories: f64,
  pub steps: Option<i64>,
  pub intensity: Intensity,
  /// Defaults to now
  pub performed_at: Option<DateTime<Utc>>,
  pub notes: Option<String>,
}
