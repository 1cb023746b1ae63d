use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

use super::{decode_text, text_enum};

text_enum! {
  pub enum GoalType {
    Steps => "steps",
    Weight => "weight",
    Calories => "calories",
    WorkoutFrequency => "workout_frequency",
    WaterIntake => "water_intake",
    SleepHours => "sleep_hours",
    BodyFat => "body_fat",
    MuscleMass => "muscle_mass",
  }
}

text_enum! {
  /// Completed and abandoned are terminal.
  pub enum GoalStatus {
    Active => "active",
    Completed => "completed",
    Abandoned => "abandoned",
    Paused => "paused",
  }
}

impl GoalStatus {
  pub fn is_terminal(&self) -> bool {
    matches!(self, GoalStatus::Completed | GoalStatus::Abandoned)
  }
}

text_enum! {
  pub enum GoalCategory {
    Fitness => "fitness",
    Nutrition => "nutrition",
    Wellness => "wellness",
    Lifestyle => "lifestyle",
  }
}

text_enum! {
  pub enum Priority {
    Low => "low",
    Medium => "medium",
    High => "high",
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
  pub value: f64,
  pub achieved: bool,
  pub achieved_date: Option<DateTime<Utc>>,
}

impl Milestone {
  pub fn new(value: f64) -> Self {
    Self {
      value,
      achieved: false,
      achieved_date: None,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
  pub id: i64,
  pub user_id: String,
  pub goal_type: GoalType,
  pub title: String,
  pub description: Option<String>,
  pub current_value: f64,
  pub target_value: f64,
  pub unit: String,
  pub start_date: NaiveDate,
  pub target_date: NaiveDate,
  pub status: GoalStatus,
  /// Derived: min(round(current / target * 100), 100)
  pub progress: i64,
  /// Ordered by value, ascending
  pub milestones: Vec<Milestone>,
  pub completed_date: Option<DateTime<Utc>>,
  pub category: Option<GoalCategory>,
  pub priority: Priority,
  /// Set once the explicit-completion bonus has been credited
  pub bonus_awarded: bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for Goal {
  fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
    let milestones_json: String = row.try_get("milestones_json")?;
    let milestones = serde_json::from_str(&milestones_json).map_err(|e| {
      sqlx::Error::ColumnDecode {
        index: "milestones_json".to_string(),
        source: Box::new(e),
      }
    })?;
    let category: Option<String> = row.try_get("category")?;
    let category = category
      .map(|c| c.parse::<GoalCategory>())
      .transpose()
      .map_err(|e| sqlx::Error::ColumnDecode {
        index: "category".to_string(),
        source: e.into(),
      })?;

    Ok(Self {
      id: row.try_get("id")?,
      user_id: row.try_get("user_id")?,
      goal_type: decode_text(row, "goal_type")?,
      title: row.try_get("title")?,
      description: row.try_get("description")?,
      current_value: row.try_get("current_value")?,
      target_value: row.try_get("target_value")?,
      unit: row.try_get("unit")?,
      start_date: row.try_get("start_date")?,
      target_date: row.try_get("target_date")?,
      status: decode_text(row, "status")?,
      progress: row.try_get("progress")?,
      milestones,
      completed_date: row.try_get("completed_date")?,
      category,
      priority: decode_text(row, "priority")?,
      bonus_awarded: row.try_get("bonus_awarded")?,
      created_at: row.try_get("created_at")?,
      updated_at: row.try_get("updated_at")?,
    })
  }
}

/// For creating goals (without id, derived fields, timestamps)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGoal {
  pub goal_type: GoalType,
  pub title: String,
  pub description: Option<String>,
  pub current_value: f64,
  pub target_value: f64,
  pub unit: String,
  pub start_date: Option<NaiveDate>,
  pub target_date: NaiveDate,
  pub milestones: Vec<f64>,
  pub category: Option<GoalCategory>,
  pub priority: Option<Priority>,
}

#[derive(Debug, Clone, Default)]
pub struct GoalFilter {
  pub status: Option<GoalStatus>,
  pub goal_type: Option<GoalType>,
}

impl GoalFilter {
  pub fn active() -> Self {
    Self {
      status: Some(GoalStatus::Active),
      goal_type: None,
    }
  }
}
