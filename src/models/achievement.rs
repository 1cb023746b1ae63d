use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

use super::{decode_text, text_enum, MetricPath};

text_enum! {
  pub enum AchievementCategory {
    Steps => "steps",
    Nutrition => "nutrition",
    Sleep => "sleep",
    Workout => "workout",
    Streak => "streak",
    Milestone => "milestone",
  }
}

text_enum! {
  pub enum Rarity {
    Common => "common",
    Rare => "rare",
    Epic => "epic",
    Legendary => "legendary",
  }
}

/// What a `count` criterion counts. Only logged activities are tracked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountMetric {
  Activities,
  Unsupported(String),
}

impl CountMetric {
  pub fn parse(raw: &str) -> Self {
    match raw.trim() {
      "activities" => CountMetric::Activities,
      other => CountMetric::Unsupported(other.to_string()),
    }
  }

  pub fn as_str(&self) -> &str {
    match self {
      CountMetric::Activities => "activities",
      CountMetric::Unsupported(raw) => raw.as_str(),
    }
  }
}

/// ---------------------------------------------------------------------------
/// Criteria: the fixed vocabulary an achievement can be unlocked by
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Criteria {
  /// Today's metric value at `metric` >= threshold
  Value { metric: MetricPath, threshold: f64 },
  /// User's current streak >= threshold
  Streak { threshold: f64 },
  /// All-time count of `metric` >= threshold
  Count { metric: CountMetric, threshold: f64 },
  /// Reserved for manual awarding; never evaluated automatically
  Custom { condition: Option<String> },
  /// Stored row could not be interpreted; evaluation reports an error
  Invalid { reason: String },
}

impl Criteria {
  pub fn kind(&self) -> &'static str {
    match self {
      Criteria::Value { .. } => "value",
      Criteria::Streak { .. } => "streak",
      Criteria::Count { .. } => "count",
      Criteria::Custom { .. } => "custom",
      Criteria::Invalid { .. } => "invalid",
    }
  }

  pub fn threshold(&self) -> Option<f64> {
    match self {
      Criteria::Value { threshold, .. }
      | Criteria::Streak { threshold }
      | Criteria::Count { threshold, .. } => Some(*threshold),
      Criteria::Custom { .. } | Criteria::Invalid { .. } => None,
    }
  }

  /// Rebuild criteria from its stored columns. Never fails; rows that cannot
  /// be interpreted become `Invalid` so a single bad catalog entry cannot
  /// prevent the rest of the catalog from loading.
  pub fn from_columns(
    kind: &str,
    metric: Option<&str>,
    threshold: Option<f64>,
    condition: Option<&str>,
  ) -> Self {
    let require_threshold = |threshold: Option<f64>| match threshold {
      Some(t) if t.is_finite() => Ok(t),
      _ => Err(format!("{} criteria requires a numeric threshold", kind)),
    };

    let built = match kind {
      "value" => require_threshold(threshold).and_then(|threshold| match metric {
        Some(m) => Ok(Criteria::Value {
          metric: MetricPath::parse(m),
          threshold,
        }),
        None => Err("value criteria requires a metric path".to_string()),
      }),
      "streak" => require_threshold(threshold).map(|threshold| Criteria::Streak { threshold }),
      "count" => require_threshold(threshold).map(|threshold| Criteria::Count {
        metric: CountMetric::parse(metric.unwrap_or("")),
        threshold,
      }),
      "custom" => Ok(Criteria::Custom {
        condition: condition.map(str::to_string),
      }),
      other => Err(format!("unknown criteria type '{}'", other)),
    };

    built.unwrap_or_else(|reason| Criteria::Invalid { reason })
  }

  /// (metric, threshold, condition) columns for storage
  pub fn to_columns(&self) -> (Option<String>, Option<f64>, Option<String>) {
    match self {
      Criteria::Value { metric, threshold } => (Some(metric.to_string()), Some(*threshold), None),
      Criteria::Streak { threshold } => (Some("currentStreak".to_string()), Some(*threshold), None),
      Criteria::Count { metric, threshold } => {
        (Some(metric.as_str().to_string()), Some(*threshold), None)
      }
      Criteria::Custom { condition } => (None, None, condition.clone()),
      Criteria::Invalid { .. } => (None, None, None),
    }
  }
}

/// ---------------------------------------------------------------------------
/// Catalog Entry
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Achievement {
  pub id: i64,
  pub title: String,
  pub description: String,
  pub category: AchievementCategory,
  pub icon: String,
  pub rarity: Rarity,
  pub points: i64,
  pub criteria: Criteria,
  pub is_active: bool,
  pub order: i64,
}

impl<'r> FromRow<'r, SqliteRow> for Achievement {
  fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
    let kind: String = row.try_get("criteria_type")?;
    let metric: Option<String> = row.try_get("criteria_metric")?;
    let threshold: Option<f64> = row.try_get("criteria_threshold")?;
    let condition: Option<String> = row.try_get("criteria_condition")?;

    Ok(Self {
      id: row.try_get("id")?,
      title: row.try_get("title")?,
      description: row.try_get("description")?,
      category: decode_text(row, "category")?,
      icon: row.try_get("icon")?,
      rarity: decode_text(row, "rarity")?,
      points: row.try_get("points")?,
      criteria: Criteria::from_columns(&kind, metric.as_deref(), threshold, condition.as_deref()),
      is_active: row.try_get("is_active")?,
      order: row.try_get("sort_order")?,
    })
  }
}

/// For registering catalog entries (upserted by title)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAchievement {
  pub title: String,
  pub description: String,
  pub category: AchievementCategory,
  pub icon: Option<String>,
  pub rarity: Rarity,
  pub points: i64,
  pub criteria: Criteria,
  pub is_active: bool,
  pub order: i64,
}

/// ---------------------------------------------------------------------------
/// Per-user State
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAchievement {
  pub id: i64,
  pub user_id: String,
  pub achievement_id: i64,
  /// Never reverts once true
  pub earned: bool,
  pub earned_date: Option<DateTime<Utc>>,
  pub progress_current: f64,
  pub progress_target: Option<f64>,
  pub notified: bool,
}

impl<'r> FromRow<'r, SqliteRow> for UserAchievement {
  fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
    Ok(Self {
      id: row.try_get("id")?,
      user_id: row.try_get("user_id")?,
      achievement_id: row.try_get("achievement_id")?,
      earned: row.try_get("earned")?,
      earned_date: row.try_get("earned_date")?,
      progress_current: row.try_get("progress_current")?,
      progress_target: row.try_get("progress_target")?,
      notified: row.try_get("notified")?,
    })
  }
}

/// Earned pairing joined with its catalog entry, newest first in listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarnedAchievement {
  pub achievement: Achievement,
  pub earned_date: Option<DateTime<Utc>>,
  pub notified: bool,
}

impl<'r> FromRow<'r, SqliteRow> for EarnedAchievement {
  fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
    Ok(Self {
      achievement: Achievement::from_row(row)?,
      earned_date: row.try_get("ua_earned_date")?,
      notified: row.try_get("ua_notified")?,
    })
  }
}

/// Catalog entry merged with one user's state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchievementProgress {
  pub achievement: Achievement,
  pub earned: bool,
  pub earned_date: Option<DateTime<Utc>>,
  pub progress_current: f64,
  pub progress_target: Option<f64>,
}
