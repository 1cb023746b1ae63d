/// Declares a closed string-valued enum stored as TEXT: snake_case serde
/// names, `as_str`, `Display` and `FromStr`.
macro_rules! text_enum {
  (
    $(#[$meta:meta])*
    pub enum $name:ident { $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)? }
  ) => {
    $(#[$meta])*
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    pub enum $name {
      $( $(#[$vmeta])* #[serde(rename = $text)] $variant ),+
    }

    impl $name {
      pub const ALL: &'static [$name] = &[$($name::$variant),+];

      pub fn as_str(&self) -> &'static str {
        match self {
          $( $name::$variant => $text ),+
        }
      }
    }

    impl std::fmt::Display for $name {
      fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
      }
    }

    impl std::str::FromStr for $name {
      type Err = String;
      fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
          $( $text => Ok($name::$variant), )+
          _ => Err(format!("Unknown {}: {}", stringify!($name), s)),
        }
      }
    }
  };
}

pub(crate) use text_enum;

pub mod achievement;
pub mod activity;
pub mod goal;
pub mod metric;
pub mod metric_path;
pub mod user;

pub use achievement::{
  Achievement, AchievementCategory, AchievementProgress, CountMetric, Criteria, EarnedAchievement,
  NewAchievement, Rarity, UserAchievement,
};
pub use activity::{Activity, ActivityType, Intensity, NewActivity};
pub use goal::{Goal, GoalCategory, GoalFilter, GoalStatus, GoalType, Milestone, NewGoal, Priority};
pub use metric::{
  BloodPressure, CalorieMetrics, DerivedFields, HeartRate, Macros, MetricDelta, MetricRecord,
  SleepEntry, SleepMetrics, StepsMetrics, Vitals, WaterMetrics, Weight, WeightUnit,
};
pub use metric_path::MetricPath;
pub use user::UserLedger;


/// Decode a TEXT column into a `text_enum!` type, surfacing unknown values
/// as a column decode error.
pub(crate) fn decode_text<T>(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<T, sqlx::Error>
where
  T: std::str::FromStr<Err = String>,
{
  use sqlx::Row;
  let raw: String = row.try_get(column)?;
  raw.parse().map_err(|e: String| sqlx::Error::ColumnDecode {
    index: column.to_string(),
    source: e.into(),
  })
}
