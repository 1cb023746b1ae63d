//! Default achievement catalog

use crate::achievements::AchievementEngine;
use crate::error::EngineResult;
use crate::models::{
  Achievement, AchievementCategory, CountMetric, Criteria, MetricPath, NewAchievement, Rarity,
};

fn entry(
  title: &str,
  description: &str,
  category: AchievementCategory,
  icon: &str,
  rarity: Rarity,
  points: i64,
  criteria: Criteria,
) -> NewAchievement {
  NewAchievement {
    title: title.to_string(),
    description: description.to_string(),
    category,
    icon: Some(icon.to_string()),
    rarity,
    points,
    criteria,
    is_active: true,
    order: 0,
  }
}

fn activities(threshold: f64) -> Criteria {
  Criteria::Count {
    metric: CountMetric::Activities,
    threshold,
  }
}

fn value(metric: MetricPath, threshold: f64) -> Criteria {
  Criteria::Value { metric, threshold }
}

/// The built-in catalog, in display order.
pub fn default_catalog() -> Vec<NewAchievement> {
  use AchievementCategory as C;

  let mut catalog = vec![
    entry("First Steps", "Complete your first workout", C::Workout, "👟", Rarity::Common, 10, activities(1.0)),
    entry("Consistency King", "Maintain a 7-day streak", C::Streak, "🔥", Rarity::Rare, 30, Criteria::Streak { threshold: 7.0 }),
    entry("Marathon Master", "Maintain a 30-day streak", C::Streak, "👑", Rarity::Epic, 100, Criteria::Streak { threshold: 30.0 }),
    entry("Step Counter", "Reach 10,000 steps in a day", C::Steps, "🚶", Rarity::Common, 15, value(MetricPath::StepsCurrent, 10_000.0)),
    entry("Distance Warrior", "Reach 20,000 steps in a day", C::Steps, "🏃", Rarity::Rare, 40, value(MetricPath::StepsCurrent, 20_000.0)),
    entry("Hydration Hero", "Meet your water goal for the day", C::Nutrition, "💧", Rarity::Common, 10, value(MetricPath::WaterCurrent, 2_500.0)),
    entry("Early Bird", "Log 10 workouts", C::Workout, "⏰", Rarity::Common, 25, activities(10.0)),
    entry("Fitness Enthusiast", "Log 50 workouts", C::Workout, "🏋️", Rarity::Epic, 75, activities(50.0)),
    entry("Sleep Champion", "Get 8 hours of sleep", C::Sleep, "😴", Rarity::Common, 15, value(MetricPath::SleepDuration, 8.0)),
    entry("Century Club", "Log 100 activities", C::Milestone, "💯", Rarity::Legendary, 150, activities(100.0)),
  ];

  for (i, achievement) in catalog.iter_mut().enumerate() {
    achievement.order = i as i64;
  }
  catalog
}

/// Register every default entry. Idempotent: entries are upserted by title,
/// so re-seeding refreshes them without duplicating.
pub async fn seed_default_catalog(engine: &AchievementEngine) -> EngineResult<Vec<Achievement>> {
  let mut seeded = Vec::new();
  for achievement in default_catalog() {
    seeded.push(engine.register(&achievement).await?);
  }
  tracing::info!(count = seeded.len(), "default achievement catalog seeded");
  Ok(seeded)
}
