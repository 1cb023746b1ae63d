//! Typed addressing of numeric fields on a daily metric record.
//!
//! Achievement criteria name a metric with a dotted path such as
//! `steps.current`. Paths are parsed once into a closed set of variants, each
//! mapped to a field accessor; anything outside that set becomes
//! `Unsupported` and never resolves.

use serde::{Deserialize, Serialize};

use super::MetricRecord;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MetricPath {
  StepsCurrent,
  StepsTarget,
  StepsDistance,
  StepsActiveMinutes,
  StepsCaloriesBurned,
  CaloriesConsumed,
  CaloriesBurned,
  CaloriesTarget,
  CaloriesRemaining,
  MacrosProtein,
  MacrosCarbs,
  MacrosFat,
  MacrosFiber,
  WaterCurrent,
  WaterTarget,
  WaterGlasses,
  WaterHydrationLevel,
  SleepDuration,
  SleepTarget,
  SleepQuality,
  SleepDeep,
  SleepLight,
  SleepRem,
  HeartRateResting,
  HeartRateAverage,
  HeartRateMax,
  HeartRateMin,
  BloodPressureSystolic,
  BloodPressureDiastolic,
  WeightValue,
  /// Well-formed or not, no accessor exists for this path
  Unsupported(String),
}

const PATHS: &[(&str, MetricPath)] = &[
  ("steps.current", MetricPath::StepsCurrent),
  ("steps.target", MetricPath::StepsTarget),
  ("steps.distance", MetricPath::StepsDistance),
  ("steps.activeMinutes", MetricPath::StepsActiveMinutes),
  ("steps.caloriesBurned", MetricPath::StepsCaloriesBurned),
  ("calories.consumed", MetricPath::CaloriesConsumed),
  ("calories.burned", MetricPath::CaloriesBurned),
  ("calories.target", MetricPath::CaloriesTarget),
  ("calories.remaining", MetricPath::CaloriesRemaining),
  ("calories.macros.protein", MetricPath::MacrosProtein),
  ("calories.macros.carbs", MetricPath::MacrosCarbs),
  ("calories.macros.fat", MetricPath::MacrosFat),
  ("calories.macros.fiber", MetricPath::MacrosFiber),
  ("water.current", MetricPath::WaterCurrent),
  ("water.target", MetricPath::WaterTarget),
  ("water.glasses", MetricPath::WaterGlasses),
  ("water.hydrationLevel", MetricPath::WaterHydrationLevel),
  ("sleep.duration", MetricPath::SleepDuration),
  ("sleep.target", MetricPath::SleepTarget),
  ("sleep.quality", MetricPath::SleepQuality),
  ("sleep.deepSleep", MetricPath::SleepDeep),
  ("sleep.lightSleep", MetricPath::SleepLight),
  ("sleep.remSleep", MetricPath::SleepRem),
  ("heartRate.resting", MetricPath::HeartRateResting),
  ("heartRate.average", MetricPath::HeartRateAverage),
  ("heartRate.max", MetricPath::HeartRateMax),
  ("heartRate.min", MetricPath::HeartRateMin),
  ("bloodPressure.systolic", MetricPath::BloodPressureSystolic),
  ("bloodPressure.diastolic", MetricPath::BloodPressureDiastolic),
  ("weight.value", MetricPath::WeightValue),
];

impl MetricPath {
  /// Never fails: unknown paths map to `Unsupported`.
  pub fn parse(raw: &str) -> Self {
    let trimmed = raw.trim();
    PATHS
      .iter()
      .find(|(path, _)| *path == trimmed)
      .map(|(_, variant)| variant.clone())
      .unwrap_or_else(|| MetricPath::Unsupported(trimmed.to_string()))
  }

  pub fn as_str(&self) -> &str {
    match self {
      MetricPath::Unsupported(raw) => raw.as_str(),
      known => PATHS
        .iter()
        .find(|(_, variant)| variant == known)
        .map(|(path, _)| *path)
        .unwrap_or(""),
    }
  }

  pub fn is_supported(&self) -> bool {
    !matches!(self, MetricPath::Unsupported(_))
  }

  /// Syntactic check used when registering catalog entries: non-empty
  /// dot-separated identifier segments.
  pub fn is_well_formed(raw: &str) -> bool {
    !raw.is_empty()
      && raw.split('.').all(|segment| {
        let mut chars = segment.chars();
        chars.next().is_some_and(|c| c.is_ascii_alphabetic())
          && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
      })
  }

  /// Read the addressed value. `None` for unsupported paths and for optional
  /// readings that were never recorded.
  pub fn resolve(&self, record: &MetricRecord) -> Option<f64> {
    let value = match self {
      MetricPath::StepsCurrent => record.steps.current as f64,
      MetricPath::StepsTarget => record.steps.target as f64,
      MetricPath::StepsDistance => record.steps.distance,
      MetricPath::StepsActiveMinutes => record.steps.active_minutes,
      MetricPath::StepsCaloriesBurned => record.steps.calories_burned,
      MetricPath::CaloriesConsumed => record.calories.consumed,
      MetricPath::CaloriesBurned => record.calories.burned,
      MetricPath::CaloriesTarget => record.calories.target,
      MetricPath::CaloriesRemaining => record.calories.remaining,
      MetricPath::MacrosProtein => record.calories.macros.protein,
      MetricPath::MacrosCarbs => record.calories.macros.carbs,
      MetricPath::MacrosFat => record.calories.macros.fat,
      MetricPath::MacrosFiber => record.calories.macros.fiber,
      MetricPath::WaterCurrent => record.water.current,
      MetricPath::WaterTarget => record.water.target,
      MetricPath::WaterGlasses => record.water.glasses,
      MetricPath::WaterHydrationLevel => record.water.hydration_level as f64,
      MetricPath::SleepDuration => record.sleep.duration,
      MetricPath::SleepTarget => record.sleep.target,
      MetricPath::SleepQuality => record.sleep.quality as f64,
      MetricPath::SleepDeep => record.sleep.deep_sleep,
      MetricPath::SleepLight => record.sleep.light_sleep,
      MetricPath::SleepRem => record.sleep.rem_sleep,
      MetricPath::HeartRateResting => record.heart_rate.resting? as f64,
      MetricPath::HeartRateAverage => record.heart_rate.average? as f64,
      MetricPath::HeartRateMax => record.heart_rate.max? as f64,
      MetricPath::HeartRateMin => record.heart_rate.min? as f64,
      MetricPath::BloodPressureSystolic => record.blood_pressure.systolic? as f64,
      MetricPath::BloodPressureDiastolic => record.blood_pressure.diastolic? as f64,
      MetricPath::WeightValue => record.weight.value?,
      MetricPath::Unsupported(_) => return None,
    };
    Some(value)
  }
}

impl From<String> for MetricPath {
  fn from(raw: String) -> Self {
    MetricPath::parse(&raw)
  }
}

impl From<MetricPath> for String {
  fn from(path: MetricPath) -> Self {
    path.as_str().to_string()
  }
}

impl std::fmt::Display for MetricPath {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_utils::mock_metric_record;

  #[test]
  fn test_parse_known_paths() {
    assert_eq!(MetricPath::parse("steps.current"), MetricPath::StepsCurrent);
    assert_eq!(MetricPath::parse(" water.current "), MetricPath::WaterCurrent);
    assert_eq!(MetricPath::parse("sleep.duration"), MetricPath::SleepDuration);
  }

  #[test]
  fn test_every_known_path_round_trips_through_its_name() {
    for (name, variant) in PATHS {
      assert_eq!(&MetricPath::parse(name), variant);
      assert_eq!(variant.as_str(), *name);
    }
  }

  #[test]
  fn test_unknown_path_is_unsupported_and_unresolvable() {
    let path = MetricPath::parse("steps.favouriteColour");
    assert!(!path.is_supported());
    assert_eq!(path.as_str(), "steps.favouriteColour");
    assert_eq!(path.resolve(&mock_metric_record("u1")), None);
  }

  #[test]
  fn test_resolve_reads_record_fields() {
    let mut record = mock_metric_record("u1");
    record.steps.current = 12_345;
    record.water.current = 1_750.0;
    record.sleep.duration = 7.5;

    assert_eq!(MetricPath::StepsCurrent.resolve(&record), Some(12_345.0));
    assert_eq!(MetricPath::WaterCurrent.resolve(&record), Some(1_750.0));
    assert_eq!(MetricPath::SleepDuration.resolve(&record), Some(7.5));
  }

  #[test]
  fn test_missing_optional_readings_resolve_to_none() {
    let mut record = mock_metric_record("u1");
    assert_eq!(MetricPath::HeartRateResting.resolve(&record), None);
    assert_eq!(MetricPath::WeightValue.resolve(&record), None);

    record.heart_rate.resting = Some(52);
    assert_eq!(MetricPath::HeartRateResting.resolve(&record), Some(52.0));
  }

  #[test]
  fn test_well_formed_paths() {
    assert!(MetricPath::is_well_formed("steps.current"));
    assert!(MetricPath::is_well_formed("calories.macros.protein"));
    assert!(!MetricPath::is_well_formed(""));
    assert!(!MetricPath::is_well_formed("steps..current"));
    assert!(!MetricPath::is_well_formed("steps.current["));
    assert!(!MetricPath::is_well_formed("9lives"));
  }

  #[test]
  fn test_serde_uses_dotted_name() {
    let json = serde_json::to_string(&MetricPath::WaterCurrent).unwrap();
    assert_eq!(json, "\"water.current\"");
    let back: MetricPath = serde_json::from_str("\"sleep.remSleep\"").unwrap();
    assert_eq!(back, MetricPath::SleepRem);
  }
}
