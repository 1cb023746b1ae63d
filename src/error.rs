//! Error taxonomy shared by every engine component.

use serde::Serialize;

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
  /// Referenced goal, achievement or metric record does not exist
  #[error("Not found: {0}")]
  NotFound(String),

  /// Entity exists but belongs to another user
  #[error("Not authorized: {0}")]
  Unauthorized(String),

  #[error("Invalid input: {0}")]
  InvalidInput(String),

  /// Store could not apply a write atomically after its retry budget
  #[error("Concurrency conflict: {0}")]
  ConcurrencyConflict(String),

  #[error("Database error: {0}")]
  Database(#[from] sqlx::Error),

  #[error("Migration error: {0}")]
  Migration(#[from] sqlx::migrate::MigrateError),

  #[error("Serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("Missing configuration: {0}")]
  Config(String),
}

impl EngineError {
  pub fn not_found(what: impl Into<String>) -> Self {
    EngineError::NotFound(what.into())
  }

  pub fn invalid(msg: impl Into<String>) -> Self {
    EngineError::InvalidInput(msg.into())
  }

  /// SQLite reports lock contention as BUSY (5) or LOCKED (6), possibly
  /// carrying an extended code in the upper bits.
  pub fn is_busy(&self) -> bool {
    match self {
      EngineError::Database(sqlx::Error::Database(db)) => db
        .code()
        .and_then(|code| code.parse::<i32>().ok())
        .is_some_and(|code| matches!(code & 0xff, 5 | 6)),
      EngineError::Database(sqlx::Error::PoolTimedOut) => true,
      _ => false,
    }
  }
}

impl Serialize for EngineError {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Reject NaN and infinities before they reach arithmetic or storage.
pub fn ensure_finite(field: &str, value: f64) -> EngineResult<f64> {
  if value.is_finite() {
    Ok(value)
  } else {
    Err(EngineError::invalid(format!("{} must be a number", field)))
  }
}

/// Finite and non-negative; additive amounts never subtract.
pub fn ensure_non_negative(field: &str, value: f64) -> EngineResult<f64> {
  let value = ensure_finite(field, value)?;
  if value < 0.0 {
    return Err(EngineError::invalid(format!("{} cannot be negative", field)));
  }
  Ok(value)
}

/// The identity provider hands us opaque ids; the only thing we can check is
/// that one was supplied.
pub fn ensure_user_id(user_id: &str) -> EngineResult<()> {
  if user_id.trim().is_empty() {
    return Err(EngineError::invalid("userId is required"));
  }
  Ok(())
}
