use serde::{Deserialize, Serialize};

/// Points ledger for one externally authenticated user. Both counters are
/// plain integers; the streak is maintained by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserLedger {
  pub id: String,
  pub current_streak: i64,
  pub total_points: i64,
}
