//! Goal lifecycle and progress tracking
//!
//! Status machine:
//! - active -> completed (automatic once progress reaches 100, or explicit)
//! - active <-> paused (user driven)
//! - active | paused -> abandoned (user driven)
//!
//! Completed and abandoned are terminal. Only an explicit `complete` credits
//! the completion bonus; the automatic transition awards nothing.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::{ensure_finite, ensure_user_id, EngineError, EngineResult};
use crate::models::{Goal, GoalFilter, GoalStatus, Milestone, NewGoal, Priority};
use crate::store::GoalStore;

/// `min(round(current / target * 100), 100)`, floored at 0. A non-positive
/// target yields 0.
pub fn compute_progress(current: f64, target: f64) -> i64 {
  if target > 0.0 && current.is_finite() {
    (current / target * 100.0).round().clamp(0.0, 100.0) as i64
  } else {
    0
  }
}

/// Set the current value and recompute everything derived from it. Milestones
/// only ever flip to achieved; status only ever moves active -> completed.
/// Returns true when this call completed the goal.
pub fn apply_progress(goal: &mut Goal, value: f64, now: DateTime<Utc>) -> bool {
  goal.current_value = value;
  goal.progress = compute_progress(value, goal.target_value);

  for milestone in goal.milestones.iter_mut() {
    if !milestone.achieved && milestone.value <= value {
      milestone.achieved = true;
      milestone.achieved_date = Some(now);
    }
  }

  if goal.progress >= 100 && goal.status == GoalStatus::Active {
    goal.status = GoalStatus::Completed;
    goal.completed_date = Some(now);
    return true;
  }
  false
}

fn ensure_owner(goal: &Goal, user_id: &str) -> EngineResult<()> {
  if goal.user_id != user_id {
    return Err(EngineError::Unauthorized(format!(
      "Goal {} does not belong to this user",
      goal.id
    )));
  }
  Ok(())
}

fn ensure_transition(goal: &Goal, allowed_from: &[GoalStatus], action: &str) -> EngineResult<()> {
  if allowed_from.contains(&goal.status) {
    return Ok(());
  }
  if goal.status.is_terminal() {
    return Err(EngineError::invalid(format!(
      "cannot {} goal {}: it is {} and can no longer change",
      action, goal.id, goal.status
    )));
  }
  Err(EngineError::invalid(format!(
    "cannot {} a goal that is {}",
    action, goal.status
  )))
}

pub struct GoalTracker {
  store: Arc<dyn GoalStore>,
  completion_bonus: i64,
}

impl GoalTracker {
  pub fn new(store: Arc<dyn GoalStore>, completion_bonus: i64) -> Self {
    Self {
      store,
      completion_bonus,
    }
  }

  pub async fn create(&self, user_id: &str, new_goal: NewGoal) -> EngineResult<Goal> {
    ensure_user_id(user_id)?;
    if new_goal.title.trim().is_empty() {
      return Err(EngineError::invalid("title is required"));
    }
    let current_value = ensure_finite("currentValue", new_goal.current_value)?;
    let target_value = ensure_finite("targetValue", new_goal.target_value)?;
    if target_value <= 0.0 {
      return Err(EngineError::invalid("targetValue must be greater than 0"));
    }

    let now = Utc::now();
    let start_date = new_goal.start_date.unwrap_or_else(|| now.date_naive());
    if new_goal.target_date < start_date {
      return Err(EngineError::invalid("targetDate must not be before startDate"));
    }

    let mut milestone_values = Vec::with_capacity(new_goal.milestones.len());
    for value in new_goal.milestones {
      milestone_values.push(ensure_finite("milestone", value)?);
    }
    milestone_values.sort_by(f64::total_cmp);
    milestone_values.dedup();

    let mut goal = Goal {
      id: 0,
      user_id: user_id.to_string(),
      goal_type: new_goal.goal_type,
      title: new_goal.title,
      description: new_goal.description,
      current_value,
      target_value,
      unit: new_goal.unit,
      start_date,
      target_date: new_goal.target_date,
      status: GoalStatus::Active,
      progress: 0,
      milestones: milestone_values.into_iter().map(Milestone::new).collect(),
      completed_date: None,
      category: new_goal.category,
      priority: new_goal.priority.unwrap_or(Priority::Medium),
      bonus_awarded: false,
      created_at: now,
      updated_at: now,
    };
    apply_progress(&mut goal, current_value, now);

    let goal = self.store.insert(&goal).await?;
    info!(goal_id = goal.id, user_id, goal_type = %goal.goal_type, "goal created");
    Ok(goal)
  }

  pub async fn get(&self, user_id: &str, goal_id: i64) -> EngineResult<Goal> {
    let goal = self
      .store
      .get(goal_id)
      .await?
      .ok_or_else(|| EngineError::not_found(format!("Goal {}", goal_id)))?;
    ensure_owner(&goal, user_id)?;
    Ok(goal)
  }

  /// Newest first.
  pub async fn list(&self, user_id: &str, filter: &GoalFilter) -> EngineResult<Vec<Goal>> {
    ensure_user_id(user_id)?;
    self.store.list(user_id, filter, None).await
  }

  pub async fn active(&self, user_id: &str, limit: i64) -> EngineResult<Vec<Goal>> {
    ensure_user_id(user_id)?;
    self.store.list(user_id, &GoalFilter::active(), Some(limit)).await
  }

  pub async fn count(&self, user_id: &str, filter: &GoalFilter) -> EngineResult<i64> {
    ensure_user_id(user_id)?;
    self.store.count(user_id, filter).await
  }

  pub async fn delete(&self, user_id: &str, goal_id: i64) -> EngineResult<()> {
    self.get(user_id, goal_id).await?;
    if !self.store.delete(goal_id).await? {
      return Err(EngineError::not_found(format!("Goal {}", goal_id)));
    }
    info!(goal_id, user_id, "goal deleted");
    Ok(())
  }

  /// Report a new current value for the goal.
  pub async fn update_progress(&self, user_id: &str, goal_id: i64, value: f64) -> EngineResult<Goal> {
    let value = ensure_finite("currentValue", value)?;

    let goal = self
      .store
      .modify(goal_id, &|goal: &mut Goal| {
        ensure_owner(goal, user_id)?;
        apply_progress(goal, value, Utc::now());
        Ok(0)
      })
      .await?;

    if goal.status == GoalStatus::Completed {
      info!(goal_id, user_id, progress = goal.progress, "goal at or past target");
    }
    Ok(goal)
  }

  /// Explicit completion. Credits the bonus once per goal; repeating the call
  /// on a goal that already received it changes nothing.
  pub async fn complete(&self, user_id: &str, goal_id: i64) -> EngineResult<Goal> {
    let (goal, credited) = self.complete_crediting(user_id, goal_id).await?;
    if credited > 0 {
      info!(goal_id, user_id, bonus = credited, "goal completed");
    } else {
      debug!(goal_id, user_id, "goal already completed, no bonus");
    }
    Ok(goal)
  }

  /// Returns the goal and the bonus the committed write actually credited.
  async fn complete_crediting(&self, user_id: &str, goal_id: i64) -> EngineResult<(Goal, i64)> {
    let bonus = self.completion_bonus;
    // Written on every attempt so a retried transaction reports its own outcome
    let credited = AtomicI64::new(0);

    let goal = self
      .store
      .modify(goal_id, &|goal: &mut Goal| {
        ensure_owner(goal, user_id)?;
        ensure_transition(goal, &[GoalStatus::Active, GoalStatus::Paused, GoalStatus::Completed], "complete")?;
        if goal.bonus_awarded {
          credited.store(0, Ordering::SeqCst);
          return Ok(0);
        }
        goal.status = GoalStatus::Completed;
        goal.progress = 100;
        goal.completed_date = Some(Utc::now());
        goal.bonus_awarded = true;
        credited.store(bonus, Ordering::SeqCst);
        Ok(bonus)
      })
      .await?;

    Ok((goal, credited.load(Ordering::SeqCst)))
  }

  pub async fn pause(&self, user_id: &str, goal_id: i64) -> EngineResult<Goal> {
    self
      .transition(user_id, goal_id, &[GoalStatus::Active], GoalStatus::Paused, "pause")
      .await
  }

  pub async fn resume(&self, user_id: &str, goal_id: i64) -> EngineResult<Goal> {
    self
      .transition(user_id, goal_id, &[GoalStatus::Paused], GoalStatus::Active, "resume")
      .await
  }

  pub async fn abandon(&self, user_id: &str, goal_id: i64) -> EngineResult<Goal> {
    self
      .transition(
        user_id,
        goal_id,
        &[GoalStatus::Active, GoalStatus::Paused],
        GoalStatus::Abandoned,
        "abandon",
      )
      .await
  }

  async fn transition(
    &self,
    user_id: &str,
    goal_id: i64,
    allowed_from: &[GoalStatus],
    to: GoalStatus,
    action: &str,
  ) -> EngineResult<Goal> {
    let goal = self
      .store
      .modify(goal_id, &|goal: &mut Goal| {
        ensure_owner(goal, user_id)?;
        ensure_transition(goal, allowed_from, action)?;
        goal.status = to;
        Ok(0)
      })
      .await?;

    info!(goal_id, user_id, status = %goal.status, "goal status changed");
    Ok(goal)
  }
}
