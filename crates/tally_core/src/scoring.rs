//! Points awarded or taken back when a task's completion flag changes.

use crate::error::AppError;
use crate::model::Task;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringRules {
    pub base_points: i64,
    pub early_bonus: i64,
    /// Completions before this local hour earn `early_bonus`.
    pub early_cutoff_hour: u8,
    pub failure_penalty: i64,
    pub max_title_len: usize,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            base_points: 10,
            early_bonus: 5,
            early_cutoff_hour: 12,
            failure_penalty: -5,
            max_title_len: 50,
        }
    }
}

impl ScoringRules {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.base_points < 0 {
            return Err(AppError::invalid_data("base_points must not be negative"));
        }
        if self.early_bonus < 0 {
            return Err(AppError::invalid_data("early_bonus must not be negative"));
        }
        if self.early_cutoff_hour > 24 {
            return Err(AppError::invalid_data(
                "early_cutoff_hour must be between 0 and 24",
            ));
        }
        if self.failure_penalty > 0 {
            return Err(AppError::invalid_data("failure_penalty must not be positive"));
        }
        if self.max_title_len == 0 {
            return Err(AppError::invalid_data("max_title_len must be positive"));
        }
        Ok(())
    }

    pub fn completion_points(&self, base: i64, now: OffsetDateTime) -> Result<i64, AppError> {
        if now.hour() < self.early_cutoff_hour {
            base.checked_add(self.early_bonus)
                .ok_or_else(|| AppError::invalid_data("completion points overflow"))
        } else {
            Ok(base)
        }
    }
}

/// Scoring-relevant slice of a task before a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskFlags {
    pub completed: bool,
    pub failed: bool,
    pub points_awarded: bool,
    pub amended_once: bool,
    pub points: i64,
    pub points_credited: i64,
}

impl From<&Task> for TaskFlags {
    fn from(task: &Task) -> Self {
        Self {
            completed: task.completed,
            failed: task.failed,
            points_awarded: task.points_awarded,
            amended_once: task.amended_once,
            points: task.points,
            points_credited: task.points_credited,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub delta: i64,
    pub completed: bool,
    pub points_awarded: bool,
    pub amended_once: bool,
    pub points_credited: i64,
}

impl Transition {
    pub fn apply_to(&self, task: &mut Task) {
        task.completed = self.completed;
        task.points_awarded = self.points_awarded;
        task.amended_once = self.amended_once;
        task.points_credited = self.points_credited;
    }
}

pub fn evaluate_toggle(
    rules: &ScoringRules,
    flags: TaskFlags,
    completed: bool,
    now: OffsetDateTime,
) -> Result<Transition, AppError> {
    if flags.completed == completed {
        let state = if completed { "completed" } else { "pending" };
        return Err(AppError::invalid_transition(format!(
            "task is already {state}"
        )));
    }

    if flags.failed {
        return Err(AppError::invalid_transition("task has failed its deadline"));
    }

    if completed {
        if flags.amended_once || flags.points_awarded {
            return Ok(Transition {
                delta: 0,
                completed: true,
                points_awarded: flags.points_awarded,
                amended_once: flags.amended_once,
                points_credited: flags.points_credited,
            });
        }

        let delta = rules.completion_points(flags.points, now)?;
        return Ok(Transition {
            delta,
            completed: true,
            points_awarded: true,
            amended_once: false,
            points_credited: delta,
        });
    }

    if flags.amended_once {
        return Err(AppError::invalid_transition(
            "cannot uncheck a task more than once",
        ));
    }

    let delta = if flags.points_awarded {
        -flags.points_credited
    } else {
        0
    };
    Ok(Transition {
        delta,
        completed: false,
        points_awarded: false,
        amended_once: true,
        points_credited: 0,
    })
}
