use crate::error::AppError;
use crate::leaderboard::{LeaderboardEntry, build_leaderboard};
use crate::model::{Task, User};
use crate::notify::{Notifier, ScoreEvent};
use crate::rank::{Rank, rank_for_score};
use crate::scoring::{ScoringRules, TaskFlags, evaluate_toggle};
use crate::storage::{Store, StoreState};
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, Time, UtcOffset};
use tracing::{info, warn};

const MIN_NAME_LEN: usize = 2;
const MAX_NAME_LEN: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub task: Task,
    pub points_delta: i64,
    pub user_score: i64,
    pub rank: &'static Rank,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub processed: usize,
    pub failed_task_ids: Vec<String>,
}

/// Task and score operations over one store.
///
/// Every mutation runs inside a single store transaction, so a task's flags
/// and its owner's score are always written together.
pub struct Tally<S: Store> {
    store: S,
    rules: ScoringRules,
    notifier: Box<dyn Notifier>,
}

impl<S: Store> Tally<S> {
    pub fn new(store: S, rules: ScoringRules, notifier: Box<dyn Notifier>) -> Self {
        Self {
            store,
            rules,
            notifier,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn rank(&self, score: i64) -> &'static Rank {
        rank_for_score(score)
    }

    pub fn register_user(
        &self,
        name: &str,
        is_guest: bool,
        now: OffsetDateTime,
    ) -> Result<User, AppError> {
        let trimmed = name.trim();
        let length = trimmed.chars().count();
        if length == 0 {
            return Err(AppError::invalid_input("name is required"));
        }
        if !is_guest && length < MIN_NAME_LEN {
            return Err(AppError::invalid_input(format!(
                "name must be at least {MIN_NAME_LEN} characters"
            )));
        }
        if length > MAX_NAME_LEN {
            return Err(AppError::invalid_input(format!(
                "name cannot be longer than {MAX_NAME_LEN} characters"
            )));
        }

        let created_at = format_timestamp(now.to_offset(UtcOffset::UTC))?;
        let user = self.store.transaction(|state| {
            let user = User {
                id: next_id("user", now, |id| state.user(id).is_some()),
                name: trimmed.to_string(),
                is_guest,
                score: 0,
                created_at,
            };
            state.users.push(user.clone());
            Ok(user)
        })?;

        info!(user_id = %user.id, guest = user.is_guest, "registered user");
        Ok(user)
    }

    pub fn get_user(&self, user_id: &str) -> Result<User, AppError> {
        let user_id = required_id(user_id, "user id")?;
        self.store
            .load()?
            .user(user_id)
            .cloned()
            .ok_or_else(|| AppError::not_found("user not found"))
    }

    pub fn add_task(
        &self,
        user_id: &str,
        title: &str,
        deadline: Option<&str>,
        now: OffsetDateTime,
    ) -> Result<Task, AppError> {
        let user_id = required_id(user_id, "user id")?;
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Err(AppError::invalid_input("title is required"));
        }
        if trimmed.chars().count() > self.rules.max_title_len {
            return Err(AppError::invalid_input(format!(
                "title cannot be longer than {} characters",
                self.rules.max_title_len
            )));
        }

        let deadline = match deadline.map(str::trim) {
            Some(value) if !value.is_empty() => parse_timestamp(value)
                .map_err(|_| AppError::invalid_input("deadline must be RFC3339"))?,
            _ => end_of_day(now),
        };
        let deadline = format_timestamp(deadline)?;
        let created_at = format_timestamp(now.to_offset(UtcOffset::UTC))?;
        let points = self.rules.base_points;

        let task = self.store.transaction(|state| {
            if state.user(user_id).is_none() {
                return Err(AppError::not_found("user not found"));
            }

            let task = Task {
                id: next_id("task", now, |id| state.tasks.iter().any(|task| task.id == id)),
                user_id: user_id.to_string(),
                title: trimmed.to_string(),
                created_at,
                deadline,
                points,
                completed: false,
                failed: false,
                points_awarded: false,
                amended_once: false,
                points_credited: 0,
                completed_at: None,
            };
            state.tasks.push(task.clone());
            Ok(task)
        })?;

        info!(user_id, task_id = %task.id, deadline = %task.deadline, "added task");
        Ok(task)
    }

    /// Tasks owned by `user_id`, newest first.
    pub fn list_tasks(&self, user_id: &str) -> Result<Vec<Task>, AppError> {
        let user_id = required_id(user_id, "user id")?;
        let state = self.store.load()?;
        if state.user(user_id).is_none() {
            return Err(AppError::not_found("user not found"));
        }

        Ok(state
            .tasks
            .into_iter()
            .rev()
            .filter(|task| task.user_id == user_id)
            .collect())
    }

    pub fn delete_task(&self, user_id: &str, task_id: &str) -> Result<Task, AppError> {
        let user_id = required_id(user_id, "user id")?;
        let task_id = required_id(task_id, "task id")?;

        let removed = self.store.transaction(|state| {
            let index = state
                .tasks
                .iter()
                .position(|task| task.id == task_id && task.user_id == user_id)
                .ok_or_else(|| AppError::not_found("task not found"))?;
            Ok(state.tasks.remove(index))
        })?;

        info!(user_id, task_id, "deleted task");
        Ok(removed)
    }

    pub fn toggle_task(
        &self,
        user_id: &str,
        task_id: &str,
        completed: bool,
        now: OffsetDateTime,
    ) -> Result<ToggleOutcome, AppError> {
        let user_id = required_id(user_id, "user id")?;
        let task_id = required_id(task_id, "task id")?;
        let completed_at = format_timestamp(now.to_offset(UtcOffset::UTC))?;

        let (outcome, event) = self.store.transaction(|state| {
            let user = state
                .user(user_id)
                .ok_or_else(|| AppError::not_found("user not found"))?;
            let previous_score = user.score;

            let task = state
                .owned_task_mut(user_id, task_id)
                .ok_or_else(|| AppError::not_found("task not found"))?;
            let transition = evaluate_toggle(&self.rules, TaskFlags::from(&*task), completed, now)?;
            transition.apply_to(task);
            task.completed_at = completed.then_some(completed_at);
            let task = task.clone();

            let user = state
                .user_mut(user_id)
                .ok_or_else(|| AppError::not_found("user not found"))?;
            user.score = apply_delta(user.score, transition.delta)?;

            let event = ScoreEvent {
                user_id: user.id.clone(),
                user_name: user.name.clone(),
                task_id: task.id.clone(),
                task_title: task.title.clone(),
                delta: transition.delta,
                score: user.score,
                previous_rank: rank_for_score(previous_score),
                rank: rank_for_score(user.score),
            };
            let outcome = ToggleOutcome {
                task,
                points_delta: transition.delta,
                user_score: user.score,
                rank: event.rank,
            };
            Ok((outcome, event))
        })?;

        info!(
            user_id,
            task_id,
            completed,
            delta = outcome.points_delta,
            score = outcome.user_score,
            "toggled task"
        );
        if event.delta != 0 {
            self.publish(&event);
        }
        Ok(outcome)
    }

    /// Marks every overdue pending task as failed and charges the penalty once.
    pub fn sweep_deadlines(&self, now: OffsetDateTime) -> Result<SweepReport, AppError> {
        let penalty = self.rules.failure_penalty;

        let (report, events) = self.store.transaction(|state| {
            let mut report = SweepReport::default();
            let mut events = Vec::new();

            for index in 0..state.tasks.len() {
                let task = &state.tasks[index];
                if task.completed || task.failed {
                    continue;
                }
                let deadline = parse_timestamp(&task.deadline).map_err(|_| {
                    AppError::invalid_data(format!("task {} has an invalid deadline", task.id))
                })?;
                if deadline >= now {
                    continue;
                }

                state.tasks[index].failed = true;
                let task = state.tasks[index].clone();
                let user = state.user_mut(&task.user_id).ok_or_else(|| {
                    AppError::invalid_data(format!("task {} has no owner", task.id))
                })?;
                let previous_score = user.score;
                user.score = apply_delta(user.score, penalty)?;

                events.push(ScoreEvent {
                    user_id: user.id.clone(),
                    user_name: user.name.clone(),
                    task_id: task.id.clone(),
                    task_title: task.title.clone(),
                    delta: penalty,
                    score: user.score,
                    previous_rank: rank_for_score(previous_score),
                    rank: rank_for_score(user.score),
                });
                report.processed += 1;
                report.failed_task_ids.push(task.id);
            }

            Ok((report, events))
        })?;

        info!(processed = report.processed, "deadline sweep finished");
        for event in events.iter().filter(|event| event.delta != 0) {
            self.publish(event);
        }
        Ok(report)
    }

    pub fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, AppError> {
        let state: StoreState = self.store.load()?;
        Ok(build_leaderboard(&state, limit))
    }

    fn publish(&self, event: &ScoreEvent) {
        if let Err(err) = self.notifier.notify(event) {
            warn!(user_id = %event.user_id, error = %err, "score notification failed");
        }
    }
}

fn required_id<'a>(value: &'a str, label: &str) -> Result<&'a str, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_input(format!("{label} is required")));
    }
    Ok(trimmed)
}

fn apply_delta(score: i64, delta: i64) -> Result<i64, AppError> {
    score
        .checked_add(delta)
        .ok_or_else(|| AppError::invalid_data("score overflow"))
}

fn next_id(prefix: &str, now: OffsetDateTime, taken: impl Fn(&str) -> bool) -> String {
    let base = format!("{prefix}-{}", now.unix_timestamp_nanos());
    if !taken(&base) {
        return base;
    }
    let mut suffix = 1;
    loop {
        let candidate = format!("{base}-{suffix}");
        if !taken(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

pub fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

pub fn now_local() -> OffsetDateTime {
    OffsetDateTime::now_utc().to_offset(local_offset())
}

/// Last second of the calendar day of `now`, in the offset of `now`.
pub fn end_of_day(now: OffsetDateTime) -> OffsetDateTime {
    now.replace_time(Time::MIDNIGHT)
        .replace_hour(23)
        .and_then(|value| value.replace_minute(59))
        .and_then(|value| value.replace_second(59))
        .unwrap_or(now)
}

pub fn parse_timestamp(value: &str) -> Result<OffsetDateTime, AppError> {
    OffsetDateTime::parse(value.trim(), &Rfc3339)
        .map_err(|_| AppError::invalid_data("timestamp must be RFC3339"))
}

pub fn format_timestamp(value: OffsetDateTime) -> Result<String, AppError> {
    value
        .format(&Rfc3339)
        .map_err(|err| AppError::invalid_data(err.to_string()))
}
