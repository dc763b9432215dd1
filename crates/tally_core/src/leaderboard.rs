use crate::rank::{Rank, rank_for_score};
use crate::storage::StoreState;
use serde::Serialize;
use std::cmp::Ordering;

pub const DEFAULT_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub position: usize,
    pub user_id: String,
    pub name: String,
    pub score: i64,
    pub rank: &'static Rank,
    pub tasks_completed: usize,
    pub tasks_failed: usize,
}

/// Non-guest users by descending score; ties fall back to name, then id.
pub fn build_leaderboard(state: &StoreState, limit: usize) -> Vec<LeaderboardEntry> {
    let mut users: Vec<_> = state.users.iter().filter(|user| !user.is_guest).collect();
    users.sort_by(|left, right| match right.score.cmp(&left.score) {
        Ordering::Equal => left
            .name
            .cmp(&right.name)
            .then_with(|| left.id.cmp(&right.id)),
        other => other,
    });

    users
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(index, user)| {
            let owned = state.tasks.iter().filter(|task| task.user_id == user.id);
            let (tasks_completed, tasks_failed) =
                owned.fold((0, 0), |(completed, failed), task| {
                    (
                        completed + usize::from(task.completed),
                        failed + usize::from(task.failed),
                    )
                });
            LeaderboardEntry {
                position: index + 1,
                user_id: user.id.clone(),
                name: user.name.clone(),
                score: user.score,
                rank: rank_for_score(user.score),
                tasks_completed,
                tasks_failed,
            }
        })
        .collect()
}
