use crate::error::AppError;
use crate::model::{Task, User};
use std::collections::HashSet;

pub mod json_store;
pub mod memory;

pub use json_store::JsonStore;
pub use memory::MemoryStore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreState {
    pub users: Vec<User>,
    pub tasks: Vec<Task>,
}

impl StoreState {
    pub fn user(&self, user_id: &str) -> Option<&User> {
        self.users.iter().find(|user| user.id == user_id)
    }

    pub fn user_mut(&mut self, user_id: &str) -> Option<&mut User> {
        self.users.iter_mut().find(|user| user.id == user_id)
    }

    /// Looks a task up only within the tasks owned by `user_id`.
    pub fn owned_task_mut(&mut self, user_id: &str, task_id: &str) -> Option<&mut Task> {
        self.tasks
            .iter_mut()
            .find(|task| task.id == task_id && task.user_id == user_id)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let mut user_ids = HashSet::new();
        for user in &self.users {
            if !user_ids.insert(user.id.as_str()) {
                return Err(AppError::invalid_data(format!(
                    "duplicate user id {}",
                    user.id
                )));
            }
        }

        let mut task_ids = HashSet::new();
        for task in &self.tasks {
            if !task_ids.insert(task.id.as_str()) {
                return Err(AppError::invalid_data(format!(
                    "duplicate task id {}",
                    task.id
                )));
            }
            if !user_ids.contains(task.user_id.as_str()) {
                return Err(AppError::invalid_data(format!(
                    "task {} belongs to unknown user {}",
                    task.id, task.user_id
                )));
            }
        }

        Ok(())
    }
}

/// Transactional access to users and tasks.
///
/// `transaction` hands the closure a working copy of the state. The copy is
/// committed only when the closure returns `Ok`, and a commit either lands
/// completely or not at all.
pub trait Store {
    fn load(&self) -> Result<StoreState, AppError>;

    fn transaction<T, F>(&self, apply: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut StoreState) -> Result<T, AppError>;
}

#[cfg(test)]
mod tests {
    use super::StoreState;
    use crate::model::{Task, User};

    fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            name: id.to_string(),
            is_guest: false,
            score: 0,
            created_at: "2025-12-20T00:00:00Z".to_string(),
        }
    }

    fn task(id: &str, user_id: &str) -> Task {
        Task {
            id: id.to_string(),
            user_id: user_id.to_string(),
            title: "demo".to_string(),
            created_at: "2025-12-20T00:00:00Z".to_string(),
            deadline: "2025-12-20T23:59:59Z".to_string(),
            points: 10,
            completed: false,
            failed: false,
            points_awarded: false,
            amended_once: false,
            points_credited: 0,
            completed_at: None,
        }
    }

    #[test]
    fn owned_task_lookup_ignores_other_users() {
        let mut state = StoreState {
            users: vec![user("user-1"), user("user-2")],
            tasks: vec![task("task-1", "user-1")],
        };

        assert!(state.owned_task_mut("user-2", "task-1").is_none());
        assert!(state.owned_task_mut("user-1", "task-1").is_some());
    }

    #[test]
    fn validate_rejects_orphan_task() {
        let state = StoreState {
            users: vec![user("user-1")],
            tasks: vec![task("task-1", "user-9")],
        };

        assert_eq!(state.validate().unwrap_err().code(), "invalid_data");
    }

    #[test]
    fn validate_rejects_duplicate_ids() {
        let state = StoreState {
            users: vec![user("user-1"), user("user-1")],
            tasks: Vec::new(),
        };

        assert_eq!(state.validate().unwrap_err().code(), "invalid_data");
    }
}
