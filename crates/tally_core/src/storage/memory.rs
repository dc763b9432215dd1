use crate::error::AppError;
use crate::storage::{Store, StoreState};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Process-local store, used by tests and by callers that bring their own
/// persistence.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
    fail_commits: AtomicBool,
}

impl MemoryStore {
    pub fn new(state: StoreState) -> Self {
        Self {
            state: Mutex::new(state),
            fail_commits: AtomicBool::new(false),
        }
    }

    /// Makes every following commit fail after the closure has run.
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }
}

impl Store for MemoryStore {
    fn load(&self) -> Result<StoreState, AppError> {
        let state = self
            .state
            .lock()
            .map_err(|_| AppError::persistence("memory store poisoned"))?;
        Ok(state.clone())
    }

    fn transaction<T, F>(&self, apply: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut StoreState) -> Result<T, AppError>,
    {
        let mut state = self
            .state
            .lock()
            .map_err(|_| AppError::persistence("memory store poisoned"))?;
        let mut working = state.clone();
        let value = apply(&mut working)?;
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(AppError::persistence("commit rejected"));
        }
        *state = working;
        Ok(value)
    }
}
