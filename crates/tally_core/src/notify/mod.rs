use crate::error::AppError;
use crate::rank::Rank;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use linux::LinuxNotifier;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::WindowsNotifier;

pub const DISABLE_ENV_VAR: &str = "TALLY_DISABLE_NOTIFICATIONS";

/// A committed change to a user's score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreEvent {
    pub user_id: String,
    pub user_name: String,
    pub task_id: String,
    pub task_title: String,
    pub delta: i64,
    pub score: i64,
    pub previous_rank: &'static Rank,
    pub rank: &'static Rank,
}

impl ScoreEvent {
    pub fn rank_changed(&self) -> bool {
        self.previous_rank.name != self.rank.name
    }

    pub fn summary(&self) -> String {
        let sign = if self.delta >= 0 { "+" } else { "" };
        format!(
            "{}{} points for \"{}\", score {} ({})",
            sign, self.delta, self.task_title, self.score, self.rank.name
        )
    }
}

/// Receives score changes after they are committed. Implementations must not
/// assume they can veto the change.
pub trait Notifier {
    fn notify(&self, event: &ScoreEvent) -> Result<(), AppError>;
}

pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _event: &ScoreEvent) -> Result<(), AppError> {
        Ok(())
    }
}

pub fn notifier_from_env() -> Box<dyn Notifier> {
    if std::env::var(DISABLE_ENV_VAR).is_ok() {
        return Box::new(NoopNotifier);
    }

    platform_notifier()
}

#[cfg(target_os = "linux")]
pub fn platform_notifier() -> Box<dyn Notifier> {
    Box::new(LinuxNotifier)
}

#[cfg(windows)]
pub fn platform_notifier() -> Box<dyn Notifier> {
    Box::new(WindowsNotifier)
}

#[cfg(not(any(target_os = "linux", windows)))]
pub fn platform_notifier() -> Box<dyn Notifier> {
    Box::new(NoopNotifier)
}
