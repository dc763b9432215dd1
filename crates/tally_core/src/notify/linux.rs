use crate::error::AppError;
use crate::notify::{Notifier, ScoreEvent};
use notify_rust::Notification;

/// Desktop toast for rank changes; other score events stay silent.
pub struct LinuxNotifier;

impl Notifier for LinuxNotifier {
    fn notify(&self, event: &ScoreEvent) -> Result<(), AppError> {
        if !event.rank_changed() {
            return Ok(());
        }

        Notification::new()
            .summary(&format!("tally: {} is now {}", event.user_name, event.rank.name))
            .body(&event.summary())
            .show()
            .map_err(|err| AppError::notification(err.to_string()))?;
        Ok(())
    }
}
