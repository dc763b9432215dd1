use crate::error::AppError;
use crate::notify::{Notifier, ScoreEvent};
use tauri_winrt_notification::Toast;

pub struct WindowsNotifier;

impl Notifier for WindowsNotifier {
    fn notify(&self, event: &ScoreEvent) -> Result<(), AppError> {
        if !event.rank_changed() {
            return Ok(());
        }

        Toast::new(Toast::POWERSHELL_APP_ID)
            .title("tally")
            .text1(&format!("{} is now {}", event.user_name, event.rank.name))
            .text2(&event.summary())
            .show()
            .map_err(|err| AppError::notification(err.to_string()))?;
        Ok(())
    }
}
