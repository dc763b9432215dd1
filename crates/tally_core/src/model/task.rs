use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: String,
    pub deadline: String,
    /// Base value assigned at creation.
    pub points: i64,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub failed: bool,
    #[serde(default)]
    pub points_awarded: bool,
    #[serde(default)]
    pub amended_once: bool,
    /// Amount credited by the current completion, debited again on reversal.
    #[serde(default)]
    pub points_credited: i64,
    #[serde(default)]
    pub completed_at: Option<String>,
}

impl Task {
    pub fn status_label(&self) -> &'static str {
        if self.failed {
            "failed"
        } else if self.completed {
            "completed"
        } else {
            "pending"
        }
    }
}
