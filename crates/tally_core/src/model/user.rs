use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_guest: bool,
    #[serde(default)]
    pub score: i64,
    pub created_at: String,
}
