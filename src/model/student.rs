use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Student {
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    /// Normalized PNG; at most one, the latest upload wins
    #[serde(skip)]
    pub profile_pic: Option<Vec<u8>>,
    pub photo_updated_at: Option<NaiveDateTime>,
}

impl Student {
    /// Changes whenever a new reference photo is stored.
    pub fn photo_version(&self) -> i64 {
        self.photo_updated_at
            .map(|t| t.and_utc().timestamp_micros())
            .unwrap_or(0)
    }
}
