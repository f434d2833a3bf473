use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Instructor {
    pub id: u64,
    pub username: String,
    /// argon2 PHC string, never the plaintext
    #[serde(skip_serializing)]
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone)]
pub struct NewInstructor {
    pub username: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
}
