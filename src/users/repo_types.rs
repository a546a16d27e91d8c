use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// Argon2 hash: the verification token while pending, the password once active.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub active: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// A pending user about to be inserted.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Full overwrite of the mutable user columns.
#[derive(Debug, Clone)]
pub struct UserChanges {
    pub name: String,
    pub password_hash: String,
    pub active: bool,
}

impl UserChanges {
    pub fn reissue(name: String, token_hash: String) -> Self {
        Self {
            name,
            password_hash: token_hash,
            active: false,
        }
    }

    pub fn activate(name: String, password_hash: String) -> Self {
        Self {
            name,
            password_hash,
            active: true,
        }
    }
}
