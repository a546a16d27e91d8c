use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::User;
use crate::validation::Input;

/// Request body for `POST /users/new`.
#[derive(Debug, Default, Deserialize)]
pub struct NewUserRequest {
    pub name: Option<Input>,
    pub email: Option<Input>,
}

/// Query string of `GET /users/new/authenticate`.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyQuery {
    pub email: Option<String>,
    pub token: Option<String>,
}

/// Request body for `PUT /users/:id`.
#[derive(Debug, Default, Deserialize)]
pub struct ActivateRequest {
    pub name: Option<Input>,
    pub password: Option<Input>,
}

/// Request body for `POST /users/authenticate`.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<Input>,
    pub password: Option<Input>,
}

/// Public part of the user returned to the client.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
        }
    }
}

/// Returned after verification or login.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: PublicUser,
    pub token: String,
}
