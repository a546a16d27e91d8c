use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{ActivateRequest, LoginRequest, NewUserRequest, PublicUser, SessionResponse, VerifyQuery},
    jwt::JwtKeys,
    password::{generate_verification_token, hash_password, verify_password},
    repo::UserStore,
    repo_types::{NewUser, UserChanges},
    verification::{send_verification, VerificationSettings},
};
use crate::{
    config::JwtConfig,
    error::AppError,
    mailer::{MailOutcome, Mailer},
    validation::Required,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    VerificationSent,
    AlreadyActive,
}

/// Ensures a pending user with a fresh token exists for the email and mails the token.
#[instrument(skip_all)]
pub async fn register(
    users: &dyn UserStore,
    mailer: &dyn Mailer,
    settings: &VerificationSettings,
    req: NewUserRequest,
) -> Result<RegisterOutcome, AppError> {
    let mut v = Required::new();
    let name = v.text("name", req.name.as_ref());
    let email = v.text("email", req.email.as_ref());
    v.finish()?;

    let token = generate_verification_token();
    let token_hash = hash_password(&token)?;

    let existing = match users.find_by_email(&email).await? {
        Some(found) => Some(found),
        None => {
            let pending = NewUser {
                name: name.clone(),
                email: email.clone(),
                password_hash: token_hash.clone(),
            };
            match users.create(&pending).await? {
                Some(created) => {
                    info!(user_id = %created.id, "pending user created");
                    None
                }
                // A concurrent registration inserted the email first; re-issue on its record.
                None => Some(users.find_by_email(&email).await?.ok_or_else(|| {
                    anyhow::anyhow!("user vanished after conflicting insert")
                })?),
            }
        }
    };

    if let Some(user) = existing {
        if user.active {
            info!(user_id = %user.id, "registration for active user rejected");
            return Ok(RegisterOutcome::AlreadyActive);
        }
        users
            .update(user.id, &UserChanges::reissue(name.clone(), token_hash))
            .await?;
        info!(user_id = %user.id, "verification token re-issued");
    }

    match send_verification(mailer, settings, &name, &email, &token).await {
        MailOutcome::Sent => Ok(RegisterOutcome::VerificationSent),
        MailOutcome::Failed(reason) => Err(AppError::MailDelivery(reason)),
    }
}

/// Checks the mailed token against a pending user and issues a session token.
#[instrument(skip_all)]
pub async fn verify(
    users: &dyn UserStore,
    jwt: &JwtConfig,
    query: VerifyQuery,
) -> Result<SessionResponse, AppError> {
    let mut v = Required::new();
    let email = v.field("email", query.email.as_deref());
    let token = v.field("token", query.token.as_deref());
    v.finish()?;

    let user = users
        .find_by_email(&email)
        .await?
        .filter(|u| !u.active)
        .ok_or_else(|| {
            warn!("verification for unknown or active email");
            AppError::InvalidCredentials
        })?;

    if !verify_password(&token, &user.password_hash)? {
        warn!(user_id = %user.id, "verification token mismatch");
        return Err(AppError::InvalidCredentials);
    }

    let keys = JwtKeys::from_config(jwt)?;
    let token = keys.sign(user.id)?;

    info!(user_id = %user.id, "e-mail verified");
    Ok(SessionResponse {
        user: user.into(),
        token,
    })
}

/// Sets the permanent password and marks the user active.
#[instrument(skip(users, req))]
pub async fn activate(users: &dyn UserStore, id: Uuid, req: ActivateRequest) -> Result<(), AppError> {
    let mut v = Required::new();
    let name = v.text("name", req.name.as_ref());
    let password = v.text("password", req.password.as_ref());
    v.finish()?;

    let hash = hash_password(&password)?;
    if users.update(id, &UserChanges::activate(name, hash)).await? {
        info!(user_id = %id, "user activated");
    } else {
        warn!(user_id = %id, "activation matched no user");
    }
    Ok(())
}

#[instrument(skip_all)]
pub async fn login(
    users: &dyn UserStore,
    jwt: &JwtConfig,
    req: LoginRequest,
) -> Result<SessionResponse, AppError> {
    let mut v = Required::new();
    let email = v.text("email", req.email.as_ref());
    let password = v.text("password", req.password.as_ref());
    v.finish()?;

    let Some(user) = users.find_by_email(&email).await?.filter(|u| u.active) else {
        warn!("login for unknown or pending email");
        return Err(AppError::InvalidLogin);
    };

    if !verify_password(&password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidLogin);
    }

    let token = JwtKeys::from_config(jwt)?.sign(user.id)?;
    info!(user_id = %user.id, "user logged in");
    Ok(SessionResponse {
        user: user.into(),
        token,
    })
}

pub async fn list_users(users: &dyn UserStore) -> Result<Vec<PublicUser>, AppError> {
    Ok(users.list().await?.into_iter().map(PublicUser::from).collect())
}

pub async fn get_user(users: &dyn UserStore, id: Uuid) -> Result<PublicUser, AppError> {
    users
        .find_by_id(id)
        .await?
        .map(PublicUser::from)
        .ok_or(AppError::NotFound("User"))
}

pub async fn delete_user(users: &dyn UserStore, id: Uuid) -> Result<(), AppError> {
    if !users.delete(id).await? {
        return Err(AppError::NotFound("User"));
    }
    info!(user_id = %id, "user deleted");
    Ok(())
}
