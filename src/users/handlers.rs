use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{ActivateRequest, LoginRequest, NewUserRequest, PublicUser, SessionResponse, VerifyQuery},
    extractors::{AuthUser, JsonBody, QueryParams},
    services::{self, RegisterOutcome},
    verification::VerificationSettings,
};
use crate::{error::AppError, state::AppState};

pub fn registration_routes() -> Router<AppState> {
    Router::new()
        .route("/users/new", post(register))
        .route("/users/new/authenticate", get(verify))
        .route("/users/authenticate", post(login))
}

pub fn management_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route(
            "/users/:id",
            get(get_user).put(activate).delete(delete_user),
        )
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<NewUserRequest>,
) -> Result<Response, AppError> {
    let settings = VerificationSettings {
        app_url: state.config.app_url.clone(),
        store_name: state.config.store_name.clone(),
    };
    let outcome =
        services::register(state.users.as_ref(), state.mailer.as_ref(), &settings, payload).await?;

    Ok(match outcome {
        RegisterOutcome::VerificationSent => StatusCode::NO_CONTENT.into_response(),
        RegisterOutcome::AlreadyActive => (
            StatusCode::OK,
            Json(json!({ "message": "User already exists and activated!" })),
        )
            .into_response(),
    })
}

#[instrument(skip(state, query))]
pub async fn verify(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<VerifyQuery>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let session = services::verify(state.users.as_ref(), &state.config.jwt, query).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

#[instrument(skip(state, payload))]
pub async fn activate(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<ActivateRequest>,
) -> Result<StatusCode, AppError> {
    services::activate(state.users.as_ref(), id, payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = services::login(state.users.as_ref(), &state.config.jwt, payload).await?;
    Ok(Json(session))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
) -> Result<Json<Vec<PublicUser>>, AppError> {
    Ok(Json(services::list_users(state.users.as_ref()).await?))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PublicUser>, AppError> {
    Ok(Json(services::get_user(state.users.as_ref(), id).await?))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    services::delete_user(state.users.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
