use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{ImageView, ProductView},
    services,
    upload::{read_form, MAX_BODY_BYTES},
};
use crate::{error::AppError, state::AppState, users::extractors::AuthUser};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products))
        .route("/products/:id", get(get_product))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/products", post(create_product))
        .route("/products/:id", put(update_product).delete(delete_product))
        .route("/product/images", post(add_image))
        .route("/product/images/:id", delete(delete_image))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}

#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProductView>>, AppError> {
    let items = services::list_products(state.products.as_ref(), state.storage.as_ref()).await?;
    Ok(Json(items))
}

#[instrument(skip(state))]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProductView>, AppError> {
    let view = services::get_product(state.products.as_ref(), state.storage.as_ref(), id).await?;
    Ok(Json(view))
}

/// POST /products (multipart: name, description, price, images[])
#[instrument(skip(state, mp))]
pub async fn create_product(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut mp: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let form = read_form(&mut mp, &["images", "images[]"], state.config.upload_max_file_bytes).await?;
    let view = services::create_product(state.products.as_ref(), state.storage.as_ref(), form).await?;
    let location = format!("/products/{}", view.id);
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(view)))
}

/// PUT /products/:id (multipart; present fields overwrite, images[] are appended)
#[instrument(skip(state, mp))]
pub async fn update_product(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    mut mp: Multipart,
) -> Result<Json<ProductView>, AppError> {
    let form = read_form(&mut mp, &["images", "images[]"], state.config.upload_max_file_bytes).await?;
    let view =
        services::update_product(state.products.as_ref(), state.storage.as_ref(), id, form).await?;
    Ok(Json(view))
}

#[instrument(skip(state))]
pub async fn delete_product(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    services::delete_product(state.products.as_ref(), state.storage.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /product/images (multipart: product_id, image)
#[instrument(skip(state, mp))]
pub async fn add_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut mp: Multipart,
) -> Result<(StatusCode, Json<ImageView>), AppError> {
    let form = read_form(&mut mp, &["image"], state.config.upload_max_file_bytes).await?;
    let image = services::add_image(state.products.as_ref(), state.storage.as_ref(), form).await?;
    Ok((StatusCode::CREATED, Json(image)))
}

#[instrument(skip(state))]
pub async fn delete_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    services::delete_image(state.products.as_ref(), state.storage.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
