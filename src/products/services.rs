use anyhow::Context;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{ImageView, ProductView},
    repo::ProductStore,
    repo_types::{NewProduct, Product, ProductChanges, ProductImage},
    upload::{UploadForm, UploadedFile},
};
use crate::{
    error::AppError,
    storage::{product_image_key, StorageClient},
    validation::Required,
};

pub async fn list_products(
    products: &dyn ProductStore,
    storage: &dyn StorageClient,
) -> Result<Vec<ProductView>, AppError> {
    let rows = products.list().await?;
    let ids: Vec<Uuid> = rows.iter().map(|p| p.id).collect();
    let images = products.images_for(&ids).await?;

    let mut out = Vec::with_capacity(rows.len());
    for product in rows {
        let own: Vec<&ProductImage> = images.iter().filter(|i| i.product_id == product.id).collect();
        out.push(render(storage, product, own).await?);
    }
    Ok(out)
}

pub async fn get_product(
    products: &dyn ProductStore,
    storage: &dyn StorageClient,
    id: Uuid,
) -> Result<ProductView, AppError> {
    let product = products
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound("Product"))?;
    let images = products.images_for(&[id]).await?;
    render(storage, product, images.iter().collect()).await
}

/// Uploads the images under a fresh product id, then inserts the product and
/// its image rows together. Uploaded objects are removed if the insert fails.
#[instrument(skip_all)]
pub async fn create_product(
    products: &dyn ProductStore,
    storage: &dyn StorageClient,
    form: UploadForm,
) -> Result<ProductView, AppError> {
    let mut v = Required::new();
    let name = v.field("name", form.field("name"));
    let raw_price = v.field("price", form.field("price"));
    let price_cents = if raw_price.is_empty() {
        0
    } else {
        price_or_error(&mut v, &raw_price)
    };
    v.finish()?;

    let new = NewProduct {
        id: Uuid::new_v4(),
        name,
        description: optional(form.field("description")),
        price_cents,
    };

    let objects = upload_images(storage, new.id, form.files).await?;
    let product = match products.create(&new, &objects).await {
        Ok(product) => product,
        Err(e) => {
            discard_objects(storage, &objects).await;
            return Err(e.into());
        }
    };
    info!(product_id = %product.id, images = objects.len(), "product created");

    get_product(products, storage, product.id).await
}

#[instrument(skip(products, storage, form))]
pub async fn update_product(
    products: &dyn ProductStore,
    storage: &dyn StorageClient,
    id: Uuid,
    form: UploadForm,
) -> Result<ProductView, AppError> {
    let mut v = Required::new();
    let mut changes = ProductChanges::default();
    if let Some(raw) = form.field("name") {
        changes.name = Some(v.field("name", Some(raw)));
    }
    if let Some(raw) = form.field("price") {
        changes.price_cents = Some(price_or_error(&mut v, raw));
    }
    changes.description = optional(form.field("description"));
    v.finish()?;

    products
        .update(id, &changes)
        .await?
        .ok_or(AppError::NotFound("Product"))?;

    attach_images(products, storage, id, form.files).await?;
    info!(product_id = %id, "product updated");
    get_product(products, storage, id).await
}

#[instrument(skip(products, storage))]
pub async fn delete_product(
    products: &dyn ProductStore,
    storage: &dyn StorageClient,
    id: Uuid,
) -> Result<(), AppError> {
    let images = products
        .delete(id)
        .await?
        .ok_or(AppError::NotFound("Product"))?;

    for image in images {
        if let Err(e) = storage.delete_object(&image.storage_key).await {
            warn!(error = %e, key = %image.storage_key, "orphaned product image object");
        }
    }
    info!(product_id = %id, "product deleted");
    Ok(())
}

#[instrument(skip_all)]
pub async fn add_image(
    products: &dyn ProductStore,
    storage: &dyn StorageClient,
    form: UploadForm,
) -> Result<ImageView, AppError> {
    let mut v = Required::new();
    let raw_id = v.field("product_id", form.field("product_id"));
    let product_id = match raw_id.parse::<Uuid>() {
        Ok(id) => Some(id),
        Err(_) => {
            if !raw_id.is_empty() {
                v.error("product_id", "product_id must be a UUID");
            }
            None
        }
    };
    if form.files.len() != 1 {
        v.error("image", "exactly one image is required");
    }
    v.finish()?;
    let product_id = product_id.ok_or(AppError::NotFound("Product"))?;

    products
        .find_by_id(product_id)
        .await?
        .ok_or(AppError::NotFound("Product"))?;

    let stored = attach_images(products, storage, product_id, form.files).await?;
    let image = stored
        .into_iter()
        .next()
        .context("image row missing after insert")?;
    Ok(ImageView {
        url: storage.image_url(&image.storage_key).await?,
        id: image.id,
    })
}

/// Removes the image row, then its object. A failed object delete only leaves
/// an orphan in the bucket and is logged.
#[instrument(skip(products, storage))]
pub async fn delete_image(
    products: &dyn ProductStore,
    storage: &dyn StorageClient,
    id: Uuid,
) -> Result<(), AppError> {
    let image = products
        .delete_image(id)
        .await?
        .ok_or(AppError::NotFound("Image"))?;
    if let Err(e) = storage.delete_object(&image.storage_key).await {
        warn!(error = %e, key = %image.storage_key, "orphaned product image object");
    }
    Ok(())
}

/// Uploads every file, then links them to an existing product in one transaction.
async fn attach_images(
    products: &dyn ProductStore,
    storage: &dyn StorageClient,
    product_id: Uuid,
    files: Vec<UploadedFile>,
) -> anyhow::Result<Vec<ProductImage>> {
    if files.is_empty() {
        return Ok(Vec::new());
    }

    let objects = upload_images(storage, product_id, files).await?;
    match products.add_images(product_id, &objects).await {
        Ok(rows) => Ok(rows),
        Err(e) => {
            discard_objects(storage, &objects).await;
            Err(e)
        }
    }
}

/// Puts each file under the product's prefix. On failure the objects already
/// written by this call are deleted before the error is returned.
async fn upload_images(
    storage: &dyn StorageClient,
    product_id: Uuid,
    files: Vec<UploadedFile>,
) -> anyhow::Result<Vec<(Uuid, String)>> {
    let mut objects = Vec::with_capacity(files.len());
    for file in files {
        let id = Uuid::new_v4();
        let key = product_image_key(product_id, id, file.ext);
        if let Err(e) = storage.put_object(&key, file.body, &file.content_type).await {
            discard_objects(storage, &objects).await;
            return Err(e);
        }
        objects.push((id, key));
    }
    Ok(objects)
}

async fn discard_objects(storage: &dyn StorageClient, objects: &[(Uuid, String)]) {
    for (_, key) in objects {
        if let Err(e) = storage.delete_object(key).await {
            warn!(error = %e, %key, "could not remove uploaded image");
        }
    }
}

async fn render(
    storage: &dyn StorageClient,
    product: Product,
    images: Vec<&ProductImage>,
) -> Result<ProductView, AppError> {
    let mut views = Vec::with_capacity(images.len());
    for image in images {
        views.push(ImageView {
            id: image.id,
            url: storage.image_url(&image.storage_key).await?,
        });
    }
    Ok(ProductView {
        id: product.id,
        name: product.name,
        description: product.description,
        price_cents: product.price_cents,
        images: views,
    })
}

/// Parses a plain decimal amount such as `"12.50"` into cents. At most two
/// fraction digits; signs and exponents are rejected.
pub fn parse_price(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let (whole, frac) = raw.split_once('.').unwrap_or((raw, ""));
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !digits(whole) || !digits(frac) || frac.len() > 2 {
        return None;
    }

    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let frac: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().ok()? * 10,
        _ => frac.parse().ok()?,
    };
    whole.checked_mul(100)?.checked_add(frac)
}

fn price_or_error(v: &mut Required, raw: &str) -> i64 {
    parse_price(raw).unwrap_or_else(|| {
        v.error("price", "price must be a non-negative amount with at most two decimals");
        0
    })
}

fn optional(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}
