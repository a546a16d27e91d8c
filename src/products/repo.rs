use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::repo_types::{NewProduct, Product, ProductChanges, ProductImage};

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn list(&self) -> anyhow::Result<Vec<Product>>;

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Product>>;

    /// Inserts the product and links already-uploaded `(image_id, storage_key)`
    /// objects to it in one transaction.
    async fn create(
        &self,
        product: &NewProduct,
        images: &[(Uuid, String)],
    ) -> anyhow::Result<Product>;

    async fn update(&self, id: Uuid, changes: &ProductChanges) -> anyhow::Result<Option<Product>>;

    /// Removes the product and its image rows, returning the images that were attached.
    async fn delete(&self, id: Uuid) -> anyhow::Result<Option<Vec<ProductImage>>>;

    async fn images_for(&self, product_ids: &[Uuid]) -> anyhow::Result<Vec<ProductImage>>;

    /// Links already-uploaded objects `(image_id, storage_key)` to a product atomically.
    async fn add_images(
        &self,
        product_id: Uuid,
        images: &[(Uuid, String)],
    ) -> anyhow::Result<Vec<ProductImage>>;

    async fn delete_image(&self, id: Uuid) -> anyhow::Result<Option<ProductImage>>;
}

#[derive(Clone)]
pub struct PgProductStore {
    db: PgPool,
}

impl PgProductStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProductStore for PgProductStore {
    async fn list(&self) -> anyhow::Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, price_cents, created_at, updated_at
            FROM products
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.db)
        .await
        .context("list products")?;
        Ok(rows)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Product>> {
        let row = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, price_cents, created_at, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find product")?;
        Ok(row)
    }

    async fn create(
        &self,
        product: &NewProduct,
        images: &[(Uuid, String)],
    ) -> anyhow::Result<Product> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        let row = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (id, name, description, price_cents)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, description, price_cents, created_at, updated_at
            "#,
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price_cents)
        .fetch_one(&mut *tx)
        .await
        .context("insert product")?;

        insert_images(&mut tx, product.id, images).await?;
        tx.commit().await.context("commit tx")?;
        Ok(row)
    }

    async fn update(&self, id: Uuid, changes: &ProductChanges) -> anyhow::Result<Option<Product>> {
        let row = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
               SET name = COALESCE($2, name),
                   description = COALESCE($3, description),
                   price_cents = COALESCE($4, price_cents),
                   updated_at = now()
             WHERE id = $1
            RETURNING id, name, description, price_cents, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.description)
        .bind(changes.price_cents)
        .fetch_optional(&self.db)
        .await
        .context("update product")?;
        Ok(row)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<Option<Vec<ProductImage>>> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        let images = sqlx::query_as::<_, ProductImage>(
            r#"
            SELECT id, product_id, storage_key, created_at
              FROM product_images
             WHERE product_id = $1
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .context("list product images")?;

        let res = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("delete product")?;

        tx.commit().await.context("commit tx")?;

        if res.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(images))
    }

    async fn images_for(&self, product_ids: &[Uuid]) -> anyhow::Result<Vec<ProductImage>> {
        let rows = sqlx::query_as::<_, ProductImage>(
            r#"
            SELECT id, product_id, storage_key, created_at
              FROM product_images
             WHERE product_id = ANY($1)
             ORDER BY created_at ASC
            "#,
        )
        .bind(product_ids)
        .fetch_all(&self.db)
        .await
        .context("list images by product")?;
        Ok(rows)
    }

    async fn add_images(
        &self,
        product_id: Uuid,
        images: &[(Uuid, String)],
    ) -> anyhow::Result<Vec<ProductImage>> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        let rows = insert_images(&mut tx, product_id, images).await?;
        tx.commit().await.context("commit tx")?;
        Ok(rows)
    }

    async fn delete_image(&self, id: Uuid) -> anyhow::Result<Option<ProductImage>> {
        let row = sqlx::query_as::<_, ProductImage>(
            r#"
            DELETE FROM product_images
             WHERE id = $1
            RETURNING id, product_id, storage_key, created_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("delete product image")?;
        Ok(row)
    }
}

async fn insert_images(
    tx: &mut Transaction<'_, Postgres>,
    product_id: Uuid,
    images: &[(Uuid, String)],
) -> anyhow::Result<Vec<ProductImage>> {
    let mut out = Vec::with_capacity(images.len());
    for (id, key) in images {
        let row = sqlx::query_as::<_, ProductImage>(
            r#"
            INSERT INTO product_images (id, product_id, storage_key)
            VALUES ($1, $2, $3)
            RETURNING id, product_id, storage_key, created_at
            "#,
        )
        .bind(id)
        .bind(product_id)
        .bind(key)
        .fetch_one(&mut **tx)
        .await
        .context("insert product image")?;
        out.push(row);
    }
    Ok(out)
}
