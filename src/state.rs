use std::sync::Arc;

use crate::config::AppConfig;
use crate::db;
use crate::mailer::{self, Mailer};
use crate::products::repo::{PgProductStore, ProductStore};
use crate::storage::{Storage, StorageClient};
use crate::users::repo::{PgUserStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub products: Arc<dyn ProductStore>,
    pub mailer: Arc<dyn Mailer>,
    pub storage: Arc<dyn StorageClient>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        if config.jwt.secret.is_none() {
            tracing::warn!("JWT_SECRET is not set; verification and login will fail");
        }

        let db = db::connect(&config.database_url).await?;
        db::migrate(&db).await;

        let storage = Storage::connect(&config.storage).await?;
        if let Err(e) = storage.ensure_bucket().await {
            tracing::warn!(error = %e, "bucket check failed; uploads may fail");
        }
        let mailer = mailer::from_config(&config.mail, &config.store_name)?;

        Ok(Self::from_parts(
            config,
            Arc::new(PgUserStore::new(db.clone())),
            Arc::new(PgProductStore::new(db)),
            mailer,
            Arc::new(storage),
        ))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        products: Arc<dyn ProductStore>,
        mailer: Arc<dyn Mailer>,
        storage: Arc<dyn StorageClient>,
    ) -> Self {
        Self {
            config,
            users,
            products,
            mailer,
            storage,
        }
    }
}
