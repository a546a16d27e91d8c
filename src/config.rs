use anyhow::Context;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Signing secret. Token issuance fails with a server error while unset.
    pub secret: Option<String>,
    pub issuer: String,
    pub audience: String,
}

/// How outgoing mail leaves the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailTransport {
    Smtp { host: String, port: u16 },
    /// Transactional-mail HTTP API, used when `EMAIL_HOST` is absent.
    Relay { api_url: String },
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub transport: MailTransport,
    pub user: String,
    pub pass: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Public base URL used to build verification links.
    pub app_url: String,
    /// Store display name used in email branding.
    pub store_name: String,
    pub jwt: JwtConfig,
    pub mail: MailConfig,
    pub storage: StorageConfig,
    pub upload_max_file_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = required("DATABASE_URL")?;

        let app_url = required("APP_URL")?;
        reqwest::Url::parse(&app_url).context("APP_URL must be an absolute URL")?;

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").ok().filter(|s| !s.is_empty()),
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "storefront".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "storefront-users".into()),
        };

        let mail_user = required("EMAIL_USER")?;
        let mail = MailConfig {
            transport: mail_transport()?,
            pass: required("EMAIL_PASS")?,
            from: std::env::var("EMAIL_FROM").unwrap_or_else(|_| mail_user.clone()),
            user: mail_user,
        };

        let storage = StorageConfig {
            endpoint: required("MINIO_ENDPOINT")?,
            bucket: required("MINIO_BUCKET")?,
            access_key: required("MINIO_ACCESS_KEY")?,
            secret_key: required("MINIO_SECRET_KEY")?,
            region: std::env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".into()),
        };

        Ok(Self {
            database_url,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("APP_PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(8080),
            app_url,
            store_name: std::env::var("STORE_NAME").unwrap_or_else(|_| "Store".into()),
            jwt,
            mail,
            storage,
            upload_max_file_bytes: std::env::var("UPLOAD_MAX_FILE_BYTES")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(5 * 1024 * 1024),
        })
    }
}

fn mail_transport() -> anyhow::Result<MailTransport> {
    if let Ok(host) = std::env::var("EMAIL_HOST") {
        let port = match std::env::var("EMAIL_PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("EMAIL_PORT is not a port number: {raw}"))?,
            Err(_) => 587,
        };
        return Ok(MailTransport::Smtp { host, port });
    }
    match std::env::var("EMAIL_API_URL") {
        Ok(api_url) => Ok(MailTransport::Relay { api_url }),
        Err(_) => anyhow::bail!("EMAIL_HOST (or EMAIL_API_URL) must be set"),
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    std::env::var(key).with_context(|| format!("{key} must be set"))
}
