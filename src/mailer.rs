use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{MailConfig, MailTransport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Result of a single delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailOutcome {
    Sent,
    Failed(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &MailMessage) -> MailOutcome;
}

/// Builds the mailer selected by the configured transport.
pub fn from_config(config: &MailConfig, store_name: &str) -> anyhow::Result<Arc<dyn Mailer>> {
    match &config.transport {
        MailTransport::Smtp { host, port } => {
            info!(%host, port, "mail via smtp");
            Ok(Arc::new(SmtpMailer::new(host, *port, config, store_name)?))
        }
        MailTransport::Relay { api_url } => {
            info!(%api_url, "mail via http relay");
            Ok(Arc::new(HttpMailer::new(api_url, config, store_name)?))
        }
    }
}

/// `"{store} <{address}>"`, the From line of every outgoing message.
pub fn sender(store_name: &str, from: &str) -> String {
    format!("{} <{}>", store_name, from)
}

/// SMTP submission with login credentials. Port 465 uses implicit TLS,
/// other ports upgrade with STARTTLS when the server offers it.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(host: &str, port: u16, config: &MailConfig, store_name: &str) -> anyhow::Result<Self> {
        let tls = TlsParameters::new(host.to_string()).context("smtp tls parameters")?;
        let tls = if port == 465 {
            Tls::Wrapper(tls)
        } else {
            Tls::Opportunistic(tls)
        };

        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
            .port(port)
            .tls(tls)
            .credentials(Credentials::new(config.user.clone(), config.pass.clone()))
            .build();

        let from = sender(store_name, &config.from)
            .parse::<Mailbox>()
            .context("EMAIL_FROM is not a valid address")?;

        Ok(Self { transport, from })
    }

    fn build(&self, message: &MailMessage) -> anyhow::Result<Message> {
        let to = message
            .to
            .parse::<Mailbox>()
            .with_context(|| format!("invalid recipient {}", message.to))?;
        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(message.html.clone())
            .context("build message")?;
        Ok(email)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &MailMessage) -> MailOutcome {
        let email = match self.build(message) {
            Ok(email) => email,
            Err(e) => return MailOutcome::Failed(format!("{e:#}")),
        };

        match self.transport.send(email).await {
            Ok(resp) => {
                debug!(code = %resp.code(), "mail accepted by smtp server");
                MailOutcome::Sent
            }
            Err(e) => {
                warn!(error = %e, "smtp send failed");
                MailOutcome::Failed(e.to_string())
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct RelayBody<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

/// Delivers mail through a transactional-email HTTP relay using basic auth.
#[derive(Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    user: String,
    pass: String,
    from: String,
}

impl HttpMailer {
    pub fn new(api_url: &str, config: &MailConfig, store_name: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.to_string(),
            user: config.user.clone(),
            pass: config.pass.clone(),
            from: sender(store_name, &config.from),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &MailMessage) -> MailOutcome {
        let body = RelayBody {
            from: &self.from,
            to: &message.to,
            subject: &message.subject,
            html: &message.html,
        };

        let resp = match self
            .client
            .post(&self.api_url)
            .basic_auth(&self.user, Some(&self.pass))
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "mail relay unreachable");
                return MailOutcome::Failed(e.to_string());
            }
        };

        let status = resp.status();
        if status.is_success() {
            debug!(%status, "mail accepted by relay");
            return MailOutcome::Sent;
        }

        let text = resp.text().await.unwrap_or_default();
        MailOutcome::Failed(format!("relay responded {status}: {text}"))
    }
}
