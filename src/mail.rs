use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_sesv2::{
    config::Region,
    types::{Body, Content, Destination, EmailContent, Message},
    Client,
};
use tracing::info;

use crate::config::MailConfig;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_reset_code(&self, to: &str, code: &str) -> anyhow::Result<()>;
}

/// Amazon SES (or any SES-compatible endpoint).
#[derive(Clone)]
pub struct SesMailer {
    client: Client,
    from: String,
}

impl SesMailer {
    pub async fn new(cfg: &MailConfig) -> anyhow::Result<Self> {
        let mut loader = defaults(BehaviorVersion::latest()).region(Region::new(cfg.region.clone()));
        if let (Some(access_key), Some(secret_key)) = (&cfg.access_key, &cfg.secret_key) {
            loader = loader.credentials_provider(Credentials::new(
                access_key, secret_key, None, None, "static",
            ));
        }
        if let Some(endpoint) = &cfg.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;

        Ok(Self {
            client: Client::new(&shared),
            from: cfg.from.clone(),
        })
    }
}

fn reset_text(code: &str) -> String {
    format!("Your Pokédex password reset code is: {code}")
}

#[async_trait]
impl Mailer for SesMailer {
    async fn send_reset_code(&self, to: &str, code: &str) -> anyhow::Result<()> {
        let subject = Content::builder()
            .data("Password reset code")
            .charset("UTF-8")
            .build()
            .context("build subject")?;
        let text = Content::builder()
            .data(reset_text(code))
            .charset("UTF-8")
            .build()
            .context("build text body")?;
        let html = Content::builder()
            .data(format!("<b>Your Pokédex password reset code is: {code}</b>"))
            .charset("UTF-8")
            .build()
            .context("build html body")?;
        let message = Message::builder()
            .subject(subject)
            .body(Body::builder().text(text).html(html).build())
            .build();

        self.client
            .send_email()
            .from_email_address(&self.from)
            .destination(Destination::builder().to_addresses(to).build())
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await
            .context("ses send_email")?;
        info!(to = %to, "reset code mailed");
        Ok(())
    }
}

/// No mail transport configured: the code only goes to the server log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_reset_code(&self, to: &str, code: &str) -> anyhow::Result<()> {
        info!(to = %to, code = %code, "mail disabled; reset code logged");
        Ok(())
    }
}
