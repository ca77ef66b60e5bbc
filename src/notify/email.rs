use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::DigestItem;

pub struct EmailSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailSender {
    /// Build from SMTP_* / DIGEST_EMAIL_* env vars. Returns `None` when
    /// SMTP_HOST is unset — email delivery is optional.
    pub fn from_env() -> Result<Option<Self>> {
        let Ok(host) = std::env::var("SMTP_HOST") else {
            return Ok(None);
        };
        let user = std::env::var("SMTP_USER").context("SMTP_USER missing")?;
        let pass = std::env::var("SMTP_PASS").context("SMTP_PASS missing")?;
        let from_addr =
            std::env::var("DIGEST_EMAIL_FROM").context("DIGEST_EMAIL_FROM missing")?;
        let to_addr = std::env::var("DIGEST_EMAIL_TO").context("DIGEST_EMAIL_TO missing")?;

        let creds = Credentials::new(user, pass);
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&host)
            .context("invalid SMTP_HOST")?
            .credentials(creds)
            .build();

        let from = from_addr.parse().context("invalid DIGEST_EMAIL_FROM")?;
        let to = to_addr.parse().context("invalid DIGEST_EMAIL_TO")?;

        Ok(Some(Self { mailer, from, to }))
    }

    pub async fn send_digest(&self, items: &[DigestItem], now: DateTime<Utc>) -> Result<()> {
        let subject = format!(
            "News digest {} — {} article(s)",
            now.format("%Y-%m-%d"),
            items.len()
        );
        let msg = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(header::ContentType::TEXT_PLAIN)
            .body(render_digest(items))
            .context("build digest email")?;

        self.mailer.send(msg).await.context("send digest email")?;
        Ok(())
    }
}

/// Plain-text digest body: one block per article, highest score first is the
/// caller's responsibility.
pub fn render_digest(items: &[DigestItem]) -> String {
    if items.is_empty() {
        return "No new relevant articles in this run.\n".to_string();
    }
    let mut out = String::new();
    for it in items {
        out.push_str(&format!(
            "- {} (score {})\n  {}\n  {} | {}\n\n",
            it.title,
            it.total_score,
            it.url,
            it.source_feed,
            it.published_at.to_rfc3339()
        ));
    }
    out
}
