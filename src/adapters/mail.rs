use crate::domain::mail::Mail;
use crate::domain::ports::Mailer;
use async_trait::async_trait;

/// Writes outgoing mail to the log instead of handing it to an SMTP relay.
#[derive(Debug, Clone)]
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    #[must_use]
    pub const fn new(from: String) -> Self {
        Self { from }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: Mail) -> anyhow::Result<()> {
        tracing::info!(
            from = %self.from,
            to = %mail.recipient(),
            subject = mail.subject(),
            body = %mail.body(),
            "STUB: Sending mail"
        );
        Ok(())
    }
}
