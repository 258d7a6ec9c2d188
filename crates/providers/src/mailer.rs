//! SMTP adapter. One pooled async transport with short timeouts so a slow
//! relay cannot stall a submit handler or an executor tick for long.

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use mb_domain::{Error, Result};

const DEFAULT_RELAY: &str = "smtp.gmail.com";
const SMTP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(15);

pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl Mailer {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        let user = user.into();
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(DEFAULT_RELAY)
            .map_err(|e| Error::Mail(e.to_string()))?
            .credentials(Credentials::new(user.clone(), password.into()))
            .timeout(Some(SMTP_TIMEOUT))
            .build();
        Ok(Self {
            transport,
            from: user,
        })
    }

    pub async fn send_html(&self, to: &str, subject: &str, html: String) -> Result<()> {
        let message = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| Error::Mail(format!("bad from address: {e}")))?,
            )
            .to(to
                .parse()
                .map_err(|e| Error::Mail(format!("bad to address {to}: {e}")))?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html)
            .map_err(|e| Error::Mail(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| Error::Mail(e.to_string()))?;
        tracing::debug!(to, subject, "email sent");
        Ok(())
    }
}
