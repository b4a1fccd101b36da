//! SMTP notifier backed by `lettre`.

use crate::config::MailConfig;
use datasus_core::{Notifier, NotifyError, Report};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

pub struct SmtpNotifier {
    config: MailConfig,
}

impl SmtpNotifier {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    /// Multipart message: plain-text body plus the log as a text attachment.
    pub fn build_message(&self, report: &Report) -> Result<Message, NotifyError> {
        let from: Mailbox = self
            .config
            .sender
            .parse()
            .map_err(|e| NotifyError::InvalidMessage(format!("sender: {e}")))?;

        if self.config.recipients.is_empty() {
            return Err(NotifyError::InvalidMessage("no recipients".into()));
        }

        let mut builder = Message::builder().from(from).subject(report.subject.clone());
        for recipient in &self.config.recipients {
            let to: Mailbox = recipient
                .parse()
                .map_err(|e| NotifyError::InvalidMessage(format!("recipient {recipient}: {e}")))?;
            builder = builder.to(to);
        }

        let attachment = Attachment::new(report.attachment_name.clone())
            .body(report.attachment.clone(), ContentType::TEXT_PLAIN);
        let body = MultiPart::mixed()
            .singlepart(SinglePart::plain(report.body.clone()))
            .singlepart(attachment);

        builder
            .multipart(body)
            .map_err(|e| NotifyError::InvalidMessage(e.to_string()))
    }

    fn transport(&self) -> Result<SmtpTransport, NotifyError> {
        let mut builder = SmtpTransport::starttls_relay(&self.config.relay)
            .map_err(|e| NotifyError::Transport(e.to_string()))?
            .port(self.config.port);

        match self.config.password() {
            Some(password) => {
                builder = builder.credentials(Credentials::new(
                    self.config.username().to_string(),
                    password,
                ));
            }
            None => tracing::debug!(relay = %self.config.relay, "SMTP without credentials"),
        }
        Ok(builder.build())
    }
}

impl Notifier for SmtpNotifier {
    fn send(&self, report: &Report) -> Result<(), NotifyError> {
        let message = self.build_message(report)?;
        self.transport()?
            .send(&message)
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(())
    }
}
