//! Fire-and-forget outgoing mail.
//!
//! Requests enqueue onto a bounded channel and return immediately; a fixed set
//! of worker tasks drains it through a [`MailTransport`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, warn};

use crate::config::MailConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub sender: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, mail: &OutgoingMail) -> anyhow::Result<()>;
}

/// Writes every message to the log instead of a mail server.
#[derive(Debug, Default)]
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    async fn deliver(&self, mail: &OutgoingMail) -> anyhow::Result<()> {
        info!(
            from = %mail.sender,
            to = %mail.to,
            subject = %mail.subject,
            body = %mail.body,
            "Outgoing mail"
        );
        Ok(())
    }
}

#[derive(Clone)]
pub struct MailQueue {
    tx: mpsc::Sender<OutgoingMail>,
    subject_prefix: String,
    sender: String,
}

impl MailQueue {
    /// Spawns `config.workers` tasks sharing one receiver. Must be called from
    /// within a tokio runtime.
    pub fn start(transport: Arc<dyn MailTransport>, config: &MailConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        for worker in 0..config.workers.max(1) {
            let rx = Arc::clone(&rx);
            let transport = Arc::clone(&transport);

            tokio::spawn(async move {
                loop {
                    let next = rx.lock().await.recv().await;
                    let Some(mail) = next else {
                        debug!(worker, "Mail queue closed, worker exiting");
                        break;
                    };

                    if let Err(e) = transport.deliver(&mail).await {
                        error!(worker, to = %mail.to, error = %e, "Failed to deliver mail");
                    }
                }
            });
        }

        Self {
            tx,
            subject_prefix: config.subject_prefix.clone(),
            sender: config.sender.clone(),
        }
    }

    /// Queues a message without waiting. Returns `false` when it was dropped.
    pub fn send(&self, to: &str, subject: &str, body: String) -> bool {
        let mail = OutgoingMail {
            sender: self.sender.clone(),
            to: to.to_string(),
            subject: format!("{}{}", self.subject_prefix, subject),
            body,
        };

        match self.tx.try_send(mail) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(mail)) => {
                warn!(to = %mail.to, subject = %mail.subject, "Mail queue full, dropping message");
                false
            }
            Err(mpsc::error::TrySendError::Closed(mail)) => {
                error!(to = %mail.to, "Mail queue closed, dropping message");
                false
            }
        }
    }
}
