//! Notifiers - NotificationGateway の開発用実装
//!
//! - **TracingNotifier**: 送信内容を tracing に記録する（メール送信の代わり）
//! - **InMemoryOutbox**: 送信内容を保持する（テストで本文を検証できる）

use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::{NotifyError, Recipient};
use crate::ports::NotificationGateway;

/// Logs each notification at `info` instead of delivering it.
///
/// The body carries the download link, so only its size is logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl NotificationGateway for TracingNotifier {
    async fn send(&self, to: &Recipient, subject: &str, body: &str) -> Result<(), NotifyError> {
        tracing::info!(
            recipient = %to,
            subject,
            body_bytes = body.len(),
            "notification delivered to log"
        );
        Ok(())
    }
}

/// A message captured by [`InMemoryOutbox`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub to: Recipient,
    pub subject: String,
    pub body: String,
}

/// Records every message it is asked to send.
#[derive(Debug, Default)]
pub struct InMemoryOutbox {
    sent: Mutex<Vec<SentMessage>>,
}

impl InMemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl NotificationGateway for InMemoryOutbox {
    async fn send(&self, to: &Recipient, subject: &str, body: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SentMessage {
                to: to.clone(),
                subject: subject.to_string(),
                body: body.to_string(),
            });
        Ok(())
    }
}
