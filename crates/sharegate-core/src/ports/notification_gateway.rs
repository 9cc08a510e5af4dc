//! NotificationGateway port - 受信者への通知（メールなど）
//!
//! # 実装
//! - `impls::TracingNotifier`: tracing に記録するだけ（CLI 用）
//! - `impls::InMemoryOutbox`: 送信内容を保持（テスト用）

use async_trait::async_trait;

use crate::domain::{NotifyError, Recipient};

/// NotificationGateway は受信者にメッセージを送る
///
/// # 設計原則
/// - fire-and-forget（broker は結果を見るが、失敗しても Grant は残す）
/// - 本文の組み立ては broker 側（`app::message`）
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send(&self, to: &Recipient, subject: &str, body: &str) -> Result<(), NotifyError>;
}
