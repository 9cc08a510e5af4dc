//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryArtifactGateway**: テスト・デモ用のストレージ
//! - **LocalArtifactGateway**: ローカルファイルシステム
//! - **TracingNotifier** / **InMemoryOutbox**: 通知
//!
//! # 本番用実装
//! S3 / Supabase Storage やメール送信の実装は別クレートに配置します。

pub mod inmem_artifact;
pub mod local_artifact;
pub mod notifier;

// 主要な型を再エクスポート
pub use self::inmem_artifact::InMemoryArtifactGateway;
pub use self::local_artifact::LocalArtifactGateway;
pub use self::notifier::{InMemoryOutbox, SentMessage, TracingNotifier};
