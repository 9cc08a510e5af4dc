//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部システム（object storage, メール送信など）への
//! インターフェースを提供し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - PermissionStore が source of truth（正本）
//! - ArtifactGateway / NotificationGateway は I/O 境界（timeout 付きで呼ばれる）
//! - Clock / TokenGenerator はテストで差し替え可能

pub mod artifact_gateway;
pub mod clock;
pub mod notification_gateway;
pub mod permission_store;
pub mod token_generator;

// 主要な trait を再エクスポート
pub use self::artifact_gateway::{ArtifactGateway, join_public_url};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::notification_gateway::NotificationGateway;
pub use self::permission_store::PermissionStore;
pub use self::token_generator::{OsRandomTokenGenerator, TokenGenerator};
