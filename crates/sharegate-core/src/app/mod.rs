//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **BrokerBuilder**: broker の構築とワイヤリング
//! - **ExportBroker**: issue / resolve / revoke / renotify
//! - **ExpirySweeper**: 期限切れ Grant の定期回収
//! - **BrokerConfig**: 設定（TOML / JSON / 環境変数）

pub mod broker;
pub mod builder;
pub mod config;
pub mod message;
pub mod status;
pub mod sweeper;

// 主要な型を再エクスポート
pub use self::broker::{Delivery, ExportBroker, Issued, Resolution, RevokeOutcome};
pub use self::builder::{BrokerBuilder, BuildError};
pub use self::config::{BrokerConfig, ConfigError};
pub use self::status::GrantCounts;
pub use self::sweeper::{ExpirySweeper, SweepReport, SweeperHandle};
