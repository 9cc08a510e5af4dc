//! sharegate-core
//!
//! Time-limited, revocable sharing of exported artifacts.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, grant, state, artifact, recipient, errors）
//! - **ports**: 抽象化レイヤー（PermissionStore, ArtifactGateway, NotificationGateway, TokenGenerator, Clock）
//! - **store**: PermissionStore の実装（InMemoryPermissionStore）
//! - **impls**: 外部境界の実装（InMemory / Local ストレージ、通知）
//! - **app**: アプリケーションロジック（builder, broker, sweeper, config）

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod store;

#[cfg(test)]
mod testing;

pub use app::{
    BrokerBuilder, BrokerConfig, Delivery, ExpirySweeper, ExportBroker, Issued, Resolution,
    RevokeOutcome, SweepReport,
};
pub use domain::{AccessToken, ArtifactSource, BrokerError, Grant, GrantState};
