//! BrokerBuilder - ExportBroker の構築とワイヤリング
//!
//! # 起動時検証（Fail-fast 設計）
//! - 設定値を validate() してから組み立てる
//! - ArtifactGateway / NotificationGateway は必須（デフォルトなし）
//! - PermissionStore / TokenGenerator / Clock はデフォルトあり

use std::sync::Arc;

use crate::app::broker::{BrokerSettings, ExportBroker};
use crate::app::config::{BrokerConfig, ConfigError};
use crate::ports::{
    ArtifactGateway, Clock, NotificationGateway, OsRandomTokenGenerator, PermissionStore,
    SystemClock, TokenGenerator,
};
use crate::store::InMemoryPermissionStore;

/// BrokerBuilder は ExportBroker を構築
///
/// # 使用例
/// ```ignore
/// let broker = BrokerBuilder::new(config)
///     .artifacts(Arc::new(gateway))
///     .notifier(Arc::new(TracingNotifier))
///     .build()?;
/// ```
pub struct BrokerBuilder {
    config: BrokerConfig,
    store: Option<Arc<dyn PermissionStore>>,
    artifacts: Option<Arc<dyn ArtifactGateway>>,
    notifier: Option<Arc<dyn NotificationGateway>>,
    tokens: Option<Arc<dyn TokenGenerator>>,
    clock: Option<Arc<dyn Clock>>,
}

/// BuildError は broker 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing component: {0}. Register it on the builder before build().")]
    MissingComponent(&'static str),

    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
}

impl BrokerBuilder {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            store: None,
            artifacts: None,
            notifier: None,
            tokens: None,
            clock: None,
        }
    }

    pub fn store(mut self, store: Arc<dyn PermissionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn artifacts(mut self, artifacts: Arc<dyn ArtifactGateway>) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn NotificationGateway>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn tokens(mut self, tokens: Arc<dyn TokenGenerator>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate the config and wire the broker.
    pub fn build(self) -> Result<ExportBroker, BuildError> {
        self.config.validate()?;

        let artifacts = self
            .artifacts
            .ok_or(BuildError::MissingComponent("artifact gateway"))?;
        let notifier = self
            .notifier
            .ok_or(BuildError::MissingComponent("notification gateway"))?;
        let retired_capacity = self.config.broker.retired_token_capacity;
        let store = self.store.unwrap_or_else(|| {
            Arc::new(InMemoryPermissionStore::with_retired_capacity(
                retired_capacity,
            ))
        });
        let tokens = self
            .tokens
            .unwrap_or_else(|| Arc::new(OsRandomTokenGenerator::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        Ok(ExportBroker::new(
            store,
            artifacts,
            notifier,
            tokens,
            clock,
            BrokerSettings::from(&self.config),
        ))
    }
}
