//! ExpirySweeper - 期限切れ Grant の回収
//!
//! # フロー（1 tick）
//! 1. 前回 reclaim に失敗した terminal な Grant を再回収
//! 2. `list_expired(now)` で期限切れの Active を取得
//! 3. token ごとに `Active -> Expired` を CAS（負けたら skip）
//! 4. 勝った場合だけ artifact を削除して store から remove
//!
//! token ごとに独立した処理なので、1 つの削除失敗が他を止めることはありません。

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::app::broker::{ExportBroker, Retirement};
use crate::app::config::BrokerConfig;
use crate::domain::GrantState;

/// What one sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Active grants this sweep expired and reclaimed.
    pub expired: usize,
    /// Terminal grants whose earlier reclaim this sweep finished.
    pub reclaimed: usize,
    /// Tokens another caller had already handled.
    pub skipped: usize,
    /// Tokens whose reclaim failed; retried next tick.
    pub failed: usize,
}

impl SweepReport {
    pub fn is_idle(&self) -> bool {
        *self == SweepReport::default()
    }
}

pub struct ExpirySweeper {
    broker: Arc<ExportBroker>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(broker: Arc<ExportBroker>, interval: Duration) -> Self {
        Self { broker, interval }
    }

    pub fn from_config(broker: Arc<ExportBroker>, config: &BrokerConfig) -> Self {
        Self::new(broker, config.sweep_interval())
    }

    /// Run a single pass at the broker's current time.
    pub async fn sweep_once(&self) -> SweepReport {
        let mut report = SweepReport::default();

        // Snapshot first so grants expired below are not reclaimed twice.
        for token in self.broker.unreclaimed_tokens().await {
            match self.broker.reclaim_pending(&token).await {
                Ok(true) => report.reclaimed += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(token = %token.redacted(), error = %e, "reclaim retry failed");
                }
            }
        }

        let now = self.broker.now();
        for token in self.broker.expired_tokens(now).await {
            match self.broker.retire(&token, GrantState::Expired).await {
                Ok(Retirement::Won) => report.expired += 1,
                Ok(Retirement::Lost) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(token = %token.redacted(), error = %e, "expiry reclaim failed");
                }
            }
        }

        report
    }

    /// Run `sweep_once` every interval on a background task.
    pub fn spawn(self) -> SweeperHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(self.run(shutdown_rx));
        SweeperHandle { shutdown_tx, join }
    }

    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(interval = ?self.interval, "expiry sweeper started");

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            tokio::select! {
                changed = shutdown_rx.changed() => {
                    // 送信側が drop された場合も停止する
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let report = self.sweep_once().await;
                    if report.is_idle() {
                        tracing::trace!("sweep found nothing to do");
                    } else {
                        tracing::info!(
                            expired = report.expired,
                            reclaimed = report.reclaimed,
                            skipped = report.skipped,
                            failed = report.failed,
                            "sweep finished"
                        );
                    }
                }
            }
        }

        tracing::info!("expiry sweeper stopped");
    }
}

/// Handle of a spawned sweeper.
/// - `request_shutdown()` stops it after the current pass
/// - dropping the handle also stops it
pub struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SweeperHandle {
    pub fn request_shutdown(&self) {
        // ignore send error: the task may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        let _ = self.join.await;
    }
}
