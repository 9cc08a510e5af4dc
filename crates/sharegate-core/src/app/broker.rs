//! ExportBroker - 共有リンクの発行・解決・取り消し
//!
//! # フロー（issue）
//! 1. ttl（期限が表現可能か含む）/ recipient / file name を検証
//! 2. TokenGenerator でトークン生成 → PermissionStore::reserve（衝突したら再生成）
//! 3. ArtifactGateway::upload（timeout 付き、失敗したら予約を解放して終了）
//! 4. PermissionStore::put（失敗したら upload 済みの artifact を削除）
//! 5. NotificationGateway::send（失敗しても Grant は残す）
//!
//! # 回収（reclaim）
//! revoke / sweeper / resolve の lazy expiry は全て同じ経路を通ります：
//! `transition(Active -> Revoked|Expired)` に勝った呼び出しだけが
//! artifact を削除し、その後に store から remove します。
//! 削除に失敗した場合は `mark_unreclaimed` で印を付け、sweeper が
//! `claim_unreclaimed` で引き取ってから再回収します。

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::time::timeout;

use crate::app::config::BrokerConfig;
use crate::app::message;
use crate::app::status::GrantCounts;
use crate::domain::{
    AccessToken, ArtifactError, ArtifactRef, ArtifactSource, BrokerError, Grant, GrantState,
    NotifyError, Recipient, StoreError,
};
use crate::ports::{ArtifactGateway, Clock, NotificationGateway, PermissionStore, TokenGenerator};

/// Result of the notification step of `issue`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// The grant exists anyway; `ExportBroker::renotify` can retry.
    Failed(String),
}

/// A recorded grant and what happened when the recipient was notified.
#[derive(Debug, Clone)]
pub struct Issued {
    pub grant: Grant,
    pub download_url: String,
    pub delivery: Delivery,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Active and before its deadline: the storage URL.
    Available(String),
    Expired,
    Revoked,
    NotFound,
}

impl Resolution {
    pub fn url(&self) -> Option<&str> {
        match self {
            Resolution::Available(url) => Some(url),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeOutcome {
    Revoked,
    /// Someone else (sweeper, lazy expiry or another revoke) got there first.
    AlreadyInactive,
}

/// Who won the `Active -> terminal` compare-and-swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Retirement {
    Won,
    Lost,
}

/// Values the broker reads from `BrokerConfig` on every call.
#[derive(Debug, Clone)]
pub(crate) struct BrokerSettings {
    pub default_ttl: Duration,
    pub max_token_attempts: u32,
    pub upload_timeout: StdDuration,
    pub notify_timeout: StdDuration,
    pub delete_timeout: StdDuration,
    pub subject: String,
}

impl From<&BrokerConfig> for BrokerSettings {
    fn from(config: &BrokerConfig) -> Self {
        Self {
            default_ttl: config.default_ttl(),
            max_token_attempts: config.broker.max_token_attempts,
            upload_timeout: config.upload_timeout(),
            notify_timeout: config.notify_timeout(),
            delete_timeout: config.delete_timeout(),
            subject: config.notification.subject.clone(),
        }
    }
}

/// Issues, resolves and revokes export grants.
///
/// Cheap to share behind an `Arc`; all mutable state lives in the
/// `PermissionStore`.
pub struct ExportBroker {
    store: Arc<dyn PermissionStore>,
    artifacts: Arc<dyn ArtifactGateway>,
    notifier: Arc<dyn NotificationGateway>,
    tokens: Arc<dyn TokenGenerator>,
    clock: Arc<dyn Clock>,
    settings: BrokerSettings,
}

impl ExportBroker {
    pub(crate) fn new(
        store: Arc<dyn PermissionStore>,
        artifacts: Arc<dyn ArtifactGateway>,
        notifier: Arc<dyn NotificationGateway>,
        tokens: Arc<dyn TokenGenerator>,
        clock: Arc<dyn Clock>,
        settings: BrokerSettings,
    ) -> Self {
        Self {
            store,
            artifacts,
            notifier,
            tokens,
            clock,
            settings,
        }
    }

    /// Share `artifact` with `recipient` for `ttl`.
    ///
    /// Either the grant is recorded and usable (notification attempted), or
    /// nothing is recorded and nothing stays uploaded.
    pub async fn issue(
        &self,
        artifact: ArtifactSource,
        recipient: &str,
        message: &str,
        ttl: Duration,
    ) -> Result<Issued, BrokerError> {
        let issued_at = self.clock.now();
        let expires_at = Grant::deadline(issued_at, ttl)?;
        let recipient = Recipient::parse(recipient)?;
        let file_name = artifact.file_name()?;

        let token = self.reserve_token().await?;

        let artifact_ref = match self.upload(&token, &artifact).await {
            Ok(artifact_ref) => artifact_ref,
            Err(e) => {
                tracing::warn!(token = %token.redacted(), error = %e, "upload failed, abandoning issuance");
                // A timed-out upload may still land; clear the key it would use.
                let expected = ArtifactRef::scoped(&token, &file_name);
                if let Err(cleanup) = self.delete(&expected).await {
                    tracing::error!(token = %token.redacted(), error = %cleanup, "cleanup after failed upload failed");
                }
                self.store.release(&token).await;
                return Err(BrokerError::UploadFailed(e));
            }
        };

        let grant = Grant::issue(
            token.clone(),
            artifact_ref.clone(),
            recipient,
            message,
            issued_at,
            expires_at,
        );
        if let Err(e) = self.store.put(grant.clone()).await {
            tracing::warn!(token = %token.redacted(), error = %e, "recording grant failed, deleting upload");
            if let Err(cleanup) = self.delete(&artifact_ref).await {
                tracing::error!(
                    token = %token.redacted(),
                    file = %file_name,
                    error = %cleanup,
                    "orphaned upload: rollback delete failed"
                );
            }
            self.store.release(&token).await;
            return Err(e.into());
        }

        let download_url = self.artifacts.public_url(&artifact_ref);
        let delivery = match self.notify(&grant, &download_url).await {
            Ok(()) => Delivery::Sent,
            Err(e) => {
                tracing::warn!(token = %token.redacted(), recipient = %grant.recipient, error = %e, "notification failed, grant kept");
                Delivery::Failed(e.to_string())
            }
        };

        tracing::info!(
            token = %token.redacted(),
            recipient = %grant.recipient,
            expires_at = %grant.expires_at,
            "export shared"
        );
        Ok(Issued {
            grant,
            download_url,
            delivery,
        })
    }

    /// `issue` with the configured default TTL.
    pub async fn issue_default(
        &self,
        artifact: ArtifactSource,
        recipient: &str,
        message: &str,
    ) -> Result<Issued, BrokerError> {
        let ttl = self.settings.default_ttl;
        self.issue(artifact, recipient, message, ttl).await
    }

    /// Look up the download URL for `token`.
    ///
    /// An active grant past its deadline is expired and reclaimed here,
    /// without waiting for the sweeper.
    pub async fn resolve(&self, token: &AccessToken) -> Result<Resolution, BrokerError> {
        let grant = match self.store.get(token).await {
            Ok(grant) => grant,
            Err(StoreError::NotFound(_)) => return Ok(Resolution::NotFound),
            Err(e) => return Err(e.into()),
        };

        match grant.state {
            GrantState::Revoked => Ok(Resolution::Revoked),
            GrantState::Expired => Ok(Resolution::Expired),
            GrantState::Active if grant.is_usable(self.clock.now()) => Ok(Resolution::Available(
                self.artifacts.public_url(&grant.artifact_ref),
            )),
            GrantState::Active => {
                match self.retire(token, GrantState::Expired).await {
                    Ok(Retirement::Won) => {
                        tracing::info!(token = %token.redacted(), "grant expired on access");
                    }
                    Ok(Retirement::Lost) => {}
                    Err(e) => {
                        tracing::warn!(token = %token.redacted(), error = %e, "lazy expiry left reclaim to the sweeper");
                    }
                }
                Ok(Resolution::Expired)
            }
        }
    }

    /// Withdraw the grant and delete its artifact.
    pub async fn revoke(&self, token: &AccessToken) -> Result<RevokeOutcome, BrokerError> {
        match self.retire(token, GrantState::Revoked).await {
            Ok(Retirement::Won) => {
                tracing::info!(token = %token.redacted(), "grant revoked");
                Ok(RevokeOutcome::Revoked)
            }
            Ok(Retirement::Lost) => {
                tracing::debug!(token = %token.redacted(), "revoke lost the race, already inactive");
                Ok(RevokeOutcome::AlreadyInactive)
            }
            Err(BrokerError::Store(StoreError::NotFound(token))) => Err(BrokerError::NotFound(token)),
            Err(e) => Err(e),
        }
    }

    /// Send the notification of an active grant again.
    pub async fn renotify(&self, token: &AccessToken) -> Result<(), BrokerError> {
        let grant = match self.store.get(token).await {
            Ok(grant) => grant,
            Err(StoreError::NotFound(token)) => return Err(BrokerError::NotFound(token)),
            Err(e) => return Err(e.into()),
        };
        if !grant.is_usable(self.clock.now()) {
            let state = match grant.state {
                GrantState::Active => GrantState::Expired,
                other => other,
            };
            return Err(BrokerError::GrantInactive {
                token: token.clone(),
                state,
            });
        }

        let download_url = self.artifacts.public_url(&grant.artifact_ref);
        self.notify(&grant, &download_url)
            .await
            .map_err(BrokerError::NotifyFailed)
    }

    pub async fn counts(&self) -> GrantCounts {
        self.store.counts().await
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) async fn expired_tokens(&self, now: DateTime<Utc>) -> Vec<AccessToken> {
        self.store.list_expired(now).await
    }

    pub(crate) async fn unreclaimed_tokens(&self) -> Vec<AccessToken> {
        self.store.list_unreclaimed().await
    }

    /// Move `token` from `Active` to `to`; the winner reclaims.
    pub(crate) async fn retire(
        &self,
        token: &AccessToken,
        to: GrantState,
    ) -> Result<Retirement, BrokerError> {
        match self.store.transition(token, GrantState::Active, to).await {
            Ok(grant) => {
                self.reclaim(&grant).await?;
                Ok(Retirement::Won)
            }
            Err(StoreError::Conflict { .. }) => Ok(Retirement::Lost),
            Err(e) => Err(e.into()),
        }
    }

    /// Retry the reclaim of a grant flagged by a failed reclaim.
    ///
    /// Returns `false` when the flag was already taken or the grant is gone.
    pub(crate) async fn reclaim_pending(&self, token: &AccessToken) -> Result<bool, BrokerError> {
        if !self.store.claim_unreclaimed(token).await {
            return Ok(false);
        }
        let grant = match self.store.get(token).await {
            Ok(grant) => grant,
            Err(StoreError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        if !grant.state.is_terminal() {
            return Ok(false);
        }
        self.reclaim(&grant).await?;
        Ok(true)
    }

    /// Delete the artifact, then drop the store entry.
    ///
    /// Callers own the grant (won `transition` or claimed the retry). On
    /// failure the grant is flagged for the sweeper.
    async fn reclaim(&self, grant: &Grant) -> Result<(), BrokerError> {
        if let Err(source) = self.delete(&grant.artifact_ref).await {
            if let Err(e) = self.store.mark_unreclaimed(&grant.token).await {
                tracing::error!(token = %grant.token.redacted(), error = %e, "could not flag failed reclaim");
            }
            return Err(BrokerError::ReclaimFailed {
                token: grant.token.clone(),
                source,
            });
        }
        self.store.remove(&grant.token).await?;
        tracing::debug!(token = %grant.token.redacted(), state = %grant.state, "grant reclaimed");
        Ok(())
    }

    async fn reserve_token(&self) -> Result<AccessToken, BrokerError> {
        let attempts = self.settings.max_token_attempts;
        for attempt in 1..=attempts {
            let token = self.tokens.generate();
            match self.store.reserve(&token).await {
                Ok(()) => return Ok(token),
                Err(e) if e.is_conflict() => {
                    tracing::warn!(attempt, "token collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }
        tracing::error!(attempts, "every generated token collided; check the token generator");
        Err(BrokerError::TokenSpaceExhausted { attempts })
    }

    async fn upload(
        &self,
        token: &AccessToken,
        artifact: &ArtifactSource,
    ) -> Result<ArtifactRef, ArtifactError> {
        let limit = self.settings.upload_timeout;
        match timeout(limit, self.artifacts.upload(token, artifact)).await {
            Ok(result) => result,
            Err(_) => Err(ArtifactError::Timeout(limit)),
        }
    }

    async fn delete(&self, artifact: &ArtifactRef) -> Result<(), ArtifactError> {
        let limit = self.settings.delete_timeout;
        match timeout(limit, self.artifacts.delete(artifact)).await {
            Ok(Ok(())) | Ok(Err(ArtifactError::NotFound(_))) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ArtifactError::Timeout(limit)),
        }
    }

    async fn notify(&self, grant: &Grant, download_url: &str) -> Result<(), NotifyError> {
        let msg = message::compose(&self.settings.subject, grant, download_url, self.clock.now());
        let limit = self.settings.notify_timeout;
        match timeout(limit, self.notifier.send(&grant.recipient, &msg.subject, &msg.body)).await {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout(limit)),
        }
    }
}
