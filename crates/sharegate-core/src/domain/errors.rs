//! Errors - エラー型と分類
//!
//! レイヤーごとに thiserror の enum を分けています。
//! - ValidationError: 入力の検証（ttl, recipient, file name）
//! - StoreError: PermissionStore（Conflict は「負け」を表す通常の結果）
//! - ArtifactError / NotifyError: 外部境界の失敗
//! - BrokerError: ExportBroker が呼び出し元に返すエラー

use std::time::Duration;

use thiserror::Error;

use super::ids::{AccessToken, ArtifactRef};
use super::state::GrantState;

/// ErrorKind は運用上の分類
///
/// - Transient: 一時的なエラー（リトライ推奨）
/// - Permanent: 恒久的なエラー（リトライ無意味）
/// - Infrastructure: 外部サービス（storage / notification）の障害
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
    Infrastructure,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("ttl must be positive")]
    NonPositiveTtl,

    /// The deadline would fall outside the representable date range.
    #[error("ttl is too large")]
    TtlOutOfRange,

    #[error("recipient address is empty")]
    EmptyRecipient,

    #[error("invalid recipient address: {0}")]
    InvalidRecipient(String),

    #[error("invalid artifact file name: {0:?}")]
    InvalidFileName(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("no grant for token {}", .0.redacted())]
    NotFound(AccessToken),

    /// Lost an optimistic-concurrency race (or the key is already taken).
    #[error("conflict on token {} (current state: {current:?})", .token.redacted())]
    Conflict {
        token: AccessToken,
        current: Option<GrantState>,
    },

    #[error("illegal transition {from} -> {to}")]
    InvalidTransition { from: GrantState, to: GrantState },
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact not found: {0}")]
    NotFound(ArtifactRef),

    #[error("invalid artifact: {0}")]
    Invalid(#[from] ValidationError),

    #[error("storage rejected the request: {0}")]
    Rejected(String),

    #[error("storage call timed out after {0:?}")]
    Timeout(Duration),

    #[error("storage i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification rejected: {0}")]
    Rejected(String),

    #[error("notification timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Every generated token collided; the generator is misconfigured.
    #[error("token space exhausted after {attempts} attempts")]
    TokenSpaceExhausted { attempts: u32 },

    #[error("upload failed: {0}")]
    UploadFailed(#[source] ArtifactError),

    #[error("notification failed: {0}")]
    NotifyFailed(#[source] NotifyError),

    #[error("no grant for token {}", .0.redacted())]
    NotFound(AccessToken),

    #[error("grant {} is no longer usable ({state})", .token.redacted())]
    GrantInactive {
        token: AccessToken,
        state: GrantState,
    },

    /// The grant is terminal but its artifact is still stored; the sweeper
    /// retries the deletion.
    #[error("reclaim of {} failed: {source}", .token.redacted())]
    ReclaimFailed {
        token: AccessToken,
        #[source]
        source: ArtifactError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BrokerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BrokerError::Validation(_)
            | BrokerError::TokenSpaceExhausted { .. }
            | BrokerError::NotFound(_)
            | BrokerError::GrantInactive { .. } => ErrorKind::Permanent,
            BrokerError::UploadFailed(_)
            | BrokerError::NotifyFailed(_)
            | BrokerError::ReclaimFailed { .. } => ErrorKind::Infrastructure,
            BrokerError::Store(StoreError::Conflict { .. }) => ErrorKind::Transient,
            BrokerError::Store(_) => ErrorKind::Permanent,
        }
    }
}
