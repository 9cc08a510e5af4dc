//! PermissionStore port - Grant の正本（source of truth）
//!
//! PermissionStore は以下を管理します：
//! - Grant の状態（Active / Revoked / Expired）
//! - 発行中トークンの予約（upload 前に token の namespace を確保）
//! - 使用済みトークン（retired: 再発行されない）
//! - 回収に失敗した terminal な Grant（sweeper が再回収する）
//!
//! # 実装
//! - `store::InMemoryPermissionStore`（Mutex で保護された HashMap）

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::app::status::GrantCounts;
use crate::domain::{AccessToken, Grant, GrantState, StoreError};

/// PermissionStore は Grant の正本（source of truth）
///
/// # 設計原則
/// - 全操作は互いにアトミック（同じ token への操作は線形化される）
/// - 状態遷移は compare-and-swap（`transition`）のみ。部分更新はしない
/// - 外部 I/O を待たない（upload / delete / notify は broker の責務）
/// - `Conflict` はエラーではなく「競合に負けた」という通常の結果
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Claim `token` for an in-flight issuance.
    ///
    /// Fails with `Conflict` if the token is recorded, reserved or retired.
    async fn reserve(&self, token: &AccessToken) -> Result<(), StoreError>;

    /// Drop a reservation made by `reserve` (no-op if absent).
    async fn release(&self, token: &AccessToken);

    /// Record a new grant; consumes its reservation.
    ///
    /// Fails with `Conflict` if a grant with the same token already exists.
    async fn put(&self, grant: Grant) -> Result<(), StoreError>;

    async fn get(&self, token: &AccessToken) -> Result<Grant, StoreError>;

    /// Compare-and-swap the state of `token` from `from` to `to`.
    ///
    /// Returns the updated grant. `Conflict` when the current state is not
    /// `from` (including tokens already removed), `NotFound` for tokens the
    /// store has never seen.
    async fn transition(
        &self,
        token: &AccessToken,
        from: GrantState,
        to: GrantState,
    ) -> Result<Grant, StoreError>;

    /// Active grants with `expires_at <= now`, in no particular order.
    async fn list_expired(&self, now: DateTime<Utc>) -> Vec<AccessToken>;

    /// Flag a terminal grant whose reclaim failed so the sweeper retries it.
    ///
    /// Only the caller that won `transition` (or a successful
    /// `claim_unreclaimed`) may flag a grant.
    async fn mark_unreclaimed(&self, token: &AccessToken) -> Result<(), StoreError>;

    /// Take over a flagged retry. `false` if the token is not flagged
    /// (never failed, already claimed, or already removed).
    async fn claim_unreclaimed(&self, token: &AccessToken) -> bool;

    /// Tokens flagged by `mark_unreclaimed` and not claimed yet.
    async fn list_unreclaimed(&self) -> Vec<AccessToken>;

    /// Delete the entry after its artifact is gone. The token stays retired
    /// (see the implementation for how long).
    async fn remove(&self, token: &AccessToken) -> Result<(), StoreError>;

    async fn counts(&self) -> GrantCounts;
}
