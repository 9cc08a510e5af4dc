//! ArtifactGateway port - Blob ストレージ（S3 / Supabase Storage / Local）
//!
//! ArtifactGateway はエクスポートされたファイルを保存し、受信者向けの URL を返します。
//!
//! # 実装
//! - `impls::InMemoryArtifactGateway`（テスト・デモ用）
//! - `impls::LocalArtifactGateway`（ローカルファイルシステム）

use async_trait::async_trait;

use crate::domain::{AccessToken, ArtifactError, ArtifactRef, ArtifactSource};

/// ArtifactGateway はファイルを token ごとの namespace に保存
///
/// # 設計原則
/// - キーは `{token}/{file_name}`（別の grant と衝突しない）
/// - delete は 1 つのキーだけを消す（prefix 削除はしない）
/// - delete は冪等（既に無いものを消してもエラーにしない）
/// - URL が download の信頼境界（broker の token は lifecycle のみを管理）
#[async_trait]
pub trait ArtifactGateway: Send + Sync {
    /// Store `artifact` under the namespace of `token`.
    async fn upload(
        &self,
        token: &AccessToken,
        artifact: &ArtifactSource,
    ) -> Result<ArtifactRef, ArtifactError>;

    /// Delete exactly one artifact. Deleting a missing artifact succeeds.
    async fn delete(&self, artifact: &ArtifactRef) -> Result<(), ArtifactError>;

    /// URL the recipient downloads from, without talking to the broker.
    fn public_url(&self, artifact: &ArtifactRef) -> String;
}

/// `{base}/{bucket}/{key}` with no doubled slashes.
pub fn join_public_url(base_url: &str, bucket: &str, artifact: &ArtifactRef) -> String {
    format!(
        "{}/{}/{}",
        base_url.trim_end_matches('/'),
        bucket.trim_matches('/'),
        artifact.as_str()
    )
}
