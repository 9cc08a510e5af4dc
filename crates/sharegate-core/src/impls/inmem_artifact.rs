//! InMemoryArtifactGateway - テスト・デモ用の artifact ストレージ
//!
//! # 実装詳細
//! - HashMap<ArtifactRef, Vec<u8>> をキー単位で管理（prefix 削除はしない）
//! - RwLock で排他制御（await を跨がない）

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::domain::{AccessToken, ArtifactError, ArtifactRef, ArtifactSource};
use crate::ports::{ArtifactGateway, join_public_url};

/// Artifact storage kept in process memory. Not persistent.
pub struct InMemoryArtifactGateway {
    base_url: String,
    bucket: String,
    objects: RwLock<HashMap<ArtifactRef, Vec<u8>>>,
    /// Deletions that actually removed an object.
    deleted: AtomicUsize,
}

impl InMemoryArtifactGateway {
    pub fn new(base_url: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            bucket: bucket.into(),
            objects: RwLock::new(HashMap::new()),
            deleted: AtomicUsize::new(0),
        }
    }

    /// Number of stored artifacts
    pub fn len(&self) -> usize {
        self.objects.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, artifact: &ArtifactRef) -> bool {
        self.objects
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(artifact)
    }

    pub fn get(&self, artifact: &ArtifactRef) -> Option<Vec<u8>> {
        self.objects
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(artifact)
            .cloned()
    }

    /// How many stored artifacts have been deleted so far.
    pub fn deleted_count(&self) -> usize {
        self.deleted.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryArtifactGateway {
    fn default() -> Self {
        Self::new("memory://artifacts", "exports")
    }
}

#[async_trait]
impl ArtifactGateway for InMemoryArtifactGateway {
    async fn upload(
        &self,
        token: &AccessToken,
        artifact: &ArtifactSource,
    ) -> Result<ArtifactRef, ArtifactError> {
        let file_name = artifact.file_name()?;
        let bytes = artifact.read().await?;
        let key = ArtifactRef::scoped(token, &file_name);

        self.objects
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.clone(), bytes);
        Ok(key)
    }

    async fn delete(&self, artifact: &ArtifactRef) -> Result<(), ArtifactError> {
        let removed = self
            .objects
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(artifact);
        if removed.is_some() {
            self.deleted.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn public_url(&self, artifact: &ArtifactRef) -> String {
        join_public_url(&self.base_url, &self.bucket, artifact)
    }
}
