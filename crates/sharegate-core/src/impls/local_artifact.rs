//! Local filesystem artifact gateway.
//!
//! Structure: `{root}/{bucket}/{token}/{file_name}`. The token directory is
//! removed once its artifact is deleted, so one grant never leaves anything
//! behind for the next.
//!
//! Uploads are written to `{file_name}.partial` and renamed into place.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::domain::artifact::validate_file_name;
use crate::domain::{AccessToken, ArtifactError, ArtifactRef, ArtifactSource, ValidationError};
use crate::ports::{ArtifactGateway, join_public_url};

const PARTIAL_SUFFIX: &str = ".partial";

/// Artifact storage on the local filesystem.
///
/// Cancelling `upload` (for example on timeout) stops it before the rename,
/// so the public key never appears afterwards. A write already handed to
/// the blocking pool still finishes, so the `.partial` file can land after
/// the cleanup `delete`. It is never served under the public key, but it
/// stays on disk until removed by hand.
pub struct LocalArtifactGateway {
    root: PathBuf,
    bucket: String,
    base_url: String,
}

impl LocalArtifactGateway {
    /// Create the gateway, creating `{root}/{bucket}` if needed.
    pub async fn new(
        root: impl AsRef<Path>,
        bucket: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, ArtifactError> {
        let bucket = bucket.into();
        validate_file_name(&bucket)?;
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(&bucket)).await?;
        Ok(Self {
            root,
            bucket,
            base_url: base_url.into(),
        })
    }

    fn bucket_dir(&self) -> PathBuf {
        self.root.join(&self.bucket)
    }

    /// Map a key to `(token_dir, file_path)`, refusing anything that is not
    /// exactly `{token}/{file_name}`.
    fn resolve(&self, artifact: &ArtifactRef) -> Result<(PathBuf, PathBuf), ArtifactError> {
        let (token, file_name) = artifact
            .as_str()
            .split_once('/')
            .ok_or_else(|| ValidationError::InvalidFileName(artifact.to_string()))?;
        validate_file_name(token)?;
        validate_file_name(file_name)?;

        let token_dir = self.bucket_dir().join(token);
        let file_path = token_dir.join(file_name);
        Ok((token_dir, file_path))
    }
}

fn partial_path(file_path: &Path) -> PathBuf {
    let mut name = file_path.as_os_str().to_owned();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

async fn remove_if_present(path: &Path) -> Result<(), ArtifactError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl ArtifactGateway for LocalArtifactGateway {
    async fn upload(
        &self,
        token: &AccessToken,
        artifact: &ArtifactSource,
    ) -> Result<ArtifactRef, ArtifactError> {
        let file_name = artifact.file_name()?;
        let key = ArtifactRef::scoped(token, &file_name);
        let (token_dir, file_path) = self.resolve(&key)?;

        let bytes = artifact.read().await?;
        fs::create_dir_all(&token_dir).await?;
        let partial = partial_path(&file_path);
        fs::write(&partial, bytes).await?;
        fs::rename(&partial, &file_path).await?;
        Ok(key)
    }

    async fn delete(&self, artifact: &ArtifactRef) -> Result<(), ArtifactError> {
        let (token_dir, file_path) = self.resolve(artifact)?;
        remove_if_present(&file_path).await?;
        remove_if_present(&partial_path(&file_path)).await?;

        // Only succeeds when the directory is empty; leftovers are not ours.
        let _ = fs::remove_dir(&token_dir).await;
        Ok(())
    }

    fn public_url(&self, artifact: &ArtifactRef) -> String {
        join_public_url(&self.base_url, &self.bucket, artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn gateway(dir: &tempfile::TempDir) -> LocalArtifactGateway {
        LocalArtifactGateway::new(dir.path(), "exports", "https://files.example.com")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn upload_writes_under_token_directory() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = gateway(&dir).await;

        let artifact = gateway
            .upload(
                &AccessToken::new("tok"),
                &ArtifactSource::bytes("boxes.xlsx", b"sheet".to_vec()),
            )
            .await
            .unwrap();

        let on_disk = dir.path().join("exports").join("tok").join("boxes.xlsx");
        assert_eq!(std::fs::read(on_disk).unwrap(), b"sheet");
        assert_eq!(
            gateway.public_url(&artifact),
            "https://files.example.com/exports/tok/boxes.xlsx"
        );
    }

    #[tokio::test]
    async fn upload_copies_a_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = gateway(&dir).await;
        let src = dir.path().join("report.xlsx");
        std::fs::write(&src, b"from disk").unwrap();

        let artifact = gateway
            .upload(&AccessToken::new("tok"), &ArtifactSource::file(&src))
            .await
            .unwrap();

        assert_eq!(artifact.as_str(), "tok/report.xlsx");
        let stored = dir.path().join("exports").join("tok").join("report.xlsx");
        assert_eq!(std::fs::read(stored).unwrap(), b"from disk");
    }

    #[tokio::test]
    async fn delete_removes_file_and_token_dir_only() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = gateway(&dir).await;
        let source = ArtifactSource::bytes("a.xlsx", b"x".to_vec());

        let short = gateway.upload(&AccessToken::new("abc"), &source).await.unwrap();
        let long = gateway.upload(&AccessToken::new("abcd"), &source).await.unwrap();

        gateway.delete(&short).await.unwrap();

        let bucket = dir.path().join("exports");
        assert!(!bucket.join("abc").exists());
        assert!(bucket.join("abcd").join("a.xlsx").exists());

        // Idempotent.
        gateway.delete(&short).await.unwrap();
        gateway.delete(&long).await.unwrap();
        assert!(!bucket.join("abcd").exists());
    }

    #[tokio::test]
    async fn upload_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = gateway(&dir).await;

        gateway
            .upload(
                &AccessToken::new("tok"),
                &ArtifactSource::bytes("boxes.xlsx", b"sheet".to_vec()),
            )
            .await
            .unwrap();

        let token_dir = dir.path().join("exports").join("tok");
        let names: Vec<_> = std::fs::read_dir(&token_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("boxes.xlsx")]);
    }

    #[tokio::test]
    async fn delete_sweeps_a_late_partial_write() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = gateway(&dir).await;
        let token_dir = dir.path().join("exports").join("tok");
        std::fs::create_dir_all(&token_dir).unwrap();
        std::fs::write(token_dir.join("boxes.xlsx.partial"), b"half").unwrap();

        gateway
            .delete(&ArtifactRef::from_key("tok/boxes.xlsx"))
            .await
            .unwrap();

        assert!(!token_dir.exists());
    }

    #[tokio::test]
    async fn delete_refuses_keys_outside_the_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = gateway(&dir).await;

        let err = gateway
            .delete(&ArtifactRef::from_key("../etc/passwd"))
            .await
            .unwrap_err();
        assert!(matches!(err, ArtifactError::Invalid(_)));

        let err = gateway
            .delete(&ArtifactRef::from_key("tok"))
            .await
            .unwrap_err();
        assert!(matches!(err, ArtifactError::Invalid(_)));
    }
}
