//! Artifact - 共有対象のファイル（エクスポートされたスプレッドシートなど）
//!
//! バイト列で渡すか、ローカルファイルのパスで渡すかを選べます。
//! どちらの場合も `file_name` は `{token}/{file_name}` のキーに使われるので、
//! パス区切りや `..` を含めることはできません。

use std::path::PathBuf;

use chrono::NaiveDate;

use super::errors::ValidationError;

/// Extension used for exported spreadsheets.
pub const EXPORT_EXTENSION: &str = "xlsx";

/// Content handed to the broker for sharing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactSource {
    /// Already-rendered bytes with the name they should be stored under.
    Bytes { file_name: String, bytes: Vec<u8> },

    /// A file on local disk; stored under its own file name.
    File(PathBuf),
}

impl ArtifactSource {
    pub fn bytes(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::Bytes {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// Storage file name, validated to be a single path segment.
    pub fn file_name(&self) -> Result<String, ValidationError> {
        let name = match self {
            Self::Bytes { file_name, .. } => file_name.clone(),
            Self::File(path) => path
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string)
                .ok_or_else(|| ValidationError::InvalidFileName(path.display().to_string()))?,
        };
        validate_file_name(&name)?;
        Ok(name)
    }

    /// Load the content (reads the file for `File`).
    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        match self {
            Self::Bytes { bytes, .. } => Ok(bytes.clone()),
            Self::File(path) => tokio::fs::read(path).await,
        }
    }
}

/// Rejects names that would escape the token namespace.
pub fn validate_file_name(name: &str) -> Result<(), ValidationError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.chars().any(char::is_control);
    if bad {
        return Err(ValidationError::InvalidFileName(name.to_string()));
    }
    Ok(())
}

/// Default export name: `{prefix}_Export_{YYYY-MM-DD}.xlsx`.
pub fn export_file_name(prefix: &str, date: NaiveDate) -> String {
    format!(
        "{}_Export_{}.{}",
        prefix,
        date.format("%Y-%m-%d"),
        EXPORT_EXTENSION
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn export_file_name_uses_iso_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(export_file_name("LogiX", date), "LogiX_Export_2024-03-09.xlsx");
    }

    #[test]
    fn file_source_uses_last_path_segment() {
        let source = ArtifactSource::file("/tmp/exports/boxes.xlsx");
        assert_eq!(source.file_name().unwrap(), "boxes.xlsx");
    }

    #[rstest]
    #[case::empty("")]
    #[case::dot_dot("..")]
    #[case::slash("a/b.xlsx")]
    #[case::backslash("a\\b.xlsx")]
    #[case::newline("a\nb.xlsx")]
    fn rejects_names_escaping_the_namespace(#[case] name: &str) {
        let source = ArtifactSource::bytes(name, b"x".to_vec());
        assert!(matches!(
            source.file_name(),
            Err(ValidationError::InvalidFileName(_))
        ));
    }

    #[tokio::test]
    async fn read_returns_inline_bytes() {
        let source = ArtifactSource::bytes("a.xlsx", b"sheet".to_vec());
        assert_eq!(source.read().await.unwrap(), b"sheet".to_vec());
    }
}
