//! TokenGenerator port - アクセストークン生成の抽象化
//!
//! トークンは Grant の主キーであり、同時に「このファイルの共有を取り消せる」
//! capability でもあります。テスト容易性のために trait として抽象化しています。
//!
//! # 実装
//! - **OsRandomTokenGenerator**: OS の CSPRNG ベース（本番用）

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;

use crate::domain::AccessToken;

/// Entropy per token, in bytes (256 bits).
pub const TOKEN_BYTES: usize = 32;

/// TokenGenerator は推測不能なトークンを生成
///
/// # 要件
/// - 暗号論的に安全な乱数（時刻やカウンタに依存しない）
/// - 副作用なし（衝突チェックは PermissionStore::reserve の責務）
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数の issue から同時に使える）
pub trait TokenGenerator: Send + Sync {
    fn generate(&self) -> AccessToken;
}

/// 256 random bits from the operating system, URL-safe base64 (43 chars).
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandomTokenGenerator;

impl OsRandomTokenGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl TokenGenerator for OsRandomTokenGenerator {
    fn generate(&self) -> AccessToken {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        AccessToken::new(URL_SAFE_NO_PAD.encode(bytes))
    }
}
