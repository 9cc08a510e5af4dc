//! Test doubles shared by the broker and sweeper tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::app::status::GrantCounts;
use crate::app::{BrokerBuilder, BrokerConfig, ExportBroker};
use crate::domain::{
    AccessToken, ArtifactError, ArtifactRef, ArtifactSource, Grant, GrantState, NotifyError,
    Recipient, StoreError,
};
use crate::impls::{InMemoryArtifactGateway, InMemoryOutbox};
use crate::ports::{
    ArtifactGateway, FixedClock, NotificationGateway, OsRandomTokenGenerator, PermissionStore,
    TokenGenerator,
};
use crate::store::InMemoryPermissionStore;

pub(crate) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

pub(crate) fn sheet(name: &str) -> ArtifactSource {
    ArtifactSource::bytes(name, b"barcode,client\n".to_vec())
}

/// Hands out the scripted tokens in order, then random ones.
pub(crate) struct ScriptedTokens {
    script: Mutex<VecDeque<AccessToken>>,
}

impl ScriptedTokens {
    pub(crate) fn new(tokens: &[&str]) -> Self {
        Self {
            script: Mutex::new(tokens.iter().map(|t| AccessToken::new(*t)).collect()),
        }
    }

    /// Always the same token.
    pub(crate) fn stuck(token: &str) -> Self {
        Self::new(&[token; 64])
    }
}

impl TokenGenerator for ScriptedTokens {
    fn generate(&self) -> AccessToken {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| OsRandomTokenGenerator.generate())
    }
}

/// In-memory storage with switchable failures and delays.
#[derive(Default)]
pub(crate) struct FlakyArtifacts {
    pub(crate) inner: InMemoryArtifactGateway,
    pub(crate) fail_uploads: AtomicBool,
    pub(crate) upload_delay: Mutex<Option<StdDuration>>,
    pub(crate) delete_delay: Mutex<Option<StdDuration>>,
    /// The next N deletes fail.
    pub(crate) failing_deletes: AtomicUsize,
    pub(crate) delete_calls: AtomicUsize,
}

impl FlakyArtifacts {
    pub(crate) fn contains(&self, artifact: &ArtifactRef) -> bool {
        self.inner.contains(artifact)
    }
}

#[async_trait]
impl ArtifactGateway for FlakyArtifacts {
    async fn upload(
        &self,
        token: &AccessToken,
        artifact: &ArtifactSource,
    ) -> Result<ArtifactRef, ArtifactError> {
        let delay = *self.upload_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(ArtifactError::Rejected("bucket quota exceeded".into()));
        }
        self.inner.upload(token, artifact).await
    }

    async fn delete(&self, artifact: &ArtifactRef) -> Result<(), ArtifactError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delete_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failing = self
            .failing_deletes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ArtifactError::Rejected("storage unavailable".into()));
        }
        self.inner.delete(artifact).await
    }

    fn public_url(&self, artifact: &ArtifactRef) -> String {
        self.inner.public_url(artifact)
    }
}

/// Outbox that can be told to fail or stall.
#[derive(Default)]
pub(crate) struct FlakyNotifier {
    pub(crate) outbox: InMemoryOutbox,
    pub(crate) fail: AtomicBool,
    pub(crate) delay: Mutex<Option<StdDuration>>,
}

#[async_trait]
impl NotificationGateway for FlakyNotifier {
    async fn send(&self, to: &Recipient, subject: &str, body: &str) -> Result<(), NotifyError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Rejected("smtp relay refused".into()));
        }
        self.outbox.send(to, subject, body).await
    }
}

/// Store whose `put` always reports a conflict.
#[derive(Default)]
pub(crate) struct RejectingPutStore {
    pub(crate) inner: InMemoryPermissionStore,
}

#[async_trait]
impl PermissionStore for RejectingPutStore {
    async fn reserve(&self, token: &AccessToken) -> Result<(), StoreError> {
        self.inner.reserve(token).await
    }

    async fn release(&self, token: &AccessToken) {
        self.inner.release(token).await
    }

    async fn put(&self, grant: Grant) -> Result<(), StoreError> {
        Err(StoreError::Conflict {
            token: grant.token,
            current: None,
        })
    }

    async fn get(&self, token: &AccessToken) -> Result<Grant, StoreError> {
        self.inner.get(token).await
    }

    async fn transition(
        &self,
        token: &AccessToken,
        from: GrantState,
        to: GrantState,
    ) -> Result<Grant, StoreError> {
        self.inner.transition(token, from, to).await
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> Vec<AccessToken> {
        self.inner.list_expired(now).await
    }

    async fn mark_unreclaimed(&self, token: &AccessToken) -> Result<(), StoreError> {
        self.inner.mark_unreclaimed(token).await
    }

    async fn claim_unreclaimed(&self, token: &AccessToken) -> bool {
        self.inner.claim_unreclaimed(token).await
    }

    async fn list_unreclaimed(&self) -> Vec<AccessToken> {
        self.inner.list_unreclaimed().await
    }

    async fn remove(&self, token: &AccessToken) -> Result<(), StoreError> {
        self.inner.remove(token).await
    }

    async fn counts(&self) -> GrantCounts {
        self.inner.counts().await
    }
}

/// A broker wired to test doubles, with handles to each of them.
pub(crate) struct Harness {
    pub(crate) broker: Arc<ExportBroker>,
    pub(crate) artifacts: Arc<FlakyArtifacts>,
    pub(crate) notifier: Arc<FlakyNotifier>,
    pub(crate) clock: Arc<FixedClock>,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::with(
            BrokerConfig::default(),
            Arc::new(InMemoryPermissionStore::new()),
            Arc::new(OsRandomTokenGenerator),
        )
    }

    pub(crate) fn with(
        config: BrokerConfig,
        store: Arc<dyn PermissionStore>,
        tokens: Arc<dyn TokenGenerator>,
    ) -> Self {
        let artifacts = Arc::new(FlakyArtifacts::default());
        let notifier = Arc::new(FlakyNotifier::default());
        let clock = Arc::new(FixedClock::new(t0()));

        let broker = BrokerBuilder::new(config)
            .store(store)
            .artifacts(artifacts.clone())
            .notifier(notifier.clone())
            .tokens(tokens)
            .clock(clock.clone())
            .build()
            .unwrap();

        Self {
            broker: Arc::new(broker),
            artifacts,
            notifier,
            clock,
        }
    }
}
