//! In-memory permission store.

use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::app::status::GrantCounts;
use crate::domain::{AccessToken, Grant, GrantState, StoreError};
use crate::ports::PermissionStore;

/// Retired tokens remembered by default.
pub const DEFAULT_RETIRED_CAPACITY: usize = 100_000;

/// In-memory store state.
#[derive(Default)]
struct InMemoryStoreState {
    /// All live grant records (single source of truth).
    grants: HashMap<AccessToken, Grant>,

    /// Tokens claimed by an issuance that has not recorded its grant yet.
    reserved: HashSet<AccessToken>,

    /// Terminal grants whose reclaim failed, waiting for the sweeper.
    unreclaimed: HashSet<AccessToken>,

    /// Tokens whose grant was reclaimed and removed, oldest first in
    /// `retired_order`.
    retired: HashSet<AccessToken>,
    retired_order: VecDeque<AccessToken>,
}

impl InMemoryStoreState {
    fn is_taken(&self, token: &AccessToken) -> bool {
        self.grants.contains_key(token)
            || self.reserved.contains(token)
            || self.retired.contains(token)
    }

    fn conflict(&self, token: &AccessToken) -> StoreError {
        StoreError::Conflict {
            token: token.clone(),
            current: self.grants.get(token).map(|g| g.state),
        }
    }

    fn retire(&mut self, token: AccessToken, capacity: usize) {
        if !self.retired.insert(token.clone()) {
            return;
        }
        self.retired_order.push_back(token);
        while self.retired_order.len() > capacity {
            if let Some(oldest) = self.retired_order.pop_front() {
                self.retired.remove(&oldest);
            }
        }
    }

    fn counts(&self) -> GrantCounts {
        let mut counts = GrantCounts {
            reserved: self.reserved.len(),
            unreclaimed: self.unreclaimed.len(),
            retired: self.retired.len(),
            ..GrantCounts::default()
        };
        for grant in self.grants.values() {
            match grant.state {
                GrantState::Active => counts.active += 1,
                GrantState::Revoked => counts.revoked += 1,
                GrantState::Expired => counts.expired += 1,
            }
        }
        counts
    }
}

/// Permission store backed by a `HashMap` behind a single async mutex.
///
/// The lock is only held for map operations, never across gateway I/O, so
/// per-token compare-and-swap is enough to linearize revoke/expire races.
/// Nothing is persisted across restarts.
///
/// Removed tokens are remembered up to a fixed capacity; past it the oldest
/// are forgotten. A forgotten token reads as never seen (`NotFound` on a
/// late revoke). Regenerating one by chance needs a 256-bit collision.
pub struct InMemoryPermissionStore {
    state: Mutex<InMemoryStoreState>,
    retired_capacity: usize,
}

impl Default for InMemoryPermissionStore {
    fn default() -> Self {
        Self::with_retired_capacity(DEFAULT_RETIRED_CAPACITY)
    }
}

impl InMemoryPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember at most `capacity` removed tokens (at least one).
    pub fn with_retired_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(InMemoryStoreState::default()),
            retired_capacity: capacity.max(1),
        }
    }
}

#[async_trait]
impl PermissionStore for InMemoryPermissionStore {
    async fn reserve(&self, token: &AccessToken) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.is_taken(token) {
            return Err(state.conflict(token));
        }
        state.reserved.insert(token.clone());
        Ok(())
    }

    async fn release(&self, token: &AccessToken) {
        let mut state = self.state.lock().await;
        state.reserved.remove(token);
    }

    async fn put(&self, grant: Grant) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.grants.contains_key(&grant.token) || state.retired.contains(&grant.token) {
            return Err(state.conflict(&grant.token));
        }
        state.reserved.remove(&grant.token);
        state.grants.insert(grant.token.clone(), grant);
        Ok(())
    }

    async fn get(&self, token: &AccessToken) -> Result<Grant, StoreError> {
        let state = self.state.lock().await;
        state
            .grants
            .get(token)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(token.clone()))
    }

    async fn transition(
        &self,
        token: &AccessToken,
        from: GrantState,
        to: GrantState,
    ) -> Result<Grant, StoreError> {
        if !from.can_transition_to(to) {
            return Err(StoreError::InvalidTransition { from, to });
        }

        let mut state = self.state.lock().await;
        if let Some(grant) = state.grants.get_mut(token) {
            if grant.state != from {
                return Err(StoreError::Conflict {
                    token: token.clone(),
                    current: Some(grant.state),
                });
            }
            grant.state = to;
            return Ok(grant.clone());
        }

        if state.retired.contains(token) {
            // Already reclaimed by whoever won the race.
            return Err(StoreError::Conflict {
                token: token.clone(),
                current: None,
            });
        }
        Err(StoreError::NotFound(token.clone()))
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> Vec<AccessToken> {
        let state = self.state.lock().await;
        state
            .grants
            .values()
            .filter(|g| g.state == GrantState::Active && g.expires_at <= now)
            .map(|g| g.token.clone())
            .collect()
    }

    async fn mark_unreclaimed(&self, token: &AccessToken) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        match state.grants.get(token).map(|g| g.state) {
            Some(current) if current.is_terminal() => {
                state.unreclaimed.insert(token.clone());
                Ok(())
            }
            Some(current) => Err(StoreError::Conflict {
                token: token.clone(),
                current: Some(current),
            }),
            None => Err(StoreError::NotFound(token.clone())),
        }
    }

    async fn claim_unreclaimed(&self, token: &AccessToken) -> bool {
        let mut state = self.state.lock().await;
        state.unreclaimed.remove(token)
    }

    async fn list_unreclaimed(&self) -> Vec<AccessToken> {
        let state = self.state.lock().await;
        state.unreclaimed.iter().cloned().collect()
    }

    async fn remove(&self, token: &AccessToken) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.grants.remove(token).is_some() {
            state.unreclaimed.remove(token);
            state.retire(token.clone(), self.retired_capacity);
            return Ok(());
        }
        if state.retired.contains(token) {
            return Ok(());
        }
        Err(StoreError::NotFound(token.clone()))
    }

    async fn counts(&self) -> GrantCounts {
        let state = self.state.lock().await;
        state.counts()
    }
}
