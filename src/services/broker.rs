// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token broker: hands out access tokens that are valid at the moment of use.
//!
//! A refresh reads the refresh facet, exchanges it with Strava, updates the
//! in-memory record at once and then writes the access facet (and the
//! refresh facet, only when Strava rotated it) concurrently.
//!
//! With [`RefreshPolicy::Unguarded`] the writes run as a detached task that
//! is joined on the next `ensure_valid` or when the caller settles the
//! lease. Concurrent tasks for one athlete may each refresh and race on
//! the blind puts.
//!
//! With [`RefreshPolicy::Serialized`] a per-athlete lock covers
//! read-check-refresh-write. Tasks queued behind a refresh re-read the store
//! and adopt the credential it persisted instead of refreshing again.

use crate::config::RefreshPolicy;
use crate::db::CredentialStore;
use crate::error::{AppError, Result};
use crate::models::{AccessFacet, RefreshFacet, TokenRecord};
use crate::services::deadline::Deadline;
use crate::services::strava::IdentityProvider;
use crate::time_utils::now_epoch;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Shared refresh locks, keyed by athlete.
pub type RefreshLocks = Arc<DashMap<u64, Arc<Mutex<()>>>>;

/// What `ensure_valid` had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// Token was already valid; no I/O.
    Fresh,
    /// Token was refreshed with Strava.
    Refreshed,
    /// Another task had already refreshed; its persisted token was reused.
    Adopted,
}

/// A task's working copy of one athlete's token record.
///
/// Holds the handle of any persistence still running for a refresh made
/// through this lease, and the first persistence error observed.
pub struct TokenLease {
    record: TokenRecord,
    pending: Option<JoinHandle<Result<()>>>,
    persistence_error: Option<AppError>,
}

impl TokenLease {
    pub fn new(record: TokenRecord) -> Self {
        Self {
            record,
            pending: None,
            persistence_error: None,
        }
    }

    pub fn record(&self) -> &TokenRecord {
        &self.record
    }

    pub fn access_token(&self) -> &str {
        &self.record.access_token
    }

    pub fn has_pending_writes(&self) -> bool {
        self.pending.is_some()
    }

    /// Wait for outstanding token writes, bounded by `deadline`.
    ///
    /// Failures are kept on the lease rather than returned: the in-memory
    /// credential stays usable even if it never became durable.
    pub async fn settle(&mut self, deadline: &Deadline) {
        let Some(mut handle) = self.pending.take() else {
            return;
        };

        let joined = deadline
            .run("token persistence", async {
                match (&mut handle).await {
                    Ok(result) => result,
                    Err(e) => Err(AppError::Persistence(format!(
                        "Token persistence task failed: {}",
                        e
                    ))),
                }
            })
            .await;

        if let Err(e) = joined {
            self.note_persistence_error(e);
        }
    }

    /// First persistence error seen by this lease, if any.
    pub fn take_persistence_error(&mut self) -> Option<AppError> {
        self.persistence_error.take()
    }

    fn note_persistence_error(&mut self, error: AppError) {
        tracing::error!(
            athlete_id = self.record.athlete_id,
            error = %error,
            "Failed to persist refreshed tokens"
        );
        if self.persistence_error.is_none() {
            self.persistence_error = Some(error);
        }
    }

    fn adopt(&mut self, facet: AccessFacet) {
        self.record.access_token = facet.access_token;
        self.record.expires_at = facet.expires_at;
    }
}

/// Writes produced by one successful refresh.
struct PersistPlan {
    access: AccessFacet,
    /// Only present when Strava rotated the refresh token.
    refresh: Option<RefreshFacet>,
}

#[derive(Clone)]
pub struct TokenBroker {
    store: Arc<dyn CredentialStore>,
    identity: Arc<dyn IdentityProvider>,
    policy: RefreshPolicy,
    margin_secs: i64,
    /// One entry per athlete ever refreshed under the serialized policy.
    /// Entries are never evicted, so the map grows with the set of athletes.
    refresh_locks: RefreshLocks,
}

impl TokenBroker {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        identity: Arc<dyn IdentityProvider>,
        policy: RefreshPolicy,
        margin: Duration,
    ) -> Self {
        Self {
            store,
            identity,
            policy,
            margin_secs: i64::try_from(margin.as_secs()).unwrap_or(i64::MAX),
            refresh_locks: Arc::new(DashMap::new()),
        }
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.policy
    }

    /// Read the athlete's access facet into a new lease.
    pub async fn load(&self, athlete_id: u64, deadline: &Deadline) -> Result<TokenLease> {
        let facet = deadline
            .run("token store read", self.store.get_access(athlete_id))
            .await?
            .ok_or(AppError::RecordNotFound(athlete_id))?;
        Ok(TokenLease::new(facet.into()))
    }

    /// Make sure the lease holds an access token valid right now.
    ///
    /// Any writes from an earlier refresh on this lease are joined first, so
    /// a second check never races the first refresh's persistence.
    pub async fn ensure_valid(
        &self,
        lease: &mut TokenLease,
        deadline: &Deadline,
    ) -> Result<EnsureOutcome> {
        lease.settle(deadline).await;

        if lease.record.is_valid_at(now_epoch(), self.margin_secs) {
            return Ok(EnsureOutcome::Fresh);
        }

        match self.policy {
            RefreshPolicy::Unguarded => self.refresh_unguarded(lease, deadline).await,
            RefreshPolicy::Serialized => self.refresh_serialized(lease, deadline).await,
        }
    }

    async fn refresh_unguarded(
        &self,
        lease: &mut TokenLease,
        deadline: &Deadline,
    ) -> Result<EnsureOutcome> {
        let plan = self.exchange(lease, deadline).await?;

        let store = Arc::clone(&self.store);
        let deadline = *deadline;
        lease.pending = Some(tokio::spawn(async move {
            deadline
                .run("token persistence", persist(store, plan))
                .await
        }));

        Ok(EnsureOutcome::Refreshed)
    }

    async fn refresh_serialized(
        &self,
        lease: &mut TokenLease,
        deadline: &Deadline,
    ) -> Result<EnsureOutcome> {
        let athlete_id = lease.record.athlete_id;

        // Only one task per athlete refreshes; the rest wait here.
        let lock = self
            .refresh_locks
            .entry(athlete_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = deadline
            .run("token refresh lock", async { Ok::<_, AppError>(lock.lock().await) })
            .await?;

        // Another task may have refreshed while we were waiting.
        if let Some(current) = self.persisted_valid_token(athlete_id, deadline).await? {
            tracing::debug!(athlete_id, "Adopting token refreshed by another task");
            lease.adopt(current);
            return Ok(EnsureOutcome::Adopted);
        }

        let plan = match self.exchange(lease, deadline).await {
            Ok(plan) => plan,
            Err(AppError::UpstreamAuth(msg)) => {
                // Another instance may have rotated the refresh token under us.
                if let Some(current) = self.persisted_valid_token(athlete_id, deadline).await? {
                    tracing::info!(
                        athlete_id,
                        "Refresh token race detected - another instance won, using their tokens"
                    );
                    lease.adopt(current);
                    return Ok(EnsureOutcome::Adopted);
                }
                return Err(AppError::UpstreamAuth(msg));
            }
            Err(e) => return Err(e),
        };

        // Followers re-read the store, so persist before releasing the lock.
        if let Err(e) = deadline
            .run("token persistence", persist(Arc::clone(&self.store), plan))
            .await
        {
            lease.note_persistence_error(e);
        }

        Ok(EnsureOutcome::Refreshed)
    }

    /// Stored access facet, if it is valid now.
    async fn persisted_valid_token(
        &self,
        athlete_id: u64,
        deadline: &Deadline,
    ) -> Result<Option<AccessFacet>> {
        let current = deadline
            .run("token store read", self.store.get_access(athlete_id))
            .await?
            .ok_or(AppError::RecordNotFound(athlete_id))?;

        let valid = current.expires_at > now_epoch().saturating_add(self.margin_secs);
        Ok(valid.then_some(current))
    }

    /// Exchange the stored refresh token and update the lease in memory.
    async fn exchange(&self, lease: &mut TokenLease, deadline: &Deadline) -> Result<PersistPlan> {
        let athlete_id = lease.record.athlete_id;
        tracing::info!(athlete_id, "Access token expired, refreshing");

        let stored = deadline
            .run("token store read", self.store.get_refresh(athlete_id))
            .await?
            .ok_or(AppError::RecordNotFound(athlete_id))?;

        let new_tokens = deadline
            .run(
                "token refresh",
                self.identity.refresh_token(&stored.refresh_token),
            )
            .await?;

        if new_tokens.expires_at < lease.record.expires_at {
            tracing::warn!(
                athlete_id,
                old = lease.record.expires_at,
                new = new_tokens.expires_at,
                "Strava returned an earlier expiry than the one on record"
            );
        }

        let rotated = new_tokens.refresh_token != stored.refresh_token;
        let refresh = rotated.then(|| RefreshFacet {
            athlete_id,
            refresh_token: new_tokens.refresh_token.clone(),
        });

        lease.record.access_token = new_tokens.access_token;
        lease.record.expires_at = new_tokens.expires_at;
        lease.record.refresh_token = Some(new_tokens.refresh_token);

        tracing::info!(athlete_id, rotated, "Token refreshed");

        Ok(PersistPlan {
            access: lease.record.access_facet(),
            refresh,
        })
    }
}

/// Write both facets concurrently and report the first failure.
async fn persist(store: Arc<dyn CredentialStore>, plan: PersistPlan) -> Result<()> {
    let athlete_id = plan.access.athlete_id;

    let access = store.put_access(&plan.access);
    let refresh = async {
        match &plan.refresh {
            Some(facet) => store.put_refresh(facet).await,
            None => Ok(()),
        }
    };

    let (access_result, refresh_result) = tokio::join!(access, refresh);

    match (&access_result, &refresh_result) {
        (Ok(()), Ok(())) => {
            tracing::debug!(
                athlete_id,
                refresh_written = plan.refresh.is_some(),
                "Tokens persisted"
            );
        }
        _ => {
            if let Err(e) = &access_result {
                tracing::error!(athlete_id, error = %e, "Failed to write access token");
            }
            if let Err(e) = &refresh_result {
                tracing::error!(athlete_id, error = %e, "Failed to write refresh token");
            }
        }
    }

    access_result.and(refresh_result)
}
