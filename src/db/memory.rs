// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory credential store.
//!
//! Same semantics as Firestore (blind puts, no transactions). Counts every
//! call and can be told to fail writes, which makes it the store of choice
//! for tests and for running the pipeline without GCP.

use crate::db::CredentialStore;
use crate::error::AppError;
use crate::models::{AccessFacet, RefreshFacet, TokenRecord};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Call counters, one per store operation.
#[derive(Debug, Default)]
pub struct StoreCalls {
    pub get_access: AtomicUsize,
    pub put_access: AtomicUsize,
    pub get_refresh: AtomicUsize,
    pub put_refresh: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    access: Arc<DashMap<u64, AccessFacet>>,
    refresh: Arc<DashMap<u64, RefreshFacet>>,
    calls: Arc<StoreCalls>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed both facets from a full record.
    ///
    /// Seeding bypasses the call counters.
    pub fn insert(&self, record: &TokenRecord) {
        self.access.insert(record.athlete_id, record.access_facet());
        if let Some(refresh_token) = &record.refresh_token {
            self.refresh.insert(
                record.athlete_id,
                RefreshFacet {
                    athlete_id: record.athlete_id,
                    refresh_token: refresh_token.clone(),
                },
            );
        }
    }

    pub fn access(&self, athlete_id: u64) -> Option<AccessFacet> {
        self.access.get(&athlete_id).map(|f| f.clone())
    }

    pub fn refresh(&self, athlete_id: u64) -> Option<RefreshFacet> {
        self.refresh.get(&athlete_id).map(|f| f.clone())
    }

    pub fn calls(&self) -> &StoreCalls {
        &self.calls
    }

    /// Make every subsequent put fail with a persistence error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Persistence(
                "Memory store rejecting writes".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn get_access(&self, athlete_id: u64) -> Result<Option<AccessFacet>, AppError> {
        self.calls.get_access.fetch_add(1, Ordering::SeqCst);
        Ok(self.access(athlete_id))
    }

    async fn put_access(&self, facet: &AccessFacet) -> Result<(), AppError> {
        self.calls.put_access.fetch_add(1, Ordering::SeqCst);
        self.check_writable()?;
        self.access.insert(facet.athlete_id, facet.clone());
        Ok(())
    }

    async fn get_refresh(&self, athlete_id: u64) -> Result<Option<RefreshFacet>, AppError> {
        self.calls.get_refresh.fetch_add(1, Ordering::SeqCst);
        Ok(self.refresh(athlete_id))
    }

    async fn put_refresh(&self, facet: &RefreshFacet) -> Result<(), AppError> {
        self.calls.put_refresh.fetch_add(1, Ordering::SeqCst);
        self.check_writable()?;
        self.refresh.insert(facet.athlete_id, facet.clone());
        Ok(())
    }
}
