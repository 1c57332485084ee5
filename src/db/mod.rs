// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential store: access and refresh facets keyed by athlete ID.
//!
//! The store offers plain get and blind put per facet. There is no
//! compare-and-swap and no transaction spanning both facets.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::error::AppError;
use crate::models::{AccessFacet, RefreshFacet};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    pub const ACCESS_TOKENS: &str = "access_tokens";
    pub const REFRESH_TOKENS: &str = "refresh_tokens";
}

/// Persistent token storage used by the token broker.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_access(&self, athlete_id: u64) -> Result<Option<AccessFacet>, AppError>;

    async fn put_access(&self, facet: &AccessFacet) -> Result<(), AppError>;

    async fn get_refresh(&self, athlete_id: u64) -> Result<Option<RefreshFacet>, AppError>;

    async fn put_refresh(&self, facet: &RefreshFacet) -> Result<(), AppError>;
}
