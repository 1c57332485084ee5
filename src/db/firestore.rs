// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed token operations.
//!
//! Access and refresh facets live in separate collections, one document per
//! athlete.

use crate::db::{collections, CredentialStore};
use crate::error::AppError;
use crate::models::{AccessFacet, RefreshFacet};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id).await.map_err(|e| {
            AppError::Persistence(format!("Failed to connect to Firestore: {}", e))
        })?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Persistence(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client.as_ref().ok_or_else(|| {
            AppError::Persistence("Database not connected (offline mode)".to_string())
        })
    }

    async fn get_doc<T>(&self, collection: &str, athlete_id: u64) -> Result<Option<T>, AppError>
    where
        T: DeserializeOwned + Send,
    {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(&athlete_id.to_string())
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))
    }

    async fn put_doc<T>(&self, collection: &str, athlete_id: u64, doc: &T) -> Result<(), AppError>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
    {
        let _: T = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collection)
            .document_id(athlete_id.to_string())
            .object(doc)
            .execute()
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FirestoreDb {
    async fn get_access(&self, athlete_id: u64) -> Result<Option<AccessFacet>, AppError> {
        self.get_doc(collections::ACCESS_TOKENS, athlete_id).await
    }

    async fn put_access(&self, facet: &AccessFacet) -> Result<(), AppError> {
        self.put_doc(collections::ACCESS_TOKENS, facet.athlete_id, facet)
            .await
    }

    async fn get_refresh(&self, athlete_id: u64) -> Result<Option<RefreshFacet>, AppError> {
        self.get_doc(collections::REFRESH_TOKENS, athlete_id).await
    }

    async fn put_refresh(&self, facet: &RefreshFacet) -> Result<(), AppError> {
        self.put_doc(collections::REFRESH_TOKENS, facet.athlete_id, facet)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offline_store_reports_persistence_errors() {
        let db = FirestoreDb::new_mock();

        let err = db.get_access(1).await.unwrap_err();
        assert!(matches!(err, AppError::Persistence(_)));

        let err = db
            .put_refresh(&RefreshFacet {
                athlete_id: 1,
                refresh_token: "r".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Persistence(_)));
    }
}
