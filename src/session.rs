//! Session-scoped store bridging the upload, dashboard and simulation pages.
//!
//! Keys and value encodings are shared with the browser pages and must not
//! change: every value is JSON text.

use crate::cache_validator::ValidatedCacheEntry;
use crate::errors::AppError;
use crate::models::{RawStatistics, ScoringSnapshot};
use crate::normalizer::Normalized;
use moka::future::Cache;
use serde::{de::DeserializeOwned, Serialize};

pub const SCORING_RESULT_KEY: &str = "scoringResult";
pub const INITIAL_STATISTICS_KEY: &str = "initialStatistics";
pub const COMPANY_NAME_KEY: &str = "companyName";

/// Everything a page needs after a successful upload.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionData {
    pub snapshot: ScoringSnapshot,
    pub statistics: RawStatistics,
    pub company_name: String,
}

/// Key/value session store. Entries never expire; they live until they are
/// overwritten by the next upload or the session is cleared.
#[derive(Clone)]
pub struct SessionCache {
    entries: Cache<String, String>,
}

impl SessionCache {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            entries: Cache::builder().max_capacity(max_capacity).build(),
        }
    }

    /// Overwrites `key` unconditionally.
    pub async fn set(&self, key: &str, value: String) -> Result<(), AppError> {
        let envelope = ValidatedCacheEntry::new(value).serialize().map_err(|e| {
            AppError::InternalError(format!("Failed to encode session entry: {}", e))
        })?;
        self.entries.insert(key.to_string(), envelope).await;
        Ok(())
    }

    /// Returns the stored text, or `None` when absent or corrupt.
    pub async fn get(&self, key: &str) -> Option<String> {
        let raw = self.entries.get(key).await?;
        ValidatedCacheEntry::deserialize_and_validate(&raw)
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), AppError> {
        let text = serde_json::to_string(value).map_err(|e| {
            AppError::InternalError(format!("Failed to serialize '{}': {}", key, e))
        })?;
        self.set(key, text).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let text = self.get(key).await?;
        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Session entry '{}' could not be decoded: {}", key, e);
                None
            }
        }
    }

    /// Persists the outcome of an upload. All three values are encoded before
    /// the first write so a serialization error leaves the session untouched.
    pub async fn store_result(
        &self,
        company_name: &str,
        normalized: &Normalized,
    ) -> Result<(), AppError> {
        let snapshot = serde_json::to_string(&normalized.snapshot)
            .map_err(|e| AppError::InternalError(format!("Failed to serialize snapshot: {}", e)))?;
        let statistics = serde_json::to_string(&normalized.statistics).map_err(|e| {
            AppError::InternalError(format!("Failed to serialize statistics: {}", e))
        })?;
        let company = serde_json::to_string(company_name).map_err(|e| {
            AppError::InternalError(format!("Failed to serialize company name: {}", e))
        })?;

        self.set(SCORING_RESULT_KEY, snapshot).await?;
        self.set(INITIAL_STATISTICS_KEY, statistics).await?;
        self.set(COMPANY_NAME_KEY, company).await?;

        tracing::info!("Stored scoring result for '{}' in session", company_name);
        Ok(())
    }

    pub async fn snapshot(&self) -> Option<ScoringSnapshot> {
        self.get_json(SCORING_RESULT_KEY).await
    }

    pub async fn initial_statistics(&self) -> Option<RawStatistics> {
        self.get_json(INITIAL_STATISTICS_KEY).await
    }

    pub async fn company_name(&self) -> Option<String> {
        self.get_json(COMPANY_NAME_KEY).await
    }

    /// All session values, or `None` if any of them is missing.
    pub async fn load(&self) -> Option<SessionData> {
        Some(SessionData {
            snapshot: self.snapshot().await?,
            statistics: self.initial_statistics().await?,
            company_name: self.company_name().await?,
        })
    }

    /// Ends the session.
    pub fn clear(&self) {
        self.entries.invalidate_all();
    }
}
