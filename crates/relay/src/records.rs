//! Stored records and the repository layer over the state store.

use std::{sync::Arc, time::Duration};

use {
    doorman_common::types::Profile,
    doorman_storage::{StateStore, keys},
    doorman_verification::Challenge,
    serde::{Deserialize, Serialize},
};

use crate::error::Result;

/// Store TTL for an active challenge; outlives the logical 3-minute expiry
/// so a late submission still gets a definite "expired" answer instead of
/// silently vanishing.
pub const CHALLENGE_STORE_TTL: Duration = Duration::from_secs(600);

/// Mapping tables for idle correspondents fall out of the store after this
/// retention window.
pub const MAPPING_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrespondentRecord {
    pub verified: bool,
    pub verified_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<i64>,
    /// Absent on degraded legacy records; a missing profile surfaces as
    /// `Error::MissingProfile` when a thread has to be created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub reason: String,
    pub blacklisted_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
}

macro_rules! json_repo_accessors {
    ($ty:ty, $key:path) => {
        pub async fn get(&self, correspondent: i64) -> Result<Option<$ty>> {
            match self.store.get(&$key(correspondent)).await? {
                Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
                None => Ok(None),
            }
        }

        pub async fn delete(&self, correspondent: i64) -> Result<()> {
            self.store.delete(&$key(correspondent)).await?;
            Ok(())
        }
    };
}

/// Active challenge per correspondent, stored with [`CHALLENGE_STORE_TTL`].
#[derive(Clone)]
pub struct ChallengeRepo {
    store: Arc<dyn StateStore>,
}

impl ChallengeRepo {
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    json_repo_accessors!(Challenge, keys::challenge);

    pub async fn put(&self, correspondent: i64, challenge: &Challenge) -> Result<()> {
        let raw = serde_json::to_string(challenge)?;
        self.store
            .put(&keys::challenge(correspondent), &raw, Some(CHALLENGE_STORE_TTL))
            .await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct CorrespondentRepo {
    store: Arc<dyn StateStore>,
}

impl CorrespondentRepo {
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    json_repo_accessors!(CorrespondentRecord, keys::correspondent);

    pub async fn put(&self, correspondent: i64, record: &CorrespondentRecord) -> Result<()> {
        let raw = serde_json::to_string(record)?;
        self.store
            .put(&keys::correspondent(correspondent), &raw, None)
            .await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct BlacklistRepo {
    store: Arc<dyn StateStore>,
}

impl BlacklistRepo {
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    json_repo_accessors!(BlacklistEntry, keys::blacklist);

    pub async fn put(&self, correspondent: i64, entry: &BlacklistEntry) -> Result<()> {
        let raw = serde_json::to_string(entry)?;
        self.store
            .put(&keys::blacklist(correspondent), &raw, None)
            .await?;
        Ok(())
    }
}

/// Per-correspondent mapping table, refreshed to a 7-day retention on
/// every save.
#[derive(Clone)]
pub struct MappingRepo {
    store: Arc<dyn StateStore>,
}

impl MappingRepo {
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    pub async fn load(&self, correspondent: i64) -> Result<crate::mapping::MappingTable> {
        match self.store.get(&keys::mapping(correspondent)).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(crate::mapping::MappingTable::default()),
        }
    }

    pub async fn save(
        &self,
        correspondent: i64,
        table: &crate::mapping::MappingTable,
    ) -> Result<()> {
        let raw = serde_json::to_string(table)?;
        self.store
            .put(&keys::mapping(correspondent), &raw, Some(MAPPING_RETENTION))
            .await?;
        Ok(())
    }
}

/// Thread bindings: thread → correspondent, plus the audit-thread singleton.
#[derive(Clone)]
pub struct TopicRepo {
    store: Arc<dyn StateStore>,
}

impl TopicRepo {
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    pub async fn bind(&self, thread_id: i64, correspondent: i64) -> Result<()> {
        self.store
            .put(&keys::thread(thread_id), &correspondent.to_string(), None)
            .await?;
        Ok(())
    }

    pub async fn resolve(&self, thread_id: i64) -> Result<Option<i64>> {
        Ok(self
            .store
            .get(&keys::thread(thread_id))
            .await?
            .and_then(|raw| raw.parse().ok()))
    }

    pub async fn unbind(&self, thread_id: i64) -> Result<()> {
        self.store.delete(&keys::thread(thread_id)).await?;
        Ok(())
    }

    pub async fn audit_thread(&self) -> Result<Option<i64>> {
        Ok(self
            .store
            .get(keys::AUDIT_THREAD)
            .await?
            .and_then(|raw| raw.parse().ok()))
    }

    pub async fn set_audit_thread(&self, thread_id: i64) -> Result<()> {
        self.store
            .put(keys::AUDIT_THREAD, &thread_id.to_string(), None)
            .await?;
        Ok(())
    }
}
