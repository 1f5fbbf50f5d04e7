//! Per-correspondent access classification and the blacklist/verified
//! mutual-exclusion writes.

use {doorman_common::time, tracing::info};

use crate::{
    error::Result,
    records::{BlacklistEntry, BlacklistRepo, CorrespondentRecord, CorrespondentRepo},
};

use doorman_common::types::Profile;

/// Classification of an inbound correspondent.
#[derive(Debug, Clone)]
pub enum AccessStatus {
    Blacklisted(BlacklistEntry),
    Unverified,
    Verified(CorrespondentRecord),
}

#[derive(Clone)]
pub struct AccessGate {
    correspondents: CorrespondentRepo,
    blacklist: BlacklistRepo,
}

impl AccessGate {
    #[must_use]
    pub fn new(correspondents: CorrespondentRepo, blacklist: BlacklistRepo) -> Self {
        Self {
            correspondents,
            blacklist,
        }
    }

    /// Read-only classification, checked before every inbound action.
    ///
    /// Blacklist presence always wins over a verified record: an operator
    /// may re-blacklist without first clearing prior verification.
    pub async fn authorize(&self, correspondent: i64) -> Result<AccessStatus> {
        if let Some(entry) = self.blacklist.get(correspondent).await? {
            return Ok(AccessStatus::Blacklisted(entry));
        }
        match self.correspondents.get(correspondent).await? {
            Some(record) if record.verified => Ok(AccessStatus::Verified(record)),
            _ => Ok(AccessStatus::Unverified),
        }
    }

    /// Mark a correspondent verified, deleting any blacklist entry first
    /// so the two records are never simultaneously present.
    pub async fn mark_verified(&self, correspondent: i64, profile: Profile) -> Result<()> {
        self.blacklist.delete(correspondent).await?;
        let record = CorrespondentRecord {
            verified: true,
            verified_at: time::now_ms(),
            thread_id: None,
            profile: Some(profile),
        };
        self.correspondents.put(correspondent, &record).await?;
        info!(correspondent, "correspondent verified");
        Ok(())
    }

    /// Blacklist a correspondent, deleting the verified record first.
    pub async fn blacklist(&self, correspondent: i64, entry: &BlacklistEntry) -> Result<()> {
        self.correspondents.delete(correspondent).await?;
        self.blacklist.put(correspondent, entry).await?;
        info!(correspondent, reason = %entry.reason, "correspondent blacklisted");
        Ok(())
    }

    /// Remove a blacklist entry; the correspondent starts over unverified.
    pub async fn lift_blacklist(&self, correspondent: i64) -> Result<bool> {
        let was_listed = self.blacklist.get(correspondent).await?.is_some();
        if was_listed {
            self.blacklist.delete(correspondent).await?;
            info!(correspondent, "blacklist lifted");
        }
        Ok(was_listed)
    }

    /// Persist a mutated record (e.g. a freshly bound thread id).
    pub async fn update_record(
        &self,
        correspondent: i64,
        record: &CorrespondentRecord,
    ) -> Result<()> {
        self.correspondents.put(correspondent, record).await
    }
}
