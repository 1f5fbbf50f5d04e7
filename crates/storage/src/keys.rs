//! Key-namespace builders. Every stored record lives under one of these
//! prefixes; prefixes are distinct so no key collides across namespaces.

/// Active challenge for a correspondent.
#[must_use]
pub fn challenge(correspondent: i64) -> String {
    format!("challenge:{correspondent}")
}

/// Verified-correspondent record.
#[must_use]
pub fn correspondent(correspondent: i64) -> String {
    format!("correspondent:{correspondent}")
}

/// Blacklist entry.
#[must_use]
pub fn blacklist(correspondent: i64) -> String {
    format!("blacklist:{correspondent}")
}

/// Reverse binding from a staff thread to its correspondent.
#[must_use]
pub fn thread(thread_id: i64) -> String {
    format!("thread:{thread_id}")
}

/// Per-correspondent message-id mapping table.
#[must_use]
pub fn mapping(correspondent: i64) -> String {
    format!("mapping:{correspondent}")
}

/// Singleton key holding the audit thread id.
pub const AUDIT_THREAD: &str = "audit-thread";
