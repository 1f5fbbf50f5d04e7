//! Bidirectional message-id mapping table.
//!
//! Each relayed message stores two entries, one per side, so edits,
//! deletions, and replies can resolve their counterpart regardless of
//! which side they originate on. The table is bounded: past the cap the
//! oldest entries (by timestamp) are evicted, trading edit/delete/reply
//! resolution for very old exchanges against unbounded store growth.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Maximum mapped message pairs per correspondent (two raw entries each).
pub const PAIR_CAP: usize = 100;

const RAW_CAP: usize = PAIR_CAP * 2;

/// Which side of the relay a message id is local to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The correspondent's private chat.
    Correspondent,
    /// The shared staff chat (inside the correspondent's thread).
    Staff,
}

impl Side {
    fn prefix(self) -> &'static str {
        match self {
            Self::Correspondent => "u_",
            Self::Staff => "a_",
        }
    }

    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::Correspondent => Self::Staff,
            Self::Staff => Self::Correspondent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    /// Message id on the other side.
    pub counterpart: i64,
    /// Staff thread the pair was relayed through.
    pub thread: i64,
    /// Insertion timestamp (epoch ms); eviction order.
    pub ts: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingTable {
    messages: HashMap<String, MappingEntry>,
}

impl MappingTable {
    /// Record a relayed pair in both directions, evicting past the cap.
    pub fn insert_pair(&mut self, correspondent_msg: i64, staff_msg: i64, thread: i64, ts: i64) {
        self.messages
            .insert(format!("u_{correspondent_msg}"), MappingEntry {
                counterpart: staff_msg,
                thread,
                ts,
            });
        self.messages.insert(format!("a_{staff_msg}"), MappingEntry {
            counterpart: correspondent_msg,
            thread,
            ts,
        });
        self.evict_over_cap();
    }

    /// Look up the counterpart of a message local to `side`.
    #[must_use]
    pub fn counterpart(&self, side: Side, local: i64) -> Option<&MappingEntry> {
        self.messages.get(&format!("{}{local}", side.prefix()))
    }

    /// Remove both directions of a pair; returns the forward entry if the
    /// pair was present.
    pub fn remove_pair(&mut self, side: Side, local: i64) -> Option<MappingEntry> {
        let entry = self.messages.remove(&format!("{}{local}", side.prefix()))?;
        self.messages
            .remove(&format!("{}{}", side.other().prefix(), entry.counterpart));
        Some(entry)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn evict_over_cap(&mut self) {
        if self.messages.len() <= RAW_CAP {
            return;
        }
        let mut entries: Vec<(String, MappingEntry)> = self.messages.drain().collect();
        // Newest first; survivors are the most recently inserted.
        entries.sort_by(|a, b| b.1.ts.cmp(&a.1.ts));
        entries.truncate(RAW_CAP);
        self.messages = entries.into_iter().collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_resolves_from_both_sides() {
        let mut table = MappingTable::default();
        table.insert_pair(501, 900, 7, 1);
        assert_eq!(
            table.counterpart(Side::Correspondent, 501).unwrap().counterpart,
            900
        );
        assert_eq!(table.counterpart(Side::Staff, 900).unwrap().counterpart, 501);
        assert!(table.counterpart(Side::Correspondent, 900).is_none());
    }

    #[test]
    fn remove_pair_clears_both_directions() {
        let mut table = MappingTable::default();
        table.insert_pair(501, 900, 7, 1);
        let removed = table.remove_pair(Side::Staff, 900).unwrap();
        assert_eq!(removed.counterpart, 501);
        assert!(table.is_empty());
    }

    #[test]
    fn remove_missing_pair_is_none() {
        let mut table = MappingTable::default();
        assert!(table.remove_pair(Side::Correspondent, 1).is_none());
    }

    #[test]
    fn cap_keeps_most_recent_pairs() {
        let mut table = MappingTable::default();
        for i in 0..(PAIR_CAP as i64 + 20) {
            table.insert_pair(i, 10_000 + i, 7, i);
        }
        assert_eq!(table.len(), PAIR_CAP * 2);
        // The 20 oldest pairs were evicted.
        assert!(table.counterpart(Side::Correspondent, 0).is_none());
        assert!(table.counterpart(Side::Correspondent, 19).is_none());
        // The newest pairs survive, resolvable from both sides.
        let newest = PAIR_CAP as i64 + 19;
        assert_eq!(
            table.counterpart(Side::Correspondent, newest).unwrap().counterpart,
            10_000 + newest
        );
        assert_eq!(
            table.counterpart(Side::Staff, 10_000 + newest).unwrap().counterpart,
            newest
        );
        assert!(table.counterpart(Side::Correspondent, 20).is_some());
    }

    #[test]
    fn serde_roundtrip() {
        let mut table = MappingTable::default();
        table.insert_pair(501, 900, 7, 42);
        let json = serde_json::to_string(&table).unwrap();
        let back: MappingTable = serde_json::from_str(&json).unwrap();
        assert_eq!(
            back.counterpart(Side::Correspondent, 501).unwrap().thread,
            7
        );
    }
}
