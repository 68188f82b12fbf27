//! Participant-id to address storage owner.

use crate::address::Address;
use crate::expiry::ExpiryDate;
use crate::observability::events;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, warn};

const COMPONENT: &str = "routing_table";

/// How a next hop is inserted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RoutingEntryOptions {
    pub is_globally_visible: bool,
    /// Pinned entries are only replaced by another pinned entry and are never purged.
    pub is_sticky: bool,
    pub expiry: ExpiryDate,
}

impl Default for RoutingEntryOptions {
    fn default() -> Self {
        Self {
            is_globally_visible: false,
            is_sticky: false,
            expiry: ExpiryDate::Never,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RoutingEntry {
    pub address: Address,
    pub is_globally_visible: bool,
    pub is_sticky: bool,
    pub expiry: ExpiryDate,
}

/// Concurrent routing table; at most one address per participant id.
#[derive(Default)]
pub struct RoutingTable {
    entries: DashMap<String, RoutingEntry>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the entry for `participant_id`.
    ///
    /// Returns `false` when a non-sticky update hits a sticky entry and is ignored.
    pub fn put(&self, participant_id: &str, address: Address, options: RoutingEntryOptions) -> bool {
        let next = RoutingEntry {
            address,
            is_globally_visible: options.is_globally_visible,
            is_sticky: options.is_sticky,
            expiry: options.expiry,
        };

        match self.entries.entry(participant_id.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_sticky && !next.is_sticky {
                    warn!(
                        event = events::ROUTING_ENTRY_UPDATE_REJECTED,
                        component = COMPONENT,
                        participant_id,
                        current_address = %occupied.get().address,
                        rejected_address = %next.address,
                        "refusing to replace sticky routing entry"
                    );
                    return false;
                }
                debug!(
                    event = events::ROUTING_ENTRY_ADD,
                    component = COMPONENT,
                    participant_id,
                    address = %next.address,
                    previous_address = %occupied.get().address,
                    is_sticky = next.is_sticky,
                    "replaced routing entry"
                );
                occupied.insert(next);
            }
            Entry::Vacant(vacant) => {
                debug!(
                    event = events::ROUTING_ENTRY_ADD,
                    component = COMPONENT,
                    participant_id,
                    address = %next.address,
                    is_sticky = next.is_sticky,
                    "added routing entry"
                );
                vacant.insert(next);
            }
        }
        true
    }

    pub fn remove(&self, participant_id: &str) -> Option<RoutingEntry> {
        let removed = self.entries.remove(participant_id).map(|(_, entry)| entry);
        if let Some(entry) = &removed {
            debug!(
                event = events::ROUTING_ENTRY_REMOVE,
                component = COMPONENT,
                participant_id,
                address = %entry.address,
                "removed routing entry"
            );
        }
        removed
    }

    pub fn lookup(&self, participant_id: &str) -> Option<Address> {
        self.entries
            .get(participant_id)
            .map(|entry| entry.address.clone())
    }

    pub fn get(&self, participant_id: &str) -> Option<RoutingEntry> {
        self.entries.get(participant_id).map(|entry| entry.clone())
    }

    pub fn contains(&self, participant_id: &str) -> bool {
        self.entries.contains_key(participant_id)
    }

    /// Drops non-sticky entries whose expiry is reached at `now_millis`.
    pub fn purge_expired(&self, now_millis: u64) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.is_sticky || !entry.expiry.is_expired_at(now_millis));
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            debug!(
                event = events::ROUTING_TABLE_PURGE,
                component = COMPONENT,
                purged,
                "purged expired routing entries"
            );
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{RoutingEntryOptions, RoutingTable};
    use crate::address::Address;
    use crate::expiry::ExpiryDate;

    fn sticky() -> RoutingEntryOptions {
        RoutingEntryOptions {
            is_sticky: true,
            ..RoutingEntryOptions::default()
        }
    }

    #[test]
    fn last_write_wins_for_plain_entries() {
        let table = RoutingTable::new();

        assert!(table.put("p1", Address::in_process("a"), RoutingEntryOptions::default()));
        assert!(table.put("p1", Address::in_process("b"), RoutingEntryOptions::default()));

        assert_eq!(table.lookup("p1"), Some(Address::in_process("b")));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn sticky_entry_survives_plain_update() {
        let table = RoutingTable::new();
        table.put("p1", Address::in_process("pinned"), sticky());

        assert!(!table.put("p1", Address::in_process("other"), RoutingEntryOptions::default()));
        assert_eq!(table.lookup("p1"), Some(Address::in_process("pinned")));

        assert!(table.put("p1", Address::in_process("repinned"), sticky()));
        assert_eq!(table.lookup("p1"), Some(Address::in_process("repinned")));
    }

    #[test]
    fn remove_is_a_no_op_for_unknown_ids() {
        let table = RoutingTable::new();
        table.put("p1", Address::in_process("a"), RoutingEntryOptions::default());

        assert!(table.remove("p1").is_some());
        assert!(table.remove("p1").is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn purge_keeps_sticky_and_unexpired_entries() {
        let table = RoutingTable::new();
        let expired = RoutingEntryOptions {
            expiry: ExpiryDate::at_millis(1_000),
            ..RoutingEntryOptions::default()
        };
        let expired_sticky = RoutingEntryOptions {
            is_sticky: true,
            expiry: ExpiryDate::at_millis(1_000),
            ..RoutingEntryOptions::default()
        };
        table.put("old", Address::in_process("old"), expired);
        table.put("pinned", Address::in_process("pinned"), expired_sticky);
        table.put("fresh", Address::in_process("fresh"), RoutingEntryOptions::default());

        assert_eq!(table.purge_expired(2_000), 1);
        assert!(!table.contains("old"));
        assert!(table.contains("pinned"));
        assert!(table.contains("fresh"));
    }
}
