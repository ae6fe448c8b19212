//! Finger table, the logarithmic routing table of a node.

use crate::consts::RING_BITS;
use crate::dht::range::RingRange;
use crate::dht::Did;

/// One row of the routing table.
///
/// Entry `k` of node `n` covers the stretch starting at `n + 2^k` and
/// records the node currently believed to own that start.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FingerEntry {
    start: Did,
    interval: RingRange,
    node: Did,
}

impl FingerEntry {
    pub fn start(&self) -> Did {
        self.start
    }

    /// `[start, next_start)`, the stretch this entry is the shortcut for.
    pub fn interval(&self) -> &RingRange {
        &self.interval
    }

    /// Owner of `start` as currently believed.
    pub fn node(&self) -> Did {
        self.node
    }
}

/// Routing table of one node: [RING_BITS] entries at exponentially spaced
/// ring positions. Entry 0's node is by definition the node's successor.
/// A fresh table points every entry at the owner, which is the correct
/// shape for a singleton ring.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FingerTable {
    owner: Did,
    entries: Vec<FingerEntry>,
}

impl FingerTable {
    pub fn new(owner: Did) -> Self {
        let entries = (0..RING_BITS)
            .map(|k| {
                let start = owner.offset(k);
                let next_start = if k + 1 < RING_BITS {
                    owner.offset(k + 1)
                } else {
                    owner
                };
                FingerEntry {
                    start,
                    interval: RingRange::new(start, next_start),
                    node: owner,
                }
            })
            .collect();
        Self { owner, entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn owner(&self) -> Did {
        self.owner
    }

    pub fn get(&self, index: usize) -> Option<&FingerEntry> {
        self.entries.get(index)
    }

    pub fn list(&self) -> &[FingerEntry] {
        &self.entries
    }

    /// The immediate successor on the ring.
    pub fn successor(&self) -> Did {
        self.entries[0].node
    }

    pub fn set_successor(&mut self, did: Did) {
        self.set(0, did);
    }

    /// Point entry `index` at `did`.
    pub fn set(&mut self, index: usize, did: Did) {
        tracing::debug!("{}: set finger {} to {}", self.owner, index, did);
        match self.entries.get_mut(index) {
            Some(entry) => entry.node = did,
            None => tracing::warn!("{}: finger index {} out of range", self.owner, index),
        }
    }

    /// Adopt `candidate` for entry `index` when it falls inside
    /// `[start, node)` of that entry. Returns whether the entry changed.
    pub fn update(&mut self, index: usize, candidate: Did) -> bool {
        let Some(entry) = self.entries.get_mut(index) else {
            tracing::warn!("{}: finger index {} out of range", self.owner, index);
            return false;
        };
        if candidate == entry.node {
            return false;
        }
        if !RingRange::new(entry.start, entry.node).contains(candidate) {
            return false;
        }
        entry.node = candidate;
        true
    }

    /// The local routing decision: the highest finger whose node lies
    /// strictly between the owner and `id`, or the owner itself when no
    /// finger qualifies. Never blocks and performs no remote calls.
    pub fn closest_preceding(&self, id: Did) -> Did {
        let between = RingRange::open_open(self.owner, id);
        for entry in self.entries.iter().rev() {
            if between.contains(entry.node) {
                return entry.node;
            }
        }
        self.owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn did(n: u32) -> Did {
        Did::from(n)
    }

    #[test]
    fn test_entry_layout() {
        let table = FingerTable::new(did(10));
        assert_eq!(table.len(), RING_BITS);

        let first = table.get(0).unwrap();
        assert_eq!(first.start(), did(11));
        assert_eq!(first.interval(), &RingRange::new(did(11), did(12)));

        let third = table.get(2).unwrap();
        assert_eq!(third.start(), did(14));
        assert_eq!(third.interval(), &RingRange::new(did(14), did(18)));

        // The last stretch runs from n + 2^159 back around to n.
        let last = table.get(RING_BITS - 1).unwrap();
        assert_eq!(last.start(), did(10).offset(RING_BITS - 1));
        assert_eq!(last.interval().stop(), did(10));

        // A fresh table is a singleton ring: everything points home.
        assert!(table.list().iter().all(|e| e.node() == did(10)));
        assert_eq!(table.successor(), did(10));
    }

    #[test]
    fn test_closest_preceding_singleton() {
        let table = FingerTable::new(did(10));
        assert_eq!(table.closest_preceding(did(50)), did(10));
        assert_eq!(table.closest_preceding(did(9)), did(10));
    }

    #[test]
    fn test_closest_preceding_scan() {
        let mut table = FingerTable::new(did(10));
        // Entries 0..=7 cover starts 11..=138; point them all at 200.
        for k in 0..8 {
            table.set(k, did(200));
        }

        // Targets beyond 200 route through it; targets before it do not.
        assert_eq!(table.closest_preceding(did(201)), did(200));
        assert_eq!(table.closest_preceding(did(9)), did(200));
        assert_eq!(table.closest_preceding(did(150)), did(10));

        // The result always lies strictly between owner and target.
        for target in [did(201), did(9), did(150), did(300)] {
            let hop = table.closest_preceding(target);
            assert!(hop == did(10) || RingRange::open_open(did(10), target).contains(hop));
        }
    }

    #[test]
    fn test_update() {
        let mut table = FingerTable::new(did(10));

        // 200 falls in [11, 10) of entry 0, so it is adopted.
        assert!(table.update(0, did(200)));
        assert_eq!(table.successor(), did(200));

        // 100 improves on 200 for the same entry, 300 does not.
        assert!(table.update(0, did(100)));
        assert_eq!(table.successor(), did(100));
        assert!(!table.update(0, did(300)));
        assert_eq!(table.successor(), did(100));

        // Re-offering the current owner changes nothing.
        assert!(!table.update(0, did(100)));

        // Out-of-range indexes are ignored.
        assert!(!table.update(RING_BITS, did(5)));
    }
}
