//! Ring membership, routing and key ownership for a single node.
//!
//! A [RingNode] owns one identifier, a predecessor pointer, a finger table
//! and a local key store. It joins a ring through one introducer, answers
//! lookups hop by hop through its fingers, and hands keys over when a new
//! node takes ownership of part of its interval.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use num_bigint::BigUint;
use serde::Deserialize;
use serde::Serialize;

use crate::consts::MAX_LOOKUP_HOPS;
use crate::consts::RING_BITS;
use crate::dht::finger::FingerTable;
use crate::dht::range::RingRange;
use crate::dht::Did;
use crate::error::Error;
use crate::error::Result;
use crate::rpc::AddressBook;
use crate::rpc::NodeRef;
use crate::rpc::RingClient;
use crate::storage::MemKeyStore;

/// Snapshot of a node's ring neighborhood, for logs and inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub did: Did,
    pub predecessor: Option<Did>,
    pub successor: Did,
    pub keys: usize,
    pub member: bool,
}

/// A Chord node.
///
/// All state that routing reads and the join protocol writes sits behind
/// per-field locks. No lock is ever held across a remote call, so an
/// in-flight lookup never blocks unrelated requests.
pub struct RingNode {
    me: NodeRef,
    finger: Mutex<FingerTable>,
    predecessor: Mutex<Option<Did>>,
    store: MemKeyStore,
    registry: Arc<AddressBook>,
    client: RingClient,
    member: AtomicBool,
}

impl RingNode {
    /// Build an unjoined node with the given ring position and listening
    /// address. The address registry is the node's only way to turn an
    /// identifier back into a peer it can dial.
    pub fn new(me: NodeRef, registry: Arc<AddressBook>) -> Self {
        registry.register(&me);
        Self {
            finger: Mutex::new(FingerTable::new(me.did)),
            predecessor: Mutex::new(None),
            store: MemKeyStore::new(),
            client: RingClient::new(registry.clone()),
            registry,
            me,
            member: AtomicBool::new(false),
        }
    }

    pub fn did(&self) -> Did {
        self.me.did
    }

    pub fn node_ref(&self) -> NodeRef {
        self.me
    }

    pub fn info(&self) -> Result<NodeInfo> {
        Ok(NodeInfo {
            did: self.me.did,
            predecessor: *self.lock_predecessor()?,
            successor: self.lock_finger()?.successor(),
            keys: self.store.len()?,
            member: self.member.load(Ordering::Acquire),
        })
    }

    /// Identifiers of the keys stored locally.
    pub fn local_keys(&self) -> Result<Vec<Did>> {
        self.store.keys()
    }

    fn lock_finger(&self) -> Result<MutexGuard<FingerTable>> {
        self.finger.lock().map_err(|_| Error::SyncLock)
    }

    fn lock_predecessor(&self) -> Result<MutexGuard<Option<Did>>> {
        self.predecessor.lock().map_err(|_| Error::SyncLock)
    }

    fn resolve(&self, did: Did) -> Result<NodeRef> {
        if did == self.me.did {
            return Ok(self.me);
        }
        self.registry.node_ref(did)
    }

    // -- ring pointers --------------------------------------------------

    pub fn successor(&self) -> Result<NodeRef> {
        let did = self.lock_finger()?.successor();
        self.resolve(did)
    }

    pub fn set_successor(&self, node: NodeRef) -> Result<()> {
        self.registry.register(&node);
        self.lock_finger()?.set_successor(node.did);
        Ok(())
    }

    pub fn predecessor(&self) -> Result<Option<NodeRef>> {
        let pred = *self.lock_predecessor()?;
        pred.map(|did| self.resolve(did)).transpose()
    }

    pub fn set_predecessor(&self, node: NodeRef) -> Result<()> {
        self.registry.register(&node);
        *self.lock_predecessor()? = Some(node.did);
        Ok(())
    }

    // -- lookup ---------------------------------------------------------

    /// The highest local finger strictly between this node and `id`.
    pub fn closest_preceding_finger(&self, id: Did) -> Result<NodeRef> {
        let did = self.lock_finger()?.closest_preceding(id);
        self.resolve(did)
    }

    /// The node owning `id`: `successor(find_predecessor(id))`.
    pub fn find_successor(&self, id: Did) -> Result<NodeRef> {
        let pred = self.find_predecessor(id)?;
        self.successor_of(&pred)
    }

    /// Walk the ring towards `id` until reaching the node whose successor
    /// interval covers it. Every hop past the first is a remote call; the
    /// hop ceiling turns a malformed ring into a lookup failure instead of
    /// an endless walk.
    pub fn find_predecessor(&self, id: Did) -> Result<NodeRef> {
        let mut current = self.me;
        for _ in 0..MAX_LOOKUP_HOPS {
            let successor = self.successor_of(&current)?;
            if RingRange::open_closed(current.did, successor.did).contains(id) {
                return Ok(current);
            }
            let next = self.closest_preceding_of(&current, id)?;
            if next.did == current.did {
                // No finger makes progress; the ring is stale.
                return Err(Error::LookupExhausted(id));
            }
            current = next;
        }
        Err(Error::LookupExhausted(id))
    }

    fn successor_of(&self, n: &NodeRef) -> Result<NodeRef> {
        if n.did == self.me.did {
            self.successor()
        } else {
            self.client.successor(n)
        }
    }

    fn closest_preceding_of(&self, n: &NodeRef, id: Did) -> Result<NodeRef> {
        if n.did == self.me.did {
            self.closest_preceding_finger(id)
        } else {
            self.client.closest_preceding_finger(n, id)
        }
    }

    // -- join -----------------------------------------------------------

    /// Form a new ring, or join an existing one through `introducer`.
    /// A node goes through this exactly once.
    pub fn join(&self, introducer: Option<NodeRef>) -> Result<()> {
        match introducer {
            None => self.form_ring()?,
            Some(peer) => self.join_via(peer)?,
        }
        self.member.store(true, Ordering::Release);
        Ok(())
    }

    fn form_ring(&self) -> Result<()> {
        // A fresh finger table already points every entry home.
        *self.lock_predecessor()? = Some(self.me.did);
        tracing::info!("{} starts a new ring", self.me.did);
        Ok(())
    }

    fn join_via(&self, introducer: NodeRef) -> Result<()> {
        self.registry.register(&introducer);
        tracing::info!("{} joining the ring via {}", self.me.did, introducer);

        // Without a successor there is no ring to be part of; everything
        // after this step degrades gracefully instead.
        self.init_finger_table(&introducer)?;

        if let Err(e) = self.update_others() {
            tracing::warn!("{}: finger propagation incomplete: {}", self.me.did, e);
        }

        match self.successor() {
            Ok(succ) if succ.did != self.me.did => {
                if let Err(e) = self.client.update_keys(&succ) {
                    tracing::warn!(
                        "{}: key migration request to {} failed: {}",
                        self.me.did,
                        succ.did,
                        e
                    );
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("{}: no successor after join: {}", self.me.did, e),
        }
        Ok(())
    }

    /// Resolve the finger table against the ring, entry by entry, and
    /// splice this node in front of its new successor.
    fn init_finger_table(&self, introducer: &NodeRef) -> Result<()> {
        let first_start = self.finger_start(0)?;
        let successor = self.client.find_successor(introducer, first_start)?;
        if successor.did == self.me.did && successor.addr != self.me.addr {
            // Another node already sits on this identifier. Nothing here
            // resolves that; report it and refuse to splice.
            return Err(Error::IdCollision(self.me.did));
        }
        self.set_successor(successor)?;
        tracing::debug!("{}: successor is {}", self.me.did, successor);

        // Adopt the successor's predecessor as our own, then take its place.
        match self.client.get_predecessor(&successor) {
            Ok(Some(pred)) => {
                self.registry.register(&pred);
                *self.lock_predecessor()? = Some(pred.did);
            }
            Ok(None) => {
                tracing::debug!("{}: successor {} has no predecessor", self.me.did, successor)
            }
            Err(e) => tracing::warn!(
                "{}: reading predecessor of {} failed: {}",
                self.me.did,
                successor.did,
                e
            ),
        }
        if let Err(e) = self.client.set_predecessor(&successor, self.me) {
            tracing::warn!(
                "{}: announcing to successor {} failed: {}",
                self.me.did,
                successor.did,
                e
            );
        }

        // Each further entry reuses the previous owner when its stretch
        // already covers the next start; only the rest cost a lookup.
        for k in 0..RING_BITS - 1 {
            let (next_start, prev_node) = {
                let finger = self.lock_finger()?;
                let next_start = match finger.get(k + 1) {
                    Some(entry) => entry.start(),
                    None => break,
                };
                (next_start, finger.get(k).map(|e| e.node()).unwrap_or(self.me.did))
            };
            if RingRange::new(self.me.did, prev_node).contains(next_start) {
                self.lock_finger()?.set(k + 1, prev_node);
                continue;
            }
            match self.client.find_successor(introducer, next_start) {
                Ok(owner) => self.lock_finger()?.set(k + 1, owner.did),
                Err(e) => {
                    tracing::warn!(
                        "{}: resolving finger {} failed: {}",
                        self.me.did,
                        k + 1,
                        e
                    );
                }
            }
        }
        Ok(())
    }

    fn finger_start(&self, index: usize) -> Result<Did> {
        self.lock_finger()?
            .get(index)
            .map(|entry| entry.start())
            .ok_or(Error::FingerIndex(index))
    }

    /// Tell every node whose finger could now point here to reconsider.
    /// Each failed notification is logged and skipped; the ring heals the
    /// rest of the way on later joins.
    fn update_others(&self) -> Result<()> {
        for k in 0..RING_BITS {
            let target = self.me.did - Did::from(BigUint::from(2u16).pow(k as u32));
            let pred = match self.find_predecessor(target) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(
                        "{}: locating finger-{} holder near {} failed: {}",
                        self.me.did,
                        k,
                        target,
                        e
                    );
                    continue;
                }
            };
            if pred.did == self.me.did {
                continue;
            }
            if let Err(e) = self.client.update_finger_table(&pred, self.me, k) {
                tracing::warn!(
                    "{}: finger update to {} failed: {}",
                    self.me.did,
                    pred.did,
                    e
                );
            }
        }
        Ok(())
    }

    /// Adopt `candidate` for finger `index` when it improves the entry,
    /// then pass the update backward along the predecessor chain while it
    /// keeps improving entries. Propagation stops once an entry no longer
    /// improves, or after one full lap.
    pub fn update_finger_table(&self, candidate: NodeRef, index: usize) -> Result<()> {
        if candidate.did == self.me.did {
            return Ok(());
        }
        self.registry.register(&candidate);

        let improved = self.lock_finger()?.update(index, candidate.did);
        if !improved {
            return Ok(());
        }
        tracing::debug!(
            "{}: finger {} now points at {}",
            self.me.did,
            index,
            candidate.did
        );

        let pred = *self.lock_predecessor()?;
        if let Some(pred) = pred {
            if pred != self.me.did && pred != candidate.did {
                let peer = self.resolve(pred)?;
                if let Err(e) = self.client.update_finger_table(&peer, candidate, index) {
                    tracing::warn!(
                        "{}: forwarding finger update to {} failed: {}",
                        self.me.did,
                        pred,
                        e
                    );
                }
            }
        }
        Ok(())
    }

    // -- keys -----------------------------------------------------------

    /// Ownership test: keys in `(predecessor, self]` live here. A node
    /// that has not learned a predecessor yet cannot disclaim anything.
    pub fn owns(&self, key: Did) -> Result<bool> {
        let pred = *self.lock_predecessor()?;
        Ok(match pred {
            Some(p) => RingRange::open_closed(p, self.me.did).contains(key),
            None => true,
        })
    }

    /// Store a key here or hand it to its owner.
    pub fn add_key(&self, key: Did, value: Vec<u8>) -> Result<()> {
        if self.owns(key)? {
            tracing::debug!("{}: storing key {}", self.me.did, key);
            return self.store.insert(key, value);
        }
        let owner = self.find_successor(key)?;
        if owner.did == self.me.did {
            // Routing disagrees with the predecessor pointer; keep the key
            // rather than bounce it back to ourselves.
            return self.store.insert(key, value);
        }
        tracing::debug!("{}: forwarding key {} to {}", self.me.did, key, owner.did);
        self.client.add_key(&owner, key, value)
    }

    /// Fetch a key from here or from its owner. Absence at the owning node
    /// is a plain not-found, not an error.
    pub fn get_data(&self, key: Did) -> Result<Option<Vec<u8>>> {
        if self.owns(key)? {
            return self.store.get(&key);
        }
        let owner = self.find_successor(key)?;
        if owner.did == self.me.did {
            return self.store.get(&key);
        }
        self.client.get_data(&owner, key)
    }

    /// Re-home every key that no longer falls in `(predecessor, self]`.
    /// Invoked by a freshly joined predecessor; this is what restores the
    /// ownership invariant after a join.
    pub fn update_keys(&self) -> Result<()> {
        let owned = {
            let pred = *self.lock_predecessor()?;
            match pred {
                Some(p) => RingRange::open_closed(p, self.me.did),
                None => return Ok(()),
            }
        };
        let outgoing = self.store.evict_outside(&owned)?;
        for (key, value) in outgoing {
            match self.find_successor(key) {
                Ok(owner) if owner.did != self.me.did => {
                    tracing::debug!("{}: migrating key {} to {}", self.me.did, key, owner.did);
                    if let Err(e) = self.client.add_key(&owner, key, value.clone()) {
                        tracing::warn!(
                            "{}: migrating key {} to {} failed: {}",
                            self.me.did,
                            key,
                            owner.did,
                            e
                        );
                        self.store.insert(key, value)?;
                    }
                }
                Ok(_) => self.store.insert(key, value)?,
                Err(e) => {
                    tracing::warn!("{}: no owner found for key {}: {}", self.me.did, key, e);
                    self.store.insert(key, value)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lone_node(position: u32) -> RingNode {
        let me = NodeRef {
            did: Did::from(position),
            addr: "127.0.0.1:4170".parse().unwrap(),
        };
        let node = RingNode::new(me, Arc::new(AddressBook::new()));
        node.join(None).unwrap();
        node
    }

    #[test]
    fn test_singleton_ring_shape() {
        let node = lone_node(10);
        let info = node.info().unwrap();
        assert_eq!(info.successor, Did::from(10u32));
        assert_eq!(info.predecessor, Some(Did::from(10u32)));
        assert!(info.member);
        assert_eq!(info.keys, 0);
    }

    #[test]
    fn test_singleton_owns_everything() {
        let node = lone_node(10);
        assert!(node.owns(Did::from(10u32)).unwrap());
        assert!(node.owns(Did::from(11u32)).unwrap());
        assert!(node.owns(Did::ZERO).unwrap());
    }

    #[test]
    fn test_singleton_lookup_resolves_locally() {
        let node = lone_node(10);
        for target in [0u32, 9, 10, 11, 255] {
            let found = node.find_successor(Did::from(target)).unwrap();
            assert_eq!(found.did, Did::from(10u32));
        }
        let hop = node.closest_preceding_finger(Did::from(77u32)).unwrap();
        assert_eq!(hop.did, Did::from(10u32));
    }

    #[test]
    fn test_singleton_keys_round_trip() {
        let node = lone_node(10);
        let key = Did::hash("player-1985");
        node.add_key(key, b"row".to_vec()).unwrap();
        assert_eq!(node.get_data(key).unwrap(), Some(b"row".to_vec()));
        assert_eq!(node.get_data(Did::hash("absent")).unwrap(), None);
    }

    #[test]
    fn test_update_finger_table_local() {
        let node = lone_node(10);
        let candidate = NodeRef {
            did: Did::from(200u32),
            addr: "127.0.0.1:4171".parse().unwrap(),
        };

        // Entry 0 covers [11, 10) while pointing home, so 200 improves it.
        // The predecessor is the node itself, so nothing is forwarded.
        node.update_finger_table(candidate, 0).unwrap();
        assert_eq!(node.info().unwrap().successor, Did::from(200u32));

        // Offering the node its own identifier is a no-op.
        node.update_finger_table(node.node_ref(), 1).unwrap();
        let finger = node.lock_finger().unwrap();
        assert_eq!(finger.get(1).unwrap().node(), Did::from(10u32));
    }
}
