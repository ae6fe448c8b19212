//! Naming: node references and the identifier → address registry.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::RwLock;

use serde::Deserialize;
use serde::Serialize;

use crate::dht::Did;
use crate::error::Error;
use crate::error::Result;

/// A node as named on the wire: ring identifier plus listening address.
/// Replies that name a node always carry both, so whoever decodes one can
/// dial the node without any out-of-band discovery.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRef {
    pub did: Did,
    pub addr: SocketAddr,
}

impl NodeRef {
    /// The canonical self-naming: the identifier is the hash of the
    /// listening address.
    pub fn from_addr(addr: SocketAddr) -> Self {
        Self {
            did: Did::hash(addr.to_string()),
            addr,
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}@{}", self.did, self.addr)
    }
}

/// Explicit address book handed to each node. Populated passively from
/// every [NodeRef] seen on the wire; there is no scanning and no global
/// cache behind it.
#[derive(Debug, Default)]
pub struct AddressBook {
    entries: RwLock<HashMap<Did, SocketAddr>>,
}

impl AddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember where a node listens. Last write wins.
    pub fn register(&self, node: &NodeRef) {
        match self.entries.write() {
            Ok(mut entries) => {
                entries.insert(node.did, node.addr);
            }
            Err(_) => tracing::error!("address book lock poisoned, dropping {}", node),
        }
    }

    pub fn resolve(&self, did: Did) -> Result<Option<SocketAddr>> {
        Ok(self
            .entries
            .read()
            .map_err(|_| Error::SyncLock)?
            .get(&did)
            .copied())
    }

    /// Resolve to a dialable reference, failing on unknown identifiers.
    pub fn node_ref(&self, did: Did) -> Result<NodeRef> {
        self.resolve(did)?
            .map(|addr| NodeRef { did, addr })
            .ok_or(Error::UnknownPeer(did))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.entries.read().map_err(|_| Error::SyncLock)?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_resolve() {
        let book = AddressBook::new();
        assert!(book.is_empty().unwrap());

        let node = NodeRef::from_addr("127.0.0.1:4170".parse().unwrap());
        book.register(&node);
        assert_eq!(book.resolve(node.did).unwrap(), Some(node.addr));
        assert_eq!(book.node_ref(node.did).unwrap(), node);

        // Unknown identifiers surface as errors when a dialable ref is needed.
        let stranger = Did::hash("nobody");
        assert_eq!(book.resolve(stranger).unwrap(), None);
        assert!(matches!(
            book.node_ref(stranger),
            Err(Error::UnknownPeer(did)) if did == stranger
        ));
    }

    #[test]
    fn test_identifier_follows_address() {
        let addr: SocketAddr = "127.0.0.1:4170".parse().unwrap();
        let a = NodeRef::from_addr(addr);
        let b = NodeRef::from_addr(addr);
        assert_eq!(a, b);
        assert_eq!(a.did, Did::hash("127.0.0.1:4170"));
    }
}
