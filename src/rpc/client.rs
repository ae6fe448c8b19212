//! Connection-per-call blocking client side of the ring protocol.

use std::net::TcpStream;
use std::sync::Arc;

use crate::consts::RPC_TIMEOUT;
use crate::dht::Did;
use crate::error::Error;
use crate::error::Result;
use crate::rpc::wire::read_frame;
use crate::rpc::wire::write_frame;
use crate::rpc::wire::Reply;
use crate::rpc::wire::Request;
use crate::rpc::AddressBook;
use crate::rpc::NodeRef;

/// Typed client for the ring operations.
///
/// Every call dials a fresh connection, writes one request and reads one
/// reply. A refused or timed-out call comes back as an error for the
/// caller to degrade on; it is never fatal. Node references found in
/// replies are recorded in the address book as a side effect.
#[derive(Clone)]
pub struct RingClient {
    registry: Arc<AddressBook>,
}

impl RingClient {
    pub fn new(registry: Arc<AddressBook>) -> Self {
        Self { registry }
    }

    fn call(&self, peer: &NodeRef, request: &Request) -> Result<Reply> {
        let mut stream =
            TcpStream::connect_timeout(&peer.addr, RPC_TIMEOUT).map_err(Error::Transport)?;
        stream
            .set_read_timeout(Some(RPC_TIMEOUT))
            .map_err(Error::Transport)?;
        stream
            .set_write_timeout(Some(RPC_TIMEOUT))
            .map_err(Error::Transport)?;
        write_frame(&mut stream, request)?;
        let reply = read_frame(&mut stream)?;
        tracing::trace!("{} to {}: {:?}", request.name(), peer, reply);
        Ok(reply)
    }

    fn expect_node(&self, reply: Reply, op: &'static str) -> Result<NodeRef> {
        match reply {
            Reply::Node(node) => {
                self.registry.register(&node);
                Ok(node)
            }
            Reply::None => Err(Error::NullReply(op)),
            other => {
                tracing::warn!("unexpected reply to {}: {:?}", op, other);
                Err(Error::UnexpectedReply(op))
            }
        }
    }

    fn expect_unit(&self, reply: Reply, op: &'static str) -> Result<()> {
        match reply {
            Reply::None => Ok(()),
            other => {
                tracing::warn!("unexpected reply to {}: {:?}", op, other);
                Err(Error::UnexpectedReply(op))
            }
        }
    }

    pub fn find_successor(&self, peer: &NodeRef, id: Did) -> Result<NodeRef> {
        let reply = self.call(peer, &Request::FindSuccessor(id))?;
        self.expect_node(reply, "find_successor")
    }

    pub fn find_predecessor(&self, peer: &NodeRef, id: Did) -> Result<NodeRef> {
        let reply = self.call(peer, &Request::FindPredecessor(id))?;
        self.expect_node(reply, "find_predecessor")
    }

    pub fn closest_preceding_finger(&self, peer: &NodeRef, id: Did) -> Result<NodeRef> {
        let reply = self.call(peer, &Request::ClosestPrecedingFinger(id))?;
        self.expect_node(reply, "closest_preceding_finger")
    }

    pub fn successor(&self, peer: &NodeRef) -> Result<NodeRef> {
        let reply = self.call(peer, &Request::GetSuccessor)?;
        self.expect_node(reply, "get_successor")
    }

    pub fn set_successor(&self, peer: &NodeRef, node: NodeRef) -> Result<()> {
        let reply = self.call(peer, &Request::SetSuccessor(node))?;
        self.expect_unit(reply, "set_successor")
    }

    pub fn get_predecessor(&self, peer: &NodeRef) -> Result<Option<NodeRef>> {
        let reply = self.call(peer, &Request::GetPredecessor)?;
        match reply {
            Reply::Predecessor(pred) => {
                if let Some(node) = &pred {
                    self.registry.register(node);
                }
                Ok(pred)
            }
            Reply::None => Err(Error::NullReply("get_predecessor")),
            other => {
                tracing::warn!("unexpected reply to get_predecessor: {:?}", other);
                Err(Error::UnexpectedReply("get_predecessor"))
            }
        }
    }

    pub fn set_predecessor(&self, peer: &NodeRef, node: NodeRef) -> Result<()> {
        let reply = self.call(peer, &Request::SetPredecessor(node))?;
        self.expect_unit(reply, "set_predecessor")
    }

    pub fn update_finger_table(
        &self,
        peer: &NodeRef,
        candidate: NodeRef,
        index: usize,
    ) -> Result<()> {
        let request = Request::UpdateFingerTable(candidate, index as u32);
        let reply = self.call(peer, &request)?;
        self.expect_unit(reply, "update_finger_table")
    }

    pub fn add_key(&self, peer: &NodeRef, key: Did, value: Vec<u8>) -> Result<()> {
        let reply = self.call(peer, &Request::AddKey(key, value))?;
        self.expect_unit(reply, "add_key")
    }

    pub fn get_data(&self, peer: &NodeRef, key: Did) -> Result<Option<Vec<u8>>> {
        let reply = self.call(peer, &Request::GetData(key))?;
        match reply {
            Reply::Data(value) => Ok(value),
            Reply::None => Err(Error::NullReply("get_data")),
            other => {
                tracing::warn!("unexpected reply to get_data: {:?}", other);
                Err(Error::UnexpectedReply("get_data"))
            }
        }
    }

    pub fn update_keys(&self, peer: &NodeRef) -> Result<()> {
        let reply = self.call(peer, &Request::UpdateKeys)?;
        self.expect_unit(reply, "update_keys")
    }
}
