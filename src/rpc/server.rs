//! Accept loop and request dispatch.

use std::net::SocketAddr;
use std::net::TcpListener;
use std::net::TcpStream;
use std::sync::Arc;
use std::thread;

use crate::consts::RPC_TIMEOUT;
use crate::dht::RingNode;
use crate::error::Error;
use crate::error::Result;
use crate::rpc::wire::read_frame;
use crate::rpc::wire::write_frame;
use crate::rpc::wire::Reply;
use crate::rpc::wire::Request;

/// Listening endpoint of a node. One thread accepts connections; each
/// accepted connection is served to completion by its own worker thread,
/// then closed. There is no connection reuse.
pub struct NodeServer {
    listener: TcpListener,
}

impl NodeServer {
    /// Bind the listening endpoint. A node cannot exist without one, so
    /// callers treat this failing as fatal.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).map_err(Error::Bind)?;
        Ok(Self { listener })
    }

    /// The bound address, which is what the node's identifier is hashed from.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(Error::Transport)
    }

    /// Serve forever on the current thread.
    pub fn run(self, node: Arc<RingNode>) -> Result<()> {
        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let node = node.clone();
                    thread::spawn(move || {
                        if let Err(e) = serve_connection(stream, &node) {
                            tracing::debug!("{}: connection ended: {}", node.did(), e);
                        }
                    });
                }
                Err(e) => tracing::warn!("accept failed: {}", e),
            }
        }
        Ok(())
    }

    /// Run the accept loop on a background thread.
    pub fn spawn(self, node: Arc<RingNode>) -> thread::JoinHandle<()> {
        thread::spawn(move || {
            if let Err(e) = self.run(node) {
                tracing::error!("server stopped: {}", e);
            }
        })
    }
}

fn serve_connection(mut stream: TcpStream, node: &RingNode) -> Result<()> {
    stream
        .set_read_timeout(Some(RPC_TIMEOUT))
        .map_err(Error::Transport)?;
    stream
        .set_write_timeout(Some(RPC_TIMEOUT))
        .map_err(Error::Transport)?;

    let request: Request = match read_frame(&mut stream) {
        Ok(request) => request,
        Err(e) => {
            // Unrecognized or malformed request: answer null, stay alive.
            tracing::warn!("{}: unrecognized request: {}", node.did(), e);
            return write_frame(&mut stream, &Reply::None);
        }
    };
    tracing::debug!("{}: handling {}", node.did(), request.name());
    let reply = dispatch(node, request);
    write_frame(&mut stream, &reply)
}

/// Map one request to the matching local operation. A failing operation
/// degrades to a logged null reply; nothing here can take the node down.
fn dispatch(node: &RingNode, request: Request) -> Reply {
    let op = request.name();
    let result = match request {
        Request::FindSuccessor(id) => node.find_successor(id).map(Reply::Node),
        Request::FindPredecessor(id) => node.find_predecessor(id).map(Reply::Node),
        Request::ClosestPrecedingFinger(id) => {
            node.closest_preceding_finger(id).map(Reply::Node)
        }
        Request::GetSuccessor => node.successor().map(Reply::Node),
        Request::SetSuccessor(n) => node.set_successor(n).map(|()| Reply::None),
        Request::GetPredecessor => node.predecessor().map(Reply::Predecessor),
        Request::SetPredecessor(n) => node.set_predecessor(n).map(|()| Reply::None),
        Request::UpdateFingerTable(n, index) => node
            .update_finger_table(n, index as usize)
            .map(|()| Reply::None),
        Request::AddKey(key, value) => node.add_key(key, value).map(|()| Reply::None),
        Request::GetData(key) => node.get_data(key).map(Reply::Data),
        Request::UpdateKeys => node.update_keys().map(|()| Reply::None),
    };
    match result {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!("{}: {} failed: {}", node.did(), op, e);
            Reply::None
        }
    }
}
