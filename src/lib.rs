//! Quoit: a Chord distributed hash table node over plain TCP.
//! --------------
//! - [RingNode](crate::dht::RingNode) keeps one position on a modular
//!   identifier space of size 2^160, a predecessor pointer, a finger table
//!   of 160 exponentially spaced shortcuts and a local key store.
//! - [NodeServer](crate::rpc::NodeServer) accepts one request per
//!   connection and serves each on its own worker thread.
//! - [RingClient](crate::rpc::RingClient) dials peers with blocking,
//!   timeout-bounded calls; every remote call can fail and every caller
//!   degrades instead of crashing.
//!
//! # Joining
//!
//! A node starts alone as a singleton ring, or joins through one known
//! member: it resolves its successor, splices itself in front of it,
//! fills its finger table, walks the ring telling nodes whose fingers it
//! now improves, and finally pulls the keys it just became responsible
//! for from its successor.
//!
//! # Lookup
//!
//! `find_successor(id)` walks the ring hop by hop, each hop picking the
//! highest finger strictly preceding the target. On a converged ring of N
//! members that takes O(log N) connection round-trips.

pub mod consts;
pub mod dht;
pub mod error;
pub mod logging;
pub mod rpc;
pub mod storage;
