//! Remote procedure layer: one request, one reply, one connection.

pub mod client;
pub mod registry;
pub mod server;
pub mod wire;

pub use client::RingClient;
pub use registry::AddressBook;
pub use registry::NodeRef;
pub use server::NodeServer;
pub use wire::Reply;
pub use wire::Request;
