//! Constant parameters of the ring.
use std::time::Duration;

/// Width of the identifier space in bits, the sha1 digest width.
pub const RING_BITS: usize = 160;

/// Width of one ring identifier in bytes.
pub const ID_BYTES: usize = RING_BITS / 8;

/// Connect/read/write timeout applied to every remote call.
pub const RPC_TIMEOUT: Duration = Duration::from_millis(1500);

/// Routing hops a lookup may take before it is declared failed.
/// A converged ring needs O(log N) hops, so this bound is only ever
/// reached when finger tables are stale.
pub const MAX_LOOKUP_HOPS: usize = 2 * RING_BITS;

/// Upper bound for one encoded request or reply on the wire.
pub const MAX_FRAME_LEN: usize = 60_000;
