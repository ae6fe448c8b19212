//! Ring identifiers.
//!
//! A [Did] is a point on the modular identifier space of size 2^160. Both
//! nodes and keys live in the same space: a node's Did is the sha1 digest of
//! its listening address, a key's Did is the sha1 digest of the application
//! key. Modular addition and subtraction are the only arithmetic the ring
//! needs; both wrap at 2^160.

use std::fmt;
use std::ops::Add;
use std::ops::Neg;
use std::ops::Sub;
use std::str::FromStr;

use num_bigint::BigUint;
use serde::Deserialize;
use serde::Serialize;
use sha1::Digest;
use sha1::Sha1;

use crate::consts::ID_BYTES;
use crate::consts::RING_BITS;
use crate::error::Error;
use crate::error::Result;

/// One point on the ring, a 160-bit unsigned integer in big-endian bytes.
#[derive(Copy, Clone, Eq, Ord, PartialEq, PartialOrd, Serialize, Deserialize, Hash)]
pub struct Did([u8; ID_BYTES]);

/// The ring modulus 2^160.
pub(crate) fn ring_modulus() -> BigUint {
    BigUint::from(2u16).pow(RING_BITS as u32)
}

impl Did {
    /// The zero point of the ring.
    pub const ZERO: Did = Did([0u8; ID_BYTES]);

    /// Place an arbitrary byte sequence on the ring. Deterministic and
    /// collision-resistant; used for both node addresses and keys.
    pub fn hash(bytes: impl AsRef<[u8]>) -> Self {
        let digest = Sha1::digest(bytes.as_ref());
        let mut id = [0u8; ID_BYTES];
        id.copy_from_slice(&digest);
        Self(id)
    }

    /// Big-endian bytes of the identifier.
    pub fn as_bytes(&self) -> &[u8; ID_BYTES] {
        &self.0
    }

    /// The next identifier clockwise.
    pub fn next(self) -> Self {
        self + Did::from(1u32)
    }

    /// `self + 2^k` on the ring; the start of finger entry `k`.
    pub fn offset(self, k: usize) -> Self {
        self + Did::from(BigUint::from(2u16).pow(k as u32))
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Did {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Did({self})")
    }
}

impl From<BigUint> for Did {
    fn from(n: BigUint) -> Self {
        let n = n % ring_modulus();
        let bytes = n.to_bytes_be();
        let mut id = [0u8; ID_BYTES];
        id[ID_BYTES - bytes.len()..].copy_from_slice(&bytes);
        Self(id)
    }
}

impl From<Did> for BigUint {
    fn from(did: Did) -> BigUint {
        BigUint::from_bytes_be(&did.0)
    }
}

impl From<u32> for Did {
    fn from(n: u32) -> Self {
        Self::from(BigUint::from(n))
    }
}

impl FromStr for Did {
    type Err = Error;

    /// Parse a 40-digit hexadecimal identifier, with or without `0x` prefix.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|_| Error::BadHexId)?;
        let id: [u8; ID_BYTES] = bytes.try_into().map_err(|_| Error::BadHexId)?;
        Ok(Self(id))
    }
}

impl Neg for Did {
    type Output = Self;

    fn neg(self) -> Self {
        let ret = ring_modulus() - BigUint::from(self);
        ret.into()
    }
}

impl Add for Did {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        ((BigUint::from(self) + BigUint::from(rhs)) % ring_modulus()).into()
    }
}

impl Sub for Did {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self + (-rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic() {
        let a = Did::hash("127.0.0.1:4170");
        let b = Did::hash("127.0.0.1:4170");
        let c = Did::hash("127.0.0.1:4171");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_ring_arithmetic_wraps() {
        let zero = Did::ZERO;
        let one = Did::from(1u32);
        let max = Did::from(ring_modulus() - 1u8);

        assert_eq!(max + one, zero);
        assert_eq!(zero - one, max);
        assert_eq!(max.next(), zero);
        assert_eq!(-one + one, zero);
        assert_eq!(-(-one), one);
    }

    #[test]
    fn test_offset() {
        let n = Did::from(10u32);
        assert_eq!(n.offset(0), Did::from(11u32));
        assert_eq!(n.offset(3), Did::from(18u32));
        // 2^159 + 2^159 wraps back onto n.
        let half = n.offset(RING_BITS - 1);
        assert_eq!(half.offset(RING_BITS - 1), n);
    }

    #[test]
    fn test_dump_and_load() {
        // The digit count must be exactly 40.
        assert!(Did::from_str("0x11e807fcc88dd319270493fb2e822e388fe36ab").is_err());
        assert!(Did::from_str("0x11e807fcc88dd319270493fb2e822e388fe36ab00").is_err());
        assert!(Did::from_str("not hex at all").is_err());

        // The 0x prefix may be omitted.
        assert_eq!(
            Did::from_str("11e807fcc88dd319270493fb2e822e388fe36ab0").unwrap(),
            Did::from_str("0x11e807fcc88dd319270493fb2e822e388fe36ab0").unwrap(),
        );

        let did = Did::from_str("0x11e807fcc88dd319270493fb2e822e388fe36ab0").unwrap();
        assert_eq!(
            did.to_string(),
            "0x11e807fcc88dd319270493fb2e822e388fe36ab0"
        );
        assert_eq!(
            format!("{did:?}"),
            "Did(0x11e807fcc88dd319270493fb2e822e388fe36ab0)"
        );
    }
}
