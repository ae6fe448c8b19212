//! Wraparound intervals over the ring.

use num_bigint::BigUint;

use crate::dht::did::ring_modulus;
use crate::dht::Did;

/// Half-open slice `[start, stop)` of the ring.
///
/// Membership is wrap-aware: when `start > stop` the slice crosses the zero
/// point and splits into `[start, 2^160)` and `[0, stop)`. Two degenerate
/// shapes carry special meaning: `stop == 0` is `[start, 2^160)`, and
/// `start == stop` denotes the entire ring.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RingRange {
    start: Did,
    stop: Did,
}

impl RingRange {
    pub fn new(start: Did, stop: Did) -> Self {
        Self { start, stop }
    }

    /// The open-closed interval `(a, b]`, as used by key-ownership tests.
    pub fn open_closed(a: Did, b: Did) -> Self {
        Self::new(a.next(), b.next())
    }

    /// The fully open interval `(a, b)`, as used by routing decisions.
    pub fn open_open(a: Did, b: Did) -> Self {
        Self::new(a.next(), b)
    }

    pub fn start(&self) -> Did {
        self.start
    }

    pub fn stop(&self) -> Did {
        self.stop
    }

    /// Membership test.
    pub fn contains(&self, id: Did) -> bool {
        if self.start == self.stop {
            true
        } else if self.start < self.stop {
            self.start <= id && id < self.stop
        } else if self.stop == Did::ZERO {
            self.start <= id
        } else {
            self.start <= id || id < self.stop
        }
    }

    /// Number of identifiers covered; the full ring spans 2^160.
    pub fn span(&self) -> BigUint {
        if self.start == self.stop {
            ring_modulus()
        } else {
            let start = BigUint::from(self.start);
            let stop = BigUint::from(self.stop);
            (ring_modulus() + stop - start) % ring_modulus()
        }
    }

    /// Walk the members clockwise from `start`.
    pub fn iter(&self) -> RingRangeIter {
        RingRangeIter {
            next: BigUint::from(self.start),
            remaining: self.span(),
        }
    }
}

/// Iterator over the identifiers of a [RingRange].
pub struct RingRangeIter {
    next: BigUint,
    remaining: BigUint,
}

impl Iterator for RingRangeIter {
    type Item = Did;

    fn next(&mut self) -> Option<Did> {
        if self.remaining == BigUint::from(0u8) {
            return None;
        }
        let did = Did::from(self.next.clone());
        self.next = (&self.next + 1u8) % ring_modulus();
        self.remaining -= 1u8;
        Some(did)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn did(n: u32) -> Did {
        Did::from(n)
    }

    fn members(range: &RingRange, cap: usize) -> Vec<Did> {
        range.iter().take(cap).collect()
    }

    #[test]
    fn test_plain_interval() {
        let r = RingRange::new(did(1), did(4));
        assert!(r.contains(did(1)) && r.contains(did(2)) && r.contains(did(3)));
        assert!(!r.contains(did(4)) && !r.contains(did(0)));
        assert_eq!(members(&r, 10), vec![did(1), did(2), did(3)]);
        assert_eq!(r.span(), BigUint::from(3u8));
    }

    #[test]
    fn test_wrapping_interval() {
        // Crosses the zero point: the last three identifiers plus the first two.
        let start = Did::ZERO - did(3);
        let r = RingRange::new(start, did(2));
        assert!(r.contains(start));
        assert!(r.contains(Did::ZERO - did(1)));
        assert!(r.contains(did(0)) && r.contains(did(1)));
        assert!(!r.contains(did(2)) && !r.contains(did(97)));
        assert_eq!(r.span(), BigUint::from(5u8));
        assert_eq!(members(&r, 10), vec![
            start,
            Did::ZERO - did(2),
            Did::ZERO - did(1),
            did(0),
            did(1),
        ]);
    }

    #[test]
    fn test_stop_at_zero() {
        // [start, 2^160): everything from start up to the wrap point.
        let start = Did::ZERO - did(2);
        let r = RingRange::new(start, Did::ZERO);
        assert!(r.contains(start));
        assert!(r.contains(Did::ZERO - did(1)));
        assert!(!r.contains(Did::ZERO));
        assert!(!r.contains(did(1)));
        assert_eq!(r.span(), BigUint::from(2u8));
    }

    #[test]
    fn test_full_ring() {
        // start == stop denotes the whole ring.
        let r = RingRange::new(did(5), did(5));
        assert!(r.contains(did(5)) && r.contains(did(4)) && r.contains(Did::ZERO));
        assert_eq!(r.span(), ring_modulus());
        assert_eq!(members(&r, 3), vec![did(5), did(6), did(7)]);
    }

    #[test]
    fn test_open_closed() {
        let r = RingRange::open_closed(did(10), did(200));
        assert!(!r.contains(did(10)));
        assert!(r.contains(did(11)) && r.contains(did(200)));
        assert!(!r.contains(did(201)));

        // (a, a] is the full ring, the singleton ownership interval.
        let all = RingRange::open_closed(did(7), did(7));
        assert!(all.contains(did(7)) && all.contains(did(8)) && all.contains(did(0)));
    }

    #[test]
    fn test_open_open() {
        let r = RingRange::open_open(did(10), did(200));
        assert!(!r.contains(did(10)) && !r.contains(did(200)));
        assert!(r.contains(did(11)) && r.contains(did(199)));

        // Wrapping variant.
        let r = RingRange::open_open(did(200), did(10));
        assert!(r.contains(did(201)) && r.contains(Did::ZERO) && r.contains(did(9)));
        assert!(!r.contains(did(200)) && !r.contains(did(10)) && !r.contains(did(50)));
    }
}
