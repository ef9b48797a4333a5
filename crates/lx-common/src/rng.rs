//! Deterministic xorshift32 generator.
//!
//! Seeded runs (`--seed=<u32>`) must reproduce property generation and
//! deterministic actor scheduling bit-for-bit, so all runtime randomness
//! flows through this one generator. Unseeded runs derive a seed from the
//! host clock and use the same implementation.

/// A xorshift32 PRNG. State is always non-zero.
#[derive(Debug, Clone)]
pub struct XorShift32 {
    state: u32,
}

impl XorShift32 {
    /// Create a generator from a seed. A zero seed is replaced with a
    /// fixed non-zero constant (xorshift state must never be zero).
    pub fn new(seed: u32) -> Self {
        XorShift32 {
            state: if seed == 0 { 0x9e37_79b9 } else { seed },
        }
    }

    /// Create a generator seeded from the host clock.
    pub fn from_clock() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.subsec_nanos() ^ (d.as_secs() as u32))
            .unwrap_or(0x1234_5678);
        Self::new(nanos)
    }

    /// Next raw 32-bit value.
    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Uniform value in `[0, bound)`. `bound` must be non-zero.
    pub fn next_below(&mut self, bound: u32) -> u32 {
        debug_assert!(bound > 0, "next_below bound must be non-zero");
        self.next_u32() % bound
    }

    /// Uniform integer in the inclusive range `[lo, hi]`.
    pub fn int_in(&mut self, lo: i64, hi: i64) -> i64 {
        debug_assert!(lo <= hi);
        let width = (hi - lo + 1) as u64;
        lo + (self.next_u32() as u64 % width) as i64
    }

    /// A fair coin flip.
    pub fn flip(&mut self) -> bool {
        self.next_u32() & 1 == 1
    }

    /// True with probability `percent / 100`.
    pub fn chance(&mut self, percent: u32) -> bool {
        self.next_below(100) < percent
    }
}
