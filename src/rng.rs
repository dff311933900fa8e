//! CSPRNG collaborator glue.
//!
//! This crate never instantiates its own randomness source: every
//! generation entry point is generic over `rand_core::CryptoRngCore`, the
//! same inversion of control the RustCrypto-style signature/RSA crates use
//! so the engine itself never has to take a position on `getrandom` vs. an
//! injected deterministic RNG (tests use `rand_chacha`).

use alloc::vec;

use rand_core::CryptoRngCore;

use crate::arena::{BigIntArena, BigIntHandle};
use crate::bigint::Ordering;
use crate::limb::{Limb, LIMB_BITS};

impl BigIntArena {
    /// A uniformly random value occupying exactly `bits` bits (the top bit
    /// is always set, `bits` must be `>= 1`).
    pub fn random_bits(&mut self, bits: usize, rng: &mut impl CryptoRngCore) -> BigIntHandle {
        debug_assert!(bits >= 1);
        let n_limbs = (bits + LIMB_BITS as usize - 1) / LIMB_BITS as usize;
        let h = self.allocate(n_limbs, true);
        let mut bytes = vec![0u8; n_limbs * 4];
        rng.fill_bytes(&mut bytes);
        {
            let dst = &mut self.slot_mut(h).limbs;
            for i in 0..n_limbs {
                let b = &bytes[i * 4..i * 4 + 4];
                dst[i] = Limb::from_le_bytes([b[0], b[1], b[2], b[3]]);
            }
        }
        let top_bit_in_limb = (bits - 1) % LIMB_BITS as usize;
        let top_limb = n_limbs - 1;
        {
            let dst = &mut self.slot_mut(h).limbs;
            let keep_mask = if top_bit_in_limb == 31 {
                Limb::MAX
            } else {
                (1u32 << (top_bit_in_limb + 1)) - 1
            };
            dst[top_limb] &= keep_mask;
            dst[top_limb] |= 1u32 << top_bit_in_limb;
        }
        self.trim(h);
        h
    }

    /// A uniformly random value in `[0, bound)` via rejection sampling on
    /// `bound`'s bit length. `bound` must be nonzero.
    pub fn random_below(&mut self, bound: BigIntHandle, rng: &mut impl CryptoRngCore) -> BigIntHandle {
        debug_assert!(!self.is_zero(bound));
        let bits = self.bit_count(bound).max(1);
        loop {
            let candidate = self.random_nonnegative_below_pow2(bits, rng);
            if self.compare(candidate, bound) == Ordering::Less {
                return candidate;
            }
            self.release(candidate);
        }
    }

    /// A uniformly random value in `[0, 2^bits)`, without forcing the top
    /// bit — the building block [`random_below`](Self::random_below) uses
    /// for rejection sampling.
    fn random_nonnegative_below_pow2(&mut self, bits: usize, rng: &mut impl CryptoRngCore) -> BigIntHandle {
        let n_limbs = ((bits + LIMB_BITS as usize - 1) / LIMB_BITS as usize).max(1);
        let h = self.allocate(n_limbs, true);
        let mut bytes = vec![0u8; n_limbs * 4];
        rng.fill_bytes(&mut bytes);
        {
            let dst = &mut self.slot_mut(h).limbs;
            for i in 0..n_limbs {
                let b = &bytes[i * 4..i * 4 + 4];
                dst[i] = Limb::from_le_bytes([b[0], b[1], b[2], b[3]]);
            }
            if bits % LIMB_BITS as usize != 0 {
                let keep_mask = (1u32 << (bits % LIMB_BITS as usize)) - 1;
                dst[n_limbs - 1] &= keep_mask;
            }
        }
        self.trim(h);
        h
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    #[test]
    fn random_bits_has_exact_bit_length() {
        let mut arena = BigIntArena::new();
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let h = arena.random_bits(129, &mut rng);
        assert_eq!(arena.bit_count(h), 129);
        arena.release(h);
    }

    #[test]
    fn random_below_stays_in_range() {
        let mut arena = BigIntArena::new();
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let bound = arena.allocate_from(1000);
        for _ in 0..50 {
            let h = arena.random_below(bound, &mut rng);
            assert_eq!(arena.compare(h, bound), Ordering::Less);
            arena.release(h);
        }
        arena.release(bound);
    }
}
