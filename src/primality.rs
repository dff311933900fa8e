//! Small-prime trial-division pre-sieving and Miller-Rabin probabilistic
//! primality testing, plus the random-candidate search
//! [`BigIntArena::fill_prime`] that [`crate::keygen`] drives.

use rand_core::CryptoRngCore;

use crate::arena::{BigIntArena, BigIntHandle};
use crate::bigint::Ordering;
use crate::error::{Error, Result};
use crate::limb::{Limb, LIMB_BITS};

/// How much of [`SMALL_PRIME_DELTAS`] to trial-divide against before
/// falling back to Miller-Rabin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SieveCoverage {
    Fast,
    Most,
    All,
}

/// Successive gaps between odd primes, starting from 2: `primes[0] = 2 +
/// delta[0]`, `primes[i+1] = primes[i] + delta[i+1]`. Covers every odd
/// prime up to 17989 (2063 entries) so [`SieveCoverage::All`] matches the
/// depth a production RSA candidate sieve actually uses; a flat table of
/// that size would be unwieldy to transcribe by hand; gaps between
/// consecutive odd primes never exceed a couple dozen, so a `u8` delta
/// table is both compact and trivially reviewable against a reference
/// prime list.
pub const SMALL_PRIME_DELTAS: &[u8] = &[
    1, 2, 2, 4, 2, 4, 2, 4, 6, 2, 6, 4, 2, 4, 6, 6, 2, 6, 4, 2,
    6, 4, 6, 8, 4, 2, 4, 2, 4, 14, 4, 6, 2, 10, 2, 6, 6, 4, 6, 6,
    2, 10, 2, 4, 2, 12, 12, 4, 2, 4, 6, 2, 10, 6, 6, 6, 2, 6, 4, 2,
    10, 14, 4, 2, 4, 14, 6, 10, 2, 4, 6, 8, 6, 6, 4, 6, 8, 4, 8, 10,
    2, 10, 2, 6, 4, 6, 8, 4, 2, 4, 12, 8, 4, 8, 4, 6, 12, 2, 18, 6,
    10, 6, 6, 2, 6, 10, 6, 6, 2, 6, 6, 4, 2, 12, 10, 2, 4, 6, 6, 2,
    12, 4, 6, 8, 10, 8, 10, 8, 6, 6, 4, 8, 6, 4, 8, 4, 14, 10, 12, 2,
    10, 2, 4, 2, 10, 14, 4, 2, 4, 14, 4, 2, 4, 20, 4, 8, 10, 8, 4, 6,
    6, 14, 4, 6, 6, 8, 6, 12, 4, 6, 2, 10, 2, 6, 10, 2, 10, 2, 6, 18,
    4, 2, 4, 6, 6, 8, 6, 6, 22, 2, 10, 8, 10, 6, 6, 8, 12, 4, 6, 6,
    2, 6, 12, 10, 18, 2, 4, 6, 2, 6, 4, 2, 4, 12, 2, 6, 34, 6, 6, 8,
    18, 10, 14, 4, 2, 4, 6, 8, 4, 2, 6, 12, 10, 2, 4, 2, 4, 6, 12, 12,
    8, 12, 6, 4, 6, 8, 4, 8, 4, 14, 4, 6, 2, 4, 6, 2, 6, 10, 20, 6,
    4, 2, 24, 4, 2, 10, 12, 2, 10, 8, 6, 6, 6, 18, 6, 4, 2, 12, 10, 12,
    8, 16, 14, 6, 4, 2, 4, 2, 10, 12, 6, 6, 18, 2, 16, 2, 22, 6, 8, 6,
    4, 2, 4, 8, 6, 10, 2, 10, 14, 10, 6, 12, 2, 4, 2, 10, 12, 2, 16, 2,
    6, 4, 2, 10, 8, 18, 24, 4, 6, 8, 16, 2, 4, 8, 16, 2, 4, 8, 6, 6,
    4, 12, 2, 22, 6, 2, 6, 4, 6, 14, 6, 4, 2, 6, 4, 6, 12, 6, 6, 14,
    4, 6, 12, 8, 6, 4, 26, 18, 10, 8, 4, 6, 2, 6, 22, 12, 2, 16, 8, 4,
    12, 14, 10, 2, 4, 8, 6, 6, 4, 2, 4, 6, 8, 4, 2, 6, 10, 2, 10, 8,
    4, 14, 10, 12, 2, 6, 4, 2, 16, 14, 4, 6, 8, 6, 4, 18, 8, 10, 6, 6,
    8, 10, 12, 14, 4, 6, 6, 2, 28, 2, 10, 8, 4, 14, 4, 8, 12, 6, 12, 4,
    6, 20, 10, 2, 16, 26, 4, 2, 12, 6, 4, 12, 6, 8, 4, 8, 22, 2, 4, 2,
    12, 28, 2, 6, 6, 6, 4, 6, 2, 12, 4, 12, 2, 10, 2, 16, 2, 16, 6, 20,
    16, 8, 4, 2, 4, 2, 22, 8, 12, 6, 10, 2, 4, 6, 2, 6, 10, 2, 12, 10,
    2, 10, 14, 6, 4, 6, 8, 6, 6, 16, 12, 2, 4, 14, 6, 4, 8, 10, 8, 6,
    6, 22, 6, 2, 10, 14, 4, 6, 18, 2, 10, 14, 4, 2, 10, 14, 4, 8, 18, 4,
    6, 2, 4, 6, 2, 12, 4, 20, 22, 12, 2, 4, 6, 6, 2, 6, 22, 2, 6, 16,
    6, 12, 2, 6, 12, 16, 2, 4, 6, 14, 4, 2, 18, 24, 10, 6, 2, 10, 2, 10,
    2, 10, 6, 2, 10, 2, 10, 6, 8, 30, 10, 2, 10, 8, 6, 10, 18, 6, 12, 12,
    2, 18, 6, 4, 6, 6, 18, 2, 10, 14, 6, 4, 2, 4, 24, 2, 12, 6, 16, 8,
    6, 6, 18, 16, 2, 4, 6, 2, 6, 6, 10, 6, 12, 12, 18, 2, 6, 4, 18, 8,
    24, 4, 2, 4, 6, 2, 12, 4, 14, 30, 10, 6, 12, 14, 6, 10, 12, 2, 4, 6,
    8, 6, 10, 2, 4, 14, 6, 6, 4, 6, 2, 10, 2, 16, 12, 8, 18, 4, 6, 12,
    2, 6, 6, 6, 28, 6, 14, 4, 8, 10, 8, 12, 18, 4, 2, 4, 24, 12, 6, 2,
    16, 6, 6, 14, 10, 14, 4, 30, 6, 6, 6, 8, 6, 4, 2, 12, 6, 4, 2, 6,
    22, 6, 2, 4, 18, 2, 4, 12, 2, 6, 4, 26, 6, 6, 4, 8, 10, 32, 16, 2,
    6, 4, 2, 4, 2, 10, 14, 6, 4, 8, 10, 6, 20, 4, 2, 6, 30, 4, 8, 10,
    6, 6, 8, 6, 12, 4, 6, 2, 6, 4, 6, 2, 10, 2, 16, 6, 20, 4, 12, 14,
    28, 6, 20, 4, 18, 8, 6, 4, 6, 14, 6, 6, 10, 2, 10, 12, 8, 10, 2, 10,
    8, 12, 10, 24, 2, 4, 8, 6, 4, 8, 18, 10, 6, 6, 2, 6, 10, 12, 2, 10,
    6, 6, 6, 8, 6, 10, 6, 2, 6, 6, 6, 10, 8, 24, 6, 22, 2, 18, 4, 8,
    10, 30, 8, 18, 4, 2, 10, 6, 2, 6, 4, 18, 8, 12, 18, 16, 6, 2, 12, 6,
    10, 2, 10, 2, 6, 10, 14, 4, 24, 2, 16, 2, 10, 2, 10, 20, 4, 2, 4, 8,
    16, 6, 6, 2, 12, 16, 8, 4, 6, 30, 2, 10, 2, 6, 4, 6, 6, 8, 6, 4,
    12, 6, 8, 12, 4, 14, 12, 10, 24, 6, 12, 6, 2, 22, 8, 18, 10, 6, 14, 4,
    2, 6, 10, 8, 6, 4, 6, 30, 14, 10, 2, 12, 10, 2, 16, 2, 18, 24, 18, 6,
    16, 18, 6, 2, 18, 4, 6, 2, 10, 8, 10, 6, 6, 8, 4, 6, 2, 10, 2, 12,
    4, 6, 6, 2, 12, 4, 14, 18, 4, 6, 20, 4, 8, 6, 4, 8, 4, 14, 6, 4,
    14, 12, 4, 2, 30, 4, 24, 6, 6, 12, 12, 14, 6, 4, 2, 4, 18, 6, 12, 8,
    6, 4, 12, 2, 12, 30, 16, 2, 6, 22, 14, 6, 10, 12, 6, 2, 4, 8, 10, 6,
    6, 24, 14, 6, 4, 8, 12, 18, 10, 2, 10, 2, 4, 6, 20, 6, 4, 14, 4, 2,
    4, 14, 6, 12, 24, 10, 6, 8, 10, 2, 30, 4, 6, 2, 12, 4, 14, 6, 34, 12,
    8, 6, 10, 2, 4, 20, 10, 8, 16, 2, 10, 14, 4, 2, 12, 6, 16, 6, 8, 4,
    8, 4, 6, 8, 6, 6, 12, 6, 4, 6, 6, 8, 18, 4, 20, 4, 12, 2, 10, 6,
    2, 10, 12, 2, 4, 20, 6, 30, 6, 4, 8, 10, 12, 6, 2, 28, 2, 6, 4, 2,
    16, 12, 2, 6, 10, 8, 24, 12, 6, 18, 6, 4, 14, 6, 4, 12, 8, 6, 12, 4,
    6, 12, 6, 12, 2, 16, 20, 4, 2, 10, 18, 8, 4, 14, 4, 2, 6, 22, 6, 14,
    6, 6, 10, 6, 2, 10, 2, 4, 2, 22, 2, 4, 6, 6, 12, 6, 14, 10, 12, 6,
    8, 4, 36, 14, 12, 6, 4, 6, 2, 12, 6, 12, 16, 2, 10, 8, 22, 2, 12, 6,
    4, 6, 18, 2, 12, 6, 4, 12, 8, 6, 12, 4, 6, 12, 6, 2, 12, 12, 4, 14,
    6, 16, 6, 2, 10, 8, 18, 6, 34, 2, 28, 2, 22, 6, 2, 10, 12, 2, 6, 4,
    8, 22, 6, 2, 10, 8, 4, 6, 8, 4, 12, 18, 12, 20, 4, 6, 6, 8, 4, 2,
    16, 12, 2, 10, 8, 10, 2, 4, 6, 14, 12, 22, 8, 28, 2, 4, 20, 4, 2, 4,
    14, 10, 12, 2, 12, 16, 2, 28, 8, 22, 8, 4, 6, 6, 14, 4, 8, 12, 6, 6,
    4, 20, 4, 18, 2, 12, 6, 4, 6, 14, 18, 10, 8, 10, 32, 6, 10, 6, 6, 2,
    6, 16, 6, 2, 12, 6, 28, 2, 10, 8, 16, 6, 8, 6, 10, 24, 20, 10, 2, 10,
    2, 12, 4, 6, 20, 4, 2, 12, 18, 10, 2, 10, 2, 4, 20, 16, 26, 4, 8, 6,
    4, 12, 6, 8, 12, 12, 6, 4, 8, 22, 2, 16, 14, 10, 6, 12, 12, 14, 6, 4,
    20, 4, 12, 6, 2, 6, 6, 16, 8, 22, 2, 28, 8, 6, 4, 20, 4, 12, 24, 20,
    4, 8, 10, 2, 16, 2, 12, 12, 34, 2, 4, 6, 12, 6, 6, 8, 6, 4, 2, 6,
    24, 4, 20, 10, 6, 6, 14, 4, 6, 6, 2, 12, 6, 10, 2, 10, 6, 20, 4, 26,
    4, 2, 6, 22, 2, 24, 4, 6, 2, 4, 6, 24, 6, 8, 4, 2, 34, 6, 8, 16,
    12, 2, 10, 2, 10, 6, 8, 4, 8, 12, 22, 6, 14, 4, 26, 4, 2, 12, 10, 8,
    4, 8, 12, 4, 14, 6, 16, 6, 8, 4, 6, 6, 8, 6, 10, 12, 2, 6, 6, 16,
    8, 6, 6, 12, 10, 2, 6, 18, 4, 6, 6, 6, 12, 18, 8, 6, 10, 8, 18, 4,
    14, 6, 18, 10, 8, 10, 12, 2, 6, 12, 12, 36, 4, 6, 8, 4, 6, 2, 4, 18,
    12, 6, 8, 6, 6, 4, 18, 2, 4, 2, 24, 4, 6, 6, 14, 30, 6, 4, 6, 12,
    6, 20, 4, 8, 4, 8, 6, 6, 4, 30, 2, 10, 12, 8, 10, 8, 24, 6, 12, 4,
    14, 4, 6, 2, 28, 14, 16, 2, 12, 6, 4, 20, 10, 6, 6, 6, 8, 10, 12, 14,
    10, 14, 16, 14, 10, 14, 6, 16, 6, 8, 6, 16, 20, 10, 2, 6, 4, 2, 4, 12,
    2, 10, 2, 6, 22, 6, 2, 4, 18, 8, 10, 8, 22, 2, 10, 18, 14, 4, 2, 4,
    18, 2, 4, 6, 8, 10, 2, 30, 4, 30, 2, 10, 2, 18, 4, 18, 6, 14, 10, 2,
    4, 20, 36, 6, 4, 6, 14, 4, 20, 10, 14, 22, 6, 2, 30, 12, 10, 18, 2, 4,
    14, 6, 22, 18, 2, 12, 6, 4, 8, 4, 8, 6, 10, 2, 12, 18, 10, 14, 16, 14,
    4, 6, 6, 2, 6, 4, 2, 28, 2, 28, 6, 2, 4, 6, 14, 4, 12, 14, 16, 14,
    4, 6, 8, 6, 4, 6, 6, 6, 8, 4, 8, 4, 14, 16, 8, 6, 4, 12, 8, 16,
    2, 10, 8, 4, 6, 26, 6, 10, 8, 4, 6, 12, 14, 30, 4, 14, 22, 8, 12, 4,
    6, 8, 10, 6, 14, 10, 6, 2, 10, 12, 12, 14, 6, 6, 18, 10, 6, 8, 18, 4,
    6, 2, 6, 10, 2, 10, 8, 6, 6, 10, 2, 18, 10, 2, 12, 4, 6, 8, 10, 12,
    14, 12, 4, 8, 10, 6, 6, 20, 4, 14, 16, 14, 10, 8, 10, 12, 2, 18, 6, 12,
    10, 12, 2, 4, 2, 12, 6, 4, 8, 4, 44, 4, 2, 4, 2, 10, 12, 6, 6, 14,
    4, 6, 6, 6, 8, 6, 36, 18, 4, 6, 2, 12, 6, 6, 6, 4, 14, 22, 12, 2,
    18, 10, 6, 26, 24, 4, 2, 4, 2, 4, 14, 4, 6, 6, 8, 16, 12, 2, 42, 4,
    2, 4, 24, 6, 6, 2, 18, 4, 14, 6, 28, 18, 14, 6, 10, 12, 2, 6, 12, 30,
    6, 4, 6, 6, 14, 4, 2, 24, 4, 6, 6, 26, 10, 18, 6, 8, 6, 6, 30, 4,
    12, 12, 2, 16, 2, 6, 4, 12, 18, 2, 6, 4, 26, 12, 6, 12, 4, 24, 24, 12,
    6, 2, 12, 28, 8, 4, 6, 12, 2, 18, 6, 4, 6, 6, 20, 16, 2, 6, 6, 18,
    10, 6, 2, 4, 8, 6, 6, 24, 16, 6, 8, 10, 6, 14, 22, 8, 16, 6, 2, 12,
    4, 2, 22, 8, 18, 34, 2, 6, 18, 4, 6, 6, 8, 10, 8, 18, 6, 4, 2, 4,
    8, 16, 2, 12, 12, 6, 18, 4, 6, 6, 6, 2, 6, 12, 10, 20, 12, 18, 4, 6,
    2, 16, 2, 10, 14, 4, 30, 2, 10, 12, 2, 24, 6, 16, 8, 10, 2, 12, 22, 6,
    2, 16, 20, 10, 2, 12, 12, 18, 10, 12, 6, 2, 10, 2, 6, 10, 18, 2, 12, 6,
    4, 6, 2,
];

fn sieve_prefix_len(coverage: SieveCoverage) -> usize {
    match coverage {
        // primes up to 53
        SieveCoverage::Fast => 15,
        // primes up to 1999
        SieveCoverage::Most => 302,
        // primes up to 17989
        SieveCoverage::All => SMALL_PRIME_DELTAS.len(),
    }
}

/// The FIPS 186-4 Appendix C.3 minimum Miller-Rabin round count for a
/// candidate of the given bit length: `fill_prime` coerces whatever round
/// count its caller asks for up to at least this floor.
fn min_miller_rabin_rounds_for_bits(bits: usize) -> u32 {
    if bits >= 1450 {
        4
    } else if bits >= 1150 {
        5
    } else if bits >= 1000 {
        6
    } else if bits >= 850 {
        7
    } else if bits >= 750 {
        8
    } else if bits >= 500 {
        13
    } else if bits >= 250 {
        28
    } else if bits >= 150 {
        40
    } else {
        51
    }
}

/// FIPS 186-4's minimum top-word density floor: the top 32 bits of a
/// candidate must be at least this value, which enforces `value >=
/// 2^(n - 0.5)` (`0xB504F334` is `2^31 * sqrt(2)` truncated).
const FIPS_MIN_TOP_WORD: u32 = 0xB504_F334;
/// OR-mask applied to the top 32 bits when they fall short of
/// [`FIPS_MIN_TOP_WORD`], restoring the density floor without a full reroll.
const FIPS_DENSITY_OR_MASK: u32 = 0xB505_0000;

/// How many consecutive candidates may fail the ⅓-bit-density check before
/// `fill_prime` gives up and reports [`Error::WeakRandomness`].
const MAX_DENSITY_REROLLS: u32 = 16;
/// How many consecutive witnesses [`BigIntArena::is_prime`] may reject as
/// out-of-range before reporting [`Error::WeakRandomness`].
const MAX_WITNESS_REROLLS: u32 = 30;

impl BigIntArena {
    /// `true` if `candidate` is divisible by one of the first
    /// `coverage`-many sieved odd primes (decoded from
    /// [`SMALL_PRIME_DELTAS`]). A candidate that *is* one of those primes
    /// does not "match" — it passes through untouched.
    pub fn matches_known_prime(&self, candidate: BigIntHandle, coverage: SieveCoverage) -> bool {
        let prefix_len = sieve_prefix_len(coverage);
        let mut p: Limb = 2;
        for &delta in &SMALL_PRIME_DELTAS[..prefix_len] {
            p += delta as Limb;
            if self.size(candidate) == 1 && self.limbs(candidate)[0] == p {
                return false;
            }
            if self.int_mod(candidate, p) == 0 {
                return true;
            }
        }
        false
    }

    /// Sets bit `bit` (0 = least significant) of an already-allocated
    /// value. `bit` must be within the value's current limb capacity.
    fn set_bit(&mut self, h: BigIntHandle, bit: usize) {
        let limb_idx = bit / LIMB_BITS as usize;
        let bit_idx = (bit % LIMB_BITS as usize) as u32;
        self.slot_mut(h).limbs[limb_idx] |= 1u32 << bit_idx;
    }

    /// Forces the top 32 bits of a `bits`-bit candidate to at least
    /// [`FIPS_MIN_TOP_WORD`]. `bits` must be a multiple of 32 (true of
    /// every half-modulus size [`crate::keygen`] generates), since with
    /// this crate's 32-bit limbs the top limb *is* the top 32 bits only
    /// when the value's bit length lands on a limb boundary.
    fn enforce_density_floor(&mut self, h: BigIntHandle, bits: usize) {
        debug_assert_eq!(bits % LIMB_BITS as usize, 0, "FIPS density floor requires a limb-aligned bit length");
        let top_limb = bits / LIMB_BITS as usize - 1;
        let word = self.slot_mut(h).limbs[top_limb];
        if word < FIPS_MIN_TOP_WORD {
            self.slot_mut(h).limbs[top_limb] |= FIPS_DENSITY_OR_MASK;
        }
    }

    /// `true` if at least a third of `h`'s bits are set — the minimum
    /// entropy density `fill_prime` demands of a freshly drawn candidate
    /// before it will spend any more work on it.
    fn has_minimum_bit_density(&self, h: BigIntHandle) -> bool {
        let bits = self.bit_count(h).max(1);
        let set: u32 = self.limbs(h).iter().map(|l| l.count_ones()).sum();
        (set as usize) * 3 >= bits
    }

    /// Miller-Rabin primality test with `rounds` independent witnesses
    /// drawn from `rng`. Correct for any `n >= 2`; does not consume `n`.
    /// Witness candidates outside `[2, n-2]` are rerolled (the range is
    /// drawn at `n`'s own bit width, so an out-of-range draw is possible);
    /// after [`MAX_WITNESS_REROLLS`] consecutive bad draws in a single
    /// round, the RNG is declared too weak to trust and
    /// [`Error::WeakRandomness`] is returned.
    pub fn is_prime(&mut self, n: BigIntHandle, rounds: u32, rng: &mut impl CryptoRngCore) -> Result<bool> {
        if self.size(n) == 1 && self.limbs(n)[0] <= 3 {
            let v = self.limbs(n)[0];
            return Ok(v == 2 || v == 3);
        }
        if self.is_even(n) {
            return Ok(false);
        }
        if self.matches_known_prime(n, SieveCoverage::All) {
            return Ok(false);
        }

        let n_minus_1 = self.int_sub(self.copy(n), 1);
        let r = self.find_min_bit(n_minus_1).unwrap_or(0);
        let d = self.shr_bits(n_minus_1, r);
        let n_bits = self.bit_count(n);

        let mut found_composite = false;
        let mut weak = false;
        'rounds: for _ in 0..rounds {
            let mut a = None;
            for _ in 0..MAX_WITNESS_REROLLS {
                let candidate = self.random_bits(n_bits, rng);
                let too_small = self.size(candidate) == 1 && self.limbs(candidate)[0] <= 1;
                let too_large = self.compare(candidate, n_minus_1) != Ordering::Less;
                if too_small || too_large {
                    self.release(candidate);
                    continue;
                }
                a = Some(candidate);
                break;
            }
            let a = match a {
                Some(a) => a,
                None => {
                    weak = true;
                    break 'rounds;
                }
            };

            let mut x = self.mod_power(a, d, n)?;
            self.release(a);

            if (self.size(x) == 1 && self.limbs(x)[0] == 1) || self.compare(x, n_minus_1) == Ordering::Equal {
                self.release(x);
                continue;
            }

            let mut witness_composite = true;
            for _ in 1..r {
                let squared = self.square(x); // consumes x
                x = crate::division::remainder(self, squared, n);
                self.release(squared);
                if self.compare(x, n_minus_1) == Ordering::Equal {
                    witness_composite = false;
                    break;
                }
            }
            self.release(x);
            if witness_composite {
                found_composite = true;
                break;
            }
        }

        self.release(d);
        self.release(n_minus_1);
        if weak {
            return Err(Error::WeakRandomness);
        }
        Ok(!found_composite)
    }

    /// Searches for a random `bits`-bit probable prime following the
    /// generation protocol: draw a candidate and demand at least a third
    /// of its bits set (rerolling up to [`MAX_DENSITY_REROLLS`] times,
    /// else [`Error::WeakRandomness`]); force it odd and raise its top 32
    /// bits to the FIPS density floor; then step by 2 through odd
    /// candidates — sieving against [`SMALL_PRIME_DELTAS`] and
    /// Miller-Rabin testing each — until one passes, the candidate
    /// overflows past `bits` bits (at which point a fresh candidate is
    /// drawn), or `max_attempts` fresh candidates have been tried. Under
    /// the `std` feature, also aborts with [`Error::Timeout`] once
    /// `timeout_ms` (if given) has elapsed. `rounds` is coerced up to the
    /// FIPS 186-4 minimum for `bits` regardless of what the caller asks
    /// for.
    pub fn fill_prime(
        &mut self,
        bits: usize,
        rounds: u32,
        rng: &mut impl CryptoRngCore,
        max_attempts: u32,
        timeout_ms: Option<u64>,
    ) -> Result<BigIntHandle> {
        debug_assert!(bits >= 8);
        let rounds = rounds.max(min_miller_rabin_rounds_for_bits(bits));

        #[cfg(feature = "std")]
        let deadline = timeout_ms.map(|ms| std::time::Instant::now() + std::time::Duration::from_millis(ms));
        #[cfg(not(feature = "std"))]
        let _ = timeout_ms;

        for _ in 0..max_attempts {
            #[cfg(feature = "std")]
            if matches!(deadline, Some(d) if std::time::Instant::now() >= d) {
                return Err(Error::Timeout);
            }

            let mut candidate = None;
            for _ in 0..MAX_DENSITY_REROLLS {
                let c = self.random_bits(bits, rng);
                if self.has_minimum_bit_density(c) {
                    candidate = Some(c);
                    break;
                }
                self.release(c);
            }
            let mut candidate = match candidate {
                Some(c) => c,
                None => return Err(Error::WeakRandomness),
            };

            self.set_bit(candidate, 0);
            self.enforce_density_floor(candidate, bits);

            loop {
                #[cfg(feature = "std")]
                if matches!(deadline, Some(d) if std::time::Instant::now() >= d) {
                    self.release(candidate);
                    return Err(Error::Timeout);
                }

                if !self.matches_known_prime(candidate, SieveCoverage::All) {
                    match self.is_prime(candidate, rounds, rng) {
                        Ok(true) => return Ok(candidate),
                        Ok(false) => {}
                        Err(err) => {
                            self.release(candidate);
                            return Err(err);
                        }
                    }
                }

                let before_bits = self.bit_count(candidate);
                candidate = self.int_add(candidate, 2);
                if self.bit_count(candidate) != before_bits {
                    self.release(candidate);
                    break; // overflowed past `bits` bits; draw a fresh candidate
                }
                self.enforce_density_floor(candidate, bits);
            }
        }
        Err(Error::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    #[test]
    fn matches_known_prime_catches_small_composites() {
        let mut arena = BigIntArena::new();
        let h = arena.allocate_from(91); // 7 * 13
        assert!(arena.matches_known_prime(h, SieveCoverage::All));
        arena.release(h);
    }

    #[test]
    fn matches_known_prime_lets_small_primes_through() {
        let mut arena = BigIntArena::new();
        let h = arena.allocate_from(97);
        assert!(!arena.matches_known_prime(h, SieveCoverage::All));
        arena.release(h);
    }

    #[test]
    fn matches_known_prime_covers_the_full_all_range() {
        let mut arena = BigIntArena::new();
        // 35673 = 3 * 11891; well within the `All` sieve's depth (17989)
        // but far past the old 293 cutoff.
        let h = arena.allocate_from(35673);
        assert!(arena.matches_known_prime(h, SieveCoverage::All));
        arena.release(h);

        let prime = arena.allocate_from(17989); // largest prime the `All` sieve covers
        assert!(!arena.matches_known_prime(prime, SieveCoverage::All));
        arena.release(prime);
    }

    #[test]
    fn is_prime_identifies_known_primes_and_composites() {
        let mut arena = BigIntArena::new();
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let prime = arena.allocate_from(7919); // 1000th prime
        assert!(arena.is_prime(prime, 20, &mut rng).unwrap());
        arena.release(prime);

        let composite = arena.allocate_from(7921); // 7919 is prime, 7921 = 89^2
        assert!(!arena.is_prime(composite, 20, &mut rng).unwrap());
        arena.release(composite);
    }

    #[test]
    fn is_prime_handles_small_edge_cases() {
        let mut arena = BigIntArena::new();
        let mut rng = ChaCha20Rng::seed_from_u64(8);
        let two = arena.allocate_from(2);
        assert!(arena.is_prime(two, 10, &mut rng).unwrap());
        arena.release(two);
        let four = arena.allocate_from(4);
        assert!(!arena.is_prime(four, 10, &mut rng).unwrap());
        arena.release(four);
    }

    #[test]
    fn fill_prime_produces_a_probable_prime_of_the_right_size() {
        let mut arena = BigIntArena::new();
        let mut rng = ChaCha20Rng::seed_from_u64(9);
        let p = arena.fill_prime(64, 40, &mut rng, 10_000, None).unwrap();
        assert_eq!(arena.bit_count(p), 64);
        assert!(arena.is_odd(p));
        assert!(arena.is_prime(p, 40, &mut rng).unwrap());
        arena.release(p);
    }

    #[test]
    fn fill_prime_coerces_low_round_counts_up_to_the_fips_floor() {
        // Requesting 1 round at a 256-bit candidate size is still coerced
        // to the FIPS floor (28 rounds at this size), so the result is
        // exactly as trustworthy as asking for the floor directly.
        let mut arena = BigIntArena::new();
        let mut rng = ChaCha20Rng::seed_from_u64(10);
        let p = arena.fill_prime(256, 1, &mut rng, 10_000, None).unwrap();
        assert_eq!(arena.bit_count(p), 256);
        assert!(arena.is_prime(p, 40, &mut rng).unwrap());
        arena.release(p);
    }

    #[test]
    fn min_miller_rabin_rounds_table_matches_fips_186_4() {
        assert_eq!(min_miller_rabin_rounds_for_bits(1500), 4);
        assert_eq!(min_miller_rabin_rounds_for_bits(1450), 4);
        assert_eq!(min_miller_rabin_rounds_for_bits(1000), 6);
        assert_eq!(min_miller_rabin_rounds_for_bits(500), 13);
        assert_eq!(min_miller_rabin_rounds_for_bits(250), 28);
        assert_eq!(min_miller_rabin_rounds_for_bits(150), 40);
        assert_eq!(min_miller_rabin_rounds_for_bits(64), 51);
    }
}
