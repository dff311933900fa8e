//! FIPS-186-4-influenced RSA key-pair generation: two random probable
//! primes of equal bit length, a minimum-separation check, `p > q`, and the
//! CRT acceleration parameters [`crate::rsa`] needs for private-key
//! operations.

use rand_core::CryptoRngCore;

use crate::arena::{BigIntArena, BigIntHandle};
use crate::bigint::Ordering;
use crate::error::{Error, Result};

/// RSA modulus bit sizes this crate will generate. FIPS 186-4 Table B.1
/// only standardizes moduli at these widths; anything else is rejected
/// outright rather than silently generated.
const ALLOWED_MODULUS_BITS: &[usize] = &[512, 1024, 2048, 3072, 4096, 7680];

/// The raw output of [`BigIntArena::generate_rsa_key`]: every field is an
/// independently owned handle the caller must release (typically by
/// handing them to [`crate::rsa::RsaPrivateKey::from_components`], which
/// takes ownership of them).
pub struct GeneratedKey {
    pub n: BigIntHandle,
    pub e: BigIntHandle,
    pub d: BigIntHandle,
    pub p: BigIntHandle,
    pub q: BigIntHandle,
    pub dp: BigIntHandle,
    pub dq: BigIntHandle,
    pub qinv: BigIntHandle,
}

impl BigIntArena {
    /// Generates a two-prime RSA key pair of `bits`-bit modulus size with
    /// public exponent `exponent` (read-only; not consumed). `bits` must be
    /// one of [`ALLOWED_MODULUS_BITS`]. `iterations` is the number of
    /// Miller-Rabin rounds requested for each prime candidate (coerced up
    /// to the FIPS 186-4 minimum for the candidate's size by
    /// [`BigIntArena::fill_prime`]); `timeout_ms`, under the `std` feature,
    /// bounds each prime search by wall-clock time in addition to
    /// `max_attempts`. Retries prime pairs that are equal, too close
    /// together, not coprime with `exponent`, or whose resulting private
    /// exponent is smaller than FIPS 186-4 demands.
    pub fn generate_rsa_key(
        &mut self,
        bits: usize,
        exponent: BigIntHandle,
        iterations: u32,
        rng: &mut impl CryptoRngCore,
        max_attempts: u32,
        timeout_ms: Option<u64>,
    ) -> Result<GeneratedKey> {
        if !ALLOWED_MODULUS_BITS.contains(&bits) {
            return Err(Error::InvalidBitSize);
        }
        let half = bits / 2;
        // FIPS 186-4 B.3.3: |p-q| > 2^(nlen/2 - 100). `half >= 256` for
        // every allowed modulus size, so this never underflows.
        let min_diff_bits = half - 100;

        'retry: loop {
            let mut p = self.fill_prime(half, iterations, rng, max_attempts, timeout_ms)?;
            let mut q = self.fill_prime(half, iterations, rng, max_attempts, timeout_ms)?;

            if self.compare(p, q) == Ordering::Equal {
                self.release(p);
                self.release(q);
                continue 'retry;
            }
            if self.compare(p, q) == Ordering::Less {
                core::mem::swap(&mut p, &mut q);
            }

            let diff = self.sub(p, q);
            let diff_bits = self.bit_count(diff);
            self.release(diff);
            if diff_bits < min_diff_bits {
                self.release(p);
                self.release(q);
                continue 'retry;
            }

            let one = self.allocate_from(1);
            let p_minus_1 = self.sub(p, one);
            let q_minus_1 = self.sub(q, one);
            self.release(one);

            if !self.coprime(exponent, p_minus_1) || !self.coprime(exponent, q_minus_1) {
                self.release(p_minus_1);
                self.release(q_minus_1);
                self.release(p);
                self.release(q);
                continue 'retry;
            }

            let h = self.mul(p_minus_1, q_minus_1);
            let gcd = self
                .gcd(p_minus_1, q_minus_1)
                .expect("p-1 and q-1 are both nonzero");
            let lambda = crate::division::quotient(self, h, gcd);
            self.release(gcd);
            self.release(h);

            let d = match self.mod_inverse(exponent, lambda) {
                Ok(d) => d,
                Err(_) => {
                    self.release(lambda);
                    self.release(p_minus_1);
                    self.release(q_minus_1);
                    self.release(p);
                    self.release(q);
                    continue 'retry;
                }
            };
            self.release(lambda);

            // FIPS 186-4 B.3.1 step 5f: reject a d smaller than half the
            // modulus width, which would make d vulnerable to low-private-
            // exponent attacks.
            if self.bit_count(d) <= (bits + 1) / 2 {
                self.release(d);
                self.release(p_minus_1);
                self.release(q_minus_1);
                self.release(p);
                self.release(q);
                continue 'retry;
            }

            let n = self.mul(p, q);
            let dp = crate::division::remainder(self, d, p_minus_1);
            let dq = crate::division::remainder(self, d, q_minus_1);
            let qinv = self
                .mod_inverse(q, p)
                .expect("p and q are distinct primes, hence coprime");

            self.release(p_minus_1);
            self.release(q_minus_1);

            return Ok(GeneratedKey {
                n,
                e: self.copy(exponent),
                d,
                p,
                q,
                dp,
                dq,
                qinv,
            });
        }
    }

    fn coprime(&mut self, a: BigIntHandle, b: BigIntHandle) -> bool {
        let g = self.gcd(a, b).expect("both operands checked nonzero by the caller");
        let is_one = self.size(g) == 1 && self.limbs(g)[0] == 1;
        self.release(g);
        is_one
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    #[test]
    fn generate_rsa_key_produces_consistent_components() {
        let mut arena = BigIntArena::new();
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let e = arena.allocate_from(65537);
        let key = arena
            .generate_rsa_key(512, e, 0, &mut rng, 10_000, None)
            .unwrap();

        assert_eq!(arena.compare(key.p, key.q), Ordering::Greater);

        let product = arena.mul(key.p, key.q);
        assert_eq!(arena.compare(product, key.n), Ordering::Equal);
        arena.release(product);

        // d*e == 1 mod (p-1) for the CRT exponent dP.
        let de = arena.mul(key.d, key.e);
        let one = arena.allocate_from(1);
        let p_minus_1 = arena.sub(key.p, one);
        let de_mod = crate::division::remainder(&mut arena, de, p_minus_1);
        assert_eq!(arena.limbs(de_mod), &[1]);
        arena.release(de);
        arena.release(one);
        arena.release(p_minus_1);
        arena.release(de_mod);

        arena.release(e);
        arena.release(key.n);
        arena.release(key.e);
        arena.release(key.d);
        arena.release(key.p);
        arena.release(key.q);
        arena.release(key.dp);
        arena.release(key.dq);
        arena.release(key.qinv);
        assert_eq!(arena.check_no_leaks(), Ok(()));
    }

    #[test]
    fn generate_rsa_key_rejects_unsupported_bit_length() {
        let mut arena = BigIntArena::new();
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let e = arena.allocate_from(3);
        assert_eq!(
            arena
                .generate_rsa_key(129, e, 0, &mut rng, 10, None)
                .unwrap_err(),
            Error::InvalidBitSize
        );
        assert_eq!(
            arena
                .generate_rsa_key(768, e, 0, &mut rng, 10, None)
                .unwrap_err(),
            Error::InvalidBitSize
        );
        arena.release(e);
    }
}
