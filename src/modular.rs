//! Normalized reduction against a cached modulo slot, and square-and-multiply
//! modular exponentiation, on top of [`crate::division`].
//!
//! `gcd`/`mod_inverse` live on [`crate::bigint::BigIntArena`] directly since
//! they only need the plain `div`/`sub` primitives; this module is just the
//! two operations that specifically involve the arena's cached-modulo
//! bookkeeping.

use crate::arena::{BigIntArena, BigIntHandle, ModuloSlot};
use crate::error::{Error, Result};

impl BigIntArena {
    /// `a mod` the modulo installed in `slot`. `slot` must already hold a
    /// value via [`set_modulo`](Self::set_modulo). Reads `a`; does not
    /// consume it.
    pub fn reduce(&mut self, a: BigIntHandle, slot: ModuloSlot) -> Result<BigIntHandle> {
        let modulo = self.modulo_handle(slot).ok_or(Error::InvalidModulus)?;
        Ok(crate::division::remainder(self, a, modulo))
    }

    /// `base^exp mod modulo`, left-to-right square-and-multiply. This is an
    /// ordinary (non-constant-time) exponentiation: the crate does not
    /// attempt blinding or constant-time arithmetic, a deliberate,
    /// documented non-goal (see the crate's top-level docs).
    pub fn mod_power(
        &mut self,
        base: BigIntHandle,
        exp: BigIntHandle,
        modulo: BigIntHandle,
    ) -> Result<BigIntHandle> {
        if self.is_zero(modulo) {
            return Err(Error::InvalidModulus);
        }
        if self.size(modulo) == 1 && self.limbs(modulo)[0] == 1 {
            return Ok(self.allocate(1, true));
        }

        let mut result = self.allocate_from(1);
        let mut cur_base = crate::division::remainder(self, base, modulo);
        let bits = self.bit_count(exp);

        for i in 0..bits {
            if self.bit_is_set(exp, i) {
                let product = self.mul(result, cur_base);
                self.release(result);
                result = crate::division::remainder(self, product, modulo);
                self.release(product);
            }
            if i + 1 < bits {
                let squared = self.square(cur_base); // consumes cur_base
                cur_base = crate::division::remainder(self, squared, modulo);
                self.release(squared);
            }
        }
        self.release(cur_base);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mod_power_matches_known_value() {
        let mut arena = BigIntArena::new();
        // 4^13 mod 497 = 445 (textbook RSA example)
        let base = arena.allocate_from(4);
        let exp = arena.allocate_from(13);
        let modulo = arena.allocate_from(497);
        let result = arena.mod_power(base, exp, modulo).unwrap();
        assert_eq!(arena.limbs(result), &[445]);
        arena.release(base);
        arena.release(exp);
        arena.release(modulo);
        arena.release(result);
    }

    #[test]
    fn mod_power_with_zero_exponent_is_one() {
        let mut arena = BigIntArena::new();
        let base = arena.allocate_from(12345);
        let exp = arena.allocate(1, true);
        let modulo = arena.allocate_from(97);
        let result = arena.mod_power(base, exp, modulo).unwrap();
        assert_eq!(arena.limbs(result), &[1]);
        arena.release(base);
        arena.release(exp);
        arena.release(modulo);
        arena.release(result);
    }

    #[test]
    fn mod_power_rejects_zero_modulo() {
        let mut arena = BigIntArena::new();
        let base = arena.allocate_from(2);
        let exp = arena.allocate_from(2);
        let modulo = arena.allocate(1, true);
        assert_eq!(arena.mod_power(base, exp, modulo), Err(Error::InvalidModulus));
        arena.release(base);
        arena.release(exp);
        arena.release(modulo);
    }

    #[test]
    fn reduce_uses_cached_modulo_slot() {
        let mut arena = BigIntArena::new();
        let n = arena.allocate_from(97);
        arena.set_modulo(n, ModuloSlot::N).unwrap();
        let a = arena.allocate_from(250);
        let r = arena.reduce(a, ModuloSlot::N).unwrap();
        assert_eq!(arena.limbs(r), &[250 % 97]);
        arena.release(a);
        arena.release(r);
        arena.reset_modulo(ModuloSlot::N).unwrap();
        assert_eq!(arena.check_no_leaks(), Ok(()));
    }
}
