//! Knuth Algorithm D long division (TAOCP vol. 2, 4.3.1, algorithm D) over
//! the [`crate::limb`] primitives.
//!
//! The single-limb divisor case is delegated straight to
//! [`crate::limb::div_one`]/[`crate::limb::mod_one`]; everything wider goes
//! through the full normalize / estimate-and-correct / multiply-and-subtract
//! loop. [`normalized_copy`] additionally exposes the Knuth normalization
//! step on its own, since [`crate::arena::BigIntArena::set_modulo`] caches a
//! pre-normalized twin of each installed modulus to save recomputing it on
//! every [`crate::modular`] reduction.

use alloc::vec;
use alloc::vec::Vec;

use crate::arena::{BigIntArena, BigIntHandle};
use crate::bigint::{compare_slices, Ordering};
use crate::error::{Error, Result};
use crate::limb::{self, DoubleLimb, Limb, LIMB_BITS};

const RADIX: u128 = 1u128 << LIMB_BITS;

/// `d` such that `d * (top_limb + 1) <= R` — the Knuth normalization factor
/// for a divisor whose most significant limb is `top_limb`. Always fits in
/// a [`Limb`] for a nonzero (hence `top_limb >= 1`) trimmed divisor.
pub fn normalization_factor(top_limb: Limb) -> Limb {
    ((RADIX as DoubleLimb) / (top_limb as DoubleLimb + 1)) as Limb
}

/// `limbs * factor`, as a vector one limb longer than `limbs` (the top limb
/// holds the final carry-out, possibly zero).
fn mul_by_limb(limbs: &[Limb], factor: Limb) -> Vec<Limb> {
    let mut out = vec![0 as Limb; limbs.len() + 1];
    let carry = limb::mul_add(limbs, &mut out[..limbs.len()], limbs.len(), factor, 0);
    out[limbs.len()] = carry;
    out
}

fn trim_vec(v: &mut Vec<Limb>) {
    while v.len() > 1 && *v.last().unwrap() == 0 {
        v.pop();
    }
}

/// Computes `v` scaled by its own Knuth normalization factor, as a fresh,
/// independent value. Used to build the cached `norm_modulo` twin of an
/// installed modulus.
pub fn normalized_copy(arena: &mut BigIntArena, v: BigIntHandle) -> Result<BigIntHandle> {
    if arena.is_zero(v) {
        return Err(Error::InvalidModulus);
    }
    let limbs = arena.limbs(v).to_vec();
    let top = *limbs.last().unwrap();
    let d = normalization_factor(top);
    let scaled = mul_by_limb(&limbs, d);
    let h = arena.allocate(scaled.len(), false);
    arena.slot_mut(h).limbs[..scaled.len()].copy_from_slice(&scaled);
    arena.trim(h);
    Ok(h)
}

/// `(quotient, remainder)` of `a / b`, `a % b`, computed once. Reads `a` and
/// `b`; neither is consumed. `b` must be nonzero.
pub fn divmod(arena: &mut BigIntArena, a: BigIntHandle, b: BigIntHandle) -> Result<(BigIntHandle, BigIntHandle)> {
    if arena.is_zero(b) {
        return Err(Error::InvalidGcdOperand);
    }
    let a_limbs = arena.limbs(a).to_vec();
    let b_limbs = arena.limbs(b).to_vec();
    let (q, r) = divmod_limbs(&a_limbs, &b_limbs);

    let qh = arena.allocate(q.len(), false);
    arena.slot_mut(qh).limbs[..q.len()].copy_from_slice(&q);
    arena.trim(qh);

    let rh = arena.allocate(r.len(), false);
    arena.slot_mut(rh).limbs[..r.len()].copy_from_slice(&r);
    arena.trim(rh);

    Ok((qh, rh))
}

/// `a / b`. Reads `a` and `b`; neither is consumed. Panics (debug) if `b` is
/// zero — callers that need the fallible form should use [`divmod`].
pub fn quotient(arena: &mut BigIntArena, a: BigIntHandle, b: BigIntHandle) -> BigIntHandle {
    let (q, r) = divmod(arena, a, b).expect("division by zero in quotient()");
    arena.release(r);
    q
}

/// `a % b`. Reads `a` and `b`; neither is consumed. Panics (debug) if `b` is
/// zero — callers that need the fallible form should use [`divmod`].
pub fn remainder(arena: &mut BigIntArena, a: BigIntHandle, b: BigIntHandle) -> BigIntHandle {
    let (q, r) = divmod(arena, a, b).expect("division by zero in remainder()");
    arena.release(q);
    r
}

fn divmod_limbs(a: &[Limb], b: &[Limb]) -> (Vec<Limb>, Vec<Limb>) {
    let bn = trimmed_len(b);
    debug_assert!(!(bn == 1 && b[0] == 0), "division by zero");

    if bn == 1 {
        let divisor = b[0];
        let an = trimmed_len(a);
        let mut q = a[..an].to_vec();
        let rem = limb::div_one(&mut q, an, divisor, 0);
        trim_vec(&mut q);
        return (q, vec![rem]);
    }

    let an = trimmed_len(a);
    if compare_slices(&a[..an], &b[..bn]) == Ordering::Less {
        return (vec![0], a[..an].to_vec());
    }

    let n = bn;
    let d = normalization_factor(b[bn - 1]);
    let mut un = mul_by_limb(&a[..an], d); // length an + 1
    let mut vn = mul_by_limb(&b[..bn], d); // length n + 1
    debug_assert_eq!(vn[n], 0, "normalization overflowed the divisor");
    vn.truncate(n);

    let total_len = un.len();
    let m = total_len - n - 1;
    let mut q = vec![0 as Limb; m + 1];
    let vtop = vn[n - 1] as u128;

    for j in (0..=m).rev() {
        let top2 = ((un[j + n] as u128) << LIMB_BITS) | un[j + n - 1] as u128;
        let mut qhat = top2 / vtop;
        let mut rhat = top2 % vtop;
        if qhat >= RADIX {
            qhat = RADIX - 1;
            rhat = top2 - qhat * vtop;
        }
        if n >= 2 {
            while rhat < RADIX
                && qhat * (vn[n - 2] as u128) > rhat * RADIX + un[j + n - 2] as u128
            {
                qhat -= 1;
                rhat += vtop;
            }
        }
        let qhat_limb = qhat as Limb;
        let product = mul_by_limb(&vn, qhat_limb);
        let borrow_out = limb::sub(&mut un[j..j + n + 1], &product, n + 1, 0);
        if borrow_out != 0 {
            let carry = limb::add(&mut un[j..j + n], &vn, n, 0);
            un[j + n] = un[j + n].wrapping_add(carry);
            q[j] = qhat_limb.wrapping_sub(1);
        } else {
            q[j] = qhat_limb;
        }
    }

    let mut rem = un[..n].to_vec();
    let leftover = limb::div_one(&mut rem, n, d, 0);
    debug_assert_eq!(leftover, 0, "denormalized remainder left a nonzero leftover");

    trim_vec(&mut q);
    trim_vec(&mut rem);
    (q, rem)
}

fn trimmed_len(a: &[Limb]) -> usize {
    let mut n = a.len();
    while n > 1 && a[n - 1] == 0 {
        n -= 1;
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_limb_divisor() {
        let mut arena = BigIntArena::new();
        let a = arena.allocate_from(100);
        let b = arena.allocate_from(7);
        let (q, r) = divmod(&mut arena, a, b).unwrap();
        assert_eq!(arena.limbs(q), &[14]);
        assert_eq!(arena.limbs(r), &[2]);
        arena.release(a);
        arena.release(b);
        arena.release(q);
        arena.release(r);
    }

    #[test]
    fn multi_limb_division_matches_multiplication() {
        let mut arena = BigIntArena::new();
        let a = arena.load(&[0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0]);
        let b = arena.load(&[0x01, 0x00, 0x00, 0x01]);
        let (q, r) = divmod(&mut arena, a, b).unwrap();
        // a == q*b + r
        let qb = arena.mul(q, b);
        let reconstructed = arena.add(qb, r);
        assert_eq!(arena.compare(a, reconstructed), Ordering::Equal);
        assert_eq!(arena.compare(r, b), Ordering::Less);
        arena.release(a);
        arena.release(b);
        arena.release(q);
        arena.release(r);
        arena.release(qb);
        arena.release(reconstructed);
    }

    #[test]
    fn dividend_smaller_than_divisor() {
        let mut arena = BigIntArena::new();
        let a = arena.allocate_from(5);
        let b = arena.load(&[0x01, 0x00, 0x00, 0x00, 0x00]);
        let (q, r) = divmod(&mut arena, a, b).unwrap();
        assert!(arena.is_zero(q));
        assert_eq!(arena.compare(a, r), Ordering::Equal);
        arena.release(a);
        arena.release(b);
        arena.release(q);
        arena.release(r);
    }

    #[test]
    fn rejects_division_by_zero() {
        let mut arena = BigIntArena::new();
        let a = arena.allocate_from(5);
        let b = arena.allocate(1, true);
        assert_eq!(divmod(&mut arena, a, b).unwrap_err(), Error::InvalidGcdOperand);
        arena.release(a);
        arena.release(b);
    }

    #[test]
    fn normalized_copy_is_exact_multiple() {
        let mut arena = BigIntArena::new();
        let v = arena.allocate_from(0x1234);
        let norm = normalized_copy(&mut arena, v).unwrap();
        let (q, r) = divmod(&mut arena, norm, v).unwrap();
        assert!(arena.is_zero(r));
        assert!(!arena.is_zero(q));
        arena.release(v);
        arena.release(norm);
        arena.release(q);
        arena.release(r);
    }

    #[test]
    fn large_random_like_values_round_trip() {
        let mut arena = BigIntArena::new();
        let a = arena.load(&[
            0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66,
        ]);
        let b = arena.load(&[0x9f, 0x10, 0x77, 0x02, 0x03]);
        let (q, r) = divmod(&mut arena, a, b).unwrap();
        let qb = arena.mul(q, b);
        let reconstructed = arena.add(qb, r);
        assert_eq!(arena.compare(a, reconstructed), Ordering::Equal);
        arena.release(a);
        arena.release(b);
        arena.release(q);
        arena.release(r);
        arena.release(qb);
        arena.release(reconstructed);
    }
}
