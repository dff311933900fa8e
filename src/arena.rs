//! The COW, reference-counted big-integer arena.
//!
//! Every [`crate::bigint`] operation takes a `&mut BigIntArena` plus one or
//! more [`BigIntHandle`]s rather than a self-contained value type: this is
//! the "object-with-methods records become plain value structs holding their
//! arena back-pointer; methods are free functions" design translated into
//! Rust (see the crate's design notes). A handle is a `Copy` opaque index,
//! not a pointer or a reference, which sidesteps the borrow checker friction
//! that an `Rc<RefCell<_>>`-per-value design would otherwise hit while
//! preserving every observable property of the arena: LIFO free-list reuse,
//! `ref_cnt` semantics, and permanent ("never released through the ordinary
//! path") values.

use alloc::vec;
use alloc::vec::Vec;

use crate::error::{Error, Result};
use crate::limb::Limb;

/// Which of the three long-lived modulos (`N`, `P`, `Q`) a cached value
/// belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuloSlot {
    /// The public modulus `N = p*q`.
    N = 0,
    /// The first prime factor.
    P = 1,
    /// The second prime factor.
    Q = 2,
}

const MODULO_SLOTS: usize = 3;

/// An opaque, `Copy` handle to a big integer owned by one particular
/// [`BigIntArena`]. Handles from different arenas must never be mixed; in
/// debug builds this is enforced with a panic, matching the "debug-mode
/// owner check" called for in the design notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BigIntHandle {
    pub(crate) index: u32,
    #[cfg(debug_assertions)]
    pub(crate) arena_id: u32,
}

pub(crate) struct Slot {
    /// Little-endian limbs. `limbs.len()` is the slot's capacity;
    /// `size` is the number of limbs that are currently meaningful.
    pub(crate) limbs: Vec<Limb>,
    pub(crate) size: usize,
    /// `>=1` ordinary COW-shared value, `-1` permanent, `0` on the free list.
    pub(crate) ref_cnt: i32,
    next_free: Option<u32>,
}

impl Slot {
    fn ensure_capacity(&mut self, n: usize) {
        if self.limbs.len() < n {
            self.limbs.resize(next_grow(n), 0);
        }
    }
}

/// Doubling-like growth policy: round up to the next power of two, with a
/// floor of 4 limbs (128 bits) so tiny values don't reallocate on every
/// single-limb growth.
fn next_grow(n: usize) -> usize {
    let mut cap = 4usize;
    while cap < n {
        cap *= 2;
    }
    cap
}

#[cfg(debug_assertions)]
fn next_arena_id() -> u32 {
    use core::sync::atomic::{AtomicU32, Ordering};
    static NEXT_ID: AtomicU32 = AtomicU32::new(1);
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// The arena (RSA context): owner of every [`BigIntHandle`] it hands out,
/// plus the three cached, Knuth-pre-normalized modulos (`N`, `P`, `Q`) that
/// [`crate::modular`] and [`crate::division`] reuse across an RSA private-key
/// operation.
pub struct BigIntArena {
    pub(crate) slots: Vec<Slot>,
    free_list: Option<u32>,
    active_count: usize,
    free_count: usize,
    current_modulo: ModuloSlot,
    modulo: [Option<BigIntHandle>; MODULO_SLOTS],
    norm_modulo: [Option<BigIntHandle>; MODULO_SLOTS],
    #[cfg(debug_assertions)]
    id: u32,
}

impl Default for BigIntArena {
    fn default() -> Self {
        Self::new()
    }
}

impl BigIntArena {
    /// Creates an empty arena with no cached modulos.
    pub fn new() -> Self {
        BigIntArena {
            slots: Vec::new(),
            free_list: None,
            active_count: 0,
            free_count: 0,
            current_modulo: ModuloSlot::N,
            modulo: [None; MODULO_SLOTS],
            norm_modulo: [None; MODULO_SLOTS],
            #[cfg(debug_assertions)]
            id: next_arena_id(),
        }
    }

    /// Number of handles currently allocated (not on the free list),
    /// including permanent values.
    pub fn active_count(&self) -> usize {
        self.active_count
    }

    /// Number of slots currently sitting on the free list.
    pub fn free_count(&self) -> usize {
        self.free_count
    }

    #[inline]
    fn check_owner(&self, _h: BigIntHandle) {
        #[cfg(debug_assertions)]
        debug_assert_eq!(
            _h.arena_id, self.id,
            "BigIntHandle used with a different BigIntArena"
        );
    }

    pub(crate) fn slot(&self, h: BigIntHandle) -> &Slot {
        self.check_owner(h);
        &self.slots[h.index as usize]
    }

    pub(crate) fn slot_mut(&mut self, h: BigIntHandle) -> &mut Slot {
        self.check_owner(h);
        &mut self.slots[h.index as usize]
    }

    fn make_handle(&self, index: u32) -> BigIntHandle {
        BigIntHandle {
            index,
            #[cfg(debug_assertions)]
            arena_id: self.id,
        }
    }

    /// Allocates a fresh `n`-limb value (`n` is clamped to at least 1, since
    /// logical zero is always `size=1, value[0]=0`). Reuses the most
    /// recently freed slot of the right shape when one is available
    /// (LIFO reuse; see the crate's concurrency/resource-model notes).
    pub fn allocate(&mut self, n: usize, zero: bool) -> BigIntHandle {
        let n = n.max(1);
        let index = if let Some(free_idx) = self.free_list {
            let slot = &mut self.slots[free_idx as usize];
            self.free_list = slot.next_free;
            self.free_count -= 1;
            slot.ensure_capacity(n);
            if zero {
                slot.limbs[..n].fill(0);
            }
            slot.size = n;
            slot.ref_cnt = 1;
            slot.next_free = None;
            free_idx
        } else {
            let limbs = vec![0 as Limb; next_grow(n)];
            self.slots.push(Slot {
                limbs,
                size: n,
                ref_cnt: 1,
                next_free: None,
            });
            (self.slots.len() - 1) as u32
        };
        self.active_count += 1;
        self.make_handle(index)
    }

    /// Allocates a one-limb value equal to `u`.
    pub fn allocate_from(&mut self, u: Limb) -> BigIntHandle {
        let h = self.allocate(1, false);
        self.slot_mut(h).limbs[0] = u;
        h
    }

    /// Parses display-order (big-endian, optionally `0x`-prefixed) hex text
    /// into a new value.
    pub fn allocate_from_hex(&mut self, s: &str) -> Result<BigIntHandle> {
        let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::Asn1);
        }
        let mut bytes = Vec::with_capacity(s.len().div_ceil(2));
        let padded_len = s.len() + (s.len() % 2);
        let mut chars = s.chars();
        if s.len() % 2 == 1 {
            let hi = 0u8;
            let lo = chars.next().unwrap().to_digit(16).unwrap() as u8;
            bytes.push((hi << 4) | lo);
        }
        let rest: Vec<char> = chars.collect();
        for pair in rest.chunks(2) {
            let hi = pair[0].to_digit(16).unwrap() as u8;
            let lo = pair[1].to_digit(16).unwrap() as u8;
            bytes.push((hi << 4) | lo);
        }
        debug_assert_eq!(bytes.len(), padded_len / 2);
        Ok(self.load(&bytes))
    }

    /// Loads a big-endian byte buffer as a new value (swapping into
    /// little-endian limb order), trimmed of leading zero limbs.
    pub fn load(&mut self, bytes: &[u8]) -> BigIntHandle {
        let limbs = bytes_be_to_limbs(bytes);
        let h = self.allocate(limbs.len(), false);
        self.slot_mut(h).limbs[..limbs.len()].copy_from_slice(&limbs);
        self.trim(h);
        h
    }

    /// Renders a value as an exactly `len`-byte big-endian buffer. Fails if
    /// the value's significant bytes don't fit in `len`.
    pub fn save(&self, h: BigIntHandle, len: usize) -> Result<Vec<u8>> {
        let slot = self.slot(h);
        let mut be = Vec::with_capacity(slot.size * 4);
        for &limb in slot.limbs[..slot.size].iter().rev() {
            be.extend_from_slice(&limb.to_be_bytes());
        }
        let first_nonzero = be.iter().position(|&b| b != 0);
        let significant = match first_nonzero {
            Some(i) => &be[i..],
            None => &be[be.len() - 1..], // logical zero: one 0x00 byte
        };
        if significant.len() > len {
            return Err(Error::OutputBufferTooSmall);
        }
        let mut out = vec![0u8; len];
        out[len - significant.len()..].copy_from_slice(significant);
        Ok(out)
    }

    /// Copy-on-write "copy": for a permanent value (`ref_cnt = -1`), returns
    /// the same handle unchanged; otherwise increments `ref_cnt` and returns
    /// the same handle. Every returned handle must eventually be
    /// [`release`](Self::release)d independently.
    pub fn copy(&mut self, h: BigIntHandle) -> BigIntHandle {
        let slot = self.slot_mut(h);
        if slot.ref_cnt != -1 {
            slot.ref_cnt += 1;
        }
        h
    }

    /// A true deep copy: always allocates a fresh, unshared slot.
    pub fn clone_deep(&mut self, h: BigIntHandle) -> BigIntHandle {
        let size = self.slot(h).size;
        let out = self.allocate(size, false);
        let src_limbs = self.slot(h).limbs[..size].to_vec();
        self.slot_mut(out).limbs[..size].copy_from_slice(&src_limbs);
        out
    }

    /// Decrements `ref_cnt`; when it reaches zero the slot is pushed onto
    /// the free list (LIFO) and `active_count` drops. Releasing a permanent
    /// value (`ref_cnt = -1`) is a silent no-op: permanents are managed only
    /// through [`set_modulo`](Self::set_modulo)/[`reset_modulo`](Self::reset_modulo).
    pub fn release(&mut self, h: BigIntHandle) {
        self.check_owner(h);
        let index = h.index;
        let slot = &mut self.slots[index as usize];
        if slot.ref_cnt == -1 {
            return;
        }
        debug_assert!(slot.ref_cnt >= 1, "double release of a BigIntHandle");
        slot.ref_cnt -= 1;
        if slot.ref_cnt == 0 {
            slot.next_free = self.free_list;
            self.free_list = Some(index);
            self.active_count -= 1;
            self.free_count += 1;
        }
    }

    /// Zero-fills every buffer currently sitting on the free list. Anti-
    /// forensic measure the façade calls after any private-key operation so
    /// transient copies of `p`, `q`, `d` don't linger in memory.
    pub fn wipe_released(&mut self) {
        let mut cursor = self.free_list;
        while let Some(idx) = cursor {
            let slot = &mut self.slots[idx as usize];
            for limb in slot.limbs.iter_mut() {
                // Plain assignment here would be simple, but the optimizer
                // is free to elide a write nothing subsequently reads; route
                // through `zeroize` so the wipe survives even when `slot`
                // itself is about to be reused rather than freed.
                use zeroize::Zeroize;
                limb.zeroize();
            }
            cursor = slot.next_free;
        }
    }

    /// Installs `v` as a permanent modulo in `slot`, pre-computing the
    /// Knuth normalization product `v * d` (see [`crate::division`]) as a
    /// second permanent value. Fails if `v` is shared (`ref_cnt != 1`, i.e.
    /// this is a "double-promotion" of a value some other handle still
    /// references) or if `slot` is already occupied.
    pub fn set_modulo(&mut self, v: BigIntHandle, slot: ModuloSlot) -> Result<()> {
        let idx = slot as usize;
        if self.modulo[idx].is_some() {
            return Err(Error::PermanentMisuse);
        }
        if self.slot(v).ref_cnt != 1 {
            return Err(Error::PermanentMisuse);
        }
        let norm = crate::division::normalized_copy(self, v)?;
        self.slot_mut(v).ref_cnt = -1;
        self.slot_mut(norm).ref_cnt = -1;
        self.modulo[idx] = Some(v);
        self.norm_modulo[idx] = Some(norm);
        Ok(())
    }

    /// Reverses [`set_modulo`](Self::set_modulo): demotes the cached value
    /// and its normalized twin back to an ordinary, unique, releasable
    /// value and releases both. Fails if `slot` has nothing installed.
    pub fn reset_modulo(&mut self, slot: ModuloSlot) -> Result<()> {
        let idx = slot as usize;
        let v = self.modulo[idx].take().ok_or(Error::PermanentMisuse)?;
        let norm = self.norm_modulo[idx].take().ok_or(Error::PermanentMisuse)?;
        self.slot_mut(v).ref_cnt = 1;
        self.slot_mut(norm).ref_cnt = 1;
        self.release(v);
        self.release(norm);
        Ok(())
    }

    /// The handle cached for `slot`, if any.
    pub fn modulo_handle(&self, slot: ModuloSlot) -> Option<BigIntHandle> {
        self.modulo[slot as usize]
    }

    /// The pre-normalized (`* d`) twin of `modulo_handle(slot)`, if any.
    pub fn norm_modulo_handle(&self, slot: ModuloSlot) -> Option<BigIntHandle> {
        self.norm_modulo[slot as usize]
    }

    /// Which cached modulo `reduce`/`mod_power` use when the caller passes
    /// "default modulo" (`None`).
    pub fn current_modulo(&self) -> ModuloSlot {
        self.current_modulo
    }

    /// Changes which cached modulo is the default.
    pub fn set_current_modulo(&mut self, slot: ModuloSlot) {
        self.current_modulo = slot;
    }

    /// Strip trailing zero limbs, clamping `size` to at least 1. Idempotent.
    pub fn trim(&mut self, h: BigIntHandle) {
        let slot = self.slot_mut(h);
        while slot.size > 1 && slot.limbs[slot.size - 1] == 0 {
            slot.size -= 1;
        }
    }

    /// The number of meaningful limbs in `h`.
    pub fn size(&self, h: BigIntHandle) -> usize {
        self.slot(h).size
    }

    /// The meaningful limbs of `h`, little-endian, length [`size`](Self::size).
    pub fn limbs(&self, h: BigIntHandle) -> &[Limb] {
        let slot = self.slot(h);
        &slot.limbs[..slot.size]
    }

    /// Returns `Err(Error::Leak)` if any handle (ordinary or permanent) is
    /// still outstanding. Call this explicitly before dropping an arena you
    /// want leak-checked in release builds (`Drop` itself only
    /// `debug_assert`s, since it cannot return a `Result`).
    pub fn check_no_leaks(&self) -> Result<()> {
        if self.active_count != 0 {
            Err(Error::Leak)
        } else {
            Ok(())
        }
    }
}

impl Drop for BigIntArena {
    fn drop(&mut self) {
        self.wipe_released();
        debug_assert_eq!(
            self.active_count, 0,
            "BigIntArena dropped with {} outstanding handle(s) (leak)",
            self.active_count
        );
    }
}

fn bytes_be_to_limbs(bytes: &[u8]) -> Vec<Limb> {
    if bytes.is_empty() {
        return vec![0];
    }
    let pad = (4 - bytes.len() % 4) % 4;
    let mut buf = vec![0u8; pad];
    buf.extend_from_slice(bytes);
    let n = buf.len() / 4;
    let mut limbs = vec![0 as Limb; n];
    for i in 0..n {
        let start = buf.len() - (i + 1) * 4;
        let chunk = [buf[start], buf[start + 1], buf[start + 2], buf[start + 3]];
        limbs[i] = Limb::from_be_bytes(chunk);
    }
    limbs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_logical_zero_has_size_one() {
        let mut arena = BigIntArena::new();
        let h = arena.allocate(1, true);
        assert_eq!(arena.size(h), 1);
        assert_eq!(arena.limbs(h), &[0]);
        arena.release(h);
    }

    #[test]
    fn load_save_round_trip() {
        let mut arena = BigIntArena::new();
        let bytes = [0x12, 0x34, 0x56, 0x78, 0x9a];
        let h = arena.load(&bytes);
        let out = arena.save(h, 5).unwrap();
        assert_eq!(out, bytes);
        arena.release(h);
    }

    #[test]
    fn load_save_with_padding() {
        let mut arena = BigIntArena::new();
        let h = arena.load(&[0x01]);
        let out = arena.save(h, 4).unwrap();
        assert_eq!(out, [0x00, 0x00, 0x00, 0x01]);
        arena.release(h);
    }

    #[test]
    fn save_rejects_too_small_output() {
        let mut arena = BigIntArena::new();
        let h = arena.load(&[0x01, 0x02, 0x03]);
        assert_eq!(arena.save(h, 2), Err(Error::OutputBufferTooSmall));
        arena.release(h);
    }

    #[test]
    fn free_list_is_lifo() {
        let mut arena = BigIntArena::new();
        let a = arena.allocate(2, true);
        let b = arena.allocate(2, true);
        arena.release(a);
        arena.release(b);
        // b was released last, so it must be reused first.
        let c = arena.allocate(2, true);
        assert_eq!(c.index, b.index);
        arena.release(c);
    }

    #[test]
    fn copy_is_cheap_and_shares_the_slot() {
        let mut arena = BigIntArena::new();
        let a = arena.load(&[0xaa]);
        let b = arena.copy(a);
        assert_eq!(a.index, b.index);
        arena.release(a);
        // still referenced by `b`
        assert_eq!(arena.active_count(), 1);
        arena.release(b);
        assert_eq!(arena.active_count(), 0);
    }

    #[test]
    fn clone_deep_allocates_a_new_slot() {
        let mut arena = BigIntArena::new();
        let a = arena.load(&[0xaa]);
        let b = arena.clone_deep(a);
        assert_ne!(a.index, b.index);
        assert_eq!(arena.limbs(a), arena.limbs(b));
        arena.release(a);
        arena.release(b);
    }

    #[test]
    fn set_modulo_rejects_shared_value() {
        let mut arena = BigIntArena::new();
        let n = arena.allocate_from(97);
        let shared = arena.copy(n);
        assert_eq!(arena.set_modulo(n, ModuloSlot::N), Err(Error::PermanentMisuse));
        arena.release(n);
        arena.release(shared);
    }

    #[test]
    fn set_and_reset_modulo_round_trip() {
        let mut arena = BigIntArena::new();
        let n = arena.allocate_from(97);
        arena.set_modulo(n, ModuloSlot::N).unwrap();
        assert!(arena.modulo_handle(ModuloSlot::N).is_some());
        assert_eq!(
            arena.set_modulo(arena.allocate_from(5), ModuloSlot::N),
            Err(Error::PermanentMisuse)
        );
        arena.reset_modulo(ModuloSlot::N).unwrap();
        assert!(arena.modulo_handle(ModuloSlot::N).is_none());
        assert_eq!(arena.active_count(), 0);
    }

    #[test]
    fn wipe_released_zeroes_free_list_buffers() {
        let mut arena = BigIntArena::new();
        let h = arena.load(&[0x11, 0x22, 0x33, 0x44]);
        arena.release(h);
        arena.wipe_released();
        let slot = &arena.slots[h.index as usize];
        assert!(slot.limbs.iter().all(|&l| l == 0));
    }

    #[test]
    fn check_no_leaks_reports_outstanding_handles() {
        let mut arena = BigIntArena::new();
        let h = arena.allocate_from(1);
        assert_eq!(arena.check_no_leaks(), Err(Error::Leak));
        arena.release(h);
        assert_eq!(arena.check_no_leaks(), Ok(()));
    }

    #[test]
    fn allocate_from_hex_matches_load() {
        let mut arena = BigIntArena::new();
        let a = arena.allocate_from_hex("1a2b3c").unwrap();
        let b = arena.load(&[0x1a, 0x2b, 0x3c]);
        assert_eq!(arena.limbs(a), arena.limbs(b));
        arena.release(a);
        arena.release(b);
    }
}
