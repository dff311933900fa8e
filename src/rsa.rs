//! The RSA key façade: key loading/saving, `sign`/`verify`,
//! `encrypt`/`decrypt`, key generation, and `check_private_key`.
//!
//! Each key owns a private, self-contained [`BigIntArena`] — callers never
//! see arena handles. `n` (and, for a private key, `p`/`q`) are registered
//! as the arena's cached moduli via [`BigIntArena::set_modulo`] so they
//! live as permanent values for the lifetime of the key; every other
//! scalar (`e`, `d`, `dP`, `dQ`, `qInv`) is an ordinary arena handle the
//! key's `Drop` releases.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::marker::PhantomData;

#[cfg(not(feature = "std"))]
use core::cell::RefCell;
#[cfg(feature = "std")]
use std::sync::Mutex;

use const_oid::ObjectIdentifier;
use rand_core::CryptoRngCore;
#[cfg(feature = "serde")]
use serdect::serde::{de, Deserialize, Serialize};

use crate::arena::{BigIntArena, BigIntHandle, ModuloSlot};
use crate::bigint::Ordering;
use crate::error::{Error, Result};
use crate::hash::Hasher;
use crate::{asn1, pkcs1};

/// Input bound from §4.10: a public key's modulus must be at least this
/// many bytes to be accepted by any `load_public_*` constructor.
const MIN_MODULUS_BYTES: usize = 10;
/// Same, for the public exponent.
const MIN_EXPONENT_BYTES: usize = 2;

const PUBLIC_PEM_LABEL: &str = "RSA PUBLIC KEY";
const PRIVATE_PEM_LABEL: &str = "RSA PRIVATE KEY";

/// Tiny interior-mutability cell the façade's crypto operations lock for
/// their whole duration, so a key can be shared (`Arc<RsaPrivateKey>`)
/// across threads while `load_*`/`save_*`/`generate`/`check_private_key`
/// (which take `&mut self`, and so need no locking at all) stay simple.
/// Under `alloc`-only builds there is no cross-thread story, so this
/// degrades to a `RefCell`.
#[cfg(feature = "std")]
struct RsaLock<T>(Mutex<T>);
#[cfg(not(feature = "std"))]
struct RsaLock<T>(RefCell<T>);

#[cfg(feature = "std")]
impl<T> RsaLock<T> {
    fn new(v: T) -> Self {
        RsaLock(Mutex::new(v))
    }

    fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.0.lock().expect("rsa facade mutex poisoned");
        f(&mut guard)
    }
}

#[cfg(not(feature = "std"))]
impl<T> RsaLock<T> {
    fn new(v: T) -> Self {
        RsaLock(RefCell::new(v))
    }

    fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.0.borrow_mut();
        f(&mut guard)
    }
}

struct PublicState {
    arena: BigIntArena,
    n: BigIntHandle,
    e: BigIntHandle,
}

impl Drop for PublicState {
    fn drop(&mut self) {
        let _ = self.arena.reset_modulo(ModuloSlot::N);
        self.arena.release(self.e);
        self.arena.wipe_released();
    }
}

/// The public half of an RSA key pair: a modulus and a public exponent.
pub struct RsaPublicKey {
    state: RsaLock<PublicState>,
    modulus_len_bytes: usize,
    modulus_bits: usize,
}

struct PrivateState {
    arena: BigIntArena,
    n: BigIntHandle,
    e: BigIntHandle,
    d: BigIntHandle,
    p: BigIntHandle,
    q: BigIntHandle,
    dp: BigIntHandle,
    dq: BigIntHandle,
    qinv: BigIntHandle,
}

impl Drop for PrivateState {
    fn drop(&mut self) {
        let _ = self.arena.reset_modulo(ModuloSlot::N);
        let _ = self.arena.reset_modulo(ModuloSlot::P);
        let _ = self.arena.reset_modulo(ModuloSlot::Q);
        self.arena.release(self.e);
        self.arena.release(self.d);
        self.arena.release(self.dp);
        self.arena.release(self.dq);
        self.arena.release(self.qinv);
        self.arena.wipe_released();
    }
}

/// A complete RSA key pair: modulus, public exponent, private exponent,
/// the two primes, and the CRT acceleration parameters.
pub struct RsaPrivateKey {
    state: RsaLock<PrivateState>,
    modulus_len_bytes: usize,
    modulus_bits: usize,
}

fn byte_len_of(arena: &BigIntArena, h: BigIntHandle) -> usize {
    (arena.bit_count(h) + 7) / 8
}

/// `m1 = c^dP mod p`, `m2 = c^dQ mod q`, `h = qInv*(m1 + p - m2) mod p`,
/// `plain = m2 + q*h` — the CRT-accelerated private-key operation shared
/// by decryption and signing. Does not consume `c`; every intermediate is
/// released before returning.
fn crt_transform(
    arena: &mut BigIntArena,
    c: BigIntHandle,
    p: BigIntHandle,
    q: BigIntHandle,
    dp: BigIntHandle,
    dq: BigIntHandle,
    qinv: BigIntHandle,
) -> Result<BigIntHandle> {
    let c_mod_p = crate::division::remainder(arena, c, p);
    let c_mod_q = crate::division::remainder(arena, c, q);

    let m1 = arena.mod_power(c_mod_p, dp, p);
    arena.release(c_mod_p);
    let m1 = m1?;
    let m2 = arena.mod_power(c_mod_q, dq, q);
    arena.release(c_mod_q);
    let m2 = match m2 {
        Ok(m2) => m2,
        Err(err) => {
            arena.release(m1);
            return Err(err);
        }
    };

    let m1_plus_p = arena.add(m1, p);
    let diff = arena.sub(m1_plus_p, m2); // m1 + p - m2, always >= 0 since p > q > m2
    arena.release(m1_plus_p);
    let h_raw = arena.mul(qinv, diff);
    arena.release(diff);
    let h = crate::division::remainder(arena, h_raw, p);
    arena.release(h_raw);

    let qh = arena.mul(q, h);
    arena.release(h);
    let plain = arena.add(m2, qh);
    arena.release(qh);
    arena.release(m1);
    arena.release(m2);
    Ok(plain)
}

impl RsaPublicKey {
    fn from_raw(mut arena: BigIntArena, n: BigIntHandle, e: BigIntHandle) -> Result<Self> {
        let modulus_bits = arena.bit_count(n);
        let modulus_len_bytes = byte_len_of(&arena, n);
        let e_len = byte_len_of(&arena, e);
        if modulus_len_bytes < MIN_MODULUS_BYTES || e_len < MIN_EXPONENT_BYTES {
            arena.release(n);
            arena.release(e);
            return Err(Error::InvalidModulus);
        }
        if let Err(err) = arena.set_modulo(n, ModuloSlot::N) {
            arena.release(n);
            arena.release(e);
            return Err(err);
        }
        Ok(RsaPublicKey {
            state: RsaLock::new(PublicState { arena, n, e }),
            modulus_len_bytes,
            modulus_bits,
        })
    }

    /// Loads a public key from its raw `{modulus, exponent}` byte fields.
    pub fn load_public_record(modulus: &[u8], exponent: &[u8]) -> Result<Self> {
        let mut arena = BigIntArena::new();
        let n = arena.load(modulus);
        let e = arena.load(exponent);
        Self::from_raw(arena, n, e)
    }

    /// Loads a bare PKCS#1 `RSAPublicKey` DER `SEQUENCE { modulus, exponent }`
    /// (no `SubjectPublicKeyInfo` wrapper).
    pub fn load_public_binary(der: &[u8]) -> Result<Self> {
        let mut arena = BigIntArena::new();
        let (n, e) = asn1::decode_pkcs1_public_key(&mut arena, der)?;
        Self::from_raw(arena, n, e)
    }

    /// Loads an X.509 `SubjectPublicKeyInfo`-wrapped public key, falling
    /// back to the bare PKCS#1 form if the SPKI parse fails.
    pub fn load_public_der(der: &[u8]) -> Result<Self> {
        let mut arena = BigIntArena::new();
        let pair = match asn1::decode_spki_public_key(&mut arena, der) {
            Ok(pair) => pair,
            Err(_) => asn1::decode_pkcs1_public_key(&mut arena, der)?,
        };
        Self::from_raw(arena, pair.0, pair.1)
    }

    #[cfg(feature = "pem")]
    pub fn load_public_pem(pem: &str) -> Result<Self> {
        let der = crate::pem::pem_to_der(pem)?;
        Self::load_public_der(&der)
    }

    /// Loads a public key from a hex-encoded SPKI/PKCS#1 DER blob.
    pub fn load_public_hexa(hex: &str) -> Result<Self> {
        let der = decode_hex(hex)?;
        Self::load_public_der(&der)
    }

    pub fn save_public_record(&self) -> (Vec<u8>, Vec<u8>) {
        self.state.with(|st| {
            let n_bytes = st
                .arena
                .save(st.n, self.modulus_len_bytes)
                .expect("modulus_len_bytes was computed from n's own bit length");
            let e_bytes = st
                .arena
                .save(st.e, byte_len_of(&st.arena, st.e))
                .expect("exponent byte length was computed from e's own bit length");
            (n_bytes, e_bytes)
        })
    }

    pub fn save_public_der(&self) -> Vec<u8> {
        self.state.with(|st| asn1::encode_spki_public_key(&st.arena, st.n, st.e))
    }

    #[cfg(feature = "pem")]
    pub fn save_public_pem(&self) -> String {
        crate::pem::der_to_pem(&self.save_public_der(), PUBLIC_PEM_LABEL)
    }

    pub fn modulus_bits(&self) -> usize {
        self.modulus_bits
    }

    pub fn modulus_len_bytes(&self) -> usize {
        self.modulus_len_bytes
    }

    /// Pads `msg` per PKCS#1 v1.5 block type 2 and encrypts it with the
    /// public exponent. Two encryptions of the same message differ, since
    /// the padding string is fresh random bytes each call.
    pub fn encrypt(&self, rng: &mut impl CryptoRngCore, msg: &[u8]) -> Result<Vec<u8>> {
        self.state.with(|st| {
            let padded = pkcs1::pad_for_encryption(rng, self.modulus_len_bytes, msg)?;
            let c = st.arena.load(&padded);
            let result = st.arena.mod_power(c, st.e, st.n).and_then(|m| {
                let bytes = st.arena.save(m, self.modulus_len_bytes);
                st.arena.release(m);
                bytes
            });
            st.arena.release(c);
            result
        })
    }

    /// Verifies a PKCS#1 v1.5 block-type-1 signature, returning the
    /// `DigestInfo`'s algorithm OID and the raw digest bytes it wraps.
    /// Callers compare the digest against their own re-hash of the message.
    pub fn verify(&self, sig: &[u8]) -> Result<(ObjectIdentifier, Vec<u8>)> {
        if sig.len() != self.modulus_len_bytes {
            return Err(Error::Verification);
        }
        self.state.with(|st| {
            let c = st.arena.load(sig);
            let result = st.arena.mod_power(c, st.e, st.n).and_then(|m| {
                let bytes = st.arena.save(m, self.modulus_len_bytes);
                st.arena.release(m);
                bytes
            });
            st.arena.release(c);
            let em = result.map_err(|_| Error::Verification)?;
            let digest_info = pkcs1::unpad_from_signing(self.modulus_len_bytes, &em).map_err(|_| Error::Verification)?;
            asn1::decode_digest_info(&digest_info).map_err(|_| Error::Verification)
        })
    }

    /// Convenience wrapper around [`verify`](Self::verify): confirms the
    /// signature both names `H` and wraps exactly `expected_digest`.
    pub fn verify_digest<H: Hasher>(&self, sig: &[u8], expected_digest: &[u8]) -> Result<()> {
        let (oid, digest) = self.verify(sig)?;
        if oid == H::oid() && digest == expected_digest {
            Ok(())
        } else {
            Err(Error::Verification)
        }
    }
}

/// Serializes to the key's SPKI DER encoding, hex-framed for
/// human-readable formats and raw bytes for binary ones.
#[cfg(feature = "serde")]
impl Serialize for RsaPublicKey {
    fn serialize<S>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error>
    where
        S: serdect::serde::Serializer,
    {
        serdect::slice::serialize_hex_lower_or_bin(&self.save_public_der(), serializer)
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for RsaPublicKey {
    fn deserialize<D>(deserializer: D) -> core::result::Result<Self, D::Error>
    where
        D: serdect::serde::Deserializer<'de>,
    {
        let der = serdect::slice::deserialize_hex_or_bin_vec(deserializer)?;
        Self::load_public_der(&der).map_err(de::Error::custom)
    }
}

impl RsaPrivateKey {
    fn from_raw(mut arena: BigIntArena, f: asn1::Pkcs1PrivateKeyFields) -> Result<Self> {
        let asn1::Pkcs1PrivateKeyFields { n, e, d, p, q, dp, dq, qinv } = f;
        let modulus_bits = arena.bit_count(n);
        let modulus_len_bytes = byte_len_of(&arena, n);
        let e_len = byte_len_of(&arena, e);
        if modulus_len_bytes < MIN_MODULUS_BYTES || e_len < MIN_EXPONENT_BYTES {
            for h in [n, e, d, p, q, dp, dq, qinv] {
                arena.release(h);
            }
            return Err(Error::InvalidModulus);
        }
        if let Err(err) = arena.set_modulo(n, ModuloSlot::N) {
            for h in [n, e, d, p, q, dp, dq, qinv] {
                arena.release(h);
            }
            return Err(err);
        }
        if let Err(err) = arena.set_modulo(p, ModuloSlot::P) {
            let _ = arena.reset_modulo(ModuloSlot::N);
            for h in [e, d, p, q, dp, dq, qinv] {
                arena.release(h);
            }
            return Err(err);
        }
        if let Err(err) = arena.set_modulo(q, ModuloSlot::Q) {
            let _ = arena.reset_modulo(ModuloSlot::N);
            let _ = arena.reset_modulo(ModuloSlot::P);
            for h in [e, d, q, dp, dq, qinv] {
                arena.release(h);
            }
            return Err(err);
        }
        Ok(RsaPrivateKey {
            state: RsaLock::new(PrivateState { arena, n, e, d, p, q, dp, dq, qinv }),
            modulus_len_bytes,
            modulus_bits,
        })
    }

    /// Generates a fresh key pair of `bits`-bit modulus size with the
    /// given public exponent (typically 65537). `iterations` is the
    /// requested Miller-Rabin round count per prime candidate (coerced up
    /// to the FIPS 186-4 minimum for `bits` by [`BigIntArena::fill_prime`]);
    /// `timeout_ms`, under the `std` feature, additionally bounds each
    /// prime search by wall-clock time. Retries internally per
    /// [`BigIntArena::generate_rsa_key`]'s `max_attempts` budget.
    pub fn generate(
        rng: &mut impl CryptoRngCore,
        bits: usize,
        public_exponent: u32,
        iterations: u32,
        max_attempts: u32,
        timeout_ms: Option<u64>,
    ) -> Result<Self> {
        let mut arena = BigIntArena::new();
        let e = arena.allocate_from(public_exponent);
        let generated = match arena.generate_rsa_key(bits, e, iterations, rng, max_attempts, timeout_ms) {
            Ok(g) => g,
            Err(err) => {
                arena.release(e);
                return Err(err);
            }
        };
        arena.release(e);
        let fields = asn1::Pkcs1PrivateKeyFields {
            n: generated.n,
            e: generated.e,
            d: generated.d,
            p: generated.p,
            q: generated.q,
            dp: generated.dp,
            dq: generated.dq,
            qinv: generated.qinv,
        };
        Self::from_raw(arena, fields)
    }

    /// Loads a private key from its raw PKCS#1 field byte strings, in the
    /// order `n, e, d, p, q, dP, dQ, qInv`.
    pub fn load_private_record(fields: [&[u8]; 8]) -> Result<Self> {
        let mut arena = BigIntArena::new();
        let [n, e, d, p, q, dp, dq, qinv] = fields;
        let loaded = asn1::Pkcs1PrivateKeyFields {
            n: arena.load(n),
            e: arena.load(e),
            d: arena.load(d),
            p: arena.load(p),
            q: arena.load(q),
            dp: arena.load(dp),
            dq: arena.load(dq),
            qinv: arena.load(qinv),
        };
        Self::from_raw(arena, loaded)
    }

    /// Loads a PKCS#8-wrapped private key, falling back to the bare
    /// PKCS#1 form if the PKCS#8 parse fails.
    pub fn load_private_der(der: &[u8]) -> Result<Self> {
        let mut arena = BigIntArena::new();
        let fields = match asn1::decode_pkcs8_private_key(&mut arena, der) {
            Ok(fields) => fields,
            Err(_) => asn1::decode_pkcs1_private_key(&mut arena, der)?,
        };
        Self::from_raw(arena, fields)
    }

    #[cfg(feature = "pem")]
    pub fn load_private_pem(pem: &str) -> Result<Self> {
        let der = crate::pem::pem_to_der(pem)?;
        Self::load_private_der(&der)
    }

    pub fn save_private_record(&self) -> [Vec<u8>; 8] {
        self.state.with(|st| {
            let save = |h: BigIntHandle| st.arena.save(h, byte_len_of(&st.arena, h)).expect("length derived from the handle's own bit count");
            [
                save(st.n),
                save(st.e),
                save(st.d),
                save(st.p),
                save(st.q),
                save(st.dp),
                save(st.dq),
                save(st.qinv),
            ]
        })
    }

    pub fn save_private_der(&self) -> Vec<u8> {
        self.state.with(|st| {
            let fields = asn1::Pkcs1PrivateKeyFields {
                n: st.n,
                e: st.e,
                d: st.d,
                p: st.p,
                q: st.q,
                dp: st.dp,
                dq: st.dq,
                qinv: st.qinv,
            };
            asn1::encode_pkcs8_private_key(&st.arena, &fields)
        })
    }

    #[cfg(feature = "pem")]
    pub fn save_private_pem(&self) -> String {
        crate::pem::der_to_pem(&self.save_private_der(), PRIVATE_PEM_LABEL)
    }

    pub fn modulus_bits(&self) -> usize {
        self.modulus_bits
    }

    pub fn modulus_len_bytes(&self) -> usize {
        self.modulus_len_bytes
    }

    /// The public half of this key pair, in a freshly allocated arena of
    /// its own.
    pub fn public_key(&self) -> Result<RsaPublicKey> {
        let (n_bytes, e_bytes) = self.state.with(|st| {
            (
                st.arena.save(st.n, self.modulus_len_bytes).expect("modulus_len_bytes derived from n"),
                st.arena.save(st.e, byte_len_of(&st.arena, st.e)).expect("length derived from e"),
            )
        });
        RsaPublicKey::load_public_record(&n_bytes, &e_bytes)
    }

    /// CRT-decrypts `ciphertext` (must be exactly `modulus_len_bytes`
    /// long) and reverses PKCS#1 v1.5 block-type-2 padding.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() != self.modulus_len_bytes {
            return Err(Error::OutputBufferTooSmall);
        }
        self.state.with(|st| {
            let c = st.arena.load(ciphertext);
            let result = crt_transform(&mut st.arena, c, st.p, st.q, st.dp, st.dq, st.qinv).and_then(|m| {
                let bytes = st.arena.save(m, self.modulus_len_bytes);
                st.arena.release(m);
                bytes
            });
            st.arena.release(c);
            let em = result?;
            pkcs1::unpad_from_encryption(self.modulus_len_bytes, &em)
        })
    }

    /// Wraps `digest` (the caller's own pre-computed hash of type `H`) in
    /// a `DigestInfo`, pads it per PKCS#1 v1.5 block type 1, and signs it
    /// via CRT.
    pub fn sign<H: Hasher>(&self, digest: &[u8]) -> Result<Vec<u8>> {
        let wrapped = crate::hash::wrap_digest::<H>(digest);
        self.state.with(|st| {
            let padded = pkcs1::pad_for_signing(self.modulus_len_bytes, &wrapped)?;
            let m = st.arena.load(&padded);
            let result = crt_transform(&mut st.arena, m, st.p, st.q, st.dp, st.dq, st.qinv).and_then(|sig| {
                let bytes = st.arena.save(sig, self.modulus_len_bytes);
                st.arena.release(sig);
                bytes
            });
            st.arena.release(m);
            result
        })
    }

    /// Verifies the key's own internal consistency: `p*q = n`, `e` passes
    /// a small-prime sieve, `qInv*q ≡ 1 (mod p)`, `d ≡ dP (mod p-1)`,
    /// `d ≡ dQ (mod q-1)`, `gcd(e, (p-1)(q-1)) = 1`, and
    /// `e*d ≡ 1 (mod (p-1)(q-1))`.
    pub fn check_private_key(&self) -> bool {
        self.state.with(|st| {
            let arena = &mut st.arena;

            let pq = arena.mul(st.p, st.q);
            let pq_ok = arena.compare(pq, st.n) == Ordering::Equal;
            arena.release(pq);
            if !pq_ok {
                return false;
            }

            if !is_probably_prime_by_sieve(arena, st.e) {
                return false;
            }

            let one = arena.allocate_from(1);
            let p_minus_1 = arena.sub(st.p, one);
            let q_minus_1 = arena.sub(st.q, one);
            arena.release(one);

            let qinv_q = arena.mul(st.qinv, st.q);
            let qinv_q_mod_p = crate::division::remainder(arena, qinv_q, st.p);
            arena.release(qinv_q);
            let qinv_ok = is_one(arena, qinv_q_mod_p);
            arena.release(qinv_q_mod_p);

            let d_mod_p1 = crate::division::remainder(arena, st.d, p_minus_1);
            let dp_ok = arena.compare(d_mod_p1, st.dp) == Ordering::Equal;
            arena.release(d_mod_p1);

            let d_mod_q1 = crate::division::remainder(arena, st.d, q_minus_1);
            let dq_ok = arena.compare(d_mod_q1, st.dq) == Ordering::Equal;
            arena.release(d_mod_q1);

            let phi = arena.mul(p_minus_1, q_minus_1);
            arena.release(p_minus_1);
            arena.release(q_minus_1);

            let gcd_ok = match arena.gcd(st.e, phi) {
                Ok(g) => {
                    let ok = is_one(arena, g);
                    arena.release(g);
                    ok
                }
                Err(_) => false,
            };

            let ed = arena.mul(st.e, st.d);
            let ed_mod_phi = crate::division::remainder(arena, ed, phi);
            arena.release(ed);
            let ed_ok = is_one(arena, ed_mod_phi);
            arena.release(ed_mod_phi);
            arena.release(phi);

            qinv_ok && dp_ok && dq_ok && gcd_ok && ed_ok
        })
    }
}

/// Serializes to the key's PKCS#8 DER encoding, hex-framed for
/// human-readable formats and raw bytes for binary ones. Zeroizes the
/// intermediate DER buffer is not attempted here since `serdect` takes it
/// by value; callers handling untrusted deserializers should treat the
/// wire representation as sensitive regardless.
#[cfg(feature = "serde")]
impl Serialize for RsaPrivateKey {
    fn serialize<S>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error>
    where
        S: serdect::serde::Serializer,
    {
        serdect::slice::serialize_hex_lower_or_bin(&self.save_private_der(), serializer)
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for RsaPrivateKey {
    fn deserialize<D>(deserializer: D) -> core::result::Result<Self, D::Error>
    where
        D: serdect::serde::Deserializer<'de>,
    {
        let der = serdect::slice::deserialize_hex_or_bin_vec(deserializer)?;
        Self::load_private_der(&der).map_err(de::Error::custom)
    }
}

fn is_one(arena: &BigIntArena, h: BigIntHandle) -> bool {
    arena.size(h) == 1 && arena.limbs(h)[0] == 1
}

/// A cheap, non-cryptographic primality heuristic for `check_private_key`'s
/// `e.is_prime` condition: RSA public exponents are small enough
/// (typically `3`, `17`, `65537`) that surviving trial division by every
/// prime below 300 already conclusively settles primality for anything
/// under `300^2`; for larger exponents this degrades to "not obviously
/// composite", which is the right trade-off for a self-consistency check
/// that must not itself draw fresh randomness from the caller.
fn is_probably_prime_by_sieve(arena: &BigIntArena, e: BigIntHandle) -> bool {
    if arena.size(e) == 1 && arena.limbs(e)[0] <= 1 {
        return false;
    }
    if arena.size(e) == 1 && (arena.limbs(e)[0] == 2 || arena.limbs(e)[0] == 3) {
        return true;
    }
    if arena.is_even(e) {
        return false;
    }
    !arena.matches_known_prime(e, crate::primality::SieveCoverage::All)
}

fn decode_hex(s: &str) -> Result<Vec<u8>> {
    let s = s.trim();
    if s.len() % 2 != 0 {
        return Err(Error::Asn1);
    }
    let mut out = Vec::with_capacity(s.len() / 2);
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let hi = hex_val(bytes[i]).ok_or(Error::Asn1)?;
        let lo = hex_val(bytes[i + 1]).ok_or(Error::Asn1)?;
        out.push((hi << 4) | lo);
        i += 2;
    }
    Ok(out)
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// A fixed-size PKCS#1 v1.5 signature, produced by [`SigningKey`] and
/// consumed by [`VerifyingKey`] through the `signature` crate's traits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature(Vec<u8>);

impl signature::SignatureEncoding for Signature {
    type Repr = Box<[u8]>;
}

impl TryFrom<&[u8]> for Signature {
    type Error = signature::Error;

    fn try_from(bytes: &[u8]) -> signature::Result<Self> {
        Ok(Signature(bytes.to_vec()))
    }
}

impl From<Signature> for Box<[u8]> {
    fn from(sig: Signature) -> Box<[u8]> {
        sig.0.into_boxed_slice()
    }
}

#[cfg(feature = "serde")]
impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error>
    where
        S: serdect::serde::Serializer,
    {
        serdect::slice::serialize_hex_lower_or_bin(&self.0, serializer)
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> core::result::Result<Self, D::Error>
    where
        D: serdect::serde::Deserializer<'de>,
    {
        serdect::slice::deserialize_hex_or_bin_vec(deserializer).map(Signature)
    }
}

/// Binds an [`RsaPrivateKey`] to a digest algorithm `H` so it can be used
/// through [`signature::Signer`].
pub struct SigningKey<'a, H> {
    key: &'a RsaPrivateKey,
    _hash: PhantomData<H>,
}

impl<'a, H> SigningKey<'a, H> {
    pub fn new(key: &'a RsaPrivateKey) -> Self {
        SigningKey { key, _hash: PhantomData }
    }
}

impl<'a, H: Hasher> signature::Signer<Signature> for SigningKey<'a, H> {
    fn try_sign(&self, msg: &[u8]) -> signature::Result<Signature> {
        let digest = H::digest(msg);
        self.key.sign::<H>(&digest).map(Signature).map_err(|_| signature::Error::new())
    }
}

/// Binds an [`RsaPublicKey`] to a digest algorithm `H` so it can be used
/// through [`signature::Verifier`].
pub struct VerifyingKey<'a, H> {
    key: &'a RsaPublicKey,
    _hash: PhantomData<H>,
}

impl<'a, H> VerifyingKey<'a, H> {
    pub fn new(key: &'a RsaPublicKey) -> Self {
        VerifyingKey { key, _hash: PhantomData }
    }
}

impl<'a, H: Hasher> signature::Verifier<Signature> for VerifyingKey<'a, H> {
    fn verify(&self, msg: &[u8], signature: &Signature) -> signature::Result<()> {
        let digest = H::digest(msg);
        self.key.verify_digest::<H>(&signature.0, &digest).map_err(|_| signature::Error::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;
    use sha2::{Digest, Sha256};
    use signature::{Signer, Verifier};

    fn test_key(bits: usize, seed: u64) -> RsaPrivateKey {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        RsaPrivateKey::generate(&mut rng, bits, 65537, 0, 10_000, None).unwrap()
    }

    #[test]
    fn generated_key_is_self_consistent() {
        let key = test_key(512, 1);
        assert!(key.check_private_key());
        assert_eq!(key.modulus_bits(), 256);
    }

    #[test]
    fn encrypt_decrypt_round_trips() {
        let key = test_key(512, 2);
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let pub_key = key.public_key().unwrap();
        let msg = b"hi";
        let ct1 = pub_key.encrypt(&mut rng, msg).unwrap();
        let ct2 = pub_key.encrypt(&mut rng, msg).unwrap();
        assert_ne!(ct1, ct2); // fresh random padding each time
        assert_eq!(key.decrypt(&ct1).unwrap(), msg);
        assert_eq!(key.decrypt(&ct2).unwrap(), msg);
    }

    #[test]
    fn sign_verify_round_trips() {
        let key = test_key(512, 4);
        let pub_key = key.public_key().unwrap();
        let digest = Sha256::digest(b"message").to_vec();
        let sig = key.sign::<Sha256>(&digest).unwrap();
        assert_eq!(sig.len(), key.modulus_len_bytes());
        pub_key.verify_digest::<Sha256>(&sig, &digest).unwrap();
    }

    #[test]
    fn tampered_signature_fails_verification() {
        let key = test_key(512, 5);
        let pub_key = key.public_key().unwrap();
        let digest = Sha256::digest(b"message").to_vec();
        let mut sig = key.sign::<Sha256>(&digest).unwrap();
        sig[sig.len() - 1] ^= 0x01;
        assert!(pub_key.verify_digest::<Sha256>(&sig, &digest).is_err());
    }

    #[test]
    fn der_round_trip_preserves_keys() {
        let key = test_key(512, 6);
        let der = key.save_private_der();
        let reloaded = RsaPrivateKey::load_private_der(&der).unwrap();
        assert!(reloaded.check_private_key());

        let pub_der = key.public_key().unwrap().save_public_der();
        let reloaded_pub = RsaPublicKey::load_public_der(&pub_der).unwrap();
        assert_eq!(reloaded_pub.modulus_bits(), key.modulus_bits());
    }

    #[test]
    fn bad_padding_is_rejected() {
        let key = test_key(512, 7);
        let mut buf = alloc::vec![0u8; key.modulus_len_bytes()];
        buf[0] = 0x00;
        buf[1] = 0x03; // neither 0x01 nor 0x02
        assert!(key.decrypt(&buf).is_err());
    }

    #[test]
    fn corrupted_dp_fails_consistency_check() {
        let key = test_key(512, 8);
        let mut fields = key.save_private_record();
        fields[5][0] ^= 0xff; // corrupt dP
        let corrupted = RsaPrivateKey::load_private_record([
            &fields[0], &fields[1], &fields[2], &fields[3], &fields[4], &fields[5], &fields[6], &fields[7],
        ])
        .unwrap();
        assert!(!corrupted.check_private_key());
    }

    #[test]
    #[cfg(feature = "serde")]
    fn signature_serde_round_trips_as_hex() {
        use serde_test::{assert_tokens, Configure, Token};
        let sig = Signature(alloc::vec![0xab, 0xcd]);
        assert_tokens(&sig.readable(), &[Token::Str("abcd")]);
    }

    #[test]
    fn signer_verifier_trait_round_trip() {
        let key = test_key(512, 9);
        let pub_key = key.public_key().unwrap();
        let signer = SigningKey::<Sha256>::new(&key);
        let verifier = VerifyingKey::<Sha256>::new(&pub_key);
        let sig = signer.try_sign(b"hello").unwrap();
        verifier.verify(b"hello", &sig).unwrap();
    }
}
