//! A self-contained RSA public-key engine built on a purpose-built
//! multi-precision integer arithmetic layer.
//!
//! Unlike most Rust RSA implementations, the big-integer core here is not
//! borrowed from `num-bigint` or `crypto-bigint`: it is an arena-pooled,
//! reference-counted, copy-on-write multi-precision integer type tuned for
//! this crate's own key-generation and modular-exponentiation needs. See
//! [`arena`] for the allocator and [`bigint`] for the arithmetic built on
//! top of it.
//!
//! # Layout
//!
//! - [`limb`] — half-limb add/sub/mul/div primitives (no allocation).
//! - [`arena`] — the COW, reference-counted big-integer allocator.
//! - [`bigint`] — comparisons, shifts, `add`/`sub`/`mul`, `gcd`, `mod_inverse`,
//!   text rendering.
//! - [`division`] — Knuth Algorithm D long division and modulo.
//! - [`modular`] — normalized reduction against a cached modulo, `mod_power`.
//! - [`primality`] — small-prime sieve, Miller-Rabin, FIPS 186-4 `fill_prime`.
//! - [`keygen`] — FIPS 186-4 §B.3.1/§B.3.3 RSA key-pair generation.
//! - [`pkcs1`] — PKCS#1 v1.5 block-type 1/2 padding.
//! - [`asn1`] — hand-written DER reader/writer for RSA key and signature blobs.
//! - [`rsa`] — the public façade: [`rsa::RsaPrivateKey`] / [`rsa::RsaPublicKey`].
//! - [`hash`] — the `Hasher` abstraction consumed by signing/verification.
//! - [`rng`] — the CSPRNG collaborator traits.
//! - [`pem`] — thin PEM framing glue.
//! - [`factory`] — named-algorithm registry adapter (`RS256`, ...).
//!
//! # Non-goals
//!
//! This crate implements PKCS#1 v1.5 padding only (no OAEP, no PSS), reduces
//! modulo an arbitrary modulus with plain normalized long division (no
//! Barrett or Montgomery form), and does not claim constant-time behavior for
//! modular exponentiation or CRT decryption. See [`rsa`] module docs for the
//! detailed rationale.
#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]

#[cfg(not(feature = "alloc"))]
compile_error!("rsa-arena requires the `alloc` feature (enabled by default via `std`)");

extern crate alloc;

pub mod limb;

pub mod arena;
pub mod bigint;
pub mod division;
pub mod modular;

pub mod primality;

pub mod keygen;
pub mod pkcs1;
pub mod asn1;
pub mod rsa;

pub mod error;
pub mod hash;
pub mod rng;

#[cfg(feature = "pem")]
pub mod pem;

pub mod factory;

pub use crate::arena::{BigIntArena, BigIntHandle};
pub use crate::error::{Error, Result};
pub use crate::rsa::{RsaPrivateKey, RsaPublicKey};
