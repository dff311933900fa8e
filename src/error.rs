//! The crate's single error type.
//!
//! Every fallible operation in this crate returns [`Result<T>`]. Variants are
//! grouped the way the design calls them out: programmer misuse, malformed
//! wire format, malformed padding, deadline expiry, and weak randomness.
//! Nothing here is retried except where a module's own docs say so
//! (Miller-Rabin witness selection, bit-density rerolls); every other
//! failure surfaces immediately to the caller.

use core::fmt;

/// Crate-wide result alias.
pub type Result<T> = core::result::Result<T, Error>;

/// Everything that can go wrong in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    // -- misuse: programmer error, fatal to the operation --
    /// A key object already holds material; `load_*` was called twice.
    AlreadyLoaded,
    /// `set_permanent`/`reset_permanent` called on a value with the wrong
    /// reference count (double-promotion or double-demotion of a modulo slot).
    PermanentMisuse,
    /// A [`crate::arena::BigIntHandle`] from one arena was passed to another.
    CrossArena,
    /// `generate` was asked for a bit length outside the supported set.
    InvalidBitSize,
    /// A padding buffer was too short for the requested message length.
    MessageTooLong,
    /// `mod_inverse` was called with a modulus `<= 1`.
    InvalidModulusForInverse,
    /// `gcd` was called with one or both operands zero.
    InvalidGcdOperand,
    /// `primes.len() < 2` when constructing a key from components.
    NprimesTooSmall,
    /// Two supplied primes were equal.
    InvalidPrime,
    /// The output buffer supplied to an encode routine was too small.
    OutputBufferTooSmall,

    // -- crypto-format: malformed wire data, or a key that fails its own checks --
    /// The modulus is even, non-positive, or the exponent is `>=` the modulus.
    InvalidModulus,
    /// The public exponent is even, too small, or too large.
    InvalidExponent,
    /// `n.bits() > RsaPublicKey::MAX_SIZE`.
    ModulusTooLarge,
    /// The public exponent is below [`crate::rsa::RsaPublicKey::MIN_PUB_EXPONENT`].
    PublicExponentTooSmall,
    /// The public exponent is above [`crate::rsa::RsaPublicKey::MAX_PUB_EXPONENT`].
    PublicExponentTooLarge,
    /// `check_private_key` found an internal inconsistency (see that method's docs).
    InvalidPrivateKey,
    /// ASN.1 DER parsing failed: bad tag, truncated length, or trailing bytes.
    Asn1,
    /// PEM framing failed (bad header/footer or base64).
    Pem,
    /// A DigestInfo's algorithm OID was not recognized.
    UnknownDigestAlgorithm,

    // -- padding --
    /// PKCS#1 v1.5 padding was malformed on decrypt/verify.
    InvalidPadding,
    /// The decrypted/verified digest did not match the expected one.
    Verification,

    // -- timing / randomness --
    /// `fill_prime`/`generate` hit their deadline before finding a key.
    Timeout,
    /// The RNG failed FIPS 186-4 bit-density checks (or Miller-Rabin witness
    /// selection) too many times in a row to trust it further.
    WeakRandomness,

    // -- arena lifecycle --
    /// The arena was dropped (or `check_no_leaks` was called) while
    /// `active_count != 0`: some handle was never released.
    Leak,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::AlreadyLoaded => "key already holds material",
            Error::PermanentMisuse => "permanent-value promotion/demotion precondition violated",
            Error::CrossArena => "bigint handle used with the wrong arena",
            Error::InvalidBitSize => "unsupported RSA modulus bit length",
            Error::MessageTooLong => "message too long for this modulus and padding scheme",
            Error::InvalidModulusForInverse => "mod_inverse requires a modulus > 1",
            Error::InvalidGcdOperand => "gcd requires both operands to be nonzero",
            Error::NprimesTooSmall => "fewer than two primes supplied",
            Error::InvalidPrime => "supplied primes are not pairwise distinct",
            Error::OutputBufferTooSmall => "output buffer too small",
            Error::InvalidModulus => "modulus is even, non-positive, or <= exponent",
            Error::InvalidExponent => "public exponent is even or out of range",
            Error::ModulusTooLarge => "modulus exceeds the maximum supported size",
            Error::PublicExponentTooSmall => "public exponent below the minimum",
            Error::PublicExponentTooLarge => "public exponent above the maximum",
            Error::InvalidPrivateKey => "private key failed its consistency checks",
            Error::Asn1 => "malformed ASN.1 DER",
            Error::Pem => "malformed PEM framing",
            Error::UnknownDigestAlgorithm => "unrecognized DigestInfo algorithm OID",
            Error::InvalidPadding => "malformed PKCS#1 v1.5 padding",
            Error::Verification => "signature verification failed",
            Error::Timeout => "deadline elapsed before completion",
            Error::WeakRandomness => "RNG appears too weak to trust",
            Error::Leak => "arena destroyed with outstanding bigint handles",
        };
        f.write_str(msg)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
