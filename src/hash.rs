//! The digest abstraction PKCS#1 v1.5 signing and verification are generic
//! over, plus `DigestInfo` framing of a raw hash output.
//!
//! Any type implementing [`digest::Digest`] and [`const_oid::AssociatedOid`]
//! (`sha1::Sha1`, `sha2::Sha256`, `sha2::Sha384`, `sha2::Sha512`, ...)
//! implements [`Hasher`] for free.

use alloc::vec::Vec;

use const_oid::{AssociatedOid, ObjectIdentifier};
use digest::Digest;

use crate::asn1;
use crate::error::{Error, Result};

/// A named hash function PKCS#1 v1.5 can wrap a digest for.
pub trait Hasher {
    /// The algorithm's DER OID, carried in the `DigestInfo` wrapper.
    fn oid() -> ObjectIdentifier;
    /// Raw output length in bytes.
    fn output_size() -> usize;
    /// Hashes `data` and returns the raw digest (not yet DER-wrapped).
    fn digest(data: &[u8]) -> Vec<u8>;
}

impl<D: Digest + AssociatedOid> Hasher for D {
    fn oid() -> ObjectIdentifier {
        D::OID
    }

    fn output_size() -> usize {
        <D as Digest>::output_size()
    }

    fn digest(data: &[u8]) -> Vec<u8> {
        D::digest(data).to_vec()
    }
}

/// Wraps a raw digest in a `DigestInfo` DER structure identifying `H` as
/// the algorithm that produced it — the value PKCS#1 v1.5 signing pads and
/// signing verification unpads.
pub fn wrap_digest<H: Hasher>(raw_digest: &[u8]) -> Vec<u8> {
    debug_assert_eq!(raw_digest.len(), H::output_size());
    asn1::encode_digest_info(H::oid(), raw_digest)
}

/// Reverses [`wrap_digest`], checking that the wrapped OID matches `H` and
/// returning the raw digest bytes.
pub fn unwrap_digest<H: Hasher>(digest_info: &[u8]) -> Result<Vec<u8>> {
    let (oid, digest) = asn1::decode_digest_info(digest_info).map_err(|_| Error::Asn1)?;
    if oid != H::oid() {
        return Err(Error::UnknownDigestAlgorithm);
    }
    if digest.len() != H::output_size() {
        return Err(Error::Asn1);
    }
    Ok(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};

    #[test]
    fn wrap_and_unwrap_round_trip() {
        let digest = Sha256::digest(b"hello world").to_vec();
        let wrapped = wrap_digest::<Sha256>(&digest);
        let unwrapped = unwrap_digest::<Sha256>(&wrapped).unwrap();
        assert_eq!(unwrapped, digest);
    }

    #[test]
    fn unwrap_rejects_mismatched_algorithm() {
        use sha1::Sha1;
        let digest = Sha256::digest(b"hello world").to_vec();
        let wrapped = wrap_digest::<Sha256>(&digest);
        assert_eq!(unwrap_digest::<Sha1>(&wrapped).unwrap_err(), Error::UnknownDigestAlgorithm);
    }

    #[test]
    fn hasher_blanket_impl_matches_direct_call() {
        let via_trait = <Sha256 as Hasher>::digest(b"abc");
        let direct = Sha256::digest(b"abc").to_vec();
        assert_eq!(via_trait, direct);
        assert_eq!(<Sha256 as Hasher>::output_size(), 32);
    }
}
