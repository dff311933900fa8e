//! Hand-written ASN.1 DER encoder/decoder for RSA public/private keys and
//! `DigestInfo`.
//!
//! Deliberately not built on an external `der`/`pkcs1`/`pkcs8`/`spki`
//! crate: this crate's own multi-precision core is the point, so INTEGER
//! fields decode straight into arena handles rather than through an
//! intermediate bignum type a general-purpose DER crate would impose.

use alloc::vec::Vec;

use const_oid::ObjectIdentifier;

use crate::arena::{BigIntArena, BigIntHandle};
use crate::error::{Error, Result};

const TAG_INTEGER: u8 = 0x02;
const TAG_BIT_STRING: u8 = 0x03;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_NULL: u8 = 0x05;
const TAG_OID: u8 = 0x06;
const TAG_SEQUENCE: u8 = 0x30;

/// `1.2.840.113549.1.1.1`, the `rsaEncryption` algorithm identifier PKCS#8
/// and SPKI wrappers carry.
const RSA_ENCRYPTION_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");

fn encode_length(len: usize, out: &mut Vec<u8>) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let be = len.to_be_bytes();
    let first = be.iter().position(|&b| b != 0).unwrap_or(be.len() - 1);
    let sig = &be[first..];
    out.push(0x80 | sig.len() as u8);
    out.extend_from_slice(sig);
}

fn encode_tlv(tag: u8, body: &[u8], out: &mut Vec<u8>) {
    out.push(tag);
    encode_length(body.len(), out);
    out.extend_from_slice(body);
}

fn arena_to_be_bytes(arena: &BigIntArena, h: BigIntHandle) -> Vec<u8> {
    let limbs = arena.limbs(h);
    let mut out = Vec::with_capacity(limbs.len() * 4);
    for &limb in limbs.iter().rev() {
        out.extend_from_slice(&limb.to_be_bytes());
    }
    let first = out.iter().position(|&b| b != 0).unwrap_or(out.len().saturating_sub(1));
    out[first..].to_vec()
}

/// Encodes `h` as a DER INTEGER, inserting a leading `0x00` when the first
/// content byte's high bit is set (so it isn't misread as a negative
/// number — every value in this crate is unsigned).
fn encode_unsigned_integer(arena: &BigIntArena, h: BigIntHandle, out: &mut Vec<u8>) {
    let mut be = arena_to_be_bytes(arena, h);
    if be.is_empty() {
        be.push(0);
    }
    if be[0] & 0x80 != 0 {
        be.insert(0, 0);
    }
    encode_tlv(TAG_INTEGER, &be, out);
}

fn encode_small_integer(v: u8, out: &mut Vec<u8>) {
    encode_tlv(TAG_INTEGER, &[v], out);
}

fn encode_oid(oid: ObjectIdentifier, out: &mut Vec<u8>) {
    encode_tlv(TAG_OID, oid.as_bytes(), out);
}

fn encode_octet_string(body: &[u8], out: &mut Vec<u8>) {
    encode_tlv(TAG_OCTET_STRING, body, out);
}

fn encode_bit_string(body: &[u8], out: &mut Vec<u8>) {
    let mut content = Vec::with_capacity(body.len() + 1);
    content.push(0x00); // zero unused bits
    content.extend_from_slice(body);
    encode_tlv(TAG_BIT_STRING, &content, out);
}

fn encode_rsa_algorithm_identifier(out: &mut Vec<u8>) {
    let mut body = Vec::new();
    encode_oid(RSA_ENCRYPTION_OID, &mut body);
    encode_tlv(TAG_NULL, &[], &mut body);
    encode_tlv(TAG_SEQUENCE, &body, out);
}

/// A cursor over a DER buffer, reading one TLV at a time.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    fn read_length(&mut self) -> Result<usize> {
        let first = *self.data.get(self.pos).ok_or(Error::Asn1)?;
        self.pos += 1;
        if first & 0x80 == 0 {
            return Ok(first as usize);
        }
        let n = (first & 0x7f) as usize;
        if n == 0 || n > core::mem::size_of::<usize>() || self.pos + n > self.data.len() {
            return Err(Error::Asn1);
        }
        let mut len: usize = 0;
        for _ in 0..n {
            len = (len << 8) | self.data[self.pos] as usize;
            self.pos += 1;
        }
        Ok(len)
    }

    fn read_tlv(&mut self, expected_tag: u8) -> Result<&'a [u8]> {
        let tag = *self.data.get(self.pos).ok_or(Error::Asn1)?;
        if tag != expected_tag {
            return Err(Error::Asn1);
        }
        self.pos += 1;
        let len = self.read_length()?;
        let body = self.data.get(self.pos..self.pos + len).ok_or(Error::Asn1)?;
        self.pos += len;
        Ok(body)
    }

    fn at_end(&self) -> bool {
        self.pos == self.data.len()
    }
}

fn decode_unsigned_integer(arena: &mut BigIntArena, body: &[u8]) -> Result<BigIntHandle> {
    if body.is_empty() {
        return Err(Error::Asn1);
    }
    Ok(arena.load(body))
}

fn decode_oid(body: &[u8]) -> Result<ObjectIdentifier> {
    ObjectIdentifier::from_bytes(body).map_err(|_| Error::Asn1)
}

fn verify_rsa_algorithm_identifier(body: &[u8]) -> Result<()> {
    let mut r = Reader::new(body);
    let oid_body = r.read_tlv(TAG_OID)?;
    let oid = decode_oid(oid_body)?;
    if oid != RSA_ENCRYPTION_OID {
        return Err(Error::Asn1);
    }
    // A NULL parameter is conventional here; tolerate its absence since
    // some encoders omit it.
    if !r.at_end() {
        r.read_tlv(TAG_NULL)?;
    }
    if !r.at_end() {
        return Err(Error::Asn1);
    }
    Ok(())
}

/// RFC 8017 A.1.1 `RSAPublicKey`: `SEQUENCE { modulus, publicExponent }`.
pub fn encode_pkcs1_public_key(arena: &BigIntArena, n: BigIntHandle, e: BigIntHandle) -> Vec<u8> {
    let mut body = Vec::new();
    encode_unsigned_integer(arena, n, &mut body);
    encode_unsigned_integer(arena, e, &mut body);
    let mut out = Vec::new();
    encode_tlv(TAG_SEQUENCE, &body, &mut out);
    out
}

pub fn decode_pkcs1_public_key(arena: &mut BigIntArena, der: &[u8]) -> Result<(BigIntHandle, BigIntHandle)> {
    let mut outer = Reader::new(der);
    let seq = outer.read_tlv(TAG_SEQUENCE)?;
    if !outer.at_end() {
        return Err(Error::Asn1);
    }
    let mut r = Reader::new(seq);
    let n_body = r.read_tlv(TAG_INTEGER)?;
    let e_body = r.read_tlv(TAG_INTEGER)?;
    if !r.at_end() {
        return Err(Error::Asn1);
    }
    let n = decode_unsigned_integer(arena, n_body)?;
    let e = decode_unsigned_integer(arena, e_body).map_err(|e_err| {
        arena.release(n);
        e_err
    })?;
    Ok((n, e))
}

/// Every field of RFC 8017 A.1.2 `RSAPrivateKey` (the two-prime form;
/// `otherPrimeInfos` multi-prime extensions are not produced or accepted).
pub struct Pkcs1PrivateKeyFields {
    pub n: BigIntHandle,
    pub e: BigIntHandle,
    pub d: BigIntHandle,
    pub p: BigIntHandle,
    pub q: BigIntHandle,
    pub dp: BigIntHandle,
    pub dq: BigIntHandle,
    pub qinv: BigIntHandle,
}

pub fn encode_pkcs1_private_key(arena: &BigIntArena, k: &Pkcs1PrivateKeyFields) -> Vec<u8> {
    let mut body = Vec::new();
    encode_small_integer(0, &mut body); // version: two-prime
    encode_unsigned_integer(arena, k.n, &mut body);
    encode_unsigned_integer(arena, k.e, &mut body);
    encode_unsigned_integer(arena, k.d, &mut body);
    encode_unsigned_integer(arena, k.p, &mut body);
    encode_unsigned_integer(arena, k.q, &mut body);
    encode_unsigned_integer(arena, k.dp, &mut body);
    encode_unsigned_integer(arena, k.dq, &mut body);
    encode_unsigned_integer(arena, k.qinv, &mut body);
    let mut out = Vec::new();
    encode_tlv(TAG_SEQUENCE, &body, &mut out);
    out
}

pub fn decode_pkcs1_private_key(arena: &mut BigIntArena, der: &[u8]) -> Result<Pkcs1PrivateKeyFields> {
    let mut outer = Reader::new(der);
    let seq = outer.read_tlv(TAG_SEQUENCE)?;
    if !outer.at_end() {
        return Err(Error::Asn1);
    }
    let mut r = Reader::new(seq);
    let version = r.read_tlv(TAG_INTEGER)?;
    if version != [0] {
        return Err(Error::Asn1);
    }
    let n = decode_unsigned_integer(arena, r.read_tlv(TAG_INTEGER)?)?;
    let e = decode_unsigned_integer(arena, r.read_tlv(TAG_INTEGER)?)?;
    let d = decode_unsigned_integer(arena, r.read_tlv(TAG_INTEGER)?)?;
    let p = decode_unsigned_integer(arena, r.read_tlv(TAG_INTEGER)?)?;
    let q = decode_unsigned_integer(arena, r.read_tlv(TAG_INTEGER)?)?;
    let dp = decode_unsigned_integer(arena, r.read_tlv(TAG_INTEGER)?)?;
    let dq = decode_unsigned_integer(arena, r.read_tlv(TAG_INTEGER)?)?;
    let qinv = decode_unsigned_integer(arena, r.read_tlv(TAG_INTEGER)?)?;
    if !r.at_end() {
        return Err(Error::Asn1);
    }
    Ok(Pkcs1PrivateKeyFields { n, e, d, p, q, dp, dq, qinv })
}

/// Wraps an RFC 8017 `RSAPublicKey` in an X.509 `SubjectPublicKeyInfo`.
pub fn encode_spki_public_key(arena: &BigIntArena, n: BigIntHandle, e: BigIntHandle) -> Vec<u8> {
    let pkcs1 = encode_pkcs1_public_key(arena, n, e);
    let mut body = Vec::new();
    encode_rsa_algorithm_identifier(&mut body);
    encode_bit_string(&pkcs1, &mut body);
    let mut out = Vec::new();
    encode_tlv(TAG_SEQUENCE, &body, &mut out);
    out
}

pub fn decode_spki_public_key(arena: &mut BigIntArena, der: &[u8]) -> Result<(BigIntHandle, BigIntHandle)> {
    let mut outer = Reader::new(der);
    let seq = outer.read_tlv(TAG_SEQUENCE)?;
    if !outer.at_end() {
        return Err(Error::Asn1);
    }
    let mut r = Reader::new(seq);
    let alg = r.read_tlv(TAG_SEQUENCE)?;
    verify_rsa_algorithm_identifier(alg)?;
    let bits = r.read_tlv(TAG_BIT_STRING)?;
    if !r.at_end() {
        return Err(Error::Asn1);
    }
    if bits.is_empty() || bits[0] != 0 {
        return Err(Error::Asn1);
    }
    decode_pkcs1_public_key(arena, &bits[1..])
}

/// Wraps an RFC 8017 `RSAPrivateKey` in a PKCS#8 `PrivateKeyInfo`.
pub fn encode_pkcs8_private_key(arena: &BigIntArena, k: &Pkcs1PrivateKeyFields) -> Vec<u8> {
    let pkcs1 = encode_pkcs1_private_key(arena, k);
    let mut body = Vec::new();
    encode_small_integer(0, &mut body); // version
    encode_rsa_algorithm_identifier(&mut body);
    encode_octet_string(&pkcs1, &mut body);
    let mut out = Vec::new();
    encode_tlv(TAG_SEQUENCE, &body, &mut out);
    out
}

pub fn decode_pkcs8_private_key(arena: &mut BigIntArena, der: &[u8]) -> Result<Pkcs1PrivateKeyFields> {
    let mut outer = Reader::new(der);
    let seq = outer.read_tlv(TAG_SEQUENCE)?;
    if !outer.at_end() {
        return Err(Error::Asn1);
    }
    let mut r = Reader::new(seq);
    let version = r.read_tlv(TAG_INTEGER)?;
    if version != [0] {
        return Err(Error::Asn1);
    }
    let alg = r.read_tlv(TAG_SEQUENCE)?;
    verify_rsa_algorithm_identifier(alg)?;
    let octets = r.read_tlv(TAG_OCTET_STRING)?;
    if !r.at_end() {
        return Err(Error::Asn1);
    }
    decode_pkcs1_private_key(arena, octets)
}

/// `DigestInfo ::= SEQUENCE { digestAlgorithm AlgorithmIdentifier, digest
/// OCTET STRING }` (RFC 8017 §9.2), the structure PKCS#1 v1.5 signatures
/// wrap the raw hash output in before padding.
pub fn encode_digest_info(oid: ObjectIdentifier, digest: &[u8]) -> Vec<u8> {
    let mut alg = Vec::new();
    encode_oid(oid, &mut alg);
    encode_tlv(TAG_NULL, &[], &mut alg);
    let mut body = Vec::new();
    encode_tlv(TAG_SEQUENCE, &alg, &mut body);
    encode_octet_string(digest, &mut body);
    let mut out = Vec::new();
    encode_tlv(TAG_SEQUENCE, &body, &mut out);
    out
}

pub fn decode_digest_info(der: &[u8]) -> Result<(ObjectIdentifier, Vec<u8>)> {
    let mut outer = Reader::new(der);
    let seq = outer.read_tlv(TAG_SEQUENCE)?;
    if !outer.at_end() {
        return Err(Error::Asn1);
    }
    let mut r = Reader::new(seq);
    let alg = r.read_tlv(TAG_SEQUENCE)?;
    let digest = r.read_tlv(TAG_OCTET_STRING)?;
    if !r.at_end() {
        return Err(Error::Asn1);
    }
    let mut ar = Reader::new(alg);
    let oid = decode_oid(ar.read_tlv(TAG_OID)?)?;
    Ok((oid, digest.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pkcs1_public_key_round_trips() {
        let mut arena = BigIntArena::new();
        let n = arena.allocate_from_hex("00c1a2b3").unwrap(); // high bit set, exercises the 0x00 prefix path
        let e = arena.allocate_from(65537);
        let der = encode_pkcs1_public_key(&arena, n, e);
        let (n2, e2) = decode_pkcs1_public_key(&mut arena, &der).unwrap();
        assert_eq!(arena.limbs(n), arena.limbs(n2));
        assert_eq!(arena.limbs(e), arena.limbs(e2));
        arena.release(n);
        arena.release(e);
        arena.release(n2);
        arena.release(e2);
    }

    #[test]
    fn spki_public_key_round_trips() {
        let mut arena = BigIntArena::new();
        let n = arena.allocate_from(0x00FFAABB);
        let e = arena.allocate_from(3);
        let der = encode_spki_public_key(&arena, n, e);
        let (n2, e2) = decode_spki_public_key(&mut arena, &der).unwrap();
        assert_eq!(arena.limbs(n), arena.limbs(n2));
        assert_eq!(arena.limbs(e), arena.limbs(e2));
        arena.release(n);
        arena.release(e);
        arena.release(n2);
        arena.release(e2);
    }

    #[test]
    fn pkcs1_private_key_round_trips() {
        let mut arena = BigIntArena::new();
        let fields = Pkcs1PrivateKeyFields {
            n: arena.allocate_from(0x1234_5678),
            e: arena.allocate_from(65537),
            d: arena.allocate_from(0x789a),
            p: arena.allocate_from(61),
            q: arena.allocate_from(53),
            dp: arena.allocate_from(7),
            dq: arena.allocate_from(11),
            qinv: arena.allocate_from(17),
        };
        let der = encode_pkcs1_private_key(&arena, &fields);
        let decoded = decode_pkcs1_private_key(&mut arena, &der).unwrap();
        assert_eq!(arena.limbs(fields.n), arena.limbs(decoded.n));
        assert_eq!(arena.limbs(fields.qinv), arena.limbs(decoded.qinv));

        for h in [fields.n, fields.e, fields.d, fields.p, fields.q, fields.dp, fields.dq, fields.qinv] {
            arena.release(h);
        }
        for h in [decoded.n, decoded.e, decoded.d, decoded.p, decoded.q, decoded.dp, decoded.dq, decoded.qinv] {
            arena.release(h);
        }
    }

    #[test]
    fn pkcs8_wrapper_round_trips() {
        let mut arena = BigIntArena::new();
        let fields = Pkcs1PrivateKeyFields {
            n: arena.allocate_from(0x1234_5678),
            e: arena.allocate_from(65537),
            d: arena.allocate_from(0x789a),
            p: arena.allocate_from(61),
            q: arena.allocate_from(53),
            dp: arena.allocate_from(7),
            dq: arena.allocate_from(11),
            qinv: arena.allocate_from(17),
        };
        let der = encode_pkcs8_private_key(&arena, &fields);
        let decoded = decode_pkcs8_private_key(&mut arena, &der).unwrap();
        assert_eq!(arena.limbs(fields.d), arena.limbs(decoded.d));
        for h in [fields.n, fields.e, fields.d, fields.p, fields.q, fields.dp, fields.dq, fields.qinv] {
            arena.release(h);
        }
        for h in [decoded.n, decoded.e, decoded.d, decoded.p, decoded.q, decoded.dp, decoded.dq, decoded.qinv] {
            arena.release(h);
        }
    }

    #[test]
    fn digest_info_round_trips() {
        let oid = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1"); // sha-256
        let digest = [0xabu8; 32];
        let der = encode_digest_info(oid, &digest);
        let (oid2, digest2) = decode_digest_info(&der).unwrap();
        assert_eq!(oid, oid2);
        assert_eq!(digest.as_slice(), digest2.as_slice());
    }

    #[test]
    fn rejects_trailing_garbage() {
        let mut arena = BigIntArena::new();
        let n = arena.allocate_from(5);
        let e = arena.allocate_from(3);
        let mut der = encode_pkcs1_public_key(&arena, n, e);
        der.push(0xff);
        assert_eq!(decode_pkcs1_public_key(&mut arena, &der), Err(Error::Asn1));
        arena.release(n);
        arena.release(e);
    }
}
