//! PKCS#1 v1.5 block-type 1 (signing) and block-type 2 (encryption)
//! padding, operating on raw byte buffers the size of the modulus.
//!
//! The unpad routines scan the whole `k`-byte buffer unconditionally and
//! accumulate an `ok`/`bad` [`subtle::Choice`] rather than returning as soon
//! as a malformed byte is found, the same constant-layout style the
//! reference PKCS#1 v1.5 implementation this is grounded on uses, so a
//! caller timing the call can't learn *where* in the buffer padding first
//! went wrong.

use alloc::vec;
use alloc::vec::Vec;

use rand_core::CryptoRngCore;
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};

use crate::error::{Error, Result};

/// Minimum total overhead (`0x00 0x02 ... 0x00`, at least 8 bytes of
/// padding string) PKCS#1 v1.5 encryption padding requires.
const MIN_ENCRYPTION_PAD_LEN: usize = 11;
/// Minimum overhead (`0x00 0x01 ... 0x00`) PKCS#1 v1.5 signing padding
/// requires; the padding string itself may be as short as a single byte.
const MIN_SIGNING_PAD_LEN: usize = 11;

/// Fills `dest` with nonzero random bytes (rejection sampling each byte),
/// as PKCS#1 v1.5's padding string PS requires for block type 2.
fn fill_nonzero_random(rng: &mut impl CryptoRngCore, dest: &mut [u8]) {
    let mut i = 0;
    while i < dest.len() {
        let mut chunk = vec![0u8; dest.len() - i];
        rng.fill_bytes(&mut chunk);
        for b in chunk {
            if b != 0 {
                dest[i] = b;
                i += 1;
                if i == dest.len() {
                    break;
                }
            }
        }
    }
}

/// Block type 2 (encryption) padding: `0x00 || 0x02 || PS || 0x00 || M`,
/// `PS` nonzero random bytes padding the whole thing out to exactly `k`
/// bytes (`k` is the modulus size in bytes).
pub fn pad_for_encryption(rng: &mut impl CryptoRngCore, k: usize, msg: &[u8]) -> Result<Vec<u8>> {
    if msg.len() + MIN_ENCRYPTION_PAD_LEN > k {
        return Err(Error::MessageTooLong);
    }
    let ps_len = k - msg.len() - 3;
    let mut out = vec![0u8; k];
    out[1] = 0x02;
    fill_nonzero_random(rng, &mut out[2..2 + ps_len]);
    out[2 + ps_len] = 0x00;
    out[3 + ps_len..].copy_from_slice(msg);
    Ok(out)
}

/// Block type 1 (signing) padding: `0x00 || 0x01 || PS || 0x00 || M`, `PS`
/// all `0xFF` bytes.
pub fn pad_for_signing(k: usize, msg: &[u8]) -> Result<Vec<u8>> {
    if msg.len() + MIN_SIGNING_PAD_LEN > k {
        return Err(Error::MessageTooLong);
    }
    let ps_len = k - msg.len() - 3;
    let mut out = vec![0u8; k];
    out[1] = 0x01;
    out[2..2 + ps_len].fill(0xff);
    out[2 + ps_len] = 0x00;
    out[3 + ps_len..].copy_from_slice(msg);
    Ok(out)
}

/// Reverses [`pad_for_encryption`], checking the full `0x00 0x02 PS 0x00`
/// header shape in constant layout. `em` must be exactly `k` bytes.
pub fn unpad_from_encryption(k: usize, em: &[u8]) -> Result<Vec<u8>> {
    debug_assert_eq!(em.len(), k);
    if k < MIN_ENCRYPTION_PAD_LEN {
        return Err(Error::InvalidPadding);
    }

    let mut ok = em[0].ct_eq(&0x00) & em[1].ct_eq(&0x02);
    let mut looking_for_zero = Choice::from(1u8);
    let mut zero_index: usize = 0;

    for i in 2..k {
        let is_zero = em[i].ct_eq(&0x00);
        // Record the first zero byte we see while still scanning the
        // padding string; once found, stop treating later zero bytes as
        // the terminator.
        let record_here = looking_for_zero & is_zero;
        zero_index = usize::conditional_select(&zero_index, &i, record_here);
        looking_for_zero &= !is_zero;
    }
    // The header must actually contain a terminating zero byte.
    ok &= !looking_for_zero;

    if !bool::from(ok) {
        return Err(Error::InvalidPadding);
    }
    Ok(em[zero_index + 1..].to_vec())
}

/// Reverses [`pad_for_signing`], checking the full `0x00 0x01 PS(0xFF) 0x00`
/// header shape in constant layout. `em` must be exactly `k` bytes.
pub fn unpad_from_signing(k: usize, em: &[u8]) -> Result<Vec<u8>> {
    debug_assert_eq!(em.len(), k);
    if k < MIN_SIGNING_PAD_LEN {
        return Err(Error::InvalidPadding);
    }

    let mut ok = em[0].ct_eq(&0x00) & em[1].ct_eq(&0x01);
    let mut looking_for_zero = Choice::from(1u8);
    let mut zero_index: usize = 0;

    for i in 2..k {
        let is_zero = em[i].ct_eq(&0x00);
        let is_ff = em[i].ct_eq(&0xff);
        // Every byte before the terminator must be 0xFF.
        ok &= is_ff | !looking_for_zero | is_zero;
        let record_here = looking_for_zero & is_zero;
        zero_index = usize::conditional_select(&zero_index, &i, record_here);
        looking_for_zero &= !is_zero;
    }
    ok &= !looking_for_zero;

    if !bool::from(ok) {
        return Err(Error::InvalidPadding);
    }
    Ok(em[zero_index + 1..].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    #[test]
    fn encryption_pad_round_trips() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let msg = b"hello rsa";
        let em = pad_for_encryption(&mut rng, 64, msg).unwrap();
        assert_eq!(em.len(), 64);
        assert_eq!(&em[..2], &[0x00, 0x02]);
        let out = unpad_from_encryption(64, &em).unwrap();
        assert_eq!(out, msg);
    }

    #[test]
    fn encryption_pad_rejects_too_long_message() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let msg = vec![0u8; 60];
        assert_eq!(pad_for_encryption(&mut rng, 64, &msg), Err(Error::MessageTooLong));
    }

    #[test]
    fn signing_pad_round_trips() {
        let msg = b"digest-bytes";
        let em = pad_for_signing(64, msg).unwrap();
        let ps_len = 64 - msg.len() - 3;
        let mut expected = vec![0x00, 0x01];
        expected.extend(vec![0xffu8; ps_len]);
        expected.push(0x00);
        assert_eq!(&em[..expected.len()], expected.as_slice());
        let out = unpad_from_signing(64, &em).unwrap();
        assert_eq!(out, msg);
    }

    #[test]
    fn unpad_rejects_wrong_block_type() {
        let mut em = vec![0u8; 64];
        em[0] = 0x00;
        em[1] = 0x01; // should be 0x02 for encryption
        em[2] = 0x00; // immediate terminator, no PS at all — also invalid
        assert_eq!(unpad_from_encryption(64, &em), Err(Error::InvalidPadding));
    }

    #[test]
    fn unpad_signing_rejects_non_ff_padding_byte() {
        let msg = b"digest";
        let mut em = pad_for_signing(64, msg).unwrap();
        em[10] = 0x01; // corrupt one PS byte
        assert_eq!(unpad_from_signing(64, &em), Err(Error::InvalidPadding));
    }
}
