//! Thin PEM framing adapter over [`pem_rfc7468`]. Header/footer and
//! base64 framing are entirely that crate's job; this module only maps
//! its errors onto [`crate::Error`].

use alloc::string::String;
use alloc::vec::Vec;

use pem_rfc7468::LineEnding;

use crate::error::{Error, Result};

/// Decodes a PEM-framed blob to its inner DER bytes, ignoring the label.
pub fn pem_to_der(pem: &str) -> Result<Vec<u8>> {
    let (_label, der) = pem_rfc7468::decode_vec(pem.as_bytes()).map_err(|_| Error::Pem)?;
    Ok(der)
}

/// Wraps `der` in PEM framing under the given `label` (e.g.
/// `"RSA PRIVATE KEY"`).
pub fn der_to_pem(der: &[u8], label: &str) -> String {
    pem_rfc7468::encode_string(label, LineEnding::LF, der).expect("label is a valid PEM label and der is in range")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn der_to_pem_and_back_round_trips() {
        let der = [0x30, 0x03, 0x02, 0x01, 0x05];
        let pem = der_to_pem(&der, "RSA PUBLIC KEY");
        assert!(pem.starts_with("-----BEGIN RSA PUBLIC KEY-----"));
        let decoded = pem_to_der(&pem).unwrap();
        assert_eq!(decoded, der);
    }

    #[test]
    fn malformed_pem_is_rejected() {
        assert_eq!(pem_to_der("not a pem at all"), Err(Error::Pem));
    }
}
