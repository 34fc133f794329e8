//! Conversions between the two SubjectPublicKeyInfo encodings of an RSA-2048
//! token key.
//!
//! Issuers publish token keys with an `id-RSASSA-PSS` algorithm identifier
//! carrying SHA-384 parameters. RSA key importers generally only accept the
//! plain `rsaEncryption` identifier. Both encodings share the same
//! `subjectPublicKey` bit string, so converting is a prefix swap.

use thiserror::Error;

/// Length of the `rsaEncryption` algorithm identifier prefix.
pub const LEGACY_PREFIX_LEN: usize = 19;
/// Length of the `id-RSASSA-PSS` algorithm identifier prefix.
pub const PSS_PREFIX_LEN: usize = 67;
/// Length of the shared `subjectPublicKey` bit string of an RSA-2048 key.
pub const KEY_MATERIAL_LEN: usize = 275;
/// Length of an RSA-2048 SPKI with the `rsaEncryption` identifier.
pub const LEGACY_SPKI_LEN: usize = LEGACY_PREFIX_LEN + KEY_MATERIAL_LEN;
/// Length of an RSA-2048 SPKI with the `id-RSASSA-PSS` identifier.
pub const PSS_SPKI_LEN: usize = PSS_PREFIX_LEN + KEY_MATERIAL_LEN;

// SEQUENCE { SEQUENCE { rsaEncryption, NULL }, ...
const LEGACY_PREFIX: [u8; LEGACY_PREFIX_LEN] = [
    0x30, 0x82, 0x01, 0x22, 0x30, 0x0d, 0x06, 0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01,
    0x01, 0x05, 0x00,
];

// SEQUENCE { SEQUENCE { id-RSASSA-PSS, RSASSA-PSS-params {
//   hashAlgorithm sha384, maskGenAlgorithm mgf1(sha384), saltLength 48 } }, ...
const PSS_PREFIX: [u8; PSS_PREFIX_LEN] = [
    0x30, 0x82, 0x01, 0x52, 0x30, 0x3d, 0x06, 0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01,
    0x0a, 0x30, 0x30, 0xa0, 0x0d, 0x30, 0x0b, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04,
    0x02, 0x02, 0xa1, 0x1a, 0x30, 0x18, 0x06, 0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01,
    0x08, 0x30, 0x0b, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x02, 0xa2, 0x03,
    0x02, 0x01, 0x30,
];

/// Errors that can occur when converting between key encodings.
///
/// Only the length is checked. The algorithm identifier of the input is
/// replaced without inspection, a malformed key fails when it is imported.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SpkiError {
    #[error("Invalid key length: expected {expected}, got {actual}")]
    /// The key does not have the length of an RSA-2048 SPKI in the source
    /// encoding.
    InvalidLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },
    #[error("The key cannot be encoded as an SPKI")]
    /// The key could not be DER encoded.
    InvalidKey,
}

/// Converts an `id-RSASSA-PSS` SPKI into the `rsaEncryption` SPKI of the same
/// key.
///
/// # Errors
/// Returns an error if the input is not a 342 byte RSA-PSS SPKI.
pub fn to_legacy_encoding(pss_key: &[u8]) -> Result<Vec<u8>, SpkiError> {
    if pss_key.len() != PSS_SPKI_LEN {
        return Err(SpkiError::InvalidLength {
            expected: PSS_SPKI_LEN,
            actual: pss_key.len(),
        });
    }

    let mut legacy_key = Vec::with_capacity(LEGACY_SPKI_LEN);
    legacy_key.extend_from_slice(&LEGACY_PREFIX);
    legacy_key.extend_from_slice(&pss_key[PSS_PREFIX_LEN..]);
    Ok(legacy_key)
}

/// Converts an `rsaEncryption` SPKI into the `id-RSASSA-PSS` SPKI of the same
/// key, with SHA-384 parameters and a 48 byte salt.
///
/// # Errors
/// Returns an error if the input is not a 294 byte `rsaEncryption` SPKI.
pub fn to_new_encoding(legacy_key: &[u8]) -> Result<Vec<u8>, SpkiError> {
    if legacy_key.len() != LEGACY_SPKI_LEN {
        return Err(SpkiError::InvalidLength {
            expected: LEGACY_SPKI_LEN,
            actual: legacy_key.len(),
        });
    }

    let mut pss_key = Vec::with_capacity(PSS_SPKI_LEN);
    pss_key.extend_from_slice(&PSS_PREFIX);
    pss_key.extend_from_slice(&legacy_key[LEGACY_PREFIX_LEN..]);
    Ok(pss_key)
}
