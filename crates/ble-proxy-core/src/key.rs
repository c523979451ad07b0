//! Vehicle credential loading
//!
//! The proxy authenticates to the vehicle with a NIST P-256 private key that
//! was paired with the car beforehand. Keys arrive as a single PEM block,
//! either a SEC1 `EC PRIVATE KEY` or a PKCS#8 `PRIVATE KEY`.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use p256::ecdh::SharedSecret;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{FieldBytes, PublicKey, SecretKey};
use pkcs8::{ObjectIdentifier, PrivateKeyInfo};
use sec1::EcPrivateKey;
use sha2::{Digest, Sha256};

use crate::error::KeyError;

/// PEM label of a SEC1 encoded EC private key
const SEC1_LABEL: &str = "EC PRIVATE KEY";

/// id-ecPublicKey (RFC 5480)
const EC_PUBLIC_KEY_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");

/// secp256r1 / prime256v1 / NIST P-256
const NIST_P256_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");

/// Size of a P-256 scalar in bytes
const SCALAR_LEN: usize = 32;

/// Opaque handle to the vehicle signing key.
///
/// Immutable once loaded. `Debug` prints only a public-key fingerprint.
#[derive(Clone)]
pub struct KeyHandle {
    secret: SecretKey,
}

impl KeyHandle {
    /// Private scalar, big-endian, with leading zero bytes stripped
    pub fn scalar_bytes(&self) -> Vec<u8> {
        let bytes = self.secret.to_bytes();
        let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        bytes[first..].to_vec()
    }

    /// Public half of the key
    pub fn public_key(&self) -> PublicKey {
        self.secret.public_key()
    }

    /// ECDH key agreement with a vehicle public key
    pub fn diffie_hellman(&self, peer: &PublicKey) -> SharedSecret {
        p256::ecdh::diffie_hellman(self.secret.to_nonzero_scalar(), peer.as_affine())
    }

    /// First 8 bytes of SHA-256 over the uncompressed public key, hex encoded.
    /// Safe to log.
    pub fn fingerprint(&self) -> String {
        let point = self.public_key().to_encoded_point(false);
        let digest = Sha256::digest(point.as_bytes());
        hex::encode(&digest[..8])
    }
}

impl fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyHandle")
            .field("fingerprint", &self.fingerprint())
            .finish_non_exhaustive()
    }
}

/// Parse a PEM credential into a [`KeyHandle`].
///
/// Accepts SEC1 (`EC PRIVATE KEY`) and PKCS#8 (any other label) blocks.
/// Text before the first `-----BEGIN` line and after the matching `-----END`
/// line is ignored, as is whitespace anywhere in the base64 body.
///
/// A SEC1 key must name its curve; keys written without the optional
/// parameters field are rejected.
pub fn load_private_key(raw: &[u8]) -> Result<KeyHandle, KeyError> {
    let PemBlock { label, der } = decode_pem(raw)?;

    let secret = if label == SEC1_LABEL {
        let ec_key = EcPrivateKey::try_from(der.as_slice())
            .map_err(|e| KeyError::InvalidCredentialFormat(format!("SEC1: {}", e)))?;

        match ec_key.parameters.and_then(|p| p.named_curve()) {
            Some(curve) => ensure_p256(curve)?,
            None => {
                return Err(KeyError::InvalidCredentialFormat(
                    "SEC1 key does not name its curve".to_string(),
                ))
            }
        }
        secret_from_scalar(ec_key.private_key)?
    } else {
        let info = PrivateKeyInfo::try_from(der.as_slice())
            .map_err(|e| KeyError::InvalidCredentialFormat(format!("PKCS#8: {}", e)))?;

        if info.algorithm.oid != EC_PUBLIC_KEY_OID {
            return Err(KeyError::UnsupportedKeyAlgorithm(
                info.algorithm.oid.to_string(),
            ));
        }

        let curve = info.algorithm.parameters_oid().map_err(|e| {
            KeyError::InvalidCredentialFormat(format!("missing curve parameters: {}", e))
        })?;
        ensure_p256(curve)?;

        let ec_key = EcPrivateKey::try_from(info.private_key)
            .map_err(|e| KeyError::InvalidCredentialFormat(format!("PKCS#8 EC key: {}", e)))?;
        if let Some(inner) = ec_key.parameters.and_then(|p| p.named_curve()) {
            ensure_p256(inner)?;
        }
        secret_from_scalar(ec_key.private_key)?
    };

    Ok(KeyHandle { secret })
}

const BEGIN: &str = "-----BEGIN ";
const DASHES: &str = "-----";

struct PemBlock<'a> {
    label: &'a str,
    der: Vec<u8>,
}

/// Decode the first PEM block in `raw`. Line length inside the body is not
/// checked.
fn decode_pem(raw: &[u8]) -> Result<PemBlock<'_>, KeyError> {
    let invalid = KeyError::InvalidCredentialFormat;

    let text = std::str::from_utf8(raw)
        .map_err(|_| invalid("credential is not text".to_string()))?;
    let start = text
        .find(BEGIN)
        .ok_or_else(|| invalid("no PEM block found".to_string()))?;

    let (label, rest) = text[start + BEGIN.len()..]
        .split_once(DASHES)
        .ok_or_else(|| invalid("unterminated PEM BEGIN line".to_string()))?;
    let end_line = format!("-----END {}-----", label);
    let (body, _) = rest
        .split_once(end_line.as_str())
        .ok_or_else(|| invalid(format!("no END line for {}", label)))?;

    let body: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let der = STANDARD
        .decode(body)
        .map_err(|e| invalid(format!("PEM body: {}", e)))?;

    Ok(PemBlock { label, der })
}

fn ensure_p256(curve: ObjectIdentifier) -> Result<(), KeyError> {
    if curve == NIST_P256_OID {
        Ok(())
    } else {
        Err(KeyError::UnsupportedCurve(curve_name(&curve)))
    }
}

fn curve_name(oid: &ObjectIdentifier) -> String {
    match oid.to_string().as_str() {
        "1.3.132.0.34" => "NIST P-384 (1.3.132.0.34)".to_string(),
        "1.3.132.0.35" => "NIST P-521 (1.3.132.0.35)".to_string(),
        "1.3.132.0.10" => "secp256k1 (1.3.132.0.10)".to_string(),
        other => other.to_string(),
    }
}

fn secret_from_scalar(scalar: &[u8]) -> Result<SecretKey, KeyError> {
    if scalar.is_empty() || scalar.len() > SCALAR_LEN {
        return Err(KeyError::InvalidCredentialFormat(format!(
            "private scalar has {} bytes",
            scalar.len()
        )));
    }

    let mut padded = [0u8; SCALAR_LEN];
    padded[SCALAR_LEN - scalar.len()..].copy_from_slice(scalar);

    SecretKey::from_bytes(&FieldBytes::from(padded)).map_err(|_| {
        KeyError::InvalidCredentialFormat("private scalar out of range".to_string())
    })
}
