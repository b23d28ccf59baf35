use std::convert::TryFrom;

use ed25519_dalek::{PublicKey, Signature, SignatureError, Verifier};

use crate::keypair::IngotKeyPair;

pub fn sign_message(keypair: &IngotKeyPair, message: &[u8]) -> Signature {
    keypair.sign(message)
}

pub fn verify_signature(
    public_key: &PublicKey,
    message: &[u8],
    signature: &Signature,
) -> Result<(), SignatureError> {
    public_key.verify(message, signature)
}

/// Parses a public key from raw bytes, typically out of a registry record.
pub fn public_key_from_bytes(bytes: &[u8]) -> Result<PublicKey, SignatureError> {
    PublicKey::from_bytes(bytes)
}

/// Parses a signature from raw bytes, typically off the wire.
pub fn signature_from_bytes(bytes: &[u8]) -> Result<Signature, SignatureError> {
    Signature::try_from(bytes)
}

/// Verifies a raw-byte signature under a raw-byte public key. Malformed
/// keys or signatures verify as false rather than erroring; peers control
/// both fields.
pub fn verify_raw(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    let public_key = match public_key_from_bytes(public_key) {
        Ok(key) => key,
        Err(_) => return false,
    };
    let signature = match signature_from_bytes(signature) {
        Ok(sig) => sig,
        Err(_) => return false,
    };
    verify_signature(&public_key, message, &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_raw_rejects_garbage() {
        assert!(!verify_raw(&[0u8; 31], b"msg", &[0u8; 64]));
        assert!(!verify_raw(&[0u8; 32], b"msg", &[0u8; 63]));
    }

    #[test]
    fn test_verify_raw_roundtrip() {
        let keypair = IngotKeyPair::generate();
        let sig = sign_message(&keypair, b"payload");
        assert!(verify_raw(&keypair.public_key_bytes(), b"payload", &sig.to_bytes()));
        assert!(!verify_raw(&keypair.public_key_bytes(), b"other", &sig.to_bytes()));
    }
}
