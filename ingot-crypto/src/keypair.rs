//! Keypair generation and management for Ingot.

use ed25519_dalek::{Keypair, PublicKey, SecretKey, Signature, Signer};
use rand::rngs::OsRng;

/// Represents a cryptographic key pair (public and secret key).
///
/// Masternode operators hold one of these for signing payment votes and
/// liveness messages; the collateral key stays in the owner's wallet.
pub struct IngotKeyPair {
    keypair: Keypair,
}

impl IngotKeyPair {
    /// Generates a new random key pair.
    pub fn generate() -> Self {
        let mut csprng = OsRng {};
        let keypair = Keypair::generate(&mut csprng);
        IngotKeyPair { keypair }
    }

    /// Reconstructs a key pair from the 32 secret-key bytes.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, ed25519_dalek::SignatureError> {
        let secret = SecretKey::from_bytes(bytes)?;
        let public = PublicKey::from(&secret);
        Ok(IngotKeyPair { keypair: Keypair { secret, public } })
    }

    /// Returns the public key of this key pair.
    pub fn public_key(&self) -> PublicKey {
        self.keypair.public
    }

    /// Returns the raw public key bytes.
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.keypair.public.to_bytes()
    }

    /// Returns the raw secret key bytes, for key export.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.keypair.secret.to_bytes()
    }

    /// Signs the given message with the secret key.
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.keypair.sign(message)
    }
}
