//! Pluggable signature schemes. Production deployments sign with
//! `Ed25519Signer`; `HmacDemoSigner` exists for local development and
//! tests where distributing a real keypair is overkill, and tags every
//! entry it signs with `demo_signed = true` so no one mistakes it for the
//! real thing.

use base64::Engine;
use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use hmac::{Hmac, Mac};
use sha2::Sha256;

/// A signer bound to one key, used by the ledger writer to sign each new
/// entry's preimage hash.
pub trait Signer: Send + Sync {
    fn sign(&self, message: &[u8]) -> String;
    fn verify(&self, message: &[u8], signature: &str) -> bool;
    fn signer_id(&self) -> &str;
    fn is_demo(&self) -> bool;
}

pub struct Ed25519Signer {
    signing_key: SigningKey,
    signer_id: String,
}

impl Ed25519Signer {
    /// Generate a fresh signing key. Sources randomness from `rand`'s own
    /// `OsRng` and builds the key from raw bytes rather than calling
    /// `SigningKey::generate`, to avoid the `rand_core` version mismatch
    /// between `rand` 0.9 and `ed25519-dalek`'s pinned `rand_core` 0.6.
    pub fn generate(signer_id: impl Into<String>) -> Self {
        use rand::RngCore;
        let mut seed = [0u8; 32];
        rand::rng().fill_bytes(&mut seed);
        Self {
            signing_key: SigningKey::from_bytes(&seed),
            signer_id: signer_id.into(),
        }
    }

    pub fn from_bytes(signer_id: impl Into<String>, seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
            signer_id: signer_id.into(),
        }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }
}

impl Signer for Ed25519Signer {
    fn sign(&self, message: &[u8]) -> String {
        let sig: Signature = self.signing_key.sign(message);
        base64::engine::general_purpose::STANDARD.encode(sig.to_bytes())
    }

    fn verify(&self, message: &[u8], signature: &str) -> bool {
        let Ok(raw) = base64::engine::general_purpose::STANDARD.decode(signature) else {
            return false;
        };
        let Ok(bytes) = <[u8; 64]>::try_from(raw.as_slice()) else {
            return false;
        };
        let sig = Signature::from_bytes(&bytes);
        self.signing_key.verifying_key().verify(message, &sig).is_ok()
    }

    fn signer_id(&self) -> &str {
        &self.signer_id
    }

    fn is_demo(&self) -> bool {
        false
    }
}

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 signer for local/demo use. Never wire this into a
/// deployment that needs real non-repudiation: the verifying party needs
/// the same shared secret as the signer.
pub struct HmacDemoSigner {
    key: Vec<u8>,
    signer_id: String,
}

impl HmacDemoSigner {
    pub fn new(signer_id: impl Into<String>, key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            signer_id: signer_id.into(),
        }
    }
}

impl Signer for HmacDemoSigner {
    fn sign(&self, message: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("HMAC accepts any key length");
        mac.update(message);
        base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
    }

    fn verify(&self, message: &[u8], signature: &str) -> bool {
        let Ok(raw) = base64::engine::general_purpose::STANDARD.decode(signature) else {
            return false;
        };
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("HMAC accepts any key length");
        mac.update(message);
        mac.verify_slice(&raw).is_ok()
    }

    fn signer_id(&self) -> &str {
        &self.signer_id
    }

    fn is_demo(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ed25519_round_trip() {
        let signer = Ed25519Signer::generate("signer-1");
        let sig = signer.sign(b"hello");
        assert!(signer.verify(b"hello", &sig));
        assert!(!signer.verify(b"tampered", &sig));
    }

    #[test]
    fn hmac_demo_round_trip_and_tag() {
        let signer = HmacDemoSigner::new("signer-demo", b"shared-secret".to_vec());
        assert!(signer.is_demo());
        let sig = signer.sign(b"hello");
        assert!(signer.verify(b"hello", &sig));
        assert!(!signer.verify(b"hello!", &sig));
    }

    #[test]
    fn ed25519_is_not_demo() {
        let signer = Ed25519Signer::generate("signer-1");
        assert!(!signer.is_demo());
    }
}
