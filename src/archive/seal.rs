/// Versioned sealed-payload format for archived content.
///
/// Layout: `MAGIC (5) | nonce (24) | ciphertext+tag`.
///
/// The sealing key is derived once from a configured secret with BLAKE3
/// key derivation. XChaCha20-Poly1305's 24-byte nonce is large enough
/// for random generation per call without practical collision risk.
/// Content without the magic prefix is treated as plaintext and passed
/// through unchanged on open.
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{NotaryError, Result};

/// Format version marker prepended to every sealed payload.
pub const FORMAT_MAGIC: &[u8; 5] = b"APNS1";

pub const NONCE_LEN: usize = 24;
const KDF_CONTEXT: &str = "apinotary 2025-08 archive seal v1";

/// Sealing key, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SealKey([u8; 32]);

impl SealKey {
    /// Derive the sealing key from a configured secret.
    pub fn derive(secret: &[u8]) -> Self {
        let mut output = [0u8; 32];
        let mut deriver = blake3::Hasher::new_derive_key(KDF_CONTEXT);
        deriver.update(secret);
        let mut reader = deriver.finalize_xof();
        reader.fill(&mut output);
        Self(output)
    }

    fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Seal a payload: fresh random nonce, XChaCha20-Poly1305, magic prefix.
pub fn seal(key: &SealKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|e| NotaryError::Unseal(e.to_string()))?;

    let mut nonce = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|e| NotaryError::Unseal(format!("seal failed: {e}")))?;

    let mut out = Vec::with_capacity(FORMAT_MAGIC.len() + NONCE_LEN + ciphertext.len());
    out.extend_from_slice(FORMAT_MAGIC);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Open a payload. Content without the format marker is returned
/// unchanged (it was never sealed).
pub fn open(key: &SealKey, data: &[u8]) -> Result<Vec<u8>> {
    if !data.starts_with(FORMAT_MAGIC) {
        return Ok(data.to_vec());
    }

    let body = &data[FORMAT_MAGIC.len()..];
    if body.len() < NONCE_LEN {
        return Err(NotaryError::Unseal("truncated sealed payload".into()));
    }
    let (nonce, ciphertext) = body.split_at(NONCE_LEN);

    let cipher = XChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|e| NotaryError::Unseal(e.to_string()))?;

    cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|e| NotaryError::Unseal(format!("open failed: {e}")))
}

/// Whether a payload carries the sealed-format marker.
pub fn is_sealed(data: &[u8]) -> bool {
    data.starts_with(FORMAT_MAGIC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let key = SealKey::derive(b"test secret");
        let plaintext = br#"{"request":{"url":"https://api.example.com"},"response":{"status":200}}"#;

        let sealed = seal(&key, plaintext).unwrap();
        assert!(is_sealed(&sealed));
        assert_ne!(&sealed[FORMAT_MAGIC.len() + NONCE_LEN..], &plaintext[..]);

        let opened = open(&key, &sealed).unwrap();
        assert_eq!(&opened, plaintext);
    }

    #[test]
    fn test_open_passes_through_unsealed_content() {
        let key = SealKey::derive(b"test secret");
        let plain = b"never sealed";
        assert_eq!(open(&key, plain).unwrap(), plain.to_vec());
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = seal(&SealKey::derive(b"secret one"), b"payload").unwrap();
        assert!(open(&SealKey::derive(b"secret two"), &sealed).is_err());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = SealKey::derive(b"test secret");
        let mut sealed = seal(&key, b"payload").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0xFF;
        assert!(open(&key, &sealed).is_err());
    }

    #[test]
    fn test_nonces_are_fresh() {
        let key = SealKey::derive(b"test secret");
        let a = seal(&key, b"payload").unwrap();
        let b = seal(&key, b"payload").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_derivation_deterministic() {
        let a = SealKey::derive(b"secret");
        let b = SealKey::derive(b"secret");
        assert_eq!(a.as_bytes(), b.as_bytes());

        let c = SealKey::derive(b"other secret");
        assert_ne!(a.as_bytes(), c.as_bytes());
    }

    #[test]
    fn test_truncated_sealed_payload_fails() {
        let key = SealKey::derive(b"test secret");
        let mut truncated = FORMAT_MAGIC.to_vec();
        truncated.extend_from_slice(&[0u8; 10]);
        assert!(open(&key, &truncated).is_err());
    }
}
