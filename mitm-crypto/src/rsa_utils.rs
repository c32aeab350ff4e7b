use rsa::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};

/// Bit length of the forged and real server RSA keys (§4.J: "1024-bit").
pub const RSA_KEY_BITS: usize = 1024;

/// Errors raised by the RSA key-forging and PKCS#1 v1.5 encrypt/decrypt helpers.
#[derive(Debug, thiserror::Error)]
pub enum CryptError {
    /// RSA key generation failed (process-fatal: see `KeyStore::create`).
    #[error("failed to generate RSA key pair: {0}")]
    KeyGen(rsa::Error),
    /// The DER blob received on the wire did not parse as an X.509 SubjectPublicKeyInfo.
    #[error("failed to decode public key DER: {0}")]
    InvalidPublicKeyDer(rsa::pkcs8::spki::Error),
    /// PKCS#1 v1.5 encryption under a public key failed.
    #[error("RSA encryption failed: {0}")]
    Encrypt(rsa::Error),
    /// PKCS#1 v1.5 decryption under a private key failed (bad padding, wrong key, or corrupted ciphertext).
    #[error("RSA decryption failed: {0}")]
    Decrypt(rsa::Error),
}

/// The process-global forged RSA keypair (§3 "Lifecycles": "created once per
/// process and shared across all MITM sessions").
pub struct KeyStore {
    /// The forged private key, used to decrypt the client's `EncryptionResponse`.
    pub private_key: RsaPrivateKey,
    /// The forged public key, X.509 SPKI DER-encoded exactly as it must appear
    /// on the wire inside `EncryptionRequest.public_key`.
    pub public_key_der: Vec<u8>,
}

impl KeyStore {
    /// Generate a fresh 1024-bit RSA keypair and its wire-format DER encoding.
    ///
    /// # Errors
    /// Returns [`CryptError::KeyGen`] if key generation fails.
    pub fn create() -> Result<Self, CryptError> {
        tracing::debug!("generating forged RSA keypair ({RSA_KEY_BITS} bits)");
        let mut rng = rand::rng();
        let private_key =
            RsaPrivateKey::new(&mut rng, RSA_KEY_BITS).map_err(CryptError::KeyGen)?;

        let public_key_der = rsa_der::public_key_to_der(
            &private_key.n().to_be_bytes(),
            &private_key.e().to_be_bytes(),
        );

        Ok(Self {
            private_key,
            public_key_der,
        })
    }

    /// Decrypt a PKCS#1 v1.5 ciphertext under the forged private key.
    ///
    /// Used to recover the client's AES shared secret and verify token from
    /// `EncryptionResponse` (§4.J, "Pre EncryptionResponse").
    ///
    /// # Errors
    /// Returns [`CryptError::Decrypt`] on malformed padding or ciphertext.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptError> {
        self.private_key
            .decrypt(Pkcs1v15Encrypt, ciphertext)
            .map_err(CryptError::Decrypt)
    }
}

/// Parse an X.509 SubjectPublicKeyInfo DER blob as seen on the wire inside
/// `EncryptionRequest.public_key` (the real server's key).
///
/// # Errors
/// Returns [`CryptError::InvalidPublicKeyDer`] if the bytes do not parse.
pub fn decode_public_key_der(der: &[u8]) -> Result<RsaPublicKey, CryptError> {
    RsaPublicKey::from_public_key_der(der).map_err(CryptError::InvalidPublicKeyDer)
}

/// Encrypt `data` under `key` using PKCS#1 v1.5 padding, as required to
/// re-encrypt the shared secret and verify token under the real server's key
/// (§4.J, "Pre EncryptionRequest").
///
/// # Errors
/// Returns [`CryptError::Encrypt`] if encryption fails.
pub fn encrypt_pkcs1v15(key: &RsaPublicKey, data: &[u8]) -> Result<Vec<u8>, CryptError> {
    let mut rng = rand::rng();
    key.encrypt(&mut rng, Pkcs1v15Encrypt, data)
        .map_err(CryptError::Encrypt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_store_public_key_der_round_trips_through_spki() {
        let store = KeyStore::create().expect("key generation");
        let decoded = decode_public_key_der(&store.public_key_der).expect("decode");
        assert_eq!(decoded.n(), store.private_key.n());
        assert_eq!(decoded.e(), store.private_key.e());
    }

    #[test]
    fn encrypt_then_decrypt_round_trips() {
        let store = KeyStore::create().expect("key generation");
        let pub_key = RsaPublicKey::from(&store.private_key);
        let secret = b"0123456789abcdef";
        let ciphertext = encrypt_pkcs1v15(&pub_key, secret).expect("encrypt");
        let plaintext = store.decrypt(&ciphertext).expect("decrypt");
        assert_eq!(plaintext, secret);
    }
}
