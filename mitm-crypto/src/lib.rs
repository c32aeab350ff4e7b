//! Cryptographic primitives for the MITM: the forged RSA keypair, PKCS#1 v1.5
//! encrypt/decrypt helpers, the optional AES-128 CFB-8 stream wrappers, and
//! the auth "server hash" digest (§4.B, §4.J).

mod cfb8;
mod hash;
mod rsa_utils;

pub use cfb8::{Aes128Cfb8Dec, Aes128Cfb8Enc, StreamDecryptor, StreamEncryptor};
pub use hash::{redacted_hex, server_hash, signed_hex_digest};
pub use rsa_utils::{CryptError, KeyStore, RSA_KEY_BITS, decode_public_key_der, encrypt_pkcs1v15};

/// Byte length of the AES-128 shared secret used on both encrypted halves.
pub const SHARED_SECRET_LEN: usize = 16;

/// Generate a fresh 16-byte AES shared secret.
#[must_use]
pub fn generate_shared_secret() -> [u8; SHARED_SECRET_LEN] {
    use rand::RngCore;
    let mut key = [0u8; SHARED_SECRET_LEN];
    rand::rng().fill_bytes(&mut key);
    key
}
