use sha1::{Digest, Sha1};

/// Compute the Minecraft/Mojang "server hash" digest: SHA-1 over
/// `server_id ∥ shared_secret ∥ public_key_der` (§4.J).
#[must_use]
pub fn server_hash(server_id: &str, shared_secret: &[u8], public_key_der: &[u8]) -> [u8; 20] {
    let digest = Sha1::new()
        .chain_update(server_id.as_bytes())
        .chain_update(shared_secret)
        .chain_update(public_key_der)
        .finalize();
    digest.into()
}

/// Negate a 20-byte two's-complement big-endian magnitude in place.
fn negate_be(bytes: &mut [u8; 20]) {
    for b in bytes.iter_mut() {
        *b = !*b;
    }
    let mut carry: u16 = 1;
    for b in bytes.iter_mut().rev() {
        let sum = u16::from(*b) + carry;
        *b = sum as u8;
        carry = sum >> 8;
        if carry == 0 {
            break;
        }
    }
}

fn hex_trimmed(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{b:02x}"));
    }
    let trimmed = s.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Format a 20-byte SHA-1 digest the way the auth service expects: reinterpret
/// the bytes as a big-endian *signed* two's-complement integer and render it
/// as lowercase hex, with a leading `-` for negative values (§4.J, §9 open
/// questions). This mirrors Python's `format(int.from_bytes(d, "big", signed=True), "x")`
/// byte for byte, including the leading minus sign; it is deliberately not
/// "fixed" to always-unsigned hex.
#[must_use]
pub fn signed_hex_digest(digest: [u8; 20]) -> String {
    if digest[0] & 0x80 != 0 {
        let mut magnitude = digest;
        negate_be(&mut magnitude);
        format!("-{}", hex_trimmed(&magnitude))
    } else {
        hex_trimmed(&digest)
    }
}

/// Redact `bytes` for logging: the first and last couple of hex nibbles with
/// the middle elided, mirroring the original Python `utils/logging.py`'s
/// `sensitive()` helper. Secret material (keys, shared secrets, verify
/// tokens, the replacement digest) is never logged in full (SPEC_FULL.md
/// §1a).
#[must_use]
pub fn redacted_hex(bytes: &[u8]) -> String {
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    if hex.len() <= 8 {
        return hex;
    }
    format!("{}..{}", &hex[..4], &hex[hex.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reference vectors from wiki.vg's authentication documentation, used
    // upstream to validate the nonstandard signed-hex encoding.
    #[test]
    fn signed_hex_digest_matches_known_vectors() {
        assert_eq!(
            signed_hex_digest(server_hash("Notch", b"", b"")),
            "4ed1f46bbe04bc756bcb17c0c7ce3e4632f06a48"
        );
        assert_eq!(
            signed_hex_digest(server_hash("jeb_", b"", b"")),
            "-7c9d5b0044c130109a5d7b5fb5c317c02b4e28c1"
        );
        assert_eq!(
            signed_hex_digest(server_hash("simon", b"", b"")),
            "88e16a1019277b15d58faf0541e11910eb756f6"
        );
    }

    #[test]
    fn negate_be_round_trips_through_negation_twice() {
        let mut bytes: [u8; 20] = std::array::from_fn(|i| i as u8);
        let original = bytes;
        negate_be(&mut bytes);
        negate_be(&mut bytes);
        assert_eq!(bytes, original);
    }

    #[test]
    fn all_zero_digest_formats_as_zero() {
        assert_eq!(signed_hex_digest([0u8; 20]), "0");
    }

    #[test]
    fn redacted_hex_elides_the_middle_of_a_long_value() {
        let key = [0x11u8; 16];
        let redacted = redacted_hex(&key);
        assert_eq!(redacted, "1111..1111");
        assert!(!redacted.contains(&"11".repeat(16)));
    }

    #[test]
    fn redacted_hex_passes_short_values_through() {
        assert_eq!(redacted_hex(&[0xab, 0xcd]), "abcd");
    }
}
