use pbkdf2::pbkdf2_hmac;
use rand::Rng;
use sha2::Sha256;

const PBKDF2_ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// Hash a password with PBKDF2-HMAC-SHA256 and a random salt.
///
/// The result is `hex(salt):hex(derived_key)`.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill(&mut salt);

    let key = derive_key(password, &salt);
    format!("{}:{}", hex::encode(salt), hex::encode(key))
}

/// Check a password against a value produced by [`hash_password`].
///
/// Malformed stored values never verify.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Some((salt_hex, key_hex)) = stored_hash.split_once(':') else {
        return false;
    };
    if salt_hex.is_empty() || key_hex.is_empty() {
        return false;
    }

    let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(key_hex)) else {
        return false;
    };
    if expected.len() != KEY_LEN {
        return false;
    }

    let key = derive_key(password, &salt);
    // Compare every byte regardless of where the first mismatch is
    key.iter().zip(&expected).fold(0u8, |diff, (a, b)| diff | (a ^ b)) == 0
}

fn derive_key(password: &str, salt: &[u8]) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_has_salt_and_key() {
        let hashed = hash_password("hunter2");
        let (salt, key) = hashed.split_once(':').unwrap();
        assert_eq!(salt.len(), SALT_LEN * 2);
        assert_eq!(key.len(), KEY_LEN * 2);
    }

    #[test]
    fn test_verify_roundtrip() {
        let hashed = hash_password("correct horse");
        assert!(verify_password("correct horse", &hashed));
        assert!(!verify_password("wrong horse", &hashed));
    }

    #[test]
    fn test_salts_differ() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    #[test]
    fn test_malformed_stored_hash() {
        assert!(!verify_password("pw", ""));
        assert!(!verify_password("pw", "no-separator"));
        assert!(!verify_password("pw", ":abcd"));
        assert!(!verify_password("pw", "zz:abcd"));
        assert!(!verify_password("pw", "abc:abcd"));
    }

    #[test]
    fn test_stored_parts_decode_to_salt_and_key() {
        let hashed = hash_password("s3cret");
        let (salt, key) = hashed.split_once(':').unwrap();
        assert_eq!(hex::decode(salt).unwrap().len(), SALT_LEN);
        assert_eq!(hex::decode(key).unwrap().len(), KEY_LEN);

        // Well-formed hex with a short key never verifies
        let truncated = format!("{}:{}", salt, &key[..KEY_LEN]);
        assert!(!verify_password("s3cret", &truncated));
    }
}
