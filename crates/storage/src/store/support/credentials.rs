#![forbid(unsafe_code)]

use super::super::StoreError;
use sha2::{Digest, Sha256};
use uuid::Uuid;

const HASH_COST: u32 = 10;

/// Passwords and guardian PINs are stored as bcrypt strings; the salt lives inside the hash.
pub(in crate::store) fn hash_secret(secret: &str) -> Result<String, StoreError> {
    Ok(bcrypt::hash(secret, HASH_COST)?)
}

pub(in crate::store) fn verify_secret(secret: &str, stored_hash: &str) -> bool {
    bcrypt::verify(secret, stored_hash).unwrap_or(false)
}

pub(in crate::store) fn new_session_token() -> String {
    format!(
        "{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

/// Sessions are looked up by digest so a leaked database does not leak live tokens.
pub(in crate::store) fn token_digest(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_hash_to_salted_bcrypt_strings() {
        let first = hash_secret("correct horse").expect("hash");
        let second = hash_secret("correct horse").expect("hash");
        assert!(first.starts_with("$2"));
        assert_ne!(first, second);
        assert!(verify_secret("correct horse", &first));
        assert!(!verify_secret("wrong horse", &first));
        assert!(!verify_secret("correct horse", "not-a-hash"));
    }

    #[test]
    fn token_digest_is_lowercase_sha256_hex() {
        assert_eq!(
            token_digest("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
