//! Password hashing and verification.
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Password hashing function. Inspired by [Dropbox's password storage policy][1].
///
/// The password is first hashed with SHA256 so that arbitrarily long passwords are not truncated
/// by bcrypt. The digest is then hashed with bcrypt at the library's default cost, which also
/// generates and embeds the salt.
///
/// [1]: https://blogs.dropbox.com/tech/2016/09/how-dropbox-securely-stores-your-passwords/
pub fn hash(password: &str) -> Result<String> {
    let hash = bcrypt::hash(digest(password), bcrypt::DEFAULT_COST)?;
    Ok(hash)
}

/// Checks `password` against a hash produced by [`hash`].
///
/// A mismatch is `Ok(false)`. Only a malformed `hash` is an error.
pub fn verify(hash: &str, password: &str) -> Result<bool> {
    let matches = bcrypt::verify(digest(password), hash)?;
    if !matches {
        info!("Password does not match");
    }
    Ok(matches)
}

// base64 encoded so no zero bytes reach bcrypt
fn digest(password: &str) -> String {
    base64::encode(&Sha256::new().chain(password).finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_password_matches() {
        let hash = hash("hunter2").unwrap();
        assert_ne!(hash, "hunter2");
        assert!(verify(&hash, "hunter2").unwrap());
    }

    #[test]
    fn other_passwords_do_not_match() {
        let hash = hash("pw1").unwrap();
        for other in &["pw2", "PW1", "pw1 ", "", "pw"] {
            assert!(!verify(&hash, other).unwrap(), "{:?} matched", other);
        }
    }

    #[test]
    fn hashes_are_salted() {
        assert_ne!(hash("same").unwrap(), hash("same").unwrap());
    }

    #[test]
    fn long_passwords_are_not_truncated() {
        let long = "x".repeat(100);
        let hash = hash(&long).unwrap();
        assert!(!verify(&hash, &"x".repeat(99)).unwrap());
        assert!(verify(&hash, &long).unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(verify("not-a-hash", "pw").is_err());
    }
}
