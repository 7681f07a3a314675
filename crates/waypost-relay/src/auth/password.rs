//! Password hashing and verification using bcrypt.

/// Work factor for new digests.
pub const BCRYPT_COST: u32 = 12;

/// Hash a password with a random salt at [`BCRYPT_COST`].
pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, BCRYPT_COST)
}

/// Verify a password against a stored bcrypt digest.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    bcrypt::verify(password, hash)
}
