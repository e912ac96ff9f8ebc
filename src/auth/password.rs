use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

/// Hash families found in the users table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashScheme {
    Argon2,
    /// `$2a$` / `$2b$` / `$2y$` hashes carried over from the flat-file store.
    Bcrypt,
}

impl HashScheme {
    pub fn detect(hash: &str) -> Option<Self> {
        if hash.starts_with("$argon2") {
            Some(Self::Argon2)
        } else if ["$2a$", "$2b$", "$2y$"].iter().any(|p| hash.starts_with(p)) {
            Some(Self::Bcrypt)
        } else {
            None
        }
    }
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

/// Checks `plain` against a stored hash of either scheme. Both verifiers
/// compare digests in constant time.
pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    match HashScheme::detect(hash) {
        Some(HashScheme::Argon2) => {
            let parsed = PasswordHash::new(hash).map_err(|e| {
                error!(error = %e, "argon2 parse hash error");
                anyhow::anyhow!(e.to_string())
            })?;
            Ok(Argon2::default()
                .verify_password(plain.as_bytes(), &parsed)
                .is_ok())
        }
        Some(HashScheme::Bcrypt) => bcrypt::verify(plain, hash).map_err(|e| {
            error!(error = %e, "bcrypt verify error");
            anyhow::anyhow!(e.to_string())
        }),
        None => anyhow::bail!("unrecognised password hash format"),
    }
}

pub fn needs_rehash(hash: &str) -> bool {
    HashScheme::detect(hash) != Some(HashScheme::Argon2)
}
