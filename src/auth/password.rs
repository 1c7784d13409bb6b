//! Password hashing and verification for Tavern.
//!
//! Digests are Argon2id keyed with the server secret. The input seed is
//! `secret || username || password`, the salt is random per account and the
//! Argon2 time cost is the account's stored iteration count, so raising
//! [`DEFAULT_ITERATIONS`] only affects newly hashed passwords.

use std::fmt;

use argon2::{Algorithm, Argon2, Params, Version};
use rand_core::{OsRng, RngCore};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Length of the per-account random salt in bytes.
pub const SALT_LENGTH: usize = 16;

/// Length of the stored digest in bytes.
pub const HASH_LENGTH: usize = 32;

/// Iteration count (Argon2 time cost) for newly hashed passwords.
pub const DEFAULT_ITERATIONS: u32 = 2;

/// Memory cost in KiB. Fixed: changing it invalidates every stored digest.
const MEMORY_COST_KIB: u32 = 19 * 1024;

/// Lanes. Fixed for the same reason as the memory cost.
const PARALLELISM: u32 = 1;

/// Password hashing errors.
#[derive(Error, Debug)]
pub enum PasswordError {
    /// Iteration count outside what the hasher accepts.
    #[error("invalid iteration count: {0}")]
    InvalidIterations(i64),

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    HashError(String),
}

/// Salt, digest and iteration count stored for an account.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordDigest {
    /// Random salt.
    pub salt: Vec<u8>,
    /// Derived digest.
    pub hash: Vec<u8>,
    /// Iteration count the digest was derived with.
    pub iterations: u32,
}

impl fmt::Debug for PasswordDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordDigest")
            .field("iterations", &self.iterations)
            .finish_non_exhaustive()
    }
}

/// Password hasher bound to the server secret.
#[derive(Clone)]
pub struct Credentials {
    secret: String,
    iterations: u32,
}

impl Credentials {
    /// Create a hasher using [`DEFAULT_ITERATIONS`].
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            iterations: DEFAULT_ITERATIONS,
        }
    }

    /// Override the iteration count used for new digests.
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations.max(1);
        self
    }

    /// Iteration count used for new digests.
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Hash a password with a fresh salt.
    pub fn hash(&self, username: &str, password: &str) -> Result<PasswordDigest, PasswordError> {
        hash_password_with_iterations(&self.secret, username, password, self.iterations)
    }

    /// Check a password against stored parameters.
    pub fn verify(
        &self,
        username: &str,
        password: &str,
        salt: &[u8],
        expected_hash: &[u8],
        iterations: i64,
    ) -> bool {
        verify_password(&self.secret, username, password, salt, expected_hash, iterations)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("iterations", &self.iterations)
            .finish_non_exhaustive()
    }
}

/// Fill a new salt from the operating system's CSPRNG.
pub fn generate_salt() -> Vec<u8> {
    let mut salt = vec![0u8; SALT_LENGTH];
    OsRng.fill_bytes(&mut salt);
    salt
}

fn derive(
    secret: &str,
    username: &str,
    password: &str,
    salt: &[u8],
    iterations: u32,
) -> Result<[u8; HASH_LENGTH], PasswordError> {
    let params = Params::new(MEMORY_COST_KIB, iterations, PARALLELISM, Some(HASH_LENGTH))
        .map_err(|e| PasswordError::HashError(e.to_string()))?;
    let argon2 = Argon2::new_with_secret(
        secret.as_bytes(),
        Algorithm::Argon2id,
        Version::V0x13,
        params,
    )
    .map_err(|e| PasswordError::HashError(e.to_string()))?;

    let mut seed = Vec::with_capacity(secret.len() + username.len() + password.len());
    seed.extend_from_slice(secret.as_bytes());
    seed.extend_from_slice(username.as_bytes());
    seed.extend_from_slice(password.as_bytes());

    let mut out = [0u8; HASH_LENGTH];
    argon2
        .hash_password_into(&seed, salt, &mut out)
        .map_err(|e| PasswordError::HashError(e.to_string()))?;
    Ok(out)
}

/// Hash a password with a fresh salt and [`DEFAULT_ITERATIONS`].
///
/// Password length rules are enforced by the caller.
///
/// # Examples
///
/// ```
/// use tavern::auth::{hash_password, verify_password};
///
/// let digest = hash_password("secret", "nova", "secret1").unwrap();
/// assert!(verify_password(
///     "secret",
///     "nova",
///     "secret1",
///     &digest.salt,
///     &digest.hash,
///     digest.iterations as i64,
/// ));
/// ```
pub fn hash_password(
    secret: &str,
    username: &str,
    password: &str,
) -> Result<PasswordDigest, PasswordError> {
    hash_password_with_iterations(secret, username, password, DEFAULT_ITERATIONS)
}

/// Hash a password with a fresh salt and an explicit iteration count.
pub fn hash_password_with_iterations(
    secret: &str,
    username: &str,
    password: &str,
    iterations: u32,
) -> Result<PasswordDigest, PasswordError> {
    if iterations == 0 {
        return Err(PasswordError::InvalidIterations(0));
    }
    let salt = generate_salt();
    let hash = derive(secret, username, password, &salt, iterations)?;
    Ok(PasswordDigest {
        salt,
        hash: hash.to_vec(),
        iterations,
    })
}

/// Recompute the digest with stored parameters and compare in constant time.
///
/// Any malformed stored parameter yields `false`.
pub fn verify_password(
    secret: &str,
    username: &str,
    password: &str,
    salt: &[u8],
    expected_hash: &[u8],
    iterations: i64,
) -> bool {
    let iterations = match u32::try_from(iterations) {
        Ok(n) if n > 0 => n,
        _ => return false,
    };
    match derive(secret, username, password, salt, iterations) {
        Ok(actual) => constant_time_eq(&actual, expected_hash),
        Err(_) => false,
    }
}

/// Compare two byte strings in constant time.
///
/// Only the lengths are compared up front; digest length is not secret.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
