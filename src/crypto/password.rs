use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use super::CryptoError;

pub const PBKDF2_ITERATIONS: u32 = 600_000;
pub const MIN_ITERATIONS: u32 = 1_000;
pub const HASH_LENGTH: usize = 32;
pub const SALT_LENGTH: usize = 16;

const SCHEME: &str = "pbkdf2-sha256";

/// Derived hash buffer, zeroed on drop
#[derive(Zeroize)]
#[zeroize(drop)]
struct DerivedHash([u8; HASH_LENGTH]);

impl DerivedHash {
    fn derive(password: &str, salt: &[u8], iterations: u32) -> Self {
        let mut bytes = [0u8; HASH_LENGTH];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut bytes);
        Self(bytes)
    }
}

/// PBKDF2-HMAC-SHA256 credential hashing.
///
/// Encoded form: `pbkdf2-sha256$<iterations>$<salt_b64>$<hash_b64>`.
/// Verification reads the iteration count from the stored string, so
/// raising the cost never invalidates existing accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordHasher {
    iterations: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            iterations: PBKDF2_ITERATIONS,
        }
    }
}

impl PasswordHasher {
    pub fn with_iterations(iterations: u32) -> Result<Self, CryptoError> {
        if iterations < MIN_ITERATIONS {
            return Err(CryptoError::IterationsTooLow(iterations));
        }
        Ok(Self { iterations })
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn hash(&self, password: &str) -> String {
        let salt = generate_salt();
        let derived = DerivedHash::derive(password, &salt, self.iterations);
        format!(
            "{SCHEME}${}${}${}",
            self.iterations,
            STANDARD_NO_PAD.encode(salt),
            STANDARD_NO_PAD.encode(derived.0)
        )
    }

    /// Constant-time comparison against a stored encoded hash.
    pub fn verify(&self, password: &str, encoded: &str) -> Result<bool, CryptoError> {
        let mut parts = encoded.split('$');
        let (Some(SCHEME), Some(iterations), Some(salt), Some(expected), None) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return Err(CryptoError::MalformedHash);
        };

        let iterations: u32 = iterations.parse().map_err(|_| CryptoError::MalformedHash)?;
        let salt = STANDARD_NO_PAD
            .decode(salt)
            .map_err(|_| CryptoError::MalformedHash)?;
        let mut expected = STANDARD_NO_PAD
            .decode(expected)
            .map_err(|_| CryptoError::MalformedHash)?;
        if iterations == 0 || expected.len() != HASH_LENGTH {
            return Err(CryptoError::MalformedHash);
        }

        let derived = DerivedHash::derive(password, &salt, iterations);
        let matches: bool = derived.0.as_slice().ct_eq(expected.as_slice()).into();
        expected.zeroize();
        Ok(matches)
    }
}

/// Generate a cryptographically random salt
pub fn generate_salt() -> [u8; SALT_LENGTH] {
    use rand::RngCore;
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}
