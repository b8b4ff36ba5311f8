//! Signing secret generation

use rand::RngCore;
use rand::rngs::OsRng;

/// Number of random bytes in a generated secret.
pub const SECRET_BYTES: usize = 32;

/// Generates a fresh signing secret.
///
/// Draws [`SECRET_BYTES`] bytes from the operating system's CSPRNG and
/// hex-encodes them, giving 64 lowercase hexadecimal characters.
///
/// # Example
///
/// ```
/// let secret = envprovision::generate_secret();
/// assert_eq!(secret.len(), 64);
/// ```
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
