use rand::{CryptoRng, RngCore};

/// Symbols a generated key is drawn from: lowercase, uppercase, digits.
pub const KEY_ALPHABET: &[u8; 62] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ1234567890";

/// Generates a cryptographically random key of exactly `length` characters.
///
/// Each character consumes four bytes from the thread-local CSPRNG, read as a
/// little-endian `u32` and reduced modulo the alphabet size. The key is used
/// as an anti-forgery credential, so the source must stay cryptographic.
#[must_use]
pub fn generate_key(length: usize) -> String {
    generate_key_with(&mut rand::rng(), length)
}

/// Same as [`generate_key`], drawing from a caller-supplied CSPRNG.
#[must_use]
pub fn generate_key_with<R: RngCore + CryptoRng>(rng: &mut R, length: usize) -> String {
    let mut data = vec![0u8; 4 * length];
    rng.fill_bytes(&mut data);

    data.chunks_exact(4)
        .map(|chunk| {
            let rnd = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            KEY_ALPHABET[(rnd % KEY_ALPHABET.len() as u32) as usize] as char
        })
        .collect()
}
