//! Secret encryption for the GitHub Actions secrets API
//!
//! GitHub only accepts secret values encrypted with the repository's public key
//! using a libsodium sealed box (X25519 + XSalsa20-Poly1305, anonymous sender).

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use crypto_box::{aead::OsRng, PublicKey, KEY_SIZE};

/// Seal `value` for the holder of `public_key` (base64) and return the
/// base64-encoded ciphertext expected by the API.
pub fn encrypt_secret(public_key: &str, value: &str) -> Result<String> {
    let public_key = decode_public_key(public_key)?;

    let sealed = public_key
        .seal(&mut OsRng, value.as_bytes())
        .map_err(|_| anyhow!("Failed to seal secret value"))?;

    Ok(STANDARD.encode(sealed))
}

fn decode_public_key(public_key: &str) -> Result<PublicKey> {
    let bytes = STANDARD
        .decode(public_key.trim())
        .context("Repository public key is not valid base64")?;

    let bytes: [u8; KEY_SIZE] = bytes.as_slice().try_into().map_err(|_| {
        anyhow!(
            "Repository public key has {} bytes, expected {}",
            bytes.len(),
            KEY_SIZE
        )
    })?;

    Ok(PublicKey::from(bytes))
}
