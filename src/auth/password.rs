use std::borrow::Cow;

use sha2::{Digest, Sha256};
use tracing::error;

/// bcrypt only reads the first 72 bytes of its input.
const BCRYPT_INPUT_CEILING: usize = 72;

/// Longer inputs are reduced to hex(SHA-256(input)) — 64 bytes, under the
/// ceiling — so no secret material is silently truncated. Hashing and
/// verification must apply the same rule or long passwords become
/// unverifiable.
fn reduce_long_input(plain: &str) -> Cow<'_, str> {
    if plain.len() > BCRYPT_INPUT_CEILING {
        Cow::Owned(hex::encode(Sha256::digest(plain.as_bytes())))
    } else {
        Cow::Borrowed(plain)
    }
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let reduced = reduce_long_input(plain);
    let hash = bcrypt::hash(reduced.as_ref(), bcrypt::DEFAULT_COST).map_err(|e| {
        error!(error = %e, "bcrypt hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let reduced = reduce_long_input(plain);
    bcrypt::verify(reduced.as_ref(), hash).map_err(|e| {
        error!(error = %e, "bcrypt verify error");
        anyhow::anyhow!(e.to_string())
    })
}
