// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Bucket keys for per-client, per-form state.
//!
//! A bucket key is a keyed BLAKE3 digest of `(form_id, client_addr)`. Both
//! inputs are length-prefixed before hashing so that `("ab", "c")` and
//! `("a", "bc")` land in different buckets, and the hashing key is secret so
//! a client cannot search for addresses that collide with someone else's
//! bucket.

use crate::error::{ConfigError, GuardError};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;

/// Key-derivation context for bucket hashing.
const BUCKET_CONTEXT: &str = "indieweb2-bastion submission-guard 2025 bucket key";

/// Key-derivation context for token MACs.
const TOKEN_CONTEXT: &str = "indieweb2-bastion submission-guard 2025 token mac";

/// Store key namespace.
const KEY_PREFIX: &str = "submission-guard";

/// Root secret from which the bucket and token keys are derived.
///
/// Every process sharing a store must use the same secret, otherwise bucket
/// keys diverge and tokens issued by one process fail verification in another.
#[derive(Clone)]
pub struct GuardSecret([u8; 32]);

impl GuardSecret {
    /// Fresh secret from the operating system RNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(encoded: &str) -> Result<Self, ConfigError> {
        let decoded = hex::decode(encoded.trim()).map_err(|_| ConfigError::InvalidSecret)?;
        let bytes: [u8; 32] = decoded
            .try_into()
            .map_err(|_| ConfigError::InvalidSecret)?;
        Ok(Self(bytes))
    }

    pub(crate) fn bucket_key(&self) -> [u8; 32] {
        blake3::derive_key(BUCKET_CONTEXT, &self.0)
    }

    pub(crate) fn token_key(&self) -> [u8; 32] {
        blake3::derive_key(TOKEN_CONTEXT, &self.0)
    }
}

impl fmt::Debug for GuardSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("GuardSecret(..)")
    }
}

/// Opaque identity of a rate-limit bucket.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BucketKey([u8; 32]);

impl BucketKey {
    /// Store key holding the bucket's submission token.
    pub fn token_key(&self) -> String {
        format!("{KEY_PREFIX}:token:{}", hex::encode(self.0))
    }

    /// Store key holding the bucket's submission window.
    pub fn window_key(&self) -> String {
        format!("{KEY_PREFIX}:window:{}", hex::encode(self.0))
    }

    /// Lock shard for this bucket.
    pub fn shard(&self, shards: usize) -> usize {
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&self.0[..8]);
        (u64::from_le_bytes(prefix) % shards.max(1) as u64) as usize
    }
}

/// Short prefix, enough to correlate log lines.
impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0[..6]))
    }
}

impl fmt::Debug for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BucketKey({self})")
    }
}

/// Maps `(form_id, client_addr)` pairs to bucket keys.
#[derive(Clone)]
pub struct BucketHasher {
    key: [u8; 32],
}

impl BucketHasher {
    pub fn new(secret: &GuardSecret) -> Self {
        Self {
            key: secret.bucket_key(),
        }
    }

    /// Hash a form/client pair. Fails with [`GuardError::InvalidKey`] when
    /// either identifier is empty or whitespace.
    pub fn bucket(&self, form_id: &str, client_addr: &str) -> Result<BucketKey, GuardError> {
        if form_id.trim().is_empty() {
            return Err(GuardError::InvalidKey("form_id"));
        }
        if client_addr.trim().is_empty() {
            return Err(GuardError::InvalidKey("client_addr"));
        }

        let mut hasher = blake3::Hasher::new_keyed(&self.key);
        for part in [form_id, client_addr] {
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        Ok(BucketKey(*hasher.finalize().as_bytes()))
    }
}
