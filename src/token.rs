// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Submission proof tokens.
//!
//! Wire format (URL-safe base64, no padding):
//!   [16 bytes: random nonce]
//!   [8 bytes:  issue time, unix milliseconds, big-endian]
//!   [32 bytes: keyed BLAKE3 MAC over purpose || nonce || issue time]
//!
//! Tokens are unforgeable without the guard secret and carry their own issue
//! time, so an entry the store failed to expire is still refused once it is
//! older than the token TTL. Issue time has the same millisecond precision
//! as store expiry, so the two deadlines agree.

use crate::bucket::GuardSecret;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use std::time::Duration;

/// Purpose string bound into every submission token.
pub const SUBMISSION_PURPOSE: &str = "secure-submission";

/// Random nonce size (bytes).
pub const NONCE_LEN: usize = 16;
/// Issue timestamp size (bytes).
const ISSUED_AT_LEN: usize = 8;
/// MAC size (bytes).
const TAG_LEN: usize = 32;
/// Decoded token size.
pub const TOKEN_LEN: usize = NONCE_LEN + ISSUED_AT_LEN + TAG_LEN;

/// How far ahead of the verifier's clock an issue time may be. Covers
/// evaluations that read the clock before queueing on the bucket lock and
/// processes whose clocks disagree slightly.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(5);

/// An encoded token.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenValue(String);

impl TokenValue {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0.into_bytes()
    }
}

impl fmt::Display for TokenValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TokenValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenValue(..)")
    }
}

/// Issues and verifies purpose-scoped tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    key: [u8; 32],
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &GuardSecret, ttl: Duration) -> Self {
        Self {
            key: secret.token_key(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a fresh token for `purpose`.
    pub fn issue(&self, purpose: &str, now: DateTime<Utc>) -> TokenValue {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let issued_at = now.timestamp_millis();
        let tag = self.tag(purpose, &nonce, issued_at);

        let mut raw = Vec::with_capacity(TOKEN_LEN);
        raw.extend_from_slice(&nonce);
        raw.extend_from_slice(&issued_at.to_be_bytes());
        raw.extend_from_slice(tag.as_bytes());
        TokenValue(URL_SAFE_NO_PAD.encode(raw))
    }

    /// Check a token against `purpose` at time `now`.
    ///
    /// Returns false for malformed input, a MAC mismatch (which includes a
    /// different purpose or a different secret), an issue time more than
    /// [`MAX_CLOCK_SKEW`] in the future, or a token at least `ttl` old.
    pub fn verify(&self, token: &str, purpose: &str, now: DateTime<Utc>) -> bool {
        let Ok(raw) = URL_SAFE_NO_PAD.decode(token.trim()) else {
            return false;
        };
        if raw.len() != TOKEN_LEN {
            return false;
        }

        let (nonce, rest) = raw.split_at(NONCE_LEN);
        let (issued_at, tag) = rest.split_at(ISSUED_AT_LEN);

        let mut issued_at_bytes = [0u8; ISSUED_AT_LEN];
        issued_at_bytes.copy_from_slice(issued_at);
        let issued_at = i64::from_be_bytes(issued_at_bytes);

        let mut tag_bytes = [0u8; TAG_LEN];
        tag_bytes.copy_from_slice(tag);

        // blake3::Hash equality is constant-time
        if self.tag(purpose, nonce, issued_at) != blake3::Hash::from(tag_bytes) {
            return false;
        }

        let age_ms = i128::from(now.timestamp_millis()) - i128::from(issued_at);
        age_ms >= -(MAX_CLOCK_SKEW.as_millis() as i128) && age_ms < self.ttl.as_millis() as i128
    }

    fn tag(&self, purpose: &str, nonce: &[u8], issued_at: i64) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new_keyed(&self.key);
        hasher.update(&(purpose.len() as u64).to_le_bytes());
        hasher.update(purpose.as_bytes());
        hasher.update(nonce);
        hasher.update(&issued_at.to_be_bytes());
        hasher.finalize()
    }
}
